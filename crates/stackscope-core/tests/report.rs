//! Tests for the crash reporter

use std::cell::RefCell;
use std::io;

use stackscope_core::report::{LineSink, ReportOutcome, Reporter, TracingSink, UNAVAILABLE_LINE};
use stackscope_core::BacktraceConfig;

#[derive(Default)]
struct CollectingSink
{
    lines: RefCell<Vec<String>>,
}

impl LineSink for CollectingSink
{
    fn log_line(&self, line: &str)
    {
        self.lines.borrow_mut().push(line.to_string());
    }
}

/// Every frame line is `#<index> <address> <symbol>`, indices counting up from 0.
fn assert_frame_lines(lines: &[String])
{
    for (index, line) in lines.iter().enumerate() {
        let mut parts = line.splitn(3, ' ');
        assert_eq!(parts.next(), Some(format!("#{index}").as_str()), "line {line:?}");

        let address = parts.next().expect("address column");
        assert!(address.starts_with("0x") && address.len() == 18, "address {address:?}");
        assert!(u64::from_str_radix(&address[2..], 16).is_ok());

        let symbol = parts.next().expect("symbol column");
        assert!(!symbol.is_empty());
    }
}

#[test]
fn test_print_writes_at_least_one_line()
{
    let mut out = Vec::new();
    let outcome = Reporter::new().print(&mut out, None);
    let text = String::from_utf8(out).unwrap();
    assert!(text.ends_with('\n'));

    let lines: Vec<String> = text.lines().map(str::to_string).collect();
    assert!(!lines.is_empty());
    match outcome {
        ReportOutcome::Rendered { frames } => {
            assert_eq!(lines.len(), frames);
            assert_frame_lines(&lines);
        }
        ReportOutcome::Unsupported => assert_eq!(lines, [UNAVAILABLE_LINE]),
        ReportOutcome::StreamFailed => panic!("writing to a Vec cannot fail"),
    }
}

#[test]
fn test_print_honours_max_frames()
{
    let mut out = Vec::new();
    let outcome = Reporter::new().with_max_frames(3).print(&mut out, None);
    assert!(outcome.frames() <= 3);
    assert!(String::from_utf8(out).unwrap().lines().count() <= 3);
}

#[test]
fn test_print_with_zero_frames_is_unavailable()
{
    let config = BacktraceConfig::default();
    let mut out = Vec::new();
    let outcome = Reporter::from_config(&config).with_max_frames(0).print(&mut out, None);
    assert_eq!(outcome, ReportOutcome::Unsupported);
    assert_eq!(String::from_utf8(out).unwrap(), "backtrace unavailable\n");
}

struct BrokenStream;

impl io::Write for BrokenStream
{
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize>
    {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
    }

    fn flush(&mut self) -> io::Result<()>
    {
        Ok(())
    }
}

#[test]
fn test_print_to_failing_stream_does_not_panic()
{
    let outcome = Reporter::new().print(&mut BrokenStream, None);
    assert_eq!(outcome, ReportOutcome::StreamFailed);
}

#[test]
fn test_log_sends_one_line_per_frame()
{
    let sink = CollectingSink::default();
    let outcome = Reporter::new().with_max_frames(16).log(&sink);
    let lines = sink.lines.into_inner();

    match outcome {
        ReportOutcome::Rendered { frames } => {
            assert_eq!(lines.len(), frames);
            assert!(frames <= 16);
            assert_frame_lines(&lines);
        }
        ReportOutcome::Unsupported => assert_eq!(lines, [UNAVAILABLE_LINE]),
        ReportOutcome::StreamFailed => unreachable!("sinks cannot fail"),
    }
}

#[test]
fn test_log_detailed_falls_back_gracefully()
{
    let sink = CollectingSink::default();
    let outcome = Reporter::new().with_max_frames(8).log_detailed(&sink);
    let lines = sink.lines.into_inner();

    assert!(!lines.is_empty());
    if let ReportOutcome::Rendered { frames } = outcome {
        assert_eq!(lines.len(), frames);
        for (index, line) in lines.iter().enumerate() {
            assert!(line.starts_with(&format!("#{index} 0x")), "line {line:?}");
        }
    }
}

#[test]
fn test_log_through_tracing_without_subscriber()
{
    let outcome = Reporter::new().with_max_frames(4).log(&TracingSink::new());
    assert!(outcome.frames() <= 4);
}

#[cfg(unix)]
mod signal_report
{
    use std::ffi::c_void;
    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::{mem, ptr};

    use stackscope_core::types::Address;
    use stackscope_core::{FaultContext, Reporter};

    pub(crate) static REPORT: Mutex<Vec<u8>> = Mutex::new(Vec::new());
    pub(crate) static FAULT_IP: AtomicU64 = AtomicU64::new(0);
    pub(crate) static FRAMES: AtomicUsize = AtomicUsize::new(0);

    extern "C" fn on_usr1(_signo: libc::c_int, info: *mut libc::siginfo_t, ucontext: *mut c_void)
    {
        // SAFETY: the kernel passes valid pointers to an SA_SIGINFO handler.
        let fault = unsafe { FaultContext::from_signal(info.cast_const(), ucontext.cast_const()) };
        // The signal is raised synchronously by the test, which holds no lock.
        let Ok(mut report) = REPORT.try_lock() else {
            return;
        };
        let outcome = Reporter::new().with_max_frames(16).print(&mut *report, fault.as_ref());
        FRAMES.store(outcome.frames(), Ordering::SeqCst);
        let ip = fault.and_then(|fault| fault.instruction_pointer());
        FAULT_IP.store(ip.map_or(0, Address::value), Ordering::SeqCst);
    }

    pub(crate) fn raise_usr1()
    {
        // SAFETY: sigaction is plain old data; all-zero is a valid value.
        let mut action: libc::sigaction = unsafe { mem::zeroed() };
        let mut previous: libc::sigaction = unsafe { mem::zeroed() };
        action.sa_sigaction = on_usr1 as usize;
        action.sa_flags = libc::SA_SIGINFO;

        // SAFETY: both structures are initialised; the previous disposition
        // is restored once the synchronous signal has been handled.
        unsafe {
            libc::sigemptyset(&mut action.sa_mask);
            assert_eq!(libc::sigaction(libc::SIGUSR1, &action, &mut previous), 0);
            libc::raise(libc::SIGUSR1);
            libc::sigaction(libc::SIGUSR1, &previous, ptr::null_mut());
        }
    }
}

#[cfg(unix)]
#[test]
fn test_print_from_signal_handler_with_fault_context()
{
    use std::sync::atomic::Ordering;

    use stackscope_core::types::Address;

    signal_report::raise_usr1();

    let report = String::from_utf8(signal_report::REPORT.lock().unwrap().clone()).unwrap();
    let lines: Vec<String> = report.lines().map(str::to_string).collect();
    assert_eq!(lines[0], format!("Signal received: {}, errno: 0", libc::SIGUSR1));

    // SIGUSR1 carries no fault address, so frame lines follow directly.
    let frames = signal_report::FRAMES.load(Ordering::SeqCst);
    if frames == 0 {
        assert_eq!(lines[1..], [UNAVAILABLE_LINE]);
        return;
    }
    assert_eq!(lines.len(), frames + 1);
    assert_frame_lines(&lines[1..]);

    let fault_ip = signal_report::FAULT_IP.load(Ordering::SeqCst);
    if cfg!(target_os = "linux") && fault_ip != 0 {
        assert!(lines[1].starts_with(&format!("#0 {} ", Address::new(fault_ip))), "line {:?}", lines[1]);
    }
}
