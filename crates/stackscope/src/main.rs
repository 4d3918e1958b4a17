use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use stackscope_core::report::{Reporter, TracingSink};
use stackscope_core::symbols::{symbolize_fast, PreciseSymbolizer};
use stackscope_core::{
    capture_vec, debug_break, is_debugger_present, platform_build_os, processor_count, BacktraceConfig, Capabilities,
    SymbolTable,
};
use stackscope_utils::{info, init_logging, warn};

/// Inspect the running platform and print symbolized backtraces.
#[derive(Parser, Debug)]
#[command(name = "stackscope")]
#[command(version)]
#[command(about = "Inspect the running platform and print symbolized backtraces", long_about = None)]
struct Cli
{
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands
{
    /// Show build OS, processor count, debugger state and backtrace support
    Info,
    /// Print a backtrace of this command
    Trace
    {
        /// Maximum number of frames to capture
        #[arg(short, long)]
        depth: Option<usize>,
        /// Resolve file and line numbers with addr2line / atos
        #[arg(long, default_value_t = false)]
        precise: bool,
        /// Send the backtrace to the log instead of stdout
        #[arg(long, default_value_t = false)]
        log: bool,
    },
    /// Install a crash handler, then raise a fatal signal to exercise it
    Crash
    {
        /// Signal to raise
        #[arg(long, value_enum, default_value_t = CrashSignal::Segv)]
        signal: CrashSignal,
    },
    /// Trap into an attached debugger (no-op without one)
    Break,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum CrashSignal
{
    Segv,
    Abrt,
    Bus,
}

fn main() -> ExitCode
{
    // RUST_LOG, STACKSCOPE_LOG_FORMAT and STACKSCOPE_LOG_FILE
    let _guard = match init_logging() {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            return ExitCode::FAILURE;
        }
    };

    let config = match BacktraceConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let cli = Cli::parse();
    match cli.command {
        Commands::Info => {
            print_info(&config);
            ExitCode::SUCCESS
        }
        Commands::Trace { depth, precise, log } => {
            let config = match depth {
                Some(depth) => config.with_max_frames(depth),
                None => config,
            };
            trace(&config, precise, log)
        }
        Commands::Crash { signal } => crash(&config, signal),
        Commands::Break => {
            let attached = is_debugger_present();
            debug_break();
            if attached {
                println!("Returned from debugger trap");
            } else {
                println!("No debugger attached; nothing to trap into");
            }
            ExitCode::SUCCESS
        }
    }
}

fn print_info(config: &BacktraceConfig)
{
    let capabilities = Capabilities::detect();

    println!("Platform:");
    println!("  Build OS: {}", platform_build_os());
    println!("  Processors: {}", processor_count());
    println!("  Debugger attached: {}", is_debugger_present());
    println!("\nBacktrace support:");
    println!("  Capture: {}", capabilities.capture);
    println!("  Fast symbolization: {}", capabilities.fast_symbolize);
    println!("  Precise symbolization: {}", capabilities.precise_symbolize);
    println!("\nConfiguration:");
    println!("  Max frames: {}", config.max_frames);
    println!("  Symbolizer: {}", PreciseSymbolizer::from_config(config).tool().display());
    println!("  Tool timeout: {} ms", config.tool_timeout.as_millis());
}

fn trace(config: &BacktraceConfig, precise: bool, log: bool) -> ExitCode
{
    if log {
        let reporter = Reporter::from_config(config);
        let sink = TracingSink::new();
        let outcome = if precise { reporter.log_detailed(&sink) } else { reporter.log(&sink) };
        info!(?outcome, "backtrace logged under stackscope::backtrace at TRACE level");
        return ExitCode::SUCCESS;
    }

    let frames = capture_vec(config.max_frames);
    if frames.is_empty() {
        println!("backtrace unavailable");
        return ExitCode::FAILURE;
    }

    let table = if precise {
        PreciseSymbolizer::from_config(config).symbolize(&frames).or_else(|| {
            warn!("precise symbolization unavailable, falling back to the fast tier");
            symbolize_fast(&frames)
        })
    } else {
        symbolize_fast(&frames)
    };
    let table = table.unwrap_or_else(|| SymbolTable::unresolved(frames.len()));

    for (index, (address, entry)) in frames.iter().zip(&table).enumerate() {
        match entry {
            Some(frame) => println!("#{index} {address} {frame}"),
            None => println!("#{index} {address} ??"),
        }
    }
    ExitCode::SUCCESS
}

#[cfg(unix)]
fn crash(config: &BacktraceConfig, signal: CrashSignal) -> ExitCode
{
    let signo = match signal {
        CrashSignal::Segv => libc::SIGSEGV,
        CrashSignal::Abrt => libc::SIGABRT,
        CrashSignal::Bus => libc::SIGBUS,
    };

    crash_handler::install(signo, Reporter::from_config(config));
    info!(signal = ?signal, "raising fatal signal");
    // SAFETY: raise has no memory-safety preconditions; the handler installed
    // above reports and then re-raises with the default disposition.
    unsafe {
        libc::raise(signo);
    }
    ExitCode::FAILURE
}

#[cfg(not(unix))]
fn crash(_config: &BacktraceConfig, signal: CrashSignal) -> ExitCode
{
    eprintln!("Error: raising {signal:?} is only supported on Unix targets");
    ExitCode::FAILURE
}

#[cfg(unix)]
mod crash_handler
{
    use std::ffi::c_void;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::{mem, ptr};

    use stackscope_core::report::{RawFdWriter, Reporter};
    use stackscope_core::FaultContext;

    static MAX_FRAMES: AtomicUsize = AtomicUsize::new(0);

    /// Report the fault on stderr, then let the default action terminate us.
    extern "C" fn on_fatal_signal(signo: libc::c_int, info: *mut libc::siginfo_t, ucontext: *mut c_void)
    {
        let reporter = Reporter::new().with_max_frames(MAX_FRAMES.load(Ordering::Relaxed));
        // SAFETY: the kernel passes valid siginfo and ucontext pointers to an
        // SA_SIGINFO handler for the duration of the call.
        let fault = unsafe { FaultContext::from_signal(info.cast_const(), ucontext.cast_const()) };
        reporter.print(&mut RawFdWriter::stderr(), fault.as_ref());

        // SA_RESETHAND restored the default disposition.
        // SAFETY: raise is async-signal-safe.
        unsafe {
            libc::raise(signo);
        }
    }

    pub(super) fn install(signo: libc::c_int, reporter: Reporter)
    {
        MAX_FRAMES.store(reporter.max_frames(), Ordering::Relaxed);

        // SAFETY: sigaction is plain old data; all-zero is a valid value.
        let mut action: libc::sigaction = unsafe { mem::zeroed() };
        action.sa_sigaction = on_fatal_signal as usize;
        action.sa_flags = libc::SA_SIGINFO | libc::SA_RESETHAND;
        // SAFETY: `action` is fully initialised and the handler only performs
        // async-signal-safe work.
        unsafe {
            libc::sigemptyset(&mut action.sa_mask);
            libc::sigaction(signo, &action, ptr::null_mut());
        }
    }
}
