//! Example sending a backtrace through the tracing pipeline
//!
//! Backtrace lines are logged at TRACE under `stackscope::backtrace`, so run
//! with a filter that lets them through:
//!
//! ```text
//! RUST_LOG=info,stackscope::backtrace=trace cargo run --example logged_backtrace
//! ```
//!
//! Set STACKSCOPE_LOG_FORMAT=json for JSON output.

use stackscope_core::{LineSink, Reporter, TracingSink};
use stackscope_utils::init_logging;

#[inline(never)]
fn load_settings(reporter: &Reporter)
{
    tracing::warn!("settings file missing, logging where we are");
    let outcome = reporter.log_detailed(&TracingSink::new());
    tracing::info!(frames = outcome.frames(), "backtrace logged");
}

fn main()
{
    let _guard = init_logging().expect("Failed to initialize logging");

    let span = tracing::span!(tracing::Level::INFO, "startup");
    let _entered = span.enter();

    let reporter = Reporter::new().with_max_frames(32);
    load_settings(&reporter);

    // Any closure over &str is a sink as well
    let sink = |line: &str| println!("{line}");
    sink.log_line("-- fast tier --");
    reporter.log(&sink);
}
