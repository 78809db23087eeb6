//! Tracing setup for the `selftest-fixture` binary.
//!
//! The library only emits `tracing` events; installing a subscriber is left
//! to the binary (or to the test harness embedding the fixture).

use tracing_subscriber::EnvFilter;

/// Install a formatted stderr subscriber.
///
/// `RUST_LOG` wins when set; otherwise `verbosity` picks the level
/// (0 = info, 1 = debug, 2+ = trace). Records emitted through the `log`
/// facade are forwarded as well. Calling this twice is harmless.
pub fn init(verbosity: u8) {
    let default_level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_ok() {
        let _ = tracing_log::LogTracer::init();
    }
}
