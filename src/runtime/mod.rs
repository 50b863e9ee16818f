//! Process-level runtime glue: signal handling and the daemon entry point.

pub mod daemon;
#[cfg(feature = "tokio-runtime")]
pub mod signals;

pub use daemon::run_daemon;
#[cfg(feature = "tokio-runtime")]
pub use signals::spawn_signal_listener;
