//! Turns SIGTERM and SIGINT into a scheduler shutdown request.

use std::io;
use std::thread::{self, JoinHandle};

use tracing::info;

use crate::core::SchedulerHandle;

/// Install signal handlers and wait for them on a background thread.
///
/// Handlers are registered before this returns, so a signal delivered
/// afterwards always reaches [`SchedulerHandle::request_shutdown`]. The thread
/// exits after the first signal.
pub fn spawn_signal_listener(handle: SchedulerHandle) -> io::Result<JoinHandle<()>> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let listener = ShutdownSignals::register(&runtime)?;

    thread::Builder::new()
        .name("signal-listener".into())
        .spawn(move || {
            let name = runtime.block_on(listener.recv());
            info!(signal = name, "received signal, requesting shutdown");
            handle.request_shutdown();
        })
}

#[cfg(unix)]
struct ShutdownSignals {
    terminate: tokio::signal::unix::Signal,
    interrupt: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl ShutdownSignals {
    fn register(runtime: &tokio::runtime::Runtime) -> io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        let _guard = runtime.enter();
        Ok(Self {
            terminate: signal(SignalKind::terminate())?,
            interrupt: signal(SignalKind::interrupt())?,
        })
    }

    async fn recv(mut self) -> &'static str {
        tokio::select! {
            _ = self.terminate.recv() => "SIGTERM",
            _ = self.interrupt.recv() => "SIGINT",
        }
    }
}

#[cfg(not(unix))]
struct ShutdownSignals;

#[cfg(not(unix))]
impl ShutdownSignals {
    #[allow(clippy::unnecessary_wraps)]
    const fn register(_runtime: &tokio::runtime::Runtime) -> io::Result<Self> {
        Ok(Self)
    }

    async fn recv(self) -> &'static str {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "ctrl-c handler failed");
        }
        "ctrl-c"
    }
}
