use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use tracing::{debug, warn};

/// Shared interrupt flag, checked between the top-level steps of a cycle.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Cancels `token` on Ctrl+C.
///
/// The listener runs on its own thread with a single-threaded tokio runtime
/// so the cycle itself stays synchronous. Work in progress is never rolled back;
/// the cycle stops at the next step boundary. A second Ctrl+C exits immediately.
pub fn install_interrupt_handler(token: &CancellationToken) {
    let token = token.clone();
    let spawned = thread::Builder::new()
        .name("dockcheck-signal".into())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(rt) => rt,
                Err(e) => {
                    warn!("unable to start signal listener: {e}");
                    return;
                }
            };
            runtime.block_on(async {
                match tokio::signal::ctrl_c().await {
                    Ok(()) => {
                        warn!(
                            "interrupt received, stopping after the current step (again to abort)"
                        );
                        token.cancel();
                    }
                    Err(e) => {
                        warn!("unable to listen for interrupt: {e}");
                        return;
                    }
                }
                // A blocked prompt never reaches a step boundary; a second interrupt exits.
                if tokio::signal::ctrl_c().await.is_ok() {
                    std::process::exit(130);
                }
            });
        });

    if let Err(e) = spawned {
        warn!("unable to spawn signal listener thread: {e}");
    } else {
        debug!("interrupt handler installed");
    }
}
