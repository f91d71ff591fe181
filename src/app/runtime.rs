use super::{PollLoop, ShutdownReason};
use crate::error::Result;
use crate::shutdown::ShutdownState;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::{oneshot, Mutex};
use tracing::{error, info, warn};

impl PollLoop {
    /// Tick forever on the poll interval until a signal arrives or the
    /// cancellation token fires.
    pub async fn run(&mut self) -> Result<ShutdownReason> {
        info!(
            "Autoshutdown is running: {} probe(s), polling every {:?}, countdown {} minute(s)",
            self.aggregator.probe_count(),
            self.interval,
            self.config.countdown_minutes
        );

        let (shutdown_sender, mut shutdown_receiver) = oneshot::channel();
        self.setup_signal_handlers(shutdown_sender);
        let mut signals_open = true;

        let reason = loop {
            tokio::select! {
                biased;
                _ = self.cancellation_token.cancelled() => break ShutdownReason::Cancelled,
                received = &mut shutdown_receiver, if signals_open => match received {
                    Ok(reason) => break reason,
                    Err(_) => {
                        warn!("No signal handlers registered, only cancellation can stop the loop");
                        signals_open = false;
                        continue;
                    }
                },
                _ = tokio::time::sleep(self.interval) => {}
            }

            self.tick().await;
        };

        info!("Shutdown initiated: {:?}", reason);
        self.finish().await;
        info!("Autoshutdown stopped");
        Ok(reason)
    }

    /// Single tick for `--once`, then the usual exit handling
    pub async fn run_once(&mut self) -> Result<ShutdownState> {
        let outcome = self.tick().await;
        info!(
            busy = outcome.busy,
            state = %outcome.state,
            "Single tick complete"
        );
        self.finish().await;
        Ok(self.state)
    }

    /// Exit behaviour for a pending countdown: left running unless
    /// `disarm_on_exit` is set, in which case one cancel is attempted.
    async fn finish(&mut self) {
        if self.state != ShutdownState::Armed {
            return;
        }

        if self.config.disarm_on_exit {
            self.controller.disarm(&mut self.state).await;
        } else {
            warn!(
                "Exiting with a shutdown countdown still pending; cancel it manually if needed"
            );
        }
    }

    fn setup_signal_handlers(&self, shutdown_sender: oneshot::Sender<ShutdownReason>) {
        let shutdown_sender = Arc::new(Mutex::new(Some(shutdown_sender)));

        // SIGTERM (systemd stop)
        #[cfg(unix)]
        {
            let shutdown_sender_sigterm = Arc::clone(&shutdown_sender);
            tokio::spawn(async move {
                let mut sigterm = match signal::unix::signal(signal::unix::SignalKind::terminate())
                {
                    Ok(sigterm) => sigterm,
                    Err(e) => {
                        error!("Failed to register SIGTERM handler: {}", e);
                        return;
                    }
                };
                if let Some(()) = sigterm.recv().await {
                    info!("Received SIGTERM signal");
                    if let Some(sender) = shutdown_sender_sigterm.lock().await.take() {
                        let _ = sender.send(ShutdownReason::Signal("SIGTERM".to_string()));
                    }
                }
            });
        }

        // SIGINT (Ctrl+C)
        let shutdown_sender_sigint = Arc::clone(&shutdown_sender);
        tokio::spawn(async move {
            if let Ok(()) = signal::ctrl_c().await {
                info!("Received SIGINT signal (Ctrl+C)");
                if let Some(sender) = shutdown_sender_sigint.lock().await.take() {
                    let _ = sender.send(ShutdownReason::Signal("SIGINT".to_string()));
                }
            }
        });
    }
}
