use std::thread;

use futures::Stream;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, watch};
use tokio_stream::wrappers::{UnboundedReceiverStream, WatchStream};

use crate::session::{SessionEvent, SessionSnapshot};

use super::EngineHandle;

impl EngineHandle {
    // ========================================================================
    // STREAM SUBSCRIPTIONS
    // ========================================================================

    pub fn subscribe_snapshots(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.clone()
    }

    pub fn event_receiver(&self) -> broadcast::Receiver<SessionEvent> {
        self.events_tx.subscribe()
    }

    /// Lifecycle events forwarded onto an unbounded channel.
    ///
    /// Each subscription owns one forwarder thread. A lagging consumer skips
    /// the dropped events rather than ending the subscription. The forwarder
    /// exits as soon as the receiver is dropped or the engine is dropped.
    pub fn subscribe_events(&self) -> mpsc::UnboundedReceiver<SessionEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut broadcast_rx = self.events_tx.subscribe();

        let runtime = match tokio::runtime::Builder::new_current_thread().build() {
            Ok(runtime) => runtime,
            Err(err) => {
                log::warn!("[EngineHandle] Failed to build event forwarder runtime: {}", err);
                return rx;
            }
        };

        let spawned = thread::Builder::new()
            .name("session-events".to_string())
            .spawn(move || {
                runtime.block_on(async move {
                    loop {
                        tokio::select! {
                            _ = tx.closed() => break,
                            received = broadcast_rx.recv() => match received {
                                Ok(event) => {
                                    if tx.send(event).is_err() {
                                        break;
                                    }
                                }
                                Err(RecvError::Lagged(skipped)) => {
                                    log::warn!("[EngineHandle] Event subscriber lagged by {}", skipped);
                                }
                                Err(RecvError::Closed) => break,
                            },
                        }
                    }
                });
            });

        if let Err(err) = spawned {
            log::warn!("[EngineHandle] Failed to spawn event forwarder: {}", err);
        }

        rx
    }

    // ========================================================================
    // ASYNC STREAM ADAPTERS
    // ========================================================================

    /// Snapshot stream yielding the current state, then every change.
    pub fn snapshot_stream(&self) -> impl Stream<Item = SessionSnapshot> + Unpin {
        WatchStream::new(self.snapshots.clone())
    }

    pub fn event_stream(&self) -> impl Stream<Item = SessionEvent> + Unpin {
        UnboundedReceiverStream::new(self.subscribe_events())
    }
}
