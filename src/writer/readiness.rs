//! Readiness signal between an encoder and the session feeding it
//!
//! Signals coalesce: any number of `signal()` calls made while one is pending
//! wake the waiter once. A signal sent before the waiter blocks is kept, so a
//! wakeup is never lost.

use async_channel::{Receiver, Sender};

/// Create a connected notifier/readiness pair
pub fn channel() -> (ReadinessNotifier, Readiness) {
    let (tx, rx) = async_channel::bounded(1);
    (ReadinessNotifier { tx }, Readiness { rx })
}

/// Encoder side: announces capacity for more data
#[derive(Debug, Clone)]
pub struct ReadinessNotifier {
    tx: Sender<()>,
}

impl ReadinessNotifier {
    pub fn signal(&self) {
        // Full means a signal is already pending
        let _ = self.tx.try_send(());
    }
}

/// Session side: blocks until the encoder signals
#[derive(Debug, Clone)]
pub struct Readiness {
    rx: Receiver<()>,
}

impl Readiness {
    /// Block until the next signal; `false` once every notifier is gone
    pub fn wait(&self) -> bool {
        self.rx.recv_blocking().is_ok()
    }
}
