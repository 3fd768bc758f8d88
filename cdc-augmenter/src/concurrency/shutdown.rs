//! Shutdown signalling between a task owner and its tasks.
//!
//! A [`ShutdownTx`] is kept by whoever spawned a task and the task polls its
//! [`ShutdownRx`]. Sending a signal and dropping the sender both count as a request to
//! stop, so a task never outlives a forgotten owner.

use tokio::sync::watch;

pub type ShutdownTx = watch::Sender<()>;

pub type ShutdownRx = watch::Receiver<()>;

pub fn create_shutdown_channel() -> (ShutdownTx, ShutdownRx) {
    watch::channel(())
}

/// Resolves once shutdown has been requested through `rx`.
pub async fn shutdown_requested(rx: &mut ShutdownRx) {
    // `changed` errors when the sender is gone, which is a shutdown as well.
    let _ = rx.changed().await;
}

/// Sends the shutdown signal, ignoring the case where every receiver is already gone.
pub fn request_shutdown(tx: &ShutdownTx) {
    let _ = tx.send(());
}
