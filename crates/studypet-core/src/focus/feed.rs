//! Channel boundary between an external classifier and the adapter.

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use super::{FocusAdapter, FocusSample};

/// Forward every sample received on `rx` into `adapter`.
///
/// Senders never wait on the session side. The task ends when all senders
/// are dropped and resolves to the number of accepted samples.
pub fn spawn_sample_feed(
    adapter: Arc<FocusAdapter>,
    mut rx: mpsc::Receiver<FocusSample>,
) -> JoinHandle<u64> {
    tokio::spawn(async move {
        let mut accepted = 0u64;
        while let Some(sample) = rx.recv().await {
            if adapter.record(sample) {
                accepted += 1;
            }
        }
        debug!(accepted, "focus sample feed closed");
        accepted
    })
}
