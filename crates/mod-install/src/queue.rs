//! Serial install queue
//!
//! Install pipelines interact with the user (name collisions, version
//! choices, passwords), so at most one may occupy those stages at a time.
//! The queue is a linear chain: a pipeline does not start any step until
//! the previous one reached its terminal state. Dependency installs
//! re-enter this queue after their parent completed, so the chain never
//! nests.

use std::future::Future;
use tokio::sync::Mutex;
use tracing::debug;

/// FIFO chain serialising install pipelines
#[derive(Debug, Default)]
pub struct InstallQueue {
    tail: Mutex<()>,
}

impl InstallQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a pipeline to the chain and run it to completion
    ///
    /// Waiters are granted the slot in arrival order, which is what makes
    /// the chain a chain.
    pub async fn run<F, T>(&self, pipeline: F) -> T
    where
        F: Future<Output = T>,
    {
        let _slot = self.tail.lock().await;
        debug!("install queue slot acquired");
        let result = pipeline.await;
        debug!("install queue slot released");
        result
    }
}
