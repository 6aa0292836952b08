//! Background execution of the service loop

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::{Service, ServiceError};

impl Service {
    /// Spawn the update loop on the current runtime
    pub fn start(self) -> ServiceHandle {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let mut service = self;
        let task = tokio::spawn(async move { service.run(token).await });
        ServiceHandle { cancel, task }
    }
}

/// Handle to a running service loop
#[derive(Debug)]
pub struct ServiceHandle {
    cancel: CancellationToken,
    task: JoinHandle<Result<(), ServiceError>>,
}

impl ServiceHandle {
    /// Token that stops the loop when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Whether the loop has already exited
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Cancel the loop and wait for it to exit
    ///
    /// An in-flight pass stops at its next superstep barrier without
    /// persisting scores.
    pub async fn stop(self) -> Result<(), ServiceError> {
        info!("Stopping PageRank service");
        self.cancel.cancel();
        self.wait().await
    }

    /// Wait for the loop to exit on its own
    pub async fn wait(self) -> Result<(), ServiceError> {
        self.task
            .await
            .map_err(|err| ServiceError::TaskFailed(err.to_string()))?
    }
}
