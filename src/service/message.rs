//! Control messages for the replicator service.
//!
//! The service task owns the cooldown gate and the undesired tracker. Anything
//! outside the task (the HTTP surface, `main`) reaches them only by sending a
//! [`ServiceMessage`] through a [`ServiceHandle`].

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use super::status::StatusSnapshot;

/// Messages that can be sent to the service task.
///
/// Messages are handled between cycles; a message sent during a cycle waits
/// for that cycle to finish.
#[derive(Debug)]
pub enum ServiceMessage {
    /// Clear the update cooldown so the next drifted unit updates at once.
    ResetCooldown,

    /// Reply with a snapshot of the service state.
    Status(oneshot::Sender<StatusSnapshot>),

    /// Stop after the current cycle.
    Shutdown,
}

/// The service task is gone.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("replicator service is not running")]
pub struct ServiceStopped;

/// Cloneable sender side of the control channel.
#[derive(Debug, Clone)]
pub struct ServiceHandle {
    tx: mpsc::Sender<ServiceMessage>,
}

impl ServiceHandle {
    pub fn new(tx: mpsc::Sender<ServiceMessage>) -> Self {
        ServiceHandle { tx }
    }

    /// Returns false once the service task has exited.
    pub fn is_running(&self) -> bool {
        !self.tx.is_closed()
    }

    /// Queues a cooldown reset.
    pub async fn reset_cooldown(&self) -> Result<(), ServiceStopped> {
        self.tx
            .send(ServiceMessage::ResetCooldown)
            .await
            .map_err(|_| ServiceStopped)
    }

    /// Asks the service for a status snapshot.
    pub async fn status(&self) -> Result<StatusSnapshot, ServiceStopped> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(ServiceMessage::Status(reply))
            .await
            .map_err(|_| ServiceStopped)?;
        rx.await.map_err(|_| ServiceStopped)
    }

    /// Asks the service to stop after the current cycle.
    pub async fn shutdown(&self) -> Result<(), ServiceStopped> {
        self.tx
            .send(ServiceMessage::Shutdown)
            .await
            .map_err(|_| ServiceStopped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn handle_reports_stopped_service() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let handle = ServiceHandle::new(tx);

        assert!(!handle.is_running());
        assert_eq!(handle.reset_cooldown().await, Err(ServiceStopped));
        assert_eq!(handle.shutdown().await, Err(ServiceStopped));
        assert!(handle.status().await.is_err());
    }

    #[tokio::test]
    async fn status_reply_dropped_is_stopped() {
        let (tx, mut rx) = mpsc::channel(1);
        let handle = ServiceHandle::new(tx);

        let responder = tokio::spawn(async move {
            // Receive the request and drop the reply sender unanswered.
            let msg = rx.recv().await;
            assert!(matches!(msg, Some(ServiceMessage::Status(_))));
        });

        assert_eq!(handle.status().await.unwrap_err(), ServiceStopped);
        responder.await.unwrap();
    }
}
