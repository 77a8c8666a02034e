use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::DocumentProcessor;

/// Sending half; cheap to clone into every handler.
#[derive(Clone)]
pub struct JobQueue {
    sender: mpsc::UnboundedSender<Uuid>,
}

pub struct JobReceiver {
    receiver: mpsc::UnboundedReceiver<Uuid>,
}

impl JobQueue {
    pub fn new() -> (Self, JobReceiver) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, JobReceiver { receiver })
    }

    /// Schedule processing without waiting for it. Returns false once the
    /// worker has shut down.
    pub fn enqueue(&self, document_id: Uuid) -> bool {
        match self.sender.send(document_id) {
            Ok(()) => {
                tracing::debug!(document_id = %document_id, "Processing job queued");
                true
            }
            Err(_) => {
                tracing::warn!(document_id = %document_id, "Job queue closed, job dropped");
                false
            }
        }
    }

    /// True once the worker has dropped its receiver.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

impl JobReceiver {
    pub async fn recv(&mut self) -> Option<Uuid> {
        self.receiver.recv().await
    }

    /// Next queued id, if one is already waiting.
    pub fn try_recv(&mut self) -> Option<Uuid> {
        self.receiver.try_recv().ok()
    }
}

/// Drain the queue, running each job on its own task so documents are
/// processed concurrently. Duplicate ids are not coalesced; the processor's
/// status check is the only guard.
pub fn spawn_worker(mut receiver: JobReceiver, processor: Arc<DocumentProcessor>) -> JoinHandle<()> {
    tokio::spawn(async move {
        tracing::info!("Processing worker started");
        while let Some(document_id) = receiver.recv().await {
            let processor = Arc::clone(&processor);
            tokio::spawn(async move {
                processor.run_job(document_id).await;
            });
        }
        tracing::info!("Processing worker stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_enqueue_preserves_order() {
        let (queue, mut receiver) = JobQueue::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert!(queue.enqueue(a));
        assert!(queue.enqueue(b));
        assert_eq!(receiver.recv().await, Some(a));
        assert_eq!(receiver.try_recv(), Some(b));
        assert_eq!(receiver.try_recv(), None);
    }

    #[test]
    fn test_enqueue_after_receiver_dropped() {
        let (queue, receiver) = JobQueue::new();
        drop(receiver);
        assert!(!queue.enqueue(Uuid::new_v4()));
    }
}
