use crate::models::ChangeBatch;
use crate::services::error::ServiceError;
use crate::services::ingestion::ChangeProcessor;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

type Reply = oneshot::Sender<Result<usize, ServiceError>>;

struct QueuedBatch {
    batch: ChangeBatch,
    reply: Reply,
}

/// Producer side of the change feed.
#[derive(Clone)]
pub struct ChangeFeedHandle {
    batch_tx: mpsc::Sender<QueuedBatch>,
    shutdown_token: CancellationToken,
}

impl ChangeFeedHandle {
    /// Queue a batch behind every batch already queued and wait until it is
    /// committed or rejected. Fails with `FeedHalted` once the worker has
    /// stopped.
    pub async fn apply(&self, batch: ChangeBatch) -> Result<usize, ServiceError> {
        let (reply, outcome) = oneshot::channel();
        self.batch_tx
            .send(QueuedBatch { batch, reply })
            .await
            .map_err(|_| ServiceError::FeedHalted("change feed is not accepting batches".into()))?;

        outcome
            .await
            .map_err(|_| ServiceError::FeedHalted("batch dropped by stopped change feed".into()))?
    }

    pub fn shutdown(&self) {
        tracing::info!("Initiating change feed shutdown");
        self.shutdown_token.cancel();
    }
}

/// Single consumer applying queued batches in receipt order.
///
/// The first failed batch stops the worker: its error goes back to the
/// producer, every later batch is refused, and the join handle resolves to
/// `FeedHalted`.
pub struct ChangeFeedWorker {
    processor: Arc<ChangeProcessor>,
    batch_rx: mpsc::Receiver<QueuedBatch>,
    shutdown_token: CancellationToken,
}

impl ChangeFeedWorker {
    pub fn new(processor: Arc<ChangeProcessor>, queue_size: usize) -> (Self, ChangeFeedHandle) {
        let (batch_tx, batch_rx) = mpsc::channel(queue_size);
        let shutdown_token = CancellationToken::new();

        let worker = Self {
            processor,
            batch_rx,
            shutdown_token: shutdown_token.clone(),
        };
        let handle = ChangeFeedHandle {
            batch_tx,
            shutdown_token,
        };

        (worker, handle)
    }

    pub fn spawn(self) -> JoinHandle<Result<(), ServiceError>> {
        tokio::spawn(self.run())
    }

    /// Runs until cancelled, until every sender is gone, or until a batch
    /// fails. Queued batches are applied before a cancellation is honoured.
    pub async fn run(mut self) -> Result<(), ServiceError> {
        tracing::info!("Change feed worker started");

        loop {
            tokio::select! {
                biased;
                queued = self.batch_rx.recv() => {
                    match queued {
                        Some(queued) => self.process(queued).await?,
                        None => {
                            tracing::info!("Channel closed, change feed worker exiting");
                            return Ok(());
                        }
                    }
                }
                _ = self.shutdown_token.cancelled() => {
                    tracing::info!("Change feed worker shutting down");
                    return Ok(());
                }
            }
        }
    }

    async fn process(&mut self, queued: QueuedBatch) -> Result<(), ServiceError> {
        let QueuedBatch { batch, reply } = queued;
        let records = batch.len();

        match self.processor.apply_batch(&batch).await {
            Ok(applied) => {
                tracing::debug!(records, applied, "Change batch processed");
                // The producer may have stopped waiting; the batch is committed either way.
                let _ = reply.send(Ok(applied));
                Ok(())
            }
            Err(e) => {
                let reason = e.to_string();
                tracing::error!(
                    records,
                    retryable = e.is_retryable(),
                    error = %reason,
                    "Change batch failed, halting change feed"
                );
                self.batch_rx.close();
                let _ = reply.send(Err(e));
                Err(ServiceError::FeedHalted(reason))
            }
        }
    }
}
