use std::sync::Arc;

use db::{DbError, RepoRepository, RepositoryRow};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

/// Sent down the single record channel; `EndOfStream` is the sentinel
/// the engine sends once every producer has finished.
pub enum WriterMessage {
    Record(RepositoryRow),
    EndOfStream,
}

/// Sole mutator of DB state: buffers records and commits
/// each batch — current-state upsert plus snapshot insert — in one
/// transaction.
pub struct Writer {
    repo: Arc<dyn RepoRepository>,
    batch_size: usize,
}

impl Writer {
    pub fn new(repo: Arc<dyn RepoRepository>, batch_size: usize) -> Self {
        Self { repo, batch_size }
    }

    #[instrument(skip(self, rx, cancel))]
    pub async fn run(
        &self,
        mut rx: mpsc::Receiver<WriterMessage>,
        cancel: CancellationToken,
    ) -> Result<usize, DbError> {
        let mut buffer = Vec::with_capacity(self.batch_size);
        let mut total_written = 0usize;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("cancellation observed; flushing current batch and exiting");
                    break;
                }
                message = rx.recv() => {
                    match message {
                        Some(WriterMessage::Record(row)) => {
                            buffer.push(row);
                            if buffer.len() >= self.batch_size {
                                total_written += self.flush(&mut buffer).await?;
                            }
                        }
                        Some(WriterMessage::EndOfStream) | None => break,
                    }
                }
            }
        }

        total_written += self.flush(&mut buffer).await?;
        Ok(total_written)
    }

    async fn flush(&self, buffer: &mut Vec<RepositoryRow>) -> Result<usize, DbError> {
        if buffer.is_empty() {
            return Ok(0);
        }
        let written = self.repo.write_batch(buffer).await?;
        buffer.clear();
        Ok(written)
    }
}
