//! Bounded asynchronous page writer
//!
//! Workers hand pages to a [`PageSender`]; a single background task drains
//! the channel into a [`PageSink`]. A full channel makes `send` wait, which
//! is the only way the sink can slow the crawl. Persistence failures are
//! logged and dropped.

use crate::sink::traits::{Page, PageSink};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Cloneable handle used by workers to submit pages
#[derive(Clone)]
pub struct PageSender {
    tx: mpsc::Sender<Page>,
}

impl PageSender {
    /// Queues a page, waiting while the channel is full
    pub async fn send(&self, page: Page) {
        let url = page.url.clone();
        if self.tx.send(page).await.is_err() {
            tracing::error!(url = %url, "Page writer closed, page dropped");
        }
    }
}

/// Counters reported when the writer is closed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriterSummary {
    pub persisted: u64,
    pub failed: u64,
}

/// Owner of the background writer task
pub struct PageWriter {
    sender: PageSender,
    task: JoinHandle<WriterSummary>,
}

impl PageWriter {
    /// Starts the writer task with a channel of `capacity` pages
    pub fn spawn(sink: Arc<dyn PageSink>, capacity: usize) -> Self {
        let (tx, mut rx) = mpsc::channel::<Page>(capacity.max(1));

        let task = tokio::spawn(async move {
            let mut summary = WriterSummary::default();
            while let Some(page) = rx.recv().await {
                match sink.persist(&page).await {
                    Ok(()) => {
                        summary.persisted += 1;
                        tracing::debug!(url = %page.url, "Persisted page");
                    }
                    Err(e) => {
                        summary.failed += 1;
                        tracing::warn!(url = %page.url, error = %e, "Failed to persist page");
                    }
                }
            }
            summary
        });

        Self {
            sender: PageSender { tx },
            task,
        }
    }

    /// Returns a handle for submitting pages
    pub fn sender(&self) -> PageSender {
        self.sender.clone()
    }

    /// Closes the channel and waits until every queued page is written
    ///
    /// Pages still held by outstanding [`PageSender`] clones keep the
    /// channel open, so drop those first.
    pub async fn close(self) -> WriterSummary {
        drop(self.sender);
        match self.task.await {
            Ok(summary) => {
                tracing::info!(
                    persisted = summary.persisted,
                    failed = summary.failed,
                    "Page writer drained"
                );
                summary
            }
            Err(e) => {
                tracing::error!(error = %e, "Page writer task failed");
                WriterSummary::default()
            }
        }
    }
}
