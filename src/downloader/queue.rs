// Download queue with a forward-only cursor
//
// Driven by a single consumer: items are handed out in order and the items
// already dispatched are immutable history, except that the orchestrator
// settles the most recently dispatched one exactly once.

use super::models::DownloadRequest;
use super::progress::DownloadStatus;

#[derive(Debug, Clone)]
pub struct QueueItem {
    pub url: String,
    pub request: DownloadRequest,
    pub status: DownloadStatus,
    pub progress: f32,
}

#[derive(Debug, Default)]
pub struct DownloadQueue {
    items: Vec<QueueItem>,
    cursor: usize,
}

impl DownloadQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, url: impl Into<String>, request: DownloadRequest) {
        self.items.push(QueueItem {
            url: url.into(),
            request,
            status: DownloadStatus::Pending,
            progress: 0.0,
        });
    }

    /// Hand out the item at the cursor and advance past it
    pub fn next(&mut self) -> Option<QueueItem> {
        let item = self.items.get(self.cursor)?.clone();
        self.cursor += 1;
        Some(item)
    }

    /// Settle the most recently dispatched item as finished.
    /// No-op when nothing has been dispatched yet.
    pub fn mark_complete(&mut self) {
        if let Some(item) = self.last_dispatched_mut() {
            item.status = DownloadStatus::Finished;
            item.progress = 100.0;
        }
    }

    /// Settle the most recently dispatched item as failed.
    /// No-op when nothing has been dispatched yet.
    pub fn mark_error(&mut self) {
        if let Some(item) = self.last_dispatched_mut() {
            item.status = DownloadStatus::Error;
        }
    }

    fn last_dispatched_mut(&mut self) -> Option<&mut QueueItem> {
        if self.cursor == 0 {
            return None;
        }
        self.items.get_mut(self.cursor - 1)
    }

    /// Finished items over total, as a percentage; 0 when empty
    pub fn overall_progress(&self) -> f32 {
        if self.items.is_empty() {
            return 0.0;
        }
        let finished = self
            .items
            .iter()
            .filter(|item| item.status == DownloadStatus::Finished)
            .count();
        finished as f32 / self.items.len() as f32 * 100.0
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.cursor = 0;
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn has_pending(&self) -> bool {
        self.cursor < self.items.len()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn items(&self) -> &[QueueItem] {
        &self.items
    }

    /// Dispatch position like "2/5"
    pub fn progress_text(&self) -> String {
        format!("{}/{}", self.cursor, self.items.len())
    }
}
