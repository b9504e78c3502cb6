use crate::data::RequestRecord;
use std::{
    collections::VecDeque,
    sync::{Mutex, MutexGuard, PoisonError},
};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::warn;

pub const DEFAULT_CAPTURE_LIMIT: usize = 100;

/// The most recent records of a page, newest first.
#[derive(Debug)]
pub struct CaptureLog {
    records: Mutex<VecDeque<RequestRecord>>,
    limit: usize,
}

impl CaptureLog {
    pub fn new(limit: usize) -> Self {
        Self {
            records: Mutex::new(VecDeque::with_capacity(limit)),
            limit: limit.max(1),
        }
    }

    fn records_mut(&self) -> MutexGuard<'_, VecDeque<RequestRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn push(&self, record: RequestRecord) {
        let mut records = self.records_mut();
        records.push_front(record);
        records.truncate(self.limit);
    }

    pub fn records(&self) -> Vec<RequestRecord> {
        self.records_mut().iter().cloned().collect()
    }

    pub fn get(&self, id: &str) -> Option<RequestRecord> {
        self.records_mut().iter().find(|r| r.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.records_mut().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records_mut().is_empty()
    }

    pub fn clear(&self) {
        self.records_mut().clear();
    }

    /// Stores records from `receiver` until the stream closes.
    pub async fn follow(&self, mut receiver: broadcast::Receiver<RequestRecord>) {
        loop {
            match receiver.recv().await {
                Ok(record) => self.push(record),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "capture log fell behind the record stream");
                }
                Err(RecvError::Closed) => break,
            }
        }
    }
}

impl Default for CaptureLog {
    fn default() -> Self {
        Self::new(DEFAULT_CAPTURE_LIMIT)
    }
}
