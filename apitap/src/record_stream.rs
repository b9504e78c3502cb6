use crate::data::RequestRecord;
use tokio::sync::broadcast;
use tracing::trace;

pub const DEFAULT_RECORD_CAPACITY: usize = 256;

/// Outward stream of terminal records.
///
/// Publishing never blocks and never fails: with no subscriber the record is dropped,
/// and a subscriber that falls behind loses the oldest records.
#[derive(Debug, Clone)]
pub struct RecordPublisher {
    sender: broadcast::Sender<RequestRecord>,
}

impl RecordPublisher {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn publish(&self, record: RequestRecord) {
        let id = record.id.clone();
        if self.sender.send(record).is_err() {
            trace!(%id, "no record subscribers, dropping record");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RequestRecord> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for RecordPublisher {
    fn default() -> Self {
        Self::new(DEFAULT_RECORD_CAPACITY)
    }
}
