use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};

use crate::types::HandPose;

pub type HandBatch = Arc<[HandPose]>;

/// Writing half of the single-slot hand cell. A new batch replaces any batch
/// the reader has not picked up yet.
pub struct HandWriter {
    tx: Sender<HandBatch>,
    // Kept so the writer can evict a stale batch from a full slot.
    evict: Receiver<HandBatch>,
}

/// Reading half. Always has a batch to hand out, initially empty.
pub struct HandReader {
    rx: Receiver<HandBatch>,
    latest: HandBatch,
}

pub fn hand_slot() -> (HandWriter, HandReader) {
    let (tx, rx) = bounded(1);
    (
        HandWriter {
            tx,
            evict: rx.clone(),
        },
        HandReader {
            rx,
            latest: Arc::from(Vec::new()),
        },
    )
}

impl HandWriter {
    pub fn publish(&self, hands: Vec<HandPose>) {
        let mut batch: HandBatch = hands.into();
        // The writer owns a receiver, so the channel never disconnects here.
        while let Err(TrySendError::Full(back)) = self.tx.try_send(batch) {
            let _ = self.evict.try_recv();
            batch = back;
        }
    }
}

impl HandReader {
    /// The newest published batch, or the previous one if nothing new arrived.
    pub fn latest(&mut self) -> HandBatch {
        while let Ok(batch) = self.rx.try_recv() {
            self.latest = batch;
        }
        self.latest.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::hand_with;
    use std::thread;

    fn hand_at(x: f32) -> HandPose {
        hand_with((x, 0.0), (x, -1.0), (x, -2.0), (x, 2.0))
    }

    #[test]
    fn starts_empty() {
        let (_writer, mut reader) = hand_slot();
        assert!(reader.latest().is_empty());
    }

    #[test]
    fn newer_batch_overwrites_unread_one() {
        let (writer, mut reader) = hand_slot();
        writer.publish(vec![hand_at(1.0)]);
        writer.publish(vec![hand_at(2.0), hand_at(3.0)]);
        let latest = reader.latest();
        assert_eq!(latest.len(), 2);
        assert_eq!(latest[0].wrist().x, 2.0);
    }

    #[test]
    fn keeps_last_batch_until_replaced() {
        let (writer, mut reader) = hand_slot();
        writer.publish(vec![hand_at(5.0)]);
        assert_eq!(reader.latest().len(), 1);
        assert_eq!(reader.latest().len(), 1);
        writer.publish(Vec::new());
        assert!(reader.latest().is_empty());
    }

    #[test]
    fn publish_after_reader_dropped_is_harmless() {
        let (writer, reader) = hand_slot();
        drop(reader);
        writer.publish(vec![hand_at(1.0)]);
        writer.publish(vec![hand_at(2.0)]);
    }

    #[test]
    fn reader_never_sees_partial_batch_across_threads() {
        let (writer, mut reader) = hand_slot();
        let producer = thread::spawn(move || {
            for n in 0..200 {
                let batch = (0..n % 3).map(|_| hand_at(n as f32)).collect();
                writer.publish(batch);
            }
        });
        for _ in 0..200 {
            let batch = reader.latest();
            if let Some(first) = batch.first() {
                assert!(batch.iter().all(|h| h.wrist() == first.wrist()));
            }
        }
        producer.join().unwrap();
    }
}
