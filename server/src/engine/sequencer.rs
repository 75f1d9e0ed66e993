//! Per-channel serialization point.
//!
//! Work for one channel id runs strictly in reservation order, one job at a
//! time. Work for different channel ids runs in parallel. Reservation is
//! synchronous, so the order in which events are read off the stream is the
//! order in which they touch each channel.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tokio::sync::oneshot;

use crate::db::models::ChannelId;

type Tail = (u64, oneshot::Receiver<()>);

#[derive(Default)]
pub struct ChannelSequencer {
    /// For each channel, the completion signal of the most recently reserved slot.
    tails: Arc<DashMap<ChannelId, Tail>>,
    next_generation: AtomicU64,
}

impl ChannelSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the next place in line for `channel_id`.
    pub fn reserve(&self, channel_id: ChannelId) -> Slot {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let (done, next) = oneshot::channel();
        let previous = self
            .tails
            .insert(channel_id, (generation, next))
            .map(|(_, rx)| rx);
        Slot {
            channel_id,
            generation,
            previous,
            done: Some(done),
            tails: self.tails.clone(),
        }
    }

    /// Number of channels with reserved or running work.
    pub fn busy_channels(&self) -> usize {
        self.tails.len()
    }
}

/// A place in line for one channel. Hold it for the whole read-modify-write
/// cycle; dropping it lets the next slot run.
pub struct Slot {
    channel_id: ChannelId,
    generation: u64,
    previous: Option<oneshot::Receiver<()>>,
    done: Option<oneshot::Sender<()>>,
    tails: Arc<DashMap<ChannelId, Tail>>,
}

impl Slot {
    /// Wait until every earlier slot for this channel has been released.
    pub async fn acquire(&mut self) {
        if let Some(previous) = self.previous.as_mut() {
            // A dropped sender also means the predecessor is finished.
            let _ = previous.await;
            // Cleared only after completion so a cancelled wait still waits next time.
            self.previous = None;
        }
    }

    pub fn channel_id(&self) -> ChannelId {
        self.channel_id
    }
}

impl Drop for Slot {
    fn drop(&mut self) {
        if let Some(done) = self.done.take() {
            let _ = done.send(());
        }
        let generation = self.generation;
        self.tails
            .remove_if(&self.channel_id, |_, (g, _)| *g == generation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_channel_runs_in_reservation_order() {
        let sequencer = ChannelSequencer::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        let mut handles = Vec::new();
        for i in 0..5u64 {
            let mut slot = sequencer.reserve(100);
            let log = log.clone();
            handles.push(tokio::spawn(async move {
                slot.acquire().await;
                // Later jobs sleep less, so only the sequencer keeps them ordered
                tokio::time::sleep(Duration::from_millis(10 * (5 - i))).await;
                log.lock().unwrap().push(i);
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        assert_eq!(*log.lock().unwrap(), vec![0, 1, 2, 3, 4]);
        assert_eq!(sequencer.busy_channels(), 0);
    }

    #[tokio::test]
    async fn test_different_channels_do_not_wait() {
        let sequencer = ChannelSequencer::new();
        let mut first = sequencer.reserve(100);
        first.acquire().await;

        let mut other = sequencer.reserve(200);
        tokio::time::timeout(Duration::from_millis(100), other.acquire())
            .await
            .expect("unrelated channel should not be blocked");
        drop(other);
        drop(first);
    }

    #[tokio::test]
    async fn test_waits_for_predecessor() {
        let sequencer = ChannelSequencer::new();
        let mut first = sequencer.reserve(100);
        first.acquire().await;

        let mut second = sequencer.reserve(100);
        let blocked = tokio::time::timeout(Duration::from_millis(50), second.acquire()).await;
        assert!(blocked.is_err(), "second slot must wait while the first is held");

        drop(first);
        tokio::time::timeout(Duration::from_millis(100), second.acquire())
            .await
            .expect("released predecessor should unblock the successor");
        assert_eq!(second.channel_id(), 100);
    }

    #[tokio::test]
    async fn test_entry_removed_when_last_slot_released() {
        let sequencer = ChannelSequencer::new();
        let a = sequencer.reserve(100);
        let b = sequencer.reserve(100);
        drop(a);
        assert_eq!(sequencer.busy_channels(), 1);
        drop(b);
        assert_eq!(sequencer.busy_channels(), 0);
    }
}
