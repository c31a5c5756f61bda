use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Single-producer single-consumer playback ring.
///
/// Samples are stored as `AtomicU32` bit patterns so both contexts can touch
/// the array without locks or unsafe code. The two indices are monotonically
/// increasing 32-bit counters; array position is `index & (capacity - 1)`.
/// The producer owns `write_index`, the renderer owns `read_index`, with one
/// sanctioned exception: overflow eviction, where the producer advances
/// `read_index` past the oldest samples before overwriting them.
pub struct PlaybackRing {
    shared: Arc<RingShared>,
}

struct RingShared {
    samples: Box<[AtomicU32]>,
    mask: u32,
    capacity: u32,
    write_index: AtomicU32,
    read_index: AtomicU32,
}

/// Outcome of a producer push. `evicted` is nonzero only when the overflow
/// policy dropped oldest data to admit the newest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PushOutcome {
    pub written: usize,
    pub evicted: usize,
}

impl PlaybackRing {
    /// Create a ring holding at least `capacity` samples, rounded up to the
    /// next power of two.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.next_power_of_two().max(2) as u32;
        let samples = (0..capacity)
            .map(|_| AtomicU32::new(0.0f32.to_bits()))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self {
            shared: Arc::new(RingShared {
                samples,
                mask: capacity - 1,
                capacity,
                write_index: AtomicU32::new(0),
                read_index: AtomicU32::new(0),
            }),
        }
    }

    pub fn split(self) -> (RingProducer, RingConsumer) {
        (
            RingProducer {
                shared: self.shared.clone(),
            },
            RingConsumer {
                shared: self.shared,
            },
        )
    }
}

pub struct RingProducer {
    shared: Arc<RingShared>,
}

impl RingProducer {
    /// Append samples, evicting oldest unread data if the ring is full.
    pub fn push(&mut self, samples: &[f32]) -> PushOutcome {
        let shared = &self.shared;
        let capacity = shared.capacity;

        let mut evicted = 0usize;
        let mut samples = samples;
        if samples.len() > capacity as usize {
            // Incoming burst alone exceeds the ring: only its newest tail
            // can survive.
            evicted += samples.len() - capacity as usize;
            samples = &samples[samples.len() - capacity as usize..];
        }
        let len = samples.len() as u32;

        let write = shared.write_index.load(Ordering::Relaxed);
        let read = shared.read_index.load(Ordering::Acquire);
        let fill = write.wrapping_sub(read);
        let free = capacity.saturating_sub(fill);

        if len > free {
            let shortfall = len - free;
            shared
                .read_index
                .store(read.wrapping_add(shortfall), Ordering::Release);
            evicted += shortfall as usize;
        }

        for (i, &s) in samples.iter().enumerate() {
            let pos = (write.wrapping_add(i as u32) & shared.mask) as usize;
            shared.samples[pos].store(s.to_bits(), Ordering::Relaxed);
        }
        shared
            .write_index
            .store(write.wrapping_add(len), Ordering::Release);

        PushOutcome {
            written: len as usize,
            evicted,
        }
    }

    pub fn fill_level(&self) -> usize {
        let write = self.shared.write_index.load(Ordering::Relaxed);
        let read = self.shared.read_index.load(Ordering::Acquire);
        write.wrapping_sub(read) as usize
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity as usize
    }
}

pub struct RingConsumer {
    shared: Arc<RingShared>,
}

impl RingConsumer {
    pub fn write_index(&self) -> u32 {
        self.shared.write_index.load(Ordering::Acquire)
    }

    pub fn read_index(&self) -> u32 {
        self.shared.read_index.load(Ordering::Relaxed)
    }

    pub fn commit_read_index(&mut self, index: u32) {
        self.shared.read_index.store(index, Ordering::Release);
    }

    /// Masked sample load; any 32-bit index is in bounds by construction.
    pub fn sample_at(&self, index: u32) -> f32 {
        let pos = (index & self.shared.mask) as usize;
        f32::from_bits(self.shared.samples[pos].load(Ordering::Relaxed))
    }

    pub fn capacity(&self) -> u32 {
        self.shared.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_rounds_up_to_power_of_two() {
        let ring = PlaybackRing::new(1000);
        let (producer, _) = ring.split();
        assert_eq!(producer.capacity(), 1024);
    }

    #[test]
    fn push_then_read_back_in_order() {
        let (mut producer, consumer) = PlaybackRing::new(8).split();
        let outcome = producer.push(&[0.1, 0.2, 0.3]);
        assert_eq!(outcome, PushOutcome { written: 3, evicted: 0 });
        assert_eq!(producer.fill_level(), 3);
        assert_eq!(consumer.sample_at(0), 0.1);
        assert_eq!(consumer.sample_at(2), 0.3);
    }

    #[test]
    fn overflow_evicts_oldest_and_keeps_fill_at_capacity() {
        let (mut producer, consumer) = PlaybackRing::new(8).split();
        producer.push(&[1.0; 8]);
        assert_eq!(producer.fill_level(), 8);

        let outcome = producer.push(&[2.0, 2.0]);
        assert_eq!(outcome.evicted, 2);
        assert_eq!(producer.fill_level(), 8);

        // The oldest two samples are gone; reading from the advanced read
        // index yields the survivors then the new tail.
        let read = consumer.read_index();
        assert_eq!(consumer.sample_at(read), 1.0);
        assert_eq!(consumer.sample_at(read.wrapping_add(6)), 2.0);
        assert_eq!(consumer.sample_at(read.wrapping_add(7)), 2.0);
    }

    #[test]
    fn burst_larger_than_ring_keeps_newest_tail() {
        let (mut producer, consumer) = PlaybackRing::new(4).split();
        let burst: Vec<f32> = (0..10).map(|i| i as f32).collect();
        let outcome = producer.push(&burst);
        assert_eq!(outcome.written, 4);
        assert_eq!(outcome.evicted, 6);
        assert_eq!(producer.fill_level(), 4);

        let read = consumer.read_index();
        let tail: Vec<f32> = (0..4).map(|i| consumer.sample_at(read.wrapping_add(i))).collect();
        assert_eq!(tail, vec![6.0, 7.0, 8.0, 9.0]);
    }

    #[test]
    fn indices_wrap_without_losing_fill_accounting() {
        let (mut producer, mut consumer) = PlaybackRing::new(8).split();
        // Drive the counters close to u32::MAX via the test-only seam.
        producer.shared.write_index.store(u32::MAX - 2, Ordering::Relaxed);
        producer.shared.read_index.store(u32::MAX - 2, Ordering::Relaxed);

        producer.push(&[0.5; 6]);
        assert_eq!(producer.fill_level(), 6);

        let read = consumer.read_index();
        for i in 0..6 {
            assert_eq!(consumer.sample_at(read.wrapping_add(i)), 0.5);
        }
        consumer.commit_read_index(read.wrapping_add(6));
        assert_eq!(producer.fill_level(), 0);
    }

    #[test]
    fn consumer_commit_drains_fill() {
        let (mut producer, mut consumer) = PlaybackRing::new(16).split();
        producer.push(&[0.0; 10]);
        let read = consumer.read_index();
        consumer.commit_read_index(read.wrapping_add(10));
        assert_eq!(producer.fill_level(), 0);
    }
}
