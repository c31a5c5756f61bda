use sluice_vad::AudioFrame;
use std::collections::VecDeque;

/// Bounded queue of impounded outbound frames. When full, the oldest frame
/// is evicted to admit the newest; the episode is reported once so the
/// caller can count it without log spam.
pub struct Dam {
    frames: VecDeque<AudioFrame>,
    capacity: usize,
    overflowed_this_episode: bool,
}

impl Dam {
    pub fn new(capacity: usize) -> Self {
        Self {
            frames: VecDeque::with_capacity(capacity),
            capacity,
            overflowed_this_episode: false,
        }
    }

    /// Impound a frame. Returns the evicted frame if the dam was full.
    pub fn push(&mut self, frame: AudioFrame) -> Option<AudioFrame> {
        let evicted = if self.frames.len() >= self.capacity {
            if !self.overflowed_this_episode {
                tracing::warn!(
                    "Dam overflow at {} frames; evicting oldest impounded audio",
                    self.capacity
                );
                self.overflowed_this_episode = true;
            }
            self.frames.pop_front()
        } else {
            None
        };
        self.frames.push_back(frame);
        evicted
    }

    /// Release everything as one contiguous burst, oldest first.
    pub fn drain(&mut self) -> Vec<AudioFrame> {
        self.overflowed_this_episode = false;
        self.frames.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn frame(tag: f32) -> AudioFrame {
        AudioFrame::new(vec![tag; 4], Instant::now(), 16_000)
    }

    #[test]
    fn holds_frames_in_arrival_order() {
        let mut dam = Dam::new(600);
        dam.push(frame(1.0));
        dam.push(frame(2.0));
        let burst = dam.drain();
        assert_eq!(burst.len(), 2);
        assert_eq!(burst[0].samples[0], 1.0);
        assert_eq!(burst[1].samples[0], 2.0);
        assert!(dam.is_empty());
    }

    #[test]
    fn overflow_evicts_oldest_and_length_stays_capped() {
        let mut dam = Dam::new(600);
        for i in 0..600 {
            assert!(dam.push(frame(i as f32)).is_none());
        }
        assert_eq!(dam.len(), 600);

        // The 601st frame drops the oldest.
        let evicted = dam.push(frame(600.0)).expect("oldest frame evicted");
        assert_eq!(evicted.samples[0], 0.0);
        assert_eq!(dam.len(), 600);

        let burst = dam.drain();
        assert_eq!(burst.first().unwrap().samples[0], 1.0);
        assert_eq!(burst.last().unwrap().samples[0], 600.0);
    }

    #[test]
    fn drain_clears_the_overflow_episode() {
        let mut dam = Dam::new(2);
        dam.push(frame(0.0));
        dam.push(frame(1.0));
        dam.push(frame(2.0));
        assert!(dam.overflowed_this_episode);
        dam.drain();
        assert!(!dam.overflowed_this_episode);
    }
}
