//! Bounded per-session frame queues.
//!
//! Each delivery loop pulls from its own [`FrameQueue`]; the encoder
//! callback pushes into it without ever blocking. A slow client fills
//! its queue, after which the oldest frame is evicted so the most recent
//! frames survive — freshness over completeness, an accepted lossy-video
//! tradeoff that bounds memory per session.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;

use crate::encoder::EncodedFrame;

/// Default capacity for video frame queues (~2 s at 30 fps).
pub const VIDEO_QUEUE_CAPACITY: usize = 60;
/// Default capacity for audio frame queues.
pub const AUDIO_QUEUE_CAPACITY: usize = 120;

/// Poll timeout used by delivery loops so they observe teardown promptly.
pub const QUEUE_POLL_TIMEOUT: Duration = Duration::from_millis(200);

/// A bounded MPSC frame queue with timed polling.
pub struct FrameQueue {
    inner: Mutex<VecDeque<Arc<EncodedFrame>>>,
    capacity: usize,
    available: Condvar,
}

impl FrameQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            available: Condvar::new(),
        }
    }

    /// Enqueue a frame without blocking. When full, the oldest queued
    /// frame is evicted. Returns `true` if an eviction happened.
    pub fn push(&self, frame: Arc<EncodedFrame>) -> bool {
        let mut q = self.inner.lock();
        let dropped = if q.len() >= self.capacity {
            q.pop_front();
            true
        } else {
            false
        };
        q.push_back(frame);
        drop(q);
        self.available.notify_one();
        dropped
    }

    /// Dequeue the next frame, waiting up to `timeout`.
    pub fn poll(&self, timeout: Duration) -> Option<Arc<EncodedFrame>> {
        let mut q = self.inner.lock();
        if let Some(frame) = q.pop_front() {
            return Some(frame);
        }
        self.available.wait_for(&mut q, timeout);
        q.pop_front()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(n: u64) -> Arc<EncodedFrame> {
        Arc::new(EncodedFrame {
            payload: vec![n as u8],
            time_us: n,
            keyframe: false,
        })
    }

    #[test]
    fn push_then_poll() {
        let q = FrameQueue::new(4);
        assert!(!q.push(frame(1)));
        let f = q.poll(Duration::from_millis(1)).expect("frame");
        assert_eq!(f.time_us, 1);
    }

    #[test]
    fn poll_times_out_when_empty() {
        let q = FrameQueue::new(4);
        assert!(q.poll(Duration::from_millis(10)).is_none());
    }

    #[test]
    fn overflow_keeps_most_recent() {
        let q = FrameQueue::new(60);
        for n in 1..=61 {
            q.push(frame(n));
        }
        assert_eq!(q.len(), 60);
        // Frame 1 was evicted; 2..=61 remain in order.
        let first = q.poll(Duration::from_millis(1)).unwrap();
        assert_eq!(first.time_us, 2);
        let mut last = first;
        while let Some(f) = q.poll(Duration::from_millis(1)) {
            last = f;
        }
        assert_eq!(last.time_us, 61);
    }

    #[test]
    fn queue_never_exceeds_capacity() {
        let q = FrameQueue::new(8);
        for n in 0..100 {
            q.push(frame(n));
            assert!(q.len() <= 8);
        }
    }

    #[test]
    fn push_wakes_waiting_consumer() {
        let q = Arc::new(FrameQueue::new(4));
        let q2 = q.clone();
        let handle = std::thread::spawn(move || q2.poll(Duration::from_secs(2)));
        std::thread::sleep(Duration::from_millis(50));
        q.push(frame(7));
        let got = handle.join().expect("join").expect("frame");
        assert_eq!(got.time_us, 7);
    }
}
