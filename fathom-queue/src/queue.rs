// fathom-queue/src/queue.rs
// ============================================================================
// Module: Fathom Bounded Queue
// Description: Fixed-capacity, concurrency-safe channel of events.
// Purpose: Decouple emission from export; never block the hot path on
//          I/O or locks held across system calls (`spec.md` §4.5).
// Dependencies: fathom-core, std::sync::mpsc
// ============================================================================

//! ## Overview
//! Wraps a [`std::sync::mpsc::sync_channel`]. [`BoundedQueue::try_submit`]
//! is the default, non-blocking submission mode used for every event
//! type; [`BoundedQueue::submit_bounded_wait`] is reserved for `run_end`
//! when `block_on_run_end` is set, and waits up to a caller-supplied
//! deadline for capacity before giving up.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::mpsc;
use std::time::Duration;
use std::time::Instant;

use fathom_core::core::event::Event;

/// How long [`QueueProducer::submit_bounded_wait`] sleeps between
/// retries while waiting for capacity.
const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Producer side of the bounded queue.
#[derive(Clone)]
pub struct QueueProducer {
    sender: mpsc::SyncSender<Event>,
    closed: Arc<AtomicBool>,
}

impl QueueProducer {
    /// Attempts to enqueue `event` without waiting. Returns `false` if
    /// the queue was full, closed, or the worker has shut down; the
    /// caller must increment the relevant drop counter in that case.
    pub fn try_submit(&self, event: Event) -> bool {
        if self.closed.load(Ordering::Acquire) {
            return false;
        }
        self.sender.try_send(event).is_ok()
    }

    /// Attempts to enqueue `event`, retrying until `timeout` elapses.
    /// Returns `false` if capacity never freed up within the deadline.
    /// Reserved for `run_end` submissions under `block_on_run_end`
    /// (`spec.md` §4.5).
    pub fn submit_bounded_wait(&self, mut event: Event, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.closed.load(Ordering::Acquire) {
                return false;
            }
            match self.sender.try_send(event) {
                Ok(()) => return true,
                Err(mpsc::TrySendError::Disconnected(_)) => return false,
                Err(mpsc::TrySendError::Full(rejected)) => {
                    event = rejected;
                    if Instant::now() >= deadline {
                        return false;
                    }
                    std::thread::sleep(POLL_INTERVAL);
                }
            }
        }
    }

    /// Marks the queue closed: every subsequent submission is rejected
    /// without touching the channel. Called once, at the start of
    /// shutdown, so "stop accepting new events" and "drain what is
    /// already queued" are distinct steps (`spec.md` §4.6).
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

/// Consumer side of the bounded queue, owned by the worker thread.
pub struct QueueConsumer {
    receiver: mpsc::Receiver<Event>,
}

impl QueueConsumer {
    /// Blocks until at least one event is available or the queue is
    /// closed, then returns it.
    pub fn recv(&self) -> Option<Event> {
        self.receiver.recv().ok()
    }

    /// Blocks for at most `timeout` waiting for an event.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<Event> {
        self.receiver.recv_timeout(timeout).ok()
    }

    /// Drains every currently-buffered event without blocking.
    pub fn drain_available(&self) -> Vec<Event> {
        let mut drained = Vec::new();
        while let Ok(event) = self.receiver.try_recv() {
            drained.push(event);
        }
        drained
    }
}

/// Creates a bounded queue of the given capacity.
#[must_use]
pub fn bounded_queue(capacity: usize) -> (QueueProducer, QueueConsumer) {
    let (sender, receiver) = mpsc::sync_channel(capacity.max(1));
    let closed = Arc::new(AtomicBool::new(false));
    (QueueProducer { sender, closed }, QueueConsumer { receiver })
}

#[cfg(test)]
mod tests {
    use super::bounded_queue;
    use fathom_core::core::event::Envelope;
    use fathom_core::core::event::Event;
    use fathom_core::core::event::EventPayload;
    use fathom_core::core::event::EventStatus;
    use fathom_core::core::event::MetadataMap;
    use fathom_core::core::identifiers::RunId;
    use std::time::Duration;

    fn sample_event() -> Event {
        Event {
            envelope: Envelope {
                event_id: 0,
                run_id: RunId::new(),
                parent_event_id: None,
                timestamp_ms: 0,
                duration_ms: None,
                status: EventStatus::Ok,
                metadata: MetadataMap::new(),
            },
            payload: EventPayload::FinalAnswer {
                answer: "ok".to_owned(),
            },
        }
    }

    #[test]
    fn full_queue_rejects_non_blocking_submission() {
        let (producer, _consumer) = bounded_queue(1);
        assert!(producer.try_submit(sample_event()));
        assert!(!producer.try_submit(sample_event()));
    }

    #[test]
    fn bounded_wait_succeeds_once_capacity_frees_up() {
        let (producer, consumer) = bounded_queue(1);
        assert!(producer.try_submit(sample_event()));
        let waiting_producer = producer.clone();
        let handle = std::thread::spawn(move || {
            waiting_producer.submit_bounded_wait(sample_event(), Duration::from_millis(200))
        });
        std::thread::sleep(Duration::from_millis(10));
        assert!(consumer.recv().is_some());
        assert!(handle.join().expect("joins"));
    }

    #[test]
    fn bounded_wait_gives_up_after_timeout() {
        let (producer, _consumer) = bounded_queue(1);
        assert!(producer.try_submit(sample_event()));
        assert!(!producer.submit_bounded_wait(sample_event(), Duration::from_millis(20)));
    }

    #[test]
    fn closed_queue_rejects_every_submission_mode() {
        let (producer, _consumer) = bounded_queue(4);
        producer.close();
        assert!(!producer.try_submit(sample_event()));
        assert!(!producer.submit_bounded_wait(sample_event(), Duration::from_millis(20)));
    }
}
