//! Thread-safe event buffer with threshold-triggered draining.
//!
//! The buffer is the single shared mutable resource of the pipeline. All
//! appends and drains happen under one mutex; the threshold check and the
//! drain it triggers share a critical section, so two racing writers can
//! never both observe "size ≥ threshold" and double-flush the same events.
//! Network I/O never happens under this lock — the drained batch is handed
//! out and shipped after release.

use std::sync::Mutex;

use crate::event::TelemetryEvent;

/// An ordered buffer of pending telemetry events.
pub struct EventBuffer {
    events: Mutex<Vec<TelemetryEvent>>,
    threshold: usize,
}

impl EventBuffer {
    /// Create a buffer that drains itself when `threshold` events accumulate.
    pub fn new(threshold: usize) -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            threshold: threshold.max(1),
        }
    }

    /// Append an event. If the post-append size reaches the threshold, the
    /// entire contents are drained inside the same critical section and
    /// returned for flushing; the buffer is empty afterwards.
    pub fn record(&self, event: TelemetryEvent) -> Option<Vec<TelemetryEvent>> {
        let mut events = self.events.lock().unwrap();
        events.push(event);
        if events.len() >= self.threshold {
            Some(std::mem::take(&mut *events))
        } else {
            None
        }
    }

    /// Unconditionally drain-and-clear the buffer (time-triggered flushes
    /// and shutdown). Atomic with respect to concurrent `record` calls.
    pub fn drain(&self) -> Vec<TelemetryEvent> {
        let mut events = self.events.lock().unwrap();
        std::mem::take(&mut *events)
    }

    /// Number of buffered events.
    pub fn len(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    /// Whether the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The configured flush threshold.
    pub fn threshold(&self) -> usize {
        self.threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventBuilder;
    use crate::pricing::PricingTable;
    use std::collections::HashSet;
    use std::sync::Arc;

    fn event(model: &str) -> TelemetryEvent {
        EventBuilder::begin("chat.completions", model).success(None, &PricingTable::empty())
    }

    #[test]
    fn below_threshold_accumulates() {
        let buffer = EventBuffer::new(10);
        for _ in 0..9 {
            assert!(buffer.record(event("gpt-4o")).is_none());
        }
        assert_eq!(buffer.len(), 9);
    }

    #[test]
    fn tenth_event_drains_exactly_ten() {
        let buffer = EventBuffer::new(10);
        for _ in 0..9 {
            assert!(buffer.record(event("gpt-4o")).is_none());
        }
        let batch = buffer.record(event("gpt-4o")).expect("threshold flush");
        assert_eq!(batch.len(), 10);
        assert!(buffer.is_empty());
    }

    #[test]
    fn drain_clears_and_preserves_order() {
        let buffer = EventBuffer::new(100);
        let a = event("model-a");
        let b = event("model-b");
        let id_a = a.request_id.clone();
        let id_b = b.request_id.clone();

        buffer.record(a);
        buffer.record(b);
        let drained = buffer.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].request_id, id_a);
        assert_eq!(drained[1].request_id, id_b);
        assert!(buffer.is_empty());

        assert!(buffer.drain().is_empty());
    }

    #[test]
    fn zero_threshold_clamps_to_one() {
        let buffer = EventBuffer::new(0);
        assert_eq!(buffer.threshold(), 1);
        let batch = buffer.record(event("gpt-4o")).expect("immediate flush");
        assert_eq!(batch.len(), 1);
    }

    #[test]
    fn concurrent_records_lose_nothing() {
        // Property: N concurrent recorded events end up distributed across
        // drained batches and the final buffer with no loss and no
        // duplicates, under any interleaving.
        const WRITERS: usize = 8;
        const PER_WRITER: usize = 250;

        let buffer = Arc::new(EventBuffer::new(7));
        let mut handles = Vec::new();
        for _ in 0..WRITERS {
            let buffer = Arc::clone(&buffer);
            handles.push(std::thread::spawn(move || {
                let mut flushed = Vec::new();
                for _ in 0..PER_WRITER {
                    if let Some(batch) = buffer.record(event("gpt-4o")) {
                        flushed.extend(batch);
                    }
                }
                flushed
            }));
        }

        let mut seen: HashSet<String> = HashSet::new();
        let mut total = 0usize;
        for handle in handles {
            for ev in handle.join().unwrap() {
                assert!(seen.insert(ev.request_id.clone()), "duplicate event");
                total += 1;
            }
        }
        for ev in buffer.drain() {
            assert!(seen.insert(ev.request_id.clone()), "duplicate event");
            total += 1;
        }

        assert_eq!(total, WRITERS * PER_WRITER);
    }

    #[test]
    fn drain_is_atomic_with_respect_to_records() {
        // A record racing a drain lands wholly in the drained batch or
        // wholly in the post-drain buffer — never split, never duplicated.
        const EVENTS: usize = 1000;

        let buffer = Arc::new(EventBuffer::new(usize::MAX));
        let writer = {
            let buffer = Arc::clone(&buffer);
            std::thread::spawn(move || {
                for _ in 0..EVENTS {
                    buffer.record(event("gpt-4o"));
                }
            })
        };

        let mut collected = Vec::new();
        while collected.len() < EVENTS {
            collected.extend(buffer.drain());
            if writer.is_finished() {
                collected.extend(buffer.drain());
                break;
            }
        }
        writer.join().unwrap();
        collected.extend(buffer.drain());

        let unique: HashSet<&str> = collected.iter().map(|e| e.request_id.as_str()).collect();
        assert_eq!(collected.len(), EVENTS);
        assert_eq!(unique.len(), EVENTS);
    }
}
