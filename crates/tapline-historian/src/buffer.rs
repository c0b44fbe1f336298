// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! In-memory record buffer between delivery and flush.
//!
//! The buffer sits on the hot path: the subscription callback appends
//! on the transport's delivery task while the flush worker drains on
//! its own. Both sides go through the same mutex, and `drain` swaps
//! the whole vector out so the sink write that follows never happens
//! under the lock.
//!
//! # Features
//!
//! - **O(1) length**: an atomic counter backs `len()` / `is_empty()`,
//!   so status surfaces never take the lock
//! - **Arrival order**: records come out of `drain` in append order
//! - **No persistence**: contents are lost when the buffer is dropped

use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

use tapline_core::types::ChangeRecord;

// =============================================================================
// RecordBuffer
// =============================================================================

/// Accumulates change records until the next flush.
///
/// # Thread Safety
///
/// `Send + Sync`; the vector is protected by a `parking_lot::Mutex`
/// and the length counter is atomic. The counter is updated inside the
/// critical section, so it never disagrees with the vector for longer
/// than a lock handover.
#[derive(Debug, Default)]
pub struct RecordBuffer {
    records: Mutex<Vec<ChangeRecord>>,
    len: AtomicUsize,
}

impl RecordBuffer {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one record.
    pub fn append(&self, record: ChangeRecord) {
        let mut records = self.records.lock();
        records.push(record);
        self.len.store(records.len(), Ordering::Relaxed);
    }

    /// Appends a batch of records, preserving their order.
    pub fn append_many(&self, batch: Vec<ChangeRecord>) {
        if batch.is_empty() {
            return;
        }
        let mut records = self.records.lock();
        records.extend(batch);
        self.len.store(records.len(), Ordering::Relaxed);
    }

    /// Takes everything buffered so far, leaving the buffer empty.
    ///
    /// The swap happens under the lock; processing the returned batch
    /// does not block concurrent appends.
    pub fn drain(&self) -> Vec<ChangeRecord> {
        let mut records = self.records.lock();
        self.len.store(0, Ordering::Relaxed);
        std::mem::take(&mut *records)
    }

    /// Returns the number of buffered records in O(1) time.
    #[inline]
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed)
    }

    /// Returns `true` if nothing is buffered, in O(1) time.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tapline_core::types::TagValue;

    fn record(node: &str, value: i64) -> ChangeRecord {
        ChangeRecord::new(node, TagValue::Int(value))
    }

    #[test]
    fn test_append_and_drain() {
        let buffer = RecordBuffer::new();
        assert!(buffer.is_empty());

        buffer.append(record("n1", 1));
        buffer.append(record("n1", 2));
        assert_eq!(buffer.len(), 2);

        let drained = buffer.drain();
        assert_eq!(drained.len(), 2);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_drain_preserves_arrival_order() {
        let buffer = RecordBuffer::new();
        for i in 0..5 {
            buffer.append(record("n1", i));
        }

        let drained = buffer.drain();
        let values: Vec<_> = drained.iter().map(|r| r.value.clone()).collect();
        assert_eq!(
            values,
            (0..5).map(TagValue::Int).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_drain_empty_buffer() {
        let buffer = RecordBuffer::new();
        assert!(buffer.drain().is_empty());
        assert_eq!(buffer.len(), 0);
    }

    #[test]
    fn test_append_many() {
        let buffer = RecordBuffer::new();
        buffer.append_many(vec![record("n1", 1), record("n2", 2)]);
        assert_eq!(buffer.len(), 2);

        buffer.append_many(Vec::new());
        assert_eq!(buffer.len(), 2);
    }

    #[test]
    fn test_appends_after_drain_start_fresh() {
        let buffer = RecordBuffer::new();
        buffer.append(record("n1", 1));
        buffer.drain();

        buffer.append(record("n2", 2));
        let drained = buffer.drain();
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].node_id, "n2");
    }

    #[test]
    fn test_concurrent_appends() {
        use std::sync::Arc;

        let buffer = Arc::new(RecordBuffer::new());
        let mut handles = Vec::new();

        for t in 0..8 {
            let buffer = Arc::clone(&buffer);
            handles.push(std::thread::spawn(move || {
                for i in 0..100 {
                    buffer.append(record("n1", (t * 100 + i) as i64));
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(buffer.len(), 800);
        assert_eq!(buffer.drain().len(), 800);
    }
}
