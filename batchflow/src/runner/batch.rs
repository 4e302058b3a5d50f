//! The per-cycle batch passed from stage to stage.

use crate::core::{ErrorRecord, Record};

/// One batch cycle's worth of records.
///
/// Created fresh for every cycle and dropped once the last stage has seen
/// it. Stages only ever borrow it for the duration of their `process` call.
#[derive(Debug, Clone)]
pub struct PipeBatch {
    /// Sequence number of this batch within the run, starting at 1.
    batch_number: u64,
    /// Offset committed before this batch was created.
    previous_offset: Option<String>,
    /// Offset to commit once the batch completes.
    new_offset: Option<String>,
    /// Set by the source when it has no more data after this batch.
    end_of_data: bool,
    /// Maximum records a source should add.
    batch_size: usize,
    /// Records in dataflow order.
    records: Vec<Record>,
    /// Records diverted by stages.
    error_records: Vec<ErrorRecord>,
}

impl PipeBatch {
    /// Creates a batch seeded with the tracker's current offset.
    ///
    /// The new offset starts out equal to the previous one, so a batch whose
    /// source makes no progress commits the same position again.
    #[must_use]
    pub fn new(previous_offset: Option<String>, batch_size: usize, batch_number: u64) -> Self {
        Self {
            batch_number,
            new_offset: previous_offset.clone(),
            previous_offset,
            end_of_data: false,
            batch_size: batch_size.max(1),
            records: Vec::new(),
            error_records: Vec::new(),
        }
    }

    /// Returns the batch sequence number.
    #[must_use]
    pub fn batch_number(&self) -> u64 {
        self.batch_number
    }

    /// Returns the offset this batch was seeded with.
    #[must_use]
    pub fn previous_offset(&self) -> Option<&str> {
        self.previous_offset.as_deref()
    }

    /// Returns the offset that will be committed for this batch.
    #[must_use]
    pub fn new_offset(&self) -> Option<&str> {
        self.new_offset.as_deref()
    }

    /// Records the source's position after this batch.
    pub fn set_new_offset(&mut self, offset: impl Into<String>) {
        self.new_offset = Some(offset.into());
    }

    /// Marks the source as exhausted once this batch commits.
    pub fn mark_end_of_data(&mut self) {
        self.end_of_data = true;
    }

    /// Returns true if the source reported it has no more data.
    #[must_use]
    pub fn is_end_of_data(&self) -> bool {
        self.end_of_data
    }

    /// Returns the batch size hint.
    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Returns how many more records a source may add.
    #[must_use]
    pub fn remaining_capacity(&self) -> usize {
        self.batch_size.saturating_sub(self.records.len())
    }

    /// Returns the records.
    #[must_use]
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Returns the records for in-place modification.
    pub fn records_mut(&mut self) -> &mut Vec<Record> {
        &mut self.records
    }

    /// Appends a record.
    pub fn add_record(&mut self, record: Record) {
        self.records.push(record);
    }

    /// Keeps only the records matching the predicate.
    pub fn retain_records<F>(&mut self, predicate: F)
    where
        F: FnMut(&Record) -> bool,
    {
        self.records.retain(predicate);
    }

    /// Moves the record at `index` to the error list.
    ///
    /// Returns false if the index is out of range.
    pub fn to_error(&mut self, index: usize, stage: &str, reason: impl Into<String>) -> bool {
        if index >= self.records.len() {
            return false;
        }
        let record = self.records.remove(index);
        self.error_records.push(ErrorRecord {
            record,
            stage: stage.to_string(),
            reason: reason.into(),
        });
        true
    }

    /// Returns the records diverted so far.
    #[must_use]
    pub fn error_records(&self) -> &[ErrorRecord] {
        &self.error_records
    }

    /// Consumes the batch into the values needed at the commit point.
    pub(crate) fn into_commit(self) -> (Option<String>, bool) {
        (self.new_offset, self.end_of_data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn batch_with(values: &[i64]) -> PipeBatch {
        let mut batch = PipeBatch::new(Some("10".to_string()), 5, 4);
        for v in values {
            batch.add_record(Record::new(json!(v)));
        }
        batch
    }

    #[test]
    fn test_new_batch_inherits_offset() {
        let batch = PipeBatch::new(Some("10".to_string()), 5, 4);

        assert_eq!(batch.batch_number(), 4);
        assert_eq!(batch.previous_offset(), Some("10"));
        assert_eq!(batch.new_offset(), Some("10"));
        assert!(!batch.is_end_of_data());
        assert_eq!(batch.remaining_capacity(), 5);
    }

    #[test]
    fn test_zero_batch_size_clamped() {
        let batch = PipeBatch::new(None, 0, 1);
        assert_eq!(batch.batch_size(), 1);
    }

    #[test]
    fn test_source_advances_offset() {
        let mut batch = batch_with(&[1, 2]);
        batch.set_new_offset("12");
        batch.mark_end_of_data();

        assert_eq!(batch.previous_offset(), Some("10"));
        assert_eq!(batch.remaining_capacity(), 3);
        assert_eq!(batch.into_commit(), (Some("12".to_string()), true));
    }

    #[test]
    fn test_retain_and_divert_records() {
        let mut batch = batch_with(&[1, 2, 3, 4]);
        batch.retain_records(|r| r.value != json!(2));
        assert!(batch.to_error(0, "validator", "odd value"));
        assert!(!batch.to_error(10, "validator", "out of range"));

        let values: Vec<_> = batch.records().iter().map(|r| r.value.clone()).collect();
        assert_eq!(values, vec![json!(3), json!(4)]);
        assert_eq!(batch.error_records().len(), 1);
        assert_eq!(batch.error_records()[0].record.value, json!(1));
        assert_eq!(batch.error_records()[0].stage, "validator");
    }
}
