use crate::{BlobError, BlobResult};

/// A single unit (file or blob key) that failed inside a batch
#[derive(Debug)]
pub struct BatchFailure {
    /// Local path or blob key the failure belongs to
    pub unit: String,
    pub error: BlobError,
}

/// Outcome of a tree-scale operation.
///
/// Batches are best-effort: every unit is attempted, nothing is rolled back,
/// and every failure is kept so the caller can decide whether partial
/// success is acceptable.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub succeeded: usize,
    /// Units left untouched on purpose (e.g. existing keys in skip mode)
    pub skipped: usize,
    /// Failures ordered by unit name
    pub failures: Vec<BatchFailure>,
}

/// Per-unit outcome fed into [`BatchReport::collect`]
#[derive(Debug)]
pub(crate) enum UnitOutcome {
    Done,
    Skipped,
    Failed(BatchFailure),
}

impl BatchReport {
    /// An empty report
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a report from per-unit outcomes
    pub(crate) fn collect<I>(outcomes: I) -> Self
    where
        I: IntoIterator<Item = UnitOutcome>,
    {
        let mut report = Self::new();
        for outcome in outcomes {
            match outcome {
                UnitOutcome::Done => report.succeeded += 1,
                UnitOutcome::Skipped => report.skipped += 1,
                UnitOutcome::Failed(failure) => report.failures.push(failure),
            }
        }
        report.failures.sort_by(|a, b| a.unit.cmp(&b.unit));
        report
    }

    /// Number of units attempted
    pub fn total(&self) -> usize {
        self.succeeded + self.skipped + self.failures.len()
    }

    /// True when no unit failed
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Units that failed, in report order
    pub fn failed_units(&self) -> impl Iterator<Item = &str> {
        self.failures.iter().map(|f| f.unit.as_str())
    }

    /// Turn any failure into an error, keeping the full failure set
    pub fn into_result(self) -> BlobResult<Self> {
        if self.failures.is_empty() {
            return Ok(self);
        }
        Err(BlobError::Batch {
            total: self.total(),
            failures: self.failures,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failed(unit: &str) -> UnitOutcome {
        UnitOutcome::Failed(BatchFailure {
            unit: unit.to_string(),
            error: BlobError::not_found(unit),
        })
    }

    #[test]
    fn test_collect_counts_and_orders_failures() {
        let report = BatchReport::collect(vec![
            UnitOutcome::Done,
            failed("b/2.png"),
            UnitOutcome::Skipped,
            failed("a/1.png"),
            UnitOutcome::Done,
        ]);

        assert_eq!(report.succeeded, 2);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.total(), 5);
        assert_eq!(report.failed_units().collect::<Vec<_>>(), vec!["a/1.png", "b/2.png"]);
    }

    #[test]
    fn test_into_result_keeps_every_failure() {
        let report = BatchReport::collect(vec![UnitOutcome::Done, failed("x"), failed("y")]);

        match report.into_result() {
            Err(BlobError::Batch { total, failures }) => {
                assert_eq!(total, 3);
                assert_eq!(failures.len(), 2);
            }
            other => panic!("expected batch error, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_report_is_complete() {
        let report = BatchReport::new();
        assert!(report.is_complete());
        assert!(report.into_result().is_ok());
    }
}
