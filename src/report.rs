//! Batch-level aggregation of results and errors.
//!
//! A [`BatchReport`] keeps two independent lists: `results` holds one line
//! per processed entry or unit whatever its outcome, `errors` holds only the
//! failures.  Nothing in a batch stops on a failure; every unit is attempted
//! and contributes its lines here.

use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    /// Units (manifests or folders) attempted.
    pub attempted: usize,
    pub results:   Vec<String>,
    pub errors:    Vec<String>,
}

impl BatchReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_pass<S: Into<String>>(&mut self, message: S) {
        self.results.push(message.into());
    }

    /// A failure is both a result line and an error.
    pub fn record_failure<S: Into<String>>(&mut self, message: S) {
        let message = message.into();
        self.results.push(message.clone());
        self.errors.push(message);
    }

    /// Append everything from `other`, preserving order.
    pub fn merge(&mut self, other: BatchReport) {
        self.attempted += other.attempted;
        self.results.extend(other.results);
        self.errors.extend(other.errors);
    }

    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// One-line verdict: `No errors occurred` or `Errors: N`.
    pub fn summary(&self) -> String {
        if self.is_clean() {
            "No errors occurred".to_owned()
        } else {
            format!("Errors: {}", self.errors.len())
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl FromIterator<BatchReport> for BatchReport {
    fn from_iter<I: IntoIterator<Item = BatchReport>>(iter: I) -> Self {
        let mut out = BatchReport::new();
        for r in iter {
            out.merge(r);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failures_land_in_both_lists() {
        let mut r = BatchReport::new();
        r.record_pass("a passed.");
        r.record_failure("b failed");
        assert_eq!(r.results, vec!["a passed.", "b failed"]);
        assert_eq!(r.errors, vec!["b failed"]);
        assert_eq!(r.summary(), "Errors: 1");
    }

    #[test]
    fn merge_and_collect() {
        let mut a = BatchReport { attempted: 1, ..Default::default() };
        a.record_pass("ok");
        let mut b = BatchReport { attempted: 2, ..Default::default() };
        b.record_failure("bad");
        let all: BatchReport = vec![a, b].into_iter().collect();
        assert_eq!(all.attempted, 3);
        assert_eq!(all.results.len(), 2);
        assert_eq!(all.error_count(), 1);
        assert!(!all.is_clean());

        assert_eq!(BatchReport::new().summary(), "No errors occurred");
    }

    #[test]
    fn json_shape() {
        let mut r = BatchReport::new();
        r.record_failure("x");
        let v: serde_json::Value = serde_json::from_str(&r.to_json().unwrap()).unwrap();
        assert_eq!(v["errors"][0], "x");
        assert_eq!(v["attempted"], 0);
    }
}
