//! Analysis report types shared between the pipeline and its observers.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::human_time;

/// Result of analyzing one ensemble recording file.
///
/// Created once per file by the analysis collaborator, appended to the
/// controller's ordered report list, and never mutated afterwards. The
/// report list is discarded when a new analysis batch begins.
///
/// Two counts coexist because some recordings interleave ensembles in
/// correlated pairs: `ensemble_pair_count` counts those pairs, while
/// `ensemble_count` counts raw ensembles. Exactly one of them drives an
/// export, selected by [`FileReport::effective_ensemble_count`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileReport {
    /// Source file this report describes.
    pub file_path: PathBuf,
    /// Size of the source file in bytes.
    pub file_size_bytes: u64,
    /// Raw ensembles found in the file.
    pub ensemble_count: u64,
    /// Correlated ensemble pairs found in the file; 0 when the recording
    /// is not paired.
    pub ensemble_pair_count: u64,
    /// Time between consecutive ensembles. `None` when the analyzer could
    /// not derive one; export refuses such reports per file.
    pub delta_time: Option<Duration>,
    /// Timestamp of the first ensemble in the recording.
    pub first_ensemble_time: Option<DateTime<Utc>>,
    /// Timestamp of the last ensemble in the recording.
    pub last_ensemble_time: Option<DateTime<Utc>>,
    /// Human-readable one-line summary for list displays.
    pub description: String,
}

impl FileReport {
    /// Placeholder report recorded when a file's analysis fails, keeping
    /// the report list the same length as the input file list. Its zero
    /// effective count excludes the file from export.
    pub fn empty(path: &Path) -> Self {
        Self {
            file_path: path.to_path_buf(),
            file_size_bytes: 0,
            ensemble_count: 0,
            ensemble_pair_count: 0,
            delta_time: None,
            first_ensemble_time: None,
            last_ensemble_time: None,
            description: format!("{}: no usable ensembles", path.display()),
        }
    }

    /// The count that drives an export: the pair count when the recording
    /// is paired, otherwise the raw ensemble count.
    pub fn effective_ensemble_count(&self) -> u64 {
        if self.ensemble_pair_count > 0 {
            self.ensemble_pair_count
        } else {
            self.ensemble_count
        }
    }

    /// Whether the file qualifies for export at all.
    pub fn is_exportable(&self) -> bool {
        self.effective_ensemble_count() > 0
    }

    /// Ensemble range an export of this file covers.
    pub fn export_range(&self) -> EnsembleRange {
        EnsembleRange {
            start: 0,
            end: self.effective_ensemble_count(),
        }
    }

    /// Wall-clock span covered by the recording, when both endpoint
    /// timestamps are known and ordered.
    pub fn time_span(&self) -> Option<Duration> {
        let first = self.first_ensemble_time?;
        let last = self.last_ensemble_time?;
        last.signed_duration_since(first).to_std().ok()
    }

    /// Build a one-line summary from the analyzed fields. Analyzers that
    /// produce their own description can ignore this.
    pub fn describe(&self) -> String {
        let span = self
            .time_span()
            .map(|d| human_time::format_hms(d.as_secs()))
            .unwrap_or_else(|| "unknown span".to_string());
        let delta = self
            .delta_time
            .map(human_time::format_delta)
            .unwrap_or_else(|| "unknown delta".to_string());

        if self.ensemble_pair_count > 0 {
            format!(
                "{}: {} ensembles ({} pairs), span {}, delta {}",
                self.file_path.display(),
                self.ensemble_count,
                self.ensemble_pair_count,
                span,
                delta
            )
        } else {
            format!(
                "{}: {} ensembles, span {}, delta {}",
                self.file_path.display(),
                self.ensemble_count,
                span,
                delta
            )
        }
    }
}

/// Half-open range of ensembles to export, derived from a [`FileReport`]
/// at export time and never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnsembleRange {
    pub start: u64,
    pub end: u64,
}

impl EnsembleRange {
    /// Number of ensembles the range covers.
    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn report(count: u64, pairs: u64) -> FileReport {
        FileReport {
            file_path: PathBuf::from("deploy_01.ens"),
            file_size_bytes: 4_096,
            ensemble_count: count,
            ensemble_pair_count: pairs,
            delta_time: Some(Duration::from_secs(1)),
            first_ensemble_time: Some(Utc.with_ymd_and_hms(2023, 3, 1, 12, 0, 0).unwrap()),
            last_ensemble_time: Some(Utc.with_ymd_and_hms(2023, 3, 1, 14, 5, 0).unwrap()),
            description: String::new(),
        }
    }

    #[test]
    fn pair_count_wins_when_positive() {
        assert_eq!(report(500, 120).effective_ensemble_count(), 120);
    }

    #[test]
    fn raw_count_is_the_fallback() {
        assert_eq!(report(500, 0).effective_ensemble_count(), 500);
    }

    #[test]
    fn export_range_starts_at_zero() {
        assert_eq!(report(500, 0).export_range(), EnsembleRange { start: 0, end: 500 });
        assert_eq!(report(500, 120).export_range(), EnsembleRange { start: 0, end: 120 });
    }

    #[test]
    fn zero_counts_are_not_exportable() {
        assert!(!report(0, 0).is_exportable());
        assert!(report(1, 0).is_exportable());
    }

    #[test]
    fn empty_report_matches_failed_analysis() {
        let empty = FileReport::empty(Path::new("bad.ens"));
        assert_eq!(empty.effective_ensemble_count(), 0);
        assert!(!empty.is_exportable());
        assert!(empty.description.contains("bad.ens"));
    }

    #[test]
    fn time_span_requires_both_endpoints() {
        let mut r = report(10, 0);
        assert_eq!(r.time_span(), Some(Duration::from_secs(7_500)));
        r.last_ensemble_time = None;
        assert_eq!(r.time_span(), None);
    }

    #[test]
    fn describe_mentions_pairs_only_when_paired() {
        let paired = report(500, 120).describe();
        assert!(paired.contains("120 pairs"));
        assert!(paired.contains("2:05:00"));

        let unpaired = report(500, 0).describe();
        assert!(!unpaired.contains("pairs"));
    }

    #[test]
    fn range_len_saturates() {
        let range = EnsembleRange { start: 10, end: 4 };
        assert_eq!(range.len(), 0);
        assert!(range.is_empty());
    }
}
