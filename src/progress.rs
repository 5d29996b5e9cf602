//! Progress tracking over scored snapshots.
//!
//! Pure aggregation: callers hand in `SnapshotRecord`s (however they store them)
//! and get per-project series and per-user totals back. Lighting is metadata
//! only and never influences a score.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum ProgressError {
    #[error("Invalid score {0}: must be a finite value in [0, 1]")]
    InvalidScore(f64),
}

// ── Lighting ───────────────────────────────────────────────────────────────

/// Lux below which a snapshot is flagged as too dark.
pub const TOO_DARK_LUX: f64 = 50.0;

/// Lux above which lighting counts as bright.
pub const BRIGHT_LUX: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LightingCondition {
    TooDark,
    Dim,
    Bright,
    Unknown,
}

impl LightingCondition {
    pub fn from_lux(lux: f64) -> Self {
        if !lux.is_finite() || lux < 0.0 {
            Self::Unknown
        } else if lux < TOO_DARK_LUX {
            Self::TooDark
        } else if lux <= BRIGHT_LUX {
            Self::Dim
        } else {
            Self::Bright
        }
    }

    /// User-facing hint shown next to a snapshot, if any.
    pub fn warning(&self) -> Option<&'static str> {
        match self {
            Self::TooDark => Some("Lighting is too dark. This may affect your score."),
            _ => None,
        }
    }
}

// ── Records ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    pub id: Uuid,
    pub project_id: Uuid,
    pub score: f64,
    pub luminosity: Option<f64>,
    pub captured_at: DateTime<Utc>,
}

impl SnapshotRecord {
    pub fn new(
        id: Uuid,
        project_id: Uuid,
        score: f64,
        luminosity: Option<f64>,
        captured_at: DateTime<Utc>,
    ) -> Result<Self, ProgressError> {
        if !score.is_finite() || !(0.0..=1.0).contains(&score) {
            return Err(ProgressError::InvalidScore(score));
        }
        Ok(Self {
            id,
            project_id,
            score,
            luminosity,
            captured_at,
        })
    }

    pub fn lighting(&self) -> LightingCondition {
        self.luminosity
            .map(LightingCondition::from_lux)
            .unwrap_or(LightingCondition::Unknown)
    }
}

// ── Aggregates ─────────────────────────────────────────────────────────────

/// One project's snapshots, oldest first.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectProgress {
    pub project_id: Uuid,
    pub records: Vec<SnapshotRecord>,
}

impl ProjectProgress {
    /// Keeps only records belonging to `project_id` and sorts them chronologically.
    pub fn from_records(project_id: Uuid, records: Vec<SnapshotRecord>) -> Self {
        let mut records: Vec<SnapshotRecord> = records
            .into_iter()
            .filter(|r| r.project_id == project_id)
            .collect();
        records.sort_by_key(|r| r.captured_at);
        Self {
            project_id,
            records,
        }
    }

    pub fn snapshot_count(&self) -> usize {
        self.records.len()
    }

    /// Scores in capture order, ready for a progress chart.
    pub fn score_series(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.score).collect()
    }

    pub fn best_score(&self) -> Option<f64> {
        self.records.iter().map(|r| r.score).reduce(f64::max)
    }

    pub fn latest_score(&self) -> Option<f64> {
        self.records.last().map(|r| r.score)
    }

    /// Latest minus first. `None` with fewer than two snapshots.
    pub fn improvement(&self) -> Option<f64> {
        match (self.records.first(), self.records.last()) {
            (Some(first), Some(last)) if self.records.len() >= 2 => Some(last.score - first.score),
            _ => None,
        }
    }

    pub fn average_score(&self) -> Option<f64> {
        if self.records.is_empty() {
            return None;
        }
        Some(self.score_sum() / self.records.len() as f64)
    }

    pub fn too_dark_count(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.lighting() == LightingCondition::TooDark)
            .count()
    }

    fn score_sum(&self) -> f64 {
        self.records.iter().map(|r| r.score).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserStats {
    pub total_projects: usize,
    pub total_snapshots: usize,
    pub average_score: f64,
}

impl UserStats {
    pub fn from_projects(projects: &[ProjectProgress]) -> Self {
        let total_snapshots: usize = projects.iter().map(|p| p.snapshot_count()).sum();
        let sum: f64 = projects.iter().map(|p| p.score_sum()).sum();
        let average_score = if total_snapshots == 0 {
            0.0
        } else {
            sum / total_snapshots as f64
        };
        Self {
            total_projects: projects.len(),
            total_snapshots,
            average_score,
        }
    }

    pub fn average_score_display(&self) -> String {
        format!("{:.2}", self.average_score)
    }
}

// ═══════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    fn at(day: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap() + Duration::days(day)
    }

    fn record(project: Uuid, score: f64, lux: Option<f64>, day: i64) -> SnapshotRecord {
        SnapshotRecord::new(Uuid::new_v4(), project, score, lux, at(day)).unwrap()
    }

    #[test]
    fn lighting_thresholds() {
        assert_eq!(LightingCondition::from_lux(0.0), LightingCondition::TooDark);
        assert_eq!(LightingCondition::from_lux(49.9), LightingCondition::TooDark);
        assert_eq!(LightingCondition::from_lux(50.0), LightingCondition::Dim);
        assert_eq!(LightingCondition::from_lux(100.0), LightingCondition::Dim);
        assert_eq!(LightingCondition::from_lux(100.1), LightingCondition::Bright);
        assert_eq!(LightingCondition::from_lux(-1.0), LightingCondition::Unknown);
        assert_eq!(LightingCondition::from_lux(f64::NAN), LightingCondition::Unknown);
    }

    #[test]
    fn only_too_dark_warns() {
        assert!(LightingCondition::TooDark.warning().is_some());
        assert!(LightingCondition::Dim.warning().is_none());
        assert!(LightingCondition::Bright.warning().is_none());
    }

    #[test]
    fn record_rejects_out_of_range_scores() {
        let p = Uuid::new_v4();
        for bad in [-0.01, 1.01, f64::NAN, f64::INFINITY] {
            let result = SnapshotRecord::new(Uuid::new_v4(), p, bad, None, at(0));
            assert!(matches!(result, Err(ProgressError::InvalidScore(_))), "{bad}");
        }
        assert!(SnapshotRecord::new(Uuid::new_v4(), p, 0.0, None, at(0)).is_ok());
        assert!(SnapshotRecord::new(Uuid::new_v4(), p, 1.0, None, at(0)).is_ok());
    }

    #[test]
    fn record_without_luminosity_is_unknown() {
        let r = record(Uuid::new_v4(), 0.5, None, 0);
        assert_eq!(r.lighting(), LightingCondition::Unknown);
    }

    #[test]
    fn progress_sorted_oldest_first() {
        let p = Uuid::new_v4();
        let records = vec![
            record(p, 0.9, Some(300.0), 5),
            record(p, 0.5, Some(300.0), 1),
            record(p, 0.7, Some(20.0), 3),
        ];
        let progress = ProjectProgress::from_records(p, records);

        assert_eq!(progress.score_series(), vec![0.5, 0.7, 0.9]);
        assert_eq!(progress.snapshot_count(), 3);
        assert_eq!(progress.best_score(), Some(0.9));
        assert_eq!(progress.latest_score(), Some(0.9));
        assert!((progress.improvement().unwrap() - 0.4).abs() < 1e-12);
        assert!((progress.average_score().unwrap() - 0.7).abs() < 1e-12);
        assert_eq!(progress.too_dark_count(), 1);
    }

    #[test]
    fn progress_ignores_other_projects() {
        let p = Uuid::new_v4();
        let other = Uuid::new_v4();
        let progress =
            ProjectProgress::from_records(p, vec![record(p, 0.4, None, 0), record(other, 0.8, None, 1)]);
        assert_eq!(progress.score_series(), vec![0.4]);
    }

    #[test]
    fn single_snapshot_has_no_improvement() {
        let p = Uuid::new_v4();
        let progress = ProjectProgress::from_records(p, vec![record(p, 0.6, None, 0)]);
        assert_eq!(progress.improvement(), None);
        assert_eq!(progress.latest_score(), Some(0.6));
    }

    #[test]
    fn empty_project() {
        let progress = ProjectProgress::from_records(Uuid::new_v4(), Vec::new());
        assert_eq!(progress.best_score(), None);
        assert_eq!(progress.average_score(), None);
        assert!(progress.score_series().is_empty());
    }

    #[test]
    fn user_stats_average_across_projects() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let projects = vec![
            ProjectProgress::from_records(a, vec![record(a, 0.2, None, 0), record(a, 0.4, None, 1)]),
            ProjectProgress::from_records(b, vec![record(b, 0.9, None, 0)]),
            ProjectProgress::from_records(Uuid::new_v4(), Vec::new()),
        ];
        let stats = UserStats::from_projects(&projects);

        assert_eq!(stats.total_projects, 3);
        assert_eq!(stats.total_snapshots, 3);
        assert!((stats.average_score - 0.5).abs() < 1e-12);
        assert_eq!(stats.average_score_display(), "0.50");
    }

    #[test]
    fn user_stats_without_snapshots() {
        let stats = UserStats::from_projects(&[]);
        assert_eq!(stats.total_projects, 0);
        assert_eq!(stats.average_score, 0.0);
        assert_eq!(stats.average_score_display(), "0.00");
    }

    #[test]
    fn lighting_serializes_snake_case() {
        let json = serde_json::to_string(&LightingCondition::TooDark).unwrap();
        assert_eq!(json, "\"too_dark\"");
    }
}
