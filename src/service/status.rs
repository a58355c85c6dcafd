//! Per-service mutable state, shared between the tracking task and readers.

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::QueryErrorKind;

/// Health of a service's query loop, exported as a gauge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Liveness {
    GenericFailure,
    Healthy,
    RegexExtractionFailed,
    SemverComparisonFailed,
    VersionBelowCurrent,
}

impl Liveness {
    /// Numeric gauge value
    pub fn as_gauge(&self) -> f64 {
        match self {
            Liveness::GenericFailure => 0.0,
            Liveness::Healthy => 1.0,
            Liveness::RegexExtractionFailed => 2.0,
            Liveness::SemverComparisonFailed => 3.0,
            Liveness::VersionBelowCurrent => 4.0,
        }
    }
}

impl From<QueryErrorKind> for Liveness {
    fn from(kind: QueryErrorKind) -> Self {
        match kind {
            QueryErrorKind::RegexExtraction => Liveness::RegexExtractionFailed,
            QueryErrorKind::SemverComparison => Liveness::SemverComparisonFailed,
            QueryErrorKind::VersionBelowCurrent => Liveness::VersionBelowCurrent,
            QueryErrorKind::Generic => Liveness::GenericFailure,
        }
    }
}

/// Point-in-time copy of a [`Status`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatusSummary {
    pub deployed_version: String,
    pub deployed_version_timestamp: Option<DateTime<Utc>>,
    pub latest_version: String,
    pub latest_version_timestamp: Option<DateTime<Utc>>,
    pub last_queried: Option<DateTime<Utc>>,
    pub update_announced: bool,
    /// None until the first query finishes
    pub liveness: Option<Liveness>,
}

/// Service status. Only the service's own tracking task commits changes.
#[derive(Debug, Default)]
pub struct Status {
    service_id: String,
    state: RwLock<StatusSummary>,
}

impl Status {
    pub fn new(service_id: impl Into<String>) -> Self {
        Self {
            service_id: service_id.into(),
            state: RwLock::new(StatusSummary::default()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, StatusSummary> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, StatusSummary> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn service_id(&self) -> &str {
        &self.service_id
    }

    pub fn deployed_version(&self) -> String {
        self.read().deployed_version.clone()
    }

    pub fn set_deployed_version(&self, version: &str) {
        let mut state = self.write();
        state.deployed_version = version.to_string();
        state.deployed_version_timestamp = Some(Utc::now());
    }

    pub fn latest_version(&self) -> String {
        self.read().latest_version.clone()
    }

    /// Record a newly seen release; it has not been announced as deployed yet.
    pub fn set_latest_version(&self, version: &str) {
        let mut state = self.write();
        state.latest_version = version.to_string();
        state.latest_version_timestamp = Some(Utc::now());
        state.update_announced = false;
    }

    pub fn announce_update(&self) {
        self.write().update_announced = true;
    }

    pub fn update_announced(&self) -> bool {
        self.read().update_announced
    }

    pub fn set_last_queried(&self, at: DateTime<Utc>) {
        self.write().last_queried = Some(at);
    }

    pub fn liveness(&self) -> Option<Liveness> {
        self.read().liveness
    }

    pub fn set_liveness(&self, liveness: Liveness) {
        self.write().liveness = Some(liveness);
    }

    pub fn summary(&self) -> StatusSummary {
        self.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(QueryErrorKind::RegexExtraction, Liveness::RegexExtractionFailed, 2.0)]
    #[case(QueryErrorKind::SemverComparison, Liveness::SemverComparisonFailed, 3.0)]
    #[case(QueryErrorKind::VersionBelowCurrent, Liveness::VersionBelowCurrent, 4.0)]
    #[case(QueryErrorKind::Generic, Liveness::GenericFailure, 0.0)]
    fn liveness_from_error_kind(
        #[case] kind: QueryErrorKind,
        #[case] expected: Liveness,
        #[case] gauge: f64,
    ) {
        let liveness = Liveness::from(kind);
        assert_eq!(liveness, expected);
        assert_eq!(liveness.as_gauge(), gauge);
    }

    #[test]
    fn new_latest_version_clears_announcement() {
        let status = Status::new("argus");
        status.announce_update();
        assert!(status.update_announced());

        status.set_latest_version("1.1.0");

        let summary = status.summary();
        assert_eq!(summary.latest_version, "1.1.0");
        assert!(summary.latest_version_timestamp.is_some());
        assert!(!summary.update_announced);
    }

    #[test]
    fn summary_starts_idle() {
        let status = Status::new("argus");

        assert_eq!(status.service_id(), "argus");
        assert_eq!(status.summary(), StatusSummary::default());
        assert_eq!(status.liveness(), None);
    }
}
