//! Logical keys identifying one grid snapshot reduced to one domain.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifies one physical grid snapshot reduced to one geographic domain.
///
/// Immutable once constructed; the `Display` rendering doubles as the
/// deterministic on-disk file stem for both the native store and the
/// subgrid cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LogicalKey {
    /// Model identifier (e.g., "arome", "arpege")
    pub model: String,
    /// Analysis/initialization timestamp of the forecast run
    pub run_time: DateTime<Utc>,
    /// Lead time in hours since run time
    pub term: u32,
    /// Named geographic sub-window
    pub domain: String,
    /// Ensemble member index, when the source model is an ensemble
    pub member: Option<u32>,
}

impl LogicalKey {
    pub fn new(
        model: impl Into<String>,
        run_time: DateTime<Utc>,
        term: u32,
        domain: impl Into<String>,
        member: Option<u32>,
    ) -> Self {
        Self {
            model: model.into(),
            run_time,
            term,
            domain: domain.into(),
            member,
        }
    }

    /// Same run, shifted lead time. Returns None if the shift underflows.
    pub fn with_term_shift(&self, shift: i32) -> Option<Self> {
        let term = self.term as i64 + shift as i64;
        if term < 0 {
            return None;
        }
        Some(Self {
            term: term as u32,
            ..self.clone()
        })
    }

    /// Deterministic file stem, without extension.
    pub fn file_stem(&self) -> String {
        let mut stem = format!(
            "{}_{}_f{:03}_{}",
            self.model,
            self.run_time.format("%Y%m%d%H"),
            self.term,
            self.domain
        );
        if let Some(member) = self.member {
            stem.push_str(&format!("_mb{:02}", member));
        }
        stem
    }
}

impl std::fmt::Display for LogicalKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.file_stem())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn key() -> LogicalKey {
        LogicalKey::new(
            "arome",
            Utc.with_ymd_and_hms(2024, 3, 15, 0, 0, 0).unwrap(),
            6,
            "alps",
            None,
        )
    }

    #[test]
    fn test_file_stem() {
        assert_eq!(key().file_stem(), "arome_2024031500_f006_alps");
    }

    #[test]
    fn test_file_stem_with_member() {
        let mut k = key();
        k.member = Some(3);
        assert_eq!(k.file_stem(), "arome_2024031500_f006_alps_mb03");
    }

    #[test]
    fn test_term_shift() {
        let shifted = key().with_term_shift(-1).unwrap();
        assert_eq!(shifted.term, 5);
        assert_eq!(shifted.model, "arome");

        // Underflow below term 0 is not representable
        assert!(key().with_term_shift(-7).is_none());
    }
}
