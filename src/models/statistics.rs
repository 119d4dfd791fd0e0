//! Statistics and study session models.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Aggregate counts from `GET statistics/`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    #[serde(default)]
    pub total_topics: u64,
    #[serde(default)]
    pub total_revisions: u64,
    #[serde(default)]
    pub completed_revisions: u64,
    #[serde(default)]
    pub pending_revisions: u64,
    #[serde(default)]
    pub topics_this_week: u64,
    #[serde(default)]
    pub revisions_today: u64,
}

impl Statistics {
    /// Completed share of all revisions as a rounded percentage.
    pub fn completion_rate(&self) -> u8 {
        if self.total_revisions == 0 {
            return 0;
        }
        let rate = (self.completed_revisions as f64 / self.total_revisions as f64) * 100.0;
        rate.round().clamp(0.0, 100.0) as u8
    }
}

/// Backend handle of an open study session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct StudySessionId(String);

impl StudySessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StudySessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for StudySessionId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // The backend uses integer keys; accept strings too.
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Int(i64),
            Text(String),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Int(id) => StudySessionId(id.to_string()),
            RawId::Text(id) => StudySessionId(id),
        })
    }
}

/// Response of `POST study-sessions/start/`.
#[derive(Debug, Clone, Deserialize)]
pub struct StudySessionStarted {
    pub session: StudySessionBody,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StudySessionBody {
    pub id: StudySessionId,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_completion_rate() {
        let stats = Statistics {
            total_revisions: 3,
            completed_revisions: 2,
            ..Default::default()
        };
        assert_eq!(stats.completion_rate(), 67);
        assert_eq!(Statistics::default().completion_rate(), 0);
    }

    #[test]
    fn test_session_id_accepts_numbers() {
        let started: StudySessionStarted =
            serde_json::from_value(json!({ "session": { "id": 42 } })).unwrap();
        assert_eq!(started.session.id.as_str(), "42");
    }
}
