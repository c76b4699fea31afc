use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The signed-in user. Exactly one may be current at a time; its presence in
/// the store is the sole authority for "is a session active".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: String,
    pub username: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

/// One persisted outfit-check outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: String,
    pub created_at: DateTime<Utc>,
    /// Reference to the source image (path or URL).
    pub image_ref: String,
    /// The critique text extracted from the analysis response.
    pub analysis: String,
    pub occasion: String,
    #[serde(default)]
    pub score: Option<f32>,
    pub user_id: String,
}

impl HistoryRecord {
    /// Build a record stamped now, with the millisecond-derived id the app
    /// has always written.
    pub fn new(
        image_ref: impl Into<String>,
        analysis: impl Into<String>,
        occasion: impl Into<String>,
        score: Option<f32>,
        user_id: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: now.timestamp_millis().to_string(),
            created_at: now,
            image_ref: image_ref.into(),
            analysis: analysis.into(),
            occasion: occasion.into(),
            score,
            user_id: user_id.into(),
        }
    }
}

/// Flat named settings. Unknown stored fields are tolerated; last write wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreferenceRecord {
    pub dark_mode: bool,
    pub notifications_enabled: bool,
    pub favorite_occasions: Vec<String>,
}

impl Default for PreferenceRecord {
    fn default() -> Self {
        Self {
            dark_mode: false,
            notifications_enabled: true,
            favorite_occasions: Vec::new(),
        }
    }
}

/// Aggregates derived from a user's stored history, for profile views.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryStats {
    pub total_checks: usize,
    /// Up to three occasions, most frequent first.
    pub top_occasions: Vec<String>,
    /// Mean of the recorded scores, rounded to one decimal. `None` when no
    /// check carries a score.
    pub average_score: Option<f32>,
}
