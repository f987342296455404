//! Data types and their strongly-typed payloads.
//!
//! Each synced dataType carries a typed payload variant with its own merge
//! and diff semantics, selected by tag in `lexisync-sync`. Unknown types
//! round-trip through `DataPayload::Generic` and take the generic recursive
//! merge path instead of being type-sniffed at runtime.

use crate::Timestamp;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// The category of data a mutation or snapshot belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DataType {
    /// The user's vocabulary list. Identity key: the word itself.
    Vocabulary,
    /// Aggregate learning progress (counters and accuracy).
    Progress,
    /// Experience points, level and streak.
    Experience,
    /// Earned achievement badges. Identity key: badge id.
    Badges,
    /// Watched shows/episodes. Identity key: show id.
    Shows,
    /// Individual study records. Identity key: record id.
    Records,
    /// A dataType this client version does not know. Synced opaquely.
    Other(String),
}

impl DataType {
    /// Stable wire name for this dataType.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Vocabulary => "vocabulary",
            Self::Progress => "progress",
            Self::Experience => "experience",
            Self::Badges => "badges",
            Self::Shows => "shows",
            Self::Records => "records",
            Self::Other(name) => name,
        }
    }

    /// Important dataTypes bypass the flush timer and trigger an immediate
    /// flush attempt on enqueue.
    #[must_use]
    pub fn is_important(&self) -> bool {
        matches!(self, Self::Experience | Self::Vocabulary | Self::Progress)
    }

    /// All dataTypes a full onboarding pull covers.
    #[must_use]
    pub fn known() -> [Self; 6] {
        [
            Self::Vocabulary,
            Self::Progress,
            Self::Experience,
            Self::Badges,
            Self::Shows,
            Self::Records,
        ]
    }
}

impl From<String> for DataType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "vocabulary" => Self::Vocabulary,
            "progress" => Self::Progress,
            "experience" => Self::Experience,
            "badges" => Self::Badges,
            "shows" => Self::Shows,
            "records" => Self::Records,
            _ => Self::Other(s),
        }
    }
}

impl From<DataType> for String {
    fn from(dt: DataType) -> Self {
        dt.as_str().to_string()
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry in the user's vocabulary list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VocabularyItem {
    /// The word itself — the identity key across devices.
    pub word: String,
    /// Definition or translation.
    #[serde(default)]
    pub definition: String,
    /// BCP-47 language tag of the word.
    #[serde(default)]
    pub language: String,
    /// How many times this word has been reviewed.
    #[serde(default)]
    pub review_count: u32,
    /// Whether the learning algorithm considers the word mastered.
    #[serde(default)]
    pub mastered: bool,
    /// Last local modification time. Later wins on merge collision.
    pub last_modified: Timestamp,
}

/// Aggregate learning progress. Counters only grow; accuracy is a ratio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ProgressState {
    /// Distinct days with at least one study session.
    #[serde(default)]
    pub learning_days: u32,
    /// Total review operations ever performed.
    #[serde(default)]
    pub total_reviews: u64,
    /// Words currently counted as mastered.
    #[serde(default)]
    pub mastered_words: u32,
    /// Rolling review accuracy in [0, 1].
    #[serde(default)]
    pub accuracy: f64,
    /// Last local modification time.
    #[serde(default)]
    pub last_modified: Timestamp,
}

/// Experience points and derived level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ExperienceState {
    /// Total experience points.
    #[serde(default)]
    pub experience: u64,
    /// Current level.
    #[serde(default)]
    pub level: u32,
    /// Current daily streak.
    #[serde(default)]
    pub streak: u32,
    /// Last local modification time.
    #[serde(default)]
    pub last_modified: Timestamp,
}

/// An earned achievement badge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Badge {
    /// Opaque badge id — the identity key.
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// When the badge was earned.
    #[serde(default)]
    pub earned_at: Timestamp,
    /// Last local modification time.
    pub last_modified: Timestamp,
}

/// A show the user watches for immersion learning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Show {
    /// Opaque show id — the identity key.
    pub id: String,
    /// Display title.
    #[serde(default)]
    pub title: String,
    /// Playback position in seconds.
    #[serde(default)]
    pub position_secs: u32,
    /// Last local modification time.
    pub last_modified: Timestamp,
}

/// One study session record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyRecord {
    /// Opaque record id — the identity key.
    pub id: String,
    /// The word that was studied, if any.
    #[serde(default)]
    pub word: String,
    /// Whether the review was answered correctly.
    #[serde(default)]
    pub correct: bool,
    /// Session duration in milliseconds.
    #[serde(default)]
    pub duration_ms: u64,
    /// Last local modification time.
    pub last_modified: Timestamp,
}

/// The typed payload carried by a mutation or snapshot.
///
/// The tag must agree with the surrounding [`DataType`]; the sync engine
/// validates the pairing when snapshots arrive from the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum DataPayload {
    /// Vocabulary list.
    Vocabulary(Vec<VocabularyItem>),
    /// Progress counters.
    Progress(ProgressState),
    /// Experience state.
    Experience(ExperienceState),
    /// Badge list.
    Badges(Vec<Badge>),
    /// Show list.
    Shows(Vec<Show>),
    /// Study record list.
    Records(Vec<StudyRecord>),
    /// Opaque JSON for unknown dataTypes.
    Generic(Value),
}

impl DataPayload {
    /// An empty payload of the shape expected for `data_type`.
    #[must_use]
    pub fn empty_for(data_type: &DataType) -> Self {
        match data_type {
            DataType::Vocabulary => Self::Vocabulary(Vec::new()),
            DataType::Progress => Self::Progress(ProgressState::default()),
            DataType::Experience => Self::Experience(ExperienceState::default()),
            DataType::Badges => Self::Badges(Vec::new()),
            DataType::Shows => Self::Shows(Vec::new()),
            DataType::Records => Self::Records(Vec::new()),
            DataType::Other(_) => Self::Generic(Value::Null),
        }
    }

    /// True if this payload shape matches the given dataType tag.
    #[must_use]
    pub fn matches(&self, data_type: &DataType) -> bool {
        matches!(
            (self, data_type),
            (Self::Vocabulary(_), DataType::Vocabulary)
                | (Self::Progress(_), DataType::Progress)
                | (Self::Experience(_), DataType::Experience)
                | (Self::Badges(_), DataType::Badges)
                | (Self::Shows(_), DataType::Shows)
                | (Self::Records(_), DataType::Records)
                | (Self::Generic(_), DataType::Other(_))
        )
    }

    /// Number of addressable items in the payload. Scalar payloads count
    /// as one item.
    #[must_use]
    pub fn item_count(&self) -> usize {
        match self {
            Self::Vocabulary(items) => items.len(),
            Self::Badges(items) => items.len(),
            Self::Shows(items) => items.len(),
            Self::Records(items) => items.len(),
            Self::Progress(_) | Self::Experience(_) => 1,
            Self::Generic(Value::Array(items)) => items.len(),
            Self::Generic(Value::Null) => 0,
            Self::Generic(_) => 1,
        }
    }

    /// Serialized size in bytes, used for transfer-cost estimates and
    /// queue ceilings.
    #[must_use]
    pub fn approx_size(&self) -> usize {
        serde_json::to_vec(self).map(|v| v.len()).unwrap_or(0)
    }
}
