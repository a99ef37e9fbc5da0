//! Core data model shared by the Tiered Storage Engine and its
//! collaborators: tiers, data types, data items, metadata rows, migration
//! log entries, access events/patterns, retention policies, and
//! violations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// =============================================================================
// Tier
// =============================================================================

/// Storage tier, strictly ordered by access cost: HOT is cheapest to read
/// and most expensive to retain indefinitely; BACKUP is the opposite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Hot,
    Warm,
    Cold,
    Backup,
}

impl Tier {
    pub const ORDER: [Tier; 4] = [Tier::Hot, Tier::Warm, Tier::Cold, Tier::Backup];

    /// Index in the cost-ordered tier sequence (Hot = 0 .. Backup = 3).
    pub fn rank(self) -> usize {
        match self {
            Tier::Hot => 0,
            Tier::Warm => 1,
            Tier::Cold => 2,
            Tier::Backup => 3,
        }
    }

    /// The tier one step faster, if any.
    pub fn promote(self) -> Option<Tier> {
        match self {
            Tier::Hot => None,
            Tier::Warm => Some(Tier::Hot),
            Tier::Cold => Some(Tier::Warm),
            Tier::Backup => Some(Tier::Cold),
        }
    }

    /// The tier one step slower, if any.
    pub fn demote(self) -> Option<Tier> {
        match self {
            Tier::Hot => Some(Tier::Warm),
            Tier::Warm => Some(Tier::Cold),
            Tier::Cold => Some(Tier::Backup),
            Tier::Backup => None,
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Tier::Hot => write!(f, "hot"),
            Tier::Warm => write!(f, "warm"),
            Tier::Cold => write!(f, "cold"),
            Tier::Backup => write!(f, "backup"),
        }
    }
}

// =============================================================================
// DataType
// =============================================================================

/// Domain category of a stored item. Determines the default placement
/// tier and the default key-value TTL used for the HOT tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    UserProfile,
    Conversation,
    Message,
    BotState,
    Configuration,
    Analytics,
    CodeModification,
    Embedding,
}

impl DataType {
    /// Default placement tier for freshly-written data of this type.
    pub fn default_tier(self) -> Tier {
        match self {
            DataType::UserProfile | DataType::BotState | DataType::Configuration => Tier::Hot,
            DataType::Conversation
            | DataType::Message
            | DataType::CodeModification
            | DataType::Embedding => Tier::Warm,
            DataType::Analytics => Tier::Cold,
        }
    }

    /// Default time-to-live in seconds for this data type's HOT-tier entry.
    pub fn default_ttl_seconds(self) -> u64 {
        match self {
            DataType::UserProfile => 3600,
            DataType::Conversation => 86_400,
            DataType::Message => 43_200,
            DataType::BotState => 1_800,
            DataType::Configuration => 3_600,
            DataType::Analytics => 7_200,
            DataType::CodeModification => 86_400,
            DataType::Embedding => 43_200,
        }
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DataType::UserProfile => "user-profile",
            DataType::Conversation => "conversation",
            DataType::Message => "message",
            DataType::BotState => "bot-state",
            DataType::Configuration => "configuration",
            DataType::Analytics => "analytics",
            DataType::CodeModification => "code-modification",
            DataType::Embedding => "embedding",
        };
        write!(f, "{s}")
    }
}

// =============================================================================
// MetadataRow
// =============================================================================

/// Source-of-truth row in the metadata index. `tier` here is authoritative:
/// whichever adapter the engine probes is trusted only insofar as it
/// agrees with this row.
#[derive(Debug, Clone)]
pub struct MetadataRow {
    pub key: String,
    pub data_type: DataType,
    pub tier: Tier,
    pub created_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
    pub access_count: u64,
    pub size: u64,
    pub tags: BTreeSet<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl MetadataRow {
    pub fn new(
        key: impl Into<String>,
        data_type: DataType,
        tier: Tier,
        now: DateTime<Utc>,
        size: u64,
        tags: BTreeSet<String>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            key: key.into(),
            data_type,
            tier,
            created_at: now,
            last_accessed_at: now,
            access_count: 1,
            size,
            tags,
            expires_at,
            updated_at: now,
        }
    }

    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.created_at
    }

    pub fn staleness(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.last_accessed_at
    }

    /// `access_count / max(age_days, 1)`, per `determine_target_tier`.
    pub fn frequency(&self, now: DateTime<Utc>) -> f64 {
        let age_days = (self.age(now).num_seconds() as f64 / 86_400.0).max(1.0);
        self.access_count as f64 / age_days
    }
}

// =============================================================================
// MigrationLogEntry
// =============================================================================

/// Append-only record of a tier transition, successful or not.
#[derive(Debug, Clone)]
pub struct MigrationLogEntry {
    pub seq: u64,
    pub key: String,
    pub from_tier: Tier,
    pub to_tier: Tier,
    pub at: DateTime<Utc>,
    pub reason: String,
    pub success: bool,
    pub error: Option<String>,
}

// =============================================================================
// AccessEvent / AccessPattern
// =============================================================================

/// A single recorded access, retained within a rolling window.
#[derive(Debug, Clone)]
pub struct AccessEvent {
    pub key: String,
    pub tier: Tier,
    pub at: DateTime<Utc>,
}

/// Whether access frequency is rising, falling, or holding steady.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Increasing,
    Decreasing,
    Stable,
}

/// Derived summary of a key's access history.
#[derive(Debug, Clone)]
pub struct AccessPattern {
    pub access_count: u64,
    pub avg_interval_ms: i64,
    pub last_access_at: DateTime<Utc>,
    pub peak_hour: u32,
    pub trend: Trend,
}

// =============================================================================
// RetentionPolicy / PolicyViolation
// =============================================================================

/// A declarative `(data_type, tier)`-scoped retention rule.
#[derive(Debug, Clone)]
pub struct RetentionPolicy {
    pub id: u64,
    pub name: String,
    pub data_type: DataType,
    pub tier: Tier,
    pub max_retention_days: u32,
    pub max_access_count: Option<u64>,
    pub max_age_days: Option<u32>,
    pub enabled: bool,
    pub priority: i32,
    pub description: String,
}

/// Kind of retention breach detected for an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationType {
    RetentionExceeded,
    AccessCountExceeded,
    AgeExceeded,
}

/// How severe a detected violation is, which in turn selects the action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// A single detected breach of a [`RetentionPolicy`].
#[derive(Debug, Clone)]
pub struct PolicyViolation {
    pub id: u64,
    pub policy_id: u64,
    pub key: String,
    pub current_tier: Tier,
    pub violation_type: ViolationType,
    pub current_value: f64,
    pub threshold_value: f64,
    pub severity: Severity,
    pub detected_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub action_taken: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_order_matches_cost() {
        assert!(Tier::Hot < Tier::Warm);
        assert!(Tier::Warm < Tier::Cold);
        assert!(Tier::Cold < Tier::Backup);
    }

    #[test]
    fn tier_promote_demote_are_inverse_at_the_edges() {
        assert_eq!(Tier::Hot.promote(), None);
        assert_eq!(Tier::Backup.demote(), None);
        assert_eq!(Tier::Warm.promote(), Some(Tier::Hot));
        assert_eq!(Tier::Warm.demote(), Some(Tier::Cold));
    }

    #[test]
    fn default_tier_placement() {
        assert_eq!(DataType::UserProfile.default_tier(), Tier::Hot);
        assert_eq!(DataType::Conversation.default_tier(), Tier::Warm);
        assert_eq!(DataType::Analytics.default_tier(), Tier::Cold);
    }

    #[test]
    fn frequency_uses_at_least_one_day() {
        let now = Utc::now();
        let row = MetadataRow::new("k", DataType::Message, Tier::Warm, now, 10, Default::default(), None);
        // age is ~0 days, so the denominator floors to 1
        assert_eq!(row.frequency(now), 1.0);
    }
}
