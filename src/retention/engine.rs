//! Retention Policy Engine implementation.

use crate::clock::ClockRef;
use crate::domain::model::{
    DataType, MetadataRow, PolicyViolation, RetentionPolicy, Severity, Tier, ViolationType,
};
use crate::error::Result;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Result of enforcing one or all retention policies, mirroring
/// `policy_enforcement_logs`.
#[derive(Debug, Clone, Default)]
pub struct EnforcementReport {
    pub items_checked: usize,
    pub violations_found: usize,
    pub deleted: usize,
    pub archived: usize,
    pub moved: usize,
    pub execution_time: Duration,
    pub errors: Vec<String>,
}

impl EnforcementReport {
    fn merge(&mut self, other: EnforcementReport) {
        self.items_checked += other.items_checked;
        self.violations_found += other.violations_found;
        self.deleted += other.deleted;
        self.archived += other.archived;
        self.moved += other.moved;
        self.errors.extend(other.errors);
    }
}

/// The side of the Tiered Storage Engine the retention engine acts on.
/// Implemented by [`crate::tiered::TieredStorageEngine`]; kept as a trait
/// so the retention engine is independently testable.
#[async_trait]
pub trait PolicyEnforcementTarget: Send + Sync {
    async fn items_in(&self, data_type: DataType, tier: Tier) -> Result<Vec<MetadataRow>>;
    async fn delete_item(&self, key: &str) -> Result<()>;
    async fn archive_item(&self, key: &str) -> Result<()>;
    async fn demote_item(&self, key: &str) -> Result<()>;
}

enum Action {
    Delete,
    Archive,
    Demote,
}

/// Declarative enforcement of `(data_type, tier)`-scoped retention rules.
pub struct RetentionPolicyEngine {
    clock: ClockRef,
    policies: RwLock<Vec<RetentionPolicy>>,
    violations: RwLock<Vec<PolicyViolation>>,
    next_policy_id: AtomicU64,
    next_violation_id: AtomicU64,
}

impl RetentionPolicyEngine {
    /// Construct with the default policy set seeded.
    pub fn new(clock: ClockRef) -> Self {
        let engine = Self {
            clock,
            policies: RwLock::new(Vec::new()),
            violations: RwLock::new(Vec::new()),
            next_policy_id: AtomicU64::new(1),
            next_violation_id: AtomicU64::new(1),
        };
        for policy in default_policies() {
            engine.add_policy(policy);
        }
        engine
    }

    /// Add a policy; duplicates are suppressed by `name`.
    pub fn add_policy(&self, mut policy: RetentionPolicy) -> Option<u64> {
        let mut guard = self.policies.write();
        if guard.iter().any(|p| p.name == policy.name) {
            return None;
        }
        let id = self.next_policy_id.fetch_add(1, Ordering::Relaxed);
        policy.id = id;
        guard.push(policy);
        Some(id)
    }

    pub fn policies(&self) -> Vec<RetentionPolicy> {
        self.policies.read().clone()
    }

    pub fn violations(&self) -> Vec<PolicyViolation> {
        self.violations.read().clone()
    }

    /// Enforce a single policy by id.
    pub async fn enforce_policy(
        &self,
        policy_id: u64,
        target: &dyn PolicyEnforcementTarget,
    ) -> Result<EnforcementReport> {
        let policy = {
            let guard = self.policies.read();
            guard.iter().find(|p| p.id == policy_id).cloned()
        };
        let Some(policy) = policy else {
            return Ok(EnforcementReport::default());
        };
        self.enforce_one(&policy, target, &mut HashSet::new()).await
    }

    /// Enforce all enabled policies, highest `priority` first. An item is
    /// evaluated by only the first (highest-priority) policy whose scope
    /// matches it.
    pub async fn enforce_all(&self, target: &dyn PolicyEnforcementTarget) -> Result<EnforcementReport> {
        let started = self.clock.monotonic_now();
        let mut policies = self.policies.read().clone();
        policies.retain(|p| p.enabled);
        policies.sort_by(|a, b| b.priority.cmp(&a.priority));

        let mut processed = HashSet::new();
        let mut aggregate = EnforcementReport::default();
        for policy in &policies {
            let report = self.enforce_one(policy, target, &mut processed).await?;
            aggregate.merge(report);
        }
        aggregate.execution_time = self.clock.monotonic_now().duration_since(started);
        Ok(aggregate)
    }

    async fn enforce_one(
        &self,
        policy: &RetentionPolicy,
        target: &dyn PolicyEnforcementTarget,
        processed: &mut HashSet<String>,
    ) -> Result<EnforcementReport> {
        let started = self.clock.monotonic_now();
        let now = self.clock.now();
        let mut report = EnforcementReport::default();

        let items = target.items_in(policy.data_type, policy.tier).await?;
        for item in items {
            if processed.contains(&item.key) {
                continue;
            }
            processed.insert(item.key.clone());
            report.items_checked += 1;

            let Some((violation_type, severity, current_value, threshold_value)) =
                detect_violation(&item, policy, now)
            else {
                continue;
            };

            report.violations_found += 1;
            let action = select_action(violation_type, severity);
            let outcome = match action {
                Action::Delete => target.delete_item(&item.key).await.map(|_| "deleted"),
                Action::Archive => target.archive_item(&item.key).await.map(|_| "archived"),
                Action::Demote => target.demote_item(&item.key).await.map(|_| "moved"),
            };

            match outcome {
                Ok(label) => {
                    match label {
                        "deleted" => report.deleted += 1,
                        "archived" => report.archived += 1,
                        _ => report.moved += 1,
                    }
                    self.record_violation(
                        policy.id,
                        &item,
                        violation_type,
                        severity,
                        current_value,
                        threshold_value,
                        Some(label.to_string()),
                    );
                }
                Err(e) => {
                    report.errors.push(format!("{}: {}", item.key, e));
                }
            }
        }

        report.execution_time = self.clock.monotonic_now().duration_since(started);
        Ok(report)
    }

    #[allow(clippy::too_many_arguments)]
    fn record_violation(
        &self,
        policy_id: u64,
        item: &MetadataRow,
        violation_type: ViolationType,
        severity: Severity,
        current_value: f64,
        threshold_value: f64,
        action_taken: Option<String>,
    ) {
        let id = self.next_violation_id.fetch_add(1, Ordering::Relaxed);
        self.violations.write().push(PolicyViolation {
            id,
            policy_id,
            key: item.key.clone(),
            current_tier: item.tier,
            violation_type,
            current_value,
            threshold_value,
            severity,
            detected_at: self.clock.now(),
            resolved_at: Some(self.clock.now()),
            action_taken,
        });
    }
}

/// Seeded default policies, highest priority first.
fn default_policies() -> Vec<RetentionPolicy> {
    vec![
        RetentionPolicy {
            id: 0,
            name: "hot-user-profile".to_string(),
            data_type: DataType::UserProfile,
            tier: Tier::Hot,
            max_retention_days: 7,
            max_access_count: Some(10),
            max_age_days: None,
            enabled: true,
            priority: 60,
            description: "HOT user-profile retention".to_string(),
        },
        RetentionPolicy {
            id: 0,
            name: "hot-conversation".to_string(),
            data_type: DataType::Conversation,
            tier: Tier::Hot,
            max_retention_days: 1,
            max_access_count: Some(20),
            max_age_days: None,
            enabled: true,
            priority: 50,
            description: "HOT conversation retention".to_string(),
        },
        RetentionPolicy {
            id: 0,
            name: "warm-message".to_string(),
            data_type: DataType::Message,
            tier: Tier::Warm,
            max_retention_days: 90,
            max_access_count: None,
            max_age_days: None,
            enabled: true,
            priority: 40,
            description: "WARM message retention".to_string(),
        },
        RetentionPolicy {
            id: 0,
            name: "warm-analytics".to_string(),
            data_type: DataType::Analytics,
            tier: Tier::Warm,
            max_retention_days: 30,
            max_access_count: None,
            max_age_days: None,
            enabled: true,
            priority: 30,
            description: "WARM analytics retention".to_string(),
        },
        RetentionPolicy {
            id: 0,
            name: "cold-conversation".to_string(),
            data_type: DataType::Conversation,
            tier: Tier::Cold,
            max_retention_days: 365,
            max_access_count: None,
            max_age_days: None,
            enabled: true,
            priority: 20,
            description: "COLD conversation retention".to_string(),
        },
        RetentionPolicy {
            id: 0,
            name: "backup-code-modification".to_string(),
            data_type: DataType::CodeModification,
            tier: Tier::Backup,
            max_retention_days: 2555,
            max_access_count: None,
            max_age_days: None,
            enabled: true,
            priority: 10,
            description: "BACKUP code-modification retention".to_string(),
        },
    ]
}

fn detect_violation(
    item: &MetadataRow,
    policy: &RetentionPolicy,
    now: chrono::DateTime<chrono::Utc>,
) -> Option<(ViolationType, Severity, f64, f64)> {
    let age_days = item.age(now).num_seconds() as f64 / 86_400.0;

    if age_days > policy.max_retention_days as f64 {
        let severity = severity_for_age(age_days, policy.max_retention_days as f64);
        return Some((
            ViolationType::RetentionExceeded,
            severity,
            age_days,
            policy.max_retention_days as f64,
        ));
    }

    if let Some(max_access_count) = policy.max_access_count {
        if item.access_count > max_access_count {
            return Some((
                ViolationType::AccessCountExceeded,
                Severity::Medium,
                item.access_count as f64,
                max_access_count as f64,
            ));
        }
    }

    if let Some(max_age_days) = policy.max_age_days {
        if age_days > max_age_days as f64 {
            let severity = severity_for_age(age_days, max_age_days as f64);
            return Some((ViolationType::AgeExceeded, severity, age_days, max_age_days as f64));
        }
    }

    None
}

// A 7-day threshold puts the critical cutoff at 17.5 days: 15d over a 7d
// policy is `high` (archive), 20d is `critical` (delete).
fn severity_for_age(age_days: f64, threshold_days: f64) -> Severity {
    if age_days > threshold_days * 2.5 {
        Severity::Critical
    } else {
        Severity::High
    }
}

fn select_action(violation_type: ViolationType, severity: Severity) -> Action {
    // access_count_exceeded always demotes, never re-interpreted.
    if violation_type == ViolationType::AccessCountExceeded {
        return Action::Demote;
    }
    match severity {
        Severity::Critical => Action::Delete,
        Severity::High => Action::Archive,
        Severity::Medium | Severity::Low => Action::Demote,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::Utc;
    use std::collections::BTreeSet;
    use std::sync::Arc;
    use tokio::sync::Mutex as AsyncMutex;

    struct FakeTarget {
        items: AsyncMutex<Vec<MetadataRow>>,
        deleted: AsyncMutex<Vec<String>>,
        archived: AsyncMutex<Vec<String>>,
        demoted: AsyncMutex<Vec<String>>,
    }

    impl FakeTarget {
        fn new(items: Vec<MetadataRow>) -> Self {
            Self {
                items: AsyncMutex::new(items),
                deleted: AsyncMutex::new(Vec::new()),
                archived: AsyncMutex::new(Vec::new()),
                demoted: AsyncMutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl PolicyEnforcementTarget for FakeTarget {
        async fn items_in(&self, data_type: DataType, tier: Tier) -> Result<Vec<MetadataRow>> {
            Ok(self
                .items
                .lock()
                .await
                .iter()
                .filter(|i| i.data_type == data_type && i.tier == tier)
                .cloned()
                .collect())
        }
        async fn delete_item(&self, key: &str) -> Result<()> {
            self.deleted.lock().await.push(key.to_string());
            Ok(())
        }
        async fn archive_item(&self, key: &str) -> Result<()> {
            self.archived.lock().await.push(key.to_string());
            Ok(())
        }
        async fn demote_item(&self, key: &str) -> Result<()> {
            self.demoted.lock().await.push(key.to_string());
            Ok(())
        }
    }

    fn row(key: &str, data_type: DataType, tier: Tier, age_days: i64, access_count: u64) -> MetadataRow {
        let now = Utc::now();
        MetadataRow {
            key: key.to_string(),
            data_type,
            tier,
            created_at: now - chrono::Duration::days(age_days),
            last_accessed_at: now,
            access_count,
            size: 10,
            tags: BTreeSet::new(),
            expires_at: None,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn severity_high_archives_critical_deletes() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let engine = RetentionPolicyEngine::new(clock);

        let target = FakeTarget::new(vec![
            row("high", DataType::UserProfile, Tier::Hot, 15, 1),
            row("critical", DataType::UserProfile, Tier::Hot, 20, 1),
        ]);

        let policy_id = engine
            .policies()
            .iter()
            .find(|p| p.name == "hot-user-profile")
            .unwrap()
            .id;
        let report = engine.enforce_policy(policy_id, &target).await.unwrap();

        assert_eq!(report.violations_found, 2);
        assert_eq!(report.archived, 1);
        assert_eq!(report.deleted, 1);
        assert_eq!(*target.archived.lock().await, vec!["high".to_string()]);
        assert_eq!(*target.deleted.lock().await, vec!["critical".to_string()]);
    }

    #[tokio::test]
    async fn access_count_exceeded_always_demotes() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let engine = RetentionPolicyEngine::new(clock);
        // age within bounds, but access_count over the 10-access threshold
        let target = FakeTarget::new(vec![row("k1", DataType::UserProfile, Tier::Hot, 1, 11)]);

        let policy_id = engine
            .policies()
            .iter()
            .find(|p| p.name == "hot-user-profile")
            .unwrap()
            .id;
        let report = engine.enforce_policy(policy_id, &target).await.unwrap();

        assert_eq!(report.moved, 1);
        assert_eq!(*target.demoted.lock().await, vec!["k1".to_string()]);
    }

    #[tokio::test]
    async fn enforce_all_is_idempotent_with_no_intervening_mutation() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let engine = RetentionPolicyEngine::new(clock);
        let target = FakeTarget::new(vec![row("k1", DataType::UserProfile, Tier::Hot, 20, 1)]);

        let first = engine.enforce_all(&target).await.unwrap();
        assert_eq!(first.violations_found, 1);

        // target still reports the item (a real engine would have deleted it;
        // this fake doesn't mutate `items`), but a second pass with the
        // *same* accumulated violations ledger must not double count beyond
        // what a non-mutating fixture allows us to assert here: rerunning
        // produces the same, not a growing, violation count.
        let second = engine.enforce_all(&target).await.unwrap();
        assert_eq!(second.violations_found, first.violations_found);
    }
}
