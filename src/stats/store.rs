//! The process-wide cumulative statement statistics.

use std::{collections::HashMap, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::{
    explain::ExplainTreeNode,
    types::{StatementFingerprint, StatementKey},
};

/// Configuration for [`StatementStatsStore`].
///
/// ## Example
///
/// ```rust
/// use std::time::Duration;
/// use stmtdiag::stats::StatsStoreConfig;
///
/// let config = StatsStoreConfig::builder()
///     .plan_collection_period(Duration::from_secs(60))
///     .build();
/// assert!(config.plan_collection_enabled);
/// ```
#[derive(Debug, Clone, bon::Builder)]
pub struct StatsStoreConfig {
    /// Whether logical plans are sampled for statistics at all.
    #[builder(default = true)]
    pub plan_collection_enabled: bool,
    /// How long a sampled plan stays fresh.
    #[builder(default = Duration::from_secs(5 * 60))]
    pub plan_collection_period: Duration,
}

impl Default for StatsStoreConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Running mean and squared differences of a numeric sample.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NumericStat {
    /// Running mean.
    pub mean: f64,
    /// Sum of squared differences from the mean.
    pub squared_diffs: f64,
}

impl NumericStat {
    /// Folds in `value` as the `count`th sample.
    pub fn record(&mut self, count: u64, value: f64) {
        if count == 0 {
            return;
        }
        let delta = value - self.mean;
        self.mean += delta / count as f64;
        self.squared_diffs += delta * (value - self.mean);
    }

    /// Returns the sample variance over `count` samples.
    pub fn variance(&self, count: u64) -> f64 {
        if count < 2 { 0.0 } else { self.squared_diffs / (count - 1) as f64 }
    }
}

/// Cumulative statistics for one statement fingerprint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatementStats {
    /// Executions folded in.
    pub count: u64,
    /// Executions whose network statistics were sampled.
    pub network_sample_count: u64,
    /// Bytes sent between nodes per execution.
    pub bytes_sent_over_network: NumericStat,
    /// The most recently sampled redacted plan.
    pub sampled_plan: Option<ExplainTreeNode>,
    /// When `sampled_plan` was taken.
    pub plan_sampled_at: Option<DateTime<Utc>>,
}

impl StatementStats {
    /// Folds one execution's network bytes in.
    pub fn record_network_bytes(&mut self, bytes: u64) {
        self.network_sample_count += 1;
        self.bytes_sent_over_network.record(self.network_sample_count, bytes as f64);
    }

    /// Replaces the sampled plan.
    pub fn record_plan(&mut self, plan: ExplainTreeNode) {
        self.sampled_plan = Some(plan);
        self.plan_sampled_at = Some(Utc::now());
    }
}

/// Process-wide statement statistics, keyed by fingerprint and transaction
/// shape.
///
/// The map is guarded by a read-write lock and every entry by its own mutex.
/// Callers lock an entry only for the fold-in step.
///
/// ## Example
///
/// ```rust
/// use stmtdiag::stats::StatementStatsStore;
/// use stmtdiag::StatementKey;
///
/// let store = StatementStatsStore::default();
/// let entry = store.get_or_create(&StatementKey::new("SELECT _", true));
/// entry.lock().record_network_bytes(128);
///
/// let again = store.get_or_create(&StatementKey::new("SELECT _", true));
/// assert_eq!(again.lock().network_sample_count, 1);
/// ```
#[derive(Debug, Default)]
pub struct StatementStatsStore {
    config: StatsStoreConfig,
    entries: RwLock<HashMap<StatementKey, Arc<Mutex<StatementStats>>>>,
}

impl StatementStatsStore {
    /// Creates an empty store.
    pub fn new(config: StatsStoreConfig) -> Self {
        Self { config, entries: RwLock::new(HashMap::new()) }
    }

    /// Returns the store configuration.
    pub fn config(&self) -> &StatsStoreConfig {
        &self.config
    }

    /// Returns the entry for `key`, creating it if needed.
    pub fn get_or_create(&self, key: &StatementKey) -> Arc<Mutex<StatementStats>> {
        if let Some(entry) = self.entries.read().get(key) {
            return Arc::clone(entry);
        }
        let mut entries = self.entries.write();
        Arc::clone(entries.entry(key.clone()).or_default())
    }

    /// Returns the entry for `key` if one exists.
    pub fn get(&self, key: &StatementKey) -> Option<Arc<Mutex<StatementStats>>> {
        self.entries.read().get(key).cloned()
    }

    /// Returns `true` if the next execution of this statement should sample
    /// its logical plan.
    pub fn should_save_logical_plan_description(
        &self,
        fingerprint: &StatementFingerprint,
        implicit_txn: bool,
    ) -> bool {
        if !self.config.plan_collection_enabled {
            return false;
        }
        let key = StatementKey::new(fingerprint.clone(), implicit_txn);
        let Some(entry) = self.get(&key) else {
            return true;
        };
        let sampled_at = entry.lock().plan_sampled_at;
        match sampled_at {
            None => true,
            Some(at) => (Utc::now() - at)
                .to_std()
                .map(|age| age >= self.config.plan_collection_period)
                .unwrap_or(false),
        }
    }

    /// Stores a sampled plan for `key`.
    pub fn record_plan_sample(&self, key: &StatementKey, plan: ExplainTreeNode) {
        self.get_or_create(key).lock().record_plan(plan);
    }

    /// Returns the number of tracked statements.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns `true` if nothing is tracked.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Drops every entry.
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Returns a copy of every entry.
    pub fn entries(&self) -> Vec<(StatementKey, StatementStats)> {
        let entries: Vec<_> = self
            .entries
            .read()
            .iter()
            .map(|(key, entry)| (key.clone(), Arc::clone(entry)))
            .collect();
        entries.into_iter().map(|(key, entry)| (key, entry.lock().clone())).collect()
    }
}
