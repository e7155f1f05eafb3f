//! Tiered key/value cache with per-key-class retention policy.
//!
//! Every key belongs to exactly one class, resolved at write time:
//! never-cache (write is a no-op), session (kept until explicitly
//! invalidated), or ttl-bounded (expiry from a static table, 30-minute
//! default for unrecognized kinds). Expired entries are evicted lazily on
//! access and swept opportunistically at most once every five minutes.
//!
//! The cache is an explicit object handed to the orchestrator; there is
//! no process-wide singleton, so tests can build and drop instances
//! freely.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Injectable time source so retention tests can simulate the clock
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time; the default outside tests
#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Retention class a key resolves to at write time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum KeyClass {
    /// Writes are dropped; the data is too volatile to ever serve stale
    NeverCache,
    /// Kept until explicitly invalidated
    Session,
    /// Expires after a fixed number of seconds
    TtlBounded,
}

/// Key kinds that must never be cached. Work items and time logs change
/// continuously; resource utilization is cheap to recompute and highly
/// time-sensitive.
const NEVER_CACHE_KINDS: &[&str] = &["work_items", "time_logs", "resource_utilization", "project_status"];

/// Key kinds kept for the lifetime of the session
const SESSION_KINDS: &[&str] = &["parameters"];

/// Static kind -> seconds retention table
const TTL_TABLE: &[(&str, i64)] = &[
    ("evm", 24 * 60 * 60),
    ("critical_path", 12 * 60 * 60),
    ("portfolio", 60 * 60),
];

/// Fallback for ttl-bounded kinds not listed in the table
pub const DEFAULT_TTL_SECONDS: i64 = 30 * 60;

/// Minimum spacing between opportunistic sweeps
const SWEEP_INTERVAL_SECONDS: i64 = 5 * 60;

/// Hit-rate health checks stay quiet until this many lookups happened
const MIN_OBSERVATIONS_FOR_HIT_RATE: u64 = 20;

/// Resolve the retention class for a key. The kind is the segment before
/// the first ':'.
pub fn classify_key(key: &str) -> KeyClass {
    let kind = key.split(':').next().unwrap_or(key);
    if NEVER_CACHE_KINDS.contains(&kind) {
        KeyClass::NeverCache
    } else if SESSION_KINDS.contains(&kind) {
        KeyClass::Session
    } else {
        KeyClass::TtlBounded
    }
}

/// Seconds of retention for a ttl-bounded key
pub fn ttl_for_key(key: &str) -> i64 {
    let kind = key.split(':').next().unwrap_or(key);
    TTL_TABLE
        .iter()
        .find(|(k, _)| *k == kind)
        .map(|(_, secs)| *secs)
        .unwrap_or(DEFAULT_TTL_SECONDS)
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    stored_at: DateTime<Utc>,
    /// None means session lifetime (no expiry)
    ttl_seconds: Option<i64>,
    scope: Option<String>,
    size_bytes: usize,
}

impl CacheEntry {
    /// Pure predicate of `now - stored_at > ttl`; safe to evaluate
    /// optimistically from sweeps running alongside reads
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.ttl_seconds {
            Some(ttl) => (now - self.stored_at).num_seconds() > ttl,
            None => false,
        }
    }

    /// Kind of a composite map key: the logical key before the scope
    /// separator, trimmed to its leading segment
    fn kind(key: &str) -> &str {
        let logical = key.split('@').next().unwrap_or(key);
        logical.split(':').next().unwrap_or(logical)
    }
}

/// Cache statistics snapshot
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub expired_unswept: usize,
    pub estimated_bytes: usize,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    /// Top key kinds by entry volume, descending
    pub top_kinds: Vec<(String, usize)>,
}

/// Tri-state health derived from the statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CacheHealthStatus {
    Healthy,
    Warning,
    Critical,
}

impl CacheHealthStatus {
    pub fn display_name(&self) -> &str {
        match self {
            CacheHealthStatus::Healthy => "Healthy",
            CacheHealthStatus::Warning => "Warning",
            CacheHealthStatus::Critical => "Critical",
        }
    }
}

/// Health report with actionable recommendations
#[derive(Debug, Clone, Serialize)]
pub struct CacheHealth {
    pub status: CacheHealthStatus,
    pub recommendations: Vec<String>,
    pub stats: CacheStats,
}

/// The shared analytics cache. Cheap to clone behind an `Arc`; tolerates
/// concurrent reads and writes without cross-key transactional
/// guarantees.
pub struct AnalyticsCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    hits: AtomicU64,
    misses: AtomicU64,
    last_sweep: RwLock<DateTime<Utc>>,
    max_entries: usize,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for AnalyticsCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalyticsCache")
            .field("entries", &self.entries.read().len())
            .field("max_entries", &self.max_entries)
            .finish()
    }
}

impl Default for AnalyticsCache {
    fn default() -> Self {
        Self::new()
    }
}

impl AnalyticsCache {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        let now = clock.now();
        Self {
            entries: RwLock::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            last_sweep: RwLock::new(now),
            max_entries: 10_000,
            clock,
        }
    }

    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }

    fn composite_key(key: &str, scope: Option<&str>) -> String {
        match scope {
            Some(scope) => format!("{key}@{scope}"),
            None => key.to_string(),
        }
    }

    /// Look up a value. Absent both when the key was never set and when
    /// its TTL has elapsed; expired entries are evicted on the way out.
    pub fn get(&self, key: &str, scope: Option<&str>) -> Option<Value> {
        let ck = Self::composite_key(key, scope);
        let now = self.clock.now();

        let expired = {
            let entries = self.entries.read();
            match entries.get(&ck) {
                Some(entry) if entry.is_expired(now) => true,
                Some(entry) => {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    return Some(entry.value.clone());
                }
                None => {
                    self.misses.fetch_add(1, Ordering::Relaxed);
                    return None;
                }
            }
        };

        if expired {
            // Lazy eviction; re-check expiry under the write lock since a
            // concurrent set may have refreshed the entry
            let mut entries = self.entries.write();
            if entries.get(&ck).is_some_and(|e| e.is_expired(now)) {
                entries.remove(&ck);
            }
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Store a value under the key's retention class. Returns the class
    /// the key resolved to; `NeverCache` writes are dropped.
    pub fn set(
        &self,
        key: &str,
        value: Value,
        scope: Option<&str>,
        ttl_override: Option<i64>,
    ) -> KeyClass {
        let class = classify_key(key);
        match class {
            KeyClass::NeverCache => {
                log::debug!("cache: dropping never-cache write for {key}");
            }
            KeyClass::Session | KeyClass::TtlBounded => {
                let ttl_seconds = match class {
                    KeyClass::Session => None,
                    _ => Some(ttl_override.unwrap_or_else(|| ttl_for_key(key))),
                };
                let size_bytes = estimate_size(&value);
                let entry = CacheEntry {
                    value,
                    stored_at: self.clock.now(),
                    ttl_seconds,
                    scope: scope.map(str::to_string),
                    size_bytes,
                };
                self.entries
                    .write()
                    .insert(Self::composite_key(key, scope), entry);
            }
        }
        class
    }

    /// Remove every entry whose key contains `pattern`, optionally
    /// restricted to one scope. Full scan by design; working sets are
    /// small enough that an index is not worth its bookkeeping.
    pub fn invalidate(&self, pattern: &str, scope: Option<&str>) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|key, entry| {
            let key_matches = key.contains(pattern);
            let scope_matches = match scope {
                Some(scope) => entry.scope.as_deref() == Some(scope),
                None => true,
            };
            !(key_matches && scope_matches)
        });
        before - entries.len()
    }

    /// Drop every entry in the given scope
    pub fn clear_scope(&self, scope: &str) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| entry.scope.as_deref() != Some(scope));
        before - entries.len()
    }

    pub fn clear_all(&self) {
        self.entries.write().clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    /// Prepare scopes for a burst of reads by dropping their already
    /// expired entries
    pub fn warm(&self, scopes: &[String]) {
        let now = self.clock.now();
        let mut entries = self.entries.write();
        entries.retain(|_, entry| {
            let in_scope = entry
                .scope
                .as_deref()
                .is_some_and(|s| scopes.iter().any(|w| w == s));
            !(in_scope && entry.is_expired(now))
        });
    }

    /// Opportunistic full sweep of expired entries, rate-limited to once
    /// per five minutes. Returns the number of entries removed. Intended
    /// to be called from a spawned task after writes, never from a read
    /// path.
    pub fn maybe_sweep(&self) -> usize {
        let now = self.clock.now();
        {
            let mut last = self.last_sweep.write();
            if (now - *last).num_seconds() < SWEEP_INTERVAL_SECONDS {
                return 0;
            }
            *last = now;
        }
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        let removed = before - entries.len();
        if removed > 0 {
            log::debug!("cache: swept {removed} expired entries");
        }
        removed
    }

    pub fn stats(&self) -> CacheStats {
        let now = self.clock.now();
        let entries = self.entries.read();
        let expired_unswept = entries.values().filter(|e| e.is_expired(now)).count();
        let estimated_bytes = entries.values().map(|e| e.size_bytes).sum();

        let mut by_kind: HashMap<String, usize> = HashMap::new();
        for key in entries.keys() {
            *by_kind.entry(CacheEntry::kind(key).to_string()).or_default() += 1;
        }
        let mut top_kinds: Vec<(String, usize)> = by_kind.into_iter().collect();
        top_kinds.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        top_kinds.truncate(5);

        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let lookups = hits + misses;
        let hit_rate = if lookups > 0 {
            hits as f64 / lookups as f64
        } else {
            0.0
        };

        CacheStats {
            entries: entries.len(),
            expired_unswept,
            estimated_bytes,
            hits,
            misses,
            hit_rate,
            top_kinds,
        }
    }

    pub fn health(&self) -> CacheHealth {
        let stats = self.stats();
        let mut recommendations = Vec::new();

        let expired_ratio = if stats.entries > 0 {
            stats.expired_unswept as f64 / stats.entries as f64
        } else {
            0.0
        };
        if expired_ratio > 0.3 {
            recommendations.push(format!(
                "{:.0}% of entries are expired but unswept; consider invalidating idle scopes",
                expired_ratio * 100.0
            ));
        }

        let lookups = stats.hits + stats.misses;
        if lookups >= MIN_OBSERVATIONS_FOR_HIT_RATE && stats.hit_rate < 0.5 {
            recommendations.push(format!(
                "hit rate is {:.0}%; results may be expiring faster than they are reused",
                stats.hit_rate * 100.0
            ));
        }

        if stats.entries > self.max_entries {
            recommendations.push(format!(
                "entry count {} exceeds the configured ceiling {}; clear unused scopes",
                stats.entries, self.max_entries
            ));
        }

        let status = match recommendations.len() {
            0 => CacheHealthStatus::Healthy,
            1 => CacheHealthStatus::Warning,
            _ => CacheHealthStatus::Critical,
        };

        CacheHealth {
            status,
            recommendations,
            stats,
        }
    }
}

/// Rough serialized size; good enough for the footprint gauge
fn estimate_size(value: &Value) -> usize {
    serde_json::to_string(value).map(|s| s.len()).unwrap_or(0)
}
