//! Adapter ports consumed by the core.
//!
//! These traits are the boundary between the Tiered Storage Engine / cache
//! layers and the concrete stores that hold bytes. Production deployments
//! implement them against a real fast key-value store and a real
//! relational store; this crate ships in-memory defaults so the engine is
//! fully testable without either.

use crate::error::{Error, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

// =============================================================================
// KeyValueAdapter — fast in-memory key lookup with TTL
// =============================================================================

/// Point-in-time snapshot of adapter-reported statistics, as a real
/// Redis-like store would expose via `INFO`.
#[derive(Debug, Clone, Default)]
pub struct KeyValueStats {
    pub keyspace_hits: u64,
    pub keyspace_misses: u64,
    pub used_memory: u64,
    pub maxmemory: u64,
}

/// Fast key-value store with TTL: `Get/Set/Del/Exists/TTL/Keys(pattern)`.
#[async_trait]
pub trait KeyValueAdapter: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()>;
    async fn del(&self, key: &str) -> Result<u64>;
    async fn exists(&self, key: &str) -> Result<bool>;
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool>;
    async fn ttl(&self, key: &str) -> Result<Option<Duration>>;
    async fn keys(&self, pattern: &str) -> Result<Vec<String>>;
    async fn info_stats(&self) -> Result<KeyValueStats>;

    /// Publish a message to a channel. Adapters without pub/sub support
    /// may no-op; callers must not depend on delivery.
    async fn publish(&self, _channel: &str, _message: &str) -> Result<()> {
        Ok(())
    }
}

pub type KeyValueAdapterRef = Arc<dyn KeyValueAdapter>;

struct KvRecord {
    value: Vec<u8>,
    expires_at: Option<std::time::Instant>,
}

/// In-memory [`KeyValueAdapter`], the default HOT-tier / L2 backing store.
pub struct InMemoryKeyValueStore {
    data: Mutex<HashMap<String, KvRecord>>,
    hits: std::sync::atomic::AtomicU64,
    misses: std::sync::atomic::AtomicU64,
}

impl InMemoryKeyValueStore {
    pub fn new() -> Self {
        Self {
            data: Mutex::new(HashMap::new()),
            hits: std::sync::atomic::AtomicU64::new(0),
            misses: std::sync::atomic::AtomicU64::new(0),
        }
    }

    fn is_expired(record: &KvRecord) -> bool {
        record
            .expires_at
            .is_some_and(|at| std::time::Instant::now() >= at)
    }
}

impl Default for InMemoryKeyValueStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueAdapter for InMemoryKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut guard = self.data.lock();
        if let Some(record) = guard.get(key) {
            if Self::is_expired(record) {
                guard.remove(key);
                self.misses.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                return Ok(None);
            }
            self.hits.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            Ok(Some(record.value.clone()))
        } else {
            self.misses.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            Ok(None)
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        let expires_at = ttl.map(|d| std::time::Instant::now() + d);
        self.data.lock().insert(
            key.to_string(),
            KvRecord {
                value,
                expires_at,
            },
        );
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<u64> {
        Ok(self.data.lock().remove(key).map_or(0, |_| 1))
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let guard = self.data.lock();
        Ok(guard.get(key).is_some_and(|r| !Self::is_expired(r)))
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        let mut guard = self.data.lock();
        if let Some(record) = guard.get_mut(key) {
            record.expires_at = Some(std::time::Instant::now() + ttl);
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>> {
        let guard = self.data.lock();
        Ok(guard.get(key).and_then(|r| {
            r.expires_at.map(|at| at.saturating_duration_since(std::time::Instant::now()))
        }))
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>> {
        let guard = self.data.lock();
        let matcher = glob::Pattern::new(pattern)
            .map_err(|e| Error::Internal(format!("invalid key pattern: {e}")))?;
        Ok(guard
            .iter()
            .filter(|(_, r)| !Self::is_expired(r))
            .map(|(k, _)| k.clone())
            .filter(|k| matcher.matches(k))
            .collect())
    }

    async fn info_stats(&self) -> Result<KeyValueStats> {
        let guard = self.data.lock();
        let used_memory: u64 = guard.values().map(|r| r.value.len() as u64).sum();
        Ok(KeyValueStats {
            keyspace_hits: self.hits.load(std::sync::atomic::Ordering::Relaxed),
            keyspace_misses: self.misses.load(std::sync::atomic::Ordering::Relaxed),
            used_memory,
            maxmemory: 0,
        })
    }
}

// =============================================================================
// StructuredStoreAdapter — durable keyed rows with tier-specific tables
// =============================================================================

/// Durable keyed-row store backing WARM/COLD/BACKUP. Narrowed from the
/// source's `query(sql, params)`/`transaction(fn)` surface to the typed
/// CRUD the engine actually issues, which is both safer and more
/// idiomatic than shipping a SQL string through the port.
#[async_trait]
pub trait StructuredStoreAdapter: Send + Sync {
    async fn put(&self, table: &str, key: &str, value: Vec<u8>) -> Result<()>;
    async fn get(&self, table: &str, key: &str) -> Result<Option<Vec<u8>>>;
    async fn delete(&self, table: &str, key: &str) -> Result<bool>;
    async fn exists(&self, table: &str, key: &str) -> Result<bool>;
    async fn keys(&self, table: &str) -> Result<Vec<String>>;

    /// Run `ops` as a single atomic unit. The in-memory default takes a
    /// global lock; a real relational adapter would open a transaction.
    async fn transaction(&self, ops: Vec<StructuredWrite>) -> Result<()> {
        for op in ops {
            match op {
                StructuredWrite::Put { table, key, value } => self.put(&table, &key, value).await?,
                StructuredWrite::Delete { table, key } => {
                    self.delete(&table, &key).await?;
                }
            }
        }
        Ok(())
    }
}

/// A single write inside a [`StructuredStoreAdapter::transaction`] batch.
pub enum StructuredWrite {
    Put { table: String, key: String, value: Vec<u8> },
    Delete { table: String, key: String },
}

pub type StructuredStoreAdapterRef = Arc<dyn StructuredStoreAdapter>;

/// In-memory [`StructuredStoreAdapter`], the default WARM/COLD/BACKUP /
/// L3 backing store. Tables are independent namespaces.
#[derive(Default)]
pub struct InMemoryStructuredStore {
    tables: Mutex<BTreeMap<String, BTreeMap<String, Vec<u8>>>>,
}

impl InMemoryStructuredStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StructuredStoreAdapter for InMemoryStructuredStore {
    async fn put(&self, table: &str, key: &str, value: Vec<u8>) -> Result<()> {
        self.tables
            .lock()
            .entry(table.to_string())
            .or_default()
            .insert(key.to_string(), value);
        Ok(())
    }

    async fn get(&self, table: &str, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self
            .tables
            .lock()
            .get(table)
            .and_then(|t| t.get(key))
            .cloned())
    }

    async fn delete(&self, table: &str, key: &str) -> Result<bool> {
        Ok(self
            .tables
            .lock()
            .get_mut(table)
            .and_then(|t| t.remove(key))
            .is_some())
    }

    async fn exists(&self, table: &str, key: &str) -> Result<bool> {
        Ok(self
            .tables
            .lock()
            .get(table)
            .is_some_and(|t| t.contains_key(key)))
    }

    async fn keys(&self, table: &str) -> Result<Vec<String>> {
        Ok(self
            .tables
            .lock()
            .get(table)
            .map(|t| t.keys().cloned().collect())
            .unwrap_or_default())
    }
}

// =============================================================================
// ObjectStoreAdapter — optional blob store for COLD/BACKUP
// =============================================================================

#[derive(Debug, Clone, Default)]
pub struct ObjectUploadOptions {
    pub content_type: Option<String>,
    pub metadata: BTreeMap<String, String>,
    pub compress: bool,
}

#[derive(Debug, Clone)]
pub struct ObjectUploadResult {
    pub etag: String,
}

#[derive(Debug, Clone, Default)]
pub struct ObjectDownloadOptions {
    pub decompress: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ObjectMetadata {
    pub size: u64,
    pub content_type: Option<String>,
    pub compressed: bool,
}

/// Optional blob store for COLD/BACKUP content. Compression is an
/// adapter-level concern; the in-memory default delegates to
/// [`crate::compression`].
#[async_trait]
pub trait ObjectStoreAdapter: Send + Sync {
    async fn upload(
        &self,
        key: &str,
        bytes: Vec<u8>,
        opts: ObjectUploadOptions,
    ) -> Result<ObjectUploadResult>;
    async fn download(&self, key: &str, opts: ObjectDownloadOptions) -> Result<Vec<u8>>;
    async fn delete(&self, key: &str) -> Result<()>;
    async fn list(&self, prefix: &str, max: usize) -> Result<Vec<String>>;
    async fn exists(&self, key: &str) -> Result<bool>;
    async fn head(&self, key: &str) -> Result<ObjectMetadata>;
}

pub type ObjectStoreAdapterRef = Arc<dyn ObjectStoreAdapter>;

struct ObjectRecord {
    bytes: Vec<u8>,
    content_type: Option<String>,
    compressed: bool,
    algorithm: crate::compression::CompressionAlgorithm,
}

/// In-memory [`ObjectStoreAdapter`] using the crate's own compression
/// manager, for standalone operation and tests.
pub struct InMemoryObjectStore {
    objects: Mutex<BTreeMap<String, ObjectRecord>>,
    compression: crate::compression::CompressionManager,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self {
            objects: Mutex::new(BTreeMap::new()),
            compression: crate::compression::CompressionManager::new(),
        }
    }
}

impl Default for InMemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectStoreAdapter for InMemoryObjectStore {
    async fn upload(
        &self,
        key: &str,
        bytes: Vec<u8>,
        opts: ObjectUploadOptions,
    ) -> Result<ObjectUploadResult> {
        let (stored, algorithm) = if opts.compress {
            let (compressed_bytes, algo) = self.compression.compress(&bytes);
            (compressed_bytes.to_vec(), algo)
        } else {
            (bytes, crate::compression::CompressionAlgorithm::None)
        };
        let compressed = algorithm != crate::compression::CompressionAlgorithm::None;
        let etag = format!("{:x}", md5_like_digest(&stored));
        self.objects.lock().insert(
            key.to_string(),
            ObjectRecord {
                bytes: stored,
                content_type: opts.content_type,
                compressed,
                algorithm,
            },
        );
        Ok(ObjectUploadResult { etag })
    }

    async fn download(&self, key: &str, opts: ObjectDownloadOptions) -> Result<Vec<u8>> {
        let guard = self.objects.lock();
        let record = guard.get(key).ok_or_else(|| Error::not_found(key))?;
        if opts.decompress && record.compressed {
            Ok(self
                .compression
                .decompress(&record.bytes, record.algorithm)?
                .to_vec())
        } else {
            Ok(record.bytes.clone())
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.objects.lock().remove(key);
        Ok(())
    }

    async fn list(&self, prefix: &str, max: usize) -> Result<Vec<String>> {
        Ok(self
            .objects
            .lock()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .take(max)
            .cloned()
            .collect())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.objects.lock().contains_key(key))
    }

    async fn head(&self, key: &str) -> Result<ObjectMetadata> {
        let guard = self.objects.lock();
        let record = guard.get(key).ok_or_else(|| Error::not_found(key))?;
        Ok(ObjectMetadata {
            size: record.bytes.len() as u64,
            content_type: record.content_type.clone(),
            compressed: record.compressed,
        })
    }
}

/// Cheap, dependency-free content fingerprint used as a synthetic etag.
fn md5_like_digest(data: &[u8]) -> u64 {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    data.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn kv_store_roundtrip_and_ttl() {
        let store = InMemoryKeyValueStore::new();
        store.set("k1", b"v1".to_vec(), None).await.unwrap();
        assert_eq!(store.get("k1").await.unwrap(), Some(b"v1".to_vec()));
        assert!(store.exists("k1").await.unwrap());
        assert_eq!(store.del("k1").await.unwrap(), 1);
        assert_eq!(store.get("k1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn kv_store_ttl_expires() {
        let store = InMemoryKeyValueStore::new();
        store
            .set("k1", b"v1".to_vec(), Some(Duration::from_millis(10)))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(store.get("k1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn kv_store_keys_pattern() {
        let store = InMemoryKeyValueStore::new();
        store.set("tier:hot:a", b"1".to_vec(), None).await.unwrap();
        store.set("tier:hot:b", b"2".to_vec(), None).await.unwrap();
        store.set("tier:warm:a", b"3".to_vec(), None).await.unwrap();
        let mut keys = store.keys("tier:hot:*").await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["tier:hot:a".to_string(), "tier:hot:b".to_string()]);
    }

    #[tokio::test]
    async fn structured_store_tables_are_independent() {
        let store = InMemoryStructuredStore::new();
        store.put("warm", "k1", b"v".to_vec()).await.unwrap();
        assert!(store.get("warm", "k1").await.unwrap().is_some());
        assert!(store.get("cold", "k1").await.unwrap().is_none());
        assert!(store.delete("warm", "k1").await.unwrap());
        assert!(!store.delete("warm", "k1").await.unwrap());
    }

    #[tokio::test]
    async fn object_store_compress_roundtrip() {
        let store = InMemoryObjectStore::new();
        let payload = b"hello hello hello hello hello hello hello hello".to_vec();
        store
            .upload(
                "k1",
                payload.clone(),
                ObjectUploadOptions {
                    compress: true,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let head = store.head("k1").await.unwrap();
        assert!(head.compressed);
        let back = store
            .download("k1", ObjectDownloadOptions { decompress: true })
            .await
            .unwrap();
        assert_eq!(back, payload);
    }
}
