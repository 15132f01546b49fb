//! LeaseStore — redb-backed lease persistence.
//!
//! Lease records are JSON-serialized into redb's `&[u8]` value column and
//! keyed `{prefix}..{lease_token}`, so one file can hold the leases of
//! several processors. The leases table is created lazily by the first
//! write: a store nobody has written to reports `NotFound` to the
//! estimator, the same way a missing lease container does.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use redb::{Database, ReadableDatabase, ReadableTable, TableError};
use tracing::debug;

use feedscale_metrics::{ChangeFeedEstimator, EstimatorError, LeaseEstimate};

use crate::error::{LeaseError, LeaseResult};
use crate::tables::LEASES;
use crate::types::{LeaseRecord, lease_key};

/// Convert any `Display` error into a `LeaseError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| LeaseError::$variant(e.to_string())
    };
}

/// Thread-safe lease store backed by redb.
#[derive(Clone)]
pub struct LeaseStore {
    db: Arc<Database>,
}

impl LeaseStore {
    /// Open (or create) a persistent lease store at the given path.
    pub fn open(path: &Path) -> LeaseResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        debug!(?path, "lease store opened");
        Ok(Self { db: Arc::new(db) })
    }

    /// Open an existing lease store; `NotFound` if the file is absent.
    pub fn open_existing(path: &Path) -> LeaseResult<Self> {
        if !path.exists() {
            return Err(LeaseError::NotFound(path.display().to_string()));
        }
        let db = Database::open(path).map_err(map_err!(Open))?;
        Ok(Self { db: Arc::new(db) })
    }

    /// Create an ephemeral in-memory lease store (for testing).
    pub fn open_in_memory() -> LeaseResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        debug!("in-memory lease store opened");
        Ok(Self { db: Arc::new(db) })
    }

    /// Insert or replace a lease.
    pub fn put_lease(&self, lease: &LeaseRecord) -> LeaseResult<()> {
        let key = lease.table_key();
        let value = serde_json::to_vec(lease).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(LEASES).map_err(map_err!(Table))?;
            table
                .insert(key.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%key, "lease stored");
        Ok(())
    }

    /// Get a single lease.
    pub fn get_lease(&self, prefix: &str, lease_token: &str) -> LeaseResult<Option<LeaseRecord>> {
        let key = lease_key(prefix, lease_token);
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = match txn.open_table(LEASES) {
            Ok(t) => t,
            Err(TableError::TableDoesNotExist(_)) => return Ok(None),
            Err(e) => return Err(LeaseError::Table(e.to_string())),
        };
        match table.get(key.as_str()).map_err(map_err!(Read))? {
            Some(guard) => {
                let lease: LeaseRecord =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(lease))
            }
            None => Ok(None),
        }
    }

    /// List all leases of a processor, ordered by key.
    pub fn list_leases(&self, prefix: &str) -> LeaseResult<Vec<LeaseRecord>> {
        match self.scan(prefix) {
            Err(ScanError::NoTable) => Ok(Vec::new()),
            Err(ScanError::Lease(e)) => Err(e),
            Ok(leases) => Ok(leases),
        }
    }

    /// Delete a lease. Returns true if it existed.
    pub fn delete_lease(&self, prefix: &str, lease_token: &str) -> LeaseResult<bool> {
        let key = lease_key(prefix, lease_token);
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut table = txn.open_table(LEASES).map_err(map_err!(Table))?;
            existed = table.remove(key.as_str()).map_err(map_err!(Write))?.is_some();
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%key, existed, "lease deleted");
        Ok(existed)
    }

    /// Record new writes on a partition, creating the lease if needed.
    pub fn advance_head(&self, prefix: &str, lease_token: &str, head: u64) -> LeaseResult<LeaseRecord> {
        self.update(prefix, lease_token, true, |lease| {
            lease.head = lease.head.max(head);
        })
    }

    /// Record processing progress on an existing lease.
    pub fn checkpoint(
        &self,
        prefix: &str,
        lease_token: &str,
        owner: &str,
        position: u64,
    ) -> LeaseResult<LeaseRecord> {
        self.update(prefix, lease_token, false, |lease| {
            lease.owner = Some(owner.to_string());
            lease.checkpoint = position.min(lease.head);
        })
    }

    /// Read-modify-write of one lease inside a single write transaction.
    fn update(
        &self,
        prefix: &str,
        lease_token: &str,
        create: bool,
        apply: impl FnOnce(&mut LeaseRecord),
    ) -> LeaseResult<LeaseRecord> {
        let key = lease_key(prefix, lease_token);
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let lease = {
            let mut table = txn.open_table(LEASES).map_err(map_err!(Table))?;
            let existing = table
                .get(key.as_str())
                .map_err(map_err!(Read))?
                .map(|guard| guard.value().to_vec());

            let mut lease = match existing {
                Some(bytes) => {
                    serde_json::from_slice(&bytes).map_err(map_err!(Deserialize))?
                }
                None if create => LeaseRecord::new(prefix, lease_token),
                None => return Err(LeaseError::NotFound(key)),
            };
            apply(&mut lease);
            lease.updated_at = epoch_secs();

            let value = serde_json::to_vec(&lease).map_err(map_err!(Serialize))?;
            table
                .insert(key.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
            lease
        };
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(lease)
    }

    fn scan(&self, prefix: &str) -> Result<Vec<LeaseRecord>, ScanError> {
        let key_prefix = lease_key(prefix, "");
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = match txn.open_table(LEASES) {
            Ok(t) => t,
            Err(TableError::TableDoesNotExist(_)) => return Err(ScanError::NoTable),
            Err(e) => return Err(LeaseError::Table(e.to_string()).into()),
        };
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (key, value) = entry.map_err(map_err!(Read))?;
            if !key.value().starts_with(&key_prefix) {
                continue;
            }
            let lease: LeaseRecord =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            // "proc" shares a key prefix with "proc.": "proc...0" starts with "proc..".
            if lease.prefix == prefix {
                results.push(lease);
            }
        }
        Ok(results)
    }

    fn estimates(&self, processor: &str) -> Result<Vec<LeaseEstimate>, EstimatorError> {
        match self.scan(processor) {
            Ok(leases) => Ok(leases
                .iter()
                .map(|l| LeaseEstimate::new(l.lease_token.clone(), l.estimated_lag()))
                .collect()),
            Err(ScanError::NoTable) => Err(EstimatorError::NotFound(
                "Resource Not Found: the lease container has not been created".to_string(),
            )),
            Err(ScanError::Lease(e)) => Err(e.into()),
        }
    }
}

enum ScanError {
    NoTable,
    Lease(LeaseError),
}

impl From<LeaseError> for ScanError {
    fn from(e: LeaseError) -> Self {
        ScanError::Lease(e)
    }
}

impl From<LeaseError> for EstimatorError {
    fn from(e: LeaseError) -> Self {
        match e {
            LeaseError::NotFound(what) => {
                EstimatorError::NotFound(format!("Resource Not Found: {what}"))
            }
            other => EstimatorError::Backend {
                status: None,
                message: other.to_string(),
            },
        }
    }
}

#[async_trait]
impl ChangeFeedEstimator for LeaseStore {
    async fn estimate(&self, processor: &str) -> Result<Vec<LeaseEstimate>, EstimatorError> {
        let store = self.clone();
        let processor = processor.to_string();
        run_blocking(move || store.estimates(&processor)).await
    }
}

/// Estimator that opens the lease file on every query.
///
/// Leaves the file unlocked between polls so the workers that own the
/// leases can write to it.
#[derive(Debug, Clone)]
pub struct LeaseFileEstimator {
    path: PathBuf,
}

impl LeaseFileEstimator {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ChangeFeedEstimator for LeaseFileEstimator {
    async fn estimate(&self, processor: &str) -> Result<Vec<LeaseEstimate>, EstimatorError> {
        let path = self.path.clone();
        let processor = processor.to_string();
        run_blocking(move || LeaseStore::open_existing(&path)?.estimates(&processor)).await
    }
}

/// Run redb I/O off the async worker threads so callers' timeouts apply.
async fn run_blocking<F>(f: F) -> Result<Vec<LeaseEstimate>, EstimatorError>
where
    F: FnOnce() -> Result<Vec<LeaseEstimate>, EstimatorError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| EstimatorError::Backend {
            status: None,
            message: format!("lease store task failed: {e}"),
        })?
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
