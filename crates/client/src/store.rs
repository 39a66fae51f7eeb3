//! Transaction store
//!
//! An entity's pending transaction is kept under its id. Once the confirmed
//! tick reaches it the record is archived under `id-tick`, where it stays
//! until removed explicitly.

use crate::error::StoreError;
use dashmap::DashMap;
use std::path::Path;

fn archive_key(id: &str, tick: u32) -> String {
    format!("{}-{}", id, tick)
}

/// Storage of encoded outgoing transactions
pub trait TransactionStore: Send + Sync {
    /// Pending transaction of `id`, or the archived one at `tick`
    fn get(&self, id: &str, tick: Option<u32>) -> Result<Option<Vec<u8>>, StoreError>;

    /// Store the pending transaction of `id`
    fn append(&self, id: &str, transaction: &[u8]) -> Result<(), StoreError>;

    /// Delete the archived transaction at `tick`
    fn remove(&self, id: &str, tick: u32) -> Result<(), StoreError>;

    /// Move the pending transaction of `id` to its archive key
    fn archive(&self, id: &str, tick: u32) -> Result<(), StoreError>;
}

/// Process-local store
#[derive(Debug, Default)]
pub struct MemoryStore {
    transactions: DashMap<String, Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }
}

impl TransactionStore for MemoryStore {
    fn get(&self, id: &str, tick: Option<u32>) -> Result<Option<Vec<u8>>, StoreError> {
        let key = match tick {
            Some(tick) => archive_key(id, tick),
            None => id.to_string(),
        };
        Ok(self.transactions.get(&key).map(|r| r.value().clone()))
    }

    fn append(&self, id: &str, transaction: &[u8]) -> Result<(), StoreError> {
        self.transactions.insert(id.to_string(), transaction.to_vec());
        Ok(())
    }

    fn remove(&self, id: &str, tick: u32) -> Result<(), StoreError> {
        self.transactions.remove(&archive_key(id, tick));
        Ok(())
    }

    fn archive(&self, id: &str, tick: u32) -> Result<(), StoreError> {
        let (_, transaction) = self
            .transactions
            .remove(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        self.transactions.insert(archive_key(id, tick), transaction);
        Ok(())
    }
}

/// Store backed by a sled database
pub struct SledStore {
    db: sled::Db,
    transactions: sled::Tree,
}

impl SledStore {
    /// Open or create a store at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let db = sled::open(&path)?;
        let transactions = db.open_tree("transactions")?;

        tracing::info!("Opened transaction store at {:?}", path.as_ref());

        Ok(Self { db, transactions })
    }

    /// Flush all pending writes to disk
    pub fn flush(&self) -> Result<(), StoreError> {
        self.db.flush()?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }
}

impl TransactionStore for SledStore {
    fn get(&self, id: &str, tick: Option<u32>) -> Result<Option<Vec<u8>>, StoreError> {
        let value = match tick {
            Some(tick) => self.transactions.get(archive_key(id, tick))?,
            None => self.transactions.get(id)?,
        };
        Ok(value.map(|bytes| bytes.to_vec()))
    }

    fn append(&self, id: &str, transaction: &[u8]) -> Result<(), StoreError> {
        self.transactions.insert(id, transaction)?;
        self.transactions.flush()?;
        Ok(())
    }

    fn remove(&self, id: &str, tick: u32) -> Result<(), StoreError> {
        self.transactions.remove(archive_key(id, tick))?;
        Ok(())
    }

    fn archive(&self, id: &str, tick: u32) -> Result<(), StoreError> {
        let transaction = self
            .transactions
            .get(id)?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        let mut batch = sled::Batch::default();
        batch.insert(archive_key(id, tick).as_bytes(), transaction);
        batch.remove(id.as_bytes());
        self.transactions.apply_batch(batch)?;
        Ok(())
    }
}
