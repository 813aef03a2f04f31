//! Durable record store backed by RocksDB.
//!
//! A thin wrapper exposing point reads, point writes, atomic multi-key
//! batches, and simple ordered prefix scans. Atomic batches are what keep a
//! balance write and its transaction record from ever diverging.

use rocksdb::{Direction, IteratorMode, Options, WriteBatch, DB};
use std::path::Path;
use std::sync::Arc;

use crate::errors::LedgerResult;

#[derive(Clone)]
pub struct RecordStore {
    db: Arc<DB>,
}

impl RecordStore {
    pub fn open<P: AsRef<Path>>(path: P) -> LedgerResult<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);

        let db = DB::open(&opts, path)?;
        Ok(Self { db: Arc::new(db) })
    }

    pub fn get(&self, key: &[u8]) -> LedgerResult<Option<Vec<u8>>> {
        Ok(self.db.get(key)?)
    }

    pub fn put(&self, key: &[u8], value: &[u8]) -> LedgerResult<()> {
        Ok(self.db.put(key, value)?)
    }

    pub fn delete(&self, key: &[u8]) -> LedgerResult<()> {
        Ok(self.db.delete(key)?)
    }

    /// Write all items atomically: either every key lands or none do.
    pub fn batch_write<K, V>(&self, items: &[(K, V)]) -> LedgerResult<()>
    where
        K: AsRef<[u8]>,
        V: AsRef<[u8]>,
    {
        let mut batch = WriteBatch::default();
        for (key, value) in items {
            batch.put(key, value);
        }
        Ok(self.db.write(batch)?)
    }

    /// Ordered scan of every key starting with `prefix`, up to `limit` rows.
    pub fn scan_prefix(&self, prefix: &[u8], limit: usize) -> LedgerResult<Vec<(Vec<u8>, Vec<u8>)>> {
        let mut rows = Vec::new();
        let iter = self
            .db
            .iterator(IteratorMode::From(prefix, Direction::Forward));
        for item in iter {
            let (key, value) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            rows.push((key.to_vec(), value.to_vec()));
            if rows.len() >= limit {
                break;
            }
        }
        Ok(rows)
    }
}
