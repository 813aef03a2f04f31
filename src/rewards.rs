//! Staff-configurable reward catalog.
//!
//! Entries are `(cost, payout)` pairs referenced by id from redeem requests.
//! Deleting an entry never alters requests that already reference it.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::errors::{LedgerError, LedgerResult};
use crate::storage::RecordStore;

const REWARD_PREFIX: &[u8] = b"reward:entry:";
const REWARD_SEQ_KEY: &[u8] = b"reward:seq";

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RewardCatalogEntry {
    pub id: u64,
    /// CYAN debited from the requester.
    pub cost: u64,
    /// Staff-fulfilled payout value (whatever unit staff honor).
    pub payout: u64,
}

fn reward_key(id: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(REWARD_PREFIX.len() + 8);
    key.extend_from_slice(REWARD_PREFIX);
    key.extend_from_slice(&id.to_be_bytes());
    key
}

pub struct RewardCatalog {
    store: RecordStore,
    seq: AtomicU64,
}

impl RewardCatalog {
    pub fn open(store: RecordStore) -> LedgerResult<Self> {
        let next_seq = match store.get(REWARD_SEQ_KEY)? {
            Some(bytes) => {
                let arr: [u8; 8] = bytes.as_slice().try_into().map_err(|_| {
                    LedgerError::Storage("corrupt reward sequence cursor".to_string())
                })?;
                u64::from_be_bytes(arr)
            }
            None => 0,
        };
        Ok(Self {
            store,
            seq: AtomicU64::new(next_seq),
        })
    }

    pub fn add(&self, cost: u64, payout: u64) -> LedgerResult<RewardCatalogEntry> {
        if cost == 0 || payout == 0 {
            return Err(LedgerError::InvalidSelection(
                "reward cost and payout must be positive".to_string(),
            ));
        }
        let id = self.seq.fetch_add(1, Ordering::SeqCst);
        let entry = RewardCatalogEntry { id, cost, payout };
        self.store.batch_write(&[
            (reward_key(id), serde_json::to_vec(&entry)?),
            (
                REWARD_SEQ_KEY.to_vec(),
                self.seq.load(Ordering::SeqCst).to_be_bytes().to_vec(),
            ),
        ])?;
        tracing::info!(id, cost, payout, "reward added");
        Ok(entry)
    }

    pub fn get(&self, id: u64) -> LedgerResult<RewardCatalogEntry> {
        match self.store.get(&reward_key(id))? {
            Some(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                LedgerError::Storage(format!("failed to decode reward {}: {}", id, e))
            }),
            None => Err(LedgerError::InvalidRewardId(id)),
        }
    }

    pub fn remove(&self, id: u64) -> LedgerResult<()> {
        // Existence check first so staff get a clear error for stale ids.
        self.get(id)?;
        self.store.delete(&reward_key(id))?;
        tracing::info!(id, "reward removed");
        Ok(())
    }

    pub fn list(&self) -> LedgerResult<Vec<RewardCatalogEntry>> {
        let rows = self.store.scan_prefix(REWARD_PREFIX, usize::MAX)?;
        let mut entries = Vec::with_capacity(rows.len());
        for (key, value) in rows {
            let entry: RewardCatalogEntry = serde_json::from_slice(&value).map_err(|e| {
                LedgerError::Storage(format!("failed to decode reward at {:?}: {}", key, e))
            })?;
            entries.push(entry);
        }
        Ok(entries)
    }
}
