//! Append-only transaction log.
//!
//! One record per balance mutation, written in the same atomic batch as the
//! balance itself. Keys sort newest-first per user by using an inverted
//! sequence number as the sort key:
//! `txn:user:` | user_id(be) | inv_seq(be)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::{LedgerError, LedgerResult};
use crate::storage::RecordStore;

pub(crate) const TXN_USER_PREFIX: &[u8] = b"txn:user:";
pub(crate) const TXN_SEQ_KEY: &[u8] = b"txn:seq";

/// Opaque account identity (chat-platform user id).
#[derive(
    Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Balance-affecting event kinds.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TxnKind {
    Daily,
    CoinflipWin,
    CoinflipLoss,
    SlotsWin,
    SlotsLoss,
    MinesWin,
    MinesLoss,
    TowerWin,
    TowerLoss,
    RouletteWin,
    RouletteLoss,
    TransferIn,
    TransferOut,
    RedeemRequest,
    RedeemRefund,
    OwnerSet,
}

impl fmt::Display for TxnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TxnKind::Daily => "daily",
            TxnKind::CoinflipWin => "coinflip_win",
            TxnKind::CoinflipLoss => "coinflip_loss",
            TxnKind::SlotsWin => "slots_win",
            TxnKind::SlotsLoss => "slots_loss",
            TxnKind::MinesWin => "mines_win",
            TxnKind::MinesLoss => "mines_loss",
            TxnKind::TowerWin => "tower_win",
            TxnKind::TowerLoss => "tower_loss",
            TxnKind::RouletteWin => "roulette_win",
            TxnKind::RouletteLoss => "roulette_loss",
            TxnKind::TransferIn => "transfer_in",
            TxnKind::TransferOut => "transfer_out",
            TxnKind::RedeemRequest => "redeem_request",
            TxnKind::RedeemRefund => "redeem_refund",
            TxnKind::OwnerSet => "owner_set",
        };
        write!(f, "{}", name)
    }
}

/// Immutable log entry for one balance mutation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: u64,
    pub user_id: UserId,
    pub kind: TxnKind,
    /// Signed delta applied to the balance (`OwnerSet` stores the new value).
    pub amount: i64,
    pub timestamp: DateTime<Utc>,
    pub details: String,
}

pub(crate) fn txn_key(user: UserId, seq: u64) -> Vec<u8> {
    let inv_seq = u64::MAX - seq;
    let mut key = Vec::with_capacity(TXN_USER_PREFIX.len() + 16);
    key.extend_from_slice(TXN_USER_PREFIX);
    key.extend_from_slice(&user.0.to_be_bytes());
    key.extend_from_slice(&inv_seq.to_be_bytes());
    key
}

pub(crate) fn user_txn_prefix(user: UserId) -> Vec<u8> {
    let mut key = Vec::with_capacity(TXN_USER_PREFIX.len() + 8);
    key.extend_from_slice(TXN_USER_PREFIX);
    key.extend_from_slice(&user.0.to_be_bytes());
    key
}

/// Load a user's records, newest first.
pub fn load_history(
    store: &RecordStore,
    user: UserId,
    limit: usize,
) -> LedgerResult<Vec<TransactionRecord>> {
    let rows = store.scan_prefix(&user_txn_prefix(user), limit.max(1))?;
    let mut records = Vec::with_capacity(rows.len());
    for (key, value) in rows {
        let record: TransactionRecord = serde_json::from_slice(&value).map_err(|e| {
            LedgerError::Storage(format!(
                "failed to decode transaction record at key {:?}: {}",
                key, e
            ))
        })?;
        records.push(record);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_txn_keys_sort_newest_first() {
        let user = UserId(42);
        let k1 = txn_key(user, 1);
        let k2 = txn_key(user, 2);
        // Higher sequence must sort before lower (inverted key).
        assert!(k2 < k1);
    }

    #[test]
    fn test_user_prefix_isolates_users() {
        let a = txn_key(UserId(1), 7);
        assert!(a.starts_with(&user_txn_prefix(UserId(1))));
        assert!(!a.starts_with(&user_txn_prefix(UserId(2))));
    }

    #[test]
    fn test_kind_names_are_snake_case() {
        assert_eq!(TxnKind::CoinflipWin.to_string(), "coinflip_win");
        assert_eq!(TxnKind::RedeemRequest.to_string(), "redeem_request");
        assert_eq!(TxnKind::OwnerSet.to_string(), "owner_set");
        assert_eq!(
            serde_json::to_string(&TxnKind::SlotsLoss).unwrap(),
            "\"slots_loss\""
        );
    }
}
