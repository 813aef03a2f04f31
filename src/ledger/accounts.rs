//! Account store and concurrency gate.
//!
//! All balance mutations across all users funnel through one mutex, so no
//! two read-modify-write sequences interleave. Every successful mutation
//! writes the balance, its transaction record, and the sequence cursor in a
//! single atomic batch before the gate is released; balance and log cannot
//! diverge.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use crate::errors::{LedgerError, LedgerResult};
use crate::ledger::transactions::{
    load_history, txn_key, TransactionRecord, TxnKind, UserId, TXN_SEQ_KEY, TXN_USER_PREFIX,
};
use crate::storage::RecordStore;

const ACCOUNT_PREFIX: &[u8] = b"account:";

/// Persistent per-user balance record. Created lazily on first mutation,
/// never deleted.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Account {
    pub user_id: UserId,
    pub balance: u64,
    pub last_claim_at: Option<DateTime<Utc>>,
}

impl Account {
    fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            balance: 0,
            last_claim_at: None,
        }
    }
}

fn account_key(user: UserId) -> Vec<u8> {
    let mut key = Vec::with_capacity(ACCOUNT_PREFIX.len() + 8);
    key.extend_from_slice(ACCOUNT_PREFIX);
    key.extend_from_slice(&user.0.to_be_bytes());
    key
}

/// The account store plus transaction log, guarded by the concurrency gate.
pub struct Ledger {
    store: RecordStore,
    gate: Mutex<()>,
    txn_seq: AtomicU64,
}

impl Ledger {
    /// Open the ledger over a record store, restoring the transaction
    /// sequence cursor.
    pub fn open(store: RecordStore) -> LedgerResult<Self> {
        let next_seq = match store.get(TXN_SEQ_KEY)? {
            Some(bytes) => {
                let arr: [u8; 8] = bytes.as_slice().try_into().map_err(|_| {
                    LedgerError::Storage("corrupt transaction sequence cursor".to_string())
                })?;
                u64::from_be_bytes(arr)
            }
            None => 0,
        };
        Ok(Self {
            store,
            gate: Mutex::new(()),
            txn_seq: AtomicU64::new(next_seq),
        })
    }

    fn gate(&self) -> MutexGuard<'_, ()> {
        // A poisoned gate means a panic mid-mutation; continuing is safe
        // because every mutation commits through one atomic batch.
        self.gate.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn load_account(&self, user: UserId) -> LedgerResult<Account> {
        match self.store.get(&account_key(user))? {
            Some(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                LedgerError::Storage(format!("failed to decode account {}: {}", user, e))
            }),
            None => Ok(Account::new(user)),
        }
    }

    /// Commit one or more account writes plus their records atomically.
    /// Callers must hold the gate.
    fn commit(
        &self,
        accounts: &[&Account],
        mutations: &[(UserId, TxnKind, i64, String)],
    ) -> LedgerResult<()> {
        let mut items: Vec<(Vec<u8>, Vec<u8>)> = Vec::with_capacity(accounts.len() + mutations.len() + 1);
        for account in accounts {
            items.push((account_key(account.user_id), serde_json::to_vec(account)?));
        }
        for (user, kind, amount, details) in mutations {
            let id = self.txn_seq.fetch_add(1, Ordering::SeqCst);
            let record = TransactionRecord {
                id,
                user_id: *user,
                kind: *kind,
                amount: *amount,
                timestamp: Utc::now(),
                details: details.clone(),
            };
            items.push((txn_key(*user, id), serde_json::to_vec(&record)?));
        }
        let next_seq = self.txn_seq.load(Ordering::SeqCst);
        items.push((TXN_SEQ_KEY.to_vec(), next_seq.to_be_bytes().to_vec()));
        self.store.batch_write(&items)
    }

    /// Current balance (0 for unknown users).
    pub fn balance(&self, user: UserId) -> LedgerResult<u64> {
        let _gate = self.gate();
        Ok(self.load_account(user)?.balance)
    }

    /// Apply a signed delta. Fails with `InsufficientFunds` if the result
    /// would be negative; nothing is written in that case.
    pub fn apply_delta(
        &self,
        user: UserId,
        delta: i64,
        kind: TxnKind,
        details: impl Into<String>,
    ) -> LedgerResult<u64> {
        let _gate = self.gate();
        let mut account = self.load_account(user)?;
        let new_balance = account.balance.checked_add_signed(delta).ok_or_else(|| {
            if delta < 0 {
                LedgerError::InsufficientFunds {
                    balance: account.balance,
                    required: delta.unsigned_abs(),
                }
            } else {
                LedgerError::Storage("balance overflow".to_string())
            }
        })?;
        account.balance = new_balance;
        self.commit(&[&account], &[(user, kind, delta, details.into())])?;
        tracing::debug!(user = %user, delta, new_balance, kind = %kind, "applied delta");
        Ok(new_balance)
    }

    /// Debit up to `amount`, clamped to the current balance. Used for
    /// progressive-game losses, which forfeit `min(bet, balance)`.
    /// Returns the amount actually debited.
    pub fn debit_up_to(
        &self,
        user: UserId,
        amount: u64,
        kind: TxnKind,
        details: impl Into<String>,
    ) -> LedgerResult<u64> {
        let _gate = self.gate();
        let mut account = self.load_account(user)?;
        let debited = amount.min(account.balance);
        account.balance -= debited;
        self.commit(
            &[&account],
            &[(user, kind, -(debited as i64), details.into())],
        )?;
        tracing::debug!(user = %user, debited, new_balance = account.balance, "clamped debit");
        Ok(debited)
    }

    /// Administrative override. Bypasses delta semantics but is still
    /// serialized and logged (record amount holds the new value).
    pub fn set_balance(
        &self,
        user: UserId,
        amount: u64,
        details: impl Into<String>,
    ) -> LedgerResult<u64> {
        let _gate = self.gate();
        let mut account = self.load_account(user)?;
        account.balance = amount;
        self.commit(
            &[&account],
            &[(user, TxnKind::OwnerSet, amount as i64, details.into())],
        )?;
        tracing::info!(user = %user, amount, "balance override");
        Ok(amount)
    }

    /// Claim the daily grant. The cooldown check, credit, and claim
    /// timestamp update are one critical section.
    pub fn claim_daily(&self, user: UserId, amount: u64, cooldown_secs: u64) -> LedgerResult<u64> {
        let _gate = self.gate();
        let mut account = self.load_account(user)?;
        let now = Utc::now();
        if let Some(last) = account.last_claim_at {
            let elapsed = now - last;
            let cooldown = Duration::seconds(cooldown_secs as i64);
            if elapsed < cooldown {
                return Err(LedgerError::ClaimOnCooldown(
                    (cooldown - elapsed).num_seconds().max(1),
                ));
            }
        }
        account.balance = account
            .balance
            .checked_add(amount)
            .ok_or_else(|| LedgerError::Storage("balance overflow".to_string()))?;
        account.last_claim_at = Some(now);
        self.commit(
            &[&account],
            &[(user, TxnKind::Daily, amount as i64, "claimed daily".to_string())],
        )?;
        Ok(account.balance)
    }

    /// Peer-to-peer transfer: both legs applied in one critical section and
    /// committed in one batch, with one record per mutated account.
    pub fn transfer(&self, from: UserId, to: UserId, amount: u64) -> LedgerResult<(u64, u64)> {
        if from == to {
            return Err(LedgerError::InvalidSelection(
                "cannot transfer to self".to_string(),
            ));
        }
        if amount == 0 {
            return Err(LedgerError::InvalidSelection(
                "transfer amount must be positive".to_string(),
            ));
        }
        let _gate = self.gate();
        let mut sender = self.load_account(from)?;
        if sender.balance < amount {
            return Err(LedgerError::InsufficientFunds {
                balance: sender.balance,
                required: amount,
            });
        }
        let mut recipient = self.load_account(to)?;
        sender.balance -= amount;
        recipient.balance = recipient
            .balance
            .checked_add(amount)
            .ok_or_else(|| LedgerError::Storage("balance overflow".to_string()))?;
        self.commit(
            &[&sender, &recipient],
            &[
                (from, TxnKind::TransferOut, -(amount as i64), format!("to {}", to)),
                (to, TxnKind::TransferIn, amount as i64, format!("from {}", from)),
            ],
        )?;
        tracing::info!(from = %from, to = %to, amount, "transfer settled");
        Ok((sender.balance, recipient.balance))
    }

    /// Top-N accounts by balance.
    pub fn leaderboard(&self, top: usize) -> LedgerResult<Vec<(UserId, u64)>> {
        let rows = self.store.scan_prefix(ACCOUNT_PREFIX, usize::MAX)?;
        let mut entries = Vec::with_capacity(rows.len());
        for (key, value) in rows {
            let account: Account = serde_json::from_slice(&value).map_err(|e| {
                LedgerError::Storage(format!("failed to decode account at {:?}: {}", key, e))
            })?;
            entries.push((account.user_id, account.balance));
        }
        entries.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        entries.truncate(top);
        Ok(entries)
    }

    /// A user's transaction records, newest first.
    pub fn history(&self, user: UserId, limit: usize) -> LedgerResult<Vec<TransactionRecord>> {
        load_history(&self.store, user, limit)
    }

    /// Number of log records written for a user (test/inspection helper).
    pub fn record_count(&self, user: UserId) -> LedgerResult<usize> {
        let mut prefix = Vec::with_capacity(TXN_USER_PREFIX.len() + 8);
        prefix.extend_from_slice(TXN_USER_PREFIX);
        prefix.extend_from_slice(&user.0.to_be_bytes());
        Ok(self.store.scan_prefix(&prefix, usize::MAX)?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn open_ledger() -> (TempDir, Ledger) {
        let dir = TempDir::new().unwrap();
        let store = RecordStore::open(dir.path()).unwrap();
        (dir, Ledger::open(store).unwrap())
    }

    #[test]
    fn test_lazy_account_creation() {
        let (_dir, ledger) = open_ledger();
        let user = UserId(1);
        assert_eq!(ledger.balance(user).unwrap(), 0);
        let balance = ledger
            .apply_delta(user, 100, TxnKind::Daily, "seed")
            .unwrap();
        assert_eq!(balance, 100);
    }

    #[test]
    fn test_insufficient_funds_writes_nothing() {
        let (_dir, ledger) = open_ledger();
        let user = UserId(2);
        ledger.apply_delta(user, 50, TxnKind::Daily, "seed").unwrap();

        let err = ledger
            .apply_delta(user, -100, TxnKind::CoinflipLoss, "bet")
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::InsufficientFunds {
                balance: 50,
                required: 100
            }
        ));
        assert_eq!(ledger.balance(user).unwrap(), 50);
        // Only the seed record exists.
        assert_eq!(ledger.record_count(user).unwrap(), 1);
    }

    #[test]
    fn test_one_record_per_mutation() {
        let (_dir, ledger) = open_ledger();
        let user = UserId(3);
        ledger.apply_delta(user, 100, TxnKind::Daily, "a").unwrap();
        ledger
            .apply_delta(user, 20, TxnKind::CoinflipWin, "b")
            .unwrap();
        ledger
            .apply_delta(user, -30, TxnKind::SlotsLoss, "c")
            .unwrap();

        let history = ledger.history(user, 10).unwrap();
        assert_eq!(history.len(), 3);
        // Newest first.
        assert_eq!(history[0].kind, TxnKind::SlotsLoss);
        assert_eq!(history[0].amount, -30);
        assert_eq!(history[2].kind, TxnKind::Daily);
    }

    #[test]
    fn test_debit_up_to_clamps() {
        let (_dir, ledger) = open_ledger();
        let user = UserId(4);
        ledger.apply_delta(user, 60, TxnKind::Daily, "seed").unwrap();

        let debited = ledger
            .debit_up_to(user, 100, TxnKind::MinesLoss, "boom")
            .unwrap();
        assert_eq!(debited, 60);
        assert_eq!(ledger.balance(user).unwrap(), 0);

        let history = ledger.history(user, 10).unwrap();
        assert_eq!(history[0].amount, -60);
    }

    #[test]
    fn test_claim_daily_cooldown() {
        let (_dir, ledger) = open_ledger();
        let user = UserId(5);
        let balance = ledger.claim_daily(user, 50, 3600).unwrap();
        assert_eq!(balance, 50);

        let err = ledger.claim_daily(user, 50, 3600).unwrap_err();
        assert!(matches!(err, LedgerError::ClaimOnCooldown(_)));
        assert_eq!(ledger.balance(user).unwrap(), 50);

        // Zero cooldown permits an immediate second claim.
        assert_eq!(ledger.claim_daily(user, 50, 0).unwrap(), 100);
    }

    #[test]
    fn test_transfer_moves_both_legs() {
        let (_dir, ledger) = open_ledger();
        let alice = UserId(10);
        let bob = UserId(11);
        ledger.apply_delta(alice, 500, TxnKind::Daily, "seed").unwrap();

        let (a, b) = ledger.transfer(alice, bob, 200).unwrap();
        assert_eq!(a, 300);
        assert_eq!(b, 200);
        assert_eq!(ledger.history(alice, 10).unwrap()[0].kind, TxnKind::TransferOut);
        assert_eq!(ledger.history(bob, 10).unwrap()[0].kind, TxnKind::TransferIn);

        let err = ledger.transfer(alice, bob, 1000).unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientFunds { .. }));
        assert!(ledger.transfer(alice, alice, 10).is_err());
    }

    #[test]
    fn test_set_balance_is_logged() {
        let (_dir, ledger) = open_ledger();
        let user = UserId(6);
        ledger.set_balance(user, 9999, "set by owner").unwrap();
        assert_eq!(ledger.balance(user).unwrap(), 9999);

        let history = ledger.history(user, 10).unwrap();
        assert_eq!(history[0].kind, TxnKind::OwnerSet);
        assert_eq!(history[0].amount, 9999);
    }

    #[test]
    fn test_leaderboard_order() {
        let (_dir, ledger) = open_ledger();
        ledger.set_balance(UserId(1), 10, "seed").unwrap();
        ledger.set_balance(UserId(2), 30, "seed").unwrap();
        ledger.set_balance(UserId(3), 20, "seed").unwrap();

        let board = ledger.leaderboard(2).unwrap();
        assert_eq!(board, vec![(UserId(2), 30), (UserId(3), 20)]);
    }

    #[test]
    fn test_sequence_survives_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let store = RecordStore::open(dir.path()).unwrap();
            let ledger = Ledger::open(store).unwrap();
            ledger
                .apply_delta(UserId(7), 10, TxnKind::Daily, "a")
                .unwrap();
        }
        let store = RecordStore::open(dir.path()).unwrap();
        let ledger = Ledger::open(store).unwrap();
        ledger
            .apply_delta(UserId(7), 10, TxnKind::Daily, "b")
            .unwrap();

        let history = ledger.history(UserId(7), 10).unwrap();
        assert_eq!(history.len(), 2);
        assert!(history[0].id > history[1].id);
    }

    #[test]
    fn test_concurrent_deltas_linearize() {
        let (_dir, ledger) = open_ledger();
        let ledger = Arc::new(ledger);
        let user = UserId(99);
        ledger
            .apply_delta(user, 1_000, TxnKind::Daily, "seed")
            .unwrap();

        let mut handles = Vec::new();
        for i in 0..8 {
            let ledger = Arc::clone(&ledger);
            handles.push(std::thread::spawn(move || {
                for _ in 0..25 {
                    let delta = if i % 2 == 0 { 3 } else { -2 };
                    let kind = if delta > 0 {
                        TxnKind::CoinflipWin
                    } else {
                        TxnKind::CoinflipLoss
                    };
                    ledger.apply_delta(user, delta, kind, "race").unwrap();
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        // 4 threads * 25 * +3 and 4 threads * 25 * -2.
        assert_eq!(ledger.balance(user).unwrap(), 1_000 + 300 - 200);
        // Exactly one record per successful call (plus the seed).
        assert_eq!(ledger.record_count(user).unwrap(), 201);
    }
}
