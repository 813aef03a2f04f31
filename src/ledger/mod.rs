//! The ledger: account store, concurrency gate, and transaction log.

pub mod accounts;
pub mod transactions;

pub use accounts::{Account, Ledger};
pub use transactions::{TransactionRecord, TxnKind, UserId};
