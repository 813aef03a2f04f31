//! CYAN Ledger - Play-Money Economy & Settlement Engine
//!
//! Persistent account balances with an append-only transaction log, five
//! chance games settled atomically through a single concurrency gate, an
//! in-memory session registry for multi-step games, and a staff-reviewed
//! redemption workflow.

pub mod config;
pub mod engine;
pub mod errors;
pub mod games;
pub mod ledger;
pub mod redeem;
pub mod rewards;
pub mod storage;

pub use config::EconomyConfig;
pub use engine::{CasinoEngine, GameReceipt, MinesStep, TowerStep};
pub use errors::{LedgerError, LedgerResult};
pub use games::{
    CoinSide, GameKind, MinesDifficulty, RouletteBet, TowerDifficulty,
};
pub use ledger::{Account, Ledger, TransactionRecord, TxnKind, UserId};
pub use redeem::{
    LogNotifier, ManualTicketing, Notifier, RedeemDecision, RedeemRequest, RedeemStatus,
    RedeemWorkflow, TicketProvisioner,
};
pub use rewards::{RewardCatalog, RewardCatalogEntry};
pub use storage::RecordStore;
