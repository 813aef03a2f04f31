//! In-memory registry for multi-step game sessions.
//!
//! Each session holds the secret layout drawn at start. The bet is not
//! reserved; money only moves at settlement, which re-checks the balance
//! through the ledger gate. A terminal advance flips `alive` to false while
//! the map shard guard is held, so a racing duplicate call observes a dead
//! session before any settlement side effect runs.

use dashmap::DashMap;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::errors::{LedgerError, LedgerResult};
use crate::games::mines::MinesBoard;
use crate::games::tower::TowerBoard;
use crate::ledger::UserId;

#[derive(Clone, Debug)]
pub enum SessionState {
    Mines(MinesBoard),
    Tower(TowerBoard),
}

#[derive(Clone, Debug)]
pub struct GameSession {
    pub id: Uuid,
    pub user_id: UserId,
    pub bet: u64,
    pub alive: bool,
    pub last_touched: Instant,
    pub state: SessionState,
}

#[derive(Default)]
pub struct SessionRegistry {
    sessions: DashMap<Uuid, GameSession>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, user_id: UserId, bet: u64, state: SessionState) -> Uuid {
        let id = Uuid::new_v4();
        self.sessions.insert(
            id,
            GameSession {
                id,
                user_id,
                bet,
                alive: true,
                last_touched: Instant::now(),
                state,
            },
        );
        id
    }

    /// Run `f` against a live session while holding its shard guard. A
    /// terminal `f` must set `alive = false` before returning; the flip is
    /// then visible to any concurrent caller before the guard drops.
    pub fn advance<T>(
        &self,
        id: Uuid,
        f: impl FnOnce(&mut GameSession) -> LedgerResult<T>,
    ) -> LedgerResult<T> {
        let mut entry = self
            .sessions
            .get_mut(&id)
            .ok_or(LedgerError::SessionNotFound(id))?;
        if !entry.alive {
            return Err(LedgerError::SessionNotAlive(id));
        }
        entry.last_touched = Instant::now();
        f(entry.value_mut())
    }

    pub fn remove(&self, id: Uuid) {
        self.sessions.remove(&id);
    }

    /// Drop sessions idle past `timeout`. No monetary effect; the bet was
    /// never reserved.
    pub fn purge_expired(&self, timeout: Duration) -> usize {
        let before = self.sessions.len();
        self.sessions
            .retain(|_, s| s.last_touched.elapsed() < timeout);
        before - self.sessions.len()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
