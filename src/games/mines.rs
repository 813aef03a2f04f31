//! Tile-sweep: a square grid with hidden traps drawn once at session start.
//! Cash-out value interpolates linearly from 1x at zero reveals up to the
//! tier's full-clear multiplier at `safe_total` reveals.

use rand::seq::index::sample;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use crate::errors::{LedgerError, LedgerResult};

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MinesDifficulty {
    Easy,
    Medium,
    Hard,
}

impl MinesDifficulty {
    /// (grid side length, trap count, full-clear multiplier)
    pub fn tier(&self) -> (usize, usize, u64) {
        match self {
            MinesDifficulty::Easy => (5, 3, 2),
            MinesDifficulty::Medium => (5, 5, 3),
            MinesDifficulty::Hard => (5, 10, 5),
        }
    }
}

impl fmt::Display for MinesDifficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MinesDifficulty::Easy => write!(f, "easy"),
            MinesDifficulty::Medium => write!(f, "medium"),
            MinesDifficulty::Hard => write!(f, "hard"),
        }
    }
}

impl FromStr for MinesDifficulty {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "easy" => Ok(MinesDifficulty::Easy),
            "medium" => Ok(MinesDifficulty::Medium),
            "hard" => Ok(MinesDifficulty::Hard),
            other => Err(LedgerError::InvalidDifficulty(other.to_string())),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RevealOutcome {
    /// Non-trap tile revealed; `revealed` is the new count.
    Safe { revealed: usize },
    /// Tile was already open. Not an error.
    AlreadyRevealed,
    /// Trap hit; the session is over.
    Trap,
    /// Every safe tile is open; settles at the full multiplier.
    Cleared,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MinesBoard {
    pub difficulty: MinesDifficulty,
    size: usize,
    full_mult: u64,
    traps: HashSet<usize>,
    revealed: HashSet<usize>,
}

impl MinesBoard {
    pub fn new(rng: &mut impl Rng, difficulty: MinesDifficulty) -> Self {
        let (size, trap_count, full_mult) = difficulty.tier();
        let traps = sample(rng, size * size, trap_count).into_iter().collect();
        Self {
            difficulty,
            size,
            full_mult,
            traps,
            revealed: HashSet::new(),
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn safe_total(&self) -> usize {
        self.size * self.size - self.traps.len()
    }

    pub fn revealed_count(&self) -> usize {
        self.revealed.len()
    }

    pub fn reveal(&mut self, tile: usize) -> LedgerResult<RevealOutcome> {
        if tile >= self.size * self.size {
            return Err(LedgerError::InvalidSelection(format!(
                "tile {} outside {}x{} grid",
                tile, self.size, self.size
            )));
        }
        if self.revealed.contains(&tile) {
            return Ok(RevealOutcome::AlreadyRevealed);
        }
        if self.traps.contains(&tile) {
            return Ok(RevealOutcome::Trap);
        }
        self.revealed.insert(tile);
        if self.revealed.len() == self.safe_total() {
            Ok(RevealOutcome::Cleared)
        } else {
            Ok(RevealOutcome::Safe {
                revealed: self.revealed.len(),
            })
        }
    }

    /// Current cash-out value for `bet`:
    /// `floor(bet * (1 + revealed/safe_total * (full_mult - 1)))`.
    pub fn cashout_value(&self, bet: u64) -> u64 {
        payout(bet, self.revealed.len(), self.safe_total(), self.full_mult)
    }

    pub fn full_clear_value(&self, bet: u64) -> u64 {
        bet * self.full_mult
    }
}

pub fn payout(bet: u64, revealed: usize, safe_total: usize, full_mult: u64) -> u64 {
    let bonus =
        bet as u128 * revealed as u128 * (full_mult as u128 - 1) / safe_total as u128;
    bet + bonus as u64
}
