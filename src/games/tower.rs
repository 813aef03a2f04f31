//! Row-ladder: climb a fixed number of rows, each hiding one trap among a
//! per-difficulty number of tiles. Cash-out interpolates over rows climbed;
//! the top row settles at the full multiplier.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::{LedgerError, LedgerResult};

pub const ROWS: usize = 8;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TowerDifficulty {
    Easy,
    Medium,
    Hard,
}

impl TowerDifficulty {
    /// (tiles per row, full multiplier)
    pub fn tier(&self) -> (usize, u64) {
        match self {
            TowerDifficulty::Easy => (4, 3),
            TowerDifficulty::Medium => (3, 5),
            TowerDifficulty::Hard => (2, 10),
        }
    }
}

impl fmt::Display for TowerDifficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TowerDifficulty::Easy => write!(f, "easy"),
            TowerDifficulty::Medium => write!(f, "medium"),
            TowerDifficulty::Hard => write!(f, "hard"),
        }
    }
}

impl FromStr for TowerDifficulty {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "easy" => Ok(TowerDifficulty::Easy),
            "medium" => Ok(TowerDifficulty::Medium),
            "hard" => Ok(TowerDifficulty::Hard),
            other => Err(LedgerError::InvalidDifficulty(other.to_string())),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    /// Climbed past this row; `row` rows are now cleared.
    Climbed { row: usize },
    /// Picked the trap tile; the session is over.
    Trap,
    /// Cleared the final row; settles at `bet * full_mult`.
    TopReached,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TowerBoard {
    pub difficulty: TowerDifficulty,
    choices_per_row: usize,
    full_mult: u64,
    /// Trap column for each row, drawn once at start.
    traps: Vec<usize>,
    current_row: usize,
}

impl TowerBoard {
    pub fn new(rng: &mut impl Rng, difficulty: TowerDifficulty) -> Self {
        let (choices_per_row, full_mult) = difficulty.tier();
        let traps = (0..ROWS).map(|_| rng.gen_range(0..choices_per_row)).collect();
        Self {
            difficulty,
            choices_per_row,
            full_mult,
            traps,
            current_row: 0,
        }
    }

    pub fn choices_per_row(&self) -> usize {
        self.choices_per_row
    }

    pub fn current_row(&self) -> usize {
        self.current_row
    }

    pub fn pick(&mut self, column: usize) -> LedgerResult<StepOutcome> {
        if column >= self.choices_per_row {
            return Err(LedgerError::InvalidSelection(format!(
                "column {} outside row of {} tiles",
                column, self.choices_per_row
            )));
        }
        if self.traps[self.current_row] == column {
            return Ok(StepOutcome::Trap);
        }
        self.current_row += 1;
        if self.current_row == ROWS {
            Ok(StepOutcome::TopReached)
        } else {
            Ok(StepOutcome::Climbed {
                row: self.current_row,
            })
        }
    }

    /// `floor(bet * (1 + current_row/rows * (full_mult - 1)))`.
    pub fn cashout_value(&self, bet: u64) -> u64 {
        let bonus =
            bet as u128 * self.current_row as u128 * (self.full_mult as u128 - 1) / ROWS as u128;
        bet + bonus as u64
    }

    pub fn full_clear_value(&self, bet: u64) -> u64 {
        bet * self.full_mult
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn board(difficulty: TowerDifficulty) -> TowerBoard {
        let mut rng = StdRng::seed_from_u64(11);
        TowerBoard::new(&mut rng, difficulty)
    }

    #[test]
    fn test_one_trap_per_row() {
        let b = board(TowerDifficulty::Easy);
        assert_eq!(b.traps.len(), ROWS);
        assert!(b.traps.iter().all(|&c| c < b.choices_per_row));
    }

    #[test]
    fn test_cashout_boundaries() {
        let mut b = board(TowerDifficulty::Easy);
        assert_eq!(b.cashout_value(80), 80);
        for row in 0..ROWS {
            let safe = (0..b.choices_per_row).find(|&c| b.traps[row] != c).unwrap();
            let outcome = b.pick(safe).unwrap();
            if row == ROWS - 1 {
                assert_eq!(outcome, StepOutcome::TopReached);
            }
        }
        assert_eq!(b.cashout_value(80), b.full_clear_value(80));
        assert_eq!(b.full_clear_value(80), 240);
    }

    #[test]
    fn test_cashout_interpolates() {
        let mut b = board(TowerDifficulty::Medium);
        let safe = (0..b.choices_per_row).find(|&c| b.traps[0] != c).unwrap();
        b.pick(safe).unwrap();
        // One of eight rows at x5: floor(100 + 100*1*4/8) = 150.
        assert_eq!(b.cashout_value(100), 150);
    }

    #[test]
    fn test_trap_ends_climb() {
        let mut b = board(TowerDifficulty::Hard);
        let trap = b.traps[0];
        assert_eq!(b.pick(trap).unwrap(), StepOutcome::Trap);
        assert_eq!(b.current_row(), 0);
    }

    #[test]
    fn test_column_out_of_range() {
        let mut b = board(TowerDifficulty::Hard);
        assert!(b.pick(2).is_err());
    }
}
