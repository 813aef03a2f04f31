//! Single-zero wheel: one uniform draw from 0..=36. Color bets pay x2,
//! green (zero) pays x14, an exact number pays x36.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::{LedgerError, LedgerResult};

/// The standard red set; 1..=36 not in here is black, 0 is green.
pub const RED_NUMBERS: [u8; 18] = [
    1, 3, 5, 7, 9, 12, 14, 16, 18, 19, 21, 23, 25, 27, 30, 32, 34, 36,
];

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    Red,
    Black,
    Green,
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Color::Red => write!(f, "red"),
            Color::Black => write!(f, "black"),
            Color::Green => write!(f, "green"),
        }
    }
}

pub fn color_of(number: u8) -> Color {
    if number == 0 {
        Color::Green
    } else if RED_NUMBERS.contains(&number) {
        Color::Red
    } else {
        Color::Black
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RouletteBet {
    Red,
    Black,
    Green,
    Number(u8),
}

impl RouletteBet {
    pub fn validate(&self) -> LedgerResult<()> {
        match self {
            RouletteBet::Number(n) if *n > 36 => Err(LedgerError::InvalidSelection(format!(
                "roulette number {} out of range 0..=36",
                n
            ))),
            _ => Ok(()),
        }
    }

    /// Multiplier applied to the stake when `draw` matches this bet.
    pub fn multiplier(&self, draw: u8) -> u64 {
        match self {
            RouletteBet::Red if color_of(draw) == Color::Red => 2,
            RouletteBet::Black if color_of(draw) == Color::Black => 2,
            RouletteBet::Green if draw == 0 => 14,
            RouletteBet::Number(n) if *n == draw => 36,
            _ => 0,
        }
    }
}

impl fmt::Display for RouletteBet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouletteBet::Red => write!(f, "red"),
            RouletteBet::Black => write!(f, "black"),
            RouletteBet::Green => write!(f, "green"),
            RouletteBet::Number(n) => write!(f, "number {}", n),
        }
    }
}

pub fn spin(rng: &mut impl Rng) -> u8 {
    rng.gen_range(0..=36)
}
