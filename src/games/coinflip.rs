//! Coin-flip: one uniform draw, win pays 2x the stake (net +bet).

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::LedgerError;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CoinSide {
    Heads,
    Tails,
}

impl fmt::Display for CoinSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoinSide::Heads => write!(f, "heads"),
            CoinSide::Tails => write!(f, "tails"),
        }
    }
}

impl FromStr for CoinSide {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "heads" | "h" => Ok(CoinSide::Heads),
            "tails" | "t" => Ok(CoinSide::Tails),
            other => Err(LedgerError::InvalidSelection(format!(
                "unknown coin side: {}",
                other
            ))),
        }
    }
}

pub fn flip(rng: &mut impl Rng) -> CoinSide {
    if rng.gen_bool(0.5) {
        CoinSide::Heads
    } else {
        CoinSide::Tails
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_flip_is_deterministic_per_seed() {
        let mut a = StdRng::seed_from_u64(7);
        let mut b = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            assert_eq!(flip(&mut a), flip(&mut b));
        }
    }

    #[test]
    fn test_flip_produces_both_sides() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut heads = 0usize;
        let mut tails = 0usize;
        for _ in 0..1000 {
            match flip(&mut rng) {
                CoinSide::Heads => heads += 1,
                CoinSide::Tails => tails += 1,
            }
        }
        assert!(heads > 400 && tails > 400);
    }

    #[test]
    fn test_parse_coin_side() {
        assert_eq!("heads".parse::<CoinSide>().unwrap(), CoinSide::Heads);
        assert_eq!("T".parse::<CoinSide>().unwrap(), CoinSide::Tails);
        assert!("edge".parse::<CoinSide>().is_err());
    }
}
