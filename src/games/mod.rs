pub mod coinflip;
pub mod mines;
pub mod roulette;
pub mod session;
pub mod slots;
pub mod tower;

pub use coinflip::CoinSide;
pub use mines::{MinesBoard, MinesDifficulty, RevealOutcome};
pub use roulette::{Color, RouletteBet};
pub use session::{GameSession, SessionRegistry, SessionState};
pub use slots::SpinResult;
pub use tower::{StepOutcome, TowerBoard, TowerDifficulty};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which game a session or log line belongs to.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum GameKind {
    Coinflip,
    Slots,
    Roulette,
    Mines,
    Tower,
}

impl fmt::Display for GameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameKind::Coinflip => write!(f, "coinflip"),
            GameKind::Slots => write!(f, "slots"),
            GameKind::Roulette => write!(f, "roulette"),
            GameKind::Mines => write!(f, "mines"),
            GameKind::Tower => write!(f, "tower"),
        }
    }
}
