//! Reel slots: three independent uniform draws over a fixed symbol set.
//! Triple pays x10, a pair pays x2, three distinct symbols lose the bet.

use rand::Rng;

pub const SYMBOLS: [&str; 5] = ["🍒", "🍋", "🍊", "⭐", "7"];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SpinResult {
    pub reel: [usize; 3],
    pub multiplier: u64,
}

impl SpinResult {
    pub fn symbols(&self) -> [&'static str; 3] {
        [
            SYMBOLS[self.reel[0]],
            SYMBOLS[self.reel[1]],
            SYMBOLS[self.reel[2]],
        ]
    }

    pub fn display(&self) -> String {
        self.symbols().join(" ")
    }
}

pub fn multiplier(reel: &[usize; 3]) -> u64 {
    if reel[0] == reel[1] && reel[1] == reel[2] {
        10
    } else if reel[0] == reel[1] || reel[1] == reel[2] || reel[0] == reel[2] {
        2
    } else {
        0
    }
}

pub fn spin(rng: &mut impl Rng) -> SpinResult {
    let reel = [
        rng.gen_range(0..SYMBOLS.len()),
        rng.gen_range(0..SYMBOLS.len()),
        rng.gen_range(0..SYMBOLS.len()),
    ];
    SpinResult {
        reel,
        multiplier: multiplier(&reel),
    }
}
