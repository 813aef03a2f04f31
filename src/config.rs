//! Economy configuration with validation and defaults.

use serde::{Deserialize, Serialize};

use crate::errors::{LedgerError, LedgerResult};

/// Top-level configuration for the economy engine.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct EconomyConfig {
    pub bets: BetConfig,
    pub daily: DailyConfig,
    pub sessions: SessionConfig,
    pub redeem: RedeemConfig,
}

/// Bet limits applied to every game before any randomness is drawn.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BetConfig {
    pub min_bet: u64,
    pub max_bet: u64,
}

impl Default for BetConfig {
    fn default() -> Self {
        Self {
            min_bet: 10,
            max_bet: 100_000,
        }
    }
}

impl BetConfig {
    /// Clamp a requested bet into `[min_bet, max_bet]`.
    pub fn clamp(&self, bet: u64) -> u64 {
        bet.clamp(self.min_bet, self.max_bet)
    }

    /// Parse a raw bet string, then clamp. Unparsable input fails before
    /// clamping so a garbage value never turns into a minimum bet.
    pub fn parse(&self, raw: &str) -> LedgerResult<u64> {
        let bet: u64 = raw
            .trim()
            .parse()
            .map_err(|_| LedgerError::InvalidBetRange(format!("not a bet amount: {:?}", raw)))?;
        Ok(self.clamp(bet))
    }
}

/// Claim-interval-gated daily grant.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DailyConfig {
    pub amount: u64,
    pub cooldown_secs: u64,
}

impl Default for DailyConfig {
    fn default() -> Self {
        Self {
            amount: 50,
            cooldown_secs: 24 * 60 * 60,
        }
    }
}

/// Multi-step game session housekeeping.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Idle sessions older than this are discarded with no monetary effect.
    pub timeout_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { timeout_secs: 300 }
    }
}

/// Redemption workflow policy.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RedeemConfig {
    /// Whether denying a request credits the charged amount back.
    /// The charge is forfeited when false.
    pub refund_on_deny: bool,
}

impl Default for RedeemConfig {
    fn default() -> Self {
        Self {
            refund_on_deny: false,
        }
    }
}

impl EconomyConfig {
    /// Validate cross-field constraints.
    pub fn validate(&self) -> LedgerResult<()> {
        if self.bets.min_bet == 0 {
            return Err(LedgerError::InvalidConfig {
                field: "bets.min_bet".to_string(),
                reason: "minimum bet cannot be zero".to_string(),
            });
        }
        if self.bets.max_bet < self.bets.min_bet {
            return Err(LedgerError::InvalidConfig {
                field: "bets.max_bet".to_string(),
                reason: format!(
                    "max bet {} is below min bet {}",
                    self.bets.max_bet, self.bets.min_bet
                ),
            });
        }
        if self.daily.amount == 0 {
            return Err(LedgerError::InvalidConfig {
                field: "daily.amount".to_string(),
                reason: "daily grant cannot be zero".to_string(),
            });
        }
        if self.sessions.timeout_secs == 0 {
            return Err(LedgerError::InvalidConfig {
                field: "sessions.timeout_secs".to_string(),
                reason: "session timeout cannot be zero".to_string(),
            });
        }
        Ok(())
    }

    /// Load and validate a configuration from a TOML file.
    pub fn load(path: &str) -> LedgerResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| LedgerError::InvalidConfig {
            field: "path".to_string(),
            reason: format!("failed to read {}: {}", path, e),
        })?;
        let config: Self = toml::from_str(&raw).map_err(|e| LedgerError::InvalidConfig {
            field: "toml".to_string(),
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Save the configuration as pretty TOML.
    pub fn save(&self, path: &str) -> LedgerResult<()> {
        let raw = toml::to_string_pretty(self).map_err(|e| LedgerError::InvalidConfig {
            field: "toml".to_string(),
            reason: e.to_string(),
        })?;
        std::fs::write(path, raw).map_err(|e| LedgerError::InvalidConfig {
            field: "path".to_string(),
            reason: format!("failed to write {}: {}", path, e),
        })
    }
}
