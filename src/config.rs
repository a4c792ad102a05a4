//! Server and tournament configuration
//!
//! Layered with figment: built-in defaults, then an optional TOML file, then
//! `TATAMID_`-prefixed environment variables (`__` separates nested keys,
//! e.g. `TATAMID_TOURNAMENT__WIN_POINTS=2`).

use std::net::SocketAddr;
use std::path::Path;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::combat::HoldThresholds;
use crate::error::{EngineError, EngineResult};
use crate::roster::Sex;

/// Default bout length in seconds
pub const DEFAULT_COMBAT_DURATION_SECS: u32 = 240;

/// Default roster limit per team
pub const DEFAULT_MAX_FIGHTERS_PER_TEAM: usize = 20;

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub bind_addr: SocketAddr,
    /// None = in-memory database
    pub db_path: Option<String>,
    #[serde(default)]
    pub tournament: TournamentConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            db_path: None,
            tournament: TournamentConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from defaults, an optional TOML file and the environment
    pub fn load(file: Option<&Path>) -> anyhow::Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = file {
            if !path.exists() {
                anyhow::bail!("config file not found: {}", path.display());
            }
            figment = figment.merge(Toml::file(path));
        }
        let config: Config = figment
            .merge(Env::prefixed("TATAMID_").split("__"))
            .extract()?;
        config.tournament.validate()?;
        Ok(config)
    }
}

/// Weight category tables per sex
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WeightCategories {
    pub male: Vec<String>,
    pub female: Vec<String>,
}

impl Default for WeightCategories {
    fn default() -> Self {
        let table = |items: &[&str]| items.iter().map(|s| s.to_string()).collect();
        Self {
            male: table(&["-60", "-66", "-73", "-81", "-90", "-100", "+100"]),
            female: table(&["-48", "-52", "-57", "-63", "-70", "-78", "+78"]),
        }
    }
}

impl WeightCategories {
    /// Categories allowed for a sex
    pub fn for_sex(&self, sex: Sex) -> &[String] {
        match sex {
            Sex::M => &self.male,
            Sex::F => &self.female,
        }
    }

    pub fn contains(&self, sex: Sex, category: &str) -> bool {
        self.for_sex(sex).iter().any(|c| c == category)
    }
}

/// Rules consumed by the tournament engine
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TournamentConfig {
    pub combat_duration_secs: u32,
    pub hold: HoldThresholds,
    pub weight_categories: WeightCategories,
    /// Standings points for an encounter win
    pub win_points: u32,
    /// Standings points for a drawn encounter
    pub draw_points: u32,
    pub max_fighters_per_team: usize,
}

impl Default for TournamentConfig {
    fn default() -> Self {
        Self {
            combat_duration_secs: DEFAULT_COMBAT_DURATION_SECS,
            hold: HoldThresholds::default(),
            weight_categories: WeightCategories::default(),
            win_points: 3,
            draw_points: 1,
            max_fighters_per_team: DEFAULT_MAX_FIGHTERS_PER_TEAM,
        }
    }
}

impl TournamentConfig {
    /// Reject values the engine cannot work with
    pub fn validate(&self) -> EngineResult<()> {
        if self.combat_duration_secs == 0 {
            return Err(EngineError::validation("combat duration must be positive"));
        }
        self.hold.validate()?;
        if self.weight_categories.male.is_empty() || self.weight_categories.female.is_empty() {
            return Err(EngineError::validation(
                "weight category tables must not be empty",
            ));
        }
        if self.max_fighters_per_team == 0 {
            return Err(EngineError::validation("max fighters per team must be positive"));
        }
        Ok(())
    }
}
