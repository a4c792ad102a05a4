//! Fighters and teams
//!
//! Registration rules the engine relies on: fighters belong to an existing
//! team, carry a weight category from the configured table for their sex,
//! and cannot change team once they have fought.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::TournamentConfig;
use crate::error::{EngineError, EngineResult};

/// Caller-chosen team IDs: DNS-label style
static TEAM_ID_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9]([a-z0-9-]*[a-z0-9])?$").unwrap());

/// Color tags as used by scoreboards (`primary`, `red-2`, ...)
static COLOR_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9-]*$").unwrap());

pub const DEFAULT_TEAM_COLOR: &str = "primary";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sex {
    M,
    F,
}

impl FromStr for Sex {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "M" | "m" => Ok(Sex::M),
            "F" | "f" => Ok(Sex::F),
            other => Err(EngineError::validation(format!(
                "sex must be M or F, got {other}"
            ))),
        }
    }
}

impl fmt::Display for Sex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Sex::M => "M",
            Sex::F => "F",
        })
    }
}

/// A registered team
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Team {
    pub id: String,
    pub name: String,
    pub color: String,
    /// Cumulative points, maintained by progression
    pub points: i64,
    /// Cumulative encounter/match wins, maintained by progression
    pub wins: i64,
    pub created_at: DateTime<Utc>,
}

impl Team {
    pub fn new(id: Option<&str>, name: &str, color: Option<&str>) -> EngineResult<Self> {
        let id = match id {
            Some(id) => {
                validate_team_id(id)?;
                id.to_string()
            }
            None => uuid::Uuid::new_v4().to_string(),
        };
        let name = validate_name(name)?;
        let color = color.unwrap_or(DEFAULT_TEAM_COLOR);
        validate_color(color)?;

        Ok(Self {
            id,
            name,
            color: color.to_string(),
            points: 0,
            wins: 0,
            created_at: Utc::now(),
        })
    }

    /// Apply a signed change to the cumulative totals
    pub fn credit(&mut self, points: i64, wins: i64) {
        self.points += points;
        self.wins += wins;
    }
}

pub fn validate_team_id(id: &str) -> EngineResult<()> {
    if !TEAM_ID_REGEX.is_match(id) {
        return Err(EngineError::validation(format!("invalid team id: {id:?}")));
    }
    Ok(())
}

pub fn validate_color(color: &str) -> EngineResult<()> {
    if !COLOR_REGEX.is_match(color) {
        return Err(EngineError::validation(format!("invalid color tag: {color:?}")));
    }
    Ok(())
}

fn validate_name(name: &str) -> EngineResult<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(EngineError::validation("name is required"));
    }
    Ok(trimmed.to_string())
}

/// A registered fighter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fighter {
    pub id: String,
    pub name: String,
    pub sex: Sex,
    /// Weight category label from the configured table
    pub weight: String,
    pub team_id: String,
    pub created_at: DateTime<Utc>,
}

impl Fighter {
    /// Build a fighter after checking name and weight category.
    /// Team existence and roster size are checked by the caller.
    pub fn new(
        name: &str,
        sex: Sex,
        weight: &str,
        team_id: &str,
        config: &TournamentConfig,
    ) -> EngineResult<Self> {
        let name = validate_name(name)?;
        validate_weight(sex, weight, config)?;
        if team_id.trim().is_empty() {
            return Err(EngineError::validation("team is required"));
        }

        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            name,
            sex,
            weight: weight.to_string(),
            team_id: team_id.to_string(),
            created_at: Utc::now(),
        })
    }

    /// Two fighters may meet if they share sex and weight category
    pub fn can_face(&self, other: &Fighter) -> bool {
        self.sex == other.sex && self.weight == other.weight
    }
}

/// Partial update for a fighter
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FighterUpdate {
    pub name: Option<String>,
    pub sex: Option<Sex>,
    pub weight: Option<String>,
    pub team_id: Option<String>,
}

impl FighterUpdate {
    /// Apply to a fighter. `has_combats` blocks team reassignment.
    pub fn apply(
        self,
        fighter: &mut Fighter,
        has_combats: bool,
        config: &TournamentConfig,
    ) -> EngineResult<()> {
        if let Some(team_id) = &self.team_id {
            if *team_id != fighter.team_id && has_combats {
                return Err(EngineError::validation(
                    "fighter already has combats and cannot change team",
                ));
            }
        }
        let mut next = fighter.clone();
        if let Some(name) = &self.name {
            next.name = validate_name(name)?;
        }
        if let Some(sex) = self.sex {
            next.sex = sex;
        }
        if let Some(weight) = self.weight {
            next.weight = weight;
        }
        // sex and weight are checked together since either may have changed
        validate_weight(next.sex, &next.weight, config)?;
        if let Some(team_id) = self.team_id {
            next.team_id = team_id;
        }
        *fighter = next;
        Ok(())
    }
}

fn validate_weight(sex: Sex, weight: &str, config: &TournamentConfig) -> EngineResult<()> {
    if !config.weight_categories.contains(sex, weight) {
        return Err(EngineError::validation(format!(
            "invalid weight category {weight} for sex {sex}; expected one of {:?}",
            config.weight_categories.for_sex(sex)
        )));
    }
    Ok(())
}

/// Partial update for a team
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TeamUpdate {
    pub name: Option<String>,
    pub color: Option<String>,
}

impl TeamUpdate {
    pub fn apply(self, team: &mut Team) -> EngineResult<()> {
        let name = self.name.as_deref().map(validate_name).transpose()?;
        if let Some(color) = &self.color {
            validate_color(color)?;
        }
        if let Some(name) = name {
            team.name = name;
        }
        if let Some(color) = self.color {
            team.color = color;
        }
        Ok(())
    }
}
