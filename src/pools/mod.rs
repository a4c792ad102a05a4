//! Round-robin pools
//!
//! Teams are shuffled and dealt into pools; every pair of pool members meets
//! once in an encounter backed by one or more individual combats.

mod standings;

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::TournamentConfig;
use crate::error::{EngineError, EngineResult};

pub use standings::{general_standings, rank, StandingRow};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncounterStatus {
    Pending,
    Assigned,
    Resolved,
}

/// Combats won by each team of an encounter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncounterResult {
    pub wins_a: u32,
    pub wins_b: u32,
}

impl EncounterResult {
    /// Cumulative `(points, wins)` this result earns team A and team B
    pub fn team_credits(&self, config: &TournamentConfig) -> [(i64, i64); 2] {
        let win = (i64::from(config.win_points), 1);
        let draw = (i64::from(config.draw_points), 0);
        match self.wins_a.cmp(&self.wins_b) {
            std::cmp::Ordering::Greater => [win, (0, 0)],
            std::cmp::Ordering::Less => [(0, 0), win],
            std::cmp::Ordering::Equal => [draw, draw],
        }
    }
}

/// A pairing of two teams inside a pool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Encounter {
    pub id: String,
    pub team_a: String,
    pub team_b: String,
    pub combat_ids: Vec<String>,
    pub status: EncounterStatus,
    pub result: Option<EncounterResult>,
}

impl Encounter {
    fn new(team_a: &str, team_b: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            team_a: team_a.to_string(),
            team_b: team_b.to_string(),
            combat_ids: Vec::new(),
            status: EncounterStatus::Pending,
            result: None,
        }
    }

    pub fn involves(&self, team_id: &str) -> bool {
        self.team_a == team_id || self.team_b == team_id
    }
}

/// A round-robin group of teams
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pool {
    pub id: String,
    pub name: String,
    pub team_ids: Vec<String>,
    pub encounters: Vec<Encounter>,
    pub standings: Vec<StandingRow>,
    pub created_at: DateTime<Utc>,
}

fn pool_name(index: usize) -> String {
    match u8::try_from(index) {
        Ok(i) if i < 26 => format!("Pool {}", char::from(b'A' + i)),
        _ => format!("Pool {}", index + 1),
    }
}

/// Shuffle teams and deal them into `pool_count` pools, then pair every
/// member with every other member of its pool.
pub fn generate_pools<R: Rng + ?Sized>(
    team_ids: &[String],
    pool_count: usize,
    rng: &mut R,
) -> EngineResult<Vec<Pool>> {
    if team_ids.is_empty() {
        return Err(EngineError::validation("no teams available"));
    }
    if pool_count == 0 {
        return Err(EngineError::validation("pool count must be at least 1"));
    }
    if pool_count > team_ids.len() {
        return Err(EngineError::validation(format!(
            "not enough teams ({}) for {} pools",
            team_ids.len(),
            pool_count
        )));
    }
    let mut seen = HashSet::new();
    if let Some(dup) = team_ids.iter().find(|id| !seen.insert(id.as_str())) {
        return Err(EngineError::validation(format!(
            "team {dup} is listed more than once"
        )));
    }

    let mut shuffled = team_ids.to_vec();
    shuffled.shuffle(rng);

    let now = Utc::now();
    let mut pools: Vec<Pool> = (0..pool_count)
        .map(|i| Pool {
            id: uuid::Uuid::new_v4().to_string(),
            name: pool_name(i),
            team_ids: Vec::new(),
            encounters: Vec::new(),
            standings: Vec::new(),
            created_at: now,
        })
        .collect();

    for (index, team_id) in shuffled.iter().enumerate() {
        let pool = &mut pools[index % pool_count];
        pool.team_ids.push(team_id.clone());
        pool.standings.push(StandingRow::new(team_id));
    }

    for pool in &mut pools {
        let members = &pool.team_ids;
        for i in 0..members.len() {
            for j in (i + 1)..members.len() {
                pool.encounters.push(Encounter::new(&members[i], &members[j]));
            }
        }
    }

    Ok(pools)
}

impl Pool {
    pub fn encounter(&self, encounter_id: &str) -> EngineResult<&Encounter> {
        self.encounters
            .iter()
            .find(|e| e.id == encounter_id)
            .ok_or_else(|| EngineError::not_found("encounter", encounter_id))
    }

    fn encounter_mut(&mut self, encounter_id: &str) -> EngineResult<&mut Encounter> {
        self.encounters
            .iter_mut()
            .find(|e| e.id == encounter_id)
            .ok_or_else(|| EngineError::not_found("encounter", encounter_id))
    }

    /// Encounters backed by the given combat
    pub fn encounters_with_combat<'a>(&'a self, combat_id: &'a str) -> impl Iterator<Item = &'a Encounter> + 'a {
        self.encounters
            .iter()
            .filter(move |e| e.combat_ids.iter().any(|c| c == combat_id))
    }

    /// Attach combats to an encounter
    pub fn assign_encounter_combats(
        &mut self,
        encounter_id: &str,
        combat_ids: &[String],
    ) -> EngineResult<()> {
        if combat_ids.is_empty() {
            return Err(EngineError::validation("combat list must not be empty"));
        }
        let encounter = self.encounter_mut(encounter_id)?;
        if encounter.status == EncounterStatus::Resolved {
            return Err(EngineError::invalid_state(
                "encounter is already resolved",
            ));
        }
        for id in combat_ids {
            if !encounter.combat_ids.contains(id) {
                encounter.combat_ids.push(id.clone());
            }
        }
        encounter.status = EncounterStatus::Assigned;
        Ok(())
    }

    /// Record (or re-record) the outcome of an encounter and update standings.
    /// Returns the previous result if one was replaced.
    pub fn record_result(
        &mut self,
        encounter_id: &str,
        result: EncounterResult,
        config: &TournamentConfig,
    ) -> EngineResult<Option<EncounterResult>> {
        let (team_a, team_b, previous) = {
            let e = self.encounter(encounter_id)?;
            (e.team_a.clone(), e.team_b.clone(), e.result)
        };
        self.ensure_rows(&team_a, &team_b)?;

        if let Some(old) = previous {
            self.apply_to_rows(&team_a, &team_b, old, config, -1);
        }
        self.apply_to_rows(&team_a, &team_b, result, config, 1);

        let encounter = self.encounter_mut(encounter_id)?;
        encounter.result = Some(result);
        encounter.status = EncounterStatus::Resolved;
        Ok(previous)
    }

    /// Take back a recorded outcome, e.g. after a combat was reopened.
    /// Returns the removed result.
    pub fn clear_result(
        &mut self,
        encounter_id: &str,
        config: &TournamentConfig,
    ) -> EngineResult<Option<EncounterResult>> {
        let (team_a, team_b, previous) = {
            let e = self.encounter(encounter_id)?;
            (e.team_a.clone(), e.team_b.clone(), e.result)
        };
        let Some(old) = previous else {
            return Ok(None);
        };
        self.ensure_rows(&team_a, &team_b)?;
        self.apply_to_rows(&team_a, &team_b, old, config, -1);

        let encounter = self.encounter_mut(encounter_id)?;
        encounter.result = None;
        encounter.status = if encounter.combat_ids.is_empty() {
            EncounterStatus::Pending
        } else {
            EncounterStatus::Assigned
        };
        Ok(Some(old))
    }

    fn ensure_rows(&self, team_a: &str, team_b: &str) -> EngineResult<()> {
        for team in [team_a, team_b] {
            if !self.standings.iter().any(|r| r.team_id == team) {
                return Err(EngineError::not_found("standings row", team));
            }
        }
        Ok(())
    }

    fn apply_to_rows(
        &mut self,
        team_a: &str,
        team_b: &str,
        result: EncounterResult,
        config: &TournamentConfig,
        sign: i64,
    ) {
        for row in &mut self.standings {
            if row.team_id == team_a {
                row.apply(result.wins_a, result.wins_b, config.win_points, config.draw_points, sign);
            } else if row.team_id == team_b {
                row.apply(result.wins_b, result.wins_a, config.win_points, config.draw_points, sign);
            }
        }
    }

    /// Ranked copy of the standings
    pub fn ranked_standings(&self) -> Vec<StandingRow> {
        let mut rows = self.standings.clone();
        rank(&mut rows);
        rows
    }
}
