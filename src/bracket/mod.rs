//! Single-elimination bracket
//!
//! Phases run `round_of_16 -> quarter -> semi -> final`. Match `id` (1-based)
//! of a phase feeds match `ceil(id / 2)` of the next phase: odd IDs fill
//! slot A, even IDs slot B.
//!
//! Byes: when the starting phase has an odd number of teams its last match
//! has no team B, and a later match whose B feeder can never field a team
//! has no opponent either. Such matches are won by A as soon as A is known.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{EngineError, EngineResult};

/// Largest bracket supported (a full round of 16)
pub const MAX_BRACKET_TEAMS: usize = 16;

/// Storage ID of the tournament's single bracket
pub const BRACKET_ID: &str = "main";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    RoundOf16,
    Quarter,
    Semi,
    Final,
}

impl Phase {
    pub const ALL: [Phase; 4] = [Phase::RoundOf16, Phase::Quarter, Phase::Semi, Phase::Final];

    /// Nominal number of matches in the phase
    pub fn match_count(self) -> usize {
        match self {
            Phase::RoundOf16 => 8,
            Phase::Quarter => 4,
            Phase::Semi => 2,
            Phase::Final => 1,
        }
    }

    pub fn next(self) -> Option<Phase> {
        match self {
            Phase::RoundOf16 => Some(Phase::Quarter),
            Phase::Quarter => Some(Phase::Semi),
            Phase::Semi => Some(Phase::Final),
            Phase::Final => None,
        }
    }

    /// Smallest phase that seats `teams` teams
    pub fn starting_for(teams: usize) -> Phase {
        match teams {
            0..=2 => Phase::Final,
            3..=4 => Phase::Semi,
            5..=8 => Phase::Quarter,
            _ => Phase::RoundOf16,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::RoundOf16 => "round_of_16",
            Phase::Quarter => "quarter",
            Phase::Semi => "semi",
            Phase::Final => "final",
        })
    }
}

impl FromStr for Phase {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "round_of_16" | "huitieme" => Ok(Phase::RoundOf16),
            "quarter" | "quart" => Ok(Phase::Quarter),
            "semi" | "demi" => Ok(Phase::Semi),
            "final" | "finale" => Ok(Phase::Final),
            other => Err(EngineError::not_found("phase", other)),
        }
    }
}

/// Side of a bracket match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Slot {
    A,
    B,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BracketMatch {
    /// 1-based position within the phase
    pub id: usize,
    pub team_a: Option<String>,
    pub team_b: Option<String>,
    pub score_a: u32,
    pub score_b: u32,
    pub winner: Option<Slot>,
    /// Individual combats deciding this match, if played on the mats
    #[serde(default)]
    pub combat_ids: Vec<String>,
}

impl BracketMatch {
    fn empty(id: usize) -> Self {
        Self {
            id,
            team_a: None,
            team_b: None,
            score_a: 0,
            score_b: 0,
            winner: None,
            combat_ids: Vec::new(),
        }
    }

    pub fn team(&self, slot: Slot) -> Option<&str> {
        match slot {
            Slot::A => self.team_a.as_deref(),
            Slot::B => self.team_b.as_deref(),
        }
    }

    pub fn winning_team(&self) -> Option<&str> {
        self.winner.and_then(|slot| self.team(slot))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseMatches {
    pub phase: Phase,
    pub matches: Vec<BracketMatch>,
}

/// Where an advanced winner went
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Advancement {
    Placed {
        phase: Phase,
        match_id: usize,
        slot: Slot,
        team_id: String,
    },
    Champion {
        team_id: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bracket {
    pub id: String,
    pub start_phase: Phase,
    pub phases: Vec<PhaseMatches>,
    pub created_at: DateTime<Utc>,
}

/// Shuffle the qualified teams and lay out the bracket
pub fn generate_bracket<R: Rng + ?Sized>(
    team_ids: &[String],
    rng: &mut R,
) -> EngineResult<Bracket> {
    if team_ids.len() < 2 {
        return Err(EngineError::validation("a bracket needs at least 2 teams"));
    }
    if team_ids.len() > MAX_BRACKET_TEAMS {
        return Err(EngineError::validation(format!(
            "brackets are limited to {} teams, got {}",
            MAX_BRACKET_TEAMS,
            team_ids.len()
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

    let start_phase = Phase::starting_for(shuffled.len());
    let first = PhaseMatches {
        phase: start_phase,
        matches: shuffled
            .chunks(2)
            .enumerate()
            .map(|(i, pair)| BracketMatch {
                team_a: pair.first().cloned(),
                team_b: pair.get(1).cloned(),
                ..BracketMatch::empty(i + 1)
            })
            .collect(),
    };

    let mut phases = vec![first];
    let mut current = start_phase;
    while let Some(next) = current.next() {
        phases.push(PhaseMatches {
            phase: next,
            matches: (1..=next.match_count()).map(BracketMatch::empty).collect(),
        });
        current = next;
    }

    let mut bracket = Bracket {
        id: BRACKET_ID.to_string(),
        start_phase,
        phases,
        created_at: Utc::now(),
    };
    bracket.settle_byes();
    Ok(bracket)
}

impl Bracket {
    pub fn phase(&self, phase: Phase) -> EngineResult<&PhaseMatches> {
        self.phases
            .iter()
            .find(|p| p.phase == phase)
            .ok_or_else(|| EngineError::not_found("phase", phase.to_string()))
    }

    fn phase_mut(&mut self, phase: Phase) -> EngineResult<&mut PhaseMatches> {
        self.phases
            .iter_mut()
            .find(|p| p.phase == phase)
            .ok_or_else(|| EngineError::not_found("phase", phase.to_string()))
    }

    pub fn get_match(&self, phase: Phase, match_id: usize) -> EngineResult<&BracketMatch> {
        self.phase(phase)?
            .matches
            .iter()
            .find(|m| m.id == match_id)
            .ok_or_else(|| EngineError::not_found("match", format!("{phase}/{match_id}")))
    }

    fn match_mut(&mut self, phase: Phase, match_id: usize) -> EngineResult<&mut BracketMatch> {
        self.phase_mut(phase)?
            .matches
            .iter_mut()
            .find(|m| m.id == match_id)
            .ok_or_else(|| EngineError::not_found("match", format!("{phase}/{match_id}")))
    }

    /// Store a match result. The winner is the declared slot or, if none is
    /// declared, the slot with the higher score.
    pub fn record_match_result(
        &mut self,
        phase: Phase,
        match_id: usize,
        score_a: u32,
        score_b: u32,
        winner: Option<Slot>,
    ) -> EngineResult<()> {
        let winner = match winner {
            Some(slot) => slot,
            None if score_a > score_b => Slot::A,
            None if score_b > score_a => Slot::B,
            None => {
                return Err(EngineError::validation(
                    "scores are level; a winner must be declared",
                ))
            }
        };

        let m = self.match_mut(phase, match_id)?;
        if m.team(winner).is_none() {
            return Err(EngineError::precondition(format!(
                "slot {winner:?} of {phase}/{match_id} has no team yet"
            )));
        }
        m.score_a = score_a;
        m.score_b = score_b;
        m.winner = Some(winner);
        Ok(())
    }

    /// Move a match winner into its slot of the next phase
    pub fn advance_winner(&mut self, phase: Phase, match_id: usize) -> EngineResult<Advancement> {
        let advancement = self.place_winner(phase, match_id)?;
        self.settle_byes();
        Ok(advancement)
    }

    fn place_winner(&mut self, phase: Phase, match_id: usize) -> EngineResult<Advancement> {
        let m = self.get_match(phase, match_id)?;
        let team_id = m
            .winning_team()
            .ok_or_else(|| {
                EngineError::precondition(format!("{phase}/{match_id} has no declared winner"))
            })?
            .to_string();

        let Some(next) = phase.next() else {
            return Ok(Advancement::Champion { team_id });
        };

        let dest_id = match_id.div_ceil(2);
        let slot = if match_id % 2 == 1 { Slot::A } else { Slot::B };
        let dest = self.match_mut(next, dest_id)?;
        match slot {
            Slot::A => dest.team_a = Some(team_id.clone()),
            Slot::B => dest.team_b = Some(team_id.clone()),
        }

        Ok(Advancement::Placed {
            phase: next,
            match_id: dest_id,
            slot,
            team_id,
        })
    }

    /// Whether slot B of a match can never be filled
    fn has_bye(&self, phase_index: usize, m: &BracketMatch) -> bool {
        if phase_index == 0 {
            return m.team_b.is_none();
        }
        m.team_b.is_none() && !self.can_field_team(phase_index - 1, 2 * m.id)
    }

    /// Whether a match holds, or can still receive, at least one team
    fn can_field_team(&self, phase_index: usize, match_id: usize) -> bool {
        let Some(m) = self.phases[phase_index]
            .matches
            .iter()
            .find(|m| m.id == match_id)
        else {
            return false;
        };
        if m.team_a.is_some() || m.team_b.is_some() {
            return true;
        }
        phase_index > 0
            && (self.can_field_team(phase_index - 1, 2 * match_id - 1)
                || self.can_field_team(phase_index - 1, 2 * match_id))
    }

    /// Resolve matches without an opponent, walking the phases in order
    fn settle_byes(&mut self) {
        for phase_index in 0..self.phases.len() {
            let phase = self.phases[phase_index].phase;
            let byes: Vec<usize> = self.phases[phase_index]
                .matches
                .iter()
                .filter(|m| m.winner.is_none() && m.team_a.is_some() && self.has_bye(phase_index, m))
                .map(|m| m.id)
                .collect();

            for match_id in byes {
                if let Ok(m) = self.match_mut(phase, match_id) {
                    m.winner = Some(Slot::A);
                }
                // byes always have a winner, so placement cannot fail
                if let Ok(advancement) = self.place_winner(phase, match_id) {
                    debug!("Bye in {}/{} advanced: {:?}", phase, match_id, advancement);
                }
            }
        }
    }

    /// Take back a match result and pull the winner out of the next phase,
    /// unless that match has since been played. Returns whether the winner
    /// was removed from the next phase.
    pub fn withdraw_result(&mut self, phase: Phase, match_id: usize) -> EngineResult<bool> {
        let m = self.match_mut(phase, match_id)?;
        let Some(team_id) = m.winning_team().map(str::to_string) else {
            return Ok(false);
        };
        m.winner = None;
        m.score_a = 0;
        m.score_b = 0;
        self.unplace(phase, match_id, &team_id)
    }

    fn unplace(&mut self, phase: Phase, match_id: usize, team_id: &str) -> EngineResult<bool> {
        let Some(next) = phase.next() else {
            return Ok(false);
        };
        let dest_id = match_id.div_ceil(2);
        let slot = if match_id % 2 == 1 { Slot::A } else { Slot::B };

        let dest = self.get_match(next, dest_id)?;
        if dest.team(slot) != Some(team_id) {
            return Ok(false);
        }
        if dest.winner.is_some() {
            let carried_by_bye = dest.team_b.is_none() && dest.winner == Some(Slot::A);
            if !carried_by_bye {
                return Ok(false);
            }
            self.withdraw_result(next, dest_id)?;
        }

        let dest = self.match_mut(next, dest_id)?;
        match slot {
            Slot::A => dest.team_a = None,
            Slot::B => dest.team_b = None,
        }
        Ok(true)
    }

    /// Attach combats to a match; both teams must be known
    pub fn assign_match_combats(
        &mut self,
        phase: Phase,
        match_id: usize,
        combat_ids: &[String],
    ) -> EngineResult<()> {
        if combat_ids.is_empty() {
            return Err(EngineError::validation("combat list must not be empty"));
        }
        let m = self.match_mut(phase, match_id)?;
        if m.team_a.is_none() || m.team_b.is_none() {
            return Err(EngineError::precondition(format!(
                "{phase}/{match_id} does not have both teams yet"
            )));
        }
        for id in combat_ids {
            if !m.combat_ids.contains(id) {
                m.combat_ids.push(id.clone());
            }
        }
        Ok(())
    }

    /// Matches backed by the given combat
    pub fn matches_with_combat(&self, combat_id: &str) -> Vec<(Phase, usize)> {
        self.phases
            .iter()
            .flat_map(|p| {
                p.matches
                    .iter()
                    .filter(|m| m.combat_ids.iter().any(|c| c == combat_id))
                    .map(move |m| (p.phase, m.id))
            })
            .collect()
    }

    /// Winner of the final, once decided
    pub fn champion(&self) -> Option<&str> {
        self.get_match(Phase::Final, 1).ok()?.winning_team()
    }
}
