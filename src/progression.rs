//! Tournament progression
//!
//! Runs after a combat finishes or is reopened and brings everything that
//! depends on it up to date: tatami confrontation scores, pool encounters
//! (standings and team totals) and bracket matches. Each step recomputes
//! from combat state, so running it twice is harmless.

use tracing::{debug, info, warn};

use crate::bracket::{Advancement, Bracket, Phase, BRACKET_ID};
use crate::combat::{Combat, Side};
use crate::error::EngineResult;
use crate::pools::{EncounterResult, Pool};
use crate::roster::{Fighter, Team};
use crate::service::Context;
use crate::tatami::{ConfrontationScore, Tatami};

pub struct ProgressionCoordinator {
    ctx: Context,
}

/// Combats won per team, once every combat of a group is finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TeamTally {
    wins_a: u32,
    wins_b: u32,
}

impl ProgressionCoordinator {
    pub fn new(ctx: Context) -> Self {
        Self { ctx }
    }

    /// Propagate a finished (or reopened) combat
    pub async fn combat_changed(&self, combat: &Combat) -> EngineResult<()> {
        debug!("Propagating combat {}", combat.id);

        let tatamis: Vec<Tatami> = self.ctx.store.list().await?;
        for tatami in tatamis.iter().filter(|t| t.holds(&combat.id)) {
            self.refresh_confrontation(&tatami.id).await?;
        }

        let pools: Vec<Pool> = self.ctx.store.list().await?;
        for pool in &pools {
            let encounters: Vec<String> = pool
                .encounters_with_combat(&combat.id)
                .map(|e| e.id.clone())
                .collect();
            for encounter_id in encounters {
                self.settle_encounter(&pool.id, &encounter_id).await?;
            }
        }

        if let Some(bracket) = self.ctx.store.get::<Bracket>(BRACKET_ID).await? {
            for (phase, match_id) in bracket.matches_with_combat(&combat.id) {
                self.settle_match(phase, match_id).await?;
            }
        }

        Ok(())
    }

    /// Recount combats won per side over a tatami's queue
    pub async fn refresh_confrontation(&self, tatami_id: &str) -> EngineResult<Tatami> {
        let queue = self.ctx.store.require::<Tatami>(tatami_id).await?.queue;
        let mut combats = Vec::with_capacity(queue.len());
        for combat_id in &queue {
            if let Some(combat) = self.ctx.store.get::<Combat>(combat_id).await? {
                combats.push(combat);
            }
        }
        let score = ConfrontationScore::tally(&combats);

        let (tatami, _) = self
            .ctx
            .store
            .modify::<Tatami, _, _>(tatami_id, |t| {
                t.confrontation = score;
                Ok(())
            })
            .await?;
        self.ctx.notifier.changed(&tatami);
        Ok(tatami)
    }

    /// Record (or take back) a pool encounter result from its combats
    pub async fn settle_encounter(&self, pool_id: &str, encounter_id: &str) -> EngineResult<()> {
        let pool = self.ctx.store.require::<Pool>(pool_id).await?;
        let encounter = pool.encounter(encounter_id)?.clone();
        let tally = self
            .tally(&encounter.combat_ids, &encounter.team_a, &encounter.team_b)
            .await?;

        let config = &self.ctx.config;
        let (pool, previous) = match tally {
            Some(tally) => {
                let result = EncounterResult {
                    wins_a: tally.wins_a,
                    wins_b: tally.wins_b,
                };
                if encounter.result == Some(result) {
                    return Ok(());
                }
                let (pool, previous) = self
                    .ctx
                    .store
                    .modify::<Pool, _, _>(pool_id, |p| p.record_result(encounter_id, result, config))
                    .await?;
                info!(
                    "{}: {} {} - {} {}",
                    pool.name, encounter.team_a, result.wins_a, result.wins_b, encounter.team_b
                );
                self.credit_teams(&encounter.team_a, &encounter.team_b, previous, Some(result))
                    .await?;
                (pool, previous)
            }
            None => {
                if encounter.result.is_none() {
                    return Ok(());
                }
                let (pool, previous) = self
                    .ctx
                    .store
                    .modify::<Pool, _, _>(pool_id, |p| p.clear_result(encounter_id, config))
                    .await?;
                info!("{}: result of encounter {} withdrawn", pool.name, encounter_id);
                self.credit_teams(&encounter.team_a, &encounter.team_b, previous, None)
                    .await?;
                (pool, previous)
            }
        };
        debug!("Encounter {} replaced result {:?}", encounter_id, previous);
        self.ctx.notifier.changed(&pool);
        Ok(())
    }

    /// Apply the difference between two encounter results to team totals
    async fn credit_teams(
        &self,
        team_a: &str,
        team_b: &str,
        old: Option<EncounterResult>,
        new: Option<EncounterResult>,
    ) -> EngineResult<()> {
        let config = &self.ctx.config;
        let credits = |r: Option<EncounterResult>| {
            r.map(|r| r.team_credits(config)).unwrap_or([(0, 0); 2])
        };
        let (old, new) = (credits(old), credits(new));

        for (i, team_id) in [team_a, team_b].into_iter().enumerate() {
            let points = new[i].0 - old[i].0;
            let wins = new[i].1 - old[i].1;
            if points == 0 && wins == 0 {
                continue;
            }
            if self.ctx.store.get::<Team>(team_id).await?.is_none() {
                debug!("Team {} is gone; skipping credit", team_id);
                continue;
            }
            let (team, _) = self
                .ctx
                .store
                .modify::<Team, _, _>(team_id, |t| {
                    t.credit(points, wins);
                    Ok(())
                })
                .await?;
            self.ctx.notifier.changed(&team);
        }
        Ok(())
    }

    /// Record and advance a bracket match once its combats decide it
    pub async fn settle_match(&self, phase: Phase, match_id: usize) -> EngineResult<()> {
        let bracket = self.ctx.store.require::<Bracket>(BRACKET_ID).await?;
        let m = bracket.get_match(phase, match_id)?.clone();
        let (Some(team_a), Some(team_b)) = (&m.team_a, &m.team_b) else {
            return Ok(());
        };
        let Some(tally) = self.tally(&m.combat_ids, team_a, team_b).await? else {
            if m.winner.is_some() {
                self.withdraw_match(phase, match_id).await?;
            }
            return Ok(());
        };
        if tally.wins_a == tally.wins_b {
            if m.winner.is_some() && (m.score_a, m.score_b) != (tally.wins_a, tally.wins_b) {
                self.withdraw_match(phase, match_id).await?;
            }
            warn!(
                "{}/{} is level at {}-{}; waiting for an operator decision",
                phase, match_id, tally.wins_a, tally.wins_b
            );
            return Ok(());
        }
        if m.winner.is_some() && (m.score_a, m.score_b) == (tally.wins_a, tally.wins_b) {
            return Ok(());
        }

        let (bracket, advancement) = self
            .ctx
            .store
            .modify::<Bracket, _, _>(BRACKET_ID, |b| {
                b.record_match_result(phase, match_id, tally.wins_a, tally.wins_b, None)?;
                b.advance_winner(phase, match_id)
            })
            .await?;
        match &advancement {
            Advancement::Champion { team_id } => info!("Team {} wins the bracket", team_id),
            Advancement::Placed {
                phase,
                match_id,
                team_id,
                ..
            } => info!("Team {} advances to {}/{}", team_id, phase, match_id),
        }
        self.ctx.notifier.changed(&bracket);
        Ok(())
    }

    async fn withdraw_match(&self, phase: Phase, match_id: usize) -> EngineResult<()> {
        let (bracket, unplaced) = self
            .ctx
            .store
            .modify::<Bracket, _, _>(BRACKET_ID, |b| b.withdraw_result(phase, match_id))
            .await?;
        if unplaced {
            info!("{}/{} result withdrawn; winner taken out of the next phase", phase, match_id);
        } else {
            info!("{}/{} result withdrawn", phase, match_id);
        }
        self.ctx.notifier.changed(&bracket);
        Ok(())
    }

    /// Take back the team credits of every resolved encounter of a pool
    pub async fn withdraw_pool_credits(&self, pool: &Pool) -> EngineResult<()> {
        for encounter in &pool.encounters {
            if let Some(result) = encounter.result {
                self.credit_teams(&encounter.team_a, &encounter.team_b, Some(result), None)
                    .await?;
            }
        }
        Ok(())
    }

    /// Combats won by each team. None until every combat is finished.
    async fn tally(
        &self,
        combat_ids: &[String],
        team_a: &str,
        team_b: &str,
    ) -> EngineResult<Option<TeamTally>> {
        if combat_ids.is_empty() {
            return Ok(None);
        }
        let mut tally = TeamTally { wins_a: 0, wins_b: 0 };
        for combat_id in combat_ids {
            let Some(combat) = self.ctx.store.get::<Combat>(combat_id).await? else {
                return Ok(None);
            };
            if !combat.is_finished() {
                return Ok(None);
            }
            let Some(side) = combat.winner else {
                continue;
            };
            let fighter_id = match side {
                Side::Red => &combat.red,
                Side::Blue => &combat.blue,
            };
            let team = self
                .ctx
                .store
                .get::<Fighter>(fighter_id)
                .await?
                .map(|f| f.team_id);
            match team.as_deref() {
                Some(t) if t == team_a => tally.wins_a += 1,
                Some(t) if t == team_b => tally.wins_b += 1,
                _ => warn!(
                    "Winner {} of combat {} belongs to neither {} nor {}",
                    fighter_id, combat_id, team_a, team_b
                ),
            }
        }
        Ok(Some(tally))
    }
}
