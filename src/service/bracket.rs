//! Elimination bracket operations

use tracing::info;

use super::{draw_rng, Context};
use crate::bracket::{self, Advancement, Bracket, Phase, Slot, BRACKET_ID};
use crate::combat::Combat;
use crate::error::EngineResult;
use crate::pools::Pool;
use crate::progression::ProgressionCoordinator;
use crate::roster::Team;

/// Teams per pool that qualify for the bracket by default
const QUALIFIERS_PER_POOL: usize = 2;

pub struct BracketService {
    ctx: Context,
    progression: ProgressionCoordinator,
}

impl BracketService {
    pub fn new(ctx: Context) -> Self {
        let progression = ProgressionCoordinator::new(ctx.clone());
        Self { ctx, progression }
    }

    /// Draw the bracket, replacing any existing one. Without an explicit
    /// team list the top two of every pool qualify, or every registered
    /// team when no pools were drawn.
    pub async fn generate(
        &self,
        team_ids: Option<Vec<String>>,
        seed: Option<u64>,
    ) -> EngineResult<Bracket> {
        let team_ids = match team_ids {
            Some(ids) => {
                for id in &ids {
                    self.ctx.store.require::<Team>(id).await?;
                }
                ids
            }
            None => self.qualified_teams().await?,
        };

        let bracket = bracket::generate_bracket(&team_ids, &mut draw_rng(seed))?;
        self.ctx.store.save(&bracket).await?;
        info!(
            "Drew bracket of {} teams starting at {}",
            team_ids.len(),
            bracket.start_phase
        );
        self.ctx.notifier.changed(&bracket);
        Ok(bracket)
    }

    async fn qualified_teams(&self) -> EngineResult<Vec<String>> {
        let pools: Vec<Pool> = self.ctx.store.list().await?;
        if pools.is_empty() {
            let teams: Vec<Team> = self.ctx.store.list().await?;
            return Ok(teams.into_iter().map(|t| t.id).collect());
        }
        Ok(pools
            .iter()
            .flat_map(|p| {
                p.ranked_standings()
                    .into_iter()
                    .take(QUALIFIERS_PER_POOL)
                    .map(|row| row.team_id)
            })
            .collect())
    }

    pub async fn get(&self) -> EngineResult<Bracket> {
        self.ctx.store.require(BRACKET_ID).await
    }

    pub async fn delete(&self) -> EngineResult<()> {
        if self.ctx.store.delete::<Bracket>(BRACKET_ID).await? {
            info!("Bracket deleted");
            self.ctx.notifier.deleted::<Bracket>(BRACKET_ID);
        }
        Ok(())
    }

    pub async fn record_match_result(
        &self,
        phase: Phase,
        match_id: usize,
        score_a: u32,
        score_b: u32,
        winner: Option<Slot>,
    ) -> EngineResult<Bracket> {
        let (bracket, _) = self
            .ctx
            .store
            .modify::<Bracket, _, _>(BRACKET_ID, |b| {
                b.record_match_result(phase, match_id, score_a, score_b, winner)
            })
            .await?;
        info!("{}/{} recorded {}-{}", phase, match_id, score_a, score_b);
        self.ctx.notifier.changed(&bracket);
        Ok(bracket)
    }

    pub async fn advance_winner(
        &self,
        phase: Phase,
        match_id: usize,
    ) -> EngineResult<(Bracket, Advancement)> {
        let (bracket, advancement) = self
            .ctx
            .store
            .modify::<Bracket, _, _>(BRACKET_ID, |b| b.advance_winner(phase, match_id))
            .await?;
        if let Advancement::Champion { team_id } = &advancement {
            info!("Team {} wins the bracket", team_id);
        }
        self.ctx.notifier.changed(&bracket);
        Ok((bracket, advancement))
    }

    /// Attach existing combats to a match; once they are all finished the
    /// match is decided from them
    pub async fn assign_match_combats(
        &self,
        phase: Phase,
        match_id: usize,
        combat_ids: &[String],
    ) -> EngineResult<Bracket> {
        for combat_id in combat_ids {
            self.ctx.store.require::<Combat>(combat_id).await?;
        }
        let (bracket, _) = self
            .ctx
            .store
            .modify::<Bracket, _, _>(BRACKET_ID, |b| {
                b.assign_match_combats(phase, match_id, combat_ids)
            })
            .await?;
        self.ctx.notifier.changed(&bracket);

        self.progression.settle_match(phase, match_id).await?;
        self.get().await
    }
}
