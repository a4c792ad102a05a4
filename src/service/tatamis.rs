//! Mat queues

use serde::Serialize;
use tracing::info;

use super::Context;
use crate::combat::{Combat, CombatState, Side, SideScore};
use crate::error::{EngineError, EngineResult};
use crate::progression::ProgressionCoordinator;
use crate::roster::{Fighter, Team};
use crate::tatami::{Tatami, TatamiState};

/// A mat whose current combat is waiting or under way
#[derive(Debug, Clone, Serialize)]
pub struct OngoingConfrontation {
    pub tatami_id: String,
    pub tatami_name: String,
    pub combat_id: String,
    pub state: CombatState,
    pub red_team: Option<Team>,
    pub blue_team: Option<Team>,
}

/// One side of a queued combat, as shown on the scoreboard
#[derive(Debug, Clone, Serialize)]
pub struct CornerSummary {
    pub fighter_id: String,
    pub fighter_name: Option<String>,
    pub team_name: Option<String>,
    pub score: SideScore,
}

/// A combat in a mat's queue with names resolved
#[derive(Debug, Clone, Serialize)]
pub struct QueuedCombat {
    /// 1-based position in the queue
    pub index: usize,
    pub combat_id: String,
    pub state: CombatState,
    /// Under the queue pointer
    pub current: bool,
    pub red: CornerSummary,
    pub blue: CornerSummary,
    pub winner: Option<Side>,
}

pub struct TatamiService {
    ctx: Context,
    progression: ProgressionCoordinator,
}

impl TatamiService {
    pub fn new(ctx: Context) -> Self {
        let progression = ProgressionCoordinator::new(ctx.clone());
        Self { ctx, progression }
    }

    /// Create a free mat, named `Tatami N` unless a name is given
    pub async fn create_tatami(&self, name: Option<String>) -> EngineResult<Tatami> {
        let name = match name.map(|n| n.trim().to_string()) {
            Some(n) if !n.is_empty() => n,
            _ => format!("Tatami {}", self.list().await?.len() + 1),
        };
        let tatami = Tatami::new(&name);
        self.ctx.store.create(&tatami).await?;
        info!("Created {} ({})", tatami.name, tatami.id);
        self.ctx.notifier.changed(&tatami);
        Ok(tatami)
    }

    pub async fn list(&self) -> EngineResult<Vec<Tatami>> {
        self.ctx.store.list().await
    }

    pub async fn get(&self, id: &str) -> EngineResult<Tatami> {
        self.ctx.store.require(id).await
    }

    pub async fn rename(&self, id: &str, name: &str) -> EngineResult<Tatami> {
        let (tatami, _) = self
            .ctx
            .store
            .modify::<Tatami, _, _>(id, |t| t.rename(name))
            .await?;
        info!("Renamed tatami {} to {}", tatami.id, tatami.name);
        self.ctx.notifier.changed(&tatami);
        Ok(tatami)
    }

    /// Every queued combat in order, with fighter and team names and scores.
    /// Combats deleted since queuing are skipped.
    pub async fn combat_history(&self, id: &str) -> EngineResult<Vec<QueuedCombat>> {
        let tatami = self.get(id).await?;
        let mut history = Vec::with_capacity(tatami.queue.len());
        for (i, combat_id) in tatami.queue.iter().enumerate() {
            let Some(combat) = self.ctx.store.get::<Combat>(combat_id).await? else {
                continue;
            };
            history.push(QueuedCombat {
                index: i + 1,
                combat_id: combat.id.clone(),
                state: combat.state,
                current: i == tatami.current_index,
                red: self.corner(&combat, Side::Red).await?,
                blue: self.corner(&combat, Side::Blue).await?,
                winner: combat.winner,
            });
        }
        Ok(history)
    }

    async fn corner(&self, combat: &Combat, side: Side) -> EngineResult<CornerSummary> {
        let fighter_id = combat.fighter(side);
        let fighter = self.ctx.store.get::<Fighter>(fighter_id).await?;
        let team_name = match &fighter {
            Some(f) => self
                .ctx
                .store
                .get::<Team>(&f.team_id)
                .await?
                .map(|t| t.name),
            None => None,
        };
        Ok(CornerSummary {
            fighter_id: fighter_id.to_string(),
            fighter_name: fighter.map(|f| f.name),
            team_name,
            score: *combat.score(side),
        })
    }

    /// Queue combats on a mat. Every combat must exist.
    pub async fn assign(&self, id: &str, combat_ids: &[String]) -> EngineResult<Tatami> {
        if combat_ids.is_empty() {
            return Err(EngineError::validation("combat list must not be empty"));
        }
        for combat_id in combat_ids {
            self.ctx.store.require::<Combat>(combat_id).await?;
        }

        self.ctx
            .store
            .modify::<Tatami, _, _>(id, |t| t.assign(combat_ids))
            .await?;
        info!("Assigned {} combats to tatami {}", combat_ids.len(), id);

        // queued combats may already be finished
        let tatami = self.progression.refresh_confrontation(id).await?;
        Ok(tatami)
    }

    /// The combat under the queue pointer, if any
    pub async fn current(&self, id: &str) -> EngineResult<Option<Combat>> {
        let tatami = self.get(id).await?;
        match tatami.current_combat_id() {
            Some(combat_id) => self.ctx.store.get(combat_id).await,
            None => Ok(None),
        }
    }

    pub async fn next(&self, id: &str) -> EngineResult<Tatami> {
        let (tatami, _) = self
            .ctx
            .store
            .modify::<Tatami, _, _>(id, |t| t.advance())
            .await?;
        self.ctx.notifier.changed(&tatami);
        Ok(tatami)
    }

    pub async fn previous(&self, id: &str) -> EngineResult<Tatami> {
        let (tatami, _) = self
            .ctx
            .store
            .modify::<Tatami, _, _>(id, |t| t.retreat())
            .await?;
        self.ctx.notifier.changed(&tatami);
        Ok(tatami)
    }

    pub async fn release(&self, id: &str) -> EngineResult<Tatami> {
        let (tatami, _) = self
            .ctx
            .store
            .modify::<Tatami, _, _>(id, |t| {
                t.release();
                Ok(())
            })
            .await?;
        info!("Released {}", tatami.name);
        self.ctx.notifier.changed(&tatami);
        Ok(tatami)
    }

    pub async fn set_state(&self, id: &str, state: &str) -> EngineResult<Tatami> {
        let state: TatamiState = state.parse()?;
        let (tatami, _) = self
            .ctx
            .store
            .modify::<Tatami, _, _>(id, |t| {
                t.set_state(state);
                Ok(())
            })
            .await?;
        self.ctx.notifier.changed(&tatami);
        Ok(tatami)
    }

    /// Mats whose current combat is scheduled or active
    pub async fn ongoing_confrontations(&self) -> EngineResult<Vec<OngoingConfrontation>> {
        let mut ongoing = Vec::new();
        for tatami in self.list().await? {
            let Some(combat_id) = tatami.current_combat_id() else {
                continue;
            };
            let Some(combat) = self.ctx.store.get::<Combat>(combat_id).await? else {
                continue;
            };
            if !matches!(combat.state, CombatState::Scheduled | CombatState::Active) {
                continue;
            }
            ongoing.push(OngoingConfrontation {
                red_team: self.team_of(&combat.red).await?,
                blue_team: self.team_of(&combat.blue).await?,
                tatami_id: tatami.id.clone(),
                tatami_name: tatami.name.clone(),
                combat_id: combat.id.clone(),
                state: combat.state,
            });
        }
        Ok(ongoing)
    }

    async fn team_of(&self, fighter_id: &str) -> EngineResult<Option<Team>> {
        match self.ctx.store.get::<Fighter>(fighter_id).await? {
            Some(fighter) => self.ctx.store.get(&fighter.team_id).await,
            None => Ok(None),
        }
    }
}
