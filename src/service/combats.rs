//! Combat lifecycle and scoring actions

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::Context;
use crate::combat::{Combat, Correction, HoldOutcome, PointType, Side};
use crate::error::{EngineError, EngineResult};
use crate::progression::ProgressionCoordinator;
use crate::roster::Fighter;
use crate::tatami::Tatami;

/// One scoring-table action against a combat
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum CombatAction {
    Start,
    Pause,
    MarkPoint { side: Side, point: PointType },
    Shido { side: Side },
    StartHold { side: Side },
    StopHold { held_secs: f64 },
    Correction { side: Side, correction: Correction },
    Reset,
    AdvanceTime { delta_secs: u32 },
    SetRemainingTime { remaining_secs: u32 },
    Finish { winner: Option<Side> },
}

/// Combat after an action, plus the hold result when one was stopped
#[derive(Debug, Clone, Serialize)]
pub struct ActionOutcome {
    pub combat: Combat,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hold: Option<HoldOutcome>,
}

pub struct CombatService {
    ctx: Context,
    progression: ProgressionCoordinator,
}

impl CombatService {
    pub fn new(ctx: Context) -> Self {
        let progression = ProgressionCoordinator::new(ctx.clone());
        Self { ctx, progression }
    }

    /// Create a scheduled combat between two registered fighters
    pub async fn create_combat(
        &self,
        red: &str,
        blue: &str,
        duration_secs: Option<u32>,
    ) -> EngineResult<Combat> {
        let duration = duration_secs.unwrap_or(self.ctx.config.combat_duration_secs);
        let combat = Combat::new(red, blue, duration)?;
        self.ctx.store.require::<Fighter>(red).await?;
        self.ctx.store.require::<Fighter>(blue).await?;

        self.ctx.store.create(&combat).await?;
        info!("Created combat {} ({} vs {})", combat.id, red, blue);
        self.ctx.notifier.changed(&combat);
        Ok(combat)
    }

    pub async fn list(&self) -> EngineResult<Vec<Combat>> {
        self.ctx.store.list().await
    }

    pub async fn get(&self, id: &str) -> EngineResult<Combat> {
        self.ctx.store.require(id).await
    }

    /// Delete a combat that no tatami is queuing
    pub async fn delete(&self, id: &str) -> EngineResult<()> {
        self.get(id).await?;
        let tatamis: Vec<Tatami> = self.ctx.store.list().await?;
        if let Some(tatami) = tatamis.iter().find(|t| t.holds(id)) {
            return Err(EngineError::invalid_state(format!(
                "combat {id} is queued on {}",
                tatami.name
            )));
        }
        self.ctx.store.delete::<Combat>(id).await?;
        info!("Deleted combat {}", id);
        self.ctx.notifier.deleted::<Combat>(id);
        Ok(())
    }

    /// Apply an action. When the combat finishes or is reopened, the
    /// tournament progression is brought up to date before returning.
    pub async fn apply(&self, id: &str, action: CombatAction) -> EngineResult<ActionOutcome> {
        debug!("Combat {} action {:?}", id, action);
        let thresholds = &self.ctx.config.hold;

        let (combat, (was_finished, hold)) = self
            .ctx
            .store
            .modify::<Combat, _, _>(id, |combat| {
                let was_finished = combat.is_finished();
                let mut hold = None;
                match action {
                    CombatAction::Start => combat.start()?,
                    CombatAction::Pause => combat.pause()?,
                    CombatAction::MarkPoint { side, point } => {
                        combat.mark_point(side, point)?;
                    }
                    CombatAction::Shido { side } => {
                        combat.give_shido(side)?;
                    }
                    CombatAction::StartHold { side } => combat.start_hold(side)?,
                    CombatAction::StopHold { held_secs } => {
                        hold = Some(combat.stop_hold(held_secs, thresholds)?);
                    }
                    CombatAction::Correction { side, correction } => {
                        combat.correct(side, correction)?
                    }
                    CombatAction::Reset => combat.reset(),
                    CombatAction::AdvanceTime { delta_secs } => {
                        combat.advance_time(delta_secs)?;
                    }
                    CombatAction::SetRemainingTime { remaining_secs } => {
                        combat.set_remaining_time(remaining_secs)?;
                    }
                    CombatAction::Finish { winner } => combat.finish_manually(winner)?,
                }
                Ok((was_finished, hold))
            })
            .await?;
        self.ctx.notifier.changed(&combat);

        if combat.is_finished() && !was_finished {
            info!(
                "Combat {} finished: {:?}, winner {:?}",
                combat.id, combat.finish_reason, combat.winner
            );
        }
        if combat.is_finished() || was_finished {
            self.progression.combat_changed(&combat).await?;
        }

        Ok(ActionOutcome { combat, hold })
    }
}
