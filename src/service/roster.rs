//! Team and fighter registration

use serde::Deserialize;
use tracing::info;

use super::Context;
use crate::combat::Combat;
use crate::error::{EngineError, EngineResult};
use crate::roster::{Fighter, FighterUpdate, Sex, Team, TeamUpdate};

/// Request to register a team
#[derive(Debug, Clone, Deserialize)]
pub struct NewTeam {
    /// Optional caller-chosen ID
    pub id: Option<String>,
    pub name: String,
    pub color: Option<String>,
}

/// Request to register a fighter
#[derive(Debug, Clone, Deserialize)]
pub struct NewFighter {
    pub name: String,
    pub sex: Sex,
    pub weight: String,
    pub team_id: String,
}

pub struct RosterService {
    ctx: Context,
}

impl RosterService {
    pub fn new(ctx: Context) -> Self {
        Self { ctx }
    }

    pub async fn create_team(&self, req: NewTeam) -> EngineResult<Team> {
        let team = Team::new(req.id.as_deref(), &req.name, req.color.as_deref())?;
        self.ctx.store.create(&team).await?;
        info!("Registered team {} ({})", team.name, team.id);
        self.ctx.notifier.changed(&team);
        Ok(team)
    }

    pub async fn list_teams(&self) -> EngineResult<Vec<Team>> {
        self.ctx.store.list().await
    }

    pub async fn get_team(&self, id: &str) -> EngineResult<Team> {
        self.ctx.store.require(id).await
    }

    pub async fn update_team(&self, id: &str, update: TeamUpdate) -> EngineResult<Team> {
        let (team, _) = self
            .ctx
            .store
            .modify::<Team, _, _>(id, |team| update.apply(team))
            .await?;
        self.ctx.notifier.changed(&team);
        Ok(team)
    }

    /// Remove a team that no longer has fighters
    pub async fn delete_team(&self, id: &str) -> EngineResult<()> {
        self.get_team(id).await?;
        if !self.list_fighters(Some(id)).await?.is_empty() {
            return Err(EngineError::validation(format!(
                "team {id} still has fighters"
            )));
        }
        self.ctx.store.delete::<Team>(id).await?;
        info!("Deleted team {}", id);
        self.ctx.notifier.deleted::<Team>(id);
        Ok(())
    }

    pub async fn create_fighter(&self, req: NewFighter) -> EngineResult<Fighter> {
        self.ensure_team_has_room(&req.team_id).await?;
        let fighter = Fighter::new(&req.name, req.sex, &req.weight, &req.team_id, &self.ctx.config)?;
        self.ctx.store.create(&fighter).await?;
        info!(
            "Registered fighter {} ({} {}) for team {}",
            fighter.name, fighter.sex, fighter.weight, fighter.team_id
        );
        self.ctx.notifier.changed(&fighter);
        Ok(fighter)
    }

    /// All fighters, optionally restricted to one team, in registration order
    pub async fn list_fighters(&self, team_id: Option<&str>) -> EngineResult<Vec<Fighter>> {
        let fighters: Vec<Fighter> = self.ctx.store.list().await?;
        Ok(match team_id {
            Some(team_id) => fighters.into_iter().filter(|f| f.team_id == team_id).collect(),
            None => fighters,
        })
    }

    pub async fn get_fighter(&self, id: &str) -> EngineResult<Fighter> {
        self.ctx.store.require(id).await
    }

    pub async fn update_fighter(&self, id: &str, update: FighterUpdate) -> EngineResult<Fighter> {
        let current = self.get_fighter(id).await?;
        if let Some(team_id) = &update.team_id {
            if *team_id != current.team_id {
                self.ensure_team_has_room(team_id).await?;
            }
        }
        let has_combats = self.has_combats(id).await?;

        let config = &self.ctx.config;
        let (fighter, _) = self
            .ctx
            .store
            .modify::<Fighter, _, _>(id, |fighter| update.apply(fighter, has_combats, config))
            .await?;
        self.ctx.notifier.changed(&fighter);
        Ok(fighter)
    }

    /// Remove a fighter that has never been scheduled
    pub async fn delete_fighter(&self, id: &str) -> EngineResult<()> {
        self.get_fighter(id).await?;
        if self.has_combats(id).await? {
            return Err(EngineError::validation(format!(
                "fighter {id} has combats and cannot be deleted"
            )));
        }
        self.ctx.store.delete::<Fighter>(id).await?;
        info!("Deleted fighter {}", id);
        self.ctx.notifier.deleted::<Fighter>(id);
        Ok(())
    }

    async fn has_combats(&self, fighter_id: &str) -> EngineResult<bool> {
        let combats: Vec<Combat> = self.ctx.store.list().await?;
        Ok(combats.iter().any(|c| c.involves(fighter_id)))
    }

    async fn ensure_team_has_room(&self, team_id: &str) -> EngineResult<()> {
        if self.ctx.store.get::<Team>(team_id).await?.is_none() {
            return Err(EngineError::validation(format!(
                "team {team_id} does not exist"
            )));
        }
        let size = self.list_fighters(Some(team_id)).await?.len();
        if size >= self.ctx.config.max_fighters_per_team {
            return Err(EngineError::validation(format!(
                "team {} already has {} fighters (limit {})",
                team_id, size, self.ctx.config.max_fighters_per_team
            )));
        }
        Ok(())
    }
}
