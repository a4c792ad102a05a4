//! Pool draws, encounter scheduling and standings

use serde::Serialize;
use tracing::info;

use super::{draw_rng, Context};
use crate::combat::Combat;
use crate::error::{EngineError, EngineResult};
use crate::pools::{self, EncounterStatus, Pool, StandingRow};
use crate::progression::ProgressionCoordinator;
use crate::roster::{Fighter, Team};
use crate::tatami::Tatami;

/// Result of scheduling an encounter on a mat
#[derive(Debug, Clone, Serialize)]
pub struct ScheduledEncounter {
    pub pool: Pool,
    pub combats: Vec<Combat>,
    pub tatami: Tatami,
}

pub struct PoolService {
    ctx: Context,
    progression: ProgressionCoordinator,
}

impl PoolService {
    pub fn new(ctx: Context) -> Self {
        let progression = ProgressionCoordinator::new(ctx.clone());
        Self { ctx, progression }
    }

    /// Draw new pools, replacing any existing ones. Without an explicit team
    /// list every registered team takes part.
    pub async fn generate(
        &self,
        pool_count: usize,
        team_ids: Option<Vec<String>>,
        seed: Option<u64>,
    ) -> EngineResult<Vec<Pool>> {
        let team_ids = match team_ids {
            Some(ids) => {
                for id in &ids {
                    self.ctx.store.require::<Team>(id).await?;
                }
                ids
            }
            None => {
                let teams: Vec<Team> = self.ctx.store.list().await?;
                teams.into_iter().map(|t| t.id).collect()
            }
        };

        let pools = pools::generate_pools(&team_ids, pool_count, &mut draw_rng(seed))?;

        let previous = self.list().await?;
        if !previous.is_empty() {
            info!("Replacing {} existing pools", previous.len());
        }
        for pool in &previous {
            self.progression.withdraw_pool_credits(pool).await?;
            self.ctx.store.delete::<Pool>(&pool.id).await?;
            self.ctx.notifier.deleted::<Pool>(&pool.id);
        }
        for pool in &pools {
            self.ctx.store.create(pool).await?;
            self.ctx.notifier.changed(pool);
        }
        info!("Drew {} pools from {} teams", pools.len(), team_ids.len());
        Ok(pools)
    }

    pub async fn list(&self) -> EngineResult<Vec<Pool>> {
        self.ctx.store.list().await
    }

    pub async fn get(&self, id: &str) -> EngineResult<Pool> {
        self.ctx.store.require(id).await
    }

    /// Drop every pool, taking back the team points its encounters earned
    pub async fn delete_all(&self) -> EngineResult<()> {
        for pool in self.list().await? {
            self.progression.withdraw_pool_credits(&pool).await?;
            self.ctx.store.delete::<Pool>(&pool.id).await?;
            self.ctx.notifier.deleted::<Pool>(&pool.id);
        }
        Ok(())
    }

    /// Ranked standings of one pool
    pub async fn standings(&self, id: &str) -> EngineResult<Vec<StandingRow>> {
        Ok(self.get(id).await?.ranked_standings())
    }

    /// Standings summed across all pools
    pub async fn general_standings(&self) -> EngineResult<Vec<StandingRow>> {
        Ok(pools::general_standings(&self.list().await?))
    }

    /// Attach existing combats to an encounter
    pub async fn assign_encounter_combats(
        &self,
        pool_id: &str,
        encounter_id: &str,
        combat_ids: &[String],
    ) -> EngineResult<Pool> {
        for combat_id in combat_ids {
            self.ctx.store.require::<Combat>(combat_id).await?;
        }
        let (pool, _) = self
            .ctx
            .store
            .modify::<Pool, _, _>(pool_id, |p| {
                p.assign_encounter_combats(encounter_id, combat_ids)
            })
            .await?;
        self.ctx.notifier.changed(&pool);

        // the combats may already be decided
        self.progression.settle_encounter(pool_id, encounter_id).await?;
        self.get(pool_id).await
    }

    /// Create one combat per compatible fighter pair of the two teams, queue
    /// them on a mat and attach them to the encounter
    pub async fn schedule_encounter(
        &self,
        pool_id: &str,
        encounter_id: &str,
        tatami_id: &str,
    ) -> EngineResult<ScheduledEncounter> {
        let pool = self.get(pool_id).await?;
        let encounter = pool.encounter(encounter_id)?.clone();
        if encounter.status == EncounterStatus::Resolved {
            return Err(EngineError::invalid_state(format!(
                "encounter {encounter_id} is already resolved"
            )));
        }
        self.ctx.store.require::<Tatami>(tatami_id).await?;

        let fighters: Vec<Fighter> = self.ctx.store.list().await?;
        let pairs = pair_fighters(&fighters, &encounter.team_a, &encounter.team_b);
        if pairs.is_empty() {
            return Err(EngineError::validation(format!(
                "no fighters of {} and {} share sex and weight category",
                encounter.team_a, encounter.team_b
            )));
        }

        let mut combats = Vec::with_capacity(pairs.len());
        for (red, blue) in pairs {
            let combat = Combat::new(&red.id, &blue.id, self.ctx.config.combat_duration_secs)?;
            self.ctx.store.create(&combat).await?;
            self.ctx.notifier.changed(&combat);
            combats.push(combat);
        }
        let combat_ids: Vec<String> = combats.iter().map(|c| c.id.clone()).collect();

        let (pool, _) = self
            .ctx
            .store
            .modify::<Pool, _, _>(pool_id, |p| {
                p.assign_encounter_combats(encounter_id, &combat_ids)
            })
            .await?;
        self.ctx.notifier.changed(&pool);

        self.ctx
            .store
            .modify::<Tatami, _, _>(tatami_id, |t| t.assign(&combat_ids))
            .await?;
        let tatami = self.progression.refresh_confrontation(tatami_id).await?;

        info!(
            "Scheduled {} vs {} on {}: {} combats",
            encounter.team_a,
            encounter.team_b,
            tatami.name,
            combats.len()
        );
        Ok(ScheduledEncounter {
            pool,
            combats,
            tatami,
        })
    }
}

/// Pair each team A fighter (red) with the first unused team B fighter
/// (blue) of the same sex and weight category, in registration order
fn pair_fighters<'a>(
    fighters: &'a [Fighter],
    team_a: &str,
    team_b: &str,
) -> Vec<(&'a Fighter, &'a Fighter)> {
    let mut available: Vec<&Fighter> = fighters.iter().filter(|f| f.team_id == team_b).collect();
    let mut pairs = Vec::new();
    for red in fighters.iter().filter(|f| f.team_id == team_a) {
        if let Some(pos) = available.iter().position(|blue| red.can_face(blue)) {
            pairs.push((red, available.remove(pos)));
        }
    }
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TournamentConfig;
    use crate::roster::Sex;
    use crate::service::test_support::{fighter, services, team};

    fn make(name: &str, sex: Sex, weight: &str, team: &str) -> Fighter {
        Fighter::new(name, sex, weight, team, &TournamentConfig::default()).unwrap()
    }

    #[test]
    fn test_pair_fighters() {
        let fighters = vec![
            make("A1", Sex::M, "-73", "a"),
            make("B1", Sex::M, "-81", "b"),
            make("A2", Sex::M, "-81", "a"),
            make("B2", Sex::M, "-73", "b"),
            make("A3", Sex::F, "-57", "a"),
            make("B3", Sex::M, "-73", "b"),
        ];
        let pairs: Vec<_> = pair_fighters(&fighters, "a", "b")
            .into_iter()
            .map(|(r, b)| (r.name.as_str(), b.name.as_str()))
            .collect();
        assert_eq!(pairs, vec![("A1", "B2"), ("A2", "B1")]);
    }

    #[tokio::test]
    async fn test_generate_replaces_pools() {
        let (_, services) = services().await;
        for id in ["a", "b", "c", "d", "e", "f"] {
            team(&services, id).await;
        }
        let first = services.pools.generate(2, None, Some(1)).await.unwrap();
        assert_eq!(first.len(), 2);
        assert!(first.iter().all(|p| p.team_ids.len() == 3 && p.encounters.len() == 3));

        let second = services.pools.generate(3, None, Some(2)).await.unwrap();
        assert_eq!(second.len(), 3);
        assert_eq!(services.pools.list().await.unwrap().len(), 3);

        let err = services
            .pools
            .generate(1, Some(vec!["a".into(), "ghost".into()]), None)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound { .. }));
        assert!(matches!(
            services.pools.generate(7, None, None).await,
            Err(EngineError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_schedule_without_pairs() {
        let (_, services) = services().await;
        team(&services, "a").await;
        team(&services, "b").await;
        fighter(&services, "a", "A1", "-60").await;
        fighter(&services, "b", "B1", "-100").await;
        let pools = services.pools.generate(1, None, Some(1)).await.unwrap();
        let tatami = services.tatamis.create_tatami(None).await.unwrap();

        let err = services
            .pools
            .schedule_encounter(&pools[0].id, &pools[0].encounters[0].id, &tatami.id)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
        assert!(services.combats.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_schedule_encounter() {
        let (_, services) = services().await;
        team(&services, "a").await;
        team(&services, "b").await;
        fighter(&services, "a", "A1", "-73").await;
        fighter(&services, "b", "B1", "-73").await;
        fighter(&services, "a", "A2", "-90").await;
        let pools = services.pools.generate(1, None, Some(4)).await.unwrap();
        let tatami = services.tatamis.create_tatami(None).await.unwrap();
        let encounter_id = pools[0].encounters[0].id.clone();

        let scheduled = services
            .pools
            .schedule_encounter(&pools[0].id, &encounter_id, &tatami.id)
            .await
            .unwrap();

        assert_eq!(scheduled.combats.len(), 1);
        let encounter = scheduled.pool.encounter(&encounter_id).unwrap();
        assert_eq!(encounter.status, EncounterStatus::Assigned);
        assert_eq!(encounter.combat_ids, vec![scheduled.combats[0].id.clone()]);
        assert_eq!(scheduled.tatami.queue, encounter.combat_ids);

        // red always comes from team A
        let red = services
            .roster
            .get_fighter(&scheduled.combats[0].red)
            .await
            .unwrap();
        assert_eq!(red.team_id, encounter.team_a);
    }

    #[tokio::test]
    async fn test_general_standings_empty() {
        let (_, services) = services().await;
        assert!(services.pools.general_standings().await.unwrap().is_empty());
        assert!(matches!(
            services.pools.standings("ghost").await,
            Err(EngineError::NotFound { .. })
        ));
    }
}
