//! Repository-backed tournament operations
//!
//! Each operation loads the entities it needs, applies the pure rules from
//! the domain modules, persists the result and announces the change.

pub mod bracket;
pub mod combats;
pub mod pools;
pub mod roster;
pub mod tatamis;

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::config::TournamentConfig;
use crate::notify::Notifier;
use crate::store::EntityStore;

pub use bracket::BracketService;
pub use combats::{ActionOutcome, CombatAction, CombatService};
pub use pools::{PoolService, ScheduledEncounter};
pub use roster::{NewFighter, NewTeam, RosterService};
pub use tatamis::{CornerSummary, OngoingConfrontation, QueuedCombat, TatamiService};

/// Shared handles every service works with
#[derive(Clone)]
pub struct Context {
    pub store: Arc<EntityStore>,
    pub config: Arc<TournamentConfig>,
    pub notifier: Arc<Notifier>,
}

impl Context {
    pub fn new(store: Arc<EntityStore>, config: TournamentConfig, notifier: Arc<Notifier>) -> Self {
        Self {
            store,
            config: Arc::new(config),
            notifier,
        }
    }
}

/// Seeded draws are reproducible; otherwise seed from the OS
fn draw_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    }
}

/// All services, built over one context
#[derive(Clone)]
pub struct Services {
    pub roster: Arc<RosterService>,
    pub combats: Arc<CombatService>,
    pub tatamis: Arc<TatamiService>,
    pub pools: Arc<PoolService>,
    pub bracket: Arc<BracketService>,
}

impl Services {
    pub fn new(ctx: Context) -> Self {
        Self {
            roster: Arc::new(RosterService::new(ctx.clone())),
            combats: Arc::new(CombatService::new(ctx.clone())),
            tatamis: Arc::new(TatamiService::new(ctx.clone())),
            pools: Arc::new(PoolService::new(ctx.clone())),
            bracket: Arc::new(BracketService::new(ctx)),
        }
    }
}
