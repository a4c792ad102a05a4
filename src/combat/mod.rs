//! Combat engine
//!
//! Implements bout scoring with:
//! - Ippon / wazari / yuko scores and shido penalties
//! - Osaekomi (hold) durations converted into scores
//! - Automatic win detection after every scoring change
//! - Score corrections that reopen finished combats
//! - Clock handling with time-expiry decisions

mod hold;
mod score;
mod state;

pub use hold::{HoldOutcome, HoldState, HoldThresholds};
pub use score::{decide_on_time, evaluate_win, Counter, FinishReason, PointType, Side, SideScore};
pub use state::{Combat, CombatState, Correction};
