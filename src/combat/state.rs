//! Combat state machine
//!
//! A combat moves `scheduled -> active <-> paused -> finished`. Scoring runs
//! win evaluation after every change; a correction reopens a finished combat
//! to `paused`; a reset returns any combat to `scheduled`.
//!
//! All operations here are pure over the combat value. Services apply them
//! to a loaded copy and persist only when they succeed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::hold::{HoldOutcome, HoldState, HoldThresholds};
use super::score::{decide_on_time, evaluate_win, Counter, FinishReason, PointType, Side, SideScore};
use crate::error::{EngineError, EngineResult};

/// Lifecycle state of a combat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CombatState {
    Scheduled,
    Active,
    Paused,
    Finished,
}

/// Score correction applied by the table officials
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum Correction {
    /// Take back one unit of a counter (clamps at zero)
    Remove { counter: Counter },
    /// Downgrade one unit of a score
    Convert { from: PointType, to: PointType },
    /// Zero every counter of the side
    ResetSide,
}

/// A single bout between a red and a blue fighter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Combat {
    pub id: String,
    /// Red fighter ID
    pub red: String,
    /// Blue fighter ID
    pub blue: String,
    pub state: CombatState,
    pub red_score: SideScore,
    pub blue_score: SideScore,
    pub duration_secs: u32,
    pub remaining_secs: u32,
    pub hold: HoldState,
    pub finish_reason: Option<FinishReason>,
    pub winner: Option<Side>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Combat {
    /// Create a scheduled combat with zeroed counters
    pub fn new(red: &str, blue: &str, duration_secs: u32) -> EngineResult<Self> {
        if red.trim().is_empty() || blue.trim().is_empty() {
            return Err(EngineError::validation("red and blue fighters are required"));
        }
        if red == blue {
            return Err(EngineError::validation("a fighter cannot face themselves"));
        }
        if duration_secs == 0 {
            return Err(EngineError::validation("combat duration must be positive"));
        }

        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            red: red.to_string(),
            blue: blue.to_string(),
            state: CombatState::Scheduled,
            red_score: SideScore::default(),
            blue_score: SideScore::default(),
            duration_secs,
            remaining_secs: duration_secs,
            hold: HoldState::default(),
            finish_reason: None,
            winner: None,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
        })
    }

    pub fn score(&self, side: Side) -> &SideScore {
        match side {
            Side::Red => &self.red_score,
            Side::Blue => &self.blue_score,
        }
    }

    fn score_mut(&mut self, side: Side) -> &mut SideScore {
        match side {
            Side::Red => &mut self.red_score,
            Side::Blue => &mut self.blue_score,
        }
    }

    /// Fighter ID on a side
    pub fn fighter(&self, side: Side) -> &str {
        match side {
            Side::Red => &self.red,
            Side::Blue => &self.blue,
        }
    }

    pub fn involves(&self, fighter_id: &str) -> bool {
        self.red == fighter_id || self.blue == fighter_id
    }

    pub fn is_finished(&self) -> bool {
        self.state == CombatState::Finished
    }

    pub fn elapsed_secs(&self) -> u32 {
        self.duration_secs.saturating_sub(self.remaining_secs)
    }

    /// Start or resume the clock
    pub fn start(&mut self) -> EngineResult<()> {
        match self.state {
            CombatState::Scheduled | CombatState::Paused => {
                self.state = CombatState::Active;
                if self.started_at.is_none() {
                    self.started_at = Some(Utc::now());
                }
                Ok(())
            }
            other => Err(EngineError::invalid_state(format!(
                "cannot start a combat that is {other:?}"
            ))),
        }
    }

    /// Stop the clock (matte)
    pub fn pause(&mut self) -> EngineResult<()> {
        if self.state != CombatState::Active {
            return Err(EngineError::invalid_state(format!(
                "cannot pause a combat that is {:?}",
                self.state
            )));
        }
        self.state = CombatState::Paused;
        Ok(())
    }

    /// Award a technical score. Returns true if the combat ended.
    pub fn mark_point(&mut self, side: Side, point: PointType) -> EngineResult<bool> {
        self.ensure_not_finished()?;
        Ok(self.apply(side, point.into(), side))
    }

    /// Give a penalty. Returns true if the combat ended.
    pub fn give_shido(&mut self, side: Side) -> EngineResult<bool> {
        self.ensure_not_finished()?;
        Ok(self.apply(side, Counter::Shido, side.opponent()))
    }

    /// Start an osaekomi for `side`
    pub fn start_hold(&mut self, side: Side) -> EngineResult<()> {
        if self.state != CombatState::Active {
            return Err(EngineError::invalid_state(
                "combat must be active to start a hold",
            ));
        }
        if self.hold.active {
            return Err(EngineError::invalid_state("a hold is already running"));
        }
        self.hold = HoldState::start(side);
        Ok(())
    }

    /// Stop the running hold and convert its duration into a score
    pub fn stop_hold(
        &mut self,
        held_secs: f64,
        thresholds: &HoldThresholds,
    ) -> EngineResult<HoldOutcome> {
        if !held_secs.is_finite() || held_secs < 0.0 {
            return Err(EngineError::validation(format!(
                "invalid hold duration: {held_secs}"
            )));
        }
        let side = match (self.hold.active, self.hold.side) {
            (true, Some(side)) => side,
            _ => return Err(EngineError::invalid_state("no hold is running")),
        };

        let point = thresholds.award(held_secs);
        let finished = match point {
            Some(point) => self.mark_point(side, point)?,
            None => false,
        };
        self.hold.clear();

        Ok(HoldOutcome {
            side,
            point,
            finished,
        })
    }

    /// Apply a correction; reopens a finished combat
    pub fn correct(&mut self, side: Side, correction: Correction) -> EngineResult<()> {
        match correction {
            Correction::Remove { counter } => {
                self.score_mut(side).decrement(counter);
            }
            Correction::Convert { from, to } => {
                if !from.converts_down_to(to) {
                    return Err(EngineError::validation(format!(
                        "cannot convert {from} into {to}"
                    )));
                }
                let score = self.score_mut(side);
                if score.decrement(from.into()) {
                    score.increment(to.into());
                }
            }
            Correction::ResetSide => self.score_mut(side).clear(),
        }

        if self.is_finished() {
            self.reopen();
        }
        Ok(())
    }

    /// Return to a fresh scheduled combat. Always allowed.
    pub fn reset(&mut self) {
        self.state = CombatState::Scheduled;
        self.red_score.clear();
        self.blue_score.clear();
        self.hold.clear();
        self.remaining_secs = self.duration_secs;
        self.started_at = None;
        self.clear_finish();
    }

    /// Run the clock down. Returns true if time expiry ended the combat.
    pub fn advance_time(&mut self, delta_secs: u32) -> EngineResult<bool> {
        if self.state != CombatState::Active {
            return Err(EngineError::invalid_state(
                "the clock only runs while the combat is active",
            ));
        }
        self.remaining_secs = self.remaining_secs.saturating_sub(delta_secs);
        Ok(self.check_time())
    }

    /// Set the clock directly. Returns true if time expiry ended the combat.
    pub fn set_remaining_time(&mut self, secs: u32) -> EngineResult<bool> {
        self.ensure_not_finished()?;
        self.remaining_secs = secs;
        Ok(self.check_time())
    }

    /// Referee decision, with or without a winner
    pub fn finish_manually(&mut self, winner: Option<Side>) -> EngineResult<()> {
        self.ensure_not_finished()?;
        self.finish(FinishReason::Manual, winner);
        Ok(())
    }

    fn ensure_not_finished(&self) -> EngineResult<()> {
        if self.is_finished() {
            return Err(EngineError::invalid_state(
                "combat is finished; correct the score first",
            ));
        }
        Ok(())
    }

    fn apply(&mut self, side: Side, counter: Counter, credited: Side) -> bool {
        self.score_mut(side).increment(counter);

        match evaluate_win(&self.red_score, &self.blue_score, credited) {
            Some((winner, reason)) => {
                self.finish(reason, Some(winner));
                true
            }
            None => false,
        }
    }

    fn check_time(&mut self) -> bool {
        if self.remaining_secs == 0 && self.state == CombatState::Active {
            let winner = decide_on_time(&self.red_score, &self.blue_score);
            self.finish(FinishReason::TimeExpired, winner);
            true
        } else {
            false
        }
    }

    fn finish(&mut self, reason: FinishReason, winner: Option<Side>) {
        self.state = CombatState::Finished;
        self.finish_reason = Some(reason);
        self.winner = winner;
        self.finished_at = Some(Utc::now());
        self.hold.clear();
    }

    fn reopen(&mut self) {
        self.state = CombatState::Paused;
        self.clear_finish();
    }

    fn clear_finish(&mut self) {
        self.finish_reason = None;
        self.winner = None;
        self.finished_at = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn combat() -> Combat {
        Combat::new("f1", "f2", 240).unwrap()
    }

    fn active() -> Combat {
        let mut c = combat();
        c.start().unwrap();
        c
    }

    fn assert_counters_valid(c: &Combat) {
        for side in [Side::Red, Side::Blue] {
            assert!(c.score(side).ippon <= 1);
        }
    }

    #[test]
    fn test_new_combat() {
        let c = combat();
        assert_eq!(c.state, CombatState::Scheduled);
        assert_eq!(c.red_score, SideScore::default());
        assert_eq!(c.blue_score, SideScore::default());
        assert_eq!(c.remaining_secs, 240);
        assert!(c.winner.is_none());
    }

    #[test]
    fn test_new_requires_both_fighters() {
        assert!(matches!(
            Combat::new("", "f2", 240),
            Err(EngineError::Validation(_))
        ));
        assert!(matches!(
            Combat::new("f1", " ", 240),
            Err(EngineError::Validation(_))
        ));
        assert!(Combat::new("f1", "f1", 240).is_err());
    }

    #[test]
    fn test_start_and_pause() {
        let mut c = combat();
        assert!(c.pause().is_err());
        c.start().unwrap();
        let first_start = c.started_at;
        c.pause().unwrap();
        assert_eq!(c.state, CombatState::Paused);
        c.start().unwrap();
        assert_eq!(c.state, CombatState::Active);
        assert_eq!(c.started_at, first_start);
        assert!(c.start().is_err());
    }

    #[test]
    fn test_ippon_wins_regardless_of_opponent() {
        let mut c = active();
        c.mark_point(Side::Red, PointType::Wazari).unwrap();
        c.give_shido(Side::Blue).unwrap();
        c.give_shido(Side::Blue).unwrap();

        let ended = c.mark_point(Side::Blue, PointType::Ippon).unwrap();
        assert!(ended);
        assert_eq!(c.state, CombatState::Finished);
        assert_eq!(c.winner, Some(Side::Blue));
        assert_eq!(c.finish_reason, Some(FinishReason::Ippon));
        assert!(c.finished_at.is_some());
        assert_counters_valid(&c);
    }

    #[test]
    fn test_double_wazari_scenario() {
        let mut c = active();
        assert!(!c.mark_point(Side::Red, PointType::Wazari).unwrap());
        assert_eq!(c.state, CombatState::Active);
        assert!(c.mark_point(Side::Red, PointType::Wazari).unwrap());

        assert_eq!(c.state, CombatState::Finished);
        assert_eq!(c.finish_reason, Some(FinishReason::WazariDouble));
        assert_eq!(c.winner, Some(Side::Red));
    }

    #[test]
    fn test_triple_shido_awards_opponent() {
        let mut c = active();
        c.give_shido(Side::Red).unwrap();
        c.give_shido(Side::Red).unwrap();
        assert!(!c.is_finished());
        assert!(c.give_shido(Side::Red).unwrap());

        assert_eq!(c.winner, Some(Side::Blue));
        assert_eq!(c.finish_reason, Some(FinishReason::ShidoTriple));
    }

    #[test]
    fn test_yuko_never_ends_combat() {
        let mut c = active();
        for _ in 0..10 {
            assert!(!c.mark_point(Side::Blue, PointType::Yuko).unwrap());
        }
        assert_eq!(c.blue_score.yuko, 10);
        assert_eq!(c.state, CombatState::Active);
    }

    #[test]
    fn test_scoring_finished_combat_rejected() {
        let mut c = active();
        c.mark_point(Side::Red, PointType::Ippon).unwrap();
        let before = c.clone();

        assert!(matches!(
            c.mark_point(Side::Blue, PointType::Yuko),
            Err(EngineError::InvalidState(_))
        ));
        assert!(c.give_shido(Side::Blue).is_err());
        assert_eq!(c, before);
    }

    #[test]
    fn test_hold_requires_active_combat() {
        let mut c = combat();
        assert!(matches!(
            c.start_hold(Side::Red),
            Err(EngineError::InvalidState(_))
        ));
        c.start().unwrap();
        c.start_hold(Side::Red).unwrap();
        assert!(c.hold.active);
        assert_eq!(c.hold.side, Some(Side::Red));
        assert!(c.hold.started_at.is_some());

        // only one hold at a time
        assert!(c.start_hold(Side::Blue).is_err());
    }

    #[test]
    fn test_stop_hold_without_hold() {
        let mut c = active();
        assert!(matches!(
            c.stop_hold(12.0, &HoldThresholds::default()),
            Err(EngineError::InvalidState(_))
        ));
    }

    #[test]
    fn test_stop_hold_boundaries() {
        let thresholds = HoldThresholds::default();
        let cases = [
            (2.0, None),
            (3.0, Some(PointType::Yuko)),
            (9.0, Some(PointType::Yuko)),
            (10.0, Some(PointType::Wazari)),
            (19.0, Some(PointType::Wazari)),
            (20.0, Some(PointType::Ippon)),
        ];

        for (held, expected) in cases {
            let mut c = active();
            c.start_hold(Side::Red).unwrap();
            let outcome = c.stop_hold(held, &thresholds).unwrap();
            assert_eq!(outcome.point, expected, "held {held}s");
            assert!(!c.hold.active);
            assert_eq!(c.hold, HoldState::default());
        }
    }

    #[test]
    fn test_hold_ippon_scenario() {
        let mut c = active();
        c.start_hold(Side::Blue).unwrap();
        let outcome = c.stop_hold(25.0, &HoldThresholds::default()).unwrap();

        assert_eq!(outcome.side, Side::Blue);
        assert_eq!(outcome.point, Some(PointType::Ippon));
        assert!(outcome.finished);
        assert_eq!(c.blue_score.ippon, 1);
        assert_eq!(c.state, CombatState::Finished);
        assert_eq!(c.winner, Some(Side::Blue));
    }

    #[test]
    fn test_hold_second_wazari_ends_combat() {
        let mut c = active();
        c.mark_point(Side::Red, PointType::Wazari).unwrap();
        c.start_hold(Side::Red).unwrap();
        let outcome = c.stop_hold(12.0, &HoldThresholds::default()).unwrap();
        assert!(outcome.finished);
        assert_eq!(c.finish_reason, Some(FinishReason::WazariDouble));
    }

    #[test]
    fn test_stop_hold_rejects_negative_duration() {
        let mut c = active();
        c.start_hold(Side::Red).unwrap();
        assert!(c.stop_hold(-1.0, &HoldThresholds::default()).is_err());
        assert!(c.hold.active);
    }

    #[test]
    fn test_remove_ippon_reopens() {
        let mut c = active();
        c.mark_point(Side::Red, PointType::Ippon).unwrap();
        assert!(c.is_finished());

        c.correct(
            Side::Red,
            Correction::Remove {
                counter: Counter::Ippon,
            },
        )
        .unwrap();

        assert_eq!(c.red_score.ippon, 0);
        assert_eq!(c.state, CombatState::Paused);
        assert_eq!(c.winner, None);
        assert_eq!(c.finish_reason, None);
        assert_eq!(c.finished_at, None);
    }

    #[test]
    fn test_remove_clamps_at_zero() {
        let mut c = active();
        c.correct(
            Side::Blue,
            Correction::Remove {
                counter: Counter::Shido,
            },
        )
        .unwrap();
        assert_eq!(c.blue_score.shido, 0);
        assert_eq!(c.state, CombatState::Active);
    }

    #[test]
    fn test_convert_down() {
        let mut c = active();
        c.mark_point(Side::Red, PointType::Ippon).unwrap();
        c.correct(
            Side::Red,
            Correction::Convert {
                from: PointType::Ippon,
                to: PointType::Wazari,
            },
        )
        .unwrap();
        assert_eq!(c.red_score.ippon, 0);
        assert_eq!(c.red_score.wazari, 1);
        assert_eq!(c.state, CombatState::Paused);

        c.correct(
            Side::Red,
            Correction::Convert {
                from: PointType::Wazari,
                to: PointType::Yuko,
            },
        )
        .unwrap();
        assert_eq!(c.red_score.wazari, 0);
        assert_eq!(c.red_score.yuko, 1);
    }

    #[test]
    fn test_convert_up_rejected() {
        let mut c = active();
        c.mark_point(Side::Red, PointType::Yuko).unwrap();
        let before = c.clone();
        let result = c.correct(
            Side::Red,
            Correction::Convert {
                from: PointType::Yuko,
                to: PointType::Wazari,
            },
        );
        assert!(matches!(result, Err(EngineError::Validation(_))));
        assert_eq!(c, before);
    }

    #[test]
    fn test_convert_empty_source_is_noop() {
        let mut c = active();
        c.correct(
            Side::Blue,
            Correction::Convert {
                from: PointType::Wazari,
                to: PointType::Yuko,
            },
        )
        .unwrap();
        assert_eq!(c.blue_score, SideScore::default());
    }

    #[test]
    fn test_reset_side() {
        let mut c = active();
        c.mark_point(Side::Blue, PointType::Wazari).unwrap();
        c.mark_point(Side::Blue, PointType::Yuko).unwrap();
        c.give_shido(Side::Blue).unwrap();
        c.mark_point(Side::Red, PointType::Yuko).unwrap();

        c.correct(Side::Blue, Correction::ResetSide).unwrap();
        assert_eq!(c.blue_score, SideScore::default());
        assert_eq!(c.red_score.yuko, 1);
    }

    #[test]
    fn test_reset_combat_from_any_state() {
        let mut c = active();
        c.start_hold(Side::Red).unwrap();
        c.advance_time(30).unwrap();
        c.mark_point(Side::Blue, PointType::Ippon).unwrap();

        c.reset();
        assert_eq!(c.state, CombatState::Scheduled);
        assert_eq!(c.red_score, SideScore::default());
        assert_eq!(c.blue_score, SideScore::default());
        assert_eq!(c.hold, HoldState::default());
        assert_eq!(c.remaining_secs, c.duration_secs);
        assert!(c.winner.is_none() && c.finish_reason.is_none());
        assert!(c.started_at.is_none() && c.finished_at.is_none());

        // reset of a fresh combat is harmless
        c.reset();
        assert_eq!(c.state, CombatState::Scheduled);
    }

    #[test]
    fn test_time_expiry_decides_by_score() {
        let mut c = active();
        c.mark_point(Side::Blue, PointType::Wazari).unwrap();
        c.mark_point(Side::Red, PointType::Yuko).unwrap();
        assert!(!c.advance_time(200).unwrap());
        assert_eq!(c.elapsed_secs(), 200);
        assert!(c.advance_time(100).unwrap());

        assert_eq!(c.remaining_secs, 0);
        assert_eq!(c.finish_reason, Some(FinishReason::TimeExpired));
        assert_eq!(c.winner, Some(Side::Blue));
    }

    #[test]
    fn test_time_expiry_draw() {
        let mut c = active();
        c.give_shido(Side::Red).unwrap();
        assert!(c.set_remaining_time(0).unwrap());
        assert_eq!(c.finish_reason, Some(FinishReason::TimeExpired));
        assert_eq!(c.winner, None);
    }

    #[test]
    fn test_clock_only_runs_when_active() {
        let mut c = combat();
        assert!(c.advance_time(10).is_err());

        // setting the clock on a paused combat does not finish it
        c.start().unwrap();
        c.pause().unwrap();
        assert!(!c.set_remaining_time(0).unwrap());
        assert_eq!(c.state, CombatState::Paused);
    }

    #[test]
    fn test_expiry_clears_hold() {
        let mut c = active();
        c.start_hold(Side::Red).unwrap();
        c.advance_time(240).unwrap();
        assert!(c.is_finished());
        assert!(!c.hold.active);
    }

    #[test]
    fn test_manual_finish() {
        let mut c = active();
        c.finish_manually(Some(Side::Red)).unwrap();
        assert_eq!(c.finish_reason, Some(FinishReason::Manual));
        assert_eq!(c.winner, Some(Side::Red));
        assert!(c.finish_manually(None).is_err());
    }

    #[test]
    fn test_serde_shape() {
        let c = combat();
        let json = serde_json::to_value(&c).unwrap();
        assert_eq!(json["state"], "scheduled");
        assert_eq!(json["red_score"]["wazari"], 0);

        let correction: Correction =
            serde_json::from_value(serde_json::json!({"operation": "convert", "from": "ippon", "to": "yuko"}))
                .unwrap();
        assert_eq!(
            correction,
            Correction::Convert {
                from: PointType::Ippon,
                to: PointType::Yuko
            }
        );
    }
}
