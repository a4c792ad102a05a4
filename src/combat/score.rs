//! Score counters and win rules

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Corner of the mat a fighter starts from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Red,
    Blue,
}

impl Side {
    pub fn opponent(self) -> Side {
        match self {
            Side::Red => Side::Blue,
            Side::Blue => Side::Red,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Side::Red => "red",
            Side::Blue => "blue",
        })
    }
}

impl FromStr for Side {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "red" | "rouge" => Ok(Side::Red),
            "blue" | "bleu" => Ok(Side::Blue),
            other => Err(EngineError::validation(format!("unknown side: {other}"))),
        }
    }
}

/// Technical scores a referee can award
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointType {
    Ippon,
    Wazari,
    Yuko,
}

impl PointType {
    /// Rank used to reject upward conversions (higher = more severe)
    fn severity(self) -> u8 {
        match self {
            PointType::Ippon => 3,
            PointType::Wazari => 2,
            PointType::Yuko => 1,
        }
    }

    /// Whether a correction may turn `self` into `to`
    pub fn converts_down_to(self, to: PointType) -> bool {
        self.severity() > to.severity()
    }
}

impl fmt::Display for PointType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PointType::Ippon => "ippon",
            PointType::Wazari => "wazari",
            PointType::Yuko => "yuko",
        })
    }
}

/// Any counter on a side, including penalties
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Counter {
    Ippon,
    Wazari,
    Yuko,
    Shido,
}

impl From<PointType> for Counter {
    fn from(point: PointType) -> Self {
        match point {
            PointType::Ippon => Counter::Ippon,
            PointType::Wazari => Counter::Wazari,
            PointType::Yuko => Counter::Yuko,
        }
    }
}

/// Why a combat ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Ippon,
    WazariDouble,
    ShidoTriple,
    TimeExpired,
    Manual,
}

impl FinishReason {
    /// Strength of a scoring rule; only meaningful for the automatic rules
    fn strength(self) -> u8 {
        match self {
            FinishReason::Ippon => 3,
            FinishReason::WazariDouble => 2,
            FinishReason::ShidoTriple => 1,
            FinishReason::TimeExpired | FinishReason::Manual => 0,
        }
    }
}

/// Counters for one side of a combat
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SideScore {
    /// 0 or 1
    pub ippon: u32,
    pub wazari: u32,
    pub yuko: u32,
    pub shido: u32,
}

impl SideScore {
    pub fn get(&self, counter: Counter) -> u32 {
        match counter {
            Counter::Ippon => self.ippon,
            Counter::Wazari => self.wazari,
            Counter::Yuko => self.yuko,
            Counter::Shido => self.shido,
        }
    }

    /// Add one unit; ippon is a flag and never exceeds 1
    pub fn increment(&mut self, counter: Counter) {
        match counter {
            Counter::Ippon => self.ippon = 1,
            Counter::Wazari => self.wazari += 1,
            Counter::Yuko => self.yuko += 1,
            Counter::Shido => self.shido += 1,
        }
    }

    /// Remove one unit, clamping at zero. Returns whether anything changed.
    pub fn decrement(&mut self, counter: Counter) -> bool {
        let slot = match counter {
            Counter::Ippon => &mut self.ippon,
            Counter::Wazari => &mut self.wazari,
            Counter::Yuko => &mut self.yuko,
            Counter::Shido => &mut self.shido,
        };
        if *slot > 0 {
            *slot -= 1;
            true
        } else {
            false
        }
    }

    pub fn clear(&mut self) {
        *self = SideScore::default();
    }
}

/// Strongest win rule satisfied by `side`, if any
pub fn winning_rule(own: &SideScore, opponent: &SideScore) -> Option<FinishReason> {
    if own.ippon >= 1 {
        Some(FinishReason::Ippon)
    } else if own.wazari >= 2 {
        Some(FinishReason::WazariDouble)
    } else if opponent.shido >= 3 {
        Some(FinishReason::ShidoTriple)
    } else {
        None
    }
}

/// Decide the winner after a scoring change.
///
/// When both sides satisfy a rule the stronger rule wins; at equal strength
/// the side credited by the triggering event (`credited`) wins.
pub fn evaluate_win(
    red: &SideScore,
    blue: &SideScore,
    credited: Side,
) -> Option<(Side, FinishReason)> {
    let red_rule = winning_rule(red, blue);
    let blue_rule = winning_rule(blue, red);

    match (red_rule, blue_rule) {
        (None, None) => None,
        (Some(r), None) => Some((Side::Red, r)),
        (None, Some(b)) => Some((Side::Blue, b)),
        (Some(r), Some(b)) => {
            if r.strength() > b.strength() {
                Some((Side::Red, r))
            } else if b.strength() > r.strength() {
                Some((Side::Blue, b))
            } else {
                Some((credited, r))
            }
        }
    }
}

/// Winner at time expiry: more wazari, then more yuko, else none
pub fn decide_on_time(red: &SideScore, blue: &SideScore) -> Option<Side> {
    use std::cmp::Ordering;

    match red.wazari.cmp(&blue.wazari).then(red.yuko.cmp(&blue.yuko)) {
        Ordering::Greater => Some(Side::Red),
        Ordering::Less => Some(Side::Blue),
        Ordering::Equal => None,
    }
}
