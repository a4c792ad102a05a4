//! Tatami (mat) queues
//!
//! Each mat runs an ordered queue of combats with a pointer to the current
//! one. Every navigation or assignment is recorded in an append-only history.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::combat::{Combat, Side};
use crate::error::{EngineError, EngineResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TatamiState {
    Free,
    Busy,
    Paused,
}

impl FromStr for TatamiState {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "free" => Ok(TatamiState::Free),
            "busy" => Ok(TatamiState::Busy),
            "paused" => Ok(TatamiState::Paused),
            other => Err(EngineError::validation(format!(
                "invalid tatami state {other:?}; expected free, busy or paused"
            ))),
        }
    }
}

impl fmt::Display for TatamiState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TatamiState::Free => "free",
            TatamiState::Busy => "busy",
            TatamiState::Paused => "paused",
        })
    }
}

/// One line of a tatami's history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub action: String,
    pub timestamp: DateTime<Utc>,
    pub payload: serde_json::Value,
}

/// Combats won by each side in the queue currently on the mat
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfrontationScore {
    pub red: u32,
    pub blue: u32,
}

impl ConfrontationScore {
    /// Count finished combats by winning side
    pub fn tally<'a>(combats: impl IntoIterator<Item = &'a Combat>) -> Self {
        let mut score = Self::default();
        for combat in combats {
            if !combat.is_finished() {
                continue;
            }
            match combat.winner {
                Some(Side::Red) => score.red += 1,
                Some(Side::Blue) => score.blue += 1,
                None => {}
            }
        }
        score
    }
}

/// A competition mat
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tatami {
    pub id: String,
    pub name: String,
    pub state: TatamiState,
    /// Combat IDs in scheduling order
    pub queue: Vec<String>,
    pub current_index: usize,
    pub history: Vec<HistoryEntry>,
    pub confrontation: ConfrontationScore,
    pub created_at: DateTime<Utc>,
}

impl Tatami {
    pub fn new(name: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            state: TatamiState::Free,
            queue: Vec::new(),
            current_index: 0,
            history: Vec::new(),
            confrontation: ConfrontationScore::default(),
            created_at: Utc::now(),
        }
    }

    fn record(&mut self, action: &str, payload: serde_json::Value) {
        self.history.push(HistoryEntry {
            action: action.to_string(),
            timestamp: Utc::now(),
            payload,
        });
    }

    /// Append combats to the queue and rewind to its start.
    /// The caller has already checked that every ID resolves.
    pub fn assign(&mut self, combat_ids: &[String]) -> EngineResult<()> {
        if combat_ids.is_empty() {
            return Err(EngineError::validation("combat list must not be empty"));
        }
        self.queue.extend(combat_ids.iter().cloned());
        self.current_index = 0;
        self.state = TatamiState::Busy;
        self.record("assign_combats", json!({ "combats": combat_ids }));
        Ok(())
    }

    /// ID of the combat under the pointer
    pub fn current_combat_id(&self) -> Option<&str> {
        self.queue.get(self.current_index).map(String::as_str)
    }

    pub fn holds(&self, combat_id: &str) -> bool {
        self.queue.iter().any(|id| id == combat_id)
    }

    /// Move to the next combat; returns the new index
    pub fn advance(&mut self) -> EngineResult<usize> {
        if self.current_index + 1 >= self.queue.len() {
            return Err(EngineError::boundary("already at the last combat"));
        }
        self.current_index += 1;
        self.record("next_combat", json!({ "index": self.current_index }));
        Ok(self.current_index)
    }

    /// Move to the previous combat; returns the new index
    pub fn retreat(&mut self) -> EngineResult<usize> {
        if self.queue.is_empty() || self.current_index == 0 {
            return Err(EngineError::boundary("already at the first combat"));
        }
        self.current_index -= 1;
        self.record("previous_combat", json!({ "index": self.current_index }));
        Ok(self.current_index)
    }

    /// Drop the queue and free the mat. Combats themselves are untouched.
    pub fn release(&mut self) {
        self.queue.clear();
        self.current_index = 0;
        self.state = TatamiState::Free;
        self.confrontation = ConfrontationScore::default();
        self.record("release", json!({}));
    }

    pub fn rename(&mut self, name: &str) -> EngineResult<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(EngineError::validation("tatami name must not be empty"));
        }
        self.name = name.to_string();
        self.record("rename", json!({ "name": name }));
        Ok(())
    }

    pub fn set_state(&mut self, state: TatamiState) {
        self.state = state;
        self.record("change_state", json!({ "state": state }));
    }
}
