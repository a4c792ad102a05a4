//! Pool standings rows and ranking

use serde::{Deserialize, Serialize};

use super::Pool;

/// Standings of one team within a pool (or summed across pools)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StandingRow {
    pub team_id: String,
    pub points: i64,
    pub wins: i64,
    pub losses: i64,
    pub draws: i64,
    pub matches_played: i64,
    /// Individual combats won
    pub scored: i64,
    /// Individual combats lost
    pub conceded: i64,
    pub differential: i64,
}

impl StandingRow {
    pub fn new(team_id: &str) -> Self {
        Self {
            team_id: team_id.to_string(),
            points: 0,
            wins: 0,
            losses: 0,
            draws: 0,
            matches_played: 0,
            scored: 0,
            conceded: 0,
            differential: 0,
        }
    }

    /// Add (`sign = 1`) or take back (`sign = -1`) one encounter outcome
    /// where this team won `own` combats and its opponent won `other`.
    pub(crate) fn apply(&mut self, own: u32, other: u32, win_points: u32, draw_points: u32, sign: i64) {
        let (own, other) = (i64::from(own), i64::from(other));
        if own > other {
            self.wins += sign;
            self.points += sign * i64::from(win_points);
        } else if own < other {
            self.losses += sign;
        } else {
            self.draws += sign;
            self.points += sign * i64::from(draw_points);
        }
        self.matches_played += sign;
        self.scored += sign * own;
        self.conceded += sign * other;
        self.differential = self.scored - self.conceded;
    }

    fn absorb(&mut self, other: &StandingRow) {
        self.points += other.points;
        self.wins += other.wins;
        self.losses += other.losses;
        self.draws += other.draws;
        self.matches_played += other.matches_played;
        self.scored += other.scored;
        self.conceded += other.conceded;
        self.differential = self.scored - self.conceded;
    }
}

/// Order by points, then differential, then wins (all descending).
/// The sort is stable so equal rows keep their insertion order.
pub fn rank(rows: &mut [StandingRow]) {
    rows.sort_by(|a, b| {
        b.points
            .cmp(&a.points)
            .then(b.differential.cmp(&a.differential))
            .then(b.wins.cmp(&a.wins))
    });
}

/// Sum every team's rows across pools and rank the result
pub fn general_standings(pools: &[Pool]) -> Vec<StandingRow> {
    let mut rows: Vec<StandingRow> = Vec::new();
    for row in pools.iter().flat_map(|p| p.standings.iter()) {
        match rows.iter_mut().find(|r| r.team_id == row.team_id) {
            Some(existing) => existing.absorb(row),
            None => rows.push(row.clone()),
        }
    }
    rank(&mut rows);
    rows
}
