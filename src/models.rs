use std::fmt;

use serde::{Deserialize, Serialize};

/// A tracked cohort member as read from the roster sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub name: String,
    #[serde(default, rename = "reg")]
    pub secondary_id: String,
    #[serde(rename = "lc_id")]
    pub handle: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "Easy" => Some(Difficulty::Easy),
            "Medium" => Some(Difficulty::Medium),
            "Hard" => Some(Difficulty::Hard),
            _ => None,
        }
    }
}

/// Solved counts split by difficulty. Used both for a single day and for
/// lifetime totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayCounts {
    pub easy: u32,
    pub medium: u32,
    pub hard: u32,
    pub total: u32,
}

impl DayCounts {
    pub fn record(&mut self, difficulty: Difficulty) {
        match difficulty {
            Difficulty::Easy => self.easy += 1,
            Difficulty::Medium => self.medium += 1,
            Difficulty::Hard => self.hard += 1,
        }
        self.total += 1;
    }

    /// Values in column order: Easy, Medium, Hard, Total.
    pub fn as_columns(&self) -> [u32; 4] {
        [self.easy, self.medium, self.hard, self.total]
    }
}

#[cfg(test)]
impl DayCounts {
    pub fn from_tiers(easy: u32, medium: u32, hard: u32) -> Self {
        Self {
            easy,
            medium,
            hard,
            total: easy + medium + hard,
        }
    }
}

impl fmt::Display for DayCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "E={} M={} H={} T={}",
            self.easy, self.medium, self.hard, self.total
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LastContest {
    pub name: String,
    pub rank: Option<u64>,
    pub problems_solved: Option<u32>,
    pub total_problems: Option<u32>,
}

impl LastContest {
    pub fn solved_fraction(&self) -> String {
        let part = |value: Option<u32>| value.map_or_else(|| "?".to_string(), |v| v.to_string());
        format!(
            "{}/{}",
            part(self.problems_solved),
            part(self.total_problems)
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContestSnapshot {
    pub rating: Option<f64>,
    pub global_rank: Option<u64>,
    pub contests_attended: Option<u32>,
    pub last_contest: Option<LastContest>,
}

impl ContestSnapshot {
    pub fn attended(&self) -> bool {
        self.last_contest.is_some()
    }
}
