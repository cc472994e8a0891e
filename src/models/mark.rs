use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::models::PrayerType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkStatus {
    Done,
}

impl MarkStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MarkStatus::Done => "done",
        }
    }
}

impl FromStr for MarkStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "done" => Ok(MarkStatus::Done),
            _ => Err(anyhow::anyhow!("Unknown mark status: {}", s)),
        }
    }
}

/// A user's record of having prayed `prayer` on `date`. Never updated once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mark {
    pub id: i64,
    pub user_id: i64,
    pub date: NaiveDate,
    pub prayer: PrayerType,
    pub marked_at: NaiveDateTime,
    pub status: MarkStatus,
}
