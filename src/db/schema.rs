use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::PollError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionType {
    /// A vote must select exactly `allowed_selections` options.
    Strict,
    /// A vote may select between one and `allowed_selections` options.
    Soft,
}

impl SelectionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SelectionType::Strict => "strict",
            SelectionType::Soft => "soft",
        }
    }
}

impl fmt::Display for SelectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SelectionType {
    type Err = PollError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "strict" => Ok(SelectionType::Strict),
            "soft" => Ok(SelectionType::Soft),
            _ => Err(PollError::validation(r#"Selection type must be either "strict" or "soft""#)),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Poll {
    pub id: i32,
    pub time_created: DateTime<Utc>,
    pub time_updated: DateTime<Utc>,
    pub id_created_by: String,
    pub question: String,
    pub allowed_selections: i32,
    pub selection_type: SelectionType,
    pub time_end: DateTime<Utc>,
    pub options: Vec<PollOption>,
}

impl Poll {
    pub fn option_by_text(&self, text: &str) -> Option<&PollOption> {
        self.options.iter().find(|o| o.option == text)
    }

    pub fn is_open_at(&self, now: DateTime<Utc>) -> bool {
        now < self.time_end
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PollOption {
    pub id_poll: i32,
    pub id: i32,
    pub option: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Vote {
    pub id: i32,
    pub id_poll: i32,
    pub id_user: String,
    pub time_created: DateTime<Utc>,
    pub choices: Vec<VoteChoice>,
}

/// One selected option: the stable option id plus the text it had when the vote was cast.
#[derive(Clone, Debug, PartialEq)]
pub struct VoteChoice {
    pub id_option: i32,
    pub option: String,
}

/// A validated poll ready to be persisted.
#[derive(Clone, Debug)]
pub struct NewPoll {
    pub id_created_by: String,
    pub question: String,
    pub options: Vec<String>,
    pub allowed_selections: i32,
    pub selection_type: SelectionType,
    pub time_end: DateTime<Utc>,
}

/// The complete replacement state of a poll produced by an update.
#[derive(Clone, Debug)]
pub struct PollRevision {
    pub question: String,
    pub options: Vec<RevisedOption>,
    pub allowed_selections: i32,
    pub selection_type: SelectionType,
    pub time_end: DateTime<Utc>,
}

/// `id` is kept when the option already existed on the poll, `None` for new options.
#[derive(Clone, Debug)]
pub struct RevisedOption {
    pub id: Option<i32>,
    pub option: String,
}

#[derive(Clone, Debug)]
pub struct NewVote {
    pub id_poll: i32,
    pub id_user: String,
    pub choices: Vec<VoteChoice>,
}
