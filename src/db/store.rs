use async_trait::async_trait;
use regex::{Regex, RegexBuilder};

use crate::db::schema::{NewPoll, NewVote, Poll, PollRevision, Vote};
use crate::error::{PollError, PollResult};

/// Applied to the current poll while the store holds it locked; returns the state to write.
pub type PollEdit<'a> = &'a (dyn Fn(&Poll) -> PollResult<PollRevision> + Send + Sync);

/// Checked against the current poll while the store holds it locked, before removal.
pub type PollGuard<'a> = &'a (dyn Fn(&Poll) -> PollResult<()> + Send + Sync);

/// Persistence collaborator for polls, ballots and owner names.
///
/// Implementations own atomicity: `update_poll` and `delete_poll` run their callback and
/// the write as one unit, `delete_poll` removes the poll's ballots with it, and
/// `insert_vote` enforces one ballot per `(poll, user)` at write time.
#[async_trait]
pub trait PollStore: Send + Sync {
    async fn insert_poll(&self, poll: NewPoll) -> PollResult<Poll>;

    async fn find_poll(&self, id_poll: i32) -> PollResult<Option<Poll>>;

    async fn update_poll(&self, id_poll: i32, edit: PollEdit<'_>) -> PollResult<Poll>;

    async fn delete_poll(&self, id_poll: i32, guard: PollGuard<'_>) -> PollResult<()>;

    async fn list_polls(&self, query: &PollQuery) -> PollResult<Vec<Poll>>;

    /// Fails with `DuplicateVote` if the user already has a ballot for the poll and with
    /// `NotFound` if the poll no longer exists.
    async fn insert_vote(&self, vote: NewVote) -> PollResult<Vote>;

    async fn has_voted(&self, id_poll: i32, id_user: &str) -> PollResult<bool>;

    /// Ballots for a poll, oldest first. Empty for unknown polls.
    async fn list_votes(&self, id_poll: i32) -> PollResult<Vec<Vote>>;

    async fn display_name(&self, id_user: &str) -> PollResult<Option<String>>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Page {
    number: u32,
    size: u32,
}

impl Page {
    pub const DEFAULT_SIZE: i64 = 10;

    pub fn new(number: i64, size: i64) -> PollResult<Self> {
        if number < 1 || number > u32::MAX as i64 {
            return Err(PollError::validation("Invalid page parameter"));
        }
        if size < 1 || size > u32::MAX as i64 {
            return Err(PollError::validation("Invalid limit parameter"));
        }

        Ok(Self {
            number: number as u32,
            size: size as u32,
        })
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn offset(&self) -> u64 {
        (self.number as u64 - 1) * self.size as u64
    }
}

impl Default for Page {
    fn default() -> Self {
        Self {
            number: 1,
            size: Self::DEFAULT_SIZE as u32,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ListScope {
    All,
    CreatedBy(String),
    VotedBy(String),
}

/// Listing request; results are ordered newest first.
#[derive(Clone, Debug)]
pub struct PollQuery {
    pub scope: ListScope,
    pub filter: Option<String>,
    pub page: Page,
}

impl PollQuery {
    /// The filter as a literal pattern usable both by `regex` and by Postgres `~*`.
    pub fn pattern(&self) -> Option<String> {
        self.filter
            .as_deref()
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .map(regex::escape)
    }

    pub fn matcher(&self) -> PollResult<Option<Regex>> {
        match self.pattern() {
            None => Ok(None),
            Some(p) => RegexBuilder::new(&p)
                .case_insensitive(true)
                .build()
                .map(Some)
                .map_err(|e| PollError::validation(format!("Invalid filter: {}", e))),
        }
    }
}
