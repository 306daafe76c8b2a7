use std::sync::atomic::{AtomicI32, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use itertools::Itertools;

use crate::db::schema::{NewPoll, NewVote, Poll, PollOption, PollRevision, Vote};
use crate::db::store::{ListScope, PollEdit, PollGuard, PollQuery, PollStore};
use crate::error::{PollError, PollResult};

struct PollRecord {
    poll: Poll,
    ballots: Vec<Vote>,
}

/// In-process store. A poll and its ballots live in one map entry, so the entry's shard lock
/// makes guarded inserts, locked updates and cascading deletes atomic.
pub struct MemoryStore {
    polls: DashMap<i32, PollRecord>,
    users: DashMap<String, String>,
    next_poll: AtomicI32,
    next_option: AtomicI32,
    next_vote: AtomicI32,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            polls: DashMap::new(),
            users: DashMap::new(),
            next_poll: AtomicI32::new(1),
            next_option: AtomicI32::new(1),
            next_vote: AtomicI32::new(1),
        }
    }

    pub fn register_user(&self, id_user: &str, display_name: &str) {
        self.users.insert(id_user.to_owned(), display_name.to_owned());
    }

    /// Stores a poll as-is, bypassing validation. Used to seed fixtures such as already
    /// closed polls.
    pub fn seed_poll(&self, poll: NewPoll) -> Poll {
        let id = self.next_poll.fetch_add(1, Ordering::SeqCst);
        let now = Utc::now();

        let options = poll.options.iter()
            .map(|text| PollOption {
                id_poll: id,
                id: self.next_option.fetch_add(1, Ordering::SeqCst),
                option: text.clone(),
            })
            .collect();

        let created = Poll {
            id,
            time_created: now,
            time_updated: now,
            id_created_by: poll.id_created_by,
            question: poll.question,
            allowed_selections: poll.allowed_selections,
            selection_type: poll.selection_type,
            time_end: poll.time_end,
            options,
        };

        self.polls.insert(id, PollRecord {
            poll: created.clone(),
            ballots: Vec::new(),
        });

        created
    }

    fn apply(&self, poll: &mut Poll, revision: PollRevision) {
        let id_poll = poll.id;

        poll.question = revision.question;
        poll.allowed_selections = revision.allowed_selections;
        poll.selection_type = revision.selection_type;
        poll.time_end = revision.time_end;
        poll.options = revision.options.into_iter()
            .map(|o| PollOption {
                id_poll,
                id: o.id.unwrap_or_else(|| self.next_option.fetch_add(1, Ordering::SeqCst)),
                option: o.option,
            })
            .collect();
        poll.time_updated = Utc::now();
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PollStore for MemoryStore {
    async fn insert_poll(&self, poll: NewPoll) -> PollResult<Poll> {
        Ok(self.seed_poll(poll))
    }

    async fn find_poll(&self, id_poll: i32) -> PollResult<Option<Poll>> {
        Ok(self.polls.get(&id_poll).map(|r| r.poll.clone()))
    }

    async fn update_poll(&self, id_poll: i32, edit: PollEdit<'_>) -> PollResult<Poll> {
        let mut record = self.polls.get_mut(&id_poll)
            .ok_or_else(|| PollError::poll_not_found(id_poll))?;

        let revision = edit(&record.poll)?;
        self.apply(&mut record.poll, revision);

        Ok(record.poll.clone())
    }

    async fn delete_poll(&self, id_poll: i32, guard: PollGuard<'_>) -> PollResult<()> {
        let mut verdict = Ok(());

        let removed = self.polls.remove_if(&id_poll, |_, record| match guard(&record.poll) {
            Ok(()) => true,
            Err(e) => {
                verdict = Err(e);
                false
            }
        });

        match removed {
            Some(_) => Ok(()),
            None => verdict.and(Err(PollError::poll_not_found(id_poll))),
        }
    }

    async fn list_polls(&self, query: &PollQuery) -> PollResult<Vec<Poll>> {
        let matcher = query.matcher()?;

        let polls = self.polls.iter()
            .filter(|r| match &query.scope {
                ListScope::All => true,
                ListScope::CreatedBy(user) => &r.poll.id_created_by == user,
                ListScope::VotedBy(user) => r.ballots.iter().any(|b| &b.id_user == user),
            })
            .filter(|r| match &matcher {
                None => true,
                Some(re) => re.is_match(&r.poll.question)
                    || r.poll.options.iter().any(|o| re.is_match(&o.option)),
            })
            .map(|r| r.poll.clone())
            .sorted_by(|a, b| b.time_created.cmp(&a.time_created).then(b.id.cmp(&a.id)))
            .skip(query.page.offset() as usize)
            .take(query.page.size() as usize)
            .collect();

        Ok(polls)
    }

    async fn insert_vote(&self, vote: NewVote) -> PollResult<Vote> {
        let mut record = self.polls.get_mut(&vote.id_poll)
            .ok_or_else(|| PollError::poll_not_found(vote.id_poll))?;

        if record.ballots.iter().any(|b| b.id_user == vote.id_user) {
            return Err(PollError::DuplicateVote(vote.id_poll));
        }

        let ballot = Vote {
            id: self.next_vote.fetch_add(1, Ordering::SeqCst),
            id_poll: vote.id_poll,
            id_user: vote.id_user,
            time_created: Utc::now(),
            choices: vote.choices,
        };
        record.ballots.push(ballot.clone());

        Ok(ballot)
    }

    async fn has_voted(&self, id_poll: i32, id_user: &str) -> PollResult<bool> {
        Ok(self.polls.get(&id_poll)
            .map(|r| r.ballots.iter().any(|b| b.id_user == id_user))
            .unwrap_or(false))
    }

    async fn list_votes(&self, id_poll: i32) -> PollResult<Vec<Vote>> {
        Ok(self.polls.get(&id_poll)
            .map(|r| r.ballots.clone())
            .unwrap_or_default())
    }

    async fn display_name(&self, id_user: &str) -> PollResult<Option<String>> {
        Ok(self.users.get(id_user).map(|n| n.value().clone()))
    }
}
