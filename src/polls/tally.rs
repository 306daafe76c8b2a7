use std::collections::HashMap;

use crate::db::schema::{Poll, Vote};
use crate::error::PollResult;
use crate::polls::PollService;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OptionCount {
    pub id_option: i32,
    pub option: String,
    pub votes: u64,
}

/// Vote counts for a poll's current options, in option order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tally {
    pub id_poll: i32,
    pub counts: Vec<OptionCount>,
}

impl Tally {
    pub fn count(&self, option: &str) -> Option<u64> {
        self.counts.iter().find(|c| c.option == option).map(|c| c.votes)
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().map(|c| c.votes).sum()
    }
}

/// Counts every selection that still refers to one of the poll's options. Selections of
/// options removed since the ballot was cast are ignored.
pub fn tally(poll: &Poll, votes: &[Vote]) -> Tally {
    let mut by_option = poll.options.iter()
        .map(|o| (o.id, 0u64))
        .collect::<HashMap<_, _>>();

    for vote in votes.iter().filter(|v| v.id_poll == poll.id) {
        for choice in &vote.choices {
            if let Some(n) = by_option.get_mut(&choice.id_option) {
                *n += 1;
            }
        }
    }

    Tally {
        id_poll: poll.id,
        counts: poll.options.iter()
            .map(|o| OptionCount {
                id_option: o.id,
                option: o.option.clone(),
                votes: by_option.get(&o.id).copied().unwrap_or(0),
            })
            .collect(),
    }
}

impl PollService {
    pub async fn tally(&self, id_poll: i32) -> PollResult<Tally> {
        let poll = self.get(id_poll).await?;
        self.tally_of(&poll).await
    }

    /// Re-reads the ledger on every call; nothing is cached.
    pub(crate) async fn tally_of(&self, poll: &Poll) -> PollResult<Tally> {
        let votes = self.store.list_votes(poll.id).await?;

        Ok(tally(poll, &votes))
    }
}
