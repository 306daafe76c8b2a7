use chrono::{DateTime, Utc};
use evlog::meta;
use serde::Serialize;

use crate::db::schema::{Poll, SelectionType, Vote};
use crate::error::PollResult;
use crate::polls::tally::Tally;
use crate::polls::PollService;
use crate::runtime::get_logger;

pub const UNKNOWN_CREATOR: &str = "Unknown";

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionView {
    pub text: String,
    pub vote_count: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollView {
    pub id: i32,
    pub question: String,
    pub options: Vec<OptionView>,
    pub allowed_selections: i32,
    pub selection_type: SelectionType,
    pub creator_id: String,
    pub creator_display_name: String,
    pub end_time: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteView {
    pub id: i32,
    pub poll_id: i32,
    pub user_id: String,
    pub selected_options: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&Vote> for VoteView {
    fn from(vote: &Vote) -> Self {
        Self {
            id: vote.id,
            poll_id: vote.id_poll,
            user_id: vote.id_user.clone(),
            selected_options: vote.choices.iter().map(|c| c.option.clone()).collect(),
            created_at: vote.time_created,
        }
    }
}

/// Joins a poll with its tally and its owner's name.
pub fn compose(poll: &Poll, tally: &Tally, creator_display_name: Option<String>) -> PollView {
    PollView {
        id: poll.id,
        question: poll.question.clone(),
        options: poll.options.iter()
            .map(|o| OptionView {
                text: o.option.clone(),
                vote_count: tally.counts.iter()
                    .find(|c| c.id_option == o.id)
                    .map(|c| c.votes)
                    .unwrap_or(0),
            })
            .collect(),
        allowed_selections: poll.allowed_selections,
        selection_type: poll.selection_type,
        creator_id: poll.id_created_by.clone(),
        creator_display_name: creator_display_name.unwrap_or_else(|| UNKNOWN_CREATOR.to_owned()),
        end_time: poll.time_end,
        created_at: poll.time_created,
    }
}

impl PollService {
    /// The shape every read path returns.
    pub async fn render(&self, poll: &Poll) -> PollResult<PollView> {
        let tally = self.tally_of(poll).await?;
        let creator = self.creator_name(&poll.id_created_by).await;

        Ok(compose(poll, &tally, creator))
    }

    pub async fn render_all(&self, polls: &[Poll]) -> PollResult<Vec<PollView>> {
        let mut result = Vec::with_capacity(polls.len());
        for poll in polls {
            result.push(self.render(poll).await?);
        }

        Ok(result)
    }

    /// A failed lookup degrades to the placeholder name instead of failing the read.
    async fn creator_name(&self, id_user: &str) -> Option<String> {
        match self.store.display_name(id_user).await {
            Ok(v) => v,
            Err(e) => {
                get_logger().error("Failed to look up poll creator.", meta! {
                    "UserID" => id_user,
                    "Error" => e,
                });
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;

    use super::*;
    use crate::db::memory::MemoryStore;
    use crate::db::schema::{NewPoll, NewVote};
    use crate::db::store::{PollEdit, PollGuard, PollQuery, PollStore};
    use crate::error::PollError;
    use crate::polls::fixtures::{lunch, service, texts};
    use crate::polls::lifecycle::CreatePoll;

    #[tokio::test]
    async fn renders_counts_and_owner_name() {
        let (service, store, clock) = service();
        store.register_user("owner", "Olive");
        let poll = service.create("owner", lunch(&clock, 1, SelectionType::Soft)).await.unwrap();
        service.cast(poll.id, "a", &texts(&["Sushi"])).await.unwrap();

        let view = service.render(&poll).await.unwrap();

        assert_eq!(view.creator_display_name, "Olive");
        assert_eq!(view.options[1], OptionView { text: "Sushi".to_owned(), vote_count: 1 });
        assert_eq!(view.options[0].vote_count, 0);

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["selectionType"], "soft");
        assert_eq!(json["options"][1]["voteCount"], 1);
        assert_eq!(json["creatorId"], "owner");
    }

    #[tokio::test]
    async fn missing_owner_renders_placeholder() {
        let (service, _, clock) = service();
        let poll = service.create("ghost", lunch(&clock, 1, SelectionType::Soft)).await.unwrap();

        let view = service.render(&poll).await.unwrap();

        assert_eq!(view.creator_display_name, UNKNOWN_CREATOR);
    }

    /// Delegates to a memory store but cannot resolve user names.
    struct BrokenDirectory(MemoryStore);

    #[async_trait]
    impl PollStore for BrokenDirectory {
        async fn insert_poll(&self, poll: NewPoll) -> PollResult<Poll> {
            self.0.insert_poll(poll).await
        }

        async fn find_poll(&self, id_poll: i32) -> PollResult<Option<Poll>> {
            self.0.find_poll(id_poll).await
        }

        async fn update_poll(&self, id_poll: i32, edit: PollEdit<'_>) -> PollResult<Poll> {
            self.0.update_poll(id_poll, edit).await
        }

        async fn delete_poll(&self, id_poll: i32, guard: PollGuard<'_>) -> PollResult<()> {
            self.0.delete_poll(id_poll, guard).await
        }

        async fn list_polls(&self, query: &PollQuery) -> PollResult<Vec<Poll>> {
            self.0.list_polls(query).await
        }

        async fn insert_vote(&self, vote: NewVote) -> PollResult<Vote> {
            self.0.insert_vote(vote).await
        }

        async fn has_voted(&self, id_poll: i32, id_user: &str) -> PollResult<bool> {
            self.0.has_voted(id_poll, id_user).await
        }

        async fn list_votes(&self, id_poll: i32) -> PollResult<Vec<Vote>> {
            self.0.list_votes(id_poll).await
        }

        async fn display_name(&self, _id_user: &str) -> PollResult<Option<String>> {
            Err(PollError::Storage(anyhow::anyhow!("directory offline")))
        }
    }

    #[tokio::test]
    async fn failing_owner_lookup_does_not_fail_the_read() {
        let service = PollService::new(Arc::new(BrokenDirectory(MemoryStore::new())));
        let poll = service.create("owner", CreatePoll {
            question: "Standup time?".to_owned(),
            options: texts(&["9:00", "9:30"]),
            allowed_selections: 1,
            selection_type: SelectionType::Strict,
            time_end: Utc::now() + chrono::Duration::days(1),
        }).await.unwrap();

        let view = service.render(&poll).await.unwrap();

        assert_eq!(view.creator_display_name, UNKNOWN_CREATOR);
    }
}
