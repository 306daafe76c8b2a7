use std::collections::HashSet;

use evlog::meta;
use itertools::Itertools;

use crate::db::schema::{NewVote, Poll, SelectionType, Vote, VoteChoice};
use crate::error::{PollError, PollResult};
use crate::polls::PollService;
use crate::runtime::get_logger;

/// Checks a selection against the poll's options and selection policy and resolves each
/// entry to its option id. Matching is exact and case-sensitive.
pub fn check_selection(poll: &Poll, selected: &[String]) -> PollResult<Vec<VoteChoice>> {
    if selected.is_empty() {
        return Err(PollError::validation("You must select at least one option"));
    }

    let allowed = poll.allowed_selections as usize;
    if selected.len() > allowed {
        return Err(PollError::validation(format!("You can only select up to {} options", allowed)));
    }

    let invalid = selected.iter()
        .filter(|s| poll.option_by_text(s).is_none())
        .collect::<Vec<_>>();
    if !invalid.is_empty() {
        return Err(PollError::validation(format!("Invalid options selected: {}", invalid.iter().join(", "))));
    }

    let mut seen = HashSet::new();
    let mut choices = Vec::with_capacity(selected.len());
    for text in selected {
        if !seen.insert(text.as_str()) {
            return Err(PollError::validation(format!("Option '{}' was selected more than once", text)));
        }
        if let Some(option) = poll.option_by_text(text) {
            choices.push(VoteChoice {
                id_option: option.id,
                option: option.option.clone(),
            });
        }
    }

    if poll.selection_type == SelectionType::Strict && choices.len() != allowed {
        return Err(PollError::validation(format!("This poll requires exactly {} selections", allowed)));
    }

    Ok(choices)
}

impl PollService {
    /// Records one ballot for `id_user`.
    ///
    /// The duplicate pre-check only saves a round of validation; the store's insert is what
    /// guarantees a single ballot per user when casts race.
    pub async fn cast(&self, id_poll: i32, id_user: &str, selected: &[String]) -> PollResult<Vote> {
        let poll = self.get(id_poll).await?;

        if !poll.is_open_at(self.now()) {
            get_logger().info("User attempted to vote on closed poll.", meta! {
                "PollID" => poll.id,
                "UserID" => id_user,
            });
            return Err(PollError::PollClosed(poll.id));
        }

        if self.store.has_voted(poll.id, id_user).await? {
            return Err(PollError::DuplicateVote(poll.id));
        }

        let choices = check_selection(&poll, selected).map_err(|e| {
            get_logger().info("Rejected ballot.", meta! {
                "PollID" => poll.id,
                "UserID" => id_user,
                "Reason" => e.to_string(),
            });
            e
        })?;

        let vote = self.store.insert_vote(NewVote {
            id_poll: poll.id,
            id_user: id_user.to_owned(),
            choices,
        }).await?;

        get_logger().info("Ballot cast.", meta! {
            "PollID" => vote.id_poll,
            "BallotID" => vote.id,
            "UserID" => vote.id_user,
        });

        Ok(vote)
    }

    /// Ballots cast on a poll, oldest first. A missing poll has no ballots.
    pub async fn votes(&self, id_poll: i32) -> PollResult<Vec<Vote>> {
        self.store.list_votes(id_poll).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Duration;
    use futures::future::join_all;

    use super::*;
    use crate::polls::fixtures::{lunch, service, texts};

    #[tokio::test]
    async fn lunch_scenario() {
        let (service, _, clock) = service();
        let poll = service.create("owner", lunch(&clock, 1, SelectionType::Strict)).await.unwrap();

        service.cast(poll.id, "userA", &texts(&["Pizza"])).await.unwrap();

        let again = service.cast(poll.id, "userA", &texts(&["Sushi"])).await;
        assert!(matches!(again, Err(PollError::DuplicateVote(_))));

        let too_many = service.cast(poll.id, "userB", &texts(&["Pizza", "Sushi"])).await;
        assert!(matches!(too_many, Err(PollError::Validation(_))));

        let tally = service.tally(poll.id).await.unwrap();
        assert_eq!(tally.count("Pizza"), Some(1));
        assert_eq!(tally.count("Sushi"), Some(0));
        assert_eq!(tally.count("Tacos"), Some(0));
    }

    #[tokio::test]
    async fn validation_follows_the_documented_order() {
        let (service, _, clock) = service();
        let poll = service.create("owner", lunch(&clock, 2, SelectionType::Soft)).await.unwrap();

        assert!(matches!(service.cast(404, "u", &texts(&["Pizza"])).await, Err(PollError::NotFound(_))));
        assert!(matches!(service.cast(poll.id, "u", &[]).await, Err(PollError::Validation(_))));

        match service.cast(poll.id, "u", &texts(&["Pizza", "pizza"])).await {
            Err(PollError::Validation(msg)) => assert!(msg.contains("pizza")),
            other => panic!("expected validation error, got {:?}", other),
        }
        assert!(matches!(service.cast(poll.id, "u", &texts(&["Pizza", "Pizza"])).await, Err(PollError::Validation(_))));

        service.cast(poll.id, "u", &texts(&["Tacos"])).await.unwrap();
        // A duplicate is reported before the malformed selection.
        assert!(matches!(service.cast(poll.id, "u", &[]).await, Err(PollError::DuplicateVote(_))));

        clock.advance(Duration::hours(1));
        assert!(matches!(service.cast(poll.id, "v", &texts(&["Pizza"])).await, Err(PollError::PollClosed(_))));
        assert!(matches!(service.cast(poll.id, "u", &texts(&["Pizza"])).await, Err(PollError::PollClosed(_))));
    }

    #[tokio::test]
    async fn strict_requires_exact_count_soft_allows_fewer() {
        let (service, _, clock) = service();
        let strict = service.create("owner", lunch(&clock, 2, SelectionType::Strict)).await.unwrap();
        let soft = service.create("owner", lunch(&clock, 2, SelectionType::Soft)).await.unwrap();

        assert!(matches!(service.cast(strict.id, "u", &texts(&["Pizza"])).await, Err(PollError::Validation(_))));
        service.cast(strict.id, "u", &texts(&["Pizza", "Tacos"])).await.unwrap();

        service.cast(soft.id, "u", &texts(&["Pizza"])).await.unwrap();

        for poll in [&strict, &soft] {
            let over = service.cast(poll.id, "w", &texts(&["Pizza", "Sushi", "Tacos"])).await;
            assert!(matches!(over, Err(PollError::Validation(_))));
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_casts_admit_exactly_one_ballot() {
        let (service, _, clock) = service();
        let service = Arc::new(service);
        let poll = service.create("owner", lunch(&clock, 1, SelectionType::Soft)).await.unwrap();
        let id_poll = poll.id;

        let attempts = (0..32)
            .map(|i| {
                let service = service.clone();
                let pick = if i % 2 == 0 { "Pizza" } else { "Sushi" };
                tokio::spawn(async move { service.cast(id_poll, "racer", &texts(&[pick])).await })
            })
            .collect::<Vec<_>>();

        let results = join_all(attempts).await
            .into_iter()
            .map(|r| r.unwrap())
            .collect::<Vec<_>>();

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results.iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| matches!(e, PollError::DuplicateVote(_))));
        assert_eq!(service.votes(poll.id).await.unwrap().len(), 1);
        assert_eq!(service.tally(poll.id).await.unwrap().total(), 1);
    }

    #[tokio::test]
    async fn votes_of_a_deleted_poll_are_gone() {
        let (service, _, clock) = service();
        let poll = service.create("owner", lunch(&clock, 1, SelectionType::Soft)).await.unwrap();
        service.cast(poll.id, "a", &texts(&["Pizza"])).await.unwrap();
        service.cast(poll.id, "b", &texts(&["Sushi"])).await.unwrap();

        service.delete(poll.id, "owner").await.unwrap();

        assert!(service.votes(poll.id).await.unwrap().is_empty());
        assert!(matches!(service.cast(poll.id, "c", &texts(&["Pizza"])).await, Err(PollError::NotFound(_))));
    }
}
