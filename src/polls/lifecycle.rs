use chrono::{DateTime, Utc};
use evlog::meta;

use crate::db::schema::{NewPoll, Poll, PollRevision, RevisedOption, SelectionType};
use crate::db::store::{ListScope, Page, PollQuery};
use crate::error::{PollError, PollResult};
use crate::polls::{validate, PollService};
use crate::runtime::get_logger;

#[derive(Clone, Debug)]
pub struct CreatePoll {
    pub question: String,
    pub options: Vec<String>,
    pub allowed_selections: i64,
    pub selection_type: SelectionType,
    pub time_end: DateTime<Utc>,
}

/// Fields left as `None` keep their current value.
#[derive(Clone, Debug, Default)]
pub struct PollPatch {
    pub question: Option<String>,
    pub options: Option<Vec<String>>,
    pub allowed_selections: Option<i64>,
    pub selection_type: Option<SelectionType>,
    pub time_end: Option<DateTime<Utc>>,
}

fn ensure_owner(poll: &Poll, id_caller: &str, action: &str) -> PollResult<()> {
    if poll.id_created_by != id_caller {
        return Err(PollError::Authorization(format!("You are not authorized to {} this poll", action)));
    }

    Ok(())
}

/// Builds the state `poll` will have after `patch`, checked as a whole.
fn revise(poll: &Poll, id_caller: &str, patch: &PollPatch, now: DateTime<Utc>) -> PollResult<PollRevision> {
    ensure_owner(poll, id_caller, "update")?;

    let question = match &patch.question {
        Some(q) => validate::question(q)?,
        None => poll.question.clone(),
    };

    let options = match &patch.options {
        Some(texts) => validate::options(texts)?
            .into_iter()
            .map(|text| RevisedOption {
                id: poll.option_by_text(&text).map(|o| o.id),
                option: text,
            })
            .collect::<Vec<_>>(),
        None => poll.options.iter()
            .map(|o| RevisedOption {
                id: Some(o.id),
                option: o.option.clone(),
            })
            .collect(),
    };

    let allowed_selections = validate::allowed_selections(
        patch.allowed_selections.unwrap_or(poll.allowed_selections as i64),
        options.len(),
    )?;

    let time_end = match patch.time_end {
        Some(end) => validate::end_time(end, now)?,
        None => poll.time_end,
    };

    Ok(PollRevision {
        question,
        options,
        allowed_selections,
        selection_type: patch.selection_type.unwrap_or(poll.selection_type),
        time_end,
    })
}

impl PollService {
    pub async fn create(&self, id_caller: &str, req: CreatePoll) -> PollResult<Poll> {
        let question = validate::question(&req.question)?;
        let options = validate::options(&req.options)?;
        let allowed_selections = validate::allowed_selections(req.allowed_selections, options.len())?;
        let time_end = validate::end_time(req.time_end, self.now())?;

        let poll = self.store.insert_poll(NewPoll {
            id_created_by: id_caller.to_owned(),
            question,
            options,
            allowed_selections,
            selection_type: req.selection_type,
            time_end,
        }).await?;

        get_logger().info("Poll created.", meta! {
            "PollID" => poll.id,
            "CreatorID" => poll.id_created_by,
            "Options" => poll.options.len(),
        });

        Ok(poll)
    }

    /// Applies `patch` against the poll as the store holds it at write time, so the result is
    /// validated against current state rather than an earlier read.
    pub async fn update(&self, id_poll: i32, id_caller: &str, patch: PollPatch) -> PollResult<Poll> {
        let now = self.now();

        let poll = self.store
            .update_poll(id_poll, &|current: &Poll| revise(current, id_caller, &patch, now))
            .await?;

        get_logger().info("Poll updated.", meta! {
            "PollID" => poll.id,
            "CallerID" => id_caller,
        });

        Ok(poll)
    }

    pub async fn delete(&self, id_poll: i32, id_caller: &str) -> PollResult<()> {
        self.store
            .delete_poll(id_poll, &|current: &Poll| ensure_owner(current, id_caller, "delete"))
            .await?;

        get_logger().info("Poll deleted.", meta! {
            "PollID" => id_poll,
            "CallerID" => id_caller,
        });

        Ok(())
    }

    pub async fn get(&self, id_poll: i32) -> PollResult<Poll> {
        self.store.find_poll(id_poll).await?
            .ok_or_else(|| PollError::poll_not_found(id_poll))
    }

    pub async fn list(&self, filter: Option<String>, page: Page) -> PollResult<Vec<Poll>> {
        self.list_scoped(ListScope::All, filter, page).await
    }

    pub async fn list_by_creator(&self, id_user: &str, page: Page) -> PollResult<Vec<Poll>> {
        self.list_scoped(ListScope::CreatedBy(id_user.to_owned()), None, page).await
    }

    pub async fn list_by_voter(&self, id_user: &str, page: Page) -> PollResult<Vec<Poll>> {
        self.list_scoped(ListScope::VotedBy(id_user.to_owned()), None, page).await
    }

    async fn list_scoped(&self, scope: ListScope, filter: Option<String>, page: Page) -> PollResult<Vec<Poll>> {
        self.store.list_polls(&PollQuery {
            scope,
            filter,
            page,
        }).await
    }
}
