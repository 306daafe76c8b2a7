use std::convert::TryFrom;
use std::sync::Arc;

use serde_json::Value;

use crate::db::schema::SelectionType;
use crate::db::store::Page;
use crate::error::{PollError, PollResult};
use crate::helpers::command_def::Interaction;
use crate::helpers::command_opt::{find_integer_opt, find_required, find_string_list_opt, find_string_opt, find_time_opt};
use crate::helpers::command_resp::{self, Reply};
use crate::polls::lifecycle::{CreatePoll, PollPatch};
use crate::polls::PollService;

pub const POLL_CREATE: &str = "poll.create";
pub const POLL_UPDATE: &str = "poll.update";
pub const POLL_DELETE: &str = "poll.delete";
pub const POLL_GET: &str = "poll.get";
pub const POLL_LIST: &str = "poll.list";
pub const POLL_MINE: &str = "poll.mine";

fn find_selection_type_opt(args: &Value, name: &str) -> PollResult<Option<SelectionType>> {
    find_string_opt(args, name)?
        .map(|s| s.parse::<SelectionType>())
        .transpose()
}

pub(crate) fn find_poll_id(args: &Value, name: &str) -> PollResult<i32> {
    let id = find_required(args, find_integer_opt, name)?;

    i32::try_from(id).map_err(|_| PollError::NotFound(format!("Poll {}", id)))
}

fn find_page(args: &Value) -> PollResult<Page> {
    let page = find_integer_opt(args, "page")?.unwrap_or(1);
    let limit = find_integer_opt(args, "limit")?.unwrap_or(Page::DEFAULT_SIZE);

    Page::new(page, limit)
}

pub async fn poll_create(service: Arc<PollService>, interaction: Interaction) -> PollResult<Reply> {
    let caller = interaction.caller()?;
    let args = &interaction.args;

    let req = CreatePoll {
        question: find_required(args, find_string_opt, "question")?,
        options: find_required(args, find_string_list_opt, "options")?,
        allowed_selections: find_required(args, find_integer_opt, "allowedSelections")?,
        selection_type: find_required(args, find_selection_type_opt, "selectionType")?,
        time_end: find_required(args, find_time_opt, "endTime")?,
    };

    let poll = service.create(caller, req).await?;
    let view = service.render(&poll).await?;

    command_resp::reply_data("Poll created successfully", &view)
}

pub async fn poll_update(service: Arc<PollService>, interaction: Interaction) -> PollResult<Reply> {
    let caller = interaction.caller()?;
    let args = &interaction.args;
    let id_poll = find_poll_id(args, "id")?;

    let patch = PollPatch {
        question: find_string_opt(args, "question")?,
        options: find_string_list_opt(args, "options")?,
        allowed_selections: find_integer_opt(args, "allowedSelections")?,
        selection_type: find_selection_type_opt(args, "selectionType")?,
        time_end: find_time_opt(args, "endTime")?,
    };

    let poll = service.update(id_poll, caller, patch).await?;
    let view = service.render(&poll).await?;

    command_resp::reply_data("Poll updated successfully", &view)
}

pub async fn poll_delete(service: Arc<PollService>, interaction: Interaction) -> PollResult<Reply> {
    let caller = interaction.caller()?;
    let id_poll = find_poll_id(&interaction.args, "id")?;

    service.delete(id_poll, caller).await?;

    command_resp::reply_message("Poll deleted successfully")
}

pub async fn poll_get(service: Arc<PollService>, interaction: Interaction) -> PollResult<Reply> {
    let id_poll = find_poll_id(&interaction.args, "pollId")?;

    let poll = service.get(id_poll).await?;
    let view = service.render(&poll).await?;

    command_resp::reply_data("Poll details fetched successfully", &view)
}

pub async fn poll_list(service: Arc<PollService>, interaction: Interaction) -> PollResult<Reply> {
    let args = &interaction.args;
    let page = find_page(args)?;
    let filter = find_string_opt(args, "q")?;

    let polls = service.list(filter, page).await?;
    let views = service.render_all(&polls).await?;

    command_resp::reply_data("Polls fetched successfully", &views)
}

/// Polls the caller created or voted on, selected by `type`.
pub async fn poll_mine(service: Arc<PollService>, interaction: Interaction) -> PollResult<Reply> {
    let caller = interaction.caller()?;
    let args = &interaction.args;
    let page = find_page(args)?;
    let kind = find_required(args, find_string_opt, "type")?;

    let (polls, message) = match kind.as_str() {
        "created" => (service.list_by_creator(caller, page).await?, "Polls created by user fetched successfully"),
        "voted" => (service.list_by_voter(caller, page).await?, "Polls voted by user fetched successfully"),
        _ => return Err(PollError::validation(r#"Invalid type parameter. Use "created" or "voted""#)),
    };
    let views = service.render_all(&polls).await?;

    command_resp::reply_data(message, &views)
}
