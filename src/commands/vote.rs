use std::sync::Arc;

use crate::error::PollResult;
use crate::helpers::command_def::Interaction;
use crate::helpers::command_opt::{find_required, find_string_list_opt};
use crate::helpers::command_resp::{self, Reply};
use crate::polls::view::VoteView;
use crate::polls::PollService;

use super::poll::find_poll_id;

pub const VOTE_CAST: &str = "vote.cast";
pub const VOTE_LIST: &str = "vote.list";

pub async fn vote_cast(service: Arc<PollService>, interaction: Interaction) -> PollResult<Reply> {
    let caller = interaction.caller()?;
    let args = &interaction.args;
    let id_poll = find_poll_id(args, "pollId")?;
    let selected = find_required(args, find_string_list_opt, "optionsSelected")?;

    let vote = service.cast(id_poll, caller, &selected).await?;

    command_resp::reply_data("Vote recorded successfully", &VoteView::from(&vote))
}

pub async fn vote_list(service: Arc<PollService>, interaction: Interaction) -> PollResult<Reply> {
    let id_poll = find_poll_id(&interaction.args, "pollId")?;

    let votes = service.votes(id_poll).await?;
    let views = votes.iter().map(VoteView::from).collect::<Vec<_>>();

    command_resp::reply_data("Votes fetched successfully", &views)
}
