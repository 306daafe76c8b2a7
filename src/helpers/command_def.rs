use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::Value;

use crate::error::{PollError, PollResult};
use crate::helpers::command_resp::Reply;
use crate::polls::PollService;

/// One decoded request line. `caller` is the identity vouched for by the front end.
pub struct Interaction {
    pub caller: Option<String>,
    pub args: Value,
}

impl Interaction {
    pub fn caller(&self) -> PollResult<&str> {
        self.caller.as_deref()
            .filter(|c| !c.is_empty())
            .ok_or_else(|| PollError::Authorization("Authentication required".to_owned()))
    }
}

pub type InteractionHandler = fn(Arc<PollService>, Interaction) -> BoxFuture<'static, PollResult<Reply>>;

pub struct CommandDef {
    pub name: &'static str,
    pub handler: InteractionHandler,
    pub authenticated: bool,
}
