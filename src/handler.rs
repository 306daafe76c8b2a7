use std::sync::Arc;

use evlog::meta;
use serde::Deserialize;
use serde_json::Value;

use crate::commands;
use crate::error::PollError;
use crate::helpers::command_def::Interaction;
use crate::helpers::command_resp::Envelope;
use crate::polls::PollService;
use crate::runtime::get_logger;

#[derive(Deserialize)]
pub struct Request {
    pub command: String,
    #[serde(default)]
    pub caller: Option<String>,
    #[serde(default)]
    pub args: Value,
}

/// Routes requests to command handlers and turns every outcome into an [`Envelope`].
/// Nothing a handler returns escapes as a fault.
#[derive(Clone)]
pub struct PollHandler {
    service: Arc<PollService>,
}

impl PollHandler {
    pub fn new(service: Arc<PollService>) -> Self {
        Self {
            service,
        }
    }

    pub async fn handle_line(&self, line: &str) -> Envelope {
        match serde_json::from_str::<Request>(line) {
            Ok(request) => self.interaction_create(request).await,
            Err(e) => {
                get_logger().info("Malformed request.", meta! {
                    "Error" => e,
                });
                Envelope::from(&PollError::validation("Malformed request"))
            }
        }
    }

    pub async fn interaction_create(&self, request: Request) -> Envelope {
        let cmd = match commands::get_command(&request.command) {
            None => {
                get_logger().info("Unknown command.", meta! {
                    "Command" => request.command,
                });
                return Envelope::from(&PollError::validation(format!("Unknown command '{}'", request.command)));
            }
            Some(v) => v,
        };

        let interaction = Interaction {
            caller: request.caller,
            args: request.args,
        };

        if cmd.authenticated {
            if let Err(e) = interaction.caller() {
                return Envelope::from(&e);
            }
        }

        get_logger().debug("Dispatching command.", meta! {
            "Command" => cmd.name,
            "CallerID" => interaction.caller.as_deref().unwrap_or("-"),
        });

        match (cmd.handler)(self.service.clone(), interaction).await {
            Ok(reply) => reply.into(),
            Err(e) => {
                match &e {
                    PollError::Storage(_) => {
                        get_logger().error("Error occurred in command processor.", meta! {
                            "Command" => cmd.name,
                            "Error" => e,
                        });
                    }
                    _ => {
                        get_logger().debug("Command rejected.", meta! {
                            "Command" => cmd.name,
                            "Kind" => e.kind(),
                            "Reason" => e,
                        });
                    }
                }
                Envelope::from(&e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use serde_json::{json, to_value};

    use super::*;
    use crate::db::memory::MemoryStore;

    fn handler() -> (PollHandler, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let service = Arc::new(PollService::new(store.clone()));

        (PollHandler::new(service), store)
    }

    async fn send(handler: &PollHandler, request: Value) -> Value {
        to_value(handler.handle_line(&request.to_string()).await).unwrap()
    }

    #[tokio::test]
    async fn create_vote_and_read_back() {
        let (handler, store) = handler();
        store.register_user("u-1", "Ada");
        let end = (Utc::now() + Duration::hours(1)).to_rfc3339();

        let created = send(&handler, json!({
            "command": "poll.create",
            "caller": "u-1",
            "args": {
                "question": "Lunch?",
                "options": ["Pizza", "Sushi", "Tacos"],
                "allowedSelections": 1,
                "selectionType": "strict",
                "endTime": end,
            }
        })).await;
        assert_eq!(created["success"], true);
        assert_eq!(created["data"]["creatorDisplayName"], "Ada");
        let id = created["data"]["id"].clone();

        let cast = send(&handler, json!({
            "command": "vote.cast",
            "caller": "u-2",
            "args": {"pollId": id, "optionsSelected": ["Sushi"]}
        })).await;
        assert_eq!(cast["success"], true);
        assert_eq!(cast["data"]["selectedOptions"], json!(["Sushi"]));

        let again = send(&handler, json!({
            "command": "vote.cast",
            "caller": "u-2",
            "args": {"pollId": id, "optionsSelected": ["Pizza"]}
        })).await;
        assert_eq!(again["success"], false);
        assert_eq!(again["error"]["kind"], "duplicate_vote");

        let detail = send(&handler, json!({"command": "poll.get", "args": {"pollId": id}})).await;
        assert_eq!(detail["data"]["options"][1]["voteCount"], 1);

        let voted = send(&handler, json!({"command": "poll.mine", "caller": "u-2", "args": {"type": "voted"}})).await;
        assert_eq!(voted["data"].as_array().unwrap().len(), 1);

        let listed = send(&handler, json!({"command": "vote.list", "args": {"pollId": id}})).await;
        assert_eq!(listed["data"][0]["userId"], "u-2");
    }

    #[tokio::test]
    async fn failures_carry_a_kind() {
        let (handler, _) = handler();

        let anon = send(&handler, json!({"command": "vote.cast", "args": {"pollId": 1, "optionsSelected": ["a"]}})).await;
        assert_eq!(anon["error"]["kind"], "authorization_error");

        let missing = send(&handler, json!({"command": "poll.get", "args": {"pollId": 77}})).await;
        assert_eq!(missing["error"]["kind"], "not_found");

        let unknown = send(&handler, json!({"command": "poll.explode"})).await;
        assert_eq!(unknown["error"]["kind"], "validation_error");

        let bad_page = send(&handler, json!({"command": "poll.list", "args": {"page": 0}})).await;
        assert_eq!(bad_page["error"]["kind"], "validation_error");

        let bad_type = send(&handler, json!({"command": "poll.mine", "caller": "u", "args": {"type": "liked"}})).await;
        assert_eq!(bad_type["error"]["kind"], "validation_error");

        let garbage = to_value(handler.handle_line("{not json").await).unwrap();
        assert_eq!(garbage["success"], false);
        assert!(garbage.get("data").is_none());
    }

    #[tokio::test]
    async fn votes_of_unknown_poll_are_an_empty_list() {
        let (handler, _) = handler();

        let listed = send(&handler, json!({"command": "vote.list", "args": {"pollId": 5}})).await;

        assert_eq!(listed["success"], true);
        assert_eq!(listed["data"], json!([]));
    }
}
