mod poll;
mod vote;

use dashmap::DashMap;
use once_cell::sync::Lazy;

use crate::helpers::command_def::CommandDef;

pub const COMMANDS: &[CommandDef] = &[
    CommandDef {
        name: poll::POLL_CREATE,
        handler: |s, i| Box::pin(async move { poll::poll_create(s, i).await }),
        authenticated: true,
    },
    CommandDef {
        name: poll::POLL_UPDATE,
        handler: |s, i| Box::pin(async move { poll::poll_update(s, i).await }),
        authenticated: true,
    },
    CommandDef {
        name: poll::POLL_DELETE,
        handler: |s, i| Box::pin(async move { poll::poll_delete(s, i).await }),
        authenticated: true,
    },
    CommandDef {
        name: poll::POLL_GET,
        handler: |s, i| Box::pin(async move { poll::poll_get(s, i).await }),
        authenticated: false,
    },
    CommandDef {
        name: poll::POLL_LIST,
        handler: |s, i| Box::pin(async move { poll::poll_list(s, i).await }),
        authenticated: false,
    },
    CommandDef {
        name: poll::POLL_MINE,
        handler: |s, i| Box::pin(async move { poll::poll_mine(s, i).await }),
        authenticated: true,
    },
    CommandDef {
        name: vote::VOTE_CAST,
        handler: |s, i| Box::pin(async move { vote::vote_cast(s, i).await }),
        authenticated: true,
    },
    CommandDef {
        name: vote::VOTE_LIST,
        handler: |s, i| Box::pin(async move { vote::vote_list(s, i).await }),
        authenticated: false,
    },
];

static COMMAND_MAP: Lazy<DashMap<String, &'static CommandDef>> = Lazy::new(|| {
    let map = DashMap::new();

    for cmd in COMMANDS {
        map.insert(cmd.name.to_string(), cmd);
    }

    map
});

pub fn get_command(command_name: &str) -> Option<&'static CommandDef> {
    COMMAND_MAP
        .get(command_name)
        .map(|entry| *entry.value())
}
