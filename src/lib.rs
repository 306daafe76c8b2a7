//! Poll and vote engine: owners create polls with a selection policy, each user casts at
//! most one ballot per poll, and tallies are derived from the recorded ballots on every read.

pub mod commands;
pub mod config;
pub mod db;
pub mod error;
pub mod handler;
pub mod helpers;
pub mod polls;
pub mod runtime;
