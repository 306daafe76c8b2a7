use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::db::model;
use crate::db::schema::{NewPoll, NewVote, Poll, Vote};
use crate::db::store::{PollEdit, PollGuard, PollQuery, PollStore};
use crate::error::PollResult;

pub struct DBClient {
    conn: PgPool,
}

impl DBClient {
    pub async fn new(db_url: &str, max_connections: u32) -> anyhow::Result<Self> {
        let conn = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(db_url)
            .await?;

        model::ensure_schema(&conn).await?;

        Ok(Self {
            conn,
        })
    }

    pub fn conn(&self) -> &PgPool {
        &self.conn
    }
}

#[async_trait]
impl PollStore for DBClient {
    async fn insert_poll(&self, poll: NewPoll) -> PollResult<Poll> {
        model::add_poll(self.conn(), &poll).await
    }

    async fn find_poll(&self, id_poll: i32) -> PollResult<Option<Poll>> {
        model::get_poll(self.conn(), id_poll).await
    }

    async fn update_poll(&self, id_poll: i32, edit: PollEdit<'_>) -> PollResult<Poll> {
        model::update_poll(self.conn(), id_poll, edit).await
    }

    async fn delete_poll(&self, id_poll: i32, guard: PollGuard<'_>) -> PollResult<()> {
        model::delete_poll(self.conn(), id_poll, guard).await
    }

    async fn list_polls(&self, query: &PollQuery) -> PollResult<Vec<Poll>> {
        model::list_polls(self.conn(), query).await
    }

    async fn insert_vote(&self, vote: NewVote) -> PollResult<Vote> {
        model::add_ballot(self.conn(), &vote).await
    }

    async fn has_voted(&self, id_poll: i32, id_user: &str) -> PollResult<bool> {
        model::has_ballot(self.conn(), id_poll, id_user).await
    }

    async fn list_votes(&self, id_poll: i32) -> PollResult<Vec<Vote>> {
        model::get_ballots(self.conn(), id_poll).await
    }

    async fn display_name(&self, id_user: &str) -> PollResult<Option<String>> {
        model::get_display_name(self.conn(), id_user).await
    }
}
