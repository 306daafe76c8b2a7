use chrono::{DateTime, Utc};
use itertools::Itertools;
use sqlx::{query, query_as, Executor, FromRow, PgPool, Postgres};
use tokio_stream::StreamExt;

use crate::db::schema::{NewPoll, NewVote, Poll, PollOption, SelectionType, Vote, VoteChoice};
use crate::db::store::{ListScope, PollEdit, PollGuard, PollQuery};
use crate::error::{sqlstate, PollError, PollResult, FOREIGN_KEY_VIOLATION, UNIQUE_VIOLATION};

const SCHEMA: &str = include_str!("schema.sql");

#[derive(FromRow)]
struct PollRow {
    id: i32,
    time_created: DateTime<Utc>,
    time_updated: DateTime<Utc>,
    id_created_by: String,
    question: String,
    allowed_selections: i32,
    selection_type: String,
    time_end: DateTime<Utc>,
}

impl PollRow {
    fn into_poll(self, options: Vec<PollOption>) -> PollResult<Poll> {
        let selection_type = self.selection_type.parse::<SelectionType>().map_err(|_| {
            PollError::Storage(anyhow::anyhow!(
                "poll {} has unknown selection type '{}'", self.id, self.selection_type
            ))
        })?;

        Ok(Poll {
            id: self.id,
            time_created: self.time_created,
            time_updated: self.time_updated,
            id_created_by: self.id_created_by,
            question: self.question,
            allowed_selections: self.allowed_selections,
            selection_type,
            time_end: self.time_end,
            options,
        })
    }
}

#[derive(FromRow)]
struct OptionRow {
    id_poll: i32,
    id: i32,
    option: String,
}

#[derive(FromRow)]
struct BallotRow {
    id: i32,
    id_poll: i32,
    id_user: String,
    time_created: DateTime<Utc>,
    id_option: Option<i32>,
    option: Option<String>,
}

pub async fn ensure_schema(conn: &PgPool) -> anyhow::Result<()> {
    conn.execute(SCHEMA).await?;

    Ok(())
}

async fn get_options<'e, E>(conn: E, id_polls: &[i32]) -> Result<Vec<PollOption>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let mut stream = query_as::<_, OptionRow>(
        "SELECT id_poll, id, option FROM poll_option WHERE id_poll = ANY($1) ORDER BY id_poll, position;")
        .bind(id_polls.to_vec())
        .fetch(conn);

    let mut result = Vec::new();
    while let Some(row) = stream.try_next().await? {
        result.push(PollOption {
            id_poll: row.id_poll,
            id: row.id,
            option: row.option,
        });
    }

    Ok(result)
}

pub async fn get_poll(conn: &PgPool, id_poll: i32) -> PollResult<Option<Poll>> {
    let r = query_as::<_, PollRow>("SELECT * FROM poll WHERE id=$1;")
        .bind(id_poll)
        .fetch_optional(conn)
        .await?;

    let r = match r {
        None => return Ok(None),
        Some(v) => v,
    };

    let options = get_options(conn, &[r.id]).await?;

    Ok(Some(r.into_poll(options)?))
}

pub async fn add_poll(conn: &PgPool, poll: &NewPoll) -> PollResult<Poll> {
    let mut tx = conn.begin().await?;

    let r = query_as::<_, PollRow>(
        "INSERT INTO poll (time_created, time_updated, id_created_by, question, allowed_selections, selection_type, time_end)
         VALUES (NOW(), NOW(), $1, $2, $3, $4, $5)
         RETURNING *;")
        .bind(&poll.id_created_by)
        .bind(&poll.question)
        .bind(poll.allowed_selections)
        .bind(poll.selection_type.as_str())
        .bind(poll.time_end)
        .fetch_one(&mut tx)
        .await?;

    let mut opt_result = Vec::new();

    for (position, option) in poll.options.iter().enumerate() {
        let option_r = query_as::<_, (i32,)>(
            "INSERT INTO poll_option (id_poll, position, option)
             VALUES ($1, $2, $3)
             RETURNING id;")
            .bind(r.id)
            .bind(position as i32)
            .bind(option)
            .fetch_one(&mut tx)
            .await?;

        opt_result.push(PollOption {
            id_poll: r.id,
            id: option_r.0,
            option: option.to_owned(),
        });
    }

    tx.commit().await?;

    r.into_poll(opt_result)
}

/// Locks the poll row, lets `edit` compute the new state from it, and writes that state in
/// the same transaction. Existing option ids are kept; options absent from the revision
/// are removed.
pub async fn update_poll(conn: &PgPool, id_poll: i32, edit: PollEdit<'_>) -> PollResult<Poll> {
    let mut tx = conn.begin().await?;

    let r = query_as::<_, PollRow>("SELECT * FROM poll WHERE id=$1 FOR NO KEY UPDATE;")
        .bind(id_poll)
        .fetch_optional(&mut tx)
        .await?
        .ok_or_else(|| PollError::poll_not_found(id_poll))?;

    let options = get_options(&mut tx, &[id_poll]).await?;
    let current = r.into_poll(options)?;

    let revision = edit(&current)?;

    let kept = revision.options.iter().filter_map(|o| o.id).collect::<Vec<i32>>();
    query("DELETE FROM poll_option WHERE id_poll=$1 AND NOT (id = ANY($2));")
        .bind(id_poll)
        .bind(kept)
        .execute(&mut tx)
        .await?;

    for (position, option) in revision.options.iter().enumerate() {
        match option.id {
            Some(id) => query("UPDATE poll_option SET position=$1 WHERE id=$2;")
                .bind(position as i32)
                .bind(id)
                .execute(&mut tx)
                .await?,
            None => query("INSERT INTO poll_option (id_poll, position, option) VALUES ($1, $2, $3);")
                .bind(id_poll)
                .bind(position as i32)
                .bind(&option.option)
                .execute(&mut tx)
                .await?,
        };
    }

    let r = query_as::<_, PollRow>(
        "UPDATE poll
         SET question=$2, allowed_selections=$3, selection_type=$4, time_end=$5, time_updated=NOW()
         WHERE id=$1
         RETURNING *;")
        .bind(id_poll)
        .bind(&revision.question)
        .bind(revision.allowed_selections)
        .bind(revision.selection_type.as_str())
        .bind(revision.time_end)
        .fetch_one(&mut tx)
        .await?;

    let options = get_options(&mut tx, &[id_poll]).await?;

    tx.commit().await?;

    r.into_poll(options)
}

/// Removes the poll and every ballot cast on it as one transaction.
pub async fn delete_poll(conn: &PgPool, id_poll: i32, guard: PollGuard<'_>) -> PollResult<()> {
    let mut tx = conn.begin().await?;

    let r = query_as::<_, PollRow>("SELECT * FROM poll WHERE id=$1 FOR UPDATE;")
        .bind(id_poll)
        .fetch_optional(&mut tx)
        .await?
        .ok_or_else(|| PollError::poll_not_found(id_poll))?;

    let options = get_options(&mut tx, &[id_poll]).await?;
    guard(&r.into_poll(options)?)?;

    query("DELETE FROM ballot WHERE id_poll=$1;").bind(id_poll).execute(&mut tx).await?;
    query("DELETE FROM poll WHERE id=$1;").bind(id_poll).execute(&mut tx).await?;

    tx.commit().await?;

    Ok(())
}

pub async fn list_polls(conn: &PgPool, q: &PollQuery) -> PollResult<Vec<Poll>> {
    let (created_by, voted_by) = match &q.scope {
        ListScope::All => (None, None),
        ListScope::CreatedBy(user) => (Some(user.as_str()), None),
        ListScope::VotedBy(user) => (None, Some(user.as_str())),
    };

    let rows = query_as::<_, PollRow>(
        "SELECT p.* FROM poll p
         WHERE ($1::TEXT IS NULL OR p.id_created_by = $1)
           AND ($2::TEXT IS NULL OR EXISTS (SELECT 1 FROM ballot b WHERE b.id_poll = p.id AND b.id_user = $2))
           AND ($3::TEXT IS NULL
                OR p.question ~* $3
                OR EXISTS (SELECT 1 FROM poll_option o WHERE o.id_poll = p.id AND o.option ~* $3))
         ORDER BY p.time_created DESC, p.id DESC
         LIMIT $4 OFFSET $5;")
        .bind(created_by)
        .bind(voted_by)
        .bind(q.pattern())
        .bind(q.page.size() as i64)
        .bind(q.page.offset() as i64)
        .fetch_all(conn)
        .await?;

    let ids = rows.iter().map(|r| r.id).collect::<Vec<i32>>();
    let mut options = get_options(conn, &ids).await?
        .into_iter()
        .into_group_map_by(|o| o.id_poll);

    rows.into_iter()
        .map(|r| {
            let opts = options.remove(&r.id).unwrap_or_default();
            r.into_poll(opts)
        })
        .collect()
}

pub async fn add_ballot(conn: &PgPool, vote: &NewVote) -> PollResult<Vote> {
    let mut tx = conn.begin().await?;

    let ballot = query_as::<_, (i32, DateTime<Utc>)>(
        "INSERT INTO ballot (id_poll, id_user, time_created)
         VALUES ($1, $2, NOW())
         RETURNING id, time_created;")
        .bind(vote.id_poll)
        .bind(&vote.id_user)
        .fetch_one(&mut tx)
        .await
        .map_err(|e| match sqlstate(&e).as_deref() {
            Some(UNIQUE_VIOLATION) => PollError::DuplicateVote(vote.id_poll),
            Some(FOREIGN_KEY_VIOLATION) => PollError::poll_not_found(vote.id_poll),
            _ => PollError::from(e),
        })?;

    for (position, choice) in vote.choices.iter().enumerate() {
        query(
            "INSERT INTO ballot_choice (id_ballot, position, id_option, option)
             VALUES ($1, $2, $3, $4);")
            .bind(ballot.0)
            .bind(position as i32)
            .bind(choice.id_option)
            .bind(&choice.option)
            .execute(&mut tx)
            .await?;
    }

    tx.commit().await?;

    Ok(Vote {
        id: ballot.0,
        id_poll: vote.id_poll,
        id_user: vote.id_user.clone(),
        time_created: ballot.1,
        choices: vote.choices.clone(),
    })
}

pub async fn has_ballot(conn: &PgPool, id_poll: i32, id_user: &str) -> PollResult<bool> {
    let r = query_as::<_, (bool,)>("SELECT EXISTS(SELECT 1 FROM ballot WHERE id_poll=$1 AND id_user=$2);")
        .bind(id_poll)
        .bind(id_user)
        .fetch_one(conn)
        .await?;

    Ok(r.0)
}

pub async fn get_ballots(conn: &PgPool, id_poll: i32) -> PollResult<Vec<Vote>> {
    let mut stream = query_as::<_, BallotRow>(
        "SELECT b.id, b.id_poll, b.id_user, b.time_created, c.id_option, c.option
         FROM ballot b
         LEFT JOIN ballot_choice c ON c.id_ballot = b.id
         WHERE b.id_poll=$1
         ORDER BY b.time_created, b.id, c.position;")
        .bind(id_poll)
        .fetch(conn);

    let mut result: Vec<Vote> = Vec::new();
    while let Some(row) = stream.try_next().await? {
        if result.last().map(|v| v.id) != Some(row.id) {
            result.push(Vote {
                id: row.id,
                id_poll: row.id_poll,
                id_user: row.id_user,
                time_created: row.time_created,
                choices: Vec::new(),
            });
        }

        if let (Some(id_option), Some(option), Some(vote)) = (row.id_option, row.option, result.last_mut()) {
            vote.choices.push(VoteChoice { id_option, option });
        }
    }

    Ok(result)
}

pub async fn get_display_name(conn: &PgPool, id_user: &str) -> PollResult<Option<String>> {
    let r = query_as::<_, (String,)>("SELECT display_name FROM app_user WHERE id=$1;")
        .bind(id_user)
        .fetch_optional(conn)
        .await?;

    Ok(r.map(|v| v.0))
}
