use diesel::connection::SimpleConnection;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool, PooledConnection};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::upsert::excluded;

use super::{PullRequestStore, ReviewerStore, TeamStore, UserStore};
use crate::domain::pulls::{PullRequest, PullRequestRecord, ReviewerAssignment};
use crate::domain::schema::{pr_reviewers, pull_requests, teams, users};
use crate::domain::teams::{Team, User};
use crate::error::{BotError, BotResult};

const INIT_MIGRATION: &str = include_str!("../../migrations/2024-01-01-000000_init/up.sql");

type PgPool = Pool<ConnectionManager<PgConnection>>;

/// Diesel-backed store over a Postgres connection pool.
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn connect(db_url: &str, pool_size: u32) -> BotResult<Self> {
        info!("Initializing database connection pool.");

        let manager = ConnectionManager::<PgConnection>::new(db_url);

        match Pool::builder().max_size(pool_size).build(manager) {
            Ok(pool) => {
                info!("DB connection pool established.");
                Ok(PgStore { pool })
            }
            Err(why) => {
                error!("Failed to establish DB connection pool: {}", why);
                Err(why.into())
            }
        }
    }

    /// Apply the schema. Every statement is idempotent, so this runs on each start.
    pub fn run_migrations(&self) -> BotResult<()> {
        let conn = &mut *self.conn()?;
        conn.batch_execute(INIT_MIGRATION)?;
        info!("Database schema is up to date.");
        Ok(())
    }

    fn conn(&self) -> BotResult<PooledConnection<ConnectionManager<PgConnection>>> {
        Ok(self.pool.get()?)
    }
}

/// A key that was free when checked may be taken by the time of the insert;
/// report that as the domain conflict rather than a database failure.
fn on_duplicate(err: DieselError, conflict: BotError) -> BotError {
    match err {
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => conflict,
        other => other.into(),
    }
}

impl TeamStore for PgStore {
    fn create(&self, team_name: &str) -> BotResult<()> {
        let conn = &mut *self.conn()?;

        diesel::insert_into(teams::table)
            .values(teams::team_name.eq(team_name))
            .execute(conn)
            .map_err(|e| on_duplicate(e, BotError::TeamExists))?;

        Ok(())
    }

    fn get_by_name(&self, team_name: &str) -> BotResult<Option<Team>> {
        let conn = &mut *self.conn()?;

        let found = teams::table
            .find(team_name)
            .select(teams::team_name)
            .first::<String>(conn)
            .optional()?;

        let team_name = match found {
            Some(name) => name,
            None => return Ok(None),
        };

        let members = users::table
            .filter(users::team_name.eq(&team_name))
            .order(users::user_id.asc())
            .load::<User>(conn)?;

        Ok(Some(Team { team_name, members }))
    }
}

impl UserStore for PgStore {
    fn get_by_id(&self, user_id: &str) -> BotResult<Option<User>> {
        let conn = &mut *self.conn()?;

        Ok(users::table.find(user_id).first::<User>(conn).optional()?)
    }

    fn get_active_by_team(&self, team_name: &str) -> BotResult<Vec<User>> {
        let conn = &mut *self.conn()?;

        Ok(users::table
            .filter(users::team_name.eq(team_name))
            .filter(users::is_active.eq(true))
            .order(users::user_id.asc())
            .load::<User>(conn)?)
    }

    fn update_active(&self, user_id: &str, active: bool) -> BotResult<()> {
        let conn = &mut *self.conn()?;

        diesel::update(users::table.find(user_id))
            .set(users::is_active.eq(active))
            .execute(conn)?;

        Ok(())
    }

    fn create_or_update(&self, team_name: &str, members: &[User]) -> BotResult<()> {
        if members.is_empty() {
            return Ok(());
        }

        let rows = members
            .iter()
            .map(|m| User {
                team_name: Some(team_name.to_string()),
                ..m.clone()
            })
            .collect::<Vec<_>>();

        let conn = &mut *self.conn()?;

        diesel::insert_into(users::table)
            .values(&rows)
            .on_conflict(users::user_id)
            .do_update()
            .set((
                users::username.eq(excluded(users::username)),
                users::team_name.eq(excluded(users::team_name)),
                users::is_active.eq(excluded(users::is_active)),
            ))
            .execute(conn)?;

        Ok(())
    }
}

impl PullRequestStore for PgStore {
    fn get_by_id(&self, pr_id: &str) -> BotResult<Option<PullRequest>> {
        let conn = &mut *self.conn()?;

        let record = pull_requests::table
            .find(pr_id)
            .first::<PullRequestRecord>(conn)
            .optional()?;

        let record = match record {
            Some(record) => record,
            None => return Ok(None),
        };

        let reviewers = pr_reviewers::table
            .filter(pr_reviewers::pr_id.eq(pr_id))
            .select(pr_reviewers::reviewer_id)
            .order(pr_reviewers::reviewer_id.asc())
            .load::<String>(conn)?;

        PullRequest::from_record(record, reviewers).map(Some)
    }

    fn create(&self, pr: &PullRequest) -> BotResult<()> {
        let conn = &mut *self.conn()?;

        diesel::insert_into(pull_requests::table)
            .values(&PullRequestRecord::from(pr))
            .execute(conn)
            .map_err(|e| on_duplicate(e, BotError::PrExists))?;

        Ok(())
    }

    fn update(&self, pr: &PullRequest) -> BotResult<()> {
        let conn = &mut *self.conn()?;

        diesel::update(pull_requests::table.find(&pr.id))
            .set((
                pull_requests::pr_name.eq(&pr.name),
                pull_requests::status.eq(pr.status.repr()),
                pull_requests::merged_at.eq(pr.merged_at.map(|t| t.naive_utc())),
            ))
            .execute(conn)?;

        Ok(())
    }
}

impl ReviewerStore for PgStore {
    fn add(&self, list: &[ReviewerAssignment]) -> BotResult<()> {
        if list.is_empty() {
            return Ok(());
        }

        let conn = &mut *self.conn()?;

        diesel::insert_into(pr_reviewers::table)
            .values(list)
            .execute(conn)?;

        Ok(())
    }

    fn add_one(&self, pr_id: &str, reviewer_id: &str) -> BotResult<()> {
        let conn = &mut *self.conn()?;

        diesel::insert_into(pr_reviewers::table)
            .values(&ReviewerAssignment::new(pr_id, reviewer_id))
            .execute(conn)?;

        Ok(())
    }

    fn delete(&self, pr_id: &str, reviewer_id: &str) -> BotResult<()> {
        let conn = &mut *self.conn()?;

        diesel::delete(
            pr_reviewers::table
                .filter(pr_reviewers::pr_id.eq(pr_id))
                .filter(pr_reviewers::reviewer_id.eq(reviewer_id)),
        )
        .execute(conn)?;

        Ok(())
    }

    fn get_by_pr(&self, pr_id: &str) -> BotResult<Vec<ReviewerAssignment>> {
        let conn = &mut *self.conn()?;

        Ok(pr_reviewers::table
            .filter(pr_reviewers::pr_id.eq(pr_id))
            .order(pr_reviewers::reviewer_id.asc())
            .load::<ReviewerAssignment>(conn)?)
    }

    fn get_prs_by_reviewer(&self, reviewer_id: &str) -> BotResult<Vec<String>> {
        let conn = &mut *self.conn()?;

        Ok(pr_reviewers::table
            .filter(pr_reviewers::reviewer_id.eq(reviewer_id))
            .select(pr_reviewers::pr_id)
            .order(pr_reviewers::pr_id.asc())
            .load::<String>(conn)?)
    }
}
