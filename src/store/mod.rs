//! Persistence contracts consumed by the team, user and pull request logic.
//!
//! Lookups return `Ok(None)` when a row doesn't exist; `Err` is reserved for
//! failures of the backing store itself. `PgStore` is the production
//! backend; `MemoryStore` backs the unit tests.

#[cfg(test)]
mod memory;
mod pg;

#[cfg(test)]
pub use self::memory::MemoryStore;
pub use self::pg::PgStore;

use crate::domain::pulls::{PullRequest, ReviewerAssignment};
use crate::domain::teams::{Team, User};
use crate::error::BotResult;

pub trait TeamStore: Send + Sync {
    fn create(&self, team_name: &str) -> BotResult<()>;

    /// Fetch a team with all of its members, active or not.
    fn get_by_name(&self, team_name: &str) -> BotResult<Option<Team>>;
}

pub trait UserStore: Send + Sync {
    fn get_by_id(&self, user_id: &str) -> BotResult<Option<User>>;

    /// Active members of a team, ordered by user id.
    fn get_active_by_team(&self, team_name: &str) -> BotResult<Vec<User>>;

    fn update_active(&self, user_id: &str, active: bool) -> BotResult<()>;

    /// Upsert `members` keyed on user id, moving each of them into `team_name`.
    fn create_or_update(&self, team_name: &str, members: &[User]) -> BotResult<()>;
}

pub trait PullRequestStore: Send + Sync {
    /// Fetch a pull request along with its currently assigned reviewers.
    fn get_by_id(&self, pr_id: &str) -> BotResult<Option<PullRequest>>;

    /// Persist the pull request row only; reviewers go through `ReviewerStore`.
    fn create(&self, pr: &PullRequest) -> BotResult<()>;

    fn update(&self, pr: &PullRequest) -> BotResult<()>;
}

pub trait ReviewerStore: Send + Sync {
    fn add(&self, list: &[ReviewerAssignment]) -> BotResult<()>;

    fn add_one(&self, pr_id: &str, reviewer_id: &str) -> BotResult<()>;

    fn delete(&self, pr_id: &str, reviewer_id: &str) -> BotResult<()>;

    fn get_by_pr(&self, pr_id: &str) -> BotResult<Vec<ReviewerAssignment>>;

    /// Ids of every pull request the reviewer is assigned to.
    fn get_prs_by_reviewer(&self, reviewer_id: &str) -> BotResult<Vec<String>>;
}
