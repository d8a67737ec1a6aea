use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{PullRequestStore, ReviewerStore, TeamStore, UserStore};
use crate::domain::pulls::{PullRequest, ReviewerAssignment};
use crate::domain::teams::{Team, User};
use crate::error::{BotError, BotResult};

/// In-memory store mirroring the constraints of the Postgres schema:
/// primary keys are unique and reviewer rows are unique per pair. Duplicate
/// team and pull request keys report the same conflicts `PgStore` does.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    broken: AtomicBool,
}

#[derive(Default)]
struct Inner {
    teams: BTreeSet<String>,
    users: BTreeMap<String, User>,
    pulls: BTreeMap<String, PullRequest>,
    reviewers: BTreeSet<ReviewerAssignment>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a user as-is, bypassing team membership.
    pub fn insert_user(&self, user: User) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.users.insert(user.user_id.clone(), user);
    }

    /// Make every subsequent call fail, as if the database went away.
    pub fn break_connection(&self) {
        self.broken.store(true, Ordering::SeqCst);
    }

    fn lock(&self) -> BotResult<MutexGuard<'_, Inner>> {
        if self.broken.load(Ordering::SeqCst) {
            return Err(BotError::Misc(Some("connection refused".to_string())));
        }
        Ok(self.inner.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

fn duplicate(what: &str, key: &str) -> BotError {
    BotError::Misc(Some(format!("duplicate key {} for {}", key, what)))
}

impl Inner {
    fn reviewer_ids(&self, pr_id: &str) -> Vec<String> {
        self.reviewers
            .iter()
            .filter(|r| r.pr_id == pr_id)
            .map(|r| r.reviewer_id.clone())
            .collect()
    }
}

impl TeamStore for MemoryStore {
    fn create(&self, team_name: &str) -> BotResult<()> {
        let mut inner = self.lock()?;
        if !inner.teams.insert(team_name.to_string()) {
            return Err(BotError::TeamExists);
        }
        Ok(())
    }

    fn get_by_name(&self, team_name: &str) -> BotResult<Option<Team>> {
        let inner = self.lock()?;
        if !inner.teams.contains(team_name) {
            return Ok(None);
        }

        let members = inner
            .users
            .values()
            .filter(|u| u.team_name.as_deref() == Some(team_name))
            .cloned()
            .collect();

        Ok(Some(Team {
            team_name: team_name.to_string(),
            members,
        }))
    }
}

impl UserStore for MemoryStore {
    fn get_by_id(&self, user_id: &str) -> BotResult<Option<User>> {
        Ok(self.lock()?.users.get(user_id).cloned())
    }

    fn get_active_by_team(&self, team_name: &str) -> BotResult<Vec<User>> {
        Ok(self
            .lock()?
            .users
            .values()
            .filter(|u| u.is_active && u.team_name.as_deref() == Some(team_name))
            .cloned()
            .collect())
    }

    fn update_active(&self, user_id: &str, active: bool) -> BotResult<()> {
        if let Some(user) = self.lock()?.users.get_mut(user_id) {
            user.is_active = active;
        }
        Ok(())
    }

    fn create_or_update(&self, team_name: &str, members: &[User]) -> BotResult<()> {
        let mut inner = self.lock()?;
        for member in members {
            let user = User {
                team_name: Some(team_name.to_string()),
                ..member.clone()
            };
            inner.users.insert(user.user_id.clone(), user);
        }
        Ok(())
    }
}

impl PullRequestStore for MemoryStore {
    fn get_by_id(&self, pr_id: &str) -> BotResult<Option<PullRequest>> {
        let inner = self.lock()?;
        Ok(inner.pulls.get(pr_id).map(|pr| PullRequest {
            assigned_reviewers: inner.reviewer_ids(pr_id),
            ..pr.clone()
        }))
    }

    fn create(&self, pr: &PullRequest) -> BotResult<()> {
        let mut inner = self.lock()?;
        if inner.pulls.contains_key(&pr.id) {
            return Err(BotError::PrExists);
        }
        if !inner.users.contains_key(&pr.author_id) {
            return Err(BotError::Misc(Some(format!(
                "foreign key violation: no user {}",
                pr.author_id
            ))));
        }
        inner.pulls.insert(
            pr.id.clone(),
            PullRequest {
                assigned_reviewers: Vec::new(),
                ..pr.clone()
            },
        );
        Ok(())
    }

    fn update(&self, pr: &PullRequest) -> BotResult<()> {
        if let Some(stored) = self.lock()?.pulls.get_mut(&pr.id) {
            stored.name = pr.name.clone();
            stored.status = pr.status;
            stored.merged_at = pr.merged_at;
        }
        Ok(())
    }
}

impl ReviewerStore for MemoryStore {
    fn add(&self, list: &[ReviewerAssignment]) -> BotResult<()> {
        let mut inner = self.lock()?;
        if let Some(dup) = list.iter().find(|r| inner.reviewers.contains(*r)) {
            return Err(duplicate("pr_reviewers", &dup.reviewer_id));
        }
        inner.reviewers.extend(list.iter().cloned());
        Ok(())
    }

    fn add_one(&self, pr_id: &str, reviewer_id: &str) -> BotResult<()> {
        let mut inner = self.lock()?;
        if !inner.reviewers.insert(ReviewerAssignment::new(pr_id, reviewer_id)) {
            return Err(duplicate("pr_reviewers", reviewer_id));
        }
        Ok(())
    }

    fn delete(&self, pr_id: &str, reviewer_id: &str) -> BotResult<()> {
        self.lock()?
            .reviewers
            .remove(&ReviewerAssignment::new(pr_id, reviewer_id));
        Ok(())
    }

    fn get_by_pr(&self, pr_id: &str) -> BotResult<Vec<ReviewerAssignment>> {
        Ok(self
            .lock()?
            .reviewers
            .iter()
            .filter(|r| r.pr_id == pr_id)
            .cloned()
            .collect())
    }

    fn get_prs_by_reviewer(&self, reviewer_id: &str) -> BotResult<Vec<String>> {
        let mut ids = self
            .lock()?
            .reviewers
            .iter()
            .filter(|r| r.reviewer_id == reviewer_id)
            .map(|r| r.pr_id.clone())
            .collect::<Vec<_>>();
        ids.sort();
        Ok(ids)
    }
}
