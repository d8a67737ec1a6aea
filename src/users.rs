use std::sync::Arc;

use crate::domain::pulls::PullRequest;
use crate::domain::teams::User;
use crate::error::{BotError, BotResult};
use crate::store::{PullRequestStore, ReviewerStore, UserStore};

pub struct Users {
    users: Arc<dyn UserStore>,
    pulls: Arc<dyn PullRequestStore>,
    reviewers: Arc<dyn ReviewerStore>,
}

impl Users {
    pub fn new(
        users: Arc<dyn UserStore>,
        pulls: Arc<dyn PullRequestStore>,
        reviewers: Arc<dyn ReviewerStore>,
    ) -> Self {
        Users {
            users,
            pulls,
            reviewers,
        }
    }

    /// Toggle whether the user is picked for new reviews. Existing
    /// assignments are left alone.
    pub fn set_active(&self, user_id: &str, active: bool) -> BotResult<User> {
        let mut user = self
            .users
            .get_by_id(user_id)?
            .ok_or(BotError::NotFound("user"))?;

        self.users.update_active(user_id, active)?;
        user.is_active = active;

        info!("user {} is_active set to {}", user_id, active);
        Ok(user)
    }

    /// Pull requests the user is currently assigned to review, ordered by id.
    pub fn reviews(&self, user_id: &str) -> BotResult<Vec<PullRequest>> {
        if self.users.get_by_id(user_id)?.is_none() {
            return Err(BotError::NotFound("user"));
        }

        let mut reviews = Vec::new();
        for pr_id in self.reviewers.get_prs_by_reviewer(user_id)? {
            match self.pulls.get_by_id(&pr_id)? {
                Some(pr) => reviews.push(pr),
                None => warn!("reviewer row for {} points at missing PR {}", user_id, pr_id),
            }
        }

        Ok(reviews)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::assign::Picker;
    use crate::pulls::PullRequests;
    use crate::store::{MemoryStore, TeamStore};

    fn fixture() -> (Arc<MemoryStore>, Users, PullRequests) {
        let store = Arc::new(MemoryStore::new());
        TeamStore::create(&*store, "backend").unwrap();
        let members = ["u1", "u2", "u3"]
            .iter()
            .map(|id| User {
                user_id: id.to_string(),
                username: id.to_uppercase(),
                team_name: None,
                is_active: true,
            })
            .collect::<Vec<_>>();
        store.create_or_update("backend", &members).unwrap();

        let users = Users::new(store.clone(), store.clone(), store.clone());
        let pulls = PullRequests::new(
            store.clone(),
            store.clone(),
            store.clone(),
            Picker::seeded(0),
            2,
        );
        (store, users, pulls)
    }

    #[test]
    fn deactivate_and_reactivate() {
        let (store, users, _) = fixture();

        let user = users.set_active("u2", false).unwrap();
        assert!(!user.is_active);
        assert_eq!(user.team_name.as_deref(), Some("backend"));
        assert!(!UserStore::get_by_id(&*store, "u2").unwrap().unwrap().is_active);

        assert!(users.set_active("u2", true).unwrap().is_active);
    }

    #[test]
    fn unknown_user() {
        let (_, users, _) = fixture();

        match users.set_active("ghost", false) {
            Err(BotError::NotFound(what)) => assert_eq!(what, "user"),
            other => panic!("expected NotFound, got {:?}", other),
        }
        match users.reviews("ghost") {
            Err(BotError::NotFound(what)) => assert_eq!(what, "user"),
            other => panic!("expected NotFound, got {:?}", other),
        }
    }

    #[test]
    fn reviews_follow_assignments() {
        let (_, users, pulls) = fixture();

        // Two eligible teammates and two slots: both review every PR.
        pulls.create("pr-2", "second", "u1").unwrap();
        pulls.create("pr-1", "first", "u1").unwrap();
        pulls.merge("pr-2").unwrap();

        let ids = |user_id: &str| {
            users
                .reviews(user_id)
                .unwrap()
                .into_iter()
                .map(|pr| pr.id)
                .collect::<Vec<_>>()
        };

        assert_eq!(ids("u2"), vec!["pr-1", "pr-2"]);
        assert_eq!(ids("u3"), vec!["pr-1", "pr-2"]);
        assert!(ids("u1").is_empty());
    }

    #[test]
    fn deactivation_keeps_existing_reviews() {
        let (_, users, pulls) = fixture();
        pulls.create("pr-1", "x", "u1").unwrap();

        users.set_active("u2", false).unwrap();

        let reviews = users.reviews("u2").unwrap();
        assert_eq!(reviews.len(), 1);
        assert_eq!(reviews[0].id, "pr-1");
    }
}
