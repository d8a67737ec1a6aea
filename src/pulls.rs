//! Pull request lifecycle: creation with automatic reviewer assignment,
//! merging, and swapping out a single reviewer.
//!
//! A pull request is `OPEN` until merged; `MERGED` is terminal. Merging is
//! idempotent and reassignment is refused once merged.
//!
//! Reassignment reads the reviewer rows, then deletes and inserts one. Those
//! steps are not wrapped in a transaction, so two concurrent reassignments of
//! the same pull request can interleave; the `(pr_id, reviewer_id)` key keeps
//! the rows unique but one of the callers may see an internal error.

use std::sync::Arc;

use chrono::Utc;
use itertools::Itertools;

use crate::assign::{self, Picker};
use crate::domain::pulls::{PrStatus, PullRequest, ReviewerAssignment};
use crate::error::{BotError, BotResult};
use crate::store::{PullRequestStore, ReviewerStore, UserStore};

pub struct PullRequests {
    pulls: Arc<dyn PullRequestStore>,
    users: Arc<dyn UserStore>,
    reviewers: Arc<dyn ReviewerStore>,
    picker: Picker,
    max_reviewers: usize,
}

impl PullRequests {
    pub fn new(
        pulls: Arc<dyn PullRequestStore>,
        users: Arc<dyn UserStore>,
        reviewers: Arc<dyn ReviewerStore>,
        picker: Picker,
        max_reviewers: usize,
    ) -> Self {
        PullRequests {
            pulls,
            users,
            reviewers,
            picker,
            max_reviewers,
        }
    }

    pub fn create(&self, pr_id: &str, name: &str, author_id: &str) -> BotResult<PullRequest> {
        if self.pulls.get_by_id(pr_id)?.is_some() {
            return Err(BotError::PrExists);
        }

        let author = self
            .users
            .get_by_id(author_id)?
            .ok_or(BotError::NotFound("author or team"))?;

        let team_name = author
            .team_name
            .as_deref()
            .ok_or(BotError::NotFound("author or team"))?;

        let roster = self.users.get_active_by_team(team_name)?;
        let candidates = assign::review_candidates(&author.user_id, roster);
        let selected = self.picker.sample(candidates, self.max_reviewers);

        let mut pr = PullRequest::open(pr_id, name, author_id);
        self.pulls.create(&pr)?;

        let rows = selected
            .iter()
            .map(|reviewer| ReviewerAssignment::new(pr_id, reviewer))
            .collect::<Vec<_>>();
        self.reviewers.add(&rows)?;

        info!(
            "created PR {} by {} with reviewers [{}]",
            pr_id,
            author_id,
            selected.iter().join(", ")
        );

        pr.assigned_reviewers = selected;
        Ok(pr)
    }

    pub fn merge(&self, pr_id: &str) -> BotResult<PullRequest> {
        let mut pr = self
            .pulls
            .get_by_id(pr_id)?
            .ok_or(BotError::NotFound("resource"))?;

        if pr.is_merged() {
            debug!("PR {} already merged, nothing to do", pr_id);
            return Ok(pr);
        }

        pr.status = PrStatus::Merged;
        pr.merged_at = Some(Utc::now());
        self.pulls.update(&pr)?;

        info!("PR {} is now {}", pr_id, pr.status);
        Ok(pr)
    }

    /// Replace `old_reviewer_id` on the pull request with another active
    /// member of the old reviewer's team. Returns the updated pull request
    /// and the id of the new reviewer.
    pub fn reassign(&self, pr_id: &str, old_reviewer_id: &str) -> BotResult<(PullRequest, String)> {
        let pr = self
            .pulls
            .get_by_id(pr_id)?
            .ok_or(BotError::NotFound("PR or user"))?;

        if pr.is_merged() {
            return Err(BotError::PrMerged);
        }

        let assigned = self.reviewers.get_by_pr(pr_id)?;
        if !assigned.iter().any(|r| r.reviewer_id == old_reviewer_id) {
            return Err(BotError::NotAssigned);
        }

        let old_reviewer = self
            .users
            .get_by_id(old_reviewer_id)?
            .ok_or(BotError::NotFound("PR or user"))?;

        let team_name = old_reviewer
            .team_name
            .as_deref()
            .ok_or(BotError::NoCandidate)?;

        let roster = self.users.get_active_by_team(team_name)?;

        let mut excluded = hashset! {old_reviewer_id, pr.author_id.as_str()};
        excluded.extend(assigned.iter().map(|r| r.reviewer_id.as_str()));

        let candidates = assign::replacement_candidates(roster, &excluded);
        let new_reviewer = self
            .picker
            .pick_one(&candidates)
            .ok_or(BotError::NoCandidate)?;

        self.reviewers.delete(pr_id, old_reviewer_id)?;
        self.reviewers.add_one(pr_id, &new_reviewer)?;

        info!(
            "reassigned PR {} from {} to {}",
            pr_id, old_reviewer_id, new_reviewer
        );

        let updated = self
            .pulls
            .get_by_id(pr_id)?
            .ok_or(BotError::NotFound("PR or user"))?;

        Ok((updated, new_reviewer))
    }
}
