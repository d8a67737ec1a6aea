use std::fmt;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use diesel::{Insertable, Queryable};

use super::schema::*;
use crate::error::{BotError, BotResult};

const STATUS_OPEN: &str = "OPEN";
const STATUS_MERGED: &str = "MERGED";

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PrStatus {
    Open,
    Merged,
}

impl PrStatus {
    pub fn repr(self) -> &'static str {
        match self {
            PrStatus::Open => STATUS_OPEN,
            PrStatus::Merged => STATUS_MERGED,
        }
    }

    pub fn from_repr(repr: &str) -> Option<Self> {
        match repr {
            STATUS_OPEN => Some(PrStatus::Open),
            STATUS_MERGED => Some(PrStatus::Merged),
            _ => None,
        }
    }
}

impl fmt::Display for PrStatus {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.write_str(self.repr())
    }
}

/// A pull request as callers see it, reviewers included.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct PullRequest {
    #[serde(rename = "pull_request_id")]
    pub id: String,
    #[serde(rename = "pull_request_name")]
    pub name: String,
    pub author_id: String,
    pub status: PrStatus,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "mergedAt", skip_serializing_if = "Option::is_none")]
    pub merged_at: Option<DateTime<Utc>>,
    pub assigned_reviewers: Vec<String>,
}

impl PullRequest {
    pub fn open(id: &str, name: &str, author_id: &str) -> Self {
        PullRequest {
            id: id.to_string(),
            name: name.to_string(),
            author_id: author_id.to_string(),
            status: PrStatus::Open,
            created_at: Utc::now(),
            merged_at: None,
            assigned_reviewers: Vec::new(),
        }
    }

    pub fn is_merged(&self) -> bool {
        self.status == PrStatus::Merged
    }

    pub fn from_record(record: PullRequestRecord, reviewers: Vec<String>) -> BotResult<Self> {
        let status = PrStatus::from_repr(&record.status).ok_or_else(|| {
            BotError::Misc(Some(format!(
                "pull request {} has unknown status {:?}",
                record.pr_id, record.status
            )))
        })?;

        Ok(PullRequest {
            id: record.pr_id,
            name: record.pr_name,
            author_id: record.author_id,
            status,
            created_at: Utc.from_utc_datetime(&record.created_at),
            merged_at: record.merged_at.map(|t| Utc.from_utc_datetime(&t)),
            assigned_reviewers: reviewers,
        })
    }
}

#[derive(Clone, Debug, Eq, Insertable, PartialEq, Queryable)]
#[diesel(table_name = pull_requests)]
pub struct PullRequestRecord {
    pub pr_id: String,
    pub pr_name: String,
    pub author_id: String,
    pub status: String,
    pub created_at: NaiveDateTime,
    pub merged_at: Option<NaiveDateTime>,
}

impl<'a> From<&'a PullRequest> for PullRequestRecord {
    fn from(pr: &'a PullRequest) -> Self {
        PullRequestRecord {
            pr_id: pr.id.clone(),
            pr_name: pr.name.clone(),
            author_id: pr.author_id.clone(),
            status: pr.status.repr().to_string(),
            created_at: pr.created_at.naive_utc(),
            merged_at: pr.merged_at.map(|t| t.naive_utc()),
        }
    }
}

#[derive(Clone, Debug, Eq, Hash, Insertable, Ord, PartialEq, PartialOrd, Queryable)]
#[diesel(table_name = pr_reviewers)]
pub struct ReviewerAssignment {
    pub pr_id: String,
    pub reviewer_id: String,
}

impl ReviewerAssignment {
    pub fn new(pr_id: &str, reviewer_id: &str) -> Self {
        ReviewerAssignment {
            pr_id: pr_id.to_string(),
            reviewer_id: reviewer_id.to_string(),
        }
    }
}
