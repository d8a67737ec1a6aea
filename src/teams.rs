use std::sync::Arc;

use crate::domain::teams::{Team, User};
use crate::error::{BotError, BotResult};
use crate::store::{TeamStore, UserStore};

//==============================================================================
// Public API
//==============================================================================

pub struct Teams {
    teams: Arc<dyn TeamStore>,
    users: Arc<dyn UserStore>,
}

impl Teams {
    pub fn new(teams: Arc<dyn TeamStore>, users: Arc<dyn UserStore>) -> Self {
        Teams { teams, users }
    }

    /// Create a team and upsert its members into it. Members that already
    /// belong to another team are moved.
    pub fn add(&self, team_name: &str, members: Vec<User>) -> BotResult<Team> {
        if self.teams.get_by_name(team_name)?.is_some() {
            return Err(BotError::TeamExists);
        }

        self.teams.create(team_name)?;
        self.users.create_or_update(team_name, &members)?;

        info!("created team {} with {} members", team_name, members.len());

        Ok(Team {
            team_name: team_name.to_string(),
            members: into_team(team_name, members),
        })
    }

    pub fn get(&self, team_name: &str) -> BotResult<Team> {
        self.teams
            .get_by_name(team_name)?
            .ok_or(BotError::NotFound("team"))
    }
}

//==============================================================================
// Implementation details
//==============================================================================

/// Members as they were stored: tagged with their team and ordered by id.
fn into_team(team_name: &str, members: Vec<User>) -> Vec<User> {
    let mut members = members
        .into_iter()
        .map(|m| User {
            team_name: Some(team_name.to_string()),
            ..m
        })
        .collect::<Vec<_>>();
    members.sort_by(|a, b| a.user_id.cmp(&b.user_id));
    members
}

//==============================================================================
// Tests
//==============================================================================
