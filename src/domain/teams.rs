use diesel::{Insertable, Queryable};

use super::schema::*;

#[derive(Clone, Debug, Deserialize, Eq, Insertable, PartialEq, Queryable, Serialize)]
#[diesel(table_name = users)]
pub struct User {
    pub user_id: String,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_name: Option<String>,
    pub is_active: bool,
}

/// A team together with its members, ordered by user id.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Team {
    pub team_name: String,
    pub members: Vec<User>,
}
