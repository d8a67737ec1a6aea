table! {
    pr_reviewers (pr_id, reviewer_id) {
        pr_id -> Varchar,
        reviewer_id -> Varchar,
    }
}

table! {
    pull_requests (pr_id) {
        pr_id -> Varchar,
        pr_name -> Varchar,
        author_id -> Varchar,
        status -> Varchar,
        created_at -> Timestamp,
        merged_at -> Nullable<Timestamp>,
    }
}

table! {
    teams (team_name) {
        team_name -> Varchar,
    }
}

table! {
    users (user_id) {
        user_id -> Varchar,
        username -> Varchar,
        team_name -> Nullable<Varchar>,
        is_active -> Bool,
    }
}

joinable!(pr_reviewers -> pull_requests (pr_id));
joinable!(pr_reviewers -> users (reviewer_id));
joinable!(pull_requests -> users (author_id));

allow_tables_to_appear_in_same_query!(pr_reviewers, pull_requests, teams, users);
