use std::collections::HashSet;
use std::sync::Arc;

use rocket::data::{self, Data, FromData, Limits};
use rocket::http::Status;
use rocket::outcome::Outcome;
use rocket::request::{self, FromRequest, Request};
use rocket::response::status::Custom;
use rocket::serde::json::{Json, Value};
use rocket::{catch, catchers, routes, Build, Rocket};
use serde::de::DeserializeOwned;

use crate::assign::Picker;
use crate::config::Config;
use crate::error::{envelope, BotError, BotResult};
use crate::pulls::PullRequests;
use crate::store::{PullRequestStore, ReviewerStore, TeamStore, UserStore};
use crate::teams::Teams;
use crate::users::Users;

/// Everything the handlers need. Managed as `Arc<Services>` so blocking
/// store calls can own a handle.
pub struct Services {
    pub teams: Teams,
    pub users: Users,
    pub pulls: PullRequests,
}

impl Services {
    pub fn new<S>(store: Arc<S>, picker: Picker, max_reviewers: usize) -> Self
    where
        S: TeamStore + UserStore + PullRequestStore + ReviewerStore + 'static,
    {
        Services {
            teams: Teams::new(store.clone(), store.clone()),
            users: Users::new(store.clone(), store.clone(), store.clone()),
            pulls: PullRequests::new(store.clone(), store.clone(), store, picker, max_reviewers),
        }
    }
}

pub fn rocket(config: &Config, services: Services) -> Rocket<Build> {
    let figment = rocket::Config::figment()
        .merge(("address", config.address.clone()))
        .merge(("port", config.port));

    rocket::custom(figment)
        .manage(Arc::new(services))
        .manage(AdminToken(config.admin_token.clone()))
        .mount(
            "/",
            routes![
                api::health,
                api::add_team,
                api::get_team,
                api::set_is_active,
                api::get_review,
                api::create_pr,
                api::merge_pr,
                api::reassign_pr,
            ],
        )
        .register("/", catchers![default_catcher])
}

pub fn serve(config: &Config, services: Services) -> BotResult<()> {
    info!(
        "Attempting to launch Rocket at {}:{}...",
        config.address, config.port
    );

    match rocket::execute(rocket(config, services).launch()) {
        Ok(_) => {
            info!("Rocket shut down.");
            Ok(())
        }
        Err(why) => {
            error!("Rocket failed to ignite: {}", why);
            Err(BotError::Misc(Some(why.to_string())))
        }
    }
}

mod api {
    use rocket::tokio::task::spawn_blocking;
    use rocket::{get, post, State};

    use super::*;
    use crate::domain::teams::User;

    #[derive(Deserialize)]
    pub struct NewTeam {
        #[serde(default)]
        team_name: String,
        #[serde(default)]
        members: Vec<NewMember>,
    }

    #[derive(Deserialize)]
    pub struct NewMember {
        #[serde(default)]
        user_id: String,
        #[serde(default)]
        username: String,
        #[serde(default)]
        is_active: bool,
    }

    #[derive(Deserialize)]
    pub struct ActiveFlag {
        #[serde(default)]
        user_id: String,
        is_active: bool,
    }

    #[derive(Deserialize)]
    pub struct NewPullRequest {
        #[serde(default)]
        pull_request_id: String,
        #[serde(default)]
        pull_request_name: String,
        #[serde(default)]
        author_id: String,
    }

    #[derive(Deserialize)]
    pub struct PullRequestRef {
        #[serde(default)]
        pull_request_id: String,
    }

    #[derive(Deserialize)]
    pub struct Reassignment {
        #[serde(default)]
        pull_request_id: String,
        #[serde(default)]
        old_user_id: String,
    }

    type ApiResult = BotResult<Custom<Json<Value>>>;

    fn ok(body: Value) -> ApiResult {
        Ok(Custom(Status::Ok, Json(body)))
    }

    fn created(body: Value) -> ApiResult {
        Ok(Custom(Status::Created, Json(body)))
    }

    fn required<'a>(field: &str, value: &'a str) -> BotResult<&'a str> {
        if value.is_empty() {
            warn!("rejected request: {} is missing", field);
            return Err(BotError::BadRequest(format!("{} is required", field)));
        }
        Ok(value)
    }

    /// Run a store-backed call on the blocking pool so Diesel and r2d2 never
    /// hold an async worker.
    async fn blocking<T, F>(services: &State<Arc<Services>>, call: F) -> BotResult<T>
    where
        F: FnOnce(&Services) -> BotResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let services = Arc::clone(services.inner());
        spawn_blocking(move || call(&services))
            .await
            .map_err(|e| BotError::Misc(Some(format!("blocking task failed: {}", e))))?
    }

    #[get("/health")]
    pub fn health() -> Json<Value> {
        Json(json!({ "status": "ok" }))
    }

    #[post("/team/add", data = "<body>")]
    pub async fn add_team(
        services: &State<Arc<Services>>,
        body: Result<JsonBody<NewTeam>, BotError>,
    ) -> ApiResult {
        let JsonBody(body) = body?;
        let team_name = required("team_name", &body.team_name)?.to_string();

        {
            let mut seen = HashSet::new();
            for member in &body.members {
                let user_id = required("user_id", &member.user_id)?;
                if !seen.insert(user_id) {
                    warn!("rejected team {}: duplicate member {}", team_name, user_id);
                    return Err(BotError::BadRequest(format!(
                        "duplicate member user_id {}",
                        user_id
                    )));
                }
            }
        }

        let members = body
            .members
            .into_iter()
            .map(|m| User {
                user_id: m.user_id,
                username: m.username,
                team_name: None,
                is_active: m.is_active,
            })
            .collect();

        let team = blocking(services, move |s| s.teams.add(&team_name, members)).await?;
        created(json!({ "team": team }))
    }

    #[get("/team/get?<team_name>")]
    pub async fn get_team(services: &State<Arc<Services>>, team_name: Option<String>) -> ApiResult {
        let team_name = required("team_name", team_name.as_deref().unwrap_or_default())?.to_string();

        let team = blocking(services, move |s| s.teams.get(&team_name)).await?;
        ok(json!(team))
    }

    #[post("/users/setIsActive", data = "<body>")]
    pub async fn set_is_active(
        services: &State<Arc<Services>>,
        admin: Result<Admin, BotError>,
        body: Result<JsonBody<ActiveFlag>, BotError>,
    ) -> ApiResult {
        admin?;
        let JsonBody(body) = body?;
        let user_id = required("user_id", &body.user_id)?.to_string();
        let active = body.is_active;

        let user = blocking(services, move |s| s.users.set_active(&user_id, active)).await?;
        ok(json!({ "user": user }))
    }

    #[get("/users/getReview?<user_id>")]
    pub async fn get_review(services: &State<Arc<Services>>, user_id: Option<String>) -> ApiResult {
        let user_id = required("user_id", user_id.as_deref().unwrap_or_default())?.to_string();

        let lookup = user_id.clone();
        let pull_requests = blocking(services, move |s| s.users.reviews(&lookup)).await?;
        ok(json!({
            "user_id": user_id,
            "pull_requests": pull_requests,
        }))
    }

    #[post("/pullRequest/create", data = "<body>")]
    pub async fn create_pr(
        services: &State<Arc<Services>>,
        body: Result<JsonBody<NewPullRequest>, BotError>,
    ) -> ApiResult {
        let JsonBody(body) = body?;
        required("pull_request_id", &body.pull_request_id)?;
        required("author_id", &body.author_id)?;

        let pr = blocking(services, move |s| {
            s.pulls
                .create(&body.pull_request_id, &body.pull_request_name, &body.author_id)
        })
        .await?;
        created(json!({ "pr": pr }))
    }

    #[post("/pullRequest/merge", data = "<body>")]
    pub async fn merge_pr(
        services: &State<Arc<Services>>,
        body: Result<JsonBody<PullRequestRef>, BotError>,
    ) -> ApiResult {
        let JsonBody(body) = body?;
        required("pull_request_id", &body.pull_request_id)?;

        let pr = blocking(services, move |s| s.pulls.merge(&body.pull_request_id)).await?;
        ok(json!({ "pr": pr }))
    }

    #[post("/pullRequest/reassign", data = "<body>")]
    pub async fn reassign_pr(
        services: &State<Arc<Services>>,
        body: Result<JsonBody<Reassignment>, BotError>,
    ) -> ApiResult {
        let JsonBody(body) = body?;
        required("pull_request_id", &body.pull_request_id)?;
        required("old_user_id", &body.old_user_id)?;

        let (pr, replaced_by) = blocking(services, move |s| {
            s.pulls.reassign(&body.pull_request_id, &body.old_user_id)
        })
        .await?;
        ok(json!({
            "pr": pr,
            "replaced_by": replaced_by,
        }))
    }
}

//==============================================================================
// Request guards
//==============================================================================

/// The shared secret for admin endpoints.
struct AdminToken(String);

/// Proof that the request carried `Authorization: Bearer <admin token>`.
pub struct Admin;

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Admin {
    type Error = BotError;

    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let expected = match req.rocket().state::<AdminToken>() {
            Some(token) => token,
            None => {
                let why = BotError::Misc(Some("admin token is not configured".to_string()));
                return Outcome::Error((Status::InternalServerError, why));
            }
        };

        match check_bearer(req.headers().get_one("Authorization"), &expected.0) {
            Ok(()) => Outcome::Success(Admin),
            Err(why) => {
                warn!("{} {} unauthorized: {}", req.method(), req.uri(), why);
                Outcome::Error((Status::Unauthorized, BotError::Unauthorized(why)))
            }
        }
    }
}

fn check_bearer(header: Option<&str>, expected: &str) -> Result<(), &'static str> {
    let header = header
        .filter(|h| !h.is_empty())
        .ok_or("missing Authorization header")?;

    let mut parts = header.splitn(2, ' ');
    match (parts.next(), parts.next()) {
        (Some("Bearer"), Some(token)) if token == expected => Ok(()),
        (Some("Bearer"), Some(_)) => Err("invalid admin token"),
        _ => Err("invalid Authorization header format"),
    }
}

/// A JSON request body. Parse failures become `BAD_REQUEST` with the path
/// of the offending field.
pub struct JsonBody<T>(pub T);

#[rocket::async_trait]
impl<'r, T: DeserializeOwned> FromData<'r> for JsonBody<T> {
    type Error = BotError;

    async fn from_data(req: &'r Request<'_>, data: Data<'r>) -> data::Outcome<'r, Self> {
        let limit = req.limits().get("json").unwrap_or(Limits::JSON);

        let raw = match data.open(limit).into_string().await {
            Ok(raw) if raw.is_complete() => raw.into_inner(),
            Ok(_) => {
                warn!("{} {} body exceeds {}", req.method(), req.uri(), limit);
                return Outcome::Error((Status::PayloadTooLarge, BotError::PayloadTooLarge));
            }
            Err(e) => {
                let why = BotError::BadRequest(format!("unreadable request body: {}", e));
                return Outcome::Error((Status::BadRequest, why));
            }
        };

        let de = &mut serde_json::Deserializer::from_str(&raw);
        match serde_path_to_error::deserialize(de) {
            Ok(value) => Outcome::Success(JsonBody(value)),
            Err(e) => {
                warn!("{} {} invalid JSON: {}", req.method(), req.uri(), e);
                let why = BotError::BadRequest(format!("invalid JSON: {}", e));
                Outcome::Error((Status::BadRequest, why))
            }
        }
    }
}

/// Anything Rocket rejects before a handler runs still gets the error envelope.
#[catch(default)]
fn default_catcher(status: Status, req: &Request<'_>) -> Custom<Json<Value>> {
    let code = match status.code {
        401 => "UNAUTHORIZED",
        404 => "NOT_FOUND",
        400..=499 => "BAD_REQUEST",
        _ => "INTERNAL",
    };

    let message = match status.code {
        404 => format!("no route for {} {}", req.method(), req.uri().path()),
        _ => status.reason_lossy().to_lowercase(),
    };

    Custom(status, Json(envelope(code, &message)))
}
