use std::fmt;

use diesel::r2d2::PoolError;
use rocket::http::Status;
use rocket::request::Request;
use rocket::response::status::Custom;
use rocket::response::{self, Responder};
use rocket::serde::json::{Json, Value};

pub type BotResult<T> = std::result::Result<T, BotError>;

#[derive(Debug)]
pub enum BotError {
    TeamExists,
    PrExists,
    NotFound(&'static str),
    PrMerged,
    NotAssigned,
    NoCandidate,
    BadRequest(String),
    PayloadTooLarge,
    Unauthorized(&'static str),
    R2d2(PoolError),
    DieselError(diesel::result::Error),
    Misc(Option<String>),
}

impl BotError {
    /// The machine-readable code placed in the error envelope.
    pub fn code(&self) -> &'static str {
        use self::BotError::*;
        match *self {
            TeamExists => "TEAM_EXISTS",
            PrExists => "PR_EXISTS",
            NotFound(_) => "NOT_FOUND",
            PrMerged => "PR_MERGED",
            NotAssigned => "NOT_ASSIGNED",
            NoCandidate => "NO_CANDIDATE",
            BadRequest(_) => "BAD_REQUEST",
            PayloadTooLarge => "PAYLOAD_TOO_LARGE",
            Unauthorized(_) => "UNAUTHORIZED",
            R2d2(_) | DieselError(_) | Misc(_) => "INTERNAL",
        }
    }

    pub fn status(&self) -> Status {
        use self::BotError::*;
        match *self {
            TeamExists | BadRequest(_) => Status::BadRequest,
            PrExists | PrMerged | NotAssigned | NoCandidate => Status::Conflict,
            NotFound(_) => Status::NotFound,
            PayloadTooLarge => Status::PayloadTooLarge,
            Unauthorized(_) => Status::Unauthorized,
            R2d2(_) | DieselError(_) | Misc(_) => Status::InternalServerError,
        }
    }

    pub fn is_internal(&self) -> bool {
        self.status() == Status::InternalServerError
    }

    /// Message shown to callers. Internal failures never leak their cause.
    fn public_message(&self) -> String {
        if self.is_internal() {
            "internal server error".to_string()
        } else {
            self.to_string()
        }
    }
}

impl fmt::Display for BotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use self::BotError::*;
        match self {
            TeamExists => f.write_str("team_name already exists"),
            PrExists => f.write_str("PR id already exists"),
            NotFound(what) => write!(f, "{} not found", what),
            PrMerged => f.write_str("cannot reassign on merged PR"),
            NotAssigned => f.write_str("reviewer is not assigned to this PR"),
            NoCandidate => f.write_str("no active replacement candidate in team"),
            BadRequest(why) => f.write_str(why),
            PayloadTooLarge => f.write_str("request body too large"),
            Unauthorized(why) => f.write_str(why),
            R2d2(e) => write!(f, "connection pool error: {}", e),
            DieselError(e) => write!(f, "database error: {}", e),
            Misc(Some(why)) => f.write_str(why),
            Misc(None) => f.write_str("miscellaneous error"),
        }
    }
}

impl std::error::Error for BotError {}

impl From<PoolError> for BotError {
    fn from(e: PoolError) -> Self {
        BotError::R2d2(e)
    }
}

impl From<diesel::result::Error> for BotError {
    fn from(e: diesel::result::Error) -> Self {
        BotError::DieselError(e)
    }
}

/// Builds the `{"error": {"code", "message"}}` envelope shared by every
/// failing response, including the catchers.
pub fn envelope(code: &str, message: &str) -> Value {
    json!({
        "error": {
            "code": code,
            "message": message,
        }
    })
}

impl<'r> Responder<'r, 'static> for BotError {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'static> {
        if self.is_internal() {
            error!("{} {} failed: {}", req.method(), req.uri(), self);
        }

        let body = envelope(self.code(), &self.public_message());
        Custom(self.status(), Json(body)).respond_to(req)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn domain_errors_map_to_codes() {
        let cases = vec![
            (BotError::TeamExists, 400, "TEAM_EXISTS"),
            (BotError::PrExists, 409, "PR_EXISTS"),
            (BotError::NotFound("team"), 404, "NOT_FOUND"),
            (BotError::PrMerged, 409, "PR_MERGED"),
            (BotError::NotAssigned, 409, "NOT_ASSIGNED"),
            (BotError::NoCandidate, 409, "NO_CANDIDATE"),
            (BotError::BadRequest("x".into()), 400, "BAD_REQUEST"),
            (BotError::PayloadTooLarge, 413, "PAYLOAD_TOO_LARGE"),
            (BotError::Unauthorized("x"), 401, "UNAUTHORIZED"),
            (BotError::Misc(None), 500, "INTERNAL"),
        ];

        for (err, status, code) in cases {
            assert_eq!(err.status().code, status, "{:?}", err);
            assert_eq!(err.code(), code);
        }
    }

    #[test]
    fn internal_errors_hide_their_cause() {
        let err = BotError::Misc(Some("password=hunter2".to_string()));
        assert_eq!(err.public_message(), "internal server error");
        assert_eq!(BotError::NotFound("user").public_message(), "user not found");
    }

    #[test]
    fn envelope_shape() {
        let value = envelope("PR_MERGED", "cannot reassign on merged PR");
        assert_eq!(value["error"]["code"], "PR_MERGED");
        assert_eq!(value["error"]["message"], "cannot reassign on merged PR");
    }
}
