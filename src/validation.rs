//! Request-input helpers shared by the handlers: a JSON extractor whose
//! rejections are [`AppError`]s, a collecting validator and a few
//! normalizers.

use axum::extract::FromRequest;
use lazy_static::lazy_static;
use regex::Regex;
use time::{macros::format_description, Date};
use uuid::Uuid;

use crate::error::{AppError, FieldError};

/// `axum::Json` with malformed bodies reported as validation errors.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

pub fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// `Some` and non-blank.
pub fn present(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}

/// Trims, and maps blank to `None`.
pub fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Collects every failed check so the client sees all of them at once.
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<FieldError>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check(&mut self, param: &str, ok: bool, msg: &str) -> &mut Self {
        if !ok {
            self.errors.push(FieldError::new(param, msg));
        }
        self
    }

    pub fn require(&mut self, param: &str, value: &Option<String>, msg: &str) -> &mut Self {
        self.check(param, present(value), msg)
    }

    /// Parses an optional date field, recording `msg` when it is present
    /// but not a date.
    pub fn date(&mut self, param: &str, value: &Option<String>, msg: &str) -> Option<Date> {
        let raw = value.as_deref().map(str::trim).filter(|v| !v.is_empty())?;
        let parsed = parse_date(raw);
        if parsed.is_none() {
            self.errors.push(FieldError::new(param, msg));
        }
        parsed
    }

    pub fn finish(self) -> Result<(), AppError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(self.errors))
        }
    }
}

/// Accepts `YYYY-MM-DD`, or a longer ISO timestamp whose first ten
/// characters are one.
pub fn parse_date(raw: &str) -> Option<Date> {
    let day = raw.get(..10).unwrap_or(raw);
    Date::parse(day, format_description!("[year]-[month]-[day]")).ok()
}

/// Forces `https://` onto a link; blank links are dropped.
pub fn normalize_url(raw: Option<String>) -> Option<String> {
    let raw = clean(raw)?;
    let rest = raw
        .strip_prefix("https://")
        .or_else(|| raw.strip_prefix("http://"))
        .unwrap_or(&raw)
        .trim_end_matches('/');
    if rest.is_empty() {
        return None;
    }
    Some(format!("https://{rest}"))
}

/// Path ids that are not UUIDs cannot name anything, so they are 404s.
pub fn parse_id(raw: &str, not_found: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::not_found(not_found))
}
