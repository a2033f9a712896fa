use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

time::serde::format_description!(iso_date, Date, "[year]-[month]-[day]");

/// Name and avatar of the user a profile belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileOwner {
    pub id: Uuid,
    pub name: String,
    pub avatar: String,
}

/// Provider -> URL links. Stored as a single JSON document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Social {
    pub youtube: Option<String>,
    pub twitter: Option<String>,
    pub facebook: Option<String>,
    pub linkedin: Option<String>,
    pub instagram: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Experience {
    pub id: Uuid,
    pub title: String,
    pub company: String,
    pub location: Option<String>,
    #[serde(with = "iso_date")]
    #[sqlx(rename = "from_date")]
    pub from: Date,
    #[serde(with = "iso_date::option", default)]
    #[sqlx(rename = "to_date")]
    pub to: Option<Date>,
    #[sqlx(rename = "is_current")]
    pub current: bool,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Education {
    pub id: Uuid,
    pub school: String,
    pub degree: String,
    pub fieldofstudy: String,
    #[serde(with = "iso_date")]
    #[sqlx(rename = "from_date")]
    pub from: Date,
    #[serde(with = "iso_date::option", default)]
    #[sqlx(rename = "to_date")]
    pub to: Option<Date>,
    #[sqlx(rename = "is_current")]
    pub current: bool,
    pub description: Option<String>,
}

/// A user's profile, always returned with its owner populated.
/// `experience` and `education` are newest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub user: ProfileOwner,
    pub company: Option<String>,
    pub website: Option<String>,
    pub location: Option<String>,
    pub status: String,
    pub skills: Vec<String>,
    pub bio: Option<String>,
    pub githubusername: Option<String>,
    pub social: Social,
    pub experience: Vec<Experience>,
    pub education: Vec<Education>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Editable profile fields; an upsert replaces all of them.
#[derive(Debug, Clone, Default)]
pub struct ProfileFields {
    pub company: Option<String>,
    pub website: Option<String>,
    pub location: Option<String>,
    pub status: String,
    pub skills: Vec<String>,
    pub bio: Option<String>,
    pub githubusername: Option<String>,
    pub social: Social,
}
