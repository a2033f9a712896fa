use axum::{
    extract::{Path, State},
    routing::{delete, get, put},
    Json, Router,
};
use serde_json::{json, Value};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{handlers::load_user, repo::UserRepo, AuthUser},
    error::AppError,
    profiles::{
        dto::{EducationRequest, ExperienceRequest, ProfileRequest},
        github::is_valid_username,
        repo::ProfileRepo,
        repo_types::{Education, Experience, Profile, ProfileFields, Social},
    },
    state::AppState,
    validation::{clean, normalize_url, parse_id, AppJson, Validator},
};

const NO_PROFILE: &str = "There is no profile for this user";
const NO_GITHUB: &str = "No github profile found";

pub fn profile_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/profile",
            get(list_profiles).post(upsert_profile).delete(delete_account),
        )
        .route("/profile/me", get(my_profile))
        .route("/profile/user/:user_id", get(profile_by_user))
        .route("/profile/github/:username", get(github_repos))
}

pub fn credential_routes() -> Router<AppState> {
    Router::new()
        .route("/profile/experience", put(add_experience))
        .route("/profile/experience/:exp_id", delete(delete_experience))
        .route("/profile/education", put(add_education))
        .route("/profile/education/:edu_id", delete(delete_education))
}

#[instrument(skip(state))]
pub async fn list_profiles(State(state): State<AppState>) -> Result<Json<Vec<Profile>>, AppError> {
    Ok(Json(state.store.list_profiles().await?))
}

#[instrument(skip(state))]
pub async fn my_profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Profile>, AppError> {
    state
        .store
        .find_profile_by_user(user_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found(NO_PROFILE))
}

#[instrument(skip(state))]
pub async fn profile_by_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Profile>, AppError> {
    let user_id = parse_id(&user_id, "Profile not found")?;
    state
        .store
        .find_profile_by_user(user_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("Profile not found"))
}

fn profile_fields(req: ProfileRequest) -> Result<ProfileFields, AppError> {
    let skills = req.skills.map(|s| s.into_skills()).unwrap_or_default();

    let mut v = Validator::new();
    v.require("status", &req.status, "Status is required")
        .check("skills", !skills.is_empty(), "Skills is required");
    v.finish()?;

    Ok(ProfileFields {
        company: clean(req.company),
        website: normalize_url(req.website),
        location: clean(req.location),
        status: clean(req.status).unwrap_or_default(),
        skills,
        bio: clean(req.bio),
        githubusername: clean(req.githubusername),
        social: Social {
            youtube: normalize_url(req.youtube),
            twitter: normalize_url(req.twitter),
            facebook: normalize_url(req.facebook),
            linkedin: normalize_url(req.linkedin),
            instagram: normalize_url(req.instagram),
        },
    })
}

#[instrument(skip(state, payload))]
pub async fn upsert_profile(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(payload): AppJson<ProfileRequest>,
) -> Result<Json<Profile>, AppError> {
    let fields = profile_fields(payload)?;
    let owner = load_user(&state, user).await?;
    let profile = state.store.upsert_profile(owner.id, fields).await?;
    info!(user_id = %owner.id, profile_id = %profile.id, "profile saved");
    Ok(Json(profile))
}

/// Deletes the caller's account: user, profile, posts, and the likes and
/// comments they left.
#[instrument(skip(state))]
pub async fn delete_account(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Value>, AppError> {
    if !state.store.delete_user(user_id).await? {
        return Err(AppError::not_found("User not found"));
    }
    info!(user_id = %user_id, "account deleted");
    Ok(Json(json!({ "msg": "User deleted" })))
}

fn experience_entry(req: ExperienceRequest) -> Result<Experience, AppError> {
    let mut v = Validator::new();
    v.require("title", &req.title, "Title is required")
        .require("company", &req.company, "Company is required")
        .require("from", &req.from, "From date is required");
    let from = v.date("from", &req.from, "From date must be a valid date");
    let to = v.date("to", &req.to, "To date must be a valid date");
    v.finish()?;

    Ok(Experience {
        id: Uuid::new_v4(),
        title: clean(req.title).unwrap_or_default(),
        company: clean(req.company).unwrap_or_default(),
        location: clean(req.location),
        from: from.ok_or_else(|| AppError::bad_request("From date is required"))?,
        to,
        current: req.current.unwrap_or(false),
        description: clean(req.description),
    })
}

fn education_entry(req: EducationRequest) -> Result<Education, AppError> {
    let mut v = Validator::new();
    v.require("school", &req.school, "School is required")
        .require("degree", &req.degree, "Degree is required")
        .require("fieldofstudy", &req.fieldofstudy, "Field of study is required")
        .require("from", &req.from, "From date is required");
    let from = v.date("from", &req.from, "From date must be a valid date");
    let to = v.date("to", &req.to, "To date must be a valid date");
    v.finish()?;

    Ok(Education {
        id: Uuid::new_v4(),
        school: clean(req.school).unwrap_or_default(),
        degree: clean(req.degree).unwrap_or_default(),
        fieldofstudy: clean(req.fieldofstudy).unwrap_or_default(),
        from: from.ok_or_else(|| AppError::bad_request("From date is required"))?,
        to,
        current: req.current.unwrap_or(false),
        description: clean(req.description),
    })
}

#[instrument(skip(state, payload))]
pub async fn add_experience(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppJson(payload): AppJson<ExperienceRequest>,
) -> Result<Json<Profile>, AppError> {
    let entry = experience_entry(payload)?;
    let entry_id = entry.id;
    let profile = state
        .store
        .push_experience(user_id, entry)
        .await?
        .ok_or_else(|| AppError::not_found(NO_PROFILE))?;
    info!(user_id = %user_id, experience_id = %entry_id, "experience added");
    Ok(Json(profile))
}

#[instrument(skip(state))]
pub async fn delete_experience(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(exp_id): Path<String>,
) -> Result<Json<Profile>, AppError> {
    let exp_id = parse_id(&exp_id, "Experience not found")?;
    let profile = state
        .store
        .find_profile_by_user(user_id)
        .await?
        .ok_or_else(|| AppError::not_found(NO_PROFILE))?;
    // entries are looked up in the caller's own profile only
    if !profile.experience.iter().any(|e| e.id == exp_id) {
        warn!(user_id = %user_id, experience_id = %exp_id, "experience not found");
        return Err(AppError::not_found("Experience not found"));
    }
    let profile = state
        .store
        .remove_experience(user_id, exp_id)
        .await?
        .ok_or_else(|| AppError::not_found(NO_PROFILE))?;
    info!(user_id = %user_id, experience_id = %exp_id, "experience removed");
    Ok(Json(profile))
}

#[instrument(skip(state, payload))]
pub async fn add_education(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    AppJson(payload): AppJson<EducationRequest>,
) -> Result<Json<Profile>, AppError> {
    let entry = education_entry(payload)?;
    let entry_id = entry.id;
    let profile = state
        .store
        .push_education(user_id, entry)
        .await?
        .ok_or_else(|| AppError::not_found(NO_PROFILE))?;
    info!(user_id = %user_id, education_id = %entry_id, "education added");
    Ok(Json(profile))
}

#[instrument(skip(state))]
pub async fn delete_education(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(edu_id): Path<String>,
) -> Result<Json<Profile>, AppError> {
    let edu_id = parse_id(&edu_id, "Education not found")?;
    let profile = state
        .store
        .find_profile_by_user(user_id)
        .await?
        .ok_or_else(|| AppError::not_found(NO_PROFILE))?;
    if !profile.education.iter().any(|e| e.id == edu_id) {
        warn!(user_id = %user_id, education_id = %edu_id, "education not found");
        return Err(AppError::not_found("Education not found"));
    }
    let profile = state
        .store
        .remove_education(user_id, edu_id)
        .await?
        .ok_or_else(|| AppError::not_found(NO_PROFILE))?;
    info!(user_id = %user_id, education_id = %edu_id, "education removed");
    Ok(Json(profile))
}

#[instrument(skip(state))]
pub async fn github_repos(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<Value>, AppError> {
    if !is_valid_username(&username) {
        return Err(AppError::not_found(NO_GITHUB));
    }
    state
        .github
        .latest_repos(&username)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found(NO_GITHUB))
}
