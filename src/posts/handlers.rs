use axum::{
    extract::{Path, State},
    routing::{delete, get, post, put},
    Json, Router,
};
use serde_json::{json, Value};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{handlers::load_user, AuthUser},
    error::AppError,
    posts::{
        dto::TextRequest,
        repo::PostRepo,
        repo_types::{Comment, Like, LikeChange, NewComment, NewPost, Post},
    },
    state::AppState,
    validation::{clean, parse_id, AppJson, Validator},
};

const POST_NOT_FOUND: &str = "Post not found";

pub fn post_routes() -> Router<AppState> {
    Router::new()
        .route("/posts", get(list_posts).post(create_post))
        .route("/posts/:id", get(get_post).delete(delete_post))
}

pub fn reaction_routes() -> Router<AppState> {
    Router::new()
        .route("/posts/like/:id", put(like_post))
        .route("/posts/unlike/:id", put(unlike_post))
        .route("/posts/comment/:id", post(add_comment))
        .route("/posts/comment/:id/:comment_id", delete(delete_comment))
}

fn post_id(raw: &str) -> Result<Uuid, AppError> {
    parse_id(raw, POST_NOT_FOUND)
}

fn required_text(req: TextRequest) -> Result<String, AppError> {
    let mut v = Validator::new();
    v.require("text", &req.text, "Text is required");
    v.finish()?;
    Ok(clean(req.text).unwrap_or_default())
}

#[instrument(skip(state, payload))]
pub async fn create_post(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(payload): AppJson<TextRequest>,
) -> Result<Json<Post>, AppError> {
    let text = required_text(payload)?;
    let author = load_user(&state, user).await?;
    let post = state
        .store
        .create_post(NewPost {
            user: author.id,
            text,
            name: author.name,
            avatar: author.avatar,
        })
        .await?;
    info!(user_id = %post.user, post_id = %post.id, "post created");
    Ok(Json(post))
}

#[instrument(skip(state))]
pub async fn list_posts(
    State(state): State<AppState>,
    _user: AuthUser,
) -> Result<Json<Vec<Post>>, AppError> {
    Ok(Json(state.store.list_posts().await?))
}

#[instrument(skip(state))]
pub async fn get_post(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Post>, AppError> {
    let id = post_id(&id)?;
    state
        .store
        .find_post(id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found(POST_NOT_FOUND))
}

#[instrument(skip(state))]
pub async fn delete_post(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let id = post_id(&id)?;
    let post = state
        .store
        .find_post(id)
        .await?
        .ok_or_else(|| AppError::not_found(POST_NOT_FOUND))?;
    user.ensure_owner(post.user, "User not authorized to delete this post")?;

    if !state.store.delete_post(id).await? {
        return Err(AppError::not_found(POST_NOT_FOUND));
    }
    info!(user_id = %user.id(), post_id = %id, "post removed");
    Ok(Json(json!({ "msg": "Post removed" })))
}

#[instrument(skip(state))]
pub async fn like_post(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Vec<Like>>, AppError> {
    let id = post_id(&id)?;
    let user_id = load_user(&state, user).await?.id;
    match state.store.add_like(id, user_id).await? {
        LikeChange::Updated(likes) => {
            info!(user_id = %user_id, post_id = %id, "post liked");
            Ok(Json(likes))
        }
        LikeChange::Unchanged => {
            warn!(user_id = %user_id, post_id = %id, "post already liked");
            Err(AppError::bad_request("Post already liked."))
        }
        LikeChange::PostMissing => Err(AppError::not_found(POST_NOT_FOUND)),
    }
}

#[instrument(skip(state))]
pub async fn unlike_post(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<Vec<Like>>, AppError> {
    let id = post_id(&id)?;
    let user_id = load_user(&state, user).await?.id;
    match state.store.remove_like(id, user_id).await? {
        LikeChange::Updated(likes) => {
            info!(user_id = %user_id, post_id = %id, "post unliked");
            Ok(Json(likes))
        }
        LikeChange::Unchanged => {
            warn!(user_id = %user_id, post_id = %id, "post not liked");
            Err(AppError::bad_request("Post has not yet been liked."))
        }
        LikeChange::PostMissing => Err(AppError::not_found(POST_NOT_FOUND)),
    }
}

#[instrument(skip(state, payload))]
pub async fn add_comment(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
    AppJson(payload): AppJson<TextRequest>,
) -> Result<Json<Vec<Comment>>, AppError> {
    let id = post_id(&id)?;
    let text = required_text(payload)?;
    let author = load_user(&state, user).await?;
    let comments = state
        .store
        .add_comment(
            id,
            NewComment {
                user: author.id,
                text,
                name: author.name,
                avatar: author.avatar,
            },
        )
        .await?
        .ok_or_else(|| AppError::not_found(POST_NOT_FOUND))?;
    info!(user_id = %author.id, post_id = %id, "comment added");
    Ok(Json(comments))
}

#[instrument(skip(state))]
pub async fn delete_comment(
    State(state): State<AppState>,
    user: AuthUser,
    Path((id, comment_id)): Path<(String, String)>,
) -> Result<Json<Vec<Comment>>, AppError> {
    let id = post_id(&id)?;
    let comment_id = parse_id(&comment_id, "Comment does not exist")?;
    let post = state
        .store
        .find_post(id)
        .await?
        .ok_or_else(|| AppError::not_found(POST_NOT_FOUND))?;

    // exact id match; a missing comment is a 404, never "some other comment"
    let comment = post
        .comments
        .iter()
        .find(|c| c.id == comment_id)
        .ok_or_else(|| AppError::not_found("Comment does not exist"))?;
    user.ensure_owner(comment.user, "User not authorized to delete this comment")?;

    let comments = state
        .store
        .remove_comment(id, comment_id)
        .await?
        .ok_or_else(|| AppError::not_found(POST_NOT_FOUND))?;
    info!(user_id = %user.id(), post_id = %id, comment_id = %comment_id, "comment removed");
    Ok(Json(comments))
}
