use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument, warn};

use crate::{
    error::ApiError,
    state::AppState,
    users::dto::{
        CreateUserRequest, CreatedUser, LoginRequest, LoginResponse, PublicUser, SearchParams,
        StatusMessage, UpdateUserRequest,
    },
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(home))
        .route("/users", get(list_users).post(create_user))
        .route(
            "/user/:id",
            get(get_user).put(update_user).delete(delete_user),
        )
        .route("/search", get(search_users))
        .route("/login", post(login))
}

/// Required-field check; empty strings count as missing.
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

async fn home() -> Json<StatusMessage> {
    Json(StatusMessage {
        status: "success",
        message: "User Management System is running.".into(),
    })
}

#[instrument(skip(state))]
async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<PublicUser>>, ApiError> {
    let users = state.store.list_users().await?;
    Ok(Json(users.into_iter().map(PublicUser::from).collect()))
}

#[instrument(skip(state))]
async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<PublicUser>, ApiError> {
    let user = state.store.get_user(id).await?;
    Ok(Json(user.into()))
}

#[instrument(skip(state, payload))]
async fn create_user(
    State(state): State<AppState>,
    payload: Option<Json<CreateUserRequest>>,
) -> Result<(StatusCode, Json<CreatedUser>), ApiError> {
    let fields = payload.map(|Json(p)| {
        (
            non_empty(p.name),
            non_empty(p.email),
            non_empty(p.password),
        )
    });
    let Some((Some(name), Some(email), Some(password))) = fields else {
        warn!("create user request with missing fields");
        return Err(ApiError::Validation("Missing name, email, or password".into()));
    };

    let user_id = state.store.create_user(&name, &email, &password).await?;
    info!(user_id, email = %email, "user created");
    Ok((
        StatusCode::CREATED,
        Json(CreatedUser {
            status: "success",
            message: "User created".into(),
            user_id,
        }),
    ))
}

#[instrument(skip(state, payload))]
async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    payload: Option<Json<UpdateUserRequest>>,
) -> Result<Json<StatusMessage>, ApiError> {
    let (name, email) = match payload {
        Some(Json(p)) => (non_empty(p.name), non_empty(p.email)),
        None => (None, None),
    };
    if name.is_none() && email.is_none() {
        warn!(id, "update request without any field");
        return Err(ApiError::Validation(
            "Invalid data; requires 'name' or 'email' field".into(),
        ));
    }

    state
        .store
        .update_user(id, name.as_deref(), email.as_deref())
        .await?;
    info!(id, "user updated");
    Ok(Json(StatusMessage {
        status: "success",
        message: format!("User {id} updated"),
    }))
}

#[instrument(skip(state))]
async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.store.delete_user(id).await?;
    info!(id, "user deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
async fn search_users(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<PublicUser>>, ApiError> {
    let Some(name) = non_empty(params.name) else {
        return Err(ApiError::Validation(
            "Please provide a 'name' query parameter.".into(),
        ));
    };
    let users = state.store.search_users(&name).await?;
    Ok(Json(users.into_iter().map(PublicUser::from).collect()))
}

#[instrument(skip(state, payload))]
async fn login(
    State(state): State<AppState>,
    payload: Option<Json<LoginRequest>>,
) -> Result<Json<LoginResponse>, ApiError> {
    let fields = payload.map(|Json(p)| (non_empty(p.email), non_empty(p.password)));
    let Some((Some(email), Some(password))) = fields else {
        warn!("login request with missing fields");
        return Err(ApiError::Validation("Missing email or password".into()));
    };

    let user = state.store.verify_credentials(&email, &password).await?;
    info!(user_id = user.id, "user logged in");
    Ok(Json(LoginResponse {
        status: "success",
        user_id: user.id,
    }))
}
