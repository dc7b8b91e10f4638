use crate::state::AppState;
use axum::Router;

pub mod dto;
pub mod handlers;
pub mod password;
pub mod store;

pub fn router() -> Router<AppState> {
    handlers::router()
}
