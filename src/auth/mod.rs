use crate::state::AppState;
use axum::Router;

pub mod claims;
pub mod extractors;
pub mod handlers;
pub mod jwt;
pub mod repo_types;

pub use extractors::AuthUser;

pub fn router() -> Router<AppState> {
    Router::new().merge(handlers::me_routes())
}
