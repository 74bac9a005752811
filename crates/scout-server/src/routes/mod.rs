pub mod analyse;

use crate::state::AppState;
use axum::Router;

pub fn configure(state: AppState) -> Router {
    Router::new().merge(analyse::routes(state))
}
