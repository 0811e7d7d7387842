//! HTTP route table.

use axum::{
  routing::{get, post},
  Router,
};
use tower_http::trace::TraceLayer;

use crate::auth;
use crate::handlers::{
  self, calculate, calculations, coefficients, export, materials, migrations, operations,
  product_types, support, units, users,
};
use crate::state::AppState;

/// Build the application router with every `/api` endpoint
pub fn router(state: AppState) -> Router {
  Router::new()
    .route("/health", get(handlers::health))
    // Auth
    .route("/api/auth", get(auth::status))
    .route("/api/auth/login", post(auth::login))
    .route("/api/auth/register", post(auth::register))
    .route("/api/auth/logout", post(auth::logout))
    .route("/api/profile", get(auth::profile).put(auth::update_profile))
    // Reference data
    .route("/api/materials", get(materials::list).post(materials::create))
    .route(
      "/api/materials/{id}",
      get(materials::get).put(materials::update).delete(materials::delete),
    )
    .route("/api/units", get(units::list).post(units::create))
    .route(
      "/api/units/{id}",
      get(units::get).put(units::update).delete(units::delete),
    )
    .route("/api/operations", get(operations::list).post(operations::create))
    .route(
      "/api/operations/{id}",
      get(operations::get).put(operations::update).delete(operations::delete),
    )
    .route("/api/coefficients", get(coefficients::list).post(coefficients::create))
    .route(
      "/api/coefficients/{id}",
      get(coefficients::get).put(coefficients::update).delete(coefficients::delete),
    )
    .route("/api/product-types", get(product_types::list).post(product_types::create))
    .route(
      "/api/product-types/{id}",
      get(product_types::get).put(product_types::update).delete(product_types::delete),
    )
    // Calculator and saved calculations
    .route("/api/calculate", post(calculate::calculate))
    .route("/api/calculations", get(calculations::list).post(calculations::create))
    .route(
      "/api/calculations/{id}",
      get(calculations::get).put(calculations::update).delete(calculations::delete),
    )
    .route("/api/calculations/{id}/export", get(export::export_calculation))
    // Administration
    .route("/api/users", get(users::list))
    .route(
      "/api/users/{id}",
      get(users::get).put(users::update).delete(users::delete),
    )
    .route("/api/migrations", get(migrations::status).post(migrations::apply))
    // Support chat
    .route("/api/support/chats", get(support::list_chats))
    .route("/api/support/my-chat", get(support::my_chat))
    .route("/api/support/chats/{id}/messages", get(support::messages))
    .route("/api/support/chats/{id}/poll", get(support::poll))
    .route("/api/support/messages", post(support::send))
    .route("/api/support/unread-count", get(support::unread_count))
    .route("/api/support/mark-read", post(support::mark_read))
    .route("/api/support/attachments/{id}", get(support::attachment))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}
