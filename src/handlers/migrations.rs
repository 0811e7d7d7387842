//! SQL migration runner endpoints (super admin only).

use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::AuthContext;
use crate::db::try_lock;
use crate::error::ApiResult;
use crate::services::migrations::{MigrationRunner, MigrationStatus};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ApplyRequest {
  /// Apply only this file; all pending ones when absent
  #[serde(default)]
  pub migration: Option<String>,
}

fn runner(state: &AppState) -> MigrationRunner {
  MigrationRunner::new(state.settings.migrations_dir.clone())
}

/// GET /api/migrations
pub async fn status(State(state): State<AppState>, auth: AuthContext) -> ApiResult<Json<MigrationStatus>> {
  auth.require_super_admin()?;
  let conn = try_lock(&state.db)?;
  Ok(Json(runner(&state).status(&conn)?))
}

/// POST /api/migrations
pub async fn apply(
  State(state): State<AppState>,
  auth: AuthContext,
  Json(request): Json<ApplyRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
  auth.require_super_admin()?;
  let runner = runner(&state);
  let conn = try_lock(&state.db)?;

  match request.migration.filter(|name| !name.trim().is_empty()) {
    Some(name) => {
      runner.apply(&conn, &name)?;
      tracing::info!("{} applied migration {}", auth.username, name);
      Ok((
        StatusCode::OK,
        Json(json!({ "success": true, "message": format!("Migration {} applied", name) })),
      ))
    }
    None => {
      let report = runner.apply_pending(&conn)?;
      tracing::info!("{} applied {} pending migration(s)", auth.username, report.applied.len());
      if report.success {
        Ok((
          StatusCode::OK,
          Json(json!({
            "success": true,
            "applied": report.applied,
            "message": "All pending migrations applied",
          })),
        ))
      } else {
        Ok((
          StatusCode::BAD_REQUEST,
          Json(json!({
            "success": false,
            "applied": report.applied,
            "errors": report.errors,
            "message": "Some migrations could not be applied",
          })),
        ))
      }
    }
  }
}
