//! User administration for admins and the super admin.

use axum::{
  extract::{Path, State},
  Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::db::{self as auth_db, User};
use crate::auth::handlers::identity_changes;
use crate::auth::AuthContext;
use crate::db::try_lock;
use crate::domain::Role;
use crate::error::{ApiError, ApiResult};
use crate::handlers::double_option;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct UserUpdate {
  #[serde(default)]
  pub username: Option<String>,
  #[serde(default)]
  pub email: Option<String>,
  #[serde(default, deserialize_with = "double_option")]
  pub first_name: Option<Option<String>>,
  #[serde(default, deserialize_with = "double_option")]
  pub last_name: Option<Option<String>>,
  #[serde(default)]
  pub role: Option<String>,
}

/// What a role edit amounts to once the permission rules are applied
#[derive(Debug, PartialEq)]
enum RoleChange {
  Keep,
  Set(Role),
  /// Grant super_admin and demote the caller
  Transfer,
}

fn role_change(caller: &AuthContext, target: &User, requested: Option<Role>) -> ApiResult<RoleChange> {
  let is_self = caller.user_id == target.id;

  if target.role == Role::SuperAdmin {
    if !caller.role.is_super_admin() {
      return Err(ApiError::forbidden("Only the super administrator can manage a super administrator"));
    }
    return match requested {
      None | Some(Role::SuperAdmin) => Ok(RoleChange::Keep),
      Some(_) if is_self => Err(ApiError::validation(
        "The super administrator role can only be transferred to another user",
      )),
      Some(_) => Err(ApiError::forbidden(
        "The super administrator role can only be transferred, not changed",
      )),
    };
  }

  match requested {
    None => Ok(RoleChange::Keep),
    Some(Role::SuperAdmin) if !caller.role.is_super_admin() => Err(ApiError::forbidden(
      "Only the super administrator can grant the super administrator role",
    )),
    Some(Role::SuperAdmin) => Ok(RoleChange::Transfer),
    Some(role) if role == target.role => Ok(RoleChange::Keep),
    Some(role) => Ok(RoleChange::Set(role)),
  }
}

fn load_target(conn: &rusqlite::Connection, caller: &AuthContext, id: i64) -> ApiResult<User> {
  let user = auth_db::get_user(conn, id)?.ok_or_else(|| ApiError::not_found("User not found"))?;
  if user.role == Role::SuperAdmin && !caller.role.is_super_admin() {
    return Err(ApiError::forbidden("Insufficient permissions"));
  }
  Ok(user)
}

/// GET /api/users
pub async fn list(State(state): State<AppState>, auth: AuthContext) -> ApiResult<Json<Vec<User>>> {
  auth.require_admin()?;
  let conn = try_lock(&state.db)?;
  Ok(Json(auth_db::list_users(&conn, auth.role.is_super_admin())?))
}

/// GET /api/users/{id}
pub async fn get(
  State(state): State<AppState>,
  auth: AuthContext,
  Path(id): Path<i64>,
) -> ApiResult<Json<User>> {
  auth.require_admin()?;
  let conn = try_lock(&state.db)?;
  Ok(Json(load_target(&conn, &auth, id)?))
}

/// PUT /api/users/{id}
pub async fn update(
  State(state): State<AppState>,
  auth: AuthContext,
  Path(id): Path<i64>,
  Json(form): Json<UserUpdate>,
) -> ApiResult<Json<User>> {
  auth.require_admin()?;

  let requested = match form.role.as_deref() {
    Some(name) => Some(Role::from_str(name).ok_or_else(|| ApiError::validation("Invalid role"))?),
    None => None,
  };

  let conn = try_lock(&state.db)?;
  let target = auth_db::get_user(&conn, id)?.ok_or_else(|| ApiError::not_found("User not found"))?;
  let change = role_change(&auth, &target, requested)?;

  let mut changes = identity_changes(
    &conn,
    id,
    form.username,
    form.email,
    form.first_name,
    form.last_name,
  )?;

  match change {
    RoleChange::Transfer => {
      auth_db::transfer_super_admin(&conn, auth.user_id, id, &changes)?;
    }
    other => {
      if let RoleChange::Set(role) = other {
        changes.role = Some(role);
      }
      if changes.is_empty() {
        return Err(ApiError::validation("Nothing to update"));
      }
      auth_db::update_user(&conn, id, &changes)?;
      if let Some(role) = changes.role {
        tracing::info!("{} set role of user {} to {}", auth.username, id, role);
      }
    }
  }

  let user = auth_db::get_user(&conn, id)?.ok_or_else(|| ApiError::not_found("User not found"))?;
  Ok(Json(user))
}

/// DELETE /api/users/{id}
pub async fn delete(
  State(state): State<AppState>,
  auth: AuthContext,
  Path(id): Path<i64>,
) -> ApiResult<Json<Value>> {
  auth.require_admin()?;
  let conn = try_lock(&state.db)?;

  let target = auth_db::get_user(&conn, id)?.ok_or_else(|| ApiError::not_found("User not found"))?;
  if target.role == Role::SuperAdmin {
    return Err(ApiError::forbidden("The super administrator cannot be deleted"));
  }
  if target.id == auth.user_id {
    return Err(ApiError::validation("You cannot delete your own account"));
  }

  auth_db::delete_user(&conn, id)?;
  tracing::info!("{} deleted user {} ({})", auth.username, id, target.username);
  Ok(Json(json!({ "success": true, "message": "User deleted" })))
}

#[cfg(test)]
mod tests {
  use super::*;

  fn ctx(id: i64, role: Role) -> AuthContext {
    AuthContext {
      user_id: id,
      username: format!("user{}", id),
      role,
    }
  }

  fn user(id: i64, role: Role) -> User {
    User {
      id,
      username: format!("user{}", id),
      email: format!("user{}@example.com", id),
      first_name: None,
      last_name: None,
      role,
      created_at: String::new(),
      updated_at: String::new(),
    }
  }

  #[test]
  fn test_admin_cannot_touch_super_admin() {
    let err = role_change(&ctx(2, Role::Admin), &user(1, Role::SuperAdmin), None).unwrap_err();
    assert!(matches!(err, ApiError::Forbidden(_)));
  }

  #[test]
  fn test_admin_cannot_grant_super_admin() {
    let err = role_change(&ctx(2, Role::Admin), &user(3, Role::User), Some(Role::SuperAdmin)).unwrap_err();
    assert!(matches!(err, ApiError::Forbidden(_)));
  }

  #[test]
  fn test_super_admin_grant_is_transfer() {
    let change = role_change(&ctx(1, Role::SuperAdmin), &user(3, Role::User), Some(Role::SuperAdmin)).unwrap();
    assert_eq!(change, RoleChange::Transfer);
  }

  #[test]
  fn test_super_admin_cannot_demote_self() {
    let me = ctx(1, Role::SuperAdmin);
    let err = role_change(&me, &user(1, Role::SuperAdmin), Some(Role::Admin)).unwrap_err();
    assert!(matches!(err, ApiError::Validation(_)));
    assert_eq!(role_change(&me, &user(1, Role::SuperAdmin), None).unwrap(), RoleChange::Keep);
  }

  #[test]
  fn test_plain_role_changes() {
    let admin = ctx(2, Role::Admin);
    assert_eq!(
      role_change(&admin, &user(3, Role::Guest), Some(Role::User)).unwrap(),
      RoleChange::Set(Role::User)
    );
    assert_eq!(
      role_change(&admin, &user(3, Role::User), Some(Role::User)).unwrap(),
      RoleChange::Keep
    );
  }
}
