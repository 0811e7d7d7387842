//! Support chat between users and staff (admins and the super admin).

use axum::{
  extract::{Path, Query, State},
  http::header,
  response::{IntoResponse, Response},
  Json,
};
use rusqlite::Connection;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::{Component, Path as FsPath, PathBuf};
use std::time::Duration;
use tokio::time::Instant;

use crate::auth::db as auth_db;
use crate::auth::AuthContext;
use crate::db::support::{self, ChatSummary, Message, SupportChat};
use crate::db::try_lock;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct MessagesQuery {
  #[serde(default)]
  pub last_message_id: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PollQuery {
  #[serde(default)]
  pub last_message_id: Option<i64>,
  /// Seconds; capped by configuration
  #[serde(default)]
  pub timeout: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SendRequest {
  #[serde(default)]
  pub chat_id: Option<i64>,
  /// Staff only: write to this user's chat
  #[serde(default)]
  pub user_id: Option<i64>,
  #[serde(default)]
  pub message: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct UnreadQuery {
  #[serde(default)]
  pub user_id: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MarkReadRequest {
  #[serde(default)]
  pub chat_id: Option<i64>,
  #[serde(default)]
  pub user_id: Option<i64>,
}

/// Load a chat the caller may see: staff see all, users only their own
fn open_chat(conn: &Connection, auth: &AuthContext, chat_id: i64) -> ApiResult<SupportChat> {
  let chat = support::get_chat(conn, chat_id)?.ok_or_else(|| ApiError::not_found("Chat not found"))?;
  if !auth.is_support() && chat.user_id != auth.user_id {
    return Err(ApiError::forbidden("No access to this chat"));
  }
  Ok(chat)
}

/// GET /api/support/chats
pub async fn list_chats(
  State(state): State<AppState>,
  auth: AuthContext,
) -> ApiResult<Json<Vec<ChatSummary>>> {
  if !auth.is_support() {
    return Err(ApiError::forbidden("Insufficient permissions"));
  }
  let conn = try_lock(&state.db)?;
  Ok(Json(support::list_chats_for_support(&conn, auth.user_id)?))
}

/// GET /api/support/my-chat
pub async fn my_chat(State(state): State<AppState>, auth: AuthContext) -> ApiResult<Json<SupportChat>> {
  let conn = try_lock(&state.db)?;
  Ok(Json(support::get_or_create_chat(&conn, auth.user_id)?))
}

/// GET /api/support/chats/{id}/messages
pub async fn messages(
  State(state): State<AppState>,
  auth: AuthContext,
  Path(chat_id): Path<i64>,
  Query(query): Query<MessagesQuery>,
) -> ApiResult<Json<Vec<Message>>> {
  let conn = try_lock(&state.db)?;
  let chat = open_chat(&conn, &auth, chat_id)?;

  if auth.is_support()
    && chat.support_user_id.is_none()
    && support::assign_support(&conn, chat.id, auth.user_id)?
  {
    tracing::info!("Chat {} assigned to {}", chat.id, auth.username);
  }

  let after = query.last_message_id.filter(|id| *id > 0);
  Ok(Json(support::get_messages(&conn, chat.id, after)?))
}

/// GET /api/support/chats/{id}/poll
///
/// Waits until messages newer than `last_message_id` exist or the timeout
/// runs out. The database lock is only held while checking.
pub async fn poll(
  State(state): State<AppState>,
  auth: AuthContext,
  Path(chat_id): Path<i64>,
  Query(query): Query<PollQuery>,
) -> ApiResult<Json<Vec<Message>>> {
  let after = query.last_message_id.unwrap_or(0).max(0);
  let max_wait = state.settings.long_poll_timeout_secs;
  let wait = Duration::from_secs(query.timeout.unwrap_or(max_wait).min(max_wait));
  let interval = Duration::from_millis(state.settings.long_poll_interval_ms.max(1));
  let deadline = Instant::now() + wait;

  {
    let conn = try_lock(&state.db)?;
    open_chat(&conn, &auth, chat_id)?;
  }

  loop {
    {
      let conn = try_lock(&state.db)?;
      if support::has_messages_after(&conn, chat_id, after)? {
        return Ok(Json(support::get_messages(&conn, chat_id, Some(after))?));
      }
    }
    if Instant::now() >= deadline {
      return Ok(Json(Vec::new()));
    }
    tokio::time::sleep(interval.min(deadline.saturating_duration_since(Instant::now()))).await;
  }
}

/// Pick the chat a message goes to
fn target_chat(conn: &Connection, auth: &AuthContext, request: &SendRequest) -> ApiResult<SupportChat> {
  if auth.is_support() {
    if let Some(user_id) = request.user_id {
      if auth_db::get_user(conn, user_id)?.is_none() {
        return Err(ApiError::not_found("User not found"));
      }
      let chat = support::get_or_create_chat(conn, user_id)?;
      if chat.support_user_id.is_none() {
        support::assign_support(conn, chat.id, auth.user_id)?;
      }
      return Ok(chat);
    }
  } else if request.chat_id.is_none() {
    return Ok(support::get_or_create_chat(conn, auth.user_id)?);
  }

  let chat_id = request
    .chat_id
    .ok_or_else(|| ApiError::validation("Chat is required"))?;
  open_chat(conn, auth, chat_id)
}

/// POST /api/support/messages
pub async fn send(
  State(state): State<AppState>,
  auth: AuthContext,
  Json(request): Json<SendRequest>,
) -> ApiResult<Json<Value>> {
  let text = request.message.trim();
  if text.is_empty() {
    return Err(ApiError::validation("Message cannot be empty"));
  }

  let conn = try_lock(&state.db)?;
  let chat = target_chat(&conn, &auth, &request)?;
  let message_id = support::send_message(&conn, chat.id, auth.user_id, text, auth.is_support())?;

  tracing::debug!("{} posted message {} in chat {}", auth.username, message_id, chat.id);
  Ok(Json(json!({ "success": true, "message_id": message_id })))
}

/// GET /api/support/unread-count
pub async fn unread_count(
  State(state): State<AppState>,
  auth: AuthContext,
  Query(query): Query<UnreadQuery>,
) -> ApiResult<Json<Value>> {
  let conn = try_lock(&state.db)?;
  let count = match (auth.is_support(), query.user_id) {
    (true, Some(user_id)) => support::unread_from_user(&conn, user_id)?,
    (true, None) => support::unread_for_support(&conn, auth.user_id)?,
    (false, _) => support::unread_for_user(&conn, auth.user_id)?,
  };
  Ok(Json(json!({ "count": count })))
}

/// POST /api/support/mark-read
pub async fn mark_read(
  State(state): State<AppState>,
  auth: AuthContext,
  Json(request): Json<MarkReadRequest>,
) -> ApiResult<Json<Value>> {
  let conn = try_lock(&state.db)?;

  let chat_id = match (auth.is_support(), request.user_id, request.chat_id) {
    (true, Some(user_id), _) => support::get_user_chat(&conn, user_id)?
      .map(|chat| chat.id)
      .ok_or_else(|| ApiError::validation("Chat is required"))?,
    (_, _, Some(chat_id)) => open_chat(&conn, &auth, chat_id)?.id,
    (_, _, None) => support::get_or_create_chat(&conn, auth.user_id)?.id,
  };

  support::mark_read(&conn, chat_id, auth.user_id)?;
  Ok(Json(json!({ "success": true })))
}

/// Resolve a stored attachment path inside the uploads directory
fn attachment_path(uploads_dir: &FsPath, stored: &str) -> Option<PathBuf> {
  let relative = FsPath::new(stored);
  let safe = relative
    .components()
    .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
  safe.then(|| uploads_dir.join(relative))
}

/// GET /api/support/attachments/{id}
pub async fn attachment(
  State(state): State<AppState>,
  auth: AuthContext,
  Path(attachment_id): Path<i64>,
) -> ApiResult<Response> {
  let record = {
    let conn = try_lock(&state.db)?;
    support::get_attachment(&conn, attachment_id)?
      .ok_or_else(|| ApiError::not_found("Attachment not found"))?
  };
  if !auth.is_support() && record.chat_user_id != auth.user_id {
    return Err(ApiError::forbidden("No access to this file"));
  }

  let attachment = record.attachment;
  let path = attachment_path(&state.settings.uploads_dir, &attachment.file_path)
    .ok_or_else(|| ApiError::not_found("File not found"))?;
  let bytes = match tokio::fs::read(&path).await {
    Ok(bytes) => bytes,
    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
      tracing::warn!("Attachment {} is missing on disk: {}", attachment.id, path.display());
      return Err(ApiError::not_found("File not found"));
    }
    Err(e) => return Err(e.into()),
  };

  let disposition = format!(
    "attachment; filename*=UTF-8''{}",
    urlencoding::encode(&attachment.filename)
  );
  Ok(
    (
      [
        (header::CONTENT_TYPE, attachment.mime_type),
        (header::CONTENT_DISPOSITION, disposition),
      ],
      bytes,
    )
      .into_response(),
  )
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_attachment_path_stays_inside_uploads() {
    let root = FsPath::new("/data/uploads");
    assert_eq!(
      attachment_path(root, "support/3/file.pdf"),
      Some(PathBuf::from("/data/uploads/support/3/file.pdf"))
    );
    assert_eq!(attachment_path(root, "../secret.txt"), None);
    assert_eq!(attachment_path(root, "/etc/passwd"), None);
  }
}
