//! Support chat storage: one chat per user, messages and their attachments.
//!
//! "Staff" below means admin and super_admin accounts. Unread counters on
//! the staff side only count messages written by non-staff senders.

use rusqlite::{params, Connection, OptionalExtension, Result, Row};
use serde::Serialize;

/// Roles treated as support staff in SQL filters
const STAFF_ROLES: &str = "('admin', 'super_admin')";

#[derive(Debug, Clone, Serialize)]
pub struct SupportChat {
    pub id: i64,
    pub user_id: i64,
    pub support_user_id: Option<i64>,
    pub last_message_at: Option<String>,
    pub created_at: String,
}

/// Chat row for the staff inbox
#[derive(Debug, Clone, Serialize)]
pub struct ChatSummary {
    pub id: i64,
    pub user_id: i64,
    pub support_user_id: Option<i64>,
    pub last_message_at: Option<String>,
    pub created_at: String,
    pub username: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub unread_count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Attachment {
    pub id: i64,
    pub filename: String,
    pub file_path: String,
    pub file_size: i64,
    pub mime_type: String,
    pub created_at: String,
}

/// Attachment together with the user owning the chat it was posted in
#[derive(Debug, Clone)]
pub struct AttachmentRecord {
    pub attachment: Attachment,
    pub chat_user_id: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub id: i64,
    pub chat_id: i64,
    pub sender_id: i64,
    pub message: String,
    pub is_read: bool,
    pub created_at: String,
    pub username: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub sender_role: String,
    pub attachments: Vec<Attachment>,
}

fn row_to_chat(row: &Row) -> Result<SupportChat> {
    Ok(SupportChat {
        id: row.get(0)?,
        user_id: row.get(1)?,
        support_user_id: row.get(2)?,
        last_message_at: row.get(3)?,
        created_at: row.get(4)?,
    })
}

const CHAT_COLUMNS: &str = "id, user_id, support_user_id, last_message_at, created_at";

// ==================== Chats ====================

pub fn get_chat(conn: &Connection, chat_id: i64) -> Result<Option<SupportChat>> {
    conn.query_row(
        &format!("SELECT {} FROM support_chats WHERE id = ?1", CHAT_COLUMNS),
        params![chat_id],
        row_to_chat,
    )
    .optional()
}

pub fn get_user_chat(conn: &Connection, user_id: i64) -> Result<Option<SupportChat>> {
    conn.query_row(
        &format!("SELECT {} FROM support_chats WHERE user_id = ?1", CHAT_COLUMNS),
        params![user_id],
        row_to_chat,
    )
    .optional()
}

/// The user's chat, created on first use
pub fn get_or_create_chat(conn: &Connection, user_id: i64) -> Result<SupportChat> {
    conn.execute(
        "INSERT OR IGNORE INTO support_chats (user_id, created_at) VALUES (?1, ?2)",
        params![user_id, super::now()],
    )?;
    conn.query_row(
        &format!("SELECT {} FROM support_chats WHERE user_id = ?1", CHAT_COLUMNS),
        params![user_id],
        row_to_chat,
    )
}

/// Assign a staff member to a chat that has nobody yet
pub fn assign_support(conn: &Connection, chat_id: i64, support_user_id: i64) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE support_chats SET support_user_id = ?1 WHERE id = ?2 AND support_user_id IS NULL",
        params![support_user_id, chat_id],
    )?;
    Ok(changed > 0)
}

/// Chats assigned to `support_user_id` or to nobody, most recent activity first
pub fn list_chats_for_support(conn: &Connection, support_user_id: i64) -> Result<Vec<ChatSummary>> {
    let sql = format!(
        r#"
        SELECT sc.id, sc.user_id, sc.support_user_id, sc.last_message_at, sc.created_at,
               u.username, u.email, u.first_name, u.last_name,
               (SELECT COUNT(*)
                FROM support_messages sm
                JOIN users s ON s.id = sm.sender_id
                WHERE sm.chat_id = sc.id
                  AND sm.is_read = 0
                  AND sm.sender_id != ?1
                  AND s.role NOT IN {staff}) AS unread_count
        FROM support_chats sc
        JOIN users u ON u.id = sc.user_id
        WHERE sc.support_user_id = ?1 OR sc.support_user_id IS NULL
        ORDER BY sc.last_message_at IS NULL, sc.last_message_at DESC, sc.created_at DESC
        "#,
        staff = STAFF_ROLES
    );
    let mut stmt = conn.prepare(&sql)?;
    let chats = stmt
        .query_map(params![support_user_id], |row| {
            Ok(ChatSummary {
                id: row.get(0)?,
                user_id: row.get(1)?,
                support_user_id: row.get(2)?,
                last_message_at: row.get(3)?,
                created_at: row.get(4)?,
                username: row.get(5)?,
                email: row.get(6)?,
                first_name: row.get(7)?,
                last_name: row.get(8)?,
                unread_count: row.get(9)?,
            })
        })?
        .collect::<Result<Vec<_>>>()?;
    Ok(chats)
}

// ==================== Messages ====================

pub fn get_attachments(conn: &Connection, message_id: i64) -> Result<Vec<Attachment>> {
    let mut stmt = conn.prepare(
        r#"SELECT id, filename, file_path, file_size, mime_type, created_at
           FROM support_attachments
           WHERE message_id = ?1
           ORDER BY id"#,
    )?;
    let attachments = stmt
        .query_map(params![message_id], |row| {
            Ok(Attachment {
                id: row.get(0)?,
                filename: row.get(1)?,
                file_path: row.get(2)?,
                file_size: row.get(3)?,
                mime_type: row.get(4)?,
                created_at: row.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>>>()?;
    Ok(attachments)
}

/// Messages of a chat in send order; with `after_id` only newer ones
pub fn get_messages(conn: &Connection, chat_id: i64, after_id: Option<i64>) -> Result<Vec<Message>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT sm.id, sm.chat_id, sm.sender_id, sm.message, sm.is_read, sm.created_at,
               u.username, u.first_name, u.last_name, u.role
        FROM support_messages sm
        JOIN users u ON u.id = sm.sender_id
        WHERE sm.chat_id = ?1 AND sm.id > ?2
        ORDER BY sm.created_at ASC, sm.id ASC
        "#,
    )?;
    let mut messages = stmt
        .query_map(params![chat_id, after_id.unwrap_or(0)], |row| {
            Ok(Message {
                id: row.get(0)?,
                chat_id: row.get(1)?,
                sender_id: row.get(2)?,
                message: row.get(3)?,
                is_read: row.get::<_, i64>(4)? != 0,
                created_at: row.get(5)?,
                username: row.get(6)?,
                first_name: row.get(7)?,
                last_name: row.get(8)?,
                sender_role: row.get(9)?,
                attachments: Vec::new(),
            })
        })?
        .collect::<Result<Vec<_>>>()?;
    for message in &mut messages {
        message.attachments = get_attachments(conn, message.id)?;
    }
    Ok(messages)
}

/// Cheap check used by the long poll loop
pub fn has_messages_after(conn: &Connection, chat_id: i64, after_id: i64) -> Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM support_messages WHERE chat_id = ?1 AND id > ?2)",
        params![chat_id, after_id],
        |row| row.get(0),
    )
}

/// Store a message and bump the chat's activity timestamp.
///
/// When staff write, everything the other side sent so far counts as read.
pub fn send_message(
    conn: &Connection,
    chat_id: i64,
    sender_id: i64,
    text: &str,
    sender_is_staff: bool,
) -> Result<i64> {
    let now = super::now();
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT INTO support_messages (chat_id, sender_id, message, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![chat_id, sender_id, text, now],
    )?;
    let message_id = tx.last_insert_rowid();
    tx.execute(
        "UPDATE support_chats SET last_message_at = ?1 WHERE id = ?2",
        params![now, chat_id],
    )?;
    if sender_is_staff {
        tx.execute(
            "UPDATE support_messages SET is_read = 1 WHERE chat_id = ?1 AND sender_id != ?2 AND is_read = 0",
            params![chat_id, sender_id],
        )?;
    }
    tx.commit()?;
    Ok(message_id)
}

/// Mark everything in the chat not written by `reader_id` as read
pub fn mark_read(conn: &Connection, chat_id: i64, reader_id: i64) -> Result<usize> {
    conn.execute(
        "UPDATE support_messages SET is_read = 1 WHERE chat_id = ?1 AND sender_id != ?2 AND is_read = 0",
        params![chat_id, reader_id],
    )
}

// ==================== Unread counters ====================

/// Unread messages written by `user_id` in their own chat
pub fn unread_from_user(conn: &Connection, user_id: i64) -> Result<i64> {
    conn.query_row(
        r#"SELECT COUNT(*)
           FROM support_messages sm
           JOIN support_chats sc ON sc.id = sm.chat_id
           WHERE sc.user_id = ?1 AND sm.sender_id = ?1 AND sm.is_read = 0"#,
        params![user_id],
        |row| row.get(0),
    )
}

/// Unread non-staff messages across the staff member's inbox
pub fn unread_for_support(conn: &Connection, support_user_id: i64) -> Result<i64> {
    conn.query_row(
        &format!(
            r#"SELECT COUNT(*)
               FROM support_messages sm
               JOIN support_chats sc ON sc.id = sm.chat_id
               JOIN users s ON s.id = sm.sender_id
               WHERE (sc.support_user_id = ?1 OR sc.support_user_id IS NULL)
                 AND sm.is_read = 0
                 AND sm.sender_id != ?1
                 AND s.role NOT IN {}"#,
            STAFF_ROLES
        ),
        params![support_user_id],
        |row| row.get(0),
    )
}

/// Unread replies in the user's own chat
pub fn unread_for_user(conn: &Connection, user_id: i64) -> Result<i64> {
    conn.query_row(
        r#"SELECT COUNT(*)
           FROM support_messages sm
           JOIN support_chats sc ON sc.id = sm.chat_id
           WHERE sc.user_id = ?1 AND sm.sender_id != ?1 AND sm.is_read = 0"#,
        params![user_id],
        |row| row.get(0),
    )
}

// ==================== Attachments ====================

pub fn get_attachment(conn: &Connection, attachment_id: i64) -> Result<Option<AttachmentRecord>> {
    conn.query_row(
        r#"SELECT a.id, a.filename, a.file_path, a.file_size, a.mime_type, a.created_at, sc.user_id
           FROM support_attachments a
           JOIN support_messages sm ON sm.id = a.message_id
           JOIN support_chats sc ON sc.id = sm.chat_id
           WHERE a.id = ?1"#,
        params![attachment_id],
        |row| {
            Ok(AttachmentRecord {
                attachment: Attachment {
                    id: row.get(0)?,
                    filename: row.get(1)?,
                    file_path: row.get(2)?,
                    file_size: row.get(3)?,
                    mime_type: row.get(4)?,
                    created_at: row.get(5)?,
                },
                chat_user_id: row.get(6)?,
            })
        },
    )
    .optional()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Role;
    use crate::testing::TestEnv;

    fn attach(env: &TestEnv, message_id: i64, filename: &str) -> i64 {
        env.conn
            .execute(
                "INSERT INTO support_attachments (message_id, filename, file_path, file_size, mime_type, created_at)
                 VALUES (?1, ?2, ?3, 12, 'text/plain', ?4)",
                params![message_id, filename, format!("support/{}", filename), crate::db::now()],
            )
            .unwrap();
        env.conn.last_insert_rowid()
    }

    #[test]
    fn test_get_or_create_chat_is_stable() {
        let env = TestEnv::new().unwrap();
        let user = env.add_user("client", Role::User).unwrap();

        let first = get_or_create_chat(&env.conn, user).unwrap();
        let second = get_or_create_chat(&env.conn, user).unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(first.support_user_id, None);
        assert_eq!(get_user_chat(&env.conn, user).unwrap().unwrap().id, first.id);
    }

    #[test]
    fn test_assign_only_once() {
        let env = TestEnv::new().unwrap();
        let user = env.add_user("client", Role::User).unwrap();
        let admin = env.add_user("admin", Role::Admin).unwrap();
        let other = env.add_user("other", Role::Admin).unwrap();
        let chat = get_or_create_chat(&env.conn, user).unwrap();

        assert!(assign_support(&env.conn, chat.id, admin).unwrap());
        assert!(!assign_support(&env.conn, chat.id, other).unwrap());
        assert_eq!(get_chat(&env.conn, chat.id).unwrap().unwrap().support_user_id, Some(admin));
    }

    #[test]
    fn test_staff_reply_marks_user_messages_read() {
        let env = TestEnv::new().unwrap();
        let user = env.add_user("client", Role::User).unwrap();
        let admin = env.add_user("admin", Role::Admin).unwrap();
        let chat = get_or_create_chat(&env.conn, user).unwrap();

        send_message(&env.conn, chat.id, user, "hello", false).unwrap();
        send_message(&env.conn, chat.id, user, "anyone?", false).unwrap();
        assert_eq!(unread_from_user(&env.conn, user).unwrap(), 2);
        assert_eq!(unread_for_support(&env.conn, admin).unwrap(), 2);

        send_message(&env.conn, chat.id, admin, "hi", true).unwrap();
        assert_eq!(unread_from_user(&env.conn, user).unwrap(), 0);
        assert_eq!(unread_for_user(&env.conn, user).unwrap(), 1);

        assert_eq!(mark_read(&env.conn, chat.id, user).unwrap(), 1);
        assert_eq!(unread_for_user(&env.conn, user).unwrap(), 0);
        assert!(get_chat(&env.conn, chat.id).unwrap().unwrap().last_message_at.is_some());
    }

    #[test]
    fn test_messages_after_id_with_attachments() {
        let env = TestEnv::new().unwrap();
        let user = env.add_user("client", Role::User).unwrap();
        let chat = get_or_create_chat(&env.conn, user).unwrap();

        let first = send_message(&env.conn, chat.id, user, "one", false).unwrap();
        let second = send_message(&env.conn, chat.id, user, "two", false).unwrap();
        attach(&env, second, "log.txt");

        let all = get_messages(&env.conn, chat.id, None).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].sender_role, "user");

        let newer = get_messages(&env.conn, chat.id, Some(first)).unwrap();
        assert_eq!(newer.len(), 1);
        assert_eq!(newer[0].message, "two");
        assert_eq!(newer[0].attachments[0].filename, "log.txt");

        assert!(has_messages_after(&env.conn, chat.id, first).unwrap());
        assert!(!has_messages_after(&env.conn, chat.id, second).unwrap());
    }

    #[test]
    fn test_inbox_excludes_chats_of_other_staff() {
        let env = TestEnv::new().unwrap();
        let alice = env.add_user("alice", Role::User).unwrap();
        let bob = env.add_user("bob", Role::User).unwrap();
        let carol = env.add_user("carol", Role::Guest).unwrap();
        let admin = env.add_user("admin", Role::Admin).unwrap();
        let other = env.add_user("other", Role::SuperAdmin).unwrap();

        let mine = get_or_create_chat(&env.conn, alice).unwrap();
        let theirs = get_or_create_chat(&env.conn, bob).unwrap();
        get_or_create_chat(&env.conn, carol).unwrap();
        assign_support(&env.conn, mine.id, admin).unwrap();
        assign_support(&env.conn, theirs.id, other).unwrap();
        send_message(&env.conn, mine.id, alice, "help", false).unwrap();

        let inbox = list_chats_for_support(&env.conn, admin).unwrap();
        let users: Vec<&str> = inbox.iter().map(|c| c.username.as_str()).collect();
        assert_eq!(users, vec!["alice", "carol"]);
        assert_eq!(inbox[0].unread_count, 1);
        assert_eq!(inbox[1].unread_count, 0);
    }

    #[test]
    fn test_attachment_lookup_carries_chat_owner() {
        let env = TestEnv::new().unwrap();
        let user = env.add_user("client", Role::User).unwrap();
        let chat = get_or_create_chat(&env.conn, user).unwrap();
        let message = send_message(&env.conn, chat.id, user, "see file", false).unwrap();
        let id = attach(&env, message, "photo.png");

        let record = get_attachment(&env.conn, id).unwrap().unwrap();
        assert_eq!(record.chat_user_id, user);
        assert_eq!(record.attachment.file_path, "support/photo.png");
        assert!(get_attachment(&env.conn, id + 1).unwrap().is_none());
    }
}
