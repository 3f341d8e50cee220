use serde::Serialize;
use serde_json::{Map, Value};

use super::{flag, id_list, iso, opt_text, stamps, status, text};
use crate::fields::rename_fields;
use crate::source::Document;

const USER_RENAMES: &[(&str, &str)] = &[
    ("displayName", "name"),
    ("photoURL", "avatar"),
    ("createdAt", "created_at"),
    ("updatedAt", "updated_at"),
];

const CHANNEL_RENAMES: &[(&str, &str)] = &[
    ("createdBy", "created_by"),
    ("createdAt", "created_at"),
    ("updatedAt", "updated_at"),
];

const MESSAGE_RENAMES: &[(&str, &str)] = &[
    ("userId", "user_id"),
    ("createdAt", "created_at"),
    ("updatedAt", "updated_at"),
];

const REACTION_RENAMES: &[(&str, &str)] = &[
    ("messageId", "message_id"),
    ("userId", "user_id"),
    ("createdAt", "created_at"),
];

const TASK_RENAMES: &[(&str, &str)] = &[
    ("assignedTo", "assigned_to"),
    ("dueDate", "due_date"),
    ("createdAt", "created_at"),
    ("updatedAt", "updated_at"),
];

const NOTIFICATION_RENAMES: &[(&str, &str)] = &[
    ("userId", "user_id"),
    ("type", "kind"),
    ("relatedId", "related_id"),
    ("createdAt", "created_at"),
];

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ProfileRecord {
    pub id: String,
    pub email: String,
    pub name: String,
    pub avatar: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ChannelRecord {
    pub id: String,
    pub name: String,
    pub description: String,
    pub created_by: Option<String>,
    pub members: Vec<String>,
    pub admins: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MessageRecord {
    pub id: String,
    pub channel_id: String,
    pub user_id: Option<String>,
    pub content: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ReplyRecord {
    pub id: String,
    pub message_id: String,
    pub user_id: Option<String>,
    pub content: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ReactionRecord {
    pub id: String,
    pub channel_id: String,
    pub message_id: Option<String>,
    pub user_id: Option<String>,
    pub emoji: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TaskRecord {
    pub id: String,
    pub channel_id: String,
    pub title: String,
    pub description: String,
    pub status: String,
    pub assigned_to: Vec<String>,
    pub due_date: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NotificationRecord {
    pub id: String,
    pub user_id: Option<String>,
    pub kind: String,
    pub title: String,
    pub body: String,
    /// Opaque cross-entity reference, written as-is.
    pub related_id: Option<String>,
    pub read: bool,
    pub created_at: String,
}

pub fn profile(doc: &Document) -> ProfileRecord {
    let f = renamed(doc, USER_RENAMES);
    let (created_at, updated_at) = stamps(&f);
    ProfileRecord {
        id: doc.id.clone(),
        email: text(&f, "email"),
        name: text(&f, "name"),
        avatar: opt_text(&f, "avatar"),
        created_at,
        updated_at,
    }
}

pub fn channel(doc: &Document) -> ChannelRecord {
    let f = renamed(doc, CHANNEL_RENAMES);
    let (created_at, updated_at) = stamps(&f);
    ChannelRecord {
        id: doc.id.clone(),
        name: text(&f, "name"),
        description: text(&f, "description"),
        created_by: opt_text(&f, "created_by"),
        members: id_list(&f, "members"),
        admins: id_list(&f, "admins"),
        created_at,
        updated_at,
    }
}

pub fn message(doc: &Document, channel_id: &str) -> MessageRecord {
    let f = renamed(doc, MESSAGE_RENAMES);
    let (created_at, updated_at) = stamps(&f);
    MessageRecord {
        id: doc.id.clone(),
        channel_id: channel_id.to_string(),
        user_id: opt_text(&f, "user_id"),
        content: text(&f, "content"),
        created_at,
        updated_at,
    }
}

pub fn reply(doc: &Document, message_id: &str) -> ReplyRecord {
    let f = renamed(doc, MESSAGE_RENAMES);
    let (created_at, updated_at) = stamps(&f);
    ReplyRecord {
        id: doc.id.clone(),
        message_id: message_id.to_string(),
        user_id: opt_text(&f, "user_id"),
        content: text(&f, "content"),
        created_at,
        updated_at,
    }
}

pub fn reaction(doc: &Document, channel_id: &str) -> ReactionRecord {
    let f = renamed(doc, REACTION_RENAMES);
    let (created_at, _) = stamps(&f);
    ReactionRecord {
        id: doc.id.clone(),
        channel_id: channel_id.to_string(),
        message_id: opt_text(&f, "message_id"),
        user_id: opt_text(&f, "user_id"),
        emoji: text(&f, "emoji"),
        created_at,
    }
}

pub fn task(doc: &Document, channel_id: &str) -> TaskRecord {
    let f = renamed(doc, TASK_RENAMES);
    let (created_at, updated_at) = stamps(&f);
    TaskRecord {
        id: doc.id.clone(),
        channel_id: channel_id.to_string(),
        title: text(&f, "title"),
        description: text(&f, "description"),
        status: status(&f, "status", "pending"),
        assigned_to: id_list(&f, "assigned_to"),
        due_date: iso(&f, "due_date"),
        created_at,
        updated_at,
    }
}

pub fn notification(doc: &Document) -> NotificationRecord {
    let f = renamed(doc, NOTIFICATION_RENAMES);
    let (created_at, _) = stamps(&f);
    NotificationRecord {
        id: doc.id.clone(),
        user_id: opt_text(&f, "user_id"),
        kind: text(&f, "kind"),
        title: text(&f, "title"),
        body: text(&f, "body"),
        related_id: opt_text(&f, "related_id"),
        read: flag(&f, "read"),
        created_at,
    }
}

fn renamed(doc: &Document, table: &[(&str, &str)]) -> Map<String, Value> {
    rename_fields(&doc.fields, table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(id: &str, fields: serde_json::Value) -> Document {
        match fields {
            Value::Object(fields) => Document {
                id: id.to_string(),
                fields,
            },
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn task_defaults_cover_every_column() {
        let record = task(&doc("t1", json!({})), "c1");
        assert_eq!(record.id, "t1");
        assert_eq!(record.channel_id, "c1");
        assert_eq!(record.title, "");
        assert_eq!(record.description, "");
        assert_eq!(record.status, "pending");
        assert_eq!(record.assigned_to, Vec::<String>::new());
        assert_eq!(record.due_date, None);
        assert!(!record.created_at.is_empty());
        assert_eq!(record.updated_at, record.created_at);
    }

    #[test]
    fn channel_member_lists_default_to_empty() {
        let record = channel(&doc("c1", json!({ "name": "General" })));
        assert_eq!(record.members, Vec::<String>::new());
        assert_eq!(record.admins, Vec::<String>::new());
        assert_eq!(record.created_by, None);
    }

    #[test]
    fn channel_member_order_is_preserved() {
        let record = channel(&doc(
            "c1",
            json!({ "members": ["u3", "u1", "u2"], "admins": ["u1"] }),
        ));
        assert_eq!(record.members, ["u3", "u1", "u2"]);
        assert_eq!(record.admins, ["u1"]);
    }

    #[test]
    fn message_normalizes_native_created_at() {
        let record = message(
            &doc(
                "m1",
                json!({
                    "userId": "u1",
                    "content": "hi",
                    "createdAt": { "_seconds": 1_700_000_000, "_nanoseconds": 0 }
                }),
            ),
            "c1",
        );
        assert_eq!(record.channel_id, "c1");
        assert_eq!(record.user_id.as_deref(), Some("u1"));
        assert_eq!(record.created_at, "2023-11-14T22:13:20.000Z");
    }

    #[test]
    fn notification_related_id_is_opaque() {
        let record = notification(&doc(
            "n1",
            json!({ "type": "mention", "relatedId": "anything-goes" }),
        ));
        assert_eq!(record.kind, "mention");
        assert_eq!(record.related_id.as_deref(), Some("anything-goes"));
        assert!(!record.read);
    }

    #[test]
    fn profile_preserves_source_id() {
        let record = profile(&doc("u1", json!({ "displayName": "Ada" })));
        assert_eq!(record.id, "u1");
        assert_eq!(record.name, "Ada");
        assert_eq!(record.email, "");
    }
}
