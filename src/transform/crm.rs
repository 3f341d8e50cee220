use serde::Serialize;
use serde_json::{Map, Value};

use super::{id_list, iso, number, opt_text, stamps, status, text};
use crate::fields::rename_fields;
use crate::source::Document;

const STUDENT_RENAMES: &[(&str, &str)] = &[
    ("avatarColor", "avatar_color"),
    ("createdAt", "created_at"),
    ("updatedAt", "updated_at"),
];

const COURSE_RENAMES: &[(&str, &str)] = &[
    ("channelId", "channel_id"),
    ("createdAt", "created_at"),
    ("updatedAt", "updated_at"),
];

const CLASS_RENAMES: &[(&str, &str)] = &[
    ("courseId", "course_id"),
    ("channelId", "channel_id"),
    ("createdAt", "created_at"),
    ("updatedAt", "updated_at"),
];

const ENROLLMENT_RENAMES: &[(&str, &str)] = &[
    ("studentId", "student_id"),
    ("courseId", "course_id"),
    ("classId", "class_id"),
    ("enrollmentDate", "enrollment_date"),
    ("createdAt", "created_at"),
    ("updatedAt", "updated_at"),
];

const PAYMENT_RENAMES: &[(&str, &str)] = &[
    ("studentId", "student_id"),
    ("courseId", "course_id"),
    ("enrollmentId", "enrollment_id"),
    ("paymentMethod", "payment_method"),
    ("createdAt", "created_at"),
];

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StudentRecord {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub avatar: Option<String>,
    pub avatar_color: Option<String>,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CourseRecord {
    pub id: String,
    pub name: String,
    pub description: String,
    pub channel_id: Option<String>,
    pub teachers: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ClassRecord {
    pub id: String,
    pub name: String,
    pub course_id: Option<String>,
    pub channel_id: Option<String>,
    pub teachers: Vec<String>,
    pub schedule: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EnrollmentRecord {
    pub id: String,
    pub student_id: Option<String>,
    pub course_id: Option<String>,
    pub class_id: Option<String>,
    pub status: String,
    pub enrollment_date: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PaymentRecord {
    pub id: String,
    pub student_id: Option<String>,
    pub course_id: Option<String>,
    pub enrollment_id: Option<String>,
    pub amount: Option<f64>,
    pub currency: Option<String>,
    pub payment_method: Option<String>,
    pub status: String,
    pub created_at: String,
}

pub fn student(doc: &Document) -> StudentRecord {
    let f = renamed(doc, STUDENT_RENAMES);
    let (created_at, updated_at) = stamps(&f);
    StudentRecord {
        id: doc.id.clone(),
        name: text(&f, "name"),
        email: text(&f, "email"),
        phone: text(&f, "phone"),
        avatar: opt_text(&f, "avatar"),
        avatar_color: opt_text(&f, "avatar_color"),
        status: status(&f, "status", "active"),
        created_at,
        updated_at,
    }
}

pub fn course(doc: &Document) -> CourseRecord {
    let f = renamed(doc, COURSE_RENAMES);
    let (created_at, updated_at) = stamps(&f);
    CourseRecord {
        id: doc.id.clone(),
        name: text(&f, "name"),
        description: text(&f, "description"),
        channel_id: opt_text(&f, "channel_id"),
        teachers: id_list(&f, "teachers"),
        created_at,
        updated_at,
    }
}

pub fn class(doc: &Document) -> ClassRecord {
    let f = renamed(doc, CLASS_RENAMES);
    let (created_at, updated_at) = stamps(&f);
    ClassRecord {
        id: doc.id.clone(),
        name: text(&f, "name"),
        course_id: opt_text(&f, "course_id"),
        channel_id: opt_text(&f, "channel_id"),
        teachers: id_list(&f, "teachers"),
        schedule: text(&f, "schedule"),
        created_at,
        updated_at,
    }
}

pub fn enrollment(doc: &Document) -> EnrollmentRecord {
    let f = renamed(doc, ENROLLMENT_RENAMES);
    let (created_at, updated_at) = stamps(&f);
    // enrollment_date falls back to created_at when the source omits it.
    let enrollment_date = iso(&f, "enrollment_date").or_else(|| Some(created_at.clone()));
    EnrollmentRecord {
        id: doc.id.clone(),
        student_id: opt_text(&f, "student_id"),
        course_id: opt_text(&f, "course_id"),
        class_id: opt_text(&f, "class_id"),
        status: status(&f, "status", "active"),
        enrollment_date,
        created_at,
        updated_at,
    }
}

pub fn payment(doc: &Document) -> PaymentRecord {
    let f = renamed(doc, PAYMENT_RENAMES);
    let (created_at, _) = stamps(&f);
    PaymentRecord {
        id: doc.id.clone(),
        student_id: opt_text(&f, "student_id"),
        course_id: opt_text(&f, "course_id"),
        enrollment_id: opt_text(&f, "enrollment_id"),
        amount: number(&f, "amount"),
        currency: opt_text(&f, "currency"),
        payment_method: opt_text(&f, "payment_method"),
        status: status(&f, "status", "pending"),
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
    fn enrollment_date_falls_back_to_created_at() {
        let record = enrollment(&doc(
            "e1",
            json!({ "createdAt": { "_seconds": 1_700_000_000 } }),
        ));
        assert_eq!(record.created_at, "2023-11-14T22:13:20.000Z");
        assert_eq!(
            record.enrollment_date.as_deref(),
            Some("2023-11-14T22:13:20.000Z")
        );
    }

    #[test]
    fn explicit_enrollment_date_wins() {
        let record = enrollment(&doc(
            "e1",
            json!({
                "enrollmentDate": { "_seconds": 100 },
                "createdAt": { "_seconds": 200 },
            }),
        ));
        assert_eq!(
            record.enrollment_date.as_deref(),
            Some("1970-01-01T00:01:40.000Z")
        );
    }

    #[test]
    fn payment_optional_fields_are_independent() {
        let record = payment(&doc("p1", json!({ "amount": 49.5 })));
        assert_eq!(record.amount, Some(49.5));
        assert_eq!(record.currency, None);
        assert_eq!(record.payment_method, None);
        assert_eq!(record.status, "pending");
    }

    #[test]
    fn student_derived_fields_may_be_absent() {
        let record = student(&doc("s1", json!({ "name": "Grace" })));
        assert_eq!(record.id, "s1");
        assert_eq!(record.avatar, None);
        assert_eq!(record.avatar_color, None);
        assert_eq!(record.status, "active");
    }

    #[test]
    fn class_teachers_default_to_empty_list() {
        let record = class(&doc("k1", json!({ "channelId": "c1" })));
        assert_eq!(record.teachers, Vec::<String>::new());
        assert_eq!(record.channel_id.as_deref(), Some("c1"));
        assert_eq!(record.course_id, None);
    }
}
