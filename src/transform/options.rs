use serde::Serialize;

use super::{opt_text, text};
use crate::fields::rename_fields;
use crate::source::Document;

/// Source collection name → destination table for the simple id + value
/// lookup collections. Cities come last so their country references exist.
pub const OPTION_COLLECTIONS: &[(&str, &str)] = &[
    ("funnelSteps", "funnel_steps"),
    ("courseInterests", "course_interests"),
    ("categoryInterests", "category_interests"),
    ("platforms", "platforms"),
    ("countries", "countries"),
    ("cities", "cities"),
];

const CITY_RENAMES: &[(&str, &str)] = &[("countryId", "country_id")];

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct OptionRecord {
    pub id: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CityRecord {
    pub id: String,
    pub value: String,
    pub country_id: Option<String>,
}

pub fn option_value(doc: &Document) -> OptionRecord {
    OptionRecord {
        id: doc.id.clone(),
        value: text(&doc.fields, "value"),
    }
}

pub fn city(doc: &Document) -> CityRecord {
    let f = rename_fields(&doc.fields, CITY_RENAMES);
    CityRecord {
        id: doc.id.clone(),
        value: text(&f, "value"),
        country_id: opt_text(&f, "country_id"),
    }
}
