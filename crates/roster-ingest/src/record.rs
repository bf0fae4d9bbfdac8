//! The unit of storage

use serde::{Deserialize, Serialize};

/// Maximum length, in characters, of every text field.
pub const MAX_TEXT_LEN: usize = 100;

/// Column names recognized in the CSV header.
pub const RECORD_FIELDS: [&str; 6] = [
    "id",
    "firstname",
    "lastname",
    "email",
    "email2",
    "profession",
];

/// A normalized personal record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "database", derive(sqlx::FromRow))]
pub struct Record {
    pub id: i64,
    pub firstname: String,
    pub lastname: String,
    pub email: String,
    pub email2: String,
    pub profession: String,
}
