use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Film,
    Course,
}

impl FromStr for MediaKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "film" => Ok(Self::Film),
            "course" => Ok(Self::Course),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Film => write!(f, "film"),
            Self::Course => write!(f, "course"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WatchStatus {
    Planned,
    Watching,
    Completed,
}

impl FromStr for WatchStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "planned" => Ok(Self::Planned),
            "watching" => Ok(Self::Watching),
            "completed" => Ok(Self::Completed),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for WatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Planned => write!(f, "planned"),
            Self::Watching => write!(f, "watching"),
            Self::Completed => write!(f, "completed"),
        }
    }
}

macro_rules! text_enum_sql {
    ($ty:ty) => {
        impl ToSql for $ty {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.to_string()))
            }
        }

        impl FromSql for $ty {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                value.as_str()?.parse().map_err(|_| FromSqlError::InvalidType)
            }
        }
    };
}

text_enum_sql!(MediaKind);
text_enum_sql!(WatchStatus);

/// The user-editable part of a wishlist entry, as stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MediaFields {
    pub name: String,
    pub year: i32,
    pub kind: MediaKind,
    pub status: WatchStatus,
    pub rating: Option<f64>,
    pub description: Option<String>,
    pub genres: Option<Vec<String>>,
    pub director: Option<String>,
    pub duration: Option<u32>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MediaRecord {
    pub id: Uuid,
    #[serde(flatten)]
    pub fields: MediaFields,
    pub attachment_filename: Option<String>,
    pub created_at: String,
}

/// Unvalidated media fields as they arrive in a request body.
///
/// Every field is optional so that a missing required field is reported
/// together with the other violations instead of aborting deserialization.
/// Keys that match no field are collected in `unknown` and rejected later.
#[derive(Debug, Default, Deserialize)]
pub struct MediaDraft {
    /// Accepted for client convenience and ignored: ids are server-assigned.
    #[serde(default)]
    pub id: Option<IgnoredAny>,
    pub name: Option<String>,
    pub year: Option<i64>,
    pub kind: Option<MediaKind>,
    pub status: Option<WatchStatus>,
    pub rating: Option<f64>,
    pub description: Option<String>,
    pub genres: Option<Vec<String>>,
    pub director: Option<String>,
    pub duration: Option<i64>,
    pub url: Option<String>,
    #[serde(flatten)]
    pub unknown: BTreeMap<String, serde_json::Value>,
}

impl From<MediaFields> for MediaDraft {
    fn from(fields: MediaFields) -> Self {
        Self {
            id: None,
            name: Some(fields.name),
            year: Some(i64::from(fields.year)),
            kind: Some(fields.kind),
            status: Some(fields.status),
            rating: fields.rating,
            description: fields.description,
            genres: fields.genres,
            director: fields.director,
            duration: fields.duration.map(i64::from),
            url: fields.url,
            unknown: BTreeMap::new(),
        }
    }
}

/// Partial update. The outer `Option` tells whether the client sent the key
/// at all; the inner one carries an explicit `null`.
#[derive(Debug, Default, Deserialize)]
pub struct MediaPatch {
    #[serde(default)]
    pub id: Option<IgnoredAny>,
    #[serde(default, deserialize_with = "present")]
    pub name: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub year: Option<Option<i64>>,
    #[serde(default, deserialize_with = "present")]
    pub kind: Option<Option<MediaKind>>,
    #[serde(default, deserialize_with = "present")]
    pub status: Option<Option<WatchStatus>>,
    #[serde(default, deserialize_with = "present")]
    pub rating: Option<Option<f64>>,
    #[serde(default, deserialize_with = "present")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub genres: Option<Option<Vec<String>>>,
    #[serde(default, deserialize_with = "present")]
    pub director: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub duration: Option<Option<i64>>,
    #[serde(default, deserialize_with = "present")]
    pub url: Option<Option<String>>,
    #[serde(flatten)]
    pub unknown: BTreeMap<String, serde_json::Value>,
}

fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn merge<T>(patch: Option<Option<T>>, current: Option<T>) -> Option<T> {
    match patch {
        Some(value) => value,
        None => current,
    }
}

impl MediaPatch {
    /// Overlays the fields the client sent on top of `current`. An explicit
    /// `null` on a required field leaves it empty so validation rejects it.
    pub fn merge_into(self, current: MediaFields) -> MediaDraft {
        let current = MediaDraft::from(current);
        MediaDraft {
            id: None,
            name: merge(self.name, current.name),
            year: merge(self.year, current.year),
            kind: merge(self.kind, current.kind),
            status: merge(self.status, current.status),
            rating: merge(self.rating, current.rating),
            description: merge(self.description, current.description),
            genres: merge(self.genres, current.genres),
            director: merge(self.director, current.director),
            duration: merge(self.duration, current.duration),
            url: merge(self.url, current.url),
            unknown: self.unknown,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StoredAttachment {
    pub filename: String,
    pub status: &'static str,
}

impl StoredAttachment {
    pub fn uploaded(filename: String) -> Self {
        Self {
            filename,
            status: "uploaded",
        }
    }
}
