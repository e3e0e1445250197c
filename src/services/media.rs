use crate::models::{MediaFields, MediaPatch, MediaRecord};
use crate::services::validation::{validate_media, ValidatedMedia, ValidationErrors};
use crate::Database;
use rusqlite::types::Type;
use rusqlite::{params, OptionalExtension, Row, TransactionBehavior};
use thiserror::Error;
use uuid::Uuid;

const SELECT_COLUMNS: &str = "SELECT id, name, year, kind, status, rating, description, genres, director, duration, url, attachment_filename, created_at FROM media";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Media item not found")]
    NotFound,

    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

pub fn create_media(db: &Database, media: ValidatedMedia) -> StoreResult<MediaRecord> {
    let record = MediaRecord {
        id: Uuid::new_v4(),
        fields: media.into_fields(),
        attachment_filename: None,
        created_at: chrono::Utc::now().to_rfc3339(),
    };

    let mut conn = db.get()?;
    let tx = conn.transaction()?;
    let f = &record.fields;
    tx.execute(
        r#"
        INSERT INTO media (id, name, year, kind, status, rating, description, genres, director, duration, url, attachment_filename, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
        params![
            record.id.to_string(),
            f.name,
            f.year,
            f.kind,
            f.status,
            f.rating,
            f.description,
            encode_genres(&f.genres)?,
            f.director,
            f.duration,
            f.url,
            record.attachment_filename,
            record.created_at,
        ],
    )?;
    tx.commit()?;

    tracing::info!(media_id = %record.id, kind = %f.kind, "Created media item");
    Ok(record)
}

pub fn list_media(db: &Database) -> StoreResult<Vec<MediaRecord>> {
    let conn = db.get()?;
    let mut stmt = conn.prepare(&format!("{} ORDER BY created_at, rowid", SELECT_COLUMNS))?;
    let media = stmt
        .query_map([], row_to_record)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(media)
}

pub fn get_media(db: &Database, id: Uuid) -> StoreResult<MediaRecord> {
    let conn = db.get()?;
    conn.query_row(
        &format!("{} WHERE id = ?", SELECT_COLUMNS),
        [id.to_string()],
        row_to_record,
    )
    .optional()?
    .ok_or(StoreError::NotFound)
}

/// Applies `patch` to the stored record and revalidates the merged result
/// with the creation rules. Nothing is written unless it passes.
pub fn update_media(db: &Database, id: Uuid, patch: MediaPatch) -> StoreResult<MediaRecord> {
    let mut conn = db.get()?;
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let MediaRecord {
        fields: current,
        attachment_filename,
        created_at,
        ..
    } = tx
        .query_row(
            &format!("{} WHERE id = ?", SELECT_COLUMNS),
            [id.to_string()],
            row_to_record,
        )
        .optional()?
        .ok_or(StoreError::NotFound)?;

    let fields = validate_media(patch.merge_into(current))?.into_fields();

    tx.execute(
        r#"
        UPDATE media SET name = ?, year = ?, kind = ?, status = ?, rating = ?, description = ?, genres = ?, director = ?, duration = ?, url = ?
        WHERE id = ?
        "#,
        params![
            fields.name,
            fields.year,
            fields.kind,
            fields.status,
            fields.rating,
            fields.description,
            encode_genres(&fields.genres)?,
            fields.director,
            fields.duration,
            fields.url,
            id.to_string(),
        ],
    )?;
    tx.commit()?;

    tracing::info!(media_id = %id, "Updated media item");
    Ok(MediaRecord {
        id,
        fields,
        attachment_filename,
        created_at,
    })
}

/// Deletes the record and returns it so the caller can clean up its
/// attachment. A second delete of the same id is `NotFound`.
pub fn delete_media(db: &Database, id: Uuid) -> StoreResult<MediaRecord> {
    let mut conn = db.get()?;
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let record = tx
        .query_row(
            &format!("{} WHERE id = ?", SELECT_COLUMNS),
            [id.to_string()],
            row_to_record,
        )
        .optional()?
        .ok_or(StoreError::NotFound)?;

    tx.execute("DELETE FROM media WHERE id = ?", [id.to_string()])?;
    tx.commit()?;

    tracing::info!(media_id = %id, "Deleted media item");
    Ok(record)
}

/// Points the record at `filename`, running `commit` (the file write) while
/// the write lock is held so the record cannot disappear in between.
/// Returns the previously referenced filename, if any.
pub fn replace_attachment<F, E>(
    db: &Database,
    id: Uuid,
    filename: &str,
    commit: F,
) -> Result<Option<String>, E>
where
    F: FnOnce() -> Result<(), E>,
    E: From<StoreError>,
{
    let mut conn = db.get().map_err(StoreError::from)?;
    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(StoreError::from)?;

    let previous: Option<String> = tx
        .query_row(
            "SELECT attachment_filename FROM media WHERE id = ?",
            [id.to_string()],
            |row| row.get(0),
        )
        .optional()
        .map_err(StoreError::from)?
        .ok_or(StoreError::NotFound)?;

    commit()?;

    tx.execute(
        "UPDATE media SET attachment_filename = ? WHERE id = ?",
        params![filename, id.to_string()],
    )
    .map_err(StoreError::from)?;
    tx.commit().map_err(StoreError::from)?;

    Ok(previous)
}

fn encode_genres(genres: &Option<Vec<String>>) -> StoreResult<Option<String>> {
    Ok(genres.as_ref().map(serde_json::to_string).transpose()?)
}

fn row_to_record(row: &Row) -> rusqlite::Result<MediaRecord> {
    let id: String = row.get(0)?;
    let id = Uuid::parse_str(&id)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))?;

    let genres: Option<String> = row.get(7)?;
    let genres = genres
        .map(|g| serde_json::from_str::<Vec<String>>(&g))
        .transpose()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(7, Type::Text, Box::new(e)))?;

    Ok(MediaRecord {
        id,
        fields: MediaFields {
            name: row.get(1)?,
            year: row.get(2)?,
            kind: row.get(3)?,
            status: row.get(4)?,
            rating: row.get(5)?,
            description: row.get(6)?,
            genres,
            director: row.get(8)?,
            duration: row.get(9)?,
            url: row.get(10)?,
        },
        attachment_filename: row.get(11)?,
        created_at: row.get(12)?,
    })
}
