use crate::application::store::StoreError;

/// `untranslatable_character`: JSONB cannot hold `\u0000` inside strings.
const UNTRANSLATABLE_CHARACTER: &str = "22P05";

pub fn map_sqlx_error(err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::RowNotFound => StoreError::not_found("<row>"),
        sqlx::Error::ColumnDecode { source, .. } => StoreError::encoding(source),
        sqlx::Error::Encode(source) | sqlx::Error::Decode(source) => StoreError::encoding(source),
        sqlx::Error::Database(db) => map_database_error(db.code().as_deref(), db.message()),
        other => StoreError::unavailable(other),
    }
}

fn map_database_error(code: Option<&str>, message: &str) -> StoreError {
    if code == Some(UNTRANSLATABLE_CHARACTER) {
        return StoreError::encoding(message);
    }
    if message.contains("canceling statement due to user request") {
        return StoreError::unavailable("database statement timed out");
    }
    StoreError::unavailable(message)
}
