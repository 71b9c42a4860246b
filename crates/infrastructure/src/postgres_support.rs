use rolegate_core::{AppError, AppResult};
use rolegate_domain::ConsistencyLevel;

const DUPLICATE_OBJECT_CODES: [&str; 4] = ["42P06", "42P07", "42710", "23505"];

/// True when synchronous replication is configured but no synchronous standby is attached.
pub(crate) const QUORUM_STALLED_QUERY: &str = r#"
    SELECT current_setting('synchronous_standby_names') <> ''
       AND NOT EXISTS (
           SELECT 1 FROM pg_stat_replication WHERE sync_state IN ('sync', 'quorum')
       )
"#;

/// Validates a keyspace before it is interpolated into SQL as a schema name.
pub(crate) fn validate_keyspace(keyspace: &str) -> AppResult<()> {
    let mut chars = keyspace.chars();
    let starts_well = chars
        .next()
        .is_some_and(|first| first.is_ascii_lowercase() || first == '_');
    let rest_ok = chars.all(|next| next.is_ascii_lowercase() || next.is_ascii_digit() || next == '_');

    if !starts_well || !rest_ok || keyspace.len() > 63 {
        return Err(AppError::Validation(format!(
            "keyspace '{keyspace}' must be a lowercase SQL identifier"
        )));
    }

    Ok(())
}

/// Maps a sqlx failure, treating connectivity loss as transient unavailability.
pub(crate) fn map_sqlx_error(action: &str, error: sqlx::Error) -> AppError {
    match &error {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            AppError::Unavailable(format!("failed to {action}: {error}"))
        }
        _ => AppError::Internal(format!("failed to {action}: {error}")),
    }
}

/// Returns true when a DDL error means another session created the object first.
pub(crate) fn is_duplicate_object(error: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(database_error) = error {
        return database_error
            .code()
            .is_some_and(|code| DUPLICATE_OBJECT_CODES.iter().any(|duplicate| *duplicate == code));
    }

    false
}

/// Returns the `synchronous_commit` setting that realises a consistency level for writes.
pub(crate) fn synchronous_commit_statement(consistency: ConsistencyLevel) -> &'static str {
    if consistency.requires_majority() {
        return "SET LOCAL synchronous_commit = remote_apply";
    }

    "SET LOCAL synchronous_commit = local"
}
