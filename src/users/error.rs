use thiserror::Error;

/// Failures of the user repository. Absence is not an error; lookups return
/// `Ok(None)`.
#[derive(Debug, Error)]
pub enum UserError {
    /// A uniqueness constraint (`email` or `user_id`) rejected the row.
    #[error("user already exists ({0})")]
    Conflict(String),

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

impl UserError {
    /// Classify a driver error, turning unique violations into `Conflict`.
    pub fn from_insert(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if let Some(constraint) =
                unique_violation(db_err.code().as_deref(), db_err.constraint())
            {
                return UserError::Conflict(constraint);
            }
        }
        UserError::Storage(err)
    }
}

/// Name of the violated constraint when `code` is SQLSTATE 23505.
fn unique_violation(code: Option<&str>, constraint: Option<&str>) -> Option<String> {
    (code == Some("23505")).then(|| constraint.unwrap_or("unique").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_database_errors_are_storage() {
        assert!(matches!(
            UserError::from_insert(sqlx::Error::PoolTimedOut),
            UserError::Storage(sqlx::Error::PoolTimedOut)
        ));
        assert!(matches!(
            UserError::from_insert(sqlx::Error::RowNotFound),
            UserError::Storage(_)
        ));
    }

    #[test]
    fn unique_violation_names_the_constraint() {
        assert_eq!(
            unique_violation(Some("23505"), Some("users_email_key")).as_deref(),
            Some("users_email_key")
        );
        assert_eq!(
            unique_violation(Some("23505"), Some("users_user_id_key")).as_deref(),
            Some("users_user_id_key")
        );
        assert_eq!(unique_violation(Some("23505"), None).as_deref(), Some("unique"));
    }

    #[test]
    fn other_sqlstates_are_not_conflicts() {
        // foreign key, not null, check, connection failure
        for code in ["23503", "23502", "23514", "08006"] {
            assert_eq!(unique_violation(Some(code), Some("users_email_key")), None);
        }
        assert_eq!(unique_violation(None, None), None);
    }

    #[test]
    fn conflict_message_names_constraint() {
        let err = UserError::Conflict("users_email_key".into());
        assert_eq!(err.to_string(), "user already exists (users_email_key)");
    }
}
