//! Credential store: CRUD operations for [`User`] records.

use rusqlite::{params, ErrorCode, OptionalExtension};

use crate::database::{format_ts, parse_ts, Database};
use crate::error::{Result, StoreError};
use crate::models::{Profile, User};

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Insert a new user. Fails with [`StoreError::AlreadyExists`] when the
    /// username is taken.
    pub fn create_user(&self, user: &User) -> Result<()> {
        self.conn()
            .execute(
                "INSERT INTO users (username, password_hash, display_name, email,
                                    notifications_enabled, profile_picture, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    user.username,
                    user.password_hash,
                    user.display_name,
                    user.email,
                    user.notifications_enabled,
                    user.profile_picture,
                    format_ts(&user.created_at),
                ],
            )
            .map_err(|e| match e {
                rusqlite::Error::SqliteFailure(err, _)
                    if err.code == ErrorCode::ConstraintViolation =>
                {
                    StoreError::AlreadyExists(user.username.clone())
                }
                other => StoreError::Sqlite(other),
            })?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Fetch a user by username.
    pub fn get_user(&self, username: &str) -> Result<User> {
        self.find_user(username)?.ok_or(StoreError::NotFound)
    }

    /// Fetch a user by username, `None` when absent.
    pub fn find_user(&self, username: &str) -> Result<Option<User>> {
        let user = self
            .conn()
            .query_row(
                "SELECT username, password_hash, display_name, email,
                        notifications_enabled, profile_picture, created_at
                 FROM users
                 WHERE username = ?1",
                params![username],
                row_to_user,
            )
            .optional()?;
        Ok(user)
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    /// Replace the profile fields of a user.
    pub fn update_profile(&self, username: &str, profile: &Profile) -> Result<()> {
        let affected = self.conn().execute(
            "UPDATE users
             SET display_name = ?1, email = ?2, notifications_enabled = ?3, profile_picture = ?4
             WHERE username = ?5",
            params![
                profile.display_name,
                profile.email,
                profile.notifications_enabled,
                profile.profile_picture,
                username,
            ],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    /// Store a new password hash.
    pub fn update_password_hash(&self, username: &str, password_hash: &str) -> Result<()> {
        let affected = self.conn().execute(
            "UPDATE users SET password_hash = ?1 WHERE username = ?2",
            params![password_hash, username],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    let created_str: String = row.get(6)?;

    Ok(User {
        username: row.get(0)?,
        password_hash: row.get(1)?,
        display_name: row.get(2)?,
        email: row.get(3)?,
        notifications_enabled: row.get(4)?,
        profile_picture: row.get(5)?,
        created_at: parse_ts(6, &created_str)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn user(name: &str) -> User {
        User {
            username: name.to_string(),
            password_hash: "$argon2id$placeholder".to_string(),
            display_name: None,
            email: None,
            notifications_enabled: true,
            profile_picture: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn create_and_fetch() {
        let db = Database::open_in_memory().unwrap();
        db.create_user(&user("alice")).unwrap();

        let fetched = db.get_user("alice").unwrap();
        assert_eq!(fetched.username, "alice");
        assert!(fetched.notifications_enabled);
        assert!(db.find_user("bob").unwrap().is_none());
        assert!(matches!(db.get_user("bob"), Err(StoreError::NotFound)));
    }

    #[test]
    fn duplicate_username_rejected() {
        let db = Database::open_in_memory().unwrap();
        db.create_user(&user("alice")).unwrap();

        let err = db.create_user(&user("alice")).unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(name) if name == "alice"));
    }

    #[test]
    fn profile_update() {
        let db = Database::open_in_memory().unwrap();
        db.create_user(&user("alice")).unwrap();

        let profile = Profile {
            display_name: Some("Alice".into()),
            email: Some("alice@example.com".into()),
            notifications_enabled: false,
            profile_picture: Some("alice.png".into()),
        };
        db.update_profile("alice", &profile).unwrap();

        let fetched = db.get_user("alice").unwrap();
        assert_eq!(Profile::from(&fetched), profile);
        assert!(matches!(
            db.update_profile("nobody", &profile),
            Err(StoreError::NotFound)
        ));
    }

    #[test]
    fn password_hash_update() {
        let db = Database::open_in_memory().unwrap();
        db.create_user(&user("alice")).unwrap();
        db.update_password_hash("alice", "$argon2id$new").unwrap();
        assert_eq!(db.get_user("alice").unwrap().password_hash, "$argon2id$new");
    }
}
