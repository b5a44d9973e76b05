//! Registration, login and account settings.
//!
//! These run against an open [`Database`] and are blocking (Argon2 is
//! deliberately slow), so handlers call them from `spawn_blocking`.

use chrono::Utc;
use thiserror::Error;
use tracing::{info, warn};

use chatterbox_shared::constants::MAX_USERNAME_LEN;
use chatterbox_shared::password::{
    check_strength, hash_password, verify_against_nothing, verify_password,
};
use chatterbox_shared::PasswordError;
use chatterbox_store::{Database, Profile, StoreError, User};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Username already taken")]
    DuplicateUsername,

    #[error("Password must be at least {min} characters")]
    WeakPassword { min: usize },

    #[error("Invalid username: {0}")]
    InvalidUsername(&'static str),

    /// Same error for unknown user and wrong password.
    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Password hashing failed: {0}")]
    Hashing(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<PasswordError> for AuthError {
    fn from(e: PasswordError) -> Self {
        match e {
            PasswordError::TooShort { min } => AuthError::WeakPassword { min },
            PasswordError::Hash(msg) => AuthError::Hashing(msg),
        }
    }
}

/// Trimmed username, or why it is unacceptable.
pub fn validate_username(raw: &str) -> Result<String, AuthError> {
    let username = raw.trim();
    if username.is_empty() {
        return Err(AuthError::InvalidUsername("must not be empty"));
    }
    if username.chars().count() > MAX_USERNAME_LEN {
        return Err(AuthError::InvalidUsername("too long"));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
    {
        return Err(AuthError::InvalidUsername(
            "only letters, digits, '_', '.' and '-' are allowed",
        ));
    }
    Ok(username.to_string())
}

/// Create an account. The password rule is checked before anything else.
pub fn register(
    db: &Database,
    username: &str,
    password: &str,
    profile: Profile,
) -> Result<User, AuthError> {
    check_strength(password)?;
    let username = validate_username(username)?;

    let user = User {
        username,
        password_hash: hash_password(password)?,
        display_name: profile.display_name,
        email: profile.email,
        notifications_enabled: profile.notifications_enabled,
        profile_picture: profile.profile_picture,
        created_at: Utc::now(),
    };
    db.create_user(&user).map_err(|e| match e {
        StoreError::AlreadyExists(_) => AuthError::DuplicateUsername,
        other => AuthError::Store(other),
    })?;

    info!(username = %user.username, "Registered new user");
    Ok(user)
}

pub fn login(db: &Database, username: &str, password: &str) -> Result<User, AuthError> {
    let username = username.trim();
    let Some(user) = db.find_user(username)? else {
        verify_against_nothing(password);
        warn!(username, "Login for unknown user");
        return Err(AuthError::InvalidCredentials);
    };
    if !verify_password(password, &user.password_hash) {
        warn!(username, "Login with wrong password");
        return Err(AuthError::InvalidCredentials);
    }
    Ok(user)
}

/// Replace the profile and, when `new_password` is non-empty, the password.
pub fn update_settings(
    db: &Database,
    username: &str,
    profile: &Profile,
    new_password: Option<&str>,
) -> Result<Profile, AuthError> {
    if let Some(password) = new_password.filter(|p| !p.is_empty()) {
        check_strength(password)?;
        db.update_password_hash(username, &hash_password(password)?)?;
        info!(username, "Password changed");
    }
    db.update_profile(username, profile)?;
    Ok(Profile::from(&db.get_user(username)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db() -> Database {
        Database::open_in_memory().unwrap()
    }

    #[test]
    fn test_register_then_login() {
        let db = db();
        register(&db, "alice", "secret1", Profile::default()).unwrap();
        let user = login(&db, " alice ", "secret1").unwrap();
        assert_eq!(user.username, "alice");
        assert_ne!(user.password_hash, "secret1");
    }

    #[test]
    fn test_duplicate_username() {
        let db = db();
        register(&db, "alice", "secret1", Profile::default()).unwrap();
        assert!(matches!(
            register(&db, "alice", "another1", Profile::default()),
            Err(AuthError::DuplicateUsername)
        ));
    }

    #[test]
    fn test_weak_password_checked_first() {
        let db = db();
        let long = "x".repeat(40);
        for username in ["bob", "", "not valid!", long.as_str()] {
            assert!(matches!(
                register(&db, username, "12345", Profile::default()),
                Err(AuthError::WeakPassword { min: 6 })
            ));
        }
    }

    #[test]
    fn test_invalid_username() {
        let db = db();
        let long = "x".repeat(33);
        for username in ["   ", "has space", "semi;colon", long.as_str()] {
            assert!(matches!(
                register(&db, username, "secret1", Profile::default()),
                Err(AuthError::InvalidUsername(_))
            ));
        }
        assert_eq!(validate_username(" a.b-c_d ").unwrap(), "a.b-c_d");
    }

    #[test]
    fn test_login_failures_look_alike() {
        let db = db();
        register(&db, "alice", "secret1", Profile::default()).unwrap();
        let unknown = login(&db, "mallory", "secret1").unwrap_err();
        let wrong = login(&db, "alice", "wrong-pass").unwrap_err();
        assert!(matches!(unknown, AuthError::InvalidCredentials));
        assert_eq!(unknown.to_string(), wrong.to_string());
    }

    #[test]
    fn test_unknown_user_takes_as_long_as_wrong_password() {
        use std::time::Instant;

        let db = db();
        register(&db, "alice", "secret1", Profile::default()).unwrap();

        let started = Instant::now();
        assert!(login(&db, "alice", "wrong-pass").is_err());
        let wrong = started.elapsed();

        let started = Instant::now();
        assert!(login(&db, "mallory", "wrong-pass").is_err());
        let unknown = started.elapsed();

        assert!(
            unknown * 4 >= wrong,
            "unknown user answered in {unknown:?}, wrong password in {wrong:?}"
        );
    }

    #[test]
    fn test_update_settings() {
        let db = db();
        register(&db, "alice", "secret1", Profile::default()).unwrap();
        let profile = Profile {
            display_name: Some("Alice".into()),
            email: Some("alice@example.com".into()),
            notifications_enabled: true,
            profile_picture: None,
        };

        assert!(matches!(
            update_settings(&db, "alice", &profile, Some("123")),
            Err(AuthError::WeakPassword { .. })
        ));
        let saved = update_settings(&db, "alice", &profile, Some("newsecret")).unwrap();
        assert_eq!(saved, profile);
        assert!(login(&db, "alice", "newsecret").is_ok());
        assert!(login(&db, "alice", "secret1").is_err());
    }
}
