/// Application name
pub const APP_NAME: &str = "Chatterbox";

/// XChaCha20-Poly1305 nonce size in bytes
pub const NONCE_SIZE: usize = 24;

/// Symmetric key size in bytes (for XChaCha20-Poly1305)
pub const SYMMETRIC_KEY_SIZE: usize = 32;

/// Passwords shorter than this are rejected at registration
pub const MIN_PASSWORD_LEN: usize = 6;

/// Longest accepted username
pub const MAX_USERNAME_LEN: usize = 32;

/// Argon2 salt length in bytes
pub const PASSWORD_SALT_SIZE: usize = 16;

/// Conversation titles are cut to this many characters
pub const MAX_TITLE_LEN: usize = 60;

/// Default HTTP port (server)
pub const DEFAULT_HTTP_PORT: u16 = 5000;

/// Key derivation contexts (BLAKE3)
pub const KDF_CONTEXT_REMEMBER_KEY: &str = "chatterbox-remember-v1";
