use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChatterboxError {
    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Encryption failed")]
    EncryptionFailed,

    #[error("Decryption failed: invalid ciphertext or wrong key")]
    DecryptionFailed,

    #[error("Invalid encoding: {0}")]
    Encoding(#[from] hex::FromHexError),

    #[error("Snapshot expired")]
    Expired,
}

#[derive(Error, Debug)]
pub enum PasswordError {
    #[error("Password must be at least {min} characters")]
    TooShort { min: usize },

    #[error("Password hashing failed: {0}")]
    Hash(String),
}
