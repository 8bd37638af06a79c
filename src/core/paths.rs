use crate::error::{Error, Result};
use std::env;
use std::path::PathBuf;

/// Home directory of the invoking user.
pub fn home() -> Result<PathBuf> {
    let home = env::var("HOME").map_err(|_| {
        Error::internal_unexpected("HOME environment variable not set".to_string())
    })?;
    Ok(PathBuf::from(home))
}

/// Base deckhand config directory (~/.config/deckhand/)
pub fn deckhand() -> Result<PathBuf> {
    Ok(home()?.join(".config").join("deckhand"))
}

/// Global deckhand.json config file path
pub fn deckhand_json() -> Result<PathBuf> {
    Ok(deckhand()?.join("deckhand.json"))
}

/// Default OpenSSH client configuration path (~/.ssh/config)
pub fn ssh_config() -> Result<PathBuf> {
    Ok(home()?.join(".ssh").join("config"))
}
