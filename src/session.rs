//! Who is logged in, persisted between invocations as `session.json`.
//!
//! The session is an ordinary value: loaded once in `main`, handed to
//! commands that need it, and written back only when it changes.
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Failed to access session file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt session file: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    #[serde(default)]
    pub current_user: Option<String>,
}

impl Session {
    /// Read the session file. A missing or empty file is a logged-out session.
    pub fn load(path: &Path) -> Result<Self, SessionError> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No session file, starting logged out");
                return Ok(Self::default());
            }
            Err(e) => return Err(SessionError::Io(e)),
        };

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        Ok(serde_json::from_str(&content)?)
    }

    /// Write the session via a temp file and rename, so a crash never leaves
    /// a half-written file behind.
    pub fn save(&self, path: &Path) -> Result<(), SessionError> {
        let json = serde_json::to_vec_pretty(self)?;

        use std::time::{SystemTime, UNIX_EPOCH};
        let suffix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        let temp_path = path.with_extension(format!("tmp.{:016x}", suffix));

        let result = (|| -> std::io::Result<()> {
            let mut file = std::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&temp_path)?;
            file.write_all(&json)?;
            file.sync_all()?;
            std::fs::rename(&temp_path, path)
        })();

        if let Err(e) = result {
            let _ = std::fs::remove_file(&temp_path);
            return Err(SessionError::Io(e));
        }

        tracing::debug!(path = %path.display(), user = ?self.current_user, "Saved session");
        Ok(())
    }

    pub fn login(&mut self, name: &str) {
        self.current_user = Some(name.to_string());
    }

    pub fn logout(&mut self) {
        self.current_user = None;
    }

    pub fn is_current(&self, name: &str) -> bool {
        self.current_user.as_deref() == Some(name)
    }
}
