use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Serialize, Deserialize)]
struct SessionFile {
    session_id: String,
}

/// Durable pointer to the current conversation session.
///
/// The id lives in a small JSON file under the user config directory and
/// survives restarts. Persistence is best-effort: when the file can't be
/// read or written the store keeps a process-lifetime in-memory id instead,
/// so callers never have to handle a storage error.
pub struct SessionStore {
    path: Option<PathBuf>,
    current: Option<String>,
}

impl SessionStore {
    pub fn new() -> Self {
        let path = dirs::config_dir().map(|dir| dir.join("wikichat").join("session.json"));
        Self { path, current: None }
    }

    pub fn with_path(path: PathBuf) -> Self {
        Self {
            path: Some(path),
            current: None,
        }
    }

    /// Returns the current session id, loading it from disk or minting a
    /// fresh one when none exists yet. Stable across calls until `set`.
    pub fn get_or_create(&mut self) -> String {
        if let Some(id) = &self.current {
            return id.clone();
        }

        if let Some(id) = self.read_persisted() {
            self.current = Some(id.clone());
            return id;
        }

        let id = generate_session_id();
        self.persist(&id);
        self.current = Some(id.clone());
        id
    }

    /// Makes `id` the current session. Idempotent.
    pub fn set(&mut self, id: &str) {
        if self.current.as_deref() == Some(id) {
            return;
        }
        self.persist(id);
        self.current = Some(id.to_string());
    }

    fn read_persisted(&self) -> Option<String> {
        let path = self.path.as_ref()?;
        let content = fs::read_to_string(path).ok()?;
        let file: SessionFile = serde_json::from_str(&content).ok()?;
        Some(file.session_id)
    }

    fn persist(&self, id: &str) {
        let Some(path) = &self.path else {
            tracing::warn!("no config directory, session id is in-memory only");
            return;
        };

        let write = || -> std::io::Result<()> {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            let file = SessionFile {
                session_id: id.to_string(),
            };
            let content = serde_json::to_string_pretty(&file).unwrap_or_default();
            fs::write(path, content)
        };

        if let Err(e) = write() {
            tracing::warn!("failed to persist session id: {}", e);
        }
    }
}

/// Fresh id with millisecond resolution, unlikely to collide across
/// concurrent instances.
fn generate_session_id() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    format!("session-{}", millis)
}
