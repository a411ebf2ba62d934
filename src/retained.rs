//! The small snapshot that survives suspension.
//!
//! Suspension throws away every piece of runtime state. Only the baseline
//! and the last altitude are written here before suspending and read back
//! at initialization.

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::altitude::BaselinePressure;
use crate::error::AltimeterError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetainedState {
    pub baseline: BaselinePressure,
    /// Last known altitude above the baseline, whole metres.
    pub last_altitude_m: i32,
}

pub trait RetainedMemory {
    /// `None` when nothing was retained or the content is unreadable.
    fn load(&mut self) -> Option<RetainedState>;
    fn store(&mut self, state: &RetainedState) -> Result<(), AltimeterError>;
    fn clear(&mut self) -> Result<(), AltimeterError>;
}

/// Retained memory backed by a file, normally on a tmpfs so that it lives
/// through suspension but not through a power loss.
pub struct FileRetained {
    path: PathBuf,
}

impl FileRetained {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileRetained { path: path.into() }
    }
}

impl RetainedMemory for FileRetained {
    fn load(&mut self) -> Option<RetainedState> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("Failed to read retained state {}: {}", self.path.display(), e);
                return None;
            }
        };
        match serde_json::from_str(&text) {
            Ok(state) => Some(state),
            Err(e) => {
                warn!("Discarding corrupt retained state: {}", e);
                None
            }
        }
    }

    fn store(&mut self, state: &RetainedState) -> Result<(), AltimeterError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string(state)?)?;
        Ok(())
    }

    fn clear(&mut self) -> Result<(), AltimeterError> {
        match fs::remove_file(&self.path) {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("jump-altimeter-{}", std::process::id()))
            .join(name)
    }

    fn state() -> RetainedState {
        RetainedState {
            baseline: BaselinePressure {
                primary_hpa: 1009.5,
                secondary_hpa: Some(1009.75),
            },
            last_altitude_m: 3,
        }
    }

    #[test]
    fn test_file_store_and_load() {
        let mut memory = FileRetained::new(scratch_path("store.json"));
        memory.store(&state()).unwrap();
        assert_eq!(memory.load(), Some(state()));
        memory.clear().unwrap();
        assert_eq!(memory.load(), None);
        // Clearing twice is fine.
        memory.clear().unwrap();
    }

    #[test]
    fn test_corrupt_file_is_ignored() {
        let path = scratch_path("corrupt.json");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "{ not json").unwrap();
        let mut memory = FileRetained::new(path);
        assert_eq!(memory.load(), None);
    }
}
