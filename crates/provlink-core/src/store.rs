//! Credential persistence.
//!
//! A single `{ssid, password}` record on non-volatile storage. Absence of
//! the record is a valid, expected state (first boot). Saves are verified
//! by read-back; missing or corrupt storage loads as absent instead of
//! erroring.

use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use thiserror::Error;
use tracing::warn;

use crate::types::Credentials;

/// Errors that can occur while saving credentials.
///
/// Load never errors: a missing or corrupt record is reported as absent.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying storage could not be written or read back.
    #[error("credential storage I/O error: {0}")]
    Io(#[from] io::Error),

    /// The record could not be encoded.
    #[error("failed to encode credentials: {0}")]
    Encode(#[from] serde_json::Error),

    /// The record read back after a save did not match what was written.
    #[error("read-back verification failed: stored ssid does not match")]
    VerifyMismatch,
}

/// Abstract single-record credential storage.
///
/// Implementations provide platform-specific storage mechanisms:
/// - [`FileCredentialStore`] for hosted targets (JSON file)
/// - [`MemoryCredentialStore`] for tests and the simulator
///
/// All methods are synchronous to support embedded platforms.
pub trait CredentialStore: Send + Sync {
    /// Load the stored credentials, or `None` if absent or unreadable.
    fn load(&self) -> Option<Credentials>;

    /// Persist credentials, verifying the SSID round-trips through storage.
    fn save(&self, credentials: &Credentials) -> Result<(), StoreError>;

    /// Erase the persisted record. Returns whether a record existed.
    fn erase(&self) -> bool;
}

/// File-backed credential store persisting one JSON record.
#[derive(Debug)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    /// Create a store backed by the given file path. The file need not
    /// exist yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> Option<Credentials> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return None,
            Err(err) => {
                warn!("failed to read credential store {:?}: {}", self.path, err);
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(credentials) => Some(credentials),
            Err(err) => {
                warn!("corrupt credential record in {:?}: {}", self.path, err);
                None
            }
        }
    }

    fn save(&self, credentials: &Credentials) -> Result<(), StoreError> {
        let encoded = serde_json::to_string(credentials)?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, encoded)?;

        // Read back to confirm the record survived the write.
        let stored: Credentials =
            serde_json::from_str(&std::fs::read_to_string(&self.path)?)?;
        if stored.ssid != credentials.ssid {
            return Err(StoreError::VerifyMismatch);
        }
        Ok(())
    }

    fn erase(&self) -> bool {
        std::fs::remove_file(&self.path).is_ok()
    }
}

/// In-memory credential store for tests and the hosted simulator.
///
/// `set_fail_saves(true)` makes every subsequent save fail, for exercising
/// the persistence-failure paths.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    record: Mutex<Option<Credentials>>,
    fail_saves: AtomicBool,
}

impl MemoryCredentialStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent save fail with an I/O error.
    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    fn record(&self) -> std::sync::MutexGuard<'_, Option<Credentials>> {
        self.record.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self) -> Option<Credentials> {
        self.record().clone()
    }

    fn save(&self, credentials: &Credentials) -> Result<(), StoreError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(StoreError::Io(io::Error::other("simulated write failure")));
        }
        *self.record() = Some(credentials.clone());
        Ok(())
    }

    fn erase(&self) -> bool {
        self.record().take().is_some()
    }
}
