//! Alias storage: trait + file-backed and in-memory implementations.
//!
//! The file-backed store keeps the whole overlay in memory and rewrites a
//! single JSON object on every change:
//!
//! ```text
//! {
//!   "00:11:22:33:44:55": "printer",
//!   "a4:83:e7:00:00:01": "living room tv"
//! }
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use hostwatch_core::MacAddr;

/// Errors that can occur while loading or persisting aliases.
#[derive(Debug, thiserror::Error)]
pub enum AliasError {
    #[error("Invalid hardware address {mac:?} in alias file {path}")]
    InvalidMac { mac: String, path: PathBuf },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Trait for alias overlay backends.
///
/// `get` and `set` are called while the registry holds its state lock, so
/// implementations must return quickly and must not call back into it.
pub trait AliasStore: Send + Sync {
    /// Replace the in-memory overlay with the backing content and return a copy.
    fn load(&self) -> Result<HashMap<MacAddr, String>, AliasError>;

    /// The name registered for `mac`, if any.
    fn get(&self, mac: &MacAddr) -> Option<String>;

    /// Register `name` for `mac`. An empty name removes the entry.
    fn set(&self, mac: &MacAddr, name: &str) -> Result<(), AliasError>;
}

/// Overlay persisted as a JSON file.
///
/// The file is only rewritten once its current content has been read
/// successfully, so a corrupt or unreadable file is never clobbered.
pub struct FileAliasStore {
    path: PathBuf,
    overlay: RwLock<Overlay>,
}

#[derive(Default)]
struct Overlay {
    entries: HashMap<MacAddr, String>,
    synced: bool,
}

impl FileAliasStore {
    /// Create a store backed by `path`. Nothing is read until [`AliasStore::load`].
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            overlay: RwLock::new(Overlay::default()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> RwLockReadGuard<'_, Overlay> {
        self.overlay.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Overlay> {
        self.overlay.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn read_file(&self) -> Result<HashMap<MacAddr, String>, AliasError> {
        let json = match fs::read_to_string(&self.path) {
            Ok(json) => json,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(e) => return Err(e.into()),
        };
        if json.trim().is_empty() {
            return Ok(HashMap::new());
        }

        let raw: BTreeMap<String, String> = serde_json::from_str(&json)?;
        raw.into_iter()
            .map(|(mac, name)| match mac.parse::<MacAddr>() {
                Ok(parsed) => Ok((parsed, name)),
                Err(_) => Err(AliasError::InvalidMac {
                    mac,
                    path: self.path.clone(),
                }),
            })
            .collect()
    }

    fn write_file(&self, aliases: &HashMap<MacAddr, String>) -> Result<(), AliasError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let sorted: BTreeMap<String, &String> =
            aliases.iter().map(|(mac, name)| (mac.to_string(), name)).collect();
        let json = serde_json::to_string_pretty(&sorted)?;
        fs::write(&self.path, json)?;

        tracing::debug!(
            path = %self.path.display(),
            count = aliases.len(),
            "Aliases saved"
        );

        Ok(())
    }
}

impl AliasStore for FileAliasStore {
    fn load(&self) -> Result<HashMap<MacAddr, String>, AliasError> {
        let mut overlay = self.write();
        overlay.synced = false;
        let loaded = self.read_file()?;
        overlay.entries = loaded.clone();
        overlay.synced = true;

        tracing::debug!(
            path = %self.path.display(),
            count = loaded.len(),
            "Aliases loaded"
        );

        Ok(loaded)
    }

    fn get(&self, mac: &MacAddr) -> Option<String> {
        self.read().entries.get(mac).cloned()
    }

    /// Fails without writing if the file on disk cannot be read back first.
    fn set(&self, mac: &MacAddr, name: &str) -> Result<(), AliasError> {
        let mut overlay = self.write();
        if !overlay.synced {
            let on_disk = self.read_file()?;
            for (existing, alias) in on_disk {
                overlay.entries.entry(existing).or_insert(alias);
            }
            overlay.synced = true;
        }

        if name.is_empty() {
            overlay.entries.remove(mac);
        } else {
            overlay.entries.insert(*mac, name.to_string());
        }
        self.write_file(&overlay.entries)
    }
}

/// Overlay with no backing file.
#[derive(Default)]
pub struct MemoryAliasStore {
    aliases: RwLock<HashMap<MacAddr, String>>,
}

impl MemoryAliasStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store; the entries are what `load` returns.
    pub fn with_aliases(aliases: impl IntoIterator<Item = (MacAddr, String)>) -> Self {
        Self {
            aliases: RwLock::new(aliases.into_iter().collect()),
        }
    }
}

impl AliasStore for MemoryAliasStore {
    fn load(&self) -> Result<HashMap<MacAddr, String>, AliasError> {
        Ok(self
            .aliases
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn get(&self, mac: &MacAddr) -> Option<String> {
        self.aliases
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(mac)
            .cloned()
    }

    fn set(&self, mac: &MacAddr, name: &str) -> Result<(), AliasError> {
        let mut aliases = self.aliases.write().unwrap_or_else(PoisonError::into_inner);
        if name.is_empty() {
            aliases.remove(mac);
        } else {
            aliases.insert(*mac, name.to_string());
        }
        Ok(())
    }
}
