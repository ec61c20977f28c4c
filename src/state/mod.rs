//! # State Store
//!
//! One JSON file per mount holding a versioned [`StateRecord`] envelope.
//!
//! Loading a record written under an older schema upgrades it and writes the
//! upgraded envelope back, so each record is migrated once. The file is the
//! only place write-only attributes such as `private_key` survive between
//! runs; it is created with owner-only permissions on Unix.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::errors::{CaError, Result};
use crate::resource::{upgrade_record, CaState, MountPath, StateRecord};

const EXTENSION: &str = "json";

/// File-backed store of CA state records
#[derive(Debug, Clone)]
pub struct FileStateStore {
    dir: PathBuf,
}

/// Encode a mount path as a single file name component
fn encode_file_stem(mount: &MountPath) -> String {
    let mut stem = String::with_capacity(mount.as_str().len());
    for byte in mount.as_str().bytes() {
        match byte {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'-' | b'_' | b'.' => {
                stem.push(byte as char)
            }
            other => stem.push_str(&format!("%{:02X}", other)),
        }
    }
    stem
}

fn decode_file_stem(stem: &str) -> Option<String> {
    let mut bytes = Vec::with_capacity(stem.len());
    let mut rest = stem.as_bytes();
    while let Some((&byte, tail)) = rest.split_first() {
        if byte == b'%' {
            let hex = tail.get(..2)?;
            bytes.push(u8::from_str_radix(std::str::from_utf8(hex).ok()?, 16).ok()?);
            rest = &tail[2..];
        } else {
            bytes.push(byte);
            rest = tail;
        }
    }
    String::from_utf8(bytes).ok()
}

impl FileStateStore {
    /// Create a store rooted at `dir`; the directory is created on first save
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File holding the state of `mount`
    pub fn path_for(&self, mount: &MountPath) -> PathBuf {
        self.dir.join(format!("{}.{}", encode_file_stem(mount), EXTENSION))
    }

    /// Raw envelope as stored, without upgrading
    pub fn load_record(&self, mount: &MountPath) -> Result<Option<StateRecord>> {
        let path = self.path_for(mount);
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(CaError::io(format!("Failed to read state file {}", path.display()), e))
            }
        };

        serde_json::from_str(&contents).map(Some).map_err(|e| {
            CaError::serialization(format!("Failed to parse state file {}", path.display()), e)
        })
    }

    /// Typed state of `mount`, upgrading and persisting older records
    pub fn load(&self, mount: &MountPath) -> Result<Option<CaState>> {
        let Some(record) = self.load_record(mount)? else {
            debug!(backend = %mount, "No stored state");
            return Ok(None);
        };

        let from_version = record.schema_version;
        let (record, upgraded) = upgrade_record(record)?;
        if record.id != mount.as_str() {
            return Err(CaError::state_shape(
                record.schema_version,
                format!("state file for '{}' holds resource '{}'", mount, record.id),
            ));
        }
        if upgraded {
            self.save_record(mount, &record)?;
            info!(
                backend = %mount,
                from_version,
                to_version = record.schema_version,
                "Upgraded stored state"
            );
        }

        record.into_state().map(Some)
    }

    /// Persist `state` under its mount
    pub fn save(&self, state: &CaState) -> Result<PathBuf> {
        let record = StateRecord::from_state(state)?;
        self.save_record(&state.backend, &record)
    }

    /// Write `record` atomically through a temporary file and a rename
    pub fn save_record(&self, mount: &MountPath, record: &StateRecord) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir).map_err(|e| {
            CaError::io(format!("Failed to create state directory {}", self.dir.display()), e)
        })?;

        let path = self.path_for(mount);
        let temp = path.with_extension(format!("{}.tmp", EXTENSION));
        let contents = serde_json::to_string_pretty(record)
            .map_err(|e| CaError::serialization("Failed to serialize state record", e))?;

        fs::write(&temp, contents)
            .map_err(|e| CaError::io(format!("Failed to write {}", temp.display()), e))?;
        restrict_permissions(&temp)?;
        fs::rename(&temp, &path)
            .map_err(|e| CaError::io(format!("Failed to replace {}", path.display()), e))?;

        debug!(backend = %mount, path = %path.display(), "Saved state");
        Ok(path)
    }

    /// Remove the state of `mount`; returns whether a file existed
    pub fn remove(&self, mount: &MountPath) -> Result<bool> {
        let path = self.path_for(mount);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(CaError::io(format!("Failed to remove {}", path.display()), e)),
        }
    }

    /// Mounts with stored state, sorted
    pub fn list(&self) -> Result<Vec<MountPath>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(CaError::io(
                    format!("Failed to list state directory {}", self.dir.display()),
                    e,
                ))
            }
        };

        let mut mounts = Vec::new();
        for entry in entries {
            let path = entry
                .map_err(|e| CaError::io("Failed to read state directory entry", e))?
                .path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(EXTENSION) {
                continue;
            }
            let decoded = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(decode_file_stem)
                .and_then(|stem| MountPath::new(stem).ok());
            match decoded {
                Some(mount) => mounts.push(mount),
                None => debug!(path = %path.display(), "Skipping unrecognised state file"),
            }
        }
        mounts.sort();
        Ok(mounts)
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
        .map_err(|e| CaError::io(format!("Failed to set permissions on {}", path.display()), e))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::CaConfigInput;
    use tempfile::TempDir;

    fn state(backend: &str) -> CaState {
        let input = CaConfigInput {
            backend: backend.to_string(),
            generate_signing_key: true,
            ..CaConfigInput::default()
        };
        CaState::from_applied(&input.validate().unwrap(), Some("ssh-rsa AAAA".to_string()))
    }

    #[test]
    fn test_file_stem_round_trip() {
        let mount = MountPath::new("team.x/ssh-1_a%b").unwrap();
        let stem = encode_file_stem(&mount);
        assert!(!stem.contains('/'));
        assert_eq!(decode_file_stem(&stem).as_deref(), Some(mount.as_str()));
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let store = FileStateStore::new(dir.path());
        let saved = state("ssh");

        let path = store.save(&saved).unwrap();
        assert!(path.ends_with("ssh.json"));
        assert_eq!(store.load(&saved.backend).unwrap(), Some(saved));
    }

    #[test]
    fn test_missing_state_is_none() {
        let dir = TempDir::new().unwrap();
        let store = FileStateStore::new(dir.path().join("nested"));
        let mount = MountPath::new("ssh").unwrap();

        assert_eq!(store.load(&mount).unwrap(), None);
        assert!(!store.remove(&mount).unwrap());
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn test_list_decodes_nested_mounts() {
        let dir = TempDir::new().unwrap();
        let store = FileStateStore::new(dir.path());
        store.save(&state("team/ssh")).unwrap();
        store.save(&state("ssh")).unwrap();

        let listed: Vec<_> = store.list().unwrap().into_iter().map(String::from).collect();
        assert_eq!(listed, vec!["ssh".to_string(), "team/ssh".to_string()]);
    }

    #[test]
    fn test_mismatched_id_is_rejected() {
        let dir = TempDir::new().unwrap();
        let store = FileStateStore::new(dir.path());
        let other = state("other");
        let record = StateRecord::from_state(&other).unwrap();
        let mount = MountPath::new("ssh").unwrap();
        store.save_record(&mount, &record).unwrap();

        assert!(store.load(&mount).unwrap_err().is_validation());
    }

    #[cfg(unix)]
    #[test]
    fn test_state_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let store = FileStateStore::new(dir.path());
        let path = store.save(&state("ssh")).unwrap();

        let mode = fs::metadata(path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
