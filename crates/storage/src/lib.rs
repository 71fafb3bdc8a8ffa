use directories::ProjectDirs;
use doc_model::HighlightStyle;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use worklist::{MalformedPolicy, DEFAULT_EXEMPT_MARKER};

const PROFILE_SCHEMA_VERSION: u32 = 1;
const PROFILE_FILE: &str = "profile.json";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("unable to resolve local config directory")]
    NoConfigDirectory,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("profile schema version {found} is newer than supported version {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },
}

/// Run settings shared by every invocation. Command-line flags take precedence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Profile {
    pub uan_column: String,
    pub esi_column: String,
    pub skip_rows: usize,
    pub exempt_marker: String,
    pub malformed: MalformedPolicy,
    pub style: HighlightStyle,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            uan_column: "UAN No.".to_owned(),
            esi_column: "ESI No".to_owned(),
            skip_rows: 6,
            exempt_marker: DEFAULT_EXEMPT_MARKER.to_owned(),
            malformed: MalformedPolicy::Skip,
            style: HighlightStyle::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Storage {
    path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ProfileEnvelope {
    version: u32,
    profile: Profile,
}

impl Storage {
    pub fn from_default_project() -> Result<Self, StorageError> {
        let dirs = ProjectDirs::from("dev", "UanMarker", "uan-marker")
            .ok_or(StorageError::NoConfigDirectory)?;

        Ok(Self::with_root(dirs.config_dir()))
    }

    pub fn with_root(root: impl AsRef<Path>) -> Self {
        Self { path: root.as_ref().join(PROFILE_FILE) }
    }

    /// Use an explicit profile file instead of the per-user location.
    pub fn at_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn profile_path(&self) -> &Path {
        &self.path
    }

    pub fn load_profile(&self) -> Result<Profile, StorageError> {
        if !self.path.exists() {
            log::debug!("no profile at {}, using defaults", self.path.display());
            return Ok(Profile::default());
        }

        let bytes = fs::read(&self.path)?;
        let envelope: ProfileEnvelope = serde_json::from_slice(&bytes)?;
        if envelope.version > PROFILE_SCHEMA_VERSION {
            return Err(StorageError::UnsupportedVersion {
                found: envelope.version,
                supported: PROFILE_SCHEMA_VERSION,
            });
        }

        Ok(envelope.profile)
    }

    pub fn save_profile(&self, profile: &Profile) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let envelope = ProfileEnvelope { version: PROFILE_SCHEMA_VERSION, profile: profile.clone() };

        let bytes = serde_json::to_vec_pretty(&envelope)?;
        fs::write(&self.path, bytes)?;
        Ok(())
    }

    /// Remove the stored profile. Returns whether a file was removed.
    pub fn reset_profile(&self) -> Result<bool, StorageError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }
}
