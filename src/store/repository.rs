//! Config store: CRUD over the fragment directory, list file and
//! active configuration.
//!
//! Every mutation patches `running.json` in the same call that changes the
//! client set, so the ids admitted by the daemon track the stored clients.
//! Nothing here locks; callers serialize writers.

use std::fs;
use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::codec::{self, ClientDescriptor, DecodedLink};
use crate::config::{Settings, StorageConfig};
use crate::store::active::ActiveConfig;
use crate::store::error::StoreError;
use crate::store::files::{read_json, read_lines, remove_if_exists, write_json, write_lines};

/// Name given to the client generated when no usable active configuration exists.
pub const DEFAULT_CLIENT_NAME: &str = "default";

/// Resolved locations of the store's files.
#[derive(Debug, Clone)]
pub struct StorePaths {
    pub config_dir: PathBuf,
    pub list_file: PathBuf,
    pub running_file: PathBuf,
}

impl From<&StorageConfig> for StorePaths {
    fn from(storage: &StorageConfig) -> Self {
        Self {
            config_dir: storage.config_dir(),
            list_file: storage.list_file(),
            running_file: storage.running_file(),
        }
    }
}

/// A freshly created client and its share link.
#[derive(Debug, Clone)]
pub struct CreatedClient {
    pub descriptor: ClientDescriptor,
    pub link: String,
}

/// What a delete actually touched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteOutcome {
    /// The fragment file existed and was removed.
    pub fragment_removed: bool,
    /// Client id recovered from the fragment.
    pub identity: Option<String>,
    /// Lines dropped from the list file.
    pub list_entries_removed: usize,
    /// The id was present in, and removed from, the active configuration.
    pub active_updated: bool,
}

/// What a clear actually touched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClearOutcome {
    pub fragments_removed: usize,
    pub fragment_failures: usize,
}

pub struct ConfigStore {
    paths: StorePaths,
}

impl ConfigStore {
    pub fn new(paths: StorePaths) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &StorePaths {
        &self.paths
    }

    /// Path handed to the daemon on every start.
    pub fn running_file(&self) -> &Path {
        &self.paths.running_file
    }

    /// Create the fragment directory and an empty list file if missing.
    pub fn ensure_layout(&self) -> Result<(), StoreError> {
        fs::create_dir_all(&self.paths.config_dir).map_err(StoreError::io(&self.paths.config_dir))?;
        for file in [&self.paths.list_file, &self.paths.running_file] {
            if let Some(parent) = file.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent).map_err(StoreError::io(parent))?;
            }
        }
        if !self.paths.list_file.exists() {
            fs::write(&self.paths.list_file, "").map_err(StoreError::io(&self.paths.list_file))?;
        }
        Ok(())
    }

    /// Every stored token, decoded, in insertion order.
    pub fn list(&self) -> Result<Vec<DecodedLink>, StoreError> {
        Ok(read_lines(&self.paths.list_file)?
            .iter()
            .map(|line| codec::decode(line))
            .collect())
    }

    /// First stored client whose name equals `name`.
    pub fn find(&self, name: &str) -> Result<Option<DecodedLink>, StoreError> {
        Ok(self.list()?.into_iter().find(|link| link.name() == Some(name)))
    }

    fn fragment_path(&self, name: &str) -> PathBuf {
        self.paths.config_dir.join(format!("{name}.json"))
    }

    /// Register a new client.
    ///
    /// Fails with [`StoreError::AlreadyExists`] before touching any file if a
    /// fragment for `name` is already present.
    pub fn create(&self, name: &str, settings: &Settings) -> Result<CreatedClient, StoreError> {
        validate_name(name)?;

        let fragment = self.fragment_path(name);
        if fragment.exists() {
            return Err(StoreError::AlreadyExists(name.to_string()));
        }

        let id = Uuid::new_v4();
        let port = settings.vmess_port;
        let mut active = self.load_active_or_base(port)?;

        write_json(&fragment, &ActiveConfig::single_client(port, id))?;

        let descriptor = ClientDescriptor::tcp(name, settings.ip.clone(), port, id);
        let link = codec::encode(&descriptor).map_err(StoreError::json(&self.paths.list_file))?;
        let mut lines = read_lines(&self.paths.list_file)?;
        lines.push(link.clone());
        write_lines(&self.paths.list_file, &lines)?;

        active.add_client(id, port);
        write_json(&self.paths.running_file, &active)?;

        tracing::info!(name = %name, id = %id, path = %fragment.display(), "Client created");
        Ok(CreatedClient { descriptor, link })
    }

    /// Remove a client. Missing pieces are skipped, never reported as errors.
    pub fn delete(&self, name: &str) -> Result<DeleteOutcome, StoreError> {
        validate_name(name)?;

        let mut outcome = DeleteOutcome::default();
        let fragment = self.fragment_path(name);

        match read_json::<ActiveConfig>(&fragment) {
            Ok(Some(doc)) => outcome.identity = doc.client_ids().into_iter().next(),
            Ok(None) => {}
            Err(e) => tracing::warn!(name = %name, error = %e, "Fragment unreadable, deleting anyway"),
        }
        outcome.fragment_removed = remove_if_exists(&fragment)?;

        let lines = read_lines(&self.paths.list_file)?;
        let kept: Vec<String> = lines
            .iter()
            .filter(|line| codec::decode(line).name() != Some(name))
            .cloned()
            .collect();
        outcome.list_entries_removed = lines.len() - kept.len();
        if outcome.list_entries_removed > 0 {
            write_lines(&self.paths.list_file, &kept)?;
        }

        if let Some(id) = &outcome.identity {
            match read_json::<ActiveConfig>(&self.paths.running_file) {
                Ok(Some(mut active)) => {
                    if active.remove_client(id) {
                        write_json(&self.paths.running_file, &active)?;
                        outcome.active_updated = true;
                    }
                }
                Ok(None) => {}
                Err(e) => tracing::warn!(error = %e, "Active configuration unreadable, client id left in place"),
            }
        }

        tracing::info!(
            name = %name,
            fragment_removed = outcome.fragment_removed,
            list_entries_removed = outcome.list_entries_removed,
            active_updated = outcome.active_updated,
            "Client deleted"
        );
        Ok(outcome)
    }

    /// Drop every client and reset the active configuration to `port`.
    pub fn clear(&self, port: u16) -> Result<ClearOutcome, StoreError> {
        write_lines(&self.paths.list_file, &[])?;
        write_json(&self.paths.running_file, &ActiveConfig::base(port))?;

        let mut outcome = ClearOutcome::default();
        let entries = match fs::read_dir(&self.paths.config_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(outcome),
            Err(e) => return Err(StoreError::io(&self.paths.config_dir)(e)),
        };

        for entry in entries.flatten() {
            let path = entry.path();
            match fs::remove_file(&path) {
                Ok(()) => outcome.fragments_removed += 1,
                Err(e) => {
                    outcome.fragment_failures += 1;
                    tracing::warn!(path = %path.display(), error = %e, "Failed to remove fragment");
                }
            }
        }

        tracing::info!(
            fragments_removed = outcome.fragments_removed,
            fragment_failures = outcome.fragment_failures,
            "All clients cleared"
        );
        Ok(outcome)
    }

    /// Move the active listener to `port`. Fragments keep their old port.
    pub fn update_listener_port(&self, port: u16) -> Result<(), StoreError> {
        let mut active = self.load_active_or_base(port)?;
        active.set_listener_port(port);
        write_json(&self.paths.running_file, &active)?;
        tracing::info!(port, "Listener port updated");
        Ok(())
    }

    /// Patch the active listener if it drifted from `port`.
    ///
    /// Returns whether the file was rewritten. A missing or unreadable file
    /// is left alone.
    pub fn sync_listener_port(&self, port: u16) -> Result<bool, StoreError> {
        let mut active = match read_json::<ActiveConfig>(&self.paths.running_file) {
            Ok(Some(active)) => active,
            Ok(None) => return Ok(false),
            Err(e) if e.is_parse() => return Ok(false),
            Err(e) => return Err(e),
        };

        match active.listener_port() {
            Some(current) if current != port => {
                active.set_listener_port(port);
                write_json(&self.paths.running_file, &active)?;
                tracing::info!(from = current, to = port, "Active listener port synced");
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Ensure a usable active configuration exists.
    ///
    /// When the file is missing, empty, not JSON or has no inbounds, a
    /// `default` client is generated and becomes the only stored client.
    /// Well-formed JSON of an unexpected shape is reported, never replaced.
    pub fn bootstrap(&self, settings: &Settings) -> Result<Option<CreatedClient>, StoreError> {
        let usable = match read_json::<ActiveConfig>(&self.paths.running_file) {
            Ok(Some(active)) => !active.inbounds.is_empty(),
            Ok(None) => false,
            Err(e) if e.is_syntax() => {
                tracing::warn!(error = %e, "Active configuration is not valid JSON, regenerating");
                false
            }
            Err(e) => return Err(e),
        };
        if usable {
            return Ok(None);
        }

        let id = Uuid::new_v4();
        let port = settings.vmess_port;
        let active = ActiveConfig::single_client(port, id);
        write_json(&self.paths.running_file, &active)?;
        write_json(&self.fragment_path(DEFAULT_CLIENT_NAME), &active)?;

        let descriptor = ClientDescriptor::tcp(DEFAULT_CLIENT_NAME, settings.ip.clone(), port, id);
        let link = codec::encode(&descriptor).map_err(StoreError::json(&self.paths.list_file))?;
        write_lines(&self.paths.list_file, std::slice::from_ref(&link))?;

        tracing::info!(id = %id, port, "Initialized active configuration with a default client");
        Ok(Some(CreatedClient { descriptor, link }))
    }

    /// Client ids currently admitted by the active configuration.
    pub fn active_client_ids(&self) -> Result<Vec<String>, StoreError> {
        Ok(read_json::<ActiveConfig>(&self.paths.running_file)?
            .map(|active| active.client_ids())
            .unwrap_or_default())
    }

    fn load_active_or_base(&self, port: u16) -> Result<ActiveConfig, StoreError> {
        match read_json::<ActiveConfig>(&self.paths.running_file) {
            Ok(Some(active)) => Ok(active),
            Ok(None) => Ok(ActiveConfig::base(port)),
            Err(e) if e.is_syntax() => {
                tracing::warn!(error = %e, "Active configuration is not valid JSON, starting from base");
                Ok(ActiveConfig::base(port))
            }
            Err(e) => Err(e),
        }
    }
}

/// Names become file names; reject anything that could escape the
/// fragment directory.
fn validate_name(name: &str) -> Result<(), StoreError> {
    let invalid = name.is_empty()
        || name != name.trim()
        || name == "."
        || name == ".."
        || name.chars().any(|c| c == '/' || c == '\\' || c.is_control());
    if invalid {
        return Err(StoreError::InvalidName(name.to_string()));
    }
    Ok(())
}
