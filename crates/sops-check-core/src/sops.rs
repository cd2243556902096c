//! Discovery of SOPS encrypted files and extraction of their trust anchors.
//!
//! Only the `sops` metadata of a file is read; the encrypted payload is never
//! touched. YAML and JSON files carry the metadata as a top-level `sops`
//! mapping. dotenv and INI files carry it as flattened keys (`sops_`-prefixed
//! keys, or keys of the `[sops]` section) which are unflattened first:
//!
//! ```text
//! sops_age__list_0__map_recipient=age1...   →   sops: { age: [ { recipient: age1... } ] }
//! ```

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Errors that can occur while discovering SOPS files.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// Walking the directory tree failed.
    #[error("failed to walk directory")]
    Walk(#[from] walkdir::Error),

    /// An ignore file could not be read or parsed.
    #[error("failed to process ignore file")]
    Ignore(#[from] ignore::Error),

    /// An exclude pattern is not a valid glob.
    #[error("invalid exclude pattern {pattern:?}")]
    Glob {
        /// The offending pattern.
        pattern: String,
        /// Underlying glob error.
        source: glob::PatternError,
    },
}

/// A SOPS encrypted file and its key metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SopsFile {
    /// Path of the file as discovered.
    pub path: PathBuf,
    /// The parsed `sops` metadata.
    pub metadata: SopsMetadata,
}

impl SopsFile {
    /// Reads the SOPS metadata from file content.
    ///
    /// Returns `None` if the file type is not supported, the content cannot
    /// be parsed, or it carries no SOPS metadata.
    #[must_use]
    pub fn parse(path: &Path, content: &str) -> Option<Self> {
        let format = FileFormat::from_path(path)?;
        let metadata = SopsMetadata::parse(content, format)?;
        Some(Self {
            path: path.to_path_buf(),
            metadata,
        })
    }

    /// Returns the trust anchors of all key groups, in metadata order.
    #[must_use]
    pub fn trust_anchors(&self) -> Vec<String> {
        self.metadata.trust_anchors()
    }
}

/// Supported file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    /// `.yaml` and `.yml`.
    Yaml,
    /// `.json`.
    Json,
    /// `.env`.
    Dotenv,
    /// `.ini`.
    Ini,
}

impl FileFormat {
    /// Picks the format from a file extension. A bare dotfile such as `.env`
    /// counts as its own extension.
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?;
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .or_else(|| name.strip_prefix('.'))?;

        match extension {
            "yaml" | "yml" => Some(Self::Yaml),
            "json" => Some(Self::Json),
            "env" => Some(Self::Dotenv),
            "ini" => Some(Self::Ini),
            _ => None,
        }
    }
}

/// The key related part of SOPS metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SopsMetadata {
    /// Key groups, used when the file was encrypted with Shamir secret
    /// sharing.
    #[serde(default, deserialize_with = "null_as_default")]
    pub key_groups: Vec<KeyGroup>,
    /// Keys listed directly in the metadata (a single implicit group).
    #[serde(flatten)]
    pub keys: KeyGroup,
}

impl SopsMetadata {
    /// Parses metadata from the content of a file in the given format.
    ///
    /// Returns `None` if the content is malformed or has no SOPS metadata.
    #[must_use]
    pub fn parse(content: &str, format: FileFormat) -> Option<Self> {
        let parsed = match format {
            FileFormat::Yaml => serde_yaml::from_str::<EncryptedDocument>(content)
                .map(|doc| doc.sops)
                .map_err(|e| e.to_string()),
            FileFormat::Json => serde_json::from_str::<EncryptedDocument>(content)
                .map(|doc| doc.sops)
                .map_err(|e| e.to_string()),
            FileFormat::Dotenv => from_flat_keys(dotenv_sops_keys(content)),
            FileFormat::Ini => from_flat_keys(ini_sops_keys(content)),
        };

        match parsed {
            Ok(metadata) => metadata,
            Err(message) => {
                debug!("Not a SOPS document: {message}");
                None
            }
        }
    }

    /// Returns the trust anchors of all key groups.
    #[must_use]
    pub fn trust_anchors(&self) -> Vec<String> {
        if self.key_groups.is_empty() {
            self.keys.trust_anchors()
        } else {
            self.key_groups
                .iter()
                .flat_map(KeyGroup::trust_anchors)
                .collect()
        }
    }
}

/// A group of master keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct KeyGroup {
    /// AWS KMS keys.
    #[serde(default, deserialize_with = "null_as_default")]
    pub kms: Vec<KmsKey>,
    /// PGP keys.
    #[serde(default, deserialize_with = "null_as_default")]
    pub pgp: Vec<PgpKey>,
    /// age recipients.
    #[serde(default, deserialize_with = "null_as_default")]
    pub age: Vec<AgeKey>,
    /// GCP KMS keys.
    #[serde(default, deserialize_with = "null_as_default")]
    pub gcp_kms: Vec<GcpKmsKey>,
    /// Azure Key Vault keys.
    #[serde(default, deserialize_with = "null_as_default")]
    pub azure_kv: Vec<AzureKvKey>,
    /// HashiCorp Vault transit keys.
    #[serde(default, deserialize_with = "null_as_default")]
    pub hc_vault: Vec<HcVaultKey>,
}

impl KeyGroup {
    /// Returns the string form of every key in the group.
    #[must_use]
    pub fn trust_anchors(&self) -> Vec<String> {
        let mut anchors = Vec::new();
        anchors.extend(self.kms.iter().map(|k| k.arn.clone()));
        anchors.extend(self.pgp.iter().map(|k| k.fp.clone()));
        anchors.extend(self.age.iter().map(|k| k.recipient.clone()));
        anchors.extend(self.gcp_kms.iter().map(|k| k.resource_id.clone()));
        anchors.extend(
            self.azure_kv
                .iter()
                .map(|k| format!("{}/keys/{}/{}", k.vault_url, k.name, k.version)),
        );
        anchors.extend(self.hc_vault.iter().map(|k| {
            format!(
                "{}/v1/{}/keys/{}",
                k.vault_address, k.engine_path, k.key_name
            )
        }));
        anchors
    }
}

/// An AWS KMS key.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct KmsKey {
    /// Key ARN.
    pub arn: String,
}

/// A GCP KMS key.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GcpKmsKey {
    /// Key resource id.
    pub resource_id: String,
}

/// An Azure Key Vault key.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AzureKvKey {
    /// Vault URL.
    pub vault_url: String,
    /// Key name.
    pub name: String,
    /// Key version.
    pub version: String,
}

/// A HashiCorp Vault transit key.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HcVaultKey {
    /// Vault server address.
    pub vault_address: String,
    /// Transit engine mount path.
    pub engine_path: String,
    /// Key name.
    pub key_name: String,
}

/// A PGP key.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PgpKey {
    /// Key fingerprint.
    pub fp: String,
}

/// An age recipient.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AgeKey {
    /// Recipient public key.
    pub recipient: String,
}

#[derive(Deserialize)]
struct EncryptedDocument {
    #[serde(default)]
    sops: Option<SopsMetadata>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Collects `sops_`-prefixed keys of a dotenv file, prefix stripped.
fn dotenv_sops_keys(content: &str) -> Vec<(String, String)> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .filter_map(|(key, value)| {
            key.trim()
                .strip_prefix("sops_")
                .map(|key| (key.to_string(), value.to_string()))
        })
        .collect()
}

/// Collects the keys of the `[sops]` section of an INI file.
fn ini_sops_keys(content: &str) -> Vec<(String, String)> {
    let mut in_sops = false;
    let mut keys = Vec::new();

    for line in content.lines().map(str::trim) {
        if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
            continue;
        }
        if let Some(section) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            in_sops = section.trim() == "sops";
            continue;
        }
        if in_sops {
            if let Some((key, value)) = line.split_once('=') {
                keys.push((key.trim().to_string(), value.trim().to_string()));
            }
        }
    }

    keys
}

fn from_flat_keys(keys: Vec<(String, String)>) -> Result<Option<SopsMetadata>, String> {
    if keys.is_empty() {
        return Ok(None);
    }
    serde_json::from_value(unflatten(keys)?)
        .map(Some)
        .map_err(|e| e.to_string())
}

enum Segment<'a> {
    Index(usize),
    Key(&'a str),
}

impl<'a> Segment<'a> {
    fn parse(segment: &'a str) -> Self {
        if let Some(index) = segment
            .strip_prefix("list_")
            .and_then(|n| n.parse::<usize>().ok())
        {
            return Self::Index(index);
        }
        Self::Key(segment.strip_prefix("map_").unwrap_or(segment))
    }
}

/// Rebuilds a nested value from SOPS flattened keys (`a__list_0__map_b`).
///
/// A list can never hold more items than there are keys, so larger indices
/// are rejected.
fn unflatten(keys: Vec<(String, String)>) -> Result<Value, String> {
    let max_len = keys.len();
    let mut root = Value::Object(Map::new());
    for (key, value) in keys {
        let segments: Vec<Segment<'_>> = key.split("__").map(Segment::parse).collect();
        insert(&mut root, &segments, value, max_len).map_err(|e| format!("{key}: {e}"))?;
    }
    Ok(root)
}

fn insert(
    node: &mut Value,
    segments: &[Segment<'_>],
    value: String,
    max_len: usize,
) -> Result<(), String> {
    let Some((head, rest)) = segments.split_first() else {
        *node = Value::String(value);
        return Ok(());
    };

    let child = match head {
        Segment::Key(key) => {
            if !node.is_object() {
                *node = Value::Object(Map::new());
            }
            let Value::Object(map) = node else {
                return Ok(());
            };
            map.entry((*key).to_string()).or_insert(Value::Null)
        }
        Segment::Index(index) => {
            if !node.is_array() {
                *node = Value::Array(Vec::new());
            }
            let Value::Array(items) = node else {
                return Ok(());
            };
            if *index >= max_len {
                return Err(format!("list index {index} out of range"));
            }
            if items.len() <= *index {
                items.resize(*index + 1, Value::Null);
            }
            &mut items[*index]
        }
    };

    insert(child, rest, value, max_len)
}

/// Decides which paths are skipped during discovery.
#[derive(Debug)]
pub struct PathFilter {
    root: PathBuf,
    ignore: Gitignore,
    excludes: Vec<glob::Pattern>,
}

impl PathFilter {
    /// Builds a filter from gitignore-style ignore files and exclude globs.
    ///
    /// Patterns are matched against paths relative to `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if an ignore file cannot be read or a pattern is
    /// invalid.
    pub fn new<P, S>(root: &Path, ignore_files: &[P], excludes: &[S]) -> Result<Self, DiscoveryError>
    where
        P: AsRef<Path>,
        S: AsRef<str>,
    {
        let mut builder = GitignoreBuilder::new(root);
        for file in ignore_files {
            if let Some(err) = builder.add(file.as_ref()) {
                return Err(err.into());
            }
        }
        let ignore = builder.build()?;

        let excludes = excludes
            .iter()
            .map(|p| {
                glob::Pattern::new(p.as_ref()).map_err(|source| DiscoveryError::Glob {
                    pattern: p.as_ref().to_string(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            root: root.to_path_buf(),
            ignore,
            excludes,
        })
    }

    /// Creates a filter that excludes nothing.
    #[must_use]
    pub fn none(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            ignore: Gitignore::empty(),
            excludes: Vec::new(),
        }
    }

    /// Checks if a path should be skipped.
    #[must_use]
    pub fn is_excluded(&self, path: &Path, is_dir: bool) -> bool {
        let Ok(relative) = path.strip_prefix(&self.root) else {
            return false;
        };
        if relative.as_os_str().is_empty() {
            return false;
        }

        if self
            .ignore
            .matched_path_or_any_parents(relative, is_dir)
            .is_ignore()
        {
            return true;
        }

        self.excludes.iter().any(|p| p.matches_path(relative))
    }
}

/// Searches `root` recursively for SOPS encrypted files.
///
/// Files are returned in a stable order (sorted by file name per directory).
/// Unsupported, unreadable and non-SOPS files are skipped.
///
/// # Errors
///
/// Returns an error if walking the directory tree fails.
pub fn find_files(root: &Path, filter: &PathFilter) -> Result<Vec<SopsFile>, DiscoveryError> {
    let mut files = Vec::new();

    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !filter.is_excluded(e.path(), e.file_type().is_dir()));

    for entry in walker {
        let entry = entry?;
        if entry.file_type().is_dir() {
            continue;
        }

        let path = entry.path();
        if FileFormat::from_path(path).is_none() {
            continue;
        }

        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                warn!("Could not read file {}: {e}", path.display());
                continue;
            }
        };

        match SopsFile::parse(path, &content) {
            Some(file) => {
                debug!("Found SOPS file: {}", path.display());
                files.push(file);
            }
            None => debug!("Skipping non-SOPS file: {}", path.display()),
        }
    }

    Ok(files)
}
