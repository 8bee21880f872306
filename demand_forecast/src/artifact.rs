//! Versioned model artifacts on disk and the shared serving cache.
//!
//! Layout under the store root, for a slug `s`:
//!
//! ```text
//! s -> .s.versions/<version>        (symbolic link on unix)
//! .s.versions/<version>/weights.bin      (burn binary record)
//! .s.versions/<version>/scaler.json
//! .s.versions/<version>/metadata.json
//! ```
//!
//! A version directory is written completely inside a staging directory,
//! renamed into `.s.versions/`, and only then published by atomically
//! replacing the `s` link. Readers resolve the link once and read every
//! component from that one directory, so they see either the old bundle or
//! the new one, never a mix. Version directories are never modified after
//! publication.

use crate::dataset::DateRange;
use crate::error::{ForecastError, Result};
use crate::metrics::ForecastMetrics;
use crate::models::{LstmConfig, LstmForecaster};
use crate::training::TrainingReport;
use chrono::{DateTime, Utc};
use forecast_math::ScalerState;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::{debug, info, warn};

pub const SCHEMA_VERSION: u32 = 1;
pub const MODEL_TYPE: &str = "lstm";

const WEIGHTS_FILE: &str = "weights.bin";
const SCALER_FILE: &str = "scaler.json";
const METADATA_FILE: &str = "metadata.json";

/// Descriptive half of an artifact, stored as `metadata.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    #[serde(rename = "type")]
    pub model_type: String,
    pub schema_version: u32,
    /// Set by the store when the artifact is saved
    #[serde(default)]
    pub version: String,
    pub role: String,
    pub location: String,
    pub window: usize,
    pub hidden_size: usize,
    pub num_layers: usize,
    /// Inter-layer dropout used while training
    #[serde(default)]
    pub dropout: f64,
    pub seed: u64,
    pub trained_on: DateTime<Utc>,
    pub train_range: DateRange,
    pub val_range: Option<DateRange>,
    pub test_range: Option<DateRange>,
    /// One-step metrics of the trained model on the test split
    pub metrics: ForecastMetrics,
    /// Metrics of the recursive forecast over the whole test span
    pub recursive: ForecastMetrics,
    pub baselines: BTreeMap<String, ForecastMetrics>,
    pub training: TrainingReport,
}

/// A loaded, immutable artifact.
#[derive(Debug, Clone)]
pub struct ModelArtifact {
    pub slug: String,
    pub version: String,
    pub model: LstmForecaster,
    pub scaler: ScalerState,
    pub metadata: ArtifactMetadata,
}

/// Filesystem store rooted at one artifacts directory.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path readers use for `slug`.
    pub fn slug_path(&self, slug: &str) -> PathBuf {
        self.root.join(slug)
    }

    fn versions_dir(&self, slug: &str) -> PathBuf {
        self.root.join(format!(".{}.versions", slug))
    }

    /// Persist a new version of `slug` and publish it. Returns the version.
    ///
    /// Nothing becomes visible to readers until every component is written
    /// and synced. The previously published version is kept; older ones are
    /// pruned.
    pub fn save(
        &self,
        slug: &str,
        model: &LstmForecaster,
        scaler: &ScalerState,
        mut metadata: ArtifactMetadata,
    ) -> Result<String> {
        let config = model.config();
        if metadata.window == 0
            || metadata.hidden_size != config.hidden_size
            || metadata.num_layers != config.num_layers
        {
            return Err(ForecastError::InvalidParameter(format!(
                "metadata shape (window {}, hidden {}, layers {}) does not describe model {:?}",
                metadata.window, metadata.hidden_size, metadata.num_layers, config
            )));
        }

        let versions = self.versions_dir(slug);
        fs::create_dir_all(&versions)?;

        let version = self.next_version(&versions);
        metadata.version = version.clone();
        metadata.schema_version = SCHEMA_VERSION;
        metadata.dropout = config.dropout;

        let staging = tempfile::Builder::new()
            .prefix(".staging-")
            .tempdir_in(&versions)?;
        model.save_file(&staging.path().join(WEIGHTS_FILE))?;
        write_json(&staging.path().join(SCALER_FILE), scaler)?;
        write_json(&staging.path().join(METADATA_FILE), &metadata)?;

        // The TempDir guard only cleans up if we fail before this rename.
        fs::rename(staging.path(), versions.join(&version))?;

        let previous = self.publish(slug, &version)?;
        match &previous {
            Some(old) => info!(slug, version = %version, previous = %old, "replaced artifact"),
            None => info!(slug, version = %version, "saved artifact"),
        }
        self.prune(slug, &version, previous.as_deref());

        Ok(version)
    }

    /// Timestamp-based version name that does not exist yet.
    fn next_version(&self, versions: &Path) -> String {
        let base = Utc::now().format("%Y%m%dT%H%M%S%.6fZ").to_string();
        let mut candidate = base.clone();
        let mut n = 1;
        while versions.join(&candidate).exists() {
            candidate = format!("{}-{}", base, n);
            n += 1;
        }
        candidate
    }

    /// Point `slug` at `version`, returning what it pointed at before.
    #[cfg(unix)]
    fn publish(&self, slug: &str, version: &str) -> Result<Option<String>> {
        let previous = self.current_version(slug)?;
        let target = Path::new(&format!(".{}.versions", slug)).join(version);
        let staged_link = self.root.join(format!(".{}.link-{}", slug, version));
        std::os::unix::fs::symlink(&target, &staged_link)?;
        if let Err(err) = fs::rename(&staged_link, self.slug_path(slug)) {
            let _ = fs::remove_file(&staged_link);
            return Err(err.into());
        }
        Ok(previous)
    }

    /// Without symbolic links the published directory is swapped by two
    /// renames; readers may briefly see no artifact but never a partial one.
    #[cfg(not(unix))]
    fn publish(&self, slug: &str, version: &str) -> Result<Option<String>> {
        let previous = self.current_version(slug)?;
        let path = self.slug_path(slug);
        let versions = self.versions_dir(slug);
        if let Some(old) = &previous {
            fs::rename(&path, versions.join(format!("{}-retired", old)))?;
        }
        fs::rename(versions.join(version), &path)?;
        Ok(previous)
    }

    /// Remove version directories other than `current` and `previous`.
    /// Failures are logged; a leftover directory never affects readers.
    fn prune(&self, slug: &str, current: &str, previous: Option<&str>) {
        let versions = self.versions_dir(slug);
        let entries = match fs::read_dir(&versions) {
            Ok(entries) => entries,
            Err(err) => {
                warn!(slug, error = %err, "could not list artifact versions");
                return;
            }
        };

        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') || name == current || Some(name.as_str()) == previous {
                continue;
            }
            if previous.map_or(false, |p| name == format!("{}-retired", p)) {
                continue;
            }
            match fs::remove_dir_all(entry.path()) {
                Ok(()) => debug!(slug, version = %name, "pruned artifact version"),
                Err(err) => {
                    warn!(slug, version = %name, error = %err, "could not prune artifact version")
                }
            }
        }
    }

    /// Version currently published for `slug`, or `None` if there is none.
    #[cfg(unix)]
    pub fn current_version(&self, slug: &str) -> Result<Option<String>> {
        match fs::read_link(self.slug_path(slug)) {
            Ok(target) => Ok(target
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) if err.kind() == ErrorKind::InvalidInput => {
                Err(ForecastError::ArtifactCorrupt {
                    slug: slug.to_string(),
                    reason: "artifact path is not a version link".to_string(),
                })
            }
            Err(err) => Err(err.into()),
        }
    }

    #[cfg(not(unix))]
    pub fn current_version(&self, slug: &str) -> Result<Option<String>> {
        let path = self.slug_path(slug).join(METADATA_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let metadata: ArtifactMetadata = read_json(slug, &path)?;
        Ok(Some(metadata.version))
    }

    /// Directory holding the components of the published version.
    fn resolve(&self, slug: &str) -> Result<(String, PathBuf)> {
        let missing = || ForecastError::ArtifactNotFound {
            slug: slug.to_string(),
            path: self.slug_path(slug),
        };
        let version = self.current_version(slug)?.ok_or_else(missing)?;

        #[cfg(unix)]
        let dir = self.versions_dir(slug).join(&version);
        #[cfg(not(unix))]
        let dir = self.slug_path(slug);

        if !dir.is_dir() {
            return Err(missing());
        }
        Ok((version, dir))
    }

    /// Load and validate the published artifact for `slug`.
    pub fn load(&self, slug: &str) -> Result<ModelArtifact> {
        let (version, dir) = self.resolve(slug)?;
        let corrupt = |reason: String| ForecastError::ArtifactCorrupt {
            slug: slug.to_string(),
            reason,
        };

        let metadata: ArtifactMetadata = read_json(slug, &dir.join(METADATA_FILE))?;
        if metadata.schema_version != SCHEMA_VERSION {
            return Err(corrupt(format!(
                "unsupported schema version {}",
                metadata.schema_version
            )));
        }
        if metadata.model_type != MODEL_TYPE {
            return Err(corrupt(format!("unknown model type '{}'", metadata.model_type)));
        }

        if metadata.window == 0 {
            return Err(corrupt("window is zero".to_string()));
        }
        let config = LstmConfig::new(metadata.hidden_size, metadata.num_layers)
            .with_dropout(metadata.dropout);
        let model = LstmForecaster::load_file(config, &dir.join(WEIGHTS_FILE))
            .map_err(|err| corrupt(format!("cannot load {}: {}", WEIGHTS_FILE, err)))?;

        let scaler: ScalerState = read_json(slug, &dir.join(SCALER_FILE))?;
        if !scaler.is_valid() {
            return Err(corrupt("scaler parameters are not usable".to_string()));
        }

        debug!(slug, version = %version, "loaded artifact");
        Ok(ModelArtifact {
            slug: slug.to_string(),
            version,
            model,
            scaler,
            metadata,
        })
    }
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.flush()?;
    writer.get_ref().sync_all()?;
    Ok(())
}

fn read_json<T: DeserializeOwned>(slug: &str, path: &Path) -> Result<T> {
    let component = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let file = File::open(path).map_err(|err| ForecastError::ArtifactCorrupt {
        slug: slug.to_string(),
        reason: format!("cannot open {}: {}", component, err),
    })?;
    serde_json::from_reader(BufReader::new(file)).map_err(|err| ForecastError::ArtifactCorrupt {
        slug: slug.to_string(),
        reason: format!("cannot parse {}: {}", component, err),
    })
}

/// Shared read-mostly cache of loaded artifacts.
///
/// Each lookup compares the cached version with the one currently published
/// and reloads on mismatch. Entries are `Arc`s, so a request that resolved
/// an artifact keeps using it even if a newer version is published meanwhile.
#[derive(Debug)]
pub struct ArtifactCache {
    store: ArtifactStore,
    entries: RwLock<HashMap<String, Arc<ModelArtifact>>>,
}

impl ArtifactCache {
    pub fn new(store: ArtifactStore) -> Self {
        Self {
            store,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, slug: &str) -> Result<Arc<ModelArtifact>> {
        let published = match self.store.current_version(slug)? {
            Some(version) => version,
            None => {
                self.evict(slug);
                return Err(ForecastError::ArtifactNotFound {
                    slug: slug.to_string(),
                    path: self.store.slug_path(slug),
                });
            }
        };

        {
            let entries = self.entries.read().unwrap_or_else(|p| p.into_inner());
            if let Some(artifact) = entries.get(slug) {
                if artifact.version == published {
                    debug!(slug, version = %published, "artifact cache hit");
                    return Ok(Arc::clone(artifact));
                }
                info!(
                    slug,
                    cached = %artifact.version,
                    published = %published,
                    "artifact changed, reloading"
                );
            } else {
                debug!(slug, "artifact cache miss");
            }
        }

        let artifact = Arc::new(self.store.load(slug)?);
        let mut entries = self.entries.write().unwrap_or_else(|p| p.into_inner());
        entries.insert(slug.to_string(), Arc::clone(&artifact));
        Ok(artifact)
    }

    pub fn evict(&self, slug: &str) {
        let mut entries = self.entries.write().unwrap_or_else(|p| p.into_inner());
        entries.remove(slug);
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
