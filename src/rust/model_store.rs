use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use sha2::digest::Output;
use sha2::{Digest, Sha256};

use crate::categories::Categories;
use crate::classifier::{Classifier, ClassifierError, Estimator};

/// First bytes of every model artifact.
pub const MAGIC: &[u8; 8] = b"DRMODEL\0";
/// Artifact layout version written by this build.
pub const FORMAT_VERSION: u32 = 1;
const HEADER_LEN: usize = MAGIC.len() + 4 + 32;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Invalid model artifact: {0}")]
    InvalidFormat(String),
    #[error("Unsupported artifact version {found}, this build reads version {expected}")]
    UnsupportedVersion { found: u32, expected: u32 },
    #[error("Checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },
    #[error("Failed to serialize model: {0}")]
    Serialization(#[source] bincode::Error),
    #[error("Failed to deserialize model: {0}")]
    Deserialization(#[source] bincode::Error),
    #[error("Model categories do not match: {0}")]
    CategoryMismatch(ClassifierError),
    #[error("Model is inconsistent: {0}")]
    Invalid(#[from] ClassifierError),
}


/// Frames a serialized payload: magic, version, payload digest, payload.
pub(crate) fn encode_artifact(payload: &[u8]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(HEADER_LEN + payload.len());
    bytes.extend_from_slice(MAGIC);
    bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    bytes.extend_from_slice(&Sha256::digest(payload));
    bytes.extend_from_slice(payload);
    bytes
}

/// Checks the frame and returns the payload it wraps.
pub(crate) fn decode_artifact(bytes: &[u8]) -> Result<&[u8], StoreError> {
    if bytes.len() < HEADER_LEN {
        return Err(StoreError::InvalidFormat(format!(
            "file is {} bytes, shorter than the {} byte header",
            bytes.len(),
            HEADER_LEN
        )));
    }
    let (magic, rest) = bytes.split_at(MAGIC.len());
    if magic != MAGIC {
        return Err(StoreError::InvalidFormat("missing model file signature".into()));
    }
    let (version, rest) = rest.split_at(4);
    let found = u32::from_le_bytes([version[0], version[1], version[2], version[3]]);
    if found != FORMAT_VERSION {
        return Err(StoreError::UnsupportedVersion {
            found,
            expected: FORMAT_VERSION,
        });
    }
    let (digest, payload) = rest.split_at(32);
    let expected = <Output<Sha256>>::from_slice(digest);
    let actual = Sha256::digest(payload);
    if *expected != actual {
        let (expected, actual) = (format!("{:x}", expected), format!("{:x}", actual));
        log::error!("Model payload hash mismatch: expected {}, got {}", expected, actual);
        return Err(StoreError::ChecksumMismatch { expected, actual });
    }
    Ok(payload)
}

/// Reads and writes a fitted [`Classifier`] at one file path.
///
/// The artifact is a single self-contained file; loading it needs nothing
/// besides this crate.
#[derive(Debug, Clone)]
pub struct ModelStore {
    path: PathBuf,
}

impl ModelStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "model".to_string());
        self.path.with_file_name(format!(".{}.tmp", name))
    }

    /// Writes the artifact, replacing any existing file only once the new
    /// one is completely on disk.
    pub fn save<E: Estimator>(&self, classifier: &Classifier<E>) -> Result<(), StoreError> {
        classifier.validate()?;
        let payload = bincode::serialize(classifier).map_err(StoreError::Serialization)?;
        let bytes = encode_artifact(&payload);

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            log::debug!("Creating parent directory: {:?}", parent);
            fs::create_dir_all(parent)?;
        }
        let temp = self.temp_path();
        log::info!("Writing {} bytes to {:?}", bytes.len(), self.path);
        fs::write(&temp, &bytes)?;
        if let Err(e) = fs::rename(&temp, &self.path) {
            let _ = fs::remove_file(&temp);
            return Err(e.into());
        }
        Ok(())
    }

    /// Reads the artifact and checks it is internally consistent.
    pub fn load<E: Estimator>(&self) -> Result<Classifier<E>, StoreError> {
        log::info!("Loading model from {:?}", self.path);
        let bytes = fs::read(&self.path)?;
        let payload = decode_artifact(&bytes)?;
        let classifier: Classifier<E> =
            bincode::deserialize(payload).map_err(StoreError::Deserialization)?;
        classifier.validate()?;
        log::info!(
            "Loaded model with {} categories and {} features",
            classifier.categories().len(),
            classifier.info().feature_width
        );
        Ok(classifier)
    }

    /// Loads the artifact and fails unless it predicts exactly `categories`,
    /// in the same order.
    pub fn load_for<E: Estimator>(&self, categories: &Categories) -> Result<Classifier<E>, StoreError> {
        let classifier = self.load::<E>()?;
        categories
            .ensure_matches(classifier.categories())
            .map_err(StoreError::CategoryMismatch)?;
        Ok(classifier)
    }

    /// Whether the file exists and its frame and digest are intact.
    pub fn verify(&self) -> Result<bool, StoreError> {
        if !self.path.exists() {
            log::info!("Model file {:?} does not exist", self.path);
            return Ok(false);
        }
        let bytes = fs::read(&self.path)?;
        match decode_artifact(&bytes) {
            Ok(_) => Ok(true),
            Err(StoreError::Io(e)) => Err(StoreError::Io(e)),
            Err(e) => {
                log::warn!("Model file {:?} failed verification: {}", self.path, e);
                Ok(false)
            }
        }
    }
}

/// Saves `classifier` to `path`.
pub fn save<E: Estimator, P: AsRef<Path>>(classifier: &Classifier<E>, path: P) -> Result<(), StoreError> {
    ModelStore::new(path).save(classifier)
}

/// Loads a random-forest classifier from `path`.
pub fn load<P: AsRef<Path>>(path: P) -> Result<Classifier, StoreError> {
    ModelStore::new(path).load()
}
