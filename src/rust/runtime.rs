use log::{info, warn};
use std::path::PathBuf;
use std::sync::{Arc, Once};

use crate::classifier::ClassifierError;
use crate::config::TrainingConfig;
use crate::text::LemmaDictionary;

static INIT: Once = Once::new();

/// Process-wide settings applied once at startup.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuntimeConfig {
    /// Size of the global worker pool; 0 lets rayon decide.
    pub threads: usize,
    /// Lemma dictionary file; the built-in dictionary when `None`.
    pub lemma_dictionary: Option<PathBuf>,
}

impl From<&TrainingConfig> for RuntimeConfig {
    fn from(config: &TrainingConfig) -> Self {
        Self {
            threads: config.threads,
            lemma_dictionary: config.lemma_dictionary.clone(),
        }
    }
}

fn init_worker_pool(threads: usize) {
    let result = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|index| format!("disaster-response-{}", index))
        .build_global();
    match result {
        Ok(()) => info!("Worker pool started with {} threads", rayon::current_num_threads()),
        Err(e) => warn!("Worker pool already running, keeping it: {}", e),
    }
}

/// Configures the global worker pool. Only the first call has any effect.
pub fn ensure_initialized(config: &RuntimeConfig) {
    INIT.call_once(|| init_worker_pool(config.threads));
}

/// Initializes the process and returns the lemma dictionary to inject into
/// the tokenizer.
pub fn initialize(config: &RuntimeConfig) -> Result<Arc<LemmaDictionary>, ClassifierError> {
    ensure_initialized(config);
    match &config.lemma_dictionary {
        Some(path) => {
            let dictionary = LemmaDictionary::from_file(path)?;
            info!("Loaded {} lemmas from {:?}", dictionary.len(), path);
            Ok(Arc::new(dictionary))
        }
        None => Ok(LemmaDictionary::builtin()),
    }
}
