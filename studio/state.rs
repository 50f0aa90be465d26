use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{info, warn};

use brainscan::config::AppConfig;
use brainscan::explain::{Explainer, GeminiExplainer};
use brainscan::inference::{Classifier, ModelChoice};
use brainscan::{BrainScanError, Result};

/// A loaded model; the lock is held for a whole forward/backward pass.
pub type SharedClassifier = Arc<Mutex<Classifier>>;

// ---------------------------------------------------------------------------
// Demo state
// ---------------------------------------------------------------------------

pub struct DemoState {
    pub config: AppConfig,
    /// Models are loaded on first use and kept for the life of the process.
    classifiers: Mutex<HashMap<ModelChoice, SharedClassifier>>,
    pub explainer: Option<Arc<dyn Explainer>>,
}

impl DemoState {
    /// Builds the explainer when explanations are enabled and a credential
    /// is present; otherwise the demo runs without explanations.
    pub fn new(config: AppConfig) -> Self {
        let explainer: Option<Arc<dyn Explainer>> = if !config.explain.enabled {
            info!("explanations disabled");
            None
        } else {
            match GeminiExplainer::from_config(&config.explain) {
                Ok(client) => Some(Arc::new(client)),
                Err(e) => {
                    warn!("explanations unavailable: {}", e);
                    None
                }
            }
        };
        DemoState::with_explainer(config, explainer)
    }

    pub fn with_explainer(config: AppConfig, explainer: Option<Arc<dyn Explainer>>) -> Self {
        DemoState { config, classifiers: Mutex::new(HashMap::new()), explainer }
    }

    fn cache(&self) -> Result<MutexGuard<'_, HashMap<ModelChoice, SharedClassifier>>> {
        self.classifiers
            .lock()
            .map_err(|_| BrainScanError::Training("model cache lock poisoned".into()))
    }

    /// Whether the artifact for `choice` exists on disk.
    pub fn is_available(&self, choice: ModelChoice) -> bool {
        self.config.models.artifact_path(&choice.artifact_name(&self.config.models)).is_file()
    }

    /// The cached classifier for `choice`, loading it on first use.
    pub fn classifier(&self, choice: ModelChoice) -> Result<SharedClassifier> {
        let mut cache = self.cache()?;
        if let Some(found) = cache.get(&choice) {
            return Ok(Arc::clone(found));
        }
        let path = self.config.models.artifact_path(&choice.artifact_name(&self.config.models));
        let loaded = Arc::new(Mutex::new(Classifier::load(&path)?));
        cache.insert(choice, Arc::clone(&loaded));
        Ok(loaded)
    }
}

/// Shared state type, an `Arc<DemoState>` passed to every handler.
pub type SharedState = Arc<DemoState>;
