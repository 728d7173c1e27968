use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::labels::ClassNames;
use crate::model::{load_with_fallback, Classifier, LoadStrategy};

/// Outcome of the startup model load.
pub enum ModelState {
    Loaded(Arc<dyn Classifier>),
    Unavailable(String),
}

/// Everything the handlers need, built once before the server starts.
pub struct AppState {
    pub model: ModelState,
    pub model_path: PathBuf,
    pub class_names: ClassNames,
    pub image_size: (u32, u32),
}

impl AppState {
    pub fn load(
        model_path: &Path,
        class_list_path: &Path,
        strategies: &[Box<dyn LoadStrategy>],
        image_size: (u32, u32),
    ) -> Self {
        let model = match load_with_fallback(model_path, strategies) {
            Ok(classifier) => ModelState::Loaded(classifier),
            Err(err) => ModelState::Unavailable(err),
        };

        AppState {
            model,
            model_path: model_path.to_path_buf(),
            class_names: ClassNames::load(class_list_path),
            image_size,
        }
    }

    pub fn classifier(&self) -> Option<Arc<dyn Classifier>> {
        match &self.model {
            ModelState::Loaded(classifier) => Some(Arc::clone(classifier)),
            ModelState::Unavailable(_) => None,
        }
    }

    pub fn model_error(&self) -> Option<&str> {
        match &self.model {
            ModelState::Loaded(_) => None,
            ModelState::Unavailable(err) => Some(err),
        }
    }
}
