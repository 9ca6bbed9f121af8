use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Where to find the model weights and its optional sidecar configs.
///
/// Mirrors the HuggingFace layout for SegFormer checkpoints: the ONNX
/// graph, a `config.json` carrying the class-id-to-label table, and a
/// `preprocessor_config.json` carrying normalization parameters.
#[derive(Debug, Clone)]
pub struct ModelDescriptor {
    pub model_path: PathBuf,
    pub config_path: Option<PathBuf>,
    pub preprocessor_path: Option<PathBuf>,
}

#[derive(Debug, thiserror::Error)]
pub enum DescriptorError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Subset of a SegFormer `config.json` we care about.
#[derive(Debug, Deserialize)]
struct ModelConfig {
    #[serde(default)]
    id2label: BTreeMap<String, String>,
}

/// Subset of `preprocessor_config.json`: normalization and input size.
#[derive(Debug, Clone, Deserialize)]
pub struct PreprocessorConfig {
    #[serde(default = "default_mean")]
    pub image_mean: [f32; 3],
    #[serde(default = "default_std")]
    pub image_std: [f32; 3],
    #[serde(default = "default_size")]
    pub size: u32,
}

fn default_mean() -> [f32; 3] {
    // ImageNet statistics, the SegFormer default
    [0.485, 0.456, 0.406]
}

fn default_std() -> [f32; 3] {
    [0.229, 0.224, 0.225]
}

fn default_size() -> u32 {
    512
}

impl Default for PreprocessorConfig {
    fn default() -> Self {
        Self {
            image_mean: default_mean(),
            image_std: default_std(),
            size: default_size(),
        }
    }
}

impl ModelDescriptor {
    pub fn new(
        model_path: impl Into<PathBuf>,
        config_path: Option<PathBuf>,
        preprocessor_path: Option<PathBuf>,
    ) -> Self {
        Self {
            model_path: model_path.into(),
            config_path,
            preprocessor_path,
        }
    }

    /// Class labels indexed by class id, if a config file was given.
    pub fn load_labels(&self) -> Result<Option<Vec<String>>, DescriptorError> {
        let Some(path) = &self.config_path else {
            return Ok(None);
        };
        let config: ModelConfig = read_json(path)?;
        if config.id2label.is_empty() {
            return Ok(None);
        }
        let count = config
            .id2label
            .keys()
            .filter_map(|k| k.parse::<usize>().ok())
            .max()
            .map(|max| max + 1)
            .unwrap_or(0);
        let mut labels = vec![String::new(); count];
        for (id, label) in &config.id2label {
            if let Ok(id) = id.parse::<usize>() {
                labels[id] = label.clone();
            }
        }
        Ok(Some(labels))
    }

    /// Preprocessing parameters; defaults when no file was given.
    pub fn load_preprocessor(&self) -> Result<PreprocessorConfig, DescriptorError> {
        match &self.preprocessor_path {
            Some(path) => read_json(path),
            None => Ok(PreprocessorConfig::default()),
        }
    }
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, DescriptorError> {
    let text = fs::read_to_string(path).map_err(|source| DescriptorError::Read {
        path: path.to_owned(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| DescriptorError::Parse {
        path: path.to_owned(),
        source,
    })
}
