//! Pipeline configuration.

use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};

/// Configuration for where a job's files land.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Directory every destination and output path is confined to.
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    /// Conversion output used when a request does not name one.
    #[serde(default = "default_output")]
    pub default_output: PathBuf,
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("downloads")
}

fn default_output() -> PathBuf {
    PathBuf::from("converted.wav")
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            default_output: default_output(),
        }
    }
}

impl PipelineConfig {
    /// Joins a request path onto `download_dir`.
    ///
    /// Only plain relative paths are accepted: absolute paths and `..`
    /// segments are refused so a request can never name a file outside
    /// the download directory.
    pub fn resolve(&self, path: &Path) -> Result<PathBuf, String> {
        let mut normal = 0;
        for component in path.components() {
            match component {
                Component::Normal(_) => normal += 1,
                Component::CurDir => {}
                Component::ParentDir => {
                    return Err(format!("{} must not contain '..'", path.display()))
                }
                Component::RootDir | Component::Prefix(_) => {
                    return Err(format!(
                        "{} must be relative to the download directory",
                        path.display()
                    ))
                }
            }
        }
        if normal == 0 {
            return Err(format!("{} does not name a file", path.display()));
        }
        Ok(self.download_dir.join(path))
    }
}
