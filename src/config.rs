use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{DashboardError, Result};
use crate::theme::ThemeMode;
use crate::utils;

pub const DEFAULT_CONFIG_PATH: &str = "damadi_config.json";
const DEFAULT_OUTPUT_DIR: &str = ".damadi";
const DEFAULT_PAPERS_PATH: &str = "assets/df_unique.csv";
const DEFAULT_CATEGORY_COUNTS_PATH: &str = "assets/paper_counts.csv";
const DEFAULT_REMOTE_URL_TEMPLATE: &str = "https://drive.google.com/uc?export=download&id={id}";
const DEFAULT_ASSETS_DIR: &str = "static";
const DEFAULT_TEMPLATES_DIR: &str = "templates";
const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8052;
const DEFAULT_PALETTE_SEED: u64 = 42;
const DEFAULT_TOP_AUTHORS: usize = 20;

/// Where a table lives: a local path, optionally backed by a remote file id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DatasetSource {
    pub path: PathBuf,
    #[serde(default)]
    pub remote_id: Option<String>,
}

impl DatasetSource {
    pub fn local(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            remote_id: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    pub output_dir: PathBuf,
    pub papers: DatasetSource,
    pub category_counts: DatasetSource,
    pub remote_url_template: String,
    pub assets_dir: PathBuf,
    pub templates_dir: PathBuf,
    pub host: String,
    pub port: u16,
    pub palette_seed: u64,
    pub default_theme: ThemeMode,
    pub top_authors: usize,
}

#[derive(Debug, Default, Deserialize)]
pub struct DashboardConfigFile {
    #[serde(default)]
    output_dir: Option<PathBuf>,
    #[serde(default)]
    papers: Option<DatasetSource>,
    #[serde(default)]
    category_counts: Option<DatasetSource>,
    #[serde(default)]
    remote_url_template: Option<String>,
    #[serde(default)]
    assets_dir: Option<PathBuf>,
    #[serde(default)]
    templates_dir: Option<PathBuf>,
    #[serde(default)]
    host: Option<String>,
    #[serde(default)]
    port: Option<u16>,
    #[serde(default)]
    palette_seed: Option<u64>,
    #[serde(default)]
    default_theme: Option<ThemeMode>,
    #[serde(default)]
    top_authors: Option<usize>,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self::from_file(DashboardConfigFile::default())
    }
}

impl DashboardConfig {
    pub fn from_file(config: DashboardConfigFile) -> Self {
        Self {
            output_dir: config
                .output_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
            papers: config
                .papers
                .unwrap_or_else(|| DatasetSource::local(DEFAULT_PAPERS_PATH)),
            category_counts: config
                .category_counts
                .unwrap_or_else(|| DatasetSource::local(DEFAULT_CATEGORY_COUNTS_PATH)),
            remote_url_template: config
                .remote_url_template
                .unwrap_or_else(|| DEFAULT_REMOTE_URL_TEMPLATE.to_string()),
            assets_dir: config
                .assets_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_ASSETS_DIR)),
            templates_dir: config
                .templates_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_TEMPLATES_DIR)),
            host: config.host.unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: config.port.unwrap_or(DEFAULT_PORT),
            palette_seed: config.palette_seed.unwrap_or(DEFAULT_PALETTE_SEED),
            default_theme: config.default_theme.unwrap_or_default(),
            top_authors: config.top_authors.unwrap_or(DEFAULT_TOP_AUTHORS),
        }
    }

    /// File values over defaults. `PORT` is applied separately by [`Self::apply_env`].
    pub fn load_file(path: &Path) -> Result<Self> {
        let config = if path.exists() {
            let contents = fs::read_to_string(path).map_err(|err| DashboardError::io(path, err))?;
            let file = serde_json::from_str::<DashboardConfigFile>(&contents).map_err(|err| {
                DashboardError::Json {
                    path: path.to_path_buf(),
                    source: err,
                }
            })?;
            Self::from_file(file)
        } else {
            Self::default()
        };
        Ok(config)
    }

    pub fn apply_env(&mut self) {
        self.apply_port(std::env::var("PORT").ok().as_deref());
    }

    fn apply_port(&mut self, raw: Option<&str>) {
        if let Some(port) = port_from_env(raw) {
            self.port = port;
        }
    }

    /// Remote-backed tables with a relative path are cached under `output_dir`.
    pub fn cache_source(&self, source: &DatasetSource) -> DatasetSource {
        match &source.remote_id {
            Some(_) if source.path.is_relative() => DatasetSource {
                path: self.output_dir.join(&source.path),
                remote_id: source.remote_id.clone(),
            },
            _ => source.clone(),
        }
    }

    pub fn papers_source(&self) -> DatasetSource {
        self.cache_source(&self.papers)
    }

    pub fn category_counts_source(&self) -> DatasetSource {
        self.cache_source(&self.category_counts)
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        utils::ensure_parent_dir(path)?;
        let contents = serde_json::to_vec_pretty(self).map_err(|err| DashboardError::Json {
            path: path.to_path_buf(),
            source: err,
        })?;
        utils::write_atomic_bytes(path, &contents)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn port_from_env(raw: Option<&str>) -> Option<u16> {
    raw.and_then(|value| value.trim().parse::<u16>().ok())
}
