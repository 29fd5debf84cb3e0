//! Settings file, per-user data directory and the library registry

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use papersift_core::RetryPolicy;
use papersift_feed::{FeedFetcher, FeedStore, HttpFetcher, StaticFetcher};
use papersift_library::Library;
use papersift_llm::EndpointConfig;

const APP_NAME: &str = "papersift";
const ENDPOINT_FILE: &str = "endpoint.json";
const LIBRARIES_FILE: &str = "libraries.json";
const STORE_EXTENSION: &str = "duckdb";

/// Settings read from `config.toml`
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub llm: LlmConfig,
    pub rerank: RerankConfig,
    pub http: HttpConfig,
    pub digest: DigestConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub model: String,
    /// Overrides the URL saved by `set-endpoint`
    pub base_url: Option<String>,
    /// Overrides the key saved by `set-endpoint`; `${VAR}` is expanded
    /// when the endpoint is resolved
    pub api_key: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            base_url: None,
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RerankConfig {
    pub enabled: bool,
    pub model: String,
    pub candidate_factor: usize,
}

impl Default for RerankConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            model: "text-embedding-3-small".to_string(),
            candidate_factor: papersift_library::DEFAULT_CANDIDATE_FACTOR,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Default)]
#[serde(default)]
pub struct HttpConfig {
    pub max_retries: u32,
    /// Whole-request timeout in seconds
    pub request_timeout: Option<u64>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct DigestConfig {
    pub default_count: usize,
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self { default_count: 5 }
    }
}

/// Expand `${VAR}` to the variable's value; other strings pass through
fn expand_env_var(s: &str) -> Option<String> {
    if let Some(var_name) = s.strip_prefix("${").and_then(|s| s.strip_suffix('}')) {
        std::env::var(var_name).ok()
    } else {
        Some(s.to_string())
    }
}

impl Config {
    /// Search order: ./papersift.toml, then the user config directory.
    /// Defaults when neither exists.
    pub fn load() -> Result<Self> {
        let local_config = PathBuf::from("papersift.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(dirs) = directories::ProjectDirs::from("", "", APP_NAME) {
            let user_config = dirs.config_dir().join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        log::debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }
}

/// Contents of `endpoint.json`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SavedEndpoint {
    pub url: String,
    pub key: String,
}

/// Library name → requirement
pub type Registry = BTreeMap<String, String>;

/// Everything a command needs: where files live and how to talk to the network.
pub struct AppContext {
    pub data_dir: PathBuf,
    pub config: Config,
    pub retry: RetryPolicy,
    pub timeout: Option<Duration>,
    /// Serve feeds from memory instead of the network
    offline_feeds: Option<StaticFetcher>,
}

impl AppContext {
    /// `data_dir` of `None` means the per-user data directory.
    pub fn new(config: Config, data_dir: Option<PathBuf>, max_retries: Option<u32>) -> Result<Self> {
        let data_dir = match data_dir {
            Some(dir) => dir,
            None => directories::ProjectDirs::from("", "", APP_NAME)
                .map(|dirs| dirs.data_dir().to_path_buf())
                .context("Could not determine a home directory; pass --data-dir")?,
        };
        let retries = max_retries.unwrap_or(config.http.max_retries);
        let retry = if retries == 0 {
            RetryPolicy::none()
        } else {
            RetryPolicy::exponential(retries)
        };
        let timeout = config.http.request_timeout.map(Duration::from_secs);

        Ok(Self {
            data_dir,
            config,
            retry,
            timeout,
            offline_feeds: None,
        })
    }

    pub fn with_offline_feeds(mut self, feeds: StaticFetcher) -> Self {
        self.offline_feeds = Some(feeds);
        self
    }

    fn ensure_data_dir(&self) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir).with_context(|| {
            format!("Failed to create data dir: {}", self.data_dir.display())
        })
    }

    fn read_json<T: serde::de::DeserializeOwned>(&self, name: &str) -> Result<Option<T>> {
        let path = self.data_dir.join(name);
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let value = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(Some(value))
    }

    fn write_json<T: Serialize>(&self, name: &str, value: &T) -> Result<()> {
        self.ensure_data_dir()?;
        let path = self.data_dir.join(name);
        let content = serde_json::to_string_pretty(value)?;
        std::fs::write(&path, content)
            .with_context(|| format!("Failed to write {}", path.display()))
    }

    pub fn save_endpoint(&self, endpoint: &SavedEndpoint) -> Result<()> {
        self.write_json(ENDPOINT_FILE, endpoint)
    }

    pub fn saved_endpoint(&self) -> Result<Option<SavedEndpoint>> {
        self.read_json(ENDPOINT_FILE)
    }

    /// Endpoint for `model`, with settings-file overrides applied.
    pub fn endpoint(&self, model: &str) -> Result<EndpointConfig> {
        let saved = self.saved_endpoint()?;
        let llm = &self.config.llm;

        let url = llm
            .base_url
            .clone()
            .or_else(|| saved.as_ref().map(|e| e.url.clone()));
        let Some(url) = url else {
            bail!("No LLM endpoint configured; run `papersift set-endpoint <URL> <KEY>` first");
        };
        let key = match llm.api_key.clone().or_else(|| saved.map(|e| e.key)) {
            Some(raw) => match expand_env_var(&raw) {
                Some(key) => key,
                None => bail!("API key is set to {raw}, but that variable is not in the environment"),
            },
            None => String::new(),
        };

        Ok(EndpointConfig::new(&url, &key, model))
    }

    pub fn libraries(&self) -> Result<Registry> {
        Ok(self.read_json(LIBRARIES_FILE)?.unwrap_or_default())
    }

    pub fn save_libraries(&self, registry: &Registry) -> Result<()> {
        self.write_json(LIBRARIES_FILE, registry)
    }

    /// Requirement of a registered library.
    pub fn requirement(&self, name: &str) -> Result<String> {
        match self.libraries()?.remove(name) {
            Some(requirement) => Ok(requirement),
            None => bail!("Unknown library `{name}`; see `papersift show-libraries`"),
        }
    }

    pub fn library_path(&self, name: &str) -> Result<PathBuf> {
        validate_library_name(name)?;
        Ok(self.data_dir.join(format!("{name}.{STORE_EXTENSION}")))
    }

    fn fetcher(&self) -> Box<dyn FeedFetcher> {
        match &self.offline_feeds {
            Some(feeds) => Box::new(feeds.clone()),
            None => Box::new(HttpFetcher::new(self.timeout, self.retry)),
        }
    }

    pub fn open_library(&self, name: &str) -> Result<Library> {
        self.ensure_data_dir()?;
        let library = Library::open(&self.library_path(name)?, self.fetcher())
            .with_context(|| format!("Failed to open library `{name}`"))?;
        Ok(library.with_candidate_factor(self.config.rerank.candidate_factor))
    }

    /// Fresh, empty store for `name`.
    pub fn create_library(&self, name: &str) -> Result<Library> {
        self.ensure_data_dir()?;
        let library = Library::create(&self.library_path(name)?, self.fetcher())
            .with_context(|| format!("Failed to create library `{name}`"))?;
        Ok(library.with_candidate_factor(self.config.rerank.candidate_factor))
    }

    /// Delete a library's store and sidecar. Returns whether anything existed.
    pub fn remove_library_files(&self, name: &str) -> Result<bool> {
        FeedStore::remove_files(&self.library_path(name)?)
    }
}

/// Library names become file names.
fn validate_library_name(name: &str) -> Result<()> {
    let ok = !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\'])
        && !name.chars().any(char::is_control);
    if !ok {
        bail!("Invalid library name `{name}`: must be a plain file name");
    }
    Ok(())
}

/// Mask all but the first few characters of a secret.
pub fn mask_key(key: &str) -> String {
    if key.is_empty() {
        return "not set".to_string();
    }
    let shown: String = key.chars().take(4).collect();
    format!("{shown}…")
}
