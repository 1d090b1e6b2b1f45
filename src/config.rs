use serde::Deserialize;
use std::env;
use std::sync::OnceLock;
use std::time::Duration;
use thiserror::Error;

/// Default base URL for the OpenAI embeddings API.
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
/// Default Pinecone control-plane URL used to resolve index hosts.
pub const DEFAULT_PINECONE_CONTROL_URL: &str = "https://api.pinecone.io";

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
    /// A backend client could not be constructed for reasons unrelated to its settings.
    #[error("Failed to build HTTP client: {0}")]
    ClientSetup(String),
}

/// Runtime configuration for the Vectory server and CLI.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Credential for the OpenAI embeddings API.
    pub openai_api_key: Option<String>,
    /// Base URL of the OpenAI-compatible embeddings API.
    pub openai_base_url: String,
    /// Embedding provider used to generate vector representations.
    pub embedding_provider: EmbeddingProvider,
    /// Embedding model identifier passed to the provider.
    pub embedding_model: String,
    /// Dimensionality of the produced vectors.
    pub embedding_dimension: usize,
    /// Maximum number of inputs sent in one embeddings request.
    pub embedding_batch_size: usize,
    /// Backend that receives the embedded chunks.
    pub vector_store_backend: VectorStoreBackend,
    /// Credential for the Pinecone API.
    pub pinecone_api_key: Option<String>,
    /// Pinecone index receiving the vectors.
    pub pinecone_index_name: String,
    /// Optional data-plane host; resolved through the control plane when absent.
    pub pinecone_index_host: Option<String>,
    /// Pinecone control-plane base URL.
    pub pinecone_control_url: String,
    /// Maximum characters per chunk.
    pub chunk_size: usize,
    /// Characters shared between adjacent chunks of the same page.
    pub chunk_overlap: usize,
    /// How a multi-file upload reacts to a failing file.
    pub batch_policy: BatchPolicy,
    /// Browser origin allowed to call the API.
    pub cors_allowed_origin: String,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
    /// Per-request timeout for OpenAI and Pinecone calls, in seconds.
    pub http_timeout_secs: u64,
}

/// Supported embedding backends for the processing pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// Hosted OpenAI embeddings API.
    OpenAI,
    /// Deterministic in-process hashing embedder for offline use.
    Local,
}

/// Supported vector store backends.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorStoreBackend {
    /// Pinecone serverless/pod index reached over REST.
    Pinecone,
    /// Process-local store; contents vanish on restart.
    Memory,
}

/// Behavior of a multi-file upload when one of the files fails.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchPolicy {
    /// Stop at the first failing file and report its error for the whole request.
    #[default]
    FailFast,
    /// Process every file and report successes and failures side by side.
    Isolate,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            openai_base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            embedding_provider: EmbeddingProvider::OpenAI,
            embedding_model: "text-embedding-3-small".to_string(),
            embedding_dimension: 1536,
            embedding_batch_size: 2048,
            vector_store_backend: VectorStoreBackend::Pinecone,
            pinecone_api_key: None,
            pinecone_index_name: "vectory".to_string(),
            pinecone_index_host: None,
            pinecone_control_url: DEFAULT_PINECONE_CONTROL_URL.to_string(),
            chunk_size: 1000,
            chunk_overlap: 200,
            batch_policy: BatchPolicy::FailFast,
            cors_allowed_origin: "http://localhost:3000".to_string(),
            server_port: None,
            http_timeout_secs: 60,
        }
    }
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    ///
    /// Credentials are optional here; backends that need them report their absence when the
    /// ingestion service is built.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let config = Self {
            openai_api_key: load_env_optional("OPENAI_API_KEY"),
            openai_base_url: load_env_optional("OPENAI_BASE_URL")
                .unwrap_or(defaults.openai_base_url),
            embedding_provider: parse_optional("EMBEDDING_PROVIDER")?
                .unwrap_or(defaults.embedding_provider),
            embedding_model: load_env_optional("EMBEDDING_MODEL")
                .unwrap_or(defaults.embedding_model),
            embedding_dimension: parse_optional("EMBEDDING_DIMENSION")?
                .unwrap_or(defaults.embedding_dimension),
            embedding_batch_size: parse_optional("EMBEDDING_BATCH_SIZE")?
                .unwrap_or(defaults.embedding_batch_size),
            vector_store_backend: parse_optional("VECTOR_STORE_BACKEND")?
                .unwrap_or(defaults.vector_store_backend),
            pinecone_api_key: load_env_optional("PINECONE_API_KEY"),
            pinecone_index_name: load_env_optional("PINECONE_INDEX_NAME")
                .unwrap_or(defaults.pinecone_index_name),
            pinecone_index_host: load_env_optional("PINECONE_INDEX_HOST"),
            pinecone_control_url: load_env_optional("PINECONE_CONTROL_URL")
                .unwrap_or(defaults.pinecone_control_url),
            chunk_size: parse_optional("TEXT_SPLITTER_CHUNK_SIZE")?
                .unwrap_or(defaults.chunk_size),
            chunk_overlap: parse_optional("TEXT_SPLITTER_CHUNK_OVERLAP")?
                .unwrap_or(defaults.chunk_overlap),
            batch_policy: parse_optional("UPLOAD_BATCH_POLICY")?.unwrap_or(defaults.batch_policy),
            cors_allowed_origin: load_env_optional("CORS_ALLOWED_ORIGIN")
                .unwrap_or(defaults.cors_allowed_origin),
            server_port: parse_optional("SERVER_PORT")?,
            http_timeout_secs: parse_optional("HTTP_TIMEOUT_SECS")?
                .unwrap_or(defaults.http_timeout_secs),
        };
        config.validate()?;
        Ok(config)
    }

    /// Timeout applied to each outbound HTTP request.
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Reject combinations that would make the pipeline degenerate.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::InvalidValue(
                "TEXT_SPLITTER_CHUNK_SIZE".to_string(),
            ));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(ConfigError::InvalidValue(
                "TEXT_SPLITTER_CHUNK_OVERLAP".to_string(),
            ));
        }
        if self.embedding_dimension == 0 {
            return Err(ConfigError::InvalidValue("EMBEDDING_DIMENSION".to_string()));
        }
        if self.embedding_batch_size == 0 {
            return Err(ConfigError::InvalidValue(
                "EMBEDDING_BATCH_SIZE".to_string(),
            ));
        }
        if self.http_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue("HTTP_TIMEOUT_SECS".to_string()));
        }
        Ok(())
    }
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_optional<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    load_env_optional(key)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue(key.to_string()))
        })
        .transpose()
}

impl std::str::FromStr for EmbeddingProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "local" => Ok(Self::Local),
            _ => Err(()),
        }
    }
}

impl std::str::FromStr for VectorStoreBackend {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pinecone" => Ok(Self::Pinecone),
            "memory" => Ok(Self::Memory),
            _ => Err(()),
        }
    }
}

impl std::str::FromStr for BatchPolicy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "fail_fast" => Ok(Self::FailFast),
            "isolate" => Ok(Self::Isolate),
            _ => Err(()),
        }
    }
}

static CONFIG: OnceLock<Config> = OnceLock::new();

/// Load configuration from the environment and install it in the global cache.
///
/// Later calls return the configuration installed by the first one.
pub fn init_config() -> Result<&'static Config, ConfigError> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    tracing::debug!(
        provider = ?config.embedding_provider,
        model = %config.embedding_model,
        backend = ?config.vector_store_backend,
        index = %config.pinecone_index_name,
        chunk_size = config.chunk_size,
        chunk_overlap = config.chunk_overlap,
        batch_policy = ?config.batch_policy,
        server_port = ?config.server_port,
        "Loaded configuration"
    );
    Ok(CONFIG.get_or_init(|| config))
}
