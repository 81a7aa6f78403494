//! Configuration for Depot

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DepotConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub object_store: ObjectStoreConfig,

    #[serde(default)]
    pub vector: VectorConfig,

    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub workspaces: WorkspacesConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl DepotConfig {
    pub fn from_file(path: &str) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::Error::Internal(format!("Failed to read config: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| crate::Error::Internal(format!("Failed to parse config: {}", e)))
    }

    /// Build a configuration from environment variables, starting from defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("DEPOT_BIND_ADDRESS") {
            config.server.bind_address = addr;
        }
        if let Ok(port) = std::env::var("DEPOT_PORT") {
            if let Ok(p) = port.parse() {
                config.server.port = p;
            }
        }
        if let Ok(url) = std::env::var("DEPOT_DATABASE_URL") {
            config.database.url = url;
        }
        if let Ok(endpoint) = std::env::var("DEPOT_S3_ENDPOINT") {
            config.object_store.endpoint = endpoint;
        }
        if let Ok(key) = std::env::var("DEPOT_S3_ACCESS_KEY") {
            config.object_store.access_key = key;
        }
        if let Ok(secret) = std::env::var("DEPOT_S3_SECRET_KEY") {
            config.object_store.secret_key = secret;
        }
        if let Ok(region) = std::env::var("DEPOT_S3_REGION") {
            config.object_store.region = region;
        }
        if let Ok(bucket) = std::env::var("DEPOT_WORKSPACE_BUCKET") {
            config.object_store.workspace_bucket = bucket;
        }
        if let Ok(url) = std::env::var("DEPOT_S3_PUBLIC_ENDPOINT") {
            config.object_store.public_endpoint = Some(url);
        }
        if let Ok(url) = std::env::var("DEPOT_VECTOR_URL") {
            config.vector.url = Some(url);
        }
        if let Ok(key) = std::env::var("DEPOT_VECTOR_API_KEY") {
            config.vector.api_key = Some(key);
        }
        if let Ok(key) = std::env::var("DEPOT_OPENAI_API_KEY") {
            config.embedding.openai_api_key = Some(key);
        }
        if let Ok(url) = std::env::var("DEPOT_OPENAI_BASE_URL") {
            config.embedding.openai_base_url = url;
        }
        if let Ok(level) = std::env::var("DEPOT_LOG_LEVEL") {
            config.logging.level = level;
        }

        config
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 9520,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Connection URL; `sqlite:` and `postgres:` schemes are supported.
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:depot.db?mode=rwc".to_string(),
            max_connections: 16,
        }
    }
}

/// Server-wide object store credentials, used for any artifact that does not
/// carry its own `S3_ACCESS_KEY_ID`/`S3_SECRET_ACCESS_KEY` secrets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectStoreConfig {
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
    pub workspace_bucket: String,
    /// When set, presigned URLs minted with the server-wide credentials are
    /// rewritten to this public endpoint.
    pub public_endpoint: Option<String>,
}

impl Default for ObjectStoreConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:9000".to_string(),
            access_key: String::new(),
            secret_key: String::new(),
            region: "us-east-1".to_string(),
            workspace_bucket: crate::DEFAULT_WORKSPACE_BUCKET.to_string(),
            public_endpoint: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VectorConfig {
    /// Base URL of the vector database; vector operations are disabled when unset.
    pub url: Option<String>,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            openai_base_url: "https://api.openai.com/v1".to_string(),
        }
    }
}

/// Which workspaces are persistent. Workspace lifecycle itself is managed
/// outside this service; only the persistence flag is consulted here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspacesConfig {
    pub all_persistent: bool,
    pub persistent: Vec<String>,
}

impl Default for WorkspacesConfig {
    fn default() -> Self {
        Self {
            all_persistent: true,
            persistent: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DepotConfig::default();
        assert_eq!(config.server.port, 9520);
        assert_eq!(config.object_store.workspace_bucket, "depot-workspaces");
        assert!(config.vector.url.is_none());
        assert!(config.workspaces.all_persistent);
    }

    #[test]
    fn test_parse_toml() {
        let toml_str = r#"
            [server]
            bind_address = "127.0.0.1"
            port = 8080

            [database]
            url = "postgres://localhost/depot"
            max_connections = 4

            [object_store]
            endpoint = "http://minio:9000"
            access_key = "ak"
            secret_key = "sk"
            region = "eu-west-1"
            workspace_bucket = "my-workspaces"

            [workspaces]
            all_persistent = false
            persistent = ["ws-public"]
        "#;
        let config: DepotConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.database.url, "postgres://localhost/depot");
        assert_eq!(config.object_store.region, "eu-west-1");
        assert!(!config.workspaces.all_persistent);
        assert_eq!(config.workspaces.persistent, vec!["ws-public"]);
        // Sections not present fall back to defaults
        assert_eq!(config.embedding.openai_base_url, "https://api.openai.com/v1");
    }
}
