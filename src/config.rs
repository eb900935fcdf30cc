use serde::Deserialize;
use std::path::PathBuf;

/// Default cap on request bodies (multipart uploads included).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub jwt_secret: String,
    pub azure_account_name: String,
    pub azure_account_key: String,
    pub azure_container: String,
    pub azure_endpoint: Option<String>, // Azurite or private endpoints
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub db_max_connections: u32,
}

fn required(name: &str) -> anyhow::Result<String> {
    let value = std::env::var(name)
        .map_err(|_| anyhow::anyhow!("{} environment variable required", name))?;
    if value.trim().is_empty() {
        anyhow::bail!("{} cannot be empty", name);
    }
    Ok(value)
}

/// Host part of a database URL, for logging. Credentials never leave this function.
fn database_host(database_url: &str) -> Option<String> {
    let url = url::Url::parse(database_url).ok()?;
    let host = url.host_str()?;
    Some(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            database_url: std::env::var("DATABASE_URL")
                .or_else(|_| std::env::var("DB_URL"))
                .map_err(|_| {
                    anyhow::anyhow!("DATABASE_URL or DB_URL environment variable required")
                })
                .and_then(|url| {
                    if url.trim().is_empty() {
                        anyhow::bail!("DATABASE_URL cannot be empty");
                    }
                    if !url.starts_with("postgresql://") && !url.starts_with("postgres://") {
                        anyhow::bail!("DATABASE_URL must start with postgresql:// or postgres://");
                    }
                    Ok(url)
                })?,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "5000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            jwt_secret: required("JWT_SECRET")?,
            azure_account_name: required("AZURE_STORAGE_ACCOUNT_NAME")?,
            azure_account_key: required("AZURE_STORAGE_ACCOUNT_KEY")?,
            azure_container: required("AZURE_BLOB_CONTAINER")?,
            azure_endpoint: std::env::var("AZURE_BLOB_ENDPOINT")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(|url| {
                    if !url.starts_with("http://") && !url.starts_with("https://") {
                        anyhow::bail!("AZURE_BLOB_ENDPOINT must start with http:// or https://");
                    }
                    Ok(url)
                })
                .transpose()?,
            upload_dir: std::env::var("UPLOAD_DIR")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(std::env::temp_dir),
            max_upload_bytes: match std::env::var("MAX_UPLOAD_BYTES") {
                Ok(v) => v
                    .parse()
                    .map_err(|_| anyhow::anyhow!("MAX_UPLOAD_BYTES must be a positive integer"))?,
                Err(_) => DEFAULT_MAX_UPLOAD_BYTES,
            },
            db_max_connections: match std::env::var("DB_MAX_CONNECTIONS") {
                Ok(v) => v.parse().map_err(|_| {
                    anyhow::anyhow!("DB_MAX_CONNECTIONS must be a positive integer")
                })?,
                Err(_) => 10,
            },
        };

        if config.max_upload_bytes == 0 {
            anyhow::bail!("MAX_UPLOAD_BYTES must be greater than zero");
        }
        if config.db_max_connections == 0 {
            anyhow::bail!("DB_MAX_CONNECTIONS must be greater than zero");
        }

        // Log successful configuration load (without sensitive values)
        tracing::info!("Configuration loaded successfully");
        tracing::debug!(
            "Database host: {}",
            database_host(&config.database_url).unwrap_or_else(|| "<unparsed>".to_string())
        );
        tracing::debug!(
            "Blob storage: account={} container={}",
            config.azure_account_name,
            config.azure_container
        );
        if let Some(ref endpoint) = config.azure_endpoint {
            tracing::info!("Blob endpoint override configured: {}", endpoint);
        }
        tracing::debug!("Upload spool dir: {}", config.upload_dir.display());
        tracing::debug!("Server Port: {}", config.port);

        Ok(config)
    }
}
