//! Configuration loaded from the environment
//!
//! `Config::from_env` reads a `.env` file when present, then the process environment.
//! Optional values fall back to the defaults below; required values fail loudly.

use std::env;
use std::str::FromStr;
use std::time::Duration;

const DB_MAX_CONNECTIONS: u32 = 25;
const DB_TIMEOUT_SECONDS: u64 = 30;
const S3_REGION: &str = "us-east-1";
const PRESIGN_SECONDS: u64 = 900;
const SINGLE_UPLOAD_MAX_BYTES: i64 = 10 * 1024 * 1024;
const MULTIPART_UPLOAD_MAX_BYTES: i64 = 5 * 1024 * 1024 * 1024;
const PART_SIZE_BYTES: i64 = 10 * 1024 * 1024;
const SESSION_TTL_SECONDS: u64 = 30 * 60;
const CLEANUP_INTERVAL_SECONDS: u64 = 15 * 60;
const NATS_URL: &str = "nats://127.0.0.1:4222";
const NATS_STREAM_NAME: &str = "MINIO_EVENTS";
const NATS_CONSUMER_NAME: &str = "mediagate-finalizer";
const NATS_SUBJECT: &str = "minio.events";
const SERVER_HOST: &str = "0.0.0.0";
const SERVER_PORT: u16 = 3000;

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub bucket: String,
    pub region: String,
    /// Custom endpoint for S3-compatible providers (MinIO, ...). Path-style addressing is used when set.
    pub endpoint_url: Option<String>,
}

/// Lifetimes of the presigned URLs handed to clients.
#[derive(Debug, Clone)]
pub struct PresignConfig {
    pub simple_upload: Duration,
    pub multipart_part: Duration,
    pub download: Duration,
}

impl Default for PresignConfig {
    fn default() -> Self {
        Self {
            simple_upload: Duration::from_secs(PRESIGN_SECONDS),
            multipart_part: Duration::from_secs(PRESIGN_SECONDS),
            download: Duration::from_secs(PRESIGN_SECONDS),
        }
    }
}

/// Upload size thresholds and session lifetimes.
#[derive(Debug, Clone)]
pub struct UploadConfig {
    pub single_upload_max_bytes: i64,
    pub multipart_upload_max_bytes: i64,
    pub part_size_bytes: i64,
    pub session_ttl: Duration,
    pub cleanup_interval: Duration,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            single_upload_max_bytes: SINGLE_UPLOAD_MAX_BYTES,
            multipart_upload_max_bytes: MULTIPART_UPLOAD_MAX_BYTES,
            part_size_bytes: PART_SIZE_BYTES,
            session_ttl: Duration::from_secs(SESSION_TTL_SECONDS),
            cleanup_interval: Duration::from_secs(CLEANUP_INTERVAL_SECONDS),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NatsConfig {
    pub url: String,
    pub stream_name: String,
    pub consumer_name: String,
    pub subject: String,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub presign: PresignConfig,
    pub upload: UploadConfig,
    pub nats: NatsConfig,
    pub server: ServerConfig,
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(default)
}

fn env_string_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_seconds_or(key: &str, default: u64) -> Duration {
    Duration::from_secs(env_or(key, default))
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let database = DatabaseConfig {
            url: env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?,
            max_connections: env_or("DB_MAX_CONNECTIONS", DB_MAX_CONNECTIONS),
            timeout_seconds: env_or("DB_TIMEOUT_SECONDS", DB_TIMEOUT_SECONDS),
        };

        let storage = StorageConfig {
            bucket: env::var("S3_BUCKET").map_err(|_| anyhow::anyhow!("S3_BUCKET must be set"))?,
            region: env_string_or("S3_REGION", S3_REGION),
            endpoint_url: env::var("S3_ENDPOINT").ok().filter(|s| !s.trim().is_empty()),
        };

        let presign = PresignConfig {
            simple_upload: env_seconds_or("S3_SIMPLE_PRESIGN_SECONDS", PRESIGN_SECONDS),
            multipart_part: env_seconds_or("S3_MULTIPART_PRESIGN_SECONDS", PRESIGN_SECONDS),
            download: env_seconds_or("S3_DOWNLOAD_PRESIGN_SECONDS", PRESIGN_SECONDS),
        };

        let upload = UploadConfig {
            single_upload_max_bytes: env_or("UPLOAD_SINGLE_MAX_BYTES", SINGLE_UPLOAD_MAX_BYTES),
            multipart_upload_max_bytes: env_or(
                "UPLOAD_MULTIPART_MAX_BYTES",
                MULTIPART_UPLOAD_MAX_BYTES,
            ),
            part_size_bytes: env_or("UPLOAD_PART_SIZE_BYTES", PART_SIZE_BYTES),
            session_ttl: env_seconds_or("UPLOAD_SESSION_TTL_SECONDS", SESSION_TTL_SECONDS),
            cleanup_interval: env_seconds_or(
                "UPLOAD_CLEANUP_INTERVAL_SECONDS",
                CLEANUP_INTERVAL_SECONDS,
            ),
        };

        let nats = NatsConfig {
            url: env_string_or("NATS_URL", NATS_URL),
            stream_name: env_string_or("NATS_STREAM_NAME", NATS_STREAM_NAME),
            consumer_name: env_string_or("NATS_CONSUMER_NAME", NATS_CONSUMER_NAME),
            subject: env_string_or("NATS_SUBJECT", NATS_SUBJECT),
        };

        let server = ServerConfig {
            host: env_string_or("SERVER_HOST", SERVER_HOST),
            port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| SERVER_PORT.to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("SERVER_PORT must be a valid number"))?,
        };

        let config = Config {
            database,
            storage,
            presign,
            upload,
            nats,
            server,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.upload.validate()?;

        if !self.database.url.starts_with("postgres://")
            && !self.database.url.starts_with("postgresql://")
        {
            return Err(anyhow::anyhow!(
                "DATABASE_URL must be a valid PostgreSQL connection string"
            ));
        }

        if self.storage.bucket.trim().is_empty() {
            return Err(anyhow::anyhow!("S3_BUCKET must not be empty"));
        }

        Ok(())
    }
}

impl UploadConfig {
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.part_size_bytes <= 0 {
            return Err(anyhow::anyhow!("UPLOAD_PART_SIZE_BYTES must be positive"));
        }
        if self.single_upload_max_bytes >= self.multipart_upload_max_bytes {
            return Err(anyhow::anyhow!(
                "UPLOAD_SINGLE_MAX_BYTES must be lower than UPLOAD_MULTIPART_MAX_BYTES"
            ));
        }
        if self.part_size_bytes > self.multipart_upload_max_bytes {
            return Err(anyhow::anyhow!(
                "UPLOAD_PART_SIZE_BYTES must not exceed UPLOAD_MULTIPART_MAX_BYTES"
            ));
        }
        if self.session_ttl.is_zero() || self.cleanup_interval.is_zero() {
            return Err(anyhow::anyhow!(
                "UPLOAD_SESSION_TTL_SECONDS and UPLOAD_CLEANUP_INTERVAL_SECONDS must be positive"
            ));
        }
        Ok(())
    }
}
