use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use std::{env, path::PathBuf, str::FromStr, time::Duration};

/// Default cap on an upload request body: 1 GiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 1 << 30;

/// Which object store the pipeline writes processed videos to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StorageBackend {
    /// Payloads on local disk, served back through HMAC-signed `/assets` URLs.
    Local,
    /// AWS S3 (or an S3-compatible endpoint) with SDK-presigned URLs.
    S3,
}

impl FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "s3" => Ok(Self::S3),
            other => bail!("unknown storage backend `{}` (expected `local` or `s3`)", other),
        }
    }
}

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub staging_dir: PathBuf,
    pub backend: StorageBackend,
    pub bucket: String,
    pub region: String,
    pub s3_endpoint: Option<String>,
    pub storage_dir: PathBuf,
    pub public_base_url: String,
    pub jwt_secret: String,
    pub url_signing_secret: String,
    pub max_upload_bytes: usize,
    pub presign_ttl: Duration,
    pub ffprobe_path: PathBuf,
    pub ffmpeg_path: PathBuf,
    pub tool_timeout: Duration,
}

// Secrets stay out of the startup log line.
impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database_url", &self.database_url)
            .field("staging_dir", &self.staging_dir)
            .field("backend", &self.backend)
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("s3_endpoint", &self.s3_endpoint)
            .field("storage_dir", &self.storage_dir)
            .field("public_base_url", &self.public_base_url)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("presign_ttl", &self.presign_ttl)
            .field("ffprobe_path", &self.ffprobe_path)
            .field("ffmpeg_path", &self.ffmpeg_path)
            .field("tool_timeout", &self.tool_timeout)
            .finish_non_exhaustive()
    }
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Video upload, fast-start processing and presigned delivery API")]
pub struct Args {
    /// Host to bind to (overrides VIDEO_STORE_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides VIDEO_STORE_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Database URL (overrides VIDEO_STORE_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Directory for per-request scratch files (overrides VIDEO_STORE_STAGING_DIR)
    #[arg(long)]
    pub staging_dir: Option<PathBuf>,

    /// Object store backend (overrides VIDEO_STORE_BACKEND)
    #[arg(long, value_enum)]
    pub backend: Option<StorageBackend>,

    /// Bucket processed videos are written to (overrides VIDEO_STORE_BUCKET)
    #[arg(long)]
    pub bucket: Option<String>,

    /// Object store region (overrides VIDEO_STORE_REGION / AWS_REGION)
    #[arg(long)]
    pub region: Option<String>,

    /// Custom S3-compatible endpoint, e.g. a local MinIO (overrides VIDEO_STORE_S3_ENDPOINT)
    #[arg(long)]
    pub s3_endpoint: Option<String>,

    /// Directory where the local backend keeps objects (overrides VIDEO_STORE_STORAGE_DIR)
    #[arg(long)]
    pub storage_dir: Option<PathBuf>,

    /// Externally reachable base URL used in local-backend signed links
    #[arg(long)]
    pub public_base_url: Option<String>,

    /// Hard cap on upload body size in bytes
    #[arg(long)]
    pub max_upload_bytes: Option<usize>,

    /// Lifetime of generated access URLs, in seconds
    #[arg(long)]
    pub presign_ttl_secs: Option<u64>,

    /// ffprobe binary
    #[arg(long)]
    pub ffprobe: Option<PathBuf>,

    /// ffmpeg binary
    #[arg(long)]
    pub ffmpeg: Option<PathBuf>,

    /// Upper bound on a single ffprobe/ffmpeg invocation, in seconds
    #[arg(long)]
    pub tool_timeout_secs: Option<u64>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        let args = Args::parse();
        let migrate = args.migrate;
        Ok((Self::from_args(args)?, migrate))
    }

    /// Merge already-parsed CLI args over the environment.
    pub fn from_args(args: Args) -> Result<Self> {
        // --- Environment fallback ---
        let env_host = env::var("VIDEO_STORE_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = parse_env("VIDEO_STORE_PORT", 8091u16)?;
        let env_db = env::var("VIDEO_STORE_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./data/meta/video_store.db".into());
        let env_staging = env::var("VIDEO_STORE_STAGING_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| env::temp_dir());
        let env_backend = parse_env("VIDEO_STORE_BACKEND", StorageBackend::Local)?;
        let env_bucket = env::var("VIDEO_STORE_BUCKET").unwrap_or_else(|_| "videos".into());
        let env_region = env::var("VIDEO_STORE_REGION")
            .or_else(|_| env::var("AWS_REGION"))
            .unwrap_or_else(|_| "us-east-1".into());
        let env_endpoint = env::var("VIDEO_STORE_S3_ENDPOINT").ok();
        let env_storage = env::var("VIDEO_STORE_STORAGE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./data/objects"));
        let env_public = env::var("VIDEO_STORE_PUBLIC_BASE_URL").ok();
        let env_max_upload = parse_env("VIDEO_STORE_MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?;
        let env_ttl = parse_env("VIDEO_STORE_PRESIGN_TTL_SECS", 3600u64)?;
        let env_ffprobe = env::var("VIDEO_STORE_FFPROBE").unwrap_or_else(|_| "ffprobe".into());
        let env_ffmpeg = env::var("VIDEO_STORE_FFMPEG").unwrap_or_else(|_| "ffmpeg".into());
        let env_tool_timeout = parse_env("VIDEO_STORE_TOOL_TIMEOUT_SECS", 600u64)?;

        let jwt_secret =
            env::var("VIDEO_STORE_JWT_SECRET").context("VIDEO_STORE_JWT_SECRET must be set")?;
        let url_signing_secret =
            env::var("VIDEO_STORE_URL_SIGNING_SECRET").unwrap_or_else(|_| jwt_secret.clone());

        // --- Merge ---
        let port = args.port.unwrap_or(env_port);
        let public_base_url = args
            .public_base_url
            .or(env_public)
            .unwrap_or_else(|| format!("http://localhost:{}", port));

        let cfg = Self {
            host: args.host.unwrap_or(env_host),
            port,
            database_url: args.database_url.unwrap_or(env_db),
            staging_dir: args.staging_dir.unwrap_or(env_staging),
            backend: args.backend.unwrap_or(env_backend),
            bucket: args.bucket.unwrap_or(env_bucket),
            region: args.region.unwrap_or(env_region),
            s3_endpoint: args.s3_endpoint.or(env_endpoint),
            storage_dir: args.storage_dir.unwrap_or(env_storage),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
            jwt_secret,
            url_signing_secret,
            max_upload_bytes: args.max_upload_bytes.unwrap_or(env_max_upload),
            presign_ttl: Duration::from_secs(args.presign_ttl_secs.unwrap_or(env_ttl)),
            ffprobe_path: args.ffprobe.unwrap_or_else(|| env_ffprobe.into()),
            ffmpeg_path: args.ffmpeg.unwrap_or_else(|| env_ffmpeg.into()),
            tool_timeout: Duration::from_secs(args.tool_timeout_secs.unwrap_or(env_tool_timeout)),
        };

        if cfg.bucket.contains(',') {
            bail!("bucket name `{}` must not contain a comma", cfg.bucket);
        }

        Ok(cfg)
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Read `name` from the environment, falling back to `default` when unset.
/// A present but unparseable value is an error rather than a silent default.
fn parse_env<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(value) => value
            .parse::<T>()
            .map_err(|err| anyhow::anyhow!("{}", err))
            .with_context(|| format!("parsing {} value `{}`", name, value)),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).with_context(|| format!("reading {}", name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_parses_case_insensitively() {
        assert_eq!("S3".parse::<StorageBackend>().unwrap(), StorageBackend::S3);
        assert_eq!("local".parse::<StorageBackend>().unwrap(), StorageBackend::Local);
        assert!("gcs".parse::<StorageBackend>().is_err());
    }

    #[test]
    fn parse_env_uses_default_when_unset() {
        let value = parse_env("VIDEO_STORE_TEST_SURELY_UNSET_VARIABLE", 42u64).unwrap();
        assert_eq!(value, 42);
    }
}
