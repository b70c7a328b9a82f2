use crate::units::ByteSize;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub downloads: DownloadsConfig,
    #[serde(default)]
    pub credentials: CredentialsConfig,
    #[serde(default)]
    pub metadata: MetadataConfig,
    #[serde(default)]
    pub extractor: ExtractorConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub server: ServerConfig,
    /// Ordered fallback sequence; order is decided by `priority`
    #[serde(default = "default_strategies")]
    pub strategies: Vec<StrategyConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            downloads: DownloadsConfig::default(),
            credentials: CredentialsConfig::default(),
            metadata: MetadataConfig::default(),
            extractor: ExtractorConfig::default(),
            http: HttpConfig::default(),
            server: ServerConfig::default(),
            strategies: default_strategies(),
        }
    }
}

/// Output directory and caller deadline
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DownloadsConfig {
    #[serde(default = "default_downloads_dir")]
    pub dir: PathBuf,
    /// Upper bound for one whole `acquire` call
    #[serde(default = "default_deadline_secs")]
    pub deadline_secs: u64,
}

impl Default for DownloadsConfig {
    fn default() -> Self {
        Self {
            dir: default_downloads_dir(),
            deadline_secs: default_deadline_secs(),
        }
    }
}

impl DownloadsConfig {
    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_secs)
    }
}

fn default_downloads_dir() -> PathBuf {
    PathBuf::from("downloads")
}

fn default_deadline_secs() -> u64 {
    180
}

/// Credential (cookie file) pool
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CredentialsConfig {
    #[serde(default = "default_credentials_dir")]
    pub dir: PathBuf,
    /// Remote cookie-file source (secret; usually from `COOKIES`)
    #[serde(default)]
    pub refresh_url: Option<String>,
    /// File name the refreshed credential is written to, inside `dir`
    #[serde(default = "default_refresh_file")]
    pub refresh_file: String,
    /// Start rotation at a random index instead of the first file
    #[serde(default = "default_random_start")]
    pub random_start: bool,
    #[serde(default = "default_refresh_retry_delay_ms")]
    pub refresh_retry_delay_ms: u64,
    #[serde(default = "default_refresh_timeout_secs")]
    pub refresh_timeout_secs: u64,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            dir: default_credentials_dir(),
            refresh_url: None,
            refresh_file: default_refresh_file(),
            random_start: default_random_start(),
            refresh_retry_delay_ms: default_refresh_retry_delay_ms(),
            refresh_timeout_secs: default_refresh_timeout_secs(),
        }
    }
}

impl CredentialsConfig {
    pub fn refresh_path(&self) -> PathBuf {
        self.dir.join(&self.refresh_file)
    }
}

fn default_credentials_dir() -> PathBuf {
    PathBuf::from("cookies")
}

fn default_refresh_file() -> String {
    "cookies.txt".to_string()
}

fn default_random_start() -> bool {
    true
}

fn default_refresh_retry_delay_ms() -> u64 {
    1000
}

fn default_refresh_timeout_secs() -> u64 {
    30
}

/// Metadata lookups
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MetadataConfig {
    /// Hard timeout for a single provider call
    #[serde(default = "default_metadata_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_search_results")]
    pub max_search_results: usize,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_metadata_timeout_secs(),
            max_search_results: default_max_search_results(),
        }
    }
}

fn default_metadata_timeout_secs() -> u64 {
    30
}

fn default_max_search_results() -> usize {
    10
}

/// External extraction tool
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExtractorConfig {
    #[serde(default = "default_extractor_binary")]
    pub binary: String,
    /// Size of the blocking worker pool
    #[serde(default = "default_extractor_workers")]
    pub workers: usize,
    /// Process timeout for downloads
    #[serde(default = "default_extractor_timeout_secs")]
    pub timeout_secs: u64,
    /// Process timeout for info/probe calls
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,
    #[serde(default = "default_concurrent_fragments")]
    pub concurrent_fragments: u32,
    #[serde(default = "default_audio_codec")]
    pub audio_codec: String,
    #[serde(default = "default_explicit_audio_codec")]
    pub explicit_audio_codec: String,
    #[serde(default = "default_audio_bitrate")]
    pub audio_bitrate: String,
    #[serde(default = "default_max_height")]
    pub max_height: u32,
    #[serde(default = "default_max_width")]
    pub max_width: u32,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            binary: default_extractor_binary(),
            workers: default_extractor_workers(),
            timeout_secs: default_extractor_timeout_secs(),
            probe_timeout_secs: default_probe_timeout_secs(),
            concurrent_fragments: default_concurrent_fragments(),
            audio_codec: default_audio_codec(),
            explicit_audio_codec: default_explicit_audio_codec(),
            audio_bitrate: default_audio_bitrate(),
            max_height: default_max_height(),
            max_width: default_max_width(),
        }
    }
}

fn default_extractor_binary() -> String {
    "yt-dlp".to_string()
}

fn default_extractor_workers() -> usize {
    4
}

fn default_extractor_timeout_secs() -> u64 {
    60
}

fn default_probe_timeout_secs() -> u64 {
    30
}

fn default_concurrent_fragments() -> u32 {
    42
}

fn default_audio_codec() -> String {
    "m4a".to_string()
}

fn default_explicit_audio_codec() -> String {
    "mp3".to_string()
}

fn default_audio_bitrate() -> String {
    "192K".to_string()
}

fn default_max_height() -> u32 {
    720
}

fn default_max_width() -> u32 {
    1280
}

/// Shared HTTP client settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpConfig {
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Idle read timeout while streaming a body
    #[serde(default = "default_read_timeout_secs")]
    pub read_timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Write buffer used while streaming a transfer to disk
    #[serde(default = "default_chunk_size")]
    pub chunk_size: ByteSize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout_secs(),
            read_timeout_secs: default_read_timeout_secs(),
            user_agent: default_user_agent(),
            chunk_size: default_chunk_size(),
        }
    }
}

fn default_connect_timeout_secs() -> u64 {
    30
}

fn default_read_timeout_secs() -> u64 {
    60
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/129.0.0.0 Safari/537.36".to_string()
}

fn default_chunk_size() -> ByteSize {
    ByteSize::mib(8)
}

/// HTTP surface
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

/// Strategy family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyType {
    ProxyApi,
    Extractor,
}

/// What a strategy can produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Audio,
    Video,
    #[serde(alias = "format")]
    FormatSpecific,
}

/// Per-kind byte ceilings; `None` means unbounded
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct SizeCeilings {
    #[serde(default)]
    pub audio: Option<ByteSize>,
    #[serde(default)]
    pub video: Option<ByteSize>,
    #[serde(default)]
    pub format: Option<ByteSize>,
}

impl SizeCeilings {
    pub fn for_capability(&self, capability: Capability) -> Option<ByteSize> {
        match capability {
            Capability::Audio => self.audio,
            Capability::Video => self.video,
            Capability::FormatSpecific => self.format,
        }
    }
}

/// One entry of the strategy chain
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StrategyConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub strategy_type: StrategyType,
    /// Lower runs first
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "default_kinds")]
    pub kinds: Vec<Capability>,
    /// Hard per-attempt timeout
    #[serde(default = "default_attempt_timeout_secs")]
    pub timeout_secs: u64,
    /// Total attempts, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    #[serde(default)]
    pub max_bytes: SizeCeilings,
    /// Proxy-API endpoints, raced against each other
    #[serde(default)]
    pub endpoints: Vec<String>,
    /// Proxy-API key (loaded from environment, not from config file)
    #[serde(skip)]
    pub api_key: Option<String>,
    #[serde(default = "default_proxy_audio_format")]
    pub audio_format: String,
    #[serde(default = "default_proxy_video_format")]
    pub video_format: String,
}

impl StrategyConfig {
    pub fn proxy_api(name: impl Into<String>, priority: i32) -> Self {
        Self {
            name: name.into(),
            strategy_type: StrategyType::ProxyApi,
            priority,
            kinds: vec![Capability::Audio, Capability::Video],
            timeout_secs: default_attempt_timeout_secs(),
            max_attempts: default_max_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            max_bytes: SizeCeilings {
                audio: Some(ByteSize::mib(500)),
                video: Some(ByteSize::mib(500)),
                format: None,
            },
            endpoints: Vec::new(),
            api_key: None,
            audio_format: default_proxy_audio_format(),
            video_format: default_proxy_video_format(),
        }
    }

    pub fn extractor(name: impl Into<String>, priority: i32) -> Self {
        Self {
            name: name.into(),
            strategy_type: StrategyType::Extractor,
            priority,
            kinds: vec![
                Capability::Audio,
                Capability::Video,
                Capability::FormatSpecific,
            ],
            timeout_secs: default_attempt_timeout_secs(),
            max_attempts: 1,
            retry_backoff_ms: default_retry_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            max_bytes: SizeCeilings {
                audio: None,
                video: Some(ByteSize::gib(1)),
                format: None,
            },
            endpoints: Vec::new(),
            api_key: None,
            audio_format: default_proxy_audio_format(),
            video_format: default_proxy_video_format(),
        }
    }

    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_strategies() -> Vec<StrategyConfig> {
    vec![
        StrategyConfig::proxy_api("proxy", 10),
        StrategyConfig::extractor("extractor", 20),
    ]
}

fn default_kinds() -> Vec<Capability> {
    vec![Capability::Audio, Capability::Video]
}

fn default_attempt_timeout_secs() -> u64 {
    90
}

fn default_max_attempts() -> u32 {
    2
}

fn default_retry_backoff_ms() -> u64 {
    500
}

fn default_max_backoff_ms() -> u64 {
    8000
}

fn default_proxy_audio_format() -> String {
    "m4a".to_string()
}

fn default_proxy_video_format() -> String {
    "360".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.server.bind_addr.to_string(), "0.0.0.0:8080");
        assert_eq!(config.downloads.dir, PathBuf::from("downloads"));
        assert_eq!(config.credentials.refresh_path(), PathBuf::from("cookies/cookies.txt"));
        assert_eq!(config.http.chunk_size, ByteSize::mib(8));
        assert_eq!(config.strategies.len(), 2);
        assert_eq!(config.strategies[0].strategy_type, StrategyType::ProxyApi);
        assert_eq!(config.strategies[1].strategy_type, StrategyType::Extractor);
    }

    #[test]
    fn test_size_ceilings_by_capability() {
        let ceilings = SizeCeilings {
            audio: None,
            video: Some(ByteSize::mib(250)),
            format: None,
        };
        assert_eq!(ceilings.for_capability(Capability::Video), Some(ByteSize::mib(250)));
        assert_eq!(ceilings.for_capability(Capability::Audio), None);
    }

    #[test]
    fn test_strategy_from_toml() {
        let parsed: StrategyConfig = toml::from_str(
            r#"
name = "mirror"
type = "proxy_api"
priority = 5
kinds = ["audio"]
endpoints = ["https://a.example/api"]

[max_bytes]
audio = "100MB"
            "#,
        )
        .unwrap();

        assert_eq!(parsed.strategy_type, StrategyType::ProxyApi);
        assert_eq!(parsed.kinds, vec![Capability::Audio]);
        assert_eq!(parsed.max_bytes.audio, Some(ByteSize::mib(100)));
        assert_eq!(parsed.max_attempts, 2);
        assert_eq!(parsed.audio_format, "m4a");
    }
}
