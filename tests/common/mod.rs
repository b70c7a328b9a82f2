#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use mediafetch::config::{Config, CredentialsConfig, DownloadsConfig, StrategyConfig};
use mediafetch::extractor::{
    ExtractionRequest, ExtractorError, ExtractorTool, FormatInfo, SearchHit,
};
use tempfile::TempDir;

pub const MEDIA_ID: &str = "dQw4w9WgXcQ";
pub const PAYLOAD: &[u8] = b"not really an m4a file";

/// Scripted extractor: downloads succeed only with the `accepted` cookie file
pub struct FakeTool {
    pub accepted: Option<String>,
    pub declared: Option<u64>,
    pub downloads: Mutex<Vec<PathBuf>>,
    pub stems: Mutex<Vec<PathBuf>>,
    pub probes: Mutex<usize>,
    transient: Mutex<Option<String>>,
}

impl FakeTool {
    pub fn accepting(name: &str) -> Self {
        Self {
            accepted: Some(name.to_string()),
            declared: None,
            downloads: Mutex::new(Vec::new()),
            stems: Mutex::new(Vec::new()),
            probes: Mutex::new(0),
            transient: Mutex::new(None),
        }
    }

    pub fn blocking_all() -> Self {
        Self {
            accepted: None,
            declared: None,
            downloads: Mutex::new(Vec::new()),
            stems: Mutex::new(Vec::new()),
            probes: Mutex::new(0),
            transient: Mutex::new(None),
        }
    }

    pub fn declaring(mut self, bytes: u64) -> Self {
        self.declared = Some(bytes);
        self
    }

    /// The first run with cookie file `name` fails with a non-credential error
    pub fn failing_once(self, name: &str) -> Self {
        *self.transient.lock().unwrap() = Some(name.to_string());
        self
    }

    /// File names of the cookie files each download was run with
    pub fn cookies_used(&self) -> Vec<String> {
        self.downloads
            .lock()
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect()
    }
}

impl ExtractorTool for FakeTool {
    fn download(&self, request: &ExtractionRequest) -> Result<PathBuf, ExtractorError> {
        let cookies = request.cookies.clone().expect("extractor runs with cookies");
        self.downloads.lock().unwrap().push(cookies.clone());
        self.stems.lock().unwrap().push(request.output_stem.clone());

        let name = cookies.file_name().unwrap().to_string_lossy().into_owned();
        {
            let mut transient = self.transient.lock().unwrap();
            if transient.as_deref() == Some(name.as_str()) {
                *transient = None;
                return Err(ExtractorError::Failed("HTTP Error 503: Service Unavailable".to_string()));
            }
        }
        if self.accepted.as_deref() != Some(name.as_str()) {
            return Err(ExtractorError::from_stderr(
                "ERROR: [youtube] dQw4w9WgXcQ: Sign in to confirm you're not a bot",
            ));
        }

        let produced = PathBuf::from(format!("{}.m4a", request.output_stem.display()));
        std::fs::write(&produced, PAYLOAD).map_err(|e| ExtractorError::Failed(e.to_string()))?;
        Ok(produced)
    }

    fn declared_size(
        &self,
        _url: &str,
        _format: &str,
        _cookies: Option<&Path>,
    ) -> Result<Option<u64>, ExtractorError> {
        *self.probes.lock().unwrap() += 1;
        Ok(self.declared)
    }

    fn formats(&self, _url: &str, _cookies: Option<&Path>) -> Result<Vec<FormatInfo>, ExtractorError> {
        Ok(vec![FormatInfo {
            format: "18 - 640x360 (360p)".to_string(),
            format_id: "18".to_string(),
            ext: "mp4".to_string(),
            filesize: Some(1024),
            format_note: "360p".to_string(),
            url: "https://cdn.example/18".to_string(),
        }])
    }

    fn stream_url(
        &self,
        _url: &str,
        _format: &str,
        _cookies: Option<&Path>,
    ) -> Result<String, ExtractorError> {
        Ok("https://cdn.example/stream".to_string())
    }

    fn search(&self, query: &str, _limit: usize) -> Result<Vec<SearchHit>, ExtractorError> {
        if !query.contains(MEDIA_ID) {
            return Ok(Vec::new());
        }
        Ok(vec![SearchHit {
            id: MEDIA_ID.to_string(),
            title: "Never Gonna Give You Up".to_string(),
            duration_display: "3:33".to_string(),
            thumbnail_url: format!("https://i.ytimg.com/vi/{}/hq720.jpg?sqp=abc", MEDIA_ID),
            url: format!("https://www.youtube.com/watch?v={}", MEDIA_ID),
        }])
    }

    fn playlist(&self, _url: &str, limit: usize) -> Result<Vec<String>, ExtractorError> {
        Ok(vec![MEDIA_ID.to_string(); limit.min(2)])
    }
}

pub fn write_cookie(dir: &Path, name: &str) {
    std::fs::create_dir_all(dir).unwrap();
    std::fs::write(
        dir.join(name),
        format!(
            "# Netscape HTTP Cookie File\n.youtube.com\tTRUE\t/\tTRUE\t0\tSID\t{}\n",
            name
        ),
    )
    .unwrap();
}

/// Config rooted in `temp` with the given strategies and a deterministic rotation start
pub fn test_config(temp: &TempDir, strategies: Vec<StrategyConfig>) -> Config {
    Config {
        downloads: DownloadsConfig {
            dir: temp.path().join("downloads"),
            deadline_secs: 30,
        },
        credentials: CredentialsConfig {
            dir: temp.path().join("cookies"),
            random_start: false,
            refresh_retry_delay_ms: 10,
            refresh_timeout_secs: 5,
            ..Default::default()
        },
        strategies,
        ..Default::default()
    }
}

pub fn extractor_only() -> StrategyConfig {
    let mut extractor = StrategyConfig::extractor("extractor", 20);
    extractor.retry_backoff_ms = 10;
    extractor
}

pub fn proxy(endpoints: Vec<String>) -> StrategyConfig {
    let mut proxy = StrategyConfig::proxy_api("proxy", 10);
    proxy.endpoints = endpoints;
    proxy.max_attempts = 1;
    proxy.retry_backoff_ms = 10;
    proxy
}

/// Regular files in `dir`, hidden ones included
pub fn files_in(dir: &Path) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .filter_map(Result::ok)
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
