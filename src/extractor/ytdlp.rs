use serde_json::Value;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use super::{ExtractionRequest, ExtractorError, ExtractorTool, FormatInfo, SearchHit};
use crate::config::{ExtractorConfig, HttpConfig};
use crate::units::seconds_to_display;

const POLL_INTERVAL: Duration = Duration::from_millis(100);
const ACCEPT_LANGUAGE: &str = "Accept-Language:en-US,en;q=0.9";

/// `yt-dlp` driven as a child process
#[derive(Debug, Clone)]
pub struct YtDlpTool {
    binary: String,
    download_timeout: Duration,
    probe_timeout: Duration,
    concurrent_fragments: u32,
    user_agent: String,
}

impl YtDlpTool {
    pub fn new(extractor: &ExtractorConfig, http: &HttpConfig) -> Self {
        Self {
            binary: extractor.binary.clone(),
            download_timeout: Duration::from_secs(extractor.timeout_secs),
            probe_timeout: Duration::from_secs(extractor.probe_timeout_secs),
            concurrent_fragments: extractor.concurrent_fragments,
            user_agent: http.user_agent.clone(),
        }
    }

    fn download_args(&self, request: &ExtractionRequest) -> Vec<String> {
        let mut args = vec![
            "--no-warnings".to_string(),
            "--no-playlist".to_string(),
            "--no-progress".to_string(),
            "--no-simulate".to_string(),
            "--print".to_string(),
            "after_move:filepath".to_string(),
            "--geo-bypass".to_string(),
            "--concurrent-fragments".to_string(),
            self.concurrent_fragments.to_string(),
            "--user-agent".to_string(),
            self.user_agent.clone(),
            "--add-header".to_string(),
            ACCEPT_LANGUAGE.to_string(),
            "-f".to_string(),
            request.format.clone(),
            "-o".to_string(),
            format!("{}.%(ext)s", request.output_stem.display()),
        ];

        if let Some(cookies) = &request.cookies {
            args.push("--cookies".to_string());
            args.push(cookies.display().to_string());
        }
        if let Some(transcode) = &request.transcode {
            args.extend([
                "-x".to_string(),
                "--audio-format".to_string(),
                transcode.codec.clone(),
                "--audio-quality".to_string(),
                transcode.bitrate.clone(),
            ]);
        }
        if let Some(container) = &request.merge_format {
            args.push("--merge-output-format".to_string());
            args.push(container.clone());
        }

        args.push(request.url.clone());
        args
    }

    fn info_args(&self, url: &str, format: Option<&str>, cookies: Option<&Path>) -> Vec<String> {
        let mut args = vec![
            "--dump-json".to_string(),
            "--no-warnings".to_string(),
            "--no-playlist".to_string(),
            "--skip-download".to_string(),
            "--user-agent".to_string(),
            self.user_agent.clone(),
        ];
        if let Some(format) = format {
            args.push("-f".to_string());
            args.push(format.to_string());
        }
        push_cookies(&mut args, cookies);
        args.push(url.to_string());
        args
    }

    fn run(&self, args: &[String], timeout: Duration) -> Result<String, ExtractorError> {
        debug!(binary = %self.binary, ?args, "Running extractor");
        let output = run_with_timeout(&self.binary, args, timeout)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let err = ExtractorError::from_stderr(&stderr);
            warn!(status = ?output.status.code(), error = %err, "Extractor run failed");
            return Err(err);
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl ExtractorTool for YtDlpTool {
    fn download(&self, request: &ExtractionRequest) -> Result<PathBuf, ExtractorError> {
        let stdout = self.run(&self.download_args(request), self.download_timeout)?;

        stdout
            .lines()
            .map(str::trim)
            .rfind(|l| !l.is_empty())
            .map(PathBuf::from)
            .ok_or_else(|| ExtractorError::Parse("no output path printed".to_string()))
    }

    fn declared_size(
        &self,
        url: &str,
        format: &str,
        cookies: Option<&Path>,
    ) -> Result<Option<u64>, ExtractorError> {
        let stdout = self.run(&self.info_args(url, Some(format), cookies), self.probe_timeout)?;
        Ok(parse_declared_size(&parse_json(&stdout)?))
    }

    fn formats(&self, url: &str, cookies: Option<&Path>) -> Result<Vec<FormatInfo>, ExtractorError> {
        let stdout = self.run(&self.info_args(url, None, cookies), self.probe_timeout)?;
        Ok(parse_formats(&parse_json(&stdout)?, url))
    }

    fn stream_url(
        &self,
        url: &str,
        format: &str,
        cookies: Option<&Path>,
    ) -> Result<String, ExtractorError> {
        let mut args = vec![
            "-g".to_string(),
            "--no-warnings".to_string(),
            "--no-playlist".to_string(),
            "-f".to_string(),
            format.to_string(),
        ];
        push_cookies(&mut args, cookies);
        args.push(url.to_string());

        let stdout = self.run(&args, self.probe_timeout)?;
        stdout
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .map(str::to_string)
            .ok_or_else(|| ExtractorError::Parse("no stream URL printed".to_string()))
    }

    fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, ExtractorError> {
        let args = if query.starts_with("http://") || query.starts_with("https://") {
            self.info_args(query, None, None)
        } else {
            vec![
                "--dump-json".to_string(),
                "--flat-playlist".to_string(),
                "--no-warnings".to_string(),
                format!("ytsearch{}:{}", limit.max(1), query),
            ]
        };

        let stdout = self.run(&args, self.probe_timeout)?;
        let mut hits = Vec::new();
        for line in stdout.lines().filter(|l| !l.trim().is_empty()) {
            hits.push(parse_hit(&parse_json(line)?));
        }
        hits.truncate(limit);
        Ok(hits)
    }

    fn playlist(&self, url: &str, limit: usize) -> Result<Vec<String>, ExtractorError> {
        let args = vec![
            "--flat-playlist".to_string(),
            "--no-warnings".to_string(),
            "--print".to_string(),
            "id".to_string(),
            "--playlist-end".to_string(),
            limit.to_string(),
            url.to_string(),
        ];

        let stdout = self.run(&args, self.probe_timeout)?;
        Ok(stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .take(limit)
            .map(str::to_string)
            .collect())
    }
}

fn push_cookies(args: &mut Vec<String>, cookies: Option<&Path>) {
    if let Some(path) = cookies {
        args.push("--cookies".to_string());
        args.push(path.display().to_string());
    }
}

/// Spawn `program`, drain both pipes on helper threads and kill it at `timeout`
fn run_with_timeout(program: &str, args: &[String], timeout: Duration) -> Result<Output, ExtractorError> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ExtractorError::ToolNotFound(program.to_string()),
            _ => ExtractorError::Failed(format!("failed to start {}: {}", program, e)),
        })?;

    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let deadline = Instant::now() + timeout;
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) if Instant::now() >= deadline => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(ExtractorError::Timeout(timeout));
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(e) => return Err(ExtractorError::Failed(format!("failed to wait: {}", e))),
        }
    };

    Ok(Output {
        status,
        stdout: stdout.join().unwrap_or_default(),
        stderr: stderr.join().unwrap_or_default(),
    })
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    })
}

fn parse_json(text: &str) -> Result<Value, ExtractorError> {
    serde_json::from_str(text.trim()).map_err(|e| ExtractorError::Parse(e.to_string()))
}

fn size_of(value: &Value) -> Option<u64> {
    value["filesize"]
        .as_u64()
        .or_else(|| value["filesize_approx"].as_u64())
        .or_else(|| value["filesize_approx"].as_f64().map(|f| f as u64))
}

/// Sum of the selected streams' sizes; `None` if any stream is unsized
pub(crate) fn parse_declared_size(info: &Value) -> Option<u64> {
    match info["requested_formats"].as_array() {
        Some(streams) if !streams.is_empty() => streams
            .iter()
            .map(size_of)
            .try_fold(0u64, |total, size| size.map(|s| total + s)),
        _ => size_of(info),
    }
}

/// Listed formats, minus DASH manifests
pub(crate) fn parse_formats(info: &Value, url: &str) -> Vec<FormatInfo> {
    let Some(formats) = info["formats"].as_array() else {
        return Vec::new();
    };

    formats
        .iter()
        .filter_map(|f| {
            let format = f["format"].as_str()?;
            let format_id = f["format_id"].as_str()?;
            let ext = f["ext"].as_str()?;
            if format.to_lowercase().contains("dash") {
                return None;
            }
            Some(FormatInfo {
                format: format.to_string(),
                format_id: format_id.to_string(),
                ext: ext.to_string(),
                filesize: f["filesize"].as_u64(),
                format_note: f["format_note"].as_str().unwrap_or_default().to_string(),
                url: url.to_string(),
            })
        })
        .collect()
}

pub(crate) fn parse_hit(info: &Value) -> SearchHit {
    let id = info["id"].as_str().unwrap_or_default().to_string();

    let duration_display = match info["duration_string"].as_str() {
        Some(display) => display.to_string(),
        None => info["duration"]
            .as_f64()
            .map(|secs| seconds_to_display(secs as u64))
            .unwrap_or_default(),
    };

    let thumbnail = info["thumbnail"]
        .as_str()
        .or_else(|| info["thumbnails"][0]["url"].as_str())
        .unwrap_or_default();

    let url = info["webpage_url"]
        .as_str()
        .or_else(|| info["url"].as_str())
        .map(str::to_string)
        .unwrap_or_else(|| format!("{}{}", crate::reference::WATCH_BASE, id));

    SearchHit {
        title: info["title"].as_str().unwrap_or_default().to_string(),
        duration_display,
        thumbnail_url: thumbnail.to_string(),
        url,
        id,
    }
}
