// yt-dlp fallback extractor
//
// Two ways to run it:
// - Python mode: `python3 -m yt_dlp` (usually newer, better with cookies)
// - CLI mode: native `yt-dlp` binary (no Python dependency)
// Auto picks Python when the module is importable, CLI otherwise. The choice
// is made once, at construction.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::process::Command as StdCommand;
use tracing::{debug, warn};

use crate::resolver::errors::ResolveError;
use crate::resolver::models::{ExtractedStream, StreamKind};
use crate::resolver::traits::FallbackExtractor;
use crate::resolver::utils::run_output_with_timeout;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractorMode {
    Python,
    Cli,
    #[default]
    Auto,
}

impl fmt::Display for ExtractorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Python => write!(f, "python"),
            Self::Cli => write!(f, "cli"),
            Self::Auto => write!(f, "auto"),
        }
    }
}

/// Configuration for the fallback extractor
#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    pub mode: ExtractorMode,
    /// SOCKS5/HTTP proxy URL
    pub proxy: Option<String>,
    /// Path to cookies.txt
    pub cookies_path: Option<String>,
    pub timeout_seconds: u64,
    pub user_agent: String,
    /// Explicit yt-dlp binary, skips path discovery
    pub ytdlp_path: Option<String>,
    /// Explicit Python interpreter
    pub python_cmd: Option<String>,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            mode: ExtractorMode::Auto,
            proxy: None,
            cookies_path: None,
            timeout_seconds: 30,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36".to_string(),
            ytdlp_path: None,
            python_cmd: None,
        }
    }
}

impl ExtractorConfig {
    pub fn with_mode(mut self, mode: ExtractorMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_proxy(mut self, proxy: Option<String>) -> Self {
        self.proxy = proxy;
        self
    }

    pub fn with_cookies_path(mut self, path: Option<String>) -> Self {
        self.cookies_path = path;
        self
    }

    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_ytdlp_path(mut self, path: Option<String>) -> Self {
        self.ytdlp_path = path;
        self
    }

    pub fn with_python_cmd(mut self, python: Option<String>) -> Self {
        self.python_cmd = python;
        self
    }
}

pub struct YtDlpExtractor {
    config: ExtractorConfig,
    /// Program to spawn plus the arguments that select yt-dlp inside it
    program: String,
    prefix_args: Vec<String>,
    mode: ExtractorMode,
}

impl YtDlpExtractor {
    pub fn new(config: ExtractorConfig) -> Self {
        let python = config.python_cmd.clone().unwrap_or_else(find_python);

        let mode = match config.mode {
            ExtractorMode::Auto if python_has_module(&python, "yt_dlp") => ExtractorMode::Python,
            ExtractorMode::Auto => ExtractorMode::Cli,
            explicit => explicit,
        };

        let (program, prefix_args) = match mode {
            ExtractorMode::Python => (python, vec!["-m".to_string(), "yt_dlp".to_string()]),
            _ => (
                config.ytdlp_path.clone().unwrap_or_else(find_ytdlp),
                Vec::new(),
            ),
        };

        debug!(%mode, %program, "fallback extractor ready");

        Self {
            config,
            program,
            prefix_args,
            mode,
        }
    }

    /// `new` on the blocking pool. Auto mode probes the Python interpreter
    /// synchronously, which must not stall a runtime worker.
    pub async fn detect(config: ExtractorConfig) -> Result<Self, ResolveError> {
        tokio::task::spawn_blocking(move || Self::new(config))
            .await
            .map_err(|e| ResolveError::FallbackUnavailable(format!("mode detection: {}", e)))
    }

    /// Mode actually in use (never `Auto`)
    pub fn mode(&self) -> ExtractorMode {
        self.mode
    }

    /// Single-file selectors only: we need one direct URL, not a merge
    fn format_selector(kind: StreamKind) -> &'static str {
        match kind {
            StreamKind::Audio => "bestaudio/best",
            StreamKind::Video => "best[vcodec!=none][acodec!=none]/best",
        }
    }

    fn build_args(&self, url: &str, kind: StreamKind) -> Vec<String> {
        let mut args = self.prefix_args.clone();
        args.extend([
            "-f".to_string(),
            Self::format_selector(kind).to_string(),
            "--dump-json".to_string(),
            "--no-playlist".to_string(),
            "--no-warnings".to_string(),
            "--socket-timeout".to_string(),
            self.config.timeout_seconds.min(15).to_string(),
            "--user-agent".to_string(),
            self.config.user_agent.clone(),
        ]);

        if let Some(path) = &self.config.cookies_path {
            args.push("--cookies".to_string());
            args.push(path.clone());
        }

        if let Some(proxy) = &self.config.proxy {
            args.push("--proxy".to_string());
            args.push(proxy.clone());
        }

        args.push(url.to_string());
        args
    }

    fn parse_json(stdout: &[u8]) -> Result<ExtractedStream, ResolveError> {
        let json: serde_json::Value = serde_json::from_slice(stdout).map_err(|e| {
            ResolveError::FallbackUnavailable(format!("Invalid yt-dlp JSON: {}", e))
        })?;

        let direct_url = json["url"]
            .as_str()
            .filter(|u| !u.is_empty())
            .or_else(|| json["requested_formats"][0]["url"].as_str())
            .ok_or_else(|| {
                ResolveError::FallbackUnavailable("yt-dlp returned no direct url".to_string())
            })?;

        Ok(ExtractedStream {
            direct_url: direct_url.to_string(),
            title: json["title"].as_str().unwrap_or("").to_string(),
            uploader: json["uploader"]
                .as_str()
                .or_else(|| json["channel"].as_str())
                .unwrap_or("")
                .to_string(),
            ext: json["ext"].as_str().map(|s| s.to_string()),
        })
    }
}

#[async_trait]
impl FallbackExtractor for YtDlpExtractor {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    async fn extract(
        &self,
        video_url: &str,
        kind: StreamKind,
    ) -> Result<ExtractedStream, ResolveError> {
        let args = self.build_args(video_url, kind);
        debug!(program = %self.program, args = %args.join(" "), "running yt-dlp");

        let output = run_output_with_timeout(&self.program, args, self.config.timeout_seconds)
            .await
            .map_err(|e| ResolveError::FallbackUnavailable(format!("yt-dlp: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let summary: Vec<&str> = stderr
                .lines()
                .map(str::trim)
                .filter(|l| l.starts_with("ERROR:"))
                .take(2)
                .collect();
            warn!(status = %output.status, "yt-dlp failed: {}", summary.join(" | "));
            return Err(ResolveError::FallbackUnavailable(stderr.trim().to_string()));
        }

        Self::parse_json(&output.stdout)
    }
}

/// Python interpreter; `YTDLP_PYTHON` wins (e.g. a venv)
fn find_python() -> String {
    std::env::var("YTDLP_PYTHON").unwrap_or_else(|_| "python3".to_string())
}

fn python_has_module(python: &str, module: &str) -> bool {
    let code = format!("import {}", module);
    match StdCommand::new(python).args(["-c", &code]).output() {
        Ok(out) => out.status.success(),
        Err(_) => false,
    }
}

/// yt-dlp binary; `YTDLP_PATH`, then common locations, then PATH
fn find_ytdlp() -> String {
    if let Ok(custom) = std::env::var("YTDLP_PATH") {
        return custom;
    }

    let common_paths = ["/opt/homebrew/bin/yt-dlp", "/usr/local/bin/yt-dlp", "/usr/bin/yt-dlp"];
    for path in common_paths {
        if std::path::Path::new(path).exists() {
            return path.to_string();
        }
    }

    "yt-dlp".to_string()
}
