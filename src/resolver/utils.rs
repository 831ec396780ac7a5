// Helper functions shared by the resolver, extractor and HTTP layer

use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::Command as TokioCommand;
use tokio::time::timeout;

use super::errors::ResolveError;

/// Longest display title we hand out (characters, not bytes)
pub const MAX_TITLE_CHARS: usize = 150;

const FALLBACK_TITLE: &str = "video";

/// Run a command, collect stdout/stderr, kill it if it outlives `timeout_secs`
pub async fn run_output_with_timeout(
    program: &str,
    args: Vec<String>,
    timeout_secs: u64,
) -> Result<std::process::Output, String> {
    let mut child = TokioCommand::new(program)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| format!("Failed to start {}: {}", program, e))?;

    let mut stdout_pipe = child
        .stdout
        .take()
        .ok_or_else(|| format!("Failed to capture stdout from {}", program))?;
    let mut stderr_pipe = child
        .stderr
        .take()
        .ok_or_else(|| format!("Failed to capture stderr from {}", program))?;

    let stdout_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        stdout_pipe
            .read_to_end(&mut buf)
            .await
            .map_err(|e| format!("Failed to read stdout: {}", e))?;
        Ok::<Vec<u8>, String>(buf)
    });
    let stderr_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        stderr_pipe
            .read_to_end(&mut buf)
            .await
            .map_err(|e| format!("Failed to read stderr: {}", e))?;
        Ok::<Vec<u8>, String>(buf)
    });

    match timeout(Duration::from_secs(timeout_secs), child.wait()).await {
        Ok(status_res) => {
            let status = status_res.map_err(|e| format!("Failed to wait for {}: {}", program, e))?;
            let stdout = stdout_task
                .await
                .map_err(|e| format!("stdout task failed: {}", e))??;
            let stderr = stderr_task
                .await
                .map_err(|e| format!("stderr task failed: {}", e))??;
            Ok(std::process::Output {
                status,
                stdout,
                stderr,
            })
        }
        Err(_) => {
            let _ = child.kill().await;
            stdout_task.abort();
            stderr_task.abort();
            Err(format!("Timed out after {}s", timeout_secs))
        }
    }
}

/// Client shared by fetcher, probe and remote provider source
pub fn build_http_client(
    user_agent: &str,
    proxy: Option<&str>,
) -> Result<reqwest::Client, ResolveError> {
    let mut builder = reqwest::Client::builder()
        .user_agent(user_agent)
        .connect_timeout(Duration::from_secs(8));

    if let Some(proxy_url) = proxy {
        let proxy = reqwest::Proxy::all(proxy_url)
            .map_err(|e| ResolveError::InvalidInput(format!("invalid proxy {}: {}", proxy_url, e)))?;
        builder = builder.proxy(proxy);
    }

    builder
        .build()
        .map_err(|e| ResolveError::InvalidInput(format!("http client: {}", e)))
}

/// Keep only characters that are safe in file names and headers, then trim
/// and cap the length. Idempotent.
pub fn sanitize_title(raw: &str) -> String {
    let filtered: String = raw
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_' | '(' | ')' | '[' | ']'))
        .collect();

    let truncated: String = filtered.trim().chars().take(MAX_TITLE_CHARS).collect();
    // Truncation can expose a trailing space
    truncated.trim_end().to_string()
}

/// "{uploader} - {title}", sanitized. Blank parts are left out.
pub fn display_title(uploader: Option<&str>, title: Option<&str>) -> String {
    let uploader = uploader.map(str::trim).filter(|u| !u.is_empty());
    let title = title.map(str::trim).filter(|t| !t.is_empty());

    let raw = match (uploader, title) {
        (Some(u), Some(t)) => format!("{} - {}", u, t),
        (None, Some(t)) => t.to_string(),
        (Some(u), None) => u.to_string(),
        (None, None) => String::new(),
    };

    let sanitized = sanitize_title(&raw);
    if sanitized.is_empty() {
        FALLBACK_TITLE.to_string()
    } else {
        sanitized
    }
}

/// Stream URL with a `title` hint so the upstream serves it as a named download
pub fn attachment_url(url: &str, display_title: &str, ext: &str) -> String {
    let separator = if url.contains('?') { '&' } else { '?' };
    let filename = format!("{}.{}", display_title, ext);
    format!(
        "{}{}title={}",
        url,
        separator,
        urlencoding::encode(&filename)
    )
}
