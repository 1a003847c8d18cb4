use super::extractor::{ExtractError, Extractor};
use crate::config::ExtractorConfig;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

pub struct YtDlpExtractor {
    binary: String,
    timeout: Duration,
    user_agent: String,
}

impl YtDlpExtractor {
    pub fn new(config: &ExtractorConfig) -> Self {
        Self {
            binary: config.binary.clone(),
            timeout: config.timeout(),
            user_agent: config.user_agent.clone(),
        }
    }

    fn full_args(&self) -> Vec<&str> {
        vec![
            "--dump-single-json",
            "--no-warnings",
            "--no-check-certificate",
            "--no-playlist",
            "--user-agent",
            &self.user_agent,
        ]
    }

    fn minimal_args() -> Vec<&'static str> {
        vec!["--dump-single-json"]
    }

    /// Runs the extractor once. The URL is always a single argv element after
    /// `--`, so it can never be read as an option.
    async fn run(&self, args: &[&str], url: &str) -> Result<Value, ExtractError> {
        debug!("Running {} {:?} for: {}", self.binary, args, url);

        let output = tokio::time::timeout(
            self.timeout,
            Command::new(&self.binary)
                .args(args)
                .arg("--")
                .arg(url)
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| ExtractError::Timeout(self.timeout))??;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            debug!("{} stderr: {}", self.binary, stderr.trim());
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        match serde_json::from_str::<Value>(stdout.trim()) {
            Ok(json) if json.is_object() => {
                if !output.status.success() {
                    warn!(
                        "{} exited with {} but produced a document, using it",
                        self.binary, output.status
                    );
                }
                Ok(json)
            }
            _ => Err(ExtractError::Failed(if stderr.trim().is_empty() {
                format!("exit status {}", output.status)
            } else {
                stderr.trim().to_string()
            })),
        }
    }

    pub async fn test_availability(&self) -> bool {
        match Command::new(&self.binary).arg("--version").output().await {
            Ok(output) => {
                if output.status.success() {
                    let version = String::from_utf8_lossy(&output.stdout);
                    info!("✅ {} is available, version: {}", self.binary, version.trim());
                    true
                } else {
                    warn!("❌ {} command failed", self.binary);
                    false
                }
            }
            Err(e) => {
                warn!("❌ {} not found: {}", self.binary, e);
                false
            }
        }
    }
}

#[async_trait]
impl Extractor for YtDlpExtractor {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    async fn extract(&self, url: &str) -> Result<Value, ExtractError> {
        match self.run(&self.full_args(), url).await {
            Ok(json) => Ok(json),
            Err(ExtractError::Failed(reason)) => {
                warn!(
                    "{} failed ({}), retrying with minimal flags",
                    self.name(),
                    reason
                );
                self.run(&Self::minimal_args(), url).await
            }
            Err(e) => Err(e),
        }
    }
}
