use std::time::Duration;

use async_trait::async_trait;
use tokio::{process::Command, time::timeout};
use tracing::{debug, warn};

use super::{FingerprintError, FingerprintProvider};

/// Runs a host command and uses its trimmed stdout as the fingerprint.
#[derive(Debug, Clone)]
pub struct CommandFingerprint {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandFingerprint {
    pub fn new(program: impl Into<String>, args: &[&str], timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
            timeout,
        }
    }

    /// Hardware UUID on Windows, kernel release elsewhere.
    pub fn for_host(timeout: Duration) -> Self {
        if cfg!(windows) {
            Self::new("wmic", &["csproduct", "get", "uuid"], timeout)
        } else {
            Self::new("uname", &["-r"], timeout)
        }
    }

    fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[async_trait]
impl FingerprintProvider for CommandFingerprint {
    async fn current_fingerprint(&self) -> Result<String, FingerprintError> {
        let command = self.display();
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).kill_on_drop(true);

        let output = match timeout(self.timeout, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(source)) => {
                warn!(%command, error = %source, "fingerprint command could not start");
                return Err(FingerprintError::Spawn { command, source });
            }
            Err(_) => {
                warn!(%command, timeout = ?self.timeout, "fingerprint command timed out");
                return Err(FingerprintError::TimedOut(self.timeout));
            }
        };

        if !output.status.success() {
            return Err(FingerprintError::Failed {
                command,
                status: output.status.to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let value = parse_output(&stdout).ok_or(FingerprintError::Empty)?;
        debug!(%command, "fingerprint collected");
        Ok(value)
    }
}

/// Trim the output and drop a `UUID` header line, as printed by `wmic`.
fn parse_output(stdout: &str) -> Option<String> {
    let lines: Vec<&str> = stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .filter(|l| !l.eq_ignore_ascii_case("uuid"))
        .collect();

    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}
