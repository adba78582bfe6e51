//! Retrieval of export artifacts from a remote source host over `scp`, and
//! their cleanup over `sftp`.

use std::path::Path;
use std::process::Stdio;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use copy_core::RemoteFileTransfer;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

/// Shells out to the system `scp` and `sftp` clients in batch mode, so
/// authentication must already be set up non-interactively.
#[derive(Debug, Clone, Default)]
pub struct ScpTransfer {
    verbose: bool,
}

impl ScpTransfer {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

/// `principal@host`, refusing values that `scp` would read as an option.
fn remote_target(host: &str, principal: &str) -> Result<String> {
    if host.is_empty() || principal.is_empty() {
        bail!("Remote host and user must not be empty");
    }
    if host.starts_with('-') || principal.starts_with('-') {
        bail!("Refusing remote host or user starting with '-': {principal}@{host}");
    }
    Ok(format!("{principal}@{host}"))
}

/// Arguments for `scp`: compressed, batch mode, quiet unless verbose.
pub fn scp_args(
    host: &str,
    principal: &str,
    remote: &Path,
    local: &Path,
    verbose: bool,
) -> Result<Vec<String>> {
    let mut args = vec!["-C".to_string(), "-B".to_string()];
    if !verbose {
        args.push("-q".to_string());
    }
    args.push(format!("{}:{}", remote_target(host, principal)?, remote.display()));
    args.push(local.display().to_string());
    Ok(args)
}

/// The `sftp` batch script removing `remote`.
pub fn sftp_remove_script(remote: &Path) -> Result<String> {
    let path = remote.display().to_string();
    if path.contains('"') || path.contains('\n') {
        bail!("Refusing to remove remote path with quotes or newlines: {path}");
    }
    Ok(format!("rm \"{path}\"\n"))
}

#[async_trait]
impl RemoteFileTransfer for ScpTransfer {
    async fn retrieve(&self, host: &str, principal: &str, remote: &Path, local: &Path) -> bool {
        let args = match scp_args(host, principal, remote, local, self.verbose) {
            Ok(args) => args,
            Err(e) => {
                warn!("{e:#}");
                return false;
            }
        };
        debug!("scp {}", args.join(" "));

        match Command::new("scp").args(&args).stdin(Stdio::null()).status().await {
            Ok(status) if status.success() => true,
            Ok(status) => {
                warn!(
                    "scp of {} from {host} exited with {status}",
                    remote.display()
                );
                false
            }
            Err(e) => {
                warn!("Failed to run scp: {e}");
                false
            }
        }
    }

    async fn remove_remote(&self, host: &str, principal: &str, remote: &Path) -> Result<()> {
        let target = remote_target(host, principal)?;
        let script = sftp_remove_script(remote)?;
        debug!("sftp -b - {target} <<< {}", script.trim_end());

        let mut child = Command::new("sftp")
            .args(["-b", "-", &target])
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(if self.verbose {
                Stdio::inherit()
            } else {
                Stdio::null()
            })
            .spawn()
            .context("Failed to run sftp")?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(script.as_bytes())
                .await
                .context("Failed to write sftp batch script")?;
        }

        let status = child.wait().await.context("Failed to wait for sftp")?;
        if !status.success() {
            bail!(
                "sftp removal of {} on {host} exited with {status}",
                remote.display()
            );
        }
        Ok(())
    }
}
