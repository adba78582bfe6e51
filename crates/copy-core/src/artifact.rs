//! Handling of transfer artifacts between export and load.

use std::path::Path;

use tracing::{debug, warn};

use crate::RemoteFileTransfer;

/// Whether `host` names the machine the engine runs on.
pub fn is_local_host(host: &str) -> bool {
    matches!(host, "localhost" | "127.0.0.1" | "::1")
}

/// Make the artifact exported on `host` available at the same path locally.
///
/// A local source needs no transfer. For a remote source the artifact is
/// retrieved and then removed from the remote host, whether or not the
/// retrieval succeeded; a failed removal is logged and otherwise ignored.
pub async fn fetch<X: RemoteFileTransfer + ?Sized>(
    transfer: &X,
    host: &str,
    principal: &str,
    artifact: &Path,
) -> bool {
    if is_local_host(host) {
        return true;
    }

    debug!(
        "Retrieving remote file {}@{}:{}",
        principal,
        host,
        artifact.display()
    );
    let retrieved = transfer.retrieve(host, principal, artifact, artifact).await;

    match transfer.remove_remote(host, principal, artifact).await {
        Ok(()) => debug!("Removed {} on {}", artifact.display(), host),
        Err(e) => warn!(
            "Error removing remote dump file {}, check remote permissions for {} on {}: {e:#}",
            artifact.display(),
            principal,
            host
        ),
    }
    retrieved
}

/// Remove a local artifact once it has been loaded (or abandoned).
pub async fn discard(artifact: &Path) {
    match tokio::fs::remove_file(artifact).await {
        Ok(()) => debug!("Removed artifact {}", artifact.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Unable to remove artifact {}: {}", artifact.display(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryTransfer;
    use std::path::PathBuf;

    #[test]
    fn test_local_hosts() {
        assert!(is_local_host("localhost"));
        assert!(is_local_host("127.0.0.1"));
        assert!(!is_local_host("db.example.com"));
    }

    #[tokio::test]
    async fn test_local_source_skips_transfer() {
        let transfer = MemoryTransfer::default();
        assert!(fetch(&transfer, "localhost", "guest", Path::new("/tmp/a.tsv")).await);
        assert!(transfer.retrievals().is_empty());
    }

    #[tokio::test]
    async fn test_remote_cleanup_failure_is_not_fatal() {
        let transfer = MemoryTransfer::default().failing_cleanup();
        assert!(fetch(&transfer, "replica", "guest", Path::new("/tmp/a.tsv")).await);
        assert_eq!(transfer.retrievals().len(), 1);
    }

    #[tokio::test]
    async fn test_remote_retrieval_failure_still_cleans_up() {
        let transfer = MemoryTransfer::default().failing_retrieval();
        assert!(!fetch(&transfer, "replica", "guest", Path::new("/tmp/a.tsv")).await);
        assert_eq!(
            transfer.removals(),
            vec![("replica".to_string(), PathBuf::from("/tmp/a.tsv"))]
        );
    }
}
