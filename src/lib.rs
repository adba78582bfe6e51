//! table-sync: copy MySQL tables from a source server to a target server,
//! skipping unchanged tables and patching nearly identical ones in place.
//!
//! The copy engine itself lives in `copy-core`; this crate wires it to
//! MySQL, `scp` and the command line.

pub mod config;
pub mod dump_dir;
pub mod summary;
pub mod transfer;

use anyhow::Result;
use copy_core::{RunCoordinator, RunReport};
use copy_mysql_store::MySqlConnector;
use tracing::{debug, warn};

pub use config::{Cli, FileConfig, RunSettings};
pub use transfer::ScpTransfer;

/// Prepare the dump directory, copy every configured table and log the
/// summary. Table failures are reported, not returned as errors.
pub async fn run_copy(settings: &RunSettings) -> Result<RunReport> {
    dump_dir::prepare(&settings.options.dump_dir)?;

    let source = MySqlConnector::new(settings.source.clone(), settings.columns.clone())
        .with_batch_size(settings.options.batch_size);
    let target = MySqlConnector::new(settings.target.clone(), settings.columns.clone())
        .with_batch_size(settings.options.batch_size);

    debug!(
        "Source {}, target {}",
        settings.source.sanitized_url(),
        settings.target.sanitized_url()
    );

    let coordinator = RunCoordinator::new(
        source.clone(),
        target.clone(),
        ScpTransfer::new(settings.verbose),
        settings.options.clone(),
    );
    let report = coordinator
        .run(settings.tables.clone(), settings.workers)
        .await;

    for connector in [&source, &target] {
        if let Err(e) = connector.disconnect().await {
            warn!(
                "Failed to close connections to {}: {e:#}",
                connector.endpoint().sanitized_url()
            );
        }
    }

    summary::log_summary(&report, &settings.source, &settings.target);
    if let Some(path) = &settings.report_json {
        summary::write_report_json(&report, path)?;
    }
    Ok(report)
}
