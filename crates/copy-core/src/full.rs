//! Full dump-transfer-load copy of one table.

use tracing::{debug, error, info};

use crate::consistency::schemas_match;
use crate::error::Result;
use crate::{artifact, CopyError, CopyOptions, DataStore, RemoteFileTransfer, TableName};

/// Replace the target table's contents with a fresh full export of the
/// source, recreating the target structure first when it is missing or
/// differs (keys included).
///
/// When the artifact cannot be retrieved the target is left as it was after
/// the (optional) schema recreation: it is not truncated.
///
/// Truncate and load are not atomic; an interruption between them leaves the
/// target table empty or partially loaded.
pub async fn copy_full<S, T, X>(
    table: &TableName,
    source: &mut S,
    target: &mut T,
    transfer: &X,
    options: &CopyOptions,
) -> Result<()>
where
    S: DataStore + ?Sized,
    T: DataStore + ?Sized,
    X: RemoteFileTransfer + ?Sized,
{
    if !source.table_exists(table).await? {
        error!(
            "Source table {} does not exist in database {} on {}",
            table,
            source.database(),
            source.host()
        );
        return Err(CopyError::MissingSourceTable);
    }

    let recreate = if !target.table_exists(table).await? {
        debug!("Table {} does not exist in target, it will be created", table);
        true
    } else if !schemas_match(table, source, target, true).await? {
        debug!("Target structure of {} differs from source, it will be recreated", table);
        true
    } else {
        false
    };
    if recreate {
        let schema = source.schema(table).await?;
        target.create_with_schema(table, &schema).await?;
    }

    let artifact_path = source.export_rows(table, None, &options.dump_dir).await?;

    if !artifact::fetch(
        transfer,
        source.host(),
        &options.transfer_user,
        &artifact_path,
    )
    .await
    {
        error!(
            "Error retrieving remote file {}, check ssh config and remote permissions for {} on {}",
            artifact_path.display(),
            options.transfer_user,
            source.host()
        );
        artifact::discard(&artifact_path).await;
        return Err(CopyError::Transfer {
            host: source.host().to_string(),
            path: artifact_path,
        });
    }

    let loaded = async {
        target.truncate(table).await?;
        target.load_artifact(table, &artifact_path).await
    }
    .await;
    artifact::discard(&artifact_path).await;
    loaded?;

    info!("Full copy of {} loaded from {}", table, artifact_path.display());
    Ok(())
}
