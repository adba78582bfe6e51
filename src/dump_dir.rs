//! The dump directory shared by the source server, the target server and
//! this process.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use anyhow::{bail, Context, Result};
use tracing::{debug, warn};

/// Both MySQL servers write and read artifacts here as their own user.
const SHARED_MODE: u32 = 0o777;

/// Create `dir` if needed, open it up to every user, and check that this
/// process can use it.
///
/// Failing to change the mode is only a warning: the directory may belong
/// to someone else and already be shared correctly.
pub fn prepare(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)
        .with_context(|| format!("unable to find or create a writable dump dir at '{}'", dir.display()))?;

    let mode = fs::metadata(dir)
        .with_context(|| format!("Failed to stat dump dir '{}'", dir.display()))?
        .permissions()
        .mode()
        & 0o777;
    if mode != SHARED_MODE {
        debug!("Changing mode of {} from {mode:o} to {SHARED_MODE:o}", dir.display());
        if let Err(e) = fs::set_permissions(dir, fs::Permissions::from_mode(SHARED_MODE)) {
            warn!(
                "Unable to make dump dir {} world writable, continuing anyway: {e}",
                dir.display()
            );
        }
    }

    if let Err(e) = fs::read_dir(dir).and_then(|_| tempfile::tempfile_in(dir)) {
        bail!(
            "unable to find or create a writable dump dir at '{}': {e}",
            dir.display()
        );
    }
    Ok(())
}
