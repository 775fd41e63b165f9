//! Index of reports saved by earlier runs.
//!
//! Each run writes into its own dated folder under the reports root. A name
//! counts as previously downloaded when it appears as a file directly inside
//! any sibling folder other than the current run's. Only names are compared.

use std::collections::HashSet;
use std::path::Path;

use crate::error::Result;
use crate::fs::FileSystem;

/// Collects the file names found in every run folder under `root` except `exclude`.
///
/// `exclude` matches either a full path or a bare folder name. A missing
/// `root` yields an empty set.
///
/// # Errors
///
/// Returns an I/O error if a folder cannot be read.
pub async fn previously_downloaded<F: FileSystem + ?Sized>(
    fs: &F,
    root: &Path,
    exclude: &Path,
) -> Result<HashSet<String>> {
    let mut names = HashSet::new();
    for subdir in fs.subdirectories(root).await? {
        if is_excluded(&subdir, exclude) {
            continue;
        }
        names.extend(fs.file_names(&subdir).await?);
    }
    log::debug!(
        "{} previously downloaded report(s) under {}",
        names.len(),
        root.display()
    );
    Ok(names)
}

fn is_excluded(subdir: &Path, exclude: &Path) -> bool {
    if subdir == exclude {
        return true;
    }
    let single_component = exclude.components().count() == 1;
    single_component && subdir.file_name() == Some(exclude.as_os_str())
}
