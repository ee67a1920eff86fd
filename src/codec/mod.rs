//! Relational-table archive codec: the layout of labels inside a hierarchical container.

use std::path::Path;

use crate::container::MemContainer;
use crate::foundation::error::ArchiveResult;
use crate::model::labels::Labels;

pub mod embed;
pub mod read;
pub(crate) mod side;
pub(crate) mod skeleton_json;
pub(crate) mod tables;
pub mod write;

/// Read labels from an archive snapshot on disk.
///
/// Embedded videos keep a handle to the loaded container, so their frames stay readable after
/// this returns.
pub fn load_file(path: &Path, opts: &read::ReadOpts) -> ArchiveResult<Labels> {
    let container = MemContainer::load_json(path)?;
    let mut opts = opts.clone();
    if opts.search_dir.is_none() {
        opts.search_dir = path.parent().map(Path::to_path_buf);
    }
    read::read_labels(&container, &opts)
}

/// Write `labels` to a fresh archive snapshot at `path`.
pub fn save_file(labels: &Labels, path: &Path, opts: &write::WriteOpts) -> ArchiveResult<()> {
    let mut container = MemContainer::new();
    write::write_labels(labels, &mut container, opts)?;
    container.save_json(path)
}
