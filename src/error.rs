use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Reasons a folder merge stopped before the source folder was removed.
#[derive(Debug, Error)]
pub enum MergeError {
    #[error("failed to walk {}: {source}", path.display())]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("failed to create directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to move {} to {}: {source}", from.display(), to.display())]
    Move {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to remove merged folder {}: {source}", path.display())]
    RemoveFolder {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
