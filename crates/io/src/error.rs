use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum CloudIoError {
    #[error("unsupported point cloud extension for {0}")]
    UnsupportedExtension(PathBuf),

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot list directory {path}: {source}")]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, CloudIoError>;
