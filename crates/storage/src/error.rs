use std::path::PathBuf;

/// Errors raised by the workdir manager, the download boundary and the
/// shared storage publisher.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The per-execution workdir could not be created or removed.
    #[error("Workdir operation failed at {path}: {source}")]
    Workdir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An input file could not be fetched from its source.
    #[error("Failed to download input file '{file}' from {url}: {reason}")]
    Download {
        /// Logical name of the offending input file.
        file: String,
        url: String,
        reason: String,
    },

    /// An input file's source URL uses a scheme no downloader handles.
    #[error("Unsupported source URL '{url}': expected file:// or http(s)://")]
    UnsupportedUrl { url: String },

    /// A descriptor's filename would escape the workdir.
    #[error("Unsafe destination filename '{filename}'")]
    UnsafeFilename { filename: String },

    /// A produced file could not be published to shared storage.
    #[error("Failed to store result file '{file}': {source}")]
    Store {
        file: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
