//! Input and output file descriptors.
//!
//! [`InputFile`] describes a file to be processed; it is produced by the
//! submitting caller from catalog/order data and consumed read-only by the
//! engine. [`OutputFile`] describes a produced result after it has been
//! published to shared storage.

use serde::{Deserialize, Serialize};
use std::path::Component;
use std::path::Path;

// ---------------------------------------------------------------------------
// InputFile
// ---------------------------------------------------------------------------

/// Immutable descriptor of one file to process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputFile {
    /// Logical name of the input (unique within an execution).
    pub name: String,
    /// Filename under which the file is materialised in the workdir.
    pub filename: String,
    /// MIME type declared by the submitting caller.
    pub mime_type: String,
    /// Where to fetch the file from (`file://` or `http(s)://`).
    pub source_url: String,
    /// Declared size in bytes.
    pub size: u64,
    /// Declared SHA-256 hex digest, when the source catalog knows it.
    pub checksum: Option<String>,
    /// Free-form metadata carried through from the submitting caller.
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
    /// Groups inputs belonging to the same upstream feature.
    pub correlation_key: String,
}

// ---------------------------------------------------------------------------
// OutputFile
// ---------------------------------------------------------------------------

/// Descriptor of one produced result file, as published to shared storage.
///
/// `result_url` is externally resolvable; it never points into an
/// execution's local workdir.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputFile {
    /// Name of the artifact, relative to the execution's output root.
    pub name: String,
    /// Durable location returned by the shared storage publisher.
    pub result_url: String,
    pub size: Option<u64>,
    pub checksum: Option<String>,
}

// ---------------------------------------------------------------------------
// Filename safety
// ---------------------------------------------------------------------------

/// Whether `filename` is safe to join under a workdir.
///
/// Rejects empty names, absolute paths, and any `..` or root components, so
/// a hostile descriptor cannot escape the execution's directory.
pub fn is_safe_relative_filename(filename: &str) -> bool {
    let mut has_normal = false;
    for component in Path::new(filename).components() {
        match component {
            Component::Normal(_) => has_normal = true,
            Component::CurDir => {}
            _ => return false,
        }
    }
    has_normal
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
