// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 artiflow contributors

//! Artifact handles
//!
//! An artifact is the metadata the pipeline needs about a user-supplied
//! file: its name, size and declared kind, plus the on-disk path and a
//! BLAKE3 digest when it was loaded from the filesystem.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::errors::{ArtiflowError, ArtiflowResult};

const ARCHIVE_EXTENSIONS: &[&str] = &[".zip"];
const CAPTURE_EXTENSIONS: &[&str] = &[".pcap", ".pcapng", ".cap"];

/// Declared kind of an artifact
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    /// Code archive (ZIP)
    Archive,
    /// Network capture (pcap/pcapng)
    Capture,
    /// Anything else
    Other,
}

impl ArtifactKind {
    /// Infer a kind from a file name extension
    pub fn from_file_name(name: &str) -> Option<Self> {
        let lower = name.to_ascii_lowercase();

        if ARCHIVE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext)) {
            Some(Self::Archive)
        } else if CAPTURE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext)) {
            Some(Self::Capture)
        } else {
            None
        }
    }

    /// Infer a kind from a MIME content type
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        match content_type.trim().to_ascii_lowercase().as_str() {
            "application/zip" | "application/x-zip-compressed" => Some(Self::Archive),
            "application/vnd.tcpdump.pcap" | "application/x-pcapng" => Some(Self::Capture),
            _ => None,
        }
    }

    /// Detect a kind, preferring the content type over the file name
    pub fn detect(name: &str, content_type: Option<&str>) -> Self {
        content_type
            .and_then(Self::from_content_type)
            .or_else(|| Self::from_file_name(name))
            .unwrap_or(Self::Other)
    }
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Archive => write!(f, "archive"),
            Self::Capture => write!(f, "capture"),
            Self::Other => write!(f, "other"),
        }
    }
}

impl std::str::FromStr for ArtifactKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "archive" | "zip" => Ok(Self::Archive),
            "capture" | "pcap" => Ok(Self::Capture),
            "other" => Ok(Self::Other),
            _ => Err(format!("Unknown artifact kind: {}", s)),
        }
    }
}

/// Handle to a user-supplied file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Artifact {
    /// File name as supplied
    pub name: String,

    /// Size in bytes
    pub byte_size: u64,

    /// Declared kind
    pub kind: ArtifactKind,

    /// Location on disk, if the artifact came from the filesystem
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// BLAKE3 digest of the content, if it was read
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

impl Artifact {
    /// Create an artifact handle from metadata alone
    pub fn new(name: impl Into<String>, byte_size: u64, kind: ArtifactKind) -> Self {
        Self {
            name: name.into(),
            byte_size,
            kind,
            path: None,
            digest: None,
        }
    }

    /// Load an artifact from disk, detecting its kind and hashing its content
    pub fn from_path(path: &Path) -> ArtiflowResult<Self> {
        let read_error = |e: std::io::Error| ArtiflowError::FileReadError {
            path: path.to_path_buf(),
            error: e.to_string(),
        };

        let metadata = std::fs::metadata(path).map_err(read_error)?;
        if !metadata.is_file() {
            return Err(ArtiflowError::FileReadError {
                path: path.to_path_buf(),
                error: "not a regular file".into(),
            });
        }

        let name = path
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());

        let mut file = std::fs::File::open(path).map_err(read_error)?;
        let mut hasher = blake3::Hasher::new();
        std::io::copy(&mut file, &mut hasher).map_err(read_error)?;

        Ok(Self {
            kind: ArtifactKind::detect(&name, None),
            name,
            byte_size: metadata.len(),
            path: Some(path.to_path_buf()),
            digest: Some(hasher.finalize().to_hex().to_string()),
        })
    }

    /// Override the declared kind
    pub fn with_kind(mut self, kind: ArtifactKind) -> Self {
        self.kind = kind;
        self
    }

    /// File name without its extension
    pub fn stem(&self) -> &str {
        Path::new(&self.name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&self.name)
    }

    /// Format size for display
    pub fn formatted_size(&self) -> String {
        const KB: u64 = 1024;
        const MB: u64 = KB * 1024;
        const GB: u64 = MB * 1024;

        if self.byte_size >= GB {
            format!("{:.2} GB", self.byte_size as f64 / GB as f64)
        } else if self.byte_size >= MB {
            format!("{:.2} MB", self.byte_size as f64 / MB as f64)
        } else if self.byte_size >= KB {
            format!("{:.2} KB", self.byte_size as f64 / KB as f64)
        } else {
            format!("{} bytes", self.byte_size)
        }
    }
}
