// Dockerfile Input and Artifact Output
//
// *La Sortie* (The Output) - Reads Dockerfiles and persists analyses and
// corrected Dockerfiles under a timestamped naming scheme.

use lerelais::{RelaisError, Result};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use tracing::{debug, info};

/// Subdirectory for analysis text
pub const ANALYSIS_DIR: &str = "analysis";

/// Subdirectory for corrected Dockerfiles
pub const DOCKERFILES_DIR: &str = "dockerfiles";

/// Analysis file suffix
pub const ANALYSIS_SUFFIX: &str = "_analysis.md";

/// Corrected Dockerfile suffix
pub const CORRECTED_SUFFIX: &str = "_corrected.Dockerfile";

/// Resource URI prefix for saved analyses
pub const ANALYSIS_URI_PREFIX: &str = "dockerfile-ai://analysis/";

/// Resource URI prefix for corrected Dockerfiles
pub const DOCKERFILE_URI_PREFIX: &str = "dockerfile-ai://dockerfile/";

/// Read a Dockerfile
///
/// Missing or unreadable files are Io errors naming the path; a file with
/// only whitespace is a Validation error.
pub fn read_dockerfile(path: &Path) -> Result<String> {
    let content = fs::read_to_string(path).map_err(|e| {
        RelaisError::io("Failed to read Dockerfile", Some(path.to_path_buf()), e)
    })?;

    if content.trim().is_empty() {
        return Err(RelaisError::validation_error(format!(
            "Dockerfile is empty: {}",
            path.display()
        )));
    }

    debug!("Read {} bytes from {}", content.len(), path.display());
    Ok(content)
}

/// One saved artifact
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArtifactEntry {
    /// File name
    pub name: String,
    /// Full path
    pub path: PathBuf,
    /// Size on disk
    pub size_bytes: u64,
    /// Modification time, seconds since the Unix epoch
    pub modified: f64,
}

/// Saved artifacts, newest first
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ArtifactListing {
    /// Analyses
    pub analyses: Vec<ArtifactEntry>,
    /// Corrected Dockerfiles
    pub corrected_dockerfiles: Vec<ArtifactEntry>,
}

/// Kind of saved artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    /// Markdown analysis
    Analysis,
    /// Corrected Dockerfile
    Dockerfile,
}

impl ArtifactKind {
    /// MIME type served for this kind
    pub fn mime_type(self) -> &'static str {
        match self {
            ArtifactKind::Analysis => "text/markdown",
            ArtifactKind::Dockerfile => "text/plain",
        }
    }

    /// Resource URI for a file of this kind
    pub fn uri(self, name: &str) -> String {
        match self {
            ArtifactKind::Analysis => format!("{}{}", ANALYSIS_URI_PREFIX, name),
            ArtifactKind::Dockerfile => format!("{}{}", DOCKERFILE_URI_PREFIX, name),
        }
    }
}

/// Filesystem store for review artifacts
#[derive(Debug, Clone)]
pub struct OutputStore {
    root: PathBuf,
}

impl OutputStore {
    /// Store rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/analysis`
    pub fn analysis_dir(&self) -> PathBuf {
        self.root.join(ANALYSIS_DIR)
    }

    /// `<root>/dockerfiles`
    pub fn dockerfiles_dir(&self) -> PathBuf {
        self.root.join(DOCKERFILES_DIR)
    }

    /// Create both output directories; idempotent
    pub fn ensure_dirs(&self) -> Result<(PathBuf, PathBuf)> {
        let analysis = self.analysis_dir();
        let dockerfiles = self.dockerfiles_dir();
        for dir in [&analysis, &dockerfiles] {
            fs::create_dir_all(dir).map_err(|e| {
                RelaisError::io("Failed to create output directory", Some(dir.clone()), e)
            })?;
        }
        Ok((analysis, dockerfiles))
    }

    /// Save analysis text as `{name}_{YYYYMMDD_HHMMSS}_analysis.md`
    pub fn save_analysis(&self, analysis: &str, source_name: &str) -> Result<PathBuf> {
        let (dir, _) = self.ensure_dirs()?;
        let path = dir.join(artifact_name(source_name, ANALYSIS_SUFFIX));
        write_artifact(&path, analysis)?;
        info!("Analysis saved to {}", path.display());
        Ok(path)
    }

    /// Save a corrected Dockerfile as `{name}_{YYYYMMDD_HHMMSS}_corrected.Dockerfile`
    pub fn save_dockerfile(&self, dockerfile: &str, source_name: &str) -> Result<PathBuf> {
        let (_, dir) = self.ensure_dirs()?;
        let path = dir.join(artifact_name(source_name, CORRECTED_SUFFIX));
        write_artifact(&path, dockerfile)?;
        info!("Corrected Dockerfile saved to {}", path.display());
        Ok(path)
    }

    /// List saved artifacts, newest first
    pub fn list(&self) -> Result<ArtifactListing> {
        let (analysis_dir, dockerfiles_dir) = self.ensure_dirs()?;
        Ok(ArtifactListing {
            analyses: list_dir(&analysis_dir, ANALYSIS_SUFFIX)?,
            corrected_dockerfiles: list_dir(&dockerfiles_dir, CORRECTED_SUFFIX)?,
        })
    }

    /// Locate a saved artifact by file name
    ///
    /// `*_analysis.md` resolves in the analysis directory and `*.Dockerfile`
    /// in the dockerfiles directory. Names with path components are rejected.
    pub fn find(&self, file_name: &str) -> Result<Option<PathBuf>> {
        check_file_name(file_name)?;

        let candidate = if file_name.ends_with(ANALYSIS_SUFFIX) {
            self.analysis_dir().join(file_name)
        } else if file_name.ends_with(".Dockerfile") {
            self.dockerfiles_dir().join(file_name)
        } else {
            return Ok(None);
        };

        Ok(candidate.is_file().then_some(candidate))
    }

    /// Read a saved artifact by file name
    pub fn read_artifact(&self, file_name: &str) -> Result<(PathBuf, String)> {
        let path = self.find(file_name)?.ok_or_else(|| {
            RelaisError::validation_error(format!("File not found: {}", file_name))
        })?;
        let content = fs::read_to_string(&path)
            .map_err(|e| RelaisError::io("Failed to read artifact", Some(path.clone()), e))?;
        Ok((path, content))
    }

    /// Resolve a `dockerfile-ai://` resource URI to a path inside the store
    pub fn resolve_resource(&self, uri: &str) -> Result<(ArtifactKind, PathBuf)> {
        let (kind, name, dir) = if let Some(name) = uri.strip_prefix(ANALYSIS_URI_PREFIX) {
            (ArtifactKind::Analysis, name, self.analysis_dir())
        } else if let Some(name) = uri.strip_prefix(DOCKERFILE_URI_PREFIX) {
            (ArtifactKind::Dockerfile, name, self.dockerfiles_dir())
        } else {
            return Err(RelaisError::validation_error(format!(
                "Invalid resource URI: {}",
                uri
            )));
        };

        check_file_name(name)?;
        Ok((kind, dir.join(name)))
    }

    /// Read a resource by URI
    pub fn read_resource(&self, uri: &str) -> Result<(ArtifactKind, String)> {
        let (kind, path) = self.resolve_resource(uri)?;
        if !path.is_file() {
            return Err(RelaisError::validation_error(format!(
                "Resource not found: {}",
                uri
            )));
        }
        let content = fs::read_to_string(&path)
            .map_err(|e| RelaisError::io("Failed to read resource", Some(path.clone()), e))?;
        Ok((kind, content))
    }
}

fn artifact_name(source_name: &str, suffix: &str) -> String {
    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    format!("{}_{}{}", source_name, timestamp, suffix)
}

fn write_artifact(path: &Path, content: &str) -> Result<()> {
    fs::write(path, content)
        .map_err(|e| RelaisError::io("Failed to write artifact", Some(path.to_path_buf()), e))
}

fn check_file_name(name: &str) -> Result<()> {
    if name.is_empty() || name.contains(|c| c == '/' || c == '\\') || name == "." || name == ".." {
        return Err(RelaisError::validation_error(format!(
            "Invalid artifact name: {:?}",
            name
        )));
    }
    Ok(())
}

fn list_dir(dir: &Path, suffix: &str) -> Result<Vec<ArtifactEntry>> {
    let entries = fs::read_dir(dir).map_err(|e| {
        RelaisError::io("Failed to list output directory", Some(dir.to_path_buf()), e)
    })?;

    let mut artifacts = Vec::new();
    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().into_owned();
        if !name.ends_with(suffix) {
            continue;
        }
        let Ok(metadata) = entry.metadata() else {
            continue;
        };
        if !metadata.is_file() {
            continue;
        }
        let modified = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs_f64())
            .unwrap_or_default();

        artifacts.push(ArtifactEntry {
            name,
            path: entry.path(),
            size_bytes: metadata.len(),
            modified,
        });
    }

    artifacts.sort_by(|a, b| {
        b.modified
            .total_cmp(&a.modified)
            .then_with(|| b.name.cmp(&a.name))
    });
    Ok(artifacts)
}
