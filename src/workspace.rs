//! Temporary workspace and intermediate artifact lifecycle.
//!
//! An [`ArtifactStore`] tracks the original input image and at most one *live*
//! intermediate artifact. Recording a new artifact deletes the one it
//! supersedes, but only after the new file is confirmed on disk, so there is
//! never a moment without a usable artifact. Publishing copies the live
//! artifact (or the untouched input, if nothing was produced) to the caller's
//! destination and removes the transient file.
//!
//! ## Directory cleanup
//!
//! Whenever an artifact is deleted, its containing directory is removed too if
//! it is left empty, unless it is the process-wide default temp directory.
//! Engines that write each output into its own sub-directory therefore leave
//! nothing behind.
//!
//! A file is only forgotten once it is actually gone. A superseded artifact
//! that could not be deleted is kept on a stale list, and a live artifact
//! whose deletion fails after publishing stays live, so a later
//! [`discard`](ArtifactStore::discard) or retried publish can still reach it.
//!
//! ## Default directory
//!
//! The default workspace is injected at construction (normally
//! `std::env::temp_dir()`), never read ambiently later. It can be overridden
//! once, before the first artifact is recorded.

use crate::error::{ConversionError, Result, WorkspaceProblem};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Probe file used to check a workspace is writable.
const PROBE_FILENAME: &str = ".image-chain-write-probe";

#[derive(Debug)]
pub struct ArtifactStore {
    input: PathBuf,
    default_dir: PathBuf,
    workspace: PathBuf,
    configured: bool,
    live: Option<PathBuf>,
    stale: Vec<PathBuf>,
}

impl ArtifactStore {
    /// Create a store for `input`, using `default_dir` as the workspace until
    /// overridden.
    pub fn new(input: impl Into<PathBuf>, default_dir: impl Into<PathBuf>) -> Self {
        let default_dir = default_dir.into();
        Self {
            input: input.into(),
            workspace: default_dir.clone(),
            default_dir,
            configured: false,
            live: None,
            stale: Vec::new(),
        }
    }

    pub fn input(&self) -> &Path {
        &self.input
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    /// The live intermediate artifact, if any has been recorded.
    pub fn live(&self) -> Option<&Path> {
        self.live.as_deref()
    }

    /// Superseded artifacts whose deletion failed.
    pub fn stale(&self) -> &[PathBuf] {
        &self.stale
    }

    /// The artifact the next step should read: the live one, else the input.
    pub fn current(&self) -> &Path {
        self.live.as_deref().unwrap_or(&self.input)
    }

    /// Use `path` as the workspace, creating it if needed.
    ///
    /// Allowed once, and only before any artifact has been recorded.
    pub fn configure_workspace(&mut self, path: impl AsRef<Path>) -> Result<()> {
        if self.configured || self.live.is_some() {
            return Err(ConversionError::WorkspaceLocked(self.workspace.clone()));
        }
        let path = path.as_ref();
        let invalid = |problem| ConversionError::InvalidTemporaryDirectory {
            path: path.to_path_buf(),
            problem,
        };

        if !path.is_dir() {
            if path.exists() {
                return Err(invalid(WorkspaceProblem::NotCreatable));
            }
            fs::create_dir_all(path).map_err(|_| invalid(WorkspaceProblem::NotCreatable))?;
        }

        let probe = path.join(PROBE_FILENAME);
        OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&probe)
            .map_err(|_| invalid(WorkspaceProblem::NotWritable))?;
        fs::remove_file(&probe).map_err(|e| ConversionError::io("delete", &probe, e))?;

        debug!(workspace = %path.display(), "workspace configured");
        self.workspace = path.to_path_buf();
        self.configured = true;
        Ok(())
    }

    /// Make `artifact` the live artifact, deleting the one it supersedes.
    pub fn record_intermediate(&mut self, artifact: impl Into<PathBuf>) -> Result<()> {
        let artifact = artifact.into();
        if !artifact.is_file() {
            return Err(ConversionError::MissingArtifact(artifact));
        }
        debug!(artifact = %artifact.display(), "recorded intermediate");

        match self.live.replace(artifact) {
            Some(previous) if Some(previous.as_path()) != self.live.as_deref() => {
                let removed = self.remove_artifact(&previous);
                if removed.is_err() && previous.exists() {
                    warn!(artifact = %previous.display(), "superseded artifact left on disk");
                    self.stale.push(previous);
                }
                removed
            }
            _ => Ok(()),
        }
    }

    /// Copy the current artifact to `destination`, then delete the live
    /// artifact and its directory if it is left empty.
    ///
    /// With no live artifact this is a plain copy of the input.
    pub fn finalize(&mut self, destination: &Path) -> Result<()> {
        if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| ConversionError::io("create directory", parent, e))?;
        }

        let source = self.current();
        fs::copy(source, destination).map_err(|e| ConversionError::io("copy", source, e))?;
        info!(
            source = %source.display(),
            destination = %destination.display(),
            "published artifact"
        );

        self.release_live()?;
        self.sweep_stale()
    }

    /// Delete the live artifact and any stale ones without publishing.
    pub fn discard(&mut self) -> Result<()> {
        if let Some(live) = &self.live {
            debug!(artifact = %live.display(), "discarding live artifact");
        }
        let released = self.release_live();
        let swept = self.sweep_stale();
        released.and(swept)
    }

    /// Delete the live artifact, forgetting it only once it is gone.
    fn release_live(&mut self) -> Result<()> {
        let Some(live) = self.live.clone() else {
            return Ok(());
        };
        let removed = self.remove_artifact(&live);
        if removed.is_ok() || !live.exists() {
            self.live = None;
        }
        removed
    }

    fn sweep_stale(&mut self) -> Result<()> {
        let mut first_error = None;
        for artifact in std::mem::take(&mut self.stale) {
            if let Err(e) = self.remove_artifact(&artifact) {
                if artifact.exists() {
                    self.stale.push(artifact);
                }
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn remove_artifact(&self, artifact: &Path) -> Result<()> {
        if artifact == self.input {
            return Ok(());
        }
        fs::remove_file(artifact).map_err(|e| ConversionError::io("delete", artifact, e))?;
        match artifact.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => self.prune_if_empty(parent),
            _ => Ok(()),
        }
    }

    fn prune_if_empty(&self, directory: &Path) -> Result<()> {
        if same_directory(directory, &self.default_dir) {
            return Ok(());
        }
        let mut entries =
            fs::read_dir(directory).map_err(|e| ConversionError::io("list", directory, e))?;
        if entries.next().is_none() {
            fs::remove_dir(directory)
                .map_err(|e| ConversionError::io("remove directory", directory, e))?;
            debug!(directory = %directory.display(), "removed empty directory");
        }
        Ok(())
    }
}

fn same_directory(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
