//! Sequential conversion pipeline and artifact publishing.
//!
//! A [`Conversion`] runs a [`ManipulationSequence`] against one input image,
//! one group per engine call, each call reading the previous call's output:
//!
//! ```text
//! input ──group 0──▶ artifact 0 ──group 1──▶ artifact 1 ── … ──▶ save(dest)
//! ```
//!
//! For every group the watermark path is split off, the remaining names are
//! translated to engine keys, the engine is invoked with a fresh
//! [`EngineConfig`], and the returned file becomes the live artifact in the
//! [`ArtifactStore`]. [`Conversion::save`] publishes the result.
//!
//! ## States
//!
//! ```text
//! Idle ─apply─▶ Processing(0) ─▶ … ─▶ Processing(n-1) ─▶ Completed ─save─▶ Published
//!   │                  └──────── failure ──────▶ Aborted
//!   └─save─▶ Published (plain copy of the input)
//! ```
//!
//! An abort leaves the last recorded intermediate on disk so the caller can
//! inspect it; [`Conversion::discard`] removes it.
//!
//! Progress is optionally reported over an mpsc channel as [`PipelineEvent`]s.

use crate::engine::{EngineConfig, ImageEngine, query_string};
use crate::error::{ConversionError, Result};
use crate::manipulation::{ManipulationGroup, ManipulationSequence};
use crate::translate::{ParameterSet, translate_group};
use crate::watermark::{containing_directory, extract_watermark};
use crate::workspace::ArtifactStore;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    /// Running the group at this zero-based index.
    Processing(usize),
    /// A step failed; carries the error message.
    Aborted(String),
    Completed,
    Published,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineState::Idle => f.write_str("idle"),
            PipelineState::Processing(index) => write!(f, "processing group {index}"),
            PipelineState::Aborted(reason) => write!(f, "aborted ({reason})"),
            PipelineState::Completed => f.write_str("completed"),
            PipelineState::Published => f.write_str("published"),
        }
    }
}

/// Progress reported while a conversion runs.
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    /// One group went through the engine.
    GroupApplied {
        index: usize,
        total: usize,
        parameters: ParameterSet,
        artifact: PathBuf,
    },
    /// The result was copied to its destination.
    Published {
        destination: PathBuf,
        /// True when no group ran and the input itself was copied.
        from_input: bool,
    },
}

pub struct Conversion<E: ImageEngine> {
    engine: E,
    driver: String,
    store: ArtifactStore,
    state: PipelineState,
    events: Option<Sender<PipelineEvent>>,
}

impl<E: ImageEngine> Conversion<E> {
    /// Conversion of `input` whose default workspace is the system temp
    /// directory.
    pub fn new(engine: E, driver: impl Into<String>, input: impl Into<PathBuf>) -> Self {
        Self::with_default_directory(engine, driver, input, std::env::temp_dir())
    }

    /// Conversion of `input` with an explicit default workspace.
    pub fn with_default_directory(
        engine: E,
        driver: impl Into<String>,
        input: impl Into<PathBuf>,
        default_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            engine,
            driver: driver.into(),
            store: ArtifactStore::new(input, default_dir),
            state: PipelineState::Idle,
            events: None,
        }
    }

    /// Report progress on `sender`.
    pub fn with_events(mut self, sender: Sender<PipelineEvent>) -> Self {
        self.events = Some(sender);
        self
    }

    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    pub fn workspace(&self) -> &Path {
        self.store.workspace()
    }

    /// Override the workspace. Only possible before [`apply`](Self::apply).
    pub fn configure_workspace(&mut self, path: impl AsRef<Path>) -> Result<()> {
        if self.state != PipelineState::Idle {
            return Err(self.invalid_state("configure workspace"));
        }
        self.store.configure_workspace(path)
    }

    /// Run every group of `sequence` in order and return the final artifact.
    ///
    /// With an empty sequence the final artifact is the input itself.
    pub fn apply(&mut self, sequence: &ManipulationSequence) -> Result<&Path> {
        if self.state != PipelineState::Idle {
            return Err(self.invalid_state("apply"));
        }
        let input = self.store.input();
        if !input.is_file() {
            return Err(ConversionError::InputNotFound(input.to_path_buf()));
        }

        let total = sequence.len();
        for (index, group) in sequence.groups().iter().enumerate() {
            self.state = PipelineState::Processing(index);
            if let Err(err) = self.apply_group(index, total, group) {
                warn!(index, total, error = %err, "conversion aborted");
                self.state = PipelineState::Aborted(err.to_string());
                return Err(err);
            }
        }

        self.state = PipelineState::Completed;
        Ok(self.store.current())
    }

    fn apply_group(&mut self, index: usize, total: usize, group: &ManipulationGroup) -> Result<()> {
        let current = self.store.current().to_path_buf();
        let filename = current
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| ConversionError::InputNotFound(current.clone()))?;

        let (group, watermarks) = extract_watermark(group);
        let config = EngineConfig {
            source: containing_directory(&current),
            cache: self.store.workspace().to_path_buf(),
            driver: self.driver.clone(),
            watermarks,
        };
        let parameters = translate_group(&group)?;

        debug!(
            index,
            total,
            filename = %filename,
            query = %query_string(&parameters),
            "invoking engine"
        );
        let relative = self.engine.render(&config, &filename, &parameters)?;
        let artifact = config.cache.join(relative);
        self.store.record_intermediate(&artifact)?;

        self.emit(PipelineEvent::GroupApplied {
            index,
            total,
            parameters,
            artifact,
        });
        Ok(())
    }

    /// Publish the final artifact to `destination`.
    ///
    /// Without a prior [`apply`](Self::apply) this copies the input unchanged.
    pub fn save(&mut self, destination: impl AsRef<Path>) -> Result<()> {
        if !matches!(self.state, PipelineState::Idle | PipelineState::Completed) {
            return Err(self.invalid_state("save"));
        }
        let destination = destination.as_ref();
        let from_input = self.store.live().is_none();
        if from_input && !self.store.input().is_file() {
            return Err(ConversionError::InputNotFound(
                self.store.input().to_path_buf(),
            ));
        }

        self.store.finalize(destination)?;
        self.state = PipelineState::Published;
        self.emit(PipelineEvent::Published {
            destination: destination.to_path_buf(),
            from_input,
        });
        Ok(())
    }

    /// Delete the live intermediate artifact, if any, without publishing.
    ///
    /// Leaves the conversion aborted; an already aborted conversion keeps
    /// its original reason.
    pub fn discard(&mut self) -> Result<()> {
        self.store.discard()?;
        if !matches!(
            self.state,
            PipelineState::Aborted(_) | PipelineState::Published
        ) {
            self.state = PipelineState::Aborted("discarded".to_string());
        }
        Ok(())
    }

    fn emit(&self, event: PipelineEvent) {
        if let Some(sender) = &self.events {
            sender.send(event).ok();
        }
    }

    fn invalid_state(&self, operation: &'static str) -> ConversionError {
        ConversionError::InvalidState {
            operation,
            state: self.state.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineError;
    use crate::engine::backend::tests::MockEngine;
    use crate::manipulation::Argument;
    use crate::test_helpers::{workspace_files, write_input};
    use std::fs;
    use std::sync::mpsc;
    use tempfile::TempDir;

    struct Fixture {
        _tmp: TempDir,
        input: PathBuf,
        workspace: PathBuf,
        output: PathBuf,
    }

    fn fixture() -> Fixture {
        let tmp = TempDir::new().unwrap();
        let input = write_input(tmp.path(), "photos/cat.jpg", "cat");
        Fixture {
            input,
            workspace: tmp.path().join("work"),
            output: tmp.path().join("out"),
            _tmp: tmp,
        }
    }

    fn conversion<'a>(fx: &Fixture, engine: &'a MockEngine) -> Conversion<&'a MockEngine> {
        let mut conversion = Conversion::with_default_directory(
            engine,
            "mock",
            &fx.input,
            fx.workspace.parent().unwrap().join("default"),
        );
        conversion.configure_workspace(&fx.workspace).unwrap();
        conversion
    }

    fn cat_sequence() -> ManipulationSequence {
        ManipulationSequence::new(vec![
            ManipulationGroup::new()
                .with("width", 100)
                .with("height", 100)
                .with("crop", "crop"),
            ManipulationGroup::new().with("blur", 5),
        ])
    }

    fn pairs(entries: &[(&str, &str)]) -> Vec<(String, String)> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    // =========================================================================
    // apply
    // =========================================================================

    #[test]
    fn two_group_chain_feeds_each_output_forward() {
        let fx = fixture();
        let engine = MockEngine::new();
        let mut conversion = conversion(&fx, &engine);

        let final_artifact = conversion.apply(&cat_sequence()).unwrap().to_path_buf();

        let calls = engine.get_calls();
        assert_eq!(calls.len(), 2);

        assert_eq!(calls[0].source, fx.input.parent().unwrap());
        assert_eq!(calls[0].filename, "cat.jpg");
        assert_eq!(calls[0].cache, fx.workspace);
        assert_eq!(calls[0].driver, "mock");
        assert_eq!(
            calls[0].parameters,
            pairs(&[("w", "100"), ("h", "100"), ("fit", "crop")])
        );

        // Second call reads the first call's output
        assert_eq!(calls[1].source, calls[0].output.parent().unwrap());
        assert_eq!(calls[1].filename, "0-cat.jpg");
        assert_eq!(calls[1].parameters, pairs(&[("blur", "5")]));

        assert_eq!(final_artifact, calls[1].output);
        assert_eq!(conversion.state(), &PipelineState::Completed);
        // Only the live artifact remains in the workspace
        assert_eq!(workspace_files(&fx.workspace), vec![calls[1].output.clone()]);
    }

    #[test]
    fn two_group_chain_publishes_last_output() {
        let fx = fixture();
        let engine = MockEngine::new();
        let mut conversion = conversion(&fx, &engine);
        let dest = fx.output.join("cat-small.jpg");

        conversion.apply(&cat_sequence()).unwrap();
        conversion.save(&dest).unwrap();

        assert_eq!(
            fs::read_to_string(&dest).unwrap(),
            "cat|w=100&h=100&fit=crop|blur=5"
        );
        assert!(workspace_files(&fx.workspace).is_empty());
        assert_eq!(fs::read_to_string(&fx.input).unwrap(), "cat");
        assert_eq!(conversion.state(), &PipelineState::Published);
    }

    #[test]
    fn engine_calls_match_group_count() {
        for n in 0..5 {
            let fx = fixture();
            let engine = MockEngine::new();
            let mut conversion = conversion(&fx, &engine);
            let sequence = ManipulationSequence::new(
                (0..n)
                    .map(|i| ManipulationGroup::new().with("quality", 50 + i))
                    .collect(),
            );

            conversion.apply(&sequence).unwrap();

            assert_eq!(engine.call_count(), n as usize);
        }
    }

    #[test]
    fn empty_sequence_returns_input() {
        let fx = fixture();
        let engine = MockEngine::new();
        let mut conversion = conversion(&fx, &engine);

        let artifact = conversion
            .apply(&ManipulationSequence::default())
            .unwrap()
            .to_path_buf();

        assert_eq!(artifact, fx.input);
        assert_eq!(engine.call_count(), 0);
    }

    #[test]
    fn empty_sequence_saves_identical_copy() {
        let fx = fixture();
        let bytes: Vec<u8> = (0..=255).collect();
        fs::write(&fx.input, &bytes).unwrap();
        let engine = MockEngine::new();
        let mut conversion = conversion(&fx, &engine);
        let dest = fx.output.join("copy.jpg");

        conversion.apply(&ManipulationSequence::default()).unwrap();
        conversion.save(&dest).unwrap();

        assert_eq!(fs::read(&dest).unwrap(), bytes);
        assert_eq!(fs::read(&fx.input).unwrap(), bytes);
    }

    #[test]
    fn save_without_apply_copies_input() {
        let fx = fixture();
        let engine = MockEngine::new();
        let mut conversion = conversion(&fx, &engine);
        let dest = fx.output.join("copy.jpg");

        conversion.save(&dest).unwrap();

        assert_eq!(fs::read_to_string(&dest).unwrap(), "cat");
        assert!(fx.input.exists());
    }

    #[test]
    fn optimize_is_never_sent_to_engine() {
        let fx = fixture();
        let engine = MockEngine::new();
        let mut conversion = conversion(&fx, &engine);
        let sequence = ManipulationSequence::new(vec![
            ManipulationGroup::new().with("optimize", 1).with("width", 10),
            ManipulationGroup::new().with("optimize", "yes"),
        ]);

        conversion.apply(&sequence).unwrap();

        let calls = engine.get_calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].parameters, pairs(&[("w", "10")]));
        assert!(calls[1].parameters.is_empty());
    }

    #[test]
    fn unknown_manipulation_stops_before_engine() {
        let fx = fixture();
        let engine = MockEngine::new();
        let mut conversion = conversion(&fx, &engine);
        let sequence = ManipulationSequence::new(vec![
            ManipulationGroup::new().with("width", 10),
            ManipulationGroup::new().with("sepia", 1),
            ManipulationGroup::new().with("blur", 2),
        ]);

        let err = conversion.apply(&sequence).unwrap_err();

        assert!(matches!(err, ConversionError::UnknownManipulation(ref n) if n == "sepia"));
        assert_eq!(engine.call_count(), 1);
        assert!(matches!(conversion.state(), PipelineState::Aborted(_)));
    }

    #[test]
    fn unknown_manipulation_in_first_group_makes_no_calls() {
        let fx = fixture();
        let engine = MockEngine::new();
        let mut conversion = conversion(&fx, &engine);
        let sequence = ManipulationSequence::new(vec![
            ManipulationGroup::new().with("width", 10).with("Width", 10),
        ]);

        assert!(conversion.apply(&sequence).is_err());
        assert_eq!(engine.call_count(), 0);
    }

    #[test]
    fn watermark_path_is_split_for_engine() {
        let fx = fixture();
        let engine = MockEngine::new();
        let mut conversion = conversion(&fx, &engine);
        let sequence = ManipulationSequence::new(vec![
            ManipulationGroup::new()
                .with("watermark", "/a/b/logo.png")
                .with("watermarkPosition", "bottom-right"),
            ManipulationGroup::new().with("blur", 1),
        ]);

        conversion.apply(&sequence).unwrap();

        let calls = engine.get_calls();
        assert_eq!(calls[0].watermarks, Some(PathBuf::from("/a/b")));
        assert_eq!(
            calls[0].parameters,
            pairs(&[("mark", "logo.png"), ("markpos", "bottom-right")])
        );
        // Fresh config per group: no watermark directory carried over
        assert_eq!(calls[1].watermarks, None);
    }

    #[test]
    fn caller_sequence_is_not_modified() {
        let fx = fixture();
        let engine = MockEngine::new();
        let mut conversion = conversion(&fx, &engine);
        let sequence = ManipulationSequence::new(vec![
            ManipulationGroup::new().with("watermark", "/a/b/logo.png"),
        ]);
        let before = sequence.clone();

        conversion.apply(&sequence).unwrap();

        assert_eq!(sequence, before);
    }

    #[test]
    fn missing_input_is_reported() {
        let tmp = TempDir::new().unwrap();
        let engine = MockEngine::new();
        let mut conversion = Conversion::with_default_directory(
            &engine,
            "mock",
            tmp.path().join("missing.jpg"),
            tmp.path(),
        );

        let err = conversion
            .apply(&ManipulationSequence::new(vec![
                ManipulationGroup::new().with("blur", 1),
            ]))
            .unwrap_err();

        assert!(matches!(err, ConversionError::InputNotFound(_)));
        assert_eq!(engine.call_count(), 0);
        assert!(matches!(
            conversion.save(tmp.path().join("out.jpg")),
            Err(ConversionError::InputNotFound(_))
        ));
    }

    #[test]
    fn workspace_pointing_at_file_fails_before_engine() {
        let fx = fixture();
        fs::write(fx.workspace.parent().unwrap().join("work-file"), "x").unwrap();
        let engine = MockEngine::new();
        let mut conversion = Conversion::with_default_directory(
            &engine,
            "mock",
            &fx.input,
            fx.workspace.parent().unwrap(),
        );

        let err = conversion
            .configure_workspace(fx.workspace.parent().unwrap().join("work-file"))
            .unwrap_err();

        assert!(matches!(
            err,
            ConversionError::InvalidTemporaryDirectory { .. }
        ));
        assert_eq!(engine.call_count(), 0);
    }

    #[test]
    fn engine_failure_aborts_and_keeps_last_artifact() {
        let fx = fixture();
        let engine = MockEngine::failing_on(1);
        let mut conversion = conversion(&fx, &engine);

        let err = conversion.apply(&cat_sequence()).unwrap_err();

        assert!(matches!(
            err,
            ConversionError::Engine(EngineError::ProcessingFailed(_))
        ));
        let calls = engine.get_calls();
        assert_eq!(calls.len(), 1);
        // Abort does not clean up: the last intermediate stays on disk
        assert_eq!(workspace_files(&fx.workspace), vec![calls[0].output.clone()]);
    }

    #[test]
    fn discard_after_abort_cleans_workspace() {
        let fx = fixture();
        let engine = MockEngine::failing_on(1);
        let mut conversion = conversion(&fx, &engine);
        conversion.apply(&cat_sequence()).unwrap_err();

        conversion.discard().unwrap();

        assert!(workspace_files(&fx.workspace).is_empty());
        assert!(fx.workspace.is_dir());
        assert!(fx.input.exists());
    }

    #[test]
    fn aborted_conversion_cannot_be_saved() {
        let fx = fixture();
        let engine = MockEngine::new();
        let mut conversion = conversion(&fx, &engine);
        let sequence =
            ManipulationSequence::new(vec![ManipulationGroup::new().with("nope", 1)]);
        conversion.apply(&sequence).unwrap_err();

        let err = conversion.save(fx.output.join("x.jpg")).unwrap_err();

        assert!(matches!(err, ConversionError::InvalidState { operation: "save", .. }));
        assert!(!fx.output.join("x.jpg").exists());
    }

    #[test]
    fn apply_runs_only_once() {
        let fx = fixture();
        let engine = MockEngine::new();
        let mut conversion = conversion(&fx, &engine);
        conversion.apply(&cat_sequence()).unwrap();

        let err = conversion.apply(&cat_sequence()).unwrap_err();

        assert!(matches!(err, ConversionError::InvalidState { operation: "apply", .. }));
        assert_eq!(engine.call_count(), 2);
    }

    #[test]
    fn save_twice_is_rejected() {
        let fx = fixture();
        let engine = MockEngine::new();
        let mut conversion = conversion(&fx, &engine);
        conversion.apply(&cat_sequence()).unwrap();
        conversion.save(fx.output.join("a.jpg")).unwrap();

        assert!(matches!(
            conversion.save(fx.output.join("b.jpg")),
            Err(ConversionError::InvalidState { .. })
        ));
    }

    /// Engine whose every output is a file that can be copied but not deleted.
    #[cfg(target_os = "linux")]
    struct UndeletableOutput;

    #[cfg(target_os = "linux")]
    impl ImageEngine for UndeletableOutput {
        fn render(
            &self,
            _config: &EngineConfig,
            _filename: &str,
            _parameters: &ParameterSet,
        ) -> std::result::Result<PathBuf, EngineError> {
            Ok(PathBuf::from("/proc/self/cmdline"))
        }
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn retried_save_after_cleanup_failure_republishes_processed_artifact() {
        let fx = fixture();
        let mut conversion = Conversion::with_default_directory(
            UndeletableOutput,
            "mock",
            &fx.input,
            fx.workspace.parent().unwrap().join("default"),
        );
        conversion
            .apply(&ManipulationSequence::new(vec![
                ManipulationGroup::new().with("blur", 1),
            ]))
            .unwrap();
        let (tx, rx) = mpsc::channel();
        conversion = conversion.with_events(tx);
        let dest = fx.output.join("cat.jpg");
        let processed = fs::read("/proc/self/cmdline").unwrap();

        let err = conversion.save(&dest).unwrap_err();
        assert!(matches!(err, ConversionError::Io { operation: "delete", .. }));
        assert_eq!(conversion.state(), &PipelineState::Completed);

        conversion.save(&dest).unwrap_err();
        assert_eq!(fs::read(&dest).unwrap(), processed);
        assert_ne!(fs::read(&dest).unwrap(), b"cat");
        assert_eq!(conversion.state(), &PipelineState::Completed);
        assert!(
            !rx.try_iter()
                .any(|e| matches!(e, PipelineEvent::Published { from_input: true, .. }))
        );
    }

    #[test]
    fn workspace_cannot_change_after_apply() {
        let fx = fixture();
        let engine = MockEngine::new();
        let mut conversion = Conversion::with_default_directory(
            &engine,
            "mock",
            &fx.input,
            fx.workspace.parent().unwrap().join("default"),
        );
        conversion.apply(&ManipulationSequence::default()).unwrap();

        assert!(matches!(
            conversion.configure_workspace(&fx.workspace),
            Err(ConversionError::InvalidState { .. })
        ));
    }

    #[test]
    fn default_workspace_is_used_without_configuration() {
        let fx = fixture();
        let default_dir = fx.workspace.parent().unwrap().join("default");
        fs::create_dir_all(&default_dir).unwrap();
        let engine = MockEngine::new();
        let mut conversion =
            Conversion::with_default_directory(&engine, "mock", &fx.input, &default_dir);

        conversion.apply(&cat_sequence()).unwrap();
        conversion.save(fx.output.join("cat.jpg")).unwrap();

        assert!(engine.get_calls().iter().all(|c| c.cache == default_dir));
        assert!(default_dir.is_dir());
        assert!(workspace_files(&default_dir).is_empty());
    }

    // =========================================================================
    // events
    // =========================================================================

    #[test]
    fn events_report_each_group_and_publish() {
        let fx = fixture();
        let engine = MockEngine::new();
        let (tx, rx) = mpsc::channel();
        let mut conversion = conversion(&fx, &engine).with_events(tx);

        conversion.apply(&cat_sequence()).unwrap();
        conversion.save(fx.output.join("cat.jpg")).unwrap();
        drop(conversion);

        let events: Vec<_> = rx.into_iter().collect();
        assert_eq!(events.len(), 3);
        match &events[0] {
            PipelineEvent::GroupApplied {
                index,
                total,
                parameters,
                ..
            } => {
                assert_eq!((*index, *total), (0, 2));
                assert_eq!(parameters.get("fit"), Some(&Argument::from("crop")));
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(matches!(
            &events[2],
            PipelineEvent::Published {
                from_input: false,
                ..
            }
        ));
    }

    #[test]
    fn state_display() {
        assert_eq!(PipelineState::Processing(3).to_string(), "processing group 3");
        assert_eq!(
            PipelineState::Aborted("boom".into()).to_string(),
            "aborted (boom)"
        );
    }
}
