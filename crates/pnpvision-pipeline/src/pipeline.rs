//! The pipeline executor: an ordered list of named stages plus the state
//! of the current run.
//!
//! ```rust
//! # use pnpvision_pipeline::{Pipeline, PipelineError, ColorSpace, Circle};
//! # use pnpvision_pipeline::stages::{DrawCircles, FindContours, FitCircles, Threshold};
//! # fn run(frame: image::DynamicImage) -> Result<(), PipelineError> {
//! let mut pipeline = Pipeline::new();
//! pipeline
//!     .add_stage("threshold", Threshold::default())?
//!     .add_stage("contours", FindContours::default())?
//!     .add_stage("circles", FitCircles {
//!         contours_stage_name: Some("contours".to_string()),
//!         ..FitCircles::default()
//!     })?
//!     .add_stage("draw", DrawCircles {
//!         circles_stage_name: Some("circles".to_string()),
//!         ..DrawCircles::default()
//!     })?;
//!
//! pipeline.set_input_image(frame, ColorSpace::Rgb);
//! let report = pipeline.run();
//! assert!(report.succeeded());
//! let circles = pipeline.expected_list_model::<Circle>("circles")?;
//! # let _ = circles;
//! # Ok(())
//! # }
//! ```
//!
//! # Run lifecycle
//!
//! Every run starts from scratch: results of the previous run are dropped,
//! the working image is reset to the caller-seeded input, and the property
//! bag drops values already seen by a previous run (see
//! [`PropertyBag`](crate::properties::PropertyBag)). Stages then execute in
//! definition order. A stage that returns an image makes it the working
//! image for every later stage; otherwise the working image carries
//! forward unchanged.
//!
//! # Failure policy
//!
//! A failing stage is recorded as
//! [`StageOutcome::Errored`] and execution continues with the working image
//! unchanged. Stages that depend on the failed stage through
//! [`StageContext::expected_result`](crate::stage::StageContext::expected_result)
//! then fail in turn. [`Pipeline::run_strict`] stops at the first failure
//! instead.

use std::any::Any;
use std::collections::HashMap;
use std::time::Instant;

use image::DynamicImage;

use crate::definition::PipelineDefinition;
use crate::diagnostics::{RunReport, StageOutcome, StageReport};
use crate::error::PipelineError;
use crate::properties::PropertyBag;
use crate::result::StageResult;
use crate::stage::{ResultLookup, Stage, StageContext};
use crate::types::{ColorSpace, ListModel, Model, SingleModel};

/// A stage registered under a name.
#[derive(Debug)]
pub struct NamedStage {
    name: String,
    enabled: bool,
    stage: Box<dyn Stage>,
}

impl NamedStage {
    /// The stage's unique name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the stage runs.
    #[must_use]
    pub const fn enabled(&self) -> bool {
        self.enabled
    }

    /// The stage itself.
    #[must_use]
    pub fn stage(&self) -> &dyn Stage {
        &*self.stage
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunMode {
    Lenient,
    Strict,
}

/// State of the current (or last) run.
#[derive(Debug, Default)]
struct RunState {
    /// Non-empty results recorded this run.
    results: HashMap<String, StageResult>,
    /// Stage whose image is the working image; `None` means the seeded input.
    working_from: Option<String>,
    report: RunReport,
}

/// An ordered, named collection of stages and its run state.
#[derive(Debug, Default)]
pub struct Pipeline {
    stages: Vec<NamedStage>,
    input: Option<(DynamicImage, ColorSpace)>,
    properties: PropertyBag,
    run: RunState,
}

impl Pipeline {
    /// Create an empty pipeline.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a pipeline from a definition.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::DuplicateStageName`] or
    /// [`PipelineError::InvalidConfig`] if the definition is malformed.
    pub fn from_definition(definition: PipelineDefinition) -> Result<Self, PipelineError> {
        let mut pipeline = Self::new();
        for stage in definition.stages {
            stage.kind.validate()?;
            pipeline.push(stage.name, stage.enabled, stage.kind.into_stage(), None)?;
        }
        Ok(pipeline)
    }

    // ───────────────────────── Definition ─────────────────────────

    /// Append a stage.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::DuplicateStageName`] if `name` is taken and
    /// [`PipelineError::InvalidConfig`] if it is blank.
    pub fn add_stage(
        &mut self,
        name: impl Into<String>,
        stage: impl Stage,
    ) -> Result<&mut Self, PipelineError> {
        self.push(name.into(), true, Box::new(stage), None)?;
        Ok(self)
    }

    /// Insert a stage at `index` (clamped to the stage count).
    ///
    /// # Errors
    ///
    /// As [`add_stage`](Self::add_stage).
    pub fn insert_stage(
        &mut self,
        index: usize,
        name: impl Into<String>,
        stage: impl Stage,
    ) -> Result<&mut Self, PipelineError> {
        self.push(name.into(), true, Box::new(stage), Some(index))?;
        Ok(self)
    }

    fn push(
        &mut self,
        name: String,
        enabled: bool,
        stage: Box<dyn Stage>,
        index: Option<usize>,
    ) -> Result<(), PipelineError> {
        if name.trim().is_empty() {
            return Err(PipelineError::InvalidConfig(
                "stage name must not be blank".to_string(),
            ));
        }
        if self.position(&name).is_some() {
            return Err(PipelineError::DuplicateStageName(name));
        }
        let named = NamedStage {
            name,
            enabled,
            stage,
        };
        match index {
            Some(i) => self.stages.insert(i.min(self.stages.len()), named),
            None => self.stages.push(named),
        }
        Ok(())
    }

    /// Remove a stage, returning it.
    pub fn remove_stage(&mut self, name: &str) -> Option<Box<dyn Stage>> {
        let index = self.position(name)?;
        Some(self.stages.remove(index).stage)
    }

    /// Replace the stage registered under `name`, keeping its position.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::UnknownStageReference`] if `name` is not defined.
    pub fn replace_stage(
        &mut self,
        name: &str,
        stage: impl Stage,
    ) -> Result<Box<dyn Stage>, PipelineError> {
        let index = self.position(name).ok_or_else(|| unknown(name))?;
        Ok(std::mem::replace(
            &mut self.stages[index].stage,
            Box::new(stage),
        ))
    }

    /// Enable or disable a stage. Disabled stages are reported as skipped.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::UnknownStageReference`] if `name` is not defined.
    pub fn set_enabled(&mut self, name: &str, enabled: bool) -> Result<(), PipelineError> {
        let index = self.position(name).ok_or_else(|| unknown(name))?;
        self.stages[index].enabled = enabled;
        Ok(())
    }

    /// Borrow a stage as its concrete type, e.g. to change options between runs.
    pub fn stage_mut<T: Stage>(&mut self, name: &str) -> Option<&mut T> {
        let index = self.position(name)?;
        let stage: &mut dyn Any = &mut *self.stages[index].stage;
        stage.downcast_mut::<T>()
    }

    /// Borrow a stage as its concrete type.
    #[must_use]
    pub fn stage<T: Stage>(&self, name: &str) -> Option<&T> {
        let index = self.position(name)?;
        let stage: &dyn Any = &*self.stages[index].stage;
        stage.downcast_ref::<T>()
    }

    /// The stages in definition order.
    #[must_use]
    pub fn stages(&self) -> &[NamedStage] {
        &self.stages
    }

    /// Stage names in definition order.
    pub fn stage_names(&self) -> impl Iterator<Item = &str> {
        self.stages.iter().map(|s| s.name.as_str())
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.stages.iter().position(|s| s.name == name)
    }

    // ───────────────────────── Run context ─────────────────────────

    /// Seed the working image every run starts from.
    pub fn set_input_image(&mut self, image: DynamicImage, color_space: ColorSpace) {
        self.input = Some((image, color_space));
    }

    /// Drop the seeded input image.
    pub fn clear_input_image(&mut self) {
        self.input = None;
    }

    /// Set a property for the next run.
    pub fn set_property<T: Any + Send + Sync>(&mut self, key: impl Into<String>, value: T) {
        self.properties.set(key, value);
    }

    /// Set a property that persists across runs.
    pub fn set_persistent_property<T: Any + Send + Sync>(
        &mut self,
        key: impl Into<String>,
        value: T,
    ) {
        self.properties.set_persistent(key, value);
    }

    /// Borrow a property.
    #[must_use]
    pub fn property<T: Any>(&self, key: &str) -> Option<&T> {
        self.properties.get::<T>(key)
    }

    /// The property bag.
    #[must_use]
    pub const fn properties(&self) -> &PropertyBag {
        &self.properties
    }

    /// Mutable access to the property bag.
    pub const fn properties_mut(&mut self) -> &mut PropertyBag {
        &mut self.properties
    }

    // ───────────────────────── Execution ─────────────────────────

    /// Run every stage, recording per-stage outcomes.
    ///
    /// Never fails as a whole: stage failures are recorded in the report.
    pub fn run(&mut self) -> &RunReport {
        self.execute(RunMode::Lenient);
        &self.run.report
    }

    /// Run the stages, stopping at the first failure.
    ///
    /// # Errors
    ///
    /// Returns the first recorded [`PipelineError::StageExecutionFailure`].
    /// The partial report stays available through [`report`](Self::report).
    pub fn run_strict(&mut self) -> Result<&RunReport, &PipelineError> {
        self.execute(RunMode::Strict);
        match self.run.report.first_error() {
            Some(err) => Err(err),
            None => Ok(&self.run.report),
        }
    }

    fn execute(&mut self, mode: RunMode) {
        let span = tracing::debug_span!("pipeline_run", stages = self.stages.len());
        let _enter = span.enter();
        let started = Instant::now();

        self.properties.begin_run();
        self.run = RunState::default();

        for named in &self.stages {
            if !named.enabled {
                tracing::trace!(stage = %named.name, "skipped");
                self.run.report.stages.push(StageReport {
                    name: named.name.clone(),
                    kind: named.stage.kind(),
                    outcome: StageOutcome::Skipped,
                    duration: std::time::Duration::ZERO,
                });
                continue;
            }

            let stage_started = Instant::now();
            let produced = {
                let lookup = ResultLookup::new(&self.stages, &self.run.results);
                let working = working_image(&self.input, &self.run);
                let ctx = StageContext::new(&named.name, working, &self.properties, lookup);
                named.stage.process(&ctx)
            };
            let duration = stage_started.elapsed();

            let outcome = match produced {
                Ok(Some(result)) if !result.is_empty() => {
                    let image = result.image_ref().is_some();
                    let model = result.model_ref().map(Model::kind);
                    if image {
                        self.run.working_from = Some(named.name.clone());
                    }
                    self.run.results.insert(named.name.clone(), result);
                    StageOutcome::Success { image, model }
                }
                Ok(_) => StageOutcome::Empty,
                Err(err) if err.is_soft() => {
                    tracing::debug!(stage = %named.name, reason = %err, "no result");
                    StageOutcome::Empty
                }
                Err(err) => {
                    let err = PipelineError::stage_failure(named.name.clone(), err);
                    tracing::warn!(error = %err.chain_message(), "stage failed");
                    StageOutcome::Errored(err)
                }
            };
            tracing::debug!(
                stage = %named.name,
                kind = named.stage.kind(),
                status = outcome.label(),
                elapsed_ms = duration.as_secs_f64() * 1000.0,
                "stage finished"
            );

            let failed = matches!(outcome, StageOutcome::Errored(_));
            self.run.report.stages.push(StageReport {
                name: named.name.clone(),
                kind: named.stage.kind(),
                outcome,
                duration,
            });
            if failed && mode == RunMode::Strict {
                self.run.report.aborted = true;
                break;
            }
        }

        self.run.report.total_duration = started.elapsed();
    }

    // ───────────────────────── Results ─────────────────────────

    /// The report of the last run.
    #[must_use]
    pub const fn report(&self) -> &RunReport {
        &self.run.report
    }

    /// The working image after the last run (or the seeded input before any
    /// stage produced an image).
    #[must_use]
    pub fn working_image(&self) -> Option<(&DynamicImage, ColorSpace)> {
        working_image(&self.input, &self.run)
    }

    fn lookup(&self) -> ResultLookup<'_> {
        ResultLookup::new(&self.stages, &self.run.results)
    }

    /// The result `name` recorded in the last run.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::UnknownStageReference`] if `name` is not defined.
    pub fn result(&self, name: &str) -> Result<Option<&StageResult>, PipelineError> {
        self.lookup().result(name)
    }

    /// The result `name` recorded in the last run, which must exist.
    ///
    /// # Errors
    ///
    /// See [`ResultLookup::expected_result`].
    pub fn expected_result(&self, name: &str) -> Result<&StageResult, PipelineError> {
        self.lookup().expected_result(name)
    }

    /// The model `name` recorded in the last run.
    ///
    /// # Errors
    ///
    /// See [`ResultLookup::expected_model`].
    pub fn expected_model(&self, name: &str) -> Result<&Model, PipelineError> {
        self.lookup().expected_model(name)
    }

    /// The model `name` recorded in the last run, as a list of `T`.
    ///
    /// # Errors
    ///
    /// See [`ResultLookup::expected_list_model`].
    pub fn expected_list_model<T: ListModel>(&self, name: &str) -> Result<&[T], PipelineError> {
        self.lookup().expected_list_model::<T>(name)
    }

    /// The model `name` recorded in the last run, as a single `T`.
    ///
    /// # Errors
    ///
    /// See [`ResultLookup::expected_single_model`].
    pub fn expected_single_model<T: SingleModel>(&self, name: &str) -> Result<&T, PipelineError> {
        self.lookup().expected_single_model::<T>(name)
    }
}

fn working_image<'a>(
    input: &'a Option<(DynamicImage, ColorSpace)>,
    run: &'a RunState,
) -> Option<(&'a DynamicImage, ColorSpace)> {
    match &run.working_from {
        Some(stage) => {
            let result = run.results.get(stage)?;
            Some((result.image_ref()?, result.color_space()?))
        }
        None => input.as_ref().map(|(image, cs)| (image, *cs)),
    }
}

fn unknown(name: &str) -> PipelineError {
    PipelineError::UnknownStageReference {
        name: name.to_string(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::types::{Circle, RotatedRect};

    /// Returns a fixed result and counts calls.
    #[derive(Debug)]
    struct Fixed {
        result: Option<StageResult>,
        calls: Mutex<usize>,
    }

    impl Fixed {
        fn new(result: Option<StageResult>) -> Self {
            Self {
                result,
                calls: Mutex::new(0),
            }
        }
    }

    impl Stage for Fixed {
        fn kind(&self) -> &'static str {
            "Fixed"
        }

        fn process(&self, _ctx: &StageContext<'_>) -> Result<Option<StageResult>, PipelineError> {
            *self.calls.lock().unwrap() += 1;
            Ok(self.result.clone())
        }
    }

    /// Fails with the configured error.
    #[derive(Debug)]
    struct Failing;

    impl Stage for Failing {
        fn kind(&self) -> &'static str {
            "Failing"
        }

        fn process(&self, _ctx: &StageContext<'_>) -> Result<Option<StageResult>, PipelineError> {
            Err(PipelineError::InvalidConfig("broken".to_string()))
        }
    }

    /// Requires the named stage's result and passes its model through.
    #[derive(Debug)]
    struct Needs(&'static str);

    impl Stage for Needs {
        fn kind(&self) -> &'static str {
            "Needs"
        }

        fn process(&self, ctx: &StageContext<'_>) -> Result<Option<StageResult>, PipelineError> {
            let model = ctx.expected_result(self.0)?.expected_model(self.0)?;
            Ok(Some(StageResult::model(model.clone())))
        }
    }

    /// Reports the working image width as a scalar.
    #[derive(Debug)]
    struct Width;

    impl Stage for Width {
        fn kind(&self) -> &'static str {
            "Width"
        }

        fn process(&self, ctx: &StageContext<'_>) -> Result<Option<StageResult>, PipelineError> {
            let (image, _) = ctx.require_working_image()?;
            Ok(Some(StageResult::model(Model::Scalar(f64::from(
                image.width(),
            )))))
        }
    }

    fn circles() -> Model {
        Model::Circles(vec![Circle::new(1.0, 2.0, 3.0)])
    }

    #[test]
    fn duplicate_names_rejected() {
        let mut p = Pipeline::new();
        p.add_stage("a", Failing).unwrap();
        assert!(matches!(
            p.add_stage("a", Failing),
            Err(PipelineError::DuplicateStageName(name)) if name == "a"
        ));
        assert!(matches!(
            p.add_stage("  ", Failing),
            Err(PipelineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn insert_stage_keeps_order() {
        let mut p = Pipeline::new();
        p.add_stage("a", Failing).unwrap().add_stage("c", Failing).unwrap();
        p.insert_stage(1, "b", Failing).unwrap();
        assert_eq!(p.stage_names().collect::<Vec<_>>(), ["a", "b", "c"]);
    }

    #[test]
    fn empty_result_is_recorded_as_empty() {
        let mut p = Pipeline::new();
        p.add_stage("noop", Fixed::new(Some(StageResult::empty())))
            .unwrap()
            .add_stage("none", Fixed::new(None))
            .unwrap();
        let report = p.run();
        assert!(matches!(report.outcome("noop"), Some(StageOutcome::Empty)));
        assert!(matches!(report.outcome("none"), Some(StageOutcome::Empty)));
        assert!(p.result("noop").unwrap().is_none());
    }

    #[test]
    fn failure_is_contained_and_run_continues() {
        let mut p = Pipeline::new();
        p.add_stage("bad", Failing)
            .unwrap()
            .add_stage("good", Fixed::new(Some(StageResult::model(circles()))))
            .unwrap();
        let report = p.run();
        assert!(!report.succeeded());
        let err = report.outcome("bad").and_then(StageOutcome::error).unwrap();
        assert!(matches!(err, PipelineError::StageExecutionFailure { stage, .. } if stage == "bad"));
        assert!(report.outcome("good").unwrap().is_success());
    }

    #[test]
    fn strict_run_stops_at_first_failure() {
        let mut p = Pipeline::new();
        p.add_stage("bad", Failing)
            .unwrap()
            .add_stage("good", Fixed::new(Some(StageResult::model(circles()))))
            .unwrap();
        let err = p.run_strict().unwrap_err();
        assert!(matches!(err.root_cause(), PipelineError::InvalidConfig(_)));
        assert!(p.report().aborted);
        assert_eq!(p.report().stages.len(), 1);
        assert_eq!(*p.stage::<Fixed>("good").unwrap().calls.lock().unwrap(), 0);
    }

    #[test]
    fn hard_dependency_on_failed_stage_cascades() {
        let mut p = Pipeline::new();
        p.add_stage("bad", Failing)
            .unwrap()
            .add_stage("dependent", Needs("bad"))
            .unwrap();
        let report = p.run();
        let err = report.outcome("dependent").and_then(StageOutcome::error).unwrap();
        assert!(matches!(
            err.root_cause(),
            PipelineError::MissingExpectedResult { name } if name == "bad"
        ));
    }

    #[test]
    fn forward_reference_is_missing_not_unknown() {
        let mut p = Pipeline::new();
        p.add_stage("early", Needs("late"))
            .unwrap()
            .add_stage("late", Fixed::new(Some(StageResult::model(circles()))))
            .unwrap();
        let report = p.run();
        let err = report.outcome("early").and_then(StageOutcome::error).unwrap();
        assert!(matches!(err.root_cause(), PipelineError::MissingExpectedResult { .. }));
    }

    #[test]
    fn unknown_reference_is_reported() {
        let mut p = Pipeline::new();
        p.add_stage("lost", Needs("ghost")).unwrap();
        p.run();
        assert!(matches!(
            p.report().first_error().map(PipelineError::root_cause),
            Some(PipelineError::UnknownStageReference { name }) if name == "ghost"
        ));
        assert!(matches!(
            p.result("ghost"),
            Err(PipelineError::UnknownStageReference { .. })
        ));
    }

    #[test]
    fn image_result_replaces_working_image() {
        let mut p = Pipeline::new();
        p.set_input_image(DynamicImage::new_luma8(10, 4), ColorSpace::Gray);
        p.add_stage("before", Width)
            .unwrap()
            .add_stage(
                "resize",
                Fixed::new(Some(StageResult::image(
                    DynamicImage::new_rgb8(7, 7),
                    ColorSpace::Rgb,
                ))),
            )
            .unwrap()
            .add_stage("model-only", Fixed::new(Some(StageResult::model(circles()))))
            .unwrap()
            .add_stage("after", Width)
            .unwrap();
        p.run();
        assert_eq!(p.expected_single_model::<f64>("before").unwrap(), &10.0);
        assert_eq!(p.expected_single_model::<f64>("after").unwrap(), &7.0);
        let (image, cs) = p.working_image().unwrap();
        assert_eq!((image.width(), cs), (7, ColorSpace::Rgb));
    }

    #[test]
    fn failed_stage_leaves_working_image() {
        let mut p = Pipeline::new();
        p.set_input_image(DynamicImage::new_luma8(5, 5), ColorSpace::Gray);
        p.add_stage("bad", Failing).unwrap().add_stage("w", Width).unwrap();
        p.run();
        assert_eq!(p.expected_single_model::<f64>("w").unwrap(), &5.0);
    }

    #[test]
    fn no_working_image_fails_stage() {
        let mut p = Pipeline::new();
        p.add_stage("w", Width).unwrap();
        p.run();
        assert!(matches!(
            p.report().first_error().map(PipelineError::root_cause),
            Some(PipelineError::NoWorkingImage)
        ));
    }

    #[test]
    fn results_do_not_leak_between_runs() {
        let mut p = Pipeline::new();
        p.add_stage("a", Fixed::new(Some(StageResult::model(circles()))))
            .unwrap();
        p.run();
        assert!(p.result("a").unwrap().is_some());

        p.replace_stage("a", Fixed::new(None)).unwrap();
        p.run();
        assert!(p.result("a").unwrap().is_none());
    }

    #[test]
    fn disabled_stage_is_skipped() {
        let mut p = Pipeline::new();
        p.add_stage("a", Fixed::new(Some(StageResult::model(circles()))))
            .unwrap();
        p.set_enabled("a", false).unwrap();
        let report = p.run();
        assert!(matches!(report.outcome("a"), Some(StageOutcome::Skipped)));
        assert_eq!(*p.stage::<Fixed>("a").unwrap().calls.lock().unwrap(), 0);
    }

    #[test]
    fn type_mismatch_from_pipeline_accessor() {
        let mut p = Pipeline::new();
        p.add_stage("n", Fixed::new(Some(StageResult::model(Model::Scalar(1.0)))))
            .unwrap();
        p.run();
        assert!(matches!(
            p.expected_list_model::<RotatedRect>("n"),
            Err(PipelineError::ResultTypeMismatch { .. })
        ));
    }

    #[test]
    fn stage_mut_downcasts_to_concrete_type() {
        let mut p = Pipeline::new();
        p.add_stage("f", Failing).unwrap();
        assert!(p.stage_mut::<Failing>("f").is_some());
        assert!(p.stage_mut::<Width>("f").is_none());
        assert!(p.remove_stage("f").is_some());
        assert_eq!(p.stages().len(), 0);
    }

    #[test]
    fn pipeline_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<Pipeline>();
    }
}
