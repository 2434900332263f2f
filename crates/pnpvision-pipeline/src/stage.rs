//! The stage contract and the read-only view a stage gets of the run.
//!
//! A stage is a configured unit of work. Its only capability is
//! [`Stage::process`], which takes `&self`: anything a stage computes for
//! one run must be returned in its [`StageResult`], never stored on the
//! stage, so the same definition can be re-run any number of times.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;

use image::DynamicImage;

use crate::error::PipelineError;
use crate::pipeline::NamedStage;
use crate::properties::PropertyBag;
use crate::result::StageResult;
use crate::types::{ColorSpace, ListModel, Model, SingleModel};

/// A named unit of processing within a pipeline.
pub trait Stage: Any + fmt::Debug + Send + Sync {
    /// Short identifier of the processing behavior (e.g. `"DrawCircles"`).
    fn kind(&self) -> &'static str;

    /// Produce this stage's output for the current run.
    ///
    /// `Ok(None)` means "nothing this run" and is recorded as empty.
    /// Returning [`PipelineError::ResourceUnavailable`] is equivalent.
    ///
    /// # Errors
    ///
    /// Any other error is recorded as this stage's failure.
    fn process(&self, ctx: &StageContext<'_>) -> Result<Option<StageResult>, PipelineError>;
}

/// Lookup of results recorded so far in the current run.
#[derive(Clone, Copy)]
pub struct ResultLookup<'a> {
    stages: &'a [NamedStage],
    recorded: &'a HashMap<String, StageResult>,
}

impl<'a> ResultLookup<'a> {
    pub(crate) const fn new(
        stages: &'a [NamedStage],
        recorded: &'a HashMap<String, StageResult>,
    ) -> Self {
        Self { stages, recorded }
    }

    /// The result recorded for `name` this run, if any.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::UnknownStageReference`] if no stage named
    /// `name` is defined.
    pub fn result(&self, name: &str) -> Result<Option<&'a StageResult>, PipelineError> {
        if !self.stages.iter().any(|s| s.name() == name) {
            return Err(PipelineError::UnknownStageReference {
                name: name.to_string(),
            });
        }
        Ok(self.recorded.get(name))
    }

    /// The result recorded for `name`, which must exist.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::UnknownStageReference`] for an undefined
    /// name and [`PipelineError::MissingExpectedResult`] if the stage
    /// produced nothing this run (or has not run yet).
    pub fn expected_result(&self, name: &str) -> Result<&'a StageResult, PipelineError> {
        self.result(name)?
            .ok_or_else(|| PipelineError::MissingExpectedResult {
                name: name.to_string(),
            })
    }

    /// The model recorded for `name`, which must exist.
    ///
    /// # Errors
    ///
    /// As [`expected_result`](Self::expected_result), plus
    /// [`PipelineError::MissingExpectedResult`] when the result has no model.
    pub fn expected_model(&self, name: &str) -> Result<&'a Model, PipelineError> {
        self.expected_result(name)?.expected_model(name)
    }

    /// The model recorded for `name` as a list of `T`.
    ///
    /// # Errors
    ///
    /// As [`expected_model`](Self::expected_model), plus
    /// [`PipelineError::ResultTypeMismatch`] if the model is not a list of `T`.
    pub fn expected_list_model<T: ListModel>(&self, name: &str) -> Result<&'a [T], PipelineError> {
        self.expected_result(name)?.expected_list_model::<T>(name)
    }

    /// The model recorded for `name` as a single `T`.
    ///
    /// # Errors
    ///
    /// As [`expected_model`](Self::expected_model), plus
    /// [`PipelineError::ResultTypeMismatch`] if the model is not a `T`.
    pub fn expected_single_model<T: SingleModel>(
        &self,
        name: &str,
    ) -> Result<&'a T, PipelineError> {
        self.expected_result(name)?.expected_single_model::<T>(name)
    }
}

/// Everything a stage may read during its turn.
pub struct StageContext<'a> {
    name: &'a str,
    working: Option<(&'a DynamicImage, ColorSpace)>,
    properties: &'a PropertyBag,
    results: ResultLookup<'a>,
}

impl<'a> StageContext<'a> {
    pub(crate) const fn new(
        name: &'a str,
        working: Option<(&'a DynamicImage, ColorSpace)>,
        properties: &'a PropertyBag,
        results: ResultLookup<'a>,
    ) -> Self {
        Self {
            name,
            working,
            properties,
            results,
        }
    }

    /// Name of the stage being run.
    #[must_use]
    pub const fn name(&self) -> &'a str {
        self.name
    }

    /// The current working image and its color space.
    #[must_use]
    pub const fn working_image(&self) -> Option<(&'a DynamicImage, ColorSpace)> {
        self.working
    }

    /// The current working image, which must be present.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::NoWorkingImage`] if there is none.
    pub fn require_working_image(&self) -> Result<(&'a DynamicImage, ColorSpace), PipelineError> {
        self.working.ok_or(PipelineError::NoWorkingImage)
    }

    /// The run's property bag.
    #[must_use]
    pub const fn properties(&self) -> &'a PropertyBag {
        self.properties
    }

    /// Shorthand for `properties().get::<T>(key)`.
    #[must_use]
    pub fn property<T: Any>(&self, key: &str) -> Option<&'a T> {
        self.properties.get::<T>(key)
    }

    /// Results recorded by earlier stages this run.
    #[must_use]
    pub const fn results(&self) -> ResultLookup<'a> {
        self.results
    }

    /// See [`ResultLookup::result`].
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::UnknownStageReference`] for an undefined name.
    pub fn result(&self, name: &str) -> Result<Option<&'a StageResult>, PipelineError> {
        self.results.result(name)
    }

    /// See [`ResultLookup::expected_result`].
    ///
    /// # Errors
    ///
    /// See [`ResultLookup::expected_result`].
    pub fn expected_result(&self, name: &str) -> Result<&'a StageResult, PipelineError> {
        self.results.expected_result(name)
    }

    /// See [`ResultLookup::expected_list_model`].
    ///
    /// # Errors
    ///
    /// See [`ResultLookup::expected_list_model`].
    pub fn expected_list_model<T: ListModel>(&self, name: &str) -> Result<&'a [T], PipelineError> {
        self.results.expected_list_model::<T>(name)
    }

    /// See [`ResultLookup::expected_single_model`].
    ///
    /// # Errors
    ///
    /// See [`ResultLookup::expected_single_model`].
    pub fn expected_single_model<T: SingleModel>(
        &self,
        name: &str,
    ) -> Result<&'a T, PipelineError> {
        self.results.expected_single_model::<T>(name)
    }
}

/// Treat a blank or missing stage-name option as "not configured".
#[must_use]
pub fn configured_name(name: Option<&str>) -> Option<&str> {
    name.map(str::trim).filter(|n| !n.is_empty())
}
