//! pnpvision-pipeline: named, ordered image-processing pipelines for
//! locating parts, fiducials and nozzle tips in camera frames.
//!
//! A [`Pipeline`] runs its stages in definition order against a shared
//! working image. Each stage may publish a [`StageResult`] (an image, a
//! structured [`Model`], or both) that later stages look up by name:
//!
//! frame -> threshold -> contours -> fit circles -> draw circles
//!
//! Failures are isolated per stage: a failing stage is recorded in the
//! [`RunReport`] and the run continues, so a debugging UI can always show
//! how far the pipeline got. Run-scoped context (camera, part, feeder,
//! nozzle) reaches stages through the pipeline's [`PropertyBag`].
//!
//! Stage primitives come from [`image`] and [`imageproc`] through the
//! [`vision`] adapter. Apart from the stages that read image files, the
//! crate performs no I/O.

pub mod color;
pub mod context;
pub mod definition;
pub mod diagnostics;
pub mod error;
pub mod pipeline;
pub mod properties;
pub mod result;
pub mod stage;
pub mod stages;
pub mod types;
pub mod vision;

pub use color::Color;
pub use context::{Camera, Feeder, Footprint, LengthUnit, Nozzle, Package, Part, UnitsPerPixel};
pub use definition::{PipelineDefinition, StageDefinition, StageKind};
pub use diagnostics::{RunReport, StageOutcome, StageReport};
pub use error::{ErrorSummary, PipelineError};
pub use pipeline::{NamedStage, Pipeline};
pub use properties::PropertyBag;
pub use result::StageResult;
pub use stage::{ResultLookup, Stage, StageContext, configured_name};
pub use types::{
    Circle, ColorSpace, Contour, DynamicImage, ListModel, Model, ModelKind, Point, RotatedRect,
    SingleModel, Size,
};
