//! Per-run diagnostics: what each stage produced and how long it took.
//!
//! A [`RunReport`] is rebuilt by every run. It lists one [`StageReport`]
//! per defined stage in definition order, so a vision-debugging UI can show
//! partial output after a failure and machine-control code can decide
//! whether the measurement it needs was produced.
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::time::Duration;

use serde::Serialize;

use crate::error::{ErrorSummary, PipelineError};
use crate::types::ModelKind;

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }
}

/// What happened to one stage during one run.
#[derive(Debug)]
pub enum StageOutcome {
    /// The stage recorded a non-empty result.
    Success {
        /// Whether the result carries an image (now the working image).
        image: bool,
        /// Kind of the result's model, if any.
        model: Option<ModelKind>,
    },
    /// The stage ran and produced nothing.
    Empty,
    /// The stage is disabled and did not run.
    Skipped,
    /// The stage failed; always a [`PipelineError::StageExecutionFailure`].
    Errored(PipelineError),
}

impl StageOutcome {
    /// Short status label.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Success { .. } => "success",
            Self::Empty => "empty",
            Self::Skipped => "skipped",
            Self::Errored(_) => "errored",
        }
    }

    /// Returns `true` for [`Success`](Self::Success).
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// The recorded error, if the stage failed.
    #[must_use]
    pub const fn error(&self) -> Option<&PipelineError> {
        match self {
            Self::Errored(err) => Some(err),
            _ => None,
        }
    }
}

/// Serde-compatible proxy for `StageOutcome`.
#[derive(Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum StageOutcomeProxy {
    Success {
        image: bool,
        model: Option<ModelKind>,
    },
    Empty,
    Skipped,
    Errored {
        error: ErrorSummary,
    },
}

impl Serialize for StageOutcome {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let proxy = match self {
            Self::Success { image, model } => StageOutcomeProxy::Success {
                image: *image,
                model: *model,
            },
            Self::Empty => StageOutcomeProxy::Empty,
            Self::Skipped => StageOutcomeProxy::Skipped,
            Self::Errored(err) => StageOutcomeProxy::Errored {
                error: ErrorSummary::from(err),
            },
        };
        proxy.serialize(serializer)
    }
}

/// Outcome and timing of one stage.
#[derive(Debug, Serialize)]
pub struct StageReport {
    /// The stage's name in the pipeline.
    pub name: String,
    /// The stage's kind.
    pub kind: &'static str,
    /// What the stage produced.
    pub outcome: StageOutcome,
    /// Wall-clock duration of the stage's turn (seconds).
    #[serde(serialize_with = "duration_serde::serialize")]
    pub duration: Duration,
}

/// Outcomes of every stage for one run, in definition order.
#[derive(Debug, Default, Serialize)]
pub struct RunReport {
    /// Per-stage reports. Stages after an abort in strict mode are absent.
    pub stages: Vec<StageReport>,
    /// Total wall-clock duration of the run (seconds).
    #[serde(serialize_with = "duration_serde::serialize")]
    pub total_duration: Duration,
    /// Whether a strict run stopped at the first failure.
    pub aborted: bool,
}

impl RunReport {
    /// The report for the stage called `name`.
    #[must_use]
    pub fn stage(&self, name: &str) -> Option<&StageReport> {
        self.stages.iter().find(|s| s.name == name)
    }

    /// The outcome of the stage called `name`.
    #[must_use]
    pub fn outcome(&self, name: &str) -> Option<&StageOutcome> {
        self.stage(name).map(|s| &s.outcome)
    }

    /// Every recorded failure, in stage order.
    pub fn errors(&self) -> impl Iterator<Item = &PipelineError> {
        self.stages.iter().filter_map(|s| s.outcome.error())
    }

    /// The first recorded failure.
    #[must_use]
    pub fn first_error(&self) -> Option<&PipelineError> {
        self.errors().next()
    }

    /// Whether the run completed without any stage failing.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        !self.aborted && self.first_error().is_none()
    }

    /// Format as a human-readable table.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut lines = Vec::new();
        lines.push(format!("Pipeline Run Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Total duration: {:.3}ms{}",
            duration_ms(self.total_duration),
            if self.aborted { " (aborted)" } else { "" },
        ));
        lines.push(String::new());
        lines.push(format!(
            "{:<20} {:<22} {:<8} {:>10}  {}",
            "Stage", "Kind", "Status", "Duration", "Details"
        ));
        lines.push("-".repeat(80));
        for stage in &self.stages {
            let details = match &stage.outcome {
                StageOutcome::Success { image, model } => {
                    let mut parts = Vec::new();
                    if *image {
                        parts.push("image".to_string());
                    }
                    if let Some(kind) = model {
                        parts.push(kind.to_string());
                    }
                    parts.join(", ")
                }
                StageOutcome::Errored(err) => err.root_cause().chain_message(),
                StageOutcome::Empty | StageOutcome::Skipped => String::new(),
            };
            lines.push(format!(
                "{:<20} {:<22} {:<8} {:>8.3}ms  {details}",
                stage.name,
                stage.kind,
                stage.outcome.label(),
                duration_ms(stage.duration),
            ));
        }
        lines.join("\n")
    }
}

fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn report() -> RunReport {
        RunReport {
            stages: vec![
                StageReport {
                    name: "detect".to_string(),
                    kind: "FitCircles",
                    outcome: StageOutcome::Success {
                        image: false,
                        model: Some(ModelKind::Circles),
                    },
                    duration: Duration::from_millis(2),
                },
                StageReport {
                    name: "draw".to_string(),
                    kind: "DrawCircles",
                    outcome: StageOutcome::Errored(PipelineError::stage_failure(
                        "draw",
                        PipelineError::MissingExpectedResult {
                            name: "detect".to_string(),
                        },
                    )),
                    duration: Duration::from_millis(1),
                },
            ],
            total_duration: Duration::from_millis(3),
            aborted: false,
        }
    }

    #[test]
    fn first_error_and_success_flag() {
        let report = report();
        assert!(!report.succeeded());
        assert!(matches!(
            report.first_error().map(PipelineError::root_cause),
            Some(PipelineError::MissingExpectedResult { .. })
        ));
        assert!(report.outcome("detect").unwrap().is_success());
        assert!(report.outcome("nope").is_none());
    }

    #[test]
    fn summary_lists_every_stage() {
        let text = report().summary();
        assert!(text.contains("detect"));
        assert!(text.contains("list of circles"));
        assert!(text.contains("errored"));
        assert!(text.contains("stage 'detect' produced no result"));
    }

    #[test]
    fn json_uses_status_tags_and_seconds() {
        let json = serde_json::to_value(report()).unwrap();
        let stages = json["stages"].as_array().unwrap();
        assert_eq!(stages[0]["outcome"]["status"], "success");
        assert_eq!(stages[0]["outcome"]["model"], "Circles");
        assert_eq!(stages[1]["outcome"]["status"], "errored");
        assert_eq!(
            stages[1]["outcome"]["error"]["kind"],
            "MissingExpectedResult"
        );
        assert!((json["total_duration"].as_f64().unwrap() - 0.003).abs() < 1e-9);
    }

    #[test]
    fn empty_report_succeeds() {
        assert!(RunReport::default().succeeded());
    }
}
