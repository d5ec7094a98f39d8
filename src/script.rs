//! Gesture scripts: a TOML list of pointer and configuration steps played
//! through a controller, with the published status captured after each step.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::config::{ConfigError, Geometry, GeometryPatch};
use crate::gestures::GestureController;
use crate::view::SwipeStatus;

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("failed to parse script: {0}")]
    Parse(String),
    #[error("script track override: {0}")]
    Track(#[source] ConfigError),
    #[error("step {index} ({step}): {source}")]
    Step {
        index: usize,
        step: String,
        #[source]
        source: ConfigError,
    },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    Down { x: f32 },
    Move { x: f32 },
    Up,
    Cancel,
    Configure(GeometryPatch),
    Reset {
        #[serde(default)]
        force: bool,
    },
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Down { x } => write!(f, "down x={x}"),
            Step::Move { x } => write!(f, "move x={x}"),
            Step::Up => f.write_str("up"),
            Step::Cancel => f.write_str("cancel"),
            Step::Configure(p) => {
                f.write_str("configure")?;
                if let Some(w) = p.width {
                    write!(f, " width={w}")?;
                }
                if let Some(h) = p.height {
                    write!(f, " height={h}")?;
                }
                if let Some(t) = p.threshold {
                    write!(f, " threshold={t}")?;
                }
                Ok(())
            }
            Step::Reset { force: true } => f.write_str("reset (forced)"),
            Step::Reset { force: false } => f.write_str("reset"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Script {
    /// Overrides applied on top of the profile geometry before the run.
    #[serde(default)]
    pub track: Option<GeometryPatch>,
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub index: usize,
    pub step: String,
    /// False for a reset that was refused mid-gesture.
    pub applied: bool,
    pub status: SwipeStatus,
}

impl Script {
    pub fn from_toml_str(text: &str) -> Result<Self, ScriptError> {
        toml::from_str(text).map_err(|e| ScriptError::Parse(e.to_string()))
    }

    pub fn replay(&self, base: Geometry) -> Result<Vec<StepReport>, ScriptError> {
        let geometry = match &self.track {
            Some(patch) => patch.apply_to(base).map_err(ScriptError::Track)?,
            None => base,
        };
        let mut ctl = GestureController::new(geometry).map_err(ScriptError::Track)?;
        info!(
            "replaying {} steps on a {}px track, threshold {}%",
            self.steps.len(),
            geometry.width,
            geometry.threshold
        );

        let mut reports = Vec::with_capacity(self.steps.len());
        for (index, step) in self.steps.iter().enumerate() {
            let applied = match step {
                Step::Down { x } => {
                    ctl.pointer_down(*x);
                    true
                }
                Step::Move { x } => {
                    ctl.pointer_move(*x);
                    true
                }
                Step::Up => {
                    ctl.pointer_up();
                    true
                }
                Step::Cancel => {
                    ctl.pointer_cancel();
                    true
                }
                Step::Configure(patch) => {
                    let next = patch
                        .apply_to(ctl.state().geometry())
                        .and_then(|g| ctl.set_geometry(g).map(|()| g))
                        .map_err(|source| ScriptError::Step {
                            index,
                            step: step.to_string(),
                            source,
                        })?;
                    debug!("step {index}: geometry now {next:?}");
                    true
                }
                Step::Reset { force: true } => {
                    ctl.force_reset();
                    true
                }
                Step::Reset { force: false } => {
                    let done = ctl.reset();
                    if !done {
                        warn!("step {index}: reset refused while holding");
                    }
                    done
                }
            };
            reports.push(StepReport {
                index,
                step: step.to_string(),
                applied,
                status: SwipeStatus::from(ctl.state()),
            });
        }
        Ok(reports)
    }
}
