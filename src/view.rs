//! Observer-side readout of the slider: what a renderer or status client sees.

use serde::Serialize;

use crate::config::Profile;
use crate::gestures::{GestureState, StateChange, ThresholdSide};

/// Published snapshot, kept current from the controller's change stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SwipeStatus {
    pub swiped: bool,
    pub holding: bool,
    pub value: f32,
    pub threshold_side: ThresholdSide,
}

impl From<&GestureState> for SwipeStatus {
    fn from(s: &GestureState) -> Self {
        Self {
            swiped: s.completed(),
            holding: s.holding(),
            value: s.value(),
            threshold_side: s.threshold_side(),
        }
    }
}

impl SwipeStatus {
    pub fn apply(&mut self, change: &StateChange) {
        match *change {
            StateChange::Holding(h) => self.holding = h,
            StateChange::Value(v) => self.value = v,
            StateChange::Completed(c) => self.swiped = c,
            StateChange::ThresholdSide(side) => self.threshold_side = side,
        }
    }

    pub fn display_value(&self) -> u8 {
        self.value.round() as u8
    }

    pub fn readout(&self) -> Vec<String> {
        vec![
            format!("Swipe status : {}", self.swiped),
            format!("Hold state : {}", self.holding),
            format!("Slider Value : {}", self.display_value()),
            format!("Passed Threshold : {}", self.threshold_side.label()),
        ]
    }
}

/// Label and colors that apply for the current status.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Appearance<'a> {
    pub label: &'a str,
    pub label_color: &'a str,
    pub thumb_color: &'a str,
    pub fill_color: &'a str,
    /// Width of the progress fill in pixels.
    pub fill_width: f32,
    pub track_width: f32,
    pub track_height: f32,
}

impl<'a> Appearance<'a> {
    pub fn new(status: &SwipeStatus, profile: &'a Profile) -> Self {
        let style = &profile.style;
        let (label, label_color, thumb_color) = if status.swiped {
            (
                profile.labels.complete_label.as_str(),
                style.complete_label_color.as_str(),
                style.complete_thumb_color.as_str(),
            )
        } else {
            (
                profile.labels.label.as_str(),
                style.label_color.as_str(),
                style.thumb_color.as_str(),
            )
        };
        Self {
            label,
            label_color,
            thumb_color,
            fill_color: &style.complete_track_background_color,
            fill_width: profile.track.width * status.value / 100.0,
            track_width: profile.track.width,
            track_height: profile.track.height,
        }
    }
}
