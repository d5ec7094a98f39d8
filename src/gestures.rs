//! Swipe gesture state machine.
//!
//! Pointer positions are horizontal pixel coordinates in the same space as
//! the track. Progress is the displacement from the pointer-down origin,
//! normalised by the track width captured when the gesture started.

use log::{debug, trace};
use serde::Serialize;
use std::fmt;

use crate::config::{ConfigError, Geometry};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerEvent {
    Down(f32),
    Move(f32),
    Up,
    Cancel,
}

/// Where the last gesture ended relative to the threshold.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdSide {
    #[default]
    None,
    PartialSide,
    CompleteSide,
}

impl ThresholdSide {
    pub fn label(self) -> &'static str {
        match self {
            ThresholdSide::None => "None",
            ThresholdSide::PartialSide => "Partial side",
            ThresholdSide::CompleteSide => "Complete side",
        }
    }
}

/// One observable field change, emitted in the order
/// holding, value, completed, threshold side.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StateChange {
    Holding(bool),
    Value(f32),
    Completed(bool),
    ThresholdSide(ThresholdSide),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Phase {
    Idle,
    Dragging {
        origin_x: f32,
        geometry: Geometry,
        /// Clamped displacement in pixels.
        delta: f32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GestureState {
    geometry: Geometry,
    phase: Phase,
    value: f32,
    completed: bool,
    threshold_side: ThresholdSide,
}

impl GestureState {
    fn at_rest(geometry: Geometry) -> Self {
        Self {
            geometry,
            phase: Phase::Idle,
            value: 0.0,
            completed: false,
            threshold_side: ThresholdSide::None,
        }
    }

    /// Geometry the next gesture will use.
    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    pub fn holding(&self) -> bool {
        matches!(self.phase, Phase::Dragging { .. })
    }

    pub fn completed(&self) -> bool {
        self.completed
    }

    pub fn threshold_side(&self) -> ThresholdSide {
        self.threshold_side
    }

    /// Pure transition. Events that make no sense in the current phase
    /// return the state unchanged.
    pub fn apply(self, event: PointerEvent) -> Self {
        match (self.phase, event) {
            (Phase::Idle, PointerEvent::Down(x)) => {
                if self.completed {
                    trace!("pointer down ignored: slider already completed");
                    return self;
                }
                if !x.is_finite() {
                    trace!("pointer down ignored: non-finite position");
                    return self;
                }
                Self {
                    phase: Phase::Dragging {
                        origin_x: x,
                        geometry: self.geometry,
                        delta: 0.0,
                    },
                    threshold_side: ThresholdSide::None,
                    ..self
                }
            }
            (Phase::Dragging { origin_x, geometry, .. }, PointerEvent::Move(x)) => {
                if x.is_nan() {
                    return self;
                }
                let delta = (x - origin_x).clamp(0.0, geometry.width);
                Self {
                    phase: Phase::Dragging {
                        origin_x,
                        geometry,
                        delta,
                    },
                    value: progress(delta, geometry.width),
                    ..self
                }
            }
            (Phase::Dragging { geometry, delta, .. }, PointerEvent::Up) => {
                if reaches_threshold(delta, &geometry) {
                    Self {
                        phase: Phase::Idle,
                        value: 100.0,
                        completed: true,
                        threshold_side: ThresholdSide::CompleteSide,
                        ..self
                    }
                } else {
                    self.released_partial()
                }
            }
            (Phase::Dragging { .. }, PointerEvent::Cancel) => self.released_partial(),
            (_, ev) => {
                trace!("ignored {ev:?} in {:?}", self.phase);
                self
            }
        }
    }

    fn released_partial(self) -> Self {
        Self {
            phase: Phase::Idle,
            value: 0.0,
            completed: false,
            threshold_side: ThresholdSide::PartialSide,
            ..self
        }
    }

    fn changes_to(&self, next: &Self) -> Vec<StateChange> {
        let mut out = Vec::with_capacity(4);
        if self.holding() != next.holding() {
            out.push(StateChange::Holding(next.holding()));
        }
        if self.value != next.value {
            out.push(StateChange::Value(next.value));
        }
        if self.completed != next.completed {
            out.push(StateChange::Completed(next.completed));
        }
        if self.threshold_side != next.threshold_side {
            out.push(StateChange::ThresholdSide(next.threshold_side));
        }
        out
    }
}

fn progress(delta: f32, width: f32) -> f32 {
    (delta / width * 100.0).clamp(0.0, 100.0)
}

// Relative slack for f32 rounding of pointer positions.
const THRESHOLD_TOLERANCE: f64 = 1e-6;

/// Release decision, made in pixel space: `delta >= width * threshold%`.
fn reaches_threshold(delta: f32, geometry: &Geometry) -> bool {
    let target = f64::from(geometry.width) * f64::from(geometry.threshold) / 100.0;
    f64::from(delta) >= target - target * THRESHOLD_TOLERANCE
}

type Subscriber = Box<dyn FnMut(&StateChange) + Send>;

pub struct GestureController {
    state: GestureState,
    subscribers: Vec<Subscriber>,
}

impl fmt::Debug for GestureController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GestureController")
            .field("state", &self.state)
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

impl GestureController {
    pub fn new(geometry: Geometry) -> Result<Self, ConfigError> {
        geometry.validate()?;
        Ok(Self {
            state: GestureState::at_rest(geometry),
            subscribers: Vec::new(),
        })
    }

    pub fn state(&self) -> &GestureState {
        &self.state
    }

    pub fn subscribe<F>(&mut self, f: F)
    where
        F: FnMut(&StateChange) + Send + 'static,
    {
        self.subscribers.push(Box::new(f));
    }

    pub fn handle(&mut self, event: PointerEvent) {
        let next = self.state.apply(event);
        self.commit(next);
    }

    pub fn pointer_down(&mut self, x: f32) {
        self.handle(PointerEvent::Down(x));
    }

    pub fn pointer_move(&mut self, x: f32) {
        self.handle(PointerEvent::Move(x));
    }

    pub fn pointer_up(&mut self) {
        self.handle(PointerEvent::Up);
    }

    pub fn pointer_cancel(&mut self) {
        self.handle(PointerEvent::Cancel);
    }

    /// Back to rest. Refused while a gesture is open; returns whether the
    /// reset happened.
    pub fn reset(&mut self) -> bool {
        if self.state.holding() {
            debug!("reset refused: gesture in progress");
            return false;
        }
        self.force_reset();
        true
    }

    pub fn force_reset(&mut self) {
        let next = GestureState::at_rest(self.state.geometry);
        self.commit(next);
    }

    /// New geometry for subsequent gestures. An open gesture keeps the
    /// geometry it started with; completion state is untouched.
    pub fn set_geometry(&mut self, geometry: Geometry) -> Result<(), ConfigError> {
        geometry.validate()?;
        self.state.geometry = geometry;
        Ok(())
    }

    fn commit(&mut self, next: GestureState) {
        let changes = self.state.changes_to(&next);
        self.state = next;
        for change in &changes {
            for sub in &mut self.subscribers {
                sub(change);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::{Arc, Mutex};

    fn controller(width: f32, threshold: f32) -> GestureController {
        GestureController::new(Geometry::new(width, 50.0, threshold).unwrap()).unwrap()
    }

    fn recorded(c: &mut GestureController) -> Arc<Mutex<Vec<StateChange>>> {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = log.clone();
        c.subscribe(move |ch| sink.lock().unwrap().push(*ch));
        log
    }

    #[test]
    fn starts_at_rest() {
        let c = controller(300.0, 70.0);
        let s = c.state();
        assert_eq!(s.value(), 0.0);
        assert!(!s.holding());
        assert!(!s.completed());
        assert_eq!(s.threshold_side(), ThresholdSide::None);
    }

    #[test]
    fn rejects_bad_geometry_at_construction() {
        let g = Geometry {
            width: 0.0,
            height: 50.0,
            threshold: 50.0,
        };
        assert!(GestureController::new(g).is_err());
    }

    #[test]
    fn release_below_threshold_resets() {
        let mut c = controller(300.0, 50.0);
        c.pointer_down(0.0);
        c.pointer_move(120.0);
        assert!((c.state().value() - 40.0).abs() < 1e-4);
        c.pointer_up();

        let s = c.state();
        assert!(!s.holding());
        assert_eq!(s.value(), 0.0);
        assert!(!s.completed());
        assert_eq!(s.threshold_side(), ThresholdSide::PartialSide);
    }

    #[test]
    fn release_exactly_at_threshold_completes() {
        let mut c = controller(300.0, 50.0);
        c.pointer_down(0.0);
        c.pointer_move(150.0);
        assert_eq!(c.state().value(), 50.0);
        c.pointer_up();

        let s = c.state();
        assert!(!s.holding());
        assert_eq!(s.value(), 100.0);
        assert!(s.completed());
        assert_eq!(s.threshold_side(), ThresholdSide::CompleteSide);
    }

    #[test]
    fn threshold_percentages_inexact_in_f32_still_complete() {
        let cases = [(300.0, 53.0, 159.0), (500.0, 59.0, 295.0), (1.0, 53.0, 0.53)];
        for (width, threshold, x) in cases {
            let mut c = controller(width, threshold);
            c.pointer_down(0.0);
            c.pointer_move(x);
            c.pointer_up();
            assert!(c.state().completed(), "{x}px of {width}px at {threshold}%");
        }
    }

    #[test]
    fn one_pixel_short_of_threshold_resets() {
        let mut c = controller(300.0, 53.0);
        c.pointer_down(0.0);
        c.pointer_move(158.0);
        c.pointer_up();
        assert!(!c.state().completed());
    }

    #[test]
    fn mid_drag_is_observable() {
        let mut c = controller(300.0, 70.0);
        c.pointer_down(5.0);
        c.pointer_move(150.0);
        let s = c.state();
        assert!(s.holding());
        assert!(s.value() > 0.0 && s.value() < 100.0);
        assert_ne!(s.value().round() as u8, 0);
    }

    #[test]
    fn displacement_is_relative_to_origin() {
        let mut c = controller(200.0, 70.0);
        c.pointer_down(50.0);
        c.pointer_move(100.0);
        assert_eq!(c.state().value(), 25.0);
    }

    #[test]
    fn positions_are_clamped() {
        let mut c = controller(300.0, 70.0);
        c.pointer_down(100.0);
        c.pointer_move(-500.0);
        assert_eq!(c.state().value(), 0.0);
        c.pointer_move(10_000.0);
        assert_eq!(c.state().value(), 100.0);
        c.pointer_move(f32::INFINITY);
        assert_eq!(c.state().value(), 100.0);
        c.pointer_move(f32::NAN);
        assert_eq!(c.state().value(), 100.0);
    }

    #[test]
    fn cancel_never_completes() {
        let mut c = controller(300.0, 50.0);
        c.pointer_down(0.0);
        c.pointer_move(300.0);
        c.pointer_cancel();
        let s = c.state();
        assert!(!s.holding());
        assert_eq!(s.value(), 0.0);
        assert!(!s.completed());
        assert_eq!(s.threshold_side(), ThresholdSide::PartialSide);
    }

    #[test]
    fn events_outside_a_gesture_are_ignored() {
        let mut c = controller(300.0, 50.0);
        let log = recorded(&mut c);
        c.pointer_move(200.0);
        c.pointer_up();
        c.pointer_cancel();
        assert_eq!(*c.state(), GestureState::at_rest(c.state().geometry()));
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn second_down_while_holding_keeps_origin() {
        let mut c = controller(300.0, 50.0);
        c.pointer_down(0.0);
        c.pointer_down(100.0);
        c.pointer_move(150.0);
        assert_eq!(c.state().value(), 50.0);
    }

    #[test]
    fn down_clears_previous_side() {
        let mut c = controller(300.0, 50.0);
        c.pointer_down(0.0);
        c.pointer_up();
        assert_eq!(c.state().threshold_side(), ThresholdSide::PartialSide);
        c.pointer_down(0.0);
        assert_eq!(c.state().threshold_side(), ThresholdSide::None);
    }

    #[test]
    fn completed_slider_ignores_new_gestures() {
        let mut c = controller(300.0, 50.0);
        c.pointer_down(0.0);
        c.pointer_move(200.0);
        c.pointer_up();
        assert!(c.state().completed());

        c.pointer_down(0.0);
        assert!(!c.state().holding());
        c.pointer_move(10.0);
        c.pointer_up();
        assert!(c.state().completed());
        assert_eq!(c.state().value(), 100.0);
    }

    #[test]
    fn release_notifications_are_ordered() {
        let mut c = controller(300.0, 50.0);
        c.pointer_down(0.0);
        c.pointer_move(180.0);
        let log = recorded(&mut c);
        c.pointer_up();
        assert_eq!(
            *log.lock().unwrap(),
            vec![
                StateChange::Holding(false),
                StateChange::Value(100.0),
                StateChange::Completed(true),
                StateChange::ThresholdSide(ThresholdSide::CompleteSide),
            ]
        );
    }

    #[test]
    fn partial_release_flips_hold_before_value() {
        let mut c = controller(300.0, 50.0);
        c.pointer_down(0.0);
        c.pointer_move(30.0);
        let log = recorded(&mut c);
        c.pointer_up();
        assert_eq!(
            *log.lock().unwrap(),
            vec![
                StateChange::Holding(false),
                StateChange::Value(0.0),
                StateChange::ThresholdSide(ThresholdSide::PartialSide),
            ]
        );
    }

    #[test]
    fn repeated_move_emits_once() {
        let mut c = controller(300.0, 50.0);
        c.pointer_down(0.0);
        let log = recorded(&mut c);
        c.pointer_move(150.0);
        c.pointer_move(150.0);
        assert_eq!(*log.lock().unwrap(), vec![StateChange::Value(50.0)]);
    }

    #[test]
    fn reset_is_refused_mid_drag() {
        let mut c = controller(300.0, 50.0);
        c.pointer_down(0.0);
        c.pointer_move(60.0);
        assert!(!c.reset());
        assert!(c.state().holding());
        assert!((c.state().value() - 20.0).abs() < 1e-4);

        c.force_reset();
        assert!(!c.state().holding());
        assert_eq!(c.state().value(), 0.0);
    }

    #[test]
    fn reset_clears_completion() {
        let mut c = controller(300.0, 50.0);
        c.pointer_down(0.0);
        c.pointer_move(300.0);
        c.pointer_up();
        assert!(c.reset());
        let s = c.state();
        assert!(!s.completed());
        assert_eq!(s.value(), 0.0);
        assert_eq!(s.threshold_side(), ThresholdSide::None);
    }

    #[test]
    fn geometry_change_does_not_touch_completed_gesture() {
        let mut c = controller(300.0, 50.0);
        c.pointer_down(0.0);
        c.pointer_move(150.0);
        c.pointer_up();

        c.set_geometry(Geometry::new(500.0, 60.0, 90.0).unwrap())
            .unwrap();
        let s = c.state();
        assert!(s.completed());
        assert_eq!(s.value(), 100.0);
        assert_eq!(s.threshold_side(), ThresholdSide::CompleteSide);
    }

    #[test]
    fn open_gesture_keeps_its_geometry() {
        let mut c = controller(300.0, 50.0);
        c.pointer_down(0.0);
        c.set_geometry(Geometry::new(600.0, 50.0, 90.0).unwrap())
            .unwrap();
        c.pointer_move(150.0);
        assert_eq!(c.state().value(), 50.0);
        c.pointer_up();
        assert!(c.state().completed());
    }

    #[test]
    fn next_gesture_uses_new_geometry() {
        let mut c = controller(300.0, 50.0);
        c.set_geometry(Geometry::new(500.0, 50.0, 50.0).unwrap())
            .unwrap();
        c.pointer_down(0.0);
        c.pointer_move(150.0);
        assert!((c.state().value() - 30.0).abs() < 1e-4);
        c.pointer_up();
        assert!(!c.state().completed());
    }

    #[test]
    fn invalid_geometry_update_is_rejected() {
        let mut c = controller(300.0, 50.0);
        let bad = Geometry {
            width: 300.0,
            height: 50.0,
            threshold: 150.0,
        };
        assert!(c.set_geometry(bad).is_err());
        assert_eq!(c.state().geometry().threshold, 50.0);
    }

    #[test]
    fn zero_threshold_completes_on_tap() {
        let mut c = controller(300.0, 0.0);
        c.pointer_down(10.0);
        c.pointer_up();
        assert!(c.state().completed());
    }

    #[test]
    fn side_labels() {
        assert_eq!(ThresholdSide::CompleteSide.label(), "Complete side");
        assert_eq!(ThresholdSide::PartialSide.label(), "Partial side");
        assert_eq!(ThresholdSide::None.label(), "None");
    }

    fn event() -> impl Strategy<Value = PointerEvent> {
        prop_oneof![
            (-1000.0f32..2000.0).prop_map(PointerEvent::Down),
            (-1000.0f32..2000.0).prop_map(PointerEvent::Move),
            Just(PointerEvent::Up),
            Just(PointerEvent::Cancel),
        ]
    }

    proptest! {
        #[test]
        fn prop_value_stays_in_range(
            width in 1.0f32..2000.0,
            threshold in 0.0f32..=100.0,
            events in prop::collection::vec(event(), 0..64),
        ) {
            let mut c = GestureController::new(Geometry::new(width, 40.0, threshold).unwrap()).unwrap();
            for ev in events {
                c.handle(ev);
                let s = c.state();
                prop_assert!((0.0..=100.0).contains(&s.value()));
                if s.completed() {
                    prop_assert_eq!(s.value(), 100.0);
                    prop_assert!(!s.holding());
                }
            }
        }

        #[test]
        fn prop_completion_is_monotone(
            events in prop::collection::vec(event(), 0..64),
        ) {
            let mut c = controller(300.0, 50.0);
            let mut seen = false;
            for ev in events {
                c.handle(ev);
                if seen {
                    prop_assert!(c.state().completed());
                }
                seen |= c.state().completed();
            }
        }

        #[test]
        fn prop_drag_to_exact_threshold_completes(
            width in 1.0f32..2000.0,
            threshold in 0u8..=100,
        ) {
            let threshold = f32::from(threshold);
            let mut c = controller(width, threshold);
            c.pointer_down(0.0);
            c.pointer_move(width * threshold / 100.0);
            c.pointer_up();
            prop_assert!(c.state().completed());
            prop_assert_eq!(c.state().threshold_side(), ThresholdSide::CompleteSide);
        }

        #[test]
        fn prop_move_is_idempotent(origin in -500.0f32..500.0, x in -1000.0f32..1000.0) {
            let mut c = controller(300.0, 50.0);
            c.pointer_down(origin);
            c.pointer_move(x);
            let first = *c.state();
            c.pointer_move(x);
            prop_assert_eq!(*c.state(), first);
        }

        #[test]
        fn prop_apply_matches_controller(
            events in prop::collection::vec(event(), 0..32),
        ) {
            let mut c = controller(250.0, 60.0);
            let mut pure = *c.state();
            for ev in events {
                c.handle(ev);
                pure = pure.apply(ev);
                prop_assert_eq!(*c.state(), pure);
            }
        }
    }
}
