//! Per-slot touch tracking, reduced to one primary pointer on the track.
//!
//! The first finger down becomes the pointer. A second finger landing while
//! it is down aborts the gesture; nothing new starts until every finger has
//! lifted.

use crate::gestures::PointerEvent;

#[derive(Debug, Clone, Copy)]
struct SlotState {
    tracking_id: i32, // -1 = inactive
    x_raw: i32,
}

impl Default for SlotState {
    fn default() -> Self {
        Self {
            tracking_id: -1,
            x_raw: 0,
        }
    }
}

impl SlotState {
    fn active(&self) -> bool {
        self.tracking_id >= 0
    }
}

#[derive(Debug)]
pub struct Tracker {
    slots: Vec<SlotState>,
    cur_slot: usize,
    primary: Option<usize>,
    aborted: bool,
    last_px: f32,
    // normalization
    x_min: i32,
    x_max: i32,
    track_width: f32,
    pending_width: Option<f32>,
}

impl Tracker {
    pub fn new(track_width: f32) -> Self {
        Self {
            slots: vec![SlotState::default(); 10],
            cur_slot: 0,
            primary: None,
            aborted: false,
            last_px: 0.0,
            x_min: 0,
            x_max: 4096,
            track_width,
            pending_width: None,
        }
    }

    pub fn set_x_range(&mut self, x_min: i32, x_max: i32) {
        self.x_min = x_min;
        self.x_max = x_max.max(x_min.saturating_add(1));
    }

    /// Takes effect at the next touch so an open gesture keeps its scale.
    pub fn set_track_width(&mut self, width: f32) {
        if self.primary.is_some() {
            self.pending_width = Some(width);
        } else {
            self.track_width = width;
        }
    }

    // i64 so that ranges spanning most of i32 do not overflow
    fn to_px(&self, raw: i32) -> f32 {
        let span = (i64::from(self.x_max) - i64::from(self.x_min)).max(1);
        let offset = i64::from(raw) - i64::from(self.x_min);
        let n = (offset as f64 / span as f64).clamp(0.0, 1.0);
        n as f32 * self.track_width
    }

    pub fn on_slot(&mut self, slot: i32) {
        self.cur_slot = slot.clamp(0, self.slots.len() as i32 - 1) as usize;
    }

    pub fn on_tracking_id(&mut self, tracking_id: i32) {
        // x_raw is kept; the kernel omits unchanged axes on a new touch
        self.slots[self.cur_slot].tracking_id = tracking_id.max(-1);
    }

    pub fn on_pos_x(&mut self, raw: i32) {
        self.slots[self.cur_slot].x_raw = raw;
    }

    /// Close the frame and return the pointer event it amounts to, if any.
    pub fn on_syn_report(&mut self) -> Option<PointerEvent> {
        let active = self.slots.iter().filter(|s| s.active()).count();

        let Some(i) = self.primary else {
            if active == 0 {
                self.aborted = false;
                return None;
            }
            if self.aborted || active > 1 {
                return None;
            }
            if let Some(w) = self.pending_width.take() {
                self.track_width = w;
            }
            let i = self.slots.iter().position(|s| s.active())?;
            self.primary = Some(i);
            self.last_px = self.to_px(self.slots[i].x_raw);
            return Some(PointerEvent::Down(self.last_px));
        };

        if active > 1 {
            self.primary = None;
            self.aborted = true;
            return Some(PointerEvent::Cancel);
        }
        if !self.slots[i].active() {
            self.primary = None;
            return Some(PointerEvent::Up);
        }
        let px = self.to_px(self.slots[i].x_raw);
        if px == self.last_px {
            return None;
        }
        self.last_px = px;
        Some(PointerEvent::Move(px))
    }

    /// Drop all contacts, e.g. when the device goes away.
    pub fn abort(&mut self) -> Option<PointerEvent> {
        for s in &mut self.slots {
            s.tracking_id = -1;
        }
        self.aborted = false;
        self.primary.take().map(|_| PointerEvent::Cancel)
    }
}
