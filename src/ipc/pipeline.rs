use anyhow::Result;
use log::{debug, error, info, trace, warn};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex};
use std::{thread, time::Duration};

use evdev::{AbsoluteAxisCode, Device, EventType, InputEvent, SynchronizationCode};

use crate::config::Geometry;
use crate::gestures::{GestureController, PointerEvent, StateChange, ThresholdSide};
use crate::input;
use crate::tracker::Tracker;
use crate::view::SwipeStatus;

/// Requests from the socket side. Applied between device frames, in order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    Reset { force: bool },
    Reconfigure(Geometry),
}

struct TouchSource {
    name: String,
    dev: Device,
    tracker: Tracker,
}

pub fn run_pipeline(
    geometry: Geometry,
    status: Arc<Mutex<SwipeStatus>>,
    commands: Receiver<Command>,
    shutdown: Arc<AtomicBool>,
) -> Result<()> {
    let mut ctl = GestureController::new(geometry)?;
    let published = status.clone();
    ctl.subscribe(move |change| {
        if let Ok(mut s) = published.lock() {
            s.apply(change);
        }
    });
    ctl.subscribe(|change| match change {
        StateChange::Completed(true) => info!("swipe completed"),
        StateChange::ThresholdSide(ThresholdSide::PartialSide) => {
            debug!("released on the partial side")
        }
        other => trace!("{other:?}"),
    });

    let mut sources = open_sources(geometry.width);
    if sources.is_empty() {
        warn!("no touch devices detected; pipeline idle");
    }

    while !shutdown.load(Ordering::Relaxed) {
        while let Ok(cmd) = commands.try_recv() {
            apply_command(&mut ctl, &mut sources, cmd);
        }

        let mut any_event = false;
        let mut lost = vec![];
        for (idx, src) in sources.iter_mut().enumerate() {
            let TouchSource { name, dev, tracker } = src;
            match dev.fetch_events() {
                Ok(events) => {
                    for ev in events {
                        any_event = true;
                        if let Some(pe) = feed(tracker, &ev) {
                            ctl.handle(pe);
                        }
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
                Err(e) => {
                    error!("touch device {name} lost: {e}");
                    if let Some(pe) = tracker.abort() {
                        ctl.handle(pe);
                    }
                    lost.push(idx);
                }
            }
        }
        for idx in lost.into_iter().rev() {
            sources.remove(idx);
        }

        if !any_event {
            thread::sleep(Duration::from_millis(4));
        }
    }
    info!("gesture pipeline stopped");
    Ok(())
}

fn open_sources(track_width: f32) -> Vec<TouchSource> {
    let mut out = vec![];
    for d in input::discover_touch_devices() {
        match Device::open(&d.path) {
            Ok(mut dev) => {
                if let Err(e) = dev.set_nonblocking(true) {
                    warn!("failed to make {} non-blocking: {e}", d.path);
                    continue;
                }
                let mut tracker = Tracker::new(track_width);
                if let Some((min, max)) = input::x_range(&dev) {
                    tracker.set_x_range(min, max);
                }
                info!("tracking {} ({})", d.name, d.path);
                out.push(TouchSource {
                    name: d.name,
                    dev,
                    tracker,
                });
            }
            Err(e) => warn!("failed to open {}: {e}", d.path),
        }
    }
    out
}

fn feed(tracker: &mut Tracker, ev: &InputEvent) -> Option<PointerEvent> {
    if ev.event_type() == EventType::ABSOLUTE {
        match ev.code() {
            c if c == AbsoluteAxisCode::ABS_MT_SLOT.0 => tracker.on_slot(ev.value()),
            c if c == AbsoluteAxisCode::ABS_MT_TRACKING_ID.0 => {
                tracker.on_tracking_id(ev.value())
            }
            c if c == AbsoluteAxisCode::ABS_MT_POSITION_X.0 => tracker.on_pos_x(ev.value()),
            _ => {}
        }
        None
    } else if ev.event_type() == EventType::SYNCHRONIZATION
        && ev.code() == SynchronizationCode::SYN_REPORT.0
    {
        tracker.on_syn_report()
    } else {
        None
    }
}

fn apply_command(ctl: &mut GestureController, sources: &mut [TouchSource], cmd: Command) {
    match cmd {
        Command::Reset { force: true } => {
            ctl.force_reset();
            info!("slider reset (forced)");
        }
        Command::Reset { force: false } => {
            if ctl.reset() {
                info!("slider reset");
            } else {
                warn!("reset refused: gesture in progress");
            }
        }
        Command::Reconfigure(g) => match ctl.set_geometry(g) {
            Ok(()) => {
                for s in sources.iter_mut() {
                    s.tracker.set_track_width(g.width);
                }
                info!(
                    "track now {}x{}px, threshold {}%",
                    g.width, g.height, g.threshold
                );
            }
            Err(e) => error!("rejected geometry: {e}"),
        },
    }
}
