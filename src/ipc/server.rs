use anyhow::Result;
use log::{error, info, warn};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use signal_hook::consts::{SIGINT, SIGTERM};
use std::{
    fs, io,
    io::{BufRead, BufReader, Write},
    os::unix::net::{UnixListener, UnixStream},
    path::PathBuf,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
        mpsc::{self, Sender},
    },
    thread,
    time::Duration,
};

use super::pipeline::{Command, run_pipeline};
use super::runtime::socket_path;
use crate::config::ProfileStore;
use crate::view::{Appearance, SwipeStatus};

pub fn run_daemon() -> Result<()> {
    // socket
    let sock = socket_path()?;
    if sock.exists() {
        let _ = fs::remove_file(&sock);
    }
    let listener = UnixListener::bind(&sock)?;
    info!("daemon: listening on {}", sock.display());

    // state
    let mut store = ProfileStore::load_or_install_default()?;
    info!(
        "daemon: active profile '{}' ({})",
        store.active_name,
        store.profile.display_name()
    );

    let shutdown = Arc::new(AtomicBool::new(false));
    for sig in [SIGINT, SIGTERM] {
        signal_hook::flag::register(sig, Arc::clone(&shutdown))?;
    }

    // channels
    let (tx_req, rx_req) = mpsc::channel::<IpcMsg>();
    let (tx_cmd, rx_cmd) = mpsc::channel::<Command>();
    let status = Arc::new(Mutex::new(SwipeStatus::default()));

    // gesture thread: sole owner of the controller
    let pipeline = {
        let status = status.clone();
        let shutdown = shutdown.clone();
        let geometry = store.profile.track;
        thread::spawn(move || {
            if let Err(e) = run_pipeline(geometry, status, rx_cmd, shutdown) {
                error!("gesture pipeline failed: {e}");
            }
        })
    };

    let _watcher = match watch_profiles(&store, tx_req.clone()) {
        Ok(w) => Some(w),
        Err(e) => {
            warn!("profile hot reload disabled: {e}");
            None
        }
    };

    // accept loop
    listener.set_nonblocking(true)?;
    while !shutdown.load(Ordering::Relaxed) {
        match listener.accept() {
            Ok((stream, _)) => {
                let ctx = ClientCtx {
                    store: store.clone(),
                    status: status.clone(),
                    tx: tx_req.clone(),
                    socket: sock.clone(),
                };
                thread::spawn(move || {
                    if let Err(e) = handle_client(stream, &ctx) {
                        error!("ipc client error: {e}");
                    }
                });
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                thread::sleep(Duration::from_millis(10));
            }
            Err(e) => warn!("accept failed: {e}"),
        }

        while let Ok(msg) = rx_req.try_recv() {
            match msg {
                IpcMsg::Reload => match store.reload() {
                    Ok(()) => {
                        forward(&tx_cmd, Command::Reconfigure(store.profile.track));
                        info!("profile reloaded");
                    }
                    Err(e) => error!("reload failed, keeping last good profile: {e}"),
                },
                IpcMsg::UseProfile(name) => match store.set_active(&name) {
                    Ok(()) => {
                        forward(&tx_cmd, Command::Reconfigure(store.profile.track));
                        info!("switched active profile to {}", store.active_name);
                    }
                    Err(e) => error!("use profile failed: {e}"),
                },
                IpcMsg::Reset { force } => forward(&tx_cmd, Command::Reset { force }),
                IpcMsg::Shutdown => shutdown.store(true, Ordering::Relaxed),
            }
        }
    }

    info!("daemon: shutting down");
    if pipeline.join().is_err() {
        error!("gesture pipeline panicked");
    }
    let _ = fs::remove_file(&sock);
    Ok(())
}

fn forward(tx: &Sender<Command>, cmd: Command) {
    if tx.send(cmd).is_err() {
        warn!("gesture pipeline is gone; dropped {cmd:?}");
    }
}

fn watch_profiles(store: &ProfileStore, tx: Sender<IpcMsg>) -> notify::Result<RecommendedWatcher> {
    let mut watcher =
        notify::recommended_watcher(move |res: notify::Result<notify::Event>| match res {
            Ok(event) if event.kind.is_modify() || event.kind.is_create() => {
                let touches_profile = event
                    .paths
                    .iter()
                    .any(|p| p.extension().is_some_and(|ext| ext == "toml"));
                if touches_profile {
                    let _ = tx.send(IpcMsg::Reload);
                }
            }
            Ok(_) => {}
            Err(e) => warn!("profile watch error: {e}"),
        })?;
    watcher.watch(&store.profiles_dir, RecursiveMode::NonRecursive)?;
    info!("watching {} for changes", store.profiles_dir.display());
    Ok(watcher)
}

fn handle_client(mut stream: UnixStream, ctx: &ClientCtx) -> Result<()> {
    stream.set_nonblocking(false)?;
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut line = String::new();
    reader.read_line(&mut line)?;
    if line.trim().is_empty() {
        return Ok(());
    }
    let req: serde_json::Value = serde_json::from_str(&line)?;
    let resp = respond(&req, ctx);
    writeln!(stream, "{resp}")?;
    Ok(())
}

fn respond(req: &serde_json::Value, ctx: &ClientCtx) -> serde_json::Value {
    let op = req.get("op").and_then(|v| v.as_str()).unwrap_or("");

    match op {
        "status" => {
            let status = ctx.status.lock().map(|s| *s).unwrap_or_default();
            let appearance = Appearance::new(&status, &ctx.store.profile);
            serde_json::json!({"ok": true, "data": {
                "active_profile": ctx.store.active_name,
                "socket": ctx.socket,
                "status": status,
                "readout": status.readout(),
                "appearance": appearance,
            }})
        }
        "reset" => {
            let force = req.get("force").and_then(|v| v.as_bool()).unwrap_or(false);
            let _ = ctx.tx.send(IpcMsg::Reset { force });
            // queued only; the pipeline refuses a plain reset mid-gesture
            serde_json::json!({"ok": true, "data": {"requested": true, "force": force}})
        }
        "reload" => {
            let _ = ctx.tx.send(IpcMsg::Reload);
            serde_json::json!({"ok": true, "data": {"active_profile": ctx.store.active_name}})
        }
        "use" => {
            let name = req.get("profile").and_then(|v| v.as_str()).unwrap_or("");
            if name.trim().is_empty() {
                return serde_json::json!({"ok": false, "error": "missing profile name"});
            }
            let _ = ctx.tx.send(IpcMsg::UseProfile(name.to_string()));
            serde_json::json!({"ok": true, "data": {"active_profile": name}})
        }
        "list" => {
            let list = ctx.store.list_profiles();
            serde_json::json!({"ok": true, "data": {"profiles": list, "active": ctx.store.active_name}})
        }
        "doctor" => serde_json::json!({"ok": true, "data": ctx.store.doctor_report()}),
        "shutdown" => {
            let _ = ctx.tx.send(IpcMsg::Shutdown);
            serde_json::json!({"ok": true, "data": "shutting down"})
        }
        _ => serde_json::json!({"ok": false, "error": format!("unknown op: {op}")}),
    }
}

struct ClientCtx {
    store: ProfileStore,
    status: Arc<Mutex<SwipeStatus>>,
    tx: Sender<IpcMsg>,
    socket: PathBuf,
}

#[derive(Debug, PartialEq)]
enum IpcMsg {
    Reload,
    UseProfile(String),
    Reset { force: bool },
    Shutdown,
}
