use anyhow::{Context, Result, anyhow};
use pico_args::Arguments;
use std::{
    env, fs,
    path::{Path, PathBuf},
    process::Command,
};

use crate::config::ProfileStore;
use crate::ipc;
use crate::script::Script;

pub fn run() -> Result<()> {
    let mut pargs = Arguments::from_env();

    // Hidden daemon mode (spawned by `start`)
    if pargs.contains("--daemon") {
        return ipc::run_daemon();
    }

    // No args -> general help
    if env::args().len() == 1 {
        print_help();
        return Ok(());
    }

    if pargs.contains("-h") || pargs.contains("--help") {
        print_help();
        return Ok(());
    }

    // First free arg is the subcommand
    let subcmd: Option<String> = pargs.free_from_str().ok();

    match subcmd.as_deref() {
        Some("help") => {
            let topic: Option<String> = pargs.free_from_str().ok();
            if let Some(t) = topic {
                print_subcmd_help(&t);
            } else {
                print_help();
            }
            Ok(())
        }

        Some("start") => {
            let exe = env::current_exe()?;
            let child = Command::new(exe).arg("--daemon").spawn()?;
            println!("swipectl: started daemon (pid={})", child.id());
            Ok(())
        }

        Some("stop") => request(serde_json::json!({"op":"shutdown"})),
        Some("status") => request(serde_json::json!({"op":"status"})),
        Some("reload") => request(serde_json::json!({"op":"reload"})),
        Some("list") => request(serde_json::json!({"op":"list"})),
        Some("doctor") => request(serde_json::json!({"op":"doctor"})),

        Some("reset") => {
            let force = pargs.contains("--force");
            request(serde_json::json!({"op":"reset","force":force}))
        }

        Some("use") => {
            let name: String = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: swipectl use <profile_name>"))?;
            request(serde_json::json!({"op":"use","profile":name}))
        }

        Some("replay") => {
            let json = pargs.contains("--json");
            let profile_name: Option<String> = pargs.opt_value_from_str("--profile")?;
            let path: PathBuf = pargs.free_from_str().map_err(|_| {
                anyhow!("usage: swipectl replay <script.toml> [--profile <name>] [--json]")
            })?;
            replay(&path, profile_name.as_deref(), json)
        }

        Some(other) => {
            eprintln!("unknown subcommand: {other}\n");
            print_help();
            Ok(())
        }

        None => {
            print_help();
            Ok(())
        }
    }
}

fn request(req: serde_json::Value) -> Result<()> {
    let r = ipc::client_request(req)?;
    print_response(&r);
    Ok(())
}

fn replay(path: &Path, profile_name: Option<&str>, json: bool) -> Result<()> {
    let store = ProfileStore::load_or_install_default()?;
    let profile = match profile_name {
        Some(name) => store.load_named(name)?,
        None => store.profile.clone(),
    };

    let text =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let script = Script::from_toml_str(&text)?;
    let reports = script.replay(profile.track)?;

    for r in &reports {
        if json {
            println!("{}", serde_json::to_string(r)?);
            continue;
        }
        let note = if r.applied { "" } else { " (refused)" };
        println!("[{}] {}{}", r.index, r.step, note);
        for line in r.status.readout() {
            println!("    {line}");
        }
    }
    Ok(())
}

fn print_help() {
    println!(
        r#"swipectl — swipe slider gesture daemon

USAGE:
  swipectl help [command]                 Show general or command-specific help
  swipectl start                          Start the daemon
  swipectl stop                           Stop the daemon
  swipectl status                         Show slider state and active profile
  swipectl reset [--force]                Return the slider to rest
  swipectl reload                         Reload active profile
  swipectl use <name>                     Switch active profile
  swipectl list                           List profiles
  swipectl doctor                         Diagnose permissions/devices
  swipectl replay <script.toml>           Play a gesture script offline
          [--profile <name>] [--json]

TIPS:
  - Profiles: ~/.config/swipectl/profiles
  - Active profile pointer: ~/.config/swipectl/active
  - Log level: RUST_LOG=swipectl=debug
"#
    );
}

fn print_subcmd_help(cmd: &str) {
    match cmd {
        "start" => println!("usage: swipectl start\nStarts the background daemon."),
        "stop" => println!("usage: swipectl stop\nStops the running daemon."),
        "status" => println!(
            "usage: swipectl status\nShows swipe status, hold state, slider value, threshold side and active profile."
        ),
        "reset" => println!(
            "usage: swipectl reset [--force]\nReturns the slider to rest. Refused mid-gesture unless --force."
        ),
        "reload" => println!(
            "usage: swipectl reload\nReloads the current profile; keeps last good on error."
        ),
        "use" => {
            println!("usage: swipectl use <name>\nSwitches active profile to <name> and reloads.")
        }
        "list" => println!("usage: swipectl list\nLists available profiles."),
        "doctor" => println!(
            "usage: swipectl doctor\nChecks permissions and lists detected touch devices."
        ),
        "replay" => println!(
            "usage: swipectl replay <script.toml> [--profile <name>] [--json]\nRuns down/move/up/cancel/configure/reset steps and prints the state after each."
        ),
        _ => {
            eprintln!("unknown command: {cmd}\n");
            print_help();
        }
    }
}

fn print_response(v: &serde_json::Value) {
    println!("{}", serde_json::to_string_pretty(v).unwrap_or_default());
}
