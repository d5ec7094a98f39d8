mod cli;
mod config;
mod gestures;
mod input;
mod ipc;
mod logging;
mod script;
mod tracker;
mod view;

fn main() -> anyhow::Result<()> {
    logging::init();
    cli::run()
}
