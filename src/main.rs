#![deny(unsafe_code)]
mod commands;
mod version;

use anyhow::Result;
use clap::builder::styling::{AnsiColor, Effects, Styles};
use clap::Parser;

/// Custom styles for CLI help output
const STYLES: Styles = Styles::styled()
    .header(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Cyan.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

use commands::command::Command;
use commands::sort::Sort;
use commands::stress::Stress;
use enum_dispatch::enum_dispatch;
use env_logger::Env;
use log::info;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser, Debug)]
#[command(styles = STYLES)]
struct Args {
    #[clap(subcommand)]
    subcommand: Subcommand,
}

#[enum_dispatch(Command)]
#[derive(Parser, Debug)]
#[command(version)]
enum Subcommand {
    #[command(display_order = 1)]
    Sort(Sort),
    #[command(display_order = 2)]
    Stress(Stress),
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    info!("copsort {}", version::VERSION);
    args.subcommand.execute()
}
