mod cmd;
mod config;
mod logging;

use anyhow::{Result, bail};
use clap::{Arg, ArgAction, Command};

fn cli() -> Command {
    Command::new("wiki")
        .about("Personal wiki utilities")
        .version(env!("CARGO_PKG_VERSION"))
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Increase log verbosity (-v debug, -vv trace)")
                .action(ArgAction::Count)
                .global(true),
        )
        .subcommand(cmd::render::make_subcommand())
}

// Errors surface as a non-zero exit status via the returned Result.
fn main() -> Result<()> {
    let matches = cli().get_matches();

    logging::init(matches.get_count("verbose"))?;

    match matches.subcommand() {
        Some(("render", args)) => cmd::render::execute(args),
        Some((name, _)) => bail!("Unknown command: {}", name),
        None => bail!("No command given"),
    }
}
