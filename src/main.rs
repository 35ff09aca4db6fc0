use clap::Parser;
use log::{debug, info};
use std::error::Error;
use std::io::{self, IsTerminal};
use std::process;

use xish::cli::Cli;
use xish::shell::Shell;
use xish::utils::config::Config;
use xish::utils::log::init_logger;

fn main() {
    let cli = Cli::parse();
    let mut config = Config::new();
    config.verbosity = config.verbosity.saturating_add(cli.verbose);
    init_logger(&config);

    if let Err(e) = run(&cli, &config) {
        eprintln!("{}: {}", config.name, e);
        process::exit(1);
    }
}

fn run(cli: &Cli, config: &Config) -> Result<(), Box<dyn Error>> {
    info!("SHELL PID {}", process::id());

    let mut shell = Shell::new(config);
    if !cli.scripts.is_empty() {
        for script in &cli.scripts {
            debug!("执行脚本: {}", script.display());
            shell.run_script_file(script)?;
            if shell.exit_requested() {
                break;
            }
        }
    } else if io::stdin().is_terminal() {
        shell.run_interactive()?;
    } else {
        shell.run_script("<stdin>", io::stdin().lock())?;
    }

    debug!("退出 xish...");
    Ok(())
}
