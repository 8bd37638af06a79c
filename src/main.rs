use clap::{Parser, Subcommand};

use commands::GlobalArgs;

mod commands;
mod output;

use commands::{all, build, deploy, hosts};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "deckhand")]
#[command(version = VERSION)]
#[command(about = "Build a package locally and install it across remote build hosts over SSH")]
struct Cli {
    /// Path to deckhand.json (defaults to ./deckhand.json, then ~/.config/deckhand/deckhand.json)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the configured local build commands
    Build(build::BuildArgs),
    /// Upload the built artifact and install it on each target host
    Deploy(deploy::DeployArgs),
    /// Build, then deploy
    All(all::AllArgs),
    /// Show resolved connection targets for the configured hosts
    Hosts(hosts::HostsArgs),
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    let global = GlobalArgs {
        config: cli.config.clone(),
    };

    let (json_result, exit_code) = commands::run_json(cli.command, &global);
    output::print_json_result(json_result);

    std::process::ExitCode::from(exit_code_to_u8(exit_code))
}

fn exit_code_to_u8(code: i32) -> u8 {
    if code <= 0 {
        0
    } else if code >= 255 {
        255
    } else {
        code as u8
    }
}
