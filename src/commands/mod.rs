pub type CmdResult<T> = deckhand::Result<(T, i32)>;

pub(crate) struct GlobalArgs {
    /// Explicit --config path, if given.
    pub config: Option<String>,
}

pub mod all;
pub mod build;
pub mod deploy;
pub mod hosts;

use crate::output;
use crate::Commands;

pub fn run_json(
    command: Commands,
    global: &GlobalArgs,
) -> (deckhand::Result<serde_json::Value>, i32) {
    match command {
        Commands::Build(args) => output::map_cmd_result_to_json(build::run(args, global)),
        Commands::Deploy(args) => output::map_cmd_result_to_json(deploy::run(args, global)),
        Commands::All(args) => output::map_cmd_result_to_json(all::run(args, global)),
        Commands::Hosts(args) => output::map_cmd_result_to_json(hosts::run(args, global)),
    }
}
