use clap::Args;
use serde::Serialize;

use deckhand::build::{self, BuildOutput};
use deckhand::config;

use super::CmdResult;

#[derive(Args)]
pub struct BuildArgs {}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildCmdOutput {
    pub command: String,
    #[serde(flatten)]
    pub build: BuildOutput,
}

pub fn run(_args: BuildArgs, global: &crate::commands::GlobalArgs) -> CmdResult<BuildCmdOutput> {
    let (cfg, _path) = config::load(global.config.as_deref())?;

    if cfg.build.commands.is_empty() {
        return Err(deckhand::Error::config_invalid_value(
            "build.commands",
            None,
            "No build commands configured",
        )
        .with_hint("Add build.commands to deckhand.json, e.g. [\"fakeroot debian/rules binary\"]"));
    }

    let (output, exit_code) = build::run(&cfg)?;

    Ok((
        BuildCmdOutput {
            command: "build.run".to_string(),
            build: output,
        },
        exit_code,
    ))
}
