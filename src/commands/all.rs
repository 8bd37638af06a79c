use clap::Args;
use serde::Serialize;

use deckhand::build::{self, BuildOutput};
use deckhand::config;
use deckhand::deploy::{self, DeployOutcome};
use deckhand::Error;

use super::deploy::{build_options, exit_code_for, DeployArgs};
use super::CmdResult;

#[derive(Args)]
pub struct AllArgs {
    #[command(flatten)]
    pub deploy: DeployArgs,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AllOutput {
    pub command: String,
    pub build: BuildOutput,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deploy: Option<DeployOutcome>,
}

/// Build once, then deploy. A failed build aborts before any remote
/// connection is attempted.
pub fn run(args: AllArgs, global: &crate::commands::GlobalArgs) -> CmdResult<AllOutput> {
    let (cfg, _path) = config::load(global.config.as_deref())?;

    let build_output = if cfg.build.commands.is_empty() {
        // Nothing to build; deploy whatever the artifact glob matches
        BuildOutput {
            commands: Vec::new(),
            artifacts: Vec::new(),
            output: Default::default(),
            success: true,
            error: None,
        }
    } else {
        let (output, exit_code) = build::run(&cfg)?;
        if !output.success {
            let message = output
                .error
                .clone()
                .unwrap_or_else(|| "Build failed".to_string());
            return Err(Error::deploy_build_failed(
                output.commands.join(" && "),
                exit_code,
                message,
            ));
        }
        output
    };

    let opts = build_options(&args.deploy, &cfg);
    let outcome = deploy::run(&cfg, &opts)?;
    let exit_code = exit_code_for(&outcome);

    Ok((
        AllOutput {
            command: "all.run".to_string(),
            build: build_output,
            deploy: Some(outcome),
        },
        exit_code,
    ))
}
