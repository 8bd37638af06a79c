use clap::Args;
use serde::Serialize;

use deckhand::config::{self, Config};
use deckhand::deploy::{self, DeployOptions, DeployOutcome};

use super::CmdResult;

#[derive(Args)]
pub struct DeployArgs {
    /// Host aliases or user@host[:port] specs (override configured hosts)
    pub hosts: Vec<String>,

    /// Host to target (can be repeated, alternative to positional)
    #[arg(short = 'H', long = "host")]
    pub host_flags: Vec<String>,

    /// Abort remaining targets after the first failure
    #[arg(long)]
    pub fail_fast: bool,

    /// Overall deadline in seconds; unfinished targets are reported as timed out
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Maximum number of targets deployed concurrently
    #[arg(long, value_name = "N")]
    pub max_parallel: Option<usize>,

    /// Show planned targets and artifacts without connecting
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployCmdOutput {
    pub command: String,
    #[serde(flatten)]
    pub outcome: DeployOutcome,
}

/// Merge CLI flags over config values into concrete runner options.
pub fn build_options(args: &DeployArgs, cfg: &Config) -> DeployOptions {
    let mut hosts = args.hosts.clone();
    hosts.extend(args.host_flags.iter().cloned());

    DeployOptions {
        hosts,
        fail_fast: args.fail_fast || cfg.fail_fast,
        timeout_secs: args.timeout.or(cfg.timeout_secs),
        max_parallel: args.max_parallel.unwrap_or(cfg.max_parallel).max(1),
        dry_run: args.dry_run,
    }
}

pub fn exit_code_for(outcome: &DeployOutcome) -> i32 {
    let summary = &outcome.summary;
    if summary.failed > 0 || summary.timed_out > 0 || summary.skipped > 0 {
        1
    } else {
        0
    }
}

pub fn run(args: DeployArgs, global: &crate::commands::GlobalArgs) -> CmdResult<DeployCmdOutput> {
    let (cfg, _path) = config::load(global.config.as_deref())?;
    let opts = build_options(&args, &cfg);

    let outcome = deploy::run(&cfg, &opts)?;
    let exit_code = exit_code_for(&outcome);

    Ok((
        DeployCmdOutput {
            command: "deploy.run".to_string(),
            outcome,
        },
        exit_code,
    ))
}
