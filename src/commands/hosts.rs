use clap::Args;
use serde::Serialize;

use deckhand::config;
use deckhand::deploy::{self, PlannedHost};
use deckhand::resolver::ConnectionTarget;

use super::CmdResult;

#[derive(Args)]
pub struct HostsArgs {
    /// Host aliases or user@host[:port] specs (override configured hosts)
    pub hosts: Vec<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnresolvedHost {
    pub alias: String,
    pub error: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HostsOutput {
    pub command: String,
    pub ssh_config: String,
    pub targets: Vec<ConnectionTarget>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unresolved: Vec<UnresolvedHost>,
}

pub fn run(args: HostsArgs, global: &crate::commands::GlobalArgs) -> CmdResult<HostsOutput> {
    let (cfg, _path) = config::load(global.config.as_deref())?;
    let ssh_config = config::ssh_config_path(&cfg)?;

    let planned = deploy::plan_targets(&cfg, &args.hosts)?;

    let mut targets = Vec::new();
    let mut unresolved = Vec::new();
    for host in planned {
        match host {
            PlannedHost::Ready(target) => targets.push(target),
            PlannedHost::Unresolved { alias, error } => unresolved.push(UnresolvedHost {
                alias,
                error: error.to_string(),
            }),
        }
    }

    let exit_code = if unresolved.is_empty() { 0 } else { 1 };

    Ok((
        HostsOutput {
            command: "hosts.resolve".to_string(),
            ssh_config: ssh_config.display().to_string(),
            targets,
            unresolved,
        },
        exit_code,
    ))
}
