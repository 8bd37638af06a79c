use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::config::{self, Config};
use crate::error::{Error, RemoteCommandFailedDetails, Result};
use crate::resolver::{self, ConnectionTarget};
use crate::runner::{self, RemoteTask, RunnerOptions, TargetResult, TargetStatus};
use crate::ssh::{is_connection_error, SshClient};
use crate::utils::artifact;
use crate::utils::command::error_text;
use crate::utils::shell;
use crate::utils::template::{render_map, TemplateVars};

/// Options assembled by the CLI layer; config values already merged in.
#[derive(Debug, Clone)]
pub struct DeployOptions {
    /// Aliases or user@host[:port] specs overriding the configured hosts.
    pub hosts: Vec<String>,
    pub fail_fast: bool,
    pub timeout_secs: Option<u64>,
    pub max_parallel: usize,
    pub dry_run: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploySummary {
    pub total: u32,
    pub succeeded: u32,
    pub failed: u32,
    pub skipped: u32,
    pub timed_out: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployOutcome {
    pub artifacts: Vec<String>,
    pub planned: Vec<ConnectionTarget>,
    pub results: Vec<TargetResult>,
    pub summary: DeploySummary,
    pub dry_run: bool,
}

/// Main deploy entry point: plan targets, expand artifacts, fan out.
///
/// Fatal errors (missing config, unreadable ssh config, no artifact) abort
/// before any remote connection. Per-target failures are isolated into the
/// result list.
pub fn run(config: &Config, opts: &DeployOptions) -> Result<DeployOutcome> {
    // Artifact expansion comes first: with nothing to upload there is no
    // reason to touch any host.
    let artifacts = artifact::resolve_artifact_paths(&config.artifact)?;

    let planned = plan_targets(config, &opts.hosts)?;

    let targets: Vec<ConnectionTarget> = planned
        .iter()
        .filter_map(|p| match p {
            PlannedHost::Ready(t) => Some(t.clone()),
            PlannedHost::Unresolved { .. } => None,
        })
        .collect();

    if opts.dry_run {
        let results: Vec<TargetResult> = planned
            .iter()
            .filter_map(|p| match p {
                PlannedHost::Ready(_) => None,
                PlannedHost::Unresolved { alias, error } => Some(TargetResult {
                    alias: alias.clone(),
                    endpoint: None,
                    status: TargetStatus::Failed,
                    error: Some(error.to_string()),
                }),
            })
            .collect();

        let summary = summarize(&results, planned.len() as u32);
        return Ok(DeployOutcome {
            artifacts: display_paths(&artifacts),
            planned: targets,
            results,
            summary,
            dry_run: true,
        });
    }

    let task = UploadAndRun {
        artifacts: artifacts.clone(),
        remote_dir: config.remote_dir.clone(),
        install_template: config.install_command.clone(),
    };

    let runner_opts = RunnerOptions {
        max_parallel: opts.max_parallel,
        fail_fast: opts.fail_fast,
        timeout: opts.timeout_secs.map(Duration::from_secs),
    };

    let mut executed = runner::execute(&targets, Arc::new(task), &runner_opts).into_iter();

    // Re-interleave runner results with resolution failures so the final
    // report mirrors the input host order.
    let results: Vec<TargetResult> = planned
        .iter()
        .map(|p| match p {
            PlannedHost::Ready(_) => executed
                .next()
                .unwrap_or_else(|| unreachable_result_slot()),
            PlannedHost::Unresolved { alias, error } => TargetResult {
                alias: alias.clone(),
                endpoint: None,
                status: TargetStatus::Failed,
                error: Some(error.to_string()),
            },
        })
        .collect();

    let summary = summarize(&results, results.len() as u32);
    Ok(DeployOutcome {
        artifacts: display_paths(&artifacts),
        planned: targets,
        results,
        summary,
        dry_run: false,
    })
}

// The runner returns exactly one result per ready target; this exists only
// to avoid a panic path in release builds.
fn unreachable_result_slot() -> TargetResult {
    TargetResult {
        alias: String::new(),
        endpoint: None,
        status: TargetStatus::Failed,
        error: Some("Runner produced fewer results than targets".to_string()),
    }
}

fn display_paths(paths: &[PathBuf]) -> Vec<String> {
    paths.iter().map(|p| p.display().to_string()).collect()
}

pub fn summarize(results: &[TargetResult], total: u32) -> DeploySummary {
    let mut summary = DeploySummary {
        total,
        succeeded: 0,
        failed: 0,
        skipped: 0,
        timed_out: 0,
    };
    for result in results {
        match result.status {
            TargetStatus::Deployed => summary.succeeded += 1,
            TargetStatus::Failed => summary.failed += 1,
            TargetStatus::Skipped => summary.skipped += 1,
            TargetStatus::TimedOut => summary.timed_out += 1,
        }
    }
    summary
}

// =============================================================================
// Target Planning
// =============================================================================

#[derive(Debug)]
pub enum PlannedHost {
    Ready(ConnectionTarget),
    Unresolved { alias: String, error: Error },
}

/// Build the target list in input order. Explicit `user@host` specs bypass
/// the SSH config; aliases are resolved against it in one pass.
pub fn plan_targets(config: &Config, overrides: &[String]) -> Result<Vec<PlannedHost>> {
    let specs: &[String] = if overrides.is_empty() {
        &config.hosts
    } else {
        overrides
    };

    if specs.is_empty() {
        return Err(Error::validation_missing_argument(vec![
            "hosts (configure in deckhand.json or pass on the command line)".to_string(),
        ]));
    }

    let aliases: Vec<String> = specs
        .iter()
        .filter(|s| !s.contains('@'))
        .cloned()
        .collect();

    let mut resolved = if aliases.is_empty() {
        Vec::new()
    } else {
        let ssh_config = config::ssh_config_path(config)?;
        resolver::resolve(&aliases, &ssh_config)?
    }
    .into_iter();

    let mut planned = Vec::with_capacity(specs.len());
    for spec in specs {
        if spec.contains('@') {
            // A malformed explicit spec is the caller's mistake, not a
            // per-target runtime failure
            planned.push(PlannedHost::Ready(ConnectionTarget::parse_spec(spec)?));
        } else {
            let resolution = resolved.next().ok_or_else(|| {
                Error::internal_unexpected("Alias resolution lost an entry".to_string())
            })?;
            match resolution.outcome {
                Ok(target) => planned.push(PlannedHost::Ready(target)),
                Err(error) => planned.push(PlannedHost::Unresolved {
                    alias: resolution.alias,
                    error,
                }),
            }
        }
    }

    Ok(planned)
}

// =============================================================================
// Upload + Install Task
// =============================================================================

/// The per-target work: upload every artifact, then run the install command.
pub struct UploadAndRun {
    pub artifacts: Vec<PathBuf>,
    pub remote_dir: String,
    pub install_template: String,
}

impl UploadAndRun {
    /// Remote path for an uploaded artifact. Paths under "~" stay relative
    /// so the remote side resolves them against the login home (scp and the
    /// install shell agree on that).
    fn remote_artifact_path(&self, artifact: &Path) -> Result<String> {
        let file_name = artifact
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                Error::validation_invalid_argument(
                    "artifact",
                    "Artifact path must include a file name",
                    Some(artifact.display().to_string()),
                )
            })?;

        let dir = self.remote_dir.trim_end_matches('/');
        let dir = dir.strip_prefix("~/").unwrap_or(dir);

        if dir.is_empty() || dir == "~" {
            Ok(file_name.to_string())
        } else {
            Ok(format!("{}/{}", dir, file_name))
        }
    }

    /// Directory to mkdir before uploading, when one is needed.
    fn remote_mkdir_dir(&self) -> Option<String> {
        let dir = self.remote_dir.trim_end_matches('/');
        let dir = dir.strip_prefix("~/").unwrap_or(dir);
        if dir.is_empty() || dir == "~" {
            None
        } else {
            Some(dir.to_string())
        }
    }

    fn render_install_command(&self, remote_paths: &[String]) -> String {
        let quoted: Vec<String> = remote_paths.iter().map(|p| shell::quote_arg(p)).collect();

        let mut vars = HashMap::new();
        vars.insert(
            TemplateVars::ARTIFACT.to_string(),
            quoted.first().cloned().unwrap_or_default(),
        );
        vars.insert(TemplateVars::ARTIFACTS.to_string(), quoted.join(" "));
        vars.insert(
            TemplateVars::REMOTE_DIR.to_string(),
            self.remote_dir.clone(),
        );

        render_map(&self.install_template, &vars)
    }
}

impl RemoteTask for UploadAndRun {
    fn run(&self, target: &ConnectionTarget) -> Result<()> {
        let client = SshClient::from_target(target);

        if let Some(dir) = self.remote_mkdir_dir() {
            let mkdir_cmd = format!("mkdir -p {}", shell::quote_path(&dir));
            let output = client.execute(&mkdir_cmd);
            if !output.success {
                let detail = error_text(&output.stdout, &output.stderr);
                if is_connection_error(&output) {
                    return Err(Error::ssh_connect_failed(target.host.clone(), detail));
                }
                return Err(Error::remote_command_failed(RemoteCommandFailedDetails {
                    command: mkdir_cmd,
                    exit_code: output.exit_code,
                    stdout: output.stdout,
                    stderr: output.stderr,
                    host: target.host.clone(),
                }));
            }
        }

        let mut remote_paths = Vec::with_capacity(self.artifacts.len());
        for artifact in &self.artifacts {
            let remote_path = self.remote_artifact_path(artifact)?;
            let output = client.upload(artifact, &remote_path);
            if !output.success {
                let detail = error_text(&output.stdout, &output.stderr);
                if is_connection_error(&output) {
                    return Err(Error::ssh_connect_failed(target.host.clone(), detail));
                }
                return Err(Error::deploy_upload_failed(
                    target.host.clone(),
                    artifact.display().to_string(),
                    detail,
                ));
            }
            remote_paths.push(remote_path);
        }

        let install_cmd = self.render_install_command(&remote_paths);
        log_status!("deploy", "Installing on {}: {}", target.endpoint(), install_cmd);

        let output = client.execute(&install_cmd);
        if !output.success {
            if is_connection_error(&output) {
                return Err(Error::ssh_connect_failed(
                    target.host.clone(),
                    error_text(&output.stdout, &output.stderr),
                ));
            }
            return Err(Error::remote_command_failed(RemoteCommandFailedDetails {
                command: install_cmd,
                exit_code: output.exit_code,
                stdout: output.stdout,
                stderr: output.stderr,
                host: target.host.clone(),
            }));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BuildConfig;
    use crate::error::ErrorCode;
    use std::io::Write;
    use tempfile::TempDir;

    fn test_config(ssh_config: Option<String>, hosts: Vec<&str>) -> Config {
        Config {
            hosts: hosts.into_iter().map(|s| s.to_string()).collect(),
            artifact: "pkg_*all.deb".to_string(),
            remote_dir: "~".to_string(),
            install_command: "dpkg -i {{artifacts}}".to_string(),
            build: BuildConfig::default(),
            ssh_config,
            max_parallel: 4,
            timeout_secs: None,
            fail_fast: false,
        }
    }

    fn write_ssh_config(dir: &TempDir, content: &str) -> String {
        let path = dir.path().join("config");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        path.to_string_lossy().to_string()
    }

    #[test]
    fn plan_mixes_literals_and_aliases_in_input_order() {
        let dir = TempDir::new().unwrap();
        let ssh_config = write_ssh_config(&dir, "Host jenkins\n  HostName j.example.org\n  User ci\n");
        let config = test_config(Some(ssh_config), vec![]);

        let overrides = vec![
            "root@direct.example.org".to_string(),
            "jenkins".to_string(),
        ];
        let planned = plan_targets(&config, &overrides).unwrap();
        assert_eq!(planned.len(), 2);

        match &planned[0] {
            PlannedHost::Ready(t) => assert_eq!(t.endpoint(), "root@direct.example.org"),
            other => panic!("expected ready target, got {:?}", other),
        }
        match &planned[1] {
            PlannedHost::Ready(t) => assert_eq!(t.endpoint(), "ci@j.example.org"),
            other => panic!("expected ready target, got {:?}", other),
        }
    }

    #[test]
    fn plan_records_unresolved_alias_without_dropping_others() {
        let dir = TempDir::new().unwrap();
        let ssh_config = write_ssh_config(
            &dir,
            "Host host-a\n  HostName a.example.org\n  User user1\n",
        );
        let config = test_config(Some(ssh_config), vec!["host-a", "host-b"]);

        let planned = plan_targets(&config, &[]).unwrap();
        assert_eq!(planned.len(), 2);
        assert!(matches!(planned[0], PlannedHost::Ready(_)));
        match &planned[1] {
            PlannedHost::Unresolved { alias, error } => {
                assert_eq!(alias, "host-b");
                assert_eq!(error.code, ErrorCode::HostAliasNotFound);
            }
            other => panic!("expected unresolved alias, got {:?}", other),
        }
    }

    #[test]
    fn plan_with_no_hosts_anywhere_is_an_error() {
        let config = test_config(None, vec![]);
        let err = plan_targets(&config, &[]).unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationMissingArgument);
    }

    #[test]
    fn plan_with_unreadable_ssh_config_is_fatal() {
        let config = test_config(Some("/nonexistent/ssh_config".to_string()), vec!["jenkins"]);
        let err = plan_targets(&config, &[]).unwrap_err();
        assert_eq!(err.code, ErrorCode::SshConfigNotFound);
    }

    fn upload_task(remote_dir: &str) -> UploadAndRun {
        UploadAndRun {
            artifacts: vec![PathBuf::from("../pkg_1.0_all.deb")],
            remote_dir: remote_dir.to_string(),
            install_template: "dpkg -i {{artifacts}}".to_string(),
        }
    }

    #[test]
    fn home_remote_dir_uses_relative_paths() {
        let task = upload_task("~");
        let path = task
            .remote_artifact_path(Path::new("../pkg_1.0_all.deb"))
            .unwrap();
        assert_eq!(path, "pkg_1.0_all.deb");
        assert!(task.remote_mkdir_dir().is_none());
    }

    #[test]
    fn home_relative_remote_dir_strips_tilde() {
        let task = upload_task("~/incoming/");
        let path = task
            .remote_artifact_path(Path::new("pkg_1.0_all.deb"))
            .unwrap();
        assert_eq!(path, "incoming/pkg_1.0_all.deb");
        assert_eq!(task.remote_mkdir_dir().as_deref(), Some("incoming"));
    }

    #[test]
    fn absolute_remote_dir_is_joined() {
        let task = upload_task("/var/cache/packages");
        let path = task
            .remote_artifact_path(Path::new("pkg_1.0_all.deb"))
            .unwrap();
        assert_eq!(path, "/var/cache/packages/pkg_1.0_all.deb");
    }

    #[test]
    fn install_command_renders_all_artifacts_quoted() {
        let task = UploadAndRun {
            artifacts: vec![],
            remote_dir: "~".to_string(),
            install_template: "dpkg -i {{artifacts}}".to_string(),
        };
        let rendered =
            task.render_install_command(&["a_1.0_all.deb".to_string(), "b 2.deb".to_string()]);
        assert_eq!(rendered, "dpkg -i a_1.0_all.deb 'b 2.deb'");
    }

    #[test]
    fn install_command_first_artifact_placeholder() {
        let task = UploadAndRun {
            artifacts: vec![],
            remote_dir: "/opt".to_string(),
            install_template: "dpkg -i {{artifact}} && rm {{artifact}}".to_string(),
        };
        let rendered = task.render_install_command(&["/opt/pkg.deb".to_string()]);
        assert_eq!(rendered, "dpkg -i /opt/pkg.deb && rm /opt/pkg.deb");
    }

    #[test]
    fn summarize_counts_statuses() {
        let results = vec![
            TargetResult {
                alias: "a".to_string(),
                endpoint: Some("u@a".to_string()),
                status: TargetStatus::Deployed,
                error: None,
            },
            TargetResult {
                alias: "b".to_string(),
                endpoint: None,
                status: TargetStatus::Failed,
                error: Some("boom".to_string()),
            },
            TargetResult {
                alias: "c".to_string(),
                endpoint: Some("u@c".to_string()),
                status: TargetStatus::TimedOut,
                error: None,
            },
        ];
        let summary = summarize(&results, 3);
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.timed_out, 1);
        assert_eq!(summary.skipped, 0);
    }
}
