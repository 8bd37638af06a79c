use serde::Serialize;

use crate::config::Config;
use crate::error::Result;
use crate::ssh::execute_local_command_in_dir;
use crate::utils::artifact;
use crate::utils::command::{error_text, CapturedOutput};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildOutput {
    pub commands: Vec<String>,
    pub artifacts: Vec<String>,
    #[serde(flatten)]
    pub output: CapturedOutput,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Run the configured build commands in sequence.
///
/// Commands go through `sh -c` because package builds are shell scripts by
/// nature (fakeroot wrappers, env vars, &&-chains). The first failing
/// command aborts the run; no remote operation happens after a failed build.
pub fn run(config: &Config) -> Result<(BuildOutput, i32)> {
    let work_dir = config.build.work_dir.as_deref().unwrap_or(".");

    if config.build.clean_stale {
        for stale in artifact::existing_matches(&config.artifact) {
            match std::fs::remove_file(&stale) {
                Ok(()) => log_status!("build", "Removed stale artifact {}", stale.display()),
                Err(e) => log_status!(
                    "build",
                    "Warning: could not remove stale artifact {}: {}",
                    stale.display(),
                    e
                ),
            }
        }
    }

    let mut captured = CapturedOutput::default();

    for command in &config.build.commands {
        log_status!("build", "Running: {}", command);
        let output = execute_local_command_in_dir(command, Some(work_dir));
        captured.append(&output.stdout, &output.stderr);

        if !output.success {
            let message = format_build_error(
                command,
                work_dir,
                output.exit_code,
                &output.stderr,
                &output.stdout,
            );
            return Ok((
                BuildOutput {
                    commands: config.build.commands.clone(),
                    artifacts: Vec::new(),
                    output: captured,
                    success: false,
                    error: Some(message),
                },
                output.exit_code,
            ));
        }
    }

    // A build that produced nothing is as fatal as one that failed
    let artifacts = artifact::resolve_artifact_paths(&config.artifact)?
        .into_iter()
        .map(|p| p.display().to_string())
        .collect();

    Ok((
        BuildOutput {
            commands: config.build.commands.clone(),
            artifacts,
            output: captured,
            success: true,
            error: None,
        },
        0,
    ))
}

/// Format a build error message with context from stderr/stdout.
/// Only includes universal POSIX exit code hints - build tooling is
/// technology-agnostic here.
fn format_build_error(
    build_cmd: &str,
    working_dir: &str,
    exit_code: i32,
    stderr: &str,
    stdout: &str,
) -> String {
    let output_text = error_text(stdout, stderr);

    // Last 15 lines for context
    let tail: Vec<&str> = output_text.lines().rev().take(15).collect();
    let output_tail: String = tail.into_iter().rev().collect::<Vec<_>>().join("\n");

    let hint = match exit_code {
        127 => "\nHint: Command not found. Check that the build command and its dependencies are installed and in PATH.",
        126 => "\nHint: Permission denied. Check file permissions on the build script.",
        _ => "",
    };

    let mut msg = format!(
        "Build failed (exit code {}).\n  Command: {}\n  Working directory: {}",
        exit_code, build_cmd, working_dir
    );

    if !output_tail.is_empty() {
        msg.push_str("\n\n--- Build output (last 15 lines) ---\n");
        msg.push_str(&output_tail);
        msg.push_str("\n--- End of output ---");
    }

    if !hint.is_empty() {
        msg.push_str(hint);
    }

    msg
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BuildConfig;
    use std::fs::File;
    use tempfile::TempDir;

    fn test_config(dir: &TempDir, commands: Vec<&str>, clean_stale: bool) -> Config {
        Config {
            hosts: vec![],
            artifact: dir
                .path()
                .join("pkg_*all.deb")
                .to_string_lossy()
                .to_string(),
            remote_dir: "~".to_string(),
            install_command: "dpkg -i {{artifacts}}".to_string(),
            build: BuildConfig {
                commands: commands.into_iter().map(|s| s.to_string()).collect(),
                work_dir: Some(dir.path().to_string_lossy().to_string()),
                clean_stale,
            },
            ssh_config: None,
            max_parallel: 4,
            timeout_secs: None,
            fail_fast: false,
        }
    }

    #[test]
    fn successful_build_resolves_artifacts() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir, vec!["touch pkg_1.0_all.deb"], false);

        let (output, exit_code) = run(&config).unwrap();
        assert!(output.success);
        assert_eq!(exit_code, 0);
        assert_eq!(output.artifacts.len(), 1);
        assert!(output.artifacts[0].ends_with("pkg_1.0_all.deb"));
    }

    #[test]
    fn clean_stale_removes_previous_artifacts() {
        let dir = TempDir::new().unwrap();
        let stale = dir.path().join("pkg_0.9_all.deb");
        File::create(&stale).unwrap();

        let config = test_config(&dir, vec!["touch pkg_1.0_all.deb"], true);
        let (output, _) = run(&config).unwrap();

        assert!(!stale.exists());
        assert_eq!(output.artifacts.len(), 1);
    }

    #[test]
    fn failing_command_aborts_with_exit_code() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir, vec!["exit 2", "touch pkg_1.0_all.deb"], false);

        let (output, exit_code) = run(&config).unwrap();
        assert!(!output.success);
        assert_eq!(exit_code, 2);
        assert!(output.artifacts.is_empty());
        assert!(output.error.as_deref().unwrap().contains("exit code 2"));
    }

    #[test]
    fn build_with_no_artifact_is_fatal() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir, vec!["true"], false);

        let err = run(&config).unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::DeployArtifactMissing);
    }

    #[test]
    fn command_not_found_gets_path_hint() {
        let msg = format_build_error("no-such-tool", ".", 127, "sh: no-such-tool: not found", "");
        assert!(msg.contains("Command not found"));
        assert!(msg.contains("exit code 127"));
    }
}
