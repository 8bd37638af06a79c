use std::path::Path;
use std::process::Command;

use crate::resolver::ConnectionTarget;
use crate::utils::shell;

/// Thin wrapper around the system `ssh`/`scp` binaries for one target.
///
/// Transport and authentication are the ssh client's problem; this type only
/// assembles arguments and captures output. Connections are opened per
/// operation and never shared between targets.
pub struct SshClient {
    pub host: String,
    pub user: String,
    pub port: u16,
    pub identity_file: Option<String>,
}

pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
    pub exit_code: i32,
}

impl SshClient {
    pub fn from_target(target: &ConnectionTarget) -> Self {
        Self {
            host: target.host.clone(),
            user: target.user.clone(),
            port: target.port,
            identity_file: target.identity_file.clone(),
        }
    }

    fn build_ssh_args(&self, command: &str) -> Vec<String> {
        let mut args = Vec::new();

        if let Some(identity_file) = &self.identity_file {
            args.push("-i".to_string());
            args.push(identity_file.clone());
        }

        if self.port != 22 {
            args.push("-p".to_string());
            args.push(self.port.to_string());
        }

        // Batch mode plus timeout and keepalive options to prevent hangs on
        // stalled connections or unexpected prompts.
        args.extend([
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            "ConnectTimeout=10".to_string(),
            "-o".to_string(),
            "ServerAliveInterval=15".to_string(),
            "-o".to_string(),
            "ServerAliveCountMax=3".to_string(),
        ]);

        args.push(format!("{}@{}", self.user, self.host));
        args.push(command.to_string());

        args
    }

    pub fn execute(&self, command: &str) -> CommandOutput {
        let args = self.build_ssh_args(command);

        let output = Command::new("ssh").args(&args).output();

        match output {
            Ok(out) => CommandOutput {
                stdout: String::from_utf8_lossy(&out.stdout).to_string(),
                stderr: String::from_utf8_lossy(&out.stderr).to_string(),
                success: out.status.success(),
                exit_code: out.status.code().unwrap_or(-1),
            },
            Err(e) => CommandOutput {
                stdout: String::new(),
                stderr: format!("SSH error: {}", e),
                success: false,
                exit_code: -1,
            },
        }
    }

    /// Upload a single local file via scp. `remote_path` is interpreted by
    /// the remote side; relative paths land in the login home.
    pub fn upload(&self, local_path: &Path, remote_path: &str) -> CommandOutput {
        let mut scp_args: Vec<String> = Vec::new();

        if let Some(identity_file) = &self.identity_file {
            scp_args.extend(["-i".to_string(), identity_file.clone()]);
        }

        if self.port != 22 {
            scp_args.extend(["-P".to_string(), self.port.to_string()]);
        }

        scp_args.extend([
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            "ConnectTimeout=10".to_string(),
        ]);

        scp_args.push(local_path.to_string_lossy().to_string());
        scp_args.push(format!(
            "{}@{}:{}",
            self.user,
            self.host,
            shell::quote_path(remote_path)
        ));

        log_status!(
            "deploy",
            "Uploading {} -> {}@{}:{}",
            local_path.display(),
            self.user,
            self.host,
            remote_path
        );

        let output = Command::new("scp").args(&scp_args).output();
        match output {
            Ok(out) => CommandOutput {
                stdout: String::from_utf8_lossy(&out.stdout).to_string(),
                stderr: String::from_utf8_lossy(&out.stderr).to_string(),
                success: out.status.success(),
                exit_code: out.status.code().unwrap_or(-1),
            },
            Err(e) => CommandOutput {
                stdout: String::new(),
                stderr: format!("SCP error: {}", e),
                success: false,
                exit_code: -1,
            },
        }
    }
}

pub fn execute_local_command(command: &str) -> CommandOutput {
    execute_local_command_in_dir(command, None)
}

pub fn execute_local_command_in_dir(command: &str, current_dir: Option<&str>) -> CommandOutput {
    #[cfg(windows)]
    let mut cmd = {
        let mut cmd = Command::new("cmd");
        cmd.args(["/C", command]);
        cmd
    };

    #[cfg(not(windows))]
    let mut cmd = {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", command]);
        cmd
    };

    if let Some(dir) = current_dir {
        cmd.current_dir(dir);
    }

    match cmd.output() {
        Ok(out) => CommandOutput {
            stdout: String::from_utf8_lossy(&out.stdout).to_string(),
            stderr: String::from_utf8_lossy(&out.stderr).to_string(),
            success: out.status.success(),
            exit_code: out.status.code().unwrap_or(-1),
        },
        Err(e) => CommandOutput {
            stdout: String::new(),
            stderr: format!("Command error: {}", e),
            success: false,
            exit_code: -1,
        },
    }
}

/// Check if an SSH failure was a connection-level error rather than a
/// remote command failure.
pub fn is_connection_error(output: &CommandOutput) -> bool {
    // SSH exit code 255 = connection error (not a remote command failure)
    if output.exit_code == 255 {
        return true;
    }

    let stderr = output.stderr.to_lowercase();
    let connection_patterns = [
        "connection refused",
        "connection reset",
        "connection timed out",
        "no route to host",
        "network is unreachable",
        "temporary failure in name resolution",
        "could not resolve hostname",
        "ssh_exchange_identification",
        "connection closed by remote host",
    ];

    connection_patterns.iter().any(|p| stderr.contains(p))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(port: u16, identity_file: Option<&str>) -> ConnectionTarget {
        ConnectionTarget {
            alias: "jenkins".to_string(),
            user: "deploy".to_string(),
            host: "jenkins.example.org".to_string(),
            port,
            identity_file: identity_file.map(|s| s.to_string()),
        }
    }

    #[test]
    fn ssh_args_include_batch_mode_and_endpoint() {
        let client = SshClient::from_target(&target(22, None));
        let args = client.build_ssh_args("uptime");
        assert!(args.contains(&"BatchMode=yes".to_string()));
        assert!(args.contains(&"deploy@jenkins.example.org".to_string()));
        assert_eq!(args.last().unwrap(), "uptime");
        // default port is not passed explicitly
        assert!(!args.contains(&"-p".to_string()));
    }

    #[test]
    fn ssh_args_carry_port_and_identity() {
        let client = SshClient::from_target(&target(2222, Some("/keys/id_ed25519")));
        let args = client.build_ssh_args("true");
        let port_pos = args.iter().position(|a| a == "-p").unwrap();
        assert_eq!(args[port_pos + 1], "2222");
        let id_pos = args.iter().position(|a| a == "-i").unwrap();
        assert_eq!(args[id_pos + 1], "/keys/id_ed25519");
    }

    #[test]
    fn local_command_captures_output() {
        let out = execute_local_command("echo hello");
        assert!(out.success);
        assert_eq!(out.stdout.trim(), "hello");
    }

    #[test]
    fn local_command_reports_exit_code() {
        let out = execute_local_command("exit 3");
        assert!(!out.success);
        assert_eq!(out.exit_code, 3);
    }

    #[test]
    fn exit_255_is_connection_error() {
        let out = CommandOutput {
            stdout: String::new(),
            stderr: String::new(),
            success: false,
            exit_code: 255,
        };
        assert!(is_connection_error(&out));
    }

    #[test]
    fn remote_command_failure_is_not_connection_error() {
        let out = CommandOutput {
            stdout: String::new(),
            stderr: "dpkg: error processing package".to_string(),
            success: false,
            exit_code: 1,
        };
        assert!(!is_connection_error(&out));
    }

    #[test]
    fn connection_refused_pattern_is_detected() {
        let out = CommandOutput {
            stdout: String::new(),
            stderr: "ssh: connect to host x port 22: Connection refused".to_string(),
            success: false,
            exit_code: 1,
        };
        assert!(is_connection_error(&out));
    }
}
