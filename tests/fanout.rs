//! End-to-end resolver + runner exercise without a network: aliases are
//! resolved from a temporary SSH config, then fanned out against a scripted
//! task standing in for the upload+install work.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use deckhand::deploy::summarize;
use deckhand::error::{Error, ErrorCode};
use deckhand::resolver::{self, ConnectionTarget};
use deckhand::runner::{self, RemoteTask, RunnerOptions, TargetResult, TargetStatus};

use tempfile::TempDir;

fn write_ssh_config(dir: &TempDir, content: &str) -> PathBuf {
    let path = dir.path().join("config");
    let mut f = std::fs::File::create(&path).unwrap();
    f.write_all(content.as_bytes()).unwrap();
    path
}

struct RefuseHost {
    host: String,
}

impl RemoteTask for RefuseHost {
    fn run(&self, target: &ConnectionTarget) -> deckhand::Result<()> {
        if target.host == self.host {
            return Err(Error::ssh_connect_failed(
                target.host.clone(),
                "connection refused",
            ));
        }
        Ok(())
    }
}

#[test]
fn resolved_targets_fan_out_with_isolated_failures() {
    let dir = TempDir::new().unwrap();
    let ssh_config = write_ssh_config(
        &dir,
        "Host jenkins\n  HostName jenkins.example.org\n  User ci\n\n\
         Host jenkins-slave1\n  HostName slave1.example.org\n  User ci\n\n\
         Host jenkins-slave2\n  HostName slave2.example.org\n  User ci\n",
    );

    let aliases = vec![
        "jenkins".to_string(),
        "jenkins-slave1".to_string(),
        "jenkins-slave2".to_string(),
    ];
    let resolved = resolver::resolve(&aliases, &ssh_config).unwrap();
    assert_eq!(resolved.len(), 3);

    let targets: Vec<ConnectionTarget> = resolved
        .into_iter()
        .map(|r| r.outcome.unwrap())
        .collect();

    let task = RefuseHost {
        host: "slave1.example.org".to_string(),
    };
    let results = runner::execute(&targets, Arc::new(task), &RunnerOptions::default());

    assert_eq!(results.len(), 3);
    assert_eq!(results[0].status, TargetStatus::Deployed);
    assert_eq!(results[1].status, TargetStatus::Failed);
    assert_eq!(results[2].status, TargetStatus::Deployed);

    let summary = summarize(&results, 3);
    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.failed, 1);
}

#[test]
fn unmapped_alias_is_reported_but_does_not_block_the_run() {
    let dir = TempDir::new().unwrap();
    let ssh_config = write_ssh_config(
        &dir,
        "Host host-a\n  HostName a.example.org\n  User user1\n",
    );

    let aliases = vec!["host-a".to_string(), "host-b".to_string()];
    let resolved = resolver::resolve(&aliases, &ssh_config).unwrap();

    let mut targets = Vec::new();
    let mut failures: Vec<TargetResult> = Vec::new();
    for entry in resolved {
        match entry.outcome {
            Ok(target) => targets.push(target),
            Err(err) => {
                assert_eq!(err.code, ErrorCode::HostAliasNotFound);
                failures.push(TargetResult {
                    alias: entry.alias,
                    endpoint: None,
                    status: TargetStatus::Failed,
                    error: Some(err.to_string()),
                });
            }
        }
    }

    assert_eq!(targets.len(), 1);
    assert_eq!(targets[0].endpoint(), "user1@a.example.org");
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].alias, "host-b");

    // The run continues with the single resolved target
    let task = RefuseHost {
        host: "nowhere".to_string(),
    };
    let mut results = runner::execute(&targets, Arc::new(task), &RunnerOptions::default());
    results.extend(failures);

    let summary = summarize(&results, 2);
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.failed, 1);
}
