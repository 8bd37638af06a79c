//! Bounded parallel fan-out of one task across independent targets.
//!
//! Each target is processed by exactly one worker; a target failure is
//! recorded and never aborts the others unless fail-fast is enabled. Results
//! are collected over a channel and slotted back into input order.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::error::{Error, Result};
use crate::resolver::ConnectionTarget;

/// A task executed once per target. Implementations must be safe to call
/// from multiple worker threads at once.
pub trait RemoteTask: Send + Sync {
    fn run(&self, target: &ConnectionTarget) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct RunnerOptions {
    pub max_parallel: usize,
    pub fail_fast: bool,
    pub timeout: Option<Duration>,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            max_parallel: 4,
            fail_fast: false,
            timeout: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetStatus {
    Deployed,
    Failed,
    Skipped,
    TimedOut,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetResult {
    pub alias: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    pub status: TargetStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TargetResult {
    pub fn succeeded(&self) -> bool {
        matches!(self.status, TargetStatus::Deployed)
    }

    fn from_target(target: &ConnectionTarget, status: TargetStatus, error: Option<String>) -> Self {
        Self {
            alias: target.alias.clone(),
            endpoint: Some(target.endpoint()),
            status,
            error,
        }
    }
}

/// Run `task` against every target with bounded fan-out.
///
/// The returned vector has one entry per input target, in input order. When
/// the overall timeout passes, unfinished targets are reported as timed out
/// and their workers abandoned; finished targets keep their real outcome.
pub fn execute(
    targets: &[ConnectionTarget],
    task: Arc<dyn RemoteTask>,
    opts: &RunnerOptions,
) -> Vec<TargetResult> {
    if targets.is_empty() {
        return Vec::new();
    }

    let total = targets.len();
    let queue: Arc<Mutex<VecDeque<(usize, ConnectionTarget)>>> = Arc::new(Mutex::new(
        targets.iter().cloned().enumerate().collect(),
    ));
    let cancelled = Arc::new(AtomicBool::new(false));
    let (tx, rx) = mpsc::channel::<(usize, TargetResult)>();

    let workers = opts.max_parallel.max(1).min(total);
    let mut handles = Vec::with_capacity(workers);

    for _ in 0..workers {
        let queue = Arc::clone(&queue);
        let cancelled = Arc::clone(&cancelled);
        let task = Arc::clone(&task);
        let tx = tx.clone();
        let fail_fast = opts.fail_fast;

        handles.push(thread::spawn(move || loop {
            let next = match queue.lock() {
                Ok(mut q) => q.pop_front(),
                Err(_) => break,
            };
            let Some((idx, target)) = next else {
                break;
            };

            if cancelled.load(Ordering::SeqCst) {
                let result = TargetResult::from_target(&target, TargetStatus::Skipped, None);
                if tx.send((idx, result)).is_err() {
                    break;
                }
                continue;
            }

            let result = match task.run(&target) {
                Ok(()) => TargetResult::from_target(&target, TargetStatus::Deployed, None),
                Err(err) => {
                    if fail_fast {
                        cancelled.store(true, Ordering::SeqCst);
                    }
                    TargetResult::from_target(
                        &target,
                        TargetStatus::Failed,
                        Some(err.to_string()),
                    )
                }
            };

            if tx.send((idx, result)).is_err() {
                break;
            }
        }));
    }
    drop(tx);

    let deadline = opts.timeout.map(|t| Instant::now() + t);
    let mut slots: Vec<Option<TargetResult>> = vec![None; total];
    let mut received = 0usize;
    let mut timed_out = false;

    while received < total {
        let message = match deadline {
            Some(d) => {
                let now = Instant::now();
                if now >= d {
                    timed_out = true;
                    break;
                }
                match rx.recv_timeout(d - now) {
                    Ok(m) => m,
                    Err(RecvTimeoutError::Timeout) => {
                        timed_out = true;
                        break;
                    }
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            None => match rx.recv() {
                Ok(m) => m,
                Err(_) => break,
            },
        };

        slots[message.0] = Some(message.1);
        received += 1;
    }

    if !timed_out {
        for handle in handles {
            let _ = handle.join();
        }
    }
    // On timeout the workers are left to finish in the background; their
    // results are discarded.

    let timeout_secs = opts.timeout.map(|t| t.as_secs()).unwrap_or(0);
    slots
        .into_iter()
        .enumerate()
        .map(|(idx, slot)| {
            slot.unwrap_or_else(|| {
                TargetResult::from_target(
                    &targets[idx],
                    TargetStatus::TimedOut,
                    Some(Error::remote_command_timeout(timeout_secs).to_string()),
                )
            })
        })
        .collect()
}
