//! Host alias resolution against the OpenSSH client configuration.
//!
//! Aliases resolve with OpenSSH semantics: `Host` blocks are scanned in file
//! order and the first obtained value wins for each option. Missing options
//! fall back to defaults (invoking user, alias as hostname, port 22).

use std::env;
use std::fs;
use std::path::Path;

use serde::Serialize;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionTarget {
    pub alias: String,
    pub user: String,
    pub host: String,
    pub port: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity_file: Option<String>,
}

impl ConnectionTarget {
    /// `user@host` form used for ssh/scp invocation and reporting.
    pub fn endpoint(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }

    /// Parse a literal `user@host[:port]` spec, bypassing config lookup.
    pub fn parse_spec(spec: &str) -> Result<Self> {
        let (user, rest) = spec.split_once('@').ok_or_else(|| {
            Error::validation_invalid_argument(
                "host",
                "Explicit host spec must be user@host[:port]",
                Some(spec.to_string()),
            )
        })?;

        let (host, port) = match rest.rsplit_once(':') {
            Some((h, p)) => {
                let port: u16 = p.parse().map_err(|_| {
                    Error::validation_invalid_argument(
                        "host",
                        format!("Invalid port '{}'", p),
                        Some(spec.to_string()),
                    )
                })?;
                (h, port)
            }
            None => (rest, 22),
        };

        if user.is_empty() || host.is_empty() {
            return Err(Error::validation_invalid_argument(
                "host",
                "Explicit host spec must be user@host[:port]",
                Some(spec.to_string()),
            ));
        }

        Ok(Self {
            alias: spec.to_string(),
            user: user.to_string(),
            host: host.to_string(),
            port,
            identity_file: None,
        })
    }
}

/// Per-alias resolution outcome. Order mirrors the input alias order.
#[derive(Debug)]
pub struct ResolvedHost {
    pub alias: String,
    pub outcome: Result<ConnectionTarget>,
}

/// Resolve aliases against the SSH client config at `config_path`.
///
/// An unreadable config file is fatal; an alias with no matching `Host`
/// block (not even a wildcard) yields a per-alias error without affecting
/// the other aliases.
pub fn resolve(aliases: &[String], config_path: &Path) -> Result<Vec<ResolvedHost>> {
    let content = fs::read_to_string(config_path).map_err(|e| {
        Error::ssh_config_not_found(config_path.display().to_string(), e.to_string())
    })?;

    let blocks = parse_blocks(&content)?;
    let user_default = current_user();

    Ok(aliases
        .iter()
        .map(|alias| ResolvedHost {
            alias: alias.clone(),
            outcome: lookup(&blocks, alias, &user_default, config_path),
        })
        .collect())
}

fn current_user() -> String {
    env::var("USER")
        .or_else(|_| env::var("LOGNAME"))
        .unwrap_or_else(|_| "root".to_string())
}

#[derive(Debug, Default)]
struct HostBlock {
    patterns: Vec<String>,
    user: Option<String>,
    hostname: Option<String>,
    port: Option<u16>,
    identity_file: Option<String>,
}

impl HostBlock {
    /// A block applies when any positive pattern matches and no negated
    /// pattern matches (OpenSSH `!pattern` form).
    fn matches(&self, alias: &str) -> bool {
        let mut matched = false;
        for pattern in &self.patterns {
            if let Some(negated) = pattern.strip_prefix('!') {
                if glob_match::glob_match(negated, alias) {
                    return false;
                }
            } else if glob_match::glob_match(pattern, alias) {
                matched = true;
            }
        }
        matched
    }
}

fn parse_blocks(content: &str) -> Result<Vec<HostBlock>> {
    let mut blocks = Vec::new();
    let mut current: Option<HostBlock> = None;

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((keyword, value)) = split_keyword(line) else {
            continue;
        };
        let value = value.trim_matches('"');

        if keyword.eq_ignore_ascii_case("host") {
            if let Some(block) = current.take() {
                blocks.push(block);
            }
            current = Some(HostBlock {
                patterns: value.split_whitespace().map(|p| p.to_string()).collect(),
                ..Default::default()
            });
            continue;
        }

        // Options before the first Host line apply to nothing we care about
        let Some(block) = current.as_mut() else {
            continue;
        };

        if keyword.eq_ignore_ascii_case("hostname") {
            block.hostname.get_or_insert_with(|| value.to_string());
        } else if keyword.eq_ignore_ascii_case("user") {
            block.user.get_or_insert_with(|| value.to_string());
        } else if keyword.eq_ignore_ascii_case("port") {
            let port: u16 = value.parse().map_err(|_| {
                Error::config_invalid_value(
                    "Port",
                    Some(value.to_string()),
                    "Port must be an integer between 1 and 65535",
                )
            })?;
            block.port.get_or_insert(port);
        } else if keyword.eq_ignore_ascii_case("identityfile") {
            block
                .identity_file
                .get_or_insert_with(|| shellexpand::tilde(value).to_string());
        }
        // All other keywords (ProxyJump, ForwardAgent, ...) are irrelevant here
    }

    if let Some(block) = current.take() {
        blocks.push(block);
    }

    Ok(blocks)
}

/// Split `Keyword value` or `Keyword=value` into its parts. The separator
/// is whichever of whitespace or `=` comes first, so values may contain `=`.
fn split_keyword(line: &str) -> Option<(&str, &str)> {
    let idx = line.find(|c: char| c.is_whitespace() || c == '=')?;
    let (keyword, rest) = line.split_at(idx);
    let value = rest.trim_start_matches(|c: char| c.is_whitespace() || c == '=');
    Some((keyword.trim(), value.trim()))
}

fn lookup(
    blocks: &[HostBlock],
    alias: &str,
    user_default: &str,
    config_path: &Path,
) -> Result<ConnectionTarget> {
    let mut user: Option<&str> = None;
    let mut hostname: Option<&str> = None;
    let mut port: Option<u16> = None;
    let mut identity_file: Option<&str> = None;
    let mut matched = false;

    for block in blocks {
        if !block.matches(alias) {
            continue;
        }
        matched = true;
        // First obtained value wins, as in ssh_config(5)
        if user.is_none() {
            user = block.user.as_deref();
        }
        if hostname.is_none() {
            hostname = block.hostname.as_deref();
        }
        if port.is_none() {
            port = block.port;
        }
        if identity_file.is_none() {
            identity_file = block.identity_file.as_deref();
        }
    }

    if !matched {
        return Err(Error::host_alias_not_found(
            alias,
            config_path.display().to_string(),
        ));
    }

    Ok(ConnectionTarget {
        alias: alias.to_string(),
        user: user.unwrap_or(user_default).to_string(),
        host: hostname.unwrap_or(alias).to_string(),
        port: port.unwrap_or(22),
        identity_file: identity_file.map(|f| f.to_string()),
    })
}
