//! Exporter configuration: environment variables layered over an optional
//! TOML file.
//!
//! Environment values always win over file values. The API credential is
//! only ever read from the environment.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const ENV_POLL_INTERVAL: &str = "API_POLL_INTERVAL_SECONDS";
pub const ENV_CREDENTIAL: &str = "API_CREDENTIAL";
pub const ENV_REQUEST_TIMEOUT: &str = "API_REQUEST_TIMEOUT_SECONDS";
pub const ENV_BASE_URL: &str = "INSIGHTS_BASE_URL";
pub const ENV_VCS: &str = "INSIGHTS_VCS";
pub const ENV_ORG: &str = "INSIGHTS_ORG";
pub const ENV_REPO: &str = "INSIGHTS_REPO";
pub const ENV_BRANCH: &str = "INSIGHTS_BRANCH";
pub const ENV_REPORTING_WINDOW: &str = "INSIGHTS_REPORTING_WINDOW";

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(300);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_BASE_URL: &str = "https://circleci.com/api/v2";
pub const DEFAULT_BRANCH: &str = "main";

/// Version control provider segment of the project slug.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Vcs {
    #[default]
    GitHub,
    Bitbucket,
    CircleCi,
}

impl Vcs {
    const ALL: [Vcs; 3] = [Vcs::GitHub, Vcs::Bitbucket, Vcs::CircleCi];

    pub fn as_str(&self) -> &'static str {
        match self {
            Vcs::GitHub => "gh",
            Vcs::Bitbucket => "bb",
            Vcs::CircleCi => "circleci",
        }
    }

    fn parse(value: &str) -> Result<Self, ConfigError> {
        parse_option(ENV_VCS, value, &Self::ALL, Self::as_str)
    }
}

/// Aggregation window requested from the insights API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportingWindow {
    Last24Hours,
    #[default]
    Last7Days,
    Last30Days,
    Last60Days,
    Last90Days,
}

impl ReportingWindow {
    const ALL: [ReportingWindow; 5] = [
        ReportingWindow::Last24Hours,
        ReportingWindow::Last7Days,
        ReportingWindow::Last30Days,
        ReportingWindow::Last60Days,
        ReportingWindow::Last90Days,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReportingWindow::Last24Hours => "last-24-hours",
            ReportingWindow::Last7Days => "last-7-days",
            ReportingWindow::Last30Days => "last-30-days",
            ReportingWindow::Last60Days => "last-60-days",
            ReportingWindow::Last90Days => "last-90-days",
        }
    }

    fn parse(value: &str) -> Result<Self, ConfigError> {
        parse_option(ENV_REPORTING_WINDOW, value, &Self::ALL, Self::as_str)
    }
}

fn parse_option<T: Copy>(
    name: &'static str,
    value: &str,
    all: &[T],
    as_str: fn(&T) -> &'static str,
) -> Result<T, ConfigError> {
    all.iter()
        .find(|option| as_str(option) == value)
        .copied()
        .ok_or_else(|| ConfigError::Invalid {
            name,
            value: value.to_string(),
            expected: all.iter().map(as_str).collect::<Vec<_>>().join(", "),
        })
}

/// The project, branch and window whose insights are exported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsightsTarget {
    pub vcs: Vcs,
    pub org: String,
    pub repo: String,
    pub branch: String,
    pub reporting_window: ReportingWindow,
}

impl InsightsTarget {
    /// `<vcs>/<org>/<repo>`, as used in API paths.
    pub fn project_slug(&self) -> String {
        format!("{}/{}/{}", self.vcs.as_str(), self.org, self.repo)
    }
}

/// API token. `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// On-disk configuration. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub target: TargetSection,
    #[serde(default)]
    pub poll: PollSection,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetSection {
    pub base_url: Option<String>,
    pub vcs: Option<String>,
    pub org: Option<String>,
    pub repo: Option<String>,
    pub branch: Option<String>,
    pub reporting_window: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PollSection {
    pub interval_seconds: Option<u64>,
    pub request_timeout_seconds: Option<u64>,
}

impl FileConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&content)?)
    }
}

/// Fully resolved exporter configuration.
#[derive(Debug, Clone)]
pub struct ExporterConfig {
    pub interval: Duration,
    pub request_timeout: Duration,
    pub credential: Credential,
    pub base_url: String,
    pub target: InsightsTarget,
}

impl ExporterConfig {
    /// Resolve from the process environment.
    pub fn from_env(file: Option<&FileConfig>) -> Result<Self, ConfigError> {
        Self::resolve(&|name: &str| std::env::var(name).ok(), file)
    }

    /// Resolve from an arbitrary variable lookup.
    ///
    /// The credential is checked first so a missing token is always the
    /// reported failure when several settings are absent.
    pub fn resolve(
        env: &impl Fn(&str) -> Option<String>,
        file: Option<&FileConfig>,
    ) -> Result<Self, ConfigError> {
        let default_file = FileConfig::default();
        let file = file.unwrap_or(&default_file);

        let credential = resolve_credential(env)?;
        let interval = resolve_seconds(
            env,
            ENV_POLL_INTERVAL,
            file.poll.interval_seconds,
            DEFAULT_POLL_INTERVAL,
        )?;
        let request_timeout = resolve_seconds(
            env,
            ENV_REQUEST_TIMEOUT,
            file.poll.request_timeout_seconds,
            DEFAULT_REQUEST_TIMEOUT,
        )?;
        let base_url = lookup(env, ENV_BASE_URL)
            .or_else(|| file.target.base_url.clone())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        let target = resolve_target(env, &file.target)?;

        Ok(Self {
            interval,
            request_timeout,
            credential,
            base_url,
            target,
        })
    }
}

/// Poll interval; 300s when the override is absent.
pub fn resolve_interval(env: &impl Fn(&str) -> Option<String>) -> Result<Duration, ConfigError> {
    resolve_seconds(env, ENV_POLL_INTERVAL, None, DEFAULT_POLL_INTERVAL)
}

pub fn resolve_request_timeout(
    env: &impl Fn(&str) -> Option<String>,
) -> Result<Duration, ConfigError> {
    resolve_seconds(env, ENV_REQUEST_TIMEOUT, None, DEFAULT_REQUEST_TIMEOUT)
}

pub fn resolve_credential(
    env: &impl Fn(&str) -> Option<String>,
) -> Result<Credential, ConfigError> {
    lookup(env, ENV_CREDENTIAL)
        .map(Credential::new)
        .ok_or(ConfigError::MissingCredential(ENV_CREDENTIAL))
}

pub fn resolve_target(
    env: &impl Fn(&str) -> Option<String>,
    file: &TargetSection,
) -> Result<InsightsTarget, ConfigError> {
    let vcs = match lookup(env, ENV_VCS).or_else(|| file.vcs.clone()) {
        Some(value) => Vcs::parse(&value)?,
        None => Vcs::default(),
    };
    let reporting_window =
        match lookup(env, ENV_REPORTING_WINDOW).or_else(|| file.reporting_window.clone()) {
            Some(value) => ReportingWindow::parse(&value)?,
            None => ReportingWindow::default(),
        };
    let org = lookup(env, ENV_ORG)
        .or_else(|| file.org.clone())
        .ok_or(ConfigError::Missing(ENV_ORG))?;
    let repo = lookup(env, ENV_REPO)
        .or_else(|| file.repo.clone())
        .ok_or(ConfigError::Missing(ENV_REPO))?;
    let branch = lookup(env, ENV_BRANCH)
        .or_else(|| file.branch.clone())
        .unwrap_or_else(|| DEFAULT_BRANCH.to_string());

    Ok(InsightsTarget {
        vcs,
        org,
        repo,
        branch,
        reporting_window,
    })
}

fn resolve_seconds(
    env: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    file_value: Option<u64>,
    default: Duration,
) -> Result<Duration, ConfigError> {
    let invalid = |value: String| ConfigError::InvalidInterval { name, value };

    let seconds = match lookup(env, name) {
        Some(raw) => raw.parse::<u64>().map_err(|_| invalid(raw.clone()))?,
        None => match file_value {
            Some(secs) => secs,
            None => return Ok(default),
        },
    };
    if seconds == 0 {
        return Err(invalid(seconds.to_string()));
    }
    Ok(Duration::from_secs(seconds))
}

/// Read a variable, treating empty and whitespace-only values as unset.
fn lookup(env: &impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    env(name)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
