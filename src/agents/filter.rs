use crate::config::Settings;
use crate::error::{DockcheckError, Result};
use crate::runtime::ContainerRecord;
use jiff::Timestamp;
use regex::Regex;
use std::fmt;
use tracing::warn;

const SECONDS_PER_DAY: i64 = 86_400;

/// Which containers a cycle is allowed to look at.
#[derive(Debug, Clone, Default)]
pub struct FilterSpec {
    pub include: Vec<PatternMatcher>,
    pub exclude: Vec<PatternMatcher>,
    pub label_filter: Option<(String, String)>,
    pub min_age_days: Option<u32>,
}

impl FilterSpec {
    /// Builds the filter set from raw settings.
    ///
    /// Anything that fails to parse is dropped with a warning so a single bad
    /// filter never blocks a cycle; the affected filter simply lets everything through.
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            include: compile_patterns(&settings.include, "include"),
            exclude: compile_patterns(&settings.exclude, "exclude"),
            label_filter: settings.label_filter.as_deref().and_then(|raw| {
                parse_label_filter(raw)
                    .inspect_err(|e| warn!("ignoring label filter: {e}"))
                    .ok()
            }),
            min_age_days: settings.min_age.as_deref().and_then(|raw| {
                parse_min_age(raw)
                    .inspect_err(|e| warn!("ignoring minimum age: {e}"))
                    .ok()
            }),
        }
    }
}

fn compile_patterns(raw: &[String], kind: &str) -> Vec<PatternMatcher> {
    raw.iter()
        .filter_map(|p| match PatternMatcher::new(p) {
            Ok(m) => Some(m),
            Err(e) => {
                warn!("ignoring {kind} pattern: {e}");
                None
            }
        })
        .collect()
}

/// Parses `key=value`. The value may be empty, the key may not.
pub fn parse_label_filter(raw: &str) -> Result<(String, String)> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(DockcheckError::Config(format!(
            "label filter '{raw}' is not in key=value form"
        ))),
    }
}

/// Parses `N`, `Nd` (days) or `Nw` (weeks) into days.
pub fn parse_min_age(raw: &str) -> Result<u32> {
    let raw = raw.trim();
    let invalid = || DockcheckError::Config(format!("minimum age '{raw}' is not N, Nd or Nw"));

    let (number, multiplier) = match raw.char_indices().last() {
        Some((i, 'd' | 'D')) => (&raw[..i], 1),
        Some((i, 'w' | 'W')) => (&raw[..i], 7),
        Some(_) => (raw, 1),
        None => return Err(invalid()),
    };
    number
        .trim()
        .parse::<u32>()
        .ok()
        .and_then(|n| n.checked_mul(multiplier))
        .ok_or_else(invalid)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterDecision {
    Accept,
    Reject(RejectReason),
}

impl FilterDecision {
    pub fn is_accepted(&self) -> bool {
        matches!(self, FilterDecision::Accept)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    Excluded(String),
    NotIncluded,
    MissingLabel { key: String, value: String },
    TooYoung { age_days: i64, min_days: u32 },
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::Excluded(pattern) => write!(f, "excluded by '{pattern}'"),
            RejectReason::NotIncluded => f.write_str("not in include list"),
            RejectReason::MissingLabel { key, value } => write!(f, "missing label {key}={value}"),
            RejectReason::TooYoung { age_days, min_days } => {
                write!(f, "{age_days} day(s) old, minimum is {min_days}")
            }
        }
    }
}

/// Applies a `FilterSpec` in its fixed order: exclude, include, label, age.
pub struct FilterChain {
    spec: FilterSpec,
}

impl FilterChain {
    pub fn new(spec: FilterSpec) -> Self {
        Self { spec }
    }

    pub fn matches(&self, container: &ContainerRecord, now: Timestamp) -> FilterDecision {
        let name = container.name.as_str();

        if let Some(pattern) = self.spec.exclude.iter().find(|p| p.matches(name)) {
            return FilterDecision::Reject(RejectReason::Excluded(pattern.pattern().to_string()));
        }

        if !self.spec.include.is_empty() && !self.spec.include.iter().any(|p| p.matches(name)) {
            return FilterDecision::Reject(RejectReason::NotIncluded);
        }

        if let Some((key, value)) = &self.spec.label_filter {
            if container.labels.get(key) != Some(value) {
                return FilterDecision::Reject(RejectReason::MissingLabel {
                    key: key.clone(),
                    value: value.clone(),
                });
            }
        }

        if let Some(min_days) = self.spec.min_age_days {
            let age_days = age_in_days(container.created_at, now);
            if age_days < i64::from(min_days) {
                return FilterDecision::Reject(RejectReason::TooYoung { age_days, min_days });
            }
        }

        FilterDecision::Accept
    }
}

/// Whole days between creation and `now`; clock skew never yields a negative age.
pub fn age_in_days(created_at: Timestamp, now: Timestamp) -> i64 {
    let seconds = now.as_second() - created_at.as_second();
    seconds.max(0) / SECONDS_PER_DAY
}

/// Case-sensitive glob (`*`, `?`) over container names.
///
/// A pattern without wildcards only matches the exact name.
#[derive(Debug, Clone)]
pub struct PatternMatcher {
    pattern: String,
    regex: Regex,
}

impl PatternMatcher {
    pub fn new(pattern: &str) -> Result<Self> {
        let trimmed = pattern.trim();
        if trimmed.is_empty() {
            return Err(DockcheckError::Config(
                "filter pattern cannot be empty".to_string(),
            ));
        }

        Ok(Self {
            pattern: trimmed.to_string(),
            regex: Self::compile_glob(trimmed)?,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn matches(&self, value: &str) -> bool {
        self.regex.is_match(value)
    }

    fn compile_glob(pattern: &str) -> Result<Regex> {
        let mut regex = String::from("^");
        for ch in pattern.chars() {
            match ch {
                '*' => regex.push_str(".*"),
                '?' => regex.push('.'),
                '.' | '+' | '(' | ')' | '|' | '^' | '$' | '{' | '}' | '[' | ']' | '\\' => {
                    regex.push('\\');
                    regex.push(ch);
                }
                _ => regex.push(ch),
            }
        }
        regex.push('$');

        Regex::new(&regex).map_err(|e| {
            DockcheckError::Config(format!("invalid filter pattern '{}': {}", pattern, e))
        })
    }
}
