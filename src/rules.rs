use fancy_regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("entity rule `{entity}` did not compile: {source}")]
    Pattern {
        entity: String,
        #[source]
        source: Box<fancy_regex::Error>,
    },
    #[error("duplicate entity label `{0}` in rule table")]
    DuplicateLabel(String),
    #[error("rule table is empty")]
    Empty,
    #[error("unreadable rule table `{path}`: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed rule table `{path}`: {source}")]
    Malformed {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// One named entity pattern. The position of a rule inside the table is
/// part of the configuration contract: an earlier rule consumes text a
/// later, broader rule would otherwise match differently.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PatternRule {
    pub entity: String,
    pub pattern: String,
}

impl PatternRule {
    pub fn new(entity: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            pattern: pattern.into(),
        }
    }
}

/// An ordered, compiled rule table.
pub struct RuleSet {
    rules: Vec<(String, Regex)>,
}

impl RuleSet {
    pub fn from_rules(rules: &[PatternRule]) -> Result<Self, ConfigError> {
        if rules.is_empty() {
            return Err(ConfigError::Empty);
        }
        let mut seen = ahash::AHashSet::new();
        let mut compiled = Vec::with_capacity(rules.len());
        for rule in rules {
            if !seen.insert(rule.entity.clone()) {
                return Err(ConfigError::DuplicateLabel(rule.entity.clone()));
            }
            let regex = Regex::new(&rule.pattern).map_err(|source| ConfigError::Pattern {
                entity: rule.entity.clone(),
                source: Box::new(source),
            })?;
            compiled.push((rule.entity.clone(), regex));
        }
        Ok(Self { rules: compiled })
    }

    /// Load a rule table from a JSON array of `{entity, pattern}` objects.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let rules: Vec<PatternRule> =
            serde_json::from_str(&text).map_err(|source| ConfigError::Malformed {
                path: path.display().to_string(),
                source,
            })?;
        Self::from_rules(&rules)
    }

    /// The built-in rule table. Narrow patterns run before broad ones that
    /// share syntax: `uri` must precede `file`, and the bare `number` rule
    /// runs last so typed numeric rules win.
    pub fn defaults() -> Self {
        Self::from_rules(&default_rules()).expect("built-in rule table compiles")
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Regex)> {
        self.rules.iter().map(|(e, r)| (e.as_str(), r))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

pub fn default_rules() -> Vec<PatternRule> {
    vec![
        PatternRule::new("uri", r"/(?!(dev|proc))([\w\.]+/)+\w+\.php"),
        PatternRule::new(
            "url",
            r"https?://(www\.)?[-a-zA-Z0-9@:%._\+~#=]{2,256}\.[a-z]{2,6}\b([-a-zA-Z0-9@:%_\+.~#?&//=]*)",
        ),
        PatternRule::new("email", r"[a-zA-Z0-9_.+-]+@[a-zA-Z0-9-]+\.[a-zA-Z0-9-.]+"),
        PatternRule::new("device", r"/dev(/[\w\.]+)+"),
        PatternRule::new("process", r"/proc(/[\w\.]+)+"),
        PatternRule::new(
            "ip_address",
            r"(tcp/)?([0-9]{1,3}\.){3}[0-9]{1,3}((\+[0-9]{1,3})|:[0-9]{1,5})?",
        ),
        PatternRule::new("memory_address", r"0x[a-zA-Z0-9]+((-|\s)[a-zA-Z0-9]+)?"),
        PatternRule::new(
            "uuid",
            r"\b[0-9a-fA-F]{8}\b-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-\b[0-9a-fA-F]{12}\b",
        ),
        PatternRule::new("memory_k", r"\b\d+[kK][bB]?\b"),
        PatternRule::new("disk_mb", r"\b\d+[mM][bB]?\b"),
        PatternRule::new("disk_gb", r"\b\d+[gG][bB]?\b"),
        PatternRule::new("clock_speed", r"\b\d+(\.\d+)?GHz\b"),
        // keep these last: they overlap the narrower rules above
        PatternRule::new("file", r"/(?!(dev|proc))([\w\.]+/)+\w+(?!\.php)(\.\w+)?"),
        PatternRule::new("version", r"\b[vV]?\d+(\.\d+)+(-[0-9a-zA-Z]+)?\b"),
        PatternRule::new("number", r"\b(?<=\s)\d+(?=\s)\b"),
    ]
}
