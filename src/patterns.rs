//! Removal policy loading and matching from policy.toml.

use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// How a rule's pattern is compared against a directory entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchKind {
    /// Exact match on the final component of a directory
    DirectoryName,
    /// Suffix match on the name of a file (or symlink)
    FileSuffix,
}

impl fmt::Display for MatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchKind::DirectoryName => write!(f, "directory"),
            MatchKind::FileSuffix => write!(f, "suffix"),
        }
    }
}

/// A single (pattern, kind) pair from the policy table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovalRule {
    pub pattern: String,
    pub kind: MatchKind,
}

impl RemovalRule {
    pub fn directory(name: impl Into<String>) -> Self {
        RemovalRule {
            pattern: name.into(),
            kind: MatchKind::DirectoryName,
        }
    }

    pub fn suffix(suffix: impl Into<String>) -> Self {
        RemovalRule {
            pattern: suffix.into(),
            kind: MatchKind::FileSuffix,
        }
    }

    /// Check an entry name against this rule.
    ///
    /// `is_dir` must describe the entry itself, not a symlink target. Directory
    /// rules only ever match real directories and suffix rules never do.
    pub fn matches(&self, name: &str, is_dir: bool) -> bool {
        match self.kind {
            MatchKind::DirectoryName => is_dir && name == self.pattern,
            MatchKind::FileSuffix => !is_dir && name.ends_with(self.pattern.as_str()),
        }
    }
}

/// A named group of rules, reported together
#[derive(Debug, Clone)]
pub struct Category {
    pub key: String,
    pub label: String,
    pub rules: Vec<RemovalRule>,
}

/// Errors raised while loading or validating a policy
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("failed to read policy file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse policy: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("policy defines no categories")]
    Empty,

    #[error("duplicate category key '{0}'")]
    DuplicateCategory(String),

    #[error("category '{0}' has no rules")]
    EmptyCategory(String),

    #[error("category '{category}' contains an empty pattern")]
    EmptyPattern { category: String },

    #[error("category '{category}': pattern '{pattern}' must be a single path component")]
    NotAComponent { category: String, pattern: String },

    #[error("category '{category}': suffix '{pattern}' must start with '.'")]
    SuffixWithoutDot { category: String, pattern: String },
}

/// Structure to deserialize the policy from TOML
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PolicyConfig {
    #[serde(default)]
    category: Vec<CategoryConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CategoryConfig {
    key: String,
    label: Option<String>,
    #[serde(default)]
    directories: Vec<String>,
    #[serde(default)]
    suffixes: Vec<String>,
}

// Embed the TOML file directly in the binary at compile time
const POLICY_TOML: &str = include_str!("../policy.toml");

/// Immutable, ordered policy table driving every deletion
#[derive(Debug, Clone)]
pub struct Policy {
    categories: Vec<Category>,
}

impl Policy {
    /// The policy shipped with the binary
    pub fn builtin() -> Result<Self, PolicyError> {
        Self::from_toml(POLICY_TOML)
    }

    /// Load a policy from a TOML file on disk
    pub fn from_file(path: &Path) -> Result<Self, PolicyError> {
        let text = fs::read_to_string(path).map_err(|source| PolicyError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    /// Parse and validate a policy from TOML text
    pub fn from_toml(text: &str) -> Result<Self, PolicyError> {
        let config: PolicyConfig = toml::from_str(text)?;

        let categories = config
            .category
            .into_iter()
            .map(|c| {
                let mut rules: Vec<RemovalRule> =
                    c.directories.into_iter().map(RemovalRule::directory).collect();
                rules.extend(c.suffixes.into_iter().map(RemovalRule::suffix));
                Category {
                    label: c.label.unwrap_or_else(|| c.key.clone()),
                    key: c.key,
                    rules,
                }
            })
            .collect();

        Self::new(categories)
    }

    /// Build a policy from already constructed categories
    pub fn new(categories: Vec<Category>) -> Result<Self, PolicyError> {
        validate(&categories)?;
        Ok(Policy { categories })
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn category(&self, key: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.key == key)
    }

    /// Total number of rules across all categories
    pub fn rule_count(&self) -> usize {
        self.categories.iter().map(|c| c.rules.len()).sum()
    }
}

fn validate(categories: &[Category]) -> Result<(), PolicyError> {
    if categories.is_empty() {
        return Err(PolicyError::Empty);
    }

    let mut seen = HashSet::new();
    for category in categories {
        if !seen.insert(category.key.as_str()) {
            return Err(PolicyError::DuplicateCategory(category.key.clone()));
        }
        if category.rules.is_empty() {
            return Err(PolicyError::EmptyCategory(category.key.clone()));
        }

        for rule in &category.rules {
            let pattern = rule.pattern.as_str();
            if pattern.is_empty() {
                return Err(PolicyError::EmptyPattern {
                    category: category.key.clone(),
                });
            }
            // "." and ".." would resolve to the root or above it
            if pattern.contains(['/', '\\']) || pattern == "." || pattern == ".." {
                return Err(PolicyError::NotAComponent {
                    category: category.key.clone(),
                    pattern: pattern.to_string(),
                });
            }
            if rule.kind == MatchKind::FileSuffix && !pattern.starts_with('.') {
                return Err(PolicyError::SuffixWithoutDot {
                    category: category.key.clone(),
                    pattern: pattern.to_string(),
                });
            }
        }
    }

    Ok(())
}
