//! Alias table - user-defined command macros with `$#` placeholders
//!
//! Aliases may expand to other aliases. Every definition is checked for
//! expansion cycles when it is added, so the router can expand recursively
//! without tracking what it has already visited.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Placeholder token replaced by positional arguments
pub const PLACEHOLDER: &str = "$#";

/// Errors from alias definition and expansion
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AliasError {
    #[error("alias name '{0}' must be non-empty and contain no whitespace")]
    InvalidName(String),

    #[error("alias '{0}' is a duplicate of an existing alias")]
    DuplicateName(String),

    #[error("alias '{0}' creates an infinite loop")]
    CyclicAlias(String),

    #[error("alias '{0}' not found")]
    NotFound(String),

    #[error("argument mismatch, alias expects {expected} args but got {got}")]
    ArgumentMismatch { expected: usize, got: usize },

    #[error("alias expansion exceeded {0} levels")]
    TooDeep(usize),
}

/// A named command macro
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alias {
    #[serde(default, skip_serializing)]
    pub name: String,
    pub command: String,
    #[serde(default)]
    pub description: String,
}

impl Alias {
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            description: String::new(),
        }
    }

    /// Builder pattern: set description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// The verb this alias expands to
    pub fn target(&self) -> &str {
        first_token(&self.command)
    }

    /// Number of `$#` placeholders in the command template
    pub fn arity(&self) -> usize {
        self.command.matches(PLACEHOLDER).count()
    }
}

/// Owns every alias for the session, keyed by name
#[derive(Debug, Clone, Default)]
pub struct AliasTable {
    aliases: BTreeMap<String, Alias>,
}

impl AliasTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define a new alias
    pub fn add(&mut self, name: &str, command: &str) -> Result<(), AliasError> {
        self.insert(Alias::new(name, command))
    }

    /// Define a new alias carrying a description
    pub fn insert(&mut self, alias: Alias) -> Result<(), AliasError> {
        if !is_valid_name(&alias.name) {
            return Err(AliasError::InvalidName(alias.name));
        }
        if self.aliases.contains_key(&alias.name) {
            return Err(AliasError::DuplicateName(alias.name));
        }
        if is_cyclic(&alias, self.aliases.values()) {
            return Err(AliasError::CyclicAlias(alias.name));
        }

        tracing::debug!(alias = %alias.name, command = %alias.command, "alias added");
        self.aliases.insert(alias.name.clone(), alias);
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> Result<Alias, AliasError> {
        self.aliases
            .remove(name)
            .ok_or_else(|| AliasError::NotFound(name.to_string()))
    }

    /// Exact-name lookup
    pub fn resolve(&self, verb: &str) -> Option<&Alias> {
        self.aliases.get(verb)
    }

    /// Aliases sorted by name
    pub fn iter(&self) -> impl Iterator<Item = &Alias> {
        self.aliases.values()
    }

    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }

    /// Build a table from loaded definitions, dropping every entry that has
    /// an invalid name or sits on a cyclic expansion path. Each candidate is
    /// checked against the full loaded set. Returns the table and one message
    /// per rejected alias.
    pub fn from_definitions(definitions: &BTreeMap<String, Alias>) -> (Self, Vec<String>) {
        let named: Vec<Alias> = definitions
            .iter()
            .map(|(name, alias)| Alias {
                name: name.clone(),
                ..alias.clone()
            })
            .collect();

        let mut table = Self::new();
        let mut rejected = Vec::new();

        for alias in &named {
            if !is_valid_name(&alias.name) {
                let message = AliasError::InvalidName(alias.name.clone()).to_string();
                tracing::warn!("Dropping configured alias: {}", message);
                rejected.push(message);
                continue;
            }
            if is_cyclic(alias, named.iter()) {
                let message = AliasError::CyclicAlias(alias.name.clone()).to_string();
                tracing::warn!("Dropping configured alias: {}", message);
                rejected.push(message);
                continue;
            }
            table.aliases.insert(alias.name.clone(), alias.clone());
        }

        (table, rejected)
    }

    /// Export in the shape the config file stores
    pub fn to_definitions(&self) -> BTreeMap<String, Alias> {
        self.aliases.clone()
    }
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && !name.chars().any(char::is_whitespace)
}

fn first_token(command: &str) -> &str {
    command.split_whitespace().next().unwrap_or("")
}

/// Walk the first-token graph from the candidate. Each alias has at most one
/// outgoing edge, so a single path either dead-ends at a non-alias verb or
/// revisits a node.
fn is_cyclic<'a>(candidate: &Alias, existing: impl Iterator<Item = &'a Alias>) -> bool {
    let mut graph: HashMap<&str, &str> = existing
        .map(|alias| (alias.name.as_str(), alias.target()))
        .collect();
    graph.insert(candidate.name.as_str(), candidate.target());

    let mut visited: Vec<&str> = Vec::new();
    let mut next = candidate.name.as_str();
    loop {
        if visited.contains(&next) {
            return true;
        }
        match graph.get(next) {
            Some(&target) => {
                visited.push(next);
                next = target;
            }
            None => return false,
        }
    }
}

/// Substitute the caller's arguments into an alias template.
///
/// Arguments are the whitespace-separated tokens of `raw_line` after the
/// invoked verb. Their count must equal the number of `$#` placeholders.
pub fn interpolate(raw_line: &str, template: &str) -> Result<String, AliasError> {
    let args: Vec<&str> = raw_line.split_whitespace().skip(1).collect();
    let fragments: Vec<&str> = template.split(PLACEHOLDER).collect();
    let expected = fragments.len() - 1;

    if args.len() != expected {
        return Err(AliasError::ArgumentMismatch {
            expected,
            got: args.len(),
        });
    }
    if expected == 0 {
        return Ok(template.to_string());
    }

    let mut realized = String::with_capacity(template.len() + raw_line.len());
    for (fragment, arg) in fragments.iter().zip(&args) {
        realized.push_str(fragment);
        realized.push_str(arg);
    }
    realized.push_str(fragments[expected]);
    Ok(realized)
}
