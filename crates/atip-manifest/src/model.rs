// SPDX-FileCopyrightText: 2026 ATIP Discover Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed manifest structs.
//!
//! Only the fields the discovery pipeline reads are modelled explicitly.
//! Everything else is kept in `extra` so a cached manifest round-trips
//! without losing vendor-specific keys.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A tool's introspection manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub atip: ProtocolTag,
    pub name: String,
    pub version: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub commands: BTreeMap<String, Command>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Manifest {
    /// Total number of commands at every nesting level.
    pub fn command_count(&self) -> usize {
        fn count(commands: &BTreeMap<String, Command>) -> usize {
            commands.values().map(|c| 1 + count(&c.commands)).sum()
        }
        count(&self.commands)
    }
}

/// The protocol marker: `{"version": "0.4"}` or the bare string `"0.4"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProtocolTag {
    Object {
        version: String,
        #[serde(flatten)]
        extra: Map<String, Value>,
    },
    Bare(String),
}

impl ProtocolTag {
    pub fn version(&self) -> &str {
        match self {
            ProtocolTag::Object { version, .. } => version,
            ProtocolTag::Bare(version) => version,
        }
    }
}

/// A command or subcommand. Nested commands declare their own effects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub description: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub commands: BTreeMap<String, Command>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effects: Option<Effects>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub arguments: Vec<Argument>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<OptionDef>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Declared side effects of a command.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Effects {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destructive: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reversible: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotent: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<bool>,
    /// e.g. `{"read": true, "write": false}`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filesystem: Option<Value>,
    /// e.g. `{"billable": true}`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<Value>,
    /// e.g. `{"stdin": "optional", "prompts": false, "tty": false}`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interactive: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A positional argument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Argument {
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A flag or option.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionDef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flags: Vec<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
