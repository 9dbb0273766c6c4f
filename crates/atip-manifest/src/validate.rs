// SPDX-FileCopyrightText: 2026 ATIP Discover Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Structural validation of manifest documents.
//!
//! Validation runs on the raw [`serde_json::Value`] rather than on the typed
//! model so that every violation can be reported with its path instead of
//! stopping at the first serde error.

use std::path::Path;

use atip_core::{AtipError, ValidationIssue};
use serde_json::{Map, Value};

use crate::model::Manifest;

/// Boolean effect flags. Other effect keys are free-form.
const BOOLEAN_EFFECTS: &[&str] = &["destructive", "reversible", "idempotent", "network"];

/// Outcome of validating one document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub errors: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn push(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ValidationIssue::new(path, message));
    }
}

/// Validates a parsed document against the manifest schema.
///
/// Checks the mandatory top-level fields (`atip` with a version, `name`,
/// `version`, `description`) and walks `commands` to any depth, requiring a
/// `description` on every command. Does not fail fast.
pub fn validate_metadata(doc: &Value) -> ValidationReport {
    let mut report = ValidationReport::default();

    let Some(root) = doc.as_object() else {
        report.push("", "manifest must be a JSON object");
        return report;
    };

    check_protocol_tag(root.get("atip"), &mut report);

    match root.get("name") {
        Some(Value::String(name)) if is_valid_tool_name(name) => {}
        Some(Value::String(name)) if name.trim().is_empty() => {
            report.push("name", "must not be empty")
        }
        Some(Value::String(name)) => report.push(
            "name",
            format!("'{name}' is not a valid tool name (no path separators or leading dot)"),
        ),
        Some(_) => report.push("name", "must be a string"),
        None => report.push("name", "is required"),
    }

    for field in ["version", "description"] {
        require_string(root, field, field, &mut report);
    }

    if let Some(commands) = root.get("commands") {
        check_commands(commands, "commands", &mut report);
    }

    report
}

/// Validates and converts a document into a typed [`Manifest`].
pub fn parse_manifest(doc: Value) -> Result<Manifest, Vec<ValidationIssue>> {
    let report = validate_metadata(&doc);
    if !report.is_valid() {
        return Err(report.errors);
    }
    serde_json::from_value(doc).map_err(|e| vec![ValidationIssue::new("", e.to_string())])
}

/// Parses JSON text and validates it.
pub fn parse_manifest_str(text: &str) -> Result<Manifest, Vec<ValidationIssue>> {
    let doc: Value = serde_json::from_str(text)
        .map_err(|e| vec![ValidationIssue::new("", format!("invalid JSON: {e}"))])?;
    parse_manifest(doc)
}

/// Loads and validates a manifest file (shims, standalone validation).
pub fn load_manifest(path: &Path) -> Result<Manifest, AtipError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        AtipError::io(format!("failed to read manifest '{}'", path.display()), e)
    })?;
    parse_manifest_str(&content).map_err(|errors| AtipError::Validation {
        path: path.to_path_buf(),
        errors,
    })
}

/// A tool name must be usable as a cache file name.
pub fn is_valid_tool_name(name: &str) -> bool {
    !name.trim().is_empty()
        && !name.starts_with('.')
        && !name.contains(['/', '\\', '\0'])
}

fn check_protocol_tag(tag: Option<&Value>, report: &mut ValidationReport) {
    match tag {
        None => report.push("atip", "is required"),
        Some(Value::String(v)) if !v.trim().is_empty() => {}
        Some(Value::String(_)) => report.push("atip", "version must not be empty"),
        Some(Value::Object(obj)) => require_string(obj, "version", "atip.version", report),
        Some(_) => report.push("atip", "must be an object with a version"),
    }
}

fn require_string(
    obj: &Map<String, Value>,
    key: &str,
    path: &str,
    report: &mut ValidationReport,
) {
    match obj.get(key) {
        Some(Value::String(s)) if !s.trim().is_empty() => {}
        Some(Value::String(_)) => report.push(path, "must not be empty"),
        Some(_) => report.push(path, "must be a string"),
        None => report.push(path, "is required"),
    }
}

fn check_commands(commands: &Value, path: &str, report: &mut ValidationReport) {
    let Some(map) = commands.as_object() else {
        report.push(path, "must be an object mapping command names to commands");
        return;
    };

    for (name, command) in map {
        let command_path = format!("{path}.{name}");
        let Some(obj) = command.as_object() else {
            report.push(command_path, "command must be an object");
            continue;
        };

        match obj.get("description") {
            Some(Value::String(s)) if !s.trim().is_empty() => {}
            Some(Value::String(_)) => report.push(
                format!("{command_path}.description"),
                "must not be empty",
            ),
            Some(_) => report.push(format!("{command_path}.description"), "must be a string"),
            None => report.push(
                format!("{command_path}.description"),
                format!("command '{name}' is missing a description"),
            ),
        }

        if let Some(effects) = obj.get("effects") {
            check_effects(effects, &format!("{command_path}.effects"), report);
        }
        for list in ["arguments", "options"] {
            if let Some(value) = obj.get(list) {
                check_named_list(value, &format!("{command_path}.{list}"), list, report);
            }
        }
        if let Some(nested) = obj.get("commands") {
            check_commands(nested, &format!("{command_path}.commands"), report);
        }
    }
}

fn check_effects(effects: &Value, path: &str, report: &mut ValidationReport) {
    let Some(obj) = effects.as_object() else {
        report.push(path, "must be an object");
        return;
    };
    for key in BOOLEAN_EFFECTS {
        if let Some(value) = obj.get(*key) {
            if !value.is_boolean() {
                report.push(format!("{path}.{key}"), "must be a boolean");
            }
        }
    }
}

/// Checks `arguments` or `options` entries, including the typed fields the
/// manifest model deserializes.
fn check_named_list(value: &Value, path: &str, list: &str, report: &mut ValidationReport) {
    let Some(items) = value.as_array() else {
        report.push(path, "must be an array");
        return;
    };
    for (i, item) in items.iter().enumerate() {
        let item_path = format!("{path}[{i}]");
        let Some(obj) = item.as_object() else {
            report.push(item_path, "must be an object");
            continue;
        };
        match obj.get("name") {
            Some(Value::String(s)) if !s.is_empty() => {}
            _ => report.push(format!("{item_path}.name"), "is required"),
        }
        for key in ["type", "description"] {
            if obj.get(key).is_some_and(|v| !v.is_string()) {
                report.push(format!("{item_path}.{key}"), "must be a string");
            }
        }
        if list == "arguments" && obj.get("required").is_some_and(|v| !v.is_boolean()) {
            report.push(format!("{item_path}.required"), "must be a boolean");
        }
        if list == "options" {
            if let Some(flags) = obj.get("flags") {
                let all_strings = flags
                    .as_array()
                    .is_some_and(|f| f.iter().all(Value::is_string));
                if !all_strings {
                    report.push(format!("{item_path}.flags"), "must be an array of strings");
                }
            }
        }
    }
}
