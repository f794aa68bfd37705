// Copyright (c) Contributors to bundle-forge.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/bundle-forge/bundle-forge

//! Structural validation of a [`Bundle`] (C9): required fields, module-list
//! shape, session-field types, and context-path existence, producing a
//! non-fatal `{errors, warnings}` result by default (grounded on
//! `original_source/amplifier_foundation/validator.py`).

use crate::bundle::Bundle;
use crate::error::{Error, Result, ValidationError};
use crate::value::Value;

/// The outcome of validating a bundle: never raised on its own, just
/// accumulated. Use [`validate_or_raise`] to turn a non-empty `errors`
/// list into an [`Error::Validation`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationResult {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn add_error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    fn add_warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }
}

/// Validate a bundle's structure: non-empty `name`, well-shaped
/// provider/tool/hook specs, well-typed `session.orchestrator`/
/// `session.context`, mapping-shaped agent definitions, and a warning
/// (never an error) for any `context` path that doesn't currently exist.
pub fn validate(bundle: &Bundle) -> ValidationResult {
    let mut result = ValidationResult::default();

    validate_required_fields(bundle, &mut result);
    validate_module_lists(bundle, &mut result);
    validate_session(bundle, &mut result);
    validate_resources(bundle, &mut result);

    result
}

/// Validate and aggregate any errors into a single [`Error::Validation`].
pub fn validate_or_raise(bundle: &Bundle) -> Result<()> {
    let result = validate(bundle);
    if !result.valid() {
        return Err(Error::Validation(ValidationError { errors: result.errors }));
    }
    Ok(())
}

fn validate_required_fields(bundle: &Bundle, result: &mut ValidationResult) {
    if bundle.name.is_empty() {
        result.add_error("bundle must have a name");
    }
}

fn validate_module_lists(bundle: &Bundle, result: &mut ValidationResult) {
    for (list_name, modules) in [
        ("providers", &bundle.providers),
        ("tools", &bundle.tools),
        ("hooks", &bundle.hooks),
    ] {
        for (index, module) in modules.iter().enumerate() {
            if !module.contains_key("module") {
                result.add_error(format!("{list_name}[{index}]: missing required 'module' field"));
            }
            if let Some(config) = module.get("config") {
                if !matches!(config, Value::Mapping(_)) {
                    result.add_error(format!("{list_name}[{index}]: 'config' must be a mapping"));
                }
            }
        }
    }
}

fn validate_session(bundle: &Bundle, result: &mut ValidationResult) {
    if bundle.session.is_empty() {
        return;
    }

    if let Some(orchestrator) = bundle.session.get("orchestrator") {
        if !matches!(orchestrator, Value::String(_) | Value::Mapping(_)) {
            result.add_error("session.orchestrator: must be a string or a mapping");
        }
    }
    if let Some(context) = bundle.session.get("context") {
        if !matches!(context, Value::String(_) | Value::Mapping(_)) {
            result.add_error("session.context: must be a string or a mapping");
        }
    }
}

fn validate_resources(bundle: &Bundle, result: &mut ValidationResult) {
    for (name, definition) in &bundle.agents {
        if !matches!(definition, Value::Mapping(_)) {
            result.add_error(format!("agents.{name}: must be a mapping"));
        }
    }

    if bundle.base_path.is_some() {
        for (name, path) in &bundle.context {
            if !path.exists() {
                result.add_warning(format!("context.{name}: path does not exist: {}", path.display()));
            }
        }
    }
}
