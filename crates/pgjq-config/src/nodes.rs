// Helper functions for extracting values from KDL nodes

use kdl::KdlNode;
use std::time::Duration;

use crate::{ConfigError, ConfigResult, VariableContext, parse_duration};

/// Dotted path of a setting, used in error messages.
pub(crate) fn field(section: &str, node: &KdlNode) -> String {
    format!("{}.{}", section, node.name().value())
}

pub(crate) fn get_first_string_arg(node: &KdlNode, vars: &VariableContext) -> Option<String> {
    node.entries()
        .iter()
        .find(|e| e.name().is_none())
        .and_then(|e| e.value().as_string())
        .map(|s| vars.interpolate(s))
}

pub(crate) fn require_string(
    field: &str,
    node: &KdlNode,
    vars: &VariableContext,
) -> ConfigResult<String> {
    get_first_string_arg(node, vars)
        .ok_or_else(|| ConfigError::invalid(field, "expected a string value"))
}

pub(crate) fn require_integer(field: &str, node: &KdlNode) -> ConfigResult<i128> {
    node.entries()
        .iter()
        .find(|e| e.name().is_none())
        .and_then(|e| e.value().as_integer())
        .ok_or_else(|| ConfigError::invalid(field, "expected an integer value"))
}

pub(crate) fn require_bool(field: &str, node: &KdlNode) -> ConfigResult<bool> {
    node.entries()
        .iter()
        .find(|e| e.name().is_none())
        .and_then(|e| e.value().as_bool())
        .ok_or_else(|| ConfigError::invalid(field, "expected a boolean value"))
}

/// Integer in `min..=max`.
pub(crate) fn require_bounded<T>(field: &str, node: &KdlNode, min: T, max: T) -> ConfigResult<T>
where
    T: TryFrom<i128> + Into<i128> + Copy + std::fmt::Display,
{
    let value = require_integer(field, node)?;
    if value < min.into() || value > max.into() {
        return Err(ConfigError::invalid(
            field,
            format!("must be between {} and {}, got {}", min, max, value),
        ));
    }
    T::try_from(value).map_err(|_| ConfigError::invalid(field, "out of range"))
}

/// A duration given either as a string (`"30s"`) or as whole seconds (`30`).
pub(crate) fn require_duration(
    field: &str,
    node: &KdlNode,
    vars: &VariableContext,
) -> ConfigResult<Duration> {
    if let Some(text) = get_first_string_arg(node, vars) {
        return parse_duration(field, &text);
    }
    let secs = require_integer(field, node)?;
    u64::try_from(secs)
        .map(Duration::from_secs)
        .map_err(|_| ConfigError::invalid(field, format!("not a duration: {}", secs)))
}

/// A positive duration.
pub(crate) fn require_positive_duration(
    field: &str,
    node: &KdlNode,
    vars: &VariableContext,
) -> ConfigResult<Duration> {
    let duration = require_duration(field, node, vars)?;
    if duration.is_zero() {
        return Err(ConfigError::invalid(field, "must be greater than zero"));
    }
    Ok(duration)
}
