//! Variable interpolation for configuration values.
//!
//! Supports variables like:
//! - `${env.VAR_NAME}` - Environment variable
//! - `${name}` - Custom variable supplied by the caller
//!
//! Unknown variables are left in place so the error surfaces where the value is used.

use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

// Regex for matching ${...} variables
static VAR_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([a-zA-Z_][a-zA-Z0-9_]*(?:\.[a-zA-Z_][a-zA-Z0-9_]*)?)\}").unwrap()
});

/// Variable context containing all available variables for interpolation.
#[derive(Debug, Clone, Default)]
pub struct VariableContext {
    /// Environment variables
    pub env: HashMap<String, String>,
    /// Custom variables defined by the caller
    pub custom: HashMap<String, String>,
}

impl VariableContext {
    /// Create a new empty variable context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a context holding the current process environment.
    pub fn from_process_env() -> Self {
        let mut ctx = Self::new();
        ctx.populate_env();
        ctx
    }

    /// Populate environment variables from the current process environment.
    pub fn populate_env(&mut self) {
        for (key, value) in std::env::vars() {
            self.env.insert(key, value);
        }
    }

    /// Resolve a variable name to its value.
    pub fn resolve(&self, var_name: &str) -> Option<String> {
        let parts: Vec<&str> = var_name.split('.').collect();

        match parts.as_slice() {
            ["env", name] => self.env.get(*name).cloned(),
            [name] => self.custom.get(*name).cloned(),
            _ => None,
        }
    }

    /// Interpolate all variables in a string.
    pub fn interpolate(&self, input: &str) -> String {
        VAR_REGEX
            .replace_all(input, |caps: &regex::Captures| {
                let var_name = &caps[1];
                self.resolve(var_name)
                    .unwrap_or_else(|| format!("${{{}}}", var_name))
            })
            .to_string()
    }
}

/// Builder for creating VariableContext.
pub struct VariableContextBuilder {
    ctx: VariableContext,
}

impl VariableContextBuilder {
    pub fn new() -> Self {
        Self {
            ctx: VariableContext::new(),
        }
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.ctx.env.insert(key.into(), value.into());
        self
    }

    pub fn with_custom(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.ctx.custom.insert(key.into(), value.into());
        self
    }

    pub fn build(self) -> VariableContext {
        self.ctx
    }
}

impl Default for VariableContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_variables() {
        let ctx = VariableContextBuilder::new()
            .with_env("PGHOST", "db.internal")
            .with_env("PGPORT", "5433")
            .build();

        let result = ctx.interpolate("postgres://app@${env.PGHOST}:${env.PGPORT}/jobs");
        assert_eq!(result, "postgres://app@db.internal:5433/jobs");
    }

    #[test]
    fn test_custom_variables() {
        let ctx = VariableContextBuilder::new()
            .with_custom("region", "eu-west")
            .build();

        assert_eq!(ctx.interpolate("queue-${region}"), "queue-eu-west");
    }

    #[test]
    fn test_unknown_variable_preserved() {
        let ctx = VariableContext::new();
        let result = ctx.interpolate("Unknown: ${env.NOT_SET}");
        assert_eq!(result, "Unknown: ${env.NOT_SET}");
    }

    #[test]
    fn test_nested_braces() {
        let ctx = VariableContextBuilder::new().with_env("TOKEN", "abc").build();

        let result = ctx.interpolate(r#"{"token": "${env.TOKEN}"}"#);
        assert_eq!(result, r#"{"token": "abc"}"#);
    }
}
