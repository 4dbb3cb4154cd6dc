// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Templated value extraction and command rendering.
//!
//! Device payloads are either plain text or JSON documents from which a single
//! logical value must be projected. A [`ValueTemplate`] compiles an expression
//! like `{{ value.click }}` into a field path applied to inbound payloads; a
//! [`CommandTemplate`] renders an outbound payload by substituting a value into
//! a literal skeleton like `{"brightness": {{ value }}}`.
//!
//! Templates are compiled once at configuration time; applying them never
//! re-parses the expression.
//!
//! # Examples
//!
//! ```
//! use entibus::template::{CommandTemplate, ValueTemplate};
//!
//! let extract: ValueTemplate = "{{ value.click }}".parse().unwrap();
//! let value = extract.extract(r#"{"click":"single","battery":100}"#).unwrap();
//! assert_eq!(value, "single");
//!
//! let render: CommandTemplate = r#"{"brightness": {{ value }}}"#.parse().unwrap();
//! assert_eq!(render.render(75), r#"{"brightness": 75}"#);
//! ```

use std::fmt;
use std::str::FromStr;

use serde_json::Value;

use crate::error::TemplateError;

/// Extraction rule applied to inbound payloads.
///
/// The raw form passes the payload text through unchanged. The projected form
/// parses the payload as JSON and walks a dotted field path; string values
/// render unquoted, other scalars in their JSON text form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValueTemplate {
    path: Option<Vec<String>>,
}

impl ValueTemplate {
    /// Creates a template that uses the raw payload text.
    #[must_use]
    pub fn raw() -> Self {
        Self::default()
    }

    /// Creates a projecting template for a dotted field path.
    ///
    /// Equivalent to parsing `{{ value.<path> }}` but infallible, for paths
    /// known at compile time.
    #[must_use]
    pub fn field(path: &str) -> Self {
        Self {
            path: Some(path.split('.').map(str::to_string).collect()),
        }
    }

    /// Returns `true` if this template projects a field from JSON payloads.
    #[must_use]
    pub fn is_projection(&self) -> bool {
        self.path.is_some()
    }

    /// Applies the template to a payload.
    ///
    /// # Errors
    ///
    /// For projecting templates, returns [`TemplateError::Json`] when the
    /// payload is not valid JSON, [`TemplateError::MissingField`] when the
    /// path does not resolve, and [`TemplateError::NotScalar`] when it
    /// resolves to an object or array.
    pub fn extract(&self, payload: &str) -> Result<String, TemplateError> {
        let Some(path) = &self.path else {
            return Ok(payload.to_string());
        };
        let document: Value = serde_json::from_str(payload)?;
        let mut current = &document;
        for segment in path {
            current = current
                .get(segment)
                .ok_or_else(|| TemplateError::MissingField(path.join(".")))?;
        }
        match current {
            Value::String(text) => Ok(text.clone()),
            Value::Null | Value::Bool(_) | Value::Number(_) => Ok(current.to_string()),
            Value::Array(_) | Value::Object(_) => Err(TemplateError::NotScalar(path.join("."))),
        }
    }

    /// Applies the template and parses the result as a number.
    ///
    /// # Errors
    ///
    /// Returns extraction errors as [`extract`](Self::extract), plus
    /// [`TemplateError::NotANumber`] when the extracted text is not numeric.
    pub fn extract_number(&self, payload: &str) -> Result<f64, TemplateError> {
        let text = self.extract(payload)?;
        text.trim()
            .parse::<f64>()
            .map_err(|_| TemplateError::NotANumber { value: text })
    }
}

impl FromStr for ValueTemplate {
    type Err = TemplateError;

    /// Parses a template expression.
    ///
    /// An empty expression yields the raw form; otherwise the expression must
    /// be a single `{{ value }}` or `{{ value.field.subfield }}` placeholder.
    fn from_str(expression: &str) -> Result<Self, Self::Err> {
        let trimmed = expression.trim();
        if trimmed.is_empty() {
            return Ok(Self::raw());
        }
        let path = parse_placeholder(trimmed)
            .ok_or_else(|| TemplateError::InvalidExpression(expression.to_string()))?;
        if path.is_empty() {
            // `{{ value }}` with no projection still forces JSON parsing of a
            // scalar payload; treat it as raw text instead.
            return Ok(Self::raw());
        }
        Ok(Self { path: Some(path) })
    }
}

impl fmt::Display for ValueTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.path {
            None => Ok(()),
            Some(path) => write!(f, "{{{{ value.{} }}}}", path.join(".")),
        }
    }
}

/// Rendering rule for outbound payloads.
///
/// The skeleton is a literal string with zero or more `{{ value }}` sites; each
/// site is replaced by the rendered value. An empty skeleton renders the bare
/// value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandTemplate {
    /// Literal fragments surrounding the substitution sites. A template with
    /// `n` placeholders has `n + 1` fragments; the bare form has none.
    fragments: Vec<String>,
}

impl CommandTemplate {
    /// Creates a template that renders the bare value.
    #[must_use]
    pub fn bare() -> Self {
        Self::default()
    }

    /// Creates a template that renders `prefix`, the value, then `suffix`.
    ///
    /// Equivalent to parsing `<prefix>{{ value }}<suffix>` but infallible,
    /// for skeletons known at compile time.
    #[must_use]
    pub fn wrapping(prefix: impl Into<String>, suffix: impl Into<String>) -> Self {
        Self {
            fragments: vec![prefix.into(), suffix.into()],
        }
    }

    /// Renders a value through the template.
    #[must_use]
    pub fn render<V: fmt::Display>(&self, value: V) -> String {
        if self.fragments.is_empty() {
            return value.to_string();
        }
        let rendered = value.to_string();
        let mut output = String::new();
        for (index, fragment) in self.fragments.iter().enumerate() {
            if index > 0 {
                output.push_str(&rendered);
            }
            output.push_str(fragment);
        }
        output
    }
}

impl FromStr for CommandTemplate {
    type Err = TemplateError;

    fn from_str(skeleton: &str) -> Result<Self, Self::Err> {
        if skeleton.is_empty() {
            return Ok(Self::bare());
        }
        let mut fragments = Vec::new();
        let mut rest = skeleton;
        while let Some(open) = rest.find("{{") {
            let after = &rest[open + 2..];
            let close = after
                .find("}}")
                .ok_or_else(|| TemplateError::InvalidExpression(skeleton.to_string()))?;
            if after[..close].trim() != "value" {
                return Err(TemplateError::InvalidExpression(skeleton.to_string()));
            }
            fragments.push(rest[..open].to_string());
            rest = &after[close + 2..];
        }
        fragments.push(rest.to_string());
        Ok(Self { fragments })
    }
}

/// Parses a `{{ value(.field)* }}` placeholder into its field path.
///
/// Returns `None` when the expression is not a single well-formed placeholder.
fn parse_placeholder(expression: &str) -> Option<Vec<String>> {
    let inner = expression.strip_prefix("{{")?.strip_suffix("}}")?.trim();
    let mut segments = inner.split('.');
    if segments.next()? != "value" {
        return None;
    }
    let path: Vec<String> = segments.map(str::to_string).collect();
    if path.iter().any(|segment| {
        segment.is_empty() || !segment.chars().all(|c| c.is_alphanumeric() || c == '_')
    }) {
        return None;
    }
    Some(path)
}
