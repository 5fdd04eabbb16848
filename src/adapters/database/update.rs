//! Partial conditional updates
//!
//! A [`FieldUpdate`] names the fields it touches by dotted path
//! (`"scheduled.status"`), the conditions that must hold on the current
//! document, and the sets/increments to apply when they do. Every store
//! adapter evaluates updates through [`FieldUpdate::apply`] so conditional
//! semantics are identical across backends.

use crate::domain::StoreError;
use serde::Serialize;
use serde_json::{Map, Value};

/// A predicate over one field of the stored document
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Field exists and equals the value
    Equals { path: String, value: Value },
    /// Field is missing or differs from the value
    NotEquals { path: String, value: Value },
    /// Field is an integer strictly greater than the bound
    GreaterThan { path: String, bound: i64 },
}

impl Condition {
    fn holds(&self, document: &Value) -> bool {
        match self {
            Condition::Equals { path, value } => lookup(document, path) == Some(value),
            Condition::NotEquals { path, value } => lookup(document, path) != Some(value),
            Condition::GreaterThan { path, bound } => lookup(document, path)
                .and_then(Value::as_i64)
                .is_some_and(|current| current > *bound),
        }
    }
}

/// Conditional, partial update of one document
///
/// Conditions are conjunctive. Missing intermediate objects are created by
/// sets; increments treat a missing field as zero.
///
/// # Examples
///
/// ```
/// use reportflow::adapters::database::FieldUpdate;
/// use serde_json::json;
///
/// let update = FieldUpdate::new()
///     .when_not_equals("scheduled.status", "in_progress")
///     .set("scheduled.status", "in_progress")
///     .increment("error_count", 1);
///
/// let mut doc = json!({"scheduled": {"status": "succeeded"}, "error_count": 2});
/// assert!(update.apply(&mut doc).unwrap());
/// assert_eq!(doc["scheduled"]["status"], "in_progress");
/// assert_eq!(doc["error_count"], 3);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldUpdate {
    conditions: Vec<Condition>,
    sets: Vec<(String, Value)>,
    increments: Vec<(String, i64)>,
    invalid: Option<String>,
}

impl FieldUpdate {
    /// Creates an empty, unconditional update
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `path` to equal `value`
    pub fn when_equals(mut self, path: &str, value: impl Serialize) -> Self {
        if let Some(value) = self.encode(path, value) {
            self.conditions.push(Condition::Equals {
                path: path.to_string(),
                value,
            });
        }
        self
    }

    /// Require `path` to be missing or differ from `value`
    pub fn when_not_equals(mut self, path: &str, value: impl Serialize) -> Self {
        if let Some(value) = self.encode(path, value) {
            self.conditions.push(Condition::NotEquals {
                path: path.to_string(),
                value,
            });
        }
        self
    }

    /// Require `path` to hold an integer greater than `bound`
    pub fn when_greater_than(mut self, path: &str, bound: i64) -> Self {
        self.conditions.push(Condition::GreaterThan {
            path: path.to_string(),
            bound,
        });
        self
    }

    /// Set `path` to `value`
    pub fn set(mut self, path: &str, value: impl Serialize) -> Self {
        if let Some(value) = self.encode(path, value) {
            self.sets.push((path.to_string(), value));
        }
        self
    }

    /// Add `delta` to the integer at `path`
    pub fn increment(mut self, path: &str, delta: i64) -> Self {
        self.increments.push((path.to_string(), delta));
        self
    }

    /// The conditions of this update
    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// Whether the update changes anything
    pub fn is_empty(&self) -> bool {
        self.sets.is_empty() && self.increments.is_empty()
    }

    /// Evaluate the conditions against `document` and apply the changes
    ///
    /// # Returns
    ///
    /// `Ok(true)` if the document was modified, `Ok(false)` if a condition failed.
    ///
    /// # Errors
    ///
    /// Returns an error if a value could not be encoded or a path crosses a
    /// non-object field.
    pub fn apply(&self, document: &mut Value) -> Result<bool, StoreError> {
        if let Some(message) = &self.invalid {
            return Err(StoreError::InvalidUpdate {
                path: String::new(),
                message: message.clone(),
            });
        }

        if !self.conditions.iter().all(|c| c.holds(document)) {
            return Ok(false);
        }

        for (path, value) in &self.sets {
            *slot(document, path)? = value.clone();
        }

        for (path, delta) in &self.increments {
            let field = slot(document, path)?;
            let current = match field {
                Value::Null => 0,
                Value::Number(n) => n.as_i64().ok_or_else(|| StoreError::InvalidUpdate {
                    path: path.clone(),
                    message: format!("{n} is not an integer"),
                })?,
                other => {
                    return Err(StoreError::InvalidUpdate {
                        path: path.clone(),
                        message: format!("cannot increment {other}"),
                    })
                }
            };
            *field = Value::from(current + delta);
        }

        Ok(true)
    }

    fn encode(&mut self, path: &str, value: impl Serialize) -> Option<Value> {
        match serde_json::to_value(value) {
            Ok(value) => Some(value),
            Err(e) => {
                self.invalid
                    .get_or_insert_with(|| format!("failed to encode value for {path}: {e}"));
                None
            }
        }
    }
}

/// Resolve a dotted path for reading
pub fn lookup<'a>(document: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(document, |current, segment| current.get(segment))
        .filter(|value| !value.is_null())
}

/// Resolve a dotted path for writing, creating intermediate objects
fn slot<'a>(document: &'a mut Value, path: &str) -> Result<&'a mut Value, StoreError> {
    let mut current = document;
    for segment in path.split('.') {
        if current.is_null() {
            *current = Value::Object(Map::new());
        }
        current = match current {
            Value::Object(map) => map.entry(segment.to_string()).or_insert(Value::Null),
            other => {
                return Err(StoreError::InvalidUpdate {
                    path: path.to_string(),
                    message: format!("segment '{segment}' crosses non-object value {other}"),
                })
            }
        };
    }
    Ok(current)
}
