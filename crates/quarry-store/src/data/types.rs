//! Values, queries and query results exchanged with the graph engine

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::data::entities::EntityId;
use crate::data::errors::StoreError;

/// Property, parameter and column value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    Entity(EntityId),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_entity(&self) -> Option<EntityId> {
        match self {
            Value::Entity(id) => Some(*id),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    // Helper to convert Value to Json
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Integer(i) => serde_json::json!(i),
            Value::Float(f) => serde_json::json!(f),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::List(items) => serde_json::Value::Array(items.iter().map(Value::to_json).collect()),
            Value::Map(map) => {
                let mut json_obj = serde_json::Map::new();
                for (k, v) in map {
                    json_obj.insert(k.clone(), v.to_json());
                }
                serde_json::Value::Object(json_obj)
            }
            Value::Entity(id) => serde_json::json!(id.0),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Integer(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<EntityId> for Value {
    fn from(id: EntityId) -> Self {
        Value::Entity(id)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => Value::Float(n.as_f64().unwrap_or_default()),
            },
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => Value::List(items.into_iter().map(Value::from).collect()),
            serde_json::Value::Object(obj) => {
                Value::Map(obj.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

/// Named query parameters.
pub type Parameters = HashMap<String, Value>;

/// A query in the engine's native form.
///
/// The store does not interpret the statement: the Neo4j engine runs it as
/// Cypher, the in-memory engine resolves it to a registered procedure.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Query {
    statement: String,
}

impl Query {
    pub fn new(statement: impl Into<String>) -> Self {
        Self {
            statement: statement.into(),
        }
    }

    pub fn statement(&self) -> &str {
        &self.statement
    }
}

impl From<&str> for Query {
    fn from(statement: &str) -> Self {
        Query::new(statement)
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.statement)
    }
}

/// One composite result row; columns are addressed by name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    values: HashMap<String, Value>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(column.into(), value.into());
        self
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values.get(column)
    }

    /// Reads an integer column, failing if it is absent or of another type.
    pub fn get_i64(&self, column: &str) -> Result<i64, StoreError> {
        self.get(column)
            .and_then(Value::as_i64)
            .ok_or_else(|| StoreError::MappingError(format!("Column {} is not an integer", column)))
    }

    /// Reads a string column, failing if it is absent or of another type.
    pub fn get_str(&self, column: &str) -> Result<&str, StoreError> {
        self.get(column)
            .and_then(Value::as_str)
            .ok_or_else(|| StoreError::MappingError(format!("Column {} is not a string", column)))
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn into_map(self) -> HashMap<String, Value> {
        self.values
    }
}

impl FromIterator<(String, Value)> for Row {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

type RowIter = Box<dyn Iterator<Item = Result<Row, StoreError>> + Send>;

/// Lazy, single-pass sequence of result rows.
///
/// Rows that cannot be produced surface as `Err` items while iterating;
/// failures at submission are reported by `execute_query` itself.
pub struct QueryResult {
    columns: Vec<String>,
    rows: RowIter,
}

impl QueryResult {
    pub fn new<I>(columns: Vec<String>, rows: I) -> Self
    where
        I: IntoIterator<Item = Result<Row, StoreError>>,
        I::IntoIter: Send + 'static,
    {
        Self {
            columns,
            rows: Box::new(rows.into_iter()),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new(), std::iter::empty())
    }

    /// Column names as declared by the engine, possibly empty.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Consumes the result expecting at most one row.
    pub fn single(mut self) -> Result<Option<Row>, StoreError> {
        let first = self.rows.next().transpose()?;
        if first.is_some() && self.rows.next().is_some() {
            return Err(StoreError::MappingError(
                "Expected a single row but the result has more".to_string(),
            ));
        }
        Ok(first)
    }
}

impl Iterator for QueryResult {
    type Item = Result<Row, StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.rows.next()
    }
}

impl fmt::Debug for QueryResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryResult")
            .field("columns", &self.columns)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_from_json() {
        let value = Value::from(serde_json::json!({"name": "Foo", "lines": 12, "ratio": 0.5}));
        let Value::Map(map) = value else {
            panic!("Expected a map");
        };
        assert_eq!(map["name"], Value::String("Foo".into()));
        assert_eq!(map["lines"], Value::Integer(12));
        assert_eq!(map["ratio"], Value::Float(0.5));
    }

    #[test]
    fn test_row_accessors() {
        let row = Row::new().with("count", 3).with("name", "com.acme.Foo");
        assert_eq!(row.get_i64("count").unwrap(), 3);
        assert_eq!(row.get_str("name").unwrap(), "com.acme.Foo");
        assert!(matches!(row.get_i64("name"), Err(StoreError::MappingError(_))));
        assert!(row.get("missing").is_none());
    }

    #[test]
    fn test_single_rejects_multiple_rows() {
        let result = QueryResult::new(vec![], vec![Ok(Row::new()), Ok(Row::new())]);
        assert!(matches!(result.single(), Err(StoreError::MappingError(_))));
        assert!(QueryResult::empty().single().unwrap().is_none());
    }

    #[test]
    fn test_iteration_surfaces_row_errors() {
        let rows = vec![
            Ok(Row::new().with("n", 1)),
            Err(StoreError::MappingError("bad row".into())),
        ];
        let mut result = QueryResult::new(vec!["n".into()], rows);
        assert!(result.next().unwrap().is_ok());
        assert!(result.next().unwrap().is_err());
        assert!(result.next().is_none());
    }
}
