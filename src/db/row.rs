//! Conversion between SQLite values and JSON row objects.

use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{Connection, Params};
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Number, Value};

use crate::error::Error;

/// One result row keyed by column name.
pub type Row = Map<String, Value>;

/// Run a query and collect every row as a JSON object.
pub(crate) fn query_rows<P: Params>(conn: &Connection, sql: &str, params: P) -> Result<Vec<Row>, Error> {
    let mut stmt = conn.prepare(sql)?;
    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let mut rows = stmt.query(params)?;

    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let mut obj = Map::with_capacity(columns.len());
        for (idx, name) in columns.iter().enumerate() {
            obj.insert(name.clone(), to_json(row.get_ref(idx)?));
        }
        out.push(obj);
    }
    Ok(out)
}

/// SQLite value to JSON. Blobs become arrays of byte values.
pub fn to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::Array(b.iter().map(|byte| Value::from(*byte)).collect()),
    }
}

/// JSON to a bindable SQLite value. Nested arrays and objects are stored as
/// their JSON text.
pub fn from_json(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => n.as_f64().map(SqlValue::Real).unwrap_or(SqlValue::Null),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

/// Deserialize a 0/1 integer column into `bool`.
pub fn bool_from_int<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(i64::deserialize(deserializer)? != 0)
}

/// Escape LIKE wildcards so user text matches literally (use with `ESCAPE '\'`).
pub fn escape_like(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_query_rows_types() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE t (i INTEGER, r REAL, s TEXT, b BLOB, n TEXT);
             INSERT INTO t VALUES (3, 1.5, 'hi', x'0102', NULL);",
        )
        .unwrap();

        let rows = query_rows(&conn, "SELECT * FROM t", []).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(
            Value::Object(rows[0].clone()),
            json!({"i": 3, "r": 1.5, "s": "hi", "b": [1, 2], "n": null})
        );
    }

    #[test]
    fn test_query_rows_empty() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (i INTEGER);").unwrap();
        assert!(query_rows(&conn, "SELECT * FROM t", []).unwrap().is_empty());
    }

    #[test]
    fn test_from_json() {
        assert_eq!(from_json(&json!(true)), SqlValue::Integer(1));
        assert_eq!(from_json(&json!(42)), SqlValue::Integer(42));
        assert_eq!(from_json(&json!(2.5)), SqlValue::Real(2.5));
        assert_eq!(from_json(&json!("x")), SqlValue::Text("x".to_string()));
        assert_eq!(from_json(&json!(null)), SqlValue::Null);
        assert_eq!(from_json(&json!({"a": 1})), SqlValue::Text("{\"a\":1}".to_string()));
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("100%"), "100\\%");
        assert_eq!(escape_like("a_b"), "a\\_b");
        assert_eq!(escape_like("back\\slash"), "back\\\\slash");
    }
}
