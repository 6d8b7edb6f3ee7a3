//! Sample-input generation from operation shape descriptions.
//!
//! Walks a shape tree and emits a default-valued JSON document, used when
//! `--generate-cli-skeleton` asks for a sample input instead of running
//! the command.

use std::collections::BTreeMap;
use std::io::Write;

use serde::Deserialize;
use serde_json::{Map, Value};

/// A declarative description of an operation's input structure.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Shape {
    Object {
        #[serde(default)]
        members: BTreeMap<String, Shape>,
    },
    List {
        member: Box<Shape>,
    },
    Map {
        value: Box<Shape>,
    },
    String,
    Integer,
    Double,
    Boolean,
    Blob,
}

/// Produces a default-valued document for the shape. `None` (an
/// operation with no input) yields an empty object.
pub fn generate_skeleton(shape: Option<&Shape>) -> Value {
    match shape {
        None => Value::Object(Map::new()),
        Some(Shape::Object { members }) => Value::Object(
            members
                .iter()
                .map(|(name, member)| (name.clone(), generate_skeleton(Some(member))))
                .collect(),
        ),
        // One element showing the member's structure.
        Some(Shape::List { member }) => Value::Array(vec![generate_skeleton(Some(member))]),
        Some(Shape::Map { value }) => {
            let mut map = Map::new();
            map.insert("string".to_string(), generate_skeleton(Some(value)));
            Value::Object(map)
        }
        Some(Shape::String) | Some(Shape::Blob) => Value::String(String::new()),
        Some(Shape::Integer) => Value::from(0),
        Some(Shape::Double) => Value::from(0.0),
        Some(Shape::Boolean) => Value::Bool(false),
    }
}

/// Dispatcher hook for the `--generate-cli-skeleton` flag.
pub struct GenerateCliSkeletonArg {
    requested: bool,
}

impl GenerateCliSkeletonArg {
    pub fn new(requested: bool) -> Self {
        Self { requested }
    }

    /// When the flag was given, writes the pretty-printed skeleton to
    /// `out` and returns `false` to tell the caller not to run the real
    /// operation. Otherwise returns `true`.
    pub fn invoke(
        &self,
        input_shape: Option<&Shape>,
        out: &mut dyn Write,
    ) -> anyhow::Result<bool> {
        if !self.requested {
            return Ok(true);
        }
        let skeleton = generate_skeleton(input_shape);
        serde_json::to_writer_pretty(&mut *out, &skeleton)?;
        writeln!(out)?;
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shape(json: serde_json::Value) -> Shape {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_scalars_default() {
        assert_eq!(
            generate_skeleton(Some(&shape(serde_json::json!({"type": "string"})))),
            Value::String(String::new())
        );
        assert_eq!(
            generate_skeleton(Some(&shape(serde_json::json!({"type": "integer"})))),
            Value::from(0)
        );
        assert_eq!(
            generate_skeleton(Some(&shape(serde_json::json!({"type": "boolean"})))),
            Value::Bool(false)
        );
    }

    #[test]
    fn test_nested_object_list_map() {
        let described = shape(serde_json::json!({
            "type": "object",
            "members": {
                "clusterName": {"type": "string"},
                "nodeCount": {"type": "integer"},
                "tags": {"type": "map", "value": {"type": "string"}},
                "instances": {
                    "type": "list",
                    "member": {
                        "type": "object",
                        "members": {"id": {"type": "string"}, "spot": {"type": "boolean"}}
                    }
                }
            }
        }));
        let skeleton = generate_skeleton(Some(&described));
        assert_eq!(
            skeleton,
            serde_json::json!({
                "clusterName": "",
                "nodeCount": 0,
                "tags": {"string": ""},
                "instances": [{"id": "", "spot": false}]
            })
        );
    }

    #[test]
    fn test_no_input_shape_is_empty_object() {
        assert_eq!(generate_skeleton(None), serde_json::json!({}));
    }

    #[test]
    fn test_arg_not_requested_runs_operation() {
        let mut out = Vec::new();
        let proceed = GenerateCliSkeletonArg::new(false)
            .invoke(None, &mut out)
            .unwrap();
        assert!(proceed);
        assert!(out.is_empty());
    }

    #[test]
    fn test_arg_requested_prints_and_skips_operation() {
        let described = shape(serde_json::json!({
            "type": "object",
            "members": {"accountId": {"type": "string"}}
        }));
        let mut out = Vec::new();
        let proceed = GenerateCliSkeletonArg::new(true)
            .invoke(Some(&described), &mut out)
            .unwrap();
        assert!(!proceed);
        let rendered = String::from_utf8(out).unwrap();
        assert!(rendered.ends_with('\n'));
        let parsed: Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(parsed, serde_json::json!({"accountId": ""}));
    }
}
