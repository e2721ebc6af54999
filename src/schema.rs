//! Schema registry for the container format.
//!
//! Shapes are fixed at compile time. Each object shape lists its fields,
//! which of them are required, and `any_of` groups where at least one group
//! of fields must be present in full. Unknown fields are accepted.

use serde_json::Value;
use std::fmt;

use crate::model::ContentType;

/// Value shapes understood by the validator
#[derive(Debug)]
pub enum Shape {
    Number,
    /// Number or explicit null
    NullableNumber,
    Bool,
    Text,
    /// String restricted to a fixed set of values
    Enum(&'static [&'static str]),
    /// Any JSON object, contents unchecked
    AnyObject,
    Object(&'static ObjectShape),
    /// A single value of the inner shape, or a non-empty array of them
    OneOrMany(&'static Shape),
}

#[derive(Debug)]
pub struct Field {
    pub name: &'static str,
    pub shape: Shape,
    pub required: bool,
}

impl Field {
    const fn required(name: &'static str, shape: Shape) -> Self {
        Self {
            name,
            shape,
            required: true,
        }
    }

    const fn optional(name: &'static str, shape: Shape) -> Self {
        Self {
            name,
            shape,
            required: false,
        }
    }
}

#[derive(Debug)]
pub struct ObjectShape {
    pub name: &'static str,
    pub fields: &'static [Field],
    /// At least one of these field groups must be fully present
    pub any_of: &'static [&'static [&'static str]],
}

/// Top-level schema for one line kind
#[derive(Debug)]
pub struct Schema {
    pub name: &'static str,
    pub root: &'static ObjectShape,
}

/// One failed constraint, addressed by a dotted path
#[derive(Clone, Debug, PartialEq)]
pub struct Violation {
    pub path: String,
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

// ============================================================================
// Shape definitions
// ============================================================================

pub const CONTENT_TAGS: &[&str] = &["flightlog", "radarlog", "fusion.replay"];

pub const SOURCE_FORMATS: &[&str] = &[
    "airlink",
    "artlog",
    "courageous",
    "csgroup",
    "datcon",
    "gnettrack",
    "nmea",
    "robinradar",
    "safirmqtt",
    "senhive",
    "fusion.replay",
];

static CONTENT: Shape = Shape::Enum(CONTENT_TAGS);

static LOCATION: ObjectShape = ObjectShape {
    name: "location",
    fields: &[
        Field::required("lat", Shape::Number),
        Field::required("lon", Shape::Number),
        Field::required("alt", Shape::Number),
        Field::optional("amsl", Shape::Number),
        Field::optional("height", Shape::Number),
    ],
    any_of: &[],
};

static POLAR: ObjectShape = ObjectShape {
    name: "polar",
    fields: &[
        Field::required("bear", Shape::Number),
        Field::required("elev", Shape::Number),
    ],
    any_of: &[],
};

static POLAR_SENSOR: ObjectShape = ObjectShape {
    name: "polar_sensor",
    fields: &[
        Field::required("loc", Shape::Object(&LOCATION)),
        Field::optional("source", Shape::Text),
        Field::optional("origin", Shape::Text),
    ],
    any_of: &[],
};

static IDENTIFICATION: ObjectShape = ObjectShape {
    name: "identification",
    fields: &[
        Field::optional("int", Shape::Text),
        Field::optional("fvc", Shape::Text),
        Field::optional("icaohex", Shape::Text),
        Field::optional("icaoreg", Shape::Text),
        Field::optional("atm", Shape::Text),
    ],
    any_of: &[&["int"], &["fvc"]],
};

static POSITION: ObjectShape = ObjectShape {
    name: "position",
    fields: &[
        Field::optional("loc", Shape::Object(&LOCATION)),
        Field::optional("polar", Shape::Object(&POLAR)),
    ],
    any_of: &[&["loc"], &["polar"]],
};

static RADAR_POSITION: ObjectShape = ObjectShape {
    name: "radar position",
    fields: &[
        Field::required("polar", Shape::Object(&POLAR)),
        Field::optional("loc", Shape::Object(&LOCATION)),
    ],
    any_of: &[],
};

static ATTITUDE: ObjectShape = ObjectShape {
    name: "attitude",
    fields: &[
        Field::required("roll", Shape::Number),
        Field::required("pitch", Shape::Number),
        Field::required("yaw", Shape::Number),
    ],
    any_of: &[],
};

static TIMESTAMP: ObjectShape = ObjectShape {
    name: "timestamp",
    fields: &[
        Field::required("unix", Shape::Number),
        Field::optional("original", Shape::Text),
    ],
    any_of: &[],
};

static CELLULAR_SIGNAL: ObjectShape = ObjectShape {
    name: "cellular signal",
    fields: &[
        Field::optional("radio", Shape::Enum(&["4G", "5Gd"])),
        Field::optional("RSRP", Shape::NullableNumber),
        Field::optional("RSRQ", Shape::NullableNumber),
        Field::optional("RSSI", Shape::NullableNumber),
        Field::optional("SINR", Shape::NullableNumber),
    ],
    any_of: &[],
};

static METADATA: ObjectShape = ObjectShape {
    name: "metadata",
    fields: &[
        Field::required("content", Shape::OneOrMany(&CONTENT)),
        Field::optional("source", Shape::Enum(SOURCE_FORMATS)),
        Field::optional("origin", Shape::Text),
        Field::optional("geoid", Shape::Text),
        Field::optional("polar_sensor", Shape::Object(&POLAR_SENSOR)),
        Field::optional("cycle_length", Shape::Number),
    ],
    any_of: &[],
};

static FLIGHTLOG: ObjectShape = ObjectShape {
    name: "flightlog",
    fields: &[
        Field::required("time", Shape::Object(&TIMESTAMP)),
        Field::required("pos", Shape::Object(&POSITION)),
        Field::optional("tag", Shape::Enum(&["tgt"])),
        Field::optional("origin", Shape::Text),
        Field::optional("uaid", Shape::Object(&IDENTIFICATION)),
        Field::optional("att", Shape::Object(&ATTITUDE)),
        Field::optional("cellsig", Shape::Object(&CELLULAR_SIGNAL)),
        Field::optional("fusion", Shape::Bool),
    ],
    any_of: &[],
};

static RADARLOG: ObjectShape = ObjectShape {
    name: "radarlog",
    fields: &[
        Field::required("time", Shape::Object(&TIMESTAMP)),
        Field::required("pos", Shape::Object(&RADAR_POSITION)),
        Field::optional("tag", Shape::Enum(&["ptgt"])),
        Field::optional("origin", Shape::Text),
        Field::optional("uaid", Shape::Object(&IDENTIFICATION)),
    ],
    any_of: &[],
};

static FUSION_REPLAY: ObjectShape = ObjectShape {
    name: "fusion.replay",
    fields: &[
        Field::required(
            "event",
            Shape::Enum(&["launch", "start", "stop", "input", "output", "error"]),
        ),
        Field::required("cycle", Shape::Number),
        Field::optional("origin", Shape::Text),
        Field::optional("message", Shape::AnyObject),
        Field::optional("eid", Shape::Text),
        Field::optional("metadata", Shape::AnyObject),
    ],
    any_of: &[],
};

pub static METADATA_SCHEMA: Schema = Schema {
    name: "metadata",
    root: &METADATA,
};

static FLIGHTLOG_SCHEMA: Schema = Schema {
    name: "flightlog",
    root: &FLIGHTLOG,
};

static RADARLOG_SCHEMA: Schema = Schema {
    name: "radarlog",
    root: &RADARLOG,
};

static FUSION_REPLAY_SCHEMA: Schema = Schema {
    name: "fusion.replay",
    root: &FUSION_REPLAY,
};

// ============================================================================
// Lookup and validation
// ============================================================================

/// Look up the content schema for a tag such as `flightlog`
pub fn schema_for(tag: &str) -> Option<&'static Schema> {
    tag.parse::<ContentType>().ok().map(content_schema)
}

pub fn content_schema(content: ContentType) -> &'static Schema {
    match content {
        ContentType::FlightLog => &FLIGHTLOG_SCHEMA,
        ContentType::RadarLog => &RADARLOG_SCHEMA,
        ContentType::FusionReplay => &FUSION_REPLAY_SCHEMA,
    }
}

/// Check `value` against `schema`, collecting every violation
pub fn validate(value: &Value, schema: &Schema) -> Result<(), Vec<Violation>> {
    let mut violations = Vec::new();
    check_object(value, schema.root, "", &mut violations);

    if violations.is_empty() {
        Ok(())
    } else {
        Err(violations)
    }
}

fn join(path: &str, name: &str) -> String {
    if path.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", path, name)
    }
}

fn check_object(value: &Value, shape: &ObjectShape, path: &str, out: &mut Vec<Violation>) {
    let Some(object) = value.as_object() else {
        out.push(Violation {
            path: path.to_string(),
            message: format!("expected {} object", shape.name),
        });
        return;
    };

    for field in shape.fields {
        match object.get(field.name) {
            Some(inner) => check_shape(inner, &field.shape, &join(path, field.name), out),
            None if field.required => out.push(Violation {
                path: path.to_string(),
                message: format!("'{}' is a required property", field.name),
            }),
            None => {}
        }
    }

    if !shape.any_of.is_empty()
        && !shape
            .any_of
            .iter()
            .any(|group| group.iter().all(|name| object.contains_key(*name)))
    {
        let options: Vec<String> = shape.any_of.iter().map(|g| g.join("+")).collect();
        out.push(Violation {
            path: path.to_string(),
            message: format!("{} requires one of: {}", shape.name, options.join(", ")),
        });
    }
}

fn check_shape(value: &Value, shape: &Shape, path: &str, out: &mut Vec<Violation>) {
    let mismatch = |expected: &str| Violation {
        path: path.to_string(),
        message: format!("expected {}, found {}", expected, kind_of(value)),
    };

    match shape {
        Shape::Number => {
            if !value.is_number() {
                out.push(mismatch("number"));
            }
        }
        Shape::NullableNumber => {
            if !value.is_number() && !value.is_null() {
                out.push(mismatch("number or null"));
            }
        }
        Shape::Bool => {
            if !value.is_boolean() {
                out.push(mismatch("boolean"));
            }
        }
        Shape::Text => {
            if !value.is_string() {
                out.push(mismatch("string"));
            }
        }
        Shape::Enum(allowed) => match value.as_str() {
            Some(s) if allowed.contains(&s) => {}
            Some(s) => out.push(Violation {
                path: path.to_string(),
                message: format!("'{}' is not one of {:?}", s, allowed),
            }),
            None => out.push(mismatch("string")),
        },
        Shape::AnyObject => {
            if !value.is_object() {
                out.push(mismatch("object"));
            }
        }
        Shape::Object(object_shape) => check_object(value, object_shape, path, out),
        Shape::OneOrMany(inner) => match value.as_array() {
            Some(items) if items.is_empty() => out.push(Violation {
                path: path.to_string(),
                message: "expected at least one item".to_string(),
            }),
            Some(items) => {
                for (idx, item) in items.iter().enumerate() {
                    check_shape(item, inner, &format!("{}[{}]", path, idx), out);
                }
            }
            None => check_shape(value, inner, path, out),
        },
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn flightlog() -> &'static Schema {
        schema_for("flightlog").unwrap()
    }

    #[test]
    fn test_schema_lookup() {
        assert_eq!(schema_for("radarlog").unwrap().name, "radarlog");
        assert_eq!(schema_for("fusion.replay").unwrap().name, "fusion.replay");
        assert!(schema_for("geojson").is_none());
    }

    #[test]
    fn test_valid_flightlog() {
        let record = json!({
            "time": {"unix": 1700000000000i64},
            "uaid": {"int": "A"},
            "pos": {"loc": {"lat": 1.0, "lon": 2.0, "alt": 3.0}}
        });
        assert!(validate(&record, flightlog()).is_ok());
    }

    #[test]
    fn test_missing_required_fields() {
        let violations = validate(&json!({"pos": {}}), flightlog()).unwrap_err();
        let messages: Vec<String> = violations.iter().map(|v| v.to_string()).collect();

        assert!(messages.contains(&"'time' is a required property".to_string()));
        assert!(messages.iter().any(|m| m.starts_with("pos: position requires one of")));
    }

    #[test]
    fn test_identification_needs_int_or_fvc() {
        let record = json!({
            "time": {"unix": 1},
            "uaid": {"icaohex": "ABC123"},
            "pos": {"loc": {"lat": 1.0, "lon": 2.0, "alt": 3.0}}
        });
        let violations = validate(&record, flightlog()).unwrap_err();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].path, "uaid");

        let record = json!({
            "time": {"unix": 1},
            "uaid": {"fvc": "F-1"},
            "pos": {"polar": {"bear": 10.0, "elev": 2.0}}
        });
        assert!(validate(&record, flightlog()).is_ok());
    }

    #[test]
    fn test_radarlog_requires_polar() {
        let schema = schema_for("radarlog").unwrap();
        let geodetic = json!({
            "time": {"unix": 1},
            "pos": {"loc": {"lat": 1.0, "lon": 2.0, "alt": 3.0}}
        });
        assert!(validate(&geodetic, schema).is_err());

        let polar = json!({"time": {"unix": 1}, "pos": {"polar": {"bear": 1.0, "elev": 0.5}}});
        assert!(validate(&polar, schema).is_ok());
    }

    #[test]
    fn test_metadata_content_forms() {
        assert!(validate(&json!({"content": "flightlog"}), &METADATA_SCHEMA).is_ok());
        assert!(validate(&json!({"content": ["flightlog", "radarlog"]}), &METADATA_SCHEMA).is_ok());
        assert!(validate(&json!({"content": []}), &METADATA_SCHEMA).is_err());
        assert!(validate(&json!({"content": "kml"}), &METADATA_SCHEMA).is_err());
        assert!(validate(&json!({"source": "nmea"}), &METADATA_SCHEMA).is_err());
    }

    #[test]
    fn test_nested_type_errors_have_paths() {
        let record = json!({
            "time": {"unix": "yesterday"},
            "pos": {"loc": {"lat": 1.0, "lon": 2.0, "alt": null}}
        });
        let violations = validate(&record, flightlog()).unwrap_err();
        let paths: Vec<&str> = violations.iter().map(|v| v.path.as_str()).collect();
        assert_eq!(paths, vec!["time.unix", "pos.loc.alt"]);
    }

    #[test]
    fn test_fusion_replay_event_enum() {
        let schema = schema_for("fusion.replay").unwrap();
        assert!(validate(&json!({"event": "input", "cycle": 1, "message": {}}), schema).is_ok());
        assert!(validate(&json!({"event": "crash", "cycle": 1}), schema).is_err());
    }
}
