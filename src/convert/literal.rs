// =============================================================================
// Literal Coercion
// =============================================================================
// Literal <-> Value conversion under strict or lenient typing

use crate::entity::ValueType;
use crate::mapping::PropertyMapping;
use crate::model::vocab::xsd;
use crate::model::{Literal, Node, Value};
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use thiserror::Error;

/// Why a literal did not become a value. The converter attaches the subject,
/// predicate and literal before reporting it as a typing error.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LiteralError {
    #[error("datatype {actual} is not acceptable, expected {expected}")]
    InvalidDatatype { expected: String, actual: String },

    #[error("{0}")]
    Malformed(String),

    #[error("expected a literal, got a resource")]
    NotALiteral,
}

fn datatype_label(lit: &Literal) -> String {
    match (&lit.datatype, &lit.language) {
        (_, Some(lang)) => format!("language-tagged string @{lang}"),
        (Some(dt), None) => dt.clone(),
        (None, None) => "plain literal".to_string(),
    }
}

/// Datatypes strict mode accepts for a target type with no explicit datatype.
fn compatible(value_type: &ValueType, lit: &Literal) -> bool {
    let dt = lit.datatype.as_deref();
    match value_type {
        ValueType::String => lit.is_simple_string() || lit.language.is_some(),
        ValueType::Boolean => dt == Some(xsd::BOOLEAN),
        ValueType::Integer => dt.is_some_and(|d| xsd::INTEGER_TYPES.contains(&d)),
        ValueType::Float => {
            dt.is_some_and(|d| xsd::FLOAT_TYPES.contains(&d) || xsd::INTEGER_TYPES.contains(&d))
        }
        ValueType::DateTime => dt == Some(xsd::DATE_TIME),
        ValueType::Iri => dt == Some(xsd::ANY_URI),
        ValueType::Entity(_) | ValueType::Key | ValueType::Opaque(_) => false,
    }
}

fn parse_bool(s: &str) -> Result<bool, LiteralError> {
    match s.trim().to_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(LiteralError::Malformed(format!("invalid boolean value: {s}"))),
    }
}

fn parse_float(s: &str) -> Result<f64, LiteralError> {
    match s.trim() {
        "INF" => Ok(f64::INFINITY),
        "-INF" => Ok(f64::NEG_INFINITY),
        other => other
            .parse::<f64>()
            .map_err(|e| LiteralError::Malformed(format!("invalid float value {s:?}: {e}"))),
    }
}

fn parse_date_time(s: &str) -> Result<DateTime<Utc>, LiteralError> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|e| LiteralError::Malformed(format!("invalid dateTime value {s:?}: {e}")))
}

fn parse_lexical(value_type: &ValueType, lexical: &str) -> Result<Value, LiteralError> {
    match value_type {
        ValueType::String => Ok(Value::Str(lexical.to_string())),
        ValueType::Iri => Ok(Value::Iri(lexical.to_string())),
        ValueType::Boolean => parse_bool(lexical).map(Value::Bool),
        ValueType::Integer => lexical
            .trim()
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|e| {
                LiteralError::Malformed(format!("invalid integer value {lexical:?}: {e}"))
            }),
        ValueType::Float => parse_float(lexical).map(Value::Float),
        ValueType::DateTime => parse_date_time(lexical).map(Value::DateTime),
        ValueType::Entity(_) | ValueType::Key | ValueType::Opaque(_) => Err(LiteralError::Malformed(
            format!("{value_type} has no literal form"),
        )),
    }
}

/// Converts the object of a statement to the mapping's declared value type.
///
/// Strict mode checks the datatype first: an explicit mapping datatype must
/// match exactly, otherwise the datatype must be one compatible with the
/// target type (plain and language-tagged literals count as strings). Lenient
/// mode ignores datatypes and parses the lexical form.
pub fn node_to_value(
    node: &Node,
    mapping: &PropertyMapping,
    strict: bool,
) -> Result<Value, LiteralError> {
    let value_type = &mapping.property.value_type;
    let lit = match node {
        Node::Literal(lit) => lit,
        Node::Resource { iri } if *value_type == ValueType::Iri => {
            return Ok(Value::Iri(iri.clone()));
        }
        Node::Resource { iri } if !strict && *value_type == ValueType::String => {
            return Ok(Value::Str(iri.clone()));
        }
        Node::Resource { .. } | Node::Anonymous { .. } => return Err(LiteralError::NotALiteral),
    };

    if strict {
        let ok = match mapping.datatype.as_deref() {
            Some(expected) if expected == xsd::STRING => lit.is_simple_string(),
            Some(expected) => lit.datatype.as_deref() == Some(expected),
            None => compatible(value_type, lit),
        };
        if !ok {
            let expected = mapping
                .datatype
                .clone()
                .unwrap_or_else(|| value_type.to_string());
            return Err(LiteralError::InvalidDatatype {
                expected,
                actual: datatype_label(lit),
            });
        }
    }
    parse_lexical(value_type, &lit.value)
}

fn format_float(f: f64) -> String {
    if f.is_infinite() {
        if f > 0.0 { "INF".into() } else { "-INF".into() }
    } else {
        f.to_string()
    }
}

/// Object node for a scalar value.
///
/// The mapping's explicit datatype is always written; the default datatype
/// for the value is written only under strict typing. Strings carry the
/// mapping's language tag when it has one. Entity values have no literal form
/// and yield `None`.
pub fn value_to_node(value: &Value, mapping: &PropertyMapping, strict: bool) -> Option<Node> {
    let (lexical, default_dt) = match value {
        Value::Str(s) => {
            if let Some(lang) = &mapping.language {
                return Some(Node::literal(Literal::tagged(s.clone(), lang.clone())));
            }
            (s.clone(), None)
        }
        Value::Iri(iri) => return Some(Node::resource(iri.clone())),
        Value::Bool(b) => (b.to_string(), Some(xsd::BOOLEAN)),
        Value::Int(i) => (i.to_string(), Some(xsd::INTEGER)),
        Value::Float(f) => (format_float(*f), Some(xsd::DOUBLE)),
        Value::DateTime(dt) => (
            dt.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            Some(xsd::DATE_TIME),
        ),
        Value::Entity(_) | Value::List(_) | Value::Set(_) => return None,
    };

    let datatype = match &mapping.datatype {
        Some(explicit) => Some(explicit.clone()),
        None if strict => default_dt.map(str::to_string),
        None => None,
    };
    Some(Node::literal(Literal {
        value: lexical,
        datatype,
        language: None,
    }))
}
