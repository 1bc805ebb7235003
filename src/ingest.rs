//! Sample ingestion: raw JSON documents → the first graph generation.
//!
//! Each document folds into a shape accumulator (one arm per value kind, the
//! same partitioning the union engine uses later) and the accumulator builds
//! one candidate root. Arrays fold all their elements into a single item
//! shape; objects fold into one class shape where a property missing from
//! some sibling objects becomes optional. Merging *across* documents is not
//! done here; that is the unification pass's job.

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::builder::TypeBuilder;
use crate::error::{Error, Result};
use crate::graph::TypeGraph;
use crate::typ::{ClassProperty, TypeKind, TypeRef};

// ————————————————————————————————————————————————————————————————————————————
// STRING FORMATS
// ————————————————————————————————————————————————————————————————————————————

static DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d{4}-(?:0[1-9]|1[0-2])-(?:0[1-9]|[12]\d|3[01])$").unwrap()
});

static TIME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:[01]\d|2[0-3]):[0-5]\d(?::[0-5]\d(?:\.\d+)?)?(?:[zZ]|[+-](?:[01]\d|2[0-3]):?[0-5]\d)?$")
        .unwrap()
});

static DATE_TIME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^\d{4}-(?:0[1-9]|1[0-2])-(?:0[1-9]|[12]\d|3[01])[Tt ](?:[01]\d|2[0-3]):[0-5]\d(?::[0-5]\d(?:\.\d+)?)?(?:[zZ]|[+-](?:[01]\d|2[0-3]):?[0-5]\d)?$",
    )
    .unwrap()
});

/// Which textual formats ingestion promotes to dedicated kinds.
#[derive(Clone, Copy, Debug)]
pub struct StringFormats {
    pub dates: bool,
    pub times: bool,
    pub date_times: bool,
}

impl Default for StringFormats {
    fn default() -> Self {
        StringFormats { dates: true, times: true, date_times: true }
    }
}

impl StringFormats {
    /// Every string stays a plain string.
    pub fn none() -> Self {
        StringFormats { dates: false, times: false, date_times: false }
    }

    /// Kind for one observed string. `TypeKind::String` when no enabled
    /// format matches.
    pub fn recognize(&self, s: &str) -> TypeKind {
        if self.date_times && DATE_TIME.is_match(s) {
            TypeKind::DateTime
        } else if self.dates && DATE.is_match(s) {
            TypeKind::Date
        } else if self.times && TIME.is_match(s) {
            TypeKind::Time
        } else {
            TypeKind::String
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// SHAPE ACCUMULATION
// ————————————————————————————————————————————————————————————————————————————

/// Sufficient statistics for every value observed at one position.
#[derive(Debug, Default)]
struct ValueShape {
    have_null: bool,
    have_bool: bool,
    have_integer: bool,
    have_double: bool,
    have_date: bool,
    have_time: bool,
    have_date_time: bool,
    string_cases: IndexMap<String, usize>,
    /// Present once any array was seen, even an empty one.
    items: Option<Box<ValueShape>>,
    object_count: usize,
    /// Property name → (shape of its values, number of objects carrying it).
    properties: IndexMap<String, (ValueShape, usize)>,
}

impl ValueShape {
    fn observe(&mut self, value: &Value, formats: &StringFormats) {
        match value {
            Value::Null => self.have_null = true,
            Value::Bool(_) => self.have_bool = true,
            Value::Number(n) => {
                if n.is_i64() || n.is_u64() {
                    self.have_integer = true;
                } else {
                    self.have_double = true;
                }
            }
            Value::String(s) => match formats.recognize(s) {
                TypeKind::Date => self.have_date = true,
                TypeKind::Time => self.have_time = true,
                TypeKind::DateTime => self.have_date_time = true,
                _ => {
                    *self.string_cases.entry(s.clone()).or_insert(0) += 1;
                }
            },
            Value::Array(elements) => {
                let items = self.items.get_or_insert_with(Default::default);
                for element in elements {
                    items.observe(element, formats);
                }
            }
            Value::Object(members) => {
                self.object_count += 1;
                for (name, v) in members {
                    let slot = self.properties.entry(name.clone()).or_default();
                    slot.0.observe(v, formats);
                    slot.1 += 1;
                }
            }
        }
    }

    /// Lower the accumulated shape into graph nodes. A shape that observed
    /// nothing (the items of an always-empty array) lowers to null.
    fn build(&self, builder: &mut TypeBuilder) -> TypeRef {
        let mut members: Vec<TypeRef> = Vec::new();
        let flags = [
            (self.have_null, TypeKind::Null),
            (self.have_bool, TypeKind::Bool),
            (self.have_integer, TypeKind::Integer),
            (self.have_double, TypeKind::Double),
            (self.have_date, TypeKind::Date),
            (self.have_time, TypeKind::Time),
            (self.have_date_time, TypeKind::DateTime),
        ];
        for (present, kind) in flags {
            if present {
                members.push(builder.get_primitive(kind, None));
            }
        }
        if !self.string_cases.is_empty() {
            members.push(builder.get_string(Some(self.string_cases.clone()), None));
        }
        if let Some(items) = &self.items {
            let items = items.build(builder);
            members.push(builder.get_array(items, None));
        }
        if self.object_count > 0 {
            let mut properties = IndexMap::new();
            for (name, (shape, seen)) in &self.properties {
                let type_ref = shape.build(builder);
                properties.insert(name.clone(), ClassProperty::new(type_ref, *seen < self.object_count));
            }
            members.push(builder.get_class(properties, None, None));
        }
        match members.len() {
            0 => builder.get_primitive(TypeKind::Null, None),
            1 => members[0],
            _ => builder.get_union(members, None),
        }
    }
}

/// Build generation zero: one candidate root per document.
pub fn initial_graph(samples: &[Value], formats: &StringFormats) -> Result<TypeGraph> {
    if samples.is_empty() {
        return Err(Error::NoInput);
    }
    let mut builder = TypeBuilder::new();
    let mut roots = IndexMap::new();
    for (i, sample) in samples.iter().enumerate() {
        let mut shape = ValueShape::default();
        shape.observe(sample, formats);
        let root = shape.build(&mut builder);
        roots.insert(format!("sample{i}"), root);
    }
    Ok(builder.finish(roots))
}
