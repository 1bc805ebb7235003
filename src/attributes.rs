//! Generic type attributes.
//!
//! Attributes carry metadata (candidate names, descriptions, ...) alongside a
//! node. The graph engine never inspects payloads; it only invokes each
//! kind's combine operation when two nodes merge. A kind is registered by
//! implementing `AttributeValue` — {default, combine} is the whole contract.

use std::any::Any;
use std::fmt;

use indexmap::{IndexMap, IndexSet};

/// One attribute payload. Combination is closed per kind: `combined` is only
/// ever called with another value of the same kind (same `kind()` id);
/// anything else is a programming-invariant violation.
pub trait AttributeValue: fmt::Debug {
    /// Stable identifier of the attribute kind.
    fn kind(&self) -> &'static str;
    fn combined(&self, other: &dyn AttributeValue) -> Box<dyn AttributeValue>;
    fn clone_box(&self) -> Box<dyn AttributeValue>;
    fn as_any(&self) -> &dyn Any;
}

impl Clone for Box<dyn AttributeValue> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

fn downcast<'a, T: 'static>(kind: &'static str, other: &'a dyn AttributeValue) -> &'a T {
    other
        .as_any()
        .downcast_ref::<T>()
        .unwrap_or_else(|| panic!("attribute kind {kind:?} combined with a foreign payload"))
}

/// Attribute-kind → payload mapping attached to a type reference.
///
/// Combining never overwrites: payloads of the same kind merge through the
/// kind's combine operation, distinct kinds are kept side by side. A kind
/// that is absent is at its default.
#[derive(Clone, Debug, Default)]
pub struct TypeAttributes {
    entries: IndexMap<&'static str, Box<dyn AttributeValue>>,
}

impl TypeAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(value: impl AttributeValue + 'static) -> Self {
        let mut out = Self::new();
        out.set(value);
        out
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Install or merge one payload.
    pub fn set(&mut self, value: impl AttributeValue + 'static) {
        let kind = value.kind();
        match self.entries.get(kind) {
            Some(existing) => {
                let merged = existing.combined(&value);
                self.entries.insert(kind, merged);
            }
            None => {
                self.entries.insert(kind, Box::new(value));
            }
        }
    }

    pub fn get<T: 'static>(&self, kind: &'static str) -> Option<&T> {
        self.entries.get(kind)?.as_any().downcast_ref::<T>()
    }

    /// Merge `other` in, kind by kind.
    pub fn combine_from(&mut self, other: &TypeAttributes) {
        for (kind, value) in &other.entries {
            match self.entries.get(*kind) {
                Some(existing) => {
                    let merged = existing.combined(value.as_ref());
                    self.entries.insert(kind, merged);
                }
                None => {
                    self.entries.insert(kind, value.clone());
                }
            }
        }
    }

    pub fn combined_with(mut self, other: &TypeAttributes) -> TypeAttributes {
        self.combine_from(other);
        self
    }
}

// ————————————————————————————————————————————————————————————————————————————
// SHIPPED ATTRIBUTE KINDS
// ————————————————————————————————————————————————————————————————————————————

pub const NAMES_ATTRIBUTE: &str = "names";
pub const DESCRIPTIONS_ATTRIBUTE: &str = "descriptions";

/// Candidate names for a node, with a flag telling whether they were inferred
/// from structure (property names) or given by the caller.
#[derive(Clone, Debug, Default)]
pub struct TypeNames {
    pub candidates: IndexSet<String>,
    pub inferred: bool,
}

impl TypeNames {
    pub fn given(name: impl Into<String>) -> Self {
        let mut candidates = IndexSet::new();
        candidates.insert(name.into());
        TypeNames { candidates, inferred: false }
    }

    pub fn inferred(name: impl Into<String>) -> Self {
        let mut names = Self::given(name);
        names.inferred = true;
        names
    }

    pub fn preferred(&self) -> Option<&str> {
        self.candidates.first().map(String::as_str)
    }
}

impl AttributeValue for TypeNames {
    fn kind(&self) -> &'static str {
        NAMES_ATTRIBUTE
    }

    fn combined(&self, other: &dyn AttributeValue) -> Box<dyn AttributeValue> {
        let other = downcast::<TypeNames>(NAMES_ATTRIBUTE, other);
        // Given names win over inferred ones; equal standing unions the sets.
        match (self.inferred, other.inferred) {
            (false, true) => Box::new(self.clone()),
            (true, false) => Box::new(other.clone()),
            _ => {
                let mut candidates = self.candidates.clone();
                candidates.extend(other.candidates.iter().cloned());
                Box::new(TypeNames { candidates, inferred: self.inferred })
            }
        }
    }

    fn clone_box(&self) -> Box<dyn AttributeValue> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Human descriptions; combine is concatenation with duplicates dropped.
#[derive(Clone, Debug, Default)]
pub struct Descriptions {
    pub lines: Vec<String>,
}

impl Descriptions {
    pub fn single(line: impl Into<String>) -> Self {
        Descriptions { lines: vec![line.into()] }
    }
}

impl AttributeValue for Descriptions {
    fn kind(&self) -> &'static str {
        DESCRIPTIONS_ATTRIBUTE
    }

    fn combined(&self, other: &dyn AttributeValue) -> Box<dyn AttributeValue> {
        let other = downcast::<Descriptions>(DESCRIPTIONS_ATTRIBUTE, other);
        let mut lines = self.lines.clone();
        for line in &other.lines {
            if !lines.contains(line) {
                lines.push(line.clone());
            }
        }
        Box::new(Descriptions { lines })
    }

    fn clone_box(&self) -> Box<dyn AttributeValue> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_union_when_equal_standing() {
        let mut a = TypeAttributes::with(TypeNames::given("person"));
        a.combine_from(&TypeAttributes::with(TypeNames::given("user")));
        let names = a.get::<TypeNames>(NAMES_ATTRIBUTE).unwrap();
        assert_eq!(
            names.candidates.iter().collect::<Vec<_>>(),
            vec!["person", "user"]
        );
        assert!(!names.inferred);
    }

    #[test]
    fn given_names_beat_inferred_names() {
        let mut a = TypeAttributes::with(TypeNames::inferred("address"));
        a.combine_from(&TypeAttributes::with(TypeNames::given("Location")));
        let names = a.get::<TypeNames>(NAMES_ATTRIBUTE).unwrap();
        assert_eq!(names.preferred(), Some("Location"));
        assert!(!names.inferred);
        assert_eq!(names.candidates.len(), 1);
    }

    #[test]
    fn distinct_kinds_are_kept_side_by_side() {
        let mut a = TypeAttributes::with(TypeNames::given("thing"));
        a.combine_from(&TypeAttributes::with(Descriptions::single("a thing")));
        assert!(a.get::<TypeNames>(NAMES_ATTRIBUTE).is_some());
        assert!(a.get::<Descriptions>(DESCRIPTIONS_ATTRIBUTE).is_some());
    }

    #[test]
    fn descriptions_concatenate_without_duplicates() {
        let mut a = TypeAttributes::with(Descriptions::single("first"));
        let mut b = TypeAttributes::with(Descriptions::single("second"));
        b.combine_from(&TypeAttributes::with(Descriptions::single("first")));
        a.combine_from(&b);
        let d = a.get::<Descriptions>(DESCRIPTIONS_ATTRIBUTE).unwrap();
        assert_eq!(d.lines, vec!["first", "second"]);
    }
}
