//! Type nodes: the value kinds a graph generation is made of.
//!
//! A `Type` is a closed sum over every kind the engine knows; dispatch is a
//! total `match` so adding a kind is a forced update everywhere it matters.
//! Child positions hold `TypeRef` handles into the owning generation, never
//! owned boxes, so recursive shapes are finite by construction.

use indexmap::{IndexMap, IndexSet};

/// Stable handle for a node within one graph generation.
///
/// Refs are never reused across generations: a rewrite yields an entirely
/// new reference space plus an explicit old→new mapping.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct TypeRef(pub(crate) u32);

impl TypeRef {
    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub(crate) fn from_index(i: usize) -> Self {
        TypeRef(u32::try_from(i).expect("type graph exceeds u32 address space"))
    }
}

/// Discriminant for a `Type`, used for union bucketing and invariants.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub enum TypeKind {
    Null,
    Bool,
    Integer,
    Double,
    String,
    Date,
    Time,
    DateTime,
    Enum,
    Array,
    Map,
    Class,
    Union,
}

impl TypeKind {
    /// Kinds a fresh primitive node can be asked for directly.
    pub fn is_primitive(self) -> bool {
        matches!(
            self,
            TypeKind::Null
                | TypeKind::Bool
                | TypeKind::Integer
                | TypeKind::Double
                | TypeKind::String
                | TypeKind::Date
                | TypeKind::Time
                | TypeKind::DateTime
        )
    }

    /// String-shaped kinds: the ones the flattening pass may collapse.
    pub fn is_string_like(self) -> bool {
        matches!(
            self,
            TypeKind::String | TypeKind::Enum | TypeKind::Date | TypeKind::Time | TypeKind::DateTime
        )
    }
}

/// One property of a class node.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct ClassProperty {
    pub type_ref: TypeRef,
    pub is_optional: bool,
}

impl ClassProperty {
    pub fn new(type_ref: TypeRef, is_optional: bool) -> Self {
        ClassProperty { type_ref, is_optional }
    }
}

/// A type node.
///
/// String nodes optionally carry an enum-candidacy histogram (observed
/// literal → occurrence count). The histogram survives only until the enum
/// inference pass decides enum vs. plain string.
#[derive(Clone, PartialEq, Debug)]
pub enum Type {
    Null,
    Bool,
    Integer,
    Double,
    String {
        /// Enum candidacy histogram; `None` once the slot admits
        /// unrestricted strings.
        cases: Option<IndexMap<String, usize>>,
    },
    Date,
    Time,
    DateTime,
    Enum {
        /// Semantically unordered; first-seen order kept for stable output.
        cases: IndexSet<String>,
    },
    Array {
        items: TypeRef,
    },
    Map {
        values: TypeRef,
    },
    Class {
        properties: IndexMap<String, ClassProperty>,
        /// `None` means the object is closed.
        additional: Option<TypeRef>,
    },
    Union {
        /// One member per kind; never fewer than two members.
        members: Vec<TypeRef>,
    },
}

impl Type {
    pub fn kind(&self) -> TypeKind {
        match self {
            Type::Null => TypeKind::Null,
            Type::Bool => TypeKind::Bool,
            Type::Integer => TypeKind::Integer,
            Type::Double => TypeKind::Double,
            Type::String { .. } => TypeKind::String,
            Type::Date => TypeKind::Date,
            Type::Time => TypeKind::Time,
            Type::DateTime => TypeKind::DateTime,
            Type::Enum { .. } => TypeKind::Enum,
            Type::Array { .. } => TypeKind::Array,
            Type::Map { .. } => TypeKind::Map,
            Type::Class { .. } => TypeKind::Class,
            Type::Union { .. } => TypeKind::Union,
        }
    }

    /// Child references, in declaration order.
    pub fn children(&self) -> Vec<TypeRef> {
        match self {
            Type::Null
            | Type::Bool
            | Type::Integer
            | Type::Double
            | Type::String { .. }
            | Type::Date
            | Type::Time
            | Type::DateTime
            | Type::Enum { .. } => Vec::new(),
            Type::Array { items } => vec![*items],
            Type::Map { values } => vec![*values],
            Type::Class { properties, additional } => {
                let mut out: Vec<TypeRef> = properties.values().map(|p| p.type_ref).collect();
                if let Some(a) = additional {
                    out.push(*a);
                }
                out
            }
            Type::Union { members } => members.clone(),
        }
    }

    /// Fresh primitive node for a primitive kind. Panics on composite kinds.
    pub fn primitive(kind: TypeKind) -> Type {
        match kind {
            TypeKind::Null => Type::Null,
            TypeKind::Bool => Type::Bool,
            TypeKind::Integer => Type::Integer,
            TypeKind::Double => Type::Double,
            TypeKind::String => Type::String { cases: None },
            TypeKind::Date => Type::Date,
            TypeKind::Time => Type::Time,
            TypeKind::DateTime => Type::DateTime,
            other => panic!("not a primitive kind: {other:?}"),
        }
    }
}
