//! Graph-wide clean-up rewrites: enum inference and string flattening.
//!
//! Both are independent passes over a frozen graph; every touched node is its
//! own equivalence group.

use crate::attributes::TypeAttributes;
use crate::graph::{RewrittenGraph, TypeGraph};
use crate::typ::{Type, TypeRef};

/// Minimum total observations before a histogram may promote to an enum.
pub const MIN_LENGTH_FOR_ENUM: usize = 10;

/// Few distinct values relative to the volume of evidence, so free-text
/// fields that happen to repeat are not misclassified.
fn should_be_enum(cases: &indexmap::IndexMap<String, usize>) -> bool {
    assert!(!cases.is_empty(), "string histogram with zero cases");
    let total: usize = cases.values().sum();
    total >= MIN_LENGTH_FOR_ENUM && (cases.len() as f64) < (total as f64).sqrt()
}

/// Decide enum vs. plain string for every histogram-bearing string node.
/// Either way the histogram is dropped: after this pass no string node
/// carries enum-candidacy data.
pub fn infer_enums(graph: &TypeGraph) -> RewrittenGraph {
    let groups: Vec<Vec<TypeRef>> = graph
        .refs()
        .filter(|&r| matches!(graph.node(r), Type::String { cases: Some(_) }))
        .map(|r| vec![r])
        .collect();
    graph.rewrite("infer enums", groups, |group, builder, fwd| {
        assert_eq!(group.len(), 1, "enum inference never merges string nodes");
        let old = group[0];
        let Type::String { cases: Some(cases) } = builder.old_node(old).clone() else {
            panic!("enum inference grouped a non-histogram node");
        };
        let attributes = builder.old_attributes(old).clone();
        let replacement = if should_be_enum(&cases) {
            builder.get_enum(cases.keys().cloned().collect(), Some(fwd))
        } else {
            builder.get_string(None, Some(fwd))
        };
        builder.add_attributes(replacement, attributes);
        replacement
    })
}

/// A union needs flattening if it has more than one string-like member, one
/// of them being the unconditioned plain-string kind.
fn flattenable_members(graph: &TypeGraph, r: TypeRef) -> Option<Vec<TypeRef>> {
    let Type::Union { members } = graph.node(r) else {
        return None;
    };
    let string_like: Vec<TypeRef> = members
        .iter()
        .copied()
        .filter(|&m| graph.node(m).kind().is_string_like())
        .collect();
    if string_like.len() <= 1 {
        return None;
    }
    let has_plain = string_like
        .iter()
        .any(|&m| matches!(graph.node(m), Type::String { .. }));
    if !has_plain {
        return None;
    }
    Some(string_like)
}

/// Collapse redundant string-like union members into one plain string. Once
/// a slot admits unrestricted strings, narrower string-shaped members add no
/// usable type information.
pub fn flatten_strings(graph: &TypeGraph) -> RewrittenGraph {
    let groups: Vec<Vec<TypeRef>> = graph
        .refs()
        .filter(|&r| flattenable_members(graph, r).is_some())
        .map(|r| vec![r])
        .collect();
    graph.rewrite("flatten strings", groups, |group, builder, fwd| {
        assert_eq!(group.len(), 1);
        let old = group[0];
        let Type::Union { members } = builder.old_node(old).clone() else {
            panic!("string flattening grouped a non-union node");
        };
        let string_like = flattenable_members(graph, old).expect("group was selected as flattenable");

        let mut string_attributes = TypeAttributes::new();
        for &m in &string_like {
            string_attributes.combine_from(builder.old_attributes(m));
        }
        let union_attributes = builder.old_attributes(old).clone();

        let mut kept: Vec<TypeRef> = members
            .iter()
            .copied()
            .filter(|m| !string_like.contains(m))
            .map(|m| builder.reconstitute(m, None))
            .collect();

        if kept.is_empty() {
            let s = builder.get_string(None, Some(fwd));
            builder.add_attributes(s, string_attributes);
            builder.add_attributes(s, union_attributes);
            s
        } else {
            let s = builder.get_string(None, None);
            builder.add_attributes(s, string_attributes);
            kept.push(s);
            let u = builder.get_union(kept, Some(fwd));
            builder.add_attributes(u, union_attributes);
            u
        }
    })
}
