//! Type unification: merge a set of co-occurring types into one canonical
//! replacement, recursing into nested array items and object properties.
//!
//! Unifying an empty set is meaningless and treated as an upstream bug. A
//! singleton non-union set is a reconstitution plus attribute merge, never a
//! new node. Before real work, the builder is asked whether a node already
//! stands for exactly this member set; registering the forwarding ref ahead
//! of construction is what lets self-referential inputs converge instead of
//! recursing forever.

use indexmap::{IndexMap, IndexSet};

use crate::attributes::{TypeAttributes, TypeNames};
use crate::builder::GraphRewriteBuilder;
use crate::graph::{RewrittenGraph, TypeGraph};
use crate::typ::{ClassProperty, Type, TypeRef};
use crate::union_builder::{build_union, UnionAccumulator};

/// Per-call knobs: whether enum members stay enums, and whether integer and
/// double observations conflate into one number kind.
#[derive(Clone, Copy, Debug)]
pub struct UnifyPolicy {
    pub make_enums: bool,
    pub conflate_numbers: bool,
}

impl Default for UnifyPolicy {
    fn default() -> Self {
        UnifyPolicy { make_enums: false, conflate_numbers: false }
    }
}

pub fn unify_types(
    types: &[TypeRef],
    attributes: TypeAttributes,
    builder: &mut GraphRewriteBuilder<'_>,
    policy: UnifyPolicy,
    forwarding: Option<TypeRef>,
) -> TypeRef {
    let mut set = types.to_vec();
    set.sort_unstable();
    set.dedup();
    assert!(!set.is_empty(), "cannot unify an empty set of types");

    if set.len() == 1 && !matches!(builder.old_node(set[0]), Type::Union { .. }) {
        let r = builder.reconstitute(set[0], forwarding);
        builder.add_attributes(r, attributes);
        return r;
    }

    // Memo hits are honored only when no forwarding ref is outstanding for
    // this call; with one outstanding the node is built at the reserved slot.
    if forwarding.is_none() {
        if let Some(existing) = builder.lookup_refs(&set) {
            builder.add_attributes(existing, attributes);
            return existing;
        }
    }

    let mut attributes = attributes;
    let mut acc = UnionAccumulator::new(policy);
    acc.add_all(builder, &set, &mut attributes);

    builder.with_forwarding_ref(forwarding, move |b, fwd| {
        b.register_union(&set, fwd);
        build_union(acc, attributes, b, fwd)
    })
}

/// Unified replacement for an object clique.
///
/// Any map member degrades the whole clique: every class property type and
/// every additional-properties type folds into one map value type. A clique
/// of exactly one class is carried over as-is. Otherwise the clique's
/// properties are merged field by field.
pub(crate) fn make_object(
    object_refs: &[TypeRef],
    builder: &mut GraphRewriteBuilder<'_>,
    policy: UnifyPolicy,
    forwarding: Option<TypeRef>,
) -> TypeRef {
    let mut map_values: Vec<TypeRef> = Vec::new();
    let mut classes: Vec<TypeRef> = Vec::new();
    for &r in object_refs {
        match builder.old_node(r) {
            Type::Map { values } => map_values.push(*values),
            Type::Class { .. } => classes.push(r),
            other => panic!("object clique holds a non-object member: {other:?}"),
        }
    }
    assert!(
        !map_values.is_empty() || !classes.is_empty(),
        "object clique without members"
    );

    if !map_values.is_empty() {
        let mut value_types = map_values;
        for &c in &classes {
            let Type::Class { properties, additional } = builder.old_node(c) else {
                unreachable!("partitioned above");
            };
            value_types.extend(properties.values().map(|p| p.type_ref));
            if let Some(a) = additional {
                value_types.push(*a);
            }
        }
        let values = unify_types(&value_types, TypeAttributes::new(), builder, policy, None);
        return builder.get_map(values, forwarding);
    }

    if classes.len() == 1 {
        return builder.reconstitute(classes[0], forwarding);
    }

    if forwarding.is_none() {
        if let Some(existing) = builder.lookup_refs(&classes) {
            return existing;
        }
    }

    let (properties, additional) = clique_properties(&classes, builder, policy);
    builder.get_class(properties, additional, forwarding)
}

/// Merge clique properties field by field.
///
/// The result's property-name set is the union of all members' names in
/// stable first-seen order. A property missing from a member is optional; a
/// member that lacks the property but is open folds its
/// additional-properties type in instead.
fn clique_properties(
    classes: &[TypeRef],
    builder: &mut GraphRewriteBuilder<'_>,
    policy: UnifyPolicy,
) -> (IndexMap<String, ClassProperty>, Option<TypeRef>) {
    struct Member {
        properties: IndexMap<String, ClassProperty>,
        additional: Option<TypeRef>,
    }

    // Snapshot member shapes up front; unification below mutates the builder.
    let members: Vec<Member> = classes
        .iter()
        .map(|&c| match builder.old_node(c) {
            Type::Class { properties, additional } => Member {
                properties: properties.clone(),
                additional: *additional,
            },
            other => panic!("object clique holds a non-class member: {other:?}"),
        })
        .collect();

    let mut names: IndexSet<String> = IndexSet::new();
    for m in &members {
        names.extend(m.properties.keys().cloned());
    }

    let mut additional_types: Vec<TypeRef> = Vec::new();
    for m in &members {
        if let Some(a) = m.additional {
            if !additional_types.contains(&a) {
                additional_types.push(a);
            }
        }
    }
    let additional = if additional_types.is_empty() {
        None
    } else {
        Some(unify_types(&additional_types, TypeAttributes::new(), builder, policy, None))
    };

    let mut properties: IndexMap<String, ClassProperty> = IndexMap::new();
    for name in &names {
        let mut types: Vec<TypeRef> = Vec::new();
        let mut optional = false;
        for m in &members {
            match m.properties.get(name) {
                Some(p) => {
                    optional |= p.is_optional;
                    types.push(p.type_ref);
                }
                None => {
                    optional = true;
                    if let Some(a) = m.additional {
                        types.push(a);
                    }
                }
            }
        }
        assert!(!types.is_empty(), "clique property {name:?} has no type");
        let attrs = TypeAttributes::with(TypeNames::inferred(name.clone()));
        let type_ref = unify_types(&types, attrs, builder, policy, None);
        properties.insert(name.clone(), ClassProperty::new(type_ref, optional));
    }

    (properties, additional)
}

/// Collapse every candidate root of a graph into one canonical root named
/// `root_name`, via a single whole-graph rewrite.
pub fn merge_candidates(graph: &TypeGraph, root_name: &str, policy: UnifyPolicy) -> RewrittenGraph {
    let mut candidates: Vec<TypeRef> = graph.roots().values().copied().collect();
    candidates.sort_unstable();
    candidates.dedup();
    assert!(!candidates.is_empty(), "cannot unify an empty set of types");

    let given_name = root_name.to_string();
    let RewrittenGraph { graph: new_graph, replacements } =
        graph.rewrite("unify", vec![candidates], move |group, b, fwd| {
            let attrs = TypeAttributes::with(TypeNames::given(given_name.clone()));
            unify_types(group, attrs, b, policy, Some(fwd))
        });

    let canonical = new_graph
        .roots()
        .values()
        .next()
        .copied()
        .expect("merge keeps at least one root");
    let mut roots = IndexMap::new();
    roots.insert(root_name.to_string(), canonical);
    RewrittenGraph { graph: new_graph.with_roots(roots), replacements }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::TypeBuilder;
    use crate::typ::TypeKind;

    fn graph_of(build: impl FnOnce(&mut TypeBuilder) -> Vec<TypeRef>) -> TypeGraph {
        let mut b = TypeBuilder::new();
        let candidates = build(&mut b);
        let roots: IndexMap<String, TypeRef> = candidates
            .into_iter()
            .enumerate()
            .map(|(i, r)| (format!("candidate-{i}"), r))
            .collect();
        b.finish(roots)
    }

    fn class_of(b: &mut TypeBuilder, props: &[(&str, TypeRef, bool)], additional: Option<TypeRef>) -> TypeRef {
        let properties: IndexMap<String, ClassProperty> = props
            .iter()
            .map(|&(name, r, optional)| (name.to_string(), ClassProperty::new(r, optional)))
            .collect();
        b.get_class(properties, additional, None)
    }

    fn merged(graph: &TypeGraph) -> TypeGraph {
        merge_candidates(graph, "Root", UnifyPolicy::default()).graph
    }

    fn root_class(graph: &TypeGraph) -> (TypeRef, IndexMap<String, ClassProperty>, Option<TypeRef>) {
        let root = graph.roots()["Root"];
        match graph.node(root) {
            Type::Class { properties, additional } => (root, properties.clone(), *additional),
            other => panic!("expected class at root, got {other:?}"),
        }
    }

    #[test]
    fn singleton_unification_is_a_carry_over() {
        let g = graph_of(|b| {
            let int = b.get_primitive(TypeKind::Integer, None);
            vec![class_of(b, &[("a", int, false)], None)]
        });
        let out = merged(&g);
        let (_, props, additional) = root_class(&out);
        assert!(additional.is_none());
        assert_eq!(props.len(), 1);
        assert_eq!(out.node(props["a"].type_ref), &Type::Integer);
        assert!(!props["a"].is_optional);
    }

    #[test]
    fn identical_shapes_merge_histograms() {
        let g = graph_of(|b| {
            let mut h1 = IndexMap::new();
            h1.insert("x".to_string(), 2usize);
            let s1 = b.get_string(Some(h1), None);
            let mut h2 = IndexMap::new();
            h2.insert("x".to_string(), 1usize);
            h2.insert("y".to_string(), 1usize);
            let s2 = b.get_string(Some(h2), None);
            let c1 = class_of(b, &[("a", s1, false)], None);
            let c2 = class_of(b, &[("a", s2, false)], None);
            vec![c1, c2]
        });
        let out = merged(&g);
        let (_, props, _) = root_class(&out);
        let Type::String { cases: Some(cases) } = out.node(props["a"].type_ref) else {
            panic!("expected histogram string");
        };
        assert_eq!(cases["x"], 3);
        assert_eq!(cases["y"], 1);
        assert!(!props["a"].is_optional);
    }

    #[test]
    fn missing_property_becomes_optional() {
        let g = graph_of(|b| {
            let int = b.get_primitive(TypeKind::Integer, None);
            let s = b.get_string(None, None);
            let c1 = class_of(b, &[("a", int, false), ("b", s, false)], None);
            let c2 = class_of(b, &[("a", int, false)], None);
            vec![c1, c2]
        });
        let out = merged(&g);
        let (_, props, _) = root_class(&out);
        assert_eq!(out.node(props["a"].type_ref), &Type::Integer);
        assert!(!props["a"].is_optional);
        assert!(matches!(out.node(props["b"].type_ref), Type::String { cases: None }));
        assert!(props["b"].is_optional);
    }

    #[test]
    fn open_members_fold_additional_into_missing_properties() {
        let g = graph_of(|b| {
            let int = b.get_primitive(TypeKind::Integer, None);
            let s = b.get_string(None, None);
            let boolean = b.get_primitive(TypeKind::Bool, None);
            let open = class_of(b, &[("a", int, false)], Some(s));
            let closed = class_of(b, &[("b", boolean, false)], None);
            vec![open, closed]
        });
        let out = merged(&g);
        let (_, props, additional) = root_class(&out);

        // "a": present in the open member, absent in the closed one (which
        // folds nothing) — plain optional integer.
        assert_eq!(out.node(props["a"].type_ref), &Type::Integer);
        assert!(props["a"].is_optional);

        // "b": bool from one member, string folded in from the open member.
        let Type::Union { members } = out.node(props["b"].type_ref) else {
            panic!("expected union for b");
        };
        let mut kinds: Vec<TypeKind> = members.iter().map(|&m| out.node(m).kind()).collect();
        kinds.sort_unstable();
        assert_eq!(kinds, vec![TypeKind::Bool, TypeKind::String]);
        assert!(props["b"].is_optional);

        // The result stays open, valued at the open member's type.
        let additional = additional.expect("result must stay open");
        assert!(matches!(out.node(additional), Type::String { cases: None }));
    }

    #[test]
    fn unification_is_order_independent() {
        let forward = graph_of(|b| {
            let int = b.get_primitive(TypeKind::Integer, None);
            let s = b.get_string(None, None);
            vec![int, s]
        });
        let backward = graph_of(|b| {
            let s = b.get_string(None, None);
            let int = b.get_primitive(TypeKind::Integer, None);
            vec![s, int]
        });
        let a = crate::schema::emit_schema(&merged(&forward));
        let b = crate::schema::emit_schema(&merged(&backward));
        assert_eq!(a, b);
    }

    #[test]
    fn mixed_kinds_build_a_union_without_wrapper_duplication() {
        let g = graph_of(|b| {
            let int = b.get_primitive(TypeKind::Integer, None);
            let s = b.get_string(None, None);
            vec![int, s]
        });
        let out = merged(&g);
        let root = out.roots()["Root"];
        let Type::Union { members } = out.node(root) else {
            panic!("expected union at root");
        };
        assert_eq!(members.len(), 2);
    }

    #[test]
    fn map_member_degrades_the_whole_clique() {
        let g = graph_of(|b| {
            let int = b.get_primitive(TypeKind::Integer, None);
            let s = b.get_string(None, None);
            let class = class_of(b, &[("a", int, false)], None);
            let map = b.get_map(s, None);
            vec![class, map]
        });
        let out = merged(&g);
        let root = out.roots()["Root"];
        let Type::Map { values } = out.node(root) else {
            panic!("expected map at root");
        };
        let Type::Union { members } = out.node(*values) else {
            panic!("expected union of folded value types");
        };
        let mut kinds: Vec<TypeKind> = members.iter().map(|&m| out.node(m).kind()).collect();
        kinds.sort_unstable();
        assert_eq!(kinds, vec![TypeKind::Integer, TypeKind::String]);
    }

    #[test]
    fn conflated_numbers_collapse_into_double() {
        let g = graph_of(|b| {
            let int = b.get_primitive(TypeKind::Integer, None);
            let d = b.get_primitive(TypeKind::Double, None);
            vec![int, d]
        });
        let policy = UnifyPolicy { make_enums: false, conflate_numbers: true };
        let out = merge_candidates(&g, "Root", policy).graph;
        let root = out.roots()["Root"];
        assert_eq!(out.node(root), &Type::Double);
    }

    #[test]
    fn recursive_classes_unify_to_a_finite_self_reference() {
        let g = graph_of(|b| {
            let c1 = b.reserve();
            let mut p1 = IndexMap::new();
            p1.insert("next".to_string(), ClassProperty::new(c1, false));
            b.install(c1, Type::Class { properties: p1, additional: None });

            let c2 = b.reserve();
            let mut p2 = IndexMap::new();
            p2.insert("next".to_string(), ClassProperty::new(c2, false));
            b.install(c2, Type::Class { properties: p2, additional: None });

            vec![c1, c2]
        });
        let out = merged(&g);
        let root = out.roots()["Root"];
        let Type::Class { properties, .. } = out.node(root) else {
            panic!("expected class at root");
        };
        assert_eq!(properties["next"].type_ref, root);
        assert!(out.len() <= 3, "recursive unification must not blow up the graph");
    }

    #[test]
    fn deep_recursion_through_maps_and_arrays_converges() {
        let g = graph_of(|b| {
            let mut mk = |b: &mut TypeBuilder| {
                let me = b.reserve();
                let arr = b.get_array(me, None);
                let map = b.get_map(arr, None);
                let mut props = IndexMap::new();
                props.insert("children".to_string(), ClassProperty::new(map, false));
                b.install(me, Type::Class { properties: props, additional: None });
                me
            };
            let c1 = mk(b);
            let c2 = mk(b);
            vec![c1, c2]
        });
        let out = merged(&g);
        let root = out.roots()["Root"];
        let Type::Class { properties, .. } = out.node(root) else {
            panic!("expected class at root");
        };
        let Type::Map { values } = out.node(properties["children"].type_ref) else {
            panic!("expected map");
        };
        let Type::Array { items } = out.node(*values) else {
            panic!("expected array");
        };
        assert_eq!(*items, root);
    }

    #[test]
    #[should_panic(expected = "cannot unify an empty set of types")]
    fn empty_candidate_set_is_fatal() {
        let g = graph_of(|_| Vec::new());
        let _ = merged(&g);
    }
}
