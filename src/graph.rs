//! Frozen type-graph generations.
//!
//! A `TypeGraph` is one immutable snapshot: an arena of nodes addressed by
//! `TypeRef`, a parallel attribute store, and named roots. Once built it is
//! never mutated; every rewrite pass produces a fresh generation with its own
//! reference space plus an old→new mapping.

use std::collections::HashMap;

use indexmap::IndexMap;

use crate::attributes::TypeAttributes;
use crate::builder::GraphRewriteBuilder;
use crate::typ::{Type, TypeRef};

#[derive(Debug)]
pub struct TypeGraph {
    types: Vec<Type>,
    attributes: Vec<TypeAttributes>,
    roots: IndexMap<String, TypeRef>,
}

/// Output of one rewrite pass: the new generation plus the mapping from every
/// old reference that survived (replaced or carried over) to its new one.
#[derive(Debug)]
pub struct RewrittenGraph {
    pub graph: TypeGraph,
    pub replacements: HashMap<TypeRef, TypeRef>,
}

impl TypeGraph {
    pub(crate) fn from_parts(
        types: Vec<Type>,
        attributes: Vec<TypeAttributes>,
        roots: IndexMap<String, TypeRef>,
    ) -> Self {
        debug_assert_eq!(types.len(), attributes.len());
        TypeGraph { types, attributes, roots }
    }

    /// Resolve a reference. An out-of-generation ref is a programming error,
    /// not a user-facing condition.
    pub fn node(&self, r: TypeRef) -> &Type {
        self.types
            .get(r.index())
            .unwrap_or_else(|| panic!("type ref {r:?} does not resolve in this generation"))
    }

    pub fn attributes(&self, r: TypeRef) -> &TypeAttributes {
        self.attributes
            .get(r.index())
            .unwrap_or_else(|| panic!("type ref {r:?} does not resolve in this generation"))
    }

    pub fn roots(&self) -> &IndexMap<String, TypeRef> {
        &self.roots
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn refs(&self) -> impl Iterator<Item = TypeRef> + '_ {
        (0..self.types.len()).map(TypeRef::from_index)
    }

    /// Replace the root table, keeping the node arena as-is. Used after a
    /// merge pass collapses many candidate roots into one canonical root.
    pub fn with_roots(mut self, roots: IndexMap<String, TypeRef>) -> Self {
        for (name, r) in &roots {
            assert!(
                r.index() < self.types.len(),
                "root {name:?} points outside this generation"
            );
        }
        self.roots = roots;
        self
    }

    /// Produce a new generation from this one.
    ///
    /// Every group is a non-empty set of old nodes deemed equivalent under
    /// this pass; `replace` is invoked exactly once per group, in order, with
    /// a pre-allocated forwarding ref it must return once the replacement is
    /// installed. Nodes not named by any group are carried over lazily on
    /// first reference, attributes preserved.
    pub fn rewrite<'a, F>(
        &'a self,
        pass_name: &'a str,
        groups: Vec<Vec<TypeRef>>,
        replace: F,
    ) -> RewrittenGraph
    where
        F: Fn(&[TypeRef], &mut GraphRewriteBuilder<'a>, TypeRef) -> TypeRef + 'a,
    {
        let group_count = groups.len();
        let mut builder = GraphRewriteBuilder::new(self, pass_name, groups, std::rc::Rc::new(replace));
        for idx in 0..group_count {
            builder.replace_group(idx, None);
        }
        let roots: IndexMap<String, TypeRef> = self
            .roots
            .iter()
            .map(|(name, &r)| (name.clone(), builder.reconstitute(r, None)))
            .collect();
        builder.finish(roots)
    }
}
