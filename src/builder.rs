//! Graph construction.
//!
//! `TypeBuilder` owns one generation under construction: an arena where a
//! handle can be reserved ahead of its node (forwarding references, the
//! mechanism that makes self-referential shapes finite) and where freshly
//! created composites are deduplicated against structurally identical nodes
//! already in the generation.
//!
//! `GraphRewriteBuilder` layers rewrite bookkeeping on top: lazy
//! reconstitution of untouched old nodes, eager replacement of equivalence
//! groups, and the member-set memo that lets unification converge on
//! recursive inputs. It is exclusively owned by one rewrite invocation and
//! never outlives it.

use std::collections::HashMap;
use std::rc::Rc;

use indexmap::{IndexMap, IndexSet};

use crate::attributes::TypeAttributes;
use crate::graph::{RewrittenGraph, TypeGraph};
use crate::typ::{ClassProperty, Type, TypeKind, TypeRef};

/// Identity key for structural dedup within one generation. `None` from
/// `structural_key` means the node is always unique (histogram strings).
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
enum StructuralKey {
    Prim(TypeKind),
    Enum(Vec<String>),
    Array(TypeRef),
    Map(TypeRef),
    Class(Vec<(String, TypeRef, bool)>, Option<TypeRef>),
    Union(Vec<TypeRef>),
}

fn structural_key(t: &Type) -> Option<StructuralKey> {
    match t {
        Type::String { cases: Some(_) } => None,
        Type::String { cases: None } => Some(StructuralKey::Prim(TypeKind::String)),
        Type::Null | Type::Bool | Type::Integer | Type::Double | Type::Date | Type::Time | Type::DateTime => {
            Some(StructuralKey::Prim(t.kind()))
        }
        Type::Enum { cases } => {
            let mut v: Vec<String> = cases.iter().cloned().collect();
            v.sort();
            Some(StructuralKey::Enum(v))
        }
        Type::Array { items } => Some(StructuralKey::Array(*items)),
        Type::Map { values } => Some(StructuralKey::Map(*values)),
        Type::Class { properties, additional } => Some(StructuralKey::Class(
            properties
                .iter()
                .map(|(n, p)| (n.clone(), p.type_ref, p.is_optional))
                .collect(),
            *additional,
        )),
        Type::Union { members } => {
            let mut v = members.clone();
            v.sort_unstable();
            Some(StructuralKey::Union(v))
        }
    }
}

#[derive(Debug, Default)]
pub struct TypeBuilder {
    types: Vec<Option<Type>>,
    attributes: Vec<TypeAttributes>,
    structural: HashMap<StructuralKey, TypeRef>,
}

impl TypeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve a handle ahead of its node. The slot must be installed before
    /// the generation is finished.
    pub fn reserve(&mut self) -> TypeRef {
        let r = TypeRef::from_index(self.types.len());
        self.types.push(None);
        self.attributes.push(TypeAttributes::new());
        r
    }

    /// Install a node into a reserved slot. Double installation is a
    /// programming error.
    pub fn install(&mut self, r: TypeRef, t: Type) {
        let slot = &mut self.types[r.index()];
        assert!(slot.is_none(), "type ref {r:?} installed twice");
        if let Some(key) = structural_key(&t) {
            self.structural.entry(key).or_insert(r);
        }
        *slot = Some(t);
    }

    /// Installed view of a slot; `None` while the slot is only reserved.
    pub fn node(&self, r: TypeRef) -> Option<&Type> {
        self.types.get(r.index()).and_then(|slot| slot.as_ref())
    }

    pub fn add_attributes(&mut self, r: TypeRef, attrs: TypeAttributes) {
        self.attributes[r.index()].combine_from(&attrs);
    }

    fn intern(&mut self, t: Type, forwarding: Option<TypeRef>) -> TypeRef {
        if let Some(f) = forwarding {
            self.install(f, t);
            return f;
        }
        if let Some(key) = structural_key(&t) {
            if let Some(&existing) = self.structural.get(&key) {
                return existing;
            }
        }
        let r = self.reserve();
        self.install(r, t);
        r
    }

    pub fn get_primitive(&mut self, kind: TypeKind, forwarding: Option<TypeRef>) -> TypeRef {
        assert!(kind.is_primitive(), "composite kind {kind:?} asked for as a primitive");
        self.intern(Type::primitive(kind), forwarding)
    }

    pub fn get_string(
        &mut self,
        cases: Option<IndexMap<String, usize>>,
        forwarding: Option<TypeRef>,
    ) -> TypeRef {
        self.intern(Type::String { cases }, forwarding)
    }

    pub fn get_enum(&mut self, cases: IndexSet<String>, forwarding: Option<TypeRef>) -> TypeRef {
        assert!(!cases.is_empty(), "enum with zero cases");
        self.intern(Type::Enum { cases }, forwarding)
    }

    pub fn get_array(&mut self, items: TypeRef, forwarding: Option<TypeRef>) -> TypeRef {
        self.intern(Type::Array { items }, forwarding)
    }

    pub fn get_map(&mut self, values: TypeRef, forwarding: Option<TypeRef>) -> TypeRef {
        self.intern(Type::Map { values }, forwarding)
    }

    pub fn get_class(
        &mut self,
        properties: IndexMap<String, ClassProperty>,
        additional: Option<TypeRef>,
        forwarding: Option<TypeRef>,
    ) -> TypeRef {
        self.intern(Type::Class { properties, additional }, forwarding)
    }

    pub fn get_union(&mut self, members: Vec<TypeRef>, forwarding: Option<TypeRef>) -> TypeRef {
        assert!(members.len() >= 2, "a union needs at least two members");
        #[cfg(debug_assertions)]
        {
            let mut kinds: Vec<TypeKind> = members
                .iter()
                .filter_map(|m| self.node(*m).map(Type::kind))
                .collect();
            kinds.sort_unstable();
            let before = kinds.len();
            kinds.dedup();
            debug_assert_eq!(before, kinds.len(), "union holds two members of one kind");
        }
        self.intern(Type::Union { members }, forwarding)
    }

    /// Freeze the generation. A reserved slot that never got its node is a
    /// fatal programming-invariant violation.
    pub fn finish(self, roots: IndexMap<String, TypeRef>) -> TypeGraph {
        let types: Vec<Type> = self
            .types
            .into_iter()
            .enumerate()
            .map(|(i, slot)| slot.unwrap_or_else(|| panic!("unresolved forwarding ref at index {i}")))
            .collect();
        TypeGraph::from_parts(types, self.attributes, roots)
    }
}

// ————————————————————————————————————————————————————————————————————————————
// GRAPH REWRITE
// ————————————————————————————————————————————————————————————————————————————

pub type Replacer<'a> = Rc<dyn Fn(&[TypeRef], &mut GraphRewriteBuilder<'a>, TypeRef) -> TypeRef + 'a>;

pub struct GraphRewriteBuilder<'a> {
    old: &'a TypeGraph,
    pass_name: &'a str,
    core: TypeBuilder,
    groups: Vec<Vec<TypeRef>>,
    /// Old ref → index of the pending group it belongs to. A group leaves
    /// this table the moment its replacement starts.
    group_of: HashMap<TypeRef, usize>,
    group_results: Vec<Option<TypeRef>>,
    /// Old ref → new ref, for everything already replaced or carried over.
    reconstituted: HashMap<TypeRef, TypeRef>,
    /// Sorted old member set → new ref, registered before a union is built so
    /// recursive re-entry with the same set resolves to the in-flight node.
    union_memo: HashMap<Vec<TypeRef>, TypeRef>,
    replacer: Replacer<'a>,
}

impl<'a> GraphRewriteBuilder<'a> {
    pub(crate) fn new(
        old: &'a TypeGraph,
        pass_name: &'a str,
        groups: Vec<Vec<TypeRef>>,
        replacer: Replacer<'a>,
    ) -> Self {
        let mut group_of = HashMap::new();
        for (idx, group) in groups.iter().enumerate() {
            assert!(!group.is_empty(), "pass {pass_name:?}: empty equivalence group");
            for &member in group {
                let previous = group_of.insert(member, idx);
                assert!(previous.is_none(), "pass {pass_name:?}: {member:?} named in two groups");
            }
        }
        let group_results = vec![None; groups.len()];
        GraphRewriteBuilder {
            old,
            pass_name,
            core: TypeBuilder::new(),
            groups,
            group_of,
            group_results,
            reconstituted: HashMap::new(),
            union_memo: HashMap::new(),
            replacer,
        }
    }

    pub fn pass_name(&self) -> &str {
        self.pass_name
    }

    pub fn old_node(&self, r: TypeRef) -> &Type {
        self.old.node(r)
    }

    pub fn old_attributes(&self, r: TypeRef) -> &TypeAttributes {
        self.old.attributes(r)
    }

    /// Run one group's replacement (once; later calls return the recorded
    /// result). The forwarding ref is pre-recorded so the replacement may
    /// refer to itself before it is fully built.
    pub(crate) fn replace_group(&mut self, idx: usize, forwarding: Option<TypeRef>) -> TypeRef {
        if let Some(done) = self.group_results[idx] {
            if let Some(f) = forwarding {
                assert_eq!(f, done, "pass {:?}: conflicting forwarding ref for a replaced group", self.pass_name);
            }
            return done;
        }
        let members = self.groups[idx].clone();
        for member in &members {
            self.group_of.remove(member);
        }
        let fwd = forwarding.unwrap_or_else(|| self.core.reserve());
        self.group_results[idx] = Some(fwd);
        let replacer = Rc::clone(&self.replacer);
        let result = replacer(&members, self, fwd);
        assert_eq!(
            result, fwd,
            "pass {:?}: replacement must finish at its forwarding ref",
            self.pass_name
        );
        for member in members {
            self.reconstituted.entry(member).or_insert(result);
        }
        result
    }

    /// Carry an old node into the new generation, lazily and cycle-safely.
    /// An old ref that belongs to a pending group triggers that group's
    /// replacement instead of copying.
    pub fn reconstitute(&mut self, old_ref: TypeRef, forwarding: Option<TypeRef>) -> TypeRef {
        if let Some(&idx) = self.group_of.get(&old_ref) {
            return self.replace_group(idx, forwarding);
        }
        if let Some(&new) = self.reconstituted.get(&old_ref) {
            return match forwarding {
                None => new,
                Some(f) if f == new => new,
                Some(f) => {
                    // The reserved slot must not dangle: give it a copy of
                    // the node this old ref already resolved to.
                    let t = self
                        .core
                        .node(new)
                        .expect("reconstituted node is installed")
                        .clone();
                    self.core.install(f, t);
                    self.core.add_attributes(f, self.old.attributes(old_ref).clone());
                    f
                }
            };
        }
        let new = forwarding.unwrap_or_else(|| self.core.reserve());
        // Memoize before descending so back-edges resolve to this slot.
        self.reconstituted.insert(old_ref, new);
        let t = match self.old.node(old_ref).clone() {
            t @ (Type::Null
            | Type::Bool
            | Type::Integer
            | Type::Double
            | Type::String { .. }
            | Type::Date
            | Type::Time
            | Type::DateTime
            | Type::Enum { .. }) => t,
            Type::Array { items } => Type::Array { items: self.reconstitute(items, None) },
            Type::Map { values } => Type::Map { values: self.reconstitute(values, None) },
            Type::Class { properties, additional } => {
                let properties = properties
                    .into_iter()
                    .map(|(name, p)| {
                        let type_ref = self.reconstitute(p.type_ref, None);
                        (name, ClassProperty::new(type_ref, p.is_optional))
                    })
                    .collect();
                let additional = additional.map(|a| self.reconstitute(a, None));
                Type::Class { properties, additional }
            }
            Type::Union { members } => Type::Union {
                members: members.into_iter().map(|m| self.reconstitute(m, None)).collect(),
            },
        };
        self.core.install(new, t);
        self.core.add_attributes(new, self.old.attributes(old_ref).clone());
        new
    }

    /// Does a new-generation node already stand for exactly this set of old
    /// refs? Checks the registered member-set memo first, then whether every
    /// member has already resolved to one and the same new ref.
    pub fn lookup_refs(&self, old_refs: &[TypeRef]) -> Option<TypeRef> {
        let key = member_set_key(old_refs);
        if let Some(&r) = self.union_memo.get(&key) {
            return Some(r);
        }
        let mut mapped = key.iter().map(|r| self.reconstituted.get(r).copied());
        let first = mapped.next()??;
        for m in mapped {
            if m? != first {
                return None;
            }
        }
        Some(first)
    }

    /// Record that `new_ref` will stand for this member set, ahead of its
    /// construction.
    pub fn register_union(&mut self, old_refs: &[TypeRef], new_ref: TypeRef) {
        self.union_memo.insert(member_set_key(old_refs), new_ref);
    }

    pub fn with_forwarding_ref(
        &mut self,
        forwarding: Option<TypeRef>,
        f: impl FnOnce(&mut Self, TypeRef) -> TypeRef,
    ) -> TypeRef {
        let fwd = forwarding.unwrap_or_else(|| self.core.reserve());
        let r = f(self, fwd);
        assert_eq!(r, fwd, "forwarding ref must be returned once its node is installed");
        r
    }

    // Construction surface, delegated to the owned arena.

    pub fn get_primitive(&mut self, kind: TypeKind, forwarding: Option<TypeRef>) -> TypeRef {
        self.core.get_primitive(kind, forwarding)
    }

    pub fn get_string(
        &mut self,
        cases: Option<IndexMap<String, usize>>,
        forwarding: Option<TypeRef>,
    ) -> TypeRef {
        self.core.get_string(cases, forwarding)
    }

    pub fn get_enum(&mut self, cases: IndexSet<String>, forwarding: Option<TypeRef>) -> TypeRef {
        self.core.get_enum(cases, forwarding)
    }

    pub fn get_array(&mut self, items: TypeRef, forwarding: Option<TypeRef>) -> TypeRef {
        self.core.get_array(items, forwarding)
    }

    pub fn get_map(&mut self, values: TypeRef, forwarding: Option<TypeRef>) -> TypeRef {
        self.core.get_map(values, forwarding)
    }

    pub fn get_class(
        &mut self,
        properties: IndexMap<String, ClassProperty>,
        additional: Option<TypeRef>,
        forwarding: Option<TypeRef>,
    ) -> TypeRef {
        self.core.get_class(properties, additional, forwarding)
    }

    pub fn get_union(&mut self, members: Vec<TypeRef>, forwarding: Option<TypeRef>) -> TypeRef {
        self.core.get_union(members, forwarding)
    }

    pub fn add_attributes(&mut self, r: TypeRef, attrs: TypeAttributes) {
        self.core.add_attributes(r, attrs);
    }

    pub(crate) fn finish(self, roots: IndexMap<String, TypeRef>) -> RewrittenGraph {
        RewrittenGraph {
            graph: self.core.finish(roots),
            replacements: self.reconstituted,
        }
    }
}

fn member_set_key(old_refs: &[TypeRef]) -> Vec<TypeRef> {
    let mut key = old_refs.to_vec();
    key.sort_unstable();
    key.dedup();
    key
}
