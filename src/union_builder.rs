//! Union accumulation: partition a co-occurring type set by kind, then decide
//! the unified output shape.
//!
//! One bucket per kind, the way a join keeps at most one arm per kind: flat
//! primitives as flags, one string bucket with a merged literal histogram,
//! one enum bucket, the collected item types of every array member, and the
//! object clique (class and map members whose properties unify together).
//! Union members flatten into the accumulator, so nested unions never
//! survive.

use indexmap::{IndexMap, IndexSet};

use crate::attributes::TypeAttributes;
use crate::builder::GraphRewriteBuilder;
use crate::typ::{Type, TypeKind, TypeRef};
use crate::unify::{make_object, unify_types, UnifyPolicy};

#[derive(Debug)]
pub struct UnionAccumulator {
    policy: UnifyPolicy,
    have_null: bool,
    have_bool: bool,
    have_integer: bool,
    have_double: bool,
    have_date: bool,
    have_time: bool,
    have_date_time: bool,
    have_string: bool,
    /// Merged enum-candidacy histogram; meaningless once `plain_string`.
    string_cases: IndexMap<String, usize>,
    /// A member already decided to be an unrestricted string poisons the
    /// histogram for good.
    plain_string: bool,
    have_enum: bool,
    enum_cases: IndexSet<String>,
    /// Old-generation item refs of every array member.
    array_items: Vec<TypeRef>,
    /// Old-generation refs of every class and map member.
    objects: Vec<TypeRef>,
}

impl UnionAccumulator {
    pub fn new(policy: UnifyPolicy) -> Self {
        UnionAccumulator {
            policy,
            have_null: false,
            have_bool: false,
            have_integer: false,
            have_double: false,
            have_date: false,
            have_time: false,
            have_date_time: false,
            have_string: false,
            string_cases: IndexMap::new(),
            plain_string: false,
            have_enum: false,
            enum_cases: IndexSet::new(),
            array_items: Vec::new(),
            objects: Vec::new(),
        }
    }

    /// Ingest every member of the set. Attributes of consumed members (and of
    /// flattened unions) lift into `attributes`, to land on whatever single
    /// node replaces them.
    pub fn add_all(
        &mut self,
        builder: &GraphRewriteBuilder<'_>,
        refs: &[TypeRef],
        attributes: &mut TypeAttributes,
    ) {
        for &r in refs {
            self.add(builder, r, attributes);
        }
    }

    fn add(&mut self, builder: &GraphRewriteBuilder<'_>, r: TypeRef, attributes: &mut TypeAttributes) {
        attributes.combine_from(builder.old_attributes(r));
        match builder.old_node(r) {
            Type::Null => self.have_null = true,
            Type::Bool => self.have_bool = true,
            Type::Integer => self.have_integer = true,
            Type::Double => self.have_double = true,
            Type::Date => self.have_date = true,
            Type::Time => self.have_time = true,
            Type::DateTime => self.have_date_time = true,
            Type::String { cases } => {
                self.have_string = true;
                match cases {
                    Some(histogram) => {
                        for (literal, count) in histogram {
                            *self.string_cases.entry(literal.clone()).or_insert(0) += count;
                        }
                    }
                    None => self.plain_string = true,
                }
            }
            Type::Enum { cases } => {
                if self.policy.make_enums {
                    self.have_enum = true;
                    self.enum_cases.extend(cases.iter().cloned());
                } else {
                    // Enum inference is off for this call: fold the cases
                    // back into the string histogram.
                    self.have_string = true;
                    for case in cases {
                        *self.string_cases.entry(case.clone()).or_insert(0) += 1;
                    }
                }
            }
            Type::Array { items } => self.array_items.push(*items),
            Type::Map { .. } | Type::Class { .. } => self.objects.push(r),
            Type::Union { members } => {
                let members = members.clone();
                for m in members {
                    self.add(builder, m, attributes);
                }
            }
        }
    }
}

/// The buckets a build decision chooses from, in output order.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Bucket {
    Prim(TypeKind),
    String,
    Enum,
    Array,
    Object,
}

/// Build the unified node for an accumulated set.
///
/// Exactly one non-empty bucket emits that type directly at the forwarding
/// ref (no union wrapper); otherwise one representative per bucket is built
/// and wrapped in a union. An empty accumulator is an upstream contract
/// breach.
pub(crate) fn build_union(
    mut acc: UnionAccumulator,
    attributes: TypeAttributes,
    builder: &mut GraphRewriteBuilder<'_>,
    forwarding: TypeRef,
) -> TypeRef {
    let policy = acc.policy;
    if policy.conflate_numbers && acc.have_integer && acc.have_double {
        acc.have_integer = false;
    }

    let mut buckets: Vec<Bucket> = Vec::new();
    let flags = [
        (acc.have_null, Bucket::Prim(TypeKind::Null)),
        (acc.have_bool, Bucket::Prim(TypeKind::Bool)),
        (acc.have_integer, Bucket::Prim(TypeKind::Integer)),
        (acc.have_double, Bucket::Prim(TypeKind::Double)),
        (acc.have_date, Bucket::Prim(TypeKind::Date)),
        (acc.have_time, Bucket::Prim(TypeKind::Time)),
        (acc.have_date_time, Bucket::Prim(TypeKind::DateTime)),
        (acc.have_string, Bucket::String),
        (acc.have_enum, Bucket::Enum),
        (!acc.array_items.is_empty(), Bucket::Array),
        (!acc.objects.is_empty(), Bucket::Object),
    ];
    for (present, bucket) in flags {
        if present {
            buckets.push(bucket);
        }
    }
    assert!(!buckets.is_empty(), "union build over no types");

    let single = buckets.len() == 1;
    let mut members: Vec<TypeRef> = Vec::new();
    for bucket in buckets {
        let member_forwarding = if single { Some(forwarding) } else { None };
        let member = match bucket {
            Bucket::Prim(kind) => builder.get_primitive(kind, member_forwarding),
            Bucket::String => {
                let cases = if acc.plain_string || acc.string_cases.is_empty() {
                    None
                } else {
                    Some(acc.string_cases.clone())
                };
                builder.get_string(cases, member_forwarding)
            }
            Bucket::Enum => builder.get_enum(acc.enum_cases.clone(), member_forwarding),
            Bucket::Array => {
                let items = unify_types(&acc.array_items, TypeAttributes::new(), builder, policy, None);
                builder.get_array(items, member_forwarding)
            }
            Bucket::Object => make_object(&acc.objects, builder, policy, member_forwarding),
        };
        members.push(member);
    }

    let result = if single {
        members[0]
    } else {
        builder.get_union(members, Some(forwarding))
    };
    builder.add_attributes(result, attributes);
    result
}
