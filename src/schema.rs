//! JSON Schema rendering of a finished graph.
//!
//! Classes and enums land in `definitions` under a stable PascalCase title
//! and are referenced by `$ref`; everything else renders inline. Unions
//! render as `oneOf`, optional class properties as absence from `required`.

use std::collections::HashMap;

use indexmap::IndexSet;
use serde_json::{json, Map, Value};

use crate::attributes::{Descriptions, TypeNames, DESCRIPTIONS_ATTRIBUTE, NAMES_ATTRIBUTE};
use crate::graph::TypeGraph;
use crate::typ::{Type, TypeRef};

fn pascal_case(raw: &str) -> String {
    let mut out = String::new();
    let mut start_word = true;
    for c in raw.chars() {
        if c.is_ascii_alphanumeric() {
            if start_word {
                out.extend(c.to_uppercase());
                start_word = false;
            } else {
                out.push(c);
            }
        } else {
            start_word = true;
        }
    }
    out
}

/// Assign a unique definition title to every class and enum node, in ref
/// order so output is stable across runs.
fn assign_names(graph: &TypeGraph) -> HashMap<TypeRef, String> {
    let mut taken: IndexSet<String> = IndexSet::new();
    let mut names = HashMap::new();
    for r in graph.refs() {
        if !matches!(graph.node(r), Type::Class { .. } | Type::Enum { .. }) {
            continue;
        }
        let preferred = graph
            .attributes(r)
            .get::<TypeNames>(NAMES_ATTRIBUTE)
            .and_then(TypeNames::preferred)
            .map(pascal_case)
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| "Type".to_string());
        let mut candidate = preferred.clone();
        let mut n = 1usize;
        while !taken.insert(candidate.clone()) {
            candidate = format!("{preferred}{n}");
            n += 1;
        }
        names.insert(r, candidate);
    }
    names
}

fn with_description(graph: &TypeGraph, r: TypeRef, mut schema: Value) -> Value {
    if let Some(d) = graph.attributes(r).get::<Descriptions>(DESCRIPTIONS_ATTRIBUTE) {
        schema["description"] = Value::String(d.lines.join("\n"));
    }
    schema
}

fn schema_for(graph: &TypeGraph, names: &HashMap<TypeRef, String>, r: TypeRef) -> Value {
    let schema = match graph.node(r) {
        Type::Null => json!({ "type": "null" }),
        Type::Bool => json!({ "type": "boolean" }),
        Type::Integer => json!({ "type": "integer" }),
        Type::Double => json!({ "type": "number" }),
        Type::String { .. } => json!({ "type": "string" }),
        Type::Date => json!({ "type": "string", "format": "date" }),
        Type::Time => json!({ "type": "string", "format": "time" }),
        Type::DateTime => json!({ "type": "string", "format": "date-time" }),
        Type::Enum { .. } | Type::Class { .. } => {
            json!({ "$ref": format!("#/definitions/{}", names[&r]) })
        }
        Type::Array { items } => {
            json!({ "type": "array", "items": schema_for(graph, names, *items) })
        }
        Type::Map { values } => {
            json!({ "type": "object", "additionalProperties": schema_for(graph, names, *values) })
        }
        Type::Union { members } => {
            let alternatives: Vec<Value> =
                members.iter().map(|&m| schema_for(graph, names, m)).collect();
            json!({ "oneOf": alternatives })
        }
    };
    with_description(graph, r, schema)
}

fn definition_for(graph: &TypeGraph, names: &HashMap<TypeRef, String>, r: TypeRef) -> Value {
    let title = &names[&r];
    let schema = match graph.node(r) {
        Type::Class { properties, additional } => {
            let mut rendered = Map::new();
            let mut required: Vec<&str> = Vec::new();
            for (name, p) in properties {
                rendered.insert(name.clone(), schema_for(graph, names, p.type_ref));
                if !p.is_optional {
                    required.push(name);
                }
            }
            required.sort_unstable();
            let additional: Value = match additional {
                Some(a) => schema_for(graph, names, *a),
                None => Value::Bool(false),
            };
            json!({
                "type": "object",
                "additionalProperties": additional,
                "properties": rendered,
                "required": required,
                "title": title,
            })
        }
        Type::Enum { cases } => {
            let cases: Vec<&String> = cases.iter().collect();
            json!({ "type": "string", "enum": cases, "title": title })
        }
        other => panic!("no definition for a {:?} node", other.kind()),
    };
    with_description(graph, r, schema)
}

/// Render the whole graph. Multiple roots become a top-level `oneOf`.
pub fn emit_schema(graph: &TypeGraph) -> Value {
    assert!(!graph.roots().is_empty(), "schema rendering needs at least one root");
    let names = assign_names(graph);

    let mut definitions = Map::new();
    for r in graph.refs() {
        if matches!(graph.node(r), Type::Class { .. } | Type::Enum { .. }) {
            definitions.insert(names[&r].clone(), definition_for(graph, &names, r));
        }
    }

    let mut schema = if graph.roots().len() == 1 {
        let (_, &root) = graph.roots().first().expect("one root");
        schema_for(graph, &names, root)
    } else {
        let alternatives: Vec<Value> = graph
            .roots()
            .values()
            .map(|&r| schema_for(graph, &names, r))
            .collect();
        json!({ "oneOf": alternatives })
    };
    schema["definitions"] = Value::Object(definitions);
    schema
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::TypeAttributes;
    use crate::builder::TypeBuilder;
    use crate::typ::{ClassProperty, TypeKind};
    use indexmap::IndexMap;

    fn named_class(
        b: &mut TypeBuilder,
        name: &str,
        properties: IndexMap<String, ClassProperty>,
    ) -> TypeRef {
        let c = b.get_class(properties, None, None);
        b.add_attributes(c, TypeAttributes::with(TypeNames::given(name)));
        c
    }

    #[test]
    fn classes_render_as_refs_with_definitions() {
        let mut b = TypeBuilder::new();
        let int = b.get_primitive(TypeKind::Integer, None);
        let s = b.get_string(None, None);
        let mut properties = IndexMap::new();
        properties.insert("id".to_string(), ClassProperty::new(int, false));
        properties.insert("note".to_string(), ClassProperty::new(s, true));
        let c = named_class(&mut b, "ticket", properties);
        let mut roots = IndexMap::new();
        roots.insert("root".to_string(), c);
        let g = b.finish(roots);

        let schema = emit_schema(&g);
        assert_eq!(schema["$ref"], "#/definitions/Ticket");
        let def = &schema["definitions"]["Ticket"];
        assert_eq!(def["type"], "object");
        assert_eq!(def["additionalProperties"], false);
        assert_eq!(def["properties"]["id"]["type"], "integer");
        assert_eq!(def["properties"]["note"]["type"], "string");
        assert_eq!(def["required"], json!(["id"]));
        assert_eq!(def["title"], "Ticket");
    }

    #[test]
    fn unions_and_formats_render_inline() {
        let mut b = TypeBuilder::new();
        let null = b.get_primitive(TypeKind::Null, None);
        let date = b.get_primitive(TypeKind::Date, None);
        let u = b.get_union(vec![null, date], None);
        let arr = b.get_array(u, None);
        let mut roots = IndexMap::new();
        roots.insert("root".to_string(), arr);
        let g = b.finish(roots);

        let schema = emit_schema(&g);
        assert_eq!(schema["type"], "array");
        assert_eq!(
            schema["items"]["oneOf"],
            json!([
                { "type": "null" },
                { "type": "string", "format": "date" },
            ])
        );
    }

    #[test]
    fn enums_keep_their_case_order() {
        let mut b = TypeBuilder::new();
        let mut cases = IndexSet::new();
        cases.insert("pending".to_string());
        cases.insert("done".to_string());
        let e = b.get_enum(cases, None);
        b.add_attributes(e, TypeAttributes::with(TypeNames::inferred("status")));
        let mut roots = IndexMap::new();
        roots.insert("root".to_string(), e);
        let g = b.finish(roots);

        let schema = emit_schema(&g);
        assert_eq!(schema["$ref"], "#/definitions/Status");
        assert_eq!(schema["definitions"]["Status"]["enum"], json!(["pending", "done"]));
    }

    #[test]
    fn recursive_classes_reference_themselves() {
        let mut b = TypeBuilder::new();
        let me = b.reserve();
        let arr = b.get_array(me, None);
        let mut properties = IndexMap::new();
        properties.insert("children".to_string(), ClassProperty::new(arr, false));
        b.install(me, Type::Class { properties, additional: None });
        b.add_attributes(me, TypeAttributes::with(TypeNames::given("node")));
        let mut roots = IndexMap::new();
        roots.insert("root".to_string(), me);
        let g = b.finish(roots);

        let schema = emit_schema(&g);
        let def = &schema["definitions"]["Node"];
        assert_eq!(def["properties"]["children"]["items"]["$ref"], "#/definitions/Node");
    }

    #[test]
    fn colliding_names_are_uniquified() {
        let mut b = TypeBuilder::new();
        let int = b.get_primitive(TypeKind::Integer, None);
        let s = b.get_string(None, None);
        let mut p1 = IndexMap::new();
        p1.insert("a".to_string(), ClassProperty::new(int, false));
        let c1 = named_class(&mut b, "entry", p1);
        let mut p2 = IndexMap::new();
        p2.insert("b".to_string(), ClassProperty::new(s, false));
        let c2 = named_class(&mut b, "entry", p2);
        let mut roots = IndexMap::new();
        roots.insert("first".to_string(), c1);
        roots.insert("second".to_string(), c2);
        let g = b.finish(roots);

        let schema = emit_schema(&g);
        assert!(schema["definitions"]["Entry"].is_object());
        assert!(schema["definitions"]["Entry1"].is_object());
        assert_eq!(
            schema["oneOf"],
            json!([
                { "$ref": "#/definitions/Entry" },
                { "$ref": "#/definitions/Entry1" },
            ])
        );
    }

    #[test]
    fn descriptions_attach_to_definitions() {
        let mut b = TypeBuilder::new();
        let int = b.get_primitive(TypeKind::Integer, None);
        let mut properties = IndexMap::new();
        properties.insert("n".to_string(), ClassProperty::new(int, false));
        let c = named_class(&mut b, "counter", properties);
        b.add_attributes(c, TypeAttributes::with(Descriptions::single("how many")));
        let mut roots = IndexMap::new();
        roots.insert("root".to_string(), c);
        let g = b.finish(roots);

        let schema = emit_schema(&g);
        assert_eq!(schema["definitions"]["Counter"]["description"], "how many");
    }
}
