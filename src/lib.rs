//! Structural type inference over JSON samples.
//!
//! Feed heterogeneous sample documents in, get back a deduplicated,
//! cycle-safe type graph: one canonical root, classes merged field by field
//! across samples, enum candidates promoted or demoted, redundant string
//! shapes flattened. The graph is generation-based; every pass freezes into
//! a new reference space with an explicit old→new mapping, so downstream
//! consumers never see a half-rewritten structure.

pub mod attributes;
pub mod builder;
pub mod cli;
pub mod error;
pub mod graph;
pub mod ingest;
pub mod passes;
pub mod schema;
pub mod typ;
pub mod union_builder;
pub mod unify;

pub use error::{Error, Result};
pub use graph::{RewrittenGraph, TypeGraph};
pub use ingest::StringFormats;
pub use typ::{Type, TypeKind, TypeRef};

/// Knobs for a full inference run.
#[derive(Clone, Copy, Debug)]
pub struct InferenceOptions {
    /// Collapse integer and double observations into one number kind.
    pub conflate_numbers: bool,
    /// Promote small, well-evidenced string histograms to enums.
    pub infer_enums: bool,
    /// Collapse string-like union members into one plain string.
    pub flatten_strings: bool,
    pub formats: StringFormats,
}

impl Default for InferenceOptions {
    fn default() -> Self {
        InferenceOptions {
            conflate_numbers: false,
            infer_enums: true,
            flatten_strings: true,
            formats: StringFormats::default(),
        }
    }
}

/// Full pipeline: ingest every sample, merge the candidate roots into one
/// canonical root named `root_name`, then run the clean-up passes.
pub fn infer(
    samples: &[serde_json::Value],
    root_name: &str,
    options: &InferenceOptions,
) -> Result<TypeGraph> {
    let initial = ingest::initial_graph(samples, &options.formats)?;
    let policy = unify::UnifyPolicy {
        make_enums: false,
        conflate_numbers: options.conflate_numbers,
    };
    let mut graph = unify::merge_candidates(&initial, root_name, policy).graph;
    if options.infer_enums {
        graph = passes::infer_enums(&graph).graph;
    }
    if options.flatten_strings {
        graph = passes::flatten_strings(&graph).graph;
    }
    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn end_to_end_samples_to_schema() {
        let samples: Vec<serde_json::Value> = (0..12)
            .map(|i| {
                json!({
                    "id": i,
                    "state": if i % 2 == 0 { "open" } else { "closed" },
                    "last_seen": "2024-06-01T12:00:00Z",
                })
            })
            .collect();
        let graph = infer(&samples, "event", &InferenceOptions::default()).unwrap();
        let schema = schema::emit_schema(&graph);

        assert_eq!(schema["$ref"], "#/definitions/Event");
        let event = &schema["definitions"]["Event"];
        assert_eq!(event["properties"]["id"]["type"], "integer");
        assert_eq!(
            event["properties"]["last_seen"],
            json!({ "type": "string", "format": "date-time" })
        );
        // 12 observations, 2 distinct values: promoted.
        assert_eq!(event["properties"]["state"]["$ref"], "#/definitions/State");
        assert_eq!(schema["definitions"]["State"]["enum"], json!(["open", "closed"]));
        assert_eq!(event["required"], json!(["id", "last_seen", "state"]));
    }

    #[test]
    fn divergent_samples_become_optional_properties() {
        let samples = vec![
            json!({ "name": "a", "age": 3 }),
            json!({ "name": "b" }),
            json!({ "name": "c", "age": null }),
        ];
        let graph = infer(&samples, "person", &InferenceOptions::default()).unwrap();
        let root = graph.roots()["person"];
        let Type::Class { properties, .. } = graph.node(root) else {
            panic!("expected class at root");
        };
        assert!(!properties["name"].is_optional);
        assert!(properties["age"].is_optional);
        let Type::Union { members } = graph.node(properties["age"].type_ref) else {
            panic!("expected nullable age");
        };
        let mut kinds: Vec<TypeKind> = members.iter().map(|&m| graph.node(m).kind()).collect();
        kinds.sort_unstable();
        assert_eq!(kinds, vec![TypeKind::Null, TypeKind::Integer]);
    }

    #[test]
    fn options_switch_off_the_clean_up_passes() {
        let samples: Vec<serde_json::Value> = (0..12)
            .map(|i| json!({ "state": if i % 2 == 0 { "open" } else { "closed" } }))
            .collect();
        let options = InferenceOptions {
            infer_enums: false,
            ..InferenceOptions::default()
        };
        let graph = infer(&samples, "event", &options).unwrap();
        let root = graph.roots()["event"];
        let Type::Class { properties, .. } = graph.node(root) else {
            panic!("expected class at root");
        };
        assert!(matches!(
            graph.node(properties["state"].type_ref),
            Type::String { .. }
        ));
    }

    #[test]
    fn no_samples_is_reported_not_panicked() {
        let err = infer(&[], "root", &InferenceOptions::default()).unwrap_err();
        assert!(matches!(err, Error::NoInput));
    }
}
