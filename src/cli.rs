//! Minimal CLI: infer → (schema | types)
use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::graph::TypeGraph;
use crate::ingest::StringFormats;
use crate::InferenceOptions;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// infer structure from JSON/NDJSON samples and output a JSON Schema or a
/// debug view of the inferred type graph
#[derive(Parser, Debug)]
pub struct CommandLineInterface {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// infer and emit a JSON Schema
    Schema(SchemaOut),
    /// infer and print the type graph, one node per line
    Types(TypesOut),
}

#[derive(Args, Debug, Clone)]
struct InputSettings {
    /// treat each input line as one sample (newline-delimited JSON)
    #[arg(long, default_value_t = false)]
    ndjson: bool,

    /// name for the inferred root type
    #[arg(long, default_value = "Root")]
    root: String,

    /// collapse integers and doubles into one number type
    #[arg(long, default_value_t = false)]
    conflate_numbers: bool,

    /// never promote repeated strings to enums
    #[arg(long, default_value_t = false)]
    no_enums: bool,

    /// keep every string-like union member separate
    #[arg(long, default_value_t = false)]
    no_flatten: bool,

    /// turn off date/time/date-time recognition
    #[arg(long, default_value_t = false)]
    plain_strings: bool,

    /// one or more inputs; literal paths or quoted glob patterns
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,
}

#[derive(Args, Debug)]
struct SchemaOut {
    #[command(flatten)]
    input_settings: InputSettings,

    /// output .json file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct TypesOut {
    #[command(flatten)]
    input_settings: InputSettings,

    /// output file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl InputSettings {
    fn options(&self) -> InferenceOptions {
        InferenceOptions {
            conflate_numbers: self.conflate_numbers,
            infer_enums: !self.no_enums,
            flatten_strings: !self.no_flatten,
            formats: if self.plain_strings {
                StringFormats::none()
            } else {
                StringFormats::default()
            },
        }
    }

    fn load_samples(&self) -> Result<Vec<Value>> {
        let mut samples = Vec::new();
        for path in resolve_file_path_patterns(&self.input)? {
            let source = std::fs::read_to_string(&path)
                .map_err(|source| Error::ReadFile { path: path.clone(), source })?;
            if self.ndjson {
                for line in source.lines() {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    let value = serde_json::from_str::<Value>(line)
                        .map_err(|source| Error::ParseJson { path: path.clone(), source })?;
                    samples.push(value);
                }
            } else {
                let value = serde_json::from_str::<Value>(&source)
                    .map_err(|source| Error::ParseJson { path: path.clone(), source })?;
                samples.push(value);
            }
        }
        Ok(samples)
    }

    fn infer(&self) -> anyhow::Result<TypeGraph> {
        let samples = self.load_samples()?;
        let graph = crate::infer(&samples, &self.root, &self.options())?;
        Ok(graph)
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    pub fn run(&self) -> anyhow::Result<()> {
        match &self.cmd {
            Command::Schema(target) => {
                let graph = target.input_settings.infer()?;
                let schema = crate::schema::emit_schema(&graph);
                let rendered =
                    serde_json::to_string_pretty(&schema).context("serializing schema")?;
                write_output(target.out.as_deref(), &rendered)
            }
            Command::Types(target) => {
                let graph = target.input_settings.infer()?;
                write_output(target.out.as_deref(), &dump_types(&graph))
            }
        }
    }
}

fn write_output(out: Option<&std::path::Path>, rendered: &str) -> anyhow::Result<()> {
    if let Some(out) = out {
        if let Some(parent) = out.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        std::fs::write(out, rendered).with_context(|| format!("writing {}", out.display()))?;
    } else {
        println!("{rendered}");
    }
    Ok(())
}

fn dump_types(graph: &TypeGraph) -> String {
    use std::fmt::Write;

    let mut out = String::new();
    for (name, r) in graph.roots() {
        let _ = writeln!(out, "root {name} = #{}", r.index());
    }
    for r in graph.refs() {
        let _ = writeln!(out, "#{}: {:?}", r.index(), graph.node(r));
    }
    out
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn resolve_file_path_patterns<I>(patterns: I) -> Result<Vec<PathBuf>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        // Minimal detection for the `glob` crate syntax.
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'[' | b'{'))
    }

    let mut out = Vec::<PathBuf>::new();
    for raw in patterns {
        let pattern = raw.as_ref();
        if has_glob_chars(pattern) {
            let entries = glob::glob(pattern).map_err(|source| Error::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            })?;
            let mut matched_any = false;
            for entry in entries {
                let path = entry.map_err(|source| Error::Walk {
                    pattern: pattern.to_string(),
                    source,
                })?;
                matched_any = true;
                out.push(path);
            }
            if !matched_any {
                // An explicit glob matching nothing is an input mistake.
                return Err(Error::NoFilesMatched { pattern: pattern.to_string() });
            }
        } else {
            out.push(PathBuf::from(pattern));
        }
    }
    Ok(out)
}
