//! Loading raw documents from disk
//!
//! The format is chosen strictly from the file extension: `.yaml`/`.yml`
//! go to the YAML decoder and `.json` to the JSON decoder. The loader only
//! decodes; expansion and includes happen later in the parser.
//!
//! YAML is read with YAML 1.2 scalar rules. Anchors, aliases and `<<` merge
//! keys are resolved, but the YAML 1.1 spellings `yes`/`no`/`on`/`off` are
//! plain strings, so `debug: yes` needs `debug: true` to pass a
//! `type: boolean` rule. Mapping keys must be strings and custom tags are
//! rejected.

use std::fmt;
use std::path::Path;

use indexmap::IndexMap;

use crate::error::{Error, Result, SourceLocation};
use crate::expand::join_path;
use crate::value::Value;

/// Supported document formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Yaml,
    Json,
}

impl Format {
    /// Pick the format for a path from its extension
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path.extension().and_then(|e| e.to_str());
        match extension {
            Some("yaml") | Some("yml") => Ok(Format::Yaml),
            Some("json") => Ok(Format::Json),
            other => Err(Error::unsupported_format(path.display().to_string(), other)),
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Format::Yaml => f.write_str("YAML"),
            Format::Json => f.write_str("JSON"),
        }
    }
}

/// Load and decode a file into a document tree
///
/// Fails with `FileNotFound` when the path does not exist,
/// `UnsupportedFormat` for an unknown extension, and `Parse` (with line and
/// column where the decoder reports them) for malformed content.
pub fn load(path: impl AsRef<Path>) -> Result<Value> {
    let path = path.as_ref();
    let display = path.display().to_string();

    if !path.exists() {
        return Err(Error::file_not_found(display));
    }

    let format = Format::from_path(path)?;
    log::debug!("Loading {} as {}", display, format);

    let content = std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::file_not_found(display.clone())
        } else {
            Error::io(display.clone(), e)
        }
    })?;

    decode(&content, format, Some(&display))
}

/// Decode a document held in memory
pub fn load_str(content: &str, format: Format) -> Result<Value> {
    decode(content, format, None)
}

fn decode(content: &str, format: Format, file: Option<&str>) -> Result<Value> {
    match format {
        // An empty YAML stream is a null document
        Format::Yaml if content.trim().is_empty() => Ok(Value::Null),
        Format::Yaml => {
            let mut raw: serde_yaml::Value = serde_yaml::from_str(content).map_err(|e| {
                let location = e.location().map(|loc| (loc.line(), loc.column()));
                syntax_error(format, e, file, location)
            })?;
            raw.apply_merge()
                .map_err(|e| syntax_error(format, e, file, None))?;
            from_yaml_node(raw, "").map_err(|e| match file {
                Some(file) => e.with_source_location(SourceLocation::file(file)),
                None => e,
            })
        }
        Format::Json => serde_json::from_str(content).map_err(|e| {
            let location = (e.line() > 0).then(|| (e.line(), e.column()));
            syntax_error(format, e, file, location)
        }),
    }
}

/// Convert a decoded YAML node, rejecting what the document tree cannot hold
fn from_yaml_node(node: serde_yaml::Value, path: &str) -> Result<Value> {
    match node {
        serde_yaml::Value::Null => Ok(Value::Null),
        serde_yaml::Value::Bool(b) => Ok(Value::Bool(b)),
        serde_yaml::Value::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => Ok(Value::Integer(i)),
            (None, Some(f)) => Ok(Value::Float(f)),
            _ => Err(node_error(path, format!("Unrepresentable number {}", n))),
        },
        serde_yaml::Value::String(s) => Ok(Value::String(s)),
        serde_yaml::Value::Sequence(seq) => seq
            .into_iter()
            .enumerate()
            .map(|(i, item)| from_yaml_node(item, &format!("{}[{}]", path, i)))
            .collect::<Result<Vec<_>>>()
            .map(Value::Sequence),
        serde_yaml::Value::Mapping(map) => {
            let mut out = IndexMap::with_capacity(map.len());
            for (key, value) in map {
                let key = match key {
                    serde_yaml::Value::String(key) => key,
                    other => {
                        return Err(node_error(
                            path,
                            format!("Mapping keys must be strings, got {}", describe_key(&other)),
                        )
                        .with_help("Quote the key, e.g. \"1\": value"))
                    }
                };
                let value = from_yaml_node(value, &join_path(path, &key))?;
                out.insert(key, value);
            }
            Ok(Value::Mapping(out))
        }
        serde_yaml::Value::Tagged(tagged) => Err(node_error(
            path,
            format!("Unsupported YAML tag {}", tagged.tag),
        )
        .with_help("Remove the tag or quote the value; includes are written as a mapping key")),
    }
}

fn describe_key(key: &serde_yaml::Value) -> String {
    match serde_yaml::to_string(key) {
        Ok(text) => format!("`{}`", text.trim_end()),
        Err(_) => "a non-string key".to_string(),
    }
}

fn node_error(path: &str, message: String) -> Error {
    let err = Error::parse(format!("Invalid YAML: {}", message));
    if path.is_empty() {
        err
    } else {
        err.with_path(path)
    }
}

fn syntax_error(
    format: Format,
    cause: impl fmt::Display,
    file: Option<&str>,
    location: Option<(usize, usize)>,
) -> Error {
    let err = Error::parse(format!("Invalid {}: {}", format, cause));
    match file {
        Some(file) => err.with_source_location(SourceLocation {
            file: file.to_string(),
            line: location.map(|(line, _)| line),
            column: location.map(|(_, column)| column),
        }),
        None => err,
    }
}
