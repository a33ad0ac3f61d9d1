//! Environment variable expansion over a document tree
//!
//! Every string leaf is rewritten by substituting its `${NAME}` and
//! `${NAME:-default}` references. Substitution is single-pass: a value
//! taken from the environment is inserted verbatim, even if it contains
//! `${...}` itself.

use indexmap::IndexMap;

use crate::env::Environment;
use crate::error::{Error, Result};
use crate::interpolation::{self, Interpolation};
use crate::value::Value;

/// Expand every string leaf of `value`
///
/// Non-string scalars pass through unchanged. Fails with
/// `MissingEnvironmentVariable` on the first reference that is neither set
/// nor defaulted, reporting the dotted path of the offending leaf.
pub fn expand(value: Value, env: &Environment) -> Result<Value> {
    expand_value(value, env, "")
}

/// Expand the references in a single string
pub fn expand_str(input: &str, env: &Environment) -> Result<String> {
    expand_string(input, env, "")
}

fn expand_value(value: Value, env: &Environment, path: &str) -> Result<Value> {
    match value {
        Value::String(s) => Ok(Value::String(expand_string(&s, env, path)?)),
        Value::Sequence(seq) => seq
            .into_iter()
            .enumerate()
            .map(|(i, item)| expand_value(item, env, &format!("{}[{}]", path, i)))
            .collect::<Result<Vec<_>>>()
            .map(Value::Sequence),
        Value::Mapping(map) => map
            .into_iter()
            .map(|(key, val)| {
                let key_path = join_path(path, &key);
                Ok((key, expand_value(val, env, &key_path)?))
            })
            .collect::<Result<IndexMap<_, _>>>()
            .map(Value::Mapping),
        other => Ok(other),
    }
}

/// Expand one string leaf found at `path` (empty for the root or a bare string)
pub(crate) fn expand_string(input: &str, env: &Environment, path: &str) -> Result<String> {
    if !interpolation::contains_reference(input) {
        return Ok(input.to_string());
    }

    let parsed = interpolation::parse(input);
    let mut result = String::with_capacity(input.len());
    resolve_interpolation(&parsed, env, path, &mut result)?;
    Ok(result)
}

fn resolve_interpolation(
    interp: &Interpolation,
    env: &Environment,
    path: &str,
    out: &mut String,
) -> Result<()> {
    match interp {
        Interpolation::Literal(s) => out.push_str(s),
        Interpolation::EnvVar { name, default } => match (env.get(name), default) {
            (Some(value), _) => out.push_str(value),
            (None, Some(default)) => {
                log::trace!("{} is unset, using default at '{}'", name, path);
                out.push_str(default);
            }
            (None, None) => {
                let config_path = (!path.is_empty()).then(|| path.to_string());
                return Err(Error::env_not_found(name, config_path));
            }
        },
        Interpolation::Concat(parts) => {
            for part in parts {
                resolve_interpolation(part, env, path, out)?;
            }
        }
    }
    Ok(())
}

/// Append `key` to a dotted path
pub(crate) fn join_path(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", path, key)
    }
}
