//! Include directive support
//!
//! A mapping containing the include key (`!include` by default) pulls in the
//! top-level keys of another file. The helpers here cover the three parts of
//! that: resolving the target path, guarding against cycles and runaway
//! nesting, and merging the included mapping into its parent.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use crate::error::{Error, Result, SourceLocation};
use crate::value::Value;

/// Files currently being loaded, outermost first
///
/// Paths are compared after canonicalisation so `./a.yaml` and
/// `sub/../a.yaml` are recognised as the same file.
#[derive(Debug)]
pub struct IncludeStack {
    entries: Vec<StackEntry>,
    max_depth: usize,
}

#[derive(Debug)]
struct StackEntry {
    canonical: PathBuf,
    display: String,
}

impl IncludeStack {
    /// Create an empty stack allowing `max_depth` levels of nested includes
    pub fn new(max_depth: usize) -> Self {
        Self {
            entries: Vec::new(),
            max_depth,
        }
    }

    /// Enter a file
    ///
    /// Fails with `IncludeCycle` if the file is already on the stack and with
    /// `IncludeDepthExceeded` if entering it would nest includes deeper than
    /// the limit. The root file does not count towards the depth.
    pub fn push(&mut self, path: &Path) -> Result<()> {
        let display = path.display().to_string();
        // A missing file cannot be canonicalised; the loader reports it
        let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());

        if self.entries.iter().any(|e| e.canonical == canonical) {
            let mut chain: Vec<String> = self.entries.iter().map(|e| e.display.clone()).collect();
            chain.push(display.clone());
            return Err(Error::include_cycle(display, chain));
        }

        if self.entries.len() > self.max_depth {
            return Err(Error::include_depth_exceeded(display, self.max_depth));
        }

        self.entries.push(StackEntry { canonical, display });
        Ok(())
    }

    /// Leave the innermost file
    pub fn pop(&mut self) {
        self.entries.pop();
    }

    /// Number of nested includes below the root file
    pub fn depth(&self) -> usize {
        self.entries.len().saturating_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Resolve the value of an include directive against the including file's directory
///
/// Absolute targets are used as-is. The value is not expanded: `${...}` in an
/// include path is taken literally.
pub fn resolve_include_path(
    base_dir: &Path,
    including_file: &Path,
    target: &Value,
) -> Result<PathBuf> {
    match target {
        Value::String(relative) => Ok(base_dir.join(relative)),
        other => Err(Error::parse(format!(
            "Include target must be a file path string, got {}",
            other.kind()
        ))
        .with_source_location(SourceLocation::file(including_file.display().to_string()))
        .with_help("Write the directive as `!include: relative/path.yaml`")),
    }
}

/// Merge the root of an included file into the mapping being built
///
/// Keys the mapping already holds are kept; new keys are appended in the
/// order the included file declares them.
pub fn merge_included(
    target: &mut IndexMap<String, Value>,
    included: Value,
    included_file: &Path,
) -> Result<()> {
    let Value::Mapping(map) = included else {
        return Err(Error::parse(format!(
            "Included file must contain a mapping at its root, got {}",
            included.kind()
        ))
        .with_source_location(SourceLocation::file(included_file.display().to_string())));
    };

    for (key, value) in map {
        if target.contains_key(&key) {
            log::trace!("Keeping existing '{}' over included value", key);
            continue;
        }
        target.insert(key, value);
    }
    Ok(())
}
