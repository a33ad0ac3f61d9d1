//! The parse pipeline
//!
//! `parse` loads a file, walks the tree depth-first resolving include
//! directives and expanding string values as it goes, and finally validates
//! the result when a schema is set. Every included file goes through the same
//! load → include/expand walk before it is merged into its parent.

use std::path::Path;

use indexmap::IndexMap;

use crate::env::Environment;
use crate::error::{Error, Result, SourceLocation};
use crate::expand::{expand_string, join_path};
use crate::include::{self, IncludeStack};
use crate::loader;
use crate::schema::Schema;
use crate::value::Value;

/// Default key that marks an include directive
pub const DEFAULT_INCLUDE_KEY: &str = "!include";

/// Default limit on nested includes
pub const DEFAULT_MAX_INCLUDE_DEPTH: usize = 32;

/// Options controlling the parse pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserOptions {
    /// Mapping key treated as an include directive
    pub include_key: String,
    /// Maximum include nesting below the root file
    pub max_include_depth: usize,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            include_key: DEFAULT_INCLUDE_KEY.to_string(),
            max_include_depth: DEFAULT_MAX_INCLUDE_DEPTH,
        }
    }
}

/// Configuration parser with an optional schema
#[derive(Debug, Clone, Default)]
pub struct ConfigParser {
    schema: Option<Schema>,
    options: ParserOptions,
}

/// Per-file state for one walk
struct FileContext<'a> {
    file: &'a Path,
    base_dir: &'a Path,
}

impl ConfigParser {
    /// Create a parser without a schema
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate parse results against `schema`
    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Replace the parser options
    pub fn with_options(mut self, options: ParserOptions) -> Self {
        self.options = options;
        self
    }

    pub fn schema(&self) -> Option<&Schema> {
        self.schema.as_ref()
    }

    pub fn options(&self) -> &ParserOptions {
        &self.options
    }

    /// Load, resolve and validate a configuration file
    ///
    /// An empty schema skips validation, so any root is accepted.
    pub fn parse(&self, path: impl AsRef<Path>, env: &Environment) -> Result<Value> {
        let tree = self.resolve(path, env)?;
        if let Some(schema) = self.schema().filter(|s| !s.is_empty()) {
            log::debug!("Validating against schema with {} fields", schema.len());
            schema.validate(&tree)?;
        }
        Ok(tree)
    }

    /// Load a file and resolve its includes and references without validating
    pub fn resolve(&self, path: impl AsRef<Path>, env: &Environment) -> Result<Value> {
        let mut stack = IncludeStack::new(self.options.max_include_depth);
        self.parse_file(path.as_ref(), env, &mut stack, "")
    }

    /// Load and walk one file whose root lands at `mount` in the final tree
    fn parse_file(
        &self,
        path: &Path,
        env: &Environment,
        stack: &mut IncludeStack,
        mount: &str,
    ) -> Result<Value> {
        stack.push(path)?;
        let result = self.load_and_walk(path, env, stack, mount);
        stack.pop();
        result
    }

    fn load_and_walk(
        &self,
        path: &Path,
        env: &Environment,
        stack: &mut IncludeStack,
        mount: &str,
    ) -> Result<Value> {
        let raw = loader::load(path)?;
        let ctx = FileContext {
            file: path,
            base_dir: path.parent().unwrap_or_else(|| Path::new("")),
        };
        self.walk(raw, &ctx, env, stack, mount)
    }

    fn walk(
        &self,
        value: Value,
        ctx: &FileContext<'_>,
        env: &Environment,
        stack: &mut IncludeStack,
        path: &str,
    ) -> Result<Value> {
        match value {
            Value::String(s) => expand_string(&s, env, path)
                .map(Value::String)
                .map_err(|e| in_file(e, ctx.file)),
            Value::Sequence(seq) => seq
                .into_iter()
                .enumerate()
                .map(|(i, item)| self.walk(item, ctx, env, stack, &format!("{}[{}]", path, i)))
                .collect::<Result<Vec<_>>>()
                .map(Value::Sequence),
            Value::Mapping(map) => self.walk_mapping(map, ctx, env, stack, path),
            other => Ok(other),
        }
    }

    fn walk_mapping(
        &self,
        map: IndexMap<String, Value>,
        ctx: &FileContext<'_>,
        env: &Environment,
        stack: &mut IncludeStack,
        path: &str,
    ) -> Result<Value> {
        let mut result = IndexMap::with_capacity(map.len());

        for (key, value) in map {
            if key == self.options.include_key {
                let target = include::resolve_include_path(ctx.base_dir, ctx.file, &value)
                    .map_err(|e| if path.is_empty() { e } else { e.with_path(path) })?;
                log::debug!(
                    "Including {} from {} (depth {})",
                    target.display(),
                    ctx.file.display(),
                    stack.depth() + 1
                );
                let included = self.parse_file(&target, env, stack, path)?;
                include::merge_included(&mut result, included, &target)?;
            } else {
                let resolved = self.walk(value, ctx, env, stack, &join_path(path, &key))?;
                result.insert(key, resolved);
            }
        }

        Ok(Value::Mapping(result))
    }
}

/// Attach the file being walked to an error that has no location yet
fn in_file(err: Error, file: &Path) -> Error {
    if err.source_location.is_some() {
        return err;
    }
    err.with_source_location(SourceLocation::file(file.display().to_string()))
}

/// Parse a configuration file, validating it when `schema` is given
///
/// ```rust,no_run
/// use confparse_core::{parse, Environment};
///
/// let env = Environment::from_process();
/// let config = parse("config.yaml", &env, None).unwrap();
/// println!("{}", config.get_path("database.host").unwrap());
/// ```
pub fn parse(
    path: impl AsRef<Path>,
    env: &Environment,
    schema: Option<&Schema>,
) -> Result<Value> {
    let mut parser = ConfigParser::new();
    if let Some(schema) = schema {
        parser = parser.with_schema(schema.clone());
    }
    parser.parse(path, env)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::schema::{Bound, FieldRule};
    use crate::value::ValueKind;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, content).unwrap();
        path
    }

    fn yaml(s: &str) -> Value {
        serde_yaml::from_str(s).unwrap()
    }

    fn keys(value: &Value) -> Vec<&str> {
        value
            .as_mapping()
            .unwrap()
            .keys()
            .map(String::as_str)
            .collect()
    }

    fn env() -> Environment {
        Environment::new()
            .with_var("DB_HOST", "prod.db.example.com")
            .with_var("DB_PASSWORD", "secret123")
    }

    #[test]
    fn test_parse_expands_references() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "config.yaml",
            r#"
database:
  host: ${DB_HOST:-localhost}
  port: 5432
  password: ${DB_PASSWORD}
cache:
  host: ${CACHE_HOST:-localhost}
"#,
        );

        let config = parse(&path, &env(), None).unwrap();
        assert_eq!(
            config,
            yaml(
                r#"
database:
  host: prod.db.example.com
  port: 5432
  password: secret123
cache:
  host: localhost
"#
            )
        );
    }

    #[test]
    fn test_parse_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "config.json",
            r#"{"server": {"host": "${HOST:-0.0.0.0}", "port": 8080}}"#,
        );

        let config = parse(&path, &Environment::new(), None).unwrap();
        assert_eq!(config, yaml("server: {host: 0.0.0.0, port: 8080}"));
    }

    #[test]
    fn test_parse_missing_variable_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "c.yaml", "db:\n  users:\n    - ${DB_USER}\n");

        let err = parse(&path, &env(), None).unwrap_err();
        assert_eq!(
            err.kind,
            ErrorKind::MissingEnvironmentVariable {
                name: "DB_USER".into()
            }
        );
        assert_eq!(err.path.as_deref(), Some("db.users[0]"));
    }

    #[test]
    fn test_explicit_key_before_include_wins() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "child.yaml", "a: 2\nb: 3\n");
        let path = write(dir.path(), "parent.yaml", "a: 1\n\"!include\": child.yaml\n");

        let config = parse(&path, &Environment::new(), None).unwrap();
        assert_eq!(config, yaml("{a: 1, b: 3}"));
        assert_eq!(keys(&config), vec!["a", "b"]);
    }

    #[test]
    fn test_explicit_key_after_include_wins() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "child.yaml", "a: 2\nb: 3\n");
        let path = write(dir.path(), "parent.yaml", "\"!include\": child.yaml\na: 1\n");

        let config = parse(&path, &Environment::new(), None).unwrap();
        assert_eq!(config, yaml("{a: 1, b: 3}"));
        // The included key keeps the slot it was inserted in
        assert_eq!(keys(&config), vec!["a", "b"]);
    }

    #[test]
    fn test_include_position_in_key_order() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "child.yaml", "y: 2\nz: 3\n");
        let path = write(
            dir.path(),
            "parent.yaml",
            "x: 1\n\"!include\": child.yaml\nw: 4\n",
        );

        let config = parse(&path, &Environment::new(), None).unwrap();
        assert_eq!(keys(&config), vec!["x", "y", "z", "w"]);
        assert!(config.as_mapping().unwrap().get("!include").is_none());
    }

    #[test]
    fn test_nested_include_in_sub_mapping() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "db.yaml",
            "host: ${DB_HOST}\npassword: ${DB_PASSWORD}\n",
        );
        let path = write(
            dir.path(),
            "main.yaml",
            "database:\n  \"!include\": db.yaml\n  port: 5432\n",
        );

        let config = parse(&path, &env(), None).unwrap();
        assert_eq!(
            config,
            yaml("database: {host: prod.db.example.com, password: secret123, port: 5432}")
        );
    }

    #[test]
    fn test_include_inside_sequence_item() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "item.json", r#"{"name": "shared"}"#);
        let path = write(
            dir.path(),
            "main.yaml",
            "items:\n  - \"!include\": item.json\n    extra: true\n",
        );

        let config = parse(&path, &Environment::new(), None).unwrap();
        assert_eq!(config, yaml("items: [{name: shared, extra: true}]"));
    }

    #[test]
    fn test_includes_resolve_relative_to_including_file() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "conf/shared/leaf.yaml", "leaf: true\n");
        write(
            dir.path(),
            "conf/shared/mid.yaml",
            "\"!include\": leaf.yaml\nmid: true\n",
        );
        let path = write(
            dir.path(),
            "conf/main.yaml",
            "\"!include\": shared/mid.yaml\nmain: true\n",
        );

        let config = parse(&path, &Environment::new(), None).unwrap();
        assert_eq!(config, yaml("{leaf: true, mid: true, main: true}"));
    }

    #[test]
    fn test_include_value_is_not_expanded() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "main.yaml", "\"!include\": ${DB_HOST}.yaml\n");

        let err = parse(&path, &env(), None).unwrap_err();
        match err.kind {
            ErrorKind::FileNotFound { path } => assert!(path.ends_with("${DB_HOST}.yaml")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_include_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "main.yaml", "\"!include\": nope.yaml\n");

        let err = parse(&path, &Environment::new(), None).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::FileNotFound { .. }));
    }

    #[test]
    fn test_include_non_mapping_root() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "list.yaml", "- 1\n- 2\n");
        let path = write(dir.path(), "main.yaml", "\"!include\": list.yaml\n");

        let err = parse(&path, &Environment::new(), None).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Parse);
        assert!(err.source_location.unwrap().file.ends_with("list.yaml"));
    }

    #[test]
    fn test_include_non_string_target() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "main.yaml", "db:\n  \"!include\": [a.yaml]\n");

        let err = parse(&path, &Environment::new(), None).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Parse);
        assert_eq!(err.path.as_deref(), Some("db"));
    }

    #[test]
    fn test_include_cycle() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "b.yaml", "\"!include\": a.yaml\nb: 1\n");
        let path = write(dir.path(), "a.yaml", "\"!include\": b.yaml\na: 1\n");

        let err = parse(&path, &Environment::new(), None).unwrap_err();
        assert_eq!(err.kind, ErrorKind::IncludeCycle);
        let cause = err.cause.unwrap();
        assert_eq!(cause.matches("a.yaml").count(), 2);
        assert_eq!(cause.matches("b.yaml").count(), 1);
    }

    #[test]
    fn test_self_include_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "self.yaml", "nested:\n  \"!include\": self.yaml\n");

        let err = parse(&path, &Environment::new(), None).unwrap_err();
        assert_eq!(err.kind, ErrorKind::IncludeCycle);
    }

    #[test]
    fn test_same_file_included_twice_is_not_a_cycle() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "common.yaml", "timeout: 5\n");
        let path = write(
            dir.path(),
            "main.yaml",
            "a:\n  \"!include\": common.yaml\nb:\n  \"!include\": common.yaml\n",
        );

        let config = parse(&path, &Environment::new(), None).unwrap();
        assert_eq!(config, yaml("{a: {timeout: 5}, b: {timeout: 5}}"));
    }

    #[test]
    fn test_include_depth_limit() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "c.yaml", "c: 1\n");
        write(dir.path(), "b.yaml", "\"!include\": c.yaml\n");
        let path = write(dir.path(), "a.yaml", "\"!include\": b.yaml\n");

        let shallow = ConfigParser::new().with_options(ParserOptions {
            max_include_depth: 1,
            ..ParserOptions::default()
        });
        let err = shallow.parse(&path, &Environment::new()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::IncludeDepthExceeded { limit: 1 });

        assert_eq!(
            ConfigParser::new().parse(&path, &Environment::new()).unwrap(),
            yaml("c: 1")
        );
    }

    #[test]
    fn test_custom_include_key() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "child.yaml", "b: 2\n");
        let path = write(
            dir.path(),
            "main.yaml",
            "$include: child.yaml\n\"!include\": literal\n",
        );

        let parser = ConfigParser::new().with_options(ParserOptions {
            include_key: "$include".into(),
            ..ParserOptions::default()
        });
        let config = parser.parse(&path, &Environment::new()).unwrap();
        assert_eq!(config, yaml("{b: 2, \"!include\": literal}"));
    }

    #[test]
    fn test_validation_runs_after_includes() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "server.yaml", "port: ${PORT:-80}\n");
        write(dir.path(), "partial.yaml", "host: only\n");
        let path = write(
            dir.path(),
            "main.yaml",
            "\"!include\": partial.yaml\nserver:\n  \"!include\": server.yaml\n",
        );

        // The included fragment alone would fail `server` being required
        let schema = Schema::new()
            .field("host", FieldRule::of(ValueKind::String).required())
            .field(
                "server",
                FieldRule::mapping(
                    Schema::new().field("port", FieldRule::any().required()),
                )
                .required(),
            );
        let config = parse(&path, &Environment::new(), Some(&schema)).unwrap();
        assert_eq!(config, yaml("{host: only, server: {port: \"80\"}}"));
    }

    #[test]
    fn test_expanded_numbers_stay_strings() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "c.yaml", "port: ${PORT:-8080}\n");

        let schema = Schema::new().field("port", FieldRule::of(ValueKind::Number));
        let err = parse(&path, &Environment::new(), Some(&schema)).unwrap_err();
        assert_eq!(
            err.kind,
            ErrorKind::TypeMismatch {
                expected: ValueKind::Number,
                actual: ValueKind::String
            }
        );
    }

    #[test]
    fn test_full_pipeline_with_schema() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "database.yaml",
            r#"
host: ${DB_HOST:-localhost}
port: 5432
password: ${DB_PASSWORD}
"#,
        );
        let path = write(
            dir.path(),
            "app.yaml",
            r#"
database:
  "!include": database.yaml
server:
  host: 0.0.0.0
  port: 80
"#,
        );
        let schema = Schema::from_yaml(
            r#"
database:
  required: true
  type: mapping
  schema:
    host: {required: true, type: string}
    port: {required: true, type: number, min: 1, max: 65535}
server:
  required: true
  type: mapping
  schema:
    port: {required: true, type: number, min: 1024, max: 65535}
"#,
        )
        .unwrap();

        let parser = ConfigParser::new().with_schema(schema);
        let err = parser.parse(&path, &env()).unwrap_err();
        assert_eq!(
            err.kind,
            ErrorKind::RangeViolation {
                value: Value::Integer(80),
                bound: Bound::Min(1024.0)
            }
        );
        assert_eq!(err.path.as_deref(), Some("server.port"));

        // Resolution alone succeeds
        let tree = parser.resolve(&path, &env()).unwrap();
        assert_eq!(
            tree.get_path("database.host").unwrap(),
            &Value::from("prod.db.example.com")
        );
    }

    #[test]
    fn test_parse_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "inc.yaml", "z: ${Z:-1}\ny: 2\n");
        let path = write(
            dir.path(),
            "main.yaml",
            "b: ${B:-x}\n\"!include\": inc.yaml\na:\n  - 1\n  - ${A:-2}\n",
        );

        let first = parse(&path, &env(), None).unwrap();
        for _ in 0..5 {
            let again = parse(&path, &env(), None).unwrap();
            assert_eq!(again, first);
            assert_eq!(keys(&again), keys(&first));
        }

        let missing = dir.path().join("missing.yaml");
        assert_eq!(
            parse(&missing, &env(), None).unwrap_err(),
            parse(&missing, &env(), None).unwrap_err()
        );
    }

    #[test]
    fn test_parse_missing_root_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = parse(dir.path().join("nope.yaml"), &env(), None).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::FileNotFound { .. }));
    }

    #[test]
    fn test_options_default() {
        let parser = ConfigParser::new();
        assert_eq!(parser.options(), &ParserOptions::default());
        assert_eq!(parser.options().include_key, "!include");
        assert_eq!(parser.options().max_include_depth, 32);
        assert!(parser.schema().is_none());

        let parser = parser.with_schema(Schema::new().field("a", FieldRule::any()));
        assert_eq!(parser.schema().map(Schema::len), Some(1));
    }

    #[test]
    fn test_empty_schema_skips_validation() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "list.yaml", "- 1\n- 2\n");

        let config = parse(&path, &Environment::new(), Some(&Schema::new())).unwrap();
        assert_eq!(config, yaml("[1, 2]"));

        let err = ConfigParser::new()
            .with_schema(Schema::new().field("a", FieldRule::any()))
            .parse(&path, &Environment::new())
            .unwrap_err();
        assert!(matches!(err.kind, ErrorKind::TypeMismatch { .. }));
    }

    #[test]
    fn test_missing_variable_in_included_file() {
        let dir = tempfile::tempdir().unwrap();
        let db = write(dir.path(), "db.yaml", "password: ${DB_PASSWORD}\n");
        let path = write(
            dir.path(),
            "main.yaml",
            "password: ok\ndatabase:\n  \"!include\": db.yaml\n",
        );

        let err = parse(&path, &Environment::new(), None).unwrap_err();
        assert_eq!(
            err.kind,
            ErrorKind::MissingEnvironmentVariable {
                name: "DB_PASSWORD".into()
            }
        );
        assert_eq!(err.path.as_deref(), Some("database.password"));
        assert_eq!(err.source_location.unwrap().file, db.display().to_string());
    }

    #[test]
    fn test_missing_variable_in_root_file_names_it() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "main.yaml", "items:\n  - ${UNSET}\n");

        let err = parse(&path, &Environment::new(), None).unwrap_err();
        assert_eq!(err.path.as_deref(), Some("items[0]"));
        assert_eq!(err.source_location.unwrap().file, path.display().to_string());
    }

    #[test]
    fn test_included_paths_are_mounted_in_sequences() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "item.yaml", "name: ${ITEM_NAME}\n");
        let path = write(
            dir.path(),
            "main.yaml",
            "items:\n  - \"!include\": item.yaml\n",
        );

        let err = parse(&path, &Environment::new(), None).unwrap_err();
        assert_eq!(err.path.as_deref(), Some("items[0].name"));
    }
}
