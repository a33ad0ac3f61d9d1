//! confparse-core: Configuration parser with environment expansion, includes and schemas
//!
//! This crate loads YAML or JSON configuration files, substitutes
//! `${NAME}` / `${NAME:-default}` references from an explicit environment
//! snapshot, merges `!include` directives, and validates the result against a
//! declarative schema.
//!
//! # Example
//!
//! ```rust
//! use confparse_core::{ConfigParser, Environment, FieldRule, Schema, ValueKind};
//!
//! let dir = tempfile::tempdir().unwrap();
//! let path = dir.path().join("config.yaml");
//! std::fs::write(&path, "database:\n  host: ${DB_HOST:-localhost}\n  port: 5432\n").unwrap();
//!
//! let schema = Schema::new().field(
//!     "database",
//!     FieldRule::mapping(
//!         Schema::new().field("host", FieldRule::of(ValueKind::String).required()),
//!     )
//!     .required(),
//! );
//!
//! let env = Environment::new();
//! let config = ConfigParser::new().with_schema(schema).parse(&path, &env).unwrap();
//! assert_eq!(config.get_path("database.host").unwrap().as_str(), Some("localhost"));
//! ```

pub mod env;
pub mod error;
pub mod expand;
pub mod include;
pub mod interpolation;
pub mod loader;
pub mod schema;
pub mod value;

mod parser;

pub use env::Environment;
pub use error::{Error, ErrorKind, Result};
pub use expand::{expand, expand_str};
pub use loader::{load, Format};
pub use parser::{
    parse, ConfigParser, ParserOptions, DEFAULT_INCLUDE_KEY, DEFAULT_MAX_INCLUDE_DEPTH,
};
pub use schema::{Bound, FieldRule, Schema};
pub use value::{Value, ValueKind};
