//! Dynamic SQL templates with typed parameter binding.
//!
//! A template mixes SQL text with parameter tokens (`#{expr}`, `:name`, `?`), raw
//! splices (`${expr}`) and rules (`@{name, ...}`). Compiling it against a parameter
//! source yields a [`StatementPlan`]: `?`-placeholder SQL, typed arguments in
//! placeholder order, and the result descriptors the template declared. A
//! [`StatementExecutor`] runs the plan through a [`Driver`] and names every result
//! it produces.
//!
//! ```rust
//! use sql_template::prelude::*;
//!
//! let engine = TemplateEngine::new();
//! let ctx = MapSource::new().with("ownerID", "123").with("ownerType", Value::Null);
//! let plan = engine
//!     .compile_str(
//!         "select * from t where 1=1 @{and, ownerId = #{ownerID}} @{and, ownerType = #{ownerType}}",
//!         &ctx,
//!     )
//!     .unwrap();
//! assert_eq!(plan.sql, "select * from t where 1=1 and ownerId = ?");
//! assert_eq!(plan.values(), vec![&Value::Text("123".into())]);
//! ```

pub mod arg;
pub mod builder;
pub mod codec;
pub mod context;
pub mod dialect;
pub mod driver;
pub mod engine;
pub mod error;
pub mod executor;
pub mod expr;
pub mod prelude;
pub mod results;
pub mod rules;
pub mod statement;
pub mod template;
pub mod types;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "test-utils")]
pub mod test_utils;

pub use arg::{ArgTyping, BoundArg};
pub use builder::{SqlBuilder, StatementPlan};
pub use driver::{Cursor, Driver, DriverStatement, ResultEvent};
pub use engine::{EngineOptions, RenderContext, TemplateEngine};
pub use error::SqlTemplateError;
pub use executor::{ExecutionPhase, StatementExecutor, StatementOutcome};
pub use statement::{ExecutePolicy, StatementDef, StatementRegistry};
pub use types::Value;
