//! Convenient imports for common functionality.
//!
//! This module re-exports the most commonly used types and functions
//! to make it easier to get started with the library.

pub use crate::arg::{ArgTyping, BoundArg};
pub use crate::builder::{Clause, SqlBuilder, StatementPlan};
pub use crate::codec::{CodecRef, TypeCodec, TypeRegistry, TypeRegistryBuilder};
pub use crate::context::{ArgSource, EmptySource, MapSource};
pub use crate::dialect::{LimitOffsetDialect, Page, PageDialect};
pub use crate::driver::{Cursor, Driver, DriverStatement, ResultEvent};
pub use crate::engine::{EngineOptions, RenderContext, TemplateEngine, TemplateEngineBuilder};
pub use crate::error::SqlTemplateError;
pub use crate::executor::{ExecutionPhase, StatementExecutor, StatementOutcome};
pub use crate::results::{
    ResultDescriptor, ResultKind, ResultMap, ResultShape, ResultValue, Row, RowReader,
    RowReaderRegistry,
};
pub use crate::rules::{Rule, RuleHandler, RuleInvocation, RuleRegistry, RuleRegistryBuilder};
pub use crate::statement::{
    ExecutePolicy, FragmentRegistry, MultipleResultPolicy, StatementDef, StatementKind,
    StatementRegistry,
};
pub use crate::template::Template;
pub use crate::types::{ArgMode, DriverType, DriverValue, LogicalType, Value};

#[cfg(feature = "sqlite")]
pub use crate::sqlite::{SqliteDriver, SqliteOptions};
