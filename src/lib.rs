//! Deferred dataframe-to-SQL compilation.
//!
//! `framesql` presents a small tabular-dataframe surface but never computes
//! anything locally: every operation builds an immutable logical plan, and
//! the whole chain is compiled into a single SQL query for a remote backend.
//!
//! ```text
//! Ingestion (typed table schema)
//!       ↓
//! Logical Plan            (plan.rs)
//!       ↓
//! Fill / JSON rewrites    (fill.rs, json.rs)
//!       ↓
//! Dialect capabilities    (dialect.rs)
//!       ↓
//! SQL Renderer            (render.rs)
//!       ↓
//! Execution               (caller's layer, out of scope)
//! ```
//!
//! Two backends are supported, PostgreSQL and BigQuery, and their JSON
//! representation, slicing semantics, and window-function support
//! intentionally differ; the compiler preserves the divergence instead of
//! papering over it. Everything in the core is synchronous, pure, and
//! side-effect-free over immutable values; rendering the same plan twice,
//! from any number of threads, yields byte-identical SQL.

pub mod dialect;
pub mod error;
pub mod expr;
pub mod fill;
pub mod json;
pub mod plan;
pub mod render;

// Re-export key types for convenience
pub use dialect::{
    DialectDescriptor, DialectId, JsonStorage, BIGQUERY, POSTGRES, POSTGRES_TEXT_JSON,
};
pub use error::{FrameError, Result};
pub use expr::{
    ContainmentDirection, Expr, NullsOrder, OrderSpec, ScalarValue, SemanticType, SliceBound,
    SortKey,
};
pub use fill::{FillDirection, FillOptions};
pub use json::JsonAccessor;
pub use plan::{LogicalPlan, Source};
pub use render::render;
