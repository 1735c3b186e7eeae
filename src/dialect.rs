//! Per-backend capability and spelling tables.
//!
//! A `DialectDescriptor` is pure data: the compiler and renderer consult it
//! to decide which SQL shape to emit, but the descriptor itself never builds
//! SQL. Differences between backends are centralized here instead of being
//! spread over per-backend subclasses, so each capability can be tested on
//! its own.

use serde::{Deserialize, Serialize};

/// Identifies a target backend. The PostgreSQL textual-json sub-variant is a
/// storage flag on the descriptor, not a separate id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DialectId {
    Postgres,
    BigQuery,
}

/// How a backend stores JSON column values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonStorage {
    /// Binary, indexable representation (PostgreSQL `jsonb`, BigQuery `JSON`).
    Binary,
    /// Textual representation (PostgreSQL `json`); list operations must cast
    /// to the binary form first.
    Textual,
}

/// Where a backend places NULLs by default in an ascending sort.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NullsDefault {
    /// NULLs sort as largest values (PostgreSQL).
    Largest,
    /// NULLs sort as smallest values (BigQuery).
    Smallest,
}

/// Static capability/spelling table for one backend.
///
/// Constructed once as a process-wide `static`, never mutated. Plans hold a
/// `&'static` reference to the descriptor they target.
#[derive(Debug, PartialEq)]
pub struct DialectDescriptor {
    pub id: DialectId,
    /// Human-readable backend name, used in error messages.
    pub name: &'static str,
    /// Identifier quote character (`"` or `` ` ``).
    pub ident_quote: char,
    /// Whether window functions accept `IGNORE NULLS`. When false, the fill
    /// engine compiles an equivalent running-count construction instead.
    pub window_ignore_nulls: bool,
    /// Whether a native structural containment operator exists. Without it,
    /// containment comparisons and query-document slice bounds are rejected
    /// at plan-build time.
    pub json_containment: bool,
    pub json_storage: JsonStorage,
    /// Whether `NULLS FIRST` / `NULLS LAST` may be spelled in ORDER BY.
    pub nulls_ordering_spelling: bool,
    pub nulls_default: NullsDefault,
}

impl DialectDescriptor {
    /// Quote an identifier, doubling any embedded quote character.
    pub fn quote_ident(&self, name: &str) -> String {
        let q = self.ident_quote;
        let doubled: String = name
            .chars()
            .flat_map(|c| {
                if c == q {
                    vec![q, q]
                } else {
                    vec![c]
                }
            })
            .collect();
        format!("{q}{doubled}{q}")
    }
}

/// PostgreSQL with `jsonb` column storage.
pub static POSTGRES: DialectDescriptor = DialectDescriptor {
    id: DialectId::Postgres,
    name: "PostgreSQL",
    ident_quote: '"',
    window_ignore_nulls: false,
    json_containment: true,
    json_storage: JsonStorage::Binary,
    nulls_ordering_spelling: true,
    nulls_default: NullsDefault::Largest,
};

/// PostgreSQL with textual `json` column storage. Same backend as
/// [`POSTGRES`]; list operations insert a `::jsonb` cast.
pub static POSTGRES_TEXT_JSON: DialectDescriptor = DialectDescriptor {
    id: DialectId::Postgres,
    name: "PostgreSQL",
    ident_quote: '"',
    window_ignore_nulls: false,
    json_containment: true,
    json_storage: JsonStorage::Textual,
    nulls_ordering_spelling: true,
    nulls_default: NullsDefault::Largest,
};

/// BigQuery.
pub static BIGQUERY: DialectDescriptor = DialectDescriptor {
    id: DialectId::BigQuery,
    name: "BigQuery",
    ident_quote: '`',
    window_ignore_nulls: true,
    json_containment: false,
    json_storage: JsonStorage::Binary,
    nulls_ordering_spelling: true,
    nulls_default: NullsDefault::Smallest,
};
