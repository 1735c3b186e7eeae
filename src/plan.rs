//! The deferred logical plan.
//!
//! A `LogicalPlan` is an immutable value describing one SELECT layer over a
//! source: an ordered column-name → expression mapping, the row-identity
//! columns, an optional order specification, and the source itself (a table
//! or an earlier plan behind an `Arc`). Every transformation yields a new
//! plan referencing the old one; no operation ever inspects row values.

use std::sync::Arc;

use crate::dialect::DialectDescriptor;
use crate::error::{FrameError, Result};
use crate::expr::{Expr, OrderSpec, SemanticType, SortKey};
use crate::fill::{self, FillOptions};
use crate::json::JsonAccessor;
use crate::render;

/// What a plan selects from.
#[derive(Debug, Clone, PartialEq)]
pub enum Source {
    /// A backend table (or view) by name.
    Table { name: String },
    /// A strictly earlier plan, rendered as a subquery. Plans only reference
    /// prior plans, so the structure is a DAG by construction.
    Plan(Arc<LogicalPlan>),
}

/// Immutable logical plan for a tabular computation not yet executed.
#[derive(Debug, Clone, PartialEq)]
pub struct LogicalPlan {
    pub(crate) source: Source,
    /// Output columns of the source, used to validate references.
    pub(crate) source_schema: Vec<(String, SemanticType)>,
    /// Unique names, in display order. Expressions reference source output
    /// columns only.
    pub(crate) columns: Vec<(String, Expr)>,
    /// Names of the row-identity columns (subset of `columns`).
    pub(crate) identity: Vec<String>,
    pub(crate) order: Option<OrderSpec>,
    pub(crate) dialect: &'static DialectDescriptor,
}

impl LogicalPlan {
    /// Build the initial plan over a backend table: one column reference per
    /// source column. This is the seam where an external ingestion layer,
    /// having already inferred per-column types, hands control to the core.
    pub fn from_table(
        table: impl Into<String>,
        columns: &[(&str, SemanticType)],
        identity: &[&str],
        dialect: &'static DialectDescriptor,
    ) -> Result<Self> {
        let mut seen: Vec<&str> = Vec::new();
        for (name, _) in columns {
            if seen.contains(name) {
                return Err(FrameError::configuration(format!(
                    "duplicate column name \"{name}\""
                )));
            }
            seen.push(*name);
        }
        for id in identity {
            if !seen.contains(id) {
                return Err(FrameError::configuration(format!(
                    "identity column \"{id}\" is not among the table columns"
                )));
            }
        }
        Ok(LogicalPlan {
            source: Source::Table { name: table.into() },
            source_schema: columns
                .iter()
                .map(|(n, t)| (n.to_string(), *t))
                .collect(),
            columns: columns
                .iter()
                .map(|(n, t)| (n.to_string(), Expr::column(*n, *t)))
                .collect(),
            identity: identity.iter().map(|s| s.to_string()).collect(),
            order: None,
            dialect,
        })
    }

    pub fn dialect(&self) -> &'static DialectDescriptor {
        self.dialect
    }

    pub fn columns(&self) -> &[(String, Expr)] {
        &self.columns
    }

    pub fn identity(&self) -> &[String] {
        &self.identity
    }

    pub fn order(&self) -> Option<&OrderSpec> {
        self.order.as_ref()
    }

    /// Expression currently bound to a column.
    pub fn column_expr(&self, name: &str) -> Result<&Expr> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, e)| e)
            .ok_or_else(|| FrameError::configuration(format!("unknown column \"{name}\"")))
    }

    /// Semantic type a column currently produces.
    pub fn column_type(&self, name: &str) -> Result<SemanticType> {
        Ok(self.column_expr(name)?.semantic_type())
    }

    /// Replace the plan's order specification. A pure rendering request: no
    /// data moves until the plan is rendered and executed.
    pub fn with_order(&self, keys: &[(&str, bool)]) -> Result<Self> {
        let mut order = Vec::with_capacity(keys.len());
        for (name, ascending) in keys {
            let dtype = self.column_type(name)?;
            order.push(SortKey::new(Expr::column(*name, dtype), *ascending));
        }
        let mut plan = self.clone();
        plan.order = Some(order);
        Ok(plan)
    }

    /// Public sorting surface. `ascending` broadcasts when it has a single
    /// element, otherwise it must match `by` in length.
    pub fn sort_values(&self, by: &[&str], ascending: &[bool]) -> Result<Self> {
        let ascending: Vec<bool> = match ascending.len() {
            0 => vec![true; by.len()],
            1 => vec![ascending[0]; by.len()],
            n if n == by.len() => ascending.to_vec(),
            n => {
                return Err(FrameError::configuration(format!(
                    "length of ascending ({n}) must match length of by ({})",
                    by.len()
                )))
            }
        };
        let keys: Vec<(&str, bool)> = by.iter().copied().zip(ascending).collect();
        self.with_order(&keys)
    }

    /// Narrow the plan to the named columns, in the given order. The order
    /// specification survives only if every sort key it names does.
    pub fn projected_columns(&self, names: &[&str]) -> Result<Self> {
        let mut columns = Vec::with_capacity(names.len());
        for name in names {
            let expr = self.column_expr(name)?.clone();
            columns.push((name.to_string(), expr));
        }
        let order = self.order.as_ref().and_then(|keys| {
            let resolves = keys.iter().all(|key| {
                let mut refs = Vec::new();
                key.expr.referenced_columns(&mut refs);
                refs.iter().all(|r| names.contains(&r.as_str()))
            });
            resolves.then(|| keys.clone())
        });
        Ok(LogicalPlan {
            source: self.source.clone(),
            source_schema: self.source_schema.clone(),
            columns,
            identity: self
                .identity
                .iter()
                .filter(|id| names.contains(&id.as_str()))
                .cloned()
                .collect(),
            order,
            dialect: self.dialect,
        })
    }

    /// Add or overwrite one column. The expression must reference source
    /// output columns only; derive from just-derived columns by calling
    /// [`materialize`](Self::materialize) first.
    pub fn derive_column(&self, name: impl Into<String>, expr: Expr) -> Result<Self> {
        let mut refs = Vec::new();
        expr.referenced_columns(&mut refs);
        for r in &refs {
            if !self.source_schema.iter().any(|(n, _)| n == r) {
                return Err(FrameError::configuration(format!(
                    "expression references \"{r}\", which does not resolve in the plan's source"
                )));
            }
        }
        let name = name.into();
        let mut plan = self.clone();
        match plan.columns.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = expr,
            None => plan.columns.push((name, expr)),
        }
        Ok(plan)
    }

    /// Wrap this plan as the source of a fresh single-layer plan whose
    /// columns are plain passthrough references. Order, identity, and
    /// dialect carry over.
    pub fn materialize(&self) -> Self {
        let source_schema: Vec<(String, SemanticType)> = self
            .columns
            .iter()
            .map(|(n, e)| (n.clone(), e.semantic_type()))
            .collect();
        LogicalPlan {
            source: Source::Plan(Arc::new(self.clone())),
            columns: source_schema
                .iter()
                .map(|(n, t)| (n.clone(), Expr::column(n.clone(), *t)))
                .collect(),
            source_schema,
            identity: self.identity.clone(),
            order: self.order.clone(),
            dialect: self.dialect,
        }
    }

    /// JSON accessor over a Json/JsonList column.
    pub fn json(&self, name: &str) -> Result<JsonAccessor> {
        let expr = self.column_expr(name)?.clone();
        JsonAccessor::from_expr(expr, self.dialect)
    }

    /// Replace NULLs, per cell, with a constant or by order-based
    /// propagation. See [`FillOptions`].
    pub fn fill_na(&self, options: &FillOptions) -> Result<Self> {
        fill::fill_na(self, options)
    }

    /// Render the plan to SQL text for its bound dialect. Pure and
    /// deterministic: identical plans always yield byte-identical SQL.
    pub fn render(&self) -> String {
        render::render(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::POSTGRES;

    fn plan() -> LogicalPlan {
        LogicalPlan::from_table(
            "events",
            &[
                ("_index_0", SemanticType::Integer),
                ("a", SemanticType::Integer),
                ("b", SemanticType::String),
            ],
            &["_index_0"],
            &POSTGRES,
        )
        .unwrap()
    }

    #[test]
    fn test_from_table_rejects_duplicates() {
        let err = LogicalPlan::from_table(
            "t",
            &[("a", SemanticType::Integer), ("a", SemanticType::Float)],
            &[],
            &POSTGRES,
        )
        .unwrap_err();
        assert!(err.to_string().contains("duplicate column"));
    }

    #[test]
    fn test_from_table_rejects_unknown_identity() {
        let err =
            LogicalPlan::from_table("t", &[("a", SemanticType::Integer)], &["idx"], &POSTGRES)
                .unwrap_err();
        assert!(err.to_string().contains("identity column"));
    }

    #[test]
    fn test_with_order_unknown_key() {
        let err = plan().with_order(&[("missing", true)]).unwrap_err();
        assert!(matches!(err, FrameError::Configuration { .. }));
    }

    #[test]
    fn test_sort_values_broadcasts_single_ascending() {
        let sorted = plan().sort_values(&["a", "b"], &[false]).unwrap();
        let order = sorted.order().unwrap();
        assert_eq!(order.len(), 2);
        assert!(order.iter().all(|k| !k.ascending));
    }

    #[test]
    fn test_sort_values_length_mismatch() {
        let err = plan().sort_values(&["a", "b"], &[true, false, true]).unwrap_err();
        assert!(matches!(err, FrameError::Configuration { .. }));
    }

    #[test]
    fn test_projection_preserves_order_when_keys_survive() {
        let sorted = plan().sort_values(&["a"], &[true]).unwrap();
        let narrowed = sorted.projected_columns(&["a", "_index_0"]).unwrap();
        assert!(narrowed.order().is_some());
        assert_eq!(narrowed.columns().len(), 2);
    }

    #[test]
    fn test_projection_clears_order_when_keys_drop() {
        let sorted = plan().sort_values(&["a"], &[true]).unwrap();
        let narrowed = sorted.projected_columns(&["b"]).unwrap();
        assert!(narrowed.order().is_none());
        assert!(narrowed.identity().is_empty());
    }

    #[test]
    fn test_derive_column_overwrites_in_place() {
        let derived = plan()
            .derive_column(
                "a",
                Expr::coalesce(
                    Expr::column("a", SemanticType::Integer),
                    Expr::literal(crate::expr::ScalarValue::Int(0)),
                ),
            )
            .unwrap();
        assert_eq!(derived.columns().len(), 3);
        // Display position of the overwritten column is unchanged.
        assert_eq!(derived.columns()[1].0, "a");
    }

    #[test]
    fn test_derive_column_rejects_unresolved_reference() {
        let err = plan()
            .derive_column("c", Expr::column("ghost", SemanticType::Integer))
            .unwrap_err();
        assert!(err.to_string().contains("does not resolve"));
    }

    #[test]
    fn test_materialize_passthrough() {
        let base = plan().sort_values(&["a"], &[true]).unwrap();
        let mat = base.materialize();
        assert_eq!(mat.columns().len(), base.columns().len());
        assert!(matches!(mat.source, Source::Plan(_)));
        assert!(mat.order().is_some());
        for (name, expr) in mat.columns() {
            assert_eq!(expr, &Expr::column(name.clone(), expr.semantic_type()));
        }
    }
}
