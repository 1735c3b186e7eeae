//! JSON path sub-compiler.
//!
//! Access into a JSON column is a chain of small typed steps (member, index,
//! slice, length, containment) rather than one path parser: each backend
//! spells each step with different syntax, indexing base, and native-slice
//! support, so composable steps let the renderer pick the best dialect
//! fragment per step while this compiler stays dialect-agnostic apart from
//! capability checks. Capability gaps fail here, at plan-build time, never
//! at execution.

use crate::dialect::{DialectDescriptor, DialectId};
use crate::error::{FrameError, Result};
use crate::expr::{ContainmentDirection, Expr, JsonStep, SemanticType, SliceBound};

/// Accessor over an expression of type Json or JsonList. Every method
/// yields a new, narrower-typed expression; nothing is evaluated locally.
#[derive(Debug, Clone)]
pub struct JsonAccessor {
    expr: Expr,
    dialect: &'static DialectDescriptor,
}

impl JsonAccessor {
    /// Wrap an expression; fails unless it produces a JSON type.
    pub fn from_expr(expr: Expr, dialect: &'static DialectDescriptor) -> Result<Self> {
        let dtype = expr.semantic_type();
        if !dtype.is_json() {
            return Err(FrameError::configuration(format!(
                "json accessors require a json or json_list column, got {}",
                dtype.name()
            )));
        }
        Ok(JsonAccessor { expr, dialect })
    }

    /// Object member access. Missing key or non-object input yields NULL.
    /// `as_text` extracts the member as a string instead of JSON.
    pub fn get_value(&self, key: &str, as_text: bool) -> Result<Expr> {
        self.check_key(key)?;
        Ok(Expr::JsonPath {
            input: Box::new(self.expr.clone()),
            step: JsonStep::GetValue {
                key: key.to_string(),
                as_text,
            },
            return_type: if as_text {
                SemanticType::String
            } else {
                SemanticType::Json
            },
        })
    }

    /// List element access with end-relative negative indexing. Non-list
    /// input or an out-of-range index yields NULL.
    pub fn get_item(&self, index: i64) -> Expr {
        Expr::JsonPath {
            input: Box::new(self.expr.clone()),
            step: JsonStep::GetItem { index },
            return_type: SemanticType::Json,
        }
    }

    /// String indexing: alias of [`get_value`](Self::get_value).
    pub fn get_item_key(&self, key: &str) -> Result<Expr> {
        self.get_value(key, false)
    }

    /// List slice with inclusive-exclusive bounds. Integer bounds are
    /// end-relative when negative; a query-document bound resolves to the
    /// index of the first containment-matching element. Behavior on
    /// non-list input diverges per backend and is preserved as observed:
    /// PostgreSQL raises at execution, BigQuery yields an empty list.
    pub fn get_slice(&self, lower: SliceBound, upper: SliceBound) -> Result<Expr> {
        for bound in [&lower, &upper] {
            if matches!(bound, SliceBound::Query(_)) && !self.dialect.json_containment {
                return Err(FrameError::unsupported(
                    self.dialect.name,
                    "query-document slice bounds require a native json containment operator",
                ));
            }
        }
        Ok(Expr::JsonPath {
            input: Box::new(self.expr.clone()),
            step: JsonStep::GetSlice { lower, upper },
            return_type: SemanticType::JsonList,
        })
    }

    /// Element count of a list value; non-list input yields NULL.
    pub fn get_array_length(&self) -> Expr {
        Expr::JsonPath {
            input: Box::new(self.expr.clone()),
            step: JsonStep::ArrayLength,
            return_type: SemanticType::Integer,
        }
    }

    /// Structural containment test against a literal document. Fails at
    /// plan-build time on dialects without a native containment operator.
    pub fn compare_contains(
        &self,
        operand: serde_json::Value,
        direction: ContainmentDirection,
    ) -> Result<Expr> {
        if !self.dialect.json_containment {
            return Err(FrameError::unsupported(
                self.dialect.name,
                "json containment comparison",
            ));
        }
        Ok(Expr::JsonPath {
            input: Box::new(self.expr.clone()),
            step: JsonStep::Contains { operand, direction },
            return_type: SemanticType::Boolean,
        })
    }

    /// Continue the chain from a previously produced JSON expression.
    pub fn then(&self, expr: Expr) -> Result<JsonAccessor> {
        JsonAccessor::from_expr(expr, self.dialect)
    }

    // BigQuery JSON paths cannot express keys containing double quotes;
    // reject them up front instead of emitting a broken path.
    fn check_key(&self, key: &str) -> Result<()> {
        if self.dialect.id == DialectId::BigQuery && key.contains('"') {
            return Err(FrameError::configuration(format!(
                "key \"{key}\" contains a double quote, which BigQuery json paths cannot express"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{BIGQUERY, POSTGRES};
    use crate::plan::LogicalPlan;
    use serde_json::json;

    fn plan_on(dialect: &'static DialectDescriptor) -> LogicalPlan {
        LogicalPlan::from_table(
            "docs",
            &[
                ("_index_row", SemanticType::Integer),
                ("mixed_column", SemanticType::Json),
                ("list_column", SemanticType::JsonList),
                ("row", SemanticType::Integer),
            ],
            &["_index_row"],
            dialect,
        )
        .unwrap()
    }

    #[test]
    fn test_accessor_rejects_non_json_column() {
        let err = plan_on(&POSTGRES).json("row").unwrap_err();
        assert!(err.to_string().contains("json accessors require"));
    }

    #[test]
    fn test_get_value_narrows_type() {
        let plan = plan_on(&POSTGRES);
        let acc = plan.json("mixed_column").unwrap();
        assert_eq!(
            acc.get_value("a", false).unwrap().semantic_type(),
            SemanticType::Json
        );
        assert_eq!(
            acc.get_value("a", true).unwrap().semantic_type(),
            SemanticType::String
        );
    }

    #[test]
    fn test_chained_member_access() {
        let plan = plan_on(&POSTGRES);
        let acc = plan.json("mixed_column").unwrap();
        let inner = acc.get_value("test", false).unwrap();
        let leaf = acc.then(inner).unwrap().get_value("test", true).unwrap();
        assert_eq!(leaf.semantic_type(), SemanticType::String);
    }

    #[test]
    fn test_chain_refuses_non_json_intermediate() {
        let plan = plan_on(&POSTGRES);
        let acc = plan.json("list_column").unwrap();
        let length = acc.get_array_length();
        assert!(acc.then(length).is_err());
    }

    #[test]
    fn test_slice_produces_json_list() {
        let plan = plan_on(&POSTGRES);
        let acc = plan.json("list_column").unwrap();
        let sliced = acc
            .get_slice(SliceBound::Index(1), SliceBound::Index(-1))
            .unwrap();
        assert_eq!(sliced.semantic_type(), SemanticType::JsonList);
    }

    #[test]
    fn test_query_bound_slice_needs_containment() {
        let plan = plan_on(&BIGQUERY);
        let acc = plan.json("list_column").unwrap();
        let err = acc
            .get_slice(
                SliceBound::Query(json!({"_type": "SectionContext"})),
                SliceBound::Unbounded,
            )
            .unwrap_err();
        assert!(matches!(err, FrameError::Unsupported { .. }));
    }

    #[test]
    fn test_containment_fails_fast_on_bigquery() {
        let plan = plan_on(&BIGQUERY);
        let acc = plan.json("mixed_column").unwrap();
        let err = acc
            .compare_contains(json!({"a": "b"}), ContainmentDirection::SelfContainsOperand)
            .unwrap_err();
        match err {
            FrameError::Unsupported { dialect, .. } => assert_eq!(dialect, "BigQuery"),
            other => panic!("expected unsupported, got {other:?}"),
        }
    }

    #[test]
    fn test_containment_allowed_on_postgres() {
        let plan = plan_on(&POSTGRES);
        let acc = plan.json("mixed_column").unwrap();
        let expr = acc
            .compare_contains(json!(["a"]), ContainmentDirection::OperandContainsSelf)
            .unwrap();
        assert_eq!(expr.semantic_type(), SemanticType::Boolean);
    }

    #[test]
    fn test_bigquery_rejects_double_quoted_keys() {
        let plan = plan_on(&BIGQUERY);
        let acc = plan.json("mixed_column").unwrap();
        assert!(acc.get_value(r#"we"ird"#, false).is_err());
        // Other special characters are fine.
        assert!(acc.get_value("[{}@!{R#(!@(!", false).is_ok());
    }
}
