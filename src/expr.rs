//! Symbolic expression trees.
//!
//! Expressions are immutable values shared across plans; every dataframe
//! operation composes new nodes instead of mutating existing ones. Nothing
//! here touches row data; an `Expr` only describes how a column is computed
//! once the plan is rendered to SQL.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Semantic type of a column or expression. Governs which operations are
/// legal and how literals are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SemanticType {
    Integer,
    Float,
    Boolean,
    String,
    Timestamp,
    /// Arbitrary JSON value (object, scalar, or list).
    Json,
    /// JSON value known to be a list; required for slicing.
    JsonList,
}

impl SemanticType {
    /// Lowercase name used in error messages.
    pub fn name(&self) -> &'static str {
        match self {
            SemanticType::Integer => "integer",
            SemanticType::Float => "float",
            SemanticType::Boolean => "boolean",
            SemanticType::String => "string",
            SemanticType::Timestamp => "timestamp",
            SemanticType::Json => "json",
            SemanticType::JsonList => "json_list",
        }
    }

    pub fn is_json(&self) -> bool {
        matches!(self, SemanticType::Json | SemanticType::JsonList)
    }

    /// Whether a fill value of type `other` may replace NULLs in a column of
    /// this type. Integers may fill floats; the two json types fill each
    /// other; everything else must match exactly.
    pub fn accepts(&self, other: SemanticType) -> bool {
        *self == other
            || matches!(
                (self, other),
                (SemanticType::Float, SemanticType::Integer)
                    | (SemanticType::Json, SemanticType::JsonList)
                    | (SemanticType::JsonList, SemanticType::Json)
            )
    }
}

/// A literal value with its semantic type.
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarValue {
    /// Typed NULL; the type tag keeps fill validation honest.
    Null(SemanticType),
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Timestamp(NaiveDateTime),
    Json(serde_json::Value),
}

impl ScalarValue {
    pub fn semantic_type(&self) -> SemanticType {
        match self {
            ScalarValue::Null(t) => *t,
            ScalarValue::Bool(_) => SemanticType::Boolean,
            ScalarValue::Int(_) => SemanticType::Integer,
            ScalarValue::Float(_) => SemanticType::Float,
            ScalarValue::Str(_) => SemanticType::String,
            ScalarValue::Timestamp(_) => SemanticType::Timestamp,
            ScalarValue::Json(_) => SemanticType::Json,
        }
    }
}

/// Window functions the compiler emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowFunction {
    FirstValue,
    LastValue,
    Count,
    RowNumber,
}

impl WindowFunction {
    pub fn sql_name(&self) -> &'static str {
        match self {
            WindowFunction::FirstValue => "FIRST_VALUE",
            WindowFunction::LastValue => "LAST_VALUE",
            WindowFunction::Count => "COUNT",
            WindowFunction::RowNumber => "ROW_NUMBER",
        }
    }
}

/// Window frame bound (ROWS mode only; that is all fill compilation needs).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameBound {
    UnboundedPreceding,
    CurrentRow,
    UnboundedFollowing,
}

/// `ROWS BETWEEN start AND end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowFrame {
    pub start: FrameBound,
    pub end: FrameBound,
}

impl WindowFrame {
    /// Frame for forward propagation: everything up to and including the
    /// current row.
    pub const PRECEDING_TO_CURRENT: WindowFrame = WindowFrame {
        start: FrameBound::UnboundedPreceding,
        end: FrameBound::CurrentRow,
    };

    /// Frame for backward propagation: the current row and everything after.
    pub const CURRENT_TO_FOLLOWING: WindowFrame = WindowFrame {
        start: FrameBound::CurrentRow,
        end: FrameBound::UnboundedFollowing,
    };
}

/// Placement of NULLs in a sort key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NullsOrder {
    /// Backend default; nothing is spelled in the rendered SQL.
    Default,
    First,
    Last,
}

/// One key of an order specification.
#[derive(Debug, Clone, PartialEq)]
pub struct SortKey {
    pub expr: Expr,
    pub ascending: bool,
    pub nulls: NullsOrder,
}

impl SortKey {
    pub fn new(expr: Expr, ascending: bool) -> Self {
        SortKey {
            expr,
            ascending,
            nulls: NullsOrder::Default,
        }
    }
}

/// Ordered sequence of sort keys attached to a plan. `None` on the plan
/// means row order is unspecified.
pub type OrderSpec = Vec<SortKey>;

/// Lower/upper bound of a JSON list slice.
#[derive(Debug, Clone, PartialEq)]
pub enum SliceBound {
    Unbounded,
    /// Inclusive-exclusive integer offset; end-relative when negative.
    Index(i64),
    /// Resolves to the index of the first list element whose fields are a
    /// superset of this document's fields; no match makes that side empty.
    Query(serde_json::Value),
}

/// Direction of a structural containment comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainmentDirection {
    /// `column @> operand` on PostgreSQL.
    SelfContainsOperand,
    /// `column <@ operand` on PostgreSQL.
    OperandContainsSelf,
}

/// One step of a chained JSON accessor. Each backend spells each step with
/// different syntax and indexing base, so access stays a chain of small
/// typed steps and the renderer picks the dialect-native fragment per step.
#[derive(Debug, Clone, PartialEq)]
pub enum JsonStep {
    /// Object member access; missing key or non-object yields NULL.
    GetValue { key: String, as_text: bool },
    /// List element access; negative indexes are end-relative; non-list or
    /// out-of-range yields NULL.
    GetItem { index: i64 },
    /// List slice. Behavior on non-list input intentionally diverges per
    /// backend (PostgreSQL raises at execution, BigQuery yields an empty
    /// list) and is preserved as-is.
    GetSlice { lower: SliceBound, upper: SliceBound },
    /// Element count of a list value; non-list yields NULL.
    ArrayLength,
    /// Structural containment test against a literal document.
    Contains {
        operand: serde_json::Value,
        direction: ContainmentDirection,
    },
}

/// Immutable symbolic expression node.
///
/// Shared by reference across plans; plans only ever reference strictly
/// earlier plans, so the overall structure is a DAG and never cyclic.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Reference to a column of the plan's source output, with its declared
    /// semantic type.
    Column { name: String, dtype: SemanticType },
    Literal(ScalarValue),
    /// Scalar function call: `NAME(args)`.
    Function {
        name: &'static str,
        args: Vec<Expr>,
        return_type: SemanticType,
    },
    /// Window function call: `f(args) OVER (...)`.
    Window {
        function: WindowFunction,
        args: Vec<Expr>,
        /// Only set on dialects whose descriptor advertises support.
        ignore_nulls: bool,
        partition_by: Vec<Expr>,
        order_by: Vec<SortKey>,
        frame: Option<WindowFrame>,
    },
    /// One JSON accessor step applied to `input`.
    JsonPath {
        input: Box<Expr>,
        step: JsonStep,
        return_type: SemanticType,
    },
}

impl Expr {
    pub fn column(name: impl Into<String>, dtype: SemanticType) -> Expr {
        Expr::Column {
            name: name.into(),
            dtype,
        }
    }

    pub fn literal(value: ScalarValue) -> Expr {
        Expr::Literal(value)
    }

    /// `COALESCE(expr, fallback)` typed as the original expression.
    pub fn coalesce(expr: Expr, fallback: Expr) -> Expr {
        let return_type = expr.semantic_type();
        Expr::Function {
            name: "COALESCE",
            args: vec![expr, fallback],
            return_type,
        }
    }

    /// Semantic type this expression produces.
    pub fn semantic_type(&self) -> SemanticType {
        match self {
            Expr::Column { dtype, .. } => *dtype,
            Expr::Literal(v) => v.semantic_type(),
            Expr::Function { return_type, .. } => *return_type,
            Expr::Window { function, args, .. } => match function {
                WindowFunction::Count | WindowFunction::RowNumber => SemanticType::Integer,
                WindowFunction::FirstValue | WindowFunction::LastValue => args
                    .first()
                    .map(Expr::semantic_type)
                    .unwrap_or(SemanticType::Integer),
            },
            Expr::JsonPath { return_type, .. } => *return_type,
        }
    }

    /// Collect the names of all source columns this expression references.
    pub fn referenced_columns(&self, out: &mut Vec<String>) {
        match self {
            Expr::Column { name, .. } => {
                if !out.iter().any(|n| n == name) {
                    out.push(name.clone());
                }
            }
            Expr::Literal(_) => {}
            Expr::Function { args, .. } => {
                for arg in args {
                    arg.referenced_columns(out);
                }
            }
            Expr::Window {
                args,
                partition_by,
                order_by,
                ..
            } => {
                for e in args.iter().chain(partition_by) {
                    e.referenced_columns(out);
                }
                for key in order_by {
                    key.expr.referenced_columns(out);
                }
            }
            Expr::JsonPath { input, .. } => input.referenced_columns(out),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_semantic_types() {
        assert_eq!(ScalarValue::Int(1).semantic_type(), SemanticType::Integer);
        assert_eq!(
            ScalarValue::Null(SemanticType::Json).semantic_type(),
            SemanticType::Json
        );
        assert_eq!(
            ScalarValue::Json(serde_json::json!({"a": 1})).semantic_type(),
            SemanticType::Json
        );
    }

    #[test]
    fn test_accepts_widening() {
        assert!(SemanticType::Float.accepts(SemanticType::Integer));
        assert!(!SemanticType::Integer.accepts(SemanticType::Float));
        assert!(SemanticType::Json.accepts(SemanticType::JsonList));
        assert!(!SemanticType::String.accepts(SemanticType::Integer));
    }

    #[test]
    fn test_coalesce_keeps_type() {
        let expr = Expr::coalesce(
            Expr::column("a", SemanticType::Float),
            Expr::literal(ScalarValue::Int(0)),
        );
        assert_eq!(expr.semantic_type(), SemanticType::Float);
    }

    #[test]
    fn test_window_semantic_types() {
        let count = Expr::Window {
            function: WindowFunction::Count,
            args: vec![Expr::column("a", SemanticType::String)],
            ignore_nulls: false,
            partition_by: vec![],
            order_by: vec![],
            frame: None,
        };
        assert_eq!(count.semantic_type(), SemanticType::Integer);

        let first = Expr::Window {
            function: WindowFunction::FirstValue,
            args: vec![Expr::column("a", SemanticType::String)],
            ignore_nulls: false,
            partition_by: vec![],
            order_by: vec![],
            frame: None,
        };
        assert_eq!(first.semantic_type(), SemanticType::String);
    }

    #[test]
    fn test_referenced_columns_deduplicates() {
        let expr = Expr::Window {
            function: WindowFunction::FirstValue,
            args: vec![Expr::column("a", SemanticType::Integer)],
            ignore_nulls: false,
            partition_by: vec![Expr::column("g", SemanticType::Integer)],
            order_by: vec![SortKey::new(Expr::column("a", SemanticType::Integer), true)],
            frame: Some(WindowFrame::PRECEDING_TO_CURRENT),
        };
        let mut refs = Vec::new();
        expr.referenced_columns(&mut refs);
        assert_eq!(refs, vec!["a".to_string(), "g".to_string()]);
    }
}
