//! Plan → SQL rendering.
//!
//! A pure function from (plan, dialect) to SQL text: no I/O, no global
//! state, no counters or clocks, so identical inputs always produce
//! byte-identical output, including from concurrent threads. Every
//! internally generated alias is derived from plan structure alone.

use crate::dialect::{DialectDescriptor, DialectId, JsonStorage};
use crate::expr::{
    ContainmentDirection, Expr, FrameBound, JsonStep, NullsOrder, ScalarValue, SliceBound,
    SortKey, WindowFrame,
};
use crate::plan::{LogicalPlan, Source};

/// Render a plan to SQL text for its bound dialect.
pub fn render(plan: &LogicalPlan) -> String {
    tracing::debug!(dialect = plan.dialect().name, "rendering plan");
    render_plan(plan, 0)
}

fn render_plan(plan: &LogicalPlan, depth: usize) -> String {
    let d = plan.dialect();
    let mut parts = Vec::new();

    let items: Vec<String> = plan
        .columns()
        .iter()
        .map(|(name, expr)| format!("{} AS {}", compile_expr(expr, d), d.quote_ident(name)))
        .collect();
    parts.push(format!("SELECT {}", items.join(", ")));

    let from = match &plan.source {
        Source::Table { name } => d.quote_ident(name),
        // Subquery aliases are a function of nesting depth, nothing else.
        Source::Plan(inner) => format!("({}) AS t{}", render_plan(inner, depth + 1), depth),
    };
    parts.push(format!("FROM {from}"));

    if let Some(order) = plan.order() {
        let keys: Vec<String> = order.iter().map(|k| compile_sort_key(k, d)).collect();
        parts.push(format!("ORDER BY {}", keys.join(", ")));
    }

    parts.join(" ")
}

fn compile_expr(expr: &Expr, d: &DialectDescriptor) -> String {
    match expr {
        Expr::Column { name, .. } => d.quote_ident(name),
        Expr::Literal(value) => compile_literal(value, d),
        Expr::Function { name, args, .. } => {
            let args: Vec<String> = args.iter().map(|a| compile_expr(a, d)).collect();
            format!("{}({})", name, args.join(", "))
        }
        Expr::Window {
            function,
            args,
            ignore_nulls,
            partition_by,
            order_by,
            frame,
        } => {
            let args: Vec<String> = args.iter().map(|a| compile_expr(a, d)).collect();
            let nulls = if *ignore_nulls { " IGNORE NULLS" } else { "" };
            format!(
                "{}({}{}) OVER ({})",
                function.sql_name(),
                args.join(", "),
                nulls,
                compile_window_spec(partition_by, order_by, frame, d)
            )
        }
        Expr::JsonPath { input, step, .. } => match d.id {
            DialectId::Postgres => compile_json_postgres(input, step, d),
            DialectId::BigQuery => compile_json_bigquery(input, step, d),
        },
    }
}

fn compile_window_spec(
    partition_by: &[Expr],
    order_by: &[SortKey],
    frame: &Option<WindowFrame>,
    d: &DialectDescriptor,
) -> String {
    let mut parts = Vec::new();
    if !partition_by.is_empty() {
        let cols: Vec<String> = partition_by.iter().map(|e| compile_expr(e, d)).collect();
        parts.push(format!("PARTITION BY {}", cols.join(", ")));
    }
    if !order_by.is_empty() {
        let keys: Vec<String> = order_by.iter().map(|k| compile_sort_key(k, d)).collect();
        parts.push(format!("ORDER BY {}", keys.join(", ")));
    }
    if let Some(frame) = frame {
        parts.push(format!(
            "ROWS BETWEEN {} AND {}",
            compile_frame_bound(&frame.start),
            compile_frame_bound(&frame.end)
        ));
    }
    parts.join(" ")
}

fn compile_frame_bound(bound: &FrameBound) -> &'static str {
    match bound {
        FrameBound::UnboundedPreceding => "UNBOUNDED PRECEDING",
        FrameBound::CurrentRow => "CURRENT ROW",
        FrameBound::UnboundedFollowing => "UNBOUNDED FOLLOWING",
    }
}

fn compile_sort_key(key: &SortKey, d: &DialectDescriptor) -> String {
    let mut s = compile_expr(&key.expr, d);
    s.push_str(if key.ascending { " ASC" } else { " DESC" });
    if d.nulls_ordering_spelling {
        match key.nulls {
            NullsOrder::Default => {}
            NullsOrder::First => s.push_str(" NULLS FIRST"),
            NullsOrder::Last => s.push_str(" NULLS LAST"),
        }
    }
    s
}

fn compile_literal(value: &ScalarValue, d: &DialectDescriptor) -> String {
    match value {
        ScalarValue::Null(_) => "NULL".to_string(),
        ScalarValue::Bool(b) => {
            if *b {
                "TRUE".to_string()
            } else {
                "FALSE".to_string()
            }
        }
        ScalarValue::Int(i) => i.to_string(),
        ScalarValue::Float(f) => format!("{}", f),
        ScalarValue::Str(s) => format!("'{}'", escape_str(s)),
        ScalarValue::Timestamp(ts) => {
            format!("TIMESTAMP '{}'", ts.format("%Y-%m-%d %H:%M:%S%.6f"))
        }
        ScalarValue::Json(v) => match d.id {
            DialectId::Postgres => format!("'{}'::jsonb", escape_str(&v.to_string())),
            DialectId::BigQuery => format!("JSON '{}'", escape_str(&v.to_string())),
        },
    }
}

fn escape_str(s: &str) -> String {
    s.replace('\'', "''")
}

// ---------------------------------------------------------------------------
// PostgreSQL JSON fragments
// ---------------------------------------------------------------------------

/// Compile the accessor input, inserting a `::jsonb` cast when the column
/// storage is textual `json`. Chained steps already produce jsonb.
fn pg_json_input(input: &Expr, d: &DialectDescriptor) -> String {
    let compiled = compile_expr(input, d);
    if d.json_storage == JsonStorage::Textual && !matches!(input, Expr::JsonPath { .. }) {
        format!("({compiled})::jsonb")
    } else {
        compiled
    }
}

fn compile_json_postgres(input: &Expr, step: &JsonStep, d: &DialectDescriptor) -> String {
    let col = pg_json_input(input, d);
    match step {
        JsonStep::GetValue { key, as_text } => {
            let op = if *as_text { "->>" } else { "->" };
            format!("({col} {op} '{}')", escape_str(key))
        }
        JsonStep::GetItem { index } => format!("({col} -> {index})"),
        JsonStep::ArrayLength => {
            format!("CASE WHEN jsonb_typeof({col}) = 'array' THEN jsonb_array_length({col}) END")
        }
        JsonStep::Contains { operand, direction } => {
            let op = match direction {
                ContainmentDirection::SelfContainsOperand => "@>",
                ContainmentDirection::OperandContainsSelf => "<@",
            };
            format!("({col} {op} '{}'::jsonb)", escape_str(&operand.to_string()))
        }
        JsonStep::GetSlice { lower, upper } => {
            let lo = pg_lower_bound(lower, &col);
            let hi = pg_upper_bound(upper, &col);
            // Strict by construction: jsonb_array_elements raises on
            // non-list input, the divergence the slice contract preserves.
            format!(
                "COALESCE((SELECT jsonb_agg(e.item ORDER BY e.ord) \
                 FROM jsonb_array_elements({col}) WITH ORDINALITY AS e(item, ord) \
                 WHERE e.ord - 1 >= {lo} AND e.ord - 1 < {hi}), '[]'::jsonb)"
            )
        }
    }
}

/// Inclusive lower bound as a zero-based SQL integer expression.
fn pg_lower_bound(bound: &SliceBound, col: &str) -> String {
    match bound {
        SliceBound::Unbounded => "0".to_string(),
        SliceBound::Index(i) if *i >= 0 => i.to_string(),
        SliceBound::Index(i) => format!("jsonb_array_length({col}) - {}", -i),
        // Zero-based index of the first containment-matching element; NULL
        // when nothing matches, which empties the slice.
        SliceBound::Query(doc) => format!(
            "(SELECT min(q.ord) - 1 FROM jsonb_array_elements({col}) \
             WITH ORDINALITY AS q(item, ord) WHERE q.item @> '{}'::jsonb)",
            escape_str(&doc.to_string())
        ),
    }
}

/// Exclusive upper bound as a zero-based SQL integer expression. A query
/// bound includes the matched element itself, so the first-match ordinal
/// (one past the zero-based index) is already the exclusive bound.
fn pg_upper_bound(bound: &SliceBound, col: &str) -> String {
    match bound {
        SliceBound::Unbounded => format!("jsonb_array_length({col})"),
        SliceBound::Index(i) if *i >= 0 => i.to_string(),
        SliceBound::Index(i) => format!("jsonb_array_length({col}) - {}", -i),
        SliceBound::Query(doc) => format!(
            "(SELECT min(q.ord) FROM jsonb_array_elements({col}) \
             WITH ORDINALITY AS q(item, ord) WHERE q.item @> '{}'::jsonb)",
            escape_str(&doc.to_string())
        ),
    }
}

// ---------------------------------------------------------------------------
// BigQuery JSON fragments
// ---------------------------------------------------------------------------

fn compile_json_bigquery(input: &Expr, step: &JsonStep, d: &DialectDescriptor) -> String {
    let col = compile_expr(input, d);
    let arr = format!("JSON_QUERY_ARRAY({col})");
    match step {
        JsonStep::GetValue { key, as_text } => {
            let func = if *as_text { "JSON_VALUE" } else { "JSON_QUERY" };
            // Quoted-member path; keys with double quotes were rejected at
            // build time.
            format!("{func}({col}, '{}')", escape_str(&format!("$.\"{key}\"")))
        }
        JsonStep::GetItem { index } => {
            let offset = if *index >= 0 {
                index.to_string()
            } else {
                format!("ARRAY_LENGTH({arr}) - {}", -index)
            };
            format!("{arr}[SAFE_OFFSET({offset})]")
        }
        JsonStep::ArrayLength => format!("ARRAY_LENGTH({arr})"),
        JsonStep::GetSlice { lower, upper } => {
            let lo = bq_bound(lower, &arr).unwrap_or_else(|| "0".to_string());
            let hi = bq_bound(upper, &arr).unwrap_or_else(|| format!("ARRAY_LENGTH({arr})"));
            // UNNEST of a NULL array yields no rows, so a non-list value
            // silently becomes an empty list here. Intentional divergence
            // from PostgreSQL.
            format!(
                "TO_JSON(ARRAY(SELECT e FROM UNNEST({arr}) AS e WITH OFFSET AS off \
                 WHERE off >= {lo} AND off < {hi} ORDER BY off))"
            )
        }
        JsonStep::Contains { .. } => {
            // Rejected at plan-build time; no BigQuery containment exists.
            unreachable!("containment comparison cannot be built for BigQuery")
        }
    }
}

/// Zero-based slice bound for BigQuery; `None` means unbounded and the
/// caller substitutes the side's natural limit.
fn bq_bound(bound: &SliceBound, arr: &str) -> Option<String> {
    match bound {
        SliceBound::Unbounded => None,
        SliceBound::Index(i) if *i >= 0 => Some(i.to_string()),
        SliceBound::Index(i) => Some(format!("ARRAY_LENGTH({arr}) - {}", -i)),
        SliceBound::Query(_) => {
            // Rejected at plan-build time along with containment.
            unreachable!("query-document slice bounds cannot be built for BigQuery")
        }
    }
}
