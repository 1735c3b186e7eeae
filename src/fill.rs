//! NULL-fill compilation.
//!
//! Constant fill wraps each target expression in COALESCE. Propagation fill
//! (forward/backward) rewrites targets into window functions over the plan's
//! established row order; direction is undefined without one, so an unsorted
//! plan is rejected outright. Explicit sort keys are always tie-broken by
//! the identity columns to keep the compiled output deterministic even when
//! the caller's keys alone do not fully order the rows.

use std::sync::Arc;

use crate::error::{FrameError, Result};
use crate::expr::{Expr, ScalarValue, SemanticType, SortKey, WindowFrame, WindowFunction};
use crate::plan::{LogicalPlan, Source};

/// Caller options for [`LogicalPlan::fill_na`]. `value` and `method` are
/// mutually exclusive; `sort_by`/`ascending` only apply to propagation
/// methods. `subset` defaults to every non-identity column.
#[derive(Debug, Clone, Default)]
pub struct FillOptions {
    pub value: Option<ScalarValue>,
    pub method: Option<String>,
    pub subset: Option<Vec<String>>,
    pub sort_by: Option<Vec<String>>,
    pub ascending: Option<Vec<bool>>,
}

impl FillOptions {
    pub fn with_value(value: ScalarValue) -> Self {
        FillOptions {
            value: Some(value),
            ..Default::default()
        }
    }

    pub fn with_method(method: impl Into<String>) -> Self {
        FillOptions {
            method: Some(method.into()),
            ..Default::default()
        }
    }
}

/// Direction of order-based propagation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillDirection {
    Forward,
    Backward,
}

fn resolve_direction(method: &str) -> Result<FillDirection> {
    match method {
        "ffill" | "pad" => Ok(FillDirection::Forward),
        "bfill" | "backfill" => Ok(FillDirection::Backward),
        other => Err(FrameError::configuration(format!(
            "\"{other}\" is not a valid propagation method."
        ))),
    }
}

/// Deterministic helper-column name for the running non-null count of a
/// target column. Derived from plan structure, never from a counter.
fn group_column_name(target: &str) -> String {
    format!("__fill_group__{target}")
}

pub(crate) fn fill_na(plan: &LogicalPlan, options: &FillOptions) -> Result<LogicalPlan> {
    let targets = resolve_targets(plan, options)?;
    match (&options.value, &options.method) {
        (Some(_), Some(_)) => Err(FrameError::configuration(
            r#"cannot specify both "method" and "value"."#,
        )),
        (None, None) => Err(FrameError::configuration(
            r#"must specify either a fill "value" or a propagation "method"."#,
        )),
        (Some(value), None) => constant_fill(plan, &targets, value),
        (None, Some(method)) => {
            let direction = resolve_direction(method)?;
            propagate_fill(plan, &targets, direction, options)
        }
    }
}

fn resolve_targets(plan: &LogicalPlan, options: &FillOptions) -> Result<Vec<String>> {
    match &options.subset {
        Some(subset) => {
            for name in subset {
                plan.column_expr(name)?;
            }
            Ok(subset.clone())
        }
        None => Ok(plan
            .columns()
            .iter()
            .map(|(n, _)| n.clone())
            .filter(|n| !plan.identity().contains(n))
            .collect()),
    }
}

fn constant_fill(
    plan: &LogicalPlan,
    targets: &[String],
    value: &ScalarValue,
) -> Result<LogicalPlan> {
    if matches!(value, ScalarValue::Null(_)) {
        return Err(FrameError::configuration("fill value must not be NULL"));
    }
    let mut filled = plan.clone();
    for target in targets {
        let column_type = plan.column_type(target)?;
        if !column_type.accepts(value.semantic_type()) {
            return Err(FrameError::configuration(format!(
                "cannot fill column \"{target}\" of type {} with a {} value",
                column_type.name(),
                value.semantic_type().name()
            )));
        }
        let Some(slot) = filled.columns.iter_mut().find(|(n, _)| n == target) else {
            continue;
        };
        // Already wrapped with the same fallback: a second pass is a no-op,
        // keeping constant fill idempotent at the plan level.
        if let Expr::Function {
            name: "COALESCE",
            args,
            ..
        } = &slot.1
        {
            if args.last() == Some(&Expr::Literal(value.clone())) {
                continue;
            }
        }
        slot.1 = Expr::coalesce(slot.1.clone(), Expr::literal(value.clone()));
    }
    Ok(filled)
}

fn propagate_fill(
    plan: &LogicalPlan,
    targets: &[String],
    direction: FillDirection,
    options: &FillOptions,
) -> Result<LogicalPlan> {
    // Resolve the effective order. An explicit sort_by replaces the plan
    // order; otherwise the plan must already carry one.
    let sorted = match &options.sort_by {
        Some(by) => {
            let by_refs: Vec<&str> = by.iter().map(String::as_str).collect();
            let ascending = options.ascending.clone().unwrap_or_default();
            plan.sort_values(&by_refs, &ascending)?
        }
        None => {
            if plan.order().is_none() {
                return Err(FrameError::unsorted_plan());
            }
            plan.clone()
        }
    };

    // Tie-break with the identity columns so the order distinguishes every
    // row even when the caller's keys do not.
    let Some(mut keys) = sorted.order.clone() else {
        return Err(FrameError::unsorted_plan());
    };
    for id in sorted.identity().to_vec() {
        let covered = keys
            .iter()
            .any(|k| matches!(&k.expr, Expr::Column { name, .. } if *name == id));
        if !covered {
            let dtype = sorted.column_type(&id)?;
            keys.push(SortKey::new(Expr::column(id, dtype), true));
        }
    }

    // The effective order lives in the window specifications (and on the
    // result plan); an ORDER BY inside the wrapped subquery would be noise.
    let mut sorted = sorted;
    sorted.order = None;
    let base = sorted.materialize();
    let frame = match direction {
        FillDirection::Forward => WindowFrame::PRECEDING_TO_CURRENT,
        FillDirection::Backward => WindowFrame::CURRENT_TO_FOLLOWING,
    };

    tracing::debug!(
        targets = targets.len(),
        ?direction,
        dialect = base.dialect.name,
        "compiling propagation fill"
    );

    let filled = if base.dialect.window_ignore_nulls {
        ignore_nulls_fill(base, targets, direction, &keys, frame)
    } else {
        running_count_fill(base, targets, direction, &keys, frame)
    };
    Ok(filled)
}

/// Native NULL-skipping window aggregate: the nearest preceding (forward) or
/// following (backward) non-null value in one window call.
fn ignore_nulls_fill(
    mut base: LogicalPlan,
    targets: &[String],
    direction: FillDirection,
    keys: &[SortKey],
    frame: WindowFrame,
) -> LogicalPlan {
    let function = match direction {
        FillDirection::Forward => WindowFunction::LastValue,
        FillDirection::Backward => WindowFunction::FirstValue,
    };
    for target in targets {
        let Some(slot) = base.columns.iter_mut().find(|(n, _)| n == target) else {
            continue;
        };
        slot.1 = Expr::Window {
            function,
            args: vec![slot.1.clone()],
            ignore_nulls: true,
            partition_by: vec![],
            order_by: keys.to_vec(),
            frame: Some(frame),
        };
    }
    base.order = Some(keys.to_vec());
    base
}

/// Equivalent construction for dialects without `IGNORE NULLS`: an inner
/// layer carries, per target, the running count of non-null values (which
/// increments exactly at each non-null row), and the outer layer takes the
/// edge value of each count group. Semantics match the native form.
fn running_count_fill(
    base: LogicalPlan,
    targets: &[String],
    direction: FillDirection,
    keys: &[SortKey],
    frame: WindowFrame,
) -> LogicalPlan {
    let mut inner = base.clone();
    for target in targets {
        let Some((_, target_expr)) = base.columns.iter().find(|(n, _)| n == target) else {
            continue;
        };
        inner.columns.push((
            group_column_name(target),
            Expr::Window {
                function: WindowFunction::Count,
                args: vec![target_expr.clone()],
                ignore_nulls: false,
                partition_by: vec![],
                order_by: keys.to_vec(),
                frame: Some(frame),
            },
        ));
    }
    // The subquery needs no ORDER BY of its own; row order is fixed by the
    // window specifications.
    inner.order = None;

    let value_function = match direction {
        FillDirection::Forward => WindowFunction::FirstValue,
        FillDirection::Backward => WindowFunction::LastValue,
    };
    let source_schema: Vec<(String, SemanticType)> = inner
        .columns
        .iter()
        .map(|(n, e)| (n.clone(), e.semantic_type()))
        .collect();
    let columns = base
        .columns
        .iter()
        .map(|(name, expr)| {
            let dtype = expr.semantic_type();
            let expr = if targets.contains(name) {
                Expr::Window {
                    function: value_function,
                    args: vec![Expr::column(name.clone(), dtype)],
                    ignore_nulls: false,
                    partition_by: vec![Expr::column(
                        group_column_name(name),
                        SemanticType::Integer,
                    )],
                    order_by: keys.to_vec(),
                    frame: Some(frame),
                }
            } else {
                Expr::column(name.clone(), dtype)
            };
            (name.clone(), expr)
        })
        .collect();

    LogicalPlan {
        source: Source::Plan(Arc::new(inner)),
        source_schema,
        columns,
        identity: base.identity.clone(),
        order: Some(keys.to_vec()),
        dialect: base.dialect,
    }
}
