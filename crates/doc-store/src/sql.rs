//! Translation of filters, updates and pipelines into PostgreSQL over JSONB.
//!
//! Every user-controlled value, field names included, travels as a bind
//! parameter. Only fixed SQL fragments are formatted into the text.

use serde_json::{Value, json};
use sqlx::Postgres;
use sqlx::postgres::PgArguments;
use sqlx::query::Query;
use uuid::Uuid;

use crate::document::ID_FIELD;
use crate::filter::{Condition, Filter};
use crate::pipeline::{Accumulator, Expr, Pipeline, Stage};
use crate::update::Update;

/// A positional bind parameter.
pub(crate) enum Bind {
    Text(String),
    Json(Value),
    Float(f64),
    Uuid(Uuid),
}

/// Accumulates bind parameters while SQL text is being assembled.
#[derive(Default)]
pub(crate) struct SqlBuilder {
    binds: Vec<Bind>,
}

impl SqlBuilder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Registers a parameter and returns its placeholder (`$n`).
    pub(crate) fn bind(&mut self, bind: Bind) -> String {
        self.binds.push(bind);
        format!("${}", self.binds.len())
    }

    pub(crate) fn text(&mut self, value: impl Into<String>) -> String {
        self.bind(Bind::Text(value.into()))
    }

    pub(crate) fn into_binds(self) -> Vec<Bind> {
        self.binds
    }
}

/// Binds every accumulated parameter onto a query, in order.
pub(crate) fn bind_all<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    binds: Vec<Bind>,
) -> Query<'q, Postgres, PgArguments> {
    for bind in binds {
        query = match bind {
            Bind::Text(v) => query.bind(v),
            Bind::Json(v) => query.bind(v),
            Bind::Float(v) => query.bind(v),
            Bind::Uuid(v) => query.bind(v),
        };
    }
    query
}

/// Where compiled fragments find the document body and identifier.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Scope<'a> {
    pub body: &'a str,
    /// UUID column holding the id; `None` inside pipelines, where the id
    /// lives in the body under `_id`.
    pub id_column: Option<&'a str>,
}

impl Scope<'static> {
    pub(crate) const TABLE: Scope<'static> = Scope {
        body: "body",
        id_column: Some("id"),
    };

    pub(crate) const PIPELINE: Scope<'static> = Scope {
        body: "body",
        id_column: None,
    };
}

/// Compiles a filter into a boolean SQL expression.
pub(crate) fn filter_sql(b: &mut SqlBuilder, scope: Scope<'_>, filter: &Filter) -> String {
    let mut clauses = Vec::new();
    let body = scope.body;

    if let Some(id) = filter.id {
        clauses.push(match scope.id_column {
            Some(col) => format!("{col} = {}", b.bind(Bind::Uuid(id.as_uuid()))),
            None => format!(
                "({body} ->> '{ID_FIELD}') = {}",
                b.text(id.to_string())
            ),
        });
    }
    if let Some(id) = filter.exclude_id {
        clauses.push(match scope.id_column {
            Some(col) => format!("{col} <> {}", b.bind(Bind::Uuid(id.as_uuid()))),
            None => format!(
                "({body} ->> '{ID_FIELD}') IS DISTINCT FROM {}",
                b.text(id.to_string())
            ),
        });
    }
    for (field, condition) in &filter.conditions {
        clauses.push(condition_sql(b, body, field, condition));
    }

    if clauses.is_empty() {
        "TRUE".to_string()
    } else {
        format!("({})", clauses.join(" AND "))
    }
}

fn condition_sql(b: &mut SqlBuilder, body: &str, field: &str, condition: &Condition) -> String {
    let k = b.text(field);
    match condition {
        Condition::Eq(v) => format!("({body} -> {k}) = {}", b.bind(Bind::Json(v.clone()))),
        Condition::Ne(v) => format!(
            "({body} -> {k}) IS DISTINCT FROM {}",
            b.bind(Bind::Json(v.clone()))
        ),
        Condition::ArrayContains(v) => format!(
            "(jsonb_typeof({body} -> {k}) = 'array' AND ({body} -> {k}) @> {})",
            b.bind(Bind::Json(json!([v])))
        ),
        Condition::Gt(v) => range_sql(b, body, &k, ">", v),
        Condition::Gte(v) => range_sql(b, body, &k, ">=", v),
        Condition::Lt(v) => range_sql(b, body, &k, "<", v),
        Condition::Lte(v) => range_sql(b, body, &k, "<=", v),
        Condition::ContainsText {
            needle,
            case_insensitive,
        } => {
            let haystack = string_field(body, &k);
            let needle = b.text(needle.clone());
            if *case_insensitive {
                format!("strpos(lower({haystack}), lower({needle})) > 0")
            } else {
                format!("strpos({haystack}, {needle}) > 0")
            }
        }
        Condition::Exists(true) => format!("({body} ? {k})"),
        Condition::Exists(false) => format!("NOT ({body} ? {k})"),
    }
}

fn range_sql(b: &mut SqlBuilder, body: &str, k: &str, op: &str, bound: &Value) -> String {
    match bound {
        Value::Number(n) => match n.as_f64() {
            Some(f) => format!("{} {op} {}", numeric_field(body, k), b.bind(Bind::Float(f))),
            None => "FALSE".to_string(),
        },
        Value::String(s) => format!(
            "{} COLLATE \"C\" {op} {}",
            string_field(body, k),
            b.text(s.clone())
        ),
        _ => "FALSE".to_string(),
    }
}

/// The field as float8, or NULL when it is not a JSON number.
fn numeric_field(body: &str, k: &str) -> String {
    format!("(CASE WHEN jsonb_typeof({body} -> {k}) = 'number' THEN ({body} ->> {k})::float8 END)")
}

/// The field as text, or NULL when it is not a JSON string.
fn string_field(body: &str, k: &str) -> String {
    format!("(CASE WHEN jsonb_typeof({body} -> {k}) = 'string' THEN {body} ->> {k} END)")
}

/// Compiles an update into an expression producing the new body.
pub(crate) fn update_sql(b: &mut SqlBuilder, body: &str, update: &Update) -> String {
    match update {
        Update::Set(fields) => {
            let mut fields = fields.clone();
            fields.remove(ID_FIELD);
            format!("({body} || {})", b.bind(Bind::Json(Value::Object(fields))))
        }
        Update::ReplaceInArray { field, from, to } => {
            let k = b.text(field.clone());
            let from = b.bind(Bind::Json(from.clone()));
            let to = b.bind(Bind::Json(to.clone()));
            rewrite_array(
                body,
                &k,
                &format!(
                    "SELECT COALESCE(jsonb_agg(CASE WHEN e.elem = {from} THEN {to} ELSE e.elem END ORDER BY e.ord), '[]'::jsonb) \
                     FROM jsonb_array_elements({body} -> {k}) WITH ORDINALITY AS e(elem, ord)"
                ),
            )
        }
        Update::PullFromArray { field, value } => {
            let k = b.text(field.clone());
            let value = b.bind(Bind::Json(value.clone()));
            rewrite_array(
                body,
                &k,
                &format!(
                    "SELECT COALESCE(jsonb_agg(e.elem ORDER BY e.ord), '[]'::jsonb) \
                     FROM jsonb_array_elements({body} -> {k}) WITH ORDINALITY AS e(elem, ord) \
                     WHERE e.elem <> {value}"
                ),
            )
        }
    }
}

fn rewrite_array(body: &str, k: &str, new_array: &str) -> String {
    format!(
        "(CASE WHEN jsonb_typeof({body} -> {k}) = 'array' \
         THEN jsonb_set({body}, ARRAY[{k}], ({new_array})) \
         ELSE {body} END)"
    )
}

/// Compiles a pipeline into one statement returning a `body` column, in order.
///
/// Each stage becomes a CTE `sN(body, ord)` reading from the previous one;
/// `ord` carries the row order between stages.
pub(crate) fn pipeline_sql(b: &mut SqlBuilder, collection: &str, pipeline: &Pipeline) -> String {
    let collection = b.text(collection);
    let mut ctes = vec![format!(
        "s0 AS (SELECT body || jsonb_build_object('{ID_FIELD}', id::text) AS body, \
         row_number() OVER (ORDER BY seq) AS ord \
         FROM documents WHERE collection = {collection})"
    )];

    for (i, stage) in pipeline.stages().iter().enumerate() {
        let prev = format!("s{i}");
        ctes.push(format!("s{} AS ({})", i + 1, stage_sql(b, &prev, stage)));
    }

    format!(
        "WITH {} SELECT body FROM s{} ORDER BY ord",
        ctes.join(", "),
        pipeline.stages().len()
    )
}

fn stage_sql(b: &mut SqlBuilder, prev: &str, stage: &Stage) -> String {
    match stage {
        Stage::Match(filter) => format!(
            "SELECT body, ord FROM {prev} WHERE {}",
            filter_sql(b, Scope::PIPELINE, filter)
        ),
        Stage::Unwind {
            path,
            preserve_empty,
        } => {
            let k = b.text(path.clone());
            let keep = if *preserve_empty {
                "TRUE".to_string()
            } else {
                format!("COALESCE(jsonb_typeof(p.body -> {k}) NOT IN ('array', 'null'), FALSE)")
            };
            format!(
                "SELECT CASE \
                    WHEN u.elem IS NOT NULL THEN jsonb_set(p.body, ARRAY[{k}], u.elem) \
                    WHEN jsonb_typeof(p.body -> {k}) = 'array' THEN p.body - {k} \
                    ELSE p.body END AS body, \
                 row_number() OVER (ORDER BY p.ord, u.idx) AS ord \
                 FROM {prev} p \
                 LEFT JOIN LATERAL jsonb_array_elements(\
                    CASE WHEN jsonb_typeof(p.body -> {k}) = 'array' THEN p.body -> {k} ELSE '[]'::jsonb END\
                 ) WITH ORDINALITY AS u(elem, idx) ON TRUE \
                 WHERE u.elem IS NOT NULL OR {keep}"
            )
        }
        Stage::Group { key, accumulators } => {
            let key_sql = match key {
                Some(field) => format!("NULLIF(body -> {}, 'null'::jsonb)", b.text(field.clone())),
                None => "NULL::jsonb".to_string(),
            };
            let mut pairs = vec![format!("'{ID_FIELD}', g.key")];
            for (name, acc) in accumulators {
                let name = b.text(name.clone());
                let value = match acc {
                    Accumulator::Count => "COUNT(*)".to_string(),
                    Accumulator::Sum(expr) => {
                        format!("COALESCE(SUM({}), 0)", numeric_expr(b, "g.body", expr))
                    }
                };
                pairs.push(format!("{name}, {value}"));
            }
            let having = if key.is_none() {
                " HAVING COUNT(*) > 0"
            } else {
                ""
            };
            format!(
                "SELECT jsonb_build_object({}) AS body, row_number() OVER () AS ord \
                 FROM (SELECT {key_sql} AS key, body FROM {prev}) g \
                 GROUP BY g.key{having}",
                pairs.join(", ")
            )
        }
        Stage::Sort { field, descending } => {
            let k = b.text(field.clone());
            let direction = if *descending {
                "DESC NULLS LAST"
            } else {
                "ASC NULLS FIRST"
            };
            format!(
                "SELECT body, row_number() OVER (ORDER BY body -> {k} {direction}, ord) AS ord FROM {prev}"
            )
        }
        Stage::Project(fields) => {
            let mut pairs = Vec::new();
            for (name, expr) in fields {
                let name = b.text(name.clone());
                pairs.push(format!("{name}, {}", value_expr(b, "body", expr)));
            }
            let computed = if pairs.is_empty() {
                "'{}'::jsonb".to_string()
            } else {
                format!("jsonb_build_object({})", pairs.join(", "))
            };
            format!(
                "SELECT (CASE WHEN body ? '{ID_FIELD}' \
                    THEN jsonb_build_object('{ID_FIELD}', body -> '{ID_FIELD}') \
                    ELSE '{{}}'::jsonb END) || {computed} AS body, ord FROM {prev}"
            )
        }
    }
}

/// An expression rendered as jsonb (fields keep their stored JSON value).
fn value_expr(b: &mut SqlBuilder, body: &str, expr: &Expr) -> String {
    match expr {
        Expr::Field(name) => format!("({body} -> {})", b.text(name.clone())),
        other => format!("to_jsonb({})", numeric_expr(b, body, other)),
    }
}

/// An expression rendered as float8; NULL wherever the value is not numeric.
fn numeric_expr(b: &mut SqlBuilder, body: &str, expr: &Expr) -> String {
    match expr {
        Expr::Number(n) => format!("{}::float8", b.bind(Bind::Float(*n))),
        Expr::Field(name) => {
            let k = b.text(name.clone());
            numeric_field(body, &k)
        }
        Expr::Multiply(x, y) => format!(
            "({} * {})",
            numeric_expr(b, body, x),
            numeric_expr(b, body, y)
        ),
        Expr::Divide(x, y) => format!(
            "({} / NULLIF({}, 0))",
            numeric_expr(b, body, x),
            numeric_expr(b, body, y)
        ),
        Expr::IfNumeric {
            fields,
            then,
            otherwise,
        } => {
            let checks: Vec<String> = fields
                .iter()
                .map(|f| format!("jsonb_typeof({body} -> {}) = 'number'", b.text(f.clone())))
                .collect();
            let condition = if checks.is_empty() {
                "TRUE".to_string()
            } else {
                checks.join(" AND ")
            };
            format!(
                "(CASE WHEN {condition} THEN {} ELSE {} END)",
                numeric_expr(b, body, then),
                numeric_expr(b, body, otherwise)
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DocumentId;

    #[test]
    fn empty_filter_compiles_to_true() {
        let mut b = SqlBuilder::new();
        assert_eq!(filter_sql(&mut b, Scope::TABLE, &Filter::new()), "TRUE");
        assert!(b.into_binds().is_empty());
    }

    #[test]
    fn field_names_are_bound_not_inlined() {
        let mut b = SqlBuilder::new();
        let filter = Filter::new().eq("name'; DROP TABLE documents; --", "x");
        let sql = filter_sql(&mut b, Scope::TABLE, &filter);
        assert!(!sql.contains("DROP"));
        assert_eq!(b.into_binds().len(), 2);
    }

    #[test]
    fn id_filter_uses_column_or_body() {
        let id = DocumentId::new();

        let mut b = SqlBuilder::new();
        let sql = filter_sql(&mut b, Scope::TABLE, &Filter::by_id(id));
        assert_eq!(sql, "(id = $1)");

        let mut b = SqlBuilder::new();
        let sql = filter_sql(&mut b, Scope::PIPELINE, &Filter::by_id(id));
        assert_eq!(sql, "((body ->> '_id') = $1)");
    }

    #[test]
    fn non_comparable_bound_never_matches() {
        let mut b = SqlBuilder::new();
        let filter = Filter::new().condition("n", Condition::Gte(Value::Bool(true)));
        let sql = filter_sql(&mut b, Scope::TABLE, &filter);
        assert_eq!(sql, "(FALSE)");
    }

    #[test]
    fn pipeline_chains_one_cte_per_stage() {
        let mut b = SqlBuilder::new();
        let pipeline = Pipeline::new()
            .unwind("categories", true)
            .group(Some("categories"), vec![("count", Accumulator::Count)])
            .sort("count", true);
        let sql = pipeline_sql(&mut b, "promotions", &pipeline);
        assert!(sql.starts_with("WITH s0 AS"));
        assert!(sql.contains("s3 AS ("));
        assert!(sql.ends_with("SELECT body FROM s3 ORDER BY ord"));
    }
}
