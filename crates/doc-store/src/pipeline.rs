//! Aggregation pipelines.
//!
//! A [`Pipeline`] is an ordered list of [`Stage`]s run by the store in a
//! single request. The in-memory backend evaluates it here. The PostgreSQL
//! backend compiles it to one SQL statement.

use std::cmp::Ordering;
use std::collections::HashMap;

use serde_json::{Map, Number, Value};

use crate::document::{ID_FIELD, resolve_field};
use crate::filter::Filter;

/// A computed value over one document.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A numeric literal.
    Number(f64),
    /// The raw value of a top-level field (null when absent).
    Field(String),
    /// Product of two numeric expressions; null if either side is not numeric.
    Multiply(Box<Expr>, Box<Expr>),
    /// Quotient of two numeric expressions; null on non-numeric input or a zero divisor.
    Divide(Box<Expr>, Box<Expr>),
    /// `then` when every listed field holds a number, `otherwise` if not.
    IfNumeric {
        fields: Vec<String>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
}

/// A per-group reduction.
#[derive(Debug, Clone, PartialEq)]
pub enum Accumulator {
    /// Number of documents in the group.
    Count,
    /// Sum of the numeric values of the expression; other values are skipped.
    Sum(Expr),
}

/// One step of an aggregation pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    /// Keeps documents matching the filter.
    Match(Filter),
    /// Emits one document per element of the array in `path`.
    ///
    /// With `preserve_empty`, documents whose array is empty, null or absent
    /// are passed through once instead of being dropped.
    Unwind { path: String, preserve_empty: bool },
    /// Groups by the value of `key` (or everything, when `None`) into
    /// `{ "_id": key, <name>: <accumulated> }` documents.
    Group {
        key: Option<String>,
        accumulators: Vec<(String, Accumulator)>,
    },
    /// Stable sort on a field.
    Sort { field: String, descending: bool },
    /// Replaces each document with `_id` plus the computed fields.
    Project(Vec<(String, Expr)>),
}

/// An ordered aggregation pipeline.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Expr {
    pub fn field(name: impl Into<String>) -> Self {
        Expr::Field(name.into())
    }

    pub fn multiply(a: Expr, b: Expr) -> Self {
        Expr::Multiply(Box::new(a), Box::new(b))
    }

    pub fn divide(a: Expr, b: Expr) -> Self {
        Expr::Divide(Box::new(a), Box::new(b))
    }

    pub fn if_numeric(fields: &[&str], then: Expr, otherwise: Expr) -> Self {
        Expr::IfNumeric {
            fields: fields.iter().map(|f| f.to_string()).collect(),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        }
    }

    /// Evaluates the expression against a JSON document.
    pub fn eval(&self, doc: &Value) -> Value {
        match self {
            Expr::Number(n) => number_to_value(*n),
            Expr::Field(name) => resolve_field(doc, name).cloned().unwrap_or(Value::Null),
            Expr::Multiply(a, b) => match (a.eval(doc).as_f64(), b.eval(doc).as_f64()) {
                (Some(a), Some(b)) => number_to_value(a * b),
                _ => Value::Null,
            },
            Expr::Divide(a, b) => match (a.eval(doc).as_f64(), b.eval(doc).as_f64()) {
                (Some(a), Some(b)) if b != 0.0 => number_to_value(a / b),
                _ => Value::Null,
            },
            Expr::IfNumeric {
                fields,
                then,
                otherwise,
            } => {
                let all_numeric = fields
                    .iter()
                    .all(|f| resolve_field(doc, f).is_some_and(Value::is_number));
                if all_numeric {
                    then.eval(doc)
                } else {
                    otherwise.eval(doc)
                }
            }
        }
    }
}

impl Pipeline {
    /// Creates an empty pipeline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the stages in execution order.
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn stage(mut self, stage: Stage) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn filter(self, filter: Filter) -> Self {
        self.stage(Stage::Match(filter))
    }

    pub fn unwind(self, path: impl Into<String>, preserve_empty: bool) -> Self {
        self.stage(Stage::Unwind {
            path: path.into(),
            preserve_empty,
        })
    }

    pub fn group(self, key: Option<&str>, accumulators: Vec<(&str, Accumulator)>) -> Self {
        self.stage(Stage::Group {
            key: key.map(str::to_string),
            accumulators: accumulators
                .into_iter()
                .map(|(name, acc)| (name.to_string(), acc))
                .collect(),
        })
    }

    pub fn sort(self, field: impl Into<String>, descending: bool) -> Self {
        self.stage(Stage::Sort {
            field: field.into(),
            descending,
        })
    }

    pub fn project(self, fields: Vec<(&str, Expr)>) -> Self {
        self.stage(Stage::Project(
            fields
                .into_iter()
                .map(|(name, expr)| (name.to_string(), expr))
                .collect(),
        ))
    }

    /// Runs the pipeline over documents rendered with their `_id`.
    pub fn execute(&self, docs: Vec<Value>) -> Vec<Value> {
        self.stages
            .iter()
            .fold(docs, |docs, stage| execute_stage(stage, docs))
    }
}

fn execute_stage(stage: &Stage, docs: Vec<Value>) -> Vec<Value> {
    match stage {
        Stage::Match(filter) => docs.into_iter().filter(|d| filter.matches_value(d)).collect(),
        Stage::Unwind {
            path,
            preserve_empty,
        } => exec_unwind(docs, path, *preserve_empty),
        Stage::Group { key, accumulators } => exec_group(docs, key.as_deref(), accumulators),
        Stage::Sort { field, descending } => exec_sort(docs, field, *descending),
        Stage::Project(fields) => exec_project(docs, fields),
    }
}

fn exec_unwind(docs: Vec<Value>, path: &str, preserve_empty: bool) -> Vec<Value> {
    let mut result = Vec::new();
    for doc in docs {
        match resolve_field(&doc, path).cloned() {
            Some(Value::Array(items)) if items.is_empty() => {
                if preserve_empty {
                    let mut doc = doc;
                    if let Some(map) = doc.as_object_mut() {
                        map.remove(path);
                    }
                    result.push(doc);
                }
            }
            Some(Value::Array(items)) => {
                for item in items {
                    let mut unwound = doc.clone();
                    if let Some(map) = unwound.as_object_mut() {
                        map.insert(path.to_string(), item);
                    }
                    result.push(unwound);
                }
            }
            None | Some(Value::Null) => {
                if preserve_empty {
                    result.push(doc);
                }
            }
            Some(_) => result.push(doc),
        }
    }
    result
}

enum AccumulatorState {
    Count(u64),
    Sum(f64),
}

impl AccumulatorState {
    fn new(acc: &Accumulator) -> Self {
        match acc {
            Accumulator::Count => AccumulatorState::Count(0),
            Accumulator::Sum(_) => AccumulatorState::Sum(0.0),
        }
    }

    fn feed(&mut self, acc: &Accumulator, doc: &Value) {
        match (self, acc) {
            (AccumulatorState::Count(n), _) => *n += 1,
            (AccumulatorState::Sum(total), Accumulator::Sum(expr)) => {
                if let Some(n) = expr.eval(doc).as_f64() {
                    *total += n;
                }
            }
            (AccumulatorState::Sum(_), Accumulator::Count) => {}
        }
    }

    fn finish(self) -> Value {
        match self {
            AccumulatorState::Count(n) => Value::from(n),
            AccumulatorState::Sum(total) => float_to_value(total),
        }
    }
}

fn exec_group(docs: Vec<Value>, key: Option<&str>, accumulators: &[(String, Accumulator)]) -> Vec<Value> {
    // Groups keep first-seen order; keys are indexed by their JSON text.
    let mut order: Vec<(Value, Vec<AccumulatorState>)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for doc in &docs {
        let group_key = key
            .and_then(|k| resolve_field(doc, k).cloned())
            .unwrap_or(Value::Null);
        let slot = *index.entry(group_key.to_string()).or_insert_with(|| {
            let states = accumulators
                .iter()
                .map(|(_, acc)| AccumulatorState::new(acc))
                .collect();
            order.push((group_key.clone(), states));
            order.len() - 1
        });
        let states = &mut order[slot].1;
        for (state, (_, acc)) in states.iter_mut().zip(accumulators) {
            state.feed(acc, doc);
        }
    }

    order
        .into_iter()
        .map(|(group_key, states)| {
            let mut map = Map::new();
            map.insert(ID_FIELD.to_string(), group_key);
            for ((name, _), state) in accumulators.iter().zip(states) {
                map.insert(name.clone(), state.finish());
            }
            Value::Object(map)
        })
        .collect()
}

fn exec_sort(mut docs: Vec<Value>, field: &str, descending: bool) -> Vec<Value> {
    docs.sort_by(|a, b| {
        let ord = compare_values(resolve_field(a, field), resolve_field(b, field));
        if descending { ord.reverse() } else { ord }
    });
    docs
}

fn exec_project(docs: Vec<Value>, fields: &[(String, Expr)]) -> Vec<Value> {
    docs.into_iter()
        .map(|doc| {
            let mut map = Map::new();
            if let Some(id) = resolve_field(&doc, ID_FIELD) {
                map.insert(ID_FIELD.to_string(), id.clone());
            }
            for (name, expr) in fields {
                map.insert(name.clone(), expr.eval(&doc));
            }
            Value::Object(map)
        })
        .collect()
}

/// Total order used by sort: absent/null, then numbers, then strings, then the rest.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(v: Option<&Value>) -> u8 {
        match v {
            None | Some(Value::Null) => 0,
            Some(Value::Number(_)) => 1,
            Some(Value::String(_)) => 2,
            Some(_) => 3,
        }
    }

    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

fn number_to_value(n: f64) -> Value {
    if n.fract() == 0.0 && n >= i64::MIN as f64 && n <= i64::MAX as f64 {
        Value::from(n as i64)
    } else {
        float_to_value(n)
    }
}

fn float_to_value(n: f64) -> Value {
    Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
}
