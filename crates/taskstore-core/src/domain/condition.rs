//! Condition evaluator - タスク検索用のブール式
//!
//! A `Condition` is a tree: each node folds its operations and its
//! subconditions with one logical operator. Evaluation is pure.
//!
//! # 比較ルール
//! - 比較はタスク側の値の型で決まる（条件側が文字列ならパースする）
//! - 型が合わない場合は `Comparison::Incomparable`
//! - `Incomparable` は `=,<,<=,>,>=` を満たさず、`!=` も満たさない
//! - nil 同士は等しい、nil は非 nil より小さい

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::task::Task;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = "=")]
    Equal,
    #[serde(rename = "!=")]
    NotEqual,
    #[serde(rename = "<")]
    Less,
    #[serde(rename = "<=")]
    LessOrEqual,
    #[serde(rename = ">")]
    Greater,
    #[serde(rename = ">=")]
    GreaterOrEqual,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogicalOperator {
    #[default]
    #[serde(rename = "AND")]
    And,
    #[serde(rename = "OR")]
    Or,
}

/// Condition-side literal.
///
/// JSON numbers without a fraction decode as `Int`. `Time` is only
/// constructed programmatically; over the wire timestamps travel as
/// RFC 3339 strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    #[serde(skip_deserializing)]
    Time(DateTime<Utc>),
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    #[serde(rename = "fld")]
    pub field: String,
    #[serde(rename = "op")]
    pub operator: Operator,
    /// `None` is the nil literal.
    #[serde(rename = "val", default)]
    pub value: Option<Value>,
}

impl Operation {
    pub fn new(field: impl Into<String>, operator: Operator, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            operator,
            value: Some(value.into()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    /// Missing means AND.
    #[serde(rename = "lop", default, skip_serializing_if = "Option::is_none")]
    pub logical_operator: Option<LogicalOperator>,
    #[serde(rename = "ops", default)]
    pub operations: Vec<Operation>,
    #[serde(rename = "conds", default)]
    pub conditions: Vec<Condition>,
}

impl Condition {
    pub fn all(operations: Vec<Operation>) -> Self {
        Self {
            logical_operator: Some(LogicalOperator::And),
            operations,
            conditions: Vec::new(),
        }
    }

    pub fn any(operations: Vec<Operation>) -> Self {
        Self {
            logical_operator: Some(LogicalOperator::Or),
            operations,
            conditions: Vec::new(),
        }
    }

    /// A node with neither operations nor subconditions.
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty() && self.conditions.is_empty()
    }

    pub fn evaluate(&self, task: &Task) -> bool {
        evaluate(task, self)
    }
}

/// Task-side value resolved from a field name.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Nil,
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    Time(DateTime<Utc>),
}

/// Three-way comparison result plus the "types do not match" sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Less,
    Equal,
    Greater,
    Incomparable,
}

impl From<Ordering> for Comparison {
    fn from(ord: Ordering) -> Self {
        match ord {
            Ordering::Less => Comparison::Less,
            Ordering::Equal => Comparison::Equal,
            Ordering::Greater => Comparison::Greater,
        }
    }
}

const PARAM_PREFIX: &str = "param.";

/// Resolve a field of `task`.
///
/// Unknown fields and missing param keys resolve to an empty string;
/// an unset owner or error resolves to nil.
pub fn field_value(task: &Task, field: &str) -> FieldValue {
    match field {
        "id" => FieldValue::Str(task.id.clone()),
        "kind" => FieldValue::Str(task.kind.clone()),
        "group" => FieldValue::Str(task.group.clone()),
        "owner" => task
            .owner
            .clone()
            .map_or(FieldValue::Nil, FieldValue::Str),
        "status" => FieldValue::Int(i64::from(task.status.as_u8())),
        "timestamp" | "ts" => FieldValue::Time(task.timestamp),
        "error" => task
            .error
            .clone()
            .map_or(FieldValue::Nil, FieldValue::Str),
        other => match other.strip_prefix(PARAM_PREFIX) {
            Some(key) => FieldValue::Str(task.param.get(key).cloned().unwrap_or_default()),
            None => FieldValue::Str(String::new()),
        },
    }
}

/// Compare a task-side value against a condition literal.
pub fn compare(a: &FieldValue, b: Option<&Value>) -> Comparison {
    let Some(b) = b else {
        return if *a == FieldValue::Nil {
            Comparison::Equal
        } else {
            Comparison::Incomparable
        };
    };

    match (a, b) {
        (FieldValue::Nil, _) => Comparison::Less,

        (FieldValue::Int(a), Value::Int(b)) => a.cmp(b).into(),
        (FieldValue::Int(a), Value::Str(b)) => a.cmp(&b.trim().parse::<i64>().unwrap_or(0)).into(),

        (FieldValue::Float(a), Value::Float(b)) => compare_float(*a, *b),
        (FieldValue::Float(a), Value::Str(b)) => {
            compare_float(*a, b.trim().parse::<f64>().unwrap_or(0.0))
        }

        (FieldValue::Str(a), Value::Str(b)) => a.as_str().cmp(b.as_str()).into(),

        (FieldValue::Bool(a), Value::Bool(b)) => a.cmp(b).into(),
        (FieldValue::Bool(a), Value::Str(b)) => a.cmp(&parse_bool(b)).into(),

        (FieldValue::Time(a), Value::Time(b)) => a.cmp(b).into(),
        (FieldValue::Time(a), Value::Str(b)) => {
            let b = DateTime::parse_from_rfc3339(b.trim())
                .map(|t| t.with_timezone(&Utc))
                .unwrap_or(DateTime::<Utc>::MIN_UTC);
            a.cmp(&b).into()
        }

        _ => Comparison::Incomparable,
    }
}

fn compare_float(a: f64, b: f64) -> Comparison {
    a.partial_cmp(&b)
        .map_or(Comparison::Incomparable, Comparison::from)
}

fn parse_bool(s: &str) -> bool {
    matches!(s.trim(), "1" | "t" | "T" | "true" | "TRUE" | "True")
}

fn operation_holds(task: &Task, op: &Operation) -> bool {
    let result = compare(&field_value(task, &op.field), op.value.as_ref());
    match op.operator {
        Operator::Equal => result == Comparison::Equal,
        Operator::NotEqual => matches!(result, Comparison::Less | Comparison::Greater),
        Operator::Less => result == Comparison::Less,
        Operator::LessOrEqual => matches!(result, Comparison::Less | Comparison::Equal),
        Operator::Greater => result == Comparison::Greater,
        Operator::GreaterOrEqual => matches!(result, Comparison::Greater | Comparison::Equal),
    }
}

/// Evaluate `condition` against `task`. An empty node is true.
pub fn evaluate(task: &Task, condition: &Condition) -> bool {
    if condition.is_empty() {
        return true;
    }

    let mut results = condition
        .operations
        .iter()
        .map(|op| operation_holds(task, op))
        .chain(condition.conditions.iter().map(|c| evaluate(task, c)));

    match condition.logical_operator.unwrap_or_default() {
        LogicalOperator::And => results.all(|r| r),
        LogicalOperator::Or => results.any(|r| r),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::TimeZone;
    use rstest::rstest;

    use super::*;
    use crate::domain::task::Status;

    fn task() -> Task {
        Task {
            id: "t-test-00Q0P8XD40001".to_string(),
            kind: "test".to_string(),
            group: "1000".to_string(),
            owner: Some("100".to_string()),
            status: Status::Virgin,
            param: BTreeMap::from([
                ("snils".to_string(), "1234567890".to_string()),
                ("type".to_string(), "A".to_string()),
            ]),
            timestamp: Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap(),
            error: None,
        }
    }

    #[test]
    fn empty_condition_is_true() {
        assert!(evaluate(&task(), &Condition::default()));
    }

    #[rstest]
    #[case("status", Operator::Equal, Value::Int(1), true)]
    #[case("status", Operator::Equal, Value::Int(3), false)]
    #[case("status", Operator::NotEqual, Value::Int(3), true)]
    #[case("status", Operator::Less, Value::Str("2".into()), true)]
    #[case("status", Operator::GreaterOrEqual, Value::Int(1), true)]
    #[case("status", Operator::Equal, Value::Float(1.0), false)]
    #[case("kind", Operator::Equal, Value::Str("test".into()), true)]
    #[case("kind", Operator::Greater, Value::Str("tesa".into()), true)]
    #[case("param.snils", Operator::Equal, Value::Str("1234567890".into()), true)]
    #[case("param.missing", Operator::Equal, Value::Str("".into()), true)]
    #[case("unknown", Operator::Equal, Value::Str("".into()), true)]
    #[case("timestamp", Operator::Greater, Value::Str("2025-01-01T00:00:00Z".into()), true)]
    #[case("ts", Operator::LessOrEqual, Value::Str("2025-03-01T12:00:00+00:00".into()), true)]
    fn single_operation(
        #[case] field: &str,
        #[case] operator: Operator,
        #[case] value: Value,
        #[case] expected: bool,
    ) {
        let cond = Condition::all(vec![Operation::new(field, operator, value)]);
        assert_eq!(evaluate(&task(), &cond), expected);
    }

    #[rstest]
    #[case(Operator::Equal)]
    #[case(Operator::NotEqual)]
    #[case(Operator::Less)]
    #[case(Operator::LessOrEqual)]
    #[case(Operator::Greater)]
    #[case(Operator::GreaterOrEqual)]
    fn string_field_against_number_never_matches(#[case] operator: Operator) {
        let cond = Condition::all(vec![Operation::new("kind", operator, 5i64)]);
        assert!(!evaluate(&task(), &cond));
    }

    #[test]
    fn nil_rules() {
        assert_eq!(compare(&FieldValue::Nil, None), Comparison::Equal);
        assert_eq!(compare(&FieldValue::Nil, Some(&Value::Int(1))), Comparison::Less);
        assert_eq!(
            compare(&FieldValue::Str("x".into()), None),
            Comparison::Incomparable
        );

        // owner is unset: nil != "x" holds because nil sorts first
        let mut t = task();
        t.owner = None;
        let cond = Condition::all(vec![Operation::new("owner", Operator::NotEqual, "x")]);
        assert!(evaluate(&t, &cond));
    }

    #[rstest]
    #[case(FieldValue::Float(1.5), Value::Float(2.0), Comparison::Less)]
    #[case(FieldValue::Float(1.5), Value::Str("1.5".into()), Comparison::Equal)]
    #[case(FieldValue::Float(f64::NAN), Value::Float(1.0), Comparison::Incomparable)]
    #[case(FieldValue::Bool(true), Value::Bool(false), Comparison::Greater)]
    #[case(FieldValue::Bool(false), Value::Str("true".into()), Comparison::Less)]
    #[case(FieldValue::Int(7), Value::Str("oops".into()), Comparison::Greater)]
    #[case(FieldValue::Bool(true), Value::Int(1), Comparison::Incomparable)]
    fn typed_comparisons(#[case] a: FieldValue, #[case] b: Value, #[case] expected: Comparison) {
        assert_eq!(compare(&a, Some(&b)), expected);
    }

    #[test]
    fn time_against_native_time() {
        let t = task();
        let earlier = Value::Time(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(
            compare(&FieldValue::Time(t.timestamp), Some(&earlier)),
            Comparison::Greater
        );
    }

    #[test]
    fn and_or_composition() {
        let hit = Operation::new("kind", Operator::Equal, "test");
        let miss = Operation::new("kind", Operator::Equal, "other");

        assert!(!evaluate(&task(), &Condition::all(vec![hit.clone(), miss.clone()])));
        assert!(evaluate(&task(), &Condition::any(vec![hit.clone(), miss.clone()])));
        assert!(!evaluate(&task(), &Condition::any(vec![miss.clone(), miss.clone()])));

        let nested = Condition {
            logical_operator: None,
            operations: vec![hit],
            conditions: vec![Condition::any(vec![
                miss,
                Operation::new("param.type", Operator::Equal, "A"),
            ])],
        };
        assert!(evaluate(&task(), &nested));
    }

    #[test]
    fn decodes_wire_format() {
        let json = r#"{
            "lop": "OR",
            "ops": [{"fld": "status", "op": "=", "val": 1}],
            "conds": [{"ops": [{"fld": "param.snils", "op": "!=", "val": "x"}]}]
        }"#;
        let cond: Condition = serde_json::from_str(json).unwrap();
        assert_eq!(cond.logical_operator, Some(LogicalOperator::Or));
        assert_eq!(cond.operations[0].value, Some(Value::Int(1)));
        assert_eq!(cond.conditions[0].logical_operator, None);
        assert!(evaluate(&task(), &cond));
    }
}
