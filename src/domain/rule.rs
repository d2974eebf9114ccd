//! Dynamically configured business rules.
//!
//! Rules are stored with their condition and action as small JSON expressions.
//! Those expressions are decoded once into the closed [`Condition`] and
//! [`RuleAction`] types; evaluation never looks at raw JSON again.

use super::transaction::Transaction;
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RuleError {
    #[error("invalid expression JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("unknown field: {0}")]
    UnknownField(String),
    #[error("unknown operator '{operator}' for field '{field}'")]
    UnknownOperator { field: String, operator: String },
    #[error("invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
    #[error("invalid pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
    #[error("unknown action type: {0}")]
    UnknownActionType(String),
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RuleType {
    Fraud,
    Compliance,
    Business,
}

/// A stored rule as managed by the rule store.
///
/// `condition` and `action` hold the raw expressions. In rule files they may be
/// written either as JSON strings or as inline JSON objects.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Rule {
    pub id: String,
    pub name: String,
    pub r#type: RuleType,
    #[serde(default)]
    pub description: String,
    #[serde(deserialize_with = "expression")]
    pub condition: String,
    #[serde(deserialize_with = "expression")]
    pub action: String,
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "active_by_default")]
    pub is_active: bool,
    #[serde(default)]
    pub version: u32,
}

fn active_by_default() -> bool {
    true
}

fn expression<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        other => Ok(other.to_string()),
    }
}

impl Rule {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        r#type: RuleType,
        condition: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            r#type,
            description: String::new(),
            condition: condition.into(),
            action: action.into(),
            priority: 0,
            is_active: true,
            version: 0,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Gt,
    Ge,
    Lt,
    Le,
    Eq,
    Ne,
}

impl Comparison {
    fn parse(op: &str) -> Option<Self> {
        Some(match op {
            ">" => Self::Gt,
            ">=" => Self::Ge,
            "<" => Self::Lt,
            "<=" => Self::Le,
            "==" => Self::Eq,
            "!=" => Self::Ne,
            _ => return None,
        })
    }

    fn apply(&self, lhs: Decimal, rhs: Decimal) -> bool {
        match self {
            Self::Gt => lhs > rhs,
            Self::Ge => lhs >= rhs,
            Self::Lt => lhs < rhs,
            Self::Le => lhs <= rhs,
            Self::Eq => lhs == rhs,
            Self::Ne => lhs != rhs,
        }
    }
}

#[derive(Debug, Clone)]
pub enum TextMatch {
    Equals(String),
    NotEquals(String),
    /// `contains`: the value is a regular expression searched in the field.
    Matches(Regex),
    /// `in`: the field equals one of the listed values.
    OneOf(Vec<String>),
}

impl TextMatch {
    fn matches(&self, value: &str) -> bool {
        match self {
            TextMatch::Equals(expected) => value == expected,
            TextMatch::NotEquals(expected) => value != expected,
            TextMatch::Matches(re) => re.is_match(value),
            TextMatch::OneOf(options) => options.iter().any(|o| o == value),
        }
    }
}

/// A decoded rule condition.
#[derive(Debug, Clone)]
pub enum Condition {
    Amount(Comparison, Decimal),
    RiskScore(Comparison, Decimal),
    Currency(TextMatch),
    Type(TextMatch),
    /// Every key must be present in the transaction metadata with exactly this value.
    Metadata(BTreeMap<String, String>),
}

#[derive(Deserialize)]
struct RawCondition {
    field: String,
    operator: String,
    #[serde(default)]
    value: Value,
}

impl Condition {
    pub fn parse(expr: &str) -> Result<Self, RuleError> {
        let raw: RawCondition = serde_json::from_str(expr)?;
        Self::decode(raw)
    }

    fn decode(raw: RawCondition) -> Result<Self, RuleError> {
        let RawCondition {
            field,
            operator,
            value,
        } = raw;
        match field.as_str() {
            "amount" => {
                let (op, rhs) = numeric(&field, &operator, &value)?;
                Ok(Condition::Amount(op, rhs))
            }
            "risk_score" => {
                let (op, rhs) = numeric(&field, &operator, &value)?;
                Ok(Condition::RiskScore(op, rhs))
            }
            "currency" => Ok(Condition::Currency(text(&field, &operator, value)?)),
            "type" => Ok(Condition::Type(text(&field, &operator, value)?)),
            "metadata" => {
                let Value::Object(entries) = value else {
                    return Err(invalid(&field, "expected an object of key/value pairs"));
                };
                let expected = entries
                    .into_iter()
                    .map(|(k, v)| (k, stringify(v)))
                    .collect();
                Ok(Condition::Metadata(expected))
            }
            other => Err(RuleError::UnknownField(other.to_string())),
        }
    }

    pub fn is_met_by(&self, tx: &Transaction) -> bool {
        match self {
            Condition::Amount(op, rhs) => op.apply(tx.amount, *rhs),
            Condition::RiskScore(op, rhs) => {
                op.apply(Decimal::from(tx.risk_score.value()), *rhs)
            }
            Condition::Currency(m) => m.matches(&tx.currency),
            Condition::Type(m) => m.matches(tx.r#type.as_str()),
            Condition::Metadata(expected) => expected
                .iter()
                .all(|(k, v)| tx.metadata.get(k).is_some_and(|actual| actual == v)),
        }
    }
}

fn invalid(field: &str, reason: &str) -> RuleError {
    RuleError::InvalidValue {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

fn numeric(field: &str, operator: &str, value: &Value) -> Result<(Comparison, Decimal), RuleError> {
    let op = Comparison::parse(operator).ok_or_else(|| RuleError::UnknownOperator {
        field: field.to_string(),
        operator: operator.to_string(),
    })?;
    let Value::Number(n) = value else {
        return Err(invalid(field, "expected a number"));
    };
    let rhs = if let Some(i) = n.as_i64() {
        Decimal::from(i)
    } else if let Some(u) = n.as_u64() {
        Decimal::from(u)
    } else {
        n.as_f64()
            .and_then(|f| Decimal::try_from(f).ok())
            .ok_or_else(|| invalid(field, "number out of range"))?
    };
    Ok((op, rhs))
}

fn text(field: &str, operator: &str, value: Value) -> Result<TextMatch, RuleError> {
    let as_string = |value: Value| match value {
        Value::String(s) => Ok(s),
        _ => Err(invalid(field, "expected a string")),
    };
    match operator {
        "==" => Ok(TextMatch::Equals(as_string(value)?)),
        "!=" => Ok(TextMatch::NotEquals(as_string(value)?)),
        "contains" => Ok(TextMatch::Matches(Regex::new(&as_string(value)?)?)),
        "in" => {
            let Value::Array(items) = value else {
                return Err(invalid(field, "expected a list of strings"));
            };
            let options = items
                .into_iter()
                .map(as_string)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(TextMatch::OneOf(options))
        }
        _ => Err(RuleError::UnknownOperator {
            field: field.to_string(),
            operator: operator.to_string(),
        }),
    }
}

fn stringify(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

/// What a triggered rule asks for. Applied only through an explicit
/// `RuleEngine::execute_action` call.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionKind {
    FlagTransaction { reason: String },
    BlockTransaction { reason: String },
    RequireApproval,
    Notify { channel: String, message: String },
    AdjustRiskScore { adjustment: i64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct RuleAction {
    pub kind: ActionKind,
    pub message: String,
}

#[derive(Deserialize)]
struct RawAction {
    r#type: String,
    #[serde(default)]
    params: Map<String, Value>,
    #[serde(default)]
    message: String,
}

impl RuleAction {
    pub fn parse(expr: &str) -> Result<Self, RuleError> {
        let raw: RawAction = serde_json::from_str(expr)?;
        let param = |key: &str| -> String {
            raw.params
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        let kind = match raw.r#type.as_str() {
            "flag_transaction" => ActionKind::FlagTransaction {
                reason: param("reason"),
            },
            "block_transaction" => ActionKind::BlockTransaction {
                reason: param("reason"),
            },
            "require_approval" => ActionKind::RequireApproval,
            "notify" => ActionKind::Notify {
                channel: param("channel"),
                message: param("message"),
            },
            "adjust_risk_score" => ActionKind::AdjustRiskScore {
                adjustment: raw
                    .params
                    .get("adjustment")
                    .and_then(Value::as_f64)
                    .map(|f| f.trunc() as i64)
                    .unwrap_or_default(),
            },
            other => return Err(RuleError::UnknownActionType(other.to_string())),
        };
        Ok(Self {
            kind,
            message: raw.message,
        })
    }

    pub fn type_name(&self) -> &'static str {
        match self.kind {
            ActionKind::FlagTransaction { .. } => "flag_transaction",
            ActionKind::BlockTransaction { .. } => "block_transaction",
            ActionKind::RequireApproval => "require_approval",
            ActionKind::Notify { .. } => "notify",
            ActionKind::AdjustRiskScore { .. } => "adjust_risk_score",
        }
    }
}
