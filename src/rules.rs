//! Flattens granted permission rules into a single condition tree.
//!
//! Each rule's field conditions are conjoined; alternative rules for the
//! same action/subject are disjoined (any one grant suffices). Inverted
//! rules are negated and conjoined with the grants.

use crate::compiler::FilterCompiler;
use crate::condition::{ConditionNode, Scalar, Value};
use crate::error::FilterError;
use crate::schema::TableSchema;
use sea_query::Condition;
use serde::de::{self, MapAccess, SeqAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// The value side of one rule condition entry.
///
/// In JSON a bare scalar or list is an equality/membership shorthand, while
/// a single-key `$`-object names the operator: `{"age": {"$gt": 18}}`.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleValue {
    /// Plain value; expands to an `eq` condition.
    Value(Value),
    /// Operator object; expands to a condition with that operator.
    Op { operator: String, value: Value },
}

impl Serialize for RuleValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            RuleValue::Value(value) => value.serialize(serializer),
            RuleValue::Op { operator, value } => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry(&format!("${operator}"), value)?;
                map.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for RuleValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RuleValueVisitor;

        impl<'de> Visitor<'de> for RuleValueVisitor {
            type Value = RuleValue;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a scalar, a list of scalars, or a single `$operator` object")
            }

            fn visit_bool<E: de::Error>(self, v: bool) -> Result<RuleValue, E> {
                Ok(RuleValue::Value(v.into()))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<RuleValue, E> {
                Ok(RuleValue::Value(v.into()))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<RuleValue, E> {
                let v = i64::try_from(v)
                    .map_err(|_| E::custom(format!("integer {v} out of range")))?;
                Ok(RuleValue::Value(v.into()))
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<RuleValue, E> {
                Ok(RuleValue::Value(v.into()))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<RuleValue, E> {
                Ok(RuleValue::Value(v.into()))
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<RuleValue, A::Error> {
                let mut items = Vec::new();
                while let Some(item) = seq.next_element::<Scalar>()? {
                    items.push(item);
                }
                Ok(RuleValue::Value(Value::List(items)))
            }

            fn visit_map<M: MapAccess<'de>>(self, mut map: M) -> Result<RuleValue, M::Error> {
                let Some(key) = map.next_key::<String>()? else {
                    return Err(de::Error::custom("operator object must not be empty"));
                };
                let Some(operator) = key.strip_prefix('$') else {
                    return Err(de::Error::custom(format!(
                        "operator key `{key}` must start with `$`"
                    )));
                };
                let rule_value = if operator == "regex" {
                    let source = map.next_value::<String>()?;
                    RuleValue::Value(Value::Pattern { source })
                } else {
                    RuleValue::Op {
                        operator: operator.to_string(),
                        value: map.next_value()?,
                    }
                };
                if map.next_key::<String>()?.is_some() {
                    return Err(de::Error::custom(
                        "operator object must have exactly one key",
                    ));
                }
                Ok(rule_value)
            }
        }

        deserializer.deserialize_any(RuleValueVisitor)
    }
}

/// Serde adapter: rule conditions are a JSON object, but kept as an ordered
/// sequence of pairs so flattening output is deterministic.
mod condition_map {
    use super::*;

    pub fn serialize<S: Serializer>(
        conditions: &[(String, RuleValue)],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(conditions.len()))?;
        for (field, value) in conditions {
            map.serialize_entry(field, value)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<(String, RuleValue)>, D::Error> {
        struct ConditionMapVisitor;

        impl<'de> Visitor<'de> for ConditionMapVisitor {
            type Value = Vec<(String, RuleValue)>;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a map of field names to rule values")
            }

            fn visit_map<M: MapAccess<'de>>(self, mut map: M) -> Result<Self::Value, M::Error> {
                let mut conditions = Vec::new();
                while let Some(entry) = map.next_entry()? {
                    conditions.push(entry);
                }
                Ok(conditions)
            }
        }

        deserializer.deserialize_map(ConditionMapVisitor)
    }
}

/// One granted (or revoked, if `inverted`) capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermissionRule {
    pub action: String,
    pub subject: String,
    /// Field conditions in declaration order; all must hold for the rule to
    /// apply. Empty means the rule is unconditional.
    #[serde(default, with = "condition_map")]
    pub conditions: Vec<(String, RuleValue)>,
    /// An inverted rule revokes instead of granting.
    #[serde(default)]
    pub inverted: bool,
}

impl PermissionRule {
    pub fn new(action: impl Into<String>, subject: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            subject: subject.into(),
            conditions: Vec::new(),
            inverted: false,
        }
    }

    /// Add an equality condition.
    pub fn with_condition(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions
            .push((field.into(), RuleValue::Value(value.into())));
        self
    }

    /// Add a condition with an explicit operator, e.g. `("age", "gt", 18)`.
    pub fn with_operator(
        mut self,
        field: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        self.conditions.push((
            field.into(),
            RuleValue::Op {
                operator: operator.into(),
                value: value.into(),
            },
        ));
        self
    }

    pub fn inverted(mut self) -> Self {
        self.inverted = true;
        self
    }
}

/// The authorization-rule engine boundary: yields the ordered list of rules
/// granted for an action/subject pair. Implementations surface their own
/// failures as [`FilterError::RuleRetrieval`].
pub trait RuleSource {
    fn rules_for(&self, action: &str, subject: &str)
        -> Result<Vec<PermissionRule>, FilterError>;
}

/// In-memory rule engine. `manage` matches every action and `all` every
/// subject, so broad grants need no enumeration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleSet {
    rules: Vec<PermissionRule>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rule(mut self, rule: PermissionRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn rules(&self) -> &[PermissionRule] {
        &self.rules
    }

    /// Load a rule set from a JSON array of rules.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let rules: Vec<PermissionRule> = serde_json::from_str(json)?;
        Ok(Self { rules })
    }
}

impl RuleSource for RuleSet {
    fn rules_for(
        &self,
        action: &str,
        subject: &str,
    ) -> Result<Vec<PermissionRule>, FilterError> {
        Ok(self
            .rules
            .iter()
            .filter(|rule| {
                (rule.action == action || rule.action == "manage")
                    && (rule.subject == subject || rule.subject == "all")
            })
            .cloned()
            .collect())
    }
}

/// Merge a rule list into one condition tree.
///
/// Grants combine under `or`, each as the `and` of its field conditions;
/// inverted rules become `not(...)` conjoined with the grants. `None` means
/// the rules impose no restriction. That holds both when the list is empty
/// and when an unconditional grant is present — callers that must fail
/// closed on "no rules at all" have to check the list before flattening,
/// because this function cannot tell the two apart once it returns.
pub fn rules_to_condition(rules: &[PermissionRule]) -> Option<ConditionNode> {
    let mut grants = Vec::new();
    let mut denials = Vec::new();
    let mut unconditional_grant = false;

    for rule in rules {
        if rule.inverted {
            denials.push(ConditionNode::not(rule_to_node(rule)));
        } else if rule.conditions.is_empty() {
            // A grant with no conditions restricts nothing.
            unconditional_grant = true;
        } else {
            grants.push(rule_to_node(rule));
        }
    }

    let mut parts = denials;
    if !unconditional_grant && !grants.is_empty() {
        parts.push(ConditionNode::or(grants));
    }
    if parts.is_empty() {
        return None;
    }
    Some(ConditionNode::and(parts))
}

fn rule_to_node(rule: &PermissionRule) -> ConditionNode {
    let children = rule
        .conditions
        .iter()
        .map(|(field, value)| match value {
            RuleValue::Value(value) => ConditionNode::field("eq", field, value.clone()),
            RuleValue::Op { operator, value } => {
                ConditionNode::field(operator.clone(), field, value.clone())
            }
        })
        .collect();
    ConditionNode::and(children)
}

/// Flatten the rules granted for `(action, subject)` and compile them with
/// `compiler`. `Ok(None)` is "unrestricted": the rules impose no row filter.
/// Whether that means allow-all or deny-all is the caller's policy; this
/// crate produces no constraint either way.
pub fn compile_rules<S: RuleSource + ?Sized>(
    compiler: &FilterCompiler,
    source: &S,
    action: &str,
    subject: &str,
    schema: &TableSchema,
) -> Result<Option<Condition>, FilterError> {
    let rules = source.rules_for(action, subject)?;
    match rules_to_condition(&rules) {
        None => Ok(None),
        Some(node) => compiler.compile(&node, schema).map(Some),
    }
}

/// [`compile_rules`] with the built-in operator registry.
pub fn rules_to_filter<S: RuleSource + ?Sized>(
    source: &S,
    action: &str,
    subject: &str,
    schema: &TableSchema,
) -> Result<Option<Condition>, FilterError> {
    compile_rules(&FilterCompiler::new(), source, action, subject, schema)
}
