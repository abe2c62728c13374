//! The backend-agnostic condition tree.
//!
//! A [`ConditionNode`] is either a leaf test on a single column (a
//! [`FieldCondition`]) or a logical combinator over child nodes (a
//! [`CompoundCondition`]). Trees are owned and acyclic by construction;
//! child order is preserved so compilation output is deterministic.

use serde::{Deserialize, Serialize};

/// A scalar payload carried by a field condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Scalar::Bool(value)
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Scalar::Int(value)
    }
}

impl From<i32> for Scalar {
    fn from(value: i32) -> Self {
        Scalar::Int(i64::from(value))
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Scalar::Float(value)
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Str(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Scalar::Str(value)
    }
}

impl From<&Scalar> for sea_query::Value {
    fn from(scalar: &Scalar) -> Self {
        match scalar {
            Scalar::Bool(b) => (*b).into(),
            Scalar::Int(i) => (*i).into(),
            Scalar::Float(f) => (*f).into(),
            Scalar::Str(s) => s.clone().into(),
        }
    }
}

/// The value side of a field condition.
///
/// `Pattern` carries the source text of a regex-like pattern; the compiler
/// never compiles it, it only feeds it to a case-insensitive `LIKE`. In JSON
/// a pattern is spelled `{"$regex": "..."}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Scalar(Scalar),
    Pattern {
        #[serde(rename = "$regex")]
        source: String,
    },
    List(Vec<Scalar>),
}

impl Value {
    /// A pattern value from its regex source text.
    pub fn pattern(source: impl Into<String>) -> Self {
        Value::Pattern {
            source: source.into(),
        }
    }
}

impl From<Scalar> for Value {
    fn from(scalar: Scalar) -> Self {
        Value::Scalar(scalar)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Scalar(value.into())
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Scalar(value.into())
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Scalar(value.into())
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Scalar(value.into())
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Scalar(value.into())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Scalar(value.into())
    }
}

impl From<Vec<Scalar>> for Value {
    fn from(items: Vec<Scalar>) -> Self {
        Value::List(items)
    }
}

/// A leaf test on one column: `operator(field, value)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldCondition {
    pub operator: String,
    pub field: String,
    pub value: Value,
}

/// A logical combinator (`and`, `or`, `not`, ...) over child nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompoundCondition {
    pub operator: String,
    pub children: Vec<ConditionNode>,
}

/// One node of a condition tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConditionNode {
    Compound(CompoundCondition),
    Field(FieldCondition),
}

impl ConditionNode {
    /// A leaf condition.
    pub fn field(
        operator: impl Into<String>,
        field: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        ConditionNode::Field(FieldCondition {
            operator: operator.into(),
            field: field.into(),
            value: value.into(),
        })
    }

    /// A conjunction over `children`. A single child is returned unwrapped;
    /// an empty conjunction stays a compound node and defers to the query
    /// builder's zero-arity convention.
    pub fn and(children: Vec<ConditionNode>) -> Self {
        Self::compound("and", children)
    }

    /// A disjunction over `children`, with the same single-child collapse
    /// as [`ConditionNode::and`].
    pub fn or(children: Vec<ConditionNode>) -> Self {
        Self::compound("or", children)
    }

    /// The negation of `child`.
    pub fn not(child: ConditionNode) -> Self {
        ConditionNode::Compound(CompoundCondition {
            operator: "not".to_string(),
            children: vec![child],
        })
    }

    fn compound(operator: &str, mut children: Vec<ConditionNode>) -> Self {
        if children.len() == 1 {
            return children.pop().unwrap();
        }
        ConditionNode::Compound(CompoundCondition {
            operator: operator.to_string(),
            children,
        })
    }

    /// The operator tag used for registry dispatch.
    pub fn operator(&self) -> &str {
        match self {
            ConditionNode::Field(condition) => &condition.operator,
            ConditionNode::Compound(condition) => &condition.operator,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_child_compound_collapses() {
        let leaf = ConditionNode::field("eq", "id", 1);
        assert_eq!(ConditionNode::and(vec![leaf.clone()]), leaf);
        assert_eq!(ConditionNode::or(vec![leaf.clone()]), leaf);
    }

    #[test]
    fn empty_compound_stays_compound() {
        let node = ConditionNode::and(vec![]);
        assert_eq!(
            node,
            ConditionNode::Compound(CompoundCondition {
                operator: "and".to_string(),
                children: vec![],
            })
        );
    }

    #[test]
    fn deserialize_field_condition() {
        let node: ConditionNode =
            serde_json::from_str(r#"{"operator": "eq", "field": "id", "value": 1}"#).unwrap();
        assert_eq!(node, ConditionNode::field("eq", "id", 1));
    }

    #[test]
    fn deserialize_pattern_value() {
        let node: ConditionNode = serde_json::from_str(
            r#"{"operator": "eq", "field": "email", "value": {"$regex": "@example\\.com$"}}"#,
        )
        .unwrap();
        assert_eq!(
            node,
            ConditionNode::field("eq", "email", Value::pattern("@example\\.com$"))
        );
    }

    #[test]
    fn deserialize_compound_condition() {
        let node: ConditionNode = serde_json::from_str(
            r#"{
                "operator": "or",
                "children": [
                    {"operator": "eq", "field": "status", "value": "open"},
                    {"operator": "in", "field": "priority", "value": [1, 2]}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(
            node,
            ConditionNode::or(vec![
                ConditionNode::field("eq", "status", "open"),
                ConditionNode::field(
                    "in",
                    "priority",
                    vec![Scalar::Int(1), Scalar::Int(2)]
                ),
            ])
        );
    }

    #[test]
    fn serialize_round_trip() {
        let node = ConditionNode::and(vec![
            ConditionNode::field("gte", "age", 18),
            ConditionNode::field("ne", "banned", true),
        ]);
        let json = serde_json::to_string(&node).unwrap();
        let back: ConditionNode = serde_json::from_str(&json).unwrap();
        assert_eq!(back, node);
    }
}
