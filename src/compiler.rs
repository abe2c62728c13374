//! Compiles condition trees into sea-query filter expressions.
//!
//! Dispatch is a lookup of the node's operator name in an
//! [`OperatorRegistry`]; the registered interpreter turns the node into a
//! [`sea_query::Condition`]. The registry is built once and read-only
//! afterwards, so a [`FilterCompiler`] can be shared across threads.

use crate::condition::{CompoundCondition, ConditionNode, FieldCondition, Value};
use crate::error::FilterError;
use crate::schema::TableSchema;
use sea_query::extension::postgres::PgExpr;
use sea_query::{Condition, Expr, IntoCondition, LikeExpr, SimpleExpr};
use std::collections::HashMap;

/// Interprets a leaf condition against its resolved column.
pub type FieldInterpreter = fn(&FieldCondition, Expr) -> Result<SimpleExpr, FilterError>;

/// Interprets a compound condition; the callback evaluates one child.
pub type CompoundInterpreter = fn(
    &CompoundCondition,
    &mut dyn FnMut(&ConditionNode) -> Result<Condition, FilterError>,
) -> Result<Condition, FilterError>;

#[derive(Debug, Clone, Copy)]
pub enum Interpreter {
    Field(FieldInterpreter),
    Compound(CompoundInterpreter),
}

/// Operator name to interpreter. Fixed after construction; extend it with
/// the `with_*` builders before handing it to a [`FilterCompiler`].
#[derive(Debug, Clone)]
pub struct OperatorRegistry {
    interpreters: HashMap<String, Interpreter>,
}

impl OperatorRegistry {
    /// Registry with the built-in operators: `eq`, `ne`, `gt`, `gte`, `lt`,
    /// `lte`, `in`, `nin`, `and`, `or`, `not`.
    pub fn new() -> Self {
        let mut registry = Self {
            interpreters: HashMap::new(),
        };
        registry.insert("eq", Interpreter::Field(eq));
        registry.insert("ne", Interpreter::Field(ne));
        registry.insert("gt", Interpreter::Field(gt));
        registry.insert("gte", Interpreter::Field(gte));
        registry.insert("lt", Interpreter::Field(lt));
        registry.insert("lte", Interpreter::Field(lte));
        registry.insert("in", Interpreter::Field(is_in));
        registry.insert("nin", Interpreter::Field(is_not_in));
        registry.insert("and", Interpreter::Compound(and));
        registry.insert("or", Interpreter::Compound(or));
        registry.insert("not", Interpreter::Compound(not));
        registry
    }

    pub fn with_field_operator(mut self, name: impl Into<String>, interpreter: FieldInterpreter) -> Self {
        self.interpreters
            .insert(name.into(), Interpreter::Field(interpreter));
        self
    }

    pub fn with_compound_operator(
        mut self,
        name: impl Into<String>,
        interpreter: CompoundInterpreter,
    ) -> Self {
        self.interpreters
            .insert(name.into(), Interpreter::Compound(interpreter));
        self
    }

    pub fn get(&self, operator: &str) -> Option<Interpreter> {
        self.interpreters.get(operator).copied()
    }

    fn insert(&mut self, name: &str, interpreter: Interpreter) {
        self.interpreters.insert(name.to_string(), interpreter);
    }
}

impl Default for OperatorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Compiles a [`ConditionNode`] tree into a [`sea_query::Condition`].
#[derive(Debug, Clone, Default)]
pub struct FilterCompiler {
    registry: OperatorRegistry,
}

impl FilterCompiler {
    pub fn new() -> Self {
        Self {
            registry: OperatorRegistry::new(),
        }
    }

    pub fn with_registry(registry: OperatorRegistry) -> Self {
        Self { registry }
    }

    /// Compile one condition tree. Recursion depth equals tree depth; cost
    /// is linear in node count.
    pub fn compile(
        &self,
        node: &ConditionNode,
        schema: &TableSchema,
    ) -> Result<Condition, FilterError> {
        let operator = node.operator();
        let interpreter = self
            .registry
            .get(operator)
            .ok_or_else(|| FilterError::UnsupportedOperator(operator.to_string()))?;

        match (interpreter, node) {
            (Interpreter::Field(interpret), ConditionNode::Field(condition)) => {
                let column = schema.resolve(&condition.field)?;
                let expr = interpret(condition, Expr::col(column))?;
                Ok(expr.into_condition())
            }
            (Interpreter::Compound(interpret), ConditionNode::Compound(condition)) => {
                interpret(condition, &mut |child| self.compile(child, schema))
            }
            // Operator registered for the other node shape.
            _ => Err(FilterError::UnsupportedOperator(operator.to_string())),
        }
    }
}

/// The condition's value as a single sea-query value. A pattern degrades to
/// its source text; a list has no single-value reading.
fn single_value(condition: &FieldCondition) -> Result<sea_query::Value, FilterError> {
    match &condition.value {
        Value::Scalar(scalar) => Ok(scalar.into()),
        Value::Pattern { source } => Ok(source.clone().into()),
        Value::List(_) => Err(FilterError::InvalidValue {
            operator: condition.operator.clone(),
            value_kind: "list",
        }),
    }
}

/// The condition's value as a list of sea-query values; a scalar is a
/// one-element list.
fn list_values(condition: &FieldCondition) -> Vec<sea_query::Value> {
    match &condition.value {
        Value::List(items) => items.iter().map(Into::into).collect(),
        Value::Scalar(scalar) => vec![scalar.into()],
        Value::Pattern { source } => vec![source.clone().into()],
    }
}

fn eq(condition: &FieldCondition, column: Expr) -> Result<SimpleExpr, FilterError> {
    // A pattern value turns equality into a case-insensitive match on the
    // pattern's source text.
    if let Value::Pattern { source } = &condition.value {
        return Ok(column.ilike(LikeExpr::new(source.clone())));
    }
    Ok(column.eq(single_value(condition)?))
}

fn ne(condition: &FieldCondition, column: Expr) -> Result<SimpleExpr, FilterError> {
    Ok(column.ne(single_value(condition)?))
}

fn gt(condition: &FieldCondition, column: Expr) -> Result<SimpleExpr, FilterError> {
    Ok(column.gt(single_value(condition)?))
}

fn gte(condition: &FieldCondition, column: Expr) -> Result<SimpleExpr, FilterError> {
    Ok(column.gte(single_value(condition)?))
}

fn lt(condition: &FieldCondition, column: Expr) -> Result<SimpleExpr, FilterError> {
    Ok(column.lt(single_value(condition)?))
}

fn lte(condition: &FieldCondition, column: Expr) -> Result<SimpleExpr, FilterError> {
    Ok(column.lte(single_value(condition)?))
}

fn is_in(condition: &FieldCondition, column: Expr) -> Result<SimpleExpr, FilterError> {
    Ok(column.is_in(list_values(condition)))
}

fn is_not_in(condition: &FieldCondition, column: Expr) -> Result<SimpleExpr, FilterError> {
    Ok(column.is_not_in(list_values(condition)))
}

fn and(
    condition: &CompoundCondition,
    evaluate: &mut dyn FnMut(&ConditionNode) -> Result<Condition, FilterError>,
) -> Result<Condition, FilterError> {
    let mut all = Condition::all();
    for child in &condition.children {
        all = all.add(evaluate(child)?);
    }
    Ok(all)
}

fn or(
    condition: &CompoundCondition,
    evaluate: &mut dyn FnMut(&ConditionNode) -> Result<Condition, FilterError>,
) -> Result<Condition, FilterError> {
    let mut any = Condition::any();
    for child in &condition.children {
        any = any.add(evaluate(child)?);
    }
    Ok(any)
}

fn not(
    condition: &CompoundCondition,
    evaluate: &mut dyn FnMut(&ConditionNode) -> Result<Condition, FilterError>,
) -> Result<Condition, FilterError> {
    let mut all = Condition::all();
    for child in &condition.children {
        all = all.add(evaluate(child)?);
    }
    Ok(all.not())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::Scalar;
    use crate::schema::ColumnName;

    fn users_schema() -> TableSchema {
        TableSchema::new("users")
            .with_field("id")
            .with_field("age")
            .with_field("name")
            .with_field("status")
    }

    fn col(name: &str) -> Expr {
        Expr::col(ColumnName(name.to_string()))
    }

    #[test]
    fn field_operators_match_direct_invocation() {
        let compiler = FilterCompiler::new();
        let schema = users_schema();

        let cases: Vec<(ConditionNode, SimpleExpr)> = vec![
            (ConditionNode::field("eq", "id", 1), col("id").eq(1i64)),
            (ConditionNode::field("ne", "id", 1), col("id").ne(1i64)),
            (ConditionNode::field("gt", "age", 18), col("age").gt(18i64)),
            (ConditionNode::field("gte", "age", 18), col("age").gte(18i64)),
            (ConditionNode::field("lt", "age", 18), col("age").lt(18i64)),
            (ConditionNode::field("lte", "age", 18), col("age").lte(18i64)),
        ];

        for (node, expected) in cases {
            let compiled = compiler.compile(&node, &schema).unwrap();
            assert_eq!(compiled, expected.into_condition());
        }
    }

    #[test]
    fn membership_operators() {
        let compiler = FilterCompiler::new();
        let schema = users_schema();
        let values = vec![Scalar::Int(1), Scalar::Int(2)];

        let compiled = compiler
            .compile(&ConditionNode::field("in", "id", values.clone()), &schema)
            .unwrap();
        assert_eq!(
            compiled,
            col("id")
                .is_in(vec![sea_query::Value::from(1i64), 2i64.into()])
                .into_condition()
        );

        let compiled = compiler
            .compile(&ConditionNode::field("nin", "id", values), &schema)
            .unwrap();
        assert_eq!(
            compiled,
            col("id")
                .is_not_in(vec![sea_query::Value::from(1i64), 2i64.into()])
                .into_condition()
        );
    }

    #[test]
    fn membership_accepts_single_scalar() {
        let compiler = FilterCompiler::new();
        let schema = users_schema();

        let compiled = compiler
            .compile(&ConditionNode::field("in", "id", 1), &schema)
            .unwrap();
        assert_eq!(
            compiled,
            col("id").is_in(vec![sea_query::Value::from(1i64)]).into_condition()
        );
    }

    #[test]
    fn eq_with_pattern_becomes_ilike() {
        let compiler = FilterCompiler::new();
        let schema = users_schema();

        let compiled = compiler
            .compile(
                &ConditionNode::field("eq", "name", Value::pattern("^ad")),
                &schema,
            )
            .unwrap();
        assert_eq!(
            compiled,
            col("name").ilike(LikeExpr::new("^ad")).into_condition()
        );
    }

    #[test]
    fn list_under_scalar_operator_is_invalid() {
        let compiler = FilterCompiler::new();
        let schema = users_schema();
        let node = ConditionNode::field("gt", "age", vec![Scalar::Int(1)]);

        assert_eq!(
            compiler.compile(&node, &schema),
            Err(FilterError::InvalidValue {
                operator: "gt".to_string(),
                value_kind: "list",
            })
        );
    }

    #[test]
    fn unsupported_operator_fails() {
        let compiler = FilterCompiler::new();
        let schema = users_schema();
        let node = ConditionNode::field("between", "age", 18);

        let err = compiler.compile(&node, &schema).unwrap_err();
        assert_eq!(err.to_string(), "Unsupported operator: between");
    }

    #[test]
    fn unknown_field_propagates() {
        let compiler = FilterCompiler::new();
        let schema = users_schema();
        let node = ConditionNode::field("eq", "nickname", "x");

        assert_eq!(
            compiler.compile(&node, &schema),
            Err(FilterError::UnknownField("nickname".to_string()))
        );
    }

    #[test]
    fn compound_matches_builder_combinators() {
        let compiler = FilterCompiler::new();
        let schema = users_schema();
        let left = ConditionNode::field("eq", "status", "open");
        let right = ConditionNode::field("gt", "age", 18);

        let and_node = ConditionNode::Compound(CompoundCondition {
            operator: "and".to_string(),
            children: vec![left.clone(), right.clone()],
        });
        let or_node = ConditionNode::Compound(CompoundCondition {
            operator: "or".to_string(),
            children: vec![left.clone(), right.clone()],
        });

        let left_compiled = compiler.compile(&left, &schema).unwrap();
        let right_compiled = compiler.compile(&right, &schema).unwrap();

        assert_eq!(
            compiler.compile(&and_node, &schema).unwrap(),
            Condition::all()
                .add(left_compiled.clone())
                .add(right_compiled.clone())
        );
        assert_eq!(
            compiler.compile(&or_node, &schema).unwrap(),
            Condition::any().add(left_compiled).add(right_compiled)
        );
    }

    #[test]
    fn nested_compounds_recurse() {
        let compiler = FilterCompiler::new();
        let schema = users_schema();

        let inner = ConditionNode::Compound(CompoundCondition {
            operator: "or".to_string(),
            children: vec![
                ConditionNode::field("lt", "age", 18),
                ConditionNode::field("gt", "age", 65),
            ],
        });
        let outer = ConditionNode::Compound(CompoundCondition {
            operator: "and".to_string(),
            children: vec![ConditionNode::field("eq", "status", "open"), inner.clone()],
        });

        let expected = Condition::all()
            .add(
                compiler
                    .compile(&ConditionNode::field("eq", "status", "open"), &schema)
                    .unwrap(),
            )
            .add(compiler.compile(&inner, &schema).unwrap());

        assert_eq!(compiler.compile(&outer, &schema).unwrap(), expected);
    }

    #[test]
    fn not_negates_children() {
        let compiler = FilterCompiler::new();
        let schema = users_schema();
        let leaf = ConditionNode::field("eq", "status", "archived");
        let node = ConditionNode::not(leaf.clone());

        let expected = Condition::all()
            .add(compiler.compile(&leaf, &schema).unwrap())
            .not();
        assert_eq!(compiler.compile(&node, &schema).unwrap(), expected);
    }

    #[test]
    fn empty_compounds_defer_to_builder() {
        let compiler = FilterCompiler::new();
        let schema = users_schema();

        let empty_and = ConditionNode::Compound(CompoundCondition {
            operator: "and".to_string(),
            children: vec![],
        });
        let empty_or = ConditionNode::Compound(CompoundCondition {
            operator: "or".to_string(),
            children: vec![],
        });

        assert_eq!(
            compiler.compile(&empty_and, &schema).unwrap(),
            Condition::all()
        );
        assert_eq!(
            compiler.compile(&empty_or, &schema).unwrap(),
            Condition::any()
        );
    }

    #[test]
    fn compilation_is_idempotent() {
        let compiler = FilterCompiler::new();
        let schema = users_schema();
        let node = ConditionNode::and(vec![
            ConditionNode::field("eq", "status", "open"),
            ConditionNode::field("in", "id", vec![Scalar::Int(1), Scalar::Int(2)]),
        ]);

        let first = compiler.compile(&node, &schema).unwrap();
        let second = compiler.compile(&node, &schema).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn custom_operator_via_registry_builder() {
        fn starts_with(condition: &FieldCondition, column: Expr) -> Result<SimpleExpr, FilterError> {
            let Value::Scalar(Scalar::Str(prefix)) = &condition.value else {
                return Err(FilterError::InvalidValue {
                    operator: condition.operator.clone(),
                    value_kind: "non-string",
                });
            };
            Ok(column.like(LikeExpr::new(format!("{prefix}%"))))
        }

        let registry = OperatorRegistry::new().with_field_operator("startsWith", starts_with);
        let compiler = FilterCompiler::with_registry(registry);
        let schema = users_schema();

        let compiled = compiler
            .compile(&ConditionNode::field("startsWith", "name", "ad"), &schema)
            .unwrap();
        assert_eq!(
            compiled,
            col("name").like(LikeExpr::new("ad%")).into_condition()
        );
    }

    #[test]
    fn compound_operator_on_field_node_is_unsupported() {
        let compiler = FilterCompiler::new();
        let schema = users_schema();
        // `and` is registered, but only for compound nodes.
        let node = ConditionNode::field("and", "id", 1);

        assert_eq!(
            compiler.compile(&node, &schema),
            Err(FilterError::UnsupportedOperator("and".to_string()))
        );
    }
}
