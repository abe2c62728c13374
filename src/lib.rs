//! Compiles declarative permission rules into sea-query filter expressions.
//!
//! Two pieces work together:
//!
//! - [`FilterCompiler`] walks a backend-agnostic [`ConditionNode`] tree and
//!   emits a [`sea_query::Condition`] through a per-operator registry.
//! - [`rules_to_filter`] flattens the [`PermissionRule`]s granted for an
//!   action/subject pair into one such tree (AND within a rule, OR across
//!   rules) and compiles it.
//!
//! ```
//! use policy_filter::{rules_to_filter, PermissionRule, RuleSet, TableSchema};
//!
//! let rules = RuleSet::new()
//!     .with_rule(PermissionRule::new("read", "Article").with_condition("author_id", 42));
//! let schema = TableSchema::new("articles").with_field("author_id");
//!
//! let filter = rules_to_filter(&rules, "read", "Article", &schema).unwrap();
//! assert!(filter.is_some());
//! ```

pub mod compiler;
pub mod condition;
pub mod error;
pub mod rules;
pub mod schema;

pub use compiler::{
    CompoundInterpreter, FieldInterpreter, FilterCompiler, Interpreter, OperatorRegistry,
};
pub use condition::{CompoundCondition, ConditionNode, FieldCondition, Scalar, Value};
pub use error::FilterError;
pub use rules::{
    compile_rules, rules_to_condition, rules_to_filter, PermissionRule, RuleSet, RuleSource,
    RuleValue,
};
pub use schema::{ColumnName, SchemaLoadError, TableSchema};
