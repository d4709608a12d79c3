//! Property-based test generators using proptest.
//!
//! Documents are kept small and use a narrow key alphabet so that generated
//! paths actually hit fields.

use proptest::prelude::*;
use serde_json::{Map, Number, Value};

/// Keys used in generated objects.
pub const KEYS: &[&str] = &["a", "b", "c"];

/// Strategy for object keys drawn from [`KEYS`].
pub fn key_strategy() -> impl Strategy<Value = String> {
    prop::sample::select(KEYS).prop_map(str::to_string)
}

/// Strategy for a path of one to three keys.
pub fn path_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(key_strategy(), 1..=3)
}

/// Strategy for non-null scalar leaves.
pub fn scalar_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<bool>().prop_map(Value::Bool),
        (-1000i64..1000).prop_map(Value::from),
        any::<u64>().prop_map(Value::from),
        // Eighths print and parse back exactly.
        (-8000i32..8000)
            .prop_filter_map("finite", |n| Number::from_f64(f64::from(n) / 8.0))
            .prop_map(Value::Number),
        "[a-z0-9 ]{0,12}".prop_map(Value::String),
    ]
}

/// Strategy for scalar leaves including null.
pub fn leaf_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        9 => scalar_strategy(),
        1 => Just(Value::Null),
    ]
}

/// Strategy for nested JSON documents.
pub fn value_strategy() -> impl Strategy<Value = Value> {
    leaf_strategy().prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map(key_strategy(), inner, 0..4)
                .prop_map(|m| Value::Object(m.into_iter().collect::<Map<_, _>>())),
        ]
    })
}

/// Strategy for documents whose root is an object.
pub fn document_strategy() -> impl Strategy<Value = Value> {
    prop::collection::btree_map(key_strategy(), value_strategy(), 0..4)
        .prop_map(|m| Value::Object(m.into_iter().collect::<Map<_, _>>()))
}

/// Operations applied to a collection in model tests.
#[derive(Debug, Clone)]
pub enum DocumentOperation {
    /// Insert a new document.
    Insert(Value),
    /// Update the n-th live document (modulo the live count).
    Update(usize, Value),
    /// Delete the n-th live document (modulo the live count).
    Delete(usize),
}

/// Strategy for collection operations.
pub fn operation_strategy() -> impl Strategy<Value = DocumentOperation> {
    prop_oneof![
        3 => document_strategy().prop_map(DocumentOperation::Insert),
        2 => (any::<usize>(), document_strategy())
            .prop_map(|(n, doc)| DocumentOperation::Update(n, doc)),
        1 => any::<usize>().prop_map(DocumentOperation::Delete),
    ]
}

/// Strategy for a sequence of operations.
pub fn operation_sequence_strategy(
    min_ops: usize,
    max_ops: usize,
) -> impl Strategy<Value = Vec<DocumentOperation>> {
    prop::collection::vec(operation_strategy(), min_ops..max_ops)
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}
