//! Model-based property tests: a collection with indexes behaves like a map
//! from id to document, and its indexes agree with the documents.

use hashdoc_core::{get_in, Collection, Value};
use hashdoc_testkit::prelude::*;
use proptest::prelude::*;
use std::collections::BTreeMap;

const INDEXED: &[&[&str]] = &[&["a"], &["a", "b"], &["c"]];

/// Applies `ops` to both the collection and the model. Returns the final
/// contents of every id that stopped being live.
fn apply(
    col: &Collection,
    model: &mut BTreeMap<u64, Value>,
    ops: Vec<DocumentOperation>,
) -> Vec<(u64, Value)> {
    let mut dead = Vec::new();
    for op in ops {
        match op {
            DocumentOperation::Insert(doc) => {
                let id = col.insert(&doc).unwrap();
                assert!(model.insert(id, doc).is_none(), "id {id} reused");
            }
            DocumentOperation::Update(n, doc) if !model.is_empty() => {
                let id = *model.keys().nth(n % model.len()).unwrap();
                let new_id = col.update(id, &doc).unwrap();
                let old = model.remove(&id).unwrap();
                if new_id != id {
                    dead.push((id, old));
                }
                model.insert(new_id, doc);
            }
            DocumentOperation::Delete(n) if !model.is_empty() => {
                let id = *model.keys().nth(n % model.len()).unwrap();
                col.delete(id).unwrap();
                dead.push((id, model.remove(&id).unwrap()));
            }
            _ => {}
        }
    }
    dead
}

proptest! {
    #![proptest_config(PropTestConfig::quick().to_proptest_config())]

    #[test]
    fn reads_match_the_model(ops in operation_sequence_strategy(1, 40)) {
        let mut col = TestCollection::new();
        for &path in INDEXED {
            col.add_index(path).unwrap();
        }
        let mut model = BTreeMap::new();
        let dead = apply(&col, &mut model, ops);

        for (id, doc) in &model {
            prop_assert_eq!(&col.read(*id).unwrap(), doc);
        }
        for (id, _) in &dead {
            prop_assert!(col.read(*id).unwrap_err().is_not_found());
        }
    }

    #[test]
    fn indexes_agree_with_documents(ops in operation_sequence_strategy(1, 40)) {
        let mut col = TestCollection::new();
        for &path in INDEXED {
            col.add_index(path).unwrap();
        }
        let mut model = BTreeMap::new();
        let dead = apply(&col, &mut model, ops);

        for &path in INDEXED {
            for (id, doc) in &model {
                for value in get_in(doc, path).into_iter().filter(|v| !v.is_null()) {
                    prop_assert!(raw_index_entries(&col, path, value).contains(id));
                    prop_assert!(col.lookup(path, value, 0).unwrap().contains(id));
                }
            }
            for (id, doc) in &dead {
                for value in get_in(doc, path).into_iter().filter(|v| !v.is_null()) {
                    prop_assert!(!raw_index_entries(&col, path, value).contains(id));
                }
            }
        }
    }

    #[test]
    fn rebuilt_index_matches_incremental_index(
        docs in prop::collection::vec(document_strategy(), 0..20),
        path in path_strategy(),
    ) {
        let mut col = TestCollection::new();
        col.add_index(&path).unwrap();
        for doc in &docs {
            col.insert(doc).unwrap();
        }

        let incremental: Vec<Vec<u64>> = docs
            .iter()
            .flat_map(|doc| get_in(doc, &path))
            .map(|v| col.lookup(&path, v, 0).unwrap())
            .collect();

        col.remove_index(&path).unwrap();
        col.add_index(&path).unwrap();

        let rebuilt: Vec<Vec<u64>> = docs
            .iter()
            .flat_map(|doc| get_in(doc, &path))
            .map(|v| col.lookup(&path, v, 0).unwrap())
            .collect();
        prop_assert_eq!(incremental, rebuilt);
    }
}
