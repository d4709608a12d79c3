//! Field extraction along a path of object keys.

use serde_json::Value;

/// Returns the indexable leaf values found in `doc` along `path`.
///
/// Every segment must name a key of an object. A missing key, or an array or
/// scalar reached before the last segment, yields nothing: arrays can only be
/// the final stop. A final array is flattened one level into its elements;
/// any other final value (including `null`) is returned on its own.
///
/// ```rust
/// use hashdoc_core::get_in;
/// use serde_json::json;
///
/// let doc = json!({"a": [{"b": 1}, {"b": 2}]});
/// assert_eq!(get_in(&doc, &["a"]).len(), 2);
/// assert!(get_in(&doc, &["a", "b"]).is_empty());
/// ```
pub fn get_in<'a, S: AsRef<str>>(doc: &'a Value, path: &[S]) -> Vec<&'a Value> {
    let mut current = doc;
    for segment in path {
        match current {
            Value::Object(map) => match map.get(segment.as_ref()) {
                Some(next) => current = next,
                None => return Vec::new(),
            },
            _ => return Vec::new(),
        }
    }

    match current {
        Value::Array(items) => items.iter().collect(),
        leaf => vec![leaf],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn nested_scalar() {
        let doc = json!({"a": {"b": 1}});
        assert_eq!(get_in(&doc, &["a", "b"]), vec![&json!(1)]);
    }

    #[test]
    fn final_array_is_flattened_once() {
        let doc = json!({"a": {"b": [1, [2, 3], 4]}});
        assert_eq!(
            get_in(&doc, &["a", "b"]),
            vec![&json!(1), &json!([2, 3]), &json!(4)]
        );
    }

    #[test]
    fn array_of_objects_at_end_of_path() {
        let doc = json!({"a": [{"b": 1}, {"b": 2}]});
        assert_eq!(
            get_in(&doc, &["a"]),
            vec![&json!({"b": 1}), &json!({"b": 2})]
        );
    }

    #[test]
    fn array_in_the_middle_of_path_yields_nothing() {
        let doc = json!({"a": [{"b": 1}, {"b": 2}]});
        assert!(get_in(&doc, &["a", "b"]).is_empty());
    }

    #[test]
    fn missing_key_yields_nothing() {
        let doc = json!({"a": {"b": 1}});
        assert!(get_in(&doc, &["a", "c"]).is_empty());
        assert!(get_in(&doc, &["x"]).is_empty());
    }

    #[test]
    fn scalar_in_the_middle_of_path_yields_nothing() {
        let doc = json!({"a": 5});
        assert!(get_in(&doc, &["a", "b"]).is_empty());
    }

    #[test]
    fn explicit_null_is_kept() {
        let doc = json!({"a": null});
        assert_eq!(get_in(&doc, &["a"]), vec![&Value::Null]);
    }

    #[test]
    fn empty_array_yields_nothing() {
        let doc = json!({"tags": []});
        assert!(get_in(&doc, &["tags"]).is_empty());
    }

    #[test]
    fn empty_path_returns_root() {
        let doc = json!({"a": 1});
        assert_eq!(get_in::<&str>(&doc, &[]), vec![&doc]);
    }

    #[test]
    fn owned_segments_work_too() {
        let doc = json!({"user": {"name": "alice"}});
        let path = vec!["user".to_string(), "name".to_string()];
        assert_eq!(get_in(&doc, &path), vec![&json!("alice")]);
    }
}
