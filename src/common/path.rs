use crate::collection::Document;
use crate::common::Value;
use crate::errors::{ErrorKind, HaliteError, HaliteResult};
use smallvec::SmallVec;

type Segments<'a> = SmallVec<[&'a str; 8]>;

/// Policy bits controlling how a key-path walk behaves.
///
/// `no_create` leaves missing intermediate structure untouched and reports
/// [PathTarget::Undefined] instead; `forbid_array` makes any array on the
/// walk a hard failure (used by `$rename`).
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct PathPolicy {
    pub no_create: bool,
    pub forbid_array: bool,
}

impl PathPolicy {
    pub const CREATE: PathPolicy = PathPolicy {
        no_create: false,
        forbid_array: false,
    };

    pub const NO_CREATE: PathPolicy = PathPolicy {
        no_create: true,
        forbid_array: false,
    };

    pub const NO_ARRAYS: PathPolicy = PathPolicy {
        no_create: false,
        forbid_array: true,
    };

    pub const NO_CREATE_NO_ARRAYS: PathPolicy = PathPolicy {
        no_create: true,
        forbid_array: true,
    };
}

/// The parent container a key-path resolves to, plus the final segment.
///
/// When the enclosing container is an array the final segment has been
/// rewritten to a numeric index and the array padded with nulls so the
/// index is legal. `Undefined` means the walk hit missing structure under
/// [PathPolicy::no_create]; callers treat the operation as a no-op.
pub(crate) enum PathTarget<'a> {
    Field(&'a mut Document, String),
    Element(&'a mut Vec<Value>, usize),
    Undefined,
}

/// Resolves a dot-joined key-path into a mutable target inside `root`.
///
/// The walk descends every prefix of the path except the last segment,
/// creating empty documents at absent object keys (unless `no_create`) and
/// padding arrays with nulls so numeric segments become addressable.
pub(crate) fn resolve_path<'a>(
    root: &'a mut Document,
    key_path: &str,
    policy: PathPolicy,
) -> HaliteResult<PathTarget<'a>> {
    let segments: Segments<'_> = key_path.split('.').collect();
    if segments.iter().any(|s| s.is_empty()) {
        log::error!("Invalid key path '{}'", key_path);
        return Err(HaliteError::new(
            &format!("'{}' is not a valid key path", key_path),
            ErrorKind::ValidationError,
        ));
    }

    descend_document(root, &segments, &policy)
}

/// Resolves a dot-joined key-path for reading. Objects are traversed by
/// key, arrays by numeric index; anything else resolves to [None].
pub(crate) fn lookup_path<'a>(root: &'a Document, key_path: &str) -> Option<&'a Value> {
    let mut segments = key_path.split('.');
    let first = segments.next()?;
    let mut current = root.data.get(first)?;

    for segment in segments {
        current = match current {
            Value::Document(doc) => doc.data.get(segment)?,
            Value::Array(items) => items.get(parse_index(segment)?)?,
            _ => return None,
        };
    }
    Some(current)
}

fn descend_document<'a>(
    doc: &'a mut Document,
    segments: &[&str],
    policy: &PathPolicy,
) -> HaliteResult<PathTarget<'a>> {
    let segment = segments[0];
    if segments.len() == 1 {
        return Ok(PathTarget::Field(doc, segment.to_string()));
    }

    let absent = matches!(doc.data.get(segment), None | Some(Value::Null));
    if absent {
        if policy.no_create {
            return Ok(PathTarget::Undefined);
        }
        doc.data
            .insert(segment.to_string(), Value::Document(Document::new()));
    }

    match doc.data.get_mut(segment) {
        Some(child) => descend_value(child, &segments[1..], policy),
        None => Err(HaliteError::new(
            "key path resolution lost its target",
            ErrorKind::InternalError,
        )),
    }
}

fn descend_value<'a>(
    node: &'a mut Value,
    segments: &[&str],
    policy: &PathPolicy,
) -> HaliteResult<PathTarget<'a>> {
    match node {
        Value::Document(doc) => descend_document(doc, segments, policy),
        Value::Array(items) => {
            if policy.forbid_array {
                log::error!("Key path runs through an array");
                return Err(HaliteError::new(
                    "the key path runs through an array, which this operation forbids",
                    ErrorKind::ValidationError,
                ));
            }

            let segment = segments[0];
            let index = match parse_index(segment) {
                Some(index) => index,
                None => {
                    log::error!(
                        "Cannot append to array using string field name '{}'",
                        segment
                    );
                    return Err(HaliteError::new(
                        &format!(
                            "cannot append to array using string field name '{}'",
                            segment
                        ),
                        ErrorKind::ValidationError,
                    ));
                }
            };

            if items.len() <= index {
                if policy.no_create {
                    return Ok(PathTarget::Undefined);
                }
                items.resize(index + 1, Value::Null);
            }

            if segments.len() == 1 {
                return Ok(PathTarget::Element(items, index));
            }

            if matches!(items[index], Value::Null) {
                if policy.no_create {
                    return Ok(PathTarget::Undefined);
                }
                items[index] = Value::Document(Document::new());
            }
            descend_value(&mut items[index], &segments[1..], policy)
        }
        _ => {
            // scalar in the middle of the walk
            if policy.no_create {
                Ok(PathTarget::Undefined)
            } else {
                log::error!("Cannot traverse through a scalar value at '{}'", segments[0]);
                Err(HaliteError::new(
                    &format!(
                        "cannot create field '{}' inside a non-container value",
                        segments[0]
                    ),
                    ErrorKind::ValidationError,
                ))
            }
        }
    }
}

fn parse_index(segment: &str) -> Option<usize> {
    if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    segment.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;

    #[test]
    fn test_resolve_top_level_field() {
        let mut doc = doc! { a: 1 };
        match resolve_path(&mut doc, "a", PathPolicy::CREATE).unwrap() {
            PathTarget::Field(parent, key) => {
                assert_eq!(key, "a");
                assert_eq!(parent.get("a"), Some(&Value::from(1)));
            }
            _ => panic!("expected a field target"),
        }
    }

    #[test]
    fn test_resolve_creates_intermediate_documents() {
        let mut doc = doc! {};
        match resolve_path(&mut doc, "a.b.c", PathPolicy::CREATE).unwrap() {
            PathTarget::Field(parent, key) => {
                assert_eq!(key, "c");
                assert!(parent.is_empty());
            }
            _ => panic!("expected a field target"),
        }
        assert!(doc.lookup("a.b").is_some());
    }

    #[test]
    fn test_resolve_no_create_returns_undefined() {
        let mut doc = doc! { a: 1 };
        let target = resolve_path(&mut doc, "x.y.z", PathPolicy::NO_CREATE).unwrap();
        assert!(matches!(target, PathTarget::Undefined));
        // nothing materialized
        assert_eq!(doc.len(), 1);
    }

    #[test]
    fn test_resolve_array_element_pads_with_null() {
        let mut doc = doc! { a: [1] };
        match resolve_path(&mut doc, "a.3", PathPolicy::CREATE).unwrap() {
            PathTarget::Element(items, index) => {
                assert_eq!(index, 3);
                assert_eq!(items.len(), 4);
                assert_eq!(items[1], Value::Null);
            }
            _ => panic!("expected an element target"),
        }
    }

    #[test]
    fn test_resolve_array_with_string_segment_fails() {
        let mut doc = doc! { a: [1, 2] };
        let result = resolve_path(&mut doc, "a.b", PathPolicy::CREATE);
        assert!(result.is_err());
        let err = result.err().unwrap();
        assert_eq!(err.kind(), &ErrorKind::ValidationError);
        assert!(err.message().contains("string field name"));
    }

    #[test]
    fn test_resolve_descends_into_array_documents() {
        let mut doc = doc! { a: [{ b: 1 }, { b: 2 }] };
        match resolve_path(&mut doc, "a.1.b", PathPolicy::CREATE).unwrap() {
            PathTarget::Field(parent, key) => {
                assert_eq!(key, "b");
                assert_eq!(parent.get("b"), Some(&Value::from(2)));
            }
            _ => panic!("expected a field target"),
        }
    }

    #[test]
    fn test_resolve_forbid_array() {
        let mut doc = doc! { a: [{ b: 1 }] };
        let result = resolve_path(&mut doc, "a.0.b", PathPolicy::NO_ARRAYS);
        assert!(result.is_err());
        assert_eq!(result.err().unwrap().kind(), &ErrorKind::ValidationError);
    }

    #[test]
    fn test_resolve_scalar_intermediate() {
        let mut doc = doc! { a: 1 };
        let result = resolve_path(&mut doc, "a.b.c", PathPolicy::CREATE);
        assert!(result.is_err());

        let target = resolve_path(&mut doc, "a.b.c", PathPolicy::NO_CREATE).unwrap();
        assert!(matches!(target, PathTarget::Undefined));
    }

    #[test]
    fn test_resolve_null_intermediate_is_replaced_in_create_mode() {
        let mut doc = doc! { a: null };
        match resolve_path(&mut doc, "a.b", PathPolicy::CREATE).unwrap() {
            PathTarget::Field(_, key) => assert_eq!(key, "b"),
            _ => panic!("expected a field target"),
        }
        assert!(doc.lookup("a").unwrap().is_document());
    }

    #[test]
    fn test_resolve_empty_segment_fails() {
        let mut doc = doc! {};
        assert!(resolve_path(&mut doc, "a..b", PathPolicy::CREATE).is_err());
        assert!(resolve_path(&mut doc, "", PathPolicy::CREATE).is_err());
    }

    #[test]
    fn test_resolve_no_create_out_of_bounds_index() {
        let mut doc = doc! { a: [1] };
        let target = resolve_path(&mut doc, "a.5", PathPolicy::NO_CREATE).unwrap();
        assert!(matches!(target, PathTarget::Undefined));
        assert_eq!(doc.lookup("a").unwrap().as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_lookup_path() {
        let doc = doc! { a: { b: [{ c: 5 }] } };
        assert_eq!(lookup_path(&doc, "a.b.0.c"), Some(&Value::from(5)));
        assert!(lookup_path(&doc, "a.b.1.c").is_none());
        assert!(lookup_path(&doc, "a.x").is_none());
        assert!(lookup_path(&doc, "a.b.c").is_none());
    }
}
