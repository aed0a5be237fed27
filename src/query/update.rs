use crate::collection::Document;
use crate::common::path::{resolve_path, PathPolicy, PathTarget};
use crate::common::{Value, DOC_ID};
use crate::errors::{ErrorKind, HaliteError, HaliteResult};
use crate::query::selector::compile_predicate;

/// How an update document is interpreted in strict mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UpdateKind {
    /// Every top-level key is a `$`-modifier: apply them in declared order.
    Modify,
    /// No top-level key is a modifier: replace the stored document,
    /// keeping its `_id`.
    Replace,
}

/// Classifies an update document, rejecting a mix of modifier and literal
/// keys.
pub(crate) fn classify_update(update: &Document) -> HaliteResult<UpdateKind> {
    let modifier_keys = update.keys().filter(|k| k.starts_with('$')).count();
    if modifier_keys == 0 {
        Ok(UpdateKind::Replace)
    } else if modifier_keys == update.len() {
        Ok(UpdateKind::Modify)
    } else {
        log::error!("Update document mixes update operators and literal fields");
        Err(HaliteError::new(
            "update document cannot mix update operators and literal fields",
            ErrorKind::ValidationError,
        ))
    }
}

/// Applies a modifier update document clause by clause, in declared order.
pub(crate) fn apply_modifiers(doc: &mut Document, update: &Document) -> HaliteResult<()> {
    for (operator, clauses) in update.iter() {
        let args = clauses.as_document().ok_or_else(|| {
            log::error!("'{}' modifier requires a document argument", operator);
            HaliteError::new(
                &format!("'{}' modifier requires a document argument", operator),
                ErrorKind::ValidationError,
            )
        })?;

        for (path, argument) in args.iter() {
            apply_modifier(doc, operator, path, argument)?;
        }
    }
    Ok(())
}

/// Replaces the stored document with the update document, keeping `_id`.
pub(crate) fn apply_replacement(doc: &mut Document, update: &Document) {
    let id = doc.data.get(DOC_ID).cloned();
    let mut next = update.clone();
    next.data.shift_remove(DOC_ID);
    if let Some(id) = id {
        next.data.shift_insert(0, DOC_ID.to_string(), id);
    }
    *doc = next;
}

/// Lenient-mode update: whole-document replacement when `override_document`
/// is set, otherwise a shallow assignment touching only pre-existing fields.
/// `_id` is never reassigned; assignments to unknown fields log a warning.
pub(crate) fn apply_lenient(
    doc: &mut Document,
    update: &Document,
    override_document: bool,
) -> HaliteResult<()> {
    if override_document {
        if update.keys().any(|k| k.starts_with('$')) {
            log::error!("Document override cannot contain update operators");
            return Err(HaliteError::new(
                "document override cannot contain update operators",
                ErrorKind::ValidationError,
            ));
        }
        apply_replacement(doc, update);
        return Ok(());
    }

    for (key, value) in update.iter() {
        if key == DOC_ID {
            continue;
        }
        if doc.data.contains_key(key) {
            doc.data.insert(key.clone(), value.clone());
        } else {
            log::warn!(
                "Field '{}' does not exist on the target document; assignment skipped",
                key
            );
        }
    }
    Ok(())
}

fn apply_modifier(
    doc: &mut Document,
    operator: &str,
    path: &str,
    argument: &Value,
) -> HaliteResult<()> {
    guard_id_path(path)?;

    match operator {
        "$inc" => inc(doc, path, argument),
        "$set" => {
            *create_slot(doc, path)? = argument.clone();
            Ok(())
        }
        "$unset" => unset(doc, path),
        "$push" => push(doc, path, argument),
        "$pushAll" => push_all(doc, path, argument),
        "$addToSet" => add_to_set(doc, path, argument),
        "$pop" => pop(doc, path, argument),
        "$pull" => pull(doc, path, argument),
        "$pullAll" => pull_all(doc, path, argument),
        "$rename" => rename(doc, path, argument),
        "$bit" => {
            log::error!("'$bit' modifier is not supported");
            Err(HaliteError::new(
                "'$bit' modifier is not supported",
                ErrorKind::Unsupported,
            ))
        }
        other => {
            log::error!("Unknown modifier '{}'", other);
            Err(HaliteError::new(
                &format!("unknown modifier '{}'", other),
                ErrorKind::ValidationError,
            ))
        }
    }
}

fn guard_id_path(path: &str) -> HaliteResult<()> {
    if path == DOC_ID {
        log::error!("The '_id' field cannot be modified");
        return Err(HaliteError::new(
            "the '_id' field cannot be modified",
            ErrorKind::ValidationError,
        ));
    }
    Ok(())
}

/// Resolves the target slot in create mode. The slot always exists
/// afterwards; a previously absent object key holds null.
fn create_slot<'a>(doc: &'a mut Document, path: &str) -> HaliteResult<&'a mut Value> {
    match resolve_path(doc, path, PathPolicy::CREATE)? {
        PathTarget::Field(parent, key) => Ok(parent.data.entry(key).or_insert(Value::Null)),
        PathTarget::Element(items, index) => items.get_mut(index).ok_or_else(|| {
            HaliteError::new("array target lost after padding", ErrorKind::InternalError)
        }),
        PathTarget::Undefined => Err(HaliteError::new(
            "create-mode path resolution reported an undefined target",
            ErrorKind::InternalError,
        )),
    }
}

/// Resolves the target slot without creating intermediate structure.
/// [None] when the path or the final key is absent.
fn existing_slot<'a>(doc: &'a mut Document, path: &str) -> HaliteResult<Option<&'a mut Value>> {
    Ok(match resolve_path(doc, path, PathPolicy::NO_CREATE)? {
        PathTarget::Undefined => None,
        PathTarget::Field(parent, key) => parent.data.get_mut(&key),
        PathTarget::Element(items, index) => items.get_mut(index),
    })
}

fn non_array_target(operator: &str, path: &str) -> HaliteError {
    log::error!("Cannot apply {} to non-array field '{}'", operator, path);
    HaliteError::new(
        &format!("cannot apply {} to non-array field '{}'", operator, path),
        ErrorKind::ValidationError,
    )
}

fn inc(doc: &mut Document, path: &str, argument: &Value) -> HaliteResult<()> {
    let amount = match argument {
        Value::Number(n) => *n,
        _ => {
            log::error!("'$inc' requires a numeric argument");
            return Err(HaliteError::new(
                "'$inc' requires a numeric argument",
                ErrorKind::ValidationError,
            ));
        }
    };

    let slot = create_slot(doc, path)?;
    match slot {
        Value::Null => {
            *slot = Value::Number(amount);
            Ok(())
        }
        Value::Number(n) => {
            *n += amount;
            Ok(())
        }
        _ => {
            log::error!("Cannot apply $inc to non-numeric field '{}'", path);
            Err(HaliteError::new(
                &format!("cannot apply $inc to non-numeric field '{}'", path),
                ErrorKind::ValidationError,
            ))
        }
    }
}

fn unset(doc: &mut Document, path: &str) -> HaliteResult<()> {
    match resolve_path(doc, path, PathPolicy::NO_CREATE)? {
        PathTarget::Undefined => Ok(()),
        PathTarget::Field(parent, key) => {
            parent.data.shift_remove(&key);
            Ok(())
        }
        PathTarget::Element(items, index) => {
            // arrays keep their shape: the element is nulled out
            if let Some(slot) = items.get_mut(index) {
                *slot = Value::Null;
            }
            Ok(())
        }
    }
}

fn push(doc: &mut Document, path: &str, argument: &Value) -> HaliteResult<()> {
    let slot = create_slot(doc, path)?;
    match slot {
        Value::Null => {
            *slot = Value::Array(vec![argument.clone()]);
            Ok(())
        }
        Value::Array(items) => {
            items.push(argument.clone());
            Ok(())
        }
        _ => Err(non_array_target("$push", path)),
    }
}

fn push_all(doc: &mut Document, path: &str, argument: &Value) -> HaliteResult<()> {
    let values = argument.as_array().ok_or_else(|| {
        log::error!("'$pushAll' requires an array argument");
        HaliteError::new(
            "'$pushAll' requires an array argument",
            ErrorKind::ValidationError,
        )
    })?;

    let slot = create_slot(doc, path)?;
    match slot {
        Value::Null => {
            *slot = Value::Array(values.clone());
            Ok(())
        }
        Value::Array(items) => {
            items.extend(values.iter().cloned());
            Ok(())
        }
        _ => Err(non_array_target("$pushAll", path)),
    }
}

fn add_to_set(doc: &mut Document, path: &str, argument: &Value) -> HaliteResult<()> {
    // recognize the { $each: [...] } wrapper for bulk insertion
    let values: Vec<Value> = match argument.as_document() {
        Some(wrapper) if wrapper.contains_key("$each") => match wrapper.get("$each") {
            Some(Value::Array(each)) => each.clone(),
            _ => {
                log::error!("'$each' requires an array argument");
                return Err(HaliteError::new(
                    "'$each' requires an array argument",
                    ErrorKind::ValidationError,
                ));
            }
        },
        _ => vec![argument.clone()],
    };

    let slot = create_slot(doc, path)?;
    match slot {
        Value::Null => *slot = Value::Array(Vec::with_capacity(values.len())),
        Value::Array(_) => {}
        _ => return Err(non_array_target("$addToSet", path)),
    }
    if let Value::Array(items) = slot {
        for value in values {
            if !items.iter().any(|item| item == &value) {
                items.push(value);
            }
        }
    }
    Ok(())
}

fn pop(doc: &mut Document, path: &str, argument: &Value) -> HaliteResult<()> {
    let from_front = match argument.as_number() {
        Some(n) => n < 0.0,
        None => {
            log::error!("'$pop' requires a numeric argument");
            return Err(HaliteError::new(
                "'$pop' requires a numeric argument",
                ErrorKind::ValidationError,
            ));
        }
    };

    match existing_slot(doc, path)? {
        None => Ok(()),
        Some(Value::Null) => Ok(()),
        Some(Value::Array(items)) => {
            if !items.is_empty() {
                if from_front {
                    items.remove(0);
                } else {
                    items.pop();
                }
            }
            Ok(())
        }
        Some(_) => Err(non_array_target("$pop", path)),
    }
}

fn pull(doc: &mut Document, path: &str, argument: &Value) -> HaliteResult<()> {
    // a non-array document argument acts as a sub-selector over the elements
    let matcher = match argument {
        Value::Document(predicate) => Some(compile_predicate(predicate)?),
        _ => None,
    };

    match existing_slot(doc, path)? {
        None => Ok(()),
        Some(Value::Null) => Ok(()),
        Some(Value::Array(items)) => {
            match matcher {
                Some(matcher) => items.retain(|item| {
                    let selected = item
                        .as_document()
                        .map(|d| matcher.matches(d))
                        .unwrap_or(false);
                    !selected && item != argument
                }),
                None => items.retain(|item| item != argument),
            }
            Ok(())
        }
        Some(_) => Err(non_array_target("$pull", path)),
    }
}

fn pull_all(doc: &mut Document, path: &str, argument: &Value) -> HaliteResult<()> {
    let values = argument.as_array().cloned().ok_or_else(|| {
        log::error!("'$pullAll' requires an array argument");
        HaliteError::new(
            "'$pullAll' requires an array argument",
            ErrorKind::ValidationError,
        )
    })?;

    match existing_slot(doc, path)? {
        None => Ok(()),
        Some(Value::Null) => Ok(()),
        Some(Value::Array(items)) => {
            items.retain(|item| !values.iter().any(|v| v == item));
            Ok(())
        }
        Some(_) => Err(non_array_target("$pullAll", path)),
    }
}

fn rename(doc: &mut Document, path: &str, argument: &Value) -> HaliteResult<()> {
    let target_path = match argument.as_str() {
        Some(s) => s.to_string(),
        None => {
            log::error!("'$rename' requires a string target path");
            return Err(HaliteError::new(
                "'$rename' requires a string target path",
                ErrorKind::ValidationError,
            ));
        }
    };
    guard_id_path(&target_path)?;

    if target_path == path {
        log::error!("'$rename' source and target must differ");
        return Err(HaliteError::new(
            "'$rename' source and target must differ",
            ErrorKind::ValidationError,
        ));
    }

    let taken = match resolve_path(doc, path, PathPolicy::NO_CREATE_NO_ARRAYS)? {
        PathTarget::Undefined => return Ok(()),
        PathTarget::Field(parent, key) => parent.data.shift_remove(&key),
        PathTarget::Element(..) => {
            return Err(HaliteError::new(
                "array target in an array-free walk",
                ErrorKind::InternalError,
            ))
        }
    };

    let value = match taken {
        Some(value) => value,
        None => return Ok(()),
    };

    match resolve_path(doc, &target_path, PathPolicy::NO_ARRAYS)? {
        PathTarget::Field(parent, key) => {
            parent.data.insert(key, value);
            Ok(())
        }
        _ => Err(HaliteError::new(
            "array target in an array-free walk",
            ErrorKind::InternalError,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;

    #[test]
    fn test_classify() {
        assert_eq!(
            classify_update(&doc! { "$set": { a: 1 } }).unwrap(),
            UpdateKind::Modify
        );
        assert_eq!(classify_update(&doc! { a: 1 }).unwrap(), UpdateKind::Replace);
        assert_eq!(classify_update(&doc! {}).unwrap(), UpdateKind::Replace);

        let mixed = classify_update(&doc! { "$set": { a: 1 }, b: 2 });
        assert!(mixed.is_err());
        assert_eq!(mixed.err().unwrap().kind(), &ErrorKind::ValidationError);
    }

    #[test]
    fn test_inc_creates_and_adds() {
        let mut doc = doc! { a: 1 };
        apply_modifiers(&mut doc, &doc! { "$inc": { a: 5, b: 2 } }).unwrap();
        assert_eq!(doc.get("a"), Some(&Value::from(6)));
        assert_eq!(doc.get("b"), Some(&Value::from(2)));

        apply_modifiers(&mut doc, &doc! { "$inc": { a: 5 } }).unwrap();
        assert_eq!(doc.get("a"), Some(&Value::from(11)));
    }

    #[test]
    fn test_inc_non_numeric_target_fails() {
        let mut doc = doc! { a: "x" };
        let result = apply_modifiers(&mut doc, &doc! { "$inc": { a: 1 } });
        assert!(result.is_err());
        assert_eq!(result.err().unwrap().kind(), &ErrorKind::ValidationError);
    }

    #[test]
    fn test_inc_non_numeric_argument_fails() {
        let mut doc = doc! { a: 1 };
        assert!(apply_modifiers(&mut doc, &doc! { "$inc": { a: "x" } }).is_err());
    }

    #[test]
    fn test_set_deep_path() {
        let mut doc = doc! {};
        apply_modifiers(&mut doc, &doc! { "$set": { "a.b.c": 5 } }).unwrap();
        assert_eq!(doc.lookup("a.b.c"), Some(&Value::from(5)));
    }

    #[test]
    fn test_set_array_element() {
        let mut doc = doc! { a: [1, 2, 3] };
        apply_modifiers(&mut doc, &doc! { "$set": { "a.1": 9 } }).unwrap();
        assert_eq!(
            doc.get("a"),
            Some(&Value::Array(vec![
                Value::from(1),
                Value::from(9),
                Value::from(3)
            ]))
        );
    }

    #[test]
    fn test_set_pads_array() {
        let mut doc = doc! { a: [1] };
        apply_modifiers(&mut doc, &doc! { "$set": { "a.3": 9 } }).unwrap();
        assert_eq!(
            doc.get("a"),
            Some(&Value::Array(vec![
                Value::from(1),
                Value::Null,
                Value::Null,
                Value::from(9)
            ]))
        );
    }

    #[test]
    fn test_set_is_idempotent() {
        let mut doc = doc! {};
        apply_modifiers(&mut doc, &doc! { "$set": { k: { v: 1 } } }).unwrap();
        let once = doc.clone();
        apply_modifiers(&mut doc, &doc! { "$set": { k: { v: 1 } } }).unwrap();
        assert_eq!(doc, once);
    }

    #[test]
    fn test_unset_object_key() {
        let mut doc = doc! { a: 1, b: 2 };
        apply_modifiers(&mut doc, &doc! { "$unset": { a: 1 } }).unwrap();
        assert!(doc.get("a").is_none());
        assert_eq!(doc.get("b"), Some(&Value::from(2)));
    }

    #[test]
    fn test_unset_array_element_nulls_out() {
        let mut doc = doc! { a: [1, 2, 3] };
        apply_modifiers(&mut doc, &doc! { "$unset": { "a.1": 1 } }).unwrap();
        assert_eq!(
            doc.get("a"),
            Some(&Value::Array(vec![
                Value::from(1),
                Value::Null,
                Value::from(3)
            ]))
        );
    }

    #[test]
    fn test_unset_absent_path_is_noop() {
        let mut doc = doc! { a: 1 };
        apply_modifiers(&mut doc, &doc! { "$unset": { "x.y": 1 } }).unwrap();
        assert_eq!(doc, doc! { a: 1 });
    }

    #[test]
    fn test_push() {
        let mut doc = doc! { a: [1] };
        apply_modifiers(&mut doc, &doc! { "$push": { a: 2, b: 9 } }).unwrap();
        assert_eq!(
            doc.get("a"),
            Some(&Value::Array(vec![Value::from(1), Value::from(2)]))
        );
        // absent target becomes a singleton array
        assert_eq!(doc.get("b"), Some(&Value::Array(vec![Value::from(9)])));
    }

    #[test]
    fn test_push_non_array_fails() {
        let mut doc = doc! { a: 1 };
        assert!(apply_modifiers(&mut doc, &doc! { "$push": { a: 2 } }).is_err());
    }

    #[test]
    fn test_push_all() {
        let mut doc = doc! { a: [1] };
        apply_modifiers(&mut doc, &doc! { "$pushAll": { a: [2, 3] } }).unwrap();
        assert_eq!(
            doc.get("a"),
            Some(&Value::Array(vec![
                Value::from(1),
                Value::from(2),
                Value::from(3)
            ]))
        );
    }

    #[test]
    fn test_push_all_requires_array_argument() {
        let mut doc = doc! { a: [1] };
        assert!(apply_modifiers(&mut doc, &doc! { "$pushAll": { a: 2 } }).is_err());
    }

    #[test]
    fn test_add_to_set() {
        let mut doc = doc! { a: [1, 2] };
        apply_modifiers(&mut doc, &doc! { "$addToSet": { a: 2 } }).unwrap();
        assert_eq!(
            doc.get("a"),
            Some(&Value::Array(vec![Value::from(1), Value::from(2)]))
        );

        apply_modifiers(&mut doc, &doc! { "$addToSet": { a: 3 } }).unwrap();
        assert_eq!(
            doc.get("a"),
            Some(&Value::Array(vec![
                Value::from(1),
                Value::from(2),
                Value::from(3)
            ]))
        );
    }

    #[test]
    fn test_add_to_set_each() {
        let mut doc = doc! { a: [1] };
        apply_modifiers(
            &mut doc,
            &doc! { "$addToSet": { a: { "$each": [1, 2, 3] } } },
        )
        .unwrap();
        assert_eq!(
            doc.get("a"),
            Some(&Value::Array(vec![
                Value::from(1),
                Value::from(2),
                Value::from(3)
            ]))
        );
    }

    #[test]
    fn test_add_to_set_is_idempotent() {
        let mut doc = doc! {};
        apply_modifiers(&mut doc, &doc! { "$addToSet": { a: "x" } }).unwrap();
        let once = doc.clone();
        apply_modifiers(&mut doc, &doc! { "$addToSet": { a: "x" } }).unwrap();
        assert_eq!(doc, once);
    }

    #[test]
    fn test_pop() {
        let mut doc = doc! { a: [1, 2, 3] };
        apply_modifiers(&mut doc, &doc! { "$pop": { a: 1 } }).unwrap();
        assert_eq!(
            doc.get("a"),
            Some(&Value::Array(vec![Value::from(1), Value::from(2)]))
        );

        apply_modifiers(&mut doc, &doc! { "$pop": { a: (-1) } }).unwrap();
        assert_eq!(doc.get("a"), Some(&Value::Array(vec![Value::from(2)])));
    }

    #[test]
    fn test_pop_absent_is_noop() {
        let mut doc = doc! {};
        apply_modifiers(&mut doc, &doc! { "$pop": { a: 1 } }).unwrap();
        assert!(doc.is_empty());
    }

    #[test]
    fn test_pop_non_array_fails() {
        let mut doc = doc! { a: 1 };
        assert!(apply_modifiers(&mut doc, &doc! { "$pop": { a: 1 } }).is_err());
    }

    #[test]
    fn test_pull_scalar() {
        let mut doc = doc! { a: [1, 2, 1, 3] };
        apply_modifiers(&mut doc, &doc! { "$pull": { a: 1 } }).unwrap();
        assert_eq!(
            doc.get("a"),
            Some(&Value::Array(vec![Value::from(2), Value::from(3)]))
        );
    }

    #[test]
    fn test_pull_with_sub_selector() {
        let mut doc = doc! { a: [{ v: 1 }, { v: 5 }, { v: 9 }] };
        apply_modifiers(&mut doc, &doc! { "$pull": { a: { v: { "$gt": 4 } } } }).unwrap();
        assert_eq!(
            doc.get("a"),
            Some(&Value::Array(vec![Value::Document(doc! { v: 1 })]))
        );
    }

    #[test]
    fn test_pull_all() {
        let mut doc = doc! { a: [1, 2, 3, 2] };
        apply_modifiers(&mut doc, &doc! { "$pullAll": { a: [2, 3] } }).unwrap();
        assert_eq!(doc.get("a"), Some(&Value::Array(vec![Value::from(1)])));
    }

    #[test]
    fn test_rename() {
        let mut doc = doc! { a: { b: 5 }, c: 1 };
        apply_modifiers(&mut doc, &doc! { "$rename": { "a.b": "a.z" } }).unwrap();
        assert!(doc.lookup("a.b").is_none());
        assert_eq!(doc.lookup("a.z"), Some(&Value::from(5)));

        apply_modifiers(&mut doc, &doc! { "$rename": { c: "moved.here" } }).unwrap();
        assert!(doc.get("c").is_none());
        assert_eq!(doc.lookup("moved.here"), Some(&Value::from(1)));
    }

    #[test]
    fn test_rename_absent_source_is_noop() {
        let mut doc = doc! { a: 1 };
        apply_modifiers(&mut doc, &doc! { "$rename": { x: "y" } }).unwrap();
        assert_eq!(doc, doc! { a: 1 });
    }

    #[test]
    fn test_rename_same_path_fails() {
        let mut doc = doc! { a: 1 };
        assert!(apply_modifiers(&mut doc, &doc! { "$rename": { a: "a" } }).is_err());
    }

    #[test]
    fn test_rename_through_array_fails() {
        let mut doc = doc! { a: [{ b: 1 }] };
        let result = apply_modifiers(&mut doc, &doc! { "$rename": { "a.0.b": "c" } });
        assert!(result.is_err());
        assert_eq!(result.err().unwrap().kind(), &ErrorKind::ValidationError);
    }

    #[test]
    fn test_rename_non_string_target_fails() {
        let mut doc = doc! { a: 1 };
        assert!(apply_modifiers(&mut doc, &doc! { "$rename": { a: 5 } }).is_err());
    }

    #[test]
    fn test_bit_is_unsupported() {
        let mut doc = doc! { a: 1 };
        let result = apply_modifiers(&mut doc, &doc! { "$bit": { a: { and: 5 } } });
        assert!(result.is_err());
        assert_eq!(result.err().unwrap().kind(), &ErrorKind::Unsupported);
    }

    #[test]
    fn test_unknown_modifier_fails() {
        let mut doc = doc! { a: 1 };
        let result = apply_modifiers(&mut doc, &doc! { "$frobnicate": { a: 1 } });
        assert!(result.is_err());
        assert_eq!(result.err().unwrap().kind(), &ErrorKind::ValidationError);
    }

    #[test]
    fn test_id_cannot_be_modified() {
        let mut doc = doc! { "_id": "7", a: 1 };
        assert!(apply_modifiers(&mut doc, &doc! { "$set": { "_id": "8" } }).is_err());
        assert!(apply_modifiers(&mut doc, &doc! { "$rename": { a: "_id" } }).is_err());
        assert!(apply_modifiers(&mut doc, &doc! { "$unset": { "_id": 1 } }).is_err());
    }

    #[test]
    fn test_modifiers_apply_in_declared_order() {
        let mut doc = doc! {};
        apply_modifiers(
            &mut doc,
            &doc! { "$set": { a: [1] }, "$push": { a: 2 } },
        )
        .unwrap();
        assert_eq!(
            doc.get("a"),
            Some(&Value::Array(vec![Value::from(1), Value::from(2)]))
        );
    }

    #[test]
    fn test_replacement_keeps_id() {
        let mut doc = doc! { "_id": "7", a: 1, extra: true };
        apply_replacement(&mut doc, &doc! { b: 2 });
        assert_eq!(doc, doc! { "_id": "7", b: 2 });
        let keys: Vec<_> = doc.keys().cloned().collect();
        assert_eq!(keys[0], "_id");
    }

    #[test]
    fn test_lenient_shallow_assignment() {
        let mut doc = doc! { "_id": "7", a: 1, b: 2 };
        apply_lenient(&mut doc, &doc! { a: 9, unknown: 1, "_id": "8" }, false).unwrap();
        assert_eq!(doc.get("a"), Some(&Value::from(9)));
        assert_eq!(doc.get("b"), Some(&Value::from(2)));
        assert!(doc.get("unknown").is_none());
        assert_eq!(doc.get("_id"), Some(&Value::from("7")));
    }

    #[test]
    fn test_lenient_override() {
        let mut doc = doc! { "_id": "7", a: 1 };
        apply_lenient(&mut doc, &doc! { b: 2 }, true).unwrap();
        assert_eq!(doc, doc! { "_id": "7", b: 2 });
    }

    #[test]
    fn test_lenient_override_rejects_operators() {
        let mut doc = doc! { "_id": "7", a: 1 };
        assert!(apply_lenient(&mut doc, &doc! { "$set": { a: 2 } }, true).is_err());
    }
}
