use crate::collection::Document;
use crate::common::{Value, DOC_ID};
use crate::errors::{ErrorKind, HaliteError, HaliteResult};
use std::fmt::Debug;
use std::sync::Arc;

/// A compiled projection: a pure function reshaping a document into an
/// inclusion- or exclusion-filtered copy.
#[derive(Clone)]
pub struct Projector {
    inner: Arc<dyn Fn(&Document) -> Document + Send + Sync>,
}

impl Projector {
    fn new(f: impl Fn(&Document) -> Document + Send + Sync + 'static) -> Self {
        Projector { inner: Arc::new(f) }
    }

    /// The identity projection.
    pub fn identity() -> Self {
        Projector::new(|doc| doc.clone())
    }

    /// Applies this projection to a document, producing a new document.
    #[inline]
    pub fn project(&self, doc: &Document) -> Document {
        (self.inner)(doc)
    }
}

impl Debug for Projector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Projector")
    }
}

enum Mode {
    Include,
    Exclude,
}

/// Compiles a field specification into a [Projector].
///
/// The specification is one of: null (identity), an array of field-path
/// strings (implicit inclusion), or a document mapping field-paths to
/// 0/1/boolean flags. Inclusion and exclusion cannot be mixed, except that
/// `_id` may be excluded from an inclusion projection. `_id` is included by
/// default.
pub fn compile_projection(spec: &Value) -> HaliteResult<Projector> {
    match spec {
        Value::Null => Ok(Projector::identity()),
        Value::Array(paths) => {
            let mut fields = Vec::with_capacity(paths.len());
            for path in paths {
                let name = path.as_str().ok_or_else(|| {
                    log::error!("Projection arrays accept only field-path strings");
                    HaliteError::new(
                        "projection arrays accept only field-path strings",
                        ErrorKind::ValidationError,
                    )
                })?;
                fields.push(split_path(name)?);
            }
            Ok(build(Mode::Include, fields, true))
        }
        Value::Document(doc) => compile_projection_document(doc),
        other => {
            log::error!("Unsupported projection specification {:?}", other);
            Err(HaliteError::new(
                &format!("'{}' cannot be used as a projection", other.type_name()),
                ErrorKind::ValidationError,
            ))
        }
    }
}

fn compile_projection_document(spec: &Document) -> HaliteResult<Projector> {
    if spec.is_empty() {
        return Ok(Projector::identity());
    }

    let mut fields = Vec::new();
    let mut mode: Option<Mode> = None;
    let mut id_flag: Option<bool> = None;

    for (path, value) in spec.iter() {
        let include = match value {
            Value::Bool(b) => *b,
            Value::Number(n) if *n == 0.0 || *n == 1.0 => *n == 1.0,
            _ => {
                log::error!("Projection flag for '{}' must be 0, 1 or a boolean", path);
                return Err(HaliteError::new(
                    &format!("projection flag for '{}' must be 0, 1 or a boolean", path),
                    ErrorKind::ValidationError,
                ));
            }
        };

        if path == DOC_ID {
            id_flag = Some(include);
            continue;
        }

        match (&mode, include) {
            (None, true) => mode = Some(Mode::Include),
            (None, false) => mode = Some(Mode::Exclude),
            (Some(Mode::Include), false) | (Some(Mode::Exclude), true) => {
                log::error!("Projection cannot mix inclusion and exclusion");
                return Err(HaliteError::new(
                    "projection cannot mix inclusion and exclusion",
                    ErrorKind::ValidationError,
                ));
            }
            _ => {}
        }
        fields.push(split_path(path)?);
    }

    // only _id was flagged: include-only-_id, or identity-minus-_id
    let mode = match mode {
        Some(m) => m,
        None => match id_flag {
            Some(true) => Mode::Include,
            _ => Mode::Exclude,
        },
    };
    let include_id = id_flag.unwrap_or(true);

    Ok(build(mode, fields, include_id))
}

fn build(mode: Mode, fields: Vec<Vec<String>>, include_id: bool) -> Projector {
    match mode {
        Mode::Include => Projector::new(move |doc| {
            let mut out = Document::new();
            if include_id {
                if let Some(id) = doc.get(DOC_ID) {
                    out.data.insert(DOC_ID.to_string(), id.clone());
                }
            }
            for path in &fields {
                include_into(&mut out, doc, path);
            }
            out
        }),
        Mode::Exclude => Projector::new(move |doc| {
            let mut out = doc.clone();
            for path in &fields {
                exclude_from(&mut out, path);
            }
            if !include_id {
                out.data.shift_remove(DOC_ID);
            }
            out
        }),
    }
}

fn split_path(path: &str) -> HaliteResult<Vec<String>> {
    if path.is_empty() || path.split('.').any(|s| s.is_empty()) {
        log::error!("'{}' is not a valid projection path", path);
        return Err(HaliteError::new(
            &format!("'{}' is not a valid projection path", path),
            ErrorKind::ValidationError,
        ));
    }
    Ok(path.split('.').map(|s| s.to_string()).collect())
}

/// Copies the value at `path` from `src` into `out`, rebuilding the
/// intermediate structure. Arrays along the path are projected element-wise
/// over their document elements.
fn include_into(out: &mut Document, src: &Document, path: &[String]) {
    let head = &path[0];
    match src.data.get(head) {
        None => {}
        Some(value) if path.len() == 1 => {
            out.data.insert(head.clone(), value.clone());
        }
        Some(Value::Document(inner)) => {
            let entry = out
                .data
                .entry(head.clone())
                .or_insert_with(|| Value::Document(Document::new()));
            if let Value::Document(out_inner) = entry {
                include_into(out_inner, inner, &path[1..]);
            }
        }
        Some(Value::Array(items)) => {
            let entry = out.data.entry(head.clone()).or_insert_with(|| {
                Value::Array(
                    items
                        .iter()
                        .filter(|item| item.is_document())
                        .map(|_| Value::Document(Document::new()))
                        .collect(),
                )
            });
            if let Value::Array(out_items) = entry {
                let mut slots = out_items.iter_mut();
                for item in items.iter().filter_map(|item| item.as_document()) {
                    if let Some(Value::Document(slot)) = slots.next() {
                        include_into(slot, item, &path[1..]);
                    }
                }
            }
        }
        Some(_) => {}
    }
}

/// Removes the value at `path` from `doc`. Arrays along the path are
/// traversed element-wise over their document elements.
fn exclude_from(doc: &mut Document, path: &[String]) {
    let head = &path[0];
    if path.len() == 1 {
        doc.data.shift_remove(head);
        return;
    }
    match doc.data.get_mut(head) {
        Some(Value::Document(inner)) => exclude_from(inner, &path[1..]),
        Some(Value::Array(items)) => {
            for item in items {
                if let Value::Document(inner) = item {
                    exclude_from(inner, &path[1..]);
                }
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;

    fn set_up() -> Document {
        doc! {
            "_id": "42",
            name: "Alice",
            age: 30,
            address: {
                city: "New York",
                zip: 10001,
            },
            scores: [{ value: 1, weight: 2 }, { value: 3, weight: 4 }],
        }
    }

    #[test]
    fn test_identity() {
        let projector = compile_projection(&Value::Null).unwrap();
        let doc = set_up();
        assert_eq!(projector.project(&doc), doc);

        let projector = compile_projection(&Value::Document(doc! {})).unwrap();
        assert_eq!(projector.project(&doc), doc);
    }

    #[test]
    fn test_inclusion_document() {
        let projector = compile_projection(&Value::Document(doc! { name: 1 })).unwrap();
        let projected = projector.project(&set_up());

        assert_eq!(projected, doc! { "_id": "42", name: "Alice" });
    }

    #[test]
    fn test_inclusion_array_shorthand() {
        let spec = Value::Array(vec![Value::from("name"), Value::from("age")]);
        let projector = compile_projection(&spec).unwrap();
        let projected = projector.project(&set_up());

        assert_eq!(projected, doc! { "_id": "42", name: "Alice", age: 30 });
    }

    #[test]
    fn test_inclusion_excluding_id() {
        let projector =
            compile_projection(&Value::Document(doc! { name: 1, "_id": 0 })).unwrap();
        let projected = projector.project(&set_up());

        assert_eq!(projected, doc! { name: "Alice" });
    }

    #[test]
    fn test_exclusion_document() {
        let projector =
            compile_projection(&Value::Document(doc! { age: 0, address: 0, scores: 0 })).unwrap();
        let projected = projector.project(&set_up());

        assert_eq!(projected, doc! { "_id": "42", name: "Alice" });
    }

    #[test]
    fn test_exclude_only_id() {
        let projector = compile_projection(&Value::Document(doc! { "_id": 0 })).unwrap();
        let projected = projector.project(&doc! { "_id": "42", a: 1 });
        assert_eq!(projected, doc! { a: 1 });
    }

    #[test]
    fn test_include_only_id() {
        let projector = compile_projection(&Value::Document(doc! { "_id": 1 })).unwrap();
        let projected = projector.project(&doc! { "_id": "42", a: 1 });
        assert_eq!(projected, doc! { "_id": "42" });
    }

    #[test]
    fn test_mixed_flags_fail() {
        let result = compile_projection(&Value::Document(doc! { a: 1, b: 0 }));
        assert!(result.is_err());
        assert_eq!(result.err().unwrap().kind(), &ErrorKind::ValidationError);
    }

    #[test]
    fn test_invalid_flag_fails() {
        assert!(compile_projection(&Value::Document(doc! { a: 2 })).is_err());
        assert!(compile_projection(&Value::Document(doc! { a: "yes" })).is_err());
    }

    #[test]
    fn test_nested_inclusion() {
        let projector =
            compile_projection(&Value::Document(doc! { "address.city": 1, "_id": 0 })).unwrap();
        let projected = projector.project(&set_up());

        assert_eq!(projected, doc! { address: { city: "New York" } });
    }

    #[test]
    fn test_nested_exclusion() {
        let projector = compile_projection(&Value::Document(doc! { "address.zip": 0 })).unwrap();
        let projected = projector.project(&set_up());

        assert_eq!(projected.lookup("address.city"), Some(&Value::from("New York")));
        assert!(projected.lookup("address.zip").is_none());
        assert_eq!(projected.get("name"), Some(&Value::from("Alice")));
    }

    #[test]
    fn test_array_elementwise_inclusion() {
        let projector =
            compile_projection(&Value::Document(doc! { "scores.value": 1, "_id": 0 })).unwrap();
        let projected = projector.project(&set_up());

        assert_eq!(
            projected,
            doc! { scores: [{ value: 1 }, { value: 3 }] }
        );
    }

    #[test]
    fn test_array_elementwise_exclusion() {
        let projector =
            compile_projection(&Value::Document(doc! { "scores.weight": 0 })).unwrap();
        let projected = projector.project(&set_up());

        assert_eq!(
            projected.lookup("scores"),
            Some(&Value::Array(vec![
                Value::Document(doc! { value: 1 }),
                Value::Document(doc! { value: 3 }),
            ]))
        );
    }

    #[test]
    fn test_multiple_paths_through_same_array_merge() {
        let spec = Value::Document(doc! { "scores.value": 1, "scores.weight": 1, "_id": 0 });
        let projector = compile_projection(&spec).unwrap();
        let projected = projector.project(&set_up());

        assert_eq!(
            projected,
            doc! { scores: [{ value: 1, weight: 2 }, { value: 3, weight: 4 }] }
        );
    }

    #[test]
    fn test_missing_paths_are_ignored() {
        let projector =
            compile_projection(&Value::Document(doc! { nope: 1, "_id": 0 })).unwrap();
        let projected = projector.project(&set_up());
        assert!(projected.is_empty());
    }

    #[test]
    fn test_projection_is_pure() {
        let projector = compile_projection(&Value::Document(doc! { name: 1 })).unwrap();
        let doc = set_up();
        let first = projector.project(&doc);
        let second = projector.project(&doc);
        assert_eq!(first, second);
        // source untouched
        assert_eq!(doc.get("age"), Some(&Value::from(30)));
    }
}
