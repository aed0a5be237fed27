use crate::collection::{Document, ObjectId};
use crate::common::path::lookup_path;
use crate::common::Value;
use crate::errors::{ErrorKind, HaliteError, HaliteResult};
use regex::Regex;
use std::cmp::Ordering;
use std::fmt::{Debug, Display};
use std::sync::Arc;

/// Predicate on a resolved field value; [None] means the path is absent.
type Clause = Box<dyn Fn(Option<&Value>) -> bool + Send + Sync>;

/// Predicate on a whole document.
type DocClause = Box<dyn Fn(&Document) -> bool + Send + Sync>;

/// A compiled selector: a pure function from a document to a boolean.
///
/// Matchers are produced once by [compile_selector] and shared by cheap
/// clones; evaluation never recompiles and has no side effects, so the same
/// matcher returns the same answer for the same document across calls.
#[derive(Clone)]
pub struct Matcher {
    inner: Arc<dyn Fn(&Document) -> bool + Send + Sync>,
}

impl Matcher {
    fn new(f: impl Fn(&Document) -> bool + Send + Sync + 'static) -> Self {
        Matcher { inner: Arc::new(f) }
    }

    /// A matcher that accepts every document.
    pub fn match_all() -> Self {
        Matcher::new(|_| true)
    }

    /// Evaluates this matcher against a document.
    #[inline]
    pub fn matches(&self, doc: &Document) -> bool {
        (self.inner)(doc)
    }
}

impl Debug for Matcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Matcher")
    }
}

impl Display for Matcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Matcher")
    }
}

/// The accepted selector inputs.
///
/// A selector is either absent (match everything), a [Value] — an
/// identifier, string or number as shorthand for `{_id: <v>}`, or a
/// predicate document — or an already compiled [Matcher], which passes
/// through unchanged.
#[derive(Debug, Clone, Default)]
pub enum Selector {
    /// Matches every document.
    #[default]
    All,
    /// A shorthand value or predicate document.
    Value(Value),
    /// An already compiled matcher.
    Compiled(Matcher),
}

impl Selector {
    /// The raw selector value, for event payloads. Compiled matchers have
    /// no document form and report [Value::Null].
    pub fn to_value(&self) -> Value {
        match self {
            Selector::All => Value::Null,
            Selector::Value(v) => v.clone(),
            Selector::Compiled(_) => Value::Null,
        }
    }
}

impl From<Value> for Selector {
    fn from(v: Value) -> Self {
        Selector::Value(v)
    }
}

impl From<Document> for Selector {
    fn from(doc: Document) -> Self {
        Selector::Value(Value::Document(doc))
    }
}

impl From<ObjectId> for Selector {
    fn from(id: ObjectId) -> Self {
        Selector::Value(Value::Id(id))
    }
}

impl From<&str> for Selector {
    fn from(s: &str) -> Self {
        Selector::Value(Value::String(s.to_string()))
    }
}

impl From<String> for Selector {
    fn from(s: String) -> Self {
        Selector::Value(Value::String(s))
    }
}

impl From<f64> for Selector {
    fn from(n: f64) -> Self {
        Selector::Value(Value::Number(n))
    }
}

impl From<i64> for Selector {
    fn from(n: i64) -> Self {
        Selector::Value(Value::Number(n as f64))
    }
}

impl From<i32> for Selector {
    fn from(n: i32) -> Self {
        Selector::Value(Value::Number(n as f64))
    }
}

impl From<Matcher> for Selector {
    fn from(matcher: Matcher) -> Self {
        Selector::Compiled(matcher)
    }
}

/// Compiles a selector into a [Matcher].
///
/// Identifier, string and number selectors are shorthand for
/// `{_id: <value>}`; a predicate document compiles to the conjunction of
/// its clauses; an already compiled matcher is returned as-is.
pub fn compile_selector(selector: &Selector) -> HaliteResult<Matcher> {
    match selector {
        Selector::All => Ok(Matcher::match_all()),
        Selector::Compiled(matcher) => Ok(matcher.clone()),
        Selector::Value(value) => match value {
            Value::Null => Ok(Matcher::match_all()),
            Value::Id(_) | Value::String(_) | Value::Number(_) => {
                let clause = id_literal_clause(value);
                Ok(Matcher::new(move |doc| clause(lookup_path(doc, "_id"))))
            }
            Value::Document(predicate) => compile_predicate(predicate),
            other => {
                log::error!("Unsupported selector value {:?}", other);
                Err(HaliteError::new(
                    &format!("'{}' cannot be used as a selector", other.type_name()),
                    ErrorKind::ValidationError,
                ))
            }
        },
    }
}

/// Compiles a predicate document: a conjunction of clauses keyed by either
/// a field-path or a top-level logical operator.
pub fn compile_predicate(predicate: &Document) -> HaliteResult<Matcher> {
    let mut clauses: Vec<DocClause> = Vec::new();

    for (key, value) in predicate.iter() {
        if key.starts_with('$') {
            clauses.push(compile_logical_clause(key, value)?);
        } else {
            let clause = compile_field_clause(key, value)?;
            let path = key.clone();
            clauses.push(Box::new(move |doc| clause(lookup_path(doc, &path))));
        }
    }

    Ok(Matcher::new(move |doc| clauses.iter().all(|c| c(doc))))
}

fn compile_logical_clause(operator: &str, value: &Value) -> HaliteResult<DocClause> {
    match operator {
        "$and" | "$or" | "$nor" => {
            let members = value.as_array().ok_or_else(|| {
                log::error!("'{}' requires an array of predicate documents", operator);
                HaliteError::new(
                    &format!("'{}' requires an array of predicate documents", operator),
                    ErrorKind::ValidationError,
                )
            })?;

            let mut matchers = Vec::with_capacity(members.len());
            for member in members {
                let predicate = member.as_document().ok_or_else(|| {
                    HaliteError::new(
                        &format!("'{}' accepts only predicate documents", operator),
                        ErrorKind::ValidationError,
                    )
                })?;
                matchers.push(compile_predicate(predicate)?);
            }

            Ok(match operator {
                "$and" => Box::new(move |doc| matchers.iter().all(|m| m.matches(doc))),
                "$or" => Box::new(move |doc| matchers.iter().any(|m| m.matches(doc))),
                _ => Box::new(move |doc| !matchers.iter().any(|m| m.matches(doc))),
            })
        }
        "$where" => {
            log::error!("'$where' selectors are not supported");
            Err(HaliteError::new(
                "'$where' selectors are not supported",
                ErrorKind::Unsupported,
            ))
        }
        _ => {
            log::error!("Unknown top-level operator '{}'", operator);
            Err(HaliteError::new(
                &format!("unknown top-level operator '{}'", operator),
                ErrorKind::ValidationError,
            ))
        }
    }
}

fn compile_field_clause(path: &str, value: &Value) -> HaliteResult<Clause> {
    if let Value::Document(sub) = value {
        if !sub.is_empty() && sub.keys().all(|k| k.starts_with('$')) {
            return compile_operator_set(sub);
        }
    }

    // literal clause: deep-equal with array-contains semantics
    if path == "_id" {
        return Ok(id_literal_clause(value));
    }
    let literal = value.clone();
    Ok(Box::new(move |v| literal_match(v, &literal)))
}

/// `_id` literals follow the same normalization as insert: numbers become
/// their digit string, and a string literal also matches its digit-stripped
/// form so callers can query with the value they originally supplied.
fn id_literal_clause(value: &Value) -> Clause {
    let mut candidates = vec![value.clone()];
    match value {
        Value::Number(n) => {
            candidates = vec![Value::String(strip_non_digits(&format!("{}", n)))];
        }
        Value::String(s) => {
            let stripped = strip_non_digits(s);
            if !stripped.is_empty() && stripped != *s {
                candidates.push(Value::String(stripped));
            }
        }
        _ => {}
    }
    Box::new(move |v| candidates.iter().any(|c| literal_match(v, c)))
}

fn strip_non_digits(s: &str) -> String {
    s.chars().filter(|c| c.is_ascii_digit()).collect()
}

fn compile_operator_set(operators: &Document) -> HaliteResult<Clause> {
    let mut clauses: Vec<Clause> = Vec::new();

    let regex_options = match operators.get("$options") {
        None => String::new(),
        Some(Value::String(s)) => {
            if !operators.contains_key("$regex") {
                log::error!("'$options' given without '$regex'");
                return Err(HaliteError::new(
                    "'$options' is only valid together with '$regex'",
                    ErrorKind::ValidationError,
                ));
            }
            s.clone()
        }
        Some(_) => {
            log::error!("'$options' requires a string argument");
            return Err(HaliteError::new(
                "'$options' requires a string argument",
                ErrorKind::ValidationError,
            ));
        }
    };

    for (operator, argument) in operators.iter() {
        match operator.as_str() {
            "$options" => continue,
            "$eq" => {
                let literal = argument.clone();
                clauses.push(Box::new(move |v| literal_match(v, &literal)));
            }
            "$ne" => {
                let literal = argument.clone();
                clauses.push(Box::new(move |v| !literal_match(v, &literal)));
            }
            "$gt" => clauses.push(ordering_clause(argument, |o| o == Ordering::Greater)),
            "$gte" => clauses.push(ordering_clause(argument, |o| o != Ordering::Less)),
            "$lt" => clauses.push(ordering_clause(argument, |o| o == Ordering::Less)),
            "$lte" => clauses.push(ordering_clause(argument, |o| o != Ordering::Greater)),
            "$in" => {
                let list = membership_list(operator, argument)?;
                clauses.push(Box::new(move |v| membership(v, &list)));
            }
            "$nin" => {
                let list = membership_list(operator, argument)?;
                clauses.push(Box::new(move |v| !membership(v, &list)));
            }
            "$all" => {
                let required = membership_list(operator, argument)?;
                clauses.push(Box::new(move |v| match v {
                    Some(Value::Array(items)) => required
                        .iter()
                        .all(|needed| items.iter().any(|item| item == needed)),
                    _ => false,
                }));
            }
            "$exists" => {
                let want = argument.is_truthy();
                clauses.push(Box::new(move |v| v.is_some() == want));
            }
            "$type" => {
                let name = argument
                    .as_str()
                    .ok_or_else(|| {
                        log::error!("'$type' requires a type name string");
                        HaliteError::new(
                            "'$type' requires a type name string",
                            ErrorKind::ValidationError,
                        )
                    })?
                    .to_string();
                clauses.push(Box::new(move |v| {
                    v.map(|value| value.type_name() == name).unwrap_or(false)
                }));
            }
            "$mod" => {
                let (divisor, remainder) = mod_arguments(argument)?;
                clauses.push(Box::new(move |v| match v.and_then(|x| x.as_number()) {
                    Some(n) => (n as i64) % divisor == remainder,
                    None => false,
                }));
            }
            "$size" => {
                let len = argument
                    .as_number()
                    .filter(|n| n.fract() == 0.0 && *n >= 0.0)
                    .ok_or_else(|| {
                        log::error!("'$size' requires a non-negative integer");
                        HaliteError::new(
                            "'$size' requires a non-negative integer",
                            ErrorKind::ValidationError,
                        )
                    })? as usize;
                clauses.push(Box::new(move |v| match v {
                    Some(Value::Array(items)) => items.len() == len,
                    _ => false,
                }));
            }
            "$regex" => {
                let regex = compile_regex(argument, &regex_options)?;
                clauses.push(Box::new(move |v| match v {
                    Some(Value::String(s)) => regex.is_match(s),
                    _ => false,
                }));
            }
            "$elemMatch" => {
                let predicate = argument.as_document().ok_or_else(|| {
                    log::error!("'$elemMatch' requires a predicate document");
                    HaliteError::new(
                        "'$elemMatch' requires a predicate document",
                        ErrorKind::ValidationError,
                    )
                })?;
                let sub_matcher = compile_predicate(predicate)?;
                clauses.push(Box::new(move |v| match v {
                    Some(Value::Array(items)) => items.iter().any(|item| {
                        item.as_document()
                            .map(|doc| sub_matcher.matches(doc))
                            .unwrap_or(false)
                    }),
                    _ => false,
                }));
            }
            "$not" => {
                let sub = argument.as_document().ok_or_else(|| {
                    log::error!("'$not' requires an operator document");
                    HaliteError::new(
                        "'$not' requires an operator document",
                        ErrorKind::ValidationError,
                    )
                })?;
                if sub.is_empty() || !sub.keys().all(|k| k.starts_with('$')) {
                    log::error!("'$not' requires an operator document");
                    return Err(HaliteError::new(
                        "'$not' requires an operator document",
                        ErrorKind::ValidationError,
                    ));
                }
                let inner = compile_operator_set(sub)?;
                clauses.push(Box::new(move |v| !inner(v)));
            }
            "$where" => {
                log::error!("'$where' selectors are not supported");
                return Err(HaliteError::new(
                    "'$where' selectors are not supported",
                    ErrorKind::Unsupported,
                ));
            }
            other => {
                log::error!("Unknown operator '{}'", other);
                return Err(HaliteError::new(
                    &format!("unknown operator '{}'", other),
                    ErrorKind::ValidationError,
                ));
            }
        }
    }

    Ok(Box::new(move |v| clauses.iter().all(|c| c(v))))
}

/// Deep-equal comparison with array-contains semantics: an array field
/// matches when it equals the literal or when any element does. A missing
/// field matches only a null literal.
fn literal_match(field: Option<&Value>, literal: &Value) -> bool {
    match field {
        None => literal.is_null(),
        Some(value) => {
            if value == literal {
                return true;
            }
            match value {
                Value::Array(items) => items.iter().any(|item| item == literal),
                _ => false,
            }
        }
    }
}

fn ordering_clause(argument: &Value, accept: fn(Ordering) -> bool) -> Clause {
    let literal = argument.clone();
    Box::new(move |v| match v {
        Some(value) => accept(value.compare(&literal)),
        None => false,
    })
}

fn membership_list(operator: &str, argument: &Value) -> HaliteResult<Vec<Value>> {
    argument.as_array().cloned().ok_or_else(|| {
        log::error!("'{}' requires an array argument", operator);
        HaliteError::new(
            &format!("'{}' requires an array argument", operator),
            ErrorKind::ValidationError,
        )
    })
}

/// Membership against a list: the field value equals a listed value, or an
/// array field contains one. A missing field is a member only when the list
/// contains null.
fn membership(field: Option<&Value>, list: &[Value]) -> bool {
    match field {
        None => list.iter().any(|e| e.is_null()),
        Some(value) => {
            if list.iter().any(|e| e == value) {
                return true;
            }
            match value {
                Value::Array(items) => items
                    .iter()
                    .any(|item| list.iter().any(|e| e == item)),
                _ => false,
            }
        }
    }
}

fn mod_arguments(argument: &Value) -> HaliteResult<(i64, i64)> {
    let invalid = || {
        log::error!("'$mod' requires a [divisor, remainder] array");
        HaliteError::new(
            "'$mod' requires a [divisor, remainder] array of two numbers",
            ErrorKind::ValidationError,
        )
    };

    let pair = argument.as_array().ok_or_else(invalid)?;
    if pair.len() != 2 {
        return Err(invalid());
    }
    let divisor = pair[0].as_number().ok_or_else(invalid)? as i64;
    let remainder = pair[1].as_number().ok_or_else(invalid)? as i64;
    if divisor == 0 {
        log::error!("'$mod' divisor cannot be zero");
        return Err(HaliteError::new(
            "'$mod' divisor cannot be zero",
            ErrorKind::ValidationError,
        ));
    }
    Ok((divisor, remainder))
}

fn compile_regex(argument: &Value, options: &str) -> HaliteResult<Regex> {
    let pattern = argument.as_str().ok_or_else(|| {
        log::error!("'$regex' requires a pattern string");
        HaliteError::new(
            "'$regex' requires a pattern string",
            ErrorKind::ValidationError,
        )
    })?;

    if let Some(bad) = options.chars().find(|c| !"imsx".contains(*c)) {
        log::error!("Unsupported regex option '{}'", bad);
        return Err(HaliteError::new(
            &format!("unsupported regex option '{}'", bad),
            ErrorKind::ValidationError,
        ));
    }

    let full_pattern = if options.is_empty() {
        pattern.to_string()
    } else {
        format!("(?{}){}", options, pattern)
    };

    Regex::new(&full_pattern).map_err(|e| {
        log::error!("Invalid regex pattern '{}': {}", pattern, e);
        HaliteError::new(
            &format!("invalid regex pattern '{}'", pattern),
            ErrorKind::ValidationError,
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;

    fn matcher_for(predicate: Document) -> Matcher {
        compile_selector(&Selector::from(predicate)).unwrap()
    }

    #[test]
    fn test_match_all() {
        let matcher = compile_selector(&Selector::All).unwrap();
        assert!(matcher.matches(&doc! {}));
        assert!(matcher.matches(&doc! { a: 1 }));
    }

    #[test]
    fn test_literal_clause() {
        let matcher = matcher_for(doc! { a: 1 });
        assert!(matcher.matches(&doc! { a: 1, b: 2 }));
        assert!(!matcher.matches(&doc! { a: 2 }));
        assert!(!matcher.matches(&doc! { b: 1 }));
    }

    #[test]
    fn test_literal_matches_nested_path() {
        let matcher = matcher_for(doc! { "a.b": 5 });
        assert!(matcher.matches(&doc! { a: { b: 5 } }));
        assert!(!matcher.matches(&doc! { a: { b: 6 } }));
    }

    #[test]
    fn test_array_contains_semantics() {
        let matcher = matcher_for(doc! { a: 2 });
        assert!(matcher.matches(&doc! { a: [1, 2, 3] }));
        assert!(!matcher.matches(&doc! { a: [4, 5] }));

        // whole-array equality also matches
        let matcher = matcher_for(doc! { a: [1, 2] });
        assert!(matcher.matches(&doc! { a: [1, 2] }));
    }

    #[test]
    fn test_missing_field_matches_null_literal() {
        let matcher = matcher_for(doc! { a: null });
        assert!(matcher.matches(&doc! { b: 1 }));
        assert!(matcher.matches(&doc! { a: null }));
        assert!(!matcher.matches(&doc! { a: 1 }));
    }

    #[test]
    fn test_id_shorthand() {
        let id = ObjectId::new();
        let matcher = compile_selector(&Selector::from(id)).unwrap();
        let mut doc = doc! { name: "x" };
        doc.set("_id", id).unwrap();
        assert!(matcher.matches(&doc));
        assert!(!matcher.matches(&doc! { name: "x" }));
    }

    #[test]
    fn test_number_shorthand_matches_normalized_id() {
        // insert normalizes a numeric _id to its digit string
        let matcher = compile_selector(&Selector::from(7)).unwrap();
        assert!(matcher.matches(&doc! { "_id": "7" }));
    }

    #[test]
    fn test_string_shorthand_matches_hex_id() {
        let id = ObjectId::new();
        let matcher = compile_selector(&Selector::from(id.to_hex().as_str())).unwrap();
        let mut doc = doc! {};
        doc.set("_id", id).unwrap();
        assert!(matcher.matches(&doc));
    }

    #[test]
    fn test_comparison_operators() {
        let matcher = matcher_for(doc! { a: { "$gt": 1 } });
        assert!(matcher.matches(&doc! { a: 2 }));
        assert!(!matcher.matches(&doc! { a: 1 }));
        assert!(!matcher.matches(&doc! { b: 5 }));

        let matcher = matcher_for(doc! { a: { "$gte": 1, "$lt": 3 } });
        assert!(matcher.matches(&doc! { a: 1 }));
        assert!(matcher.matches(&doc! { a: 2 }));
        assert!(!matcher.matches(&doc! { a: 3 }));
    }

    #[test]
    fn test_comparison_uses_type_ranking() {
        // numbers sort before strings
        let matcher = matcher_for(doc! { a: { "$lt": "x" } });
        assert!(matcher.matches(&doc! { a: 99 }));

        let matcher = matcher_for(doc! { a: { "$gt": 99 } });
        assert!(matcher.matches(&doc! { a: "x" }));
    }

    #[test]
    fn test_ne() {
        let matcher = matcher_for(doc! { a: { "$ne": 1 } });
        assert!(!matcher.matches(&doc! { a: 1 }));
        assert!(matcher.matches(&doc! { a: 2 }));
        assert!(matcher.matches(&doc! { b: 1 }));
    }

    #[test]
    fn test_in_nin() {
        let matcher = matcher_for(doc! { a: { "$in": [1, 2] } });
        assert!(matcher.matches(&doc! { a: 1 }));
        assert!(!matcher.matches(&doc! { a: 3 }));
        assert!(matcher.matches(&doc! { a: [3, 2] }));

        let matcher = matcher_for(doc! { a: { "$nin": [1, 2] } });
        assert!(!matcher.matches(&doc! { a: 1 }));
        assert!(matcher.matches(&doc! { a: 3 }));
    }

    #[test]
    fn test_in_requires_array() {
        let result = compile_predicate(&doc! { a: { "$in": 1 } });
        assert!(result.is_err());
    }

    #[test]
    fn test_all() {
        let matcher = matcher_for(doc! { a: { "$all": [2, 3] } });
        assert!(matcher.matches(&doc! { a: [1, 2, 3] }));
        assert!(!matcher.matches(&doc! { a: [1, 2] }));
        assert!(!matcher.matches(&doc! { a: 2 }));
    }

    #[test]
    fn test_exists() {
        let matcher = matcher_for(doc! { a: { "$exists": true } });
        assert!(matcher.matches(&doc! { a: null }));
        assert!(!matcher.matches(&doc! { b: 1 }));

        let matcher = matcher_for(doc! { a: { "$exists": false } });
        assert!(!matcher.matches(&doc! { a: 1 }));
        assert!(matcher.matches(&doc! { b: 1 }));
    }

    #[test]
    fn test_type() {
        let matcher = matcher_for(doc! { a: { "$type": "string" } });
        assert!(matcher.matches(&doc! { a: "x" }));
        assert!(!matcher.matches(&doc! { a: 1 }));

        let matcher = matcher_for(doc! { a: { "$type": "array" } });
        assert!(matcher.matches(&doc! { a: [1] }));
    }

    #[test]
    fn test_mod() {
        let matcher = matcher_for(doc! { a: { "$mod": [4, 1] } });
        assert!(matcher.matches(&doc! { a: 5 }));
        assert!(!matcher.matches(&doc! { a: 4 }));
        assert!(!matcher.matches(&doc! { a: "x" }));
    }

    #[test]
    fn test_mod_rejects_zero_divisor() {
        assert!(compile_predicate(&doc! { a: { "$mod": [0, 1] } }).is_err());
    }

    #[test]
    fn test_size() {
        let matcher = matcher_for(doc! { a: { "$size": 3 } });
        assert!(matcher.matches(&doc! { a: [1, 2, 3] }));
        assert!(!matcher.matches(&doc! { a: [1, 2] }));
        assert!(!matcher.matches(&doc! { a: 3 }));
    }

    #[test]
    fn test_regex() {
        let matcher = matcher_for(doc! { a: { "$regex": "^he.*o$" } });
        assert!(matcher.matches(&doc! { a: "hello" }));
        assert!(!matcher.matches(&doc! { a: "world" }));
        assert!(!matcher.matches(&doc! { a: 5 }));
    }

    #[test]
    fn test_regex_with_options() {
        let matcher = matcher_for(doc! { a: { "$regex": "^hello$", "$options": "i" } });
        assert!(matcher.matches(&doc! { a: "HELLO" }));
    }

    #[test]
    fn test_options_without_regex_fails() {
        assert!(compile_predicate(&doc! { a: { "$options": "i" } }).is_err());
    }

    #[test]
    fn test_invalid_regex_fails_compilation() {
        assert!(compile_predicate(&doc! { a: { "$regex": "(" } }).is_err());
    }

    #[test]
    fn test_elem_match() {
        let matcher = matcher_for(doc! { a: { "$elemMatch": { b: { "$gt": 1 } } } });
        assert!(matcher.matches(&doc! { a: [{ b: 0 }, { b: 2 }] }));
        assert!(!matcher.matches(&doc! { a: [{ b: 0 }, { b: 1 }] }));
        assert!(!matcher.matches(&doc! { a: 1 }));
    }

    #[test]
    fn test_not() {
        let matcher = matcher_for(doc! { a: { "$not": { "$gt": 5 } } });
        assert!(matcher.matches(&doc! { a: 3 }));
        assert!(!matcher.matches(&doc! { a: 7 }));
        // negation also accepts a missing field
        assert!(matcher.matches(&doc! { b: 1 }));
    }

    #[test]
    fn test_not_requires_operator_document() {
        assert!(compile_predicate(&doc! { a: { "$not": 5 } }).is_err());
        assert!(compile_predicate(&doc! { a: { "$not": { b: 1 } } }).is_err());
    }

    #[test]
    fn test_logical_operators() {
        let matcher = matcher_for(doc! { "$and": [{ a: { "$gt": 1 } }, { b: "x" }] });
        assert!(matcher.matches(&doc! { a: 2, b: "x" }));
        assert!(!matcher.matches(&doc! { a: 2, b: "y" }));

        let matcher = matcher_for(doc! { "$or": [{ a: 1 }, { b: 2 }] });
        assert!(matcher.matches(&doc! { a: 1 }));
        assert!(matcher.matches(&doc! { b: 2 }));
        assert!(!matcher.matches(&doc! { a: 2, b: 1 }));

        let matcher = matcher_for(doc! { "$nor": [{ a: 1 }, { b: 2 }] });
        assert!(!matcher.matches(&doc! { a: 1 }));
        assert!(matcher.matches(&doc! { a: 2, b: 1 }));
    }

    #[test]
    fn test_where_is_unsupported() {
        let result = compile_predicate(&doc! { "$where": "this.a == 1" });
        assert!(result.is_err());
        assert_eq!(result.err().unwrap().kind(), &ErrorKind::Unsupported);
    }

    #[test]
    fn test_unknown_operator_fails() {
        let result = compile_predicate(&doc! { a: { "$frobnicate": 1 } });
        assert!(result.is_err());
        assert_eq!(result.err().unwrap().kind(), &ErrorKind::ValidationError);
    }

    #[test]
    fn test_non_operator_sub_document_is_literal() {
        // keys not all $-prefixed: the sub-document is a literal
        let matcher = matcher_for(doc! { a: { b: 1 } });
        assert!(matcher.matches(&doc! { a: { b: 1 } }));
        assert!(!matcher.matches(&doc! { a: { b: 2 } }));
    }

    #[test]
    fn test_compile_once_determinism() {
        let matcher = matcher_for(doc! { a: { "$gt": 1 } });
        let doc = doc! { a: 2 };
        for _ in 0..3 {
            assert!(matcher.matches(&doc));
        }
        let clone = matcher.clone();
        assert!(clone.matches(&doc));
    }

    #[test]
    fn test_precompiled_matcher_passthrough() {
        let matcher = matcher_for(doc! { a: 1 });
        let recompiled = compile_selector(&Selector::from(matcher.clone())).unwrap();
        assert!(recompiled.matches(&doc! { a: 1 }));
        assert!(!recompiled.matches(&doc! { a: 2 }));
    }
}
