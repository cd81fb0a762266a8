//! Dynamic Values
//!
//! Props, hook state and dependency arrays all carry dynamically typed values.
//! `Value` is the small closed set of shapes the runtime needs to compare and
//! pass around without knowing anything about application types.
//!
//! # Identity
//!
//! Comparisons follow `Object.is` semantics rather than structural equality:
//!
//! - `NaN` is the same as `NaN`
//! - `+0` is *not* the same as `-0`
//! - objects are the same only when they are the same allocation
//!
//! This is what makes state bail-outs and dependency arrays cheap: deciding
//! whether something changed never walks into the value.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

/// A dynamically typed value.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Str(Rc<str>),
    /// Any application object, compared by pointer identity.
    Object(Rc<dyn Any>),
}

impl Value {
    /// Wrap an arbitrary value as an object.
    pub fn object<T: Any>(value: T) -> Self {
        Value::Object(Rc::new(value))
    }

    /// `Object.is`.
    pub fn is_same(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) => true,
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => {
                if a.is_nan() && b.is_nan() {
                    true
                } else {
                    a == b && a.is_sign_negative() == b.is_sign_negative()
                }
            }
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// `null` or `undefined`.
    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Borrow the wrapped object as `T`, if this is an object of that type.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            Value::Object(obj) => obj.downcast_ref::<T>(),
            _ => None,
        }
    }
}

/// Compare two dependency arrays.
///
/// Returns `true` when both are present, have the same length, and every
/// pair is the same under [`Value::is_same`]. A missing array never matches.
pub fn deps_equal(prev: Option<&[Value]>, next: Option<&[Value]>) -> bool {
    match (prev, next) {
        (Some(prev), Some(next)) => {
            prev.len() == next.len() && prev.iter().zip(next).all(|(a, b)| a.is_same(b))
        }
        _ => false,
    }
}

/// Equality is identity.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.is_same(other)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("undefined"),
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => write!(f, "{}", format_number(*n)),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Object(obj) => write!(f, "[object {:p}]", Rc::as_ptr(obj)),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => f.write_str(s),
            other => write!(f, "{other:?}"),
        }
    }
}

/// Render a number the way it would appear as text content.
pub(crate) fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        let text = if n > 0.0 { "Infinity" } else { "-Infinity" };
        text.to_string()
    } else if n == n.trunc() && n.abs() < 1e21 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n.into())
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Number(n.into())
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(Rc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(Rc::from(s))
    }
}

impl From<Rc<str>> for Value {
    fn from(s: Rc<str>) -> Self {
        Value::Str(s)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nan_is_same_as_nan() {
        assert!(Value::Number(f64::NAN).is_same(&Value::Number(f64::NAN)));
    }

    #[test]
    fn signed_zeroes_differ() {
        assert!(!Value::Number(0.0).is_same(&Value::Number(-0.0)));
        assert!(Value::Number(-0.0).is_same(&Value::Number(-0.0)));
    }

    #[test]
    fn objects_compare_by_pointer() {
        let a = Value::object(vec![1, 2, 3]);
        let b = Value::object(vec![1, 2, 3]);
        assert!(a.is_same(&a.clone()));
        assert!(!a.is_same(&b));
    }

    #[test]
    fn strings_compare_by_content() {
        assert!(Value::from("a").is_same(&Value::from(String::from("a"))));
        assert!(!Value::from("a").is_same(&Value::from("b")));
    }

    #[test]
    fn deps_equal_requires_both_arrays() {
        let deps = [Value::from(1), Value::from("x")];
        assert!(deps_equal(Some(&deps), Some(&deps.clone())));
        assert!(!deps_equal(None, Some(&deps)));
        assert!(!deps_equal(None, None));
        assert!(!deps_equal(Some(&deps[..1]), Some(&deps)));
    }

    #[test]
    fn numbers_format_like_text_content() {
        assert_eq!(format_number(3.0), "3");
        assert_eq!(format_number(1.5), "1.5");
        assert_eq!(format_number(f64::NAN), "NaN");
    }

    #[test]
    fn downcast_ref_finds_wrapped_type() {
        let v = Value::object(42u8);
        assert_eq!(v.downcast_ref::<u8>(), Some(&42));
        assert!(v.downcast_ref::<u16>().is_none());
    }
}
