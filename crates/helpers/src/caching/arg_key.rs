use std::any::Any;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// A single argument of an [`ArgsMap`](super::ArgsMap) key.
///
/// Primitive values compare by value, and shared references compare by identity: two
/// [`ArgKey::by_ref`] keys are only equal if they point to the same allocation, even if the
/// pointees are structurally equal.
///
/// Floats follow "same value zero" semantics: `-0.0` equals `0.0`, and all `NaN`s are equal.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ArgKey {
    Unit,
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(FloatKey),
    Char(char),
    Str(Arc<str>),
    Ref(RefKey),
}

impl ArgKey {
    /// Creates a key that compares by the identity of `value`.
    ///
    /// The key holds on to `value`, so its address cannot be reused by another allocation
    /// while the key is alive.
    pub fn by_ref<T: Any + Send + Sync>(value: Arc<T>) -> Self {
        ArgKey::Ref(RefKey(value))
    }
}

/// The bit pattern of a float, normalized so that `-0.0` and `0.0`, as well as all `NaN`s,
/// map to the same key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FloatKey(u64);

impl FloatKey {
    pub fn new(value: f64) -> Self {
        let bits = if value == 0.0 {
            0.0f64.to_bits()
        } else if value.is_nan() {
            f64::NAN.to_bits()
        } else {
            value.to_bits()
        };
        Self(bits)
    }

    pub fn value(self) -> f64 {
        f64::from_bits(self.0)
    }
}

/// A shared reference compared by pointer identity.
#[derive(Clone)]
pub struct RefKey(Arc<dyn Any + Send + Sync>);

impl RefKey {
    fn addr(&self) -> *const () {
        Arc::as_ptr(&self.0) as *const ()
    }

    /// Returns the referenced value if it is of type `T`.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.downcast_ref()
    }
}

impl PartialEq for RefKey {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.addr(), other.addr())
    }
}

impl Eq for RefKey {}

impl Hash for RefKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.addr().hash(state)
    }
}

impl fmt::Debug for RefKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RefKey({:p})", self.addr())
    }
}

macro_rules! impl_from {
    ($variant:ident($target:ty): $($source:ty),+) => {
        $(
            impl From<$source> for ArgKey {
                fn from(value: $source) -> Self {
                    ArgKey::$variant(<$target>::from(value))
                }
            }
        )+
    };
}

impl_from!(Int(i64): i8, i16, i32, i64);
impl_from!(Uint(u64): u8, u16, u32, u64);
impl_from!(Str(Arc<str>): &str, String, Box<str>);

impl From<()> for ArgKey {
    fn from(_: ()) -> Self {
        ArgKey::Unit
    }
}

impl From<bool> for ArgKey {
    fn from(value: bool) -> Self {
        ArgKey::Bool(value)
    }
}

impl From<char> for ArgKey {
    fn from(value: char) -> Self {
        ArgKey::Char(value)
    }
}

impl From<f32> for ArgKey {
    fn from(value: f32) -> Self {
        ArgKey::Float(FloatKey::new(value.into()))
    }
}

impl From<f64> for ArgKey {
    fn from(value: f64) -> Self {
        ArgKey::Float(FloatKey::new(value))
    }
}

impl From<usize> for ArgKey {
    fn from(value: usize) -> Self {
        ArgKey::Uint(value as u64)
    }
}

impl From<Arc<str>> for ArgKey {
    fn from(value: Arc<str>) -> Self {
        ArgKey::Str(value)
    }
}

/// Builds a `Vec<ArgKey>` out of a list of values convertible into [`ArgKey`].
///
/// ```
/// use helpers::{ArgKey, args};
///
/// let key = args![1u32, "two", 3.0];
/// assert_eq!(key, vec![ArgKey::from(1u32), ArgKey::from("two"), ArgKey::from(3.0)]);
/// ```
#[macro_export]
macro_rules! args {
    ($($arg:expr),* $(,)?) => {
        vec![$($crate::caching::ArgKey::from($arg)),*]
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_float_normalization() {
        assert_eq!(ArgKey::from(0.0), ArgKey::from(-0.0));
        assert_eq!(ArgKey::from(f64::NAN), ArgKey::from(-f64::NAN));
        assert_ne!(ArgKey::from(1.0), ArgKey::from(1.0 + f64::EPSILON));
        assert_eq!(FloatKey::new(2.5).value(), 2.5);
    }

    #[test]
    fn test_ints_and_uints_differ() {
        assert_ne!(ArgKey::from(1i32), ArgKey::from(1u32));
        assert_eq!(ArgKey::from(1i8), ArgKey::from(1i64));
        assert_eq!(ArgKey::from(1usize), ArgKey::from(1u64));
    }

    #[test]
    fn test_ref_identity() {
        let a = Arc::new(String::from("a"));
        let b = Arc::new(String::from("a"));

        assert_eq!(ArgKey::by_ref(a.clone()), ArgKey::by_ref(a.clone()));
        assert_ne!(ArgKey::by_ref(a.clone()), ArgKey::by_ref(b));

        let ArgKey::Ref(key) = ArgKey::by_ref(a) else {
            unreachable!()
        };
        assert_eq!(key.downcast_ref::<String>().map(String::as_str), Some("a"));
        assert_eq!(key.downcast_ref::<u32>(), None);
    }

    #[test]
    fn test_strings() {
        assert_eq!(ArgKey::from("a"), ArgKey::from(String::from("a")));
        assert_eq!(args!["a", 1u8], vec![ArgKey::from("a"), ArgKey::Uint(1)]);
    }
}
