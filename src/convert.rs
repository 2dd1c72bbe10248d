use std::{
    any::Any,
    collections::HashMap,
    error::Error,
    fmt,
    str::FromStr,
    sync::Arc,
};

use facet_core::{ConstTypeId, Facet, Shape};
use facet_reflect::{Partial, Peek};

use crate::{
    error::{ConvertError, FormError, FormErrorKind},
    kind::unwrap_once,
};

/// A type-erased value produced by a converter, waiting to be written into
/// the destination.
pub struct Converted {
    shape: &'static Shape,
    value: Box<dyn Any>,
    install: fn(Box<dyn Any>, &mut Partial<'static>) -> Result<(), FormError>,
    eq: fn(&dyn Any, &dyn Any) -> bool,
}

impl Converted {
    /// Wraps a typed value.
    pub fn new<T: Facet<'static> + 'static>(value: T) -> Self {
        Converted {
            shape: T::SHAPE,
            value: Box::new(value),
            install: install_typed::<T>,
            eq: eq_typed::<T>,
        }
    }

    /// Shape of the wrapped value.
    pub fn shape(&self) -> &'static Shape {
        self.shape
    }

    /// Borrows the wrapped value if it is a `T`.
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.value.downcast_ref()
    }

    /// Whether both values have the same shape and compare equal through the
    /// shape's `PartialEq`. Types without one never compare equal.
    pub fn same_value(&self, other: &Converted) -> bool {
        self.shape.is_shape(other.shape) && (self.eq)(&*self.value, &*other.value)
    }

    /// Moves the value into the current frame of `partial`, which must have
    /// the same shape.
    pub(crate) fn install(self, partial: &mut Partial<'static>) -> Result<(), FormError> {
        if !partial.shape().is_shape(self.shape) {
            return Err(FormErrorKind::ShapeMismatch {
                expected: partial.shape(),
                actual: self.shape,
            }
            .into());
        }
        (self.install)(self.value, partial)
    }
}

impl fmt::Debug for Converted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Converted")
            .field("shape", &format_args!("{}", self.shape))
            .finish_non_exhaustive()
    }
}

fn install_typed<T: Facet<'static> + 'static>(
    value: Box<dyn Any>,
    partial: &mut Partial<'static>,
) -> Result<(), FormError> {
    let value = value.downcast::<T>().map_err(|_| FormErrorKind::ShapeMismatch {
        expected: partial.shape(),
        actual: T::SHAPE,
    })?;
    partial.set(*value)?;
    Ok(())
}

fn eq_typed<T: Facet<'static> + 'static>(a: &dyn Any, b: &dyn Any) -> bool {
    match (a.downcast_ref::<T>(), b.downcast_ref::<T>()) {
        (Some(a), Some(b)) => Peek::new(a) == Peek::new(b),
        _ => false,
    }
}

type ScalarFn = Arc<dyn Fn(&str) -> Result<Converted, ConvertError> + Send + Sync>;
type AggregateFn = Arc<dyn Fn(&[String]) -> Result<Converted, ConvertError> + Send + Sync>;

/// Registry of string → value converters, keyed by exact target type.
///
/// Scalar converters turn one string into a value. Aggregate converters take
/// every value of a key at once and produce a whole list or array, bypassing
/// element-wise conversion.
#[derive(Clone)]
pub struct Converters {
    scalar: HashMap<ConstTypeId, ScalarFn>,
    aggregate: HashMap<ConstTypeId, AggregateFn>,
}

impl Default for Converters {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Converters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Converters")
            .field("scalar", &self.scalar.len())
            .field("aggregate", &self.aggregate.len())
            .finish()
    }
}

impl Converters {
    /// A registry with no converters at all.
    pub fn empty() -> Self {
        Converters {
            scalar: HashMap::new(),
            aggregate: HashMap::new(),
        }
    }

    /// A registry with converters for the integer and float types, `bool`,
    /// `char` and `String`. All of them reject empty input.
    pub fn new() -> Self {
        let mut converters = Self::empty();
        converters.register_from_str::<i8>();
        converters.register_from_str::<i16>();
        converters.register_from_str::<i32>();
        converters.register_from_str::<i64>();
        converters.register_from_str::<i128>();
        converters.register_from_str::<isize>();
        converters.register_from_str::<u8>();
        converters.register_from_str::<u16>();
        converters.register_from_str::<u32>();
        converters.register_from_str::<u64>();
        converters.register_from_str::<u128>();
        converters.register_from_str::<usize>();
        converters.register_from_str::<f32>();
        converters.register_from_str::<f64>();
        converters.register_from_str::<char>();
        converters.register(|value| non_empty(value, parse_bool));
        converters.register(|value| non_empty(value, |v| Ok::<_, ConvertError>(v.to_string())));
        #[cfg(feature = "chrono")]
        {
            converters.register(|value| {
                non_empty(value, |v| {
                    chrono::DateTime::parse_from_rfc3339(v).map(|t| t.to_utc())
                })
            });
            converters.register(|value| non_empty(value, chrono::DateTime::parse_from_rfc3339));
        }
        converters
    }

    /// Registers (or replaces) the scalar converter for `T`.
    pub fn register<T, E, F>(&mut self, convert: F) -> &mut Self
    where
        T: Facet<'static> + 'static,
        E: Into<Box<dyn Error + Send + Sync>>,
        F: Fn(&str) -> Result<T, E> + Send + Sync + 'static,
    {
        let convert: ScalarFn = Arc::new(move |value: &str| {
            convert(value)
                .map(Converted::new)
                .map_err(ConvertError::invalid)
        });
        self.scalar.insert(T::SHAPE.id, convert);
        self
    }

    /// Registers a converter for `T` based on its `FromStr` implementation.
    pub fn register_from_str<T>(&mut self) -> &mut Self
    where
        T: Facet<'static> + FromStr + 'static,
        T::Err: Error + Send + Sync + 'static,
    {
        self.register(|value| non_empty(value, str::parse::<T>))
    }

    /// Registers (or replaces) the aggregate converter for the list or array
    /// type `T`.
    pub fn register_aggregate<T, E, F>(&mut self, convert: F) -> &mut Self
    where
        T: Facet<'static> + 'static,
        E: Into<Box<dyn Error + Send + Sync>>,
        F: Fn(&[String]) -> Result<T, E> + Send + Sync + 'static,
    {
        let convert: AggregateFn = Arc::new(move |values: &[String]| {
            convert(values)
                .map(Converted::new)
                .map_err(ConvertError::invalid)
        });
        self.aggregate.insert(T::SHAPE.id, convert);
        self
    }

    /// Scalar converter registered for exactly `shape`.
    pub(crate) fn scalar(&self, shape: &'static Shape) -> Option<&ScalarFn> {
        self.scalar.get(&shape.id)
    }

    /// Scalar converter for `shape`, or for the first type found by peeling
    /// `Option`/pointer layers off it.
    pub(crate) fn scalar_probed(&self, mut shape: &'static Shape) -> Option<&ScalarFn> {
        loop {
            if let Some(convert) = self.scalar(shape) {
                return Some(convert);
            }
            shape = unwrap_once(shape)?;
        }
    }

    /// Aggregate converter registered for exactly `shape`.
    pub(crate) fn aggregate(&self, shape: &'static Shape) -> Option<&AggregateFn> {
        self.aggregate.get(&shape.id)
    }
}

/// Runs `convert` unless `value` is empty, in which case it fails with
/// [`ConvertError::EmptyInput`].
pub fn non_empty<T, E, F>(value: &str, convert: F) -> Result<T, ConvertError>
where
    E: Into<Box<dyn Error + Send + Sync>>,
    F: FnOnce(&str) -> Result<T, E>,
{
    if value.is_empty() {
        return Err(ConvertError::EmptyInput);
    }
    convert(value).map_err(ConvertError::invalid)
}

#[derive(Debug)]
struct InvalidBool(String);

impl fmt::Display for InvalidBool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid boolean \"{}\"", self.0)
    }
}

impl Error for InvalidBool {}

/// Accepts the same spellings as Go's `strconv.ParseBool`.
fn parse_bool(value: &str) -> Result<bool, InvalidBool> {
    match value {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Ok(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Ok(false),
        other => Err(InvalidBool(other.to_string())),
    }
}
