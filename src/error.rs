use std::{
    error::Error,
    fmt::{self, Display},
};

use facet_core::Shape;
use facet_reflect::ReflectError;

/// Fatal error returned when a decode produced no usable value.
///
/// Warnings gathered before the failure are kept, see [`FormError::warnings`].
#[derive(Debug)]
pub struct FormError {
    kind: FormErrorKind,
    warnings: Vec<Warning>,
}

impl FormError {
    /// Returns a reference to the error kind for detailed error inspection.
    pub fn kind(&self) -> &FormErrorKind {
        &self.kind
    }

    /// Warnings collected before the decode gave up.
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// Consumes the error, returning the collected warnings.
    pub fn into_warnings(self) -> Vec<Warning> {
        self.warnings
    }

    pub(crate) fn with_warnings(mut self, warnings: Vec<Warning>) -> Self {
        self.warnings = warnings;
        self
    }
}

impl Display for FormError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = &self.kind;
        write!(f, "{kind}")?;
        if !self.warnings.is_empty() {
            write!(f, " ({} warnings)", self.warnings.len())?;
        }
        Ok(())
    }
}

impl Error for FormError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.kind {
            FormErrorKind::Reflect(e) => Some(e),
            _ => None,
        }
    }
}

impl<K: Into<FormErrorKind>> From<K> for FormError {
    fn from(value: K) -> Self {
        let kind = value.into();
        FormError {
            kind,
            warnings: Vec::new(),
        }
    }
}

/// Detailed classification of fatal decode errors.
#[derive(Debug)]
#[non_exhaustive]
pub enum FormErrorKind {
    /// The destination is not a struct, map, list or array, even after
    /// unwrapping `Option`/smart pointer layers.
    InvalidDestination(&'static Shape),
    /// Nothing could be mapped: the input was empty, or every key was
    /// invalid or failed to convert.
    NoValuesMapped,
    /// A member had to be zero-filled, but its type has neither a `Default`
    /// implementation nor a structure we can zero member by member.
    NoZeroValue(&'static Shape),
    /// A converter produced a value whose shape differs from the slot it was
    /// resolved for.
    ShapeMismatch {
        /// Shape of the slot being written.
        expected: &'static Shape,
        /// Shape of the converted value.
        actual: &'static Shape,
    },
    /// Error from the reflection system while building the destination.
    Reflect(ReflectError),
}

impl Display for FormErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormErrorKind::InvalidDestination(shape) => write!(
                f,
                "destination {shape} must have named members (struct, map, list or array)"
            ),
            FormErrorKind::NoValuesMapped => write!(
                f,
                "no valid mappings found (source empty if this is the only error)"
            ),
            FormErrorKind::NoZeroValue(shape) => {
                write!(f, "cannot produce a zero value for {shape}")
            }
            FormErrorKind::ShapeMismatch { expected, actual } => {
                write!(f, "converted value of type {actual} cannot be written to {expected}")
            }
            FormErrorKind::Reflect(reflect_error) => write!(f, "{reflect_error}"),
        }
    }
}

impl From<ReflectError> for FormErrorKind {
    fn from(value: ReflectError) -> Self {
        Self::Reflect(value)
    }
}

/// Failure reported by a converter.
#[derive(Debug)]
#[non_exhaustive]
pub enum ConvertError {
    /// The converter was handed an empty string.
    EmptyInput,
    /// The string could not be parsed into the target type.
    Invalid(Box<dyn Error + Send + Sync>),
}

impl ConvertError {
    /// Wraps any error into [`ConvertError::Invalid`]. A boxed `ConvertError`
    /// is passed through unchanged.
    pub fn invalid(error: impl Into<Box<dyn Error + Send + Sync>>) -> Self {
        match error.into().downcast::<ConvertError>() {
            Ok(convert_error) => *convert_error,
            Err(error) => ConvertError::Invalid(error),
        }
    }
}

impl Display for ConvertError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConvertError::EmptyInput => write!(f, "empty input provided"),
            ConvertError::Invalid(e) => write!(f, "{e}"),
        }
    }
}

impl Error for ConvertError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ConvertError::EmptyInput => None,
            ConvertError::Invalid(e) => Some(e.as_ref()),
        }
    }
}

/// A recoverable problem with a single key or entry.
///
/// Warnings never abort a decode; they are returned next to the value in
/// [`crate::Decoded`], or inside [`FormError`] when nothing could be mapped.
#[derive(Debug)]
pub struct Warning {
    key: String,
    kind: WarningKind,
}

impl Warning {
    pub(crate) fn new(key: impl Into<String>, kind: WarningKind) -> Self {
        Warning {
            key: key.into(),
            kind,
        }
    }

    /// The flat key (or key prefix) the warning is about.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// What went wrong.
    pub fn kind(&self) -> &WarningKind {
        &self.kind
    }
}

impl Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\": {}", self.key, self.kind)
    }
}

impl Error for Warning {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.kind {
            WarningKind::Conversion { source, .. }
            | WarningKind::ElementConversion { source, .. }
            | WarningKind::MapKey { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Classification of [`Warning`]s.
#[derive(Debug)]
#[non_exhaustive]
pub enum WarningKind {
    /// The key does not resolve against the destination type.
    InvalidPath,
    /// The (last) value of a key failed to convert.
    Conversion {
        /// Target type of the conversion.
        shape: &'static Shape,
        /// The string that was rejected.
        value: String,
        /// Why it was rejected.
        source: ConvertError,
    },
    /// One element of a multi-valued key failed to convert; the element is
    /// left at its zero value.
    ElementConversion {
        /// Position of the element in the value list.
        index: usize,
        /// Element type.
        shape: &'static Shape,
        /// The string that was rejected.
        value: String,
        /// Why it was rejected.
        source: ConvertError,
    },
    /// No converter is registered for the resolved type.
    NoConverter(&'static Shape),
    /// None of the supplied values could be converted (or none were supplied).
    NoValues,
    /// A list or array index is not an integer.
    BadIndex(String),
    /// A list or array index is negative, past the end of a fixed array, or
    /// above the largest list index the decoder accepts.
    IndexOutOfBounds {
        /// The offending index token.
        token: String,
        /// Fixed length of the array, `None` for growable lists, where the
        /// index was negative or above the decoder's maximum.
        len: Option<usize>,
    },
    /// A map key failed to convert into the map's key type.
    MapKey {
        /// The key token.
        token: String,
        /// Why it was rejected.
        source: ConvertError,
    },
    /// A value was already converted for this key as a whole, so the nested
    /// key below it is ignored.
    Shadowed,
}

impl Display for WarningKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WarningKind::InvalidPath => write!(f, "path is invalid"),
            WarningKind::Conversion {
                shape,
                value,
                source,
            } => write!(f, "\"{value}\" value conversion failed ({source}) for {shape}"),
            WarningKind::ElementConversion {
                index,
                shape,
                value,
                source,
            } => write!(
                f,
                "element {index} \"{value}\" value conversion failed ({source}) for {shape}"
            ),
            WarningKind::NoConverter(shape) => write!(f, "converter not found for type {shape}"),
            WarningKind::NoValues => write!(f, "no valid mappings found"),
            WarningKind::BadIndex(token) => write!(f, "bad index: \"{token}\""),
            WarningKind::IndexOutOfBounds { token, len } => match len {
                Some(len) => write!(f, "index out of bounds: \"{token}\" (length {len})"),
                None => write!(f, "index out of bounds: \"{token}\""),
            },
            WarningKind::MapKey { token, source } => {
                write!(f, "map key from \"{token}\" string conversion failed ({source})")
            }
            WarningKind::Shadowed => write!(f, "shadowed by a value converted for its parent"),
        }
    }
}
