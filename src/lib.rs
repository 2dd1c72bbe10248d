#![warn(missing_docs)]
#![doc = include_str!("../README.md")]

use std::sync::OnceLock;

use facet_core::Facet;

mod cache;
mod convert;
mod decoder;
mod error;
mod install;
mod kind;
mod pack;
mod tree;
mod values;

pub use cache::{AnnotationSyntax, Member, Members, ShapeCache};
pub use convert::{Converted, Converters, non_empty};
pub use decoder::{Decoded, Decoder};
pub use error::{ConvertError, FormError, FormErrorKind, Warning, WarningKind};
pub use values::FormValues;

fn default_decoder() -> &'static Decoder {
    static DEFAULT: OnceLock<Decoder> = OnceLock::new();
    DEFAULT.get_or_init(Decoder::new)
}

/// Decodes `values` into a `T` with the default [`Decoder`].
pub fn from_values<T: Facet<'static>>(values: &FormValues) -> Result<Decoded<T>, FormError> {
    default_decoder().decode(values)
}

/// Decodes single-valued `(key, value)` pairs, such as a parsed query string,
/// with the default [`Decoder`]. Repeated keys collect every value.
pub fn from_pairs<T, I, K, V>(pairs: I) -> Result<Decoded<T>, FormError>
where
    T: Facet<'static>,
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    from_values(&pairs.into_iter().collect())
}
