use std::{error::Error, sync::Arc};

use facet_core::Facet;
use facet_reflect::Partial;

use crate::{
    cache::ShapeCache,
    convert::Converters,
    error::{FormError, FormErrorKind, Warning},
    install::install,
    kind::{Kind, strip_wrappers},
    pack::{Packed, Packer},
    tree::TreeBuilder,
    values::FormValues,
};

/// A decoded value together with the warnings raised for skipped keys.
#[derive(Debug)]
pub struct Decoded<T> {
    /// The populated destination.
    pub value: T,
    /// One entry per key or entry that could not be used.
    pub warnings: Vec<Warning>,
}

impl<T> Decoded<T> {
    /// Drops the warnings.
    pub fn into_value(self) -> T {
        self.value
    }
}

/// Decodes [`FormValues`] into Facet types.
///
/// A decoder bundles the path delimiter, the shape cache and the converter
/// registry. It is cheap to clone and can be shared between threads; the
/// converters must all be registered before decoding starts.
///
/// ```
/// use facet::Facet;
/// use facet_form::{Decoder, FormValues};
///
/// #[derive(Facet, Debug, PartialEq)]
/// struct Point {
///     x: i32,
///     y: i32,
/// }
///
/// let decoder = Decoder::new().with_delimiter("/");
/// let values = FormValues::from([("0/x", ["1"]), ("0/y", ["2"])]);
/// let decoded = decoder.decode::<Vec<Point>>(&values).unwrap();
/// assert_eq!(decoded.value, vec![Point { x: 1, y: 2 }]);
/// ```
#[derive(Debug, Clone)]
pub struct Decoder {
    delimiter: String,
    max_index: usize,
    cache: Arc<ShapeCache>,
    converters: Converters,
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder {
    /// Largest list index accepted by [`Decoder::new`].
    pub const DEFAULT_MAX_INDEX: usize = 10_000;

    /// A decoder splitting keys on `.`, using the process-wide shape cache and
    /// the built-in converters.
    pub fn new() -> Self {
        Decoder {
            delimiter: ".".to_string(),
            max_index: Self::DEFAULT_MAX_INDEX,
            cache: ShapeCache::global(),
            converters: Converters::new(),
        }
    }

    /// Sets the separator between path segments. An empty delimiter makes
    /// every key a single segment.
    pub fn with_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = delimiter.into();
        self
    }

    /// Sets the largest index a key may address in a growable list. Lists
    /// are sized by their largest index, so larger indices are rejected with
    /// a [`WarningKind::IndexOutOfBounds`](crate::WarningKind::IndexOutOfBounds)
    /// warning. Fixed arrays are bounded by their length instead.
    pub fn with_max_index(mut self, max_index: usize) -> Self {
        self.max_index = max_index;
        self
    }

    /// Uses `cache` instead of the process-wide one.
    pub fn with_cache(mut self, cache: Arc<ShapeCache>) -> Self {
        self.cache = cache;
        self
    }

    /// Replaces the whole converter registry.
    pub fn with_converters(mut self, converters: Converters) -> Self {
        self.converters = converters;
        self
    }

    /// Registers (or replaces) the scalar converter for `T`.
    pub fn register<T, E, F>(mut self, convert: F) -> Self
    where
        T: Facet<'static> + 'static,
        E: Into<Box<dyn Error + Send + Sync>>,
        F: Fn(&str) -> Result<T, E> + Send + Sync + 'static,
    {
        self.converters.register(convert);
        self
    }

    /// Registers (or replaces) the aggregate converter for the list or array
    /// type `T`.
    pub fn register_aggregate<T, E, F>(mut self, convert: F) -> Self
    where
        T: Facet<'static> + 'static,
        E: Into<Box<dyn Error + Send + Sync>>,
        F: Fn(&[String]) -> Result<T, E> + Send + Sync + 'static,
    {
        self.converters.register_aggregate(convert);
        self
    }

    /// The path delimiter.
    pub fn delimiter(&self) -> &str {
        &self.delimiter
    }

    /// The largest accepted list index.
    pub fn max_index(&self) -> usize {
        self.max_index
    }

    /// The shape cache.
    pub fn cache(&self) -> &Arc<ShapeCache> {
        &self.cache
    }

    /// The converter registry.
    pub fn converters(&self) -> &Converters {
        &self.converters
    }

    /// Decodes `values` into a fresh `T`.
    ///
    /// Fails when `T` (once `Option`/smart pointer layers are peeled off) is
    /// not a struct, map, list or array, or when no key could be used at all.
    /// Every other problem is reported as a [`Warning`].
    pub fn decode<T: Facet<'static>>(&self, values: &FormValues) -> Result<Decoded<T>, FormError> {
        log::trace!("Entering `decode` method for {}", T::SHAPE);

        let root = T::SHAPE;
        if Kind::of(strip_wrappers(root)).is_scalar() {
            return Err(FormErrorKind::InvalidDestination(root).into());
        }

        let mut warnings = Vec::new();
        let tree = TreeBuilder {
            cache: &self.cache,
            converters: &self.converters,
            delimiter: &self.delimiter,
        }
        .build(values, root, &mut warnings);
        if tree.is_empty() {
            log::debug!("No key of {} could be used", values.len());
            return Err(FormError::from(FormErrorKind::NoValuesMapped).with_warnings(warnings));
        }

        let (plan, set) = Packer {
            cache: &self.cache,
            converters: &self.converters,
            delimiter: &self.delimiter,
            max_index: self.max_index,
        }
        .pack(tree, root, "", &mut warnings);
        if !set {
            log::debug!("Source tree did not set anything in {root}");
            return Err(FormError::from(FormErrorKind::NoValuesMapped).with_warnings(warnings));
        }

        match materialize::<T>(plan) {
            Ok(value) => {
                log::trace!("Decoded {root} with {} warnings", warnings.len());
                Ok(Decoded { value, warnings })
            }
            Err(error) => Err(error.with_warnings(warnings)),
        }
    }
}

fn materialize<T: Facet<'static>>(plan: Packed) -> Result<T, FormError> {
    let mut typed_partial = Partial::alloc::<T>()?;
    log::trace!(
        "Allocated WIP for type {}",
        typed_partial.inner_mut().shape()
    );

    install(plan, typed_partial.inner_mut())?;

    let boxed_value = typed_partial.build()?;
    log::trace!("WIP fully built");
    Ok(*boxed_value)
}
