use facet_core::Shape;
use indexmap::IndexMap;

use crate::{
    cache::ShapeCache,
    convert::{Converted, Converters},
    error::{Warning, WarningKind},
    kind::Kind,
    values::FormValues,
};

/// A value converted for a key, before it is written anywhere.
#[derive(Debug)]
pub(crate) enum Leaf {
    /// One value standing for the whole slot: a scalar, or a list/array
    /// produced by an aggregate converter.
    Value(Converted),
    /// Element-wise conversion of a multi-valued key into a list or array.
    /// Failed elements are `None` and end up as zero values.
    Elements(Vec<Option<Converted>>),
}

/// Node of the source tree. Children are keyed by the next path segment.
#[derive(Debug, Default)]
pub(crate) struct SourceNode {
    pub(crate) leaf: Option<Leaf>,
    pub(crate) children: IndexMap<String, SourceNode>,
}

impl SourceNode {
    fn insert(&mut self, path: &[&str], leaf: Leaf) {
        match path.split_first() {
            None => self.leaf = Some(leaf),
            Some((segment, rest)) => self
                .children
                .entry((*segment).to_string())
                .or_default()
                .insert(rest, leaf),
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.leaf.is_none() && self.children.is_empty()
    }
}

/// Resolves flat keys against a destination shape and converts their values.
pub(crate) struct TreeBuilder<'d> {
    pub(crate) cache: &'d ShapeCache,
    pub(crate) converters: &'d Converters,
    pub(crate) delimiter: &'d str,
}

impl TreeBuilder<'_> {
    pub(crate) fn split<'k>(&self, key: &'k str) -> Vec<&'k str> {
        if self.delimiter.is_empty() {
            vec![key]
        } else {
            key.split(self.delimiter).collect()
        }
    }

    /// Builds the source tree. Keys that fail are reported in `warnings` and
    /// left out; an empty tree means nothing could be used.
    pub(crate) fn build(
        &self,
        values: &FormValues,
        root: &'static Shape,
        warnings: &mut Vec<Warning>,
    ) -> SourceNode {
        log::trace!("Building source tree for {root} from {} keys", values.len());
        let mut tree = SourceNode::default();

        for (key, strings) in values.iter() {
            let path = self.split(key);
            let Some(shape) = self.cache.resolve(root, &path) else {
                log::debug!("Key \"{key}\" does not resolve against {root}");
                warnings.push(Warning::new(key, WarningKind::InvalidPath));
                continue;
            };
            log::trace!("Key \"{key}\" resolved to {shape}");

            if let Some(leaf) = self.convert(key, shape, strings, warnings) {
                tree.insert(&path, leaf);
            }
        }

        tree
    }

    fn convert(
        &self,
        key: &str,
        shape: &'static Shape,
        strings: &[String],
        warnings: &mut Vec<Warning>,
    ) -> Option<Leaf> {
        if let Some(convert) = self.converters.aggregate(shape) {
            return match convert(strings) {
                Ok(converted) => Some(Leaf::Value(converted)),
                Err(source) => {
                    log::debug!("Aggregate conversion failed for \"{key}\"");
                    warnings.push(Warning::new(
                        key,
                        WarningKind::Conversion {
                            shape,
                            value: strings.join(","),
                            source,
                        },
                    ));
                    None
                }
            };
        }

        match Kind::of(shape) {
            Kind::Sequence(list_def) => {
                self.convert_elements(key, list_def.t(), strings, None, warnings)
            }
            Kind::Array(array_def) => {
                self.convert_elements(key, array_def.t, strings, Some(array_def.n), warnings)
            }
            _ => self.convert_last(key, shape, strings, warnings),
        }
    }

    fn convert_elements(
        &self,
        key: &str,
        element: &'static Shape,
        strings: &[String],
        len: Option<usize>,
        warnings: &mut Vec<Warning>,
    ) -> Option<Leaf> {
        let Some(convert) = self.converters.scalar_probed(element) else {
            warnings.push(Warning::new(key, WarningKind::NoConverter(element)));
            return None;
        };

        let mut elements = Vec::with_capacity(strings.len());
        for (index, value) in strings.iter().enumerate() {
            if len.is_some_and(|len| index >= len) {
                warnings.push(Warning::new(
                    key,
                    WarningKind::IndexOutOfBounds {
                        token: index.to_string(),
                        len,
                    },
                ));
                continue;
            }
            match convert(value.as_str()) {
                Ok(converted) => elements.push(Some(converted)),
                Err(source) => {
                    warnings.push(Warning::new(
                        key,
                        WarningKind::ElementConversion {
                            index,
                            shape: element,
                            value: value.clone(),
                            source,
                        },
                    ));
                    elements.push(None);
                }
            }
        }

        if elements.iter().all(Option::is_none) {
            warnings.push(Warning::new(key, WarningKind::NoValues));
            return None;
        }
        Some(Leaf::Elements(elements))
    }

    /// Repeated keys: the last value wins.
    fn convert_last(
        &self,
        key: &str,
        shape: &'static Shape,
        strings: &[String],
        warnings: &mut Vec<Warning>,
    ) -> Option<Leaf> {
        let Some(value) = strings.last() else {
            warnings.push(Warning::new(key, WarningKind::NoValues));
            return None;
        };
        let Some(convert) = self.converters.scalar(shape) else {
            warnings.push(Warning::new(key, WarningKind::NoConverter(shape)));
            return None;
        };
        match convert(value.as_str()) {
            Ok(converted) => Some(Leaf::Value(converted)),
            Err(source) => {
                log::debug!("Conversion of \"{value}\" failed for \"{key}\"");
                warnings.push(Warning::new(
                    key,
                    WarningKind::Conversion {
                        shape,
                        value: value.clone(),
                        source,
                    },
                ));
                None
            }
        }
    }
}
