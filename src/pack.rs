use std::{
    collections::{BTreeMap, btree_map::Entry},
    mem,
};

use facet_core::Shape;
use indexmap::IndexMap;

use crate::{
    cache::ShapeCache,
    convert::{Converted, Converters},
    error::{Warning, WarningKind},
    kind::{Kind, strip_wrappers},
    tree::{Leaf, SourceNode},
};

/// What to write into one slot of the destination.
///
/// Plans are computed from the source tree without touching the destination,
/// then installed in a single pass. Wrapper layers around a slot are implied:
/// they are entered when the plan is installed.
#[derive(Debug)]
pub(crate) enum Packed {
    /// Leave the slot at its zero value.
    Zero,
    /// Write a converted value as a whole.
    Value(Converted),
    /// Write some members of a struct, by field index.
    Record(BTreeMap<usize, Packed>),
    /// Fill a map with committed entries, in order.
    Map(Vec<(Converted, Packed)>),
    /// Allocate a list of `len` elements and write some of them.
    Sequence {
        len: usize,
        items: BTreeMap<usize, Packed>,
    },
    /// Write some elements of a fixed array of `len` elements.
    Array {
        len: usize,
        items: BTreeMap<usize, Packed>,
    },
}

impl Packed {
    /// Lays `later` over `self`, the way writing both into one slot in
    /// order would. Structured plans merge slot by slot; anything else is
    /// replaced, unless `later` writes nothing.
    fn merge(self, later: Packed) -> Packed {
        match (self, later) {
            (earlier, Packed::Zero) => earlier,
            (Packed::Record(mut fields), Packed::Record(incoming)) => {
                merge_slots(&mut fields, incoming);
                Packed::Record(fields)
            }
            (Packed::Map(mut entries), Packed::Map(incoming)) => {
                for (key, plan) in incoming {
                    merge_entry(&mut entries, key, plan);
                }
                Packed::Map(entries)
            }
            (
                Packed::Sequence { len, mut items },
                Packed::Sequence {
                    len: incoming_len,
                    items: incoming,
                },
            ) => {
                merge_slots(&mut items, incoming);
                Packed::Sequence {
                    len: len.max(incoming_len),
                    items,
                }
            }
            (Packed::Array { len, mut items }, Packed::Array { items: incoming, .. }) => {
                merge_slots(&mut items, incoming);
                Packed::Array { len, items }
            }
            (_, later) => later,
        }
    }
}

fn merge_slots(slots: &mut BTreeMap<usize, Packed>, incoming: BTreeMap<usize, Packed>) {
    for (index, plan) in incoming {
        merge_slot(slots, index, plan);
    }
}

fn merge_slot(slots: &mut BTreeMap<usize, Packed>, index: usize, plan: Packed) {
    match slots.entry(index) {
        Entry::Vacant(entry) => {
            entry.insert(plan);
        }
        Entry::Occupied(mut entry) => {
            let earlier = mem::replace(entry.get_mut(), Packed::Zero);
            *entry.get_mut() = earlier.merge(plan);
        }
    }
}

/// Adds a map entry, merging it into an earlier entry with an equal key.
fn merge_entry(entries: &mut Vec<(Converted, Packed)>, key: Converted, plan: Packed) {
    match entries.iter().position(|(existing, _)| existing.same_value(&key)) {
        Some(index) => {
            let existing = &mut entries[index].1;
            let earlier = mem::replace(existing, Packed::Zero);
            *existing = earlier.merge(plan);
        }
        None => entries.push((key, plan)),
    }
}

/// Turns a source tree into a [`Packed`] plan.
pub(crate) struct Packer<'d> {
    pub(crate) cache: &'d ShapeCache,
    pub(crate) converters: &'d Converters,
    pub(crate) delimiter: &'d str,
    /// Largest index accepted for a growable list.
    pub(crate) max_index: usize,
}

impl Packer<'_> {
    /// Plans `node` against `shape`. The flag tells whether anything below
    /// `node` was actually set.
    pub(crate) fn pack(
        &self,
        node: SourceNode,
        shape: &'static Shape,
        key: &str,
        warnings: &mut Vec<Warning>,
    ) -> (Packed, bool) {
        let shape = strip_wrappers(shape);
        let SourceNode { leaf, children } = node;

        match leaf {
            Some(Leaf::Value(value)) => {
                self.shadow(&children, key, warnings);
                (Packed::Value(value), true)
            }
            Some(Leaf::Elements(elements)) => {
                self.pack_elements(elements, children, shape, key, warnings)
            }
            None => self.pack_children(children, shape, key, warnings),
        }
    }

    fn pack_elements(
        &self,
        elements: Vec<Option<Converted>>,
        children: IndexMap<String, SourceNode>,
        shape: &'static Shape,
        key: &str,
        warnings: &mut Vec<Warning>,
    ) -> (Packed, bool) {
        let count = elements.len();
        let mut from_leaf: BTreeMap<usize, Packed> = elements
            .into_iter()
            .enumerate()
            .filter_map(|(index, element)| Some((index, Packed::Value(element?))))
            .collect();

        match Kind::of(shape) {
            Kind::Sequence(list_def) => {
                let (items, _) = self.pack_indexed(children, list_def.t(), None, key, warnings);
                if items.is_empty() {
                    let plan = Packed::Sequence {
                        len: count,
                        items: from_leaf,
                    };
                    (plan, true)
                } else {
                    log::trace!("Indexed keys below \"{key}\" replace its values");
                    let len = sequence_len(&items);
                    (Packed::Sequence { len, items }, true)
                }
            }
            Kind::Array(array_def) => {
                let (items, _) =
                    self.pack_indexed(children, array_def.t, Some(array_def.n), key, warnings);
                merge_slots(&mut from_leaf, items);
                let plan = Packed::Array {
                    len: array_def.n,
                    items: from_leaf,
                };
                (plan, true)
            }
            _ => {
                log::debug!("Element values for \"{key}\" do not fit {shape}");
                self.shadow(&children, key, warnings);
                (Packed::Zero, false)
            }
        }
    }

    fn pack_children(
        &self,
        children: IndexMap<String, SourceNode>,
        shape: &'static Shape,
        key: &str,
        warnings: &mut Vec<Warning>,
    ) -> (Packed, bool) {
        match Kind::of(shape) {
            Kind::Record(_) => self.pack_record(children, shape, key, warnings),
            Kind::Mapping(map_def) => {
                self.pack_map(children, map_def.k(), map_def.v(), key, warnings)
            }
            Kind::Sequence(list_def) => {
                let (items, set) = self.pack_indexed(children, list_def.t(), None, key, warnings);
                let len = sequence_len(&items);
                (Packed::Sequence { len, items }, set)
            }
            Kind::Array(array_def) => {
                let (items, set) =
                    self.pack_indexed(children, array_def.t, Some(array_def.n), key, warnings);
                let plan = Packed::Array {
                    len: array_def.n,
                    items,
                };
                (plan, set)
            }
            Kind::Scalar => {
                log::debug!("{shape} has no members, ignoring keys below \"{key}\"");
                (Packed::Zero, false)
            }
        }
    }

    /// Record members are planned even when nothing below them was set.
    fn pack_record(
        &self,
        children: IndexMap<String, SourceNode>,
        shape: &'static Shape,
        key: &str,
        warnings: &mut Vec<Warning>,
    ) -> (Packed, bool) {
        log::trace!("Packing struct {shape} at \"{key}\"");
        let members = self.cache.members(shape);
        let mut fields = BTreeMap::new();
        let mut set = false;

        for (name, child) in children {
            let Some(member) = members.get(&name) else {
                log::debug!("{shape} has no member `{name}`");
                continue;
            };
            let child_key = self.join(key, &name);
            let (packed, child_set) = self.pack(child, member.shape, &child_key, warnings);
            set |= child_set;
            place(&mut fields, &member.path, packed, &child_key, warnings);
        }

        (Packed::Record(fields), set)
    }

    /// Map entries are only committed when something below them was set.
    fn pack_map(
        &self,
        children: IndexMap<String, SourceNode>,
        key_shape: &'static Shape,
        value_shape: &'static Shape,
        key: &str,
        warnings: &mut Vec<Warning>,
    ) -> (Packed, bool) {
        let Some(convert_key) = self.converters.scalar(key_shape) else {
            log::debug!("No converter for map keys of type {key_shape}");
            warnings.push(Warning::new(key, WarningKind::NoConverter(key_shape)));
            return (Packed::Map(Vec::new()), false);
        };

        let mut entries = Vec::new();
        for (token, child) in children {
            let child_key = self.join(key, &token);
            let map_key = match convert_key(token.as_str()) {
                Ok(map_key) => map_key,
                Err(source) => {
                    warnings.push(Warning::new(child_key, WarningKind::MapKey { token, source }));
                    continue;
                }
            };
            let (packed, child_set) = self.pack(child, value_shape, &child_key, warnings);
            if child_set {
                merge_entry(&mut entries, map_key, packed);
            } else {
                log::debug!("Dropping map entry \"{child_key}\": nothing below it was set");
            }
        }

        let set = !entries.is_empty();
        (Packed::Map(entries), set)
    }

    /// Parses index tokens and plans each valid slot. Tokens naming the same
    /// index (`1` and `01`) are merged in order.
    fn pack_indexed(
        &self,
        children: IndexMap<String, SourceNode>,
        element: &'static Shape,
        bound: Option<usize>,
        key: &str,
        warnings: &mut Vec<Warning>,
    ) -> (BTreeMap<usize, Packed>, bool) {
        let mut items = BTreeMap::new();
        let mut set = false;

        for (token, child) in children {
            let child_key = self.join(key, &token);
            let Ok(index) = token.parse::<i64>() else {
                warnings.push(Warning::new(child_key, WarningKind::BadIndex(token)));
                continue;
            };
            let limit = bound.unwrap_or(self.max_index.saturating_add(1));
            let index = match usize::try_from(index) {
                Ok(index) if index < limit => index,
                _ => {
                    warnings.push(Warning::new(
                        child_key,
                        WarningKind::IndexOutOfBounds { token, len: bound },
                    ));
                    continue;
                }
            };
            let (packed, child_set) = self.pack(child, element, &child_key, warnings);
            set |= child_set;
            merge_slot(&mut items, index, packed);
        }

        (items, set)
    }

    /// Every key below an already converted value is ignored.
    fn shadow(
        &self,
        children: &IndexMap<String, SourceNode>,
        key: &str,
        warnings: &mut Vec<Warning>,
    ) {
        for (segment, child) in children {
            let child_key = self.join(key, segment);
            if child.leaf.is_some() {
                warnings.push(Warning::new(child_key.as_str(), WarningKind::Shadowed));
            }
            self.shadow(&child.children, &child_key, warnings);
        }
    }

    fn join(&self, key: &str, segment: &str) -> String {
        if key.is_empty() {
            segment.to_string()
        } else {
            format!("{key}{}{segment}", self.delimiter)
        }
    }
}

fn sequence_len(items: &BTreeMap<usize, Packed>) -> usize {
    items.last_key_value().map_or(0, |(index, _)| index + 1)
}

/// Puts a member plan at its field path, creating nested struct plans for
/// members promoted out of flattened fields.
fn place(
    fields: &mut BTreeMap<usize, Packed>,
    path: &[usize],
    packed: Packed,
    key: &str,
    warnings: &mut Vec<Warning>,
) {
    let Some((&index, rest)) = path.split_first() else {
        return;
    };

    if !rest.is_empty() {
        match fields
            .entry(index)
            .or_insert_with(|| Packed::Record(BTreeMap::new()))
        {
            Packed::Record(nested) => place(nested, rest, packed, key, warnings),
            _ => warnings.push(Warning::new(key, WarningKind::Shadowed)),
        }
        return;
    }

    match fields.entry(index) {
        Entry::Vacant(entry) => {
            entry.insert(packed);
        }
        Entry::Occupied(mut entry) => match (entry.get_mut(), packed) {
            (Packed::Record(existing), Packed::Record(incoming)) => {
                for (inner, plan) in incoming {
                    place(existing, &[inner], plan, key, warnings);
                }
            }
            _ => warnings.push(Warning::new(key, WarningKind::Shadowed)),
        },
    }
}
