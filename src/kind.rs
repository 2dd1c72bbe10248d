use facet_core::{ArrayDef, Def, KnownPointer, ListDef, MapDef, Shape, StructType, Type, UserType};

/// How a destination shape is navigated by paths and filled by the packer.
#[derive(Clone, Copy)]
pub(crate) enum Kind {
    /// A struct: path segments name its members.
    Record(StructType),
    /// A map: path segments are keys, converted with the key type's converter.
    Mapping(MapDef),
    /// A growable list: path segments are indices.
    Sequence(ListDef),
    /// A fixed-size array: path segments are bounds-checked indices.
    Array(ArrayDef),
    /// Anything else, only ever written as a whole.
    Scalar,
}

impl Kind {
    pub(crate) fn of(shape: &'static Shape) -> Kind {
        match shape.def {
            Def::Map(map_def) => Kind::Mapping(map_def),
            Def::List(list_def) => Kind::Sequence(list_def),
            Def::Array(array_def) => Kind::Array(array_def),
            _ => match shape.ty {
                Type::User(UserType::Struct(struct_type)) => Kind::Record(struct_type),
                _ => Kind::Scalar,
            },
        }
    }

    pub(crate) fn is_scalar(&self) -> bool {
        matches!(self, Kind::Scalar)
    }
}

/// Returns the shape one wrapper layer down, if `shape` is an `Option<T>` or a
/// `Box`/`Rc`/`Arc` around a sized value.
pub(crate) fn unwrap_once(shape: &'static Shape) -> Option<&'static Shape> {
    match shape.def {
        Def::Option(option_def) => Some(option_def.t),
        Def::Pointer(pointer_def) => match pointer_def.known {
            Some(KnownPointer::Box | KnownPointer::Rc | KnownPointer::Arc) => pointer_def
                .pointee()
                .filter(|pointee| pointee.layout.sized_layout().is_ok()),
            _ => None,
        },
        _ => None,
    }
}

/// Peels every `Option`/smart pointer layer off `shape`.
pub(crate) fn strip_wrappers(mut shape: &'static Shape) -> &'static Shape {
    while let Some(inner) = unwrap_once(shape) {
        shape = inner;
    }
    shape
}
