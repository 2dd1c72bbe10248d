use facet_core::{Characteristic, Def, FieldFlags, Shape, StructType};
use facet_reflect::Partial;

use crate::{
    error::{FormError, FormErrorKind},
    kind::{Kind, unwrap_once},
    pack::Packed,
};

/// Writes `plan` into the current frame of `partial`, which is left fully
/// initialised.
pub(crate) fn install(plan: Packed, partial: &mut Partial<'static>) -> Result<(), FormError> {
    log::trace!("Installing {} at {}", plan.describe(), partial.path());
    match plan {
        Packed::Zero => fill_zero(partial),
        Packed::Value(value) => {
            let depth = enter_wrappers(partial, Some(value.shape()))?;
            value.install(partial)?;
            leave(partial, depth)
        }
        Packed::Record(fields) => within_wrappers(partial, |partial| {
            for (index, field_plan) in fields {
                partial.begin_nth_field(index)?;
                install(field_plan, partial)?;
                partial.end()?;
            }
            match Kind::of(partial.shape()) {
                Kind::Record(struct_type) => fill_unset_fields(partial, struct_type),
                _ => Ok(()),
            }
        }),
        Packed::Map(entries) => within_wrappers(partial, |partial| {
            partial.begin_map()?;
            for (key, value) in entries {
                partial.begin_key()?;
                key.install(partial)?;
                partial.end()?;
                partial.begin_value()?;
                install(value, partial)?;
                partial.end()?;
            }
            Ok(())
        }),
        Packed::Sequence { len, mut items } => within_wrappers(partial, |partial| {
            partial.begin_list()?;
            for index in 0..len {
                partial.begin_list_item()?;
                match items.remove(&index) {
                    Some(item) => install(item, partial)?,
                    None => fill_zero(partial)?,
                }
                partial.end()?;
            }
            Ok(())
        }),
        Packed::Array { len, mut items } => within_wrappers(partial, |partial| {
            for index in 0..len {
                partial.begin_nth_element(index)?;
                match items.remove(&index) {
                    Some(item) => install(item, partial)?,
                    None => fill_zero(partial)?,
                }
                partial.end()?;
            }
            Ok(())
        }),
    }
}

fn within_wrappers(
    partial: &mut Partial<'static>,
    write: impl FnOnce(&mut Partial<'static>) -> Result<(), FormError>,
) -> Result<(), FormError> {
    let depth = enter_wrappers(partial, None)?;
    write(partial)?;
    leave(partial, depth)
}

/// Enters `Option`/smart pointer layers until the frame has the `target`
/// shape, or until there are none left. Returns how many were entered.
fn enter_wrappers(
    partial: &mut Partial<'static>,
    target: Option<&'static Shape>,
) -> Result<usize, FormError> {
    let mut depth = 0;
    loop {
        let shape = partial.shape();
        if target.is_some_and(|target| shape.is_shape(target)) || unwrap_once(shape).is_none() {
            return Ok(depth);
        }
        if let Def::Option(_) = shape.def {
            log::trace!("Entering Some at {}", partial.path());
            partial.begin_some()?;
        } else {
            log::trace!("Entering smart pointer {shape} at {}", partial.path());
            partial.begin_smart_ptr()?;
        }
        depth += 1;
    }
}

fn leave(partial: &mut Partial<'static>, depth: usize) -> Result<(), FormError> {
    for _ in 0..depth {
        partial.end()?;
    }
    Ok(())
}

/// Gives every field of the struct in the current frame that was not written
/// its zero value.
fn fill_unset_fields(
    partial: &mut Partial<'static>,
    struct_type: StructType,
) -> Result<(), FormError> {
    for (index, field) in struct_type.fields.iter().enumerate() {
        if partial.is_field_set(index)? {
            continue;
        }
        partial.begin_nth_field(index)?;
        if let Some(default_fn) = field.vtable.default_fn {
            log::trace!("Setting field default for unset field: {}", field.name);
            partial.set_field_default(default_fn)?;
        } else if field.flags.contains(FieldFlags::DEFAULT)
            || field.shape().is(Characteristic::Default)
        {
            log::trace!("Setting default for unset field: {}", field.name);
            partial.set_default()?;
        } else {
            log::trace!("Zeroing unset field member-wise: {}", field.name);
            fill_zero(partial)?;
        }
        partial.end()?;
    }
    Ok(())
}

/// Writes the zero value of the current frame's type: its `Default`, or a
/// member-wise zero for structs, arrays and smart pointers.
fn fill_zero(partial: &mut Partial<'static>) -> Result<(), FormError> {
    let shape = partial.shape();
    if shape.is(Characteristic::Default) {
        partial.set_default()?;
        return Ok(());
    }

    match Kind::of(shape) {
        Kind::Record(struct_type) => fill_unset_fields(partial, struct_type),
        Kind::Array(array_def) => {
            for index in 0..array_def.n {
                partial.begin_nth_element(index)?;
                fill_zero(partial)?;
                partial.end()?;
            }
            Ok(())
        }
        _ => match shape.def {
            Def::Pointer(_) if unwrap_once(shape).is_some() => {
                log::trace!("Zeroing through smart pointer {shape}");
                partial.begin_smart_ptr()?;
                fill_zero(partial)?;
                partial.end()?;
                Ok(())
            }
            _ => Err(FormErrorKind::NoZeroValue(shape).into()),
        },
    }
}

impl Packed {
    fn describe(&self) -> &'static str {
        match self {
            Packed::Zero => "zero value",
            Packed::Value(_) => "value",
            Packed::Record(_) => "struct members",
            Packed::Map(_) => "map entries",
            Packed::Sequence { .. } => "list elements",
            Packed::Array { .. } => "array elements",
        }
    }
}
