//! Node leaf types to HDF5 datatypes and back.

use rustyconduit::{DataType, TypeId};
use rustyconduit_format::{ByteOrder, CharacterSet, Datatype, StringPadding};

/// Tag of the opaque type that stores an empty node.
pub const EMPTY_TAG: &str = "conduit empty";

/// Attribute that marks a group as a list.
pub const LIST_MARKER: &str = "__conduit_list";

pub(crate) fn byte_order(dtype: &DataType) -> ByteOrder {
    if dtype.endianness().is_big() {
        ByteOrder::BigEndian
    } else {
        ByteOrder::LittleEndian
    }
}

/// The datatype a new dataset for `dtype` gets; numbers keep the leaf's
/// byte order.
pub(crate) fn datatype_for(dtype: &DataType) -> Datatype {
    let id = dtype.id();
    let size = id.default_bytes() as u32;
    match id {
        TypeId::Char8Str => Datatype::String {
            size: dtype.number_of_elements().max(1) as u32,
            padding: StringPadding::NullTerminate,
            charset: CharacterSet::Ascii,
        },
        _ if id.is_float() => Datatype::FloatingPoint {
            size,
            byte_order: byte_order(dtype),
        },
        _ if id.is_integer() => Datatype::FixedPoint {
            size,
            byte_order: byte_order(dtype),
            signed: id.is_signed_integer(),
        },
        _ => Datatype::Opaque {
            size: 1,
            tag: EMPTY_TAG.to_string(),
        },
    }
}

/// Leaf kind of a stored datatype, if it maps onto one.
pub(crate) fn type_id_of(datatype: &Datatype) -> Option<TypeId> {
    Some(match datatype {
        Datatype::FixedPoint { size, signed: true, .. } => match size {
            1 => TypeId::Int8,
            2 => TypeId::Int16,
            4 => TypeId::Int32,
            8 => TypeId::Int64,
            _ => return None,
        },
        Datatype::FixedPoint { size, signed: false, .. } => match size {
            1 => TypeId::UInt8,
            2 => TypeId::UInt16,
            4 => TypeId::UInt32,
            8 => TypeId::UInt64,
            _ => return None,
        },
        Datatype::FloatingPoint { size: 4, .. } => TypeId::Float32,
        Datatype::FloatingPoint { size: 8, .. } => TypeId::Float64,
        Datatype::String { .. } | Datatype::VariableLength { is_string: true, .. } => TypeId::Char8Str,
        Datatype::Opaque { tag, .. } if tag == EMPTY_TAG => TypeId::Empty,
        _ => return None,
    })
}

/// Short description for messages.
pub(crate) fn describe(datatype: &Datatype) -> String {
    match type_id_of(datatype) {
        Some(TypeId::Char8Str) => match datatype {
            Datatype::String { size, .. } => format!("char8_str[{size}]"),
            _ => "variable-length string".to_string(),
        },
        Some(id) => id.name().to_string(),
        None => format!("{datatype:?}"),
    }
}

/// Reverse each `size`-byte element in place.
pub(crate) fn swap_elements(bytes: &mut [u8], size: usize) {
    if size > 1 {
        for element in bytes.chunks_exact_mut(size) {
            element.reverse();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustyconduit::Endianness;

    #[test]
    fn every_leaf_kind_maps_back() {
        for id in TypeId::LEAVES {
            let dtype = DataType::with_defaults(id, 3);
            assert_eq!(type_id_of(&datatype_for(&dtype)), Some(id), "{id}");
        }
        assert_eq!(type_id_of(&datatype_for(&DataType::empty())), Some(TypeId::Empty));
    }

    #[test]
    fn byte_order_follows_the_leaf() {
        let mut dtype = DataType::int32(1);
        dtype.set_endianness(Endianness::Big);
        assert_eq!(datatype_for(&dtype).byte_order(), Some(ByteOrder::BigEndian));
    }

    #[test]
    fn swapping() {
        let mut b = [1u8, 2, 3, 4, 5, 6];
        swap_elements(&mut b, 2);
        assert_eq!(b, [2, 1, 4, 3, 6, 5]);
    }
}
