//! Leaf type descriptors.

use std::fmt;

use crate::error::{Error, Result};

/// Kind of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeId {
    Empty,
    Object,
    List,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
    Char8Str,
}

impl TypeId {
    /// Every kind a leaf can hold, in canonical order.
    pub const LEAVES: [TypeId; 11] = [
        TypeId::Int8,
        TypeId::Int16,
        TypeId::Int32,
        TypeId::Int64,
        TypeId::UInt8,
        TypeId::UInt16,
        TypeId::UInt32,
        TypeId::UInt64,
        TypeId::Float32,
        TypeId::Float64,
        TypeId::Char8Str,
    ];

    pub fn name(self) -> &'static str {
        match self {
            TypeId::Empty => "empty",
            TypeId::Object => "object",
            TypeId::List => "list",
            TypeId::Int8 => "int8",
            TypeId::Int16 => "int16",
            TypeId::Int32 => "int32",
            TypeId::Int64 => "int64",
            TypeId::UInt8 => "uint8",
            TypeId::UInt16 => "uint16",
            TypeId::UInt32 => "uint32",
            TypeId::UInt64 => "uint64",
            TypeId::Float32 => "float32",
            TypeId::Float64 => "float64",
            TypeId::Char8Str => "char8_str",
        }
    }

    /// Resolve a canonical leaf name or a native type alias.
    ///
    /// `object` and `list` are not leaf names and are rejected.
    pub fn from_name(name: &str) -> Result<TypeId> {
        let id = match name.trim() {
            "empty" => TypeId::Empty,
            "int8" | "char" | "signed char" => TypeId::Int8,
            "int16" | "short" | "signed short" => TypeId::Int16,
            "int32" | "int" | "signed int" => TypeId::Int32,
            "int64" | "long" | "signed long" | "long long" | "signed long long" | "index_t" => {
                TypeId::Int64
            }
            "uint8" | "unsigned char" => TypeId::UInt8,
            "uint16" | "unsigned short" => TypeId::UInt16,
            "uint32" | "unsigned int" => TypeId::UInt32,
            "uint64" | "unsigned long" | "unsigned long long" => TypeId::UInt64,
            "float32" | "float" => TypeId::Float32,
            "float64" | "double" => TypeId::Float64,
            "char8_str" => TypeId::Char8Str,
            _ => return Err(Error::InvalidTypeName(name.to_string())),
        };
        Ok(id)
    }

    /// Natural element size in bytes; zero for non-leaf kinds.
    pub fn default_bytes(self) -> u64 {
        match self {
            TypeId::Empty | TypeId::Object | TypeId::List => 0,
            TypeId::Int8 | TypeId::UInt8 | TypeId::Char8Str => 1,
            TypeId::Int16 | TypeId::UInt16 => 2,
            TypeId::Int32 | TypeId::UInt32 | TypeId::Float32 => 4,
            TypeId::Int64 | TypeId::UInt64 | TypeId::Float64 => 8,
        }
    }

    pub fn is_signed_integer(self) -> bool {
        matches!(self, TypeId::Int8 | TypeId::Int16 | TypeId::Int32 | TypeId::Int64)
    }

    pub fn is_unsigned_integer(self) -> bool {
        matches!(self, TypeId::UInt8 | TypeId::UInt16 | TypeId::UInt32 | TypeId::UInt64)
    }

    pub fn is_integer(self) -> bool {
        self.is_signed_integer() || self.is_unsigned_integer()
    }

    pub fn is_float(self) -> bool {
        matches!(self, TypeId::Float32 | TypeId::Float64)
    }

    pub fn is_number(self) -> bool {
        self.is_integer() || self.is_float()
    }

    pub fn is_string(self) -> bool {
        self == TypeId::Char8Str
    }

    pub fn is_leaf(self) -> bool {
        self.is_number() || self.is_string()
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Byte order of a leaf. `Default` means the machine's order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Endianness {
    #[default]
    Default,
    Big,
    Little,
}

impl Endianness {
    pub fn machine() -> Endianness {
        if cfg!(target_endian = "big") {
            Endianness::Big
        } else {
            Endianness::Little
        }
    }

    /// Replace `Default` with the machine order.
    pub fn resolve(self) -> Endianness {
        match self {
            Endianness::Default => Endianness::machine(),
            other => other,
        }
    }

    pub fn is_big(self) -> bool {
        self.resolve() == Endianness::Big
    }

    pub fn name(self) -> &'static str {
        match self {
            Endianness::Default => "default",
            Endianness::Big => "big",
            Endianness::Little => "little",
        }
    }

    pub fn from_name(name: &str) -> Result<Endianness> {
        match name {
            "big" => Ok(Endianness::Big),
            "little" => Ok(Endianness::Little),
            "default" => Ok(Endianness::Default),
            other => Err(Error::Protocol(format!("unknown endianness {other:?}"))),
        }
    }
}

/// Layout of one leaf: kind, element count, byte offset, byte stride,
/// element size and byte order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DataType {
    id: TypeId,
    number_of_elements: u64,
    offset: u64,
    stride: u64,
    element_bytes: u64,
    endianness: Endianness,
}

macro_rules! leaf_ctor {
    ($($fn_name:ident => $id:ident),* $(,)?) => {
        $(
            pub fn $fn_name(number_of_elements: u64) -> DataType {
                DataType::with_defaults(TypeId::$id, number_of_elements)
            }
        )*
    };
}

impl DataType {
    pub fn new(
        id: TypeId,
        number_of_elements: u64,
        offset: u64,
        stride: u64,
        element_bytes: u64,
        endianness: Endianness,
    ) -> DataType {
        DataType {
            id,
            number_of_elements,
            offset,
            stride,
            element_bytes,
            endianness,
        }
    }

    /// Compact, machine-ordered layout of `number_of_elements` elements.
    pub fn with_defaults(id: TypeId, number_of_elements: u64) -> DataType {
        let bytes = id.default_bytes();
        DataType::new(id, number_of_elements, 0, bytes, bytes, Endianness::Default)
    }

    pub fn empty() -> DataType {
        DataType::with_defaults(TypeId::Empty, 0)
    }

    pub fn object() -> DataType {
        DataType::with_defaults(TypeId::Object, 0)
    }

    pub fn list() -> DataType {
        DataType::with_defaults(TypeId::List, 0)
    }

    leaf_ctor! {
        int8 => Int8,
        int16 => Int16,
        int32 => Int32,
        int64 => Int64,
        uint8 => UInt8,
        uint16 => UInt16,
        uint32 => UInt32,
        uint64 => UInt64,
        float32 => Float32,
        float64 => Float64,
        char8_str => Char8Str,
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.id.name()
    }

    pub fn number_of_elements(&self) -> u64 {
        self.number_of_elements
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn stride(&self) -> u64 {
        self.stride
    }

    pub fn element_bytes(&self) -> u64 {
        self.element_bytes
    }

    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    pub fn set_number_of_elements(&mut self, n: u64) {
        self.number_of_elements = n;
    }

    pub fn set_offset(&mut self, offset: u64) {
        self.offset = offset;
    }

    pub fn set_stride(&mut self, stride: u64) {
        self.stride = stride;
    }

    pub fn set_element_bytes(&mut self, bytes: u64) {
        self.element_bytes = bytes;
    }

    pub fn set_endianness(&mut self, endianness: Endianness) {
        self.endianness = endianness;
    }

    pub fn is_empty(&self) -> bool {
        self.id == TypeId::Empty
    }

    pub fn is_number(&self) -> bool {
        self.id.is_number()
    }

    pub fn is_string(&self) -> bool {
        self.id.is_string()
    }

    /// Byte position of element `index`.
    pub fn element_index(&self, index: u64) -> u64 {
        self.offset + index * self.stride
    }

    /// Bytes covered by the elements' strides.
    pub fn strided_bytes(&self) -> u64 {
        self.number_of_elements * self.stride
    }

    /// Smallest buffer length that holds every element, offset included.
    pub fn spanned_bytes(&self) -> u64 {
        match self.number_of_elements {
            0 => 0,
            n => self.offset + (n - 1) * self.stride + self.element_bytes,
        }
    }

    /// Bytes the elements take once packed.
    pub fn bytes_compact(&self) -> u64 {
        self.number_of_elements * self.element_bytes
    }

    pub fn is_compact(&self) -> bool {
        self.offset == 0 && (self.number_of_elements <= 1 || self.stride == self.element_bytes)
    }

    /// Packed copy of this layout, keeping the byte order.
    pub fn compact(&self) -> DataType {
        DataType {
            offset: 0,
            stride: self.element_bytes,
            ..*self
        }
    }

    /// Same kind, element count and element size; layout may differ.
    pub fn compatible(&self, other: &DataType) -> bool {
        self.id == other.id
            && self.number_of_elements == other.number_of_elements
            && self.element_bytes == other.element_bytes
    }
}

impl Default for DataType {
    fn default() -> Self {
        DataType::empty()
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[{}] (offset {}, stride {}, {} bytes, {})",
            self.id,
            self.number_of_elements,
            self.offset,
            self.stride,
            self.element_bytes,
            self.endianness.name()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases_resolve_to_canonical_kinds() {
        assert_eq!(TypeId::from_name("double").unwrap(), TypeId::Float64);
        assert_eq!(TypeId::from_name("short").unwrap(), TypeId::Int16);
        assert_eq!(TypeId::from_name("unsigned long long").unwrap(), TypeId::UInt64);
        assert_eq!(TypeId::from_name("index_t").unwrap(), TypeId::Int64);
        assert_eq!(TypeId::from_name("empty").unwrap(), TypeId::Empty);
        assert!(matches!(TypeId::from_name("float128"), Err(Error::InvalidTypeName(_))));
        assert!(TypeId::from_name("object").is_err());
    }

    #[test]
    fn byte_counts() {
        let mut dt = DataType::int32(5);
        assert_eq!(dt.strided_bytes(), 20);
        assert_eq!(dt.spanned_bytes(), 20);
        assert!(dt.is_compact());

        dt.set_offset(4);
        dt.set_stride(8);
        assert_eq!(dt.spanned_bytes(), 4 + 4 * 8 + 4);
        assert_eq!(dt.strided_bytes(), 40);
        assert_eq!(dt.bytes_compact(), 20);
        assert!(!dt.is_compact());
        assert_eq!(dt.compact(), DataType::int32(5));
        assert!(dt.compatible(&DataType::int32(5)));
        assert!(!dt.compatible(&DataType::int32(4)));
    }

    #[test]
    fn zero_elements_span_nothing() {
        let dt = DataType::new(TypeId::Float64, 0, 16, 8, 8, Endianness::Big);
        assert_eq!(dt.spanned_bytes(), 0);
        assert_eq!(dt.strided_bytes(), 0);
    }

    #[test]
    fn endianness_resolution() {
        assert_eq!(Endianness::Default.resolve(), Endianness::machine());
        assert!(Endianness::Big.is_big());
        assert!(Endianness::from_name("middle").is_err());
    }
}
