//! Typed access to leaf bytes.

use std::fmt;

use crate::dtype::TypeId;

mod sealed {
    pub trait Sealed {}
}

/// Rust primitive that maps onto a numeric leaf kind.
pub trait Element: sealed::Sealed + Copy + Default + fmt::Debug + PartialEq + 'static {
    const ID: TypeId;

    /// Decode from the first `size_of::<Self>()` bytes.
    fn read(bytes: &[u8], big: bool) -> Self;

    fn write(self, out: &mut [u8], big: bool);

    fn into_num(self) -> Num;

    /// Convert with `as` semantics.
    fn from_num(num: Num) -> Self;
}

/// A numeric value of any leaf kind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Num {
    Int(i64),
    UInt(u64),
    Float(f64),
}

impl Num {
    pub fn as_i64(self) -> i64 {
        match self {
            Num::Int(v) => v,
            Num::UInt(v) => v as i64,
            Num::Float(v) => v as i64,
        }
    }

    pub fn as_u64(self) -> u64 {
        match self {
            Num::Int(v) => v as u64,
            Num::UInt(v) => v,
            Num::Float(v) => v as u64,
        }
    }

    pub fn as_f64(self) -> f64 {
        match self {
            Num::Int(v) => v as f64,
            Num::UInt(v) => v as f64,
            Num::Float(v) => v,
        }
    }

    /// Value equality where NaN equals NaN.
    pub fn same(self, other: Num) -> bool {
        match (self, other) {
            (Num::Int(a), Num::Int(b)) => a == b,
            (Num::UInt(a), Num::UInt(b)) => a == b,
            (Num::Float(a), Num::Float(b)) => a == b || (a.is_nan() && b.is_nan()),
            (a, b) => a.as_f64() == b.as_f64(),
        }
    }
}

impl fmt::Display for Num {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Num::Int(v) => write!(f, "{v}"),
            Num::UInt(v) => write!(f, "{v}"),
            Num::Float(v) => write!(f, "{v}"),
        }
    }
}

macro_rules! element {
    ($($t:ty => $id:ident, $variant:ident;)*) => {
        $(
            impl sealed::Sealed for $t {}

            impl Element for $t {
                const ID: TypeId = TypeId::$id;

                fn read(bytes: &[u8], big: bool) -> Self {
                    const N: usize = std::mem::size_of::<$t>();
                    let mut raw = [0u8; N];
                    raw.copy_from_slice(&bytes[..N]);
                    if big {
                        <$t>::from_be_bytes(raw)
                    } else {
                        <$t>::from_le_bytes(raw)
                    }
                }

                fn write(self, out: &mut [u8], big: bool) {
                    let raw = if big { self.to_be_bytes() } else { self.to_le_bytes() };
                    out[..raw.len()].copy_from_slice(&raw);
                }

                fn into_num(self) -> Num {
                    Num::$variant(self as _)
                }

                fn from_num(num: Num) -> Self {
                    match num {
                        Num::Int(v) => v as $t,
                        Num::UInt(v) => v as $t,
                        Num::Float(v) => v as $t,
                    }
                }
            }
        )*
    };
}

element! {
    i8 => Int8, Int;
    i16 => Int16, Int;
    i32 => Int32, Int;
    i64 => Int64, Int;
    u8 => UInt8, UInt;
    u16 => UInt16, UInt;
    u32 => UInt32, UInt;
    u64 => UInt64, UInt;
    f32 => Float32, Float;
    f64 => Float64, Float;
}

macro_rules! dispatch {
    ($id:expr, $t:ident => $body:expr, _ => $fallback:expr) => {
        match $id {
            TypeId::Int8 => { type $t = i8; $body }
            TypeId::Int16 => { type $t = i16; $body }
            TypeId::Int32 => { type $t = i32; $body }
            TypeId::Int64 => { type $t = i64; $body }
            TypeId::UInt8 => { type $t = u8; $body }
            TypeId::UInt16 => { type $t = u16; $body }
            TypeId::UInt32 => { type $t = u32; $body }
            TypeId::UInt64 => { type $t = u64; $body }
            TypeId::Float32 => { type $t = f32; $body }
            TypeId::Float64 => { type $t = f64; $body }
            _ => $fallback,
        }
    };
}

/// Decode one element of kind `id`; `None` for non-numeric kinds.
pub(crate) fn read_num(id: TypeId, bytes: &[u8], big: bool) -> Option<Num> {
    dispatch!(id, T => Some(T::read(bytes, big).into_num()), _ => None)
}

/// Encode `num` as kind `id`; returns false for non-numeric kinds.
pub(crate) fn write_num(id: TypeId, num: Num, out: &mut [u8], big: bool) -> bool {
    dispatch!(id, T => { T::from_num(num).write(out, big); true }, _ => false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_write_both_orders() {
        let mut buf = [0u8; 4];
        0x0102_0304i32.write(&mut buf, true);
        assert_eq!(buf, [1, 2, 3, 4]);
        assert_eq!(i32::read(&buf, true), 0x0102_0304);
        assert_eq!(i32::read(&buf, false), 0x0403_0201);
    }

    #[test]
    fn reads_take_the_leading_bytes() {
        let buf = [0x34u8, 0x12, 0xff, 0xff, 0xff];
        assert_eq!(u16::read(&buf, false), 0x1234);
        assert_eq!(u8::read(&buf[2..], true), 0xff);
        assert_eq!(i32::read(&buf[1..], false), -238);
    }

    #[test]
    fn dynamic_dispatch_matches_static() {
        let mut buf = [0u8; 8];
        assert!(write_num(TypeId::Float64, Num::Int(3), &mut buf, false));
        assert_eq!(f64::read(&buf, false), 3.0);
        assert_eq!(read_num(TypeId::Float64, &buf, false), Some(Num::Float(3.0)));
        assert_eq!(read_num(TypeId::Char8Str, &buf, false), None);
        assert!(!write_num(TypeId::Empty, Num::Int(1), &mut buf, false));
    }

    #[test]
    fn nan_is_same_as_nan() {
        assert!(Num::Float(f64::NAN).same(Num::Float(f64::NAN)));
        assert!(Num::Int(2).same(Num::Float(2.0)));
        assert!(!Num::UInt(1).same(Num::UInt(2)));
    }
}
