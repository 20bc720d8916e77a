//! Typed, access-controlled module parameters.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{Error, Result};

/// The access class required to read or write a parameter.
///
/// Ordered from least to most trust required: a caller that can prove
/// `Dependency`-level access also satisfies a `Public`-class check, and a
/// caller that can prove `Private`-level access (it *is* the owner)
/// satisfies any class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AccessClass {
    /// Any caller through the context-level API.
    Public,
    /// Any module holding an (acquired or static) dependency on the owner.
    Dependency,
    /// Only the owning module.
    Private,
}

/// The scalar width and signedness of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    /// Unsigned types of the given bit width.
    U8,
    U16,
    U32,
    U64,
    /// Signed types of the given bit width.
    I8,
    I16,
    I32,
    I64,
}

/// A parameter's typed scalar value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ParamValue {
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
}

impl ParamValue {
    const fn ty(self) -> ParamType {
        match self {
            Self::U8(_) => ParamType::U8,
            Self::U16(_) => ParamType::U16,
            Self::U32(_) => ParamType::U32,
            Self::U64(_) => ParamType::U64,
            Self::I8(_) => ParamType::I8,
            Self::I16(_) => ParamType::I16,
            Self::I32(_) => ParamType::I32,
            Self::I64(_) => ParamType::I64,
        }
    }

    fn to_bits(self) -> u64 {
        match self {
            Self::U8(v) => u64::from(v),
            Self::U16(v) => u64::from(v),
            Self::U32(v) => u64::from(v),
            Self::U64(v) => v,
            Self::I8(v) => v as i64 as u64,
            Self::I16(v) => v as i64 as u64,
            Self::I32(v) => v as i64 as u64,
            Self::I64(v) => v as u64,
        }
    }

    fn from_bits(ty: ParamType, bits: u64) -> Self {
        match ty {
            ParamType::U8 => Self::U8(bits as u8),
            ParamType::U16 => Self::U16(bits as u16),
            ParamType::U32 => Self::U32(bits as u32),
            ParamType::U64 => Self::U64(bits),
            ParamType::I8 => Self::I8(bits as i64 as i8),
            ParamType::I16 => Self::I16(bits as i64 as i16),
            ParamType::I32 => Self::I32(bits as i64 as i32),
            ParamType::I64 => Self::I64(bits as i64),
        }
    }
}

/// A declaration for a module-owned parameter, carried on its export
/// record.
#[derive(Debug, Clone, Copy)]
pub struct ParameterDecl {
    /// The parameter's name, unique within its owning module.
    pub name: &'static str,
    /// The default value installed when the module is constructed.
    pub default: ParamValue,
    /// The access class required to read the parameter.
    pub read_class: AccessClass,
    /// The access class required to write the parameter.
    pub write_class: AccessClass,
}

/// A live, atomically-accessed parameter instance owned by one module.
#[derive(Debug)]
pub struct Parameter {
    ty: ParamType,
    read_class: AccessClass,
    write_class: AccessClass,
    // Stored as a 64-bit-wide atomic regardless of the declared width; the
    // declared `ty` governs how bits are (re)interpreted on access.
    bits: AtomicU64,
}

impl Parameter {
    pub(crate) fn new(decl: &ParameterDecl) -> Self {
        Self {
            ty: decl.default.ty(),
            read_class: decl.read_class,
            write_class: decl.write_class,
            bits: AtomicU64::new(decl.default.to_bits()),
        }
    }

    /// Reads the current value after checking `asserted` satisfies this
    /// parameter's read-class requirement.
    pub(crate) fn get(&self, asserted: AccessClass) -> Result<ParamValue> {
        if asserted < self.read_class {
            return Err(Error::forbidden().with_context("parameter read requires a higher access class"));
        }
        Ok(ParamValue::from_bits(self.ty, self.bits.load(Ordering::Acquire)))
    }

    /// Writes `value` after checking `asserted` satisfies this parameter's
    /// write-class requirement and that `value`'s type matches.
    pub(crate) fn set(&self, asserted: AccessClass, value: ParamValue) -> Result<()> {
        if asserted < self.write_class {
            return Err(Error::forbidden().with_context("parameter write requires a higher access class"));
        }
        if value.ty() != self.ty {
            return Err(Error::type_mismatch());
        }
        self.bits.store(value.to_bits(), Ordering::Release);
        Ok(())
    }
}
