use std::fmt;
use std::ops::{Index, IndexMut};

/// A 4-bit unsigned integer (nibble), used for register and key selectors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[allow(non_camel_case_types)]
pub struct u4(u8);

impl u4 {
    pub const MAX: u4 = u4(0x0F);

    /// Creates a new `u4` from a `u8`.
    ///
    /// Panics if the value is greater than 0x0F.
    pub const fn new(value: u8) -> Self {
        assert!(value <= 0x0F, "u4 value must be in range 0x0-0xF");
        Self(value)
    }

    /// Creates a new `u4` from the low 4 bits of `value`.
    pub const fn wrapping(value: u8) -> Self {
        Self(value & 0x0F)
    }

    pub const fn get(self) -> u8 {
        self.0
    }
}

impl From<u4> for usize {
    fn from(v: u4) -> usize {
        v.0 as usize
    }
}

impl From<u4> for u8 {
    fn from(v: u4) -> u8 {
        v.0
    }
}

impl fmt::Display for u4 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:X}", self.0)
    }
}

impl<T> Index<u4> for [T; 16] {
    type Output = T;

    fn index(&self, index: u4) -> &Self::Output {
        &self[index.0 as usize]
    }
}

impl<T> IndexMut<u4> for [T; 16] {
    fn index_mut(&mut self, index: u4) -> &mut Self::Output {
        &mut self[index.0 as usize]
    }
}

/// A 12-bit unsigned integer, the width of a machine address.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[allow(non_camel_case_types)]
pub struct u12(u16);

impl u12 {
    /// Creates a new `u12` from a `u16`.
    ///
    /// Panics if the value is greater than 0x0FFF.
    pub const fn new(value: u16) -> Self {
        assert!(value <= 0x0FFF, "u12 value must be in range 0x000-0xFFF");
        Self(value)
    }

    /// Creates a new `u12` from the low 12 bits of `value`.
    pub const fn wrapping(value: u16) -> Self {
        Self(value & 0x0FFF)
    }

    pub const fn get(self) -> u16 {
        self.0
    }
}

impl From<u12> for u16 {
    fn from(v: u12) -> u16 {
        v.0
    }
}

impl From<u12> for usize {
    fn from(v: u12) -> usize {
        v.0 as usize
    }
}

impl fmt::Display for u12 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:03X}", self.0)
    }
}
