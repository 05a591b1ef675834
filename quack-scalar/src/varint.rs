use std::fmt::{Display, Formatter};

use quack_error::{QuackResult, quack_bail};

const HEADER_LEN: usize = 3;

/// An arbitrary-precision `VARINT` in the engine's byte layout.
///
/// Three header bytes come first; the top bit of the first one is set for non-negative values. The
/// magnitude follows big-endian, with every byte inverted when the value is negative.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VarInt {
    data: Vec<u8>,
}

impl VarInt {
    /// Wrap bytes already in the engine layout.
    pub fn from_raw(data: Vec<u8>) -> QuackResult<Self> {
        if data.len() <= HEADER_LEN {
            quack_bail!("a varint needs a header and at least one data byte, got {} bytes", data.len());
        }
        Ok(Self { data })
    }

    /// The engine layout.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Whether the value is below zero.
    pub fn is_negative(&self) -> bool {
        self.data[0] & 0x80 == 0
    }

    /// The absolute value as big-endian bytes.
    pub fn magnitude(&self) -> Vec<u8> {
        let mask = if self.is_negative() { 0xff } else { 0 };
        self.data[HEADER_LEN..].iter().map(|b| b ^ mask).collect()
    }

    /// The value, if it fits an `i128`.
    pub fn to_i128(&self) -> Option<i128> {
        let mut magnitude: u128 = 0;
        for byte in self.magnitude() {
            magnitude = magnitude.checked_mul(256)? | u128::from(byte);
        }
        if self.is_negative() {
            0i128.checked_sub_unsigned(magnitude)
        } else {
            i128::try_from(magnitude).ok()
        }
    }
}

impl Display for VarInt {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut digits = Vec::new();
        let mut magnitude = self.magnitude();
        while magnitude.iter().any(|&b| b != 0) {
            let mut remainder = 0u32;
            for byte in magnitude.iter_mut() {
                let acc = (remainder << 8) | u32::from(*byte);
                // acc < 2560, so the quotient fits a byte
                *byte = u8::try_from(acc / 10).unwrap_or_default();
                remainder = acc % 10;
            }
            digits.push(char::from(b'0' + u8::try_from(remainder).unwrap_or_default()));
        }
        if digits.is_empty() {
            return f.write_str("0");
        }
        if self.is_negative() {
            f.write_str("-")?;
        }
        f.write_str(&digits.iter().rev().collect::<String>())
    }
}
