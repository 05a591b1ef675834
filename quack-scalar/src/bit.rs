use std::fmt::{Display, Formatter};
use std::str::FromStr;

use quack_error::{QuackError, QuackResult, quack_bail, quack_err};

/// A `BIT` string in the engine's byte layout.
///
/// The first byte holds the number of padding bits; the bit string follows, most significant bit
/// first, starting `padding` bits into the second byte. Padding bits are set.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BitValue {
    data: Vec<u8>,
}

impl BitValue {
    /// Wrap bytes already in the engine layout.
    pub fn from_raw(data: Vec<u8>) -> QuackResult<Self> {
        match data.first() {
            None => quack_bail!("a bit string needs at least its padding byte"),
            Some(&padding) if padding > 7 || (data.len() == 1 && padding != 0) => {
                quack_bail!("invalid bit string padding {}", padding)
            }
            Some(_) => Ok(Self { data }),
        }
    }

    /// Build from individual bits.
    pub fn from_bools(bits: &[bool]) -> Self {
        let padding = (8 - bits.len() % 8) % 8;
        let mut data = vec![0u8; 1 + (bits.len() + padding) / 8];
        // padding is at most 7
        data[0] = u8::try_from(padding).unwrap_or_default();
        for pos in 0..padding {
            data[1] |= 0x80 >> pos;
        }
        for (i, bit) in bits.iter().enumerate() {
            if *bit {
                let pos = i + padding;
                data[pos / 8 + 1] |= 0x80 >> (pos % 8);
            }
        }
        Self { data }
    }

    /// The engine layout.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    fn padding(&self) -> usize {
        usize::from(self.data[0])
    }

    /// Number of bits.
    pub fn len(&self) -> usize {
        (self.data.len() - 1) * 8 - self.padding()
    }

    /// Whether the bit string is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The bit at `index`, counting from the most significant end.
    pub fn get(&self, index: usize) -> bool {
        let pos = index + self.padding();
        (self.data[pos / 8 + 1] >> (7 - pos % 8)) & 1 == 1
    }

    /// All bits in order.
    pub fn to_bools(&self) -> Vec<bool> {
        (0..self.len()).map(|i| self.get(i)).collect()
    }
}

impl Display for BitValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for i in 0..self.len() {
            f.write_str(if self.get(i) { "1" } else { "0" })?;
        }
        Ok(())
    }
}

impl FromStr for BitValue {
    type Err = QuackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bits = s
            .chars()
            .map(|c| match c {
                '0' => Ok(false),
                '1' => Ok(true),
                other => Err(quack_err!("invalid bit character '{}'", other)),
            })
            .collect::<QuackResult<Vec<_>>>()?;
        Ok(Self::from_bools(&bits))
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("")]
    #[case("1")]
    #[case("0101")]
    #[case("10101010")]
    #[case("110011001")]
    fn string_round_trip(#[case] bits: &str) {
        let value: BitValue = bits.parse().unwrap();
        assert_eq!(value.len(), bits.len());
        assert_eq!(value.to_string(), bits);
        assert_eq!(BitValue::from_raw(value.as_bytes().to_vec()).unwrap(), value);
    }

    #[test]
    fn layout_matches_engine() {
        // '0101' has 4 padding bits, which are set
        let value: BitValue = "0101".parse().unwrap();
        assert_eq!(value.as_bytes(), &[4, 0b1111_0101]);
    }

    #[test]
    fn rejects_bad_input() {
        assert!("012".parse::<BitValue>().is_err());
        assert!(BitValue::from_raw(vec![]).is_err());
        assert!(BitValue::from_raw(vec![9, 0]).is_err());
    }
}
