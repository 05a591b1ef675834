use std::fmt::{Display, Formatter};

use quack_error::{QuackError, QuackResult, quack_bail};

use crate::{LogicalType, TypeId};

/// Largest width the engine accepts for a decimal.
pub const MAX_DECIMAL_WIDTH: u8 = 38;

/// Parameters that define the width and scale of a decimal type.
///
/// Neither is stored alongside the values: a vector of decimals only holds the unscaled integers, and
/// the reader takes width and scale from the column type.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct DecimalType {
    width: u8,
    scale: u8,
}

/// The integer the engine stores a decimal in, chosen from the declared width.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum DecimalStorage {
    /// Widths 1 to 4.
    I16,
    /// Widths 5 to 9.
    I32,
    /// Widths 10 to 18.
    I64,
    /// Widths 19 to 38.
    I128,
}

impl DecimalStorage {
    /// Bytes per slot.
    pub fn byte_width(self) -> usize {
        match self {
            DecimalStorage::I16 => 2,
            DecimalStorage::I32 => 4,
            DecimalStorage::I64 => 8,
            DecimalStorage::I128 => 16,
        }
    }

    /// The tag of the integer type the engine reports as the decimal's internal type.
    pub fn type_id(self) -> TypeId {
        match self {
            DecimalStorage::I16 => TypeId::SmallInt,
            DecimalStorage::I32 => TypeId::Integer,
            DecimalStorage::I64 => TypeId::BigInt,
            DecimalStorage::I128 => TypeId::HugeInt,
        }
    }

    /// The storage named by an internal-type tag.
    pub fn from_type_id(id: TypeId) -> QuackResult<Self> {
        Ok(match id {
            TypeId::SmallInt => DecimalStorage::I16,
            TypeId::Integer => DecimalStorage::I32,
            TypeId::BigInt => DecimalStorage::I64,
            TypeId::HugeInt => DecimalStorage::I128,
            other => quack_bail!(UnsupportedType: "{} is not a decimal storage type", other),
        })
    }
}

impl DecimalType {
    /// Checked constructor for a `DecimalType`.
    pub fn try_new(width: u8, scale: u8) -> QuackResult<Self> {
        if width == 0 || width > MAX_DECIMAL_WIDTH {
            quack_bail!("decimal width {} must be between 1 and {}", width, MAX_DECIMAL_WIDTH);
        }
        if scale > width {
            quack_bail!("decimal scale {} exceeds width {}", scale, width);
        }
        Ok(Self { width, scale })
    }

    /// Total number of significant decimal digits.
    pub fn width(&self) -> u8 {
        self.width
    }

    /// Number of digits after the decimal point.
    pub fn scale(&self) -> u8 {
        self.scale
    }

    /// The integer width the engine uses for this decimal.
    pub fn storage(&self) -> DecimalStorage {
        match self.width {
            1..=4 => DecimalStorage::I16,
            5..=9 => DecimalStorage::I32,
            10..=18 => DecimalStorage::I64,
            _ => DecimalStorage::I128,
        }
    }

    /// Largest unscaled value representable at this width, `10^width - 1`.
    pub fn max_unscaled(&self) -> i128 {
        10i128.pow(u32::from(self.width)) - 1
    }

    /// Whether an unscaled value fits the declared width.
    pub fn fits(&self, unscaled: i128) -> bool {
        unscaled.unsigned_abs() <= self.max_unscaled().unsigned_abs()
    }
}

impl Display for DecimalType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "DECIMAL({},{})", self.width, self.scale)
    }
}

impl TryFrom<&LogicalType> for DecimalType {
    type Error = QuackError;

    fn try_from(value: &LogicalType) -> Result<Self, Self::Error> {
        match value {
            LogicalType::Decimal(dt) => Ok(*dt),
            _ => quack_bail!(TypeMismatch: "Cannot convert type {value} into DecimalType"),
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(1, DecimalStorage::I16)]
    #[case(4, DecimalStorage::I16)]
    #[case(5, DecimalStorage::I32)]
    #[case(9, DecimalStorage::I32)]
    #[case(10, DecimalStorage::I64)]
    #[case(18, DecimalStorage::I64)]
    #[case(19, DecimalStorage::I128)]
    #[case(38, DecimalStorage::I128)]
    fn storage_by_width(#[case] width: u8, #[case] storage: DecimalStorage) {
        assert_eq!(DecimalType::try_new(width, 0).unwrap().storage(), storage);
    }

    #[test]
    fn rejects_bad_parameters() {
        assert!(DecimalType::try_new(0, 0).is_err());
        assert!(DecimalType::try_new(39, 0).is_err());
        assert!(DecimalType::try_new(4, 5).is_err());
    }

    #[test]
    fn bounds() {
        let dt = DecimalType::try_new(9, 4).unwrap();
        assert_eq!(dt.to_string(), "DECIMAL(9,4)");
        assert_eq!(dt.max_unscaled(), 999_999_999);
        assert!(dt.fits(-999_999_999));
        assert!(!dt.fits(1_000_000_000));

        let wide = DecimalType::try_new(38, 0).unwrap();
        assert!(wide.fits(10i128.pow(38) - 1));
    }
}
