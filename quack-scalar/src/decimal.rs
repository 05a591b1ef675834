use std::cmp::Ordering;
use std::fmt::{Display, Formatter};

use quack_dtype::DecimalType;
use quack_error::{QuackResult, quack_bail, quack_err};

/// A fixed-point value: the unscaled integer plus the width and scale of its type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DecimalValue {
    dtype: DecimalType,
    value: i128,
}

impl DecimalValue {
    /// Create a decimal, checking that the unscaled value fits the declared width.
    pub fn try_new(dtype: DecimalType, value: i128) -> QuackResult<Self> {
        if !dtype.fits(value) {
            quack_bail!(TypeMismatch: "{} does not fit in {}", value, dtype);
        }
        Ok(Self { dtype, value })
    }

    /// Shorthand for [`DecimalValue::try_new`] taking the width and scale directly.
    pub fn from_parts(width: u8, scale: u8, value: i128) -> QuackResult<Self> {
        Self::try_new(DecimalType::try_new(width, scale)?, value)
    }

    /// The declared type.
    pub fn decimal_type(&self) -> DecimalType {
        self.dtype
    }

    /// Total number of significant digits.
    pub fn width(&self) -> u8 {
        self.dtype.width()
    }

    /// Number of digits after the decimal point.
    pub fn scale(&self) -> u8 {
        self.dtype.scale()
    }

    /// The unscaled integer.
    pub fn value(&self) -> i128 {
        self.value
    }

    /// Convert to another decimal type, failing when digits would be lost or the result overflows.
    pub fn cast(&self, target: DecimalType) -> QuackResult<Self> {
        let value = match target.scale().cmp(&self.scale()) {
            Ordering::Equal => Some(self.value),
            Ordering::Greater => 10i128
                .checked_pow(u32::from(target.scale() - self.scale()))
                .and_then(|factor| self.value.checked_mul(factor)),
            Ordering::Less => {
                let factor = 10i128.pow(u32::from(self.scale() - target.scale()));
                (self.value % factor == 0).then_some(self.value / factor)
            }
        }
        .ok_or_else(|| quack_err!(TypeMismatch: "{} cannot be represented as {}", self, target))?;
        Self::try_new(target, value)
    }

    /// Approximate as a double.
    #[allow(clippy::cast_precision_loss)]
    pub fn to_f64(&self) -> f64 {
        self.value as f64 / 10f64.powi(i32::from(self.scale()))
    }
}

impl Display for DecimalValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let scale = usize::from(self.scale());
        let magnitude = self.value.unsigned_abs();
        let sign = if self.value < 0 { "-" } else { "" };
        if scale == 0 {
            return write!(f, "{sign}{magnitude}");
        }
        let factor = 10u128.pow(u32::from(self.scale()));
        write!(
            f,
            "{sign}{}.{:0>scale$}",
            magnitude / factor,
            magnitude % factor,
        )
    }
}
