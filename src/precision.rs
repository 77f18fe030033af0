//! Numeric precision of a centrality computation.
//!
//! Precision is a closed two-variant choice made once at the API boundary.
//! Everything below the boundary is generic over [`CentralityScalar`], so an
//! unsupported precision can only be rejected while parsing user input.

use core::fmt;
use core::str::FromStr;

use num_traits::{Float, NumCast};
use serde::{Deserialize, Serialize};

use crate::error::BetweennessError;

/// Floating-point width used for graph weights and centrality buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Precision {
    /// 32-bit IEEE 754 (`f32`).
    F32,
    /// 64-bit IEEE 754 (`f64`).
    #[default]
    F64,
}

impl Precision {
    /// Width in bits.
    pub const fn bits(self) -> u32 {
        match self {
            Self::F32 => 32,
            Self::F64 => 64,
        }
    }

    /// Canonical dtype name (`float32` / `float64`).
    pub const fn name(self) -> &'static str {
        match self {
            Self::F32 => "float32",
            Self::F64 => "float64",
        }
    }

    /// Selects a precision from a bit width.
    ///
    /// # Errors
    /// Returns [`BetweennessError::UnsupportedPrecision`] for anything other than 32 or 64.
    pub fn from_bits(bits: u32) -> Result<Self, BetweennessError> {
        match bits {
            32 => Ok(Self::F32),
            64 => Ok(Self::F64),
            other => Err(BetweennessError::UnsupportedPrecision {
                requested: format!("{other}-bit"),
            }),
        }
    }
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Precision {
    type Err = BetweennessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "float32" | "f32" | "32" | "single" => Ok(Self::F32),
            "float64" | "f64" | "64" | "double" => Ok(Self::F64),
            _ => Err(BetweennessError::UnsupportedPrecision {
                requested: s.to_owned(),
            }),
        }
    }
}

impl TryFrom<String> for Precision {
    type Error = BetweennessError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Precision> for String {
    fn from(value: Precision) -> Self {
        value.name().to_owned()
    }
}

/// Scalar type a centrality kernel can be instantiated with.
///
/// Implemented for `f32` and `f64` only; the set is closed so that
/// [`Precision`] and the scalar types stay in one-to-one correspondence.
pub trait CentralityScalar:
    Float + NumCast + Default + fmt::Debug + Send + Sync + 'static + sealed::Sealed
{
    /// The precision tag matching this scalar.
    const PRECISION: Precision;

    /// Converts a count into this scalar.
    #[inline]
    fn from_count(count: usize) -> Self {
        <Self as NumCast>::from(count).unwrap_or_else(Self::infinity)
    }

    /// Widens into `f64` for result tables.
    #[inline]
    fn widen(self) -> f64 {
        self.to_f64().unwrap_or(f64::NAN)
    }

    /// Narrows an `f64` host value into this scalar.
    #[inline]
    fn narrow(value: f64) -> Self {
        <Self as NumCast>::from(value).unwrap_or_else(Self::nan)
    }
}

impl CentralityScalar for f32 {
    const PRECISION: Precision = Precision::F32;
}

impl CentralityScalar for f64 {
    const PRECISION: Precision = Precision::F64;
}

mod sealed {
    pub trait Sealed {}
    impl Sealed for f32 {}
    impl Sealed for f64 {}
}

/// Instantiates `$body` once per precision with `$t` bound to the scalar type.
///
/// ```
/// use edgebc::{with_precision, Precision};
///
/// let bytes = with_precision!(Precision::F32, T => core::mem::size_of::<T>());
/// assert_eq!(bytes, 4);
/// ```
#[macro_export]
macro_rules! with_precision {
    ($precision:expr, $t:ident => $body:expr) => {
        match $precision {
            $crate::Precision::F32 => {
                type $t = f32;
                $body
            }
            $crate::Precision::F64 => {
                type $t = f64;
                $body
            }
        }
    };
}
