//! Value types with a cell representation of their own
use core::{fmt, ops::Deref};

use crate::{
    CellError, ResultExt,
    bits::{BitsError, Error},
    de::{CellDecode, CellParser},
    ser::{CellBuilder, CellEncode},
};

/// UTF-8 string prefixed with its length in bytes
/// ```tlb
/// len:uint8 bytes:(len * uint8)
/// ```
#[derive(Debug, Default, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LengthPrefixedString(String);

impl LengthPrefixedString {
    pub const MAX_BYTES: usize = u8::MAX as usize;

    #[inline]
    pub fn new(s: impl Into<String>) -> Result<Self, CellError> {
        let s = s.into();
        if s.len() > Self::MAX_BYTES {
            return Err(BitsError::Overflow {
                value: format!("string of {} bytes", s.len()),
                bits: 8,
            }
            .into());
        }
        Ok(Self(s))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[inline]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl Deref for LengthPrefixedString {
    type Target = str;

    #[inline]
    fn deref(&self) -> &Self::Target {
        self.as_str()
    }
}

impl fmt::Display for LengthPrefixedString {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for LengthPrefixedString {
    type Error = CellError;

    #[inline]
    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl TryFrom<&str> for LengthPrefixedString {
    type Error = CellError;

    #[inline]
    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl CellEncode for LengthPrefixedString {
    fn encode(&self, builder: &mut CellBuilder) -> Result<(), CellError> {
        let len = u8::try_from(self.0.len()).map_err(|_| {
            CellError::from(BitsError::Overflow {
                value: self.0.len().to_string(),
                bits: 8,
            })
        })?;
        builder
            // len:uint8
            .store(len)
            .context("len")?
            // bytes:(len * uint8)
            .store_bytes(self.0.as_bytes())
            .context("bytes")?;
        Ok(())
    }
}

impl CellDecode for LengthPrefixedString {
    fn decode(parser: &mut CellParser<'_>) -> Result<Self, CellError> {
        let len: u8 = parser.parse().context("len")?;
        let bytes = parser.load_bytes(len as usize).context("bytes")?;
        String::from_utf8(bytes)
            .map(Self)
            .map_err(CellError::custom)
            .context("bytes")
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use crate::{
        Cell,
        bits::var::{Coins, Unary, VarUint},
        ser::CellEncodeExt,
        tests::assert_encode_decode_eq,
    };

    use super::*;

    #[test]
    fn string_layout() {
        let s = LengthPrefixedString::new("hi").unwrap();
        let cell = s.to_cell().unwrap();
        assert_eq!(cell.bits().to_string(), "000000100110100001101001");
        assert_eq!(cell.parse_fully::<LengthPrefixedString>().unwrap(), s);
    }

    #[rstest]
    #[case("")]
    #[case("TON")]
    #[case("юникод")]
    fn string_round_trip(#[case] s: &str) {
        assert_encode_decode_eq(LengthPrefixedString::new(s).unwrap());
    }

    #[test]
    fn string_too_long() {
        assert!(LengthPrefixedString::new("x".repeat(256)).is_err());
        assert!(LengthPrefixedString::new("x".repeat(123)).is_ok());
    }

    #[test]
    fn malformed_utf8() {
        let mut builder = Cell::builder();
        builder.store(2u8).unwrap().store_bytes([0xC3, 0x28]).unwrap();
        let cell = builder.build().unwrap();
        assert!(cell.parse_fully::<LengthPrefixedString>().is_err());
    }

    #[rstest]
    #[case(0u64)]
    #[case(1)]
    #[case(1_000_000_000)]
    #[case(u64::MAX)]
    fn coins(#[case] value: u64) {
        assert_encode_decode_eq(Coins::from(value));
    }

    #[test]
    fn zero_coins_are_four_bits() {
        let cell = Coins::from(0u8).to_cell().unwrap();
        assert_eq!(cell.bits().to_string(), "0000");
    }

    #[test]
    fn var_uint_with_short_length() {
        assert_encode_decode_eq(VarUint::<3>::from(0xABCDu16));
    }

    #[rstest]
    #[case(0)]
    #[case(3)]
    #[case(17)]
    fn unary(#[case] n: usize) {
        assert_encode_decode_eq(Unary(n));
    }
}
