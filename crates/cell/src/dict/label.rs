use crate::{
    CellError,
    bits::{
        BitStorage, Error,
        bitvec::{order::Msb0, slice::BitSlice},
        var::Unary,
    },
    de::CellParser,
    ser::CellBuilder,
};

/// Bits needed to store any length in `0..=m`
#[inline]
fn length_bits(m: usize) -> usize {
    (usize::BITS - m.leading_zeros()) as usize
}

/// Stores `HmLabel ~n m`, picking the shortest form
/// ```tlb
/// hml_short$0 {m:#} {n:#} len:(Unary ~n) {n <= m} s:(n * Bit) = HmLabel ~n m;
/// hml_long$10 {m:#} n:(#<= m) s:(n * Bit) = HmLabel ~n m;
/// hml_same$11 {m:#} v:Bit n:(#<= m) = HmLabel ~n m;
/// ```
pub(super) fn store_label(
    builder: &mut CellBuilder,
    label: &BitSlice<u8, Msb0>,
    m: usize,
) -> Result<(), CellError> {
    let n = label.len();
    let k = length_bits(m);

    let short = 2 * n + 2;
    let long = 2 + k + n;
    let same = (n > 1 && (label.all() || label.not_any())).then_some(3 + k);

    if short <= long && same.is_none_or(|same| short <= same) {
        builder
            // hml_short$0
            .store_bit(false)?
            // len:(Unary ~n)
            .store(Unary(n))?
            // s:(n * Bit)
            .store_bits(label)?;
    } else if same.is_none_or(|same| long <= same) {
        builder
            // hml_long$10
            .store_pattern(0b10u8, 2)?
            // n:(#<= m)
            .store_pattern(n, k)?
            // s:(n * Bit)
            .store_bits(label)?;
    } else {
        builder
            // hml_same$11
            .store_pattern(0b11u8, 2)?
            // v:Bit
            .store_bit(label.all())?
            // n:(#<= m)
            .store_pattern(n, k)?;
    }
    Ok(())
}

/// Loads `HmLabel ~n m`, failing when `n > m`
pub(super) fn load_label(parser: &mut CellParser<'_>, m: usize) -> Result<BitStorage, CellError> {
    let k = length_bits(m);
    let check = |n: usize| {
        // {n <= m}
        if n > m {
            return Err(CellError::custom(format!(
                "label length {n} exceeds remaining key length {m}"
            )));
        }
        Ok(n)
    };
    Ok(match parser.load_bit()? {
        // hml_short$0
        false => {
            // len:(Unary ~n)
            let Unary(n) = parser.parse()?;
            // s:(n * Bit)
            parser.load_bits(check(n)?)?.into()
        }
        true => match parser.load_bit()? {
            // hml_long$10
            false => {
                // n:(#<= m)
                let n = check(parser.load_pattern(k)?)?;
                // s:(n * Bit)
                parser.load_bits(n)?.into()
            }
            // hml_same$11
            true => {
                // v:Bit
                let v = parser.load_bit()?;
                // n:(#<= m)
                let n = check(parser.load_pattern(k)?)?;
                BitStorage::repeating(v, n)
            }
        },
    })
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use crate::Cell;

    use super::*;

    #[rstest]
    #[case("", 0, "00")]
    #[case("", 8, "00")]
    #[case("1", 8, "0101")]
    #[case("101", 8, "01110101")]
    #[case("00000000", 8, "1101000")]
    #[case("11111111", 255, "11100001000")]
    #[case("10101010", 8, "10100010101010")]
    fn shortest_form(#[case] label: &str, #[case] m: usize, #[case] encoded: &str) {
        let label: BitStorage = label.parse().unwrap();
        let mut builder = Cell::builder();
        store_label(&mut builder, &label, m).unwrap();
        assert_eq!(builder.bits().to_string(), encoded);

        let cell = builder.build().unwrap();
        let mut parser = cell.parser();
        assert_eq!(load_label(&mut parser, m).unwrap(), label);
        parser.ensure_empty().unwrap();
    }

    #[test]
    fn rejects_label_longer_than_key() {
        // hml_long$10 with n = 3 for m = 2
        let cell = Cell::new(Default::default(), "1011111".parse().unwrap(), Vec::new()).unwrap();
        assert!(load_label(&mut cell.parser(), 2).is_err());
    }
}
