use core::fmt::Debug;

use crate::{de::CellDecode, ser::CellEncodeExt};

#[track_caller]
pub fn assert_encode_decode_eq<T>(value: T)
where
    T: CellEncodeExt + CellDecode + PartialEq + Debug,
{
    assert_eq!(
        value
            .to_cell()
            .expect("to_cell")
            .parse_fully::<T>()
            .expect("parse_fully"),
        value
    )
}
