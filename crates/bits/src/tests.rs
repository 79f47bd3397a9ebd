use core::fmt::Debug;

use crate::{BitPack, BitUnpack, pack, unpack_fully};

#[track_caller]
pub fn assert_pack_unpack_eq<T>(value: T)
where
    T: BitPack + BitUnpack + PartialEq + Debug,
{
    let packed = pack(&value).expect("pack");
    let unpacked: T = unpack_fully(&packed).expect("unpack_fully");
    assert_eq!(unpacked, value)
}
