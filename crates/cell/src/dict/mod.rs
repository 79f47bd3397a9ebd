//! [HashmapE](https://docs.ton.org/develop/data-formats/tl-b-types#hashmap):
//! dictionary with fixed-width bit string keys
mod key;
mod label;

pub use self::key::*;

use std::{collections::BTreeMap, sync::Arc};

use log::trace;

use crate::{
    Cell, CellError, ResultExt,
    bits::{BitStorage, Error},
    de::{CellDecode, CellParser},
    ser::{CellBuilder, CellEncode},
};

use self::label::{load_label, store_label};

/// Value of a [`HashmapE`], stored inline in leaf cells
pub trait DictionaryValue: Sized {
    fn encode_value(&self, builder: &mut CellBuilder) -> Result<(), CellError>;

    fn decode_value(parser: &mut CellParser<'_>) -> Result<Self, CellError>;
}

impl<T> DictionaryValue for T
where
    T: CellEncode + CellDecode,
{
    #[inline]
    fn encode_value(&self, builder: &mut CellBuilder) -> Result<(), CellError> {
        self.encode(builder)
    }

    #[inline]
    fn decode_value(parser: &mut CellParser<'_>) -> Result<Self, CellError> {
        T::decode(parser)
    }
}

/// Dictionary with keys of `key_bits` bits each.
///
/// Entries are kept sorted by key bits, the trie is built on encoding.
/// ```tlb
/// hme_empty$0 {n:#} {X:Type} = HashmapE n X;
/// hme_root$1 {n:#} {X:Type} root:^(Hashmap n X) = HashmapE n X;
///
/// hm_edge#_ {n:#} {X:Type} {l:#} {m:#} label:(HmLabel ~l n)
///           {n = (~m) + l} node:(HashmapNode m X) = Hashmap n X;
///
/// hmn_leaf#_ {X:Type} value:X = HashmapNode 0 X;
/// hmn_fork#_ {n:#} {X:Type} left:^(Hashmap n X)
///            right:^(Hashmap n X) = HashmapNode (n + 1) X;
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashmapE<K, V> {
    key_bits: usize,
    entries: BTreeMap<BitStorage, (K, V)>,
}

impl<K, V> HashmapE<K, V> {
    #[inline]
    pub const fn new(key_bits: usize) -> Self {
        Self {
            key_bits,
            entries: BTreeMap::new(),
        }
    }

    #[inline]
    pub const fn key_bits(&self) -> usize {
        self.key_bits
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in order of their key bits
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.entries.values().map(|(k, v)| (k, v))
    }
}

impl<K, V> HashmapE<K, V>
where
    K: DictionaryKey,
{
    /// Dictionary with keys of their natural width, `None` for keys of
    /// arbitrary width
    #[inline]
    pub fn with_natural_width() -> Option<Self> {
        K::BITS.map(Self::new)
    }

    /// Inserts an entry, returning the previous value of the key
    pub fn insert(&mut self, key: K, value: V) -> Result<Option<V>, CellError> {
        let bits = key.to_key_bits(self.key_bits)?;
        Ok(self.entries.insert(bits, (key, value)).map(|(_, v)| v))
    }

    /// Keys that do not fit into the key width are never present
    #[inline]
    pub fn get(&self, key: &K) -> Option<&V> {
        let bits = key.to_key_bits(self.key_bits).ok()?;
        self.entries.get(&bits).map(|(_, v)| v)
    }

    #[inline]
    pub fn contains_key(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    #[inline]
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let bits = key.to_key_bits(self.key_bits).ok()?;
        self.entries.remove(&bits).map(|(_, v)| v)
    }
}

impl<K, V> HashmapE<K, V>
where
    K: DictionaryKey,
    V: DictionaryValue,
{
    /// Builds the `Hashmap n X` edge for `entries`, which share first
    /// `offset` bits and are sorted by key
    fn build_edge(
        entries: &[(&BitStorage, &V)],
        offset: usize,
        m: usize,
    ) -> Result<Cell, CellError> {
        let Some(((first, _), (last, _))) = entries.first().zip(entries.last()) else {
            return Err(CellError::custom("empty dictionary edge"));
        };
        let (first, last) = (&first[offset..], &last[offset..]);
        let l = first
            .iter()
            .by_vals()
            .zip(last.iter().by_vals())
            .take_while(|(a, b)| a == b)
            .count();

        let mut builder = Cell::builder();
        // label:(HmLabel ~l n)
        store_label(&mut builder, &first[..l], m).context("label")?;
        match entries {
            [(_, value)] => {
                // hmn_leaf#_ value:X
                value.encode_value(&mut builder).context("value")?;
            }
            _ => {
                // keys differ in the bit right after the common prefix
                let split = entries.partition_point(|(key, _)| !key[offset + l]);
                trace!(
                    "fork after {} bits: {split} left, {} right",
                    offset + l,
                    entries.len() - split
                );
                for (bit, half) in [("left", &entries[..split]), ("right", &entries[split..])] {
                    let edge = Self::build_edge(half, offset + l + 1, m - l - 1).context(bit)?;
                    builder.store_reference(edge)?;
                }
            }
        }
        builder.build()
    }

    /// Root `Hashmap n X` cell, `None` when empty
    pub fn root_cell(&self) -> Result<Option<Cell>, CellError> {
        if self.entries.is_empty() {
            return Ok(None);
        }
        let entries: Vec<_> = self.entries.iter().map(|(bits, (_, v))| (bits, v)).collect();
        Self::build_edge(&entries, 0, self.key_bits).map(Some)
    }

    fn read_edge(&mut self, edge: &Cell, mut key: BitStorage, m: usize) -> Result<(), CellError> {
        let mut parser = edge.parser();
        // label:(HmLabel ~l n)
        let label = load_label(&mut parser, m).context("label")?;
        key.push_bits(&label);
        let m = m - label.len();

        if m == 0 {
            // hmn_leaf#_ value:X
            let value = V::decode_value(&mut parser).context("value")?;
            parser.ensure_empty()?;
            let k = K::from_key_bits(&key)?;
            self.entries.insert(key, (k, value));
            return Ok(());
        }

        // hmn_fork#_ left:^(Hashmap n X) right:^(Hashmap n X)
        let (left, right) = (parser.load_reference()?, parser.load_reference()?);
        parser.ensure_empty()?;
        for (bit, child) in [(false, left), (true, right)] {
            let mut key = key.clone();
            key.push_bit(bit);
            self.read_edge(child, key, m - 1)
                .with_context(|| if bit { "right" } else { "left" })?;
        }
        Ok(())
    }

    /// Loads `HashmapE n X` with keys of `key_bits` bits
    pub fn decode_with(parser: &mut CellParser<'_>, key_bits: usize) -> Result<Self, CellError> {
        let mut map = Self::new(key_bits);
        if parser.load_bit()? {
            // hme_root$1 root:^(Hashmap n X)
            let root: &Arc<Cell> = parser.load_reference()?;
            map.read_edge(root, BitStorage::with_capacity(key_bits), key_bits)
                .context("root")?;
        }
        trace!("loaded HashmapE of {} entries, {key_bits}-bit keys", map.len());
        Ok(map)
    }
}

impl<K, V> CellEncode for HashmapE<K, V>
where
    K: DictionaryKey,
    V: DictionaryValue,
{
    fn encode(&self, builder: &mut CellBuilder) -> Result<(), CellError> {
        match self.root_cell()? {
            // hme_empty$0
            None => builder.store_bit(false)?,
            // hme_root$1 root:^(Hashmap n X)
            Some(root) => builder.store_bit(true)?.store_reference(root)?,
        };
        Ok(())
    }
}

/// Keys of natural width only, use
/// [`HashmapE::decode_with`] for others
impl<K, V> CellDecode for HashmapE<K, V>
where
    K: DictionaryKey,
    V: DictionaryValue,
{
    fn decode(parser: &mut CellParser<'_>) -> Result<Self, CellError> {
        let key_bits = K::BITS.ok_or_else(|| CellError::custom("dictionary key width is unknown"))?;
        Self::decode_with(parser, key_bits)
    }
}


#[cfg(test)]
mod tests {
    use crate::{
        de::CellDecode,
        ser::CellEncodeExt,
        tests::assert_encode_decode_eq,
    };

    use super::*;

    #[test]
    fn empty() {
        let map: HashmapE<u32, u8> = HashmapE::with_natural_width().unwrap();
        let cell = map.to_cell().unwrap();
        assert_eq!(cell.bits().to_string(), "0");
        assert!(cell.references().is_empty());
        assert_encode_decode_eq(map);
    }

    #[test]
    fn insert_get_remove() {
        let mut map = HashmapE::<u16, bool>::new(4);
        assert_eq!(map.insert(3, true).unwrap(), None);
        assert_eq!(map.insert(3, false).unwrap(), Some(true));
        assert!(map.insert(16, true).is_err());
        assert_eq!(map.get(&3), Some(&false));
        assert_eq!(map.get(&16), None);
        assert_eq!(map.remove(&3), Some(false));
        assert!(map.is_empty());
    }

    #[test]
    fn u64_keys() {
        let mut map = HashmapE::<u64, u8>::with_natural_width().unwrap();
        for (k, v) in [(5, 6), (1, 0), (3, 4), (2, 1)] {
            map.insert(k, v).unwrap();
        }
        assert_eq!(
            map.iter().map(|(k, v)| (*k, *v)).collect::<Vec<_>>(),
            [(1, 0), (2, 1), (3, 4), (5, 6)]
        );
        assert_encode_decode_eq(map);
    }

    #[test]
    fn one_bit_keys() {
        let mut map = HashmapE::<u8, u8>::new(1);
        map.insert(0, 0xAA).unwrap();
        map.insert(1, 0xBB).unwrap();

        let root = map.root_cell().unwrap().unwrap();
        // hml_short$0 with empty label, then both forks
        assert_eq!(root.bits().to_string(), "00");
        let [left, right] = root.references() else {
            panic!("fork must have two references")
        };
        assert_eq!(left.bits().to_string(), "0010101010");
        assert_eq!(right.bits().to_string(), "0010111011");

        let cell = map.to_cell().unwrap();
        let decoded = HashmapE::<u8, u8>::decode_with(&mut cell.parser(), 1).unwrap();
        assert_eq!(decoded, map);
    }

    #[test]
    fn single_entry_is_one_leaf() {
        let mut map = HashmapE::<u32, u8>::new(32);
        map.insert(0, 1).unwrap();
        let root = map.root_cell().unwrap().unwrap();
        // hml_same$11 v:0 n:32 in 6 bits, then the value
        assert_eq!(root.bits().to_string(), "11010000000000001");
        assert!(root.references().is_empty());
    }

    #[test]
    fn bit_string_keys() {
        let mut map = HashmapE::<BitStorage, u8>::new(3);
        let key: BitStorage = "101".parse().unwrap();
        map.insert(key.clone(), 1).unwrap();
        map.insert("001".parse().unwrap(), 2).unwrap();
        assert_eq!(
            map.insert("10".parse().unwrap(), 3),
            Err(CellError::KeyWidthMismatch {
                expected: 3,
                actual: 2,
            })
        );

        let cell = map.to_cell().unwrap();
        let decoded = HashmapE::<BitStorage, u8>::decode_with(&mut cell.parser(), 3).unwrap();
        assert_eq!(decoded.get(&key), Some(&1));
        assert_eq!(decoded, map);

        assert!(HashmapE::<BitStorage, u8>::decode(&mut cell.parser()).is_err());
    }

    #[test]
    fn leaf_leftovers_are_rejected() {
        let mut map = HashmapE::<u8, u16>::new(8);
        map.insert(7, 0x0102).unwrap();
        let cell = map.to_cell().unwrap();
        assert!(HashmapE::<u8, u8>::decode_with(&mut cell.parser(), 8).is_err());
    }
}
