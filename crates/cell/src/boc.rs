//! Collection of types related to [Bag Of Cells](https://docs.ton.org/develop/data-formats/cell-boc#bag-of-cells)
use std::{
    collections::HashMap,
    fmt::{self, Debug},
    sync::Arc,
};

use crc::Crc;
use log::{debug, trace};

use crate::{
    Cell, CellError, CellKind, HASH_BYTES, LevelMask, ResultExt,
    bits::{
        BitPattern, BitReader, BitReaderExt, BitStorage, BitWriterExt, BitsError, Error,
        bitvec::{order::Msb0, slice::BitSlice},
    },
};

/// Alias to [`BagOfCells`]
pub type BoC = BagOfCells;

const CRC_32_ISCSI: Crc<u32> = Crc::<u32>::new(&crc::CRC_32_ISCSI);

/// Flags of the serialized [`BagOfCells`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct BocOptions {
    /// Store offsets of every cell
    pub index: bool,
    /// Append CRC32c of everything before it
    pub crc32c: bool,
    /// Not supported, serialization fails when set
    pub cache_bits: bool,
}

/// [Bag Of Cells](https://docs.ton.org/develop/data-formats/cell-boc#bag-of-cells) is used to **de**/**ser**ialize a set of cells from/into
/// bytes.
///
/// ```rust
/// # use toncell::{BagOfCells, BocOptions, CellError, ser::CellEncodeExt};
/// # fn main() -> Result<(), CellError> {
/// let data: u32 = 1234;
/// let root = data.to_cell()?;
///
/// let boc = BagOfCells::from_root(root);
/// let packed = boc.serialize(BocOptions {
///     crc32c: true,
///     ..Default::default()
/// })?;
///
/// let unpacked = BagOfCells::deserialize(packed)?;
/// let got: u32 = unpacked.single_root().unwrap().parse_fully()?;
///
/// assert_eq!(got, data);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Default, PartialEq, Eq)]
pub struct BagOfCells {
    roots: Vec<Arc<Cell>>,
}

impl BagOfCells {
    /// Create from single root cell
    #[inline]
    pub fn from_root(root: impl Into<Arc<Cell>>) -> Self {
        Self {
            roots: [root.into()].into(),
        }
    }

    /// Add root
    #[inline]
    pub fn add_root(&mut self, root: impl Into<Arc<Cell>>) {
        self.roots.push(root.into())
    }

    #[inline]
    pub fn roots(&self) -> &[Arc<Cell>] {
        &self.roots
    }

    /// Return single root or `None` otherwise
    #[inline]
    pub fn single_root(&self) -> Option<&Arc<Cell>> {
        let [root]: &[_; 1] = self.roots.as_slice().try_into().ok()?;
        Some(root)
    }

    /// Consume `self` and return single root or `None` otherwise
    #[inline]
    pub fn into_single_root(self) -> Option<Arc<Cell>> {
        let [root] = self.roots.try_into().ok()?;
        Some(root)
    }

    /// Serialize into bytes, root cells first
    pub fn serialize(&self, options: BocOptions) -> Result<Vec<u8>, CellError> {
        RawBagOfCells::from_roots(&self.roots)?
            .sorted()?
            .serialize(options)
    }

    /// Parse from bytes
    #[inline]
    pub fn deserialize(bytes: impl AsRef<[u8]>) -> Result<Self, CellError> {
        RawBagOfCells::deserialize(bytes.as_ref())?.into_bag()
    }

    /// Serialize into lowercase hexadecimal string
    #[inline]
    pub fn to_hex(&self, options: BocOptions) -> Result<String, CellError> {
        self.serialize(options).map(hex::encode)
    }

    /// Parse hexadecimal string
    #[inline]
    pub fn from_hex(s: impl AsRef<[u8]>) -> Result<Self, CellError> {
        hex::decode(s)
            .map_err(CellError::custom)
            .and_then(Self::deserialize)
    }

    /// Serialize into base64-encoded string
    #[cfg(feature = "base64")]
    #[inline]
    pub fn to_base64(&self, options: BocOptions) -> Result<String, CellError> {
        use base64::{Engine, engine::general_purpose::STANDARD};

        self.serialize(options).map(|bytes| STANDARD.encode(bytes))
    }

    /// Parse base64-encoded string
    #[cfg(feature = "base64")]
    #[inline]
    pub fn from_base64(s: impl AsRef<[u8]>) -> Result<Self, CellError> {
        use base64::{Engine, engine::general_purpose::STANDARD};

        STANDARD
            .decode(s)
            .map_err(CellError::custom)
            .and_then(Self::deserialize)
    }
}

impl Debug for BagOfCells {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(&self.roots).finish()
    }
}

impl TryFrom<&[u8]> for BagOfCells {
    type Error = CellError;

    #[inline]
    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        Self::deserialize(bytes)
    }
}

/// Cells flattened into an index-addressed arena, references are indices
/// into `cells`
#[derive(Debug, Clone, PartialEq, Eq)]
struct RawBagOfCells {
    cells: Vec<RawCell>,
    roots: Vec<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    New,
    Visiting,
    Visited,
}

impl RawBagOfCells {
    ///```tlb
    /// serialized_boc_idx#68ff65f3
    /// ```
    const INDEXED_BOC_TAG: u32 = 0x68ff65f3;

    /// ```tlb
    /// serialized_boc_idx_crc32c#acc3a728
    /// ```
    const INDEXED_CRC32_TAG: u32 = 0xacc3a728;

    /// ```tlb
    /// serialized_boc#b5ee9c72
    /// ```
    const GENERIC_BOC_TAG: u32 = 0xb5ee9c72;

    const MAX_REF_BYTES: usize = 7;
    const MAX_OFF_BYTES: usize = 8;

    /// Collects all cells reachable from `roots`, each distinct cell once
    fn from_roots(roots: &[Arc<Cell>]) -> Result<Self, CellError> {
        if roots.is_empty() {
            return Err(CellError::EmptyRootCells);
        }
        let mut raw = Self {
            cells: Vec::new(),
            roots: Vec::with_capacity(roots.len()),
        };
        let mut indices = HashMap::new();
        for root in roots {
            let index = raw.collect(root, &mut indices);
            raw.roots.push(index);
        }
        Ok(raw)
    }

    fn collect(&mut self, cell: &Cell, indices: &mut HashMap<[u8; HASH_BYTES], usize>) -> usize {
        let hash = cell.representation_hash();
        if let Some(&index) = indices.get(&hash) {
            return index;
        }
        let references = cell
            .references()
            .iter()
            .map(|r| self.collect(r, indices))
            .collect();
        let index = self.cells.len();
        self.cells.push(RawCell {
            exotic: cell.is_exotic(),
            level_mask: cell.level_mask(),
            data: cell.bits().clone(),
            references,
        });
        indices.insert(hash, index);
        index
    }

    /// Reorders cells so that every parent precedes its children, a single
    /// root gets index `0`
    fn sorted(self) -> Result<Self, CellError> {
        let mut order = self.postorder(self.roots.iter().rev().copied())?;
        order.reverse();

        let mut new_index = vec![0; self.cells.len()];
        for (new, &old) in order.iter().enumerate() {
            new_index[old] = new;
        }
        let mut cells: Vec<Option<RawCell>> = self.cells.into_iter().map(Some).collect();
        Ok(Self {
            cells: order
                .into_iter()
                .filter_map(|old| cells[old].take())
                .map(|mut cell| {
                    for r in &mut cell.references {
                        *r = new_index[*r];
                    }
                    cell
                })
                .collect(),
            roots: self.roots.into_iter().map(|r| new_index[r]).collect(),
        })
    }

    /// Depth-first post-order walk from each of `starts`, children come
    /// before their parents. A cell met again while its subtree is still
    /// being visited closes a cycle.
    fn postorder(&self, starts: impl IntoIterator<Item = usize>) -> Result<Vec<usize>, CellError> {
        let n = self.cells.len();
        let mut marks = vec![Mark::New; n];
        let mut order = Vec::with_capacity(n);
        // (cell, next reference to follow)
        let mut stack: Vec<(usize, usize)> = Vec::new();
        for start in starts {
            match marks.get(start) {
                None => return Err(CellError::InvalidRootIndex { index: start, cells: n }),
                Some(Mark::New) => {}
                Some(_) => continue,
            }
            marks[start] = Mark::Visiting;
            stack.push((start, 0));

            while let Some(top) = stack.last_mut() {
                let (index, next) = *top;
                let Some(&reference) = self.cells[index].references.get(next) else {
                    marks[index] = Mark::Visited;
                    order.push(index);
                    stack.pop();
                    continue;
                };
                top.1 += 1;
                match marks.get(reference) {
                    None => {
                        return Err(CellError::InvalidReferenceIndex {
                            cell: index,
                            reference,
                        });
                    }
                    Some(Mark::Visiting) => return Err(CellError::TopologicalCycle),
                    Some(Mark::Visited) => {}
                    Some(Mark::New) => {
                        marks[reference] = Mark::Visiting;
                        stack.push((reference, 0));
                    }
                }
            }
        }
        Ok(order)
    }

    /// ```tlb
    /// serialized_boc#b5ee9c72 has_idx:(## 1) has_crc32c:(## 1)
    ///   has_cache_bits:(## 1) flags:(## 2) { flags = 0 }
    ///   size:(## 3) { size <= 4 }
    ///   off_bytes:(## 8) { off_bytes <= 8 }
    ///   cells:(##(size * 8))
    ///   roots:(##(size * 8)) { roots >= 1 }
    ///   absent:(##(size * 8)) { roots + absent <= cells }
    ///   tot_cells_size:(##(off_bytes * 8))
    ///   root_list:(roots * ##(size * 8))
    ///   index:has_idx?(cells * ##(off_bytes * 8))
    ///   cell_data:(tot_cells_size * [ uint8 ])
    ///   crc32c:has_crc32c?uint32
    ///   = BagOfCells;
    /// ```
    fn serialize(&self, options: BocOptions) -> Result<Vec<u8>, CellError> {
        if options.cache_bits {
            return Err(CellError::CacheBitsUnsupported);
        }
        let ref_bytes = byte_width(self.cells.len());
        if ref_bytes > Self::MAX_REF_BYTES {
            return Err(CellError::ByteWidthOverflow {
                field: "reference",
                bytes: ref_bytes,
                max: Self::MAX_REF_BYTES,
            });
        }

        let mut tot_cells_size = 0;
        let mut index = Vec::with_capacity(self.cells.len());
        for cell in &self.cells {
            tot_cells_size += cell.size(ref_bytes);
            index.push(tot_cells_size);
        }
        let off_bytes = byte_width(tot_cells_size);
        if off_bytes > Self::MAX_OFF_BYTES {
            return Err(CellError::ByteWidthOverflow {
                field: "offset",
                bytes: off_bytes,
                max: Self::MAX_OFF_BYTES,
            });
        }

        let mut buf = BitStorage::with_capacity(8 * (tot_cells_size + 32));
        buf
            // serialized_boc#b5ee9c72
            .pack(Self::GENERIC_BOC_TAG)?
            // has_idx:(## 1)
            .pack(options.index)?
            // has_crc32c:(## 1)
            .pack(options.crc32c)?
            // has_cache_bits:(## 1)
            .pack(false)?
            // flags:(## 2) { flags = 0 }
            .pack_pattern(0u8, 2)?
            // size:(## 3)
            .pack_pattern(ref_bytes, 3)?
            // off_bytes:(## 8) { off_bytes <= 8 }
            .pack_pattern(off_bytes, 8)?
            // cells:(##(size * 8))
            .pack_pattern(self.cells.len(), ref_bytes * 8)?
            // roots:(##(size * 8)) { roots >= 1 }
            .pack_pattern(self.roots.len(), ref_bytes * 8)?
            // absent:(##(size * 8)) { roots + absent <= cells }
            .pack_pattern(0usize, ref_bytes * 8)?
            // tot_cells_size:(##(off_bytes * 8))
            .pack_pattern(tot_cells_size, off_bytes * 8)?;
        // root_list:(roots * ##(size * 8))
        for &root in &self.roots {
            buf.pack_pattern(root, ref_bytes * 8)?;
        }
        if options.index {
            // index:has_idx?(cells * ##(off_bytes * 8))
            for &end in &index {
                buf.pack_pattern(end, off_bytes * 8)?;
            }
        }
        // cell_data:(tot_cells_size * [ uint8 ])
        for (i, cell) in self.cells.iter().enumerate() {
            cell.write(&mut buf, ref_bytes)
                .map_err(CellError::from)
                .with_context(|| format!("[{i}]"))?;
        }

        let mut bytes = buf.to_bytes();
        // crc32c:has_crc32c?uint32
        if options.crc32c {
            let checksum = CRC_32_ISCSI.checksum(&bytes);
            bytes.extend(checksum.to_le_bytes());
        }
        debug!(
            "serialized BoC: {} cells, {} roots, ref size {ref_bytes}, offset size {off_bytes}, {} bytes",
            self.cells.len(),
            self.roots.len(),
            bytes.len(),
        );
        Ok(bytes)
    }

    /// Accepts generic format as well as legacy indexed ones:
    /// ```tlb
    /// serialized_boc_idx#68ff65f3 size:(## 8) { size <= 4 }
    ///   off_bytes:(## 8) { off_bytes <= 8 }
    ///   cells:(##(size * 8))
    ///   roots:(##(size * 8)) { roots = 1 }
    ///   absent:(##(size * 8)) { roots + absent <= cells }
    ///   tot_cells_size:(##(off_bytes * 8))
    ///   index:(cells * ##(off_bytes * 8))
    ///   cell_data:(tot_cells_size * [ uint8 ])
    ///   = BagOfCells;
    ///
    /// serialized_boc_idx_crc32c#acc3a728 size:(## 8) { size <= 4 }
    ///   off_bytes:(## 8) { off_bytes <= 8 }
    ///   cells:(##(size * 8))
    ///   roots:(##(size * 8)) { roots = 1 }
    ///   absent:(##(size * 8)) { roots + absent <= cells }
    ///   tot_cells_size:(##(off_bytes * 8))
    ///   index:(cells * ##(off_bytes * 8))
    ///   cell_data:(tot_cells_size * [ uint8 ])
    ///   crc32c:uint32 = BagOfCells;
    /// ```
    fn deserialize(bytes: &[u8]) -> Result<Self, CellError> {
        let mut reader: &BitSlice<u8, Msb0> = BitSlice::from_slice(bytes);

        let tag: u32 = reader.unpack().context("magic")?;
        let (generic, has_idx, has_crc32c) = match tag {
            Self::GENERIC_BOC_TAG => {
                // has_idx:(## 1) has_crc32c:(## 1) has_cache_bits:(## 1)
                let (has_idx, has_crc32c, has_cache_bits): (bool, bool, bool) = reader.unpack()?;
                if has_cache_bits {
                    return Err(CellError::CacheBitsUnsupported);
                }
                // flags:(## 2) { flags = 0 }
                let flags: u8 = reader.unpack_pattern(2)?;
                if flags != 0 {
                    return Err(CellError::custom(format!("reserved flags are set: {flags:#04b}")));
                }
                (true, has_idx, has_crc32c)
            }
            Self::INDEXED_BOC_TAG => (false, true, false),
            Self::INDEXED_CRC32_TAG => (false, true, true),
            _ => return Err(CellError::InvalidMagic(tag)),
        };

        if has_crc32c {
            let (body, checksum) = bytes.split_last_chunk::<4>().ok_or(BitsError::Boundary {
                requested: 32,
                available: reader.len(),
            })?;
            let stored = u32::from_le_bytes(*checksum);
            let computed = CRC_32_ISCSI.checksum(body);
            if stored != computed {
                return Err(CellError::Crc32cMismatch { stored, computed });
            }
            let consumed = bytes.len() * 8 - reader.len();
            reader = BitSlice::from_slice(body)
                .get(consumed..)
                .ok_or(BitsError::Boundary {
                    requested: 32,
                    available: reader.len(),
                })?;
        }

        // size:(## 3) or size:(## 8)
        let ref_bytes: usize = reader.unpack_pattern(if generic { 3 } else { 8 })?;
        check_byte_width("reference", ref_bytes, Self::MAX_REF_BYTES)?;
        // off_bytes:(## 8) { off_bytes <= 8 }
        let off_bytes: usize = reader.unpack_pattern(8)?;
        check_byte_width("offset", off_bytes, Self::MAX_OFF_BYTES)?;

        // cells:(##(size * 8))
        let cells: usize = reader.unpack_pattern(ref_bytes * 8).context("cells")?;
        // roots:(##(size * 8)) { roots >= 1 }
        let roots: usize = reader.unpack_pattern(ref_bytes * 8).context("roots")?;
        // absent:(##(size * 8)) { roots + absent <= cells }
        let absent: usize = reader.unpack_pattern(ref_bytes * 8).context("absent")?;
        // tot_cells_size:(##(off_bytes * 8))
        let tot_cells_size: usize = reader.unpack_pattern(off_bytes * 8).context("tot_cells_size")?;
        if roots == 0 {
            return Err(CellError::EmptyRootCells);
        }
        if absent != 0 {
            return Err(CellError::custom(format!("{absent} absent cells are not supported")));
        }
        if roots > cells {
            return Err(CellError::custom(format!("{roots} roots out of {cells} cells")));
        }
        debug!(
            "deserializing BoC: {cells} cells, {roots} roots, ref size {ref_bytes}, offset size {off_bytes}, index: {has_idx}, crc32c: {has_crc32c}",
        );

        let root_list: Vec<usize> = if generic {
            // root_list:(roots * ##(size * 8))
            (0..roots)
                .map(|_| reader.unpack_pattern(ref_bytes * 8))
                .collect::<Result<_, _>>()
                .context("root_list")?
        } else {
            (0..roots).collect()
        };
        if let Some(&index) = root_list.iter().find(|&&r| r >= cells) {
            return Err(CellError::InvalidRootIndex { index, cells });
        }

        let index: Option<Vec<usize>> = has_idx
            .then(|| {
                // index:has_idx?(cells * ##(off_bytes * 8))
                (0..cells)
                    .map(|_| reader.unpack_pattern(off_bytes * 8))
                    .collect::<Result<_, _>>()
            })
            .transpose()
            .context("index")?;

        // cell_data:(tot_cells_size * [ uint8 ])
        let data_start = reader.len();
        let mut raw_cells = Vec::with_capacity(cells.min(bytes.len()));
        for i in 0..cells {
            let cell = RawCell::read(&mut reader, ref_bytes).with_context(|| format!("[{i}]"))?;
            let end = (data_start - reader.len()) / 8;
            if let Some(expected) = index.as_ref().map(|index| index[i]) {
                if end != expected {
                    return Err(CellError::custom(format!(
                        "index of cell [{i}] points to offset {expected}, while it ends at {end}"
                    )));
                }
            }
            raw_cells.push(cell);
        }
        let read = (data_start - reader.len()) / 8;
        if read != tot_cells_size {
            return Err(CellError::custom(format!(
                "tot_cells_size is {tot_cells_size}, but cells take {read} bytes"
            )));
        }
        if !reader.is_empty() {
            return Err(CellError::custom(format!(
                "{} trailing bytes",
                reader.len().div_ceil(8)
            )));
        }

        Ok(Self {
            cells: raw_cells,
            roots: root_list,
        })
    }

    /// Builds cells in dependency order, so that children are ready
    /// before their parents whatever order they are stored in
    fn into_bag(self) -> Result<BagOfCells, CellError> {
        let order = self.postorder(0..self.cells.len())?;
        let Self { cells, roots } = self;
        let n = cells.len();
        let mut cells: Vec<Option<RawCell>> = cells.into_iter().map(Some).collect();
        let mut built: Vec<Option<Arc<Cell>>> = vec![None; n];
        for i in order {
            let Some(raw) = cells[i].take() else {
                continue;
            };
            let references = raw
                .references
                .iter()
                .map(|&reference| {
                    built
                        .get(reference)
                        .cloned()
                        .flatten()
                        .ok_or(CellError::InvalidReferenceIndex { cell: i, reference })
                })
                .collect::<Result<Vec<_>, _>>()?;
            let kind = if raw.exotic {
                let tag = raw
                    .data
                    .view(0..8)
                    .map(u8::from_pattern)
                    .with_context(|| format!("[{i}]: exotic tag"))?;
                CellKind::exotic_from_tag(tag)?
            } else {
                CellKind::Ordinary
            };
            let cell = Cell::new(kind, raw.data, references).with_context(|| format!("[{i}]"))?;
            if cell.level_mask() != raw.level_mask {
                return Err(CellError::LevelMismatch {
                    stored: raw.level_mask.as_u8(),
                    computed: cell.level_mask().as_u8(),
                })
                .with_context(|| format!("[{i}]"));
            }
            trace!(
                "[{i}] {kind} cell: {} bits, {} references, level {}",
                cell.bits().len(),
                cell.references().len(),
                cell.level(),
            );
            built[i] = Some(Arc::new(cell));
        }
        Ok(BagOfCells {
            roots: roots
                .into_iter()
                .map(|index| {
                    built
                        .get(index)
                        .cloned()
                        .flatten()
                        .ok_or(CellError::InvalidRootIndex { index, cells: n })
                })
                .collect::<Result<_, _>>()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct RawCell {
    exotic: bool,
    level_mask: LevelMask,
    data: BitStorage,
    references: Vec<usize>,
}

impl RawCell {
    /// Serialized size in bytes
    fn size(&self, ref_bytes: usize) -> usize {
        2 + self.data.len().div_ceil(8) + self.references.len() * ref_bytes
    }

    fn refs_descriptor(&self) -> u8 {
        self.references.len() as u8 + 8 * self.exotic as u8 + 32 * self.level_mask.as_u8()
    }

    fn bits_descriptor(&self) -> u8 {
        (self.data.len() / 8 + self.data.len().div_ceil(8)) as u8
    }

    fn write(&self, writer: &mut BitStorage, ref_bytes: usize) -> Result<(), BitsError> {
        writer
            .pack(self.refs_descriptor())?
            .pack(self.bits_descriptor())?
            .pack(self.data.cell_aligned().as_bitslice())?;
        for &reference in &self.references {
            writer.pack_pattern(reference, ref_bytes * 8)?;
        }
        Ok(())
    }

    fn read(reader: &mut &BitSlice<u8, Msb0>, ref_bytes: usize) -> Result<Self, CellError> {
        let refs_descriptor: u8 = reader.unpack()?;
        let bits_descriptor: u8 = reader.unpack()?;

        let references = (refs_descriptor & 0b111) as usize;
        let exotic = refs_descriptor & 0b1000 != 0;
        let with_hashes = refs_descriptor & 0b10000 != 0;
        let level_mask = LevelMask::new(refs_descriptor >> 5);
        if with_hashes {
            // stored hashes and depths are recomputed anyway
            reader.skip(level_mask.hash_count() * (HASH_BYTES + 2) * 8)?;
        }

        let mut data = BitStorage::from_bytes(reader.read_bytes_vec((bits_descriptor as usize).div_ceil(2))?);
        if bits_descriptor % 2 == 1 {
            data = data.cell_unaligned()?;
        }

        let references = (0..references)
            .map(|_| reader.unpack_pattern(ref_bytes * 8))
            .collect::<Result<_, _>>()?;

        Ok(Self {
            exotic,
            level_mask,
            data,
            references,
        })
    }
}

/// Minimal number of bytes to store `n`, but at least one
fn byte_width(n: usize) -> usize {
    ((usize::BITS - n.leading_zeros()) as usize).div_ceil(8).max(1)
}

fn check_byte_width(field: &'static str, bytes: usize, max: usize) -> Result<(), CellError> {
    if bytes > max {
        return Err(CellError::ByteWidthOverflow { field, bytes, max });
    }
    if bytes == 0 {
        return Err(CellError::custom(format!("{field} size must not be zero")));
    }
    Ok(())
}
