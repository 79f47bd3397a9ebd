use std::sync::Arc;

use crate::{
    Bound, Cell, CellError, CellKind, CellProperty, ResultExt,
    bits::{
        BitPattern, BitStorage, BitWriter, BitsError,
        bitvec::{order::Msb0, slice::BitSlice},
    },
};

use super::{CellEncode, CellEncodeExt, Command, Footprint};

/// Cell builder created with [`Cell::builder()`].
///
/// Every write is checked against maximums of the cell kind, minimums are
/// checked by [`.build()`](CellBuilder::build).
#[derive(Debug, Clone)]
pub struct CellBuilder {
    kind: CellKind,
    data: BitStorage,
    references: Vec<Arc<Cell>>,
}

impl Default for CellBuilder {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl CellBuilder {
    /// Builder for an ordinary cell
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self::with_kind(CellKind::Ordinary)
    }

    /// Builder for a cell of given kind. Exotic cells must start with
    /// their [tag](CellKind::tag).
    #[inline]
    #[must_use]
    pub const fn with_kind(kind: CellKind) -> Self {
        Self {
            kind,
            data: BitStorage::new(),
            references: Vec::new(),
        }
    }

    #[inline]
    pub const fn kind(&self) -> CellKind {
        self.kind
    }

    /// Bits written so far
    #[inline]
    pub const fn bits(&self) -> &BitStorage {
        &self.data
    }

    #[inline]
    pub fn references(&self) -> &[Arc<Cell>] {
        &self.references
    }

    #[inline]
    pub fn references_left(&self) -> usize {
        self.kind.references().end() - self.references.len()
    }

    #[inline]
    fn ensure_bits(&self, n: usize) -> Result<(), CellError> {
        if n > self.capacity_left() {
            return Err(CellError::constraint(
                self.kind,
                Bound::Max,
                CellProperty::Bits,
                self.data.len() + n,
            ));
        }
        Ok(())
    }

    #[inline]
    fn ensure_reference(&self) -> Result<(), CellError> {
        if self.references_left() == 0 {
            return Err(CellError::constraint(
                self.kind,
                Bound::Max,
                CellProperty::References,
                self.references.len() + 1,
            ));
        }
        Ok(())
    }

    #[inline]
    pub fn store_bit(&mut self, bit: bool) -> Result<&mut Self, CellError> {
        self.write_bit(bit)?;
        Ok(self)
    }

    #[inline]
    pub fn store_bits(&mut self, bits: &BitSlice<u8, Msb0>) -> Result<&mut Self, CellError> {
        self.write_bitslice(bits)?;
        Ok(self)
    }

    #[inline]
    pub fn store_bytes(&mut self, bytes: impl AsRef<[u8]>) -> Result<&mut Self, CellError> {
        self.store_bits(BitSlice::from_slice(bytes.as_ref()))
    }

    /// Stores lowest `width` bits of `value`, truncating it silently.
    /// See [`BitPattern`].
    #[inline]
    pub fn store_pattern<T>(&mut self, value: T, width: usize) -> Result<&mut Self, CellError>
    where
        T: BitPattern,
    {
        self.ensure_bits(width)?;
        self.data.push_pattern(value, width);
        Ok(self)
    }

    /// Stores `value` as unsigned integer of `width` bits, failing when it
    /// does not fit
    pub fn store_uint(&mut self, value: u128, width: usize) -> Result<&mut Self, CellError> {
        if width < 128 && value >> width != 0 {
            return Err(BitsError::Overflow {
                value: value.to_string(),
                bits: width,
            }
            .into());
        }
        self.store_pattern(value, width)
    }

    /// Stores `value` as two's complement integer of `width` bits, failing
    /// when it does not fit
    pub fn store_int(&mut self, value: i128, width: usize) -> Result<&mut Self, CellError> {
        let fits = match width {
            0 => value == 0,
            1..128 => {
                let half = 1i128 << (width - 1);
                (-half..half).contains(&value)
            }
            _ => true,
        };
        if !fits {
            return Err(BitsError::Overflow {
                value: value.to_string(),
                bits: width,
            }
            .into());
        }
        self.store_pattern(value, width)
    }

    /// Store the value using its [`CellEncode`] implementation
    #[inline]
    pub fn store<T>(&mut self, value: T) -> Result<&mut Self, CellError>
    where
        T: CellEncode,
    {
        value.encode(self)?;
        Ok(self)
    }

    /// Store all values from given iterator using [`CellEncode`]
    /// implementation of its item type.
    #[inline]
    pub fn store_many<T>(&mut self, values: impl IntoIterator<Item = T>) -> Result<&mut Self, CellError>
    where
        T: CellEncode,
    {
        for (i, v) in values.into_iter().enumerate() {
            self.store(v).with_context(|| format!("[{i}]"))?;
        }
        Ok(self)
    }

    /// [Maybe](https://docs.ton.org/develop/data-formats/tl-b-types#maybe)
    /// with a single presence bit
    /// ```tlb
    /// nothing$0 {X:Type} = Maybe X;
    /// just$1 {X:Type} value:X = Maybe X;
    /// ```
    #[inline]
    pub fn store_maybe<T>(&mut self, value: Option<T>) -> Result<&mut Self, CellError>
    where
        T: CellEncode,
    {
        match value {
            None => self.store_bit(false),
            Some(v) => self.store_bit(true)?.store(v).context("just"),
        }
    }

    /// Stores `absent` bits for [`None`] and the value itself otherwise.
    ///
    /// Encoding of the value must never start with `absent`.
    #[inline]
    pub fn store_maybe_with_pattern<T>(
        &mut self,
        value: Option<T>,
        absent: &BitSlice<u8, Msb0>,
    ) -> Result<&mut Self, CellError>
    where
        T: CellEncode,
    {
        match value {
            None => self.store_bits(absent),
            Some(v) => self.store(v),
        }
    }

    /// Store given cell as a reference
    #[inline]
    pub fn store_reference(&mut self, cell: impl Into<Arc<Cell>>) -> Result<&mut Self, CellError> {
        self.ensure_reference()?;
        self.references.push(cell.into());
        Ok(self)
    }

    /// Encode the value into a separate ordinary cell and store it as a
    /// reference
    #[inline]
    pub fn store_child<T>(&mut self, value: T) -> Result<&mut Self, CellError>
    where
        T: CellEncode,
    {
        self.ensure_reference()?;
        let child = value.to_cell()?;
        self.store_reference(child)
    }

    /// Append data and references of given cell
    #[inline]
    pub fn store_contents_of(&mut self, cell: &Cell) -> Result<&mut Self, CellError> {
        self.ensure_bits(cell.bits().len())?;
        if cell.references().len() > self.references_left() {
            return Err(CellError::constraint(
                self.kind,
                Bound::Max,
                CellProperty::References,
                self.references.len() + cell.references().len(),
            ));
        }
        self.store_bits(cell.bits())?;
        self.references.extend(cell.references().iter().cloned());
        Ok(self)
    }

    /// `Either X ^X`: stores the value inline when it fits together with
    /// given `headroom` reserved for subsequent fields, and as a
    /// reference otherwise.
    /// ```tlb
    /// left$0 {X:Type} {Y:Type} value:X = Either X Y;
    /// right$1 {X:Type} {Y:Type} value:Y = Either X Y;
    /// ```
    pub fn store_either<T>(&mut self, value: T, headroom: Footprint) -> Result<&mut Self, CellError>
    where
        T: CellEncode,
    {
        let footprint = value.footprint()?;
        let inline = 1 + footprint.bits + headroom.bits <= self.capacity_left()
            && footprint.references + headroom.references <= self.references_left();
        if inline {
            self.store_bit(false)?.store(value).context("left")
        } else {
            self.store_bit(true)?.store_child(value).context("right")
        }
    }

    /// Executes given commands in order
    pub fn execute(&mut self, commands: &[Command]) -> Result<&mut Self, CellError> {
        for (i, command) in commands.iter().enumerate() {
            self.execute_one(command).with_context(|| format!("[{i}]"))?;
        }
        Ok(self)
    }

    fn execute_one(&mut self, command: &Command) -> Result<&mut Self, CellError> {
        match command {
            Command::Bit(bit) => self.store_bit(*bit),
            Command::Bits(bits) => self.store_bits(bits),
            Command::Bytes(bytes) => self.store_bytes(bytes),
            Command::Pattern { value, width } => self.store_pattern(*value, *width),
            Command::Reference(cell) => self.store_reference(cell.clone()),
            Command::ContentsOf(cell) => self.store_contents_of(cell),
            Command::Child(commands) => self.store_child(commands),
            Command::Maybe(commands) => self.store_maybe(commands.as_ref()),
            Command::Either { commands, headroom } => self.store_either(commands, *headroom),
        }
    }

    /// Convert builder to [`Cell`], checking minimums of its kind
    #[inline]
    pub fn build(self) -> Result<Cell, CellError> {
        Cell::new(self.kind, self.data, self.references)
    }
}

impl BitWriter for CellBuilder {
    type Error = CellError;

    #[inline]
    fn capacity_left(&self) -> usize {
        self.kind.bits().end() - self.data.len()
    }

    #[inline]
    fn write_bit(&mut self, bit: bool) -> Result<(), Self::Error> {
        self.ensure_bits(1)?;
        self.data.push_bit(bit);
        Ok(())
    }

    #[inline]
    fn write_bitslice(&mut self, bits: &BitSlice<u8, Msb0>) -> Result<(), Self::Error> {
        self.ensure_bits(bits.len())?;
        self.data.push_bits(bits);
        Ok(())
    }

    #[inline]
    fn repeat_bit(&mut self, n: usize, bit: bool) -> Result<(), Self::Error> {
        self.ensure_bits(n)?;
        self.data.push_bits(&BitStorage::repeating(bit, n));
        Ok(())
    }
}
