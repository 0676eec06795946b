//! The heap: one fixed-size byte arena holding the system block, the three
//! stacks, the dictionary and everything the boot program compiles.
//!
//! Addresses are byte offsets into the arena. All cells are stored
//! little-endian, so `C@` on a packed header cell sees the flag byte first.

use alloc::{boxed::Box, vec};
use core::ops::Range;

use crate::{
    cell::{cell_aligned, from_addr, to_addr, Cell, CELL},
    Error,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BumpError {
    OutOfMemory,
}

/// Cells of the system block. The block lives at [`SYS_ADDR`], so compiled
/// code can reach every field through `'SYS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sys {
    Here = 0,
    Current,
    Context,
    LatestXt,
    NotFound,
    HeapStart,
    HeapSize,
    StackCells,
    Boot,
    BootSize,
    Tib,
    NTib,
    In,
    State,
    Base,
    Argc,
    Argv,
    Runner,
}

impl Sys {
    pub const CELLS: usize = 18;

    #[inline]
    pub const fn addr(self) -> usize {
        SYS_ADDR + (self as usize) * CELL
    }
}

/// Four cells are left unused at the bottom so that no entry ever sits at
/// address zero.
pub const SYS_ADDR: usize = 4 * CELL;
pub const SYS_END: usize = SYS_ADDR + Sys::CELLS * CELL;

pub struct Heap {
    mem: Box<[u8]>,
}

#[inline]
fn load<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut buf = [0u8; N];
    buf.copy_from_slice(bytes);
    buf
}

impl Heap {
    pub fn new(size: usize) -> Result<Self, BumpError> {
        if size < SYS_END {
            return Err(BumpError::OutOfMemory);
        }
        let mut heap = Self {
            mem: vec![0u8; size].into_boxed_slice(),
        };
        heap.set_sys(Sys::Here, from_addr(SYS_END));
        heap.set_sys(Sys::HeapSize, from_addr(size));
        Ok(heap)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.mem.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.mem.is_empty()
    }

    fn range(&self, addr: usize, len: usize) -> Result<Range<usize>, Error> {
        match addr.checked_add(len) {
            Some(end) if end <= self.mem.len() => Ok(addr..end),
            _ => Err(Error::BadAddress(from_addr(addr))),
        }
    }

    pub fn bytes(&self, addr: usize, len: usize) -> Result<&[u8], Error> {
        let r = self.range(addr, len)?;
        Ok(&self.mem[r])
    }

    pub fn bytes_mut(&mut self, addr: usize, len: usize) -> Result<&mut [u8], Error> {
        let r = self.range(addr, len)?;
        Ok(&mut self.mem[r])
    }

    pub fn cell(&self, addr: usize) -> Result<Cell, Error> {
        Ok(Cell::from_le_bytes(load(self.bytes(addr, CELL)?)))
    }

    pub fn set_cell(&mut self, addr: usize, val: Cell) -> Result<(), Error> {
        self.bytes_mut(addr, CELL)?.copy_from_slice(&val.to_le_bytes());
        Ok(())
    }

    pub fn byte(&self, addr: usize) -> Result<u8, Error> {
        Ok(self.bytes(addr, 1)?[0])
    }

    pub fn set_byte(&mut self, addr: usize, val: u8) -> Result<(), Error> {
        self.bytes_mut(addr, 1)?[0] = val;
        Ok(())
    }

    pub fn u16(&self, addr: usize) -> Result<u16, Error> {
        Ok(u16::from_le_bytes(load(self.bytes(addr, 2)?)))
    }

    pub fn set_u16(&mut self, addr: usize, val: u16) -> Result<(), Error> {
        self.bytes_mut(addr, 2)?.copy_from_slice(&val.to_le_bytes());
        Ok(())
    }

    pub fn i32(&self, addr: usize) -> Result<i32, Error> {
        Ok(i32::from_le_bytes(load(self.bytes(addr, 4)?)))
    }

    pub fn set_i32(&mut self, addr: usize, val: i32) -> Result<(), Error> {
        self.bytes_mut(addr, 4)?.copy_from_slice(&val.to_le_bytes());
        Ok(())
    }

    pub fn f32(&self, addr: usize) -> Result<f32, Error> {
        Ok(f32::from_le_bytes(load(self.bytes(addr, 4)?)))
    }

    pub fn set_f32(&mut self, addr: usize, val: f32) -> Result<(), Error> {
        self.bytes_mut(addr, 4)?.copy_from_slice(&val.to_le_bytes());
        Ok(())
    }

    /// `memmove` within the heap.
    pub fn copy_within(&mut self, src: usize, dst: usize, len: usize) -> Result<(), Error> {
        let from = self.range(src, len)?;
        self.range(dst, len)?;
        self.mem.copy_within(from, dst);
        Ok(())
    }

    // The system block is always in bounds, `new` refuses smaller heaps.

    #[inline]
    pub fn sys(&self, field: Sys) -> Cell {
        let a = field.addr();
        Cell::from_le_bytes(load(&self.mem[a..a + CELL]))
    }

    #[inline]
    pub fn set_sys(&mut self, field: Sys, val: Cell) {
        let a = field.addr();
        self.mem[a..a + CELL].copy_from_slice(&val.to_le_bytes());
    }

    /// The next free byte.
    #[inline]
    pub fn here(&self) -> Result<usize, Error> {
        to_addr(self.sys(Sys::Here))
    }

    /// Reserves `n` bytes at `here`, returning their start.
    pub fn allot(&mut self, n: usize) -> Result<usize, Error> {
        let at = self.here()?;
        let end = at
            .checked_add(n)
            .filter(|end| *end <= self.mem.len())
            .ok_or(BumpError::OutOfMemory)?;
        self.set_sys(Sys::Here, from_addr(end));
        Ok(at)
    }

    pub fn align(&mut self) -> Result<(), Error> {
        let at = self.here()?;
        let pad = cell_aligned(at) - at;
        self.allot(pad)?;
        Ok(())
    }

    /// Appends one cell.
    pub fn comma(&mut self, val: Cell) -> Result<(), Error> {
        let at = self.allot(CELL)?;
        self.set_cell(at, val)
    }

    /// Appends a float literal, padded out to a full cell.
    pub fn comma_f32(&mut self, val: f32) -> Result<(), Error> {
        let at = self.allot(CELL)?;
        self.bytes_mut(at, CELL)?.fill(0);
        self.set_f32(at, val)
    }

    pub fn comma_bytes(&mut self, bytes: &[u8]) -> Result<usize, Error> {
        let at = self.allot(bytes.len())?;
        self.bytes_mut(at, bytes.len())?.copy_from_slice(bytes);
        Ok(at)
    }
}
