//! The machine word and the layout constants derived from it.

use core::mem::size_of;

use crate::{Error, ReplaceErr};

/// The VM's native word. Addresses, integers, flags and execution tokens
/// are all cells.
pub type Cell = isize;

/// Size of a [`Cell`] in bytes.
pub const CELL: usize = size_of::<Cell>();

/// Flag bit: the word runs even while compiling.
pub const IMMEDIATE: u8 = 1;
/// Flag bit: the word is hidden from `find`.
pub const SMUDGE: u8 = 2;

/// Maximum number of wordlists in the search order.
pub const VOCABULARY_DEPTH: usize = 16;

/// Longest name a dictionary entry can carry (it is stored in one byte).
pub const MAX_NAME_LEN: usize = u8::MAX as usize;

/// Forth true.
pub const TRUE: Cell = -1;
/// Forth false.
pub const FALSE: Cell = 0;

#[inline]
pub const fn cell_aligned(n: usize) -> usize {
    (n + (CELL - 1)) & !(CELL - 1)
}

/// Number of cells needed to hold `n` bytes.
#[inline]
pub const fn cell_len(n: usize) -> usize {
    cell_aligned(n) / CELL
}

#[inline]
pub const fn flag(b: bool) -> Cell {
    if b {
        TRUE
    } else {
        FALSE
    }
}

/// Interprets a cell as a heap address.
#[inline]
pub fn to_addr(c: Cell) -> Result<usize, Error> {
    usize::try_from(c).replace_err(Error::BadAddress(c))
}

/// Interprets a heap address as a cell.
#[inline]
pub fn from_addr(a: usize) -> Cell {
    a as Cell
}
