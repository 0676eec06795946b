//! The search order.
//!
//! `context` points at an array of `VOCABULARY_DEPTH + 1` cells, each either
//! the address of a wordlist head cell or zero. Entries are searched front
//! to back and the array always ends in a zero. `current` is the address of
//! the head cell that receives new definitions.

use alloc::vec::Vec;

use crate::{
    cell::{from_addr, to_addr, Cell, CELL, VOCABULARY_DEPTH},
    heap::{Heap, Sys},
    Error,
};

impl Heap {
    fn context_addr(&self) -> Result<usize, Error> {
        to_addr(self.sys(Sys::Context))
    }

    /// Wordlists in the search order, first searched first.
    pub fn search_order(&self) -> Result<Vec<Cell>, Error> {
        let ctx = self.context_addr()?;
        let mut order = Vec::new();
        for i in 0..VOCABULARY_DEPTH {
            match self.cell(ctx + i * CELL)? {
                0 => break,
                wl => order.push(wl),
            }
        }
        Ok(order)
    }

    pub fn search_depth(&self) -> Result<usize, Error> {
        Ok(self.search_order()?.len())
    }

    /// Duplicates the first wordlist of the search order.
    pub fn also(&mut self) -> Result<(), Error> {
        let depth = self.search_depth()?;
        if depth >= VOCABULARY_DEPTH {
            return Err(Error::SearchOrderOverflow);
        }
        if depth == 0 {
            return Err(Error::SearchOrderUnderflow);
        }
        let ctx = self.context_addr()?;
        self.copy_within(ctx, ctx + CELL, depth * CELL)
    }

    /// Drops the first wordlist of the search order. The last one cannot be
    /// removed.
    pub fn previous(&mut self) -> Result<(), Error> {
        let depth = self.search_depth()?;
        if depth <= 1 {
            return Err(Error::SearchOrderUnderflow);
        }
        let ctx = self.context_addr()?;
        self.copy_within(ctx + CELL, ctx, (depth - 1) * CELL)?;
        self.set_cell(ctx + (depth - 1) * CELL, 0)
    }

    /// Resets the search order to the single wordlist `root`.
    pub fn only(&mut self, root: usize) -> Result<(), Error> {
        let ctx = self.context_addr()?;
        self.set_cell(ctx, from_addr(root))?;
        for i in 1..=VOCABULARY_DEPTH {
            self.set_cell(ctx + i * CELL, 0)?;
        }
        Ok(())
    }

    /// New definitions go into the first wordlist of the search order.
    pub fn definitions(&mut self) -> Result<(), Error> {
        let first = self.cell(self.context_addr()?)?;
        if first == 0 {
            return Err(Error::SearchOrderUnderflow);
        }
        self.set_sys(Sys::Current, first);
        Ok(())
    }
}
