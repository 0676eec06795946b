//! Dictionary entries, laid out in the heap as
//!
//! ```text
//! [name bytes, cell aligned][link][flags | len << 8 | params << 16][code][parameter field...]
//!                                                                    ^ xt
//! ```
//!
//! The execution token (xt) of an entry is the address of its code cell.

use crate::{
    cell::{cell_aligned, from_addr, to_addr, Cell, CELL, MAX_NAME_LEN, SMUDGE},
    heap::{Heap, Sys},
    Error,
};

/// Opcode ids start after the three built-in engines.
pub const FIRST_OPCODE: usize = 3;

/// Index of a primitive in the assembled opcode table, offset by
/// [`FIRST_OPCODE`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Opcode(pub usize);

/// What invoking a word does, decoded from its code cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Code {
    /// Run the threaded body that follows the code cell.
    Colon,
    /// Push the address of the parameter field.
    Create,
    /// Push the address of the parameter field, then run the behavior
    /// stored in the does-slot.
    Does,
    Primitive(Opcode),
}

impl Code {
    pub fn decode(c: Cell) -> Result<Self, Error> {
        match c {
            0 => Ok(Code::Colon),
            1 => Ok(Code::Create),
            2 => Ok(Code::Does),
            n if n >= FIRST_OPCODE as Cell => Ok(Code::Primitive(Opcode(n as usize))),
            n => Err(Error::BadOpcode(n)),
        }
    }

    pub fn encode(self) -> Cell {
        match self {
            Code::Colon => 0,
            Code::Create => 1,
            Code::Does => 2,
            Code::Primitive(Opcode(n)) => n as Cell,
        }
    }
}

/// Address of the does-slot of a create/does entry.
#[inline]
pub fn to_does(xt: usize) -> usize {
    xt + CELL
}

/// Address of the parameter field of a create/does entry.
#[inline]
pub fn to_body(xt: usize) -> usize {
    xt + 2 * CELL
}

fn header_addr(xt: usize, back: usize) -> Result<usize, Error> {
    xt.checked_sub(back).ok_or(Error::BadAddress(from_addr(xt)))
}

impl Heap {
    #[inline]
    pub fn to_flags(&self, xt: usize) -> Result<usize, Error> {
        header_addr(xt, CELL)
    }

    #[inline]
    pub fn to_link(&self, xt: usize) -> Result<usize, Error> {
        header_addr(xt, 2 * CELL)
    }

    pub fn flags(&self, xt: usize) -> Result<u8, Error> {
        self.byte(self.to_flags(xt)?)
    }

    pub fn set_flags(&mut self, xt: usize, flags: u8) -> Result<(), Error> {
        let at = self.to_flags(xt)?;
        self.set_byte(at, flags)
    }

    pub fn name_len(&self, xt: usize) -> Result<usize, Error> {
        Ok(self.byte(self.to_flags(xt)? + 1)? as usize)
    }

    /// Size of the parameter field in cells, filled in by [`Heap::finish`].
    pub fn params(&self, xt: usize) -> Result<u16, Error> {
        self.u16(self.to_flags(xt)? + 2)
    }

    pub fn link(&self, xt: usize) -> Result<Cell, Error> {
        self.cell(self.to_link(xt)?)
    }

    /// Address and length of an entry's name.
    pub fn to_name(&self, xt: usize) -> Result<(usize, usize), Error> {
        let len = self.name_len(xt)?;
        Ok((header_addr(self.to_link(xt)?, cell_aligned(len))?, len))
    }

    pub fn name(&self, xt: usize) -> Result<&[u8], Error> {
        let (addr, len) = self.to_name(xt)?;
        self.bytes(addr, len)
    }

    pub fn code(&self, xt: usize) -> Result<Code, Error> {
        Code::decode(self.cell(xt)?)
    }

    pub fn set_code(&mut self, xt: usize, code: Code) -> Result<(), Error> {
        self.set_cell(xt, code.encode())
    }

    pub fn latest_xt(&self) -> Cell {
        self.sys(Sys::LatestXt)
    }

    /// Back-fills the parameter field size of the latest entry, if it has
    /// not been set yet.
    ///
    /// The size is the number of cells between the code cell and `here`.
    /// Spans that are negative or do not fit 16 bits saturate to `0xFFFF`.
    pub fn finish(&mut self) -> Result<(), Error> {
        let xt = self.latest_xt();
        if xt == 0 {
            return Ok(());
        }
        let xt = to_addr(xt)?;
        if self.params(xt)? != 0 {
            return Ok(());
        }
        let span = from_addr(self.here()?) - from_addr(xt + CELL);
        let size = if span < 0 {
            0xFFFF
        } else {
            u16::try_from(span / CELL as Cell).unwrap_or(0xFFFF)
        };
        let at = self.to_flags(xt)? + 2;
        self.set_u16(at, size)
    }

    /// Appends a new entry to the current wordlist and makes it the latest
    /// definition. Returns its xt.
    pub fn create(&mut self, name: &[u8], flags: u8, code: Code) -> Result<usize, Error> {
        if name.len() > MAX_NAME_LEN {
            return Err(Error::NameTooLong);
        }
        self.finish()?;
        self.align()?;
        self.comma_bytes(name)?;
        self.align()?;
        let current = to_addr(self.sys(Sys::Current))?;
        let link = self.cell(current)?;
        self.comma(link)?;
        self.comma(((name.len() as Cell) << 8) | flags as Cell)?;
        let xt = self.here()?;
        self.set_cell(current, from_addr(xt))?;
        self.set_sys(Sys::LatestXt, from_addr(xt));
        self.comma(code.encode())?;
        Ok(xt)
    }

    /// Like [`Heap::create`], for a name that already lives in the heap.
    pub fn create_from(
        &mut self,
        name_addr: usize,
        len: usize,
        flags: u8,
        code: Code,
    ) -> Result<usize, Error> {
        if len == 0 {
            return Err(Error::MissingName);
        }
        if len > MAX_NAME_LEN {
            return Err(Error::NameTooLong);
        }
        let mut buf = [0u8; MAX_NAME_LEN];
        buf[..len].copy_from_slice(self.bytes(name_addr, len)?);
        self.create(&buf[..len], flags, code)
    }

    /// Searches the wordlist whose head cell is at `wordlist`.
    pub fn find_in(&self, wordlist: usize, name: &[u8]) -> Result<Option<usize>, Error> {
        let mut xt = self.cell(wordlist)?;
        while xt != 0 {
            let x = to_addr(xt)?;
            if self.flags(x)? & SMUDGE == 0
                && self.name_len(x)? == name.len()
                && same(name, self.name(x)?)
            {
                return Ok(Some(x));
            }
            xt = self.link(x)?;
        }
        Ok(None)
    }

    /// Searches every wordlist in the search order, first to last.
    pub fn find(&self, name: &[u8]) -> Result<Option<usize>, Error> {
        let mut voc = to_addr(self.sys(Sys::Context))?;
        loop {
            let wordlist = self.cell(voc)?;
            if wordlist == 0 {
                return Ok(None);
            }
            if let Some(xt) = self.find_in(to_addr(wordlist)?, name)? {
                return Ok(Some(xt));
            }
            voc += CELL;
        }
    }
}

/// Name comparison. Only ASCII lowercase letters are folded.
fn same(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len()
        && a.iter()
            .zip(b)
            .all(|(x, y)| x.to_ascii_uppercase() == y.to_ascii_uppercase())
}

#[cfg(test)]
pub mod test {
    use super::*;
    use crate::{
        cell::{cell_len, IMMEDIATE},
        heap::SYS_END,
    };

    /// A heap with one empty wordlist in the search order.
    fn scratch() -> (Heap, usize) {
        let mut heap = Heap::new(4096).unwrap();
        let wl = heap.here().unwrap();
        heap.comma(0).unwrap();
        let ctx = heap.here().unwrap();
        heap.comma(from_addr(wl)).unwrap();
        heap.comma(0).unwrap();
        heap.set_sys(Sys::Current, from_addr(wl));
        heap.set_sys(Sys::Context, from_addr(ctx));
        (heap, wl)
    }

    #[test]
    fn layout() {
        let (mut heap, wl) = scratch();
        let start = heap.here().unwrap();
        let xt = heap.create(b"dup", IMMEDIATE, Code::Create).unwrap();
        assert_eq!(start, SYS_END + 3 * CELL);
        assert_eq!(xt, start + (cell_len(3) + 2) * CELL);
        assert_eq!(heap.name(xt).unwrap(), b"dup");
        assert_eq!(heap.flags(xt).unwrap(), IMMEDIATE);
        assert_eq!(heap.link(xt).unwrap(), 0);
        assert_eq!(heap.code(xt).unwrap(), Code::Create);
        assert_eq!(heap.cell(wl).unwrap(), from_addr(xt));
        assert_eq!(heap.latest_xt(), from_addr(xt));
        // byte1 of the header cell is the name length
        assert_eq!(heap.byte(xt - CELL + 1).unwrap(), 3);
    }

    #[test]
    fn find_is_case_insensitive_for_letters_only() {
        let (mut heap, _) = scratch();
        let xt = heap.create(b"Swap", 0, Code::Colon).unwrap();
        heap.create(b"[", 0, Code::Colon).unwrap();
        assert_eq!(heap.find(b"SWAP").unwrap(), Some(xt));
        assert_eq!(heap.find(b"swap").unwrap(), Some(xt));
        assert_eq!(heap.find(b"swa").unwrap(), None);
        // '{' is not '[' folded
        assert_eq!(heap.find(b"{").unwrap(), None);
    }

    #[test]
    fn find_skips_hidden() {
        let (mut heap, _) = scratch();
        let old = heap.create(b"x", 0, Code::Colon).unwrap();
        let new = heap.create(b"x", SMUDGE, Code::Colon).unwrap();
        assert_eq!(heap.find(b"x").unwrap(), Some(old));
        heap.set_flags(new, 0).unwrap();
        assert_eq!(heap.find(b"x").unwrap(), Some(new));
    }

    #[test]
    fn find_only_sees_the_search_order() {
        let (mut heap, wl) = scratch();
        let other = heap.here().unwrap();
        heap.comma(0).unwrap();
        heap.set_sys(Sys::Current, from_addr(other));
        heap.create(b"hidden", 0, Code::Colon).unwrap();
        assert_eq!(heap.find(b"hidden").unwrap(), None);
        heap.set_sys(Sys::Current, from_addr(wl));
        assert!(heap.find_in(other, b"hidden").unwrap().is_some());
    }

    #[test]
    fn finish_measures_the_previous_body() {
        let (mut heap, _) = scratch();
        let first = heap.create(b"first", 0, Code::Colon).unwrap();
        for i in 0..5 {
            heap.comma(i).unwrap();
        }
        let second = heap.create(b"second", 0, Code::Colon).unwrap();
        assert_eq!(heap.params(first).unwrap(), 5);
        let (name, _) = heap.to_name(second).unwrap();
        assert_eq!((name - (first + CELL)) / CELL, 5);
        // not yet finished
        assert_eq!(heap.params(second).unwrap(), 0);
    }

    #[test]
    fn finish_saturates() {
        let mut heap = Heap::new(0x10000 * CELL + 4096).unwrap();
        let wl = heap.here().unwrap();
        heap.comma(0).unwrap();
        heap.set_sys(Sys::Current, from_addr(wl));
        let big = heap.create(b"big", 0, Code::Colon).unwrap();
        heap.allot(0x10000 * CELL).unwrap();
        heap.finish().unwrap();
        assert_eq!(heap.params(big).unwrap(), 0xFFFF);

        let back = heap.create(b"back", 0, Code::Colon).unwrap();
        heap.set_sys(Sys::Here, from_addr(back - 4 * CELL));
        heap.finish().unwrap();
        assert_eq!(heap.params(back).unwrap(), 0xFFFF);
    }

    #[test]
    fn names_are_bounded() {
        let (mut heap, _) = scratch();
        let long = [b'a'; MAX_NAME_LEN + 1];
        assert_eq!(heap.create(&long, 0, Code::Colon), Err(Error::NameTooLong));
        let at = heap.here().unwrap();
        assert_eq!(heap.create_from(at, 0, 0, Code::Colon), Err(Error::MissingName));
    }
}
