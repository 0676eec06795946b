//! The input buffer: `'tib`, `#tib` and `>in` in the system block, naming
//! the line being evaluated and how far into it the parser has got.

use crate::{
    cell::{from_addr, to_addr},
    heap::{Heap, Sys},
    Error,
};

#[inline]
fn matches(sep: u8, ch: u8) -> bool {
    sep == ch || (sep == b' ' && matches!(ch, b'\t' | b'\n' | b'\r'))
}

impl Heap {
    /// Points the input buffer at `len` bytes starting at `addr`.
    pub fn set_input(&mut self, addr: usize, len: usize) {
        self.set_sys(Sys::Tib, from_addr(addr));
        self.set_sys(Sys::NTib, from_addr(len));
        self.set_sys(Sys::In, 0);
    }

    /// Marks the whole input buffer as consumed.
    pub fn discard_input(&mut self) {
        let ntib = self.sys(Sys::NTib);
        self.set_sys(Sys::In, ntib);
    }

    /// Scans the next token delimited by `sep`, returning its address and
    /// length. A space separator also matches tab, CR and LF, and leading
    /// separators are skipped only in that case. The separator that ends
    /// the token is consumed. Returns a zero length at end of input.
    pub fn parse(&mut self, sep: u8) -> Result<(usize, usize), Error> {
        let tib = to_addr(self.sys(Sys::Tib))?;
        let ntib = to_addr(self.sys(Sys::NTib))?;
        let mut tin = to_addr(self.sys(Sys::In))?.min(ntib);
        let text = self.bytes(tib, ntib)?;

        if sep == b' ' {
            while tin < ntib && matches(sep, text[tin]) {
                tin += 1;
            }
        }
        let start = tin;
        while tin < ntib && !matches(sep, text[tin]) {
            tin += 1;
        }
        let len = tin - start;
        if tin < ntib {
            tin += 1;
        }
        self.set_sys(Sys::In, from_addr(tin));
        Ok((tib + start, len))
    }
}
