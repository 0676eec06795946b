//! Native functions callable from forth through `DLSYM` and `CALLn`.
//!
//! The host registers plain Rust functions by name. `DLSYM` turns a name
//! into a non-zero handle, and `CALL0`..`CALL6` pass cells to the function
//! behind a handle and push its result.

use alloc::vec::Vec;
use core::hash::Hasher as _;

use hash32::{FnvHasher, Hasher};

use crate::cell::Cell;

pub type NativeFn = fn(&[Cell]) -> Cell;

struct Symbol {
    hash: u32,
    name: &'static str,
    func: NativeFn,
}

#[derive(Default)]
pub struct NativeTable {
    symbols: Vec<Symbol>,
}

fn hash(name: &[u8]) -> u32 {
    let mut hasher = FnvHasher::default();
    hasher.write(name);
    hasher.finish32()
}

impl NativeTable {
    pub const fn new() -> Self {
        Self {
            symbols: Vec::new(),
        }
    }

    /// Adds or replaces the function registered as `name`. Names are
    /// matched exactly.
    pub fn register(&mut self, name: &'static str, func: NativeFn) {
        let hash = hash(name.as_bytes());
        match self
            .symbols
            .iter_mut()
            .find(|s| s.hash == hash && s.name == name)
        {
            Some(sym) => sym.func = func,
            None => self.symbols.push(Symbol { hash, name, func }),
        }
        tracing::trace!(name, "registered native");
    }

    /// The handle for `name`, or `None` if nothing is registered under it.
    pub fn resolve(&self, name: &[u8]) -> Option<Cell> {
        let hash = hash(name);
        self.symbols
            .iter()
            .position(|s| s.hash == hash && s.name.as_bytes() == name)
            .map(|idx| idx as Cell + 1)
    }

    pub fn get(&self, handle: Cell) -> Option<NativeFn> {
        let idx = usize::try_from(handle).ok()?.checked_sub(1)?;
        self.symbols.get(idx).map(|s| s.func)
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}
