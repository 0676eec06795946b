use core::marker::PhantomData;

use crate::{
    cell::{from_addr, to_addr, Cell, CELL},
    heap::Heap,
    Error,
};

/// A value that can be stored in a heap-resident stack.
pub trait Slot: Copy {
    const SIZE: usize;
    fn load(heap: &Heap, addr: usize) -> Result<Self, Error>;
    fn store(heap: &mut Heap, addr: usize, val: Self) -> Result<(), Error>;
}

impl Slot for Cell {
    const SIZE: usize = CELL;

    fn load(heap: &Heap, addr: usize) -> Result<Self, Error> {
        heap.cell(addr)
    }

    fn store(heap: &mut Heap, addr: usize, val: Self) -> Result<(), Error> {
        heap.set_cell(addr, val)
    }
}

impl Slot for f32 {
    const SIZE: usize = 4;

    fn load(heap: &Heap, addr: usize) -> Result<Self, Error> {
        heap.f32(addr)
    }

    fn store(heap: &mut Heap, addr: usize, val: Self) -> Result<(), Error> {
        heap.set_f32(addr, val)
    }
}

/// An upward-growing stack living in a region of the heap.
///
/// `ptr` is the address of the top element. The slot at `base` is a
/// sentinel and never holds a value, so the stack is empty when
/// `ptr == base`.
pub struct Stack<T: Slot> {
    base: usize,
    limit: usize,
    ptr: usize,
    _slot: PhantomData<T>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackError {
    StackEmpty,
    StackFull,
    OverwriteInvalid,
}

impl<T: Slot> Stack<T> {
    /// A stack over `[base, base + len)`.
    pub fn new(base: usize, len: usize) -> Self {
        Self {
            base,
            limit: base + len,
            ptr: base,
            _slot: PhantomData,
        }
    }

    #[inline]
    pub fn push(&mut self, heap: &mut Heap, item: T) -> Result<(), Error> {
        let next = self.ptr + T::SIZE;
        if next + T::SIZE > self.limit {
            return Err(StackError::StackFull.into());
        }
        T::store(heap, next, item)?;
        self.ptr = next;
        Ok(())
    }

    #[inline]
    pub fn pop(&mut self, heap: &Heap) -> Result<T, Error> {
        let val = self.peek(heap)?;
        self.ptr -= T::SIZE;
        Ok(val)
    }

    #[inline]
    pub fn peek(&self, heap: &Heap) -> Result<T, Error> {
        if self.ptr == self.base {
            return Err(StackError::StackEmpty.into());
        }
        T::load(heap, self.ptr)
    }

    /// Reads the `n`th element below the top, `0` being the top itself.
    pub fn peek_back_n(&self, heap: &Heap, n: usize) -> Result<T, Error> {
        if n >= self.depth() {
            return Err(StackError::StackEmpty.into());
        }
        T::load(heap, self.ptr - n * T::SIZE)
    }

    pub fn overwrite_back_n(&mut self, heap: &mut Heap, n: usize, item: T) -> Result<(), Error> {
        if n >= self.depth() {
            return Err(StackError::OverwriteInvalid.into());
        }
        T::store(heap, self.ptr - n * T::SIZE, item)
    }

    #[inline]
    pub fn depth(&self) -> usize {
        (self.ptr - self.base) / T::SIZE
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ptr == self.base
    }

    #[inline]
    pub fn clear(&mut self) {
        self.ptr = self.base;
    }

    /// The top-of-stack pointer, as seen by `SP@` and friends.
    #[inline]
    pub fn ptr(&self) -> Cell {
        from_addr(self.ptr)
    }

    /// Moves the top-of-stack pointer. It must stay on a slot boundary
    /// inside the stack's region.
    pub fn set_ptr(&mut self, ptr: Cell) -> Result<(), Error> {
        let p = to_addr(ptr)?;
        if p < self.base || p + T::SIZE > self.limit || (p - self.base) % T::SIZE != 0 {
            return Err(StackError::OverwriteInvalid.into());
        }
        self.ptr = p;
        Ok(())
    }

    /// Copies the contents out, bottom first.
    pub fn to_vec(&self, heap: &Heap) -> Result<alloc::vec::Vec<T>, Error> {
        let depth = self.depth();
        (1..=depth)
            .map(|i| T::load(heap, self.base + i * T::SIZE))
            .collect()
    }
}
