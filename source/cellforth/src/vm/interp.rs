use crate::{
    cell::{from_addr, IMMEDIATE, TRUE},
    heap::Sys,
    number::{convert, fconvert},
    vm::{Flow, SuspendReason, Vm},
    Error,
};

impl<T: 'static> Vm<T> {
    /// The outer interpreter's single step: take one token from the input
    /// and compile it, run it, or treat it as a literal.
    ///
    /// Tokens that are neither words nor literals are handed to the
    /// `notfound` word as `( addr len -1 )`. At end of input the VM
    /// suspends instead.
    pub fn evaluate1(&mut self) -> Result<Flow, Error> {
        let (addr, len) = self.heap.parse(b' ')?;
        if len == 0 {
            return Ok(Flow::Suspend(SuspendReason::InputExhausted));
        }
        let compiling = self.heap.sys(Sys::State) != 0;
        let name = self.heap.bytes(addr, len)?;

        if let Some(xt) = self.heap.find(name)? {
            if compiling && self.heap.flags(xt)? & IMMEDIATE == 0 {
                self.heap.comma(from_addr(xt))?;
                return Ok(Flow::Next);
            }
            return Ok(Flow::Execute(from_addr(xt)));
        }

        if let Some(n) = convert(name, self.heap.sys(Sys::Base)) {
            if compiling {
                self.heap.comma(from_addr(self.xts.dolit))?;
                self.heap.comma(n)?;
            } else {
                self.push(n)?;
            }
            return Ok(Flow::Next);
        }

        if let Some(f) = fconvert(name) {
            if compiling {
                self.heap.comma(from_addr(self.xts.doflit))?;
                self.heap.comma_f32(f)?;
            } else {
                self.fpush(f)?;
            }
            return Ok(Flow::Next);
        }

        tracing::debug!(
            token = core::str::from_utf8(name).unwrap_or("<non-utf8>"),
            "not found"
        );
        self.push(from_addr(addr))?;
        self.push(from_addr(len))?;
        self.push(TRUE)?;
        Ok(Flow::Execute(self.heap.sys(Sys::NotFound)))
    }
}
