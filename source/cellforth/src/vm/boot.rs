//! Building a VM: heap layout, priming the dictionary with the primitives,
//! and seeding the return stack so the driver runs the boot program.

use alloc::vec::Vec;

use crate::{
    cell::{from_addr, Cell, CELL, VOCABULARY_DEPTH},
    dictionary::{Code, Opcode, FIRST_OPCODE},
    heap::{BumpError, Heap, Sys},
    native::NativeTable,
    output::OutputBuf,
    params::VmParams,
    stack::Stack,
    vm::{opcodes::OpcodeEntry, CachedXts, Resume, Vm},
    Error,
};

fn cached(heap: &Heap, name: &'static str) -> Result<usize, Error> {
    heap.find(name.as_bytes())?.ok_or(Error::MissingBootWord(name))
}

impl<T: 'static> Vm<T> {
    /// Lays out a fresh heap and installs the core primitives followed by
    /// each list in `platform`, numbering them in that order.
    ///
    /// The heap holds, in order: the system block, the float, return and
    /// data stacks, the FORTH wordlist head, the search order, the host
    /// input buffer, one dictionary entry per primitive and finally the
    /// `EVALUATE1 BRANCH` driver.
    #[tracing::instrument(level = "debug", name = "Vm::new", skip_all, fields(heap_size = params.heap_size))]
    pub fn new(
        params: VmParams,
        host_ctxt: T,
        platform: &[&'static [OpcodeEntry<T>]],
    ) -> Result<Self, Error> {
        let mut heap = Heap::new(params.heap_size)?;

        let stack_len = params
            .stack_cells
            .checked_mul(CELL)
            .ok_or(BumpError::OutOfMemory)?;
        let float_stack = Stack::new(heap.allot(stack_len)?, stack_len);
        let return_stack = Stack::new(heap.allot(stack_len)?, stack_len);
        let data_stack = Stack::new(heap.allot(stack_len)?, stack_len);
        heap.set_sys(Sys::StackCells, params.stack_cells as Cell);

        let forth_wordlist = heap.here()?;
        heap.comma(0)?;
        let context = heap.allot((VOCABULARY_DEPTH + 1) * CELL)?;
        heap.set_sys(Sys::Current, from_addr(forth_wordlist));
        heap.set_sys(Sys::Context, from_addr(context));
        heap.only(forth_wordlist)?;
        heap.set_sys(Sys::LatestXt, 0);

        let input = heap.allot(params.input_buf_elems)?;
        heap.align()?;
        heap.set_input(input, 0);

        let opcodes: Vec<&'static OpcodeEntry<T>> = Self::CORE_OPCODES
            .iter()
            .chain(
                platform
                    .iter()
                    .copied()
                    .flat_map(|list: &'static [OpcodeEntry<T>]| list.iter()),
            )
            .collect();
        for (idx, entry) in opcodes.iter().enumerate() {
            let id = idx + FIRST_OPCODE;
            heap.create(entry.name.as_bytes(), entry.flags, Code::Primitive(Opcode(id)))?;
            tracing::trace!(name = entry.name, id, "installed primitive");
        }
        // Nothing compiled yet, so `;` must not size the last primitive.
        heap.set_sys(Sys::LatestXt, 0);

        let xts = CachedXts {
            dolit: cached(&heap, "DOLIT")?,
            doflit: cached(&heap, "DOFLIT")?,
            exit: cached(&heap, "EXIT")?,
        };
        cached(&heap, "YIELD")?;
        heap.set_sys(Sys::NotFound, from_addr(cached(&heap, "DROP")?));

        let start = heap.here()?;
        heap.comma(from_addr(cached(&heap, "EVALUATE1")?))?;
        heap.comma(from_addr(cached(&heap, "BRANCH")?))?;
        heap.comma(from_addr(start))?;
        heap.set_sys(Sys::Base, 10);

        tracing::debug!(
            primitives = opcodes.len(),
            here = heap.here()?,
            "primed dictionary"
        );

        Ok(Self {
            heap,
            data_stack,
            return_stack,
            float_stack,
            ip: start,
            xts,
            opcodes,
            natives: NativeTable::new(),
            input_buf: (input, params.input_buf_elems),
            start,
            forth_wordlist,
            output: OutputBuf::new(params.output_buf_elems),
            host_ctxt,
        })
    }

    /// Copies `args` and the boot program into the heap and installs the
    /// program as the current input. Returns the handle that starts the
    /// driver; the boot program has been evaluated once `run` reports
    /// [`SuspendReason::InputExhausted`](crate::SuspendReason::InputExhausted).
    #[tracing::instrument(level = "debug", name = "Vm::boot", skip_all, fields(args = args.len(), len = source.len()))]
    pub fn boot(&mut self, args: &[&str], source: &str) -> Result<Resume, Error> {
        let mut argv = Vec::with_capacity(args.len());
        for arg in args {
            argv.push(self.heap.comma_bytes(arg.as_bytes())?);
            self.heap.comma_bytes(&[0])?;
        }
        self.heap.align()?;
        let argv_addr = self.heap.here()?;
        for arg in argv {
            self.heap.comma(from_addr(arg))?;
        }
        self.heap.set_sys(Sys::Argc, args.len() as Cell);
        self.heap.set_sys(Sys::Argv, from_addr(argv_addr));

        let boot = self.heap.comma_bytes(source.as_bytes())?;
        self.heap.align()?;
        self.heap.set_sys(Sys::Boot, from_addr(boot));
        self.heap.set_sys(Sys::BootSize, source.len() as Cell);
        self.heap.set_input(boot, source.len());
        self.heap.set_sys(Sys::Base, 10);

        self.seed()
    }

    /// Copies a host line into the input buffer and makes it the current
    /// input.
    pub fn feed(&mut self, line: &str) -> Result<(), Error> {
        let (addr, cap) = self.input_buf;
        if line.len() > cap {
            return Err(Error::InputTooLong);
        }
        self.heap
            .bytes_mut(addr, line.len())?
            .copy_from_slice(line.as_bytes());
        self.heap.set_input(addr, line.len());
        Ok(())
    }

    /// Abandons whatever was running: empties all three stacks, leaves
    /// compile state, drops pending input and returns a handle that
    /// restarts the driver.
    pub fn reset(&mut self) -> Result<Resume, Error> {
        self.heap.discard_input();
        self.seed()
    }

    /// Resets the search order to the FORTH wordlist alone.
    pub fn only_forth(&mut self) -> Result<(), Error> {
        self.heap.only(self.forth_wordlist)
    }

    fn seed(&mut self) -> Result<Resume, Error> {
        self.data_stack.clear();
        self.return_stack.clear();
        self.float_stack.clear();
        self.heap.set_sys(Sys::State, 0);
        self.ip = self.start;
        self.park()
    }
}

#[cfg(test)]
pub mod test {
    use crate::{
        heap::{BumpError, Sys},
        Error, SuspendReason, Vm, VmParams,
    };

    #[test]
    fn cached_words_are_primitives() {
        let vm = Vm::new(VmParams::new(), (), &[]).unwrap();
        for name in ["DOLIT", "DOFLIT", "EXIT", "YIELD", "EVALUATE1", "BRANCH"] {
            assert!(vm.find(name).unwrap().is_some(), "{name}");
        }
        assert_eq!(vm.heap().latest_xt(), 0);
        assert_eq!(
            vm.heap().sys(Sys::NotFound),
            vm.find("drop").unwrap().unwrap() as isize
        );
        assert!(vm.find("TYPE").unwrap().is_none());
    }

    #[test]
    fn unknown_token_goes_to_the_default_handler() {
        let mut vm = Vm::new(VmParams::new(), (), &[]).unwrap();
        let resume = vm.boot(&[], "").unwrap();
        let sus = vm.interpret(resume, "1.5").unwrap();
        assert_eq!(sus.reason, SuspendReason::InputExhausted);
        // DROP discarded the -1 marker, leaving the token's address and length
        let stack = vm.data_stack().unwrap();
        assert_eq!(stack.len(), 2);
        assert_eq!(stack[1], 3);
        let tok = vm.heap().bytes(stack[0] as usize, 3).unwrap();
        assert_eq!(tok, b"1.5");
        assert!(vm.float_stack().unwrap().is_empty());
    }

    #[test]
    fn float_literals() {
        let mut vm = Vm::new(VmParams::new(), (), &[]).unwrap();
        let resume = vm.boot(&[], "").unwrap();
        vm.interpret(resume, "1.5e2 -2e0").unwrap();
        assert_eq!(vm.float_stack().unwrap(), vec![150.0, -2.0]);
        assert!(vm.data_stack().unwrap().is_empty());
    }

    #[test]
    fn hex_prefix_ignores_base() {
        let mut vm = Vm::new(VmParams::new(), (), &[]).unwrap();
        let resume = vm.boot(&[], "").unwrap();
        vm.interpret(resume, "$FF -12 10").unwrap();
        assert_eq!(vm.data_stack().unwrap(), vec![255, -12, 10]);
    }

    #[test]
    fn too_small_heap() {
        let params = VmParams::new().with_heap_size(4096);
        assert_eq!(
            Vm::new(params, (), &[]).err(),
            Some(Error::Bump(BumpError::OutOfMemory))
        );
    }

    #[test]
    fn argv_is_visible() {
        let mut vm = Vm::new(VmParams::new(), (), &[]).unwrap();
        vm.boot(&["prog", "x"], "").unwrap();
        let heap = vm.heap();
        assert_eq!(heap.sys(Sys::Argc), 2);
        let argv = heap.sys(Sys::Argv) as usize;
        let second = heap.cell(argv + crate::cell::CELL).unwrap() as usize;
        assert_eq!(heap.bytes(second, 2).unwrap(), b"x\0");
    }

    #[test]
    fn long_lines_are_refused() {
        let params = VmParams::new().with_input_buf_elems(4);
        let mut vm = Vm::new(params, (), &[]).unwrap();
        assert_eq!(vm.feed("1 2 3"), Err(Error::InputTooLong));
    }
}
