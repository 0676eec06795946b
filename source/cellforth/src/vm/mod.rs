use alloc::vec::Vec;

use crate::{
    cell::{from_addr, to_addr, Cell, CELL},
    dictionary::{to_body, to_does, Code, FIRST_OPCODE},
    heap::{Heap, Sys},
    native::NativeTable,
    output::OutputBuf,
    stack::Stack,
    Error, Mode,
};

pub mod boot;
pub mod interp;
pub mod opcodes;

use self::opcodes::OpcodeEntry;

/// What the dispatch loop does after a primitive returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Fetch the next xt at `ip`.
    Next,
    /// Invoke this xt before fetching the next one.
    Execute(Cell),
    /// Stop and hand control back to the host.
    Suspend(SuspendReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuspendReason {
    /// `YIELD` was executed.
    Yield,
    /// The outer interpreter ran out of input. Resuming continues with
    /// whatever input is current at that time.
    InputExhausted,
    /// `BYE` was executed with this exit code.
    Bye(Cell),
}

/// The handle for a suspended computation: the return-stack pointer, with
/// the float-stack pointer, data-stack pointer and instruction pointer
/// parked on top of the return stack.
///
/// Feed it back to [`Vm::run`] to continue. Dropping it abandons the
/// computation.
#[derive(Debug)]
pub struct Resume {
    rp: Cell,
}

impl Resume {
    /// The saved return-stack pointer.
    pub fn return_pointer(&self) -> Cell {
        self.rp
    }
}

#[derive(Debug)]
pub struct Suspended {
    pub reason: SuspendReason,
    pub resume: Resume,
}

/// Execution tokens looked up once after priming.
#[derive(Debug, Clone, Copy)]
pub(crate) struct CachedXts {
    pub(crate) dolit: usize,
    pub(crate) doflit: usize,
    pub(crate) exit: usize,
}

/// Vm is the "context" of the virtual machine: the heap with everything
/// living in it, the three stacks, and the opcode table the heap's code
/// cells index into.
pub struct Vm<T: 'static> {
    pub(crate) heap: Heap,
    pub(crate) data_stack: Stack<Cell>,
    pub(crate) return_stack: Stack<Cell>,
    pub(crate) float_stack: Stack<f32>,
    pub(crate) ip: usize,
    pub(crate) xts: CachedXts,
    opcodes: Vec<&'static OpcodeEntry<T>>,
    natives: NativeTable,
    /// Address and capacity of the region `feed` copies host lines into.
    input_buf: (usize, usize),
    /// The `EVALUATE1 BRANCH start` driver.
    start: usize,
    forth_wordlist: usize,
    pub output: OutputBuf,
    pub host_ctxt: T,
}

impl<T: 'static> Vm<T> {
    /// Continues a suspended computation until the next suspension.
    ///
    /// An `Err` leaves the VM wherever the failing word left it; hosts
    /// recover with [`Vm::reset`].
    pub fn run(&mut self, resume: Resume) -> Result<Suspended, Error> {
        self.unpark(resume)?;
        loop {
            let xt = self.heap.cell(self.ip)?;
            self.ip += CELL;
            if let Flow::Suspend(reason) = self.execute(xt)? {
                tracing::trace!(?reason, ip = self.ip, "suspended");
                let resume = self.park()?;
                return Ok(Suspended { reason, resume });
            }
        }
    }

    /// Feeds `line` as the next input and runs until it is consumed,
    /// stepping over any `YIELD`s along the way.
    pub fn interpret(&mut self, resume: Resume, line: &str) -> Result<Suspended, Error> {
        self.feed(line)?;
        let mut resume = resume;
        loop {
            let sus = self.run(resume)?;
            match sus.reason {
                SuspendReason::Yield => resume = sus.resume,
                _ => return Ok(sus),
            }
        }
    }

    /// Invokes `xt`, following any chain of `EXECUTE`s a primitive asks for.
    pub(crate) fn execute(&mut self, xt: Cell) -> Result<Flow, Error> {
        let mut xt = xt;
        loop {
            let x = to_addr(xt)?;
            match self.heap.code(x)? {
                Code::Colon => {
                    self.rpush(from_addr(self.ip))?;
                    self.ip = x + CELL;
                    return Ok(Flow::Next);
                }
                Code::Create => {
                    self.push(from_addr(to_body(x)))?;
                    return Ok(Flow::Next);
                }
                Code::Does => {
                    self.push(from_addr(to_body(x)))?;
                    self.rpush(from_addr(self.ip))?;
                    self.ip = to_addr(self.heap.cell(to_does(x))?)?;
                    return Ok(Flow::Next);
                }
                Code::Primitive(op) => {
                    let entry: &'static OpcodeEntry<T> = *self
                        .opcodes
                        .get(op.0 - FIRST_OPCODE)
                        .ok_or(Error::BadOpcode(op.0 as Cell))?;
                    match (entry.func)(self)? {
                        Flow::Execute(next) => xt = next,
                        flow => return Ok(flow),
                    }
                }
            }
        }
    }

    fn park(&mut self) -> Result<Resume, Error> {
        self.rpush(self.float_stack.ptr())?;
        self.rpush(self.data_stack.ptr())?;
        self.rpush(from_addr(self.ip))?;
        Ok(Resume {
            rp: self.return_stack.ptr(),
        })
    }

    fn unpark(&mut self, resume: Resume) -> Result<(), Error> {
        self.return_stack.set_ptr(resume.rp)?;
        self.ip = to_addr(self.rpop()?)?;
        let sp = self.rpop()?;
        self.data_stack.set_ptr(sp)?;
        let fp = self.rpop()?;
        self.float_stack.set_ptr(fp)?;
        Ok(())
    }

    #[inline]
    pub(crate) fn push(&mut self, val: Cell) -> Result<(), Error> {
        self.data_stack.push(&mut self.heap, val)
    }

    #[inline]
    pub(crate) fn pop(&mut self) -> Result<Cell, Error> {
        self.data_stack.pop(&self.heap)
    }

    #[inline]
    pub(crate) fn peek(&self) -> Result<Cell, Error> {
        self.data_stack.peek(&self.heap)
    }

    #[inline]
    pub(crate) fn rpush(&mut self, val: Cell) -> Result<(), Error> {
        self.return_stack.push(&mut self.heap, val)
    }

    #[inline]
    pub(crate) fn rpop(&mut self) -> Result<Cell, Error> {
        self.return_stack.pop(&self.heap)
    }

    #[inline]
    pub(crate) fn fpush(&mut self, val: f32) -> Result<(), Error> {
        self.float_stack.push(&mut self.heap, val)
    }

    #[inline]
    pub(crate) fn fpop(&mut self) -> Result<f32, Error> {
        self.float_stack.pop(&self.heap)
    }

    /// The latest definition, which must exist.
    pub(crate) fn latest(&self) -> Result<usize, Error> {
        match self.heap.latest_xt() {
            0 => Err(Error::BadAddress(0)),
            xt => to_addr(xt),
        }
    }

    /// The data stack, bottom first.
    pub fn data_stack(&self) -> Result<Vec<Cell>, Error> {
        self.data_stack.to_vec(&self.heap)
    }

    /// The float stack, bottom first.
    pub fn float_stack(&self) -> Result<Vec<f32>, Error> {
        self.float_stack.to_vec(&self.heap)
    }

    pub fn return_depth(&self) -> usize {
        self.return_stack.depth()
    }

    pub fn mode(&self) -> Mode {
        if self.heap.sys(Sys::State) == 0 {
            Mode::Run
        } else {
            Mode::Compile
        }
    }

    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    pub fn natives(&self) -> &NativeTable {
        &self.natives
    }

    pub fn natives_mut(&mut self) -> &mut NativeTable {
        &mut self.natives
    }

    /// Looks `name` up in the current search order.
    pub fn find(&self, name: &str) -> Result<Option<usize>, Error> {
        self.heap.find(name.as_bytes())
    }

    /// The assembled opcode table with each entry's numeric id.
    pub fn opcodes(&self) -> impl Iterator<Item = (usize, &'static OpcodeEntry<T>)> + '_ {
        self.opcodes
            .iter()
            .enumerate()
            .map(|(idx, entry)| (idx + FIRST_OPCODE, *entry))
    }
}

#[cfg(test)]
pub mod test {
    use crate::{cell::Cell, Error, SuspendReason, Vm, VmParams, BOOT};

    fn booted() -> (Vm<()>, crate::Resume) {
        let mut vm = Vm::new(VmParams::new(), (), Vm::<()>::PLATFORM).unwrap();
        let resume = vm.boot(&[], BOOT).unwrap();
        let sus = vm.run(resume).unwrap();
        assert_eq!(sus.reason, SuspendReason::InputExhausted);
        assert!(vm.data_stack().unwrap().is_empty(), "boot left values behind");
        (vm, sus.resume)
    }

    #[test]
    fn yield_resumes_where_it_left_off() {
        let (mut vm, resume) = booted();
        let sus = vm.interpret(resume, ": t 1 yield 2 ;").unwrap();
        vm.feed("10 t 20").unwrap();
        let sus = vm.run(sus.resume).unwrap();
        assert_eq!(sus.reason, SuspendReason::Yield);
        assert_eq!(vm.data_stack().unwrap(), vec![10, 1]);
        let parked_depth = vm.return_depth();
        let rp = sus.resume.return_pointer();

        let sus = vm.run(sus.resume).unwrap();
        assert_eq!(sus.reason, SuspendReason::InputExhausted);
        assert_eq!(vm.data_stack().unwrap(), vec![10, 1, 2, 20]);
        // the call into `t` has returned, only the parked state is left
        assert_eq!(vm.return_depth(), parked_depth - 1);
        assert_eq!(sus.resume.return_pointer(), rp - CELL_SIZE);
    }

    const CELL_SIZE: Cell = crate::cell::CELL as Cell;

    #[test]
    fn dropping_a_resume_abandons_the_computation() {
        let (mut vm, resume) = booted();
        let sus = vm.interpret(resume, ": t 1 yield 2 ;").unwrap();
        vm.feed("t").unwrap();
        let sus = vm.run(sus.resume).unwrap();
        assert_eq!(sus.reason, SuspendReason::Yield);
        drop(sus);
        let resume = vm.reset().unwrap();
        let sus = vm.interpret(resume, "3").unwrap();
        assert_eq!(sus.reason, SuspendReason::InputExhausted);
        assert_eq!(vm.data_stack().unwrap(), vec![3]);
    }

    #[test]
    fn create_does() {
        let (mut vm, resume) = booted();
        let sus = vm
            .interpret(resume, ": adder create , does> @ + ; 5 adder add5 10 add5")
            .unwrap();
        assert_eq!(vm.data_stack().unwrap(), vec![15]);
        let xt = vm.find("add5").unwrap().unwrap();
        assert_eq!(
            vm.heap().code(xt).unwrap(),
            crate::dictionary::Code::Does
        );
        drop(sus);
    }

    #[test]
    fn bad_code_field() {
        let (mut vm, resume) = booted();
        let sus = vm.interpret(resume, "variable v").unwrap();
        let xt = vm.find("v").unwrap().unwrap();
        vm.heap.set_cell(xt, 1000).unwrap();
        let err = vm.interpret(sus.resume, "v").unwrap_err();
        assert_eq!(err, Error::BadOpcode(1000));
    }

    #[test]
    fn bye() {
        let (mut vm, resume) = booted();
        let sus = vm.interpret(resume, "3 bye 4").unwrap();
        assert_eq!(sus.reason, SuspendReason::Bye(3));
    }

    #[test]
    fn opcode_ids_follow_registration_order() {
        let vm = Vm::new(VmParams::new(), (), Vm::<()>::PLATFORM).unwrap();
        let mut ids = vm.opcodes();
        let (first, entry) = ids.next().unwrap();
        assert_eq!(first, 3);
        assert_eq!(entry.name, "0=");
        let typ = vm.opcodes().find(|(_, e)| e.name == "TYPE").unwrap().0;
        assert_eq!(typ, 3 + Vm::<()>::CORE_OPCODES.len());
    }
}
