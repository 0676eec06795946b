use alloc::vec::Vec;

use super::OpcodeEntry;
use crate::{
    cell::{to_addr, Cell},
    vm::{Flow, SuspendReason, Vm},
    Error,
};

impl<T: 'static> Vm<T> {
    /// Words that reach out of the VM: output, exiting, and native calls.
    pub const HOST_OPCODES: &'static [OpcodeEntry<T>] = &[
        opcode!("TYPE", Self::type_str),
        opcode!("BYE", Self::bye),
        opcode!("DLSYM", Self::dlsym),
        opcode!("CALL0", Self::call0),
        opcode!("CALL1", Self::call1),
        opcode!("CALL2", Self::call2),
        opcode!("CALL3", Self::call3),
        opcode!("CALL4", Self::call4),
        opcode!("CALL5", Self::call5),
        opcode!("CALL6", Self::call6),
    ];

    /// `( addr len -- )`
    pub fn type_str(&mut self) -> Result<Flow, Error> {
        let len = to_addr(self.pop()?)?;
        let addr = to_addr(self.pop()?)?;
        let bytes = self.heap.bytes(addr, len)?;
        self.output.push_bstr(bytes)?;
        Ok(Flow::Next)
    }

    /// `( code -- )` hands the exit code to the host.
    pub fn bye(&mut self) -> Result<Flow, Error> {
        let code = self.pop()?;
        Ok(Flow::Suspend(SuspendReason::Bye(code)))
    }

    /// `( addr len -- handle | 0 )`
    pub fn dlsym(&mut self) -> Result<Flow, Error> {
        let len = to_addr(self.pop()?)?;
        let addr = to_addr(self.pop()?)?;
        let name = self.heap.bytes(addr, len)?;
        let handle = self.natives.resolve(name).unwrap_or(0);
        self.push(handle)?;
        Ok(Flow::Next)
    }

    /// `( x1 .. xn handle -- result )`
    fn call_n(&mut self, n: usize) -> Result<Flow, Error> {
        let handle = self.pop()?;
        let func = self
            .natives
            .get(handle)
            .ok_or(Error::UnknownNative(handle))?;
        let mut args: Vec<Cell> = Vec::with_capacity(n);
        for _ in 0..n {
            args.push(self.pop()?);
        }
        args.reverse();
        let ret = func(&args);
        tracing::trace!(handle, ?args, ret, "native call");
        self.push(ret)?;
        Ok(Flow::Next)
    }

    pub fn call0(&mut self) -> Result<Flow, Error> {
        self.call_n(0)
    }

    pub fn call1(&mut self) -> Result<Flow, Error> {
        self.call_n(1)
    }

    pub fn call2(&mut self) -> Result<Flow, Error> {
        self.call_n(2)
    }

    pub fn call3(&mut self) -> Result<Flow, Error> {
        self.call_n(3)
    }

    pub fn call4(&mut self) -> Result<Flow, Error> {
        self.call_n(4)
    }

    pub fn call5(&mut self) -> Result<Flow, Error> {
        self.call_n(5)
    }

    pub fn call6(&mut self) -> Result<Flow, Error> {
        self.call_n(6)
    }
}

#[cfg(test)]
pub mod test {
    use crate::{
        cell::Cell, testutil::blocking_runtest_with, Error, SuspendReason, Vm, VmParams, BOOT,
    };

    fn sub(args: &[Cell]) -> Cell {
        args[0] - args[1]
    }

    fn six(args: &[Cell]) -> Cell {
        args.iter().enumerate().map(|(i, a)| a * (i as Cell + 1)).sum()
    }

    fn seven(_: &[Cell]) -> Cell {
        7
    }

    fn booted() -> (Vm<()>, crate::Resume) {
        let mut vm = Vm::new(VmParams::new(), (), Vm::<()>::PLATFORM).unwrap();
        vm.natives_mut().register("sub", sub);
        vm.natives_mut().register("six", six);
        vm.natives_mut().register("seven", seven);
        let resume = vm.boot(&[], BOOT).unwrap();
        let sus = vm.run(resume).unwrap();
        assert_eq!(sus.reason, SuspendReason::InputExhausted);
        (vm, sus.resume)
    }

    #[test]
    fn native_calls() {
        let (mut vm, resume) = booted();
        blocking_runtest_with(
            &mut vm,
            resume,
            r#"
            > : sym 32 parse dlsym ;
            > 10 3 sym sub call2 .
            < 7
            > 1 2 3 4 5 6 sym six call6 .
            < 91
            > sym seven call0 .
            < 7
            > sym missing .
            < 0
            "#,
        );
    }

    #[test]
    fn unknown_handle() {
        let (mut vm, resume) = booted();
        assert_eq!(
            vm.interpret(resume, "1 99 call1").unwrap_err(),
            Error::UnknownNative(99)
        );
    }

    #[test]
    fn type_and_bye() {
        let (mut vm, resume) = booted();
        let sus = vm.interpret(resume, ": hi s\" hi\" type ; hi").unwrap();
        assert_eq!(vm.output.as_str(), "hi");
        let sus = vm.interpret(sus.resume, "2 bye").unwrap();
        assert_eq!(sus.reason, SuspendReason::Bye(2));
        assert!(vm.data_stack().unwrap().is_empty());
    }
}
