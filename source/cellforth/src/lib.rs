#![cfg_attr(not(any(test, feature = "use-std")), no_std)]

extern crate alloc;

pub mod cell;
pub mod dictionary;
pub mod heap;
pub mod input;
pub mod native;
pub mod number;
pub mod output;
pub mod params;
pub mod stack;
pub mod vm;
pub mod vocabulary;

#[cfg(any(test, feature = "use-std"))]
pub mod testutil;

pub use crate::{
    cell::Cell,
    params::VmParams,
    vm::{opcodes::OpcodeEntry, Resume, SuspendReason, Suspended, Vm},
};
use crate::{heap::BumpError, output::OutputError, stack::StackError};

/// The boot program compiled into every VM started with [`Vm::boot`] by the
/// bundled tools.
///
/// It is plain source text and is evaluated through the same outer
/// interpreter as any later input line.
pub const BOOT: &str = include_str!("../boot/boot.fs");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Run,
    Compile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    Stack(StackError),
    Bump(BumpError),
    Output(OutputError),
    /// A cell was used as an address outside of the heap.
    BadAddress(Cell),
    /// A code field held a value that is not a known engine or opcode.
    BadOpcode(Cell),
    SearchOrderOverflow,
    SearchOrderUnderflow,
    MissingName,
    NameTooLong,
    DivideByZero,
    /// A word the engine relies on was not found after priming.
    MissingBootWord(&'static str),
    UnknownNative(Cell),
    InputTooLong,
}

impl From<StackError> for Error {
    fn from(se: StackError) -> Self {
        Error::Stack(se)
    }
}

impl From<BumpError> for Error {
    fn from(be: BumpError) -> Self {
        Error::Bump(be)
    }
}

impl From<OutputError> for Error {
    fn from(oe: OutputError) -> Self {
        Error::Output(oe)
    }
}

impl From<core::fmt::Error> for Error {
    fn from(_: core::fmt::Error) -> Self {
        Error::Output(OutputError::FormattingErr)
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::Stack(StackError::StackEmpty) => f.write_str("stack underflow"),
            Error::Stack(StackError::StackFull) => f.write_str("stack overflow"),
            Error::Stack(StackError::OverwriteInvalid) => {
                f.write_str("stack pointer outside of its region")
            }
            Error::Bump(BumpError::OutOfMemory) => f.write_str("heap exhausted"),
            Error::Output(OutputError::OutputFull) => f.write_str("output buffer full"),
            Error::Output(OutputError::FormattingErr) => f.write_str("formatting error"),
            Error::BadAddress(addr) => write!(f, "bad address {addr:#x}"),
            Error::BadOpcode(code) => write!(f, "bad code field {code}"),
            Error::SearchOrderOverflow => f.write_str("search order overflow"),
            Error::SearchOrderUnderflow => f.write_str("search order underflow"),
            Error::MissingName => f.write_str("missing name"),
            Error::NameTooLong => f.write_str("name too long"),
            Error::DivideByZero => f.write_str("divide by zero"),
            Error::MissingBootWord(name) => write!(f, "primitive {name} is not defined"),
            Error::UnknownNative(handle) => write!(f, "unknown native handle {handle}"),
            Error::InputTooLong => f.write_str("input line too long"),
        }
    }
}

#[cfg(any(test, feature = "use-std"))]
impl std::error::Error for Error {}

pub(crate) trait ReplaceErr {
    type OK;
    fn replace_err<NE>(self, t: NE) -> Result<Self::OK, NE>;
}

impl<T, OE> ReplaceErr for Result<T, OE> {
    type OK = T;
    #[inline]
    fn replace_err<NE>(self, e: NE) -> Result<Self::OK, NE> {
        match self {
            Ok(t) => Ok(t),
            Err(_e) => Err(e),
        }
    }
}

#[cfg(test)]
pub mod test {
    use crate::{testutil::blocking_runtest, Error, SuspendReason, Vm, VmParams};

    fn bare() -> (Vm<()>, crate::Resume) {
        let mut vm = Vm::new(VmParams::new(), (), &[]).unwrap();
        let resume = vm.boot(&[], "").unwrap();
        (vm, resume)
    }

    #[test]
    fn add_without_boot() {
        let (mut vm, resume) = bare();
        let sus = vm.interpret(resume, "3 4 +").unwrap();
        assert_eq!(sus.reason, SuspendReason::InputExhausted);
        assert_eq!(vm.data_stack().unwrap(), vec![7]);
    }

    #[test]
    fn square() {
        let mut vm = Vm::new(VmParams::new(), (), Vm::<()>::PLATFORM).unwrap();
        let resume = vm.boot(&[], crate::BOOT).unwrap();
        let sus = vm.run(resume).unwrap();
        assert_eq!(sus.reason, SuspendReason::InputExhausted);
        let sus = vm.interpret(sus.resume, ": SQUARE DUP * ;").unwrap();
        let sus = vm.interpret(sus.resume, "5 SQUARE").unwrap();
        assert_eq!(sus.reason, SuspendReason::InputExhausted);
        assert_eq!(vm.data_stack().unwrap(), vec![25]);
    }

    #[test]
    fn errors_are_reported_and_recoverable() {
        let (mut vm, resume) = bare();
        let err = vm.interpret(resume, "DROP").unwrap_err();
        assert_eq!(err, Error::Stack(crate::stack::StackError::StackEmpty));
        let resume = vm.reset().unwrap();
        let sus = vm.interpret(resume, "1 2 +").unwrap();
        assert_eq!(sus.reason, SuspendReason::InputExhausted);
        assert_eq!(vm.data_stack().unwrap(), vec![3]);
    }

    #[test]
    fn ui() {
        blocking_runtest(
            r#"
            > 1 2 + .
            < 3
            > : star 42 emit ;
            > star star
            < **
            x drop
            "#,
        );
    }
}
