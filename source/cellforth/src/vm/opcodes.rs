use crate::{
    cell::{flag, from_addr, to_addr, Cell, CELL, IMMEDIATE, SMUDGE},
    dictionary::{to_does, Code},
    heap::{Sys, SYS_ADDR},
    number::convert,
    vm::{Flow, SuspendReason, Vm},
    Error,
};

/// A primitive: its dictionary name, header flags, and behavior.
pub struct OpcodeEntry<T: 'static> {
    pub name: &'static str,
    pub flags: u8,
    pub func: OpcodeFn<T>,
}

pub type OpcodeFn<T> = fn(&mut Vm<T>) -> Result<Flow, Error>;

// NOTE: This macro exists because we can't have const constructors that include
// "mut" items, which unfortunately covers things like `fn(&mut T)`. Use a macro
// until this is resolved.
macro_rules! opcode {
    ($name:literal, $func:expr) => {
        OpcodeEntry {
            name: $name,
            flags: 0,
            func: $func,
        }
    };
    ($name:literal, $func:expr, $flags:expr) => {
        OpcodeEntry {
            name: $name,
            flags: $flags,
            func: $func,
        }
    };
}

mod floats;
mod host;

impl<T: 'static> Vm<T> {
    pub const CORE_OPCODES: &'static [OpcodeEntry<T>] = &[
        opcode!("0=", Self::zero_equal),
        opcode!("0<", Self::zero_less),
        opcode!("+", Self::add),
        opcode!("U/MOD", Self::u_div_mod),
        opcode!("*/MOD", Self::star_slash_mod),
        opcode!("LSHIFT", Self::lshift),
        opcode!("RSHIFT", Self::rshift),
        opcode!("AND", Self::and),
        opcode!("OR", Self::or),
        opcode!("XOR", Self::xor),
        opcode!("DUP", Self::dup),
        opcode!("SWAP", Self::swap),
        opcode!("OVER", Self::over),
        opcode!("DROP", Self::drop_top),
        opcode!("@", Self::fetch),
        opcode!("L@", Self::fetch_long),
        opcode!("C@", Self::fetch_char),
        opcode!("!", Self::store),
        opcode!("L!", Self::store_long),
        opcode!("C!", Self::store_char),
        opcode!("SP@", Self::sp_fetch),
        opcode!("SP!", Self::sp_store),
        opcode!("RP@", Self::rp_fetch),
        opcode!("RP!", Self::rp_store),
        opcode!(">R", Self::to_r),
        opcode!("R>", Self::r_from),
        opcode!("R@", Self::r_fetch),
        opcode!("EXECUTE", Self::execute_xt),
        opcode!("BRANCH", Self::branch),
        opcode!("0BRANCH", Self::zero_branch),
        opcode!("DONEXT", Self::donext),
        opcode!("DOLIT", Self::dolit),
        opcode!("DOFLIT", Self::doflit),
        opcode!("ALITERAL", Self::aliteral),
        opcode!("CELL", Self::cell),
        opcode!("FIND", Self::find_word),
        opcode!("PARSE", Self::parse_word),
        opcode!("S>NUMBER?", Self::to_number),
        opcode!("CREATE", Self::create_word),
        opcode!("DOES>", Self::does),
        opcode!("IMMEDIATE", Self::immediate),
        opcode!("'SYS", Self::sys_addr),
        opcode!("YIELD", Self::yield_now),
        opcode!(":", Self::colon),
        opcode!("EVALUATE1", Self::evaluate1),
        opcode!("EXIT", Self::exit),
        opcode!(";", Self::semicolon, IMMEDIATE),
        opcode!("ALSO", Self::also),
        opcode!("PREVIOUS", Self::previous),
        opcode!("ONLY", Self::only),
        opcode!("DEFINITIONS", Self::definitions),
    ];

    /// Every platform list shipped with the crate, in registration order.
    pub const PLATFORM: &'static [&'static [OpcodeEntry<T>]] = &[
        Self::HOST_OPCODES,
        Self::FLOAT_OPCODES,
        Self::MATH_OPCODES,
    ];

    fn unary(&mut self, f: impl FnOnce(Cell) -> Cell) -> Result<Flow, Error> {
        let a = self.pop()?;
        self.push(f(a))?;
        Ok(Flow::Next)
    }

    fn binary(&mut self, f: impl FnOnce(Cell, Cell) -> Cell) -> Result<Flow, Error> {
        let b = self.pop()?;
        let a = self.pop()?;
        self.push(f(a, b))?;
        Ok(Flow::Next)
    }

    pub fn zero_equal(&mut self) -> Result<Flow, Error> {
        self.unary(|a| flag(a == 0))
    }

    pub fn zero_less(&mut self) -> Result<Flow, Error> {
        self.unary(|a| flag(a < 0))
    }

    pub fn add(&mut self) -> Result<Flow, Error> {
        self.binary(Cell::wrapping_add)
    }

    /// `( u1 u2 -- rem quot )`, unsigned.
    pub fn u_div_mod(&mut self) -> Result<Flow, Error> {
        let b = self.pop()? as usize;
        let a = self.pop()? as usize;
        if b == 0 {
            return Err(Error::DivideByZero);
        }
        self.push((a % b) as Cell)?;
        self.push((a / b) as Cell)?;
        Ok(Flow::Next)
    }

    /// `( n1 n2 n3 -- rem quot )`: n1 * n2 / n3 with a double-width
    /// intermediate and floored division.
    pub fn star_slash_mod(&mut self) -> Result<Flow, Error> {
        let n3 = self.pop()? as i128;
        let n2 = self.pop()? as i128;
        let n1 = self.pop()? as i128;
        if n3 == 0 {
            return Err(Error::DivideByZero);
        }
        let prod = n1 * n2;
        let mut quot = prod / n3;
        let mut rem = prod % n3;
        if rem != 0 && ((rem < 0) != (n3 < 0)) {
            quot -= 1;
            rem += n3;
        }
        self.push(rem as Cell)?;
        self.push(quot as Cell)?;
        Ok(Flow::Next)
    }

    pub fn lshift(&mut self) -> Result<Flow, Error> {
        self.binary(|x, u| match u32::try_from(u) {
            Ok(u) if u < Cell::BITS => ((x as usize) << u) as Cell,
            _ => 0,
        })
    }

    pub fn rshift(&mut self) -> Result<Flow, Error> {
        self.binary(|x, u| match u32::try_from(u) {
            Ok(u) if u < Cell::BITS => ((x as usize) >> u) as Cell,
            _ => 0,
        })
    }

    pub fn and(&mut self) -> Result<Flow, Error> {
        self.binary(|a, b| a & b)
    }

    pub fn or(&mut self) -> Result<Flow, Error> {
        self.binary(|a, b| a | b)
    }

    pub fn xor(&mut self) -> Result<Flow, Error> {
        self.binary(|a, b| a ^ b)
    }

    pub fn dup(&mut self) -> Result<Flow, Error> {
        let a = self.peek()?;
        self.push(a)?;
        Ok(Flow::Next)
    }

    pub fn swap(&mut self) -> Result<Flow, Error> {
        let b = self.pop()?;
        let a = self.pop()?;
        self.push(b)?;
        self.push(a)?;
        Ok(Flow::Next)
    }

    pub fn over(&mut self) -> Result<Flow, Error> {
        let a = self.data_stack.peek_back_n(&self.heap, 1)?;
        self.push(a)?;
        Ok(Flow::Next)
    }

    pub fn drop_top(&mut self) -> Result<Flow, Error> {
        self.pop()?;
        Ok(Flow::Next)
    }

    fn pop_addr(&mut self) -> Result<usize, Error> {
        to_addr(self.pop()?)
    }

    pub fn fetch(&mut self) -> Result<Flow, Error> {
        let a = self.pop_addr()?;
        let val = self.heap.cell(a)?;
        self.push(val)?;
        Ok(Flow::Next)
    }

    pub fn fetch_long(&mut self) -> Result<Flow, Error> {
        let a = self.pop_addr()?;
        let val = self.heap.i32(a)?;
        self.push(val as Cell)?;
        Ok(Flow::Next)
    }

    pub fn fetch_char(&mut self) -> Result<Flow, Error> {
        let a = self.pop_addr()?;
        let val = self.heap.byte(a)?;
        self.push(val as Cell)?;
        Ok(Flow::Next)
    }

    pub fn store(&mut self) -> Result<Flow, Error> {
        let a = self.pop_addr()?;
        let val = self.pop()?;
        self.heap.set_cell(a, val)?;
        Ok(Flow::Next)
    }

    pub fn store_long(&mut self) -> Result<Flow, Error> {
        let a = self.pop_addr()?;
        let val = self.pop()?;
        self.heap.set_i32(a, val as i32)?;
        Ok(Flow::Next)
    }

    pub fn store_char(&mut self) -> Result<Flow, Error> {
        let a = self.pop_addr()?;
        let val = self.pop()?;
        self.heap.set_byte(a, val as u8)?;
        Ok(Flow::Next)
    }

    pub fn sp_fetch(&mut self) -> Result<Flow, Error> {
        let sp = self.data_stack.ptr();
        self.push(sp)?;
        Ok(Flow::Next)
    }

    pub fn sp_store(&mut self) -> Result<Flow, Error> {
        let sp = self.pop()?;
        self.data_stack.set_ptr(sp)?;
        Ok(Flow::Next)
    }

    pub fn rp_fetch(&mut self) -> Result<Flow, Error> {
        let rp = self.return_stack.ptr();
        self.push(rp)?;
        Ok(Flow::Next)
    }

    pub fn rp_store(&mut self) -> Result<Flow, Error> {
        let rp = self.pop()?;
        self.return_stack.set_ptr(rp)?;
        Ok(Flow::Next)
    }

    pub fn to_r(&mut self) -> Result<Flow, Error> {
        let a = self.pop()?;
        self.rpush(a)?;
        Ok(Flow::Next)
    }

    pub fn r_from(&mut self) -> Result<Flow, Error> {
        let a = self.rpop()?;
        self.push(a)?;
        Ok(Flow::Next)
    }

    pub fn r_fetch(&mut self) -> Result<Flow, Error> {
        let a = self.return_stack.peek(&self.heap)?;
        self.push(a)?;
        Ok(Flow::Next)
    }

    pub fn execute_xt(&mut self) -> Result<Flow, Error> {
        let xt = self.pop()?;
        Ok(Flow::Execute(xt))
    }

    /// Jumps to the absolute address in the next cell.
    pub fn branch(&mut self) -> Result<Flow, Error> {
        self.ip = to_addr(self.heap.cell(self.ip)?)?;
        Ok(Flow::Next)
    }

    fn skip_literal(&mut self) -> Result<Flow, Error> {
        self.ip += CELL;
        Ok(Flow::Next)
    }

    pub fn zero_branch(&mut self) -> Result<Flow, Error> {
        if self.pop()? == 0 {
            self.branch()
        } else {
            self.skip_literal()
        }
    }

    /// Counts down the top of the return stack, branching until it passes
    /// zero.
    pub fn donext(&mut self) -> Result<Flow, Error> {
        let n = self.rpop()?.wrapping_sub(1);
        if n != -1 {
            self.rpush(n)?;
            self.branch()
        } else {
            self.skip_literal()
        }
    }

    pub fn dolit(&mut self) -> Result<Flow, Error> {
        let val = self.heap.cell(self.ip)?;
        self.push(val)?;
        self.skip_literal()
    }

    pub fn doflit(&mut self) -> Result<Flow, Error> {
        let val = self.heap.f32(self.ip)?;
        self.fpush(val)?;
        self.skip_literal()
    }

    pub fn aliteral(&mut self) -> Result<Flow, Error> {
        let val = self.pop()?;
        self.heap.comma(from_addr(self.xts.dolit))?;
        self.heap.comma(val)?;
        Ok(Flow::Next)
    }

    pub fn cell(&mut self) -> Result<Flow, Error> {
        self.push(CELL as Cell)?;
        Ok(Flow::Next)
    }

    /// `( addr len -- xt | 0 )`
    pub fn find_word(&mut self) -> Result<Flow, Error> {
        let len = to_addr(self.pop()?)?;
        let addr = self.pop_addr()?;
        let name = self.heap.bytes(addr, len)?;
        let xt = self.heap.find(name)?.map(from_addr).unwrap_or(0);
        self.push(xt)?;
        Ok(Flow::Next)
    }

    /// `( sep -- addr len )`
    pub fn parse_word(&mut self) -> Result<Flow, Error> {
        let sep = self.pop()? as u8;
        let (addr, len) = self.heap.parse(sep)?;
        self.push(from_addr(addr))?;
        self.push(from_addr(len))?;
        Ok(Flow::Next)
    }

    /// `( addr len -- n -1 | 0 )`
    pub fn to_number(&mut self) -> Result<Flow, Error> {
        let len = to_addr(self.pop()?)?;
        let addr = self.pop_addr()?;
        let text = self.heap.bytes(addr, len)?;
        match convert(text, self.heap.sys(Sys::Base)) {
            Some(n) => {
                self.push(n)?;
                self.push(flag(true))?;
            }
            None => self.push(flag(false))?,
        }
        Ok(Flow::Next)
    }

    fn parse_name(&mut self) -> Result<(usize, usize), Error> {
        match self.heap.parse(b' ')? {
            (_, 0) => Err(Error::MissingName),
            name => Ok(name),
        }
    }

    /// Defines the next word in the input as a create-body word, with an
    /// empty does-slot before its parameter field.
    pub fn create_word(&mut self) -> Result<Flow, Error> {
        let (addr, len) = self.parse_name()?;
        self.heap.create_from(addr, len, 0, Code::Create)?;
        self.heap.comma(0)?;
        Ok(Flow::Next)
    }

    /// Points the latest word at the code following `DOES>`, then returns
    /// from the defining word.
    pub fn does(&mut self) -> Result<Flow, Error> {
        let xt = self.latest()?;
        self.heap.set_code(xt, Code::Does)?;
        self.heap.set_cell(to_does(xt), from_addr(self.ip))?;
        self.exit()
    }

    pub fn immediate(&mut self) -> Result<Flow, Error> {
        let xt = self.latest()?;
        let flags = self.heap.flags(xt)?;
        self.heap.set_flags(xt, flags | IMMEDIATE)?;
        Ok(Flow::Next)
    }

    pub fn sys_addr(&mut self) -> Result<Flow, Error> {
        self.push(from_addr(SYS_ADDR))?;
        Ok(Flow::Next)
    }

    pub fn yield_now(&mut self) -> Result<Flow, Error> {
        Ok(Flow::Suspend(SuspendReason::Yield))
    }

    /// Starts a hidden colon definition and enters compile state.
    pub fn colon(&mut self) -> Result<Flow, Error> {
        let (addr, len) = self.parse_name()?;
        self.heap.create_from(addr, len, SMUDGE, Code::Colon)?;
        self.heap.set_sys(Sys::State, -1);
        Ok(Flow::Next)
    }

    pub fn exit(&mut self) -> Result<Flow, Error> {
        self.ip = to_addr(self.rpop()?)?;
        Ok(Flow::Next)
    }

    pub fn semicolon(&mut self) -> Result<Flow, Error> {
        self.heap.comma(from_addr(self.xts.exit))?;
        let xt = self.latest()?;
        let flags = self.heap.flags(xt)?;
        self.heap.set_flags(xt, flags & !SMUDGE)?;
        self.heap.set_sys(Sys::State, 0);
        Ok(Flow::Next)
    }

    pub fn also(&mut self) -> Result<Flow, Error> {
        self.heap.also()?;
        Ok(Flow::Next)
    }

    pub fn previous(&mut self) -> Result<Flow, Error> {
        self.heap.previous()?;
        Ok(Flow::Next)
    }

    pub fn only(&mut self) -> Result<Flow, Error> {
        self.only_forth()?;
        Ok(Flow::Next)
    }

    pub fn definitions(&mut self) -> Result<Flow, Error> {
        self.heap.definitions()?;
        Ok(Flow::Next)
    }
}

#[cfg(test)]
pub mod test {
    use crate::{
        cell::Cell, stack::StackError, testutil::blocking_runtest, Error, Vm, VmParams,
    };

    fn eval(line: &str) -> Result<Vec<Cell>, Error> {
        let mut vm = Vm::new(VmParams::new(), (), &[])?;
        let resume = vm.boot(&[], "")?;
        vm.interpret(resume, line)?;
        vm.data_stack()
    }

    #[test]
    fn arithmetic() {
        assert_eq!(eval("3 4 +").unwrap(), vec![7]);
        assert_eq!(eval("-7 2 1 */MOD").unwrap(), vec![0, -14]);
        assert_eq!(eval("7 1 -2 */MOD").unwrap(), vec![-1, -4]);
        assert_eq!(eval("-7 1 2 */MOD").unwrap(), vec![1, -4]);
        assert_eq!(eval("7 2 U/MOD").unwrap(), vec![1, 3]);
        assert_eq!(eval("1 4 LSHIFT -1 60 RSHIFT").unwrap(), vec![16, 15]);
        assert_eq!(eval("1 0 U/MOD"), Err(Error::DivideByZero));
        // wraps instead of trapping
        let max = Cell::MAX;
        assert_eq!(eval(&format!("{max} 1 +")).unwrap(), vec![Cell::MIN]);
    }

    #[test]
    fn star_slash_mod_keeps_the_wide_product() {
        let big = Cell::MAX;
        assert_eq!(eval(&format!("{big} 4 8 */MOD")).unwrap(), vec![4, big / 2]);
    }

    #[test]
    fn stack_words() {
        assert_eq!(eval("1 2 SWAP OVER").unwrap(), vec![2, 1, 2]);
        assert_eq!(eval("1 DUP 0= 0<").unwrap(), vec![1, 0]);
        assert_eq!(eval("5 >R R@ R> +").unwrap(), vec![10]);
        assert_eq!(eval("OVER"), Err(Error::Stack(StackError::StackEmpty)));
    }

    #[test]
    fn memory() {
        assert_eq!(eval("7 'SYS @ ! 'SYS @ @").unwrap(), vec![7]);
        assert_eq!(eval("-2 'SYS @ L! 'SYS @ L@").unwrap(), vec![-2]);
        assert_eq!(eval("300 'SYS @ C! 'SYS @ C@").unwrap(), vec![44]);
        assert_eq!(eval("1 -8 !"), Err(Error::BadAddress(-8)));
    }

    #[test]
    fn sp_fetch_and_store() {
        assert_eq!(eval("1 2 SP@ >R 3 4 R> SP!").unwrap(), vec![1, 2]);
        assert_eq!(
            eval("1 SP!"),
            Err(Error::Stack(StackError::OverwriteInvalid))
        );
    }

    #[test]
    fn find_parse_and_number() {
        assert_eq!(eval("32 PARSE 123 S>NUMBER?").unwrap(), vec![123, -1]);
        assert_eq!(eval("32 PARSE 12x S>NUMBER?").unwrap(), vec![0]);
        let found = eval("32 PARSE dup FIND").unwrap();
        assert_ne!(found[0], 0);
        assert_eq!(eval("32 PARSE nope FIND").unwrap(), vec![0]);
    }

    #[test]
    fn immediate_and_colon_errors() {
        assert_eq!(eval(":"), Err(Error::MissingName));
        assert_eq!(eval("IMMEDIATE"), Err(Error::BadAddress(0)));
    }

    #[test]
    fn for_next_and_loops() {
        blocking_runtest(
            r#"
            > : count 3 for r@ . next ;
            > count
            < 3 2 1 0
            > : up 4 0 do i . loop ;
            > up
            < 0 1 2 3
            > : down 5 begin dup while dup . 1- repeat drop ;
            > down
            < 5 4 3 2 1
            > : signs dup 0< if ." neg" else ." pos" then drop ;
            > -1 signs 1 signs
            < negpos
            "#,
        );
    }

    #[test]
    fn vocabularies() {
        blocking_runtest(
            r#"
            > vocabulary scratch
            > also scratch definitions
            > : hidden 42 ;
            > hidden .
            < 42
            > previous definitions
            > hidden
            < hidden ?
            > also scratch hidden . previous
            < 42
            "#,
        );
    }

    #[test]
    fn search_order_overflow() {
        let mut vm = Vm::new(VmParams::new(), (), &[]).unwrap();
        let mut resume = vm.boot(&[], "").unwrap();
        for _ in 1..crate::cell::VOCABULARY_DEPTH {
            resume = vm.interpret(resume, "ALSO").unwrap().resume;
        }
        assert_eq!(
            vm.interpret(resume, "ALSO").unwrap_err(),
            Error::SearchOrderOverflow
        );
        let resume = vm.reset().unwrap();
        vm.interpret(resume, "ONLY").unwrap();
        assert_eq!(vm.heap().search_depth().unwrap(), 1);
    }
}
