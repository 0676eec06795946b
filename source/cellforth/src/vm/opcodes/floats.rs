use core::{fmt::Write, ops::Neg};

use super::OpcodeEntry;
use crate::{
    cell::{flag, from_addr, to_addr, Cell},
    number::fconvert,
    vm::{Flow, Vm},
    Error,
};

impl<T: 'static> Vm<T> {
    pub const FLOAT_OPCODES: &'static [OpcodeEntry<T>] = &[
        opcode!("FP@", Self::fp_fetch),
        opcode!("FP!", Self::fp_store),
        opcode!("SF@", Self::sfloat_fetch),
        opcode!("SF!", Self::sfloat_store),
        opcode!("FDUP", Self::float_dup),
        opcode!("FDROP", Self::float_drop),
        opcode!("FSWAP", Self::float_swap),
        opcode!("FOVER", Self::float_over),
        opcode!("FNIP", Self::float_nip),
        opcode!("FNEGATE", Self::float_negate),
        opcode!("F0<", Self::float_zero_less),
        opcode!("F0=", Self::float_zero_equal),
        opcode!("F+", Self::float_add),
        opcode!("F-", Self::float_sub),
        opcode!("F*", Self::float_mul),
        opcode!("F/", Self::float_div),
        opcode!("1/F", Self::float_recip),
        opcode!("S>F", Self::int_to_float),
        opcode!("F>S", Self::float_to_int),
        opcode!("F>NUMBER?", Self::to_float),
        opcode!("SFLOAT", Self::sfloat),
        opcode!("F.", Self::float_pop_print),
        opcode!("FABS", Self::float_abs),
        opcode!("FMIN", Self::float_min),
        opcode!("FMAX", Self::float_max),
    ];

    fn float_unary(&mut self, f: impl FnOnce(f32) -> f32) -> Result<Flow, Error> {
        let a = self.fpop()?;
        self.fpush(f(a))?;
        Ok(Flow::Next)
    }

    fn float_binary(&mut self, f: impl FnOnce(f32, f32) -> f32) -> Result<Flow, Error> {
        let b = self.fpop()?;
        let a = self.fpop()?;
        self.fpush(f(a, b))?;
        Ok(Flow::Next)
    }

    pub fn fp_fetch(&mut self) -> Result<Flow, Error> {
        let fp = self.float_stack.ptr();
        self.push(fp)?;
        Ok(Flow::Next)
    }

    pub fn fp_store(&mut self) -> Result<Flow, Error> {
        let fp = self.pop()?;
        self.float_stack.set_ptr(fp)?;
        Ok(Flow::Next)
    }

    pub fn sfloat_fetch(&mut self) -> Result<Flow, Error> {
        let a = to_addr(self.pop()?)?;
        let val = self.heap.f32(a)?;
        self.fpush(val)?;
        Ok(Flow::Next)
    }

    pub fn sfloat_store(&mut self) -> Result<Flow, Error> {
        let a = to_addr(self.pop()?)?;
        let val = self.fpop()?;
        self.heap.set_f32(a, val)?;
        Ok(Flow::Next)
    }

    pub fn float_dup(&mut self) -> Result<Flow, Error> {
        let a = self.float_stack.peek(&self.heap)?;
        self.fpush(a)?;
        Ok(Flow::Next)
    }

    pub fn float_drop(&mut self) -> Result<Flow, Error> {
        self.fpop()?;
        Ok(Flow::Next)
    }

    pub fn float_swap(&mut self) -> Result<Flow, Error> {
        let b = self.fpop()?;
        let a = self.fpop()?;
        self.fpush(b)?;
        self.fpush(a)?;
        Ok(Flow::Next)
    }

    pub fn float_over(&mut self) -> Result<Flow, Error> {
        let a = self.float_stack.peek_back_n(&self.heap, 1)?;
        self.fpush(a)?;
        Ok(Flow::Next)
    }

    pub fn float_nip(&mut self) -> Result<Flow, Error> {
        self.float_binary(|_, b| b)
    }

    pub fn float_negate(&mut self) -> Result<Flow, Error> {
        self.float_unary(f32::neg)
    }

    pub fn float_zero_less(&mut self) -> Result<Flow, Error> {
        let a = self.fpop()?;
        self.push(flag(a < 0.0))?;
        Ok(Flow::Next)
    }

    pub fn float_zero_equal(&mut self) -> Result<Flow, Error> {
        let a = self.fpop()?;
        self.push(flag(a == 0.0))?;
        Ok(Flow::Next)
    }

    pub fn float_add(&mut self) -> Result<Flow, Error> {
        self.float_binary(|a, b| a + b)
    }

    pub fn float_sub(&mut self) -> Result<Flow, Error> {
        self.float_binary(|a, b| a - b)
    }

    pub fn float_mul(&mut self) -> Result<Flow, Error> {
        self.float_binary(|a, b| a * b)
    }

    pub fn float_div(&mut self) -> Result<Flow, Error> {
        let b = self.fpop()?;
        let a = self.fpop()?;
        if b == 0.0 {
            return Err(Error::DivideByZero);
        }
        self.fpush(a / b)?;
        Ok(Flow::Next)
    }

    pub fn float_recip(&mut self) -> Result<Flow, Error> {
        let a = self.fpop()?;
        if a == 0.0 {
            return Err(Error::DivideByZero);
        }
        self.fpush(1.0 / a)?;
        Ok(Flow::Next)
    }

    pub fn int_to_float(&mut self) -> Result<Flow, Error> {
        let a = self.pop()?;
        self.fpush(a as f32)?;
        Ok(Flow::Next)
    }

    pub fn float_to_int(&mut self) -> Result<Flow, Error> {
        let a = self.fpop()?;
        self.push(a as Cell)?;
        Ok(Flow::Next)
    }

    /// `( addr len -- flag ) ( F: -- r | )`
    pub fn to_float(&mut self) -> Result<Flow, Error> {
        let len = to_addr(self.pop()?)?;
        let addr = to_addr(self.pop()?)?;
        match fconvert(self.heap.bytes(addr, len)?) {
            Some(f) => {
                self.fpush(f)?;
                self.push(flag(true))?;
            }
            None => self.push(flag(false))?,
        }
        Ok(Flow::Next)
    }

    pub fn sfloat(&mut self) -> Result<Flow, Error> {
        self.push(from_addr(core::mem::size_of::<f32>()))?;
        Ok(Flow::Next)
    }

    pub fn float_pop_print(&mut self) -> Result<Flow, Error> {
        let a = self.fpop()?;
        write!(&mut self.output, "{} ", a)?;
        Ok(Flow::Next)
    }

    pub fn float_abs(&mut self) -> Result<Flow, Error> {
        self.float_unary(|a| if a.is_sign_negative() { a.neg() } else { a })
    }

    pub fn float_min(&mut self) -> Result<Flow, Error> {
        self.float_binary(f32::min)
    }

    pub fn float_max(&mut self) -> Result<Flow, Error> {
        self.float_binary(f32::max)
    }
}

cfg_if::cfg_if! {
    if #[cfg(any(test, feature = "use-std"))] {
        impl<T: 'static> Vm<T> {
            /// Float words that need `std`'s libm.
            pub const MATH_OPCODES: &'static [OpcodeEntry<T>] = &[
                opcode!("FSQRT", Self::float_sqrt),
                opcode!("FSIN", Self::float_sin),
                opcode!("FCOS", Self::float_cos),
                opcode!("FEXP", Self::float_exp),
                opcode!("FLN", Self::float_ln),
                opcode!("F**", Self::float_pow),
                opcode!("FLOOR", Self::float_floor),
            ];

            pub fn float_sqrt(&mut self) -> Result<Flow, Error> {
                self.float_unary(f32::sqrt)
            }

            pub fn float_sin(&mut self) -> Result<Flow, Error> {
                self.float_unary(f32::sin)
            }

            pub fn float_cos(&mut self) -> Result<Flow, Error> {
                self.float_unary(f32::cos)
            }

            pub fn float_exp(&mut self) -> Result<Flow, Error> {
                self.float_unary(f32::exp)
            }

            pub fn float_ln(&mut self) -> Result<Flow, Error> {
                self.float_unary(f32::ln)
            }

            pub fn float_pow(&mut self) -> Result<Flow, Error> {
                self.float_binary(f32::powf)
            }

            pub fn float_floor(&mut self) -> Result<Flow, Error> {
                self.float_unary(f32::floor)
            }
        }
    } else {
        impl<T: 'static> Vm<T> {
            /// Float words that need `std`'s libm.
            pub const MATH_OPCODES: &'static [OpcodeEntry<T>] = &[];
        }
    }
}

#[cfg(test)]
pub mod test {
    use crate::{testutil::blocking_runtest, Error, Vm, VmParams};

    fn feval(line: &str) -> Result<(Vec<isize>, Vec<f32>), Error> {
        let mut vm = Vm::new(VmParams::new(), (), Vm::<()>::PLATFORM)?;
        let resume = vm.boot(&[], "")?;
        vm.interpret(resume, line)?;
        Ok((vm.data_stack()?, vm.float_stack()?))
    }

    #[test]
    fn float_arithmetic() {
        assert_eq!(feval("1e0 2e0 F+ 3e0 F*").unwrap().1, vec![9.0]);
        assert_eq!(feval("1e0 4e0 F/ 1/F").unwrap().1, vec![4.0]);
        assert_eq!(feval("-2.5e0 FABS 1e0 FMAX").unwrap().1, vec![2.5]);
        assert_eq!(feval("7 S>F 2e0 F- F>S").unwrap().0, vec![5]);
        assert_eq!(feval("1e0 0e0 F/").unwrap_err(), Error::DivideByZero);
        assert_eq!(feval("-1e0 F0< 0e0 F0=").unwrap().0, vec![-1, -1]);
        assert_eq!(feval("16e0 FSQRT").unwrap().1, vec![4.0]);
    }

    #[test]
    fn float_stack_words() {
        assert_eq!(feval("1e0 2e0 FOVER").unwrap().1, vec![1.0, 2.0, 1.0]);
        assert_eq!(feval("1e0 2e0 FSWAP FDROP FDUP").unwrap().1, vec![2.0, 2.0]);
        assert_eq!(feval("1e0 2e0 FNIP -3e0 FNEGATE").unwrap().1, vec![2.0, 3.0]);
        assert_eq!(feval("SFLOAT").unwrap().0, vec![4]);
    }

    #[test]
    fn float_memory_and_parsing() {
        blocking_runtest(
            r#"
            > variable v 2.5e1 v sf! v sf@ f.
            < 25
            > : good s" 3e2" ;
            > : bad s" 3.0" ;
            > good f>number? . f.
            < -1 300
            > bad f>number? .
            < 0
            "#,
        );
    }
}
