use std::fmt;

use crate::ast::Literal;

use super::RuntimeError;

/// A virtual register. The number is its index into the register file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Register(pub u32);

impl Register {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The register file of one run. Slots start empty; reading an empty slot
/// is an error rather than a default value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Registers {
    slots: Vec<Option<Literal>>,
}

impl Registers {
    pub fn new(count: u32) -> Self {
        Registers { slots: vec![None; count as usize] }
    }

    pub fn get(&self, register: Register) -> Result<&Literal, RuntimeError> {
        self.slots
            .get(register.index())
            .and_then(Option::as_ref)
            .ok_or(RuntimeError::UninitializedRegister { register })
    }

    pub fn get_mut(&mut self, register: Register) -> Result<&mut Literal, RuntimeError> {
        self.slots
            .get_mut(register.index())
            .and_then(Option::as_mut)
            .ok_or(RuntimeError::UninitializedRegister { register })
    }

    /// Writes grow the file when a register lies past its end.
    pub fn set(&mut self, register: Register, value: Literal) {
        let index = register.index();
        if index >= self.slots.len() {
            self.slots.resize(index + 1, None);
        }
        self.slots[index] = Some(value);
    }

    /// Non-failing read, for inspecting a finished run.
    pub fn peek(&self, register: Register) -> Option<&Literal> {
        self.slots.get(register.index()).and_then(Option::as_ref)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_slot_is_an_error() {
        let regs = Registers::new(2);
        assert_eq!(
            regs.get(Register(1)),
            Err(RuntimeError::UninitializedRegister { register: Register(1) })
        );
        assert!(regs.get(Register(9)).is_err());
    }

    #[test]
    fn set_then_get() {
        let mut regs = Registers::new(1);
        regs.set(Register(0), Literal::Bool(true));
        assert_eq!(regs.get(Register(0)), Ok(&Literal::Bool(true)));
        *regs.get_mut(Register(0)).unwrap() = Literal::Bool(false);
        assert_eq!(regs.peek(Register(0)), Some(&Literal::Bool(false)));
    }

    #[test]
    fn set_past_end_grows() {
        let mut regs = Registers::new(0);
        regs.set(Register(3), Literal::from("x"));
        assert_eq!(regs.peek(Register(3)), Some(&Literal::from("x")));
        assert!(regs.peek(Register(2)).is_none());
        assert_eq!(regs, {
            let mut filled = Registers::new(4);
            filled.set(Register(3), Literal::from("x"));
            filled
        });
    }

    #[test]
    fn register_name_is_its_number() {
        assert_eq!(Register(17).to_string(), "17");
    }
}
