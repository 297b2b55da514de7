use std::cmp::Ordering;
use std::fmt;
use std::io::Write;

use crate::ast::{Kind, Literal};
use crate::number::{Number, NumberError};

use super::registers::{Register, Registers};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RuntimeError {
    #[error("expected {expected}, got {found}")]
    TypeMismatch { expected: &'static str, found: Kind },
    #[error("register {register} read before it was written")]
    UninitializedRegister { register: Register },
    #[error("index {index} out of range for array of length {len}")]
    IndexOutOfRange { index: Number, len: usize },
    #[error("array index {index} is not a whole number")]
    NonIntegralIndex { index: Number },
    #[error("no key \"{key}\" in map")]
    MissingKey { key: String },
    #[error(transparent)]
    Number(#[from] NumberError),
    #[error("cannot write output: {0}")]
    Output(String),
}

impl RuntimeError {
    pub fn code(&self) -> &'static str {
        match self {
            RuntimeError::TypeMismatch { .. } => "OK-R001",
            RuntimeError::UninitializedRegister { .. } => "OK-R002",
            RuntimeError::IndexOutOfRange { .. } => "OK-R003",
            RuntimeError::NonIntegralIndex { .. } => "OK-R004",
            RuntimeError::MissingKey { .. } => "OK-R005",
            RuntimeError::Number(_) => "OK-R006",
            RuntimeError::Output(_) => "OK-R007",
        }
    }
}

type Result<T> = std::result::Result<T, RuntimeError>;

/// One VM operation. Operands and results are registers; jump targets are
/// absolute instruction indexes.
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    Load { literal: Literal, result: Register },
    Assign { from: Register, to: Register },

    Add { left: Register, right: Register, result: Register },
    Subtract { left: Register, right: Register, result: Register },
    Multiply { left: Register, right: Register, result: Register },
    Divide { left: Register, right: Register, result: Register },
    Remainder { left: Register, right: Register, result: Register },
    Negate { operand: Register, result: Register },
    Combine { left: Register, right: Register, result: Register },
    Concat { left: Register, right: Register, result: Register },

    Not { operand: Register, result: Register },
    Equal { left: Register, right: Register, result: Register },
    NotEqual { left: Register, right: Register, result: Register },
    GreaterThan { left: Register, right: Register, result: Register },
    GreaterThanEqual { left: Register, right: Register, result: Register },
    LessThan { left: Register, right: Register, result: Register },
    LessThanEqual { left: Register, right: Register, result: Register },

    Len { operand: Register, result: Register },
    ArrayAlloc { kind: Kind, elements: Vec<Register>, result: Register },
    ArrayGet { array: Register, index: Register, result: Register },
    ArraySet { array: Register, index: Register, value: Register },
    MapAlloc { kind: Kind, result: Register },
    MapGet { map: Register, key: Register, result: Register },
    MapSet { map: Register, key: Register, value: Register },

    Print { arguments: Vec<Register> },

    Jump { target: usize },
    JumpIf { condition: Register, target: usize },
    JumpUnless { condition: Register, target: usize },
}

impl Instruction {
    pub fn opcode(&self) -> &'static str {
        match self {
            Instruction::Load { .. } => "Load",
            Instruction::Assign { .. } => "Assign",
            Instruction::Add { .. } => "Add",
            Instruction::Subtract { .. } => "Subtract",
            Instruction::Multiply { .. } => "Multiply",
            Instruction::Divide { .. } => "Divide",
            Instruction::Remainder { .. } => "Remainder",
            Instruction::Negate { .. } => "Negate",
            Instruction::Combine { .. } => "Combine",
            Instruction::Concat { .. } => "Concat",
            Instruction::Not { .. } => "Not",
            Instruction::Equal { .. } => "Equal",
            Instruction::NotEqual { .. } => "NotEqual",
            Instruction::GreaterThan { .. } => "GreaterThan",
            Instruction::GreaterThanEqual { .. } => "GreaterThanEqual",
            Instruction::LessThan { .. } => "LessThan",
            Instruction::LessThanEqual { .. } => "LessThanEqual",
            Instruction::Len { .. } => "Len",
            Instruction::ArrayAlloc { .. } => "ArrayAlloc",
            Instruction::ArrayGet { .. } => "ArrayGet",
            Instruction::ArraySet { .. } => "ArraySet",
            Instruction::MapAlloc { .. } => "MapAlloc",
            Instruction::MapGet { .. } => "MapGet",
            Instruction::MapSet { .. } => "MapSet",
            Instruction::Print { .. } => "Print",
            Instruction::Jump { .. } => "Jump",
            Instruction::JumpIf { .. } => "JumpIf",
            Instruction::JumpUnless { .. } => "JumpUnless",
        }
    }

    /// Run this instruction against the register file. `ip` already points
    /// at the next instruction; jumps overwrite it.
    pub fn execute(&self, registers: &mut Registers, ip: &mut usize, out: &mut dyn Write) -> Result<()> {
        match self {
            Instruction::Load { literal, result } => {
                registers.set(*result, literal.clone());
            }
            Instruction::Assign { from, to } => {
                let value = registers.get(*from)?.clone();
                registers.set(*to, value);
            }

            Instruction::Add { left, right, result } => arithmetic(registers, *left, *right, *result, Number::add)?,
            Instruction::Subtract { left, right, result } => arithmetic(registers, *left, *right, *result, Number::sub)?,
            Instruction::Multiply { left, right, result } => arithmetic(registers, *left, *right, *result, Number::mul)?,
            Instruction::Divide { left, right, result } => arithmetic(registers, *left, *right, *result, Number::div)?,
            Instruction::Remainder { left, right, result } => arithmetic(registers, *left, *right, *result, Number::rem)?,
            Instruction::Negate { operand, result } => {
                let n = number(registers.get(*operand)?)?.neg()?;
                registers.set(*result, Literal::Number(n));
            }
            Instruction::Combine { left, right, result } => {
                let mut bytes = data(registers.get(*left)?)?.to_vec();
                bytes.extend_from_slice(data(registers.get(*right)?)?);
                registers.set(*result, Literal::Data(bytes));
            }
            Instruction::Concat { left, right, result } => {
                let mut s = string(registers.get(*left)?)?.to_string();
                s.push_str(string(registers.get(*right)?)?);
                registers.set(*result, Literal::String(s));
            }

            Instruction::Not { operand, result } => {
                let truth = registers.get(*operand)?.is_true();
                registers.set(*result, Literal::Bool(!truth));
            }
            Instruction::Equal { left, right, result } => {
                let eq = same(registers.get(*left)?, registers.get(*right)?);
                registers.set(*result, Literal::Bool(eq));
            }
            Instruction::NotEqual { left, right, result } => {
                let eq = same(registers.get(*left)?, registers.get(*right)?);
                registers.set(*result, Literal::Bool(!eq));
            }
            Instruction::GreaterThan { left, right, result } => {
                comparison(registers, *left, *right, *result, Ordering::is_gt)?
            }
            Instruction::GreaterThanEqual { left, right, result } => {
                comparison(registers, *left, *right, *result, Ordering::is_ge)?
            }
            Instruction::LessThan { left, right, result } => {
                comparison(registers, *left, *right, *result, Ordering::is_lt)?
            }
            Instruction::LessThanEqual { left, right, result } => {
                comparison(registers, *left, *right, *result, Ordering::is_le)?
            }

            Instruction::Len { operand, result } => {
                let len = match registers.get(*operand)? {
                    Literal::Array { items, .. } => items.len(),
                    Literal::Map { entries, .. } => entries.len(),
                    other => return Err(mismatch("array or map", other)),
                };
                registers.set(*result, Literal::Number(Number::from(len)));
            }
            Instruction::ArrayAlloc { kind, elements, result } => {
                let items = elements
                    .iter()
                    .map(|r| registers.get(*r).cloned())
                    .collect::<Result<Vec<_>>>()?;
                registers.set(*result, Literal::Array { element: kind.clone(), items });
            }
            Instruction::ArrayGet { array, index, result } => {
                let index = number(registers.get(*index)?)?;
                let Literal::Array { items, .. } = registers.get(*array)? else {
                    return Err(mismatch("array", registers.get(*array)?));
                };
                let value = items[position(index, items.len())?].clone();
                registers.set(*result, value);
            }
            Instruction::ArraySet { array, index, value } => {
                let index = number(registers.get(*index)?)?;
                let value = registers.get(*value)?.clone();
                match registers.get_mut(*array)? {
                    Literal::Array { element, items } => {
                        let at = position(index, items.len())?;
                        widen(element, &value);
                        items[at] = value;
                    }
                    other => return Err(mismatch("array", other)),
                }
            }
            Instruction::MapAlloc { kind, result } => {
                registers.set(*result, Literal::empty_map(kind.clone()));
            }
            Instruction::MapGet { map, key, result } => {
                let key = registers.get(*key)?.scalar();
                let value = match registers.get(*map)? {
                    Literal::Map { entries, .. } => {
                        entries.get(&key).cloned().ok_or(RuntimeError::MissingKey { key })?
                    }
                    other => return Err(mismatch("map", other)),
                };
                registers.set(*result, value);
            }
            Instruction::MapSet { map, key, value } => {
                let key = registers.get(*key)?.scalar();
                let value = registers.get(*value)?.clone();
                match registers.get_mut(*map)? {
                    Literal::Map { element, entries } => {
                        widen(element, &value);
                        entries.insert(key, value);
                    }
                    other => return Err(mismatch("map", other)),
                }
            }

            Instruction::Print { arguments } => {
                let line = arguments
                    .iter()
                    .map(|r| registers.get(*r).map(Literal::to_string))
                    .collect::<Result<Vec<_>>>()?
                    .join(" ");
                writeln!(out, "{line}").map_err(|e| RuntimeError::Output(e.to_string()))?;
            }

            Instruction::Jump { target } => *ip = *target,
            Instruction::JumpIf { condition, target } => {
                if registers.get(*condition)?.is_true() {
                    *ip = *target;
                }
            }
            Instruction::JumpUnless { condition, target } => {
                if !registers.get(*condition)?.is_true() {
                    *ip = *target;
                }
            }
        }
        Ok(())
    }
}

fn mismatch(expected: &'static str, found: &Literal) -> RuntimeError {
    RuntimeError::TypeMismatch { expected, found: found.kind() }
}

fn number(value: &Literal) -> Result<Number> {
    match value {
        Literal::Number(n) => Ok(*n),
        other => Err(mismatch("number", other)),
    }
}

fn string(value: &Literal) -> Result<&str> {
    match value {
        Literal::String(s) => Ok(s),
        other => Err(mismatch("string", other)),
    }
}

fn data(value: &Literal) -> Result<&[u8]> {
    match value {
        Literal::Data(bytes) => Ok(bytes),
        other => Err(mismatch("data", other)),
    }
}

fn arithmetic(
    registers: &mut Registers,
    left: Register,
    right: Register,
    result: Register,
    op: fn(&Number, &Number) -> std::result::Result<Number, NumberError>,
) -> Result<()> {
    let a = number(registers.get(left)?)?;
    let b = number(registers.get(right)?)?;
    registers.set(result, Literal::Number(op(&a, &b)?));
    Ok(())
}

fn comparison(
    registers: &mut Registers,
    left: Register,
    right: Register,
    result: Register,
    test: fn(Ordering) -> bool,
) -> Result<()> {
    let ordering = order(registers.get(left)?, registers.get(right)?)?;
    registers.set(result, Literal::Bool(test(ordering)));
    Ok(())
}

fn order(a: &Literal, b: &Literal) -> Result<Ordering> {
    match (a, b) {
        (Literal::Number(x), Literal::Number(y)) => Ok(x.cmp(y)),
        (Literal::String(x), Literal::String(y)) => Ok(x.cmp(y)),
        (Literal::Char(x), Literal::Char(y)) => Ok(x.cmp(y)),
        (Literal::Number(_), other) => Err(mismatch("number", other)),
        (Literal::String(_), other) => Err(mismatch("string", other)),
        (Literal::Char(_), other) => Err(mismatch("char", other)),
        (other, _) => Err(mismatch("number, string or char", other)),
    }
}

/// Structural equality. Container element kinds do not take part.
fn same(a: &Literal, b: &Literal) -> bool {
    match (a, b) {
        (Literal::Array { items: x, .. }, Literal::Array { items: y, .. }) => {
            x.len() == y.len() && x.iter().zip(y).all(|(a, b)| same(a, b))
        }
        (Literal::Map { entries: x, .. }, Literal::Map { entries: y, .. }) => {
            x.len() == y.len() && x.iter().zip(y).all(|((ka, a), (kb, b))| ka == kb && same(a, b))
        }
        _ => a == b,
    }
}

/// Bounds-checked array position from a numeric index.
fn position(index: Number, len: usize) -> Result<usize> {
    if !index.is_integer() {
        return Err(RuntimeError::NonIntegralIndex { index });
    }
    match index.to_usize() {
        Some(at) if at < len => Ok(at),
        _ => Err(RuntimeError::IndexOutOfRange { index, len }),
    }
}

/// A store of a differently-kinded value makes the container heterogeneous.
fn widen(element: &mut Kind, value: &Literal) {
    if *element != Kind::Any && *element != value.kind() {
        *element = Kind::Any;
    }
}

fn operands(f: &mut fmt::Formatter<'_>, registers: &[Register]) -> fmt::Result {
    for (i, r) in registers.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "r{r}")?;
    }
    Ok(())
}

/// Assembly-style listing line, used by `ok asm` and trace logging.
impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:<16}", self.opcode())?;
        match self {
            Instruction::Load { literal, result } => write!(f, "r{result} = {literal} ({})", literal.kind()),
            Instruction::Assign { from, to } => write!(f, "r{to} = r{from}"),
            Instruction::Add { left, right, result }
            | Instruction::Subtract { left, right, result }
            | Instruction::Multiply { left, right, result }
            | Instruction::Divide { left, right, result }
            | Instruction::Remainder { left, right, result }
            | Instruction::Combine { left, right, result }
            | Instruction::Concat { left, right, result }
            | Instruction::Equal { left, right, result }
            | Instruction::NotEqual { left, right, result }
            | Instruction::GreaterThan { left, right, result }
            | Instruction::GreaterThanEqual { left, right, result }
            | Instruction::LessThan { left, right, result }
            | Instruction::LessThanEqual { left, right, result } => {
                write!(f, "r{result} = r{left}, r{right}")
            }
            Instruction::Negate { operand, result }
            | Instruction::Not { operand, result }
            | Instruction::Len { operand, result } => write!(f, "r{result} = r{operand}"),
            Instruction::ArrayAlloc { kind, elements, result } => {
                write!(f, "r{result} = []{kind} [")?;
                operands(f, elements)?;
                f.write_str("]")
            }
            Instruction::ArrayGet { array, index, result } => write!(f, "r{result} = r{array}[r{index}]"),
            Instruction::ArraySet { array, index, value } => write!(f, "r{array}[r{index}] = r{value}"),
            Instruction::MapAlloc { kind, result } => write!(f, "r{result} = {{}}{kind}"),
            Instruction::MapGet { map, key, result } => write!(f, "r{result} = r{map}[r{key}]"),
            Instruction::MapSet { map, key, value } => write!(f, "r{map}[r{key}] = r{value}"),
            Instruction::Print { arguments } => operands(f, arguments),
            Instruction::Jump { target } => write!(f, "-> {target}"),
            Instruction::JumpIf { condition, target } | Instruction::JumpUnless { condition, target } => {
                write!(f, "r{condition} -> {target}")
            }
        }
    }
}
