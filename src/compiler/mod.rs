//! Lowers a parsed program into a flat instruction list over virtual
//! registers.
//!
//! Every computed sub-expression gets a fresh register. Variables own one
//! register each, and assignment copies into it, so two variables never
//! share a container. Alongside each register the compiler tracks a
//! best-effort [`Kind`] hint, used to pick between array and map opcodes and
//! between `Add`, `Concat` and `Combine`.

use std::collections::HashMap;
use std::fmt;

use tracing::debug;

use crate::ast::*;
use crate::vm::{Instruction, Register};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CompileError {
    #[error("undefined variable: {name}")]
    UndefinedVariable { name: String },
    #[error("unknown function: {name}")]
    UnknownFunction { name: String },
    #[error("{name}() takes {expected} argument(s), got {found}")]
    Arity { name: String, expected: usize, found: usize },
    #[error("array index must be a number, got {found}")]
    KeyKind { found: Kind },
    #[error("cannot assign {found} to '{name}', which holds {expected}")]
    AssignKind { name: String, expected: Kind, found: Kind },
    #[error("only variables and keyed elements can be assigned to")]
    InvalidAssignTarget,
    #[error("len() needs an array or map, got {found}")]
    LenKind { found: Kind },
}

impl CompileError {
    pub fn code(&self) -> &'static str {
        match self {
            CompileError::UndefinedVariable { .. } => "OK-C001",
            CompileError::UnknownFunction { .. } => "OK-C002",
            CompileError::Arity { .. } => "OK-C003",
            CompileError::KeyKind { .. } => "OK-C004",
            CompileError::AssignKind { .. } => "OK-C005",
            CompileError::InvalidAssignTarget => "OK-C006",
            CompileError::LenKind { .. } => "OK-C007",
        }
    }
}

type Result<T> = std::result::Result<T, CompileError>;

/// A register plus what is statically known about its contents.
type Typed = (Register, Option<Kind>);

// ── Compiled function ───────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompiledFunc {
    pub instructions: Vec<Instruction>,
    /// Number of registers issued; sizes the register file of a run.
    pub registers: u32,
}

impl CompiledFunc {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a register that has never been issued before.
    pub fn next_register(&mut self) -> Register {
        let r = Register(self.registers);
        self.registers += 1;
        r
    }

    /// Append and return the instruction's index.
    pub fn append(&mut self, instruction: Instruction) -> usize {
        let index = self.instructions.len();
        self.instructions.push(instruction);
        index
    }

    /// Point a previously appended jump at the current end of the list.
    fn patch_jump(&mut self, at: usize) {
        let end = self.instructions.len();
        if let Some(
            Instruction::Jump { target }
            | Instruction::JumpIf { target, .. }
            | Instruction::JumpUnless { target, .. },
        ) = self.instructions.get_mut(at)
        {
            *target = end;
        }
    }
}

impl fmt::Display for CompiledFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, instruction) in self.instructions.iter().enumerate() {
            writeln!(f, "{i:>4}  {instruction}")?;
        }
        Ok(())
    }
}

// ── Compiler ────────────────────────────────────────────────────────

struct Variable {
    register: Register,
    kind: Option<Kind>,
}

struct Compiler {
    func: CompiledFunc,
    variables: HashMap<String, Variable>,
}

impl Compiler {
    fn new() -> Self {
        Compiler { func: CompiledFunc::new(), variables: HashMap::new() }
    }

    fn emit(&mut self, instruction: Instruction) -> usize {
        self.func.append(instruction)
    }

    fn compile_expr(&mut self, expr: &Expr) -> Result<Typed> {
        match expr {
            Expr::Literal(literal) => {
                let result = self.func.next_register();
                self.emit(Instruction::Load { literal: literal.clone(), result });
                Ok((result, Some(literal.kind())))
            }

            Expr::Identifier(name) => self
                .variables
                .get(name)
                .map(|v| (v.register, v.kind.clone()))
                .ok_or_else(|| CompileError::UndefinedVariable { name: name.clone() }),

            Expr::Group(inner) => self.compile_expr(inner),

            Expr::Array(items) => {
                let mut elements = Vec::with_capacity(items.len());
                let mut hints = Vec::with_capacity(items.len());
                for item in items {
                    let (r, hint) = self.compile_expr(item)?;
                    elements.push(r);
                    hints.push(hint);
                }
                let kind = common_kind(&hints);
                let result = self.func.next_register();
                self.emit(Instruction::ArrayAlloc { kind: kind.clone(), elements, result });
                Ok((result, Some(Kind::Array(Box::new(kind)))))
            }

            Expr::Map(entries) => {
                let mut compiled = Vec::with_capacity(entries.len());
                let mut hints = Vec::with_capacity(entries.len());
                for (key, value) in entries {
                    let (k, _) = self.compile_expr(key)?;
                    let (v, hint) = self.compile_expr(value)?;
                    compiled.push((k, v));
                    hints.push(hint);
                }
                let kind = common_kind(&hints);
                let result = self.func.next_register();
                self.emit(Instruction::MapAlloc { kind: kind.clone(), result });
                for (key, value) in compiled {
                    self.emit(Instruction::MapSet { map: result, key, value });
                }
                Ok((result, Some(Kind::Map(Box::new(kind)))))
            }

            Expr::Key { expr, key } => {
                let (container, hint) = self.compile_expr(expr)?;
                let (key, key_hint) = self.compile_expr(key)?;
                let result = self.func.next_register();
                match hint {
                    Some(Kind::Array(element)) => {
                        check_index(key_hint.as_ref())?;
                        self.emit(Instruction::ArrayGet { array: container, index: key, result });
                        Ok((result, known(&element)))
                    }
                    other => {
                        self.emit(Instruction::MapGet { map: container, key, result });
                        Ok((result, other.as_ref().and_then(Kind::element).and_then(known)))
                    }
                }
            }

            Expr::Call { name, args } => self.compile_call(name, args),

            Expr::Unary { op, expr } => {
                let (operand, _) = self.compile_expr(expr)?;
                let result = self.func.next_register();
                match op {
                    UnaryOp::Not => {
                        self.emit(Instruction::Not { operand, result });
                        Ok((result, Some(Kind::Bool)))
                    }
                    UnaryOp::Negate => {
                        self.emit(Instruction::Negate { operand, result });
                        Ok((result, Some(Kind::Number)))
                    }
                }
            }

            Expr::Binary { left, op, right } if op.is_assignment() => self.compile_assign(left, *op, right),
            Expr::Binary { left, op: BinaryOp::And, right } => self.compile_logical(left, right, true),
            Expr::Binary { left, op: BinaryOp::Or, right } => self.compile_logical(left, right, false),
            Expr::Binary { left, op, right } => {
                let left = self.compile_expr(left)?;
                let right = self.compile_expr(right)?;
                Ok(self.emit_binary(*op, left, right))
            }
        }
    }

    fn compile_call(&mut self, name: &str, args: &[Expr]) -> Result<Typed> {
        match name {
            "print" => {
                let arguments = args
                    .iter()
                    .map(|arg| self.compile_expr(arg).map(|(r, _)| r))
                    .collect::<Result<Vec<_>>>()?;
                self.emit(Instruction::Print { arguments });
                Ok((self.func.next_register(), None))
            }
            "len" => {
                let [arg] = args else {
                    return Err(CompileError::Arity { name: name.to_string(), expected: 1, found: args.len() });
                };
                let (operand, hint) = self.compile_expr(arg)?;
                if let Some(kind) = hint.filter(|k| !k.is_array() && !k.is_map()) {
                    return Err(CompileError::LenKind { found: kind });
                }
                let result = self.func.next_register();
                self.emit(Instruction::Len { operand, result });
                Ok((result, Some(Kind::Number)))
            }
            _ => Err(CompileError::UnknownFunction { name: name.to_string() }),
        }
    }

    /// `and` skips the right operand when the left is not true, `or` when it
    /// is. Either way the result register ends up holding the last operand
    /// evaluated.
    fn compile_logical(&mut self, left: &Expr, right: &Expr, is_and: bool) -> Result<Typed> {
        let (l, left_hint) = self.compile_expr(left)?;
        let result = self.func.next_register();
        self.emit(Instruction::Assign { from: l, to: result });

        let jump = if is_and {
            self.emit(Instruction::JumpUnless { condition: result, target: 0 })
        } else {
            self.emit(Instruction::JumpIf { condition: result, target: 0 })
        };

        let (r, right_hint) = self.compile_expr(right)?;
        self.emit(Instruction::Assign { from: r, to: result });
        self.func.patch_jump(jump);

        let hint = match (left_hint, right_hint) {
            (Some(Kind::Bool), Some(Kind::Bool)) => Some(Kind::Bool),
            _ => None,
        };
        Ok((result, hint))
    }

    fn emit_binary(&mut self, op: BinaryOp, (left, left_hint): Typed, (right, right_hint): Typed) -> Typed {
        let result = self.func.next_register();
        let (instruction, kind) = match op {
            BinaryOp::Add => match (left_hint, right_hint) {
                (Some(Kind::Data), Some(Kind::Data)) => (Instruction::Combine { left, right, result }, Kind::Data),
                (Some(Kind::String), Some(Kind::String)) => {
                    (Instruction::Concat { left, right, result }, Kind::String)
                }
                _ => (Instruction::Add { left, right, result }, Kind::Number),
            },
            BinaryOp::Subtract => (Instruction::Subtract { left, right, result }, Kind::Number),
            BinaryOp::Multiply => (Instruction::Multiply { left, right, result }, Kind::Number),
            BinaryOp::Divide => (Instruction::Divide { left, right, result }, Kind::Number),
            BinaryOp::Remainder => (Instruction::Remainder { left, right, result }, Kind::Number),
            BinaryOp::Equal => (Instruction::Equal { left, right, result }, Kind::Bool),
            BinaryOp::NotEqual => (Instruction::NotEqual { left, right, result }, Kind::Bool),
            BinaryOp::GreaterThan => (Instruction::GreaterThan { left, right, result }, Kind::Bool),
            BinaryOp::GreaterThanEqual => (Instruction::GreaterThanEqual { left, right, result }, Kind::Bool),
            BinaryOp::LessThan => (Instruction::LessThan { left, right, result }, Kind::Bool),
            BinaryOp::LessThanEqual => (Instruction::LessThanEqual { left, right, result }, Kind::Bool),
            BinaryOp::And
            | BinaryOp::Or
            | BinaryOp::Assign
            | BinaryOp::AddAssign
            | BinaryOp::SubtractAssign
            | BinaryOp::MultiplyAssign
            | BinaryOp::DivideAssign
            | BinaryOp::RemainderAssign => unreachable!("{op} is lowered separately"),
        };
        self.emit(instruction);
        (result, Some(kind))
    }

    fn compile_assign(&mut self, target: &Expr, op: BinaryOp, value: &Expr) -> Result<Typed> {
        if !matches!(target, Expr::Identifier(_) | Expr::Key { .. }) {
            return Err(CompileError::InvalidAssignTarget);
        }
        let value = match op.compound() {
            Some(arithmetic) => {
                let current = self.compile_expr(target)?;
                let operand = self.compile_expr(value)?;
                self.emit_binary(arithmetic, current, operand)
            }
            None => self.compile_expr(value)?,
        };
        self.store(target, value.clone())?;
        Ok(value)
    }

    /// Write `value` into `target`. A keyed target whose container is itself
    /// keyed updates a copy, so the copy is stored back into its parent.
    fn store(&mut self, target: &Expr, (value, hint): Typed) -> Result<()> {
        match target {
            Expr::Identifier(name) => {
                let register = match self.variables.get(name) {
                    Some(var) => {
                        if let (Some(expected), Some(found)) = (&var.kind, &hint) {
                            if !compatible(expected, found) {
                                return Err(CompileError::AssignKind {
                                    name: name.clone(),
                                    expected: expected.clone(),
                                    found: found.clone(),
                                });
                            }
                        }
                        var.register
                    }
                    None => self.func.next_register(),
                };
                self.emit(Instruction::Assign { from: value, to: register });
                self.variables.insert(name.clone(), Variable { register, kind: hint });
                Ok(())
            }
            Expr::Key { expr, key } => {
                let (container, container_hint) = self.compile_expr(expr)?;
                let (key, key_hint) = self.compile_expr(key)?;
                if matches!(container_hint, Some(Kind::Array(_))) {
                    check_index(key_hint.as_ref())?;
                    self.emit(Instruction::ArraySet { array: container, index: key, value });
                } else {
                    self.emit(Instruction::MapSet { map: container, key, value });
                }
                let container_hint = widen_hint(container_hint, hint.as_ref());
                match &**expr {
                    Expr::Identifier(name) => {
                        if let Some(var) = self.variables.get_mut(name) {
                            var.kind = container_hint;
                        }
                        Ok(())
                    }
                    parent => self.store(parent, (container, container_hint)),
                }
            }
            _ => Err(CompileError::InvalidAssignTarget),
        }
    }
}

fn check_index(hint: Option<&Kind>) -> Result<()> {
    match hint {
        Some(kind) if *kind != Kind::Number => Err(CompileError::KeyKind { found: kind.clone() }),
        _ => Ok(()),
    }
}

/// `Any` is as good as no hint.
fn known(kind: &Kind) -> Option<Kind> {
    match kind {
        Kind::Any => None,
        other => Some(other.clone()),
    }
}

/// The element kind shared by every hint, `Any` when empty, mixed or unknown.
fn common_kind(hints: &[Option<Kind>]) -> Kind {
    let Some(Some(first)) = hints.first() else {
        return Kind::Any;
    };
    if hints.iter().all(|h| h.as_ref() == Some(first)) {
        first.clone()
    } else {
        Kind::Any
    }
}

/// The container's hint after a keyed store of `value`. Like the run-time
/// store, a value of another kind turns the element kind into `Any`.
fn widen_hint(container: Option<Kind>, value: Option<&Kind>) -> Option<Kind> {
    let widen = |element: Box<Kind>| {
        if *element == Kind::Any || value == Some(&*element) {
            element
        } else {
            Box::new(Kind::Any)
        }
    };
    match container {
        Some(Kind::Array(element)) => Some(Kind::Array(widen(element))),
        Some(Kind::Map(element)) => Some(Kind::Map(widen(element))),
        other => other,
    }
}

/// Whether a variable holding `expected` may be reassigned a `found`.
fn compatible(expected: &Kind, found: &Kind) -> bool {
    match (expected, found) {
        (Kind::Any, _) | (_, Kind::Any) => true,
        (Kind::Array(a), Kind::Array(b)) | (Kind::Map(a), Kind::Map(b)) => compatible(a, b),
        _ => expected == found,
    }
}

/// Compile a whole program into one function. The first error aborts and
/// carries the span of the statement it was raised in.
pub fn compile(program: &Program) -> std::result::Result<CompiledFunc, Spanned<CompileError>> {
    debug!(statements = program.statements.len(), "compile started");
    let mut compiler = Compiler::new();
    for statement in &program.statements {
        compiler
            .compile_expr(statement)
            .map_err(|error| Spanned::new(error, statement.span))?;
    }
    let func = compiler.func;
    debug!(instructions = func.instructions.len(), registers = func.registers, "compile finished");
    Ok(func)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{lexer, parser, vm};

    fn compile_src(source: &str) -> Result<CompiledFunc> {
        let parsed = parser::parse(lexer::lex(source).unwrap()).unwrap();
        assert!(parsed.diagnostics.is_empty(), "{:?}", parsed.diagnostics);
        compile(&parsed.program).map_err(|e| e.node)
    }

    fn opcodes(source: &str) -> Vec<&'static str> {
        compile_src(source).unwrap().instructions.iter().map(Instruction::opcode).collect()
    }

    fn output(source: &str) -> String {
        let func = compile_src(source).unwrap();
        let mut out = Vec::new();
        vm::run(&func, &mut out).unwrap_or_else(|e| panic!("run failed: {e}"));
        String::from_utf8(out).unwrap()
    }

    // ---- registers ----

    #[test]
    fn registers_are_never_reissued() {
        let mut func = CompiledFunc::new();
        let issued: Vec<Register> = (0..5).map(|_| func.next_register()).collect();
        assert_eq!(issued, [Register(0), Register(1), Register(2), Register(3), Register(4)]);
        assert_eq!(func.registers, 5);
    }

    #[test]
    fn literal_gets_fresh_register() {
        let func = compile_src("1\n2").unwrap();
        assert_eq!(
            func.instructions,
            vec![
                Instruction::Load { literal: Literal::Number("1".parse().unwrap()), result: Register(0) },
                Instruction::Load { literal: Literal::Number("2".parse().unwrap()), result: Register(1) },
            ]
        );
    }

    // ---- key dispatch ----

    #[test]
    fn array_key_emits_array_get() {
        assert!(opcodes("arr = [1, 2]\narr[0]").contains(&"ArrayGet"));
        assert!(!opcodes("arr = [1, 2]\narr[0]").contains(&"MapGet"));
    }

    #[test]
    fn map_key_emits_map_get() {
        let ops = opcodes("m = {\"k\": 1}\nm[\"k\"]");
        assert!(ops.contains(&"MapGet"));
        assert!(!ops.contains(&"ArrayGet"));
    }

    #[test]
    fn nested_keys_dispatch_on_element_kind() {
        let ops = opcodes("g = [[1, 2], [3]]\ng[0][1]");
        assert_eq!(ops.iter().filter(|op| **op == "ArrayGet").count(), 2);
        let ops = opcodes("m = {\"a\": [1]}\nm[\"a\"][0]");
        assert_eq!(ops.iter().rev().take(2).collect::<Vec<_>>(), [&"ArrayGet", &"Load"]);
        assert!(ops.contains(&"MapGet"));
    }

    #[test]
    fn array_index_must_be_numeric() {
        let err = compile_src("a = [1]\na[\"x\"]").unwrap_err();
        assert_eq!(err, CompileError::KeyKind { found: Kind::String });
        assert_eq!(err.code(), "OK-C004");
    }

    fn array_kinds(source: &str) -> Vec<Kind> {
        compile_src(source)
            .unwrap()
            .instructions
            .into_iter()
            .filter_map(|ins| match ins {
                Instruction::ArrayAlloc { kind, .. } => Some(kind),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn mixed_store_widens_element_hint() {
        assert_eq!(output("xs = [[1]]\nxs[0] = {\"a\": 1}\nprint(xs[0][\"a\"])"), "1\n");
        assert_eq!(output("a = [1]\na[0] = \"x\"\nb = [a[0]]\nprint(b)"), "[\"x\"]\n");
        assert_eq!(array_kinds("a = [1]\na[0] = \"x\"\nb = [a[0]]"), [Kind::Number, Kind::Any]);
    }

    #[test]
    fn nested_mixed_store_widens_root() {
        let source = "g = [[1]]\ng[0][0] = \"x\"\nh = [g[0]]\nprint(g, h)";
        assert_eq!(output(source), "[[\"x\"]] [[\"x\"]]\n");
        assert_eq!(
            array_kinds(source),
            [Kind::Number, Kind::Array(Box::new(Kind::Number)), Kind::Any]
        );
    }

    #[test]
    fn same_kind_store_keeps_element_hint() {
        let ops = opcodes("xs = [[1]]\nxs[0] = [2]\nxs[0][0]");
        assert_eq!(ops.iter().filter(|op| **op == "ArrayGet").count(), 2);
    }

    // ---- operator dispatch ----

    #[test]
    fn plus_dispatches_on_hints() {
        assert_eq!(opcodes("`a` + `b`").last(), Some(&"Combine"));
        assert_eq!(opcodes("\"a\" + \"b\"").last(), Some(&"Concat"));
        assert_eq!(opcodes("1 + 2").last(), Some(&"Add"));
    }

    #[test]
    fn short_circuit_jump_is_patched_past_right_operand() {
        let func = compile_src("a = true\na and false").unwrap();
        let jump = func
            .instructions
            .iter()
            .find_map(|ins| match ins {
                Instruction::JumpUnless { target, .. } => Some(*target),
                _ => None,
            })
            .unwrap();
        assert_eq!(jump, func.instructions.len());
    }

    // ---- errors ----

    #[test]
    fn undefined_variable() {
        assert_eq!(
            compile_src("x + 1").unwrap_err(),
            CompileError::UndefinedVariable { name: "x".into() }
        );
    }

    #[test]
    fn unknown_function_and_arity() {
        assert_eq!(
            compile_src("sum(1)").unwrap_err(),
            CompileError::UnknownFunction { name: "sum".into() }
        );
        assert_eq!(
            compile_src("len([1], [2])").unwrap_err(),
            CompileError::Arity { name: "len".into(), expected: 1, found: 2 }
        );
    }

    #[test]
    fn len_of_scalar_is_rejected() {
        assert_eq!(compile_src("len(3)").unwrap_err(), CompileError::LenKind { found: Kind::Number });
    }

    #[test]
    fn reassigning_a_different_kind() {
        let err = compile_src("a = 1\na = \"x\"").unwrap_err();
        assert_eq!(
            err,
            CompileError::AssignKind { name: "a".into(), expected: Kind::Number, found: Kind::String }
        );
        assert!(compile_src("xs = []\nxs = [1]").is_ok());
    }

    #[test]
    fn invalid_assignment_target() {
        assert_eq!(compile_src("1 = 2").unwrap_err(), CompileError::InvalidAssignTarget);
        assert_eq!(compile_src("a = 1\n(a) = 2").unwrap_err(), CompileError::InvalidAssignTarget);
    }

    #[test]
    fn errors_carry_statement_span() {
        let parsed = parser::parse(lexer::lex("a = [1]\nb = a[\"x\"]\nc = 2").unwrap()).unwrap();
        let err = compile(&parsed.program).unwrap_err();
        assert_eq!(err.node, CompileError::KeyKind { found: Kind::String });
        assert_eq!(err.span, Span { start: 8, end: 18 });
    }

    // ---- end to end ----

    #[test]
    fn exact_decimal_arithmetic() {
        assert_eq!(output("print(0.1 + 0.2, 10 / 4, 7 % 3, -2 * 3)"), "0.3 2.5 1 -6\n");
    }

    #[test]
    fn precedence_survives_lowering() {
        assert_eq!(output("print(2 * 3 + 4 * 5, 10 - 4 - 3)"), "26 3\n");
    }

    #[test]
    fn false_and_never_evaluates_right() {
        assert_eq!(output("x = false and print(\"no\")\nprint(x)"), "false\n");
        assert_eq!(output("y = true or print(\"no\")\nprint(y)"), "true\n");
        assert_eq!(output("print(true and \"yes\", false or 0)"), "yes 0\n");
    }

    #[test]
    fn assignment_copies_containers() {
        assert_eq!(output("a = [1]\nb = a\nb[0] = 2\nprint(a, b)"), "[1] [2]\n");
    }

    #[test]
    fn nested_key_assignment_writes_back() {
        assert_eq!(output("g = [[1, 2], [3]]\ng[0][1] = 9\nprint(g)"), "[[1, 9], [3]]\n");
        assert_eq!(
            output("m = {\"a\": {\"b\": 1}}\nm[\"a\"][\"c\"] = 2\nprint(m)"),
            "{\"a\": {\"b\": 1, \"c\": 2}}\n"
        );
    }

    #[test]
    fn compound_assignment() {
        assert_eq!(output("x = 1\nx += 2\nx *= 10\nprint(x)"), "30\n");
        assert_eq!(output("m = {\"n\": 1}\nm[\"n\"] -= 5\nprint(m[\"n\"])"), "-4\n");
    }

    #[test]
    fn chained_assignment() {
        assert_eq!(output("a = b = 4\nprint(a + b)"), "8\n");
    }

    #[test]
    fn maps_and_len() {
        assert_eq!(output("m = {\"a\": 1}\nm[\"b\"] = 2\nprint(len(m), m[\"b\"])"), "2 2\n");
        assert_eq!(output("print(len([]), len([1, 2, 3]))"), "0 3\n");
    }

    #[test]
    fn strings_and_data() {
        assert_eq!(output("s = \"ab\" + \"cd\"\nprint(s, `x` + `y`)"), "abcd xy\n");
    }

    #[test]
    fn listing_numbers_each_instruction() {
        let listing = compile_src("a = 1").unwrap().to_string();
        let lines: Vec<&str> = listing.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("   0  Load"), "{listing}");
        assert!(lines[1].starts_with("   1  Assign"), "{listing}");
    }
}
