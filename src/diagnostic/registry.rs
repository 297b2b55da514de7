/// An entry in the error code registry.
pub struct ErrorEntry {
    pub code: &'static str,
    pub short: &'static str,
    pub long: &'static str,
}

/// All stable error codes.
pub static REGISTRY: &[ErrorEntry] = &[
    // ── Lexer ────────────────────────────────────────────────────────────────
    ErrorEntry {
        code: "OK-L001",
        short: "unexpected input",
        long: r#"## OK-L001: unexpected input

The source contains a character that does not start any token, or a quoted
literal that is never closed on its line.

**Example:**

    total = $price

`$` is not part of the language. Logical operators are spelled `and`, `or`
and `not`; `!` only appears in `!=`.
"#,
    },

    // ── Parser ───────────────────────────────────────────────────────────────
    ErrorEntry {
        code: "OK-P001",
        short: "unexpected token",
        long: r#"## OK-P001: unexpected token

The parser needed a particular token (an expression, a closing bracket, a
`:` between a map key and its value, or the end of a line) and found
something else. Parsing stops at the first such error.

**Examples:**

    a = 1 +          -- an operator needs a right operand
    xs = [1, 2,]     -- arrays do not allow a trailing comma
    a = 1 b = 2      -- statements go on separate lines
"#,
    },
    ErrorEntry {
        code: "OK-P002",
        short: "char literal must be one character",
        long: r#"## OK-P002: char literal must be one character

A char literal in single quotes holds exactly one character after escapes
are decoded.

**Example:**

    c = 'ab'

**Fix:** use a string, `"ab"`, or a single character, `'a'`.
"#,
    },
    ErrorEntry {
        code: "OK-P003",
        short: "invalid escape sequence",
        long: r#"## OK-P003: invalid escape sequence

String and char literals accept these escapes only:

    \n  \t  \r  \\  \"  \'  \0

**Example:**

    path = "C:\temp\new"   -- \t and \n are escapes here

**Fix:** double the backslash, `"C:\\temp\\new"`, or use a data literal in
backticks, which has no escapes.
"#,
    },
    ErrorEntry {
        code: "OK-P004",
        short: "number literal out of range",
        long: r#"## OK-P004: number literal out of range

Numbers are exact decimals with at most 38 significant digits. The literal
has more digits than that.
"#,
    },

    // ── Compiler ─────────────────────────────────────────────────────────────
    ErrorEntry {
        code: "OK-C001",
        short: "undefined variable",
        long: r#"## OK-C001: undefined variable

A variable is read before any assignment to it.

**Example:**

    print(total)
    total = 3

**Fix:** assign the variable on an earlier line.
"#,
    },
    ErrorEntry {
        code: "OK-C002",
        short: "unknown function",
        long: r#"## OK-C002: unknown function

Only the built-in functions can be called:

- `print(args...)` writes its arguments separated by spaces
- `len(x)` returns the number of elements of an array or keys of a map
"#,
    },
    ErrorEntry {
        code: "OK-C003",
        short: "wrong number of arguments",
        long: r#"## OK-C003: wrong number of arguments

A built-in was called with the wrong number of arguments. `len` takes
exactly one.
"#,
    },
    ErrorEntry {
        code: "OK-C004",
        short: "array index is not a number",
        long: r#"## OK-C004: array index is not a number

Arrays are indexed by position. The container is known to be an array but
the key is known to be something other than a number.

**Example:**

    xs = [1, 2]
    xs["first"]

**Fix:** use a number, or a map if you need named keys.
"#,
    },
    ErrorEntry {
        code: "OK-C005",
        short: "variable reassigned a different kind",
        long: r#"## OK-C005: variable reassigned a different kind

A variable keeps the kind of its first assignment. Arrays and maps may
change their element kind when either side is `any`.

**Example:**

    n = 1
    n = "one"
"#,
    },
    ErrorEntry {
        code: "OK-C006",
        short: "invalid assignment target",
        long: r#"## OK-C006: invalid assignment target

The left side of `=` (or `+=`, `-=`, ...) must be a variable or a keyed
element such as `xs[0]` or `m["k"]`.

**Example:**

    1 = x
    (a) = 2
"#,
    },
    ErrorEntry {
        code: "OK-C007",
        short: "len of a non-container",
        long: r#"## OK-C007: len of a non-container

`len` counts array elements or map keys. Its argument is known to be a
scalar.

**Example:**

    len(42)
"#,
    },

    // ── Runtime ──────────────────────────────────────────────────────────────
    ErrorEntry {
        code: "OK-R001",
        short: "type mismatch",
        long: r#"## OK-R001: type mismatch

An instruction got a value of the wrong kind, for example arithmetic on a
string or indexing into a number.

**Example:**

    m = {"a": 1, "b": "two"}
    print(m["a"] + m["b"])
"#,
    },
    ErrorEntry {
        code: "OK-R002",
        short: "register read before write",
        long: r#"## OK-R002: register read before write

An instruction read a register no earlier instruction wrote. The usual
cause is using the result of `print(...)`, which has no value.

**Example:**

    x = print("hi")
"#,
    },
    ErrorEntry {
        code: "OK-R003",
        short: "index out of range",
        long: r#"## OK-R003: index out of range

An array index is negative or not less than the array's length.

**Example:**

    xs = [1, 2]
    print(xs[2])
"#,
    },
    ErrorEntry {
        code: "OK-R004",
        short: "non-integral array index",
        long: r#"## OK-R004: non-integral array index

Array indexes must be whole numbers.

**Example:**

    xs = [1, 2]
    print(xs[0.5])
"#,
    },
    ErrorEntry {
        code: "OK-R005",
        short: "missing map key",
        long: r#"## OK-R005: missing map key

A map lookup used a key the map does not contain. Keys are compared by
their canonical text, so `m[1.50]` and `m["1.5"]` find the same entry.

**Example:**

    m = {"a": 1}
    print(m["b"])
"#,
    },
    ErrorEntry {
        code: "OK-R006",
        short: "numeric error",
        long: r#"## OK-R006: numeric error

Division or remainder by zero, or a result too large for an exact decimal.
"#,
    },
    ErrorEntry {
        code: "OK-R007",
        short: "output failed",
        long: r#"## OK-R007: output failed

`print` could not write to its output, for example because stdout was
closed.
"#,
    },
    ErrorEntry {
        code: "OK-R008",
        short: "step limit exceeded",
        long: r#"## OK-R008: step limit exceeded

The run executed more instructions than `--max-steps` allows.
"#,
    },
];

/// Look up an error entry by code (e.g. `"OK-C004"`). Case-insensitive.
pub fn lookup(code: &str) -> Option<&'static ErrorEntry> {
    REGISTRY.iter().find(|e| e.code.eq_ignore_ascii_case(code))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Kind, Span};
    use crate::compiler::CompileError;
    use crate::lexer::TokenKind;
    use crate::parser::{LiteralError, ParseError};
    use crate::vm::{Register, RuntimeError, VmError};

    #[test]
    fn lookup_known_code() {
        let e = lookup("OK-C004").expect("OK-C004 should be in registry");
        assert_eq!(e.code, "OK-C004");
        assert!(e.long.contains("OK-C004"));
        assert_eq!(lookup("ok-c004").map(|e| e.code), Some("OK-C004"));
    }

    #[test]
    fn lookup_unknown_returns_none() {
        assert!(lookup("OK-X999").is_none());
        assert!(lookup("").is_none());
    }

    #[test]
    fn all_codes_unique_and_documented() {
        let mut codes: Vec<&str> = REGISTRY.iter().map(|e| e.code).collect();
        codes.sort_unstable();
        let len_before = codes.len();
        codes.dedup();
        assert_eq!(codes.len(), len_before, "duplicate codes in registry");
        for entry in REGISTRY {
            assert!(!entry.short.is_empty(), "{} missing short description", entry.code);
            assert!(entry.long.starts_with(&format!("## {}", entry.code)), "{}", entry.code);
        }
    }

    #[test]
    fn every_error_code_is_registered() {
        let span = Span::UNKNOWN;
        let codes = [
            "OK-L001",
            ParseError::TokenMismatch { expected: "x", after: None, found: TokenKind::Eof, span }.code(),
            LiteralError::CharLength { value: String::new(), span }.code(),
            LiteralError::InvalidEscape { escape: 'q', kind: TokenKind::StringLiteral, span }.code(),
            LiteralError::NumberRange { value: String::new(), span }.code(),
            CompileError::UndefinedVariable { name: String::new() }.code(),
            CompileError::UnknownFunction { name: String::new() }.code(),
            CompileError::Arity { name: String::new(), expected: 1, found: 0 }.code(),
            CompileError::KeyKind { found: Kind::Bool }.code(),
            CompileError::AssignKind { name: String::new(), expected: Kind::Bool, found: Kind::Data }.code(),
            CompileError::InvalidAssignTarget.code(),
            CompileError::LenKind { found: Kind::Bool }.code(),
            RuntimeError::TypeMismatch { expected: "number", found: Kind::Bool }.code(),
            RuntimeError::UninitializedRegister { register: Register(0) }.code(),
            RuntimeError::IndexOutOfRange { index: crate::number::Number::ZERO, len: 0 }.code(),
            RuntimeError::NonIntegralIndex { index: crate::number::Number::ZERO }.code(),
            RuntimeError::MissingKey { key: String::new() }.code(),
            RuntimeError::Number(crate::number::NumberError::Overflow).code(),
            RuntimeError::Output(String::new()).code(),
            VmError::StepLimit { limit: 1 }.code(),
        ];
        for code in codes {
            assert!(lookup(code).is_some(), "{code} is not in the registry");
        }
        assert_eq!(codes.len(), REGISTRY.len());
    }
}
