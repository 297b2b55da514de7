use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::number::Number;

/// The static shape of a value. Container element kinds are carried
/// structurally rather than as a string prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum Kind {
    Number,
    Bool,
    String,
    Char,
    Data,
    /// Element kind of an empty or mixed container.
    Any,
    Array(Box<Kind>),
    Map(Box<Kind>),
}

impl Kind {
    pub fn is_array(&self) -> bool {
        matches!(self, Kind::Array(_))
    }

    pub fn is_map(&self) -> bool {
        matches!(self, Kind::Map(_))
    }

    /// Element kind of a container, `None` for scalars.
    pub fn element(&self) -> Option<&Kind> {
        match self {
            Kind::Array(element) | Kind::Map(element) => Some(element),
            _ => None,
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Kind::Number => f.write_str("number"),
            Kind::Bool => f.write_str("bool"),
            Kind::String => f.write_str("string"),
            Kind::Char => f.write_str("char"),
            Kind::Data => f.write_str("data"),
            Kind::Any => f.write_str("any"),
            Kind::Array(element) => write!(f, "[]{element}"),
            Kind::Map(element) => write!(f, "{{}}{element}"),
        }
    }
}

/// A dynamically tagged value: an AST leaf at compile time and the contents
/// of a register at run time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Literal {
    Number(Number),
    Bool(bool),
    String(String),
    Char(char),
    Data(Vec<u8>),
    Array { element: Kind, items: Vec<Literal> },
    Map { element: Kind, entries: BTreeMap<String, Literal> },
}

impl Literal {
    pub fn kind(&self) -> Kind {
        match self {
            Literal::Number(_) => Kind::Number,
            Literal::Bool(_) => Kind::Bool,
            Literal::String(_) => Kind::String,
            Literal::Char(_) => Kind::Char,
            Literal::Data(_) => Kind::Data,
            Literal::Array { element, .. } => Kind::Array(Box::new(element.clone())),
            Literal::Map { element, .. } => Kind::Map(Box::new(element.clone())),
        }
    }

    /// Truth is `Bool(true)` and nothing else.
    pub fn is_true(&self) -> bool {
        matches!(self, Literal::Bool(true))
    }

    /// Canonical string form of a scalar, used as a map key. Containers
    /// fall back to their display form.
    pub fn scalar(&self) -> String {
        match self {
            Literal::String(s) => s.clone(),
            Literal::Data(bytes) => String::from_utf8_lossy(bytes).into_owned(),
            other => other.to_string(),
        }
    }

    pub fn empty_map(element: Kind) -> Self {
        Literal::Map { element, entries: BTreeMap::new() }
    }
}

impl From<Number> for Literal {
    fn from(n: Number) -> Self {
        Literal::Number(n)
    }
}

impl From<bool> for Literal {
    fn from(b: bool) -> Self {
        Literal::Bool(b)
    }
}

impl From<&str> for Literal {
    fn from(s: &str) -> Self {
        Literal::String(s.to_string())
    }
}

/// `print` form: scalars bare, container elements quoted where ambiguous.
impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Number(n) => write!(f, "{n}"),
            Literal::Bool(b) => write!(f, "{b}"),
            Literal::String(s) => f.write_str(s),
            Literal::Char(c) => write!(f, "{c}"),
            Literal::Data(bytes) => f.write_str(&String::from_utf8_lossy(bytes)),
            Literal::Array { items, .. } => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write_element(f, item)?;
                }
                f.write_str("]")
            }
            Literal::Map { entries, .. } => {
                f.write_str("{")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "\"{key}\": ")?;
                    write_element(f, value)?;
                }
                f.write_str("}")
            }
        }
    }
}

fn write_element(f: &mut fmt::Formatter<'_>, item: &Literal) -> fmt::Result {
    match item {
        Literal::String(s) => write!(f, "\"{s}\""),
        Literal::Char(c) => write!(f, "'{c}'"),
        Literal::Data(bytes) => write!(f, "`{}`", String::from_utf8_lossy(bytes)),
        other => write!(f, "{other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num(s: &str) -> Literal {
        Literal::Number(s.parse().unwrap())
    }

    #[test]
    fn kind_display() {
        assert_eq!(Kind::Number.to_string(), "number");
        assert_eq!(Kind::Array(Box::new(Kind::Number)).to_string(), "[]number");
        assert_eq!(
            Kind::Map(Box::new(Kind::Array(Box::new(Kind::Any)))).to_string(),
            "{}[]any"
        );
    }

    #[test]
    fn literal_kind_carries_element() {
        let array = Literal::Array { element: Kind::String, items: vec!["a".into()] };
        assert_eq!(array.kind(), Kind::Array(Box::new(Kind::String)));
        assert!(array.kind().is_array());
        assert_eq!(array.kind().element(), Some(&Kind::String));
        assert!(Literal::empty_map(Kind::Number).kind().is_map());
    }

    #[test]
    fn only_true_is_true() {
        assert!(Literal::Bool(true).is_true());
        assert!(!Literal::Bool(false).is_true());
        assert!(!Literal::String("true".into()).is_true());
        assert!(!num("1").is_true());
    }

    #[test]
    fn scalar_forms() {
        assert_eq!(num("1.50").scalar(), "1.5");
        assert_eq!(Literal::Bool(false).scalar(), "false");
        assert_eq!(Literal::String("k".into()).scalar(), "k");
        assert_eq!(Literal::Char('c').scalar(), "c");
        assert_eq!(Literal::Data(b"raw".to_vec()).scalar(), "raw");
    }

    #[test]
    fn display_containers() {
        let array = Literal::Array {
            element: Kind::Any,
            items: vec![num("1"), "two".into(), Literal::Char('3')],
        };
        assert_eq!(array.to_string(), r#"[1, "two", '3']"#);

        let mut entries = BTreeMap::new();
        entries.insert("b".to_string(), num("2"));
        entries.insert("a".to_string(), num("1"));
        let map = Literal::Map { element: Kind::Number, entries };
        assert_eq!(map.to_string(), r#"{"a": 1, "b": 2}"#);
    }
}
