use std::fmt;

use serde::{Serialize, Serializer};

/// The fixed operation table. `Eval`, `If` and `While` re-enter the
/// dispatcher; everything else is a leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Add,
    Sub,
    Mul,
    Div,
    Dup,
    Cons,
    Eq,
    Lt,
    Gt,
    Lte,
    Gte,
    Not,
    Print,
    TypeOf,
    Eval,
    If,
    While,
}

impl Op {
    pub const ALL: [Op; 17] = [
        Op::Add,
        Op::Sub,
        Op::Mul,
        Op::Div,
        Op::Dup,
        Op::Cons,
        Op::Eq,
        Op::Lt,
        Op::Gt,
        Op::Lte,
        Op::Gte,
        Op::Not,
        Op::Print,
        Op::TypeOf,
        Op::Eval,
        Op::If,
        Op::While,
    ];

    /// Source spelling.
    pub fn word(self) -> &'static str {
        match self {
            Op::Add => "+",
            Op::Sub => "-",
            Op::Mul => "*",
            Op::Div => "/",
            Op::Dup => ".",
            Op::Cons => "<:",
            Op::Eq => "=",
            Op::Lt => "<",
            Op::Gt => ">",
            Op::Lte => "<=",
            Op::Gte => ">=",
            Op::Not => "not",
            Op::Print => "print",
            Op::TypeOf => "type?",
            Op::Eval => "~",
            Op::If => "if",
            Op::While => "while",
        }
    }

    pub fn from_word(word: &str) -> Option<Op> {
        Op::ALL.into_iter().find(|op| op.word() == word)
    }

    /// Number of values popped before the operation does anything else.
    pub fn arity(self) -> usize {
        match self {
            Op::Not | Op::Dup | Op::Print | Op::TypeOf | Op::Eval => 1,
            Op::If => 3,
            _ => 2,
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.word())
    }
}

impl Serialize for Op {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.word())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn words_round_trip_through_lookup() {
        for op in Op::ALL {
            assert_eq!(Op::from_word(op.word()), Some(op));
        }
        assert_eq!(Op::from_word("swap"), None);
    }

    #[test]
    fn arities() {
        assert_eq!(Op::Add.arity(), 2);
        assert_eq!(Op::Cons.arity(), 2);
        assert_eq!(Op::Not.arity(), 1);
        assert_eq!(Op::If.arity(), 3);
        assert_eq!(Op::While.arity(), 2);
    }

    #[test]
    fn type_query_word() {
        assert_eq!(Op::from_word("type?"), Some(Op::TypeOf));
        assert_eq!(Op::TypeOf.arity(), 1);
    }

    #[test]
    fn serializes_as_word() {
        assert_eq!(serde_json::to_string(&Op::Cons).unwrap(), "\"<:\"");
    }
}
