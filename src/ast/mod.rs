use serde::Serialize;

use crate::vm::Value;

pub mod source_map;
pub use source_map::SourceMap;

/// Byte range within source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub const UNKNOWN: Span = Span { start: 0, end: 0 };

    pub fn new(start: usize, end: usize) -> Self {
        Span { start, end }
    }

    pub fn merge(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

impl From<std::ops::Range<usize>> for Span {
    fn from(range: std::ops::Range<usize>) -> Self {
        Span::new(range.start, range.end)
    }
}

/// A parsed program: the item sequence the VM executes, plus the source span
/// of each top-level item. Macro uses are already spliced in.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Program {
    pub items: Vec<Value>,
    #[serde(skip)]
    pub spans: Vec<Span>,
}

impl Program {
    pub fn push(&mut self, item: Value, span: Span) {
        self.items.push(item);
        self.spans.push(span);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn span_of(&self, index: usize) -> Span {
        self.spans.get(index).copied().unwrap_or(Span::UNKNOWN)
    }
}
