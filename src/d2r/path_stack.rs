//! Explicit stack of path contexts for the D2R walk.
//!
//! Each frame names the table being filled and the row that owns the values
//! at that level. A `Document` frame owns the row receiving the members; an
//! `Array` frame holds the row carrying the `CHILD` flag, which becomes the
//! parent of every element row.

use crate::table_ref::TableRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Document,
    /// Array at the given nesting dimension (1 for an array under a key)
    Array { dimension: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathContext {
    pub table_ref: TableRef,
    pub rid: i32,
    pub kind: FrameKind,
}

#[derive(Debug, Default)]
pub struct PathStack {
    frames: Vec<PathContext>,
}

impl PathStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, table_ref: TableRef, rid: i32, kind: FrameKind) {
        self.frames.push(PathContext {
            table_ref,
            rid,
            kind,
        });
    }

    pub fn pop(&mut self) -> Option<PathContext> {
        self.frames.pop()
    }

    pub fn current(&self) -> Option<&PathContext> {
        self.frames.last()
    }

    /// Number of open containers, the root document included
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }

    /// Human readable location of the top frame, e.g. `a.b[]`
    pub fn describe(&self) -> String {
        match self.current() {
            Some(frame) => match frame.kind {
                FrameKind::Document => frame.table_ref.to_string(),
                FrameKind::Array { .. } => format!("{}[]", frame.table_ref),
            },
            None => String::new(),
        }
    }
}
