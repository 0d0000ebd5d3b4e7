//! TableRef: path-based identity of a virtual table
//!
//! A `TableRef` names one structural position of a document tree,
//! independent of any concrete document. Two documents that hold a
//! sub-document and an array under the same key reach the *same* `TableRef`;
//! which shape was stored is recorded on the parent row, never here.
//!
//! ```text
//! {"a": {"b": 1}, "c": [[1, 2]]}
//!
//! ""          root
//! "a"         named child of root
//! "c"         named child of root (arrays at dimension 1 share the key's table)
//! "c.$2"      array level: elements of the inner array
//! ```

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Prefix of the synthetic name given to array levels
pub const ARRAY_DIMENSION_PREFIX: char = '$';

/// Variant order is the sort order of sibling segments
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum Segment {
    Root,
    Named(Arc<str>),
    /// Anonymous level for an array nested directly inside another array.
    /// Dimension 2 is the first such level.
    ArrayDimension(u32),
}

#[derive(Debug)]
struct Node {
    parent: Option<TableRef>,
    segment: Segment,
    depth: usize,
}

/// Immutable, cheaply clonable table path
#[derive(Clone)]
pub struct TableRef(Arc<Node>);

impl TableRef {
    /// The document's own top-level table
    pub fn root() -> Self {
        TableRef(Arc::new(Node {
            parent: None,
            segment: Segment::Root,
            depth: 0,
        }))
    }

    /// Child reached through an object key
    pub fn child(&self, name: &str) -> Self {
        TableRef(Arc::new(Node {
            parent: Some(self.clone()),
            segment: Segment::Named(Arc::from(name)),
            depth: self.0.depth + 1,
        }))
    }

    /// Anonymous child for an array directly nested in the array stored at
    /// `self`. `dimension` is the nesting level of the new array (2 for an
    /// array inside an array).
    pub fn array_child(&self, dimension: u32) -> Self {
        debug_assert!(dimension >= 2, "dimension 1 arrays share their key's table");
        TableRef(Arc::new(Node {
            parent: Some(self.clone()),
            segment: Segment::ArrayDimension(dimension),
            depth: self.0.depth + 1,
        }))
    }

    pub fn is_root(&self) -> bool {
        self.0.parent.is_none()
    }

    pub fn parent(&self) -> Option<&TableRef> {
        self.0.parent.as_ref()
    }

    /// Number of levels below the root (root is 0)
    pub fn depth(&self) -> usize {
        self.0.depth
    }

    /// Whether this table is an anonymous array level
    pub fn is_in_array(&self) -> bool {
        matches!(self.0.segment, Segment::ArrayDimension(_))
    }

    /// Array nesting dimension of this level, 1 for named tables
    pub fn array_dimension(&self) -> u32 {
        match self.0.segment {
            Segment::ArrayDimension(d) => d,
            _ => 1,
        }
    }

    /// Key name, `$<dim>` for array levels, empty for the root
    pub fn name(&self) -> String {
        match &self.0.segment {
            Segment::Root => String::new(),
            Segment::Named(name) => name.to_string(),
            Segment::ArrayDimension(d) => format!("{ARRAY_DIMENSION_PREFIX}{d}"),
        }
    }

    /// Key name without allocating, `None` for array levels and the root
    pub fn key(&self) -> Option<&str> {
        match &self.0.segment {
            Segment::Named(name) => Some(name),
            _ => None,
        }
    }

    /// Nearest ancestor-or-self that is not an array level
    pub fn without_array_levels(&self) -> &TableRef {
        let mut current = self;
        while current.is_in_array() {
            match current.parent() {
                Some(parent) => current = parent,
                None => break,
            }
        }
        current
    }

    /// Name of the member under which values of this table are attached
    /// in the parent: the key of the nearest named ancestor-or-self.
    pub fn member_name(&self) -> &str {
        self.without_array_levels().key().unwrap_or("")
    }

    /// Segments from the root (excluded) down to this table
    pub fn path(&self) -> Vec<String> {
        let mut names = Vec::with_capacity(self.depth());
        let mut current = Some(self);
        while let Some(table) = current {
            if !table.is_root() {
                names.push(table.name());
            }
            current = table.parent();
        }
        names.reverse();
        names
    }

    /// Whether `self` is `other` or one of its ancestors
    pub fn is_ancestor_or_self_of(&self, other: &TableRef) -> bool {
        let mut current = Some(other);
        while let Some(table) = current {
            if table.depth() < self.depth() {
                return false;
            }
            if table == self {
                return true;
            }
            current = table.parent();
        }
        false
    }
}

impl PartialEq for TableRef {
    fn eq(&self, other: &Self) -> bool {
        if Arc::ptr_eq(&self.0, &other.0) {
            return true;
        }
        self.0.depth == other.0.depth
            && self.0.segment == other.0.segment
            && self.0.parent == other.0.parent
    }
}

impl Eq for TableRef {}

impl Hash for TableRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.depth.hash(state);
        self.0.segment.hash(state);
        if let Some(parent) = &self.0.parent {
            parent.hash(state);
        }
    }
}

impl PartialOrd for TableRef {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TableRef {
    /// Shallower tables first, then by segments from the root. Named keys
    /// sort before array levels, so `a.$2` the key and `a.$2` the level
    /// stay distinct.
    fn cmp(&self, other: &Self) -> Ordering {
        self.depth()
            .cmp(&other.depth())
            .then_with(|| self.segments().cmp(&other.segments()))
    }
}

impl TableRef {
    /// Segments from the root (included) down to this table
    fn segments(&self) -> Vec<&Segment> {
        let mut segments = Vec::with_capacity(self.depth() + 1);
        let mut current = Some(self);
        while let Some(table) = current {
            segments.push(&table.0.segment);
            current = table.parent();
        }
        segments.reverse();
        segments
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path().join("."))
    }
}

impl fmt::Debug for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TableRef({self})")
    }
}
