//! Breadcrumbs for traversal errors.
//!
//! Pack and unpack maintain a segment stack while they walk a graph, and an
//! error raised mid-traversal renders the stack into its message, e.g.
//! `root._args[1].tracks[0]`.

use core::fmt;

// -----------------------------------------------------------------------------
// Segment

/// One step of a traversal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Segment {
    /// A sequence position.
    Index(usize),
    /// A mapping key.
    Key(String),
    /// A constructor argument position.
    Arg(usize),
}

// -----------------------------------------------------------------------------
// PathStack

/// The path from the document root to the node currently being visited.
#[derive(Clone, Debug, Default)]
pub struct PathStack {
    segments: Vec<Segment>,
}

impl PathStack {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn push(&mut self, segment: Segment) {
        self.segments.push(segment);
    }

    #[inline]
    pub fn pop(&mut self) {
        self.segments.pop();
    }

    #[inline]
    pub fn clear(&mut self) {
        self.segments.clear();
    }

    /// Renders the current position, rooted at `root`.
    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for PathStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("root")?;
        for segment in &self.segments {
            match segment {
                Segment::Index(position) => write!(f, "[{position}]")?,
                Segment::Key(key) => write!(f, ".{key}")?,
                Segment::Arg(position) => write!(f, "._args[{position}]")?,
            }
        }
        Ok(())
    }
}
