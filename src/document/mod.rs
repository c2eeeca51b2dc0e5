//! Structured document model and the host-side interface the engine consumes.
//!
//! Positions follow a token model: a [`Node::Block`] or [`Node::CodeBlock`]
//! occupies an open token, its content, and a close token; text counts UTF-16
//! code units; tables and images are atoms of size 1. Position `0` is before
//! the first top-level node.
//!
//! The engine only reads documents through [`DocumentSource`] and only writes
//! through [`DocumentHost::replace_range`]. [`Document`] is the in-memory
//! reference host.

pub mod projection;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{DiffError, DiffResult};

pub use projection::{BlockSpan, ElementSpan, Projection};

/// Kind of a [`Node::Block`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BlockKind {
    Paragraph,
    Heading(u8),
    ListItem,
    Quote,
}

/// A document tree node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Node {
    /// A block holding either inline text runs (a text block) or nested blocks.
    Block {
        kind: BlockKind,
        #[serde(default)]
        children: Vec<Node>,
    },
    /// An inline text run with formatting marks.
    Text {
        text: String,
        #[serde(default)]
        marks: Vec<String>,
    },
    Table {
        rows: Vec<Vec<String>>,
    },
    Image {
        src: String,
        #[serde(default)]
        alt: Option<String>,
    },
    CodeBlock {
        #[serde(default)]
        language: Option<String>,
        code: String,
    },
}

/// Coarse node classification used by projections and structural matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NodeKind {
    Paragraph,
    Heading,
    ListItem,
    Quote,
    Text,
    Table,
    Image,
    CodeBlock,
}

impl Node {
    pub fn paragraph(text: &str) -> Self {
        Self::textblock(BlockKind::Paragraph, text)
    }

    pub fn heading(level: u8, text: &str) -> Self {
        Self::textblock(BlockKind::Heading(level), text)
    }

    pub fn text(text: &str) -> Self {
        Self::Text {
            text: text.to_owned(),
            marks: Vec::new(),
        }
    }

    pub fn code_block(language: Option<&str>, code: &str) -> Self {
        Self::CodeBlock {
            language: language.map(str::to_owned),
            code: code.to_owned(),
        }
    }

    pub fn table(rows: &[&[&str]]) -> Self {
        Self::Table {
            rows: rows
                .iter()
                .map(|row| row.iter().map(|cell| (*cell).to_owned()).collect())
                .collect(),
        }
    }

    pub fn image(src: &str, alt: Option<&str>) -> Self {
        Self::Image {
            src: src.to_owned(),
            alt: alt.map(str::to_owned),
        }
    }

    fn textblock(kind: BlockKind, text: &str) -> Self {
        let children = if text.is_empty() {
            Vec::new()
        } else {
            vec![Self::text(text)]
        };
        Self::Block { kind, children }
    }

    /// Number of positions this node occupies.
    pub fn size(&self) -> usize {
        match self {
            Self::Block { children, .. } => 2 + children.iter().map(Self::size).sum::<usize>(),
            Self::Text { text, .. } => utf16_len(text),
            Self::Table { .. } | Self::Image { .. } => 1,
            Self::CodeBlock { code, .. } => 2 + utf16_len(code),
        }
    }

    /// Whether this node directly holds text (and therefore accepts splices).
    pub fn is_textblock(&self) -> bool {
        match self {
            Self::Block { children, .. } => children.iter().all(|c| matches!(c, Self::Text { .. })),
            Self::CodeBlock { .. } => true,
            _ => false,
        }
    }

    pub const fn kind(&self) -> NodeKind {
        match self {
            Self::Block { kind, .. } => match kind {
                BlockKind::Paragraph => NodeKind::Paragraph,
                BlockKind::Heading(_) => NodeKind::Heading,
                BlockKind::ListItem => NodeKind::ListItem,
                BlockKind::Quote => NodeKind::Quote,
            },
            Self::Text { .. } => NodeKind::Text,
            Self::Table { .. } => NodeKind::Table,
            Self::Image { .. } => NodeKind::Image,
            Self::CodeBlock { .. } => NodeKind::CodeBlock,
        }
    }

    /// Plain text content, used for element signatures.
    pub fn plain_text(&self) -> String {
        match self {
            Self::Block { children, .. } => children
                .iter()
                .map(Self::plain_text)
                .collect::<Vec<_>>()
                .join("\n"),
            Self::Text { text, .. } => text.clone(),
            Self::Table { rows } => rows
                .iter()
                .map(|row| row.join("\t"))
                .collect::<Vec<_>>()
                .join("\n"),
            Self::Image { src, alt } => match alt {
                Some(alt) => format!("{alt} {src}"),
                None => src.clone(),
            },
            Self::CodeBlock { code, .. } => code.clone(),
        }
    }
}

/// Length of `s` in UTF-16 code units.
pub fn utf16_len(s: &str) -> usize {
    s.chars().map(char::len_utf16).sum()
}

/// Byte index in `s` after `units` UTF-16 code units.
///
/// A unit count that falls inside a surrogate pair rounds up to the end of
/// that character.
pub fn utf16_to_byte(s: &str, units: usize) -> usize {
    let mut acc = 0;
    for (idx, ch) in s.char_indices() {
        if acc >= units {
            return idx;
        }
        acc += ch.len_utf16();
    }
    s.len()
}

/// One position-translation delta: `[from, to)` was replaced by `inserted` positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mutation {
    pub from: usize,
    pub to: usize,
    pub inserted: usize,
}

impl Mutation {
    pub const fn insertion(at: usize, len: usize) -> Self {
        Self {
            from: at,
            to: at,
            inserted: len,
        }
    }

    pub const fn deletion(from: usize, to: usize) -> Self {
        Self {
            from,
            to,
            inserted: 0,
        }
    }

    /// Net change in document size.
    pub const fn delta(&self) -> isize {
        self.inserted as isize - (self.to - self.from) as isize
    }
}

/// Read access to a hosted document.
pub trait DocumentSource {
    /// Top-level nodes.
    fn nodes(&self) -> &[Node];

    /// Monotonic counter bumped by every mutation.
    fn version(&self) -> u64;

    /// Total number of positions in the document.
    fn content_size(&self) -> usize {
        self.nodes().iter().map(Node::size).sum()
    }

    /// Projected text between two document positions.
    fn text_between(&self, from: usize, to: usize) -> String {
        Projection::new(self)
            .text_for_doc_range(from..to.max(from))
            .to_owned()
    }
}

/// A document that accepts mutations.
pub trait DocumentHost: DocumentSource {
    /// Replace `[from, to)` with `text`, returning the applied delta.
    fn replace_range(&mut self, from: usize, to: usize, text: &str) -> DiffResult<Mutation>;
}

/// In-memory document tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    nodes: Vec<Node>,
    #[serde(default)]
    version: u64,
}

impl Document {
    pub const fn new(nodes: Vec<Node>) -> Self {
        Self { nodes, version: 0 }
    }

    /// Build a document with one paragraph per line of `text`.
    pub fn from_text(text: &str) -> Self {
        Self::new(paragraphs(text, BlockKind::Paragraph))
    }

    /// Projected text of the whole document.
    pub fn text(&self) -> String {
        Projection::new(self).text().to_owned()
    }

    fn splice_textblocks(
        &mut self,
        start: &TextblockRef,
        end: &TextblockRef,
        text: &str,
    ) -> DiffResult<()> {
        let parent_path = &start.path[..start.path.len() - 1];
        if parent_path != &end.path[..end.path.len() - 1] {
            return Err(DiffError::UnsupportedMutation(
                "range spans text blocks with different parents".to_owned(),
            ));
        }
        let first = start.path[start.path.len() - 1];
        let last = end.path[end.path.len() - 1];
        let siblings = children_at_mut(&mut self.nodes, parent_path)?;

        let replacement = match (&siblings[first], &siblings[last]) {
            (Node::CodeBlock { language, code }, Node::CodeBlock { .. }) if first == last => {
                let head = utf16_to_byte(code, start.offset);
                let tail = utf16_to_byte(code, end.offset);
                let mut spliced = String::with_capacity(code.len() + text.len());
                spliced.push_str(&code[..head]);
                spliced.push_str(text);
                spliced.push_str(&code[tail..]);
                vec![Node::CodeBlock {
                    language: language.clone(),
                    code: spliced,
                }]
            }
            (
                Node::Block {
                    kind,
                    children: head_runs,
                },
                Node::Block {
                    children: tail_runs,
                    ..
                },
            ) => join_runs(*kind, head_runs, start.offset, tail_runs, end.offset, text),
            _ => {
                return Err(DiffError::UnsupportedMutation(
                    "range mixes code blocks with other blocks".to_owned(),
                ));
            }
        };
        siblings.splice(first..=last, replacement);
        Ok(())
    }
}

impl DocumentSource for Document {
    fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    fn version(&self) -> u64 {
        self.version
    }
}

impl DocumentHost for Document {
    fn replace_range(&mut self, from: usize, to: usize, text: &str) -> DiffResult<Mutation> {
        let size = self.content_size();
        if from > to || to > size {
            return Err(DiffError::InvalidRange { from, to, size });
        }

        if from == 0 && to == size {
            self.nodes = paragraphs(text, BlockKind::Paragraph);
        } else if let Some((parent, first, last)) = boundary_range(&self.nodes, from, to) {
            let siblings = children_at_mut(&mut self.nodes, &parent)?;
            let replacement = if text.is_empty() {
                Vec::new()
            } else {
                paragraphs(text, BlockKind::Paragraph)
            };
            siblings.splice(first..last, replacement);
        } else {
            let start = find_textblock(&self.nodes, from).ok_or(DiffError::InvalidRange {
                from,
                to: from,
                size,
            })?;
            let end = find_textblock(&self.nodes, to).ok_or(DiffError::InvalidRange {
                from: to,
                to,
                size,
            })?;
            self.splice_textblocks(&start, &end, text)?;
        }

        let new_size = self.content_size();
        self.version += 1;
        let mutation = Mutation {
            from,
            to,
            inserted: (new_size + (to - from)).saturating_sub(size),
        };
        debug!(?mutation, version = self.version, "document mutated");
        Ok(mutation)
    }
}

/// A position resolved inside a text block.
#[derive(Debug)]
struct TextblockRef {
    /// Child indices from the document root to the text block.
    path: Vec<usize>,
    /// Offset of the position within the text block's content.
    offset: usize,
}

fn find_textblock(nodes: &[Node], pos: usize) -> Option<TextblockRef> {
    let mut path = Vec::new();
    let offset = descend_textblock(nodes, 0, pos, &mut path)?;
    Some(TextblockRef { path, offset })
}

fn descend_textblock(nodes: &[Node], base: usize, pos: usize, path: &mut Vec<usize>) -> Option<usize> {
    let mut offset = base;
    for (idx, node) in nodes.iter().enumerate() {
        let size = node.size();
        if node.is_textblock() {
            let content_start = offset + 1;
            let content_end = offset + size - 1;
            if (content_start..=content_end).contains(&pos) {
                path.push(idx);
                return Some(pos - content_start);
            }
        } else if let Node::Block { children, .. } = node {
            if offset < pos && pos < offset + size {
                path.push(idx);
                return descend_textblock(children, offset + 1, pos, path);
            }
        }
        offset += size;
    }
    None
}

/// Resolve `[from, to)` to a run of whole sibling nodes `(parent path, first, end)`.
fn boundary_range(nodes: &[Node], from: usize, to: usize) -> Option<(Vec<usize>, usize, usize)> {
    let mut path = Vec::new();
    let mut level = nodes;
    let mut base = 0;
    loop {
        let mut boundaries = Vec::with_capacity(level.len() + 1);
        let mut offset = base;
        boundaries.push(offset);
        for node in level {
            offset += node.size();
            boundaries.push(offset);
        }
        let first = boundaries.iter().position(|&b| b == from);
        let last = boundaries.iter().position(|&b| b == to);
        if let (Some(first), Some(last)) = (first, last) {
            return (first <= last).then_some((path, first, last));
        }

        // Descend into the container that encloses both positions, if any.
        let mut offset = base;
        let mut next = None;
        for (idx, node) in level.iter().enumerate() {
            let size = node.size();
            if let Node::Block { children, .. } = node {
                if !node.is_textblock() && offset < from && to < offset + size {
                    next = Some((idx, children.as_slice(), offset + 1));
                    break;
                }
            }
            offset += size;
        }
        let (idx, children, child_base) = next?;
        path.push(idx);
        level = children;
        base = child_base;
    }
}

fn children_at_mut<'a>(nodes: &'a mut Vec<Node>, path: &[usize]) -> DiffResult<&'a mut Vec<Node>> {
    let mut level = nodes;
    for &idx in path {
        match level.get_mut(idx) {
            Some(Node::Block { children, .. }) => level = children,
            _ => {
                return Err(DiffError::UnsupportedMutation(
                    "path does not lead to a container".to_owned(),
                ));
            }
        }
    }
    Ok(level)
}

/// Build blocks for `text`, one per line, all of `kind`.
fn paragraphs(text: &str, kind: BlockKind) -> Vec<Node> {
    text.split('\n')
        .map(|line| Node::textblock(kind, line))
        .collect()
}

/// Join the head of one text block, `text`, and the tail of another.
///
/// Newlines in `text` split the result into several blocks of `kind`.
fn join_runs(
    kind: BlockKind,
    head_runs: &[Node],
    head_offset: usize,
    tail_runs: &[Node],
    tail_offset: usize,
    text: &str,
) -> Vec<Node> {
    let head = slice_runs(head_runs, 0, head_offset);
    let tail = slice_runs(tail_runs, tail_offset, usize::MAX);
    let marks = marks_at(head_runs, head_offset);

    let lines: Vec<&str> = text.split('\n').collect();
    let last_line = lines.len() - 1;
    let mut blocks = Vec::with_capacity(lines.len());
    for (idx, line) in lines.iter().enumerate() {
        let mut runs = if idx == 0 { head.clone() } else { Vec::new() };
        if !line.is_empty() {
            runs.push(Node::Text {
                text: (*line).to_owned(),
                marks: marks.clone(),
            });
        }
        if idx == last_line {
            runs.extend(tail.iter().cloned());
        }
        blocks.push(Node::Block {
            kind,
            children: merge_runs(runs),
        });
    }
    blocks
}

/// The part of `runs` between UTF-16 offsets `[from, to)`.
fn slice_runs(runs: &[Node], from: usize, to: usize) -> Vec<Node> {
    let mut out = Vec::new();
    let mut offset = 0;
    for run in runs {
        let Node::Text { text, marks } = run else {
            continue;
        };
        let len = utf16_len(text);
        let start = from.saturating_sub(offset).min(len);
        let end = to.saturating_sub(offset).min(len);
        if start < end {
            let head = utf16_to_byte(text, start);
            let tail = utf16_to_byte(text, end);
            out.push(Node::Text {
                text: text[head..tail].to_owned(),
                marks: marks.clone(),
            });
        }
        offset += len;
    }
    out
}

/// Marks of the run a splice at `offset` extends.
fn marks_at(runs: &[Node], offset: usize) -> Vec<String> {
    let mut acc = 0;
    let mut current = Vec::new();
    for run in runs {
        if let Node::Text { text, marks } = run {
            current.clone_from(marks);
            acc += utf16_len(text);
            if offset <= acc {
                break;
            }
        }
    }
    current
}

fn merge_runs(runs: Vec<Node>) -> Vec<Node> {
    let mut merged: Vec<Node> = Vec::with_capacity(runs.len());
    for run in runs {
        if let Node::Text { text, marks } = &run {
            if text.is_empty() {
                continue;
            }
            if let Some(Node::Text {
                text: prev_text,
                marks: prev_marks,
            }) = merged.last_mut()
            {
                if prev_marks == marks {
                    prev_text.push_str(text);
                    continue;
                }
            }
        }
        merged.push(run);
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bold(text: &str) -> Node {
        Node::Text {
            text: text.to_owned(),
            marks: vec!["bold".to_owned()],
        }
    }

    #[test]
    fn test_sizes() {
        assert_eq!(Node::paragraph("abc").size(), 5);
        assert_eq!(Node::paragraph("").size(), 2);
        assert_eq!(Node::image("a.png", None).size(), 1);
        assert_eq!(Node::code_block(None, "x\ny").size(), 5);
        // Non-BMP characters take two positions.
        assert_eq!(Node::paragraph("😀").size(), 4);
    }

    #[test]
    fn test_text_between_crosses_blocks() {
        let doc = Document::from_text("first line\nsecond line");
        assert_eq!(doc.text_between(1, 11), "first line");
        assert_eq!(doc.text_between(7, 17), "line\nseco");
        assert_eq!(doc.text_between(5, 5), "");
    }

    #[test]
    fn test_replace_within_paragraph() {
        let mut doc = Document::from_text("The cat sat on the mat.");
        let mutation = doc.replace_range(5, 8, "dog").expect("replace");
        assert_eq!(mutation, Mutation { from: 5, to: 8, inserted: 3 });
        assert_eq!(doc.text(), "The dog sat on the mat.");
        assert_eq!(doc.version(), 1);
    }

    #[test]
    fn test_replace_across_paragraphs_joins() {
        let mut doc = Document::from_text("first line\nsecond line");
        // "line\nsecond " spans from pos 7 (in first) to pos 20 (in second).
        let mutation = doc.replace_range(7, 20, "").expect("replace");
        assert_eq!(doc.text(), "first line");
        assert_eq!(mutation.delta(), -13);
        assert_eq!(doc.content_size(), 12);
    }

    #[test]
    fn test_inserted_newline_splits_paragraph() {
        let mut doc = Document::from_text("ab");
        let mutation = doc.replace_range(2, 2, "x\ny").expect("insert");
        assert_eq!(doc.text(), "ax\nyb");
        assert_eq!(doc.nodes().len(), 2);
        assert_eq!(mutation.inserted, 4);
    }

    #[test]
    fn test_code_block_keeps_newlines() {
        let mut doc = Document::new(vec![Node::code_block(Some("rust"), "let a = 1;")]);
        doc.replace_range(9, 10, "2;\nlet b = 3").expect("replace");
        assert_eq!(doc.nodes().len(), 1);
        assert_eq!(doc.nodes()[0].plain_text(), "let a = 2;\nlet b = 3;");
    }

    #[test]
    fn test_marks_survive_splice() {
        let mut doc = Document::new(vec![Node::Block {
            kind: BlockKind::Paragraph,
            children: vec![Node::text("plain "), bold("bold")],
        }]);
        doc.replace_range(9, 11, "LD").expect("replace");
        let Node::Block { children, .. } = &doc.nodes()[0] else {
            panic!("expected block");
        };
        assert_eq!(children, &vec![Node::text("plain "), bold("boLD")]);
    }

    #[test]
    fn test_atom_replacement() {
        let mut doc = Document::new(vec![
            Node::paragraph("before"),
            Node::table(&[&["a", "b"]]),
            Node::paragraph("after"),
        ]);
        let mutation = doc.replace_range(8, 9, "").expect("delete table");
        assert_eq!(mutation, Mutation::deletion(8, 9));
        assert_eq!(doc.nodes().len(), 2);
    }

    #[test]
    fn test_whole_document_replace() {
        let mut doc = Document::from_text("one\ntwo");
        let size = doc.content_size();
        let mutation = doc.replace_range(0, size, "three").expect("replace");
        assert_eq!(doc.text(), "three");
        assert_eq!(mutation.inserted, 7);
    }

    #[test]
    fn test_invalid_range() {
        let mut doc = Document::from_text("abc");
        assert!(matches!(
            doc.replace_range(2, 99, "x"),
            Err(DiffError::InvalidRange { .. })
        ));
        assert_eq!(doc.version(), 0);
    }

    #[test]
    fn test_utf16_to_byte_rounds_up_inside_pair() {
        let s = "a😀b";
        assert_eq!(utf16_to_byte(s, 1), 1);
        assert_eq!(utf16_to_byte(s, 2), 5);
        assert_eq!(utf16_to_byte(s, 3), 5);
        assert_eq!(utf16_to_byte(s, 4), 6);
    }
}
