//! Flattened text view of a document with a bidirectional position map.
//!
//! Matching runs on a flat string; the document is a tree. The projection
//! emits the text of every text block and code block, a `'\n'` between sibling
//! blocks, and U+FFFC for each table or image atom. Two dense vectors map
//! projection byte offsets to document positions and back, so both lookups
//! are O(1).

use std::ops::Range;

use serde::Serialize;

use super::{DocumentSource, Node, NodeKind};

/// Character emitted for table and image atoms.
pub const OBJECT_REPLACEMENT: char = '\u{FFFC}';

/// A top-level block and where it lands in both coordinate spaces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockSpan {
    pub kind: NodeKind,
    /// Byte range of the block's projected content (separators excluded).
    pub bytes: Range<usize>,
    /// Document range of the whole node, tokens included.
    pub doc: Range<usize>,
}

/// A table, image or code block found anywhere in the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementSpan {
    pub kind: NodeKind,
    pub bytes: Range<usize>,
    pub doc: Range<usize>,
    pub node: Node,
}

/// Flattened text plus position map. Recomputed after every mutation, never
/// updated in place.
#[derive(Debug, Clone)]
pub struct Projection {
    text: String,
    byte_to_doc: Vec<usize>,
    doc_to_byte: Vec<usize>,
    blocks: Vec<BlockSpan>,
    elements: Vec<ElementSpan>,
    extent: Range<usize>,
}

struct Builder {
    text: String,
    byte_to_doc: Vec<usize>,
    doc_to_byte: Vec<Option<usize>>,
    blocks: Vec<BlockSpan>,
    elements: Vec<ElementSpan>,
    first_content: Option<usize>,
    last_content_end: usize,
}

impl Builder {
    fn push_char(&mut self, ch: char, pos: usize) {
        let byte = self.text.len();
        self.text.push(ch);
        for _ in 0..ch.len_utf8() {
            self.byte_to_doc.push(pos);
        }
        if self.doc_to_byte[pos].is_none() {
            self.doc_to_byte[pos] = Some(byte);
        }
        // The low surrogate position rounds up to the end of the character.
        if ch.len_utf16() == 2 && self.doc_to_byte[pos + 1].is_none() {
            self.doc_to_byte[pos + 1] = Some(self.text.len());
        }
        self.first_content.get_or_insert(pos);
    }

    fn push_text(&mut self, text: &str, mut pos: usize) -> usize {
        for ch in text.chars() {
            self.push_char(ch, pos);
            pos += ch.len_utf16();
        }
        pos
    }

    fn push_separator(&mut self) {
        let byte = self.text.len();
        let pos = self.last_content_end;
        self.text.push('\n');
        self.byte_to_doc.push(pos);
        if self.doc_to_byte[pos].is_none() {
            self.doc_to_byte[pos] = Some(byte);
        }
    }

    fn walk_blocks(&mut self, nodes: &[Node], base: usize, top_level: bool) {
        let mut offset = base;
        for (idx, node) in nodes.iter().enumerate() {
            if idx > 0 {
                self.push_separator();
            }
            let size = node.size();
            let start_byte = self.text.len();
            match node {
                Node::Block { children, .. } if node.is_textblock() => {
                    let mut pos = offset + 1;
                    self.first_content.get_or_insert(pos);
                    for child in children {
                        if let Node::Text { text, .. } = child {
                            pos = self.push_text(text, pos);
                        }
                    }
                    self.last_content_end = pos;
                }
                Node::Block { children, .. } => self.walk_blocks(children, offset + 1, false),
                Node::Text { text, .. } => {
                    // Stray inline text at block level is projected as-is.
                    self.last_content_end = self.push_text(text, offset);
                }
                Node::CodeBlock { code, .. } => {
                    self.first_content.get_or_insert(offset + 1);
                    self.last_content_end = self.push_text(code, offset + 1);
                }
                Node::Table { .. } | Node::Image { .. } => {
                    self.push_char(OBJECT_REPLACEMENT, offset);
                    self.last_content_end = offset + 1;
                }
            }
            let bytes = start_byte..self.text.len();
            let doc = offset..offset + size;
            if matches!(
                node,
                Node::Table { .. } | Node::Image { .. } | Node::CodeBlock { .. }
            ) {
                self.elements.push(ElementSpan {
                    kind: node.kind(),
                    bytes: bytes.clone(),
                    doc: doc.clone(),
                    node: node.clone(),
                });
            }
            if top_level {
                self.blocks.push(BlockSpan {
                    kind: node.kind(),
                    bytes,
                    doc,
                });
            }
            offset += size;
        }
    }
}

impl Projection {
    /// Project a document.
    pub fn new(doc: &(impl DocumentSource + ?Sized)) -> Self {
        let size = doc.content_size();
        let mut builder = Builder {
            text: String::new(),
            byte_to_doc: Vec::new(),
            doc_to_byte: vec![None; size + 1],
            blocks: Vec::new(),
            elements: Vec::new(),
            first_content: None,
            last_content_end: 0,
        };
        builder.walk_blocks(doc.nodes(), 0, true);

        let Builder {
            text,
            mut byte_to_doc,
            doc_to_byte,
            blocks,
            elements,
            first_content,
            last_content_end,
        } = builder;

        byte_to_doc.push(last_content_end);

        // Positions that carry no character (tokens, content ends) map to
        // the next projected byte.
        let mut dense = vec![text.len(); size + 1];
        let mut next = text.len();
        for pos in (0..=size).rev() {
            if let Some(byte) = doc_to_byte[pos] {
                next = byte;
            }
            dense[pos] = next;
        }

        let extent = first_content.unwrap_or(0).min(last_content_end)..last_content_end;

        Self {
            text,
            byte_to_doc,
            doc_to_byte: dense,
            blocks,
            elements,
            extent,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Length of the projected text in characters.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }

    /// Document position of a projection byte offset (clamped to the text).
    pub fn to_document_position(&self, offset: usize) -> usize {
        self.byte_to_doc[offset.min(self.text.len())]
    }

    /// Projection byte offset of a document position (clamped to the document).
    pub fn to_projection_offset(&self, pos: usize) -> usize {
        self.doc_to_byte[pos.min(self.doc_to_byte.len() - 1)]
    }

    pub fn to_document_range(&self, bytes: Range<usize>) -> Range<usize> {
        self.to_document_position(bytes.start)..self.to_document_position(bytes.end)
    }

    pub fn to_projection_range(&self, doc: Range<usize>) -> Range<usize> {
        self.to_projection_offset(doc.start)..self.to_projection_offset(doc.end)
    }

    /// Projected text covering a document range.
    pub fn text_for_doc_range(&self, doc: Range<usize>) -> &str {
        let bytes = self.to_projection_range(doc);
        self.text.get(bytes.start..bytes.end.max(bytes.start)).unwrap_or("")
    }

    /// Document range spanned by the projected text.
    pub fn extent(&self) -> Range<usize> {
        self.extent.clone()
    }

    /// Total number of document positions covered by the map.
    pub fn content_size(&self) -> usize {
        self.doc_to_byte.len() - 1
    }

    pub fn blocks(&self) -> &[BlockSpan] {
        &self.blocks
    }

    pub fn elements(&self) -> &[ElementSpan] {
        &self.elements
    }
}
