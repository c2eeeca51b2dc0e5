//! `docdiff`: locate, preview and apply proposed edits in a rich-text document.
//!
//! A proposer (usually a language model) describes changes as hunks: the
//! original snippet, its replacement, optional surrounding context and line
//! hints. The engine finds where each snippet lives in the document tree,
//! scores how sure it is, renders strike/insert overlays for review, and
//! applies or discards the batch on confirmation.
//!
//! # Pipeline
//!
//! ```text
//! Document tree ─→ Projection (flat text + position maps)
//!                        │
//! hunks ─→ Session ─→ locate (strategy chain) ─→ score
//!             │
//!             ├─→ overlay::render  (preview)
//!             └─→ apply_all / reject_all (commit)
//! ```
//!
//! The same engine is exposed over stdio JSON-RPC by [`run_stdio_server`].

pub mod apply;
pub mod config;
pub mod document;
pub mod error;
pub mod hunk;
pub mod locate;
pub mod overlay;
pub mod propose;
pub mod score;
pub mod server;
pub mod session;

pub use apply::{ApplyReport, apply_all, reject_all};
pub use config::EngineConfig;
pub use document::{Document, DocumentHost, DocumentSource, Mutation, Node, Projection};
pub use error::{DiffError, DiffResult};
pub use hunk::{DiffHunk, HunkDescriptor};
pub use locate::locate;
pub use overlay::{Overlay, RenderOutput};
pub use propose::derive_hunks;
pub use server::run_stdio_server;
pub use session::{Generation, Session};
