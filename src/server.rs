//! Stdio JSON-RPC 2.0 server, newline-delimited.
//!
//! Hosts one in-memory [`Document`] and the [`Session`] tracking proposed
//! hunks against it. A client opens a document, feeds hunk batches, asks for
//! overlays, and finally applies or rejects the batch.
//!
//! Methods:
//! - `initialize`: optional `config` object replaces the engine config
//! - `ping`
//! - `document/open`: `nodes` (tree) or `text` (one paragraph per line)
//! - `document/replace`: host-side edit `{from, to, text}`; hunks are remapped
//! - `hunks/ingest`: `{generation?, hunks: [descriptor]}`
//! - `hunks/propose`: `{generation?, newText}`; diffs against the current text
//! - `viewport/set`: `{from, to}` or `null`
//! - `overlays/render`
//! - `hunks/apply`, `hunks/reject`, `hunks/clear`

use std::io::{BufRead, Read, Write};

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, error, info, warn};

use crate::apply;
use crate::config::EngineConfig;
use crate::document::{Document, DocumentHost, DocumentSource, Node};
use crate::hunk::{DiffHunk, HunkDescriptor};
use crate::propose;
use crate::session::{Generation, Session};

/// Maximum size of a single JSON-RPC line (10 MiB).
const MAX_LINE_BYTES: usize = 10 * 1024 * 1024;

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;
/// The engine refused the request (bad range, oversized input, ...).
pub const ENGINE_ERROR: i64 = -32000;

// ---------------------------------------------------------------------------
// JSON-RPC 2.0 types
// ---------------------------------------------------------------------------

/// JSON-RPC 2.0 request.
#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

/// JSON-RPC 2.0 response.
#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

/// JSON-RPC 2.0 error object.
#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Method params
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
struct InitializeParams {
    #[serde(default)]
    config: Option<EngineConfig>,
}

#[derive(Debug, Deserialize)]
struct OpenParams {
    #[serde(default)]
    nodes: Option<Vec<Node>>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReplaceParams {
    from: usize,
    to: usize,
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct IngestParams {
    #[serde(default)]
    generation: Option<u64>,
    hunks: Vec<HunkDescriptor>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProposeParams {
    #[serde(default)]
    generation: Option<u64>,
    new_text: String,
}

#[derive(Debug, Deserialize)]
struct ViewportParams {
    from: usize,
    to: usize,
}

// ---------------------------------------------------------------------------
// Server state
// ---------------------------------------------------------------------------

/// Document plus hunk session behind the JSON-RPC surface.
#[derive(Debug, Default)]
pub struct Server {
    document: Document,
    session: Session,
}

impl Server {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            document: Document::default(),
            session: Session::new(config),
        }
    }

    pub const fn document(&self) -> &Document {
        &self.document
    }

    pub const fn session(&self) -> &Session {
        &self.session
    }

    /// Handle one request. Returns `None` for notifications.
    pub fn handle(&mut self, req: &JsonRpcRequest) -> Option<JsonRpcResponse> {
        if req.jsonrpc != "2.0" {
            warn!(version = %req.jsonrpc, "invalid JSON-RPC version (expected \"2.0\")");
            return Some(error_response(
                req.id.clone(),
                INVALID_REQUEST,
                &format!(
                    "invalid request: jsonrpc version must be \"2.0\", got \"{}\"",
                    req.jsonrpc
                ),
            ));
        }

        let outcome = self.dispatch(req);
        if req.id.is_none() {
            debug!(method = %req.method, "notification handled (no response)");
            return None;
        }
        Some(match outcome {
            Ok(result) => success_response(req.id.clone(), &result),
            Err(err) => {
                warn!(method = %req.method, code = err.code, "{}", err.message);
                JsonRpcResponse {
                    jsonrpc: "2.0".to_owned(),
                    id: req.id.clone(),
                    result: None,
                    error: Some(err),
                }
            }
        })
    }

    fn dispatch(&mut self, req: &JsonRpcRequest) -> Result<Value, JsonRpcError> {
        match req.method.as_str() {
            "initialize" => self.handle_initialize(&req.params),
            "ping" => Ok(json!({})),
            "document/open" => self.handle_open(&req.params),
            "document/replace" => self.handle_replace(&req.params),
            "hunks/ingest" => self.handle_ingest(&req.params),
            "hunks/propose" => self.handle_propose(&req.params),
            "viewport/set" => self.handle_viewport(&req.params),
            "overlays/render" => to_value(&self.session.render(&self.document)),
            "hunks/apply" => self.handle_apply(),
            "hunks/reject" => Ok(json!({ "rejected": apply::reject_all(&mut self.session) })),
            "hunks/clear" => {
                self.session.clear();
                Ok(json!({}))
            }
            _ => Err(JsonRpcError::new(
                METHOD_NOT_FOUND,
                format!("method not found: {}", req.method),
            )),
        }
    }

    // -----------------------------------------------------------------------
    // Handlers
    // -----------------------------------------------------------------------

    fn handle_initialize(&mut self, params: &Value) -> Result<Value, JsonRpcError> {
        let params: InitializeParams = parse_params(params)?;
        if let Some(config) = params.config {
            self.session.set_config(config);
        }
        Ok(json!({
            "serverInfo": {
                "name": env!("CARGO_PKG_NAME"),
                "version": env!("CARGO_PKG_VERSION"),
            },
            "config": self.session.config(),
        }))
    }

    fn handle_open(&mut self, params: &Value) -> Result<Value, JsonRpcError> {
        let params: OpenParams = parse_params(params)?;
        self.document = match (params.nodes, params.text) {
            (Some(nodes), _) => Document::new(nodes),
            (None, Some(text)) => Document::from_text(&text),
            (None, None) => {
                return Err(JsonRpcError::new(
                    INVALID_PARAMS,
                    "document/open needs `nodes` or `text`",
                ));
            }
        };
        self.session = Session::new(self.session.config().clone());
        info!(size = self.document.content_size(), "document opened");
        Ok(self.document_summary())
    }

    fn handle_replace(&mut self, params: &Value) -> Result<Value, JsonRpcError> {
        let params: ReplaceParams = parse_params(params)?;
        let mutation = self
            .document
            .replace_range(params.from, params.to, &params.text)
            .map_err(|e| JsonRpcError::new(ENGINE_ERROR, e.to_string()))?;
        let remap = self
            .session
            .on_document_mutation(self.document.version(), &[mutation]);
        let mut result = self.document_summary();
        result["mutation"] = to_value(&mutation)?;
        result["remap"] = to_value(&remap)?;
        Ok(result)
    }

    fn handle_ingest(&mut self, params: &Value) -> Result<Value, JsonRpcError> {
        let params: IngestParams = parse_params(params)?;
        let generation = self.generation_or_next(params.generation);
        let hunks = params.hunks.into_iter().map(DiffHunk::from).collect();
        to_value(&self.session.ingest(generation, hunks, &self.document))
    }

    fn handle_propose(&mut self, params: &Value) -> Result<Value, JsonRpcError> {
        let params: ProposeParams = parse_params(params)?;
        let descriptors = propose::derive_hunks(&self.document.text(), &params.new_text)
            .map_err(|e| JsonRpcError::new(ENGINE_ERROR, e.to_string()))?;
        let generation = self.generation_or_next(params.generation);
        let hunks = descriptors.iter().cloned().map(DiffHunk::from).collect();
        let report = self.session.ingest(generation, hunks, &self.document);
        Ok(json!({
            "hunks": to_value(&descriptors)?,
            "report": to_value(&report)?,
        }))
    }

    fn handle_viewport(&mut self, params: &Value) -> Result<Value, JsonRpcError> {
        let viewport = if params.is_null() {
            None
        } else {
            let params: ViewportParams = parse_params(params)?;
            Some(params.from..params.to.max(params.from))
        };
        self.session.set_viewport(viewport);
        Ok(json!({}))
    }

    fn handle_apply(&mut self) -> Result<Value, JsonRpcError> {
        let report = apply::apply_all(&mut self.session, &mut self.document);
        let mut result = self.document_summary();
        result["report"] = to_value(&report)?;
        Ok(result)
    }

    fn generation_or_next(&self, requested: Option<u64>) -> Generation {
        requested.map_or_else(
            || Generation(self.session.generation().map_or(1, |g| g.0 + 1)),
            Generation,
        )
    }

    fn document_summary(&self) -> Value {
        json!({
            "version": self.document.version(),
            "contentSize": self.document.content_size(),
            "text": self.document.text(),
        })
    }
}

/// Deserialize method params; a missing `params` member reads as `{}`.
fn parse_params<T: DeserializeOwned>(params: &Value) -> Result<T, JsonRpcError> {
    let params = if params.is_null() { json!({}) } else { params.clone() };
    serde_json::from_value(params)
        .map_err(|e| JsonRpcError::new(INVALID_PARAMS, format!("invalid params: {e}")))
}

fn to_value(value: &impl Serialize) -> Result<Value, JsonRpcError> {
    serde_json::to_value(value).map_err(|e| {
        error!(error = %e, "failed to serialize result");
        JsonRpcError::new(INTERNAL_ERROR, format!("internal error: {e}"))
    })
}

// ---------------------------------------------------------------------------
// Server main loop
// ---------------------------------------------------------------------------

/// Serve requests from `reader` until EOF, writing responses to `writer`.
///
/// # Errors
///
/// Returns an error if reading or writing fails fatally.
pub fn serve(server: &mut Server, reader: &mut impl BufRead, writer: &mut impl Write) -> Result<()> {
    let mut line_buf = String::new();
    loop {
        line_buf.clear();
        let bytes_read = match read_line_limited(reader, &mut line_buf, MAX_LINE_BYTES) {
            Ok(n) => n,
            Err(e) if e.is::<LineTooLong>() => {
                warn!(error = %e, "oversized request line dropped");
                write_response(writer, &error_response(None, INVALID_REQUEST, &e.to_string()))?;
                continue;
            }
            Err(e) => return Err(e.context("failed to read request")),
        };

        // EOF: client closed the stream.
        if bytes_read == 0 {
            info!("input closed, shutting down");
            break;
        }

        let trimmed = line_buf.trim();
        if trimmed.is_empty() {
            continue;
        }
        debug!(raw = trimmed, "received request");

        let request: JsonRpcRequest = match serde_json::from_str(trimmed) {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "invalid JSON-RPC request");
                let resp = error_response(None, PARSE_ERROR, &format!("parse error: {e}"));
                write_response(writer, &resp)?;
                continue;
            }
        };

        if let Some(resp) = server.handle(&request) {
            write_response(writer, &resp)?;
        }
    }
    Ok(())
}

/// Run the server on stdin/stdout.
///
/// # Errors
///
/// Returns an error if stdin/stdout I/O fails fatally.
pub fn run_stdio_server(config: EngineConfig) -> Result<()> {
    info!("docdiff server starting");
    let mut server = Server::new(config);
    let stdin = std::io::stdin();
    let mut reader = std::io::BufReader::new(stdin.lock());
    let mut stdout = std::io::stdout().lock();
    serve(&mut server, &mut reader, &mut stdout)?;
    info!("docdiff server stopped");
    Ok(())
}

// ---------------------------------------------------------------------------
// Response helpers
// ---------------------------------------------------------------------------

fn success_response(id: Option<Value>, result: &impl Serialize) -> JsonRpcResponse {
    match serde_json::to_value(result) {
        Ok(v) => JsonRpcResponse {
            jsonrpc: "2.0".to_owned(),
            id,
            result: Some(v),
            error: None,
        },
        Err(e) => {
            error!(error = %e, "failed to serialize success response");
            error_response(
                id,
                INTERNAL_ERROR,
                &format!("internal error: failed to serialize result: {e}"),
            )
        }
    }
}

fn error_response(id: Option<Value>, code: i64, message: &str) -> JsonRpcResponse {
    JsonRpcResponse {
        jsonrpc: "2.0".to_owned(),
        id,
        result: None,
        error: Some(JsonRpcError::new(code, message)),
    }
}

/// Write a JSON-RPC response as a single line.
fn write_response(out: &mut impl Write, resp: &JsonRpcResponse) -> Result<()> {
    let json = serde_json::to_string(resp).context("failed to serialize response")?;
    debug!(response = %json, "sending response");
    out.write_all(json.as_bytes())
        .context("failed to write response")?;
    out.write_all(b"\n").context("failed to write newline")?;
    out.flush().context("failed to flush output")?;
    Ok(())
}

/// A request line went over the size cap.
#[derive(Debug, thiserror::Error)]
#[error("line exceeds maximum size ({0} bytes)")]
struct LineTooLong(usize);

/// Append one line (newline included) from `reader` to `buf`.
///
/// Returns the bytes read, `0` at EOF. A line longer than `max_bytes` is
/// consumed through its newline and reported as [`LineTooLong`].
fn read_line_limited(reader: &mut impl BufRead, buf: &mut String, max_bytes: usize) -> Result<usize> {
    let mut bytes = Vec::new();
    let limit = u64::try_from(max_bytes).unwrap_or(u64::MAX).saturating_add(1);
    let read = (&mut *reader)
        .take(limit)
        .read_until(b'\n', &mut bytes)
        .context("failed to read line")?;
    if read > max_bytes {
        if bytes.last() != Some(&b'\n') {
            reader
                .skip_until(b'\n')
                .context("failed to skip oversized line")?;
        }
        return Err(LineTooLong(max_bytes).into());
    }
    buf.push_str(std::str::from_utf8(&bytes).context("non-UTF-8 input")?);
    Ok(read)
}
