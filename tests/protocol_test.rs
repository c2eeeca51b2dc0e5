//! JSON-RPC protocol integration tests.
//!
//! Drives the server through `serve` with in-memory pipes, the same way a
//! host would talk to it over stdio.

use std::io::Cursor;

use docdiff::EngineConfig;
use docdiff::server::{self, JsonRpcRequest, Server};
use serde_json::{Value, json};

/// Send `requests` (one per line) and return every response line parsed.
fn exchange(server: &mut Server, requests: &[Value]) -> Vec<Value> {
    let input: String = requests.iter().map(|r| format!("{r}\n")).collect();
    let mut reader = Cursor::new(input.into_bytes());
    let mut output = Vec::new();
    server::serve(server, &mut reader, &mut output).expect("serve should succeed");
    String::from_utf8(output)
        .expect("utf-8 output")
        .lines()
        .map(|line| serde_json::from_str(line).expect("response is JSON"))
        .collect()
}

fn call(server: &mut Server, id: u64, method: &str, params: Value) -> Value {
    let req: JsonRpcRequest = serde_json::from_value(json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": method,
        "params": params,
    }))
    .expect("request parses");
    let resp = server.handle(&req).expect("request with id gets a response");
    serde_json::to_value(&resp).expect("response serializes")
}

fn cat_hunk() -> Value {
    json!({
        "diff_id": "h1",
        "diff_type": "Edit",
        "original_code": "cat",
        "new_code": "dog",
        "context_before": "The ",
    })
}

#[test]
fn test_request_parsing_defaults_params() {
    let req: JsonRpcRequest =
        serde_json::from_value(json!({"jsonrpc": "2.0", "id": 7, "method": "ping"}))
            .expect("should parse request without params");
    assert_eq!(req.method, "ping");
    assert_eq!(req.id, Some(json!(7)));
    assert!(req.params.is_null());
}

#[test]
fn test_error_response_skips_result() {
    let resp = server::JsonRpcResponse {
        jsonrpc: "2.0".to_owned(),
        id: Some(json!(2)),
        result: None,
        error: Some(server::JsonRpcError {
            code: server::METHOD_NOT_FOUND,
            message: "method not found".to_owned(),
            data: None,
        }),
    };
    let json_str = serde_json::to_string(&resp).expect("should serialize");
    assert!(json_str.contains("-32601"));
    assert!(!json_str.contains("result"));
}

#[test]
fn test_full_preview_and_apply_cycle() {
    let mut server = Server::new(EngineConfig::default());
    let responses = exchange(
        &mut server,
        &[
            json!({"jsonrpc": "2.0", "id": 1, "method": "initialize"}),
            json!({"jsonrpc": "2.0", "id": 2, "method": "document/open",
                   "params": {"text": "The cat sat on the mat."}}),
            json!({"jsonrpc": "2.0", "id": 3, "method": "hunks/ingest",
                   "params": {"hunks": [cat_hunk()]}}),
            json!({"jsonrpc": "2.0", "id": 4, "method": "overlays/render"}),
            json!({"jsonrpc": "2.0", "id": 5, "method": "hunks/apply"}),
        ],
    );
    assert_eq!(responses.len(), 5);
    assert_eq!(responses[0]["result"]["serverInfo"]["name"], "docdiff");
    assert_eq!(responses[1]["result"]["contentSize"], 25);

    let ingest = &responses[2]["result"];
    assert_eq!(ingest["generation"], 1);
    assert_eq!(ingest["located"], 1);
    assert_eq!(ingest["stale"], false);

    let overlays = responses[3]["result"]["overlays"]
        .as_array()
        .expect("overlays array");
    let strike = overlays
        .iter()
        .find(|o| o["type"] == "strike")
        .expect("strike overlay");
    assert_eq!(strike["hunkId"], "h1");
    assert_eq!(strike["range"], json!({"start": 5, "end": 8}));
    let insertion = overlays
        .iter()
        .find(|o| o["type"] == "insertion")
        .expect("insertion overlay");
    assert_eq!(insertion["text"], "dog");
    assert_eq!(insertion["placement"], "inline");

    let applied = &responses[4]["result"];
    assert_eq!(applied["text"], "The dog sat on the mat.");
    assert_eq!(applied["version"], 1);
    assert_eq!(applied["report"]["applied"], json!(["h1"]));
}

#[test]
fn test_host_edit_remaps_located_hunk() {
    let mut server = Server::new(EngineConfig::default());
    call(&mut server, 1, "document/open", json!({"text": "alpha beta gamma delta"}));
    call(
        &mut server,
        2,
        "hunks/ingest",
        json!({"generation": 3, "hunks": [{
            "diff_id": "g",
            "diff_type": "Edit",
            "original_code": "gamma",
            "new_code": "G",
            "context_before": "beta ",
        }]}),
    );
    let replaced = call(
        &mut server,
        3,
        "document/replace",
        json!({"from": 1, "to": 1, "text": "X "}),
    );
    assert_eq!(replaced["result"]["remap"]["remapped"], 1);
    assert_eq!(replaced["result"]["text"], "X alpha beta gamma delta");

    let rendered = call(&mut server, 4, "overlays/render", Value::Null);
    let strike = rendered["result"]["overlays"]
        .as_array()
        .expect("overlays")
        .iter()
        .find(|o| o["type"] == "strike")
        .cloned()
        .expect("strike");
    assert_eq!(strike["range"], json!({"start": 14, "end": 19}));
}

#[test]
fn test_propose_then_reject() {
    let mut server = Server::new(EngineConfig::default());
    call(&mut server, 1, "document/open", json!({"text": "The cat sat on the mat."}));
    let proposed = call(
        &mut server,
        2,
        "hunks/propose",
        json!({"newText": "The dog sat on the mat."}),
    );
    assert_eq!(proposed["result"]["report"]["located"], 1);
    assert_eq!(proposed["result"]["hunks"][0]["original_code"], "cat");

    let rejected = call(&mut server, 3, "hunks/reject", Value::Null);
    assert_eq!(rejected["result"]["rejected"].as_array().map(Vec::len), Some(1));
    assert_eq!(server.document().text(), "The cat sat on the mat.");
    assert!(server.session().hunks().is_empty());

    // Same generation again is stale; omitting it moves to the next one.
    let stale = call(&mut server, 4, "hunks/ingest", json!({"generation": 1, "hunks": [cat_hunk()]}));
    assert_eq!(stale["result"]["stale"], true);
    let fresh = call(&mut server, 5, "hunks/ingest", json!({"hunks": [cat_hunk()]}));
    assert_eq!(fresh["result"]["generation"], 2);
    assert_eq!(fresh["result"]["located"], 1);
}

#[test]
fn test_unlocatable_hunk_reported_without_overlay() {
    let mut server = Server::new(EngineConfig::default());
    call(&mut server, 1, "document/open", json!({"text": "The cat sat on the mat."}));
    let ingest = call(
        &mut server,
        2,
        "hunks/ingest",
        json!({"hunks": [{
            "diff_id": "e",
            "diff_type": "Edit",
            "original_code": "elephant",
            "new_code": "mouse",
        }]}),
    );
    assert_eq!(ingest["result"]["located"], 0);
    assert_eq!(ingest["result"]["unlocated"][0]["hunkId"], "e");

    let rendered = call(&mut server, 3, "overlays/render", Value::Null);
    assert_eq!(rendered["result"]["overlays"], json!([]));
    assert_eq!(rendered["result"]["unlocated"], 1);
}

#[test]
fn test_protocol_errors() {
    let mut server = Server::new(EngineConfig::default());
    let responses = exchange(
        &mut server,
        &[
            json!({"jsonrpc": "1.0", "id": 1, "method": "ping"}),
            json!({"jsonrpc": "2.0", "id": 2, "method": "no/such"}),
            json!({"jsonrpc": "2.0", "id": 3, "method": "document/open", "params": {}}),
            json!({"jsonrpc": "2.0", "id": 4, "method": "document/replace",
                   "params": {"from": 5, "to": 99, "text": ""}}),
            // Notification: handled, never answered.
            json!({"jsonrpc": "2.0", "method": "ping"}),
        ],
    );
    assert_eq!(responses.len(), 4);
    assert_eq!(responses[0]["error"]["code"], server::INVALID_REQUEST);
    assert_eq!(responses[1]["error"]["code"], server::METHOD_NOT_FOUND);
    assert_eq!(responses[2]["error"]["code"], server::INVALID_PARAMS);
    assert_eq!(responses[3]["error"]["code"], server::ENGINE_ERROR);
}

#[test]
fn test_malformed_line_gets_parse_error() {
    let mut server = Server::new(EngineConfig::default());
    let mut reader = Cursor::new(b"{not json\n\n".to_vec());
    let mut output = Vec::new();
    server::serve(&mut server, &mut reader, &mut output).expect("serve");
    let resp: Value = serde_json::from_slice(output.trim_ascii()).expect("one response");
    assert_eq!(resp["error"]["code"], server::PARSE_ERROR);
}
