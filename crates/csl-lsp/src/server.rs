//! The language-server loop and request handlers.
//!
//! One synchronous loop: read a framed message, dispatch, write any
//! responses, block on the next read. Document recomputation happens
//! inside the `didOpen`/`didChange` handlers, so every query observes
//! the latest text with no races and no background work.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::{BufRead, Write};

use lsp_types::DiagnosticSeverity;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use csl_docgen::to_html_doc;
use csl_format::{compute_edits, quote_identifier, schemas_to_csl};
use csl_parse::parse;
use csl_repr::{Ast, CslType, DefRef, Primitive, Region, TypeId};
use csl_tokenizer::{lex, Diagnostic, Position, TokenKind};

use crate::documents::DocumentData;
use crate::framing::{read_message, write_message, LineEnding};
use crate::semantic_tokens::{encode_tokens, TOKEN_TYPES};
use crate::uri::normalize_uri;

const KEYWORD_COMPLETIONS: [&str; 12] = [
    "config",
    "constraints",
    "requires",
    "conflicts",
    "with",
    "validate",
    "exists",
    "count_keys",
    "all_keys",
    "wildcard_keys",
    "subset",
    "*",
];

const TYPE_COMPLETIONS: [&str; 7] = [
    "any{}", "any[]", "string", "number", "boolean", "datetime", "duration",
];

/// Protocol lifecycle, kept in a single state value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    /// Nothing received yet.
    Start,
    /// `initialize` handled, waiting for `initialized`.
    ServerInitialized,
    /// Fully operational.
    Ready,
    /// `shutdown` received; only `exit` is acceptable.
    ShuttingDown,
    /// `exit` received. `clean` when shutdown came first.
    Exited { clean: bool },
}

enum HandlerError {
    MethodNotFound,
    Internal(String),
}

impl From<String> for HandlerError {
    fn from(message: String) -> Self {
        HandlerError::Internal(message)
    }
}

impl From<&str> for HandlerError {
    fn from(message: &str) -> Self {
        HandlerError::Internal(message.to_string())
    }
}

type HandlerResult = Result<Option<Value>, HandlerError>;

type ResponseCallback = Box<dyn FnMut(&Value)>;

/// A language server bound to a duplex byte channel.
pub struct LanguageServer<R, W> {
    reader: R,
    writer: W,
    line_ending: Option<LineEnding>,
    state: Lifecycle,
    trace_value: String,
    multiline_token_support: bool,
    next_request_id: u64,
    response_callbacks: HashMap<String, ResponseCallback>,
    documents: HashMap<String, DocumentData>,
}

impl<R: BufRead, W: Write> LanguageServer<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader,
            writer,
            line_ending: None,
            state: Lifecycle::Start,
            trace_value: String::new(),
            multiline_token_support: false,
            next_request_id: 0,
            response_callbacks: HashMap::new(),
            documents: HashMap::new(),
        }
    }

    /// Run until `exit` or end of input. Returns the process exit code:
    /// 0 after an orderly shutdown, 1 otherwise.
    pub fn run(mut self) -> i32 {
        info!("language server started");
        loop {
            let message = match read_message(&mut self.reader, &mut self.line_ending) {
                Ok(Some(message)) => message,
                Ok(None) => return self.final_exit_code(),
                Err(err) => {
                    warn!("read error on input channel: {}", err);
                    return self.final_exit_code();
                }
            };

            match serde_json::from_str::<Value>(&message) {
                Err(err) => {
                    let response =
                        gen_error(Value::Null, -32700, &format!("Parse error: {}", err));
                    self.send(&response);
                }
                Ok(msg) => {
                    if is_response(&msg) {
                        self.dispatch_response(&msg);
                    } else {
                        let response = self.handle_request(&msg);
                        if !response.is_null() {
                            self.send(&response);
                        }
                    }
                }
            }

            if let Lifecycle::Exited { clean } = self.state {
                return i32::from(!clean);
            }
        }
    }

    fn final_exit_code(&self) -> i32 {
        match self.state {
            Lifecycle::Exited { clean: true } => 0,
            _ => 1,
        }
    }

    // ---- wire helpers ---------------------------------------------------

    fn send(&mut self, message: &Value) {
        let content = message.to_string();
        if let Err(err) = write_message(&mut self.writer, self.line_ending, &content) {
            warn!("write error on output channel: {}", err);
        }
    }

    fn send_notification(&mut self, method: &str, params: Value) {
        let notification = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
        });
        self.send(&notification);
    }

    /// Send a server→client request; `callback` fires on the matching
    /// response and is then dropped.
    pub fn send_request<F>(&mut self, method: &str, params: Value, callback: F)
    where
        F: FnMut(&Value) + 'static,
    {
        let id = self.next_request_id;
        self.next_request_id += 1;
        let request = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        self.send(&request);
        self.response_callbacks
            .insert(id.to_string(), Box::new(callback));
    }

    fn dispatch_response(&mut self, response: &Value) {
        let Some(id) = response.get("id") else { return };
        let key = id_to_string(id);
        if let Some(mut callback) = self.response_callbacks.remove(&key) {
            callback(response);
        }
    }

    // ---- dispatch -------------------------------------------------------

    fn handle_request(&mut self, request: &Value) -> Value {
        let id = request.get("id").cloned().unwrap_or(Value::Null);
        let Some(method) = request.get("method").and_then(|m| m.as_str()) else {
            return gen_error(id, -32603, "Request has no method");
        };
        let method = method.to_string();
        let params = request.get("params").cloned().unwrap_or(Value::Null);
        debug!(method = method.as_str(), "handling request");

        let outcome = self.route(&method, &params);
        match outcome {
            Ok(Some(result)) => gen_response(&id, result),
            Ok(None) => Value::Null,
            Err(HandlerError::MethodNotFound) => gen_error(id, -32601, "Method not found"),
            Err(HandlerError::Internal(message)) => gen_error(id, -32603, &message),
        }
    }

    fn route(&mut self, method: &str, params: &Value) -> HandlerResult {
        if method == "initialize" {
            return self.handle_initialize(params);
        }
        if self.state == Lifecycle::Start {
            return Err("Server not initialized".into());
        }
        if method == "initialized" {
            return self.handle_initialized();
        }
        if self.state == Lifecycle::ServerInitialized {
            return Err("Client not initialized".into());
        }
        if self.state == Lifecycle::ShuttingDown && method != "exit" {
            return Err("Server already shutdown".into());
        }

        match method {
            "exit" => self.handle_exit(),
            "shutdown" => self.handle_shutdown(),
            "textDocument/didOpen" => self.handle_did_open(params),
            "textDocument/didChange" => self.handle_did_change(params),
            "textDocument/didClose" => self.handle_did_close(params),
            "$/setTrace" => self.handle_set_trace(params),
            "textDocument/references" => self.handle_references(params),
            "textDocument/rename" => self.handle_rename(params),
            "textDocument/foldingRange" => self.handle_folding_range(params),
            "textDocument/semanticTokens/full" => self.handle_semantic_tokens(params),
            "textDocument/formatting" => self.handle_formatting(params),
            "textDocument/definition" => self.handle_definition(params),
            "textDocument/completion" => self.handle_completion(params),
            "textDocument/hover" => self.handle_hover(params),
            "textDocument/diagnostic" => self.handle_pull_diagnostic(params),
            "csl/generateHtmlDoc" => self.handle_generate_html_doc(params),
            _ => Err(HandlerError::MethodNotFound),
        }
    }

    // ---- lifecycle ------------------------------------------------------

    fn handle_initialize(&mut self, params: &Value) -> HandlerResult {
        if self.state != Lifecycle::Start {
            return Err("Initialize request may only be sent once".into());
        }
        self.state = Lifecycle::ServerInitialized;
        self.trace_value = params
            .get("trace")
            .and_then(|t| t.as_str())
            .unwrap_or_default()
            .to_string();
        self.multiline_token_support = params
            .pointer("/capabilities/textDocument/semanticTokens/multilineTokenSupport")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);

        Ok(Some(json!({
            "capabilities": {
                "textDocumentSync": 1,
                "referencesProvider": true,
                "renameProvider": true,
                "foldingRangeProvider": true,
                "semanticTokensProvider": {
                    "legend": {
                        "tokenTypes": TOKEN_TYPES,
                        "tokenModifiers": [],
                    },
                    "full": true,
                },
                "documentFormattingProvider": true,
                "definitionProvider": true,
                "completionProvider": {
                    "triggerCharacters": [".", "-", "c", "s", "n", "b", "d", "a", "w", "r", "v", "e"],
                    "allCommitCharacters": [".", "=", " ", "\"", "'", "]", "}"],
                },
                "hoverProvider": true,
                "diagnosticProvider": {
                    "interFileDependencies": true,
                    "workspaceDiagnostics": false,
                },
            },
            "serverInfo": {
                "name": "csl-langsvr",
                "version": env!("CARGO_PKG_VERSION"),
            },
        })))
    }

    fn handle_initialized(&mut self) -> HandlerResult {
        if self.state != Lifecycle::ServerInitialized {
            return Err("Initialized request may only be sent once".into());
        }
        self.state = Lifecycle::Ready;
        info!("client initialized");
        Ok(None)
    }

    fn handle_shutdown(&mut self) -> HandlerResult {
        self.state = Lifecycle::ShuttingDown;
        Ok(Some(Value::Null))
    }

    fn handle_exit(&mut self) -> HandlerResult {
        let clean = self.state == Lifecycle::ShuttingDown;
        self.state = Lifecycle::Exited { clean };
        Ok(None)
    }

    // ---- document sync --------------------------------------------------

    fn handle_did_open(&mut self, params: &Value) -> HandlerResult {
        let uri = text_document_uri(params)?;
        let text = params
            .pointer("/textDocument/text")
            .and_then(|t| t.as_str())
            .ok_or("didOpen without text")?
            .to_string();
        self.recompute_document(&uri, &text);
        self.publish_diagnostics(&uri);
        Ok(None)
    }

    fn handle_did_change(&mut self, params: &Value) -> HandlerResult {
        let uri = text_document_uri(params)?;
        let changes = params
            .pointer("/contentChanges")
            .and_then(|c| c.as_array())
            .ok_or("didChange without contentChanges")?;
        if let Some(text) = changes.last().and_then(|c| c.get("text")).and_then(|t| t.as_str()) {
            let text = text.to_string();
            self.recompute_document(&uri, &text);
            self.publish_diagnostics(&uri);
        }
        Ok(None)
    }

    fn handle_did_close(&mut self, params: &Value) -> HandlerResult {
        let uri = text_document_uri(params)?;
        self.documents.remove(&normalize_uri(&uri));
        Ok(None)
    }

    fn handle_set_trace(&mut self, params: &Value) -> HandlerResult {
        if let Some(value) = params.get("value").and_then(|v| v.as_str()) {
            self.trace_value = value.to_string();
            debug!(trace = self.trace_value.as_str(), "trace value updated");
        }
        Ok(None)
    }

    fn recompute_document(&mut self, uri: &str, text: &str) {
        let data = DocumentData::compute(text, self.multiline_token_support);
        self.documents.insert(normalize_uri(uri), data);
    }

    fn doc(&self, uri: &str) -> Result<&DocumentData, HandlerError> {
        self.documents
            .get(&normalize_uri(uri))
            .ok_or_else(|| "Document not found".into())
    }

    // ---- diagnostics ----------------------------------------------------

    fn diagnostics_for(doc: &DocumentData) -> Vec<Value> {
        let mut items = Vec::new();
        let errors = doc.lex_errors.iter().chain(doc.parse_errors.iter());
        let warnings = doc.lex_warnings.iter().chain(doc.parse_warnings.iter());
        for diagnostic in errors {
            items.push(diagnostic_json(diagnostic, DiagnosticSeverity::ERROR));
        }
        for diagnostic in warnings {
            items.push(diagnostic_json(diagnostic, DiagnosticSeverity::WARNING));
        }
        items
    }

    fn publish_diagnostics(&mut self, uri: &str) {
        let Ok(doc) = self.doc(uri) else { return };
        let diagnostics = Self::diagnostics_for(doc);
        self.send_notification(
            "textDocument/publishDiagnostics",
            json!({ "uri": uri, "diagnostics": diagnostics }),
        );
    }

    fn handle_pull_diagnostic(&mut self, params: &Value) -> HandlerResult {
        let uri = text_document_uri(params)?;
        let doc = self.doc(&uri)?;
        Ok(Some(json!({
            "kind": "full",
            "items": Self::diagnostics_for(doc),
        })))
    }

    // ---- highlighting and formatting ------------------------------------

    fn handle_semantic_tokens(&mut self, params: &Value) -> HandlerResult {
        let uri = text_document_uri(params)?;
        let doc = self.doc(&uri)?;
        let data = encode_tokens(&doc.tokens_with_comment);
        Ok(Some(json!({ "data": data })))
    }

    fn handle_formatting(&mut self, params: &Value) -> HandlerResult {
        let uri = text_document_uri(params)?;
        let doc = self.doc(&uri)?;
        let formatted = schemas_to_csl(&doc.ast);
        let edits = compute_edits(&doc.text, &formatted);
        if edits.is_empty() {
            return Ok(Some(json!({})));
        }
        let edits: Vec<Value> = edits
            .iter()
            .map(|edit| {
                json!({
                    "range": range_json(edit.range),
                    "newText": edit.new_text,
                })
            })
            .collect();
        Ok(Some(Value::Array(edits)))
    }

    // ---- navigation -----------------------------------------------------

    fn handle_definition(&mut self, params: &Value) -> HandlerResult {
        let uri = text_document_uri(params)?;
        let position = position_param(params)?;
        let doc = self.doc(&uri)?;

        let mut definition = json!({});
        for (index, token) in doc.tokens_no_comment.iter().enumerate() {
            if !token.range.contains(position) {
                continue;
            }
            if let Some(def) = doc.definitions.get(&index) {
                let region = doc.ast.def_name_region(*def);
                definition = json!({ "uri": uri, "range": range_json(region) });
            }
        }
        Ok(Some(definition))
    }

    /// Collect every (definition, token region) pair plus the definition
    /// under the cursor, shared by references and rename.
    fn collect_references(
        doc: &DocumentData,
        position: Position,
    ) -> (HashMap<DefRef, Vec<Region>>, Option<DefRef>) {
        let mut references: HashMap<DefRef, Vec<Region>> = HashMap::new();
        let mut target = None;
        for (index, token) in doc.tokens_no_comment.iter().enumerate() {
            let Some(def) = doc.definitions.get(&index) else {
                continue;
            };
            references.entry(*def).or_default().push(token.range);
            if token.range.contains(position) {
                target = Some(*def);
            }
        }
        (references, target)
    }

    fn handle_references(&mut self, params: &Value) -> HandlerResult {
        let uri = text_document_uri(params)?;
        let position = position_param(params)?;
        let include_declaration = params
            .pointer("/context/includeDeclaration")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        let doc = self.doc(&uri)?;

        let (references, target) = Self::collect_references(doc, position);
        let mut items = Vec::new();
        if let Some(target) = target {
            let declaration = doc.ast.def_name_region(target);
            for region in references.get(&target).into_iter().flatten() {
                if !include_declaration && *region == declaration {
                    continue;
                }
                items.push(json!({ "uri": uri, "range": range_json(*region) }));
            }
        }
        Ok(Some(Value::Array(items)))
    }

    fn handle_rename(&mut self, params: &Value) -> HandlerResult {
        let uri = text_document_uri(params)?;
        let position = position_param(params)?;
        let new_name = params
            .get("newName")
            .and_then(|n| n.as_str())
            .ok_or("rename without newName")?;
        let new_name = quote_identifier(new_name);
        let doc = self.doc(&uri)?;

        let (references, target) = Self::collect_references(doc, position);
        let Some(target) = target else {
            return Ok(Some(json!({})));
        };
        let edits: Vec<Value> = references
            .get(&target)
            .into_iter()
            .flatten()
            .map(|region| json!({ "range": range_json(*region), "newText": new_name }))
            .collect();
        let mut changes = serde_json::Map::new();
        changes.insert(uri, Value::Array(edits));
        Ok(Some(json!({ "changes": changes })))
    }

    fn handle_folding_range(&mut self, params: &Value) -> HandlerResult {
        let uri = text_document_uri(params)?;
        let doc = self.doc(&uri)?;
        let mut ranges = Vec::new();

        // Brace pairs, LIFO
        let mut brace_stack: Vec<Position> = Vec::new();
        for token in &doc.tokens_no_comment {
            if token.value == "{" {
                brace_stack.push(token.range.start);
            } else if token.value == "}" {
                if let Some(start) = brace_stack.pop() {
                    let end = token.range.end;
                    if start.line == end.line {
                        continue;
                    }
                    ranges.push(json!({
                        "startLine": start.line,
                        "startCharacter": start.column,
                        "endLine": end.line,
                        "endCharacter": end.column,
                        "kind": "region",
                    }));
                }
            }
        }

        // Runs of adjacent comment tokens
        let tokens = doc.tokens_with_comment.tokens();
        let mut i = 0;
        while i < tokens.len() {
            if tokens[i].kind != TokenKind::Comment {
                i += 1;
                continue;
            }
            let start = tokens[i].range.start;
            let mut end = tokens[i].range.end;
            let mut j = i + 1;
            while j < tokens.len() && tokens[j].kind == TokenKind::Comment {
                end = tokens[j].range.end;
                j += 1;
            }
            if start.line != end.line {
                ranges.push(json!({
                    "startLine": start.line,
                    "startCharacter": start.column,
                    "endLine": end.line,
                    "endCharacter": end.column,
                    "kind": "comment",
                }));
            }
            i = j;
        }

        Ok(Some(Value::Array(ranges)))
    }

    // ---- hover ----------------------------------------------------------

    fn handle_hover(&mut self, params: &Value) -> HandlerResult {
        let uri = text_document_uri(params)?;
        let position = position_param(params)?;
        let doc = self.doc(&uri)?;

        let mut hover = json!({});
        for (index, token) in doc.tokens_no_comment.iter().enumerate() {
            if !token.range.contains(position) {
                continue;
            }
            let Some(def) = doc.definitions.get(&index) else {
                continue;
            };
            let markdown = match def {
                DefRef::Schema(id) => {
                    let schema = doc.ast.schema(*id);
                    format!(
                        "## **Schema** {}\n- **Defined At**: ln {}, col {}",
                        schema.name,
                        schema.region.start.line + 1,
                        schema.region.start.column + 1
                    )
                }
                DefRef::Key(id) => key_hover_markdown(&doc.ast, *id),
            };
            hover = json!({
                "contents": { "kind": "markdown", "value": markdown },
                "range": range_json(token.range),
            });
        }
        Ok(Some(hover))
    }

    // ---- completion -----------------------------------------------------

    fn handle_completion(&mut self, params: &Value) -> HandlerResult {
        let uri = text_document_uri(params)?;
        let position = position_param(params)?;
        let doc = self.doc(&uri)?;

        let mut items: Vec<Value> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let tokens = doc.tokens_no_comment.tokens();

        for (index, token) in tokens.iter().enumerate() {
            if token.range.contains(position) {
                if token.value == "." && index > 0 {
                    // Dotted access: complete against the previous
                    // token's resolved table keys.
                    if let Some(DefRef::Key(key)) = doc.definitions.get(&(index - 1)) {
                        let ty = doc.ast.key(*key).ty;
                        if let CslType::Table(table) = doc.ast.ty(ty) {
                            for &key_id in &table.explicit_keys {
                                push_key_completion(&doc.ast, key_id, &mut items, &mut seen);
                            }
                        }
                    }
                } else {
                    self.table_and_builtin_completions(
                        doc,
                        position,
                        &token.value,
                        &mut items,
                        &mut seen,
                    );
                }
            } else if token.range.end < position
                && tokens
                    .get(index + 1)
                    .map_or(true, |next| next.range.start > position)
            {
                self.table_and_builtin_completions(
                    doc,
                    position,
                    &token.value,
                    &mut items,
                    &mut seen,
                );
            }
        }

        if items.is_empty() {
            Ok(Some(json!({})))
        } else {
            Ok(Some(json!({ "isIncomplete": false, "items": items })))
        }
    }

    fn table_and_builtin_completions(
        &self,
        doc: &DocumentData,
        position: Position,
        filter: &str,
        items: &mut Vec<Value>,
        seen: &mut HashSet<String>,
    ) {
        if let Some(table_id) = find_deepest_table_at(&doc.ast, position) {
            if let CslType::Table(table) = doc.ast.ty(table_id) {
                for &key_id in &table.explicit_keys {
                    if matches_filter(&doc.ast.key(key_id).name, filter) {
                        push_key_completion(&doc.ast, key_id, items, seen);
                    }
                }
            }
        }
        for keyword in KEYWORD_COMPLETIONS {
            if matches_filter(keyword, filter) && seen.insert(keyword.to_string()) {
                items.push(completion_item(keyword, 14, "Keyword", keyword));
            }
        }
        for type_name in TYPE_COMPLETIONS {
            if matches_filter(type_name, filter) && seen.insert(type_name.to_string()) {
                items.push(completion_item(type_name, 25, "Built-in type", type_name));
            }
        }
    }

    // ---- documentation --------------------------------------------------

    fn handle_generate_html_doc(&mut self, params: &Value) -> HandlerResult {
        let uri = params
            .pointer("/textDocument/uri")
            .and_then(|u| u.as_str())
            .ok_or("generateHtmlDoc without uri")?;
        let text = params
            .pointer("/textDocument/text")
            .and_then(|t| t.as_str());
        let reuse_existing = params
            .get("reuseExisting")
            .and_then(|r| r.as_bool());
        let cached = self.documents.get(&normalize_uri(uri));

        let files: BTreeMap<String, String> = match text {
            Some(text) if reuse_existing != Some(true) => match cached {
                Some(doc) if doc.text == text => to_html_doc(&doc.ast),
                _ => {
                    let lexed = lex(text, false);
                    let parsed = parse(&lexed.tokens);
                    to_html_doc(&parsed.ast)
                }
            },
            _ => {
                let doc = cached.ok_or_else(|| HandlerError::from("Document not found"))?;
                to_html_doc(&doc.ast)
            }
        };

        let mut result = serde_json::Map::new();
        for (path, content) in files {
            result.insert(path, Value::String(content));
        }
        Ok(Some(Value::Object(result)))
    }
}

// ---- free helpers -------------------------------------------------------

fn is_response(message: &Value) -> bool {
    message.get("jsonrpc").and_then(|v| v.as_str()) == Some("2.0")
        && (message.get("result").is_some() || message.get("error").is_some())
}

fn id_to_string(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    }
}

fn gen_response(id: &Value, result: Value) -> Value {
    json!({ "jsonrpc": "2.0", "id": id, "result": result })
}

fn gen_error(id: Value, code: i64, message: &str) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": { "code": code, "message": message },
    })
}

fn text_document_uri(params: &Value) -> Result<String, HandlerError> {
    params
        .pointer("/textDocument/uri")
        .and_then(|u| u.as_str())
        .map(str::to_string)
        .ok_or_else(|| "Request has no textDocument.uri".into())
}

fn position_param(params: &Value) -> Result<Position, HandlerError> {
    let line = params
        .pointer("/position/line")
        .and_then(|v| v.as_u64())
        .ok_or("Request has no position")?;
    let character = params
        .pointer("/position/character")
        .and_then(|v| v.as_u64())
        .ok_or("Request has no position")?;
    Ok(Position::new(line as u32, character as u32))
}

fn range_json(region: Region) -> Value {
    json!({
        "start": { "line": region.start.line, "character": region.start.column },
        "end": { "line": region.end.line, "character": region.end.column },
    })
}

fn lsp_range(region: Region) -> lsp_types::Range {
    lsp_types::Range {
        start: lsp_types::Position {
            line: region.start.line,
            character: region.start.column,
        },
        end: lsp_types::Position {
            line: region.end.line,
            character: region.end.column,
        },
    }
}

fn diagnostic_json(diagnostic: &Diagnostic, severity: DiagnosticSeverity) -> Value {
    let item = lsp_types::Diagnostic {
        range: lsp_range(diagnostic.region),
        severity: Some(severity),
        code: None,
        code_description: None,
        source: Some("csl".to_string()),
        message: diagnostic.message.clone(),
        related_information: None,
        tags: None,
        data: None,
    };
    serde_json::to_value(item).unwrap_or(Value::Null)
}

fn completion_item(label: &str, kind: u32, detail: &str, insert_text: &str) -> Value {
    json!({
        "label": label,
        "kind": kind,
        "detail": detail,
        "insertText": insert_text,
    })
}

fn push_key_completion(
    ast: &Ast,
    key_id: csl_repr::KeyId,
    items: &mut Vec<Value>,
    seen: &mut HashSet<String>,
) {
    let key = ast.key(key_id);
    if !seen.insert(key.name.clone()) {
        return;
    }
    let detail = if key.is_optional {
        "Optional key in schema"
    } else {
        "Mandatory key in schema"
    };
    items.push(completion_item(
        &key.name,
        6,
        detail,
        &quote_identifier(&key.name),
    ));
}

/// Case-insensitive prefix filter; a non-identifier filter (punctuation,
/// whitespace) matches everything.
fn matches_filter(label: &str, filter: &str) -> bool {
    let Some(first) = filter.chars().next() else {
        return true;
    };
    if !(first.is_ascii_alphanumeric() || first == '_') {
        return true;
    }
    label.to_lowercase().starts_with(&filter.to_lowercase())
}

/// Deepest table type whose region contains `position`, across schemas.
/// Ties between schemas resolve to the narrower region.
fn find_deepest_table_at(ast: &Ast, position: Position) -> Option<TypeId> {
    fn descend(ast: &Ast, ty: TypeId, position: Position) -> Option<TypeId> {
        let node = ast.ty(ty);
        if !node.region().contains(position) {
            return None;
        }
        match node {
            CslType::Table(table) => {
                let mut deepest = ty;
                for &key in &table.explicit_keys {
                    if let Some(candidate) = descend(ast, ast.key(key).ty, position) {
                        deepest = candidate;
                    }
                }
                if let Some(wildcard) = table.wildcard_key {
                    if let Some(candidate) = descend(ast, ast.key(wildcard).ty, position) {
                        deepest = candidate;
                    }
                }
                Some(deepest)
            }
            CslType::Array { element, .. } => descend(ast, *element, position),
            CslType::Union { members, .. } => {
                let mut found = None;
                for &member in members {
                    if let Some(candidate) = descend(ast, member, position) {
                        found = Some(candidate);
                    }
                }
                found
            }
            _ => None,
        }
    }

    let mut best: Option<TypeId> = None;
    for (_, schema) in ast.schemas() {
        let Some(candidate) = descend(ast, schema.root, position) else {
            continue;
        };
        best = match best {
            None => Some(candidate),
            Some(current) => {
                let current_region = ast.ty(current).region();
                let candidate_region = ast.ty(candidate).region();
                let current_span = (current_region.line_span(), current_region.col_span());
                let candidate_span = (candidate_region.line_span(), candidate_region.col_span());
                if candidate_span < current_span {
                    Some(candidate)
                } else {
                    Some(current)
                }
            }
        };
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::io::Cursor;
    use std::rc::Rc;

    #[test]
    fn test_request_response_correlation() {
        let mut server = LanguageServer::new(Cursor::new(Vec::new()), Vec::new());

        let seen: Rc<RefCell<Option<Value>>> = Rc::new(RefCell::new(None));
        let sink = Rc::clone(&seen);
        server.send_request("workspace/configuration", json!({ "items": [] }), move |resp| {
            *sink.borrow_mut() = Some(resp.clone());
        });

        // an unrelated response is ignored
        server.dispatch_response(&json!({ "jsonrpc": "2.0", "id": 99, "result": {} }));
        assert!(seen.borrow().is_none());

        // the matching id fires the callback exactly once
        let response = json!({ "jsonrpc": "2.0", "id": 0, "result": [{ "x": 1 }] });
        server.dispatch_response(&response);
        assert_eq!(seen.borrow().as_ref().unwrap()["result"][0]["x"], 1);

        *seen.borrow_mut() = None;
        server.dispatch_response(&response);
        assert!(seen.borrow().is_none(), "callback must be removed after use");
    }

    #[test]
    fn test_outbound_request_ids_increment() {
        let mut server = LanguageServer::new(Cursor::new(Vec::new()), Vec::new());
        server.send_request("a", Value::Null, |_| {});
        server.send_request("b", Value::Null, |_| {});
        assert_eq!(server.next_request_id, 2);
        assert!(server.response_callbacks.contains_key("0"));
        assert!(server.response_callbacks.contains_key("1"));
    }
}

fn key_hover_markdown(ast: &Ast, key_id: csl_repr::KeyId) -> String {
    let key = ast.key(key_id);
    let type_label = match ast.ty(key.ty) {
        CslType::Primitive(p) => match p.primitive {
            Primitive::String => "String",
            Primitive::Number => "Number",
            Primitive::Boolean => "Boolean",
            Primitive::Datetime => "Datetime",
            Primitive::Duration => "Duration",
        },
        CslType::Table(_) => "Table",
        CslType::Array { .. } => "Array",
        CslType::Union { .. } => "Union",
        CslType::AnyTable { .. } => "Any Table",
        CslType::AnyArray { .. } => "Any Array",
        CslType::Invalid { .. } => "Value",
    };

    let mut markdown = String::from("## ");
    if key.is_wildcard {
        markdown.push_str(&format!("Wildcard **{}**\n", type_label));
    } else {
        markdown.push_str(&format!("**{}** {}\n", type_label, key.name));
    }
    if key.is_optional {
        markdown.push_str("- **Optional** key\n");
    }
    if let CslType::Table(table) = ast.ty(key.ty) {
        let names: Vec<&str> = table
            .explicit_keys
            .iter()
            .map(|&k| ast.key(k).name.as_str())
            .collect();
        if !names.is_empty() {
            markdown.push_str(&format!("- **Keys**: {}\n", names.join(", ")));
        }
    }
    markdown.push_str(&format!(
        "- **Defined At**: ln {}, col {}\n",
        key.name_region.start.line + 1,
        key.name_region.start.column + 1
    ));
    if let Some((default, _)) = &key.default_value {
        markdown.push_str(&format!("- **Default Value**: {}", default));
    }
    markdown
}
