//! Session lifecycle
//!
//! `SessionController` owns everything with a process lifetime: the session
//! state, the log sink, the table registry and the builtin symbol index. It
//! handles one inbound message at a time and queues its replies on the
//! outbound [`Client`].

use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::error::ProtocolError;
use crate::infra::logging::{FileLogSink, LogSink, LoggerOptions, bootstrap_logger};
use crate::infra::lsp::capabilities::negotiate;
use crate::infra::lsp::client::Client;
use crate::infra::lsp::protocol::{
    InitializeParams, InitializeResult, Message, MessageType, Notification, Request, RequestId,
    ResponseError, ServerCapabilities, ServerInfo, SetTraceParams, TraceValue, error_codes,
    methods,
};
use crate::infra::parser::{FaultHandler, ParseFault};
use crate::models::config::VlsConfig;
use crate::models::lsp::path_to_uri;
use crate::models::symbol::SymbolIndex;
use crate::services::indexer::{BuiltinIndexer, IndexReport};
use crate::services::tables::TableRegistry;

pub const SERVER_NAME: &str = "vls";

pub const PRERELEASE_NOTICE: &str = "VLS is a work in progress, pre-alpha language server. \
    It may not be guaranteed to work reliably due to memory issues and other related factors. \
    We encourage you to submit an issue if you encounter any problems.";

/// Lifecycle of the session. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum SessionState {
    #[default]
    Uninitialized,
    Initialized,
    Shutdown,
    Exited,
}

pub struct SessionController {
    config: VlsConfig,
    state: SessionState,
    client: Client,
    logger: Box<dyn LogSink>,
    tables: TableRegistry,
    indexer: BuiltinIndexer,
    index: SymbolIndex,
    builtin_names: Vec<String>,
    index_report: Option<IndexReport>,
    capabilities: Option<ServerCapabilities>,
    trace: TraceValue,
    root_uri: Option<String>,
    warned: bool,
}

impl SessionController {
    pub fn new(config: VlsConfig) -> Self {
        let indexer = BuiltinIndexer::from_config(&config);
        Self::with_parts(config, Box::new(FileLogSink::new()), indexer)
    }

    pub fn with_parts(config: VlsConfig, logger: Box<dyn LogSink>, indexer: BuiltinIndexer) -> Self {
        Self {
            config,
            state: SessionState::Uninitialized,
            client: Client::new(),
            logger,
            tables: TableRegistry::new(),
            indexer,
            index: SymbolIndex::new(),
            builtin_names: Vec::new(),
            index_report: None,
            capabilities: None,
            trace: TraceValue::Off,
            root_uri: None,
            warned: false,
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn symbol_index(&self) -> &SymbolIndex {
        &self.index
    }

    pub fn builtin_names(&self) -> &[String] {
        &self.builtin_names
    }

    pub fn tables(&self) -> &TableRegistry {
        &self.tables
    }

    /// Capabilities sent in the `initialize` response, once initialized
    pub fn capabilities(&self) -> Option<&ServerCapabilities> {
        self.capabilities.as_ref()
    }

    pub fn index_report(&self) -> Option<&IndexReport> {
        self.index_report.as_ref()
    }

    pub fn trace(&self) -> TraceValue {
        self.trace
    }

    pub fn root_uri(&self) -> Option<&str> {
        self.root_uri.as_deref()
    }

    /// Messages queued for the client since the last call
    pub fn take_outgoing(&mut self) -> Vec<Message> {
        self.client.drain()
    }

    // ========================================================================
    // Dispatch
    // ========================================================================

    /// Handle one inbound message. Returns the exit code once `exit` arrives.
    pub fn handle_message(&mut self, message: Message) -> Option<i32> {
        if let Some(method) = message.method()
            && self.logger.is_file_backed()
        {
            self.logger.log_info(&format!("<- {method}"));
        }

        match message {
            Message::Request(request) => {
                self.handle_request(request);
                None
            }
            Message::Notification(notification) => self.handle_notification(notification),
            Message::Response(response) => {
                tracing::debug!("Ignoring client response {:?}", response.id);
                None
            }
        }
    }

    fn handle_request(&mut self, request: Request) {
        let Request {
            id, method, params, ..
        } = request;

        match (method.as_str(), self.state) {
            (methods::INITIALIZE, _) => self.initialize(id, params),
            (methods::SHUTDOWN, _) => self.shutdown(id),
            (_, SessionState::Uninitialized) => self.reject(id, ProtocolError::NotInitialized),
            (_, SessionState::Shutdown | SessionState::Exited) => self.reject(
                id,
                ProtocolError::InvalidRequest(format!(
                    "Request '{}' received after shutdown",
                    method
                )),
            ),
            (_, SessionState::Initialized) => {
                self.reject(id, ProtocolError::MethodNotFound(method.clone()))
            }
        }
    }

    fn handle_notification(&mut self, notification: Notification) -> Option<i32> {
        match notification.method.as_str() {
            methods::EXIT => return Some(self.exit()),
            methods::INITIALIZED => tracing::debug!("Client initialized"),
            methods::SET_TRACE => self.set_trace(notification.params),
            other => tracing::trace!("Ignoring notification {}", other),
        }
        None
    }

    fn reject(&mut self, id: RequestId, error: ProtocolError) {
        tracing::debug!("Rejecting request {:?}: {}", id, error);
        self.client.respond_error(Some(id), ResponseError::from(&error));
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Decode the params, negotiate capabilities, start logging, index the
    /// builtin module and answer with the capabilities.
    pub fn initialize(&mut self, id: RequestId, params: Option<Value>) {
        if self.state != SessionState::Uninitialized {
            return self.reject(
                id,
                ProtocolError::InvalidRequest("Server is already initialized".to_string()),
            );
        }

        if !self.warned {
            self.client
                .show_message(MessageType::Warning, PRERELEASE_NOTICE);
            self.warned = true;
        }

        let params = match decode_initialize(params) {
            Ok(params) => params,
            Err(e) => {
                self.report_fault(&e.to_string());
                self.client.respond(id, Value::Null);
                return;
            }
        };

        self.root_uri = params.root_uri.clone().or_else(|| {
            params
                .root_path
                .as_deref()
                .map(|path| path_to_uri(Path::new(path)))
        });
        if let Some(root) = &self.root_uri {
            self.tables.register_workspace(root.clone());
        }

        let capabilities = negotiate(&self.config.features);

        self.trace = params.trace.unwrap_or_default();
        let log_path = self.config.resolved_log_path();
        bootstrap_logger(
            self.logger.as_mut(),
            &LoggerOptions {
                debug: self.config.debug,
                trace: self.trace,
                log_path: &log_path,
                client_info: params.client_info.as_ref(),
            },
        );

        self.state = SessionState::Initialized;
        self.index_builtins();

        let result = InitializeResult {
            capabilities: capabilities.clone(),
            server_info: Some(ServerInfo {
                name: SERVER_NAME.to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
        };
        self.capabilities = Some(capabilities);

        match serde_json::to_value(&result) {
            Ok(value) => self.client.respond(id, value),
            Err(e) => self.client.respond_error(
                Some(id),
                ResponseError::new(error_codes::INTERNAL_ERROR, e.to_string()),
            ),
        }
    }

    /// Mark the session as shut down. No resources are released here;
    /// a repeated `shutdown` is answered the same way.
    pub fn shutdown(&mut self, id: RequestId) {
        match self.state {
            // Shutdown is only reachable from Initialized, so an early shutdown is refused
            SessionState::Uninitialized => return self.reject(id, ProtocolError::NotInitialized),
            SessionState::Exited => {
                return self.reject(
                    id,
                    ProtocolError::InvalidRequest("Session has exited".to_string()),
                );
            }
            SessionState::Initialized | SessionState::Shutdown => {}
        }
        self.state = SessionState::Shutdown;
        self.client.respond(id, Value::Null);
    }

    /// Release the logger and every table; returns the process exit code.
    ///
    /// The code is 0 only when `shutdown` preceded `exit`.
    pub fn exit(&mut self) -> i32 {
        let code = if self.state == SessionState::Shutdown {
            0
        } else {
            1
        };

        self.logger.close();
        self.tables.release_all();
        self.state = SessionState::Exited;

        tracing::info!("Exiting with code {}", code);
        code
    }

    fn set_trace(&mut self, params: Option<Value>) {
        let decoded = params
            .ok_or_else(|| ProtocolError::MissingParams(methods::SET_TRACE.to_string()))
            .and_then(|value| {
                serde_json::from_value::<SetTraceParams>(value)
                    .map_err(|e| ProtocolError::invalid_params(methods::SET_TRACE, e))
            });

        match decoded {
            Ok(params) => {
                self.trace = params.value;
                tracing::debug!("Trace set to {}", self.trace.as_str());
            }
            Err(e) => tracing::warn!("{}", e),
        }
    }

    fn index_builtins(&mut self) {
        let mut faults = SessionFaults {
            sink: self.logger.as_mut(),
        };

        let result = self.indexer.run(
            self.tables.base_mut(),
            &mut self.index,
            &mut self.builtin_names,
            &mut faults,
        );

        match result {
            Ok(report) => {
                self.logger.log_info(&format!(
                    "Indexed {} builtin files ({} symbols)",
                    report.files_indexed,
                    self.index.len()
                ));
                self.index_report = Some(report);
            }
            Err(e) => {
                self.report_fault(&format!("Failed to index builtin module: {e}"));
                self.index_report = Some(IndexReport::aborted());
            }
        }
    }

    /// Internal fault: visible in the editor's log and in the session log
    fn report_fault(&mut self, message: &str) {
        self.client.log_message(MessageType::Error, message);
        self.logger.log_error(message);
    }

    pub fn log_path(&self) -> PathBuf {
        self.config.resolved_log_path()
    }
}

fn decode_initialize(params: Option<Value>) -> Result<InitializeParams, ProtocolError> {
    let value = params.ok_or_else(|| ProtocolError::MissingParams(methods::INITIALIZE.into()))?;
    serde_json::from_value(value).map_err(|e| ProtocolError::invalid_params(methods::INITIALIZE, e))
}

/// Routes parser faults into the session log
struct SessionFaults<'a> {
    sink: &'a mut dyn LogSink,
}

impl FaultHandler for SessionFaults<'_> {
    fn on_fault(&mut self, fault: &ParseFault) {
        self.sink.log_error(&fault.to_string());
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use serde_json::json;
    use tempfile::TempDir;

    use super::*;
    use crate::infra::build_config::BuildConfig;
    use crate::infra::logging::testing::RecordingSink;
    use crate::infra::lsp::protocol::Response;
    use crate::models::config::{FeatureFlag, FeatureSet, IndexingMode};
    use crate::services::indexer::IndexState;

    struct Harness {
        session: SessionController,
        sink: RecordingSink,
        _vroot: Option<TempDir>,
        _logs: TempDir,
    }

    impl Harness {
        /// Session over a builtin module containing `files`
        fn with_builtins(files: &[(&str, &str)]) -> Self {
            let vroot = TempDir::new().unwrap();
            let builtin = vroot.path().join("vlib").join("builtin");
            fs::create_dir_all(&builtin).unwrap();
            for (name, content) in files {
                fs::write(builtin.join(name), content).unwrap();
            }
            let indexer = BuiltinIndexer::new(
                IndexingMode::Production,
                BuildConfig::for_os("linux"),
                Some(vroot.path().to_path_buf()),
            );
            Self::build(VlsConfig::default(), indexer, Some(vroot))
        }

        /// Session whose V installation cannot be found
        fn without_vroot(config: VlsConfig) -> Self {
            let indexer = BuiltinIndexer::new(config.indexing, BuildConfig::for_os("linux"), None);
            Self::build(config, indexer, None)
        }

        fn build(mut config: VlsConfig, indexer: BuiltinIndexer, vroot: Option<TempDir>) -> Self {
            let logs = TempDir::new().unwrap();
            config.log_path = Some(logs.path().join("vls.log"));
            let sink = RecordingSink::default();
            let session = SessionController::with_parts(config, Box::new(sink.clone()), indexer);
            Self {
                session,
                sink,
                _vroot: vroot,
                _logs: logs,
            }
        }

        fn request(&mut self, id: u64, method: &str, params: Option<Value>) -> Vec<Message> {
            let exit = self
                .session
                .handle_message(Request::new(id, method, params).into());
            assert!(exit.is_none());
            self.session.take_outgoing()
        }

        fn notify(&mut self, method: &str, params: Option<Value>) -> Option<i32> {
            self.session
                .handle_message(Notification::new(method, params).into())
        }

        fn initialize(&mut self) -> Vec<Message> {
            self.request(
                1,
                methods::INITIALIZE,
                Some(json!({
                    "processId": 42,
                    "rootUri": "file:///work/project",
                    "capabilities": {},
                    "clientInfo": {"name": "Neovim", "version": "0.10.0"},
                    "trace": "off"
                })),
            )
        }
    }

    fn response(messages: &[Message]) -> &Response {
        messages
            .iter()
            .find_map(|m| match m {
                Message::Response(r) => Some(r),
                _ => None,
            })
            .expect("no response queued")
    }

    fn error_code(messages: &[Message]) -> i32 {
        response(messages).clone().into_result().unwrap_err().code
    }

    fn notifications<'a>(messages: &'a [Message], method: &str) -> Vec<&'a Notification> {
        messages
            .iter()
            .filter_map(|m| match m {
                Message::Notification(n) if n.method == method => Some(n),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_initialize_success() {
        let mut h = Harness::with_builtins(&[
            ("a.v", "module builtin\npub fn foo(){}\nfn bar(){}\n"),
            ("b.v", "module builtin\nstruct S{ x int }\n"),
        ]);

        let sent = h.initialize();

        // Warning first, response last
        let warnings = notifications(&sent, methods::SHOW_MESSAGE);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].params.as_ref().unwrap()["type"], 2);
        assert!(matches!(sent.last(), Some(Message::Response(_))));

        let result = response(&sent).clone().into_result().unwrap();
        assert_eq!(result["capabilities"]["textDocumentSync"], 1);
        assert_eq!(
            result["capabilities"]["completionProvider"]["triggerCharacters"],
            json!(["=", ".", ":", "{", ",", "(", " "])
        );
        assert_eq!(result["serverInfo"]["name"], "vls");

        assert_eq!(h.session.state(), SessionState::Initialized);
        assert_eq!(h.session.builtin_names(), ["foo"]);
        let mut names: Vec<&str> = h.session.symbol_index().names().collect();
        names.sort_unstable();
        assert_eq!(names, ["S", "S.x", "foo"]);
        assert_eq!(
            h.session.index_report().map(|r| r.state),
            Some(IndexState::Completed)
        );
        assert_eq!(h.session.root_uri(), Some("file:///work/project"));
        assert!(h.session.tables().workspace("file:///work/project").is_some());

        let lines = h.sink.lines();
        assert!(lines.iter().any(|l| l.starts_with("info: VLS Version: ")));
        assert!(lines.contains(&"info: Client / Editor: Neovim 0.10.0".to_string()));
    }

    #[test]
    fn test_decode_failure_keeps_uninitialized() {
        let mut h = Harness::with_builtins(&[("a.v", "pub fn foo() {}\n")]);

        let sent = h.request(1, methods::INITIALIZE, Some(json!({"rootUri": 7})));

        assert_eq!(h.session.state(), SessionState::Uninitialized);
        assert!(response(&sent).is_success());
        assert_eq!(response(&sent).clone().into_result().unwrap(), Value::Null);

        let logs = notifications(&sent, methods::LOG_MESSAGE);
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].params.as_ref().unwrap()["type"], 1);
        assert!(h.sink.lines().iter().any(|l| l.starts_with("error: ")));

        // Nothing negotiated, nothing indexed
        assert!(h.session.capabilities().is_none());
        assert!(h.session.symbol_index().is_empty());
        assert!(h.session.index_report().is_none());

        // A later valid initialize works, without a second warning
        let sent = h.initialize();
        assert_eq!(h.session.state(), SessionState::Initialized);
        assert!(notifications(&sent, methods::SHOW_MESSAGE).is_empty());
        assert!(h.session.symbol_index().contains("foo"));
    }

    #[test]
    fn test_missing_params_is_decode_failure() {
        let mut h = Harness::without_vroot(VlsConfig::default());
        let sent = h.request(1, methods::INITIALIZE, None);
        assert_eq!(h.session.state(), SessionState::Uninitialized);
        assert_eq!(notifications(&sent, methods::LOG_MESSAGE).len(), 1);
    }

    #[test]
    fn test_enumeration_fault_degrades() {
        let mut h = Harness::without_vroot(VlsConfig::default());

        let sent = h.initialize();

        assert_eq!(h.session.state(), SessionState::Initialized);
        assert!(response(&sent).is_success());
        assert!(h.session.symbol_index().is_empty());
        assert_eq!(
            h.session.index_report().map(|r| r.state),
            Some(IndexState::Aborted)
        );
        assert_eq!(notifications(&sent, methods::LOG_MESSAGE).len(), 1);
    }

    #[test]
    fn test_exit_codes_for_every_state() {
        // Uninitialized
        let mut h = Harness::without_vroot(VlsConfig::default());
        assert_eq!(h.session.exit(), 1);
        assert_eq!(h.session.state(), SessionState::Exited);

        // Exited already
        assert_eq!(h.session.exit(), 1);

        // Initialized
        let mut h = Harness::without_vroot(VlsConfig::default());
        h.initialize();
        assert_eq!(h.notify(methods::EXIT, None), Some(1));

        // Shutdown
        let mut h = Harness::without_vroot(VlsConfig::default());
        h.initialize();
        h.request(2, methods::SHUTDOWN, None);
        assert_eq!(h.session.state(), SessionState::Shutdown);
        assert_eq!(h.notify(methods::EXIT, None), Some(0));
        assert_eq!(h.session.state(), SessionState::Exited);
    }

    #[test]
    fn test_exit_releases_resources() {
        let mut h = Harness::with_builtins(&[("a.v", "pub fn foo() {}\n")]);
        h.initialize();
        assert_eq!(h.session.tables().workspace_count(), 1);

        h.session.exit();

        assert!(h.session.tables().is_released());
        assert_eq!(h.session.tables().workspace_count(), 0);
        assert_eq!(h.sink.lines().last().map(String::as_str), Some("closed"));
    }

    #[test]
    fn test_transitions_are_monotonic() {
        let mut h = Harness::without_vroot(VlsConfig::default());
        let mut seen = vec![h.session.state()];

        h.request(1, methods::SHUTDOWN, None);
        seen.push(h.session.state());
        h.initialize();
        seen.push(h.session.state());
        h.initialize();
        seen.push(h.session.state());
        h.request(3, methods::SHUTDOWN, None);
        seen.push(h.session.state());
        h.initialize();
        seen.push(h.session.state());
        h.notify(methods::EXIT, None);
        seen.push(h.session.state());

        assert!(seen.windows(2).all(|w| w[0] <= w[1]), "{seen:?}");
        assert_eq!(
            seen,
            [
                SessionState::Uninitialized,
                SessionState::Uninitialized,
                SessionState::Initialized,
                SessionState::Initialized,
                SessionState::Shutdown,
                SessionState::Shutdown,
                SessionState::Exited,
            ]
        );
    }

    #[test]
    fn test_request_errors_by_state() {
        let mut h = Harness::without_vroot(VlsConfig::default());

        let sent = h.request(1, "textDocument/hover", Some(json!({})));
        assert_eq!(error_code(&sent), error_codes::SERVER_NOT_INITIALIZED);
        let sent = h.request(2, methods::SHUTDOWN, None);
        assert_eq!(error_code(&sent), error_codes::SERVER_NOT_INITIALIZED);

        h.initialize();
        let sent = h.request(3, methods::INITIALIZE, Some(json!({})));
        assert_eq!(error_code(&sent), error_codes::INVALID_REQUEST);
        let sent = h.request(4, "textDocument/hover", Some(json!({})));
        assert_eq!(error_code(&sent), error_codes::METHOD_NOT_FOUND);

        let sent = h.request(5, methods::SHUTDOWN, None);
        assert!(response(&sent).is_success());
        let sent = h.request(6, "textDocument/hover", Some(json!({})));
        assert_eq!(error_code(&sent), error_codes::INVALID_REQUEST);
    }

    #[test]
    fn test_set_trace() {
        let mut h = Harness::without_vroot(VlsConfig::default());
        h.initialize();
        assert_eq!(h.session.trace(), TraceValue::Off);

        h.notify(methods::SET_TRACE, Some(json!({"value": "verbose"})));
        assert_eq!(h.session.trace(), TraceValue::Verbose);

        h.notify(methods::SET_TRACE, Some(json!({"value": "loud"})));
        assert_eq!(h.session.trace(), TraceValue::Verbose);
    }

    #[test]
    fn test_capabilities_follow_features() {
        let config = VlsConfig {
            features: [FeatureFlag::Hover].into_iter().collect::<FeatureSet>(),
            ..VlsConfig::default()
        };
        let mut h = Harness::without_vroot(config);
        h.initialize();

        let caps = h.session.capabilities().unwrap();
        assert_eq!(caps.hover_provider, Some(true));
        assert!(caps.completion_provider.is_none());
        assert!(caps.signature_help_provider.is_none());
    }

    #[test]
    fn test_verbose_trace_logs_methods() {
        let mut h = Harness::without_vroot(VlsConfig::default());
        h.request(
            1,
            methods::INITIALIZE,
            Some(json!({"rootUri": null, "capabilities": {}, "trace": "verbose"})),
        );
        assert!(h.sink.lines().iter().any(|l| l.starts_with("path: ")));
        assert_eq!(h.session.tables().workspace_count(), 0);

        h.request(2, methods::SHUTDOWN, None);
        assert!(h.sink.lines().contains(&"info: <- shutdown".to_string()));
    }
}
