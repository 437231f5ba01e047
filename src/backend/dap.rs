//! DAP backend: drives `lldb-dap` over length-prefixed JSON framing.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::backend::{
    AddBreakpointOptions, AttachParams, Backend, ExecutionStateOptions, RunCommandOptions,
    ResumeOptions, StackOptions, VariablesOptions,
};
use crate::breakpoint::{BreakpointInfo, BreakpointRecord, BreakpointSpec, SyntheticIdAllocator};
use crate::error::{DebuggerError, DebuggerResult};
use crate::execution_state::{ExecutionState, ExecutionStatus};
use crate::framing::dap::{encode, DapFrameDecoder};
use crate::process::{find_lldb_dap, CommandExecutor, InteractiveProcess, ProcessSpawner};

pub struct DapBackend {
    spawner: Arc<dyn ProcessSpawner>,
    executor: Arc<dyn CommandExecutor>,
    process: Option<Box<dyn InteractiveProcess>>,
    decoder: DapFrameDecoder,
    seq: i64,
    attached: bool,
    disposed: bool,
    request_timeout: Duration,
    log_events: bool,
    cached_state: ExecutionState,
    last_stopped_thread_id: Option<i64>,
    file_breakpoints: HashMap<String, Vec<BreakpointRecord>>,
    function_breakpoints: Vec<BreakpointRecord>,
    synthetic_ids: SyntheticIdAllocator,
    configuration_done_supported: bool,
}

impl DapBackend {
    pub fn new(
        spawner: Arc<dyn ProcessSpawner>,
        executor: Arc<dyn CommandExecutor>,
        request_timeout: Duration,
        log_events: bool,
    ) -> Self {
        Self {
            spawner,
            executor,
            process: None,
            decoder: DapFrameDecoder::new(),
            seq: 0,
            attached: false,
            disposed: false,
            request_timeout,
            log_events,
            cached_state: ExecutionState::unknown(),
            last_stopped_thread_id: None,
            file_breakpoints: HashMap::new(),
            function_breakpoints: Vec::new(),
            synthetic_ids: SyntheticIdAllocator::new(),
            configuration_done_supported: true,
        }
    }

    fn require_process(&mut self) -> DebuggerResult<&mut Box<dyn InteractiveProcess>> {
        if self.disposed {
            return Err(DebuggerError::Disposed);
        }
        self.process.as_mut().ok_or(DebuggerError::NotAttached)
    }

    async fn send_request(&mut self, command: &str, arguments: Value) -> DebuggerResult<Value> {
        self.seq += 1;
        let seq = self.seq;
        let message = json!({"seq": seq, "type": "request", "command": command, "arguments": arguments});
        let bytes = encode(&message);

        {
            let process = self.require_process()?;
            process.write(&bytes).await?;
        }

        let deadline = tokio::time::Instant::now() + self.request_timeout;

        loop {
            let pending: Vec<Value> = self.decoder.drain_messages();
            for msg in pending {
                if let Some(result) = self.handle_message(&msg, seq) {
                    return result;
                }
            }

            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                return Err(DebuggerError::timeout(command.to_string(), self.request_timeout.as_millis() as u64));
            }

            let process = self.require_process()?;
            match tokio::time::timeout(remaining, process.read_chunk()).await {
                Ok(Ok(Some(bytes))) => self.decoder.push(&bytes),
                Ok(Ok(None)) => {
                    self.disposed = true;
                    return Err(DebuggerError::protocol(format!(
                        "lldb-dap exited unexpectedly during '{command}'"
                    )));
                }
                Ok(Err(e)) => return Err(e),
                Err(_) => {
                    return Err(DebuggerError::timeout(command.to_string(), self.request_timeout.as_millis() as u64))
                }
            }
        }
    }

    fn handle_message(&mut self, msg: &Value, seq: i64) -> Option<DebuggerResult<Value>> {
        match msg.get("type").and_then(Value::as_str) {
            Some("event") => {
                self.handle_event(msg);
                None
            }
            Some("response") => {
                if msg.get("request_seq").and_then(Value::as_i64) != Some(seq) {
                    return None;
                }
                let success = msg.get("success").and_then(Value::as_bool).unwrap_or(false);
                if success {
                    Some(Ok(msg.get("body").cloned().unwrap_or_else(|| json!({}))))
                } else {
                    let message = msg
                        .get("message")
                        .and_then(Value::as_str)
                        .unwrap_or("DAP request failed")
                        .to_string();
                    Some(Err(DebuggerError::protocol(message)))
                }
            }
            _ => None,
        }
    }

    fn handle_event(&mut self, msg: &Value) {
        let event = msg.get("event").and_then(Value::as_str).unwrap_or("");
        if self.log_events {
            debug!(event, body = ?msg.get("body"), "dap event");
        }
        match event {
            "stopped" => {
                let body = msg.get("body").cloned().unwrap_or_else(|| json!({}));
                let reason = body.get("reason").and_then(Value::as_str).map(String::from);
                let description = body.get("description").and_then(Value::as_str).map(String::from);
                let thread_id = body.get("threadId").and_then(Value::as_i64);
                self.last_stopped_thread_id = thread_id;
                self.cached_state = ExecutionState::stopped(reason, description, thread_id);
            }
            "continued" => {
                self.cached_state = ExecutionState::running();
                self.last_stopped_thread_id = None;
            }
            "exited" | "terminated" => {
                self.cached_state = ExecutionState::terminated();
                self.last_stopped_thread_id = None;
            }
            _ => {}
        }
    }

    async fn list_threads(&mut self) -> DebuggerResult<Vec<Value>> {
        let body = self.send_request("threads", json!({})).await?;
        Ok(body.get("threads").and_then(Value::as_array).cloned().unwrap_or_default())
    }

    fn resolve_thread_id(&self, threads: &[Value], thread_index: Option<usize>) -> Option<i64> {
        if let Some(idx) = thread_index {
            return threads.get(idx).and_then(|t| t.get("id")).and_then(Value::as_i64);
        }
        if let Some(last) = self.last_stopped_thread_id {
            if threads.iter().any(|t| t.get("id").and_then(Value::as_i64) == Some(last)) {
                return Some(last);
            }
        }
        threads.first().and_then(|t| t.get("id")).and_then(Value::as_i64)
    }

    async fn send_file_breakpoints(&mut self, file: &str) -> DebuggerResult<()> {
        let mut entry = self.file_breakpoints.remove(file).unwrap_or_default();

        let payload: Vec<Value> = entry
            .iter()
            .map(|r| {
                let line = match &r.spec {
                    BreakpointSpec::FileLine { line, .. } => *line,
                    BreakpointSpec::Function { .. } => unreachable!("file breakpoint list holds only file-line specs"),
                };
                let mut v = json!({"line": line});
                if let Some(condition) = &r.condition {
                    v["condition"] = json!(condition);
                }
                v
            })
            .collect();

        let resp = self
            .send_request("setBreakpoints", json!({"source": {"path": file}, "breakpoints": payload}))
            .await?;
        let returned = resp.get("breakpoints").and_then(Value::as_array).cloned().unwrap_or_default();

        for (record, returned_bp) in entry.iter_mut().zip(returned.iter()) {
            record.id = match returned_bp.get("id").and_then(Value::as_i64) {
                Some(id) => id,
                None => self.synthetic_ids.allocate(),
            };
        }

        self.file_breakpoints.insert(file.to_string(), entry);
        Ok(())
    }

    async fn send_function_breakpoints(&mut self) -> DebuggerResult<()> {
        let payload: Vec<Value> = self
            .function_breakpoints
            .iter()
            .map(|r| {
                let name = match &r.spec {
                    BreakpointSpec::Function { name } => name.clone(),
                    BreakpointSpec::FileLine { .. } => unreachable!("function breakpoint list holds only function specs"),
                };
                let mut v = json!({"name": name});
                if let Some(condition) = &r.condition {
                    v["condition"] = json!(condition);
                }
                v
            })
            .collect();

        let resp = self.send_request("setFunctionBreakpoints", json!({"breakpoints": payload})).await?;
        let returned = resp.get("breakpoints").and_then(Value::as_array).cloned().unwrap_or_default();

        for (record, returned_bp) in self.function_breakpoints.iter_mut().zip(returned.iter()) {
            record.id = match returned_bp.get("id").and_then(Value::as_i64) {
                Some(id) => id,
                None => self.synthetic_ids.allocate(),
            };
        }

        Ok(())
    }

    fn translate_stack_error(err: DebuggerError) -> DebuggerError {
        if let DebuggerError::ProtocolError(msg) = &err {
            let lower = msg.to_lowercase();
            if lower.contains("running") || lower.contains("not stopped") {
                return DebuggerError::process_running(msg.clone());
            }
        }
        err
    }
}

#[async_trait]
impl Backend for DapBackend {
    async fn attach(&mut self, params: AttachParams) -> DebuggerResult<()> {
        let adapter_path = find_lldb_dap(self.executor.as_ref()).await?;
        let process = self.spawner.spawn(&adapter_path, &[]).await?;
        self.process = Some(process);

        let init_args = json!({
            "clientID": "xcodebuildmcp-debugger",
            "adapterID": "lldb",
            "linesStartAt1": true,
            "columnsStartAt1": true,
            "pathFormat": "path",
            "supportsVariableType": true,
        });

        let init_result = self.send_request("initialize", init_args).await;
        let capabilities = match init_result {
            Ok(body) => body,
            Err(e) => {
                self.dispose().await;
                return Err(e);
            }
        };
        self.configuration_done_supported = capabilities
            .get("supportsConfigurationDoneRequest")
            .and_then(Value::as_bool)
            .unwrap_or(true);

        let attach_args = json!({"pid": params.pid, "waitFor": params.wait_for});
        if let Err(e) = self.send_request("attach", attach_args).await {
            self.dispose().await;
            return Err(e);
        }

        if self.configuration_done_supported {
            if let Err(e) = self.send_request("configurationDone", json!({})).await {
                self.dispose().await;
                return Err(e);
            }
        }

        info!(pid = params.pid, simulator_id = %params.simulator_id, "dap attached");
        self.attached = true;
        Ok(())
    }

    async fn detach(&mut self) -> DebuggerResult<()> {
        if !self.attached {
            return Err(DebuggerError::NotAttached);
        }
        if let Err(e) = self.send_request("disconnect", json!({"terminateDebuggee": false})).await {
            warn!(error = %e, "dap disconnect request failed, continuing with local cleanup");
        }
        self.attached = false;
        Ok(())
    }

    async fn run_command(&mut self, command: &str, _opts: RunCommandOptions) -> DebuggerResult<String> {
        let result = self
            .send_request("evaluate", json!({"expression": command, "context": "repl"}))
            .await;

        match result {
            Ok(body) => {
                let output = body.get("output").and_then(Value::as_str).unwrap_or("");
                let result_text = body.get("result").and_then(Value::as_str).unwrap_or("");
                let combined: Vec<&str> = [output, result_text].into_iter().filter(|s| !s.is_empty()).collect();
                Ok(combined.join("\n"))
            }
            Err(DebuggerError::ProtocolError(msg)) if msg.to_lowercase().contains("repl") || msg.to_lowercase().contains("not supported") => {
                Err(DebuggerError::not_supported(format!(
                    "adapter does not support REPL evaluate ({msg}); use the lldb-cli backend instead"
                )))
            }
            Err(e) => Err(e),
        }
    }

    async fn add_breakpoint(&mut self, spec: BreakpointSpec, opts: AddBreakpointOptions) -> DebuggerResult<BreakpointInfo> {
        match &spec {
            BreakpointSpec::FileLine { file, line } => {
                let entry = self.file_breakpoints.entry(file.clone()).or_default();
                entry.push(BreakpointRecord { id: 0, spec: spec.clone(), condition: opts.condition.clone() });
                self.send_file_breakpoints(file).await?;
                let id = self.file_breakpoints.get(file).and_then(|v| v.last()).map(|r| r.id).unwrap_or(0);
                Ok(BreakpointInfo { id, spec, raw_output: format!("breakpoint set at {file}:{line}") })
            }
            BreakpointSpec::Function { name } => {
                self.function_breakpoints.push(BreakpointRecord { id: 0, spec: spec.clone(), condition: opts.condition.clone() });
                self.send_function_breakpoints().await?;
                let id = self.function_breakpoints.last().map(|r| r.id).unwrap_or(0);
                Ok(BreakpointInfo { id, spec, raw_output: format!("function breakpoint set at {name}") })
            }
        }
    }

    async fn remove_breakpoint(&mut self, id: i64) -> DebuggerResult<()> {
        let files: Vec<String> = self.file_breakpoints.keys().cloned().collect();
        for file in files {
            let found = self
                .file_breakpoints
                .get_mut(&file)
                .and_then(|list| list.iter().position(|r| r.id == id).map(|pos| list.remove(pos)))
                .is_some();
            if found {
                self.send_file_breakpoints(&file).await?;
                return Ok(());
            }
        }

        if let Some(pos) = self.function_breakpoints.iter().position(|r| r.id == id) {
            self.function_breakpoints.remove(pos);
            self.send_function_breakpoints().await?;
            return Ok(());
        }

        Err(DebuggerError::not_found(format!("breakpoint {id}")))
    }

    async fn get_stack(&mut self, opts: StackOptions) -> DebuggerResult<String> {
        let threads = self.list_threads().await?;
        let thread_id = self
            .resolve_thread_id(&threads, opts.thread_index)
            .ok_or_else(|| DebuggerError::not_found("no threads available"))?;

        let mut args = json!({"threadId": thread_id, "startFrame": 0});
        if let Some(levels) = opts.max_frames {
            args["levels"] = json!(levels);
        }

        let body = self.send_request("stackTrace", args).await.map_err(Self::translate_stack_error)?;
        let frames = body.get("stackFrames").and_then(Value::as_array).cloned().unwrap_or_default();

        let mut out = format!("Thread {thread_id}\n");
        for (i, frame) in frames.iter().enumerate() {
            let name = frame.get("name").and_then(Value::as_str).unwrap_or("?");
            let path = frame.get("source").and_then(|s| s.get("path")).and_then(Value::as_str).unwrap_or("?");
            let line = frame.get("line").and_then(Value::as_i64).unwrap_or(0);
            out.push_str(&format!("frame #{i}: {name} at {path}:{line}\n"));
        }
        Ok(out)
    }

    async fn get_variables(&mut self, opts: VariablesOptions) -> DebuggerResult<String> {
        let threads = self.list_threads().await?;
        let thread_id = self
            .resolve_thread_id(&threads, None)
            .ok_or_else(|| DebuggerError::not_found("no threads available"))?;

        let frame_index = opts.frame_index.unwrap_or(0) as usize;
        let levels = frame_index as u32 + 1;
        let body = self
            .send_request("stackTrace", json!({"threadId": thread_id, "startFrame": 0, "levels": levels}))
            .await
            .map_err(Self::translate_stack_error)?;

        let frames = body.get("stackFrames").and_then(Value::as_array).cloned().unwrap_or_default();
        let frame = frames
            .get(frame_index)
            .ok_or_else(|| DebuggerError::not_found(format!("frame index {frame_index} out of range")))?;
        let frame_id = frame.get("id").and_then(Value::as_i64).unwrap_or(0);

        let scopes_body = self.send_request("scopes", json!({"frameId": frame_id})).await?;
        let scopes = scopes_body.get("scopes").and_then(Value::as_array).cloned().unwrap_or_default();
        if scopes.is_empty() {
            return Ok("(no variables)".to_string());
        }

        let mut out = String::new();
        for scope in &scopes {
            let var_ref = scope.get("variablesReference").and_then(Value::as_i64).unwrap_or(0);
            if var_ref == 0 {
                continue;
            }
            let vars_body = self.send_request("variables", json!({"variablesReference": var_ref})).await?;
            let vars = vars_body.get("variables").and_then(Value::as_array).cloned().unwrap_or_default();
            for v in &vars {
                let name = v.get("name").and_then(Value::as_str).unwrap_or("?");
                let ty = v.get("type").and_then(Value::as_str).unwrap_or("");
                let value = v.get("value").and_then(Value::as_str).unwrap_or("");
                if ty.is_empty() {
                    out.push_str(&format!("{name} = {value}\n"));
                } else {
                    out.push_str(&format!("{name} ({ty}) = {value}\n"));
                }
            }
        }

        if out.is_empty() {
            out.push_str("(no variables)");
        }
        Ok(out)
    }

    async fn get_execution_state(&mut self, _opts: ExecutionStateOptions) -> DebuggerResult<ExecutionState> {
        if !matches!(self.cached_state.status, ExecutionStatus::Unknown) {
            return Ok(self.cached_state.clone());
        }

        let threads = self.list_threads().await?;
        let Some(first) = threads.first() else {
            return Ok(ExecutionState::unknown());
        };
        let thread_id = first.get("id").and_then(Value::as_i64).unwrap_or(0);

        match self.send_request("stackTrace", json!({"threadId": thread_id, "startFrame": 0, "levels": 1})).await {
            Ok(_) => Ok(ExecutionState::stopped(None, None, Some(thread_id))),
            Err(DebuggerError::ProtocolError(msg)) => {
                let lower = msg.to_lowercase();
                if lower.contains("running") || lower.contains("not stopped") {
                    Ok(ExecutionState::running())
                } else {
                    Ok(ExecutionState { status: ExecutionStatus::Unknown, reason: None, description: Some(msg), thread_id: None })
                }
            }
            Err(e) => Err(e),
        }
    }

    async fn resume(&mut self, opts: ResumeOptions) -> DebuggerResult<()> {
        let thread_id = opts
            .thread_id
            .or(self.last_stopped_thread_id)
            .ok_or_else(|| DebuggerError::not_found("no stopped thread to resume"))?;
        self.send_request("continue", json!({"threadId": thread_id})).await?;
        self.cached_state = ExecutionState::running();
        self.last_stopped_thread_id = None;
        Ok(())
    }

    async fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        if let Some(process) = self.process.as_mut() {
            if let Err(e) = process.kill().await {
                debug!(error = %e, "error killing lldb-dap process during dispose");
            }
        }
        self.process = None;
        self.attached = false;
        self.disposed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{dap_error_response, dap_response, ScriptedDapProcess, SingleUseSpawner, StaticAdapterExecutor};

    fn response(seq: i64, body: Value) -> Value {
        dap_response(seq, body)
    }

    fn backend_with_script(messages: Vec<Value>) -> DapBackend {
        let spawner = Arc::new(SingleUseSpawner::new(Box::new(ScriptedDapProcess::new(messages))));
        DapBackend::new(spawner, Arc::new(StaticAdapterExecutor::default()), Duration::from_millis(500), false)
    }

    #[tokio::test]
    async fn attach_sequence_succeeds() {
        let mut backend = backend_with_script(vec![
            response(1, json!({"supportsConfigurationDoneRequest": true})),
            response(2, json!({})),
            response(3, json!({})),
        ]);

        backend
            .attach(AttachParams { pid: 42, simulator_id: "SIM-A".into(), wait_for: false })
            .await
            .unwrap();
        assert!(backend.attached);
    }

    #[tokio::test]
    async fn stack_while_running_translates_to_process_running() {
        let mut backend = backend_with_script(vec![
            response(1, json!({"supportsConfigurationDoneRequest": false})),
            response(2, json!({})),
            response(3, json!({"threads": [{"id": 1, "name": "main"}]})),
            dap_error_response(4, "process is running"),
        ]);

        backend
            .attach(AttachParams { pid: 42, simulator_id: "SIM-A".into(), wait_for: false })
            .await
            .unwrap();

        let err = backend.get_stack(StackOptions::default()).await.unwrap_err();
        assert!(matches!(err, DebuggerError::ProcessRunning(_)));
    }

    #[tokio::test]
    async fn breakpoint_reconciliation_reassigns_ids_after_removal() {
        let mut backend = backend_with_script(vec![
            response(1, json!({"supportsConfigurationDoneRequest": false})),
            response(2, json!({})),
            // add line 10
            response(3, json!({"breakpoints": [{"id": 101}]})),
            // add line 20
            response(4, json!({"breakpoints": [{"id": 101}, {"id": 102}]})),
            // add line 30
            response(5, json!({"breakpoints": [{"id": 101}, {"id": 102}, {"id": 103}]})),
            // remove middle (line 20): resend [line 10, line 30]
            response(6, json!({"breakpoints": [{"id": 201}, {"id": 202}]})),
        ]);

        backend.attach(AttachParams { pid: 1, simulator_id: "SIM-A".into(), wait_for: false }).await.unwrap();

        let bp1 = backend
            .add_breakpoint(BreakpointSpec::FileLine { file: "/f.c".into(), line: 10 }, AddBreakpointOptions::default())
            .await
            .unwrap();
        let bp2 = backend
            .add_breakpoint(BreakpointSpec::FileLine { file: "/f.c".into(), line: 20 }, AddBreakpointOptions::default())
            .await
            .unwrap();
        let _bp3 = backend
            .add_breakpoint(BreakpointSpec::FileLine { file: "/f.c".into(), line: 30 }, AddBreakpointOptions::default())
            .await
            .unwrap();

        assert_eq!(bp1.id, 101);
        assert_eq!(bp2.id, 102);

        backend.remove_breakpoint(bp2.id).await.unwrap();

        let records = backend.file_breakpoints.get("/f.c").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, 201);
        assert_eq!(records[1].id, 202);
    }
}
