//! `Tool` trait adapters binding the builtin functions to a workspace root
//! and the registry's blacklist (§4.5 tool mapping table).

use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::Value;

use crate::Tool;

use super::calculate::{calculate, CalculateRequest};
use super::code_exec::{code_exec, ExecRequest};
use super::file_io::{
    create_file, file_delete, file_read, file_write, list_dir, CreateFileRequest, FileDeleteRequest,
    FileReadRequest, FileWriteRequest, ListDirRequest,
};
use super::time::{get_time, GetTimeRequest};

fn parse_args<T: serde::de::DeserializeOwned>(args: Value) -> Result<T, String> {
    serde_json::from_value(args).map_err(|e| format!("invalid arguments: {e}"))
}

pub struct GetTimeTool;

#[async_trait]
impl Tool for GetTimeTool {
    fn name(&self) -> &str {
        "get_time"
    }
    fn arg_schema(&self) -> Value {
        serde_json::json!({"type": "object", "properties": {"timezone": {"type": "string"}}})
    }
    async fn run(&self, args: Value) -> Result<Value, String> {
        get_time(parse_args(args)?)
    }
}

pub struct CalculateTool;

#[async_trait]
impl Tool for CalculateTool {
    fn name(&self) -> &str {
        "calculate"
    }
    fn arg_schema(&self) -> Value {
        serde_json::json!({"type": "object", "properties": {"expression": {"type": "string"}}, "required": ["expression"]})
    }
    async fn run(&self, args: Value) -> Result<Value, String> {
        calculate(parse_args(args)?)
    }
}

pub struct FileReadTool {
    pub workspace_root: PathBuf,
}

#[async_trait]
impl Tool for FileReadTool {
    fn name(&self) -> &str {
        "file_read"
    }
    fn arg_schema(&self) -> Value {
        serde_json::json!({"type": "object", "properties": {"path": {"type": "string"}}, "required": ["path"]})
    }
    async fn run(&self, args: Value) -> Result<Value, String> {
        let req: FileReadRequest = parse_args(args)?;
        file_read(&self.workspace_root, req).await
    }
}

pub struct FileWriteTool {
    pub workspace_root: PathBuf,
}

#[async_trait]
impl Tool for FileWriteTool {
    fn name(&self) -> &str {
        "file_write"
    }
    fn arg_schema(&self) -> Value {
        serde_json::json!({"type": "object", "properties": {"path": {"type": "string"}, "content": {"type": "string"}}, "required": ["path", "content"]})
    }
    async fn run(&self, args: Value) -> Result<Value, String> {
        let req: FileWriteRequest = parse_args(args)?;
        file_write(&self.workspace_root, req).await
    }
}

pub struct CreateFileTool {
    pub workspace_root: PathBuf,
}

#[async_trait]
impl Tool for CreateFileTool {
    fn name(&self) -> &str {
        "create_file"
    }
    fn arg_schema(&self) -> Value {
        serde_json::json!({"type": "object", "properties": {"path": {"type": "string"}, "content": {"type": "string"}}, "required": ["path"]})
    }
    async fn run(&self, args: Value) -> Result<Value, String> {
        let req: CreateFileRequest = parse_args(args)?;
        create_file(&self.workspace_root, req).await
    }
}

pub struct DeleteFileTool {
    pub workspace_root: PathBuf,
}

#[async_trait]
impl Tool for DeleteFileTool {
    fn name(&self) -> &str {
        "delete_file"
    }
    fn arg_schema(&self) -> Value {
        serde_json::json!({"type": "object", "properties": {"path": {"type": "string"}}, "required": ["path"]})
    }
    async fn run(&self, args: Value) -> Result<Value, String> {
        let req: FileDeleteRequest = parse_args(args)?;
        file_delete(&self.workspace_root, req).await
    }
}

pub struct ListDirTool {
    pub workspace_root: PathBuf,
}

#[async_trait]
impl Tool for ListDirTool {
    fn name(&self) -> &str {
        "list_dir"
    }
    fn arg_schema(&self) -> Value {
        serde_json::json!({"type": "object", "properties": {"path": {"type": "string"}}})
    }
    async fn run(&self, args: Value) -> Result<Value, String> {
        let req: ListDirRequest = parse_args(args)?;
        list_dir(&self.workspace_root, req).await
    }
}

pub struct CodeExecTool {
    pub default_timeout_sec: u64,
}

#[async_trait]
impl Tool for CodeExecTool {
    fn name(&self) -> &str {
        "code_exec"
    }
    fn arg_schema(&self) -> Value {
        serde_json::json!({"type": "object", "properties": {"command": {"type": "string"}}, "required": ["command"]})
    }
    async fn run(&self, args: Value) -> Result<Value, String> {
        let req: ExecRequest = parse_args(args)?;
        let response = code_exec(req, self.default_timeout_sec).await?;
        serde_json::to_value(response).map_err(|e| e.to_string())
    }
}

/// Register every built-in tool against a workspace root and exec timeout
/// (§4.5's tool mapping table). The registry's own blacklist set, not this
/// function, decides which of these require human approval before running.
pub fn register_builtin_tools(registry: &crate::ToolRegistry, workspace_root: PathBuf, exec_timeout_secs: u64) {
    use std::sync::Arc;

    registry.register(Arc::new(GetTimeTool));
    registry.register(Arc::new(CalculateTool));
    registry.register(Arc::new(FileReadTool { workspace_root: workspace_root.clone() }));
    registry.register(Arc::new(FileWriteTool { workspace_root: workspace_root.clone() }));
    registry.register(Arc::new(CreateFileTool { workspace_root: workspace_root.clone() }));
    registry.register(Arc::new(DeleteFileTool { workspace_root: workspace_root.clone() }));
    registry.register(Arc::new(ListDirTool { workspace_root }));
    registry.register(Arc::new(CodeExecTool { default_timeout_sec: exec_timeout_secs }));
}
