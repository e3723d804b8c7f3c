//! The canonical capability list (resolves Open Question 1 — see DESIGN.md).
//!
//! One closed set, consumed both by the Plan stage's validation and by the
//! capability → tool-name map the Act/Tools stages use. No second list
//! exists anywhere else in the crate.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    None,
    ListDir,
    Search,
    RagRetrieve,
    RagRewriteQuery,
    FileRead,
    FileWrite,
    CreateFile,
    DeleteFile,
    GetTime,
    Calculate,
    CodeExec,
    ExternalMcp,
    AskUser,
}

impl Capability {
    pub const ALL: &'static [Capability] = &[
        Capability::None,
        Capability::ListDir,
        Capability::Search,
        Capability::RagRetrieve,
        Capability::RagRewriteQuery,
        Capability::FileRead,
        Capability::FileWrite,
        Capability::CreateFile,
        Capability::DeleteFile,
        Capability::GetTime,
        Capability::Calculate,
        Capability::CodeExec,
        Capability::ExternalMcp,
        Capability::AskUser,
    ];

    /// Parse a capability tag, defaulting to `AskUser` for anything outside
    /// the closed set (§4.8 Plan validation: "else re-mapped to ask_user").
    pub fn parse_or_ask_user(tag: &str) -> Capability {
        serde_json::from_value(serde_json::Value::String(tag.to_string()))
            .unwrap_or(Capability::AskUser)
    }

    /// The tool name this capability resolves to, if any. Capabilities that
    /// are routed through the Retriever rather than the Tool Registry
    /// (`Search`, `RagRetrieve`, `RagRewriteQuery`) or that carry no tool at
    /// all (`None`, `AskUser`, `ExternalMcp` with no built-in) return `None`.
    pub fn tool_name(self) -> Option<&'static str> {
        match self {
            Capability::ListDir => Some("list_dir"),
            Capability::FileRead => Some("file_read"),
            Capability::FileWrite => Some("file_write"),
            Capability::CreateFile => Some("create_file"),
            Capability::DeleteFile => Some("delete_file"),
            Capability::GetTime => Some("get_time"),
            Capability::Calculate => Some("calculate"),
            Capability::CodeExec => Some("code_exec"),
            Capability::None
            | Capability::AskUser
            | Capability::Search
            | Capability::RagRetrieve
            | Capability::RagRewriteQuery
            | Capability::ExternalMcp => None,
        }
    }

    /// Whether this capability maps to a non-empty tool set (§4.8 Act step 3:
    /// "allowed iff the capability maps to a non-empty tool set").
    pub fn has_tools(self) -> bool {
        self.tool_name().is_some() || self.is_rag()
    }

    pub fn is_rag(self) -> bool {
        matches!(self, Capability::RagRetrieve | Capability::RagRewriteQuery)
    }
}
