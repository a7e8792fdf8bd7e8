use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::token::TokenUsage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// Why a mention could not be materialized into file content. Named reasons
/// only — never a free-form error string — so the File-Context Resolver's
/// output stays a pure function of the filesystem snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FileContextError {
    #[error("not found")]
    NotFound,
    #[error("binary/non-UTF-8")]
    NotUtf8,
    #[error("exceeds limit ({bytes} bytes, limit {limit})")]
    ExceedsLimit { bytes: u64, limit: u64 },
    #[error("empty directory")]
    EmptyDirectory,
}

/// A single `@`-mention resolved to either its content or the reason it
/// could not be read. Mutually exclusive by construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileContext {
    pub path: String,
    pub outcome: Result<String, FileContextError>,
}

impl FileContext {
    pub fn ok(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            outcome: Ok(content.into()),
        }
    }

    pub fn err(path: impl Into<String>, error: FileContextError) -> Self {
        Self {
            path: path.into(),
            outcome: Err(error),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolUse {
    pub name: String,
    pub input: Value,
    pub result: String,
    pub is_error: bool,
}

/// One logical exchange unit stored in a [`crate::Session`]-equivalent
/// history. Mutable only before insertion; callers must not mutate a turn
/// once it has been appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
    #[serde(default)]
    pub file_contexts: Vec<FileContextRecord>,
    #[serde(default)]
    pub tool_uses: Vec<ToolUse>,
    pub usage: Option<TokenUsage>,
}

/// Serializable mirror of [`FileContext`] (the `thiserror` variant isn't
/// itself `Serialize`); used only for persisting a turn's file contexts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileContextRecord {
    pub path: String,
    pub content: Option<String>,
    pub error: Option<String>,
}

impl From<&FileContext> for FileContextRecord {
    fn from(fc: &FileContext) -> Self {
        match &fc.outcome {
            Ok(content) => FileContextRecord {
                path: fc.path.clone(),
                content: Some(content.clone()),
                error: None,
            },
            Err(err) => FileContextRecord {
                path: fc.path.clone(),
                content: None,
                error: Some(err.to_string()),
            },
        }
    }
}

impl ConversationTurn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            file_contexts: Vec::new(),
            tool_uses: Vec::new(),
            usage: None,
        }
    }

    pub fn with_file_contexts(mut self, file_contexts: &[FileContext]) -> Self {
        self.file_contexts = file_contexts.iter().map(FileContextRecord::from).collect();
        self
    }

    pub fn with_tool_uses(mut self, tool_uses: Vec<ToolUse>) -> Self {
        self.tool_uses = tool_uses;
        self
    }

    pub fn with_usage(mut self, usage: Option<TokenUsage>) -> Self {
        self.usage = usage;
        self
    }
}
