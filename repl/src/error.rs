use thiserror::Error;

/// The error taxonomy named in the spec's error-handling design: one
/// variant per kind, each surfaced at a specific component and handled by
/// a specific policy (display-and-continue, log-and-skip, raise-at-boot,
/// ...). Call sites match on this rather than inspecting message strings.
#[derive(Debug, Error)]
pub enum ReplError {
    #[error("Unknown command: /{0}")]
    UnknownCommand(String),

    #[error("No active agent is configured.")]
    NoAgent,

    #[error("agent failure: {0}")]
    AgentFailure(String),

    #[error("failed to load plugin '{module}': {reason}")]
    PluginLoad { module: String, reason: String },

    #[error("plugin '{name}' on_load failed: {reason}")]
    PluginOnLoad { name: String, reason: String },

    #[error(
        "an agent is already active ('{existing}'); cannot also activate '{attempted}'"
    )]
    MultiAgent { existing: String, attempted: String },

    #[error("configuration file is malformed: {0}")]
    ConfigMalformed(String),

    #[error("clipboard error ({kind}): {detail}")]
    Clipboard { kind: ClipboardErrorKind, detail: String },

    #[error("audit logging disabled: {0}")]
    AuditIo(String),

    #[error("spawn pre_hook failed: {0}")]
    HookPreFailure(String),

    #[error("spawn post_hook failed: {0}")]
    HookPostFailure(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ClipboardErrorKind {
    #[error("missing-utility")]
    MissingUtility,
    #[error("unsupported-platform")]
    UnsupportedPlatform,
    #[error("subprocess-failure")]
    SubprocessFailure,
}
