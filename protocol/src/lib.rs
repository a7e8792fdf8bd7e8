//! Wire-level data model shared between the REPL core and any agent
//! backend: the tagged `StreamEvent` sum, token accounting, conversation
//! turns, and the command/plugin value types.

pub mod command;
pub mod event;
pub mod input_request;
pub mod token;
pub mod turn;

pub use command::SlashCommandSpec;
pub use event::StreamEvent;
pub use event::StreamEventKind;
pub use input_request::InputRequest;
pub use input_request::InputResponse;
pub use input_request::InputType;
pub use token::TokenStatistics;
pub use token::TokenUsage;
pub use turn::ConversationTurn;
pub use turn::FileContext;
pub use turn::Role;
pub use turn::ToolUse;
