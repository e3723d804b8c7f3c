pub mod capability;
pub mod config;
pub mod error;
pub mod message;
pub mod profile;
pub mod state;
pub mod trace;

pub use capability::Capability;
pub use config::Config;
pub use error::{Error, Result};
pub use message::{Message, Role, ToolCall, Usage};
pub use state::{ConversationState, InvariantViolation, PlanStep, StepStatus};
pub use trace::TraceEvent;
