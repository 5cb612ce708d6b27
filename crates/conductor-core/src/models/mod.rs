pub mod agent;
pub mod event;
pub mod fact;

pub use agent::{AgentDescriptor, AgentIdentity};
pub use event::{EventKind, LogEvent};
pub use fact::{FactItem, FactKind};
