//! These models represent the objects passed around by the agent
//!
//! There are two related formats we need to interact with:
//! - openai-compatible messages/tools, sent from the agent to the LLM backend
//! - tool requests, sent from the agent to the local tool handlers
//!
//! We always immediately convert provider payloads into the internal structs using
//! to/from helpers, so the internal models are not an exact match to any wire format.
pub mod content;
pub mod message;
pub mod role;
pub mod tool;
