//! These models represent the objects passed around during an analysis
//!
//! There are two related formats we need to interact with:
//! - openai messages/tools, sent to and received from the completion service
//! - the structured answer, parsed from the final message and handed to the caller
//!
//! We always immediately convert the wire formats into the internal structs using
//! to/from helpers in `providers::utils`.
pub mod answer;
pub mod message;
pub mod role;
pub mod tool;
