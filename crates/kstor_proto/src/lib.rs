//! kstor_proto — KStor wire protocol
//!
//! One JSON object per direction per connection: the client sends a request
//! envelope, the server replies with a response envelope and closes.
//!
//! # Module layout
//! - `message` — typed request/response enums + auth envelopes
//! - `meta`    — `SecretMeta` (structured secret metadata, glob matching)
//! - `codec`   — newline-delimited JSON framing over a stream

pub mod codec;
pub mod message;
pub mod meta;

pub use message::{
    Credentials, GroupSummary, ParseError, Request, RequestEnvelope, Response, ResponseEnvelope,
    SecretSummary, UserSummary,
};
pub use meta::SecretMeta;
