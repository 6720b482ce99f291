//! Request and response types shared by the glot daemon and its drivers.
//!
//! Clients send one [`Request`] per JSONL line and receive one [`Reply`]. The
//! same [`ParseRequest`] and [`NativeParseRequest`] payloads are forwarded to
//! driver processes, which answer with the matching response types. Every
//! response embeds a [`Response`] header carrying the [`Status`], any error
//! messages, and the elapsed processing time.

mod request;
mod response;

pub use request::{NativeParseRequest, ParseRequest, Request, VersionRequest};
pub use response::{NativeParseResponse, ParseResponse, Reply, Response, Status, VersionResponse};
