//! Error-to-status mapping (§7 expansion): the domain `Error` enum's
//! variants map one-to-one onto `tonic::Status` codes. This is the only
//! place in the crate that constructs a `tonic::Status` from a domain
//! error — internal crates stay transport-agnostic.

use agentd_domain::error::Error;
use tonic::{Code, Status};

pub fn to_status(err: Error) -> Status {
    match err {
        Error::Unauthenticated(msg) => Status::new(Code::Unauthenticated, msg),
        Error::ResourceExhausted(msg) => Status::new(Code::ResourceExhausted, msg),
        Error::InvalidArgument(msg) => Status::new(Code::InvalidArgument, msg),
        Error::Cancelled => Status::new(Code::Cancelled, "task cancelled"),
        Error::Unavailable(msg) => Status::new(Code::Unavailable, msg),
        Error::Io(e) => Status::new(Code::Internal, format!("io: {e}")),
        Error::Json(e) => Status::new(Code::Internal, format!("json: {e}")),
        Error::Provider { provider, message } => Status::new(Code::Internal, format!("{provider}: {message}")),
        Error::Config(msg) => Status::new(Code::Internal, format!("config: {msg}")),
        Error::Internal(msg) => Status::new(Code::Internal, msg),
    }
}
