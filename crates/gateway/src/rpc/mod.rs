//! The gRPC surface (§4.9, C9): the `tonic`/`prost`-generated service types
//! plus the `AgentService` trait implementation wired to `AppState`.

pub mod service;

pub mod pb {
    tonic::include_proto!("agentd.agent.v1");
}

pub use service::AgentServiceImpl;
