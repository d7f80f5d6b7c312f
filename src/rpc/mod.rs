//! Dispatcher-facing RPC surface (§6): `GetAction` and `ReportActionStatus`
//! exposed as JSON over HTTP via `axum`.

pub mod server;
pub mod types;

pub use server::{serve_nats, RpcServer, RpcServerBuilder, RpcServerConfig};
pub use types::{
    ErrorResponse, GetActionRequest, GetActionResponse, ReportActionStatusRequest,
    ReportActionStatusResponse,
};
