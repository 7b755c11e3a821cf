//! Same-origin fetch relay: `GET /proxy/{url}` re-serves remote media with permissive CORS,
//! refusing anything that could reach internal hosts.

pub mod policy;
pub mod server;

pub use policy::{PolicyViolation, RelayPolicy};
pub use server::{RelayError, RelayState, router, serve};
