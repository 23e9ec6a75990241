//! Extension contracts for the request-issuing layer that sits on top of the coordinator.

pub mod request_signer;

pub use request_signer::*;
