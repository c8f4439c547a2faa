//! # Peranto
//!
//! Credential issuance and request proxying in front of a versioned backend
//! API. Consumers register, receive a human-readable bearer token, activate
//! it, and use it to authenticate subsequent calls; the web-app channel logs
//! consumers in via session state and proxies their actions to the same
//! backend, selecting the right credential (consumer, system or admin) per
//! call.

pub mod cli;
pub mod consumer;
pub mod gateway;
pub mod peranto;
pub mod session;
pub mod token;
