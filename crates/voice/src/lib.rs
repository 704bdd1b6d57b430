//! whispr-voice – UDP endpoint registry and audio relay (§4.6, §4.7)
//!
//! The relay never inspects or decrypts the Opus/AEAD payload inside a
//! datagram; it only reads the 16-byte header to find the sender's
//! `client_id` and mirrors the bytes unchanged to the sender's channel
//! co-members.
//!
//! - [`registry`] – `client_id ↔ user_id ↔ endpoint` bookkeeping
//! - [`rate_limiter`] – per-client-id token bucket
//! - [`relay`] – the UDP receive loop and fan-out

pub mod rate_limiter;
pub mod registry;
pub mod relay;

pub use rate_limiter::RateLimiter;
pub use registry::UdpEndpointRegistry;
pub use relay::AudioRelay;
