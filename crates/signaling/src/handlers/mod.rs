//! Per-message-family handlers, routed to by [`crate::dispatcher::MessageDispatcher`].

pub mod auth_handler;
pub mod channel_handler;
pub mod chat_handler;
pub mod permission_handler;
pub mod udp_handler;
