//! `ox_remote`: a bidirectional, asynchronous RPC transport where the
//! remote-function abstraction is first class. Any call may carry closures
//! as arguments; a closure sent across the wire becomes a remote reference
//! whose invocation causes the peer to run the original closure with the
//! supplied arguments, which may themselves carry further closures,
//! arbitrarily nested.
//!
//! All callables are one-way - there is no return value at the wire level.
//! A result is modeled by passing a continuation callback as one of the
//! arguments.
//!
//! ```text
//! wire codec        - varint record framing, src::varint
//! connection engine - handshake, registry, ordered writes, read loop, src::connection
//! serialization     - Encode/Decode, Encoder/Decoder, Callback/Proxy, src::codec
//! façades           - Client<Args> / Server<Args>, src::client, src::server
//! ```
//
pub mod error;
pub mod varint;
pub mod registry;
pub mod connection;
pub mod codec;
pub mod client;
pub mod server;

pub use client    ::Client;
pub use server    ::Server;
pub use connection::DEFAULT_PORT;
pub use error     ::{ ConnectionError, DecodeError, FramingError, TransportError };
