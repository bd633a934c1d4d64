//! Client-facing HTTP handling.
//!
//! Each client connection carries exactly one request; the proxy answers it
//! and closes the connection.
//!
//! # Architecture
//!
//! - **`connection`**: The per-connection request handler state machine
//! - **`parser`**: Parses the request line and header lines from the client buffer
//! - **`request`**: Request and method representation
//! - **`response`**: Status codes and responses synthesized by the proxy
//! - **`writer`**: Writes synthesized or verbatim response bytes to the client
//!
//! # Connection State Machine
//!
//! ```text
//!   ReadRequest ──malformed──────────────────────────────┐
//!        │                                               │
//!        ▼                                               │
//!   ResolveTarget ──bad target / method──► ErrorRespond ─┤
//!        │                                      ▲        │
//!        ▼                                      │        │
//!   CheckCache ──hit──► Respond (cached bytes)  │        │
//!        │ miss              │                  │        │
//!        ▼                   │                  │        │
//!   FetchOrigin ──failure────┼──────────────────┘        │
//!        │ 2xx     │ non-2xx ▼                           │
//!        ▼         └────► Respond (error)                │
//!   AdmitCache ─────────► Respond (origin bytes)         │
//!                            │                           │
//!                            ▼                           ▼
//!                          Closed ◄──────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use larder::http::connection::Connection;
//! use tokio::net::TcpListener;
//!
//! let listener = TcpListener::bind("127.0.0.1:8888").await?;
//! loop {
//!     let (socket, peer) = listener.accept().await?;
//!     tokio::spawn(Connection::new(socket, peer, ctx.clone()).run());
//! }
//! ```

pub mod connection;
pub mod parser;
pub mod request;
pub mod response;
pub mod writer;
