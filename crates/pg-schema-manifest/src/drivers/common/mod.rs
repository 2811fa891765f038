//! Utilities shared by database drivers.
//!
//! - [`tls`]: TLS connector selection by `ssl_mode`

pub mod tls;

pub use tls::SslMode;
