//! MeshCore companion protocol client.
//!
//! Talks to a MeshCore companion radio over any byte-stream [`Transport`]
//! (serial, TCP, BLE). Every message travels in a frame:
//!
//! - **Commands** (app → device): start with a `CMD_*` byte
//! - **Responses** (device → app): start with a `RESP_CODE_*` byte
//! - **Pushes** (device → app, unsolicited): start with a `PUSH_CODE_*`
//!   byte (0x80+)
//!
//! A [`Connection`] reassembles incoming frames, decodes them into
//! [`Event`]s, and matches them to the operations waiting on them.
//!
//! # Example
//!
//! ```rust,ignore
//! use meshcore_companion::{Connection, ConnectionConfig};
//!
//! let conn = Connection::connect(transport, ConnectionConfig::default()).await?;
//! let me = conn.get_self_info(None).await?;
//! for contact in conn.get_contacts(None).await? {
//!     println!("{} {}", contact.public_key, contact.name);
//! }
//! ```

mod bus;
mod commands;
mod config;
mod connection;
mod constants;
mod dispatcher;
mod error;
mod frame;
mod pending;
mod responses;
mod transport;
mod types;

pub use bus::*;
pub use commands::*;
pub use config::*;
pub use connection::*;
pub use constants::*;
pub use dispatcher::*;
pub use error::*;
pub use frame::*;
pub use pending::*;
pub use responses::*;
pub use transport::*;
pub use types::*;

pub use meshcore_packet as packet;
