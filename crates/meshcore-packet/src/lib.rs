//! MeshCore over-the-air formats.
//!
//! Pure codecs with no I/O:
//!
//! - [`buffer`]: byte cursor and writer shared by every other codec
//! - [`packet`]: the mesh packet envelope and its payload sub-formats
//! - [`advert`]: node advertisements and signature checks
//! - [`telemetry`]: CayenneLPP sensor records

pub mod advert;
pub mod buffer;
pub mod crypto;
mod error;
pub mod packet;
pub mod telemetry;

pub use advert::{Advert, AdvertAppData, AdvertType};
pub use buffer::{BufferReader, BufferWriter};
pub use crypto::{Ed25519Verifier, SignatureVerifier};
pub use error::PacketError;
pub use packet::{
    AckPayload, AnonRequestPayload, EncryptedPayload, Packet, ParsedPayload, PayloadType,
    RouteType,
};
pub use telemetry::{TelemetryEncoder, TelemetryRecord, TelemetryType, TelemetryValue};
