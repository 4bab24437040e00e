//! Packet envelope encoding and decoding.
//!
//! ## Packet Format
//!
//! | Field    | Size (bytes) | Description                                               |
//! |----------|--------------|-----------------------------------------------------------|
//! | header   | 1            | Contains routing type, payload type, and payload version. |
//! | path_len | 1            | Length of the path field in bytes (signed on the wire).   |
//! | path     | path_len     | Stores the routing path if applicable.                    |
//! | payload  | rest         | The actual data being transmitted.                        |
//!
//! Header bit layout: `VVPPPPRR` (version, payload type, route type).

use serde::Serialize;

use crate::advert::Advert;
use crate::buffer::{BufferReader, BufferWriter};
use crate::PacketError;

/// Mask for the route type bits of the header.
pub const PH_ROUTE_MASK: u8 = 0x03;
/// Shift for the payload type bits of the header.
pub const PH_TYPE_SHIFT: u8 = 2;
/// Mask for the payload type bits (after shifting).
pub const PH_TYPE_MASK: u8 = 0x0F;
/// Shift for the payload version bits of the header.
pub const PH_VER_SHIFT: u8 = 6;
/// Mask for the payload version bits (after shifting).
pub const PH_VER_MASK: u8 = 0x03;

/// Header value marking a packet that must not be retransmitted.
pub const DO_NOT_RETRANSMIT_HEADER: u8 = 0xFF;

/// Maximum path size accepted when building a packet.
pub const MAX_PATH_SIZE: usize = 64;

/// Size of a public key in bytes.
pub const PUB_KEY_SIZE: usize = 32;

// ============================================================================
// Header Fields
// ============================================================================

/// Routing mode encoded in the low two header bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RouteType {
    /// Reserved (0).
    Reserved1,
    /// Flood mode, the path is built up as the packet propagates (1).
    Flood,
    /// Direct route along a supplied path (2).
    Direct,
    /// Reserved (3).
    Reserved2,
}

impl RouteType {
    /// Decode from the two route bits.
    pub fn from_bits(bits: u8) -> Self {
        match bits & PH_ROUTE_MASK {
            0x01 => RouteType::Flood,
            0x02 => RouteType::Direct,
            0x03 => RouteType::Reserved2,
            _ => RouteType::Reserved1,
        }
    }

    /// Encode to the two route bits.
    pub fn to_bits(self) -> u8 {
        match self {
            RouteType::Reserved1 => 0x00,
            RouteType::Flood => 0x01,
            RouteType::Direct => 0x02,
            RouteType::Reserved2 => 0x03,
        }
    }
}

/// Payload kind encoded in header bits 2..6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PayloadType {
    /// Request (dest/src hashes, MAC, encrypted timestamp + blob).
    Request,
    /// Response to a REQ or ANON_REQ.
    Response,
    /// Plain text message.
    TextMessage,
    /// Simple acknowledgement.
    Ack,
    /// Node advertising its identity.
    Advert,
    /// Unverified group text message.
    GroupText,
    /// Unverified group datagram.
    GroupData,
    /// Anonymous request carrying the sender's public key.
    AnonRequest,
    /// Returned path.
    Path,
    /// Trace of a path with per-hop SNR.
    Trace,
    /// Custom raw payload.
    RawCustom,
    /// Any value not assigned above.
    Unknown(u8),
}

impl PayloadType {
    /// Decode from the four payload type bits.
    pub fn from_bits(bits: u8) -> Self {
        match bits & PH_TYPE_MASK {
            0x00 => PayloadType::Request,
            0x01 => PayloadType::Response,
            0x02 => PayloadType::TextMessage,
            0x03 => PayloadType::Ack,
            0x04 => PayloadType::Advert,
            0x05 => PayloadType::GroupText,
            0x06 => PayloadType::GroupData,
            0x07 => PayloadType::AnonRequest,
            0x08 => PayloadType::Path,
            0x09 => PayloadType::Trace,
            0x0F => PayloadType::RawCustom,
            other => PayloadType::Unknown(other),
        }
    }

    /// Encode to the four payload type bits.
    pub fn to_bits(self) -> u8 {
        match self {
            PayloadType::Request => 0x00,
            PayloadType::Response => 0x01,
            PayloadType::TextMessage => 0x02,
            PayloadType::Ack => 0x03,
            PayloadType::Advert => 0x04,
            PayloadType::GroupText => 0x05,
            PayloadType::GroupData => 0x06,
            PayloadType::AnonRequest => 0x07,
            PayloadType::Path => 0x08,
            PayloadType::Trace => 0x09,
            PayloadType::RawCustom => 0x0F,
            PayloadType::Unknown(bits) => bits & PH_TYPE_MASK,
        }
    }

    /// Protocol name of the payload type.
    pub fn name(self) -> &'static str {
        match self {
            PayloadType::Request => "REQ",
            PayloadType::Response => "RESPONSE",
            PayloadType::TextMessage => "TXT_MSG",
            PayloadType::Ack => "ACK",
            PayloadType::Advert => "ADVERT",
            PayloadType::GroupText => "GRP_TXT",
            PayloadType::GroupData => "GRP_DATA",
            PayloadType::AnonRequest => "ANON_REQ",
            PayloadType::Path => "PATH",
            PayloadType::Trace => "TRACE",
            PayloadType::RawCustom => "RAW_CUSTOM",
            PayloadType::Unknown(_) => "UNKNOWN",
        }
    }
}

// ============================================================================
// Packet
// ============================================================================

/// An over-the-air mesh packet.
///
/// The header is kept as the raw byte; route type, payload type and version
/// are derived from it on demand so that [`Packet::mark_do_not_retransmit`]
/// is reflected everywhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Packet {
    /// Raw header byte.
    pub header: u8,
    /// Routing path (one hash byte per hop).
    pub path: Vec<u8>,
    /// Payload bytes.
    pub payload: Vec<u8>,
}

impl Packet {
    /// Build a packet from typed header fields.
    pub fn new(
        route_type: RouteType,
        payload_type: PayloadType,
        version: u8,
        path: Vec<u8>,
        payload: Vec<u8>,
    ) -> Result<Self, PacketError> {
        if path.len() > MAX_PATH_SIZE {
            return Err(PacketError::PathTooLong {
                len: path.len(),
                max: MAX_PATH_SIZE,
            });
        }
        let header = route_type.to_bits()
            | (payload_type.to_bits() << PH_TYPE_SHIFT)
            | ((version & PH_VER_MASK) << PH_VER_SHIFT);
        Ok(Packet {
            header,
            path,
            payload,
        })
    }

    /// Decode a packet from bytes.
    pub fn from_bytes(data: &[u8]) -> Result<Self, PacketError> {
        let mut reader = BufferReader::new(data);
        let header = reader.read_u8()?;

        let path_len = reader.read_i8()?;
        if path_len < 0 {
            return Err(PacketError::InvalidPathLength(path_len));
        }

        let path = reader.read_bytes(path_len as usize)?.to_vec();
        let payload = reader.read_remaining().to_vec();

        Ok(Packet {
            header,
            path,
            payload,
        })
    }

    /// Encode the packet to bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, PacketError> {
        if self.path.len() > MAX_PATH_SIZE {
            return Err(PacketError::PathTooLong {
                len: self.path.len(),
                max: MAX_PATH_SIZE,
            });
        }
        let mut writer = BufferWriter::with_capacity(2 + self.path.len() + self.payload.len());
        writer.write_byte(self.header);
        writer.write_byte(self.path.len() as u8);
        writer.write_bytes(&self.path);
        writer.write_bytes(&self.payload);
        Ok(writer.into_bytes())
    }

    /// Route type from the header.
    pub fn route_type(&self) -> RouteType {
        RouteType::from_bits(self.header)
    }

    /// Payload type from the header.
    pub fn payload_type(&self) -> PayloadType {
        PayloadType::from_bits(self.header >> PH_TYPE_SHIFT)
    }

    /// Payload version from the header.
    pub fn version(&self) -> u8 {
        (self.header >> PH_VER_SHIFT) & PH_VER_MASK
    }

    pub fn is_route_flood(&self) -> bool {
        self.route_type() == RouteType::Flood
    }

    pub fn is_route_direct(&self) -> bool {
        self.route_type() == RouteType::Direct
    }

    /// Mark the packet as "do not retransmit".
    ///
    /// This overwrites the whole header with `0xFF`; the original route and
    /// payload type cannot be recovered afterwards.
    pub fn mark_do_not_retransmit(&mut self) {
        self.header = DO_NOT_RETRANSMIT_HEADER;
    }

    pub fn is_marked_do_not_retransmit(&self) -> bool {
        self.header == DO_NOT_RETRANSMIT_HEADER
    }

    /// Parse the payload according to the header's payload type.
    ///
    /// Returns `Ok(None)` for payload types that have no structured form
    /// here (group messages, trace, raw custom and unassigned types).
    pub fn parse_payload(&self) -> Result<Option<ParsedPayload>, PacketError> {
        let data = self.payload.as_slice();
        let parsed = match self.payload_type() {
            PayloadType::Request => ParsedPayload::Request(EncryptedPayload::decode(data)?),
            PayloadType::Response => ParsedPayload::Response(EncryptedPayload::decode(data)?),
            PayloadType::TextMessage => {
                ParsedPayload::TextMessage(EncryptedPayload::decode(data)?)
            }
            PayloadType::Path => ParsedPayload::Path(EncryptedPayload::decode(data)?),
            PayloadType::Ack => ParsedPayload::Ack(AckPayload {
                ack_code: data.to_vec(),
            }),
            PayloadType::Advert => ParsedPayload::Advert(Advert::from_bytes(data)?),
            PayloadType::AnonRequest => {
                ParsedPayload::AnonRequest(AnonRequestPayload::decode(data)?)
            }
            PayloadType::GroupText
            | PayloadType::GroupData
            | PayloadType::Trace
            | PayloadType::RawCustom
            | PayloadType::Unknown(_) => return Ok(None),
        };
        Ok(Some(parsed))
    }
}

// ============================================================================
// Payload Sub-formats
// ============================================================================

/// Structured view of a packet payload.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedPayload {
    /// REQ payload.
    Request(EncryptedPayload),
    /// RESPONSE payload.
    Response(EncryptedPayload),
    /// TXT_MSG payload.
    TextMessage(EncryptedPayload),
    /// PATH payload.
    Path(EncryptedPayload),
    /// ACK payload.
    Ack(AckPayload),
    /// ADVERT payload.
    Advert(Advert),
    /// ANON_REQ payload.
    AnonRequest(AnonRequestPayload),
}

/// Payload prefixed with one-byte destination and source hashes.
///
/// Format: dest_hash(1) + src_hash(1) + encrypted blob (MAC + ciphertext).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EncryptedPayload {
    /// First byte of the destination's public key.
    pub dest_hash: u8,
    /// First byte of the source's public key.
    pub src_hash: u8,
    /// Remaining encrypted bytes.
    pub encrypted: Vec<u8>,
}

impl EncryptedPayload {
    fn decode(data: &[u8]) -> Result<Self, PacketError> {
        let mut reader = BufferReader::new(data);
        let dest_hash = reader.read_u8()?;
        let src_hash = reader.read_u8()?;
        Ok(EncryptedPayload {
            dest_hash,
            src_hash,
            encrypted: reader.read_remaining().to_vec(),
        })
    }
}

/// Acknowledgement payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AckPayload {
    /// Raw ack code bytes.
    pub ack_code: Vec<u8>,
}

impl AckPayload {
    /// The ack code as a little-endian CRC, when it is exactly four bytes.
    pub fn checksum(&self) -> Option<u32> {
        let bytes: [u8; 4] = self.ack_code.as_slice().try_into().ok()?;
        Some(u32::from_le_bytes(bytes))
    }
}

/// Anonymous request payload.
///
/// Format: dest_hash(1) + sender public key(32) + encrypted blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnonRequestPayload {
    /// First byte of the destination's public key.
    pub dest_hash: u8,
    /// Sender's full public key.
    pub src_public_key: [u8; PUB_KEY_SIZE],
    /// Remaining encrypted bytes.
    pub encrypted: Vec<u8>,
}

impl AnonRequestPayload {
    fn decode(data: &[u8]) -> Result<Self, PacketError> {
        let mut reader = BufferReader::new(data);
        let dest_hash = reader.read_u8()?;
        let src_public_key = reader.read_array::<PUB_KEY_SIZE>()?;
        Ok(AnonRequestPayload {
            dest_hash,
            src_public_key,
            encrypted: reader.read_remaining().to_vec(),
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const DIRECT_REQ: &str = "0200B401DF6528CC9778A56F36FE9399A5CF6B0C7EDE";

    #[test]
    fn test_decode_direct_request() {
        let bytes = hex::decode(DIRECT_REQ).unwrap();
        let packet = Packet::from_bytes(&bytes).unwrap();

        assert_eq!(packet.header, 0x02);
        assert_eq!(packet.route_type(), RouteType::Direct);
        assert_eq!(packet.route_type().to_bits(), 2);
        assert_eq!(packet.payload_type(), PayloadType::Request);
        assert_eq!(packet.version(), 0);
        assert!(packet.path.is_empty());
        assert_eq!(packet.payload, bytes[2..].to_vec());

        match packet.parse_payload().unwrap() {
            Some(ParsedPayload::Request(req)) => {
                assert_eq!(req.dest_hash, 0xB4);
                assert_eq!(req.src_hash, 0x01);
                assert_eq!(req.encrypted, bytes[4..].to_vec());
            }
            other => panic!("Expected Request payload, got {:?}", other),
        }
    }

    #[test]
    fn test_packet_with_path() {
        let packet = Packet::new(
            RouteType::Flood,
            PayloadType::Ack,
            0,
            vec![0x01, 0x02, 0x03],
            vec![0xEF, 0xBE, 0xAD, 0xDE],
        )
        .unwrap();

        let encoded = packet.to_bytes().unwrap();
        assert_eq!(encoded[1], 3);

        let decoded = Packet::from_bytes(&encoded).unwrap();
        assert_eq!(decoded, packet);
        assert!(decoded.is_route_flood());

        match decoded.parse_payload().unwrap() {
            Some(ParsedPayload::Ack(ack)) => assert_eq!(ack.checksum(), Some(0xDEADBEEF)),
            other => panic!("Expected Ack payload, got {:?}", other),
        }
    }

    #[test]
    fn test_header_bit_fields() {
        let packet = Packet::new(RouteType::Direct, PayloadType::Path, 2, vec![], vec![]).unwrap();
        assert_eq!(packet.header, 0b10_1000_10);
        assert_eq!(packet.version(), 2);
        assert_eq!(packet.payload_type(), PayloadType::Path);
        assert_eq!(PayloadType::from_bits(0x0A), PayloadType::Unknown(0x0A));
        assert_eq!(PayloadType::Unknown(0x0A).name(), "UNKNOWN");
    }

    #[test]
    fn test_negative_path_length_is_rejected() {
        let err = Packet::from_bytes(&[0x02, 0xFF, 0x00]).unwrap_err();
        assert_eq!(err, PacketError::InvalidPathLength(-1));
    }

    #[test]
    fn test_path_longer_than_buffer_is_truncated_error() {
        let err = Packet::from_bytes(&[0x02, 0x05, 0x01, 0x02]).unwrap_err();
        assert!(matches!(err, PacketError::Truncated { needed: 5, .. }));
    }

    #[test]
    fn test_decode_too_short() {
        assert!(Packet::from_bytes(&[]).is_err());
        assert!(Packet::from_bytes(&[0x11]).is_err());
    }

    #[test]
    fn test_build_rejects_long_path() {
        let err = Packet::new(RouteType::Direct, PayloadType::Ack, 0, vec![0; 65], vec![])
            .unwrap_err();
        assert_eq!(err, PacketError::PathTooLong { len: 65, max: 64 });
    }

    #[test]
    fn test_mark_do_not_retransmit() {
        let mut packet =
            Packet::new(RouteType::Flood, PayloadType::TextMessage, 0, vec![], vec![1, 2]).unwrap();
        assert!(!packet.is_marked_do_not_retransmit());

        packet.mark_do_not_retransmit();
        assert!(packet.is_marked_do_not_retransmit());
        assert_eq!(packet.header, 0xFF);
        assert_eq!(packet.route_type(), RouteType::Reserved2);
        assert_eq!(packet.payload_type(), PayloadType::RawCustom);
        assert_eq!(packet.version(), 3);
    }

    #[test]
    fn test_anon_request_payload() {
        let mut payload = vec![0x42];
        payload.extend_from_slice(&[0xAB; 32]);
        payload.extend_from_slice(&[9, 8, 7]);
        let packet =
            Packet::new(RouteType::Flood, PayloadType::AnonRequest, 0, vec![], payload).unwrap();

        match packet.parse_payload().unwrap() {
            Some(ParsedPayload::AnonRequest(anon)) => {
                assert_eq!(anon.dest_hash, 0x42);
                assert_eq!(anon.src_public_key, [0xAB; 32]);
                assert_eq!(anon.encrypted, vec![9, 8, 7]);
            }
            other => panic!("Expected AnonRequest payload, got {:?}", other),
        }
    }

    #[test]
    fn test_short_anon_request_is_error() {
        let packet =
            Packet::new(RouteType::Flood, PayloadType::AnonRequest, 0, vec![], vec![0x42; 10])
                .unwrap();
        assert!(packet.parse_payload().is_err());
    }

    #[test]
    fn test_group_text_has_no_structured_payload() {
        let packet =
            Packet::new(RouteType::Flood, PayloadType::GroupText, 0, vec![], vec![1, 2, 3]).unwrap();
        assert_eq!(packet.parse_payload().unwrap(), None);
    }
}
