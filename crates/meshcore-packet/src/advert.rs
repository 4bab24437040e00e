//! Node self-advertisement.
//!
//! ## Advert Format
//!
//! | Field      | Size (bytes) | Description                              |
//! |------------|--------------|------------------------------------------|
//! | public_key | 32           | Ed25519 public key of the node           |
//! | timestamp  | 4            | Unix timestamp (LE)                      |
//! | signature  | 64           | Signature over public_key, timestamp and app_data |
//! | app_data   | rest         | Flags byte followed by optional fields   |
//!
//! App data fields, in order, each present only when its flag is set:
//! latitude/longitude (`0x10`, i32 LE each, 1e-6 degrees), feature1 (`0x20`,
//! u16 LE), feature2 (`0x40`, u16 LE), name (`0x80`, UTF-8, rest of buffer).

use crate::buffer::{BufferReader, BufferWriter};
use crate::crypto::{SignatureVerifier, PUBLIC_KEY_SIZE, SIGNATURE_SIZE};
use crate::PacketError;

/// Mask for the node type nibble of the flags byte.
pub const ADV_TYPE_MASK: u8 = 0x0F;
/// Flag: latitude and longitude follow.
pub const ADV_LATLON_MASK: u8 = 0x10;
/// Flag: feature1 field follows.
pub const ADV_FEAT1_MASK: u8 = 0x20;
/// Flag: feature2 field follows.
pub const ADV_FEAT2_MASK: u8 = 0x40;
/// Flag: name follows.
pub const ADV_NAME_MASK: u8 = 0x80;

/// Size of the fixed part of an advert (key, timestamp, signature).
pub const ADVERT_HEADER_SIZE: usize = PUBLIC_KEY_SIZE + 4 + SIGNATURE_SIZE;

/// Node type carried in the low nibble of the advert flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdvertType {
    None,
    Chat,
    Repeater,
    Room,
    Unknown(u8),
}

impl AdvertType {
    pub fn from_flags(flags: u8) -> Self {
        match flags & ADV_TYPE_MASK {
            0 => AdvertType::None,
            1 => AdvertType::Chat,
            2 => AdvertType::Repeater,
            3 => AdvertType::Room,
            other => AdvertType::Unknown(other),
        }
    }

    pub fn to_bits(self) -> u8 {
        match self {
            AdvertType::None => 0,
            AdvertType::Chat => 1,
            AdvertType::Repeater => 2,
            AdvertType::Room => 3,
            AdvertType::Unknown(bits) => bits & ADV_TYPE_MASK,
        }
    }
}

/// Decoded advert app data.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AdvertAppData {
    /// Raw flags byte.
    pub flags: u8,
    /// Latitude in micro-degrees.
    pub latitude: Option<i32>,
    /// Longitude in micro-degrees.
    pub longitude: Option<i32>,
    /// Advertised node name.
    pub name: Option<String>,
}

impl AdvertAppData {
    /// Node type from the flags byte.
    pub fn node_type(&self) -> AdvertType {
        AdvertType::from_flags(self.flags)
    }

    /// Decode app data bytes.
    pub fn from_bytes(data: &[u8]) -> Result<Self, PacketError> {
        let mut reader = BufferReader::new(data);
        let flags = reader.read_u8()?;

        let (latitude, longitude) = if flags & ADV_LATLON_MASK != 0 {
            (Some(reader.read_i32_le()?), Some(reader.read_i32_le()?))
        } else {
            (None, None)
        };

        // Feature fields are reserved; skip them so the name lines up.
        if flags & ADV_FEAT1_MASK != 0 {
            reader.read_u16_le()?;
        }
        if flags & ADV_FEAT2_MASK != 0 {
            reader.read_u16_le()?;
        }

        let name = if flags & ADV_NAME_MASK != 0 {
            Some(reader.read_string())
        } else {
            None
        };

        Ok(AdvertAppData {
            flags,
            latitude,
            longitude,
            name,
        })
    }

    /// Encode app data.
    ///
    /// The location and name flags are derived from the fields; the type
    /// nibble is taken from `flags`. Feature fields are never written.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut flags = self.flags & ADV_TYPE_MASK;
        let location = self.latitude.zip(self.longitude);
        if location.is_some() {
            flags |= ADV_LATLON_MASK;
        }
        if self.name.is_some() {
            flags |= ADV_NAME_MASK;
        }

        let mut writer = BufferWriter::new();
        writer.write_byte(flags);
        if let Some((lat, lon)) = location {
            writer.write_i32_le(lat);
            writer.write_i32_le(lon);
        }
        if let Some(name) = &self.name {
            writer.write_string(name);
        }
        writer.into_bytes()
    }
}

/// A signed node advertisement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advert {
    pub public_key: [u8; PUBLIC_KEY_SIZE],
    pub timestamp: u32,
    pub signature: [u8; SIGNATURE_SIZE],
    pub app_data: Vec<u8>,
}

impl Advert {
    /// Decode an advert payload.
    pub fn from_bytes(data: &[u8]) -> Result<Self, PacketError> {
        let mut reader = BufferReader::new(data);
        let public_key = reader.read_array::<PUBLIC_KEY_SIZE>()?;
        let timestamp = reader.read_u32_le()?;
        let signature = reader.read_array::<SIGNATURE_SIZE>()?;
        let app_data = reader.read_remaining().to_vec();

        Ok(Advert {
            public_key,
            timestamp,
            signature,
            app_data,
        })
    }

    /// Encode the advert.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut writer = BufferWriter::with_capacity(ADVERT_HEADER_SIZE + self.app_data.len());
        writer.write_bytes(&self.public_key);
        writer.write_u32_le(self.timestamp);
        writer.write_bytes(&self.signature);
        writer.write_bytes(&self.app_data);
        writer.into_bytes()
    }

    /// Flags byte, if any app data is present.
    pub fn flags(&self) -> Option<u8> {
        self.app_data.first().copied()
    }

    /// Node type, if any app data is present.
    pub fn node_type(&self) -> Option<AdvertType> {
        self.flags().map(AdvertType::from_flags)
    }

    /// Decode the app data section.
    pub fn parse_app_data(&self) -> Result<AdvertAppData, PacketError> {
        AdvertAppData::from_bytes(&self.app_data)
    }

    /// The bytes covered by the signature: `public_key || timestamp (LE) || app_data`.
    pub fn signed_message(&self) -> Vec<u8> {
        signed_message(&self.public_key, self.timestamp, &self.app_data)
    }

    /// Check the advert signature. Never fails; any problem yields false.
    pub fn is_verified<V: SignatureVerifier + ?Sized>(&self, verifier: &V) -> bool {
        verifier.verify(&self.public_key, &self.signed_message(), &self.signature)
    }
}

/// Build the message an advert signature covers.
pub fn signed_message(public_key: &[u8; PUBLIC_KEY_SIZE], timestamp: u32, app_data: &[u8]) -> Vec<u8> {
    let mut writer = BufferWriter::with_capacity(PUBLIC_KEY_SIZE + 4 + app_data.len());
    writer.write_bytes(public_key);
    writer.write_u32_le(timestamp);
    writer.write_bytes(app_data);
    writer.into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Ed25519Verifier;
    use ed25519_dalek::{Signer, SigningKey};

    fn signed_advert(seed: u8, timestamp: u32, app_data: Vec<u8>) -> Advert {
        let signing_key = SigningKey::from_bytes(&[seed; 32]);
        let public_key = signing_key.verifying_key().to_bytes();
        let message = signed_message(&public_key, timestamp, &app_data);
        let signature = signing_key.sign(&message).to_bytes();
        Advert {
            public_key,
            timestamp,
            signature,
            app_data,
        }
    }

    #[test]
    fn test_signature_verifies() {
        let app_data = AdvertAppData {
            flags: 0x01,
            latitude: None,
            longitude: None,
            name: Some("Alice".to_string()),
        }
        .to_bytes();
        let advert = signed_advert(42, 1_700_000_000, app_data);
        assert!(advert.is_verified(&Ed25519Verifier));
    }

    #[test]
    fn test_flipped_signature_byte_fails() {
        let advert = signed_advert(42, 1_700_000_000, vec![0x82]);
        for index in [0, 31, 32, 63] {
            let mut tampered = advert.clone();
            tampered.signature[index] ^= 0x01;
            assert!(!tampered.is_verified(&Ed25519Verifier), "byte {}", index);
        }
    }

    #[test]
    fn test_tampered_app_data_fails() {
        let mut advert = signed_advert(7, 123, vec![0x81, b'A']);
        advert.app_data[1] = b'B';
        assert!(!advert.is_verified(&Ed25519Verifier));
    }

    #[test]
    fn test_decode_round_trip() {
        let app_data = AdvertAppData {
            flags: 0x02,
            latitude: Some(-33_868_800),
            longitude: Some(151_209_300),
            name: Some("Repeater 1".to_string()),
        };
        let advert = signed_advert(1, 99, app_data.to_bytes());
        let bytes = advert.to_bytes();
        assert_eq!(bytes.len(), ADVERT_HEADER_SIZE + 1 + 8 + 10);

        let decoded = Advert::from_bytes(&bytes).unwrap();
        assert_eq!(decoded, advert);
        assert_eq!(decoded.node_type(), Some(AdvertType::Repeater));

        let parsed = decoded.parse_app_data().unwrap();
        assert_eq!(parsed.flags, 0x02 | ADV_LATLON_MASK | ADV_NAME_MASK);
        assert_eq!(parsed.latitude, Some(-33_868_800));
        assert_eq!(parsed.longitude, Some(151_209_300));
        assert_eq!(parsed.name.as_deref(), Some("Repeater 1"));
    }

    #[test]
    fn test_feature_fields_are_skipped() {
        let app_data = [
            ADV_FEAT1_MASK | ADV_FEAT2_MASK | ADV_NAME_MASK | 0x03,
            0x11,
            0x22,
            0x33,
            0x44,
            b'R',
            b'o',
            b'o',
            b'm',
        ];
        let parsed = AdvertAppData::from_bytes(&app_data).unwrap();
        assert_eq!(parsed.node_type(), AdvertType::Room);
        assert_eq!(parsed.latitude, None);
        assert_eq!(parsed.name.as_deref(), Some("Room"));
    }

    #[test]
    fn test_truncated_advert() {
        assert!(Advert::from_bytes(&[0u8; ADVERT_HEADER_SIZE - 1]).is_err());

        let advert = Advert::from_bytes(&[0u8; ADVERT_HEADER_SIZE]).unwrap();
        assert!(advert.app_data.is_empty());
        assert_eq!(advert.flags(), None);
        assert!(advert.parse_app_data().is_err());
    }

    #[test]
    fn test_truncated_location_is_error() {
        let err = AdvertAppData::from_bytes(&[ADV_LATLON_MASK, 1, 2, 3]).unwrap_err();
        assert!(matches!(err, PacketError::Truncated { .. }));
    }
}
