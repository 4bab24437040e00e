//! Typed payloads carried by commands and events.

use meshcore_packet::{BufferReader, BufferWriter, Packet, PacketError, TelemetryRecord};

use crate::constants::*;
use crate::error::ProtocolError;

/// A 32-byte public key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PublicKey(pub [u8; PUB_KEY_SIZE]);

impl PublicKey {
    pub fn new(bytes: [u8; PUB_KEY_SIZE]) -> Self {
        PublicKey(bytes)
    }

    /// Create from a slice. Returns None if slice is wrong length.
    pub fn from_slice(slice: &[u8]) -> Option<Self> {
        let bytes: [u8; PUB_KEY_SIZE] = slice.try_into().ok()?;
        Some(PublicKey(bytes))
    }

    /// Parse a 64-character hex string.
    pub fn from_hex(text: &str) -> Result<Self, ProtocolError> {
        let bytes = hex::decode(text)
            .map_err(|e| ProtocolError::InvalidData(format!("public key hex: {}", e)))?;
        PublicKey::from_slice(&bytes).ok_or_else(|| {
            ProtocolError::InvalidData(format!(
                "public key must be {} bytes, got {}",
                PUB_KEY_SIZE,
                bytes.len()
            ))
        })
    }

    /// The 6-byte prefix used to address pushes and messages.
    pub fn prefix(&self) -> PublicKeyPrefix {
        PublicKeyPrefix::from(self)
    }

    pub fn as_bytes(&self) -> &[u8; PUB_KEY_SIZE] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl std::fmt::Display for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl AsRef<[u8]> for PublicKey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// A 6-byte public key prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PublicKeyPrefix(pub [u8; PUB_KEY_PREFIX_SIZE]);

impl PublicKeyPrefix {
    pub fn new(bytes: [u8; PUB_KEY_PREFIX_SIZE]) -> Self {
        PublicKeyPrefix(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; PUB_KEY_PREFIX_SIZE] {
        &self.0
    }

    /// Whether this prefix belongs to `key`.
    pub fn matches(&self, key: &PublicKey) -> bool {
        key.0.starts_with(&self.0)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    fn read(reader: &mut BufferReader<'_>) -> Result<Self, PacketError> {
        Ok(PublicKeyPrefix(reader.read_array()?))
    }
}

impl From<&PublicKey> for PublicKeyPrefix {
    fn from(key: &PublicKey) -> Self {
        let mut prefix = [0u8; PUB_KEY_PREFIX_SIZE];
        prefix.copy_from_slice(&key.0[..PUB_KEY_PREFIX_SIZE]);
        PublicKeyPrefix(prefix)
    }
}

// ============================================================================
// Contacts and Channels
// ============================================================================

/// A contact record as stored on the device.
///
/// Returned snapshots belong to the caller; changes are pushed back with
/// `add_or_update_contact`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contact {
    pub public_key: PublicKey,
    /// Node type (chat, repeater, room).
    pub contact_type: u8,
    pub flags: u8,
    /// Outbound path length, -1 when no direct path is known.
    pub out_path_len: i8,
    pub out_path: [u8; MAX_PATH_SIZE],
    /// Advertised name (up to 31 bytes).
    pub name: String,
    pub last_advert: u32,
    /// Latitude in micro-degrees.
    pub adv_lat: i32,
    /// Longitude in micro-degrees.
    pub adv_lon: i32,
    pub last_modified: u32,
}

impl Default for Contact {
    fn default() -> Self {
        Contact {
            public_key: PublicKey::default(),
            contact_type: 1,
            flags: 0,
            out_path_len: -1,
            out_path: [0u8; MAX_PATH_SIZE],
            name: String::new(),
            last_advert: 0,
            adv_lat: 0,
            adv_lon: 0,
            last_modified: 0,
        }
    }
}

impl Contact {
    /// Decode a contact record. Location and last-modified fields are
    /// optional on older firmware.
    pub(crate) fn read(reader: &mut BufferReader<'_>) -> Result<Self, PacketError> {
        let public_key = PublicKey(reader.read_array()?);
        let contact_type = reader.read_u8()?;
        let flags = reader.read_u8()?;
        let out_path_len = reader.read_i8()?;
        let out_path = reader.read_array::<MAX_PATH_SIZE>()?;
        let name = reader.read_cstring(MAX_NAME_SIZE)?;
        let last_advert = reader.read_u32_le()?;

        let mut contact = Contact {
            public_key,
            contact_type,
            flags,
            out_path_len,
            out_path,
            name,
            last_advert,
            ..Contact::default()
        };

        if reader.remaining() >= 8 {
            contact.adv_lat = reader.read_i32_le()?;
            contact.adv_lon = reader.read_i32_le()?;
            if reader.remaining() >= 4 {
                contact.last_modified = reader.read_u32_le()?;
            }
        }
        Ok(contact)
    }

    /// The known outbound path, empty when flooding.
    pub fn path(&self) -> &[u8] {
        let len = (self.out_path_len.max(0) as usize).min(MAX_PATH_SIZE);
        &self.out_path[..len]
    }

    pub fn has_direct_path(&self) -> bool {
        self.out_path_len >= 0
    }

    pub fn latitude(&self) -> f64 {
        self.adv_lat as f64 / 1_000_000.0
    }

    pub fn longitude(&self) -> f64 {
        self.adv_lon as f64 / 1_000_000.0
    }
}

/// A group channel slot.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Channel {
    pub index: u8,
    pub name: String,
    pub secret: [u8; CHANNEL_SECRET_SIZE],
}

impl Channel {
    pub(crate) fn read(reader: &mut BufferReader<'_>) -> Result<Self, PacketError> {
        Ok(Channel {
            index: reader.read_u8()?,
            name: reader.read_cstring(MAX_NAME_SIZE)?,
            secret: reader.read_array()?,
        })
    }

    /// Whether the slot is unused (no name and an all-zero secret).
    pub fn is_empty(&self) -> bool {
        self.name.is_empty() && self.secret.iter().all(|&b| b == 0)
    }
}

// ============================================================================
// Device Information
// ============================================================================

/// Self/node information returned by `AppStart`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SelfInfo {
    pub advert_type: u8,
    pub tx_power_dbm: u8,
    pub max_tx_power_dbm: u8,
    pub public_key: PublicKey,
    /// Latitude in micro-degrees.
    pub adv_lat: i32,
    /// Longitude in micro-degrees.
    pub adv_lon: i32,
    pub multi_acks: u8,
    pub advert_loc_policy: u8,
    pub telemetry_modes: u8,
    pub manual_add_contacts: u8,
    /// Radio frequency in kHz.
    pub freq_khz: u32,
    /// Radio bandwidth in Hz.
    pub bandwidth_hz: u32,
    pub spreading_factor: u8,
    pub coding_rate: u8,
    pub name: String,
}

impl SelfInfo {
    pub(crate) fn read(reader: &mut BufferReader<'_>) -> Result<Self, PacketError> {
        Ok(SelfInfo {
            advert_type: reader.read_u8()?,
            tx_power_dbm: reader.read_u8()?,
            max_tx_power_dbm: reader.read_u8()?,
            public_key: PublicKey(reader.read_array()?),
            adv_lat: reader.read_i32_le()?,
            adv_lon: reader.read_i32_le()?,
            multi_acks: reader.read_u8()?,
            advert_loc_policy: reader.read_u8()?,
            telemetry_modes: reader.read_u8()?,
            manual_add_contacts: reader.read_u8()?,
            freq_khz: reader.read_u32_le()?,
            bandwidth_hz: reader.read_u32_le()?,
            spreading_factor: reader.read_u8()?,
            coding_rate: reader.read_u8()?,
            name: {
                let rest = reader.read_remaining();
                let end = rest.iter().position(|&b| b == 0).unwrap_or(rest.len());
                String::from_utf8_lossy(&rest[..end]).into_owned()
            },
        })
    }

    pub fn frequency_mhz(&self) -> f64 {
        self.freq_khz as f64 / 1000.0
    }

    pub fn bandwidth_khz(&self) -> f64 {
        self.bandwidth_hz as f64 / 1000.0
    }
}

/// Device information returned by `DeviceQuery`.
///
/// Firmware older than protocol version 3 only reports the version code.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeviceInfo {
    pub firmware_version_code: u8,
    /// Maximum contacts divided by two.
    pub max_contacts_half: u8,
    pub max_group_channels: u8,
    pub ble_pin: u32,
    pub build_date: String,
    pub manufacturer: String,
    pub firmware_version: String,
}

impl DeviceInfo {
    const EXTENDED_SIZE: usize = 1 + 1 + 4 + 12 + 40 + 20;

    pub(crate) fn read(reader: &mut BufferReader<'_>) -> Result<Self, PacketError> {
        let mut info = DeviceInfo {
            firmware_version_code: reader.read_u8()?,
            ..DeviceInfo::default()
        };
        if reader.remaining() >= Self::EXTENDED_SIZE {
            info.max_contacts_half = reader.read_u8()?;
            info.max_group_channels = reader.read_u8()?;
            info.ble_pin = reader.read_u32_le()?;
            info.build_date = reader.read_cstring(12)?;
            info.manufacturer = reader.read_cstring(40)?;
            info.firmware_version = reader.read_cstring(20)?;
        }
        Ok(info)
    }

    pub fn max_contacts(&self) -> usize {
        (self.max_contacts_half as usize) * 2
    }
}

/// Battery voltage, plus storage use when the firmware reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatteryStatus {
    pub millivolts: u16,
    pub storage_used_kb: Option<u32>,
    pub storage_total_kb: Option<u32>,
}

impl BatteryStatus {
    pub(crate) fn read(reader: &mut BufferReader<'_>) -> Result<Self, PacketError> {
        let millivolts = reader.read_u16_le()?;
        let (storage_used_kb, storage_total_kb) = if reader.remaining() >= 8 {
            (Some(reader.read_u32_le()?), Some(reader.read_u32_le()?))
        } else {
            (None, None)
        };
        Ok(BatteryStatus {
            millivolts,
            storage_used_kb,
            storage_total_kb,
        })
    }

    pub fn volts(&self) -> f32 {
        self.millivolts as f32 / 1000.0
    }
}

/// Radio parameters for `SetRadioParams`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RadioParams {
    /// Frequency in kHz.
    pub freq_khz: u32,
    /// Bandwidth in Hz.
    pub bandwidth_hz: u32,
    /// Spreading factor (5-12).
    pub spreading_factor: u8,
    /// Coding rate (5-8).
    pub coding_rate: u8,
}

impl Default for RadioParams {
    fn default() -> Self {
        RadioParams {
            freq_khz: 910_525,
            bandwidth_hz: 62_500,
            spreading_factor: 7,
            coding_rate: 5,
        }
    }
}

/// Tuning parameters, scaled by 1000 on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TuningParams {
    pub rx_delay_base: u32,
    pub airtime_factor: u32,
}

/// Optional settings written by `SetOtherParams`.
///
/// Trailing options are only sent when every earlier one is present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OtherParams {
    pub manual_add_contacts: bool,
    pub telemetry_modes: Option<u8>,
    pub advert_loc_policy: Option<u8>,
}

/// Recorded path of the last advert heard from a contact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvertPath {
    pub recv_timestamp: u32,
    pub path: Vec<u8>,
}

// ============================================================================
// Messages
// ============================================================================

/// Message type for text messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextType {
    Plain,
    CliData,
    SignedPlain,
    Unknown(u8),
}

impl From<u8> for TextType {
    fn from(value: u8) -> Self {
        match value {
            TXT_TYPE_PLAIN => TextType::Plain,
            TXT_TYPE_CLI_DATA => TextType::CliData,
            TXT_TYPE_SIGNED_PLAIN => TextType::SignedPlain,
            _ => TextType::Unknown(value),
        }
    }
}

impl From<TextType> for u8 {
    fn from(value: TextType) -> Self {
        match value {
            TextType::Plain => TXT_TYPE_PLAIN,
            TextType::CliData => TXT_TYPE_CLI_DATA,
            TextType::SignedPlain => TXT_TYPE_SIGNED_PLAIN,
            TextType::Unknown(v) => v,
        }
    }
}

/// A text message received from a contact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactMessage {
    pub sender_prefix: PublicKeyPrefix,
    /// Path length (0xFF = flood).
    pub path_len: u8,
    pub text_type: TextType,
    pub sender_timestamp: u32,
    /// SNR scaled by 4 (v3 layout only).
    pub snr_x4: Option<i8>,
    /// Signer prefix for signed messages.
    pub extra: Vec<u8>,
    pub text: String,
}

impl ContactMessage {
    pub(crate) fn read(reader: &mut BufferReader<'_>, v3: bool) -> Result<Self, PacketError> {
        let snr_x4 = if v3 {
            let snr = reader.read_i8()?;
            reader.read_bytes(2)?;
            Some(snr)
        } else {
            None
        };
        let sender_prefix = PublicKeyPrefix::read(reader)?;
        let path_len = reader.read_u8()?;
        let text_type = TextType::from(reader.read_u8()?);
        let sender_timestamp = reader.read_u32_le()?;
        let extra = if text_type == TextType::SignedPlain && reader.remaining() >= 4 {
            reader.read_bytes(4)?.to_vec()
        } else {
            Vec::new()
        };
        Ok(ContactMessage {
            sender_prefix,
            path_len,
            text_type,
            sender_timestamp,
            snr_x4,
            extra,
            text: reader.read_string(),
        })
    }

    pub fn snr(&self) -> Option<f32> {
        self.snr_x4.map(|s| s as f32 / 4.0)
    }

    pub fn is_flood(&self) -> bool {
        self.path_len == 0xFF
    }
}

/// A text message received on a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelMessage {
    pub channel_idx: u8,
    /// Path length (0xFF = flood).
    pub path_len: u8,
    pub text_type: TextType,
    pub sender_timestamp: u32,
    /// SNR scaled by 4 (v3 layout only).
    pub snr_x4: Option<i8>,
    pub text: String,
}

impl ChannelMessage {
    pub(crate) fn read(reader: &mut BufferReader<'_>, v3: bool) -> Result<Self, PacketError> {
        let snr_x4 = if v3 {
            let snr = reader.read_i8()?;
            reader.read_bytes(2)?;
            Some(snr)
        } else {
            None
        };
        Ok(ChannelMessage {
            channel_idx: reader.read_u8()?,
            path_len: reader.read_u8()?,
            text_type: TextType::from(reader.read_u8()?),
            sender_timestamp: reader.read_u32_le()?,
            snr_x4,
            text: reader.read_string(),
        })
    }

    pub fn snr(&self) -> Option<f32> {
        self.snr_x4.map(|s| s as f32 / 4.0)
    }
}

/// A message popped from the device queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceivedMessage {
    Contact(ContactMessage),
    Channel(ChannelMessage),
}

// ============================================================================
// Correlated Replies
// ============================================================================

/// Acceptance reply to a command that goes out over the air.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SentInfo {
    pub is_flood: bool,
    /// Ack code or tag the matching push will carry.
    pub expected_ack: u32,
    /// Device estimate of the round trip, in milliseconds.
    pub est_timeout_ms: u32,
}

/// Successful login push.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoginSuccess {
    pub is_admin: bool,
    pub server_prefix: PublicKeyPrefix,
    /// Server clock (newer firmware).
    pub server_timestamp: Option<u32>,
    pub acl_permissions: Option<u8>,
    pub firmware_ver_level: Option<u8>,
}

impl LoginSuccess {
    pub(crate) fn read(reader: &mut BufferReader<'_>) -> Result<Self, PacketError> {
        let is_admin = reader.read_u8()? != 0;
        let server_prefix = PublicKeyPrefix::read(reader)?;
        let server_timestamp = if reader.remaining() >= 4 {
            Some(reader.read_u32_le()?)
        } else {
            None
        };
        Ok(LoginSuccess {
            is_admin,
            server_prefix,
            server_timestamp,
            acl_permissions: reader.read_u8().ok(),
            firmware_ver_level: reader.read_u8().ok(),
        })
    }
}

/// Result of a trace along an explicit path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceData {
    pub flags: u8,
    pub tag: u32,
    pub auth_code: u32,
    pub path_hashes: Vec<u8>,
    /// Per-hop SNR, scaled by 4.
    pub path_snrs: Vec<i8>,
    /// SNR of the final hop back to this node, scaled by 4.
    pub final_snr_x4: i8,
}

impl TraceData {
    pub(crate) fn read(reader: &mut BufferReader<'_>) -> Result<Self, PacketError> {
        reader.read_u8()?;
        let path_len = reader.read_u8()? as usize;
        let flags = reader.read_u8()?;
        let tag = reader.read_u32_le()?;
        let auth_code = reader.read_u32_le()?;
        let path_hashes = reader.read_bytes(path_len)?.to_vec();
        let hash_size_shift = flags & 0x03;
        let snr_count = path_len >> hash_size_shift;
        let path_snrs = reader
            .read_bytes(snr_count)?
            .iter()
            .map(|&b| b as i8)
            .collect();
        let final_snr_x4 = reader.read_i8()?;
        Ok(TraceData {
            flags,
            tag,
            auth_code,
            path_hashes,
            path_snrs,
            final_snr_x4,
        })
    }
}

/// Round-trip path discovered to a contact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathDiscovery {
    pub target_prefix: PublicKeyPrefix,
    pub out_path: Vec<u8>,
    pub in_path: Vec<u8>,
}

impl PathDiscovery {
    pub(crate) fn read(reader: &mut BufferReader<'_>) -> Result<Self, PacketError> {
        reader.read_u8()?;
        let target_prefix = PublicKeyPrefix::read(reader)?;
        let out_len = reader.read_u8()? as usize;
        let out_path = reader.read_bytes(out_len)?.to_vec();
        let in_len = reader.read_u8()? as usize;
        let in_path = reader.read_bytes(in_len)?.to_vec();
        Ok(PathDiscovery {
            target_prefix,
            out_path,
            in_path,
        })
    }
}

/// Raw over-the-air packet reported by the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RxLog {
    /// SNR scaled by 4.
    pub snr_x4: i8,
    pub rssi: i8,
    pub raw: Vec<u8>,
}

impl RxLog {
    /// Decode the logged bytes as a mesh packet.
    pub fn packet(&self) -> Result<Packet, PacketError> {
        Packet::from_bytes(&self.raw)
    }

    pub fn snr(&self) -> f32 {
        self.snr_x4 as f32 / 4.0
    }
}

/// Status counters reported by a repeater.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RepeaterStatus {
    pub batt_milli_volts: u16,
    pub curr_tx_queue_len: u16,
    pub noise_floor: i16,
    pub last_rssi: i16,
    pub n_packets_recv: u32,
    pub n_packets_sent: u32,
    pub total_air_time_secs: u32,
    pub total_up_time_secs: u32,
    pub n_sent_flood: u32,
    pub n_sent_direct: u32,
    pub n_recv_flood: u32,
    pub n_recv_direct: u32,
    pub err_events: u16,
    /// SNR scaled by 4.
    pub last_snr: i16,
    pub n_direct_dups: u16,
    pub n_flood_dups: u16,
}

impl RepeaterStatus {
    /// Wire size of the status block.
    pub const SIZE: usize = 48;

    pub fn from_bytes(data: &[u8]) -> Result<Self, PacketError> {
        let mut reader = BufferReader::new(data);
        Ok(RepeaterStatus {
            batt_milli_volts: reader.read_u16_le()?,
            curr_tx_queue_len: reader.read_u16_le()?,
            noise_floor: reader.read_i16_le()?,
            last_rssi: reader.read_i16_le()?,
            n_packets_recv: reader.read_u32_le()?,
            n_packets_sent: reader.read_u32_le()?,
            total_air_time_secs: reader.read_u32_le()?,
            total_up_time_secs: reader.read_u32_le()?,
            n_sent_flood: reader.read_u32_le()?,
            n_sent_direct: reader.read_u32_le()?,
            n_recv_flood: reader.read_u32_le()?,
            n_recv_direct: reader.read_u32_le()?,
            err_events: reader.read_u16_le()?,
            last_snr: reader.read_i16_le()?,
            n_direct_dups: reader.read_u16_le()?,
            n_flood_dups: reader.read_u16_le()?,
        })
    }

    /// Encode the status block (used by device simulators and tests).
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = BufferWriter::with_capacity(Self::SIZE);
        w.write_u16_le(self.batt_milli_volts);
        w.write_u16_le(self.curr_tx_queue_len);
        w.write_u16_le(self.noise_floor as u16);
        w.write_u16_le(self.last_rssi as u16);
        for counter in [
            self.n_packets_recv,
            self.n_packets_sent,
            self.total_air_time_secs,
            self.total_up_time_secs,
            self.n_sent_flood,
            self.n_sent_direct,
            self.n_recv_flood,
            self.n_recv_direct,
        ] {
            w.write_u32_le(counter);
        }
        w.write_u16_le(self.err_events);
        w.write_u16_le(self.last_snr as u16);
        w.write_u16_le(self.n_direct_dups);
        w.write_u16_le(self.n_flood_dups);
        w.into_bytes()
    }
}

/// Telemetry reported by a remote node.
#[derive(Debug, Clone, PartialEq)]
pub struct Telemetry {
    pub responder_prefix: PublicKeyPrefix,
    pub records: Vec<TelemetryRecord>,
}
