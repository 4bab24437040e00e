//! Commands that can be sent to the companion device.
//!
//! All multi-byte fields are little-endian.

use meshcore_packet::BufferWriter;

use crate::constants::*;
use crate::types::*;

/// Commands that can be sent to the companion device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Start the app session; answered with `SelfInfo`.
    AppStart {
        app_version: u8,
        app_name: String,
    },

    /// Query device information.
    DeviceQuery {
        /// Protocol version the app understands.
        app_target_version: u8,
    },

    SendTextMessage {
        text_type: TextType,
        attempt: u8,
        timestamp: u32,
        recipient_prefix: PublicKeyPrefix,
        text: String,
    },

    SendChannelTextMessage {
        text_type: TextType,
        channel_idx: u8,
        timestamp: u32,
        text: String,
    },

    /// List contacts, optionally only those modified after `since`.
    GetContacts {
        since: Option<u32>,
    },

    GetDeviceTime,

    SetDeviceTime {
        epoch_secs: u32,
    },

    SendSelfAdvert {
        flood: bool,
    },

    SetAdvertName {
        name: String,
    },

    /// Latitude/longitude in micro-degrees.
    SetAdvertLatLon {
        lat: i32,
        lon: i32,
    },

    AddUpdateContact {
        contact: Box<Contact>,
    },

    RemoveContact {
        public_key: PublicKey,
    },

    ResetPath {
        public_key: PublicKey,
    },

    GetContactByKey {
        public_key: PublicKey,
    },

    ShareContact {
        public_key: PublicKey,
    },

    /// Export a contact, or this node when `public_key` is `None`.
    ExportContact {
        public_key: Option<PublicKey>,
    },

    ImportContact {
        advert_packet: Vec<u8>,
    },

    SyncNextMessage,

    SetRadioParams {
        params: RadioParams,
    },

    SetTxPower {
        power_dbm: u8,
    },

    SetOtherParams {
        params: OtherParams,
    },

    Reboot,

    GetBatteryVoltage,

    ExportPrivateKey,

    ImportPrivateKey {
        identity: [u8; PRIVATE_KEY_SIZE],
    },

    /// Send raw bytes along an explicit path.
    SendRawData {
        path: Vec<u8>,
        payload: Vec<u8>,
    },

    SendLogin {
        public_key: PublicKey,
        password: String,
    },

    SendStatusRequest {
        public_key: PublicKey,
    },

    Logout {
        public_key: PublicKey,
    },

    GetChannel {
        index: u8,
    },

    SetChannel {
        channel: Channel,
    },

    SignStart,

    SignData {
        chunk: Vec<u8>,
    },

    SignFinish,

    SendTracePath {
        tag: u32,
        auth: u32,
        flags: u8,
        path: Vec<u8>,
    },

    /// Set the BLE PIN (0 = disabled, otherwise 6 digits).
    SetDevicePin {
        pin: u32,
    },

    SendTelemetryRequest {
        public_key: PublicKey,
    },

    GetAdvertPath {
        public_key: PublicKey,
    },

    SendBinaryRequest {
        public_key: PublicKey,
        /// Request code followed by its parameters.
        data: Vec<u8>,
    },

    SendPathDiscoveryRequest {
        public_key: PublicKey,
    },
}

impl Command {
    /// Get the command code for this command.
    pub fn code(&self) -> u8 {
        match self {
            Command::AppStart { .. } => CMD_APP_START,
            Command::DeviceQuery { .. } => CMD_DEVICE_QUERY,
            Command::SendTextMessage { .. } => CMD_SEND_TXT_MSG,
            Command::SendChannelTextMessage { .. } => CMD_SEND_CHANNEL_TXT_MSG,
            Command::GetContacts { .. } => CMD_GET_CONTACTS,
            Command::GetDeviceTime => CMD_GET_DEVICE_TIME,
            Command::SetDeviceTime { .. } => CMD_SET_DEVICE_TIME,
            Command::SendSelfAdvert { .. } => CMD_SEND_SELF_ADVERT,
            Command::SetAdvertName { .. } => CMD_SET_ADVERT_NAME,
            Command::SetAdvertLatLon { .. } => CMD_SET_ADVERT_LATLON,
            Command::AddUpdateContact { .. } => CMD_ADD_UPDATE_CONTACT,
            Command::RemoveContact { .. } => CMD_REMOVE_CONTACT,
            Command::ResetPath { .. } => CMD_RESET_PATH,
            Command::GetContactByKey { .. } => CMD_GET_CONTACT_BY_KEY,
            Command::ShareContact { .. } => CMD_SHARE_CONTACT,
            Command::ExportContact { .. } => CMD_EXPORT_CONTACT,
            Command::ImportContact { .. } => CMD_IMPORT_CONTACT,
            Command::SyncNextMessage => CMD_SYNC_NEXT_MESSAGE,
            Command::SetRadioParams { .. } => CMD_SET_RADIO_PARAMS,
            Command::SetTxPower { .. } => CMD_SET_TX_POWER,
            Command::SetOtherParams { .. } => CMD_SET_OTHER_PARAMS,
            Command::Reboot => CMD_REBOOT,
            Command::GetBatteryVoltage => CMD_GET_BATTERY_VOLTAGE,
            Command::ExportPrivateKey => CMD_EXPORT_PRIVATE_KEY,
            Command::ImportPrivateKey { .. } => CMD_IMPORT_PRIVATE_KEY,
            Command::SendRawData { .. } => CMD_SEND_RAW_DATA,
            Command::SendLogin { .. } => CMD_SEND_LOGIN,
            Command::SendStatusRequest { .. } => CMD_SEND_STATUS_REQ,
            Command::Logout { .. } => CMD_LOGOUT,
            Command::GetChannel { .. } => CMD_GET_CHANNEL,
            Command::SetChannel { .. } => CMD_SET_CHANNEL,
            Command::SignStart => CMD_SIGN_START,
            Command::SignData { .. } => CMD_SIGN_DATA,
            Command::SignFinish => CMD_SIGN_FINISH,
            Command::SendTracePath { .. } => CMD_SEND_TRACE_PATH,
            Command::SetDevicePin { .. } => CMD_SET_DEVICE_PIN,
            Command::SendTelemetryRequest { .. } => CMD_SEND_TELEMETRY_REQ,
            Command::GetAdvertPath { .. } => CMD_GET_ADVERT_PATH,
            Command::SendBinaryRequest { .. } => CMD_SEND_BINARY_REQ,
            Command::SendPathDiscoveryRequest { .. } => CMD_SEND_PATH_DISCOVERY_REQ,
        }
    }

    /// Encode the command to its frame payload.
    pub fn encode(&self) -> Vec<u8> {
        let mut w = BufferWriter::with_capacity(64);
        w.write_byte(self.code());

        match self {
            Command::AppStart {
                app_version,
                app_name,
            } => {
                w.write_byte(*app_version);
                w.write_zeros(6);
                w.write_string(app_name);
            }

            Command::DeviceQuery { app_target_version } => {
                w.write_byte(*app_target_version);
            }

            Command::SendTextMessage {
                text_type,
                attempt,
                timestamp,
                recipient_prefix,
                text,
            } => {
                w.write_byte((*text_type).into());
                w.write_byte(*attempt);
                w.write_u32_le(*timestamp);
                w.write_bytes(recipient_prefix.as_bytes());
                w.write_string(text);
            }

            Command::SendChannelTextMessage {
                text_type,
                channel_idx,
                timestamp,
                text,
            } => {
                w.write_byte((*text_type).into());
                w.write_byte(*channel_idx);
                w.write_u32_le(*timestamp);
                w.write_string(text);
            }

            Command::GetContacts { since } => {
                if let Some(since) = since {
                    w.write_u32_le(*since);
                }
            }

            Command::SetDeviceTime { epoch_secs } => {
                w.write_u32_le(*epoch_secs);
            }

            Command::SendSelfAdvert { flood } => {
                w.write_byte(if *flood {
                    SELF_ADVERT_FLOOD
                } else {
                    SELF_ADVERT_ZERO_HOP
                });
            }

            Command::SetAdvertName { name } => {
                w.write_string(name);
            }

            Command::SetAdvertLatLon { lat, lon } => {
                w.write_i32_le(*lat);
                w.write_i32_le(*lon);
            }

            Command::AddUpdateContact { contact } => {
                w.write_bytes(contact.public_key.as_bytes());
                w.write_byte(contact.contact_type);
                w.write_byte(contact.flags);
                w.write_i8(contact.out_path_len);
                w.write_bytes(&contact.out_path);
                w.write_cstring(&contact.name, MAX_NAME_SIZE);
                w.write_u32_le(contact.last_advert);
                w.write_i32_le(contact.adv_lat);
                w.write_i32_le(contact.adv_lon);
                // lastmod is left to the device clock.
            }

            Command::RemoveContact { public_key }
            | Command::ResetPath { public_key }
            | Command::GetContactByKey { public_key }
            | Command::ShareContact { public_key }
            | Command::SendStatusRequest { public_key }
            | Command::Logout { public_key } => {
                w.write_bytes(public_key.as_bytes());
            }

            Command::ExportContact { public_key } => {
                if let Some(pk) = public_key {
                    w.write_bytes(pk.as_bytes());
                }
            }

            Command::ImportContact { advert_packet } => {
                w.write_bytes(advert_packet);
            }

            Command::SetRadioParams { params } => {
                w.write_u32_le(params.freq_khz);
                w.write_u32_le(params.bandwidth_hz);
                w.write_byte(params.spreading_factor);
                w.write_byte(params.coding_rate);
            }

            Command::SetTxPower { power_dbm } => {
                w.write_byte(*power_dbm);
            }

            Command::SetOtherParams { params } => {
                w.write_byte(params.manual_add_contacts as u8);
                if let Some(modes) = params.telemetry_modes {
                    w.write_byte(modes);
                    if let Some(policy) = params.advert_loc_policy {
                        w.write_byte(policy);
                    }
                }
            }

            Command::Reboot => {
                w.write_string("reboot");
            }

            Command::ImportPrivateKey { identity } => {
                w.write_bytes(identity);
            }

            Command::SendRawData { path, payload } => {
                w.write_byte(path.len() as u8);
                w.write_bytes(path);
                w.write_bytes(payload);
            }

            Command::SendLogin {
                public_key,
                password,
            } => {
                w.write_bytes(public_key.as_bytes());
                w.write_string(password);
            }

            Command::GetChannel { index } => {
                w.write_byte(*index);
            }

            Command::SetChannel { channel } => {
                w.write_byte(channel.index);
                w.write_cstring(&channel.name, MAX_NAME_SIZE);
                w.write_bytes(&channel.secret);
            }

            Command::SignData { chunk } => {
                w.write_bytes(chunk);
            }

            Command::SendTracePath {
                tag,
                auth,
                flags,
                path,
            } => {
                w.write_u32_le(*tag);
                w.write_u32_le(*auth);
                w.write_byte(*flags);
                w.write_bytes(path);
            }

            Command::SetDevicePin { pin } => {
                w.write_u32_le(*pin);
            }

            Command::SendTelemetryRequest { public_key } => {
                w.write_zeros(3);
                w.write_bytes(public_key.as_bytes());
            }

            Command::GetAdvertPath { public_key }
            | Command::SendPathDiscoveryRequest { public_key } => {
                w.write_byte(0);
                w.write_bytes(public_key.as_bytes());
            }

            Command::SendBinaryRequest { public_key, data } => {
                w.write_bytes(public_key.as_bytes());
                w.write_bytes(data);
            }

            Command::GetDeviceTime
            | Command::SyncNextMessage
            | Command::GetBatteryVoltage
            | Command::ExportPrivateKey
            | Command::SignStart
            | Command::SignFinish => {}
        }

        w.into_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(byte: u8) -> PublicKey {
        PublicKey::new([byte; PUB_KEY_SIZE])
    }

    #[test]
    fn test_app_start_layout() {
        let bytes = Command::AppStart {
            app_version: 1,
            app_name: "test".to_string(),
        }
        .encode();
        assert_eq!(bytes, [&[CMD_APP_START, 1, 0, 0, 0, 0, 0, 0][..], b"test"].concat());
    }

    #[test]
    fn test_send_text_message_layout() {
        let bytes = Command::SendTextMessage {
            text_type: TextType::Plain,
            attempt: 0,
            timestamp: 0x6500_0000,
            recipient_prefix: key(0xAA).prefix(),
            text: "hi".to_string(),
        }
        .encode();

        assert_eq!(bytes[0], CMD_SEND_TXT_MSG);
        assert_eq!(bytes[1], TXT_TYPE_PLAIN);
        assert_eq!(bytes[2], 0);
        assert_eq!(&bytes[3..7], &0x6500_0000u32.to_le_bytes());
        assert_eq!(&bytes[7..13], &[0xAA; 6]);
        assert_eq!(&bytes[13..], b"hi");
    }

    #[test]
    fn test_channel_text_layout() {
        let bytes = Command::SendChannelTextMessage {
            text_type: TextType::Plain,
            channel_idx: 2,
            timestamp: 1,
            text: "yo".to_string(),
        }
        .encode();
        assert_eq!(bytes, vec![CMD_SEND_CHANNEL_TXT_MSG, 0, 2, 1, 0, 0, 0, b'y', b'o']);
    }

    #[test]
    fn test_get_contacts_since_is_optional() {
        assert_eq!(Command::GetContacts { since: None }.encode(), vec![CMD_GET_CONTACTS]);
        assert_eq!(
            Command::GetContacts { since: Some(0x01020304) }.encode(),
            vec![CMD_GET_CONTACTS, 4, 3, 2, 1]
        );
    }

    #[test]
    fn test_add_update_contact_layout() {
        let mut contact = Contact {
            public_key: key(0x11),
            contact_type: 2,
            flags: 1,
            out_path_len: -1,
            name: "Repeater".to_string(),
            last_advert: 7,
            adv_lat: -1,
            adv_lon: 2,
            ..Contact::default()
        };
        contact.out_path[0] = 0x99;

        let bytes = Command::AddUpdateContact {
            contact: Box::new(contact),
        }
        .encode();
        assert_eq!(bytes.len(), 1 + 32 + 3 + 64 + 32 + 12);
        assert_eq!(bytes[33], 2);
        assert_eq!(bytes[34], 1);
        assert_eq!(bytes[35], 0xFF);
        assert_eq!(bytes[36], 0x99);
        assert_eq!(&bytes[100..108], b"Repeater");
        assert_eq!(bytes[131], 0);
        assert_eq!(&bytes[132..136], &7u32.to_le_bytes());
        assert_eq!(&bytes[136..140], &(-1i32).to_le_bytes());
    }

    #[test]
    fn test_set_channel_layout() {
        let bytes = Command::SetChannel {
            channel: Channel {
                index: 1,
                name: "#test".to_string(),
                secret: [0x5A; 16],
            },
        }
        .encode();
        assert_eq!(bytes.len(), 1 + 1 + 32 + 16);
        assert_eq!(bytes[1], 1);
        assert_eq!(&bytes[2..7], b"#test");
        assert_eq!(&bytes[34..], &[0x5A; 16]);
    }

    #[test]
    fn test_request_layouts() {
        let pk = key(0x42);

        let status = Command::SendStatusRequest { public_key: pk }.encode();
        assert_eq!(status.len(), 33);

        let telemetry = Command::SendTelemetryRequest { public_key: pk }.encode();
        assert_eq!(&telemetry[..4], &[CMD_SEND_TELEMETRY_REQ, 0, 0, 0]);
        assert_eq!(&telemetry[4..], pk.as_bytes());

        let binary = Command::SendBinaryRequest {
            public_key: pk,
            data: vec![0x02, 0x10],
        }
        .encode();
        assert_eq!(&binary[33..], &[0x02, 0x10]);

        let login = Command::SendLogin {
            public_key: pk,
            password: "secret".to_string(),
        }
        .encode();
        assert_eq!(&login[33..], b"secret");
    }

    #[test]
    fn test_trace_path_layout() {
        let bytes = Command::SendTracePath {
            tag: 0xDEADBEEF,
            auth: 1,
            flags: 0,
            path: vec![0x0A, 0x0B],
        }
        .encode();
        assert_eq!(
            bytes,
            vec![CMD_SEND_TRACE_PATH, 0xEF, 0xBE, 0xAD, 0xDE, 1, 0, 0, 0, 0, 0x0A, 0x0B]
        );
    }

    #[test]
    fn test_other_params_trailing_options() {
        let bytes = Command::SetOtherParams {
            params: OtherParams {
                manual_add_contacts: true,
                telemetry_modes: None,
                advert_loc_policy: Some(1),
            },
        }
        .encode();
        assert_eq!(bytes, vec![CMD_SET_OTHER_PARAMS, 1]);
    }

    #[test]
    fn test_opcode_only_commands() {
        for command in [
            Command::GetDeviceTime,
            Command::SyncNextMessage,
            Command::GetBatteryVoltage,
            Command::SignStart,
            Command::SignFinish,
        ] {
            assert_eq!(command.encode(), vec![command.code()]);
        }
    }
}
