//! Events received from the companion device.
//!
//! Codes below 0x80 answer a command; codes at or above 0x80 are
//! unsolicited pushes. Both arrive on the same stream and are published on
//! the same bus.

use meshcore_packet::BufferReader;

use crate::constants::*;
use crate::error::*;
use crate::types::*;

/// A decoded device frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    // ------------------------------------------------------------------
    // Responses
    // ------------------------------------------------------------------
    /// Generic success.
    Ok,

    /// Generic failure, with a reason byte on newer firmware.
    Err(Option<FirmwareErrorCode>),

    ContactsStart {
        count: u32,
    },

    Contact(Contact),

    EndOfContacts {
        most_recent_lastmod: u32,
    },

    SelfInfo(SelfInfo),

    /// The command was queued for transmission.
    Sent(SentInfo),

    ContactMessageV2(ContactMessage),

    ContactMessageV3(ContactMessage),

    ChannelMessageV2(ChannelMessage),

    ChannelMessageV3(ChannelMessage),

    CurrentTime {
        epoch_secs: u32,
    },

    NoMoreMessages,

    /// Exported advert packet blob.
    ExportContact {
        data: Vec<u8>,
    },

    BatteryVoltage(BatteryStatus),

    DeviceInfo(DeviceInfo),

    PrivateKey {
        identity: [u8; PRIVATE_KEY_SIZE],
    },

    Disabled,

    ChannelInfo(Channel),

    /// A signing session is open; data may not exceed `max_len` bytes.
    SignStart {
        max_len: u32,
    },

    Signature([u8; SIGNATURE_SIZE]),

    CustomVars {
        vars: Vec<(String, String)>,
    },

    AdvertPath(AdvertPath),

    TuningParams(TuningParams),

    // ------------------------------------------------------------------
    // Pushes
    // ------------------------------------------------------------------
    /// Advert heard from a known contact.
    Advert {
        public_key: PublicKey,
    },

    PathUpdated {
        public_key: PublicKey,
    },

    /// A sent message was acknowledged by its recipient.
    SendConfirmed {
        ack_code: u32,
        round_trip_ms: u32,
    },

    MsgWaiting,

    RawData {
        snr_x4: i8,
        rssi: i8,
        payload: Vec<u8>,
    },

    LoginSuccess(LoginSuccess),

    LoginFail {
        server_prefix: PublicKeyPrefix,
    },

    StatusResponse {
        server_prefix: PublicKeyPrefix,
        data: Vec<u8>,
    },

    LogRxData(RxLog),

    TraceData(TraceData),

    /// Advert from an unknown node while auto-add is off.
    NewAdvert(Contact),

    TelemetryResponse {
        server_prefix: PublicKeyPrefix,
        data: Vec<u8>,
    },

    BinaryResponse {
        tag: u32,
        data: Vec<u8>,
    },

    PathDiscoveryResponse(PathDiscovery),

    /// A frame with a known code that failed to decode.
    ///
    /// Published so that an operation waiting on `code` can fail instead of
    /// hanging until its timeout.
    Malformed {
        code: u8,
        error: ProtocolError,
    },
}

impl Event {
    /// The wire code this event was decoded from.
    pub fn code(&self) -> u8 {
        match self {
            Event::Ok => RESP_CODE_OK,
            Event::Err(_) => RESP_CODE_ERR,
            Event::ContactsStart { .. } => RESP_CODE_CONTACTS_START,
            Event::Contact(_) => RESP_CODE_CONTACT,
            Event::EndOfContacts { .. } => RESP_CODE_END_OF_CONTACTS,
            Event::SelfInfo(_) => RESP_CODE_SELF_INFO,
            Event::Sent(_) => RESP_CODE_SENT,
            Event::ContactMessageV2(_) => RESP_CODE_CONTACT_MSG_RECV,
            Event::ContactMessageV3(_) => RESP_CODE_CONTACT_MSG_RECV_V3,
            Event::ChannelMessageV2(_) => RESP_CODE_CHANNEL_MSG_RECV,
            Event::ChannelMessageV3(_) => RESP_CODE_CHANNEL_MSG_RECV_V3,
            Event::CurrentTime { .. } => RESP_CODE_CURR_TIME,
            Event::NoMoreMessages => RESP_CODE_NO_MORE_MESSAGES,
            Event::ExportContact { .. } => RESP_CODE_EXPORT_CONTACT,
            Event::BatteryVoltage(_) => RESP_CODE_BATTERY_VOLTAGE,
            Event::DeviceInfo(_) => RESP_CODE_DEVICE_INFO,
            Event::PrivateKey { .. } => RESP_CODE_PRIVATE_KEY,
            Event::Disabled => RESP_CODE_DISABLED,
            Event::ChannelInfo(_) => RESP_CODE_CHANNEL_INFO,
            Event::SignStart { .. } => RESP_CODE_SIGN_START,
            Event::Signature(_) => RESP_CODE_SIGNATURE,
            Event::CustomVars { .. } => RESP_CODE_CUSTOM_VARS,
            Event::AdvertPath(_) => RESP_CODE_ADVERT_PATH,
            Event::TuningParams(_) => RESP_CODE_TUNING_PARAMS,
            Event::Advert { .. } => PUSH_CODE_ADVERT,
            Event::PathUpdated { .. } => PUSH_CODE_PATH_UPDATED,
            Event::SendConfirmed { .. } => PUSH_CODE_SEND_CONFIRMED,
            Event::MsgWaiting => PUSH_CODE_MSG_WAITING,
            Event::RawData { .. } => PUSH_CODE_RAW_DATA,
            Event::LoginSuccess(_) => PUSH_CODE_LOGIN_SUCCESS,
            Event::LoginFail { .. } => PUSH_CODE_LOGIN_FAIL,
            Event::StatusResponse { .. } => PUSH_CODE_STATUS_RESPONSE,
            Event::LogRxData(_) => PUSH_CODE_LOG_RX_DATA,
            Event::TraceData(_) => PUSH_CODE_TRACE_DATA,
            Event::NewAdvert(_) => PUSH_CODE_NEW_ADVERT,
            Event::TelemetryResponse { .. } => PUSH_CODE_TELEMETRY_RESPONSE,
            Event::BinaryResponse { .. } => PUSH_CODE_BINARY_RESPONSE,
            Event::PathDiscoveryResponse(_) => PUSH_CODE_PATH_DISCOVERY_RESPONSE,
            Event::Malformed { code, .. } => *code,
        }
    }

    /// Whether this event was pushed unsolicited.
    pub fn is_push(&self) -> bool {
        self.code() & 0x80 != 0
    }

    /// Decode an event from a frame payload.
    pub fn decode(frame: &[u8]) -> Result<Self, ProtocolError> {
        let (&code, body) = frame.split_first().ok_or(ProtocolError::EmptyFrame)?;
        let mut r = BufferReader::new(body);

        let event = match code {
            RESP_CODE_OK => Event::Ok,

            RESP_CODE_ERR => Event::Err(r.read_u8().ok().map(FirmwareErrorCode::from)),

            RESP_CODE_CONTACTS_START => Event::ContactsStart {
                count: r.read_u32_le()?,
            },

            RESP_CODE_CONTACT => Event::Contact(Contact::read(&mut r)?),

            RESP_CODE_END_OF_CONTACTS => Event::EndOfContacts {
                most_recent_lastmod: r.read_u32_le()?,
            },

            RESP_CODE_SELF_INFO => Event::SelfInfo(SelfInfo::read(&mut r)?),

            RESP_CODE_SENT => Event::Sent(SentInfo {
                is_flood: r.read_u8()? != 0,
                expected_ack: r.read_u32_le()?,
                est_timeout_ms: r.read_u32_le()?,
            }),

            RESP_CODE_CONTACT_MSG_RECV => {
                Event::ContactMessageV2(ContactMessage::read(&mut r, false)?)
            }
            RESP_CODE_CONTACT_MSG_RECV_V3 => {
                Event::ContactMessageV3(ContactMessage::read(&mut r, true)?)
            }
            RESP_CODE_CHANNEL_MSG_RECV => {
                Event::ChannelMessageV2(ChannelMessage::read(&mut r, false)?)
            }
            RESP_CODE_CHANNEL_MSG_RECV_V3 => {
                Event::ChannelMessageV3(ChannelMessage::read(&mut r, true)?)
            }

            RESP_CODE_CURR_TIME => Event::CurrentTime {
                epoch_secs: r.read_u32_le()?,
            },

            RESP_CODE_NO_MORE_MESSAGES => Event::NoMoreMessages,

            RESP_CODE_EXPORT_CONTACT => Event::ExportContact {
                data: r.read_remaining().to_vec(),
            },

            RESP_CODE_BATTERY_VOLTAGE => Event::BatteryVoltage(BatteryStatus::read(&mut r)?),

            RESP_CODE_DEVICE_INFO => Event::DeviceInfo(DeviceInfo::read(&mut r)?),

            RESP_CODE_PRIVATE_KEY => Event::PrivateKey {
                identity: r.read_array()?,
            },

            RESP_CODE_DISABLED => Event::Disabled,

            RESP_CODE_CHANNEL_INFO => Event::ChannelInfo(Channel::read(&mut r)?),

            RESP_CODE_SIGN_START => {
                r.read_u8()?; // reserved
                Event::SignStart {
                    max_len: r.read_u32_le()?,
                }
            }

            RESP_CODE_SIGNATURE => Event::Signature(r.read_array()?),

            RESP_CODE_CUSTOM_VARS => Event::CustomVars {
                vars: parse_custom_vars(&r.read_string()),
            },

            RESP_CODE_ADVERT_PATH => {
                let recv_timestamp = r.read_u32_le()?;
                let path_len = r.read_u8()? as usize;
                Event::AdvertPath(AdvertPath {
                    recv_timestamp,
                    path: r.read_bytes(path_len)?.to_vec(),
                })
            }

            RESP_CODE_TUNING_PARAMS => Event::TuningParams(TuningParams {
                rx_delay_base: r.read_u32_le()?,
                airtime_factor: r.read_u32_le()?,
            }),

            PUSH_CODE_ADVERT => Event::Advert {
                public_key: PublicKey(r.read_array()?),
            },

            PUSH_CODE_PATH_UPDATED => Event::PathUpdated {
                public_key: PublicKey(r.read_array()?),
            },

            PUSH_CODE_SEND_CONFIRMED => Event::SendConfirmed {
                ack_code: r.read_u32_le()?,
                round_trip_ms: r.read_u32_le()?,
            },

            PUSH_CODE_MSG_WAITING => Event::MsgWaiting,

            PUSH_CODE_RAW_DATA => {
                let snr_x4 = r.read_i8()?;
                let rssi = r.read_i8()?;
                r.read_u8()?; // reserved
                Event::RawData {
                    snr_x4,
                    rssi,
                    payload: r.read_remaining().to_vec(),
                }
            }

            PUSH_CODE_LOGIN_SUCCESS => Event::LoginSuccess(LoginSuccess::read(&mut r)?),

            PUSH_CODE_LOGIN_FAIL => {
                r.read_u8()?; // reserved
                Event::LoginFail {
                    server_prefix: PublicKeyPrefix(r.read_array()?),
                }
            }

            PUSH_CODE_STATUS_RESPONSE => {
                r.read_u8()?; // reserved
                Event::StatusResponse {
                    server_prefix: PublicKeyPrefix(r.read_array()?),
                    data: r.read_remaining().to_vec(),
                }
            }

            PUSH_CODE_LOG_RX_DATA => Event::LogRxData(RxLog {
                snr_x4: r.read_i8()?,
                rssi: r.read_i8()?,
                raw: r.read_remaining().to_vec(),
            }),

            PUSH_CODE_TRACE_DATA => Event::TraceData(TraceData::read(&mut r)?),

            PUSH_CODE_NEW_ADVERT => Event::NewAdvert(Contact::read(&mut r)?),

            PUSH_CODE_TELEMETRY_RESPONSE => {
                r.read_u8()?; // reserved
                Event::TelemetryResponse {
                    server_prefix: PublicKeyPrefix(r.read_array()?),
                    data: r.read_remaining().to_vec(),
                }
            }

            PUSH_CODE_BINARY_RESPONSE => {
                r.read_u8()?; // reserved
                Event::BinaryResponse {
                    tag: r.read_u32_le()?,
                    data: r.read_remaining().to_vec(),
                }
            }

            PUSH_CODE_PATH_DISCOVERY_RESPONSE => {
                Event::PathDiscoveryResponse(PathDiscovery::read(&mut r)?)
            }

            _ => return Err(ProtocolError::UnknownResponse(code)),
        };

        Ok(event)
    }
}

/// Parse `name:value` pairs separated by commas.
fn parse_custom_vars(text: &str) -> Vec<(String, String)> {
    text.split(',')
        .filter_map(|pair| {
            let (name, value) = pair.split_once(':')?;
            Some((name.to_string(), value.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use meshcore_packet::{BufferWriter, PayloadType, RouteType};

    use super::*;

    #[test]
    fn test_decode_empty_frame() {
        assert_eq!(Event::decode(&[]), Err(ProtocolError::EmptyFrame));
    }

    #[test]
    fn test_decode_unknown_code() {
        assert_eq!(
            Event::decode(&[0x7F, 1, 2]),
            Err(ProtocolError::UnknownResponse(0x7F))
        );
    }

    #[test]
    fn test_decode_err_with_and_without_reason() {
        assert_eq!(Event::decode(&[RESP_CODE_ERR]).unwrap(), Event::Err(None));
        assert_eq!(
            Event::decode(&[RESP_CODE_ERR, ERR_CODE_NOT_FOUND]).unwrap(),
            Event::Err(Some(FirmwareErrorCode::NotFound))
        );
    }

    #[test]
    fn test_decode_sent() {
        let frame = [RESP_CODE_SENT, 1, 0x78, 0x56, 0x34, 0x12, 0xE8, 0x03, 0, 0];
        let event = Event::decode(&frame).unwrap();
        assert_eq!(
            event,
            Event::Sent(SentInfo {
                is_flood: true,
                expected_ack: 0x12345678,
                est_timeout_ms: 1000,
            })
        );
        assert_eq!(event.code(), RESP_CODE_SENT);
        assert!(!event.is_push());
    }

    #[test]
    fn test_decode_truncated_sent() {
        let err = Event::decode(&[RESP_CODE_SENT, 1, 0x78]).unwrap_err();
        assert!(matches!(err, ProtocolError::Decode(_)));
    }

    #[test]
    fn test_decode_contact() {
        let mut w = BufferWriter::new();
        w.write_byte(RESP_CODE_CONTACT);
        w.write_bytes(&[0x11; 32]);
        w.write_byte(2);
        w.write_byte(0);
        w.write_i8(3);
        let mut path = [0u8; 64];
        path[..3].copy_from_slice(&[0xA1, 0xA2, 0xA3]);
        w.write_bytes(&path);
        w.write_cstring("Hilltop", 32);
        w.write_u32_le(1_700_000_000);
        w.write_i32_le(-33_868_800);
        w.write_i32_le(151_209_300);
        w.write_u32_le(1_700_000_100);

        let Event::Contact(contact) = Event::decode(w.as_bytes()).unwrap() else {
            panic!("expected contact");
        };
        assert_eq!(contact.public_key, PublicKey::new([0x11; 32]));
        assert_eq!(contact.contact_type, 2);
        assert_eq!(contact.path(), &[0xA1, 0xA2, 0xA3]);
        assert_eq!(contact.name, "Hilltop");
        assert_eq!(contact.adv_lat, -33_868_800);
        assert!((contact.longitude() - 151.2093).abs() < 1e-9);
        assert_eq!(contact.last_modified, 1_700_000_100);
    }

    #[test]
    fn test_decode_battery_with_storage() {
        let mut w = BufferWriter::new();
        w.write_byte(RESP_CODE_BATTERY_VOLTAGE);
        w.write_u16_le(4150);
        assert_eq!(
            Event::decode(w.as_bytes()).unwrap(),
            Event::BatteryVoltage(BatteryStatus {
                millivolts: 4150,
                storage_used_kb: None,
                storage_total_kb: None,
            })
        );

        w.write_u32_le(100);
        w.write_u32_le(2048);
        let Event::BatteryVoltage(status) = Event::decode(w.as_bytes()).unwrap() else {
            panic!("expected battery");
        };
        assert_eq!(status.storage_used_kb, Some(100));
        assert_eq!(status.storage_total_kb, Some(2048));
    }

    #[test]
    fn test_decode_contact_message_v3() {
        let mut w = BufferWriter::new();
        w.write_byte(RESP_CODE_CONTACT_MSG_RECV_V3);
        w.write_i8(-22);
        w.write_zeros(2);
        w.write_bytes(&[1, 2, 3, 4, 5, 6]);
        w.write_byte(0xFF);
        w.write_byte(TXT_TYPE_PLAIN);
        w.write_u32_le(42);
        w.write_string("hello there");

        let Event::ContactMessageV3(msg) = Event::decode(w.as_bytes()).unwrap() else {
            panic!("expected contact message");
        };
        assert_eq!(msg.sender_prefix, PublicKeyPrefix::new([1, 2, 3, 4, 5, 6]));
        assert!(msg.is_flood());
        assert_eq!(msg.sender_timestamp, 42);
        assert_eq!(msg.snr(), Some(-5.5));
        assert_eq!(msg.text, "hello there");
    }

    #[test]
    fn test_decode_channel_message_v2() {
        let frame = [
            RESP_CODE_CHANNEL_MSG_RECV,
            3,
            2,
            TXT_TYPE_PLAIN,
            9,
            0,
            0,
            0,
            b'o',
            b'k',
        ];
        let Event::ChannelMessageV2(msg) = Event::decode(&frame).unwrap() else {
            panic!("expected channel message");
        };
        assert_eq!(msg.channel_idx, 3);
        assert_eq!(msg.path_len, 2);
        assert_eq!(msg.snr_x4, None);
        assert_eq!(msg.text, "ok");
    }

    #[test]
    fn test_decode_sign_start_skips_reserved() {
        let frame = [RESP_CODE_SIGN_START, 0, 0x00, 0x20, 0, 0];
        assert_eq!(
            Event::decode(&frame).unwrap(),
            Event::SignStart { max_len: 8192 }
        );
    }

    #[test]
    fn test_decode_prefixed_pushes() {
        let mut frame = vec![PUSH_CODE_LOGIN_FAIL, 0];
        frame.extend_from_slice(&[9, 8, 7, 6, 5, 4]);
        assert_eq!(
            Event::decode(&frame).unwrap(),
            Event::LoginFail {
                server_prefix: PublicKeyPrefix::new([9, 8, 7, 6, 5, 4]),
            }
        );

        let mut frame = vec![PUSH_CODE_TELEMETRY_RESPONSE, 0];
        frame.extend_from_slice(&[1, 1, 1, 1, 1, 1]);
        frame.extend_from_slice(&[1, 116, 0xFF, 0x6A]);
        let event = Event::decode(&frame).unwrap();
        assert!(event.is_push());
        assert_eq!(
            event,
            Event::TelemetryResponse {
                server_prefix: PublicKeyPrefix::new([1; 6]),
                data: vec![1, 116, 0xFF, 0x6A],
            }
        );
    }

    #[test]
    fn test_decode_binary_response() {
        let frame = [PUSH_CODE_BINARY_RESPONSE, 0, 0xEF, 0xBE, 0xAD, 0xDE, 0x55];
        assert_eq!(
            Event::decode(&frame).unwrap(),
            Event::BinaryResponse {
                tag: 0xDEADBEEF,
                data: vec![0x55],
            }
        );
    }

    #[test]
    fn test_decode_log_rx_data_packet() {
        let mut frame = vec![PUSH_CODE_LOG_RX_DATA, 0xF4, 0xB0];
        frame.extend(hex::decode("0200B401DF6528CC9778A56F36FE9399A5CF6B0C7EDE").unwrap());

        let Event::LogRxData(log) = Event::decode(&frame).unwrap() else {
            panic!("expected log rx data");
        };
        assert_eq!(log.snr(), -3.0);
        assert_eq!(log.rssi, -80);

        let packet = log.packet().unwrap();
        assert_eq!(packet.route_type(), RouteType::Direct);
        assert_eq!(packet.payload_type(), PayloadType::Request);
        assert!(packet.path.is_empty());
    }

    #[test]
    fn test_decode_trace_data() {
        let mut w = BufferWriter::new();
        w.write_byte(PUSH_CODE_TRACE_DATA);
        w.write_byte(0);
        w.write_byte(2);
        w.write_byte(0);
        w.write_u32_le(77);
        w.write_u32_le(0);
        w.write_bytes(&[0xAA, 0xBB]);
        w.write_bytes(&[40, 0xF8]);
        w.write_i8(12);

        let Event::TraceData(trace) = Event::decode(w.as_bytes()).unwrap() else {
            panic!("expected trace data");
        };
        assert_eq!(trace.tag, 77);
        assert_eq!(trace.path_hashes, vec![0xAA, 0xBB]);
        assert_eq!(trace.path_snrs, vec![40, -8]);
        assert_eq!(trace.final_snr_x4, 12);
    }

    #[test]
    fn test_decode_custom_vars() {
        let mut frame = vec![RESP_CODE_CUSTOM_VARS];
        frame.extend_from_slice(b"gps:1,mode:fast,junk");
        assert_eq!(
            Event::decode(&frame).unwrap(),
            Event::CustomVars {
                vars: vec![
                    ("gps".to_string(), "1".to_string()),
                    ("mode".to_string(), "fast".to_string()),
                ],
            }
        );
    }

    #[test]
    fn test_malformed_reports_original_code() {
        let event = Event::Malformed {
            code: RESP_CODE_SELF_INFO,
            error: ProtocolError::EmptyFrame,
        };
        assert_eq!(event.code(), RESP_CODE_SELF_INFO);
    }
}
