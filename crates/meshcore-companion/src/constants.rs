//! Protocol constants
//!
//! Frame markers, command codes, response codes and push codes of the
//! MeshCore companion protocol.

// ============================================================================
// Frame Types
// ============================================================================

/// Frame written by the app to the device (`'<'`).
pub const FRAME_TYPE_OUTGOING: u8 = 0x3c;
/// Frame written by the device to the app (`'>'`).
pub const FRAME_TYPE_INCOMING: u8 = 0x3e;
/// Size of the frame header (type byte + u16 length).
pub const FRAME_HEADER_SIZE: usize = 3;
/// Largest payload a frame can declare.
pub const MAX_FRAME_PAYLOAD: usize = u16::MAX as usize;

// ============================================================================
// Command Codes (app → device)
// ============================================================================

/// Start the app session; the device answers with self info.
pub const CMD_APP_START: u8 = 1;
/// Send a text message to a contact.
pub const CMD_SEND_TXT_MSG: u8 = 2;
/// Send a text message to a channel.
pub const CMD_SEND_CHANNEL_TXT_MSG: u8 = 3;
/// Get the list of contacts (with optional 'since' filter).
pub const CMD_GET_CONTACTS: u8 = 4;
pub const CMD_GET_DEVICE_TIME: u8 = 5;
pub const CMD_SET_DEVICE_TIME: u8 = 6;
/// Send a self-advertisement (zero-hop or flood).
pub const CMD_SEND_SELF_ADVERT: u8 = 7;
pub const CMD_SET_ADVERT_NAME: u8 = 8;
pub const CMD_ADD_UPDATE_CONTACT: u8 = 9;
/// Pop the next message from the device's offline queue.
pub const CMD_SYNC_NEXT_MESSAGE: u8 = 10;
/// Set radio parameters (frequency, bandwidth, SF, CR).
pub const CMD_SET_RADIO_PARAMS: u8 = 11;
pub const CMD_SET_TX_POWER: u8 = 12;
/// Forget the stored path to a contact.
pub const CMD_RESET_PATH: u8 = 13;
pub const CMD_SET_ADVERT_LATLON: u8 = 14;
pub const CMD_REMOVE_CONTACT: u8 = 15;
/// Share a contact via zero-hop broadcast.
pub const CMD_SHARE_CONTACT: u8 = 16;
/// Export a contact (or self) as an advert packet blob.
pub const CMD_EXPORT_CONTACT: u8 = 17;
pub const CMD_IMPORT_CONTACT: u8 = 18;
pub const CMD_REBOOT: u8 = 19;
/// Get battery voltage (and storage use on newer firmware).
pub const CMD_GET_BATTERY_VOLTAGE: u8 = 20;
/// Query firmware and device information.
pub const CMD_DEVICE_QUERY: u8 = 22;
pub const CMD_EXPORT_PRIVATE_KEY: u8 = 23;
pub const CMD_IMPORT_PRIVATE_KEY: u8 = 24;
/// Send a raw packet along an explicit path.
pub const CMD_SEND_RAW_DATA: u8 = 25;
/// Log in to a repeater or room server.
pub const CMD_SEND_LOGIN: u8 = 26;
/// Request status from a repeater.
pub const CMD_SEND_STATUS_REQ: u8 = 27;
pub const CMD_LOGOUT: u8 = 29;
pub const CMD_GET_CONTACT_BY_KEY: u8 = 30;
pub const CMD_GET_CHANNEL: u8 = 31;
pub const CMD_SET_CHANNEL: u8 = 32;
/// Begin a signing session.
pub const CMD_SIGN_START: u8 = 33;
/// Append data to the signing session.
pub const CMD_SIGN_DATA: u8 = 34;
/// Finish signing and return the signature.
pub const CMD_SIGN_FINISH: u8 = 35;
pub const CMD_SEND_TRACE_PATH: u8 = 36;
/// Set the BLE pairing PIN (0 disables).
pub const CMD_SET_DEVICE_PIN: u8 = 37;
/// Set other parameters (manual contact add, telemetry modes, location policy).
pub const CMD_SET_OTHER_PARAMS: u8 = 38;
pub const CMD_SEND_TELEMETRY_REQ: u8 = 39;
pub const CMD_GET_ADVERT_PATH: u8 = 42;
pub const CMD_SEND_BINARY_REQ: u8 = 50;
pub const CMD_SEND_PATH_DISCOVERY_REQ: u8 = 52;

// ============================================================================
// Response Codes (device → app, solicited)
// ============================================================================

pub const RESP_CODE_OK: u8 = 0;
/// Generic error, optionally followed by a reason byte.
pub const RESP_CODE_ERR: u8 = 1;
pub const RESP_CODE_CONTACTS_START: u8 = 2;
pub const RESP_CODE_CONTACT: u8 = 3;
pub const RESP_CODE_END_OF_CONTACTS: u8 = 4;
pub const RESP_CODE_SELF_INFO: u8 = 5;
/// Command accepted for transmission; carries the ack tag and timeout.
pub const RESP_CODE_SENT: u8 = 6;
/// Contact message received (legacy, ver < 3).
pub const RESP_CODE_CONTACT_MSG_RECV: u8 = 7;
/// Channel message received (legacy, ver < 3).
pub const RESP_CODE_CHANNEL_MSG_RECV: u8 = 8;
pub const RESP_CODE_CURR_TIME: u8 = 9;
pub const RESP_CODE_NO_MORE_MESSAGES: u8 = 10;
pub const RESP_CODE_EXPORT_CONTACT: u8 = 11;
pub const RESP_CODE_BATTERY_VOLTAGE: u8 = 12;
pub const RESP_CODE_DEVICE_INFO: u8 = 13;
pub const RESP_CODE_PRIVATE_KEY: u8 = 14;
/// The requested feature is turned off on the device.
pub const RESP_CODE_DISABLED: u8 = 15;
/// Contact message received (ver >= 3).
pub const RESP_CODE_CONTACT_MSG_RECV_V3: u8 = 16;
/// Channel message received (ver >= 3).
pub const RESP_CODE_CHANNEL_MSG_RECV_V3: u8 = 17;
pub const RESP_CODE_CHANNEL_INFO: u8 = 18;
pub const RESP_CODE_SIGN_START: u8 = 19;
pub const RESP_CODE_SIGNATURE: u8 = 20;
pub const RESP_CODE_CUSTOM_VARS: u8 = 21;
pub const RESP_CODE_ADVERT_PATH: u8 = 22;
pub const RESP_CODE_TUNING_PARAMS: u8 = 23;

// ============================================================================
// Push Codes (device → app, unsolicited)
// ============================================================================

/// Advertisement received from a known contact.
pub const PUSH_CODE_ADVERT: u8 = 0x80;
pub const PUSH_CODE_PATH_UPDATED: u8 = 0x81;
/// Delivery of a sent message was acknowledged.
pub const PUSH_CODE_SEND_CONFIRMED: u8 = 0x82;
/// Messages are waiting in the device queue.
pub const PUSH_CODE_MSG_WAITING: u8 = 0x83;
pub const PUSH_CODE_RAW_DATA: u8 = 0x84;
pub const PUSH_CODE_LOGIN_SUCCESS: u8 = 0x85;
pub const PUSH_CODE_LOGIN_FAIL: u8 = 0x86;
pub const PUSH_CODE_STATUS_RESPONSE: u8 = 0x87;
/// Raw over-the-air packet log.
pub const PUSH_CODE_LOG_RX_DATA: u8 = 0x88;
pub const PUSH_CODE_TRACE_DATA: u8 = 0x89;
/// New advertisement (when auto-add is disabled).
pub const PUSH_CODE_NEW_ADVERT: u8 = 0x8A;
pub const PUSH_CODE_TELEMETRY_RESPONSE: u8 = 0x8B;
pub const PUSH_CODE_BINARY_RESPONSE: u8 = 0x8C;
pub const PUSH_CODE_PATH_DISCOVERY_RESPONSE: u8 = 0x8D;

// ============================================================================
// Error Reasons
// ============================================================================

pub const ERR_CODE_UNSUPPORTED_CMD: u8 = 1;
pub const ERR_CODE_NOT_FOUND: u8 = 2;
pub const ERR_CODE_TABLE_FULL: u8 = 3;
pub const ERR_CODE_BAD_STATE: u8 = 4;
pub const ERR_CODE_FILE_IO_ERROR: u8 = 5;
pub const ERR_CODE_ILLEGAL_ARG: u8 = 6;

// ============================================================================
// Text Types
// ============================================================================

pub const TXT_TYPE_PLAIN: u8 = 0;
pub const TXT_TYPE_CLI_DATA: u8 = 1;
pub const TXT_TYPE_SIGNED_PLAIN: u8 = 2;

// ============================================================================
// Self Advert Types
// ============================================================================

/// Advert reaches direct neighbours only.
pub const SELF_ADVERT_ZERO_HOP: u8 = 0;
/// Advert is flooded through the mesh.
pub const SELF_ADVERT_FLOOD: u8 = 1;

// ============================================================================
// Sizes and Limits
// ============================================================================

pub const PUB_KEY_SIZE: usize = 32;
pub const SIGNATURE_SIZE: usize = 64;
/// Size of an exported private identity.
pub const PRIVATE_KEY_SIZE: usize = 64;
/// Size of the stored outbound path in a contact record.
pub const MAX_PATH_SIZE: usize = 64;
/// Size of the public key prefix used in messages and pushes.
pub const PUB_KEY_PREFIX_SIZE: usize = 6;
/// Fixed width of contact and channel name fields.
pub const MAX_NAME_SIZE: usize = 32;
/// Size of a channel secret.
pub const CHANNEL_SECRET_SIZE: usize = 16;
/// Longest password the login command can carry.
pub const MAX_LOGIN_PASSWORD_LEN: usize = 15;
/// Largest chunk a single SignData command may carry.
pub const MAX_SIGN_CHUNK_SIZE: usize = 128;
/// Highest channel index probed when listing channels.
pub const MAX_CHANNEL_INDEX: u8 = u8::MAX;
