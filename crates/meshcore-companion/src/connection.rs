//! A live connection to a companion device.
//!
//! Operations come in five shapes:
//!
//! 1. fire/ack: write a command, wait for `Ok` or `Err`
//! 2. single value: wait for one response code or `Err`
//! 3. streamed list: collect items until a terminator
//! 4. device-timed correlation: wait for `Sent`, then for the push that
//!    carries the same tag or key prefix, within the device's own estimate
//!    plus a margin
//! 5. chunked multi-step: `sign`
//!
//! The device answers commands one at a time and in order, so every shape
//! holds the command lock until its first reply. Shape 4 releases it on
//! `Sent`; the push it then waits for is matched by content, so several of
//! them can be outstanding at once.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::bus::{EventBus, Subscription};
use crate::commands::Command;
use crate::config::ConnectionConfig;
use crate::constants::*;
use crate::dispatcher::{read_loop, Dispatcher};
use crate::error::{Error, ProtocolError, Result, TransportError};
use crate::frame::{encode_frame, FrameType};
use crate::pending::PendingOperation;
use crate::responses::Event;
use crate::transport::Transport;
use crate::types::*;

/// A connection to one companion device over a [`Transport`].
///
/// Dropping the connection stops its read loop. Operations still waiting
/// when the link goes away are not failed automatically; bound them with a
/// timeout if that matters.
pub struct Connection<T: Transport> {
    transport: T,
    config: ConnectionConfig,
    bus: Arc<EventBus>,
    command_lock: Mutex<()>,
    connected: Arc<AtomicBool>,
    reader: JoinHandle<()>,
}

impl<T: Transport> std::fmt::Debug for Connection<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("config", &self.config)
            .field("connected", &self.is_connected())
            .field("subscriptions", &self.bus.len())
            .finish()
    }
}

impl<T: Transport> Drop for Connection<T> {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

impl<T: Transport> Connection<T> {
    /// Open the transport and start reading from it.
    pub async fn connect(transport: T, config: ConnectionConfig) -> Result<Self> {
        let chunks = transport.open().await?;
        let bus = EventBus::new();
        let connected = Arc::new(AtomicBool::new(true));
        let reader = tokio::spawn(read_loop(
            chunks,
            Dispatcher::new(bus.clone()),
            connected.clone(),
        ));
        debug!(app = %config.app_name, "connected");

        Ok(Connection {
            transport,
            config,
            bus,
            command_lock: Mutex::new(()),
            connected,
            reader,
        })
    }

    /// Stop reading and close the transport.
    pub async fn close(&self) -> Result<()> {
        self.connected.store(false, Ordering::Release);
        self.reader.abort();
        self.transport.close().await?;
        debug!("closed");
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Watch events with the given codes, e.g. [`PUSH_CODE_MSG_WAITING`].
    pub fn subscribe(&self, codes: &[u8]) -> Subscription {
        self.bus.subscribe(codes)
    }

    /// Watch every event.
    pub fn subscribe_all(&self) -> Subscription {
        self.bus.subscribe_all()
    }

    /// Live subscriptions, including those of pending operations, that
    /// would receive `code`.
    pub fn subscriber_count(&self, code: u8) -> usize {
        self.bus.subscriber_count(code)
    }

    /// Write a command without waiting for any reply.
    pub async fn send_command(&self, command: &Command) -> Result<()> {
        let _guard = self.command_lock.lock().await;
        self.write_command(command).await
    }

    async fn write_command(&self, command: &Command) -> Result<()> {
        if !self.is_connected() {
            return Err(TransportError::Closed.into());
        }
        let payload = command.encode();
        let frame = encode_frame(FrameType::Outgoing, &payload).map_err(|e| match e {
            ProtocolError::FrameTooLong { max, actual } => Error::InvalidArgument(format!(
                "command payload of {} bytes exceeds frame limit of {}",
                actual, max
            )),
            other => Error::Malformed(other),
        })?;
        debug!(code = command.code(), len = payload.len(), "sending command");
        trace!(frame = %hex::encode(&frame), "write");
        self.transport.write(&frame).await?;
        Ok(())
    }

    // ========================================================================
    // Shapes
    // ========================================================================

    /// Write `command` and feed replies to `extract` until it yields a
    /// result. `Err` and malformed replies fail the request.
    async fn request_locked<R>(
        &self,
        command: Command,
        codes: &[u8],
        timeout: Option<Duration>,
        mut extract: impl FnMut(Event) -> Option<Result<R>>,
    ) -> Result<R> {
        let mut codes = codes.to_vec();
        codes.push(RESP_CODE_ERR);
        let mut op = PendingOperation::new(self.bus.subscribe(&codes));
        if let Some(timeout) = timeout {
            op.arm(timeout);
        }
        self.write_command(&command).await?;

        loop {
            match op.next().await? {
                Event::Err(reason) => return Err(Error::Firmware(reason)),
                Event::Malformed { error, .. } => return Err(Error::Malformed(error)),
                event => {
                    if let Some(result) = extract(event) {
                        return result;
                    }
                }
            }
        }
    }

    async fn request<R>(
        &self,
        command: Command,
        codes: &[u8],
        timeout: Option<Duration>,
        extract: impl FnMut(Event) -> Option<Result<R>>,
    ) -> Result<R> {
        let _guard = self.command_lock.lock().await;
        self.request_locked(command, codes, timeout, extract).await
    }

    async fn expect_ok_locked(&self, command: Command) -> Result<()> {
        self.request_locked(command, &[RESP_CODE_OK], None, |event| match event {
            Event::Ok => Some(Ok(())),
            _ => None,
        })
        .await
    }

    async fn expect_ok(&self, command: Command) -> Result<()> {
        let _guard = self.command_lock.lock().await;
        self.expect_ok_locked(command).await
    }

    /// Device-timed correlation.
    ///
    /// Until `Sent` arrives only an `Err` or a prefix-matched push can settle
    /// the operation. `Sent` releases the command lock and arms the deadline
    /// at the device's estimate plus `margin`. `accept` sees every other
    /// event together with the `Sent` reply, if any, and decides whether it
    /// belongs to this operation.
    async fn correlate<R>(
        &self,
        command: Command,
        push_codes: &[u8],
        margin: Option<Duration>,
        mut accept: impl FnMut(Option<&SentInfo>, &Event) -> Option<Result<R>>,
    ) -> Result<R> {
        let guard = self.command_lock.lock().await;
        let mut guard = Some(guard);
        let margin = margin.unwrap_or_else(|| self.config.extra_timeout());

        let mut codes = vec![RESP_CODE_SENT, RESP_CODE_ERR];
        codes.extend_from_slice(push_codes);
        let mut op = PendingOperation::new(self.bus.subscribe(&codes));
        self.write_command(&command).await?;

        let mut sent: Option<SentInfo> = None;
        loop {
            let event = op.next().await?;
            match &event {
                Event::Sent(info) if sent.is_none() => {
                    drop(guard.take());
                    let timeout = Duration::from_millis(info.est_timeout_ms as u64) + margin;
                    op.arm(timeout);
                    debug!(
                        code = command.code(),
                        expected_ack = info.expected_ack,
                        ?timeout,
                        "command sent, awaiting reply"
                    );
                    sent = Some(*info);
                    continue;
                }
                Event::Err(reason) => return Err(Error::Firmware(*reason)),
                Event::Malformed {
                    code: RESP_CODE_SENT,
                    error,
                } if sent.is_none() => return Err(Error::Malformed(error.clone())),
                Event::Malformed { code, .. } => {
                    trace!(code, "ignoring malformed push");
                    continue;
                }
                _ => {}
            }

            if let Some(result) = accept(sent.as_ref(), &event) {
                return result;
            }
        }
    }

    // ========================================================================
    // Device
    // ========================================================================

    /// Start the app session and read this node's identity and radio
    /// settings.
    pub async fn get_self_info(&self, timeout: Option<Duration>) -> Result<SelfInfo> {
        let command = Command::AppStart {
            app_version: self.config.app_version,
            app_name: self.config.app_name.clone(),
        };
        self.request(command, &[RESP_CODE_SELF_INFO], timeout, |event| match event {
            Event::SelfInfo(info) => Some(Ok(info)),
            _ => None,
        })
        .await
    }

    pub async fn device_query(&self) -> Result<DeviceInfo> {
        let command = Command::DeviceQuery {
            app_target_version: self.config.app_target_version,
        };
        self.request(command, &[RESP_CODE_DEVICE_INFO], None, |event| match event {
            Event::DeviceInfo(info) => Some(Ok(info)),
            _ => None,
        })
        .await
    }

    /// Device clock, in seconds since the epoch.
    pub async fn get_device_time(&self) -> Result<u32> {
        self.request(
            Command::GetDeviceTime,
            &[RESP_CODE_CURR_TIME],
            None,
            |event| match event {
                Event::CurrentTime { epoch_secs } => Some(Ok(epoch_secs)),
                _ => None,
            },
        )
        .await
    }

    pub async fn set_device_time(&self, epoch_secs: u32) -> Result<()> {
        self.expect_ok(Command::SetDeviceTime { epoch_secs }).await
    }

    /// Set the device clock from the host clock.
    pub async fn sync_device_time(&self) -> Result<()> {
        self.set_device_time(now_secs()).await
    }

    pub async fn get_battery_voltage(&self) -> Result<BatteryStatus> {
        self.request(
            Command::GetBatteryVoltage,
            &[RESP_CODE_BATTERY_VOLTAGE],
            None,
            |event| match event {
                Event::BatteryVoltage(status) => Some(Ok(status)),
                _ => None,
            },
        )
        .await
    }

    pub async fn set_advert_name(&self, name: &str) -> Result<()> {
        self.expect_ok(Command::SetAdvertName {
            name: name.to_string(),
        })
        .await
    }

    /// Set the advertised position, in degrees.
    pub async fn set_advert_lat_lon(&self, latitude: f64, longitude: f64) -> Result<()> {
        self.expect_ok(Command::SetAdvertLatLon {
            lat: (latitude * 1_000_000.0).round() as i32,
            lon: (longitude * 1_000_000.0).round() as i32,
        })
        .await
    }

    pub async fn set_radio_params(&self, params: RadioParams) -> Result<()> {
        self.expect_ok(Command::SetRadioParams { params }).await
    }

    pub async fn set_tx_power(&self, power_dbm: u8) -> Result<()> {
        self.expect_ok(Command::SetTxPower { power_dbm }).await
    }

    pub async fn set_other_params(&self, params: OtherParams) -> Result<()> {
        self.expect_ok(Command::SetOtherParams { params }).await
    }

    /// Set the BLE PIN; 0 disables it, anything else must have six digits.
    pub async fn set_device_pin(&self, pin: u32) -> Result<()> {
        if pin != 0 && !(100_000..=999_999).contains(&pin) {
            return Err(Error::InvalidArgument(format!(
                "PIN must be 0 or six digits, got {}",
                pin
            )));
        }
        self.expect_ok(Command::SetDevicePin { pin }).await
    }

    pub async fn send_flood_advert(&self) -> Result<()> {
        self.expect_ok(Command::SendSelfAdvert { flood: true }).await
    }

    pub async fn send_zero_hop_advert(&self) -> Result<()> {
        self.expect_ok(Command::SendSelfAdvert { flood: false }).await
    }

    /// Restart the device. It does not reply.
    pub async fn reboot(&self) -> Result<()> {
        self.send_command(&Command::Reboot).await
    }

    /// Export this node's private identity. Fails with [`Error::Disabled`]
    /// when the firmware was built without key export.
    pub async fn export_private_key(&self) -> Result<[u8; PRIVATE_KEY_SIZE]> {
        self.request(
            Command::ExportPrivateKey,
            &[RESP_CODE_PRIVATE_KEY, RESP_CODE_DISABLED],
            None,
            |event| match event {
                Event::PrivateKey { identity } => Some(Ok(identity)),
                Event::Disabled => Some(Err(Error::Disabled)),
                _ => None,
            },
        )
        .await
    }

    pub async fn import_private_key(&self, identity: [u8; PRIVATE_KEY_SIZE]) -> Result<()> {
        self.expect_ok(Command::ImportPrivateKey { identity }).await
    }

    /// Sign `data` with the device key.
    ///
    /// The data is streamed in chunks of `sign_chunk_size` bytes, each
    /// acknowledged before the next is sent.
    pub async fn sign(&self, data: &[u8]) -> Result<[u8; SIGNATURE_SIZE]> {
        let _guard = self.command_lock.lock().await;

        let max_len = self
            .request_locked(
                Command::SignStart,
                &[RESP_CODE_SIGN_START],
                None,
                |event| match event {
                    Event::SignStart { max_len } => Some(Ok(max_len as usize)),
                    _ => None,
                },
            )
            .await?;
        if data.len() > max_len {
            return Err(Error::DataTooLong {
                len: data.len(),
                max: max_len,
            });
        }

        for chunk in data.chunks(self.config.sign_chunk_size()) {
            self.expect_ok_locked(Command::SignData {
                chunk: chunk.to_vec(),
            })
            .await?;
        }

        self.request_locked(
            Command::SignFinish,
            &[RESP_CODE_SIGNATURE],
            None,
            |event| match event {
                Event::Signature(signature) => Some(Ok(signature)),
                _ => None,
            },
        )
        .await
    }

    // ========================================================================
    // Contacts
    // ========================================================================

    /// List contacts, optionally only those modified after `since`.
    pub async fn get_contacts(&self, since: Option<u32>) -> Result<Vec<Contact>> {
        let _guard = self.command_lock.lock().await;
        let mut op = PendingOperation::new(self.bus.subscribe(&[
            RESP_CODE_CONTACTS_START,
            RESP_CODE_CONTACT,
            RESP_CODE_END_OF_CONTACTS,
            RESP_CODE_ERR,
        ]));
        self.write_command(&Command::GetContacts { since }).await?;

        let mut contacts = Vec::new();
        loop {
            match op.next().await? {
                Event::ContactsStart { count } => {
                    trace!(count, "contact list starting");
                    contacts.reserve((count as usize).min(1024));
                }
                Event::Contact(contact) => contacts.push(contact),
                Event::EndOfContacts { .. } => return Ok(contacts),
                Event::Err(reason) => return Err(Error::Firmware(reason)),
                Event::Malformed { error, .. } => return Err(Error::Malformed(error)),
                _ => {}
            }
        }
    }

    pub async fn find_contact_by_name(&self, name: &str) -> Result<Option<Contact>> {
        let contacts = self.get_contacts(None).await?;
        Ok(contacts.into_iter().find(|c| c.name == name))
    }

    pub async fn find_contact_by_public_key_prefix(&self, prefix: &[u8]) -> Result<Option<Contact>> {
        let contacts = self.get_contacts(None).await?;
        Ok(contacts
            .into_iter()
            .find(|c| c.public_key.0.starts_with(prefix)))
    }

    pub async fn get_contact_by_key(&self, public_key: &PublicKey) -> Result<Contact> {
        let command = Command::GetContactByKey {
            public_key: *public_key,
        };
        self.request(command, &[RESP_CODE_CONTACT], None, |event| match event {
            Event::Contact(contact) => Some(Ok(contact)),
            _ => None,
        })
        .await
    }

    pub async fn add_or_update_contact(&self, contact: &Contact) -> Result<()> {
        self.expect_ok(Command::AddUpdateContact {
            contact: Box::new(contact.clone()),
        })
        .await
    }

    pub async fn remove_contact(&self, public_key: &PublicKey) -> Result<()> {
        self.expect_ok(Command::RemoveContact {
            public_key: *public_key,
        })
        .await
    }

    /// Forget the direct path to a contact so the next message floods.
    pub async fn reset_path(&self, public_key: &PublicKey) -> Result<()> {
        self.expect_ok(Command::ResetPath {
            public_key: *public_key,
        })
        .await
    }

    pub async fn share_contact(&self, public_key: &PublicKey) -> Result<()> {
        self.expect_ok(Command::ShareContact {
            public_key: *public_key,
        })
        .await
    }

    /// Export a contact, or this node when `public_key` is `None`, as an
    /// advert packet.
    pub async fn export_contact(&self, public_key: Option<&PublicKey>) -> Result<Vec<u8>> {
        let command = Command::ExportContact {
            public_key: public_key.copied(),
        };
        self.request(command, &[RESP_CODE_EXPORT_CONTACT], None, |event| match event {
            Event::ExportContact { data } => Some(Ok(data)),
            _ => None,
        })
        .await
    }

    pub async fn import_contact(&self, advert_packet: &[u8]) -> Result<()> {
        self.expect_ok(Command::ImportContact {
            advert_packet: advert_packet.to_vec(),
        })
        .await
    }

    pub async fn get_advert_path(&self, public_key: &PublicKey) -> Result<AdvertPath> {
        let command = Command::GetAdvertPath {
            public_key: *public_key,
        };
        self.request(command, &[RESP_CODE_ADVERT_PATH], None, |event| match event {
            Event::AdvertPath(path) => Some(Ok(path)),
            _ => None,
        })
        .await
    }

    // ========================================================================
    // Channels
    // ========================================================================

    async fn get_channel_locked(&self, index: u8) -> Result<Channel> {
        self.request_locked(
            Command::GetChannel { index },
            &[RESP_CODE_CHANNEL_INFO],
            None,
            |event| match event {
                Event::ChannelInfo(channel) => Some(Ok(channel)),
                _ => None,
            },
        )
        .await
    }

    pub async fn get_channel(&self, index: u8) -> Result<Channel> {
        let _guard = self.command_lock.lock().await;
        self.get_channel_locked(index).await
    }

    /// Read channel slots from index 0 until the device rejects an index.
    pub async fn get_channels(&self) -> Result<Vec<Channel>> {
        let _guard = self.command_lock.lock().await;
        let mut channels = Vec::new();
        for index in 0..=MAX_CHANNEL_INDEX {
            match self.get_channel_locked(index).await {
                Ok(channel) => channels.push(channel),
                Err(Error::Firmware(_)) => break,
                Err(e) => return Err(e),
            }
        }
        Ok(channels)
    }

    pub async fn set_channel(&self, channel: &Channel) -> Result<()> {
        self.expect_ok(Command::SetChannel {
            channel: channel.clone(),
        })
        .await
    }

    /// Clear a channel slot.
    pub async fn delete_channel(&self, index: u8) -> Result<()> {
        self.set_channel(&Channel {
            index,
            ..Channel::default()
        })
        .await
    }

    // ========================================================================
    // Messaging
    // ========================================================================

    /// Send a text message and wait for the recipient's acknowledgement.
    ///
    /// Returns the round trip reported by the device.
    pub async fn send_text_message(
        &self,
        recipient: &PublicKey,
        text: &str,
        margin: Option<Duration>,
    ) -> Result<Duration> {
        let command = Command::SendTextMessage {
            text_type: TextType::Plain,
            attempt: 0,
            timestamp: now_secs(),
            recipient_prefix: recipient.prefix(),
            text: text.to_string(),
        };
        self.correlate(
            command,
            &[PUSH_CODE_SEND_CONFIRMED],
            margin,
            |sent, event| match (sent, event) {
                (
                    Some(sent),
                    Event::SendConfirmed {
                        ack_code,
                        round_trip_ms,
                    },
                ) if *ack_code == sent.expected_ack => {
                    Some(Ok(Duration::from_millis(*round_trip_ms as u64)))
                }
                _ => None,
            },
        )
        .await
    }

    pub async fn send_channel_text_message(&self, channel_idx: u8, text: &str) -> Result<()> {
        self.expect_ok(Command::SendChannelTextMessage {
            text_type: TextType::Plain,
            channel_idx,
            timestamp: now_secs(),
            text: text.to_string(),
        })
        .await
    }

    /// Send raw bytes along an explicit path.
    pub async fn send_raw_data(&self, path: &[u8], payload: &[u8]) -> Result<()> {
        if path.len() > MAX_PATH_SIZE {
            return Err(Error::InvalidArgument(format!(
                "path of {} hops exceeds {}",
                path.len(),
                MAX_PATH_SIZE
            )));
        }
        self.expect_ok(Command::SendRawData {
            path: path.to_vec(),
            payload: payload.to_vec(),
        })
        .await
    }

    /// Pop the next queued message, `None` when the queue is empty.
    pub async fn sync_next_message(&self) -> Result<Option<ReceivedMessage>> {
        self.request(
            Command::SyncNextMessage,
            &[
                RESP_CODE_CONTACT_MSG_RECV,
                RESP_CODE_CONTACT_MSG_RECV_V3,
                RESP_CODE_CHANNEL_MSG_RECV,
                RESP_CODE_CHANNEL_MSG_RECV_V3,
                RESP_CODE_NO_MORE_MESSAGES,
            ],
            None,
            |event| match event {
                Event::ContactMessageV2(msg) | Event::ContactMessageV3(msg) => {
                    Some(Ok(Some(ReceivedMessage::Contact(msg))))
                }
                Event::ChannelMessageV2(msg) | Event::ChannelMessageV3(msg) => {
                    Some(Ok(Some(ReceivedMessage::Channel(msg))))
                }
                Event::NoMoreMessages => Some(Ok(None)),
                _ => None,
            },
        )
        .await
    }

    /// Drain the device's message queue.
    pub async fn get_waiting_messages(&self) -> Result<Vec<ReceivedMessage>> {
        let mut messages = Vec::new();
        while let Some(message) = self.sync_next_message().await? {
            messages.push(message);
        }
        Ok(messages)
    }

    // ========================================================================
    // Remote nodes
    // ========================================================================

    /// Log in to a repeater or room server.
    pub async fn login(
        &self,
        server: &PublicKey,
        password: &str,
        margin: Option<Duration>,
    ) -> Result<LoginSuccess> {
        if password.len() > MAX_LOGIN_PASSWORD_LEN {
            return Err(Error::InvalidArgument(format!(
                "password longer than {} bytes",
                MAX_LOGIN_PASSWORD_LEN
            )));
        }
        let prefix = server.prefix();
        let command = Command::SendLogin {
            public_key: *server,
            password: password.to_string(),
        };
        self.correlate(
            command,
            &[PUSH_CODE_LOGIN_SUCCESS, PUSH_CODE_LOGIN_FAIL],
            margin,
            |_, event| match event {
                Event::LoginSuccess(login) if login.server_prefix == prefix => Some(Ok(*login)),
                Event::LoginFail { server_prefix } if *server_prefix == prefix => {
                    Some(Err(Error::Firmware(None)))
                }
                _ => None,
            },
        )
        .await
    }

    pub async fn logout(&self, server: &PublicKey) -> Result<()> {
        self.expect_ok(Command::Logout {
            public_key: *server,
        })
        .await
    }

    /// Request status counters from a repeater.
    pub async fn get_status(
        &self,
        server: &PublicKey,
        margin: Option<Duration>,
    ) -> Result<RepeaterStatus> {
        let prefix = server.prefix();
        self.correlate(
            Command::SendStatusRequest {
                public_key: *server,
            },
            &[PUSH_CODE_STATUS_RESPONSE],
            margin,
            |_, event| match event {
                Event::StatusResponse {
                    server_prefix,
                    data,
                } if *server_prefix == prefix => {
                    Some(RepeaterStatus::from_bytes(data).map_err(Error::from))
                }
                _ => None,
            },
        )
        .await
    }

    pub async fn get_telemetry(
        &self,
        node: &PublicKey,
        margin: Option<Duration>,
    ) -> Result<Telemetry> {
        let prefix = node.prefix();
        self.correlate(
            Command::SendTelemetryRequest { public_key: *node },
            &[PUSH_CODE_TELEMETRY_RESPONSE],
            margin,
            |_, event| match event {
                Event::TelemetryResponse {
                    server_prefix,
                    data,
                } if *server_prefix == prefix => Some(Ok(Telemetry {
                    responder_prefix: *server_prefix,
                    records: meshcore_packet::telemetry::decode(data),
                })),
                _ => None,
            },
        )
        .await
    }

    /// Send a binary request (request code followed by its parameters) and
    /// return the response body.
    pub async fn send_binary_request(
        &self,
        node: &PublicKey,
        data: &[u8],
        margin: Option<Duration>,
    ) -> Result<Vec<u8>> {
        let command = Command::SendBinaryRequest {
            public_key: *node,
            data: data.to_vec(),
        };
        self.correlate(
            command,
            &[PUSH_CODE_BINARY_RESPONSE],
            margin,
            |sent, event| match (sent, event) {
                (Some(sent), Event::BinaryResponse { tag, data }) if *tag == sent.expected_ack => {
                    Some(Ok(data.clone()))
                }
                _ => None,
            },
        )
        .await
    }

    /// Trace a route given as one hash byte per hop.
    ///
    /// A random tag is used when `tag` is `None`.
    pub async fn trace_path(
        &self,
        path: &[u8],
        tag: Option<u32>,
        margin: Option<Duration>,
    ) -> Result<TraceData> {
        let tag = tag.unwrap_or_else(rand::random);
        let command = Command::SendTracePath {
            tag,
            auth: 0,
            flags: 0,
            path: path.to_vec(),
        };
        self.correlate(
            command,
            &[PUSH_CODE_TRACE_DATA],
            margin,
            |sent, event| match event {
                Event::TraceData(trace) if sent.is_some() && trace.tag == tag => {
                    Some(Ok(trace.clone()))
                }
                _ => None,
            },
        )
        .await
    }

    /// Discover the round-trip path to a node.
    pub async fn discover_path(
        &self,
        node: &PublicKey,
        margin: Option<Duration>,
    ) -> Result<PathDiscovery> {
        let prefix = node.prefix();
        self.correlate(
            Command::SendPathDiscoveryRequest { public_key: *node },
            &[PUSH_CODE_PATH_DISCOVERY_RESPONSE],
            margin,
            |_, event| match event {
                Event::PathDiscoveryResponse(found) if found.target_prefix == prefix => {
                    Some(Ok(found.clone()))
                }
                _ => None,
            },
        )
        .await
    }
}

fn now_secs() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .unwrap_or_default()
}
