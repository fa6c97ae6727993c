//! Serial link to a Meshtastic device.
//!
//! [`SerialRadio::open`] returns two halves: the radio itself (the [`MeshTransport`]
//! implementation, shared behind an `Arc`) and a [`SerialReader`] that owns a cloned
//! port handle and turns incoming frames into [`RadioEvent`]s. Reading never takes the
//! write lock, so a blocked send cannot stall inbound traffic.
use std::io::{Read, Write};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use log::{debug, error, info, trace, warn};
use prost::Message;
use serialport::SerialPort;
use tokio::sync::mpsc;

use super::framer::{encode_frame, StreamFramer};
use super::proto::{self, from_radio, mesh_packet, to_radio, PortNum};
use super::{MeshTransport, RadioEvent, TextEvent};
use crate::errors::TransportError;
use crate::logutil::{escape_log, hex_snippet, truncate_for_log};

/// Link tuning, typically sourced from [`crate::config::MeshtasticConfig`].
#[derive(Debug, Clone)]
pub struct RadioSettings {
    pub baud_rate: u32,
    /// Largest text payload per frame.
    pub max_text_bytes: usize,
    /// Minimum gap between consecutive text packets (ms).
    pub min_send_gap_ms: u64,
    pub hop_limit: u32,
}

impl Default for RadioSettings {
    fn default() -> Self {
        Self {
            baud_rate: 115200,
            max_text_bytes: super::DEFAULT_TEXT_BYTES,
            min_send_gap_ms: 2000,
            hop_limit: 3,
        }
    }
}

pub struct SerialRadio {
    port_name: String,
    writer: Mutex<Box<dyn SerialPort>>,
    settings: RadioSettings,
    last_text_send: Mutex<Option<Instant>>,
    config_request_id: u32,
}

pub struct SerialReader {
    radio: Arc<SerialRadio>,
    port: Box<dyn SerialPort>,
    framer: StreamFramer,
    events: mpsc::UnboundedSender<RadioEvent>,
    our_node_id: Option<u32>,
}

fn io_error(e: serialport::Error) -> TransportError {
    TransportError::Io(std::io::Error::from(e))
}

impl SerialRadio {
    /// Open the port, wake the device and request its configuration.
    pub async fn open(
        port_name: &str,
        settings: RadioSettings,
        events: mpsc::UnboundedSender<RadioEvent>,
    ) -> Result<(Arc<SerialRadio>, SerialReader), TransportError> {
        debug!(
            "Opening serial port {} at {} baud",
            port_name, settings.baud_rate
        );
        let mut builder =
            serialport::new(port_name, settings.baud_rate).timeout(Duration::from_millis(500));
        #[cfg(unix)]
        {
            builder = builder
                .data_bits(serialport::DataBits::Eight)
                .stop_bits(serialport::StopBits::One)
                .parity(serialport::Parity::None);
        }
        let mut port = builder.open().map_err(io_error)?;

        // Toggle DTR/RTS so the device wakes up
        let _ = port.write_data_terminal_ready(true);
        let _ = port.write_request_to_send(true);
        tokio::time::sleep(Duration::from_millis(150)).await;

        // Drop buffered boot console output
        let mut purge = [0u8; 512];
        if let Ok(available) = port.bytes_to_read() {
            if available > 0 {
                let _ = port.read(&mut purge);
            }
        }

        let read_half = port.try_clone().map_err(io_error)?;
        let mut config_request_id: u32 = rand::random();
        if config_request_id == 0 {
            config_request_id = 1;
        }
        let radio = Arc::new(SerialRadio {
            port_name: port_name.to_string(),
            writer: Mutex::new(port),
            settings,
            last_text_send: Mutex::new(None),
            config_request_id,
        });
        radio.send_want_config()?;

        let reader = SerialReader {
            radio: Arc::clone(&radio),
            port: read_half,
            framer: StreamFramer::new(),
            events,
            our_node_id: None,
        };
        info!("Serial link to {} initialized", port_name);
        Ok((radio, reader))
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    /// Ask the device to stream its config; `config_complete_id` marks the end.
    pub fn send_want_config(&self) -> Result<(), TransportError> {
        debug!("Sending want_config_id=0x{:08x}", self.config_request_id);
        self.send_toradio(proto::ToRadio {
            payload_variant: Some(to_radio::PayloadVariant::WantConfigId(
                self.config_request_id,
            )),
        })
    }

    /// Keep the serial API session alive.
    pub fn send_heartbeat(&self) -> Result<(), TransportError> {
        let nonce = (chrono::Utc::now().timestamp_millis() & 0xffff) as u32;
        self.send_toradio(proto::ToRadio {
            payload_variant: Some(to_radio::PayloadVariant::Heartbeat(proto::Heartbeat {
                nonce,
            })),
        })
    }

    fn send_toradio(&self, msg: proto::ToRadio) -> Result<(), TransportError> {
        let payload = msg.encode_to_vec();
        let frame = encode_frame(&payload)?;
        let mut port = self.writer.lock().map_err(|_| {
            TransportError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "serial writer lock poisoned",
            ))
        })?;
        port.write_all(&frame)?;
        port.flush()?;
        trace!("Sent ToRadio frame ({} bytes payload)", payload.len());
        Ok(())
    }

    fn wait_for_send_gap(&self) {
        let gap = Duration::from_millis(self.settings.min_send_gap_ms);
        let wait = match self.last_text_send.lock() {
            Ok(last) => last.and_then(|t| gap.checked_sub(t.elapsed())),
            Err(_) => None,
        };
        if let Some(wait) = wait {
            trace!("Pacing text send for {}ms", wait.as_millis());
            std::thread::sleep(wait);
        }
    }
}

impl MeshTransport for SerialRadio {
    fn send_text(&self, text: &str, channel: u32) -> Result<(), TransportError> {
        self.wait_for_send_gap();
        let pkt = proto::MeshPacket {
            // firmware fills in our node number
            from: 0,
            to: proto::BROADCAST_ADDR,
            channel,
            payload_variant: Some(mesh_packet::PayloadVariant::Decoded(proto::Data {
                portnum: PortNum::TextMessageApp as i32,
                payload: text.as_bytes().to_vec(),
                ..Default::default()
            })),
            id: rand::random(),
            hop_limit: self.settings.hop_limit,
            ..Default::default()
        };
        let result = self.send_toradio(proto::ToRadio {
            payload_variant: Some(to_radio::PayloadVariant::Packet(pkt)),
        });
        if let Ok(mut last) = self.last_text_send.lock() {
            *last = Some(Instant::now());
        }
        if result.is_ok() {
            debug!(
                "Sent text on channel {} ({} bytes): '{}'",
                channel,
                text.len(),
                truncate_for_log(text, 80)
            );
        }
        result
    }

    fn max_payload_bytes(&self) -> usize {
        self.settings.max_text_bytes
    }
}

impl SerialReader {
    /// Blocking read loop. Returns when the port fails or the event receiver is gone.
    pub fn run(mut self) {
        info!("Starting Meshtastic reader on {}", self.radio.port_name());
        let mut buffer = [0u8; 1024];
        while !self.events.is_closed() {
            match self.port.read(&mut buffer) {
                Ok(0) => {}
                Ok(n) => {
                    trace!("RAW {} bytes: {}", n, hex_snippet(&buffer[..n], 64));
                    self.framer.push(&buffer[..n]);
                    while let Some(frame) = self.framer.next_frame() {
                        self.process_frame(&frame);
                    }
                }
                Err(ref e) if e.kind() == std::io::ErrorKind::TimedOut => {}
                Err(ref e) if e.kind() == std::io::ErrorKind::Interrupted => {
                    debug!("Reader interrupted (EINTR)");
                }
                Err(e) => {
                    error!("Serial read error on {}: {}", self.radio.port_name(), e);
                    let _ = self.events.send(RadioEvent::Disconnected);
                    break;
                }
            }
        }
        info!("Meshtastic reader shutting down");
    }

    fn process_frame(&mut self, frame: &[u8]) {
        let msg = match proto::FromRadio::decode(frame) {
            Ok(m) => m,
            Err(e) => {
                debug!("Undecodable frame ({}): {}", e, hex_snippet(frame, 32));
                return;
            }
        };
        match msg.payload_variant {
            Some(from_radio::PayloadVariant::ConfigCompleteId(id)) => {
                if id == self.radio.config_request_id {
                    info!("Meshtastic connection established");
                    let _ = self.events.send(RadioEvent::ConnectionEstablished);
                } else {
                    debug!("Ignoring config_complete_id=0x{:08x} (not ours)", id);
                }
            }
            Some(from_radio::PayloadVariant::MyInfo(info)) => {
                if self.our_node_id.is_none() {
                    debug!("Got our node ID: 0x{:08x}", info.my_node_num);
                }
                self.our_node_id = Some(info.my_node_num);
            }
            Some(from_radio::PayloadVariant::Rebooted(_)) => {
                warn!("Device rebooted; requesting config again");
                if let Err(e) = self.radio.send_want_config() {
                    warn!("Failed to re-request config: {}", e);
                }
            }
            Some(from_radio::PayloadVariant::Packet(pkt)) => self.process_packet(pkt),
            None => {}
        }
    }

    fn process_packet(&mut self, pkt: proto::MeshPacket) {
        if Some(pkt.from) == self.our_node_id {
            return;
        }
        let data = match pkt.payload_variant {
            Some(mesh_packet::PayloadVariant::Decoded(d)) => d,
            _ => return,
        };
        let port = PortNum::try_from(data.portnum).unwrap_or(PortNum::UnknownApp);
        if port != PortNum::TextMessageApp {
            trace!("Non-text packet from 0x{:08x}: port={:?}", pkt.from, port);
            return;
        }
        let text = match String::from_utf8(data.payload) {
            Ok(t) => Some(t),
            Err(e) => {
                warn!("Text packet from 0x{:08x} is not UTF-8: {}", pkt.from, e);
                None
            }
        };
        debug!(
            "Text from 0x{:08x} ch={}: '{}'",
            pkt.from,
            pkt.channel,
            escape_log(text.as_deref().unwrap_or(""))
        );
        let event = TextEvent {
            source: pkt.from,
            dest: (pkt.to != proto::BROADCAST_ADDR).then_some(pkt.to),
            channel: Some(pkt.channel),
            text,
        };
        let _ = self.events.send(RadioEvent::Text(event));
    }
}
