// SPDX-License-Identifier: Apache-2.0 OR MIT
// Message builders: wrap a record's payload in the DLT framing (or the text
// header line) and hand the result to the drainer span by span.
//
// On-the-wire layout of one stored DLT message:
//
//   [Storage hdr (16B): "DLT\x01" | seconds u32 LE | microseconds i32 LE | ecu 4B]
//   [Standard hdr (4B): htyp u8 | mcnt u8 | len u16 BE]
//   [Standard extra (8B): ecu 4B | tmsp u32 BE]
//   [Extended hdr (10B): msin u8 | noar u8 | apid 4B | ctid 4B]
//   [Verbose payload]

use std::sync::OnceLock;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use crate::ident::LoggingIdentifier;
use crate::payload::VerbosePayload;
use crate::record::LogEntry;
use crate::text::TextFormat;
use crate::types::IntegerRepresentation;

pub const DLT_STORAGE_HEADER_SIZE: usize = 16;
/// Standard (4) + standard extra (8) + extended (10) header bytes
pub const DLT_HEADER_SIZE: usize = 22;
/// Maximum size of one DLT message excluding the storage header
pub const DLT_MESSAGE_SIZE: usize = 65_535;
/// Capacity of a builder's header scratch buffer
pub const MAX_DLT_HEADER_SIZE: usize = 512;

// htyp bits of the standard header
const DLT_HTYP_UEH: u8 = 0x01;
const DLT_HTYP_WEID: u8 = 0x04;
const DLT_HTYP_WTMS: u8 = 0x10;
const DLT_HTYP_VERS: u8 = 0x20;

// msin encoding of the extended header
const DLT_MSIN_VERBOSE: u8 = 0x01;
const DLT_MSIN_MSTP_SHIFT: u32 = 1;
const DLT_MSIN_MTIN_SHIFT: u32 = 4;
const DLT_TYPE_LOG: u8 = 0x00;

/// Timestamp of the storage header plus the steady `tmsp` tick, sampled from
/// independent clocks (wall clock for storage, steady clock for tmsp).
#[derive(Debug, Clone, Copy)]
pub struct SvpTime {
    pub timestamp: u32,
    pub seconds: u32,
    pub microseconds: i32,
}

/// Steady-clock ticks in 0.1 ms units, anchored at first use
pub fn steady_ticks() -> u32 {
    static ANCHOR: OnceLock<Instant> = OnceLock::new();
    let anchor = ANCHOR.get_or_init(Instant::now);
    (anchor.elapsed().as_micros() / 100) as u32
}

fn sample_svp_time() -> SvpTime {
    let epoch = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    SvpTime {
        timestamp: steady_ticks(),
        seconds: epoch.as_secs() as u32,
        microseconds: epoch.subsec_micros() as i32,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParsingPhase {
    Header,
    Payload,
    Reinitialize,
}

/// Assembles the emission spans for one bound record.
///
/// The state machine yields the header span, then the payload span, then
/// `None` while resetting the buffers: two writer pushes per message, no
/// copies of the payload.
pub trait MessageBuilder: Send {
    /// Bind the builder to the next record and precompute its header
    fn set_next_message(&mut self, entry: &LogEntry);

    /// Yield the next span to emit, or `None` when the message is finished
    /// (which also resets the bound record's payload for reuse).
    fn next_span<'a>(&'a mut self, entry: &'a mut LogEntry) -> Option<&'a [u8]>;
}

fn put_storage_header(header: &mut VerbosePayload, time: &SvpTime) {
    header.put(b"DLT\x01");
    header.put(&time.seconds.to_le_bytes());
    header.put(&time.microseconds.to_le_bytes());
    // The storage header carries a fixed receiver tag; the configured ECU id
    // travels in the standard header extra.
    header.put(b"ECU\x00");
}

fn put_standard_header(header: &mut VerbosePayload, message_size: u16, message_count: u8) {
    let htyp = DLT_HTYP_UEH | DLT_HTYP_WEID | DLT_HTYP_WTMS | DLT_HTYP_VERS;
    header.put(&[htyp, message_count]);
    header.put(&message_size.to_be_bytes());
}

fn put_standard_header_extra(header: &mut VerbosePayload, ecu: LoggingIdentifier, tmsp: u32) {
    header.put(&ecu.bytes());
    header.put(&tmsp.to_be_bytes());
}

fn put_extended_header(header: &mut VerbosePayload, entry: &LogEntry) {
    let level = entry.log_level.as_u8() as u32 & 0b111;
    let message_info = ((DLT_TYPE_LOG as u32) << DLT_MSIN_MSTP_SHIFT)
        | (level << DLT_MSIN_MTIN_SHIFT)
        | DLT_MSIN_VERBOSE as u32;
    header.put(&[message_info as u8, entry.num_of_args]);
    header.put(&entry.app_id.bytes());
    header.put(&entry.ctx_id.bytes());
}

/// Builds binary DLT messages for the file and remote sinks.
pub struct DltMessageBuilder {
    header_payload: VerbosePayload,
    parsing_phase: ParsingPhase,
    ecu_id: LoggingIdentifier,
    message_count: u8,
    payload_emit_len: usize,
}

impl DltMessageBuilder {
    pub fn new(ecu_id: LoggingIdentifier) -> Self {
        Self {
            header_payload: VerbosePayload::new(MAX_DLT_HEADER_SIZE),
            parsing_phase: ParsingPhase::Header,
            ecu_id,
            message_count: 0,
            payload_emit_len: 0,
        }
    }
}

impl MessageBuilder for DltMessageBuilder {
    fn set_next_message(&mut self, entry: &LogEntry) {
        let time = sample_svp_time();

        // Truncate the payload so the whole message stays within the DLT
        // message size limit.
        self.payload_emit_len = entry
            .payload
            .len()
            .min(DLT_MESSAGE_SIZE - DLT_HEADER_SIZE - DLT_STORAGE_HEADER_SIZE);
        let message_size = (DLT_HEADER_SIZE + self.payload_emit_len) as u16;

        put_storage_header(&mut self.header_payload, &time);
        put_standard_header(&mut self.header_payload, message_size, self.message_count);
        put_standard_header_extra(&mut self.header_payload, self.ecu_id, time.timestamp);
        put_extended_header(&mut self.header_payload, entry);

        self.message_count = self.message_count.wrapping_add(1);
        self.parsing_phase = ParsingPhase::Header;
    }

    fn next_span<'a>(&'a mut self, entry: &'a mut LogEntry) -> Option<&'a [u8]> {
        match self.parsing_phase {
            ParsingPhase::Header => {
                self.parsing_phase = ParsingPhase::Payload;
                Some(self.header_payload.as_slice())
            }
            ParsingPhase::Payload => {
                self.parsing_phase = ParsingPhase::Reinitialize;
                Some(&entry.payload.as_slice()[..self.payload_emit_len])
            }
            ParsingPhase::Reinitialize => {
                self.parsing_phase = ParsingPhase::Header;
                self.header_payload.reset();
                entry.payload.reset();
                None
            }
        }
    }
}

const MAX_TEXT_HEADER_SIZE: usize = 512;

/// Builds the human-readable header line for the console/file text sinks.
pub struct TextMessageBuilder {
    header_payload: VerbosePayload,
    parsing_phase: ParsingPhase,
    ecu_id: LoggingIdentifier,
}

impl TextMessageBuilder {
    pub fn new(ecu_id: LoggingIdentifier) -> Self {
        Self {
            header_payload: VerbosePayload::new(MAX_TEXT_HEADER_SIZE),
            parsing_phase: ParsingPhase::Header,
            ecu_id,
        }
    }
}

impl MessageBuilder for TextMessageBuilder {
    fn set_next_message(&mut self, entry: &LogEntry) {
        let header = &mut self.header_payload;
        TextFormat::put_formatted_time(header);
        TextFormat::log_u32(header, steady_ticks(), IntegerRepresentation::Decimal);
        TextFormat::log_str(header, "000");
        TextFormat::log_str(header, self.ecu_id.as_str());
        TextFormat::log_str(header, entry.app_id.as_str());
        TextFormat::log_str(header, entry.ctx_id.as_str());
        TextFormat::log_str(header, "log");
        TextFormat::log_str(header, entry.log_level.as_str());
        TextFormat::log_str(header, "verbose");
        TextFormat::log_u8(header, entry.num_of_args, IntegerRepresentation::Decimal);
        self.parsing_phase = ParsingPhase::Header;
    }

    fn next_span<'a>(&'a mut self, entry: &'a mut LogEntry) -> Option<&'a [u8]> {
        match self.parsing_phase {
            ParsingPhase::Header => {
                self.parsing_phase = ParsingPhase::Payload;
                Some(self.header_payload.as_slice())
            }
            ParsingPhase::Payload => {
                self.parsing_phase = ParsingPhase::Reinitialize;
                TextFormat::terminate_log(&mut entry.payload);
                Some(entry.payload.as_slice())
            }
            ParsingPhase::Reinitialize => {
                self.parsing_phase = ParsingPhase::Header;
                self.header_payload.reset();
                entry.payload.reset();
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::LogLevel;

    fn entry_with_payload(bytes: &[u8]) -> LogEntry {
        let mut entry = LogEntry {
            app_id: LoggingIdentifier::new("APP1"),
            ctx_id: LoggingIdentifier::new("CTX1"),
            log_level: LogLevel::Warn,
            num_of_args: 1,
            payload: VerbosePayload::new(256),
            system_code: None,
        };
        entry.payload.put(bytes);
        entry
    }

    #[test]
    fn test_state_machine_yields_header_payload_none() {
        let mut builder = DltMessageBuilder::new(LoggingIdentifier::new("ECU1"));
        let mut entry = entry_with_payload(b"xyz");
        builder.set_next_message(&entry);

        assert!(builder.next_span(&mut entry).is_some());
        assert!(builder.next_span(&mut entry).is_some());
        assert!(builder.next_span(&mut entry).is_none());

        // The terminal transition resets the record payload.
        assert_eq!(entry.payload.len(), 0);
    }

    #[test]
    fn test_dlt_header_layout() {
        let mut builder = DltMessageBuilder::new(LoggingIdentifier::new("NONE"));
        let mut entry = entry_with_payload(&[0u8; 12]);
        builder.set_next_message(&entry);

        let header = builder.next_span(&mut entry).unwrap().to_vec();
        assert_eq!(header.len(), DLT_STORAGE_HEADER_SIZE + DLT_HEADER_SIZE);

        // Storage header
        assert_eq!(&header[0..4], b"DLT\x01");
        assert_eq!(&header[12..16], b"ECU\x00");

        // Standard header: htyp has UEH|WEID|WTMS|VERS, first message count 0
        assert_eq!(header[16], 0x35);
        assert_eq!(header[17], 0);
        let len = u16::from_be_bytes([header[18], header[19]]);
        assert_eq!(len as usize, DLT_HEADER_SIZE + 12);

        // Standard extra: configured ECU id
        assert_eq!(&header[20..24], b"NONE");

        // Extended header: msin = (LOG << 1) | (Warn << 4) | verbose
        assert_eq!(header[28], (3 << 4) | 1);
        assert_eq!(header[29], 1);
        assert_eq!(&header[30..34], b"APP1");
        assert_eq!(&header[34..38], b"CTX1");
    }

    #[test]
    fn test_message_count_increments_and_wraps() {
        let mut builder = DltMessageBuilder::new(LoggingIdentifier::new("NONE"));
        for expected in [0u8, 1, 2] {
            let mut entry = entry_with_payload(b"a");
            builder.set_next_message(&entry);
            let header = builder.next_span(&mut entry).unwrap().to_vec();
            assert_eq!(header[17], expected);
            while builder.next_span(&mut entry).is_some() {}
        }
    }

    #[test]
    fn test_text_header_tokens() {
        let mut builder = TextMessageBuilder::new(LoggingIdentifier::new("NONE"));
        let mut entry = entry_with_payload(b"42 ");
        entry.log_level = LogLevel::Info;
        builder.set_next_message(&entry);

        let header = builder.next_span(&mut entry).unwrap().to_vec();
        let header = std::str::from_utf8(&header).unwrap();
        let tokens: Vec<&str> = header.split_whitespace().collect();

        // date | time.ms | ticks | 000 | ecu | app | ctx | log | level | verbose | noar
        assert_eq!(tokens.len(), 11);
        assert!(tokens[1].contains('.'));
        assert_eq!(tokens[3], "000");
        assert_eq!(tokens[4], "NONE");
        assert_eq!(tokens[5], "APP1");
        assert_eq!(tokens[6], "CTX1");
        assert_eq!(tokens[7], "log");
        assert_eq!(tokens[8], "info");
        assert_eq!(tokens[9], "verbose");
        assert_eq!(tokens[10], "1");

        let payload = builder.next_span(&mut entry).unwrap().to_vec();
        assert_eq!(payload, b"42 \n");
        assert!(builder.next_span(&mut entry).is_none());
    }
}
