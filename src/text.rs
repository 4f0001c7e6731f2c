// Human-readable argument encoding for the console/file text sinks.
//
// Every argument is rendered as ASCII followed by a single space; a message
// is terminated with a newline. Rendering happens directly into the record
// payload through the reserve-callback, so the hot path stays allocation
// free.

use std::fmt::Write as _;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::payload::VerbosePayload;
use crate::types::{AddArgumentResult, IntegerRepresentation};

// Signed integers only support decimal rendering; other bases are counted
// here and the argument is skipped, matching the wire formatter's refusal.
static UNSUPPORTED_TYPE_HITS: AtomicUsize = AtomicUsize::new(0);

/// Number of arguments dropped because their representation is unsupported
pub fn unsupported_type_hits() -> usize {
    UNSUPPORTED_TYPE_HITS.load(Ordering::Relaxed)
}

fn count_unsupported() -> AddArgumentResult {
    UNSUPPORTED_TYPE_HITS.fetch_add(1, Ordering::Relaxed);
    AddArgumentResult::NotAdded
}

/// `fmt::Write` sink over a byte span; silently truncates at the end.
struct SpanWriter<'a> {
    buf: &'a mut [u8],
    used: usize,
}

impl<'a> SpanWriter<'a> {
    fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, used: 0 }
    }
}

impl std::fmt::Write for SpanWriter<'_> {
    fn write_str(&mut self, s: &str) -> std::fmt::Result {
        let space = self.buf.len() - self.used;
        let take = s.len().min(space);
        self.buf[self.used..self.used + take].copy_from_slice(&s.as_bytes()[..take]);
        self.used += take;
        Ok(())
    }
}

/// Render `args` followed by one space into the payload.
///
/// If the value was cut off by the remaining capacity the last kept byte is
/// replaced with the separating space so the output stays tokenizable.
fn put_fmt(
    payload: &mut VerbosePayload,
    reserve: Option<usize>,
    args: std::fmt::Arguments<'_>,
) -> AddArgumentResult {
    if payload.remaining_capacity() == 0 {
        return AddArgumentResult::NotAdded;
    }
    payload.put_with(reserve, |span| {
        let mut writer = SpanWriter::new(span);
        let _ = writer.write_fmt(args);
        let mut used = writer.used;
        if used == span.len() {
            // Truncated: force the trailing separator.
            span[used - 1] = b' ';
        } else {
            span[used] = b' ';
            used += 1;
        }
        used
    });
    AddArgumentResult::Added
}

macro_rules! unsigned_text_log {
    ($name:ident, $ty:ty) => {
        pub fn $name(
            payload: &mut VerbosePayload,
            value: $ty,
            repr: IntegerRepresentation,
        ) -> AddArgumentResult {
            match repr {
                IntegerRepresentation::Decimal => put_fmt(payload, None, format_args!("{}", value)),
                IntegerRepresentation::Hex => put_fmt(payload, None, format_args!("{:x}", value)),
                IntegerRepresentation::Octal => put_fmt(payload, None, format_args!("{:o}", value)),
                IntegerRepresentation::Binary => put_fmt(
                    payload,
                    Some(<$ty>::BITS as usize + 1),
                    format_args!("{:0width$b}", value, width = <$ty>::BITS as usize),
                ),
            }
        }
    };
}

macro_rules! signed_text_log {
    ($name:ident, $ty:ty) => {
        pub fn $name(
            payload: &mut VerbosePayload,
            value: $ty,
            repr: IntegerRepresentation,
        ) -> AddArgumentResult {
            match repr {
                IntegerRepresentation::Decimal => put_fmt(payload, None, format_args!("{}", value)),
                _ => count_unsupported(),
            }
        }
    };
}

/// Encoder for the space-separated ASCII output.
pub struct TextFormat;

impl TextFormat {
    pub fn log_bool(payload: &mut VerbosePayload, value: bool) -> AddArgumentResult {
        Self::log_str(payload, if value { "True" } else { "False" })
    }

    unsigned_text_log!(log_u8, u8);
    unsigned_text_log!(log_u16, u16);
    unsigned_text_log!(log_u32, u32);
    unsigned_text_log!(log_u64, u64);

    signed_text_log!(log_i8, i8);
    signed_text_log!(log_i16, i16);
    signed_text_log!(log_i32, i32);
    signed_text_log!(log_i64, i64);

    pub fn log_f32(payload: &mut VerbosePayload, value: f32) -> AddArgumentResult {
        put_fmt(payload, None, format_args!("{:.6}", value))
    }

    pub fn log_f64(payload: &mut VerbosePayload, value: f64) -> AddArgumentResult {
        put_fmt(payload, None, format_args!("{:.6}", value))
    }

    pub fn log_str(payload: &mut VerbosePayload, value: &str) -> AddArgumentResult {
        if value.is_empty() {
            return AddArgumentResult::Added;
        }
        if payload.remaining_capacity() == 0 {
            return AddArgumentResult::NotAdded;
        }
        put_fmt(payload, Some(value.len() + 1), format_args!("{}", value))
    }

    /// Raw buffers render as two hex nibbles per byte
    pub fn log_raw(payload: &mut VerbosePayload, value: &[u8]) -> AddArgumentResult {
        if value.is_empty() {
            return AddArgumentResult::Added;
        }
        if payload.remaining_capacity() == 0 {
            return AddArgumentResult::NotAdded;
        }
        payload.put_with(Some(value.len() * 2 + 1), |span| {
            let mut writer = SpanWriter::new(span);
            for byte in value {
                let _ = write!(writer, "{:02x}", byte);
            }
            let mut used = writer.used;
            if used == span.len() {
                span[used - 1] = b' ';
            } else {
                span[used] = b' ';
                used += 1;
            }
            used
        });
        AddArgumentResult::Added
    }

    /// Localtime wall-clock header field: `YYYY/MM/DD HH:MM:SS.<ms counter> `
    pub fn put_formatted_time(payload: &mut VerbosePayload) {
        let now = chrono::Local::now();
        let millis = (now.timestamp_millis() % 10_000_000).unsigned_abs() as u32;
        let _ = put_fmt(
            payload,
            None,
            format_args!("{}.{}", now.format("%Y/%m/%d %H:%M:%S"), millis),
        );
    }

    /// Message terminator
    pub fn terminate_log(payload: &mut VerbosePayload) {
        payload.put(b"\n");
    }
}
