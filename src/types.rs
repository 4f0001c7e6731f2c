// Small value-carrier types shared by the formatters and the stream API

/// Marks an integer argument to be rendered in hexadecimal (8-bit)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogHex8(pub u8);

/// Marks an integer argument to be rendered in hexadecimal (16-bit)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogHex16(pub u16);

/// Marks an integer argument to be rendered in hexadecimal (32-bit)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogHex32(pub u32);

/// Marks an integer argument to be rendered in hexadecimal (64-bit)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogHex64(pub u64);

/// Marks an integer argument to be rendered in binary (8-bit)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogBin8(pub u8);

/// Marks an integer argument to be rendered in binary (16-bit)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogBin16(pub u16);

/// Marks an integer argument to be rendered in binary (32-bit)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogBin32(pub u32);

/// Marks an integer argument to be rendered in binary (64-bit)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogBin64(pub u64);

/// A raw byte buffer argument. DLT encodes it length-prefixed, the text
/// formatter renders it as hex pairs.
#[derive(Debug, Clone, Copy)]
pub struct LogRawBuffer<'a>(pub &'a [u8]);

/// Carrier for a platform system-logger message: a text payload plus a
/// numeric code forwarded to the system sink.
#[derive(Debug, Clone, Copy)]
pub struct LogSystemMessage<'a> {
    pub message: &'a str,
    pub code: u16,
}

/// Rendering base for integer arguments.
///
/// Discriminants match the DLT type-info integer-representation field.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IntegerRepresentation {
    #[default]
    Decimal = 0,
    Octal = 1,
    Hex = 2,
    Binary = 3,
}

/// Outcome of formatting one argument into a payload buffer.
///
/// Formatters never fail with an error on the hot path; an argument that
/// does not fit is simply not added.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddArgumentResult {
    Added,
    NotAdded,
}
