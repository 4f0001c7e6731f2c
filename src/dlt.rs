// SPDX-License-Identifier: Apache-2.0 OR MIT
// DLT verbose-mode argument encoding.
//
// Each argument is a 32-bit type-info word followed by the value bytes:
//
//   +-----------+--------------+-----------+--------------+
//   | Type Info | Data Payload | Type Info | Data Payload | ...
//   +-----------+--------------+-----------+--------------+
//
// Multi-byte values are stored in the message's native little-endian order;
// strings and raw buffers carry a 16-bit length and are cropped to whatever
// still fits in the record payload.

use crate::payload::VerbosePayload;
use crate::types::{AddArgumentResult, IntegerRepresentation};

const TYPE_BOOL_BIT: u32 = 4;
const TYPE_SIGNED_BIT: u32 = 5;
const TYPE_UNSIGNED_BIT: u32 = 6;
const TYPE_FLOAT_BIT: u32 = 7;
const TYPE_STRING_BIT: u32 = 9;
const TYPE_RAW_BIT: u32 = 10;

// Strings and integer representations share the same field position.
const STRING_ENCODING_SHIFT: u32 = 15;
const INTEGER_ENCODING_SHIFT: u32 = 15;

const STRING_ENCODING_UTF8: u32 = 1;

/// Type-length field values (bits 0..3 of the type info)
#[repr(u32)]
#[derive(Debug, Clone, Copy)]
enum TypeLength {
    Bits8 = 1,
    Bits16 = 2,
    Bits32 = 3,
    Bits64 = 4,
}

const TYPE_INFO_SIZE: usize = std::mem::size_of::<u32>();
const LENGTH_FIELD_SIZE: usize = std::mem::size_of::<u16>();

fn integer_type_info(type_bit: u32, length: TypeLength, repr: IntegerRepresentation) -> u32 {
    (1u32 << type_bit) | (length as u32) | ((repr as u32) << INTEGER_ENCODING_SHIFT)
}

fn store(payload: &mut VerbosePayload, type_info: u32, value: &[u8]) -> AddArgumentResult {
    if payload.will_overflow(TYPE_INFO_SIZE + value.len()) {
        return AddArgumentResult::NotAdded;
    }
    payload.put(&type_info.to_le_bytes());
    payload.put(value);
    AddArgumentResult::Added
}

/// Encoder for DLT verbose arguments.
pub struct DltFormat;

impl DltFormat {
    pub fn log_bool(payload: &mut VerbosePayload, value: bool) -> AddArgumentResult {
        let type_info = (1u32 << TYPE_BOOL_BIT) | TypeLength::Bits8 as u32;
        store(payload, type_info, &[u8::from(value)])
    }

    pub fn log_u8(
        payload: &mut VerbosePayload,
        value: u8,
        repr: IntegerRepresentation,
    ) -> AddArgumentResult {
        let type_info = integer_type_info(TYPE_UNSIGNED_BIT, TypeLength::Bits8, repr);
        store(payload, type_info, &value.to_le_bytes())
    }

    pub fn log_u16(
        payload: &mut VerbosePayload,
        value: u16,
        repr: IntegerRepresentation,
    ) -> AddArgumentResult {
        let type_info = integer_type_info(TYPE_UNSIGNED_BIT, TypeLength::Bits16, repr);
        store(payload, type_info, &value.to_le_bytes())
    }

    pub fn log_u32(
        payload: &mut VerbosePayload,
        value: u32,
        repr: IntegerRepresentation,
    ) -> AddArgumentResult {
        let type_info = integer_type_info(TYPE_UNSIGNED_BIT, TypeLength::Bits32, repr);
        store(payload, type_info, &value.to_le_bytes())
    }

    pub fn log_u64(
        payload: &mut VerbosePayload,
        value: u64,
        repr: IntegerRepresentation,
    ) -> AddArgumentResult {
        let type_info = integer_type_info(TYPE_UNSIGNED_BIT, TypeLength::Bits64, repr);
        store(payload, type_info, &value.to_le_bytes())
    }

    pub fn log_i8(
        payload: &mut VerbosePayload,
        value: i8,
        repr: IntegerRepresentation,
    ) -> AddArgumentResult {
        let type_info = integer_type_info(TYPE_SIGNED_BIT, TypeLength::Bits8, repr);
        store(payload, type_info, &value.to_le_bytes())
    }

    pub fn log_i16(
        payload: &mut VerbosePayload,
        value: i16,
        repr: IntegerRepresentation,
    ) -> AddArgumentResult {
        let type_info = integer_type_info(TYPE_SIGNED_BIT, TypeLength::Bits16, repr);
        store(payload, type_info, &value.to_le_bytes())
    }

    pub fn log_i32(
        payload: &mut VerbosePayload,
        value: i32,
        repr: IntegerRepresentation,
    ) -> AddArgumentResult {
        let type_info = integer_type_info(TYPE_SIGNED_BIT, TypeLength::Bits32, repr);
        store(payload, type_info, &value.to_le_bytes())
    }

    pub fn log_i64(
        payload: &mut VerbosePayload,
        value: i64,
        repr: IntegerRepresentation,
    ) -> AddArgumentResult {
        let type_info = integer_type_info(TYPE_SIGNED_BIT, TypeLength::Bits64, repr);
        store(payload, type_info, &value.to_le_bytes())
    }

    pub fn log_f32(payload: &mut VerbosePayload, value: f32) -> AddArgumentResult {
        let type_info = (1u32 << TYPE_FLOAT_BIT) | TypeLength::Bits32 as u32;
        store(payload, type_info, &value.to_le_bytes())
    }

    pub fn log_f64(payload: &mut VerbosePayload, value: f64) -> AddArgumentResult {
        let type_info = (1u32 << TYPE_FLOAT_BIT) | TypeLength::Bits64 as u32;
        store(payload, type_info, &value.to_le_bytes())
    }

    /// Encode a string argument:
    ///
    /// ```text
    /// [type info u32][length incl. NUL u16][bytes][\0]
    /// ```
    ///
    /// The string is cropped so the whole argument fits both the 16-bit
    /// length field and the remaining payload capacity.
    pub fn log_str(payload: &mut VerbosePayload, value: &str) -> AddArgumentResult {
        let type_info =
            (1u32 << TYPE_STRING_BIT) | (STRING_ENCODING_UTF8 << STRING_ENCODING_SHIFT);

        let header_size = TYPE_INFO_SIZE + LENGTH_FIELD_SIZE;
        if payload.remaining_capacity() <= header_size {
            return AddArgumentResult::NotAdded;
        }

        let max_len_incl_null =
            (payload.remaining_capacity() - header_size).min(u16::MAX as usize);
        let cropped_len = value.len().min(max_len_incl_null - 1);
        let length_incl_null = (cropped_len + 1) as u16;

        payload.put(&type_info.to_le_bytes());
        payload.put(&length_incl_null.to_le_bytes());
        payload.put(&value.as_bytes()[..cropped_len]);
        payload.put(&[0u8]);
        AddArgumentResult::Added
    }

    /// Encode a raw buffer argument: `[type info u32][length u16][bytes]`,
    /// cropped like strings but without a terminator.
    pub fn log_raw(payload: &mut VerbosePayload, value: &[u8]) -> AddArgumentResult {
        let type_info = 1u32 << TYPE_RAW_BIT;

        let header_size = TYPE_INFO_SIZE + LENGTH_FIELD_SIZE;
        if payload.remaining_capacity() <= header_size {
            return AddArgumentResult::NotAdded;
        }

        let max_len = (payload.remaining_capacity() - header_size).min(u16::MAX as usize);
        let cropped_len = value.len().min(max_len);

        payload.put(&type_info.to_le_bytes());
        payload.put(&(cropped_len as u16).to_le_bytes());
        payload.put(&value[..cropped_len]);
        AddArgumentResult::Added
    }
}
