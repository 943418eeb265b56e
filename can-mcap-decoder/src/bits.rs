//! Bit extraction for both CAN bit-order conventions
//!
//! Every field is read bit by bit through one mapping per byte order, so
//! fields that stay inside a byte and fields that cross byte boundaries go
//! through the same code.
//!
//! - Little-endian (Intel): the start bit is the LSB of the field. Bit
//!   `start + i` lives in byte `pos / 8`, bit `pos % 8`, and becomes result
//!   bit `i`.
//! - Big-endian (Motorola): the start bit is the MSB of the field in DBC
//!   numbering (bit 7 of byte 0 goes first on the wire). The field is a run of
//!   `length` bits in the MSB-first stream that begins at that bit.
//!
//! Bits that fall outside the buffer read as zero.

use crate::signals::database::ByteOrder;

/// Position of a DBC bit number in the MSB-first bit stream of a frame.
///
/// Bit 7 of byte 0 is stream position 0, bit 0 of byte 0 is position 7, bit 15
/// (MSB of byte 1) is position 8.
pub fn msb_linear_position(start_bit: u16) -> usize {
    let start = start_bit as usize;
    (start / 8) * 8 + (7 - start % 8)
}

/// Extract `length` bits from `data` and return them right-aligned.
pub fn extract(data: &[u8], start_bit: u16, length: u16, byte_order: ByteOrder) -> u64 {
    let length = length.min(64) as usize;
    let mut result: u64 = 0;

    match byte_order {
        ByteOrder::LittleEndian => {
            let start = start_bit as usize;
            for i in 0..length {
                if read_bit(data, start + i, false) {
                    result |= 1u64 << i;
                }
            }
        }
        ByteOrder::BigEndian => {
            let first = msb_linear_position(start_bit);
            for i in 0..length {
                if read_bit(data, first + i, true) {
                    result |= 1u64 << (length - 1 - i);
                }
            }
        }
    }

    result
}

/// Write the low `length` bits of `value` into `data` at the given layout.
///
/// Bits outside the buffer are dropped. Inverse of [`extract`].
pub fn insert(data: &mut [u8], start_bit: u16, length: u16, byte_order: ByteOrder, value: u64) {
    let length = length.min(64) as usize;

    match byte_order {
        ByteOrder::LittleEndian => {
            let start = start_bit as usize;
            for i in 0..length {
                write_bit(data, start + i, false, (value >> i) & 1 == 1);
            }
        }
        ByteOrder::BigEndian => {
            let first = msb_linear_position(start_bit);
            for i in 0..length {
                write_bit(data, first + i, true, (value >> (length - 1 - i)) & 1 == 1);
            }
        }
    }
}

/// Read one bit. `msb_first` selects stream numbering (bit 7 of a byte first)
/// over LSB-first numbering.
fn read_bit(data: &[u8], pos: usize, msb_first: bool) -> bool {
    match data.get(pos / 8) {
        Some(byte) => (byte >> bit_in_byte(pos, msb_first)) & 0x01 == 1,
        None => false,
    }
}

fn write_bit(data: &mut [u8], pos: usize, msb_first: bool, set: bool) {
    if let Some(byte) = data.get_mut(pos / 8) {
        let mask = 1u8 << bit_in_byte(pos, msb_first);
        if set {
            *byte |= mask;
        } else {
            *byte &= !mask;
        }
    }
}

fn bit_in_byte(pos: usize, msb_first: bool) -> usize {
    if msb_first {
        7 - pos % 8
    } else {
        pos % 8
    }
}

/// Sign-extend a value from N bits to 64 bits
///
/// If the value's MSB is 1, fill the upper bits with 1s.
pub fn sign_extend(value: u64, bit_length: u16) -> i64 {
    if bit_length == 0 || bit_length >= 64 {
        return value as i64;
    }

    let sign_bit = 1u64 << (bit_length - 1);
    if (value & sign_bit) != 0 {
        let mask = !0u64 << bit_length;
        (value | mask) as i64
    } else {
        value as i64
    }
}
