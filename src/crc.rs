//! MRBus CRC16 checksum
//!
//! The bus uses a nibble-at-a-time CRC16 driven by two 16-entry tables.
//! Every device on the network computes it the same way, so the tables and
//! the two-round update below must stay bit-exact.

/// Table XORed into the high byte of the running CRC
pub const HIGH_TABLE: [u8; 16] = [
    0x00, 0xA0, 0xE0, 0x40, 0x60, 0xC0, 0x80, 0x20, 0xC0, 0x60, 0x20, 0x80, 0xA0, 0x00, 0x40, 0xE0,
];

/// Table XORed into the low byte of the running CRC
pub const LOW_TABLE: [u8; 16] = [
    0x00, 0x01, 0x03, 0x02, 0x07, 0x06, 0x04, 0x05, 0x0E, 0x0F, 0x0D, 0x0C, 0x09, 0x08, 0x0A, 0x0B,
];

/// Offsets of the checksum bytes inside a frame, skipped by [`calculate`]
pub const CHECKSUM_OFFSETS: [usize; 2] = [3, 4];

/// Fold one byte into the running CRC
pub fn update(crc: u16, byte: u8) -> u16 {
    let mut high = (crc >> 8) as u8;
    let mut low = crc as u8;

    for round in 0..2 {
        let index = if round == 0 {
            // top nibble of (high ^ byte), moved down
            ((high ^ byte) & 0xF0) >> 4
        } else {
            (high.rotate_left(4) ^ byte) & 0x0F
        };

        high = (high << 4) | (low >> 4);
        low <<= 4;

        high ^= HIGH_TABLE[index as usize];
        low ^= LOW_TABLE[index as usize];
    }

    ((high as u16) << 8) | low as u16
}

/// Compute the checksum of a frame
///
/// Processes the number of bytes given by the length field at offset 2,
/// skipping the two checksum bytes. A length that runs past the end of
/// `frame` is clamped to the slice; frames without a length byte yield 0.
pub fn calculate(frame: &[u8]) -> u16 {
    let Some(&length) = frame.get(2) else {
        return 0;
    };

    frame
        .iter()
        .take(length as usize)
        .enumerate()
        .filter(|(offset, _)| !CHECKSUM_OFFSETS.contains(offset))
        .fold(0, |crc, (_, &byte)| update(crc, byte))
}
