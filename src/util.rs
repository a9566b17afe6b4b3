/*
    TrackCast
    https://github.com/dbalsom/trackcast

    Copyright 2025 Daniel Balsom

    Permission is hereby granted, free of charge, to any person obtaining a
    copy of this software and associated documentation files (the “Software”),
    to deal in the Software without restriction, including without limitation
    the rights to use, copy, modify, merge, publish, distribute, sublicense,
    and/or sell copies of the Software, and to permit persons to whom the
    Software is furnished to do so, subject to the following conditions:

    The above copyright notice and this permission notice shall be included in
    all copies or substantial portions of the Software.

    THE SOFTWARE IS PROVIDED “AS IS”, WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
    IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
    FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
    AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
    LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
    FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
    DEALINGS IN THE SOFTWARE.

    --------------------------------------------------------------------------
*/

//! The `util` module provides various utility functions.

use crate::io::{Seek, SeekFrom};

/// The initial seed value for CRC-CCITT and related checksums.
pub const CRC_CCITT_INITIAL: u16 = 0xFFFF;

// Polynomial x^16 + x^12 + x^5 + 1 (CRC-16/IBM-3740, widely labelled
// CRC-CCITT). See: https://reveng.sourceforge.io/crc-catalogue/16.htm
const CRC_POLY: u16 = 0x1021;

// One register step per input byte, precomputed over all byte values.
const CRC_TABLE: [u16; 256] = build_crc_table();

const fn build_crc_table() -> [u16; 256] {
    let mut table = [0u16; 256];
    let mut byte = 0;
    while byte < 256 {
        let mut reg = (byte as u16) << 8;
        let mut bit = 0;
        while bit < 8 {
            reg = if reg & 0x8000 != 0 { (reg << 1) ^ CRC_POLY } else { reg << 1 };
            bit += 1;
        }
        table[byte] = reg;
        byte += 1;
    }
    table
}

/// Advance a CRC-16/IBM-3740 register by one byte. The encoder and decoder
/// both run the register incrementally so a sector's checksum can be
/// continued across sub-chunks.
#[inline]
pub fn crc_ibm_3740_byte(byte: u8, crc: u16) -> u16 {
    (crc << 8) ^ CRC_TABLE[(((crc >> 8) ^ byte as u16) & 0xFF) as usize]
}

/// Checksum a byte slice, continuing from `start` when given and from the
/// standard 0xFFFF seed otherwise.
pub fn crc_ibm_3740(data: &[u8], start: Option<u16>) -> u16 {
    data.iter()
        .fold(start.unwrap_or(CRC_CCITT_INITIAL), |crc, &byte| crc_ibm_3740_byte(byte, crc))
}

pub(crate) fn get_length<T: Seek>(source: &mut T) -> Result<u64, crate::io::Error> {
    let length = source.seek(SeekFrom::End(0))?;
    source.rewind()?;
    Ok(length)
}
