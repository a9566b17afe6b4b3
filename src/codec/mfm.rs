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

//! MFM word translation. Each data byte becomes one 16-bit word of
//! alternating clock and data cells; a clock cell is set only between two
//! zero data bits. The A1 and C2 sync marks are emitted as raw words with a
//! deliberate clock violation so they can never occur in ordinary data.

/// A1 sync with missing clock between bits 4 and 5.
pub const SYNC_WORD: u16 = 0x4489;
/// C2 sync with missing clock, used by the IAM.
pub const IAM_SYNC_WORD: u16 = 0x5224;

/// The decoded values of the sync marks.
pub const SYNC_BYTE: u8 = 0xA1;

/// Encode one byte. `prev` is the previously emitted word: when its final
/// data bit was 1, the leading clock bit of this word must be suppressed to
/// preserve the no-adjacent-ones invariant across the word boundary.
#[inline]
pub fn encode_byte(byte: u8, prev: u16) -> u16 {
    let mut word: u16 = 0;
    let mut last = prev & 1 != 0;
    for i in (0..8).rev() {
        let data = byte >> i & 1 != 0;
        let clock = !(last | data);
        word = word << 2 | (clock as u16) << 1 | data as u16;
        last = data;
    }
    word
}

/// Extract the eight data bits (even cell positions) of a word.
#[inline]
pub fn decode_byte(word: u16) -> u8 {
    let mut byte = 0u8;
    for i in (0..8).rev() {
        byte = byte << 1 | (word >> (i * 2) & 1) as u8;
    }
    byte
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_a1_differs_from_sync() {
        // A normally encoded A1 has the clock bit the sync marker omits.
        assert_eq!(encode_byte(0xA1, 0), 0x44A9);
        assert_eq!(decode_byte(SYNC_WORD), 0xA1);
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        for byte in 0..=255u8 {
            for prev in [0u16, 1u16] {
                assert_eq!(decode_byte(encode_byte(byte, prev)), byte);
            }
        }
    }

    #[test]
    fn test_leading_clock_suppression() {
        // 0x00 after a word ending in data 1 must not start with a clock bit.
        let after_zero = encode_byte(0x00, 0x0000);
        let after_one = encode_byte(0x00, 0x0001);
        assert_eq!(after_zero, 0xAAAA);
        assert_eq!(after_one, 0x2AAA);
    }

    #[test]
    fn test_no_adjacent_ones() {
        // Scan the bit pattern of consecutive encoded words: legal MFM never
        // has two set cells in a row.
        let bytes = [0x00u8, 0xFF, 0x6D, 0xA1, 0x00, 0x92];
        let mut prev = 0u16;
        let mut all_bits = Vec::new();
        for &b in &bytes {
            let w = encode_byte(b, prev);
            for i in (0..16).rev() {
                all_bits.push(w >> i & 1 != 0);
            }
            prev = w;
        }
        for pair in all_bits.windows(2) {
            assert!(!(pair[0] && pair[1]));
        }
    }
}
