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

//! FM word translation. Every cell pair carries a set clock bit, so a data
//! byte encodes to `0xAAAA` plus its data bits in the even cell positions.
//! Address marks are distinguished by a non-standard clock pattern.

/// Clock pattern of the IDAM/DAM marks.
pub const SYNC_CLK: u8 = 0xC7;
/// Clock pattern of the IAM.
pub const IAM_SYNC_CLK: u8 = 0xD7;

/// The all-clocks pattern the write path hunts for (an encoded 0x00).
pub const HUNT_WORD: u16 = 0xAAAA;

/// Interleave an explicit clock pattern with a data byte. Used for the
/// clock-violating address marks.
#[inline]
pub fn sync_word(data: u8, clock: u8) -> u16 {
    let mut word: u16 = 0;
    for i in (0..8).rev() {
        word = word << 2 | (clock as u16 >> i & 1) << 1 | (data as u16 >> i & 1);
    }
    word
}

/// Encode one byte with the standard all-ones clock.
#[inline]
pub fn encode_byte(byte: u8) -> u16 {
    sync_word(byte, 0xFF)
}

/// Extract the eight data bits of a word.
#[inline]
pub fn decode_byte(word: u16) -> u8 {
    let mut byte = 0u8;
    for i in (0..8).rev() {
        byte = byte << 1 | (word >> (i * 2) & 1) as u8;
    }
    byte
}

/// Extract the eight clock bits of a word.
#[inline]
pub fn decode_clock(word: u16) -> u8 {
    let mut clock = 0u8;
    for i in (0..8).rev() {
        clock = clock << 1 | (word >> (i * 2 + 1) & 1) as u8;
    }
    clock
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_sync_words() {
        // The classic System 34 FM mark encodings.
        assert_eq!(sync_word(0xFE, SYNC_CLK), 0xF57E);
        assert_eq!(sync_word(0xFB, SYNC_CLK), 0xF56F);
    }

    #[test]
    fn test_encode_zero_is_hunt_word() {
        assert_eq!(encode_byte(0x00), HUNT_WORD);
    }

    #[test]
    fn test_roundtrip_and_clock() {
        for byte in 0..=255u8 {
            let w = encode_byte(byte);
            assert_eq!(decode_byte(w), byte);
            assert_eq!(decode_clock(w), 0xFF);
        }
        assert_eq!(decode_clock(sync_word(0xFE, SYNC_CLK)), SYNC_CLK);
        assert_eq!(decode_byte(sync_word(0xFE, SYNC_CLK)), 0xFE);
    }
}
