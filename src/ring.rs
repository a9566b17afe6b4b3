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

    src/ring.rs

    Implements a bounded ring buffer of 16-bit bit-cell words.

    The ring has a single producer and a single consumer. The producer only
    advances `prod`, the consumer only advances `cons`; both are plain 16-bit
    counters interpreted modulo the power-of-two storage length, so the ring
    distinguishes full from empty without a separate flag.
*/

pub struct WordRing {
    words: Box<[u16]>,
    prod:  u16,
    cons:  u16,
}

impl WordRing {
    /// Create a ring with the given storage length, which must be a power of
    /// two no greater than 32768.
    pub fn new(len: usize) -> WordRing {
        assert!(len.is_power_of_two() && len <= 32768);
        WordRing {
            words: vec![0u16; len].into_boxed_slice(),
            prod:  0,
            cons:  0,
        }
    }

    #[inline]
    fn mask(&self) -> usize {
        self.words.len() - 1
    }

    /// Number of words buffered and not yet consumed.
    #[inline]
    pub fn len(&self) -> usize {
        self.prod.wrapping_sub(self.cons) as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.prod == self.cons
    }

    /// Number of words that can be produced before the ring is full.
    #[inline]
    pub fn space(&self) -> usize {
        self.words.len() - self.len()
    }

    /// Produce one word. Returns false (dropping the word) when full.
    #[inline]
    pub fn push(&mut self, word: u16) -> bool {
        if self.space() == 0 {
            return false;
        }
        let idx = self.prod as usize & self.mask();
        self.words[idx] = word;
        self.prod = self.prod.wrapping_add(1);
        true
    }

    /// Consume one word, or None when empty.
    #[inline]
    pub fn pop(&mut self) -> Option<u16> {
        if self.is_empty() {
            return None;
        }
        let idx = self.cons as usize & self.mask();
        let word = self.words[idx];
        self.cons = self.cons.wrapping_add(1);
        Some(word)
    }

    /// Reset both counters, discarding all buffered words.
    pub fn clear(&mut self) {
        self.prod = 0;
        self.cons = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_pop_order() {
        let mut ring = WordRing::new(8);
        for w in 0..5u16 {
            assert!(ring.push(w));
        }
        assert_eq!(ring.len(), 5);
        for w in 0..5u16 {
            assert_eq!(ring.pop(), Some(w));
        }
        assert!(ring.is_empty());
    }

    #[test]
    fn test_full_ring_rejects() {
        let mut ring = WordRing::new(4);
        for w in 0..4u16 {
            assert!(ring.push(w));
        }
        assert_eq!(ring.space(), 0);
        assert!(!ring.push(99));
        assert_eq!(ring.pop(), Some(0));
        assert!(ring.push(99));
    }

    #[test]
    fn test_counter_wraparound() {
        // Drive the 16-bit counters across their wrap point; modular
        // arithmetic must keep len()/space() consistent throughout.
        let mut ring = WordRing::new(4);
        for i in 0..100_000u32 {
            assert!(ring.push(i as u16));
            assert_eq!(ring.pop(), Some(i as u16));
        }
        assert!(ring.is_empty());
        assert_eq!(ring.space(), 4);
    }
}
