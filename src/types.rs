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

//! The `types` module defines small shared types: the track encoding method
//! and the image-file layout flags that control how physical tracks map onto
//! byte ranges of the backing file.

use std::fmt::{Display, Formatter};

use bitflags::bitflags;

/// The bitcell encoding method of a track. Tracks within one image may mix
/// encodings (the Atari ATR boot tracks are the classic example).
#[derive(Default, Copy, Clone, Debug, PartialEq, Eq)]
pub enum TrackEncoding {
    #[doc = "Frequency Modulation encoding. Used by older 8&quot; diskettes and single-density 5.25&quot; media."]
    Fm,
    #[default]
    #[doc = "Modified Frequency Modulation encoding. Used by almost all 5.25&quot; and 3.5&quot; diskettes."]
    Mfm,
}

impl Display for TrackEncoding {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            TrackEncoding::Fm => write!(f, "FM"),
            TrackEncoding::Mfm => write!(f, "MFM"),
        }
    }
}

bitflags! {
    /// Bit flags controlling the order in which per-track sector data is laid
    /// out in the backing file.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    #[rustfmt::skip]
    pub struct FileLayout: u8 {
        /// Side-major ordering: all of side 0's cylinders precede side 1's.
        const SEQUENTIAL     = 0b0000_0001;
        /// Sides are stored swapped (Commodore D81).
        const SIDES_SWAPPED  = 0b0000_0010;
        /// Cylinder order is reversed on side 0.
        const REVERSE_SIDE_0 = 0b0000_0100;
        /// Cylinder order is reversed on side 1 (TI-99).
        const REVERSE_SIDE_1 = 0b0000_1000;
    }
}

impl FileLayout {
    /// Return the reverse-cylinder flag for the given physical side.
    pub fn reverse_side(side: u8) -> FileLayout {
        match side {
            0 => FileLayout::REVERSE_SIDE_0,
            _ => FileLayout::REVERSE_SIDE_1,
        }
    }

    /// True if cylinder order is reversed on the given side.
    pub fn is_reversed(&self, side: u8) -> bool {
        self.contains(FileLayout::reverse_side(side))
    }
}
