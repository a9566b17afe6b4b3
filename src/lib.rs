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

//! # trackcast
//!
//! trackcast is a Rust library for streaming flat, sector-per-offset floppy
//! disk images - the kind produced by dozens of vintage host systems (IBM PC,
//! Atari, MSX, TI-99, Acorn, Commodore, and friends) - as bit-level encoded
//! IBM System 34 MFM or FM magnetic track streams, suitable for real-time
//! playback to a drive-emulation front end.
//!
//! It also implements the reverse path: a written bit-cell stream is parsed,
//! the target sector located, and the decoded bytes persisted back into the
//! backing image file.
//!
//! The main interface is the [`Image`] object, which owns the backing file,
//! the per-track layout arena built at open time, and the bounded read/write
//! bit-cell rings consumed by the front end. Geometry is inferred at open
//! time from file size, embedded BPB/VIB structures, the host preference
//! knob, and optional sidecar configuration tags.
//!
//! trackcast does not create images from scratch, does not decode non-IBM
//! (GCR, flux-level) encodings, and does not interpret filesystems beyond
//! what is needed to disambiguate geometry.

mod boot_sector;
pub mod codec;
pub mod config;
mod file_parsers;
pub mod host;
pub mod image;
pub mod io;
pub mod layout;
mod ring;
pub mod types;
pub mod util;

use thiserror::Error;

/// The largest sector size representable by a size code (`n = 6`).
pub const MAXIMUM_SECTOR_SIZE: usize = 8192;
/// The default sector size for PC-style formats.
pub const DEFAULT_SECTOR_SIZE: usize = 512;
/// The largest valid sector size code.
pub const MAX_SECTOR_N: u8 = 6;
/// The largest number of sectors a single track layout may carry.
pub const MAX_TRACK_SECTORS: usize = 256;
/// Sector data and long gaps are emitted and decoded in slices of this size.
pub const DATA_CHUNK: usize = 1024;

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("The file does not match this image format")]
    NotThisFormat,
    #[error("The image is structurally invalid: {0}")]
    BadImage(&'static str),
    #[error("An IO error occurred reading or writing the image file")]
    IoError(String),
}

// Manually implement `From<io::Error>` for `ImageError`
impl From<io::Error> for ImageError {
    fn from(err: io::Error) -> Self {
        ImageError::IoError(err.to_string())
    }
}

// Manually implement `From<binrw::Error>` for `ImageError`
impl From<binrw::Error> for ImageError {
    fn from(err: binrw::Error) -> Self {
        ImageError::IoError(err.to_string())
    }
}

pub use crate::{
    config::{ConfigToken, TagOptions},
    file_parsers::supported_extensions,
    host::HostPreference,
    image::{Image, OpenOptions},
    layout::{catalog, LayoutArena, SecInfo, SimpleLayout, TrkInfo},
    types::{FileLayout, TrackEncoding},
};
