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

//! The `file_parsers` module hosts one format handler per supported image
//! family. A handler's `open` populates the image envelope and layout arena
//! and returns true, or returns false when the file is not its format so
//! the next candidate can try. Structural violations are hard errors.

pub(crate) mod atr;
pub(crate) mod d81;
pub(crate) mod fdi;
pub(crate) mod raw;
pub(crate) mod st;
pub(crate) mod ti99;
pub(crate) mod trd;
pub(crate) mod vdk;
pub(crate) mod xdf;

use strum::IntoEnumIterator;

use crate::{image::Image, io::ReadWriteSeek, ImageError};

#[derive(Copy, Clone, Debug, PartialEq, Eq, strum::EnumIter)]
pub(crate) enum FormatHandler {
    Atr,
    Vdk,
    Trd,
    Ti99,
    Fdi,
    Xdf,
    D81,
    St,
    Raw,
}

impl FormatHandler {
    pub(crate) fn extensions(&self) -> &'static [&'static str] {
        match self {
            FormatHandler::Atr => &["atr"],
            FormatHandler::Vdk => &["vdk"],
            FormatHandler::Trd => &["trd"],
            FormatHandler::Ti99 => &["dsk", "ti99"],
            FormatHandler::Fdi => &["fdi"],
            FormatHandler::Xdf => &["xdf"],
            FormatHandler::D81 => &["d81"],
            FormatHandler::St => &["st"],
            FormatHandler::Raw => &["img", "ima", "dsk", "bin"],
        }
    }

    pub(crate) fn open<RWS: ReadWriteSeek>(&self, im: &mut Image<RWS>) -> Result<bool, ImageError> {
        match self {
            FormatHandler::Atr => atr::AtrFormat::open(im),
            FormatHandler::Vdk => vdk::VdkFormat::open(im),
            FormatHandler::Trd => trd::TrdFormat::open(im),
            FormatHandler::Ti99 => ti99::Ti99Format::open(im),
            FormatHandler::Fdi => fdi::FdiFormat::open(im),
            FormatHandler::Xdf => xdf::XdfFormat::open(im),
            FormatHandler::D81 => d81::D81Format::open(im),
            FormatHandler::St => st::StFormat::open(im),
            FormatHandler::Raw => raw::RawFormat::open(im),
        }
    }
}

/// Handlers to try for a given tag (file extension): those advertising the
/// extension, in declaration order, with the raw catalogue handler as the
/// final fallback.
pub(crate) fn handlers_for_tag(tag: &str) -> Vec<FormatHandler> {
    let mut handlers: Vec<FormatHandler> = FormatHandler::iter()
        .filter(|h| h.extensions().contains(&tag))
        .collect();
    if !handlers.contains(&FormatHandler::Raw) {
        handlers.push(FormatHandler::Raw);
    }
    handlers
}

/// Every file extension advertised by a format handler. A convenience for
/// front-end file dialogs.
pub fn supported_extensions() -> Vec<&'static str> {
    let mut extensions: Vec<&'static str> = FormatHandler::iter().flat_map(|h| h.extensions().iter().copied()).collect();
    extensions.sort_unstable();
    extensions.dedup();
    extensions
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dsk_tries_ti99_before_raw() {
        let handlers = handlers_for_tag("dsk");
        assert_eq!(handlers, vec![FormatHandler::Ti99, FormatHandler::Raw]);
    }

    #[test]
    fn test_unknown_tag_falls_back_to_raw() {
        assert_eq!(handlers_for_tag("xyz"), vec![FormatHandler::Raw]);
    }

    #[test]
    fn test_supported_extensions_deduplicated() {
        let exts = supported_extensions();
        assert!(exts.contains(&"atr"));
        assert!(exts.contains(&"img"));
        assert_eq!(exts.iter().filter(|e| **e == "dsk").count(), 1);
    }
}
