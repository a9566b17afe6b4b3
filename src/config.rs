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

//! The `config` module consumes the token stream produced by the external
//! sidecar-configuration parser and turns the best-matching section into
//! layout options.
//!
//! A sidecar config is line-oriented: `[name]` or `[name::size]` section
//! headers followed by `key=value` lines. Sections are scored against the
//! user-supplied tag (the image's file extension) and the image size; only
//! the highest-scoring section is applied. `tracks=` directives split the
//! image into zones, each carrying its own track layout.

use std::ops::RangeInclusive;

use regex::Regex;

use crate::{layout::SimpleLayout, types::FileLayout, ImageError};

/// One token from the external config-file parser.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfigToken {
    /// `[name]` or `[name::size]`; the raw text between the brackets.
    SectionStart(String),
    /// A `key=value` line.
    KeyValue(String, String),
}

/// A `tracks=` selector term: a cylinder range, optionally pinned to one head.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrackRange {
    pub cyls: RangeInclusive<u16>,
    pub head: Option<u8>,
}

impl TrackRange {
    pub fn matches(&self, cyl: u16, head: u8) -> bool {
        self.cyls.contains(&cyl) && self.head.map_or(true, |h| h == head)
    }
}

/// A per-zone track layout introduced by a `tracks=` directive.
#[derive(Clone, Debug)]
pub struct Zone {
    pub selector: Vec<TrackRange>,
    pub layout: SimpleLayout,
}

/// The result of applying the best-scoring config section.
#[derive(Clone, Debug, Default)]
pub struct TagOptions {
    pub cyls: Option<u16>,
    pub heads: Option<u8>,
    pub step: Option<u8>,
    pub file_layout: FileLayout,
    /// Layout options given before any `tracks=` directive.
    pub base: SimpleLayout,
    /// One zone per `tracks=` directive, in file order.
    pub zones: Vec<Zone>,
}

struct Section {
    name: String,
    size: Option<u64>,
    keys: Vec<(String, String)>,
}

impl Section {
    fn parse_header(raw: &str) -> Section {
        let (name, size) = match raw.split_once("::") {
            Some((n, s)) => (n.trim().to_string(), s.trim().parse::<u64>().ok()),
            None => (raw.trim().to_string(), None),
        };
        Section {
            name,
            size,
            keys: Vec::new(),
        }
    }

    /// Score this section against the user-supplied tag and image size:
    /// +4 for a tag match, +2 for a size match, +1 for an empty-name default
    /// section, and -100 for any mismatch on a non-empty name or declared
    /// size. A section must score above zero to be considered.
    fn score(&self, tag: &str, im_size: u64) -> i32 {
        let mut score = 0;
        if self.name.is_empty() {
            score += 1;
        }
        else if self.name.eq_ignore_ascii_case(tag) {
            score += 4;
        }
        else {
            score -= 100;
        }
        match self.size {
            Some(s) if s == im_size => score += 2,
            Some(_) => score -= 100,
            None => {}
        }
        score
    }
}

fn parse_num(v: &str) -> Result<u32, ImageError> {
    let parsed = if let Some(hex) = v.strip_prefix("0x") {
        u32::from_str_radix(hex, 16)
    }
    else {
        v.parse::<u32>()
    };
    parsed.map_err(|_| ImageError::BadImage("bad numeric config value"))
}

fn parse_gap(v: &str) -> Result<Option<u16>, ImageError> {
    if v == "a" {
        return Ok(None);
    }
    Ok(Some(parse_num(v)? as u16))
}

fn parse_track_ranges(v: &str) -> Result<Vec<TrackRange>, ImageError> {
    // c, c-c, optionally suffixed .h to pin a head
    let re = Regex::new(r"^(\d+)(?:-(\d+))?(?:\.([01]))?$").unwrap();
    let mut ranges = Vec::new();
    for term in v.split(',') {
        let caps = re
            .captures(term.trim())
            .ok_or(ImageError::BadImage("bad tracks= selector"))?;
        let start: u16 = caps[1].parse().map_err(|_| ImageError::BadImage("bad tracks= selector"))?;
        let end: u16 = match caps.get(2) {
            Some(m) => m
                .as_str()
                .parse()
                .map_err(|_| ImageError::BadImage("bad tracks= selector"))?,
            None => start,
        };
        let head: Option<u8> = caps.get(3).map(|m| m.as_str().parse::<u8>().unwrap_or(0));
        if end < start {
            return Err(ImageError::BadImage("bad tracks= selector"));
        }
        ranges.push(TrackRange {
            cyls: start..=end,
            head,
        });
    }
    Ok(ranges)
}

fn parse_file_layout(v: &str) -> Result<FileLayout, ImageError> {
    let mut bits = FileLayout::empty();
    for term in v.split(',') {
        bits |= match term.trim() {
            "sequential" => FileLayout::SEQUENTIAL,
            "sides-swapped" => FileLayout::SIDES_SWAPPED,
            "reverse-side0" => FileLayout::REVERSE_SIDE_0,
            "reverse-side1" => FileLayout::REVERSE_SIDE_1,
            _ => return Err(ImageError::BadImage("bad file-layout value")),
        };
    }
    Ok(bits)
}

fn apply_layout_key(layout: &mut SimpleLayout, key: &str, value: &str) -> Result<bool, ImageError> {
    match key {
        "secs" => layout.nr_sectors = parse_num(value)? as u16,
        "bps" => {
            let bps = parse_num(value)?;
            layout.n = (0..=6u8)
                .find(|&n| (128u32 << n) == bps)
                .ok_or(ImageError::BadImage("bps is not a legal sector size"))?;
        }
        "id" => {
            let id = parse_num(value)? as u8;
            layout.base = [id, id];
        }
        "h" => {
            layout.head = match value {
                "a" => 0,
                "0" => 1,
                "1" => 2,
                _ => return Err(ImageError::BadImage("bad head value")),
            };
        }
        "mode" => {
            layout.is_fm = match value {
                "fm" => true,
                "mfm" => false,
                _ => return Err(ImageError::BadImage("bad mode value")),
            };
        }
        "interleave" => layout.interleave = parse_num(value)? as u8,
        "cskew" => layout.cskew = parse_num(value)? as u8,
        "hskew" => layout.hskew = parse_num(value)? as u8,
        "rpm" => layout.rpm = parse_num(value)? as u16,
        "rate" => layout.data_rate = parse_num(value)? as u16,
        "gap2" => layout.gap_2 = parse_gap(value)?,
        "gap3" => layout.gap_3 = parse_gap(value)?,
        "gap4a" => layout.gap_4a = parse_gap(value)?,
        "iam" => {
            layout.has_iam = match value {
                "yes" => true,
                "no" => false,
                _ => return Err(ImageError::BadImage("bad iam value")),
            };
        }
        _ => return Ok(false),
    }
    Ok(true)
}

/// Consume a config token stream, pick the best-scoring section for `tag`
/// and `im_size`, and expand its keys into layout options. Returns None when
/// no section is applicable.
pub fn apply_tags<I>(tokens: I, tag: &str, im_size: u64) -> Result<Option<TagOptions>, ImageError>
where
    I: IntoIterator<Item = ConfigToken>,
{
    let mut sections: Vec<Section> = Vec::new();
    for token in tokens {
        match token {
            ConfigToken::SectionStart(raw) => sections.push(Section::parse_header(&raw)),
            ConfigToken::KeyValue(k, v) => {
                if let Some(section) = sections.last_mut() {
                    section.keys.push((k, v));
                }
                // Keys before any section header belong to no section.
            }
        }
    }

    let best = sections
        .iter()
        .max_by_key(|s| s.score(tag, im_size))
        .filter(|s| s.score(tag, im_size) > 0);

    let section = match best {
        Some(s) => s,
        None => return Ok(None),
    };
    log::debug!(
        "apply_tags(): using section [{}] (score {})",
        section.name,
        section.score(tag, im_size)
    );

    let mut opts = TagOptions::default();
    for (key, value) in &section.keys {
        match key.as_str() {
            "cyls" => opts.cyls = Some(parse_num(value)? as u16),
            "heads" => opts.heads = Some(parse_num(value)? as u8),
            "step" => opts.step = Some(parse_num(value)? as u8),
            "file-layout" => opts.file_layout = parse_file_layout(value)?,
            "tracks" => {
                // A tracks= directive opens a new zone inheriting the options
                // accumulated so far.
                let inherit = opts
                    .zones
                    .last()
                    .map(|z| z.layout.clone())
                    .unwrap_or_else(|| opts.base.clone());
                opts.zones.push(Zone {
                    selector: parse_track_ranges(value)?,
                    layout: inherit,
                });
            }
            _ => {
                let target = match opts.zones.last_mut() {
                    Some(zone) => &mut zone.layout,
                    None => &mut opts.base,
                };
                if !apply_layout_key(target, key, value)? {
                    log::warn!("apply_tags(): unrecognized config key '{}'", key);
                }
            }
        }
    }

    Ok(Some(opts))
}

/// Tokenize sidecar config text. The production front end owns config-file
/// parsing; this tokenizer exists so library consumers and tests can feed
/// `apply_tags` from plain text.
pub fn tokenize(text: &str) -> Vec<ConfigToken> {
    let mut tokens = Vec::new();
    for line in text.lines() {
        let line = line.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        if let Some(raw) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            tokens.push(ConfigToken::SectionStart(raw.to_string()));
        }
        else if let Some((k, v)) = line.split_once('=') {
            tokens.push(ConfigToken::KeyValue(k.trim().to_string(), v.trim().to_string()));
        }
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_section_scoring() {
        let named = Section::parse_header("img::737280");
        assert_eq!(named.score("img", 737_280), 6);
        assert_eq!(named.score("img", 1_474_560), -96);
        assert_eq!(named.score("atr", 737_280), -98);

        let default = Section::parse_header("");
        assert_eq!(default.score("img", 737_280), 1);
    }

    #[test]
    fn test_apply_tags_basic_geometry() {
        let text = "
            [img::737280]
            cyls=80
            heads=2
            secs=9
            bps=512
            interleave=2
            gap3=a
            mode=mfm
        ";
        let opts = apply_tags(tokenize(text), "img", 737_280).unwrap().unwrap();
        assert_eq!(opts.cyls, Some(80));
        assert_eq!(opts.heads, Some(2));
        assert_eq!(opts.base.nr_sectors, 9);
        assert_eq!(opts.base.n, 2);
        assert_eq!(opts.base.interleave, 2);
        assert_eq!(opts.base.gap_3, None);
        assert!(!opts.base.is_fm);
    }

    #[test]
    fn test_apply_tags_prefers_tag_match() {
        let text = "
            [other]
            secs=18
            []
            secs=8
            [img]
            secs=9
        ";
        let opts = apply_tags(tokenize(text), "img", 0).unwrap().unwrap();
        assert_eq!(opts.base.nr_sectors, 9);
    }

    #[test]
    fn test_apply_tags_zones() {
        let text = "
            [img]
            secs=15
            rpm=360
            tracks=0
            secs=15
            tracks=1-79
            secs=30
            rpm=180
        ";
        let opts = apply_tags(tokenize(text), "img", 0).unwrap().unwrap();
        assert_eq!(opts.zones.len(), 2);
        assert_eq!(opts.zones[0].layout.nr_sectors, 15);
        assert_eq!(opts.zones[1].layout.nr_sectors, 30);
        assert_eq!(opts.zones[1].layout.rpm, 180);
        assert!(opts.zones[1].selector[0].matches(40, 1));
        assert!(!opts.zones[1].selector[0].matches(80, 0));
    }

    #[test]
    fn test_track_selector_with_head() {
        let ranges = parse_track_ranges("0-39.1,40").unwrap();
        assert!(ranges[0].matches(10, 1));
        assert!(!ranges[0].matches(10, 0));
        assert!(ranges[1].matches(40, 0));
    }

    #[test]
    fn test_mismatched_section_is_ignored() {
        let text = "
            [vdk::999]
            secs=10
        ";
        assert!(apply_tags(tokenize(text), "img", 1000).unwrap().is_none());
    }
}
