//! 16-character labels with their abbreviation mask (FIG 1).

use anyhow::Result;

use crate::utils::charset::{Charset, decode_text};

/// Number of characters in a label field.
pub const LABEL_LEN: usize = 16;

/// Display label and its short form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Label {
    pub text: String,
    pub abbreviation: String,
}

/// Mask bit selecting character `pos` (0 = first character) for the
/// abbreviation.
#[inline(always)]
pub const fn char_pos_mask(pos: usize) -> u16 {
    1 << (LABEL_LEN - 1 - pos)
}

impl Label {
    /// Decodes a raw label field and its character flag field.
    ///
    /// The abbreviation keeps the characters whose flag bit is set, in
    /// ascending position order.
    pub fn decode(raw: &[u8; LABEL_LEN], flags: u16, charset: Charset) -> Result<Self> {
        let short: Vec<u8> = raw
            .iter()
            .enumerate()
            .filter(|&(i, _)| flags & char_pos_mask(i) != 0)
            .map(|(_, &c)| c)
            .collect();

        Ok(Self {
            text: decode_text(raw, charset)?,
            abbreviation: decode_text(&short, charset)?,
        })
    }
}
