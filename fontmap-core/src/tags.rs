//! OpenType tag helpers (made by FontLab https://www.fontlab.com/)
use anyhow::{anyhow, Result};
use read_fonts::types::Tag;

/// Weight axis tag.
pub const WGHT: Tag = Tag::new(b"wght");

/// Parse a 1-4 character tag, space-padded the way fonts store it.
pub fn tag4(raw: &str) -> Result<Tag> {
    if raw.is_empty() || raw.len() > 4 {
        return Err(anyhow!("tag must be 1-4 printable ASCII chars"));
    }

    let mut buf = [b' '; 4];
    for (i, byte) in raw.as_bytes().iter().take(4).enumerate() {
        if !(0x20..=0x7E).contains(byte) {
            return Err(anyhow!("tag byte out of range: {raw}"));
        }
        buf[i] = *byte;
    }

    Ok(Tag::new(&buf))
}

/// Render a tag as text, trailing padding removed.
pub fn tag_to_string(tag: Tag) -> String {
    String::from_utf8_lossy(&tag.to_be_bytes())
        .trim_end()
        .to_string()
}

/// Whether a textual axis tag (from metadata or the catalog) names the weight axis.
pub fn is_weight_axis(raw: &str) -> bool {
    tag4(raw.trim()).map(|tag| tag == WGHT).unwrap_or(false)
}
