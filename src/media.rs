//! Inline image references.
//!
//! Agents return images as base64 payloads. They are carried through the
//! message text as `<img src="data:<mime>;base64,<data>" />` tags, which keeps
//! a bubble's text append-only, and split back out at render time.

use base64::{engine::general_purpose::STANDARD, Engine};
use once_cell::sync::Lazy;
use regex::Regex;

/// Matches `<img ... src="data:<mime>;base64,<data>" ...>` with either quote style.
static IMG_TAG_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<img\s+[^>]*src=["']data:([^;"']+);base64,([^"']+)["'][^>]*>"#)
        .expect("Invalid image tag regex pattern")
});

/// A piece of message text: either literal text or an inline image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Text(String),
    Image { mime_type: String, data: String },
}

/// Build an embeddable image tag. Whitespace inside `data` is removed.
pub fn img_tag(mime_type: &str, data: &str) -> String {
    let data: String = data.chars().filter(|c| !c.is_whitespace()).collect();
    format!("<img src=\"data:{};base64,{}\" />", mime_type, data)
}

/// Build an image tag from a raw `data:<mime>;base64,<data>` URL.
///
/// URLs that are not base64 data URLs are embedded as given.
pub fn img_tag_from_data_url(url: &str) -> String {
    let parsed = url
        .strip_prefix("data:")
        .and_then(|rest| rest.split_once(";base64,"));
    match parsed {
        Some((mime_type, data)) => img_tag(mime_type, data),
        None => {
            let url: String = url.chars().filter(|c| !c.is_whitespace()).collect();
            format!("<img src=\"{}\" />", url)
        }
    }
}

/// Split message text into text and image segments, in order.
pub fn split_segments(text: &str) -> Vec<Segment> {
    if !text.contains("<img") {
        return vec![Segment::Text(text.to_string())];
    }

    let mut segments = Vec::new();
    let mut last = 0;
    for caps in IMG_TAG_REGEX.captures_iter(text) {
        let (Some(whole), Some(mime), Some(data)) = (caps.get(0), caps.get(1), caps.get(2)) else {
            continue;
        };
        if whole.start() > last {
            segments.push(Segment::Text(text[last..whole.start()].to_string()));
        }
        segments.push(Segment::Image {
            mime_type: mime.as_str().to_string(),
            data: data.as_str().chars().filter(|c| !c.is_whitespace()).collect(),
        });
        last = whole.end();
    }
    if last < text.len() {
        segments.push(Segment::Text(text[last..].to_string()));
    }
    segments
}

/// Size in bytes of the decoded image, or an estimate if the data is not
/// valid base64.
pub fn decoded_len(data: &str) -> usize {
    match STANDARD.decode(data) {
        Ok(bytes) => bytes.len(),
        Err(_) => data.len() * 3 / 4,
    }
}
