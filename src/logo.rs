use base64::{Engine as _, engine::general_purpose};
use regex::Regex;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogoImage {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl LogoImage {
    /// File extension Typst uses to pick the image decoder.
    pub fn extension(&self) -> &'static str {
        match self.mime_type.as_str() {
            "image/jpeg" | "image/jpg" => "jpg",
            "image/gif" => "gif",
            "image/svg+xml" => "svg",
            "image/webp" => "webp",
            _ => "png",
        }
    }
}

fn data_url_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^data:(image/[a-zA-Z0-9.+-]+);base64,([A-Za-z0-9+/=\s]*)$").expect("valid data URL pattern")
    })
}

pub fn mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "svg" => Some("image/svg+xml"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

pub fn encode_data_url(mime_type: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime_type, general_purpose::STANDARD.encode(bytes))
}

/// Decodes a logo data URL. Anything that is not a base64 image URL yields `None`.
pub fn decode_data_url(data_url: &str) -> Option<LogoImage> {
    let caps = data_url_re().captures(data_url.trim())?;
    let payload: String = caps[2].chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = general_purpose::STANDARD.decode(payload).ok()?;
    if bytes.is_empty() {
        return None;
    }
    Some(LogoImage {
        mime_type: caps[1].to_ascii_lowercase(),
        bytes,
    })
}

/// Reads an image file into a data URL.
pub fn load_logo_file(path: &Path) -> Result<String> {
    let mime = mime_for_path(path)
        .ok_or_else(|| Error::Config(format!("{} is not a supported image (png, jpg, gif, svg, webp)", path.display())))?;
    let bytes = fs::read(path)?;
    Ok(encode_data_url(mime, &bytes))
}
