//! Image encoding: raw upload bytes → base64 payload for the VLM API.
//!
//! Uploaded photos are forwarded byte-for-byte. No decoding, resizing or
//! re-compression happens here; the endpoint rejects payloads above its size
//! limit, so oversized files are dropped before any request is built.
//!
//! The MIME type in the data URL is sniffed from the file's magic bytes so a
//! PNG is not labelled as JPEG. Unknown formats fall back to `image/jpeg`.

use crate::error::ItemError;
use crate::pipeline::input::ImageAsset;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use tracing::{debug, warn};

const FALLBACK_MIME: &str = "image/jpeg";

/// A transport-ready image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    /// Upload name, used to label the resulting evidence.
    pub name: String,
    pub mime_type: String,
    /// Standard base64 of the original bytes.
    pub data: String,
}

impl EncodedImage {
    /// `data:<mime>;base64,<payload>`
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }
}

/// Encode an image for inference, or reject it when it exceeds `max_bytes`.
///
/// A rejected asset must be skipped entirely by the caller.
pub fn encode_image(asset: &ImageAsset, max_bytes: usize) -> Result<EncodedImage, ItemError> {
    let size = asset.bytes.len();
    if size > max_bytes {
        warn!(
            "Image '{}' is {} bytes, over the {} byte limit; skipping",
            asset.name, size, max_bytes
        );
        return Err(ItemError::AssetTooLarge {
            name: asset.name.clone(),
            size,
            limit: max_bytes,
        });
    }

    let mime_type = sniff_mime(&asset.bytes);
    let data = STANDARD.encode(&asset.bytes);
    debug!(
        "Encoded '{}' ({}) → {} bytes base64",
        asset.name,
        mime_type,
        data.len()
    );

    Ok(EncodedImage {
        name: asset.name.clone(),
        mime_type: mime_type.to_string(),
        data,
    })
}

fn sniff_mime(bytes: &[u8]) -> &'static str {
    image::guess_format(bytes)
        .map(|f| f.to_mime_type())
        .unwrap_or(FALLBACK_MIME)
}
