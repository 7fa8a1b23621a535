//! Optional brand assets, resolved before any card is drawn.
//!
//! A logo or signature that is missing, unreadable or undecodable is simply absent; the renderers
//! leave that slot out.

use image::DynamicImage;
use std::path::Path;

/// Decode an image from memory. Zero-sized images count as undecodable.
pub fn decode_bytes(bytes: &[u8]) -> Option<DynamicImage> {
    match image::load_from_memory(bytes) {
        Ok(img) if img.width() > 0 && img.height() > 0 => Some(img),
        Ok(_) => None,
        Err(e) => {
            tracing::debug!(error = %e, "image decode failed");
            None
        }
    }
}

pub fn decode_path(path: &Path) -> Option<DynamicImage> {
    match std::fs::read(path) {
        Ok(bytes) => decode_bytes(&bytes),
        Err(e) => {
            tracing::debug!(path = %path.to_string_lossy(), error = %e, "asset not readable");
            None
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BrandAssets {
    pub logo: Option<DynamicImage>,
    pub signature: Option<DynamicImage>,
}

impl BrandAssets {
    pub fn resolve(logo: Option<&Path>, signature: Option<&Path>) -> Self {
        let assets = BrandAssets {
            logo: logo.and_then(decode_path),
            signature: signature.and_then(decode_path),
        };
        tracing::debug!(
            logo = assets.logo.is_some(),
            signature = assets.signature.is_some(),
            "brand assets resolved"
        );
        assets
    }
}
