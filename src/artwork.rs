use std::{
    collections::hash_map::DefaultHasher,
    hash::{Hash, Hasher},
};

use eframe::egui::{self, ColorImage, TextureHandle, TextureOptions};

pub fn hash_bytes(data: &[u8]) -> u64 {
    let mut hasher = DefaultHasher::new();
    data.hash(&mut hasher);
    hasher.finish()
}

pub fn decode_artwork(bytes: &[u8]) -> anyhow::Result<ColorImage> {
    let image = image::load_from_memory(bytes)
        .map_err(|e| anyhow::anyhow!("Failed to decode artwork: {e}"))?;
    let image = image.to_rgba8();
    let size = [image.width() as usize, image.height() as usize];
    let pixels = image.into_raw();
    Ok(ColorImage::from_rgba_unmultiplied(size, &pixels))
}

#[derive(Default)]
pub struct ArtworkCache {
    hash: Option<u64>,
    texture: Option<TextureHandle>,
}

impl ArtworkCache {
    pub fn texture(&self) -> Option<&TextureHandle> {
        self.texture.as_ref()
    }

    pub fn update(&mut self, ctx: &egui::Context, bytes: Option<&[u8]>) -> Option<&TextureHandle> {
        let Some(bytes) = bytes.filter(|b| !b.is_empty()) else {
            self.hash = None;
            self.texture = None;
            return None;
        };

        let hash = hash_bytes(bytes);
        if self.hash != Some(hash) {
            self.hash = Some(hash);
            self.texture = match decode_artwork(bytes) {
                Ok(image) => Some(ctx.load_texture("edge_panel.artwork", image, TextureOptions::LINEAR)),
                Err(err) => {
                    tracing::debug!(error = %err, len = bytes.len(), "Skipping undecodable artwork");
                    None
                }
            };
        }
        self.texture.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn png_bytes() -> Vec<u8> {
        let image = image::RgbaImage::from_pixel(3, 2, image::Rgba([200, 40, 90, 255]));
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgba8(image)
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .expect("encode png");
        buf
    }

    #[test]
    fn decode_artwork_fails_on_garbage_input() {
        assert!(decode_artwork(&[0u8, 1u8, 2u8, 3u8]).is_err());
    }

    #[test]
    fn decode_artwork_reads_png() {
        let image = decode_artwork(&png_bytes()).expect("decode");
        assert_eq!(image.size, [3, 2]);
    }

    #[test]
    fn cache_reuses_texture_for_same_bytes() {
        let ctx = egui::Context::default();
        let bytes = png_bytes();
        let mut cache = ArtworkCache::default();

        let first = cache.update(&ctx, Some(&bytes)).map(|t| t.id());
        assert!(first.is_some());
        let second = cache.update(&ctx, Some(&bytes)).map(|t| t.id());
        assert_eq!(first, second);

        assert!(cache.update(&ctx, None).is_none());
        assert!(cache.texture().is_none());
        assert!(cache.update(&ctx, Some(&[9, 9, 9])).is_none());
    }
}
