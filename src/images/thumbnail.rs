use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};

use crate::error::AssetError;

pub const THUMB_WIDTH: u32 = 450;
pub const THUMB_HEIGHT: u32 = 300;
pub const THUMB_QUALITY: u8 = 90;

/// Crops to fill 450x300 and writes `dst` in the format its extension names.
pub(super) fn render(src: &Path, dst: &Path) -> Result<(), AssetError> {
    let fail = |reason: String| AssetError::Thumbnail {
        path: src.to_path_buf(),
        reason,
    };

    let img = image::open(src).map_err(|e| fail(e.to_string()))?;
    let thumb = img.resize_to_fill(THUMB_WIDTH, THUMB_HEIGHT, FilterType::Lanczos3);

    match ImageFormat::from_path(dst).map_err(|e| fail(e.to_string()))? {
        ImageFormat::Jpeg => {
            let file = File::create(dst).map_err(|e| AssetError::io(dst, e))?;
            let mut out = BufWriter::new(file);
            let encoder = JpegEncoder::new_with_quality(&mut out, THUMB_QUALITY);
            DynamicImage::ImageRgb8(thumb.to_rgb8())
                .write_with_encoder(encoder)
                .map_err(|e| fail(e.to_string()))?;
            out.flush().map_err(|e| AssetError::io(dst, e))?;
        }
        ImageFormat::Png => thumb
            .save_with_format(dst, ImageFormat::Png)
            .map_err(|e| fail(e.to_string()))?,
        other => return Err(fail(format!("unsupported thumbnail format {other:?}"))),
    }
    Ok(())
}

#[cfg(test)]
mod thumbnail_tests {
    use super::*;
    use crate::testing::{asset_store, sample_image};

    #[tokio::test]
    async fn jpg_thumbnail_is_exactly_450_by_300() {
        let (_dir, store) = asset_store();
        let origin = store.derive_storage_name("jpg");
        store
            .store_local(&sample_image(1200, 900, ImageFormat::Jpeg), &origin)
            .await
            .unwrap();

        let thumb = store.generate_thumbnail(&origin).await.unwrap();

        let (w, h) = image::image_dimensions(store.resolve(&thumb)).unwrap();
        assert_eq!((w, h), (THUMB_WIDTH, THUMB_HEIGHT));
        let origin_stem = Path::new(&origin).file_stem().unwrap().to_str().unwrap();
        let thumb_name = Path::new(&thumb).file_name().unwrap().to_str().unwrap();
        assert!(thumb_name.starts_with(origin_stem));
        assert!(thumb_name.ends_with(".jpg"));
        assert!(store.resolve(&origin).exists());
    }

    #[tokio::test]
    async fn small_png_is_upscaled_to_thumbnail_size() {
        let (_dir, store) = asset_store();
        let origin = store.derive_storage_name("png");
        store
            .store_local(&sample_image(90, 200, ImageFormat::Png), &origin)
            .await
            .unwrap();

        let thumb = store.generate_thumbnail(&origin).await.unwrap();

        assert_eq!(
            image::image_dimensions(store.resolve(&thumb)).unwrap(),
            (THUMB_WIDTH, THUMB_HEIGHT)
        );
    }

    #[tokio::test]
    async fn unreadable_source_is_a_thumbnail_error() {
        let (_dir, store) = asset_store();
        let origin = store.derive_storage_name("jpg");
        store.store_local(b"definitely not a jpeg", &origin).await.unwrap();

        let err = store.generate_thumbnail(&origin).await.unwrap_err();
        assert!(matches!(err, AssetError::Thumbnail { .. }));

        let missing = store.generate_thumbnail("meals-images/missing.png").await.unwrap_err();
        assert!(matches!(missing, AssetError::Thumbnail { .. }));
    }
}
