use crate::error::ProcessingError;
use crate::format::target_format;
use crate::image::scale::scale;
use crate::source::SourceFetcher;
use crate::traits::{Derivative, DerivativeGenerator, DerivativeRequest};
use async_trait::async_trait;
use bytes::Bytes;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat, ImageReader};
use lumen_core::Dimension;
use std::io::Cursor;

/// Resampling filter by downscale ratio: cheap for big reductions, sharp for small ones.
fn select_filter(source: Dimension, target: Dimension) -> FilterType {
    let width_ratio = source.width as f32 / target.width.max(1) as f32;
    let height_ratio = source.height as f32 / target.height.max(1) as f32;
    let max_ratio = width_ratio.max(height_ratio);

    if max_ratio > 2.0 {
        FilterType::Triangle
    } else if max_ratio > 1.5 {
        FilterType::CatmullRom
    } else {
        FilterType::Lanczos3
    }
}

/// Encoder for a target format token such as `png` or `jpg`.
pub fn encoder_format(target: &str) -> Result<ImageFormat, ProcessingError> {
    ImageFormat::from_extension(target)
        .filter(|format| format.writing_enabled())
        .ok_or_else(|| ProcessingError::Encode(format!("unsupported target format '{}'", target)))
}

/// Decode `source`, fit it inside `bound`, and encode it as `target`.
pub fn render_thumbnail(
    source: &[u8],
    bound: Dimension,
    target: &str,
) -> Result<Vec<u8>, ProcessingError> {
    let img = ImageReader::new(Cursor::new(source))
        .with_guessed_format()
        .map_err(|e| ProcessingError::Decode(e.to_string()))?
        .decode()
        .map_err(|e| ProcessingError::Decode(e.to_string()))?;

    let (width, height) = img.dimensions();
    let original = Dimension::new(width, height);
    let scaled = scale(original, bound);
    // Extreme aspect ratios can truncate a side to zero; keep at least one pixel.
    let target_size = Dimension::new(scaled.width.max(1), scaled.height.max(1));

    let resized = if target_size == original {
        img
    } else {
        img.resize_exact(
            target_size.width,
            target_size.height,
            select_filter(original, target_size),
        )
    };

    let format = encoder_format(target)?;
    let encodable = match format {
        // JPEG has no alpha channel.
        ImageFormat::Jpeg => DynamicImage::ImageRgb8(resized.to_rgb8()),
        _ => DynamicImage::ImageRgba8(resized.to_rgba8()),
    };

    let mut buffer = Vec::new();
    encodable
        .write_to(&mut Cursor::new(&mut buffer), format)
        .map_err(|e| ProcessingError::Encode(e.to_string()))?;

    Ok(buffer)
}

/// Thumbnail generator for photos: fetch, scale, re-encode in the declared format.
#[derive(Clone)]
pub struct PhotoDerivativeGenerator {
    fetcher: SourceFetcher,
}

impl PhotoDerivativeGenerator {
    pub fn new(fetcher: SourceFetcher) -> Self {
        Self { fetcher }
    }
}

#[async_trait]
impl DerivativeGenerator for PhotoDerivativeGenerator {
    async fn generate(
        &self,
        source_url: &str,
        request: &DerivativeRequest,
    ) -> Result<Derivative, ProcessingError> {
        let target = target_format(request.declared_format.as_deref());
        let content_type = encoder_format(&target)
            .map(|format| format.to_mime_type().to_string())
            .unwrap_or_else(|_| format!("image/{}", target));

        let source = self.fetcher.fetch(source_url).await?;
        let source_len = source.len();
        let bound = request.bound;
        let format = target.clone();

        let start = std::time::Instant::now();
        let encoded =
            tokio::task::spawn_blocking(move || render_thumbnail(&source, bound, &format)).await??;

        tracing::debug!(
            source_bytes = source_len,
            thumbnail_bytes = encoded.len(),
            bound = %bound,
            format = %target,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Rendered photo thumbnail"
        );

        Ok(Derivative {
            bytes: Bytes::from(encoded),
            extension: target,
            content_type,
        })
    }
}
