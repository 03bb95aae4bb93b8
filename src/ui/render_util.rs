use std::sync::Arc;

use gpui::RenderImage;
use image::{Frame as ImageFrame, ImageBuffer, Rgba};

use crate::render::PixelCanvas;

/// GPUI expects BGRA; the swap happens here so frames skip the async asset
/// pipeline and do not flicker.
pub(super) fn canvas_to_image(canvas: &PixelCanvas) -> Option<Arc<RenderImage>> {
    let (width, height) = canvas.dimensions();
    let bgra = rgba_to_bgra(canvas.rgba());
    let buffer = ImageBuffer::<Rgba<u8>, Vec<u8>>::from_raw(width, height, bgra)?;
    Some(Arc::new(RenderImage::new(vec![ImageFrame::new(buffer)])))
}

fn rgba_to_bgra(rgba: &[u8]) -> Vec<u8> {
    let mut out = rgba.to_vec();
    for px in out.chunks_exact_mut(4) {
        px.swap(0, 2);
    }
    out
}

/// Text progress bar for the startup screen; `None` means unknown size.
pub(super) fn progress_bar_string(fraction: Option<f32>) -> String {
    const BAR_LEN: usize = 30;
    match fraction {
        Some(pct) => {
            let pct = pct.clamp(0.0, 1.0);
            let filled = ((pct * BAR_LEN as f32).round() as usize).min(BAR_LEN);
            format!(
                "[{}{}] {:>5.1}%",
                "=".repeat(filled),
                " ".repeat(BAR_LEN - filled),
                pct * 100.0
            )
        }
        None => format!("[{:-<BAR_LEN$}] unknown size", ">"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn swaps_red_and_blue() {
        assert_eq!(rgba_to_bgra(&[1, 2, 3, 4, 5, 6, 7, 8]), [3, 2, 1, 4, 7, 6, 5, 8]);
    }

    #[test]
    fn progress_bar_fills_proportionally() {
        let half = progress_bar_string(Some(0.5));
        assert!(half.starts_with(&format!("[{}{}]", "=".repeat(15), " ".repeat(15))));
        assert!(half.ends_with(" 50.0%"));
        assert!(progress_bar_string(None).ends_with("unknown size"));
        assert!(progress_bar_string(Some(2.0)).ends_with("100.0%"));
    }
}
