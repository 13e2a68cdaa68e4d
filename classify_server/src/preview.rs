//! Preview sizing for uploaded images.
//!
/// Preview canvas bounds.
pub const PREVIEW_WIDTH: u32 = 400;
pub const PREVIEW_HEIGHT: u32 = 400;

/// Aspect-fit `(width, height)` into `(max_width, max_height)`.
///
/// One dimension always fills its bound; the other is scaled and floored.
/// Smaller images scale up.
pub fn fit_within(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    if width == 0 || height == 0 {
        return (0, 0);
    }

    let wider = f64::from(width) / f64::from(height) > f64::from(max_width) / f64::from(max_height);
    match wider {
        true => {
            let scaled = (f64::from(height) * f64::from(max_width) / f64::from(width)).floor();
            (max_width, scaled as u32)
        }
        false => {
            let scaled = (f64::from(width) * f64::from(max_height) / f64::from(height)).floor();
            (scaled as u32, max_height)
        }
    }
}

/// Preview dimensions for a source image.
pub fn preview_dimensions(width: u32, height: u32) -> (u32, u32) {
    fit_within(width, height, PREVIEW_WIDTH, PREVIEW_HEIGHT)
}
