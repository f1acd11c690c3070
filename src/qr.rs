//! QR code rendering

use qrcode::render::svg;
use qrcode::QrCode;

use crate::error::AppError;

/// Renders `url` as an SVG QR code
pub fn render_svg(url: &str) -> Result<String, AppError> {
    let code = QrCode::new(url.as_bytes()).map_err(|e| AppError::QrRender(e.to_string()))?;

    Ok(code
        .render::<svg::Color>()
        .min_dimensions(200, 200)
        .quiet_zone(true)
        .build())
}
