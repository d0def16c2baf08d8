//! SVG export geometry and the PNG rasterization command
//!
//! The page computes the zoom in the browser from the rendered SVG size.
//! [`RasterizeCommand::prefix`] and [`RasterizeCommand::suffix`] build the
//! fixed parts of the command text it prints. [`zoom_factor`] and
//! [`RasterizeCommand::for_size`] are the same rules on the Rust side, kept
//! as the reference the page handler is tested against.

/// Largest width or height `rsvg-convert` can rasterize.
pub const MAX_SVG_DIMENSION: u32 = 32767;

/// Zoom that brings the larger side down to [`MAX_SVG_DIMENSION`], if needed.
pub fn zoom_factor(width: u32, height: u32) -> Option<f64> {
    if width > MAX_SVG_DIMENSION || height > MAX_SVG_DIMENSION {
        Some(f64::from(MAX_SVG_DIMENSION) / f64::from(width.max(height)))
    } else {
        None
    }
}

/// Quote a path for a POSIX shell.
pub fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

/// `rsvg-convert` invocation for the downloaded SVG
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterizeCommand {
    svg_path: String,
    png_path: String,
}

impl RasterizeCommand {
    pub fn new(downloads_dir: &str, filename: &str) -> Self {
        Self {
            svg_path: format!("{}/{}.svg", downloads_dir, filename),
            png_path: format!("{}/{}.png", downloads_dir, filename),
        }
    }

    pub fn svg_path(&self) -> &str {
        &self.svg_path
    }

    pub fn png_path(&self) -> &str {
        &self.png_path
    }

    /// Text before the optional zoom flag, including its trailing space.
    pub fn prefix(&self) -> String {
        format!("rsvg-convert --output {} ", shell_quote(&self.png_path))
    }

    /// Text after the optional zoom flag.
    pub fn suffix(&self) -> String {
        shell_quote(&self.svg_path)
    }

    /// Full command text with an optional zoom, as the page prints it.
    pub fn render(&self, zoom: Option<f64>) -> String {
        let zoom = zoom.map(|z| format!("--zoom {} ", z)).unwrap_or_default();
        format!("{}{}{}", self.prefix(), zoom, self.suffix())
    }

    /// Command for an SVG of the given rendered size.
    pub fn for_size(&self, width: u32, height: u32) -> String {
        self.render(zoom_factor(width, height))
    }
}
