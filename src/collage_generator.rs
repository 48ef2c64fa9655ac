use std::io::Cursor;

use image::{imageops, DynamicImage, ImageBuffer, Rgba, RgbaImage};
use rusttype::{point, Font, Scale};

use crate::config::Config;
use crate::error::AppError;
use crate::image_loader::{self, ImageSource};

pub const CANVAS_WIDTH: u32 = 1080;
pub const CANVAS_HEIGHT: u32 = 1920;

// Tailwind gray/indigo values the front end used for its canvas.
const BACKGROUND: Rgba<u8> = Rgba([0xf9, 0xfa, 0xfb, 255]); // gray-50
const TITLE_COLOR: Rgba<u8> = Rgba([0x11, 0x18, 0x27, 255]); // gray-900
const SEASON_COLOR: Rgba<u8> = Rgba([0x4f, 0x46, 0xe5, 255]); // indigo-600
const CAPTION_COLOR: Rgba<u8> = Rgba([0x37, 0x41, 0x51, 255]); // gray-700
const NAME_COLOR: Rgba<u8> = Rgba([0x1f, 0x29, 0x37, 255]); // gray-800
const DESCRIPTION_COLOR: Rgba<u8> = Rgba([0x4b, 0x55, 0x63, 255]); // gray-600
const FOOTER_COLOR: Rgba<u8> = Rgba([0x6b, 0x72, 0x80, 255]); // gray-500

const DESCRIPTION_MAX_WIDTH: f32 = 800.0;
const DESCRIPTION_LINE_HEIGHT: f32 = 48.0;

/// Input bundle for one collage. No identity: the collage is regenerated on
/// every share request.
#[derive(Debug, Clone)]
pub struct CollageOptions {
    pub user_image: ImageSource,
    pub celebrity_image: ImageSource,
    pub transformed_image: Option<ImageSource>,
    pub season: String,
    pub celebrity_name: String,
    pub celebrity_description: String,
}

/// Text measurement and rasterization seam. The layout code only ever talks
/// to this trait, so tests drive it with a stub measurer instead of a real
/// font.
pub trait TextPainter: Send + Sync {
    fn text_width(&self, text: &str, px: f32) -> f32;

    /// Draws `text` horizontally centered on `center_x` with its baseline
    /// at `baseline_y`.
    fn draw_text(
        &self,
        canvas: &mut RgbaImage,
        text: &str,
        center_x: f32,
        baseline_y: f32,
        px: f32,
        color: Rgba<u8>,
    );
}

/// rusttype-backed painter used in production.
pub struct GlyphPainter {
    font: Font<'static>,
}

impl GlyphPainter {
    pub fn from_file(path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let bytes = std::fs::read(path)?;
        let font = Font::try_from_vec(bytes).ok_or("font data could not be parsed")?;
        Ok(GlyphPainter { font })
    }
}

impl TextPainter for GlyphPainter {
    fn text_width(&self, text: &str, px: f32) -> f32 {
        if text.is_empty() {
            return 0.0;
        }
        let scale = Scale::uniform(px);
        let v_metrics = self.font.v_metrics(scale);
        self.font
            .layout(text, scale, point(0.0, v_metrics.ascent))
            .map(|g| g.position().x + g.unpositioned().h_metrics().advance_width)
            .fold(0.0, f32::max)
    }

    fn draw_text(
        &self,
        canvas: &mut RgbaImage,
        text: &str,
        center_x: f32,
        baseline_y: f32,
        px: f32,
        color: Rgba<u8>,
    ) {
        let scale = Scale::uniform(px);
        let start_x = center_x - self.text_width(text, px) / 2.0;

        for glyph in self.font.layout(text, scale, point(start_x, baseline_y)) {
            if let Some(bb) = glyph.pixel_bounding_box() {
                glyph.draw(|gx, gy, coverage| {
                    let x = gx as i32 + bb.min.x;
                    let y = gy as i32 + bb.min.y;
                    if x < 0 || y < 0 {
                        return;
                    }
                    let (x, y) = (x as u32, y as u32);
                    if x >= canvas.width() || y >= canvas.height() {
                        return;
                    }
                    blend_pixel(canvas.get_pixel_mut(x, y), color, coverage);
                });
            }
        }
    }
}

fn blend_pixel(dst: &mut Rgba<u8>, src: Rgba<u8>, alpha: f32) {
    if alpha <= 0.0 {
        return;
    }
    let a = alpha.clamp(0.0, 1.0);
    let inv = 1.0 - a;
    dst.0[0] = (src.0[0] as f32 * a + dst.0[0] as f32 * inv) as u8;
    dst.0[1] = (src.0[1] as f32 * a + dst.0[1] as f32 * inv) as u8;
    dst.0[2] = (src.0[2] as f32 * a + dst.0[2] as f32 * inv) as u8;
    dst.0[3] = 255;
}

/// Greedy word wrap: words are packed onto a line until the next one would
/// push the measured width past `max_width`, the break lands before that
/// word, and the last partial line is always flushed. A line never breaks
/// before its first word. Each line keeps its trailing space, matching how
/// widths were measured.
pub fn wrap_text(painter: &dyn TextPainter, text: &str, px: f32, max_width: f32) -> Vec<String> {
    let mut lines = Vec::new();
    let mut line = String::new();

    for (n, word) in text.split(' ').enumerate() {
        let test_line = format!("{}{} ", line, word);
        if painter.text_width(&test_line, px) > max_width && n > 0 {
            lines.push(line);
            line = format!("{} ", word);
        } else {
            line = test_line;
        }
    }
    lines.push(line);
    lines
}

fn draw_scaled(canvas: &mut RgbaImage, img: &DynamicImage, x: u32, y: u32, width: u32, height: u32) {
    let resized = img.resize_exact(width, height, imageops::FilterType::Lanczos3);
    imageops::overlay(canvas, &resized.to_rgba8(), x as i64, y as i64);
}

/// Draws `img` scaled to `diameter` and clipped to a circle, with a one
/// pixel feathered edge.
fn draw_circular(canvas: &mut RgbaImage, img: &DynamicImage, x: u32, y: u32, diameter: u32) {
    let resized = img
        .resize_exact(diameter, diameter, imageops::FilterType::Lanczos3)
        .to_rgba8();
    let radius = diameter as f32 / 2.0;

    for py in 0..diameter {
        for px in 0..diameter {
            let dx = px as f32 + 0.5 - radius;
            let dy = py as f32 + 0.5 - radius;
            let distance = (dx * dx + dy * dy).sqrt();
            if distance > radius {
                continue;
            }
            let edge = (radius - distance).min(1.0);
            let (cx, cy) = (x + px, y + py);
            if cx >= canvas.width() || cy >= canvas.height() {
                continue;
            }
            let pixel = *resized.get_pixel(px, py);
            let alpha = edge * pixel.0[3] as f32 / 255.0;
            blend_pixel(canvas.get_pixel_mut(cx, cy), pixel, alpha);
        }
    }
}

/// Lays out the fixed 1080×1920 collage. Pure with respect to its inputs:
/// identical decoded images and text fields produce an identical canvas.
pub fn render_collage(
    user: &DynamicImage,
    transformed: Option<&DynamicImage>,
    celebrity: &DynamicImage,
    season: &str,
    celebrity_name: &str,
    celebrity_description: &str,
    painter: &dyn TextPainter,
) -> RgbaImage {
    let mut canvas: RgbaImage =
        ImageBuffer::from_pixel(CANVAS_WIDTH, CANVAS_HEIGHT, BACKGROUND);
    let center_x = CANVAS_WIDTH as f32 / 2.0;

    painter.draw_text(&mut canvas, "My Color Analysis", center_x, 140.0, 72.0, TITLE_COLOR);
    painter.draw_text(
        &mut canvas,
        &format!("My Season: {}", season),
        center_x,
        230.0,
        52.0,
        SEASON_COLOR,
    );

    let images_y = 320;
    if let Some(styled) = transformed {
        // Before and after, side by side.
        let (img_width, img_height, gap) = (480u32, 640u32, 40u32);
        let start_x = (CANVAS_WIDTH - (img_width * 2 + gap)) / 2;

        draw_scaled(&mut canvas, user, start_x, images_y, img_width, img_height);
        draw_scaled(
            &mut canvas,
            styled,
            start_x + img_width + gap,
            images_y,
            img_width,
            img_height,
        );

        let caption_y = (images_y + img_height + 60) as f32;
        painter.draw_text(
            &mut canvas,
            "Before",
            (start_x + img_width / 2) as f32,
            caption_y,
            36.0,
            CAPTION_COLOR,
        );
        painter.draw_text(
            &mut canvas,
            "K-Beauty Style",
            (start_x + img_width + gap + img_width / 2) as f32,
            caption_y,
            36.0,
            CAPTION_COLOR,
        );
    } else {
        // Only the selfie, larger and centered.
        let (img_width, img_height) = (550u32, 733u32);
        let x = (CANVAS_WIDTH - img_width) / 2;
        draw_scaled(&mut canvas, user, x, images_y, img_width, img_height);
        painter.draw_text(
            &mut canvas,
            "My Selfie",
            center_x,
            (images_y + img_height + 60) as f32,
            36.0,
            CAPTION_COLOR,
        );
    }

    // The celebrity block shifts down in the single-image layout so the
    // taller selfie never overlaps it.
    let celeb_y_start: u32 = if transformed.is_some() { 1080 } else { 1150 };
    painter.draw_text(
        &mut canvas,
        "K-Celebrity Match",
        center_x,
        celeb_y_start as f32,
        56.0,
        TITLE_COLOR,
    );

    let celeb_size = 380u32;
    let celeb_x = (CANVAS_WIDTH - celeb_size) / 2;
    let celeb_y = celeb_y_start + 80;
    draw_circular(&mut canvas, celebrity, celeb_x, celeb_y, celeb_size);

    painter.draw_text(
        &mut canvas,
        celebrity_name,
        center_x,
        (celeb_y + celeb_size + 90) as f32,
        48.0,
        NAME_COLOR,
    );

    let quoted = format!("\"{}\"", celebrity_description);
    let mut line_y = (celeb_y + celeb_size + 150) as f32;
    for line in wrap_text(painter, &quoted, 36.0, DESCRIPTION_MAX_WIDTH) {
        painter.draw_text(&mut canvas, &line, center_x, line_y, 36.0, DESCRIPTION_COLOR);
        line_y += DESCRIPTION_LINE_HEIGHT;
    }

    painter.draw_text(
        &mut canvas,
        "Korean Glow-Up",
        center_x,
        (CANVAS_HEIGHT - 60) as f32,
        32.0,
        FOOTER_COLOR,
    );

    canvas
}

pub fn encode_png(canvas: RgbaImage) -> Result<Vec<u8>, AppError> {
    let mut buffer = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(canvas)
        .write_to(&mut buffer, image::ImageFormat::Png)
        .map_err(|e| AppError::Internal(format!("Failed to encode collage PNG: {}", e)))?;
    Ok(buffer.into_inner())
}

/// Loads the input images, renders the collage and encodes it as PNG.
///
/// Returns `Ok(None)` when no drawing surface exists (the configured font
/// never loaded): an unsupported environment, not a data problem. Image
/// load failures abort the whole composite with an error.
pub struct CollageGenerator {
    http: reqwest::Client,
    painter: Option<GlyphPainter>,
}

impl CollageGenerator {
    pub fn new(config: &Config) -> Self {
        let painter = match GlyphPainter::from_file(&config.font_path) {
            Ok(painter) => Some(painter),
            Err(e) => {
                log::warn!(
                    "Collage text rendering unavailable, font '{}' could not be loaded: {}",
                    config.font_path,
                    e
                );
                None
            }
        };
        CollageGenerator {
            http: reqwest::Client::new(),
            painter,
        }
    }

    pub fn is_available(&self) -> bool {
        self.painter.is_some()
    }

    pub async fn generate(&self, options: &CollageOptions) -> Result<Option<Vec<u8>>, AppError> {
        let Some(painter) = &self.painter else {
            return Ok(None);
        };

        let (user, transformed, celebrity) = image_loader::load_collage_images(
            &self.http,
            &options.user_image,
            options.transformed_image.as_ref(),
            &options.celebrity_image,
        )
        .await?;

        let canvas = render_collage(
            &user,
            transformed.as_ref(),
            &celebrity,
            &options.season,
            &options.celebrity_name,
            &options.celebrity_description,
            painter,
        );

        encode_png(canvas).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Fixed-advance measurer: every character is `unit` pixels wide, and
    /// nothing is drawn. Lets wrap positions be asserted exactly.
    pub(crate) struct StubPainter {
        pub unit: f32,
    }

    impl TextPainter for StubPainter {
        fn text_width(&self, text: &str, _px: f32) -> f32 {
            text.chars().count() as f32 * self.unit
        }

        fn draw_text(
            &self,
            _canvas: &mut RgbaImage,
            _text: &str,
            _center_x: f32,
            _baseline_y: f32,
            _px: f32,
            _color: Rgba<u8>,
        ) {
        }
    }

    #[test]
    fn wraps_exactly_three_words_per_line() {
        let painter = StubPainter { unit: 10.0 };
        // "a b c " measures 60; adding the next word overflows.
        let lines = wrap_text(&painter, "a b c d e f", 36.0, 60.0);
        assert_eq!(lines, vec!["a b c ".to_string(), "d e f ".to_string()]);
    }

    #[test]
    fn short_text_stays_on_one_line() {
        let painter = StubPainter { unit: 10.0 };
        let lines = wrap_text(&painter, "a b", 36.0, 800.0);
        assert_eq!(lines, vec!["a b ".to_string()]);
    }

    #[test]
    fn first_word_never_breaks_even_when_too_wide() {
        let painter = StubPainter { unit: 10.0 };
        let lines = wrap_text(&painter, "supercalifragilistic tiny", 36.0, 60.0);
        assert_eq!(
            lines,
            vec!["supercalifragilistic ".to_string(), "tiny ".to_string()]
        );
    }

    #[test]
    fn empty_text_flushes_a_single_empty_line() {
        let painter = StubPainter { unit: 10.0 };
        let lines = wrap_text(&painter, "", 36.0, 100.0);
        assert_eq!(lines, vec![" ".to_string()]);
    }

    fn solid(width: u32, height: u32, rgba: [u8; 4]) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba(rgba)))
    }

    #[test]
    fn single_image_branch_centers_the_selfie() {
        let painter = StubPainter { unit: 10.0 };
        let user = solid(10, 10, [200, 0, 0, 255]);
        let celebrity = solid(10, 10, [0, 0, 200, 255]);

        let canvas = render_collage(
            &user,
            None,
            &celebrity,
            "Cool Winter",
            "Jennie",
            "A match",
            &painter,
        );

        assert_eq!(canvas.width(), CANVAS_WIDTH);
        assert_eq!(canvas.height(), CANVAS_HEIGHT);
        // Selfie occupies the 550-wide centered band starting at x=265.
        assert_eq!(canvas.get_pixel(270, 330).0, [200, 0, 0, 255]);
        // Outside that band is still background.
        assert_eq!(canvas.get_pixel(100, 330).0, BACKGROUND.0);
        // The two-image slot at x=560 is background in this branch.
        assert_eq!(canvas.get_pixel(900, 330).0, BACKGROUND.0);
    }

    #[test]
    fn two_image_branch_places_before_and_after_side_by_side() {
        let painter = StubPainter { unit: 10.0 };
        let user = solid(10, 10, [200, 0, 0, 255]);
        let styled = solid(10, 10, [0, 200, 0, 255]);
        let celebrity = solid(10, 10, [0, 0, 200, 255]);

        let canvas = render_collage(
            &user,
            Some(&styled),
            &celebrity,
            "Cool Winter",
            "Jennie",
            "A match",
            &painter,
        );

        // User at x=40..520, transformed at x=560..1040.
        assert_eq!(canvas.get_pixel(45, 330).0, [200, 0, 0, 255]);
        assert_eq!(canvas.get_pixel(600, 330).0, [0, 200, 0, 255]);
        // Gap between them stays background.
        assert_eq!(canvas.get_pixel(540, 330).0, BACKGROUND.0);
    }

    #[test]
    fn celebrity_circle_is_clipped() {
        let painter = StubPainter { unit: 10.0 };
        let user = solid(10, 10, [200, 0, 0, 255]);
        let celebrity = solid(10, 10, [0, 0, 200, 255]);

        let canvas = render_collage(
            &user,
            None,
            &celebrity,
            "Cool Winter",
            "Jennie",
            "A match",
            &painter,
        );

        // Single-image branch: circle bounding box starts at (350, 1230).
        let center = canvas.get_pixel(350 + 190, 1230 + 190);
        assert_eq!(center.0, [0, 0, 200, 255]);
        // The corner of the bounding square lies outside the circle.
        assert_eq!(canvas.get_pixel(352, 1232).0, BACKGROUND.0);
    }

    #[test]
    fn layout_is_deterministic_for_identical_inputs() {
        let painter = StubPainter { unit: 10.0 };
        let user = solid(12, 16, [120, 40, 40, 255]);
        let styled = solid(12, 16, [40, 120, 40, 255]);
        let celebrity = solid(8, 8, [40, 40, 120, 255]);

        let render = || {
            render_collage(
                &user,
                Some(&styled),
                &celebrity,
                "Warm Autumn",
                "V",
                "You have a tone similar to V (뷔 톤)",
                &painter,
            )
        };

        let first = render();
        let second = render();
        assert_eq!(first.as_raw(), second.as_raw());

        let first_png = encode_png(first).unwrap();
        let second_png = encode_png(second).unwrap();
        assert_eq!(first_png.len(), second_png.len());
        assert_eq!(first_png, second_png);
    }
}
