use std::io::Write;

use image::{DynamicImage, Rgba, RgbaImage};

use glowup::collage_generator::{
    encode_png, render_collage, wrap_text, CollageGenerator, CollageOptions, TextPainter,
    CANVAS_HEIGHT, CANVAS_WIDTH,
};
use glowup::config::Config;
use glowup::image_loader::ImageSource;

/// Fixed-advance measurer so layout tests run without a real font.
struct StubPainter {
    unit: f32,
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

fn solid(width: u32, height: u32, rgba: [u8; 4]) -> DynamicImage {
    DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba(rgba)))
}

fn config_with_font_path(font_path: &str) -> Config {
    Config {
        port: 0,
        host: "127.0.0.1".to_string(),
        api_key: None,
        api_base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
        analysis_model: "gemini-2.5-flash".to_string(),
        image_model: "gemini-2.5-flash-image-preview".to_string(),
        font_path: font_path.to_string(),
        image_proxy_base: "https://images.weserv.nl/".to_string(),
        app_url: "https://app.example.com".to_string(),
    }
}

#[test]
fn exported_png_decodes_back_to_the_fixed_canvas_size() {
    let painter = StubPainter { unit: 10.0 };
    let user = solid(10, 10, [200, 0, 0, 255]);
    let celebrity = solid(10, 10, [0, 0, 200, 255]);

    let canvas = render_collage(
        &user,
        None,
        &celebrity,
        "Cool Winter",
        "Jennie",
        "You have a tone similar to Jennie (제니 톤)",
        &painter,
    );
    let png = encode_png(canvas).unwrap();

    let decoded = image::load_from_memory(&png).unwrap();
    assert_eq!(decoded.width(), CANVAS_WIDTH);
    assert_eq!(decoded.height(), CANVAS_HEIGHT);
}

#[test]
fn wrap_keeps_long_descriptions_within_the_800px_line_width() {
    let painter = StubPainter { unit: 20.0 };
    // 41 characters at 20px each: no single line may measure past 800.
    let text = "a gentle tone match with soft warm undertones";
    let lines = wrap_text(&painter, text, 36.0, 800.0);
    assert!(lines.len() > 1);
    for line in &lines {
        assert!(painter.text_width(line, 36.0) <= 800.0 || line.split(' ').count() <= 2);
    }
    // Re-joining the lines loses nothing but the line breaks.
    let rejoined: String = lines.concat();
    assert_eq!(
        rejoined.split_whitespace().collect::<Vec<_>>(),
        text.split_whitespace().collect::<Vec<_>>()
    );
}

#[tokio::test]
async fn generator_without_a_usable_font_resolves_empty() {
    let config = config_with_font_path("/nonexistent/font.ttf");
    let generator = CollageGenerator::new(&config);
    assert!(!generator.is_available());

    let options = CollageOptions {
        user_image: ImageSource::Inline(vec![1, 2, 3]),
        celebrity_image: ImageSource::Remote("https://example.com/a.jpg".to_string()),
        transformed_image: None,
        season: "Cool Winter".to_string(),
        celebrity_name: "Jennie".to_string(),
        celebrity_description: "A match".to_string(),
    };

    // Soft failure: empty result, no partial output, no error, even though
    // the sources could never have loaded.
    let result = generator.generate(&options).await.unwrap();
    assert!(result.is_none());
}

#[tokio::test]
async fn generator_rejects_unparseable_font_files() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"definitely not a truetype font").unwrap();

    let config = config_with_font_path(file.path().to_str().unwrap());
    let generator = CollageGenerator::new(&config);
    assert!(!generator.is_available());
}
