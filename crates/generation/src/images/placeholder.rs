//! Offline placeholder images.
//!
//! The background color is derived from a hash of the prompt, so the same
//! prompt always yields the same image. The centered white panel carries one
//! dark bar per wrapped line of the prompt as a stand-in for text.

use image::{DynamicImage, Rgb, RgbImage};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;
use sha2::{Digest, Sha256};

use storyreel_common::error::{StoryreelError, StoryreelResult};

use super::{ImageGenerator, ImageRequest};

const MAX_WORDS: usize = 18;
const WRAP_COLUMNS: usize = 28;
const MAX_LINES: usize = 6;
const PANEL_PADDING: u32 = 20;
const PANEL_COLOR: Rgb<u8> = Rgb([255, 255, 255]);
const INK_COLOR: Rgb<u8> = Rgb([20, 20, 20]);

#[derive(Debug, Default, Clone)]
pub struct PlaceholderImageGenerator;

impl PlaceholderImageGenerator {
    pub fn new() -> Self {
        Self
    }

    /// Render synchronously.
    pub fn render(&self, prompt: &str, width: u32, height: u32) -> StoryreelResult<RgbImage> {
        if width == 0 || height == 0 {
            return Err(StoryreelError::generation(format!(
                "Invalid placeholder size {width}x{height}"
            )));
        }

        let mut image = RgbImage::from_pixel(width, height, background_color(prompt));

        let lines = wrap_words(&caption_text(prompt), WRAP_COLUMNS);
        let lines = &lines[..lines.len().min(MAX_LINES)];
        if lines.is_empty() {
            return Ok(image);
        }

        // Glyph cell scaled to the canvas like a width/32 font size.
        let glyph_h = (width / 32).max(18).min(height / 2).max(1);
        let glyph_w = (glyph_h / 2).max(1);
        let spacing = 6u32;

        let longest = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0) as u32;
        let block_w = (longest * glyph_w).min(width);
        let block_h = (lines.len() as u32 * (glyph_h + spacing)).min(height);
        let x = (width.saturating_sub(block_w) / 2).max(10);
        let y = (height.saturating_sub(block_h) / 2).max(10);

        let panel = Rect::at(
            x as i32 - PANEL_PADDING as i32,
            y as i32 - PANEL_PADDING as i32,
        )
        .of_size(block_w + 2 * PANEL_PADDING, block_h + 2 * PANEL_PADDING);
        draw_filled_rect_mut(&mut image, panel, PANEL_COLOR);

        let bar_h = (glyph_h / 2).max(1);
        for (i, line) in lines.iter().enumerate() {
            let line_w = (line.chars().count() as u32 * glyph_w).clamp(1, block_w.max(1));
            let line_x = x + (block_w - line_w.min(block_w)) / 2;
            let line_y = y + i as u32 * (glyph_h + spacing) + (glyph_h - bar_h) / 2;
            let bar = Rect::at(line_x as i32, line_y as i32).of_size(line_w, bar_h);
            draw_filled_rect_mut(&mut image, bar, INK_COLOR);
        }

        Ok(image)
    }
}

#[async_trait::async_trait]
impl ImageGenerator for PlaceholderImageGenerator {
    async fn generate(&self, request: &ImageRequest) -> StoryreelResult<DynamicImage> {
        let image = self.render(&request.prompt, request.width, request.height)?;
        Ok(DynamicImage::ImageRgb8(image))
    }

    fn name(&self) -> &str {
        "placeholder"
    }
}

/// Pastel background, each channel in `160..240`.
pub fn background_color(prompt: &str) -> Rgb<u8> {
    let digest = Sha256::digest(prompt.as_bytes());
    let mut tail = [0u8; 8];
    tail.copy_from_slice(&digest[digest.len() - 8..]);
    let seed = u64::from_be_bytes(tail);
    let channel = |shift: u32| (160 + (seed >> shift) % 80) as u8;
    Rgb([channel(0), channel(8), channel(16)])
}

/// First words of the prompt, with an ellipsis when cut.
fn caption_text(prompt: &str) -> String {
    let words: Vec<&str> = prompt.split_whitespace().collect();
    let mut text = words[..words.len().min(MAX_WORDS)].join(" ");
    if words.len() > MAX_WORDS {
        text.push('…');
    }
    text
}

/// Greedy word wrap at `columns` characters. Overlong words get their own line.
fn wrap_words(text: &str, columns: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        let needed = if current.is_empty() {
            word.chars().count()
        } else {
            current.chars().count() + 1 + word.chars().count()
        };
        if needed > columns && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}
