/// Tag color utilities
///
/// Tags store their color as a CSS-style hex string ("#3B82F6", "#fff").
/// This module turns those strings into iced colors and picks a readable
/// text color for badges drawn on top of them.

use iced::Color;

/// Used when a stored color cannot be parsed
pub const FALLBACK_TAG_COLOR: Color = Color {
    r: 0.23,
    g: 0.51,
    b: 0.96,
    a: 1.0,
};

/// Rec. 709 luma coefficients
const LUMA: [f32; 3] = [0.2126, 0.7152, 0.0722];

/// Parse `#rgb`, `#rrggbb` or `#rrggbbaa` (the leading `#` is optional)
pub fn parse_hex(hex: &str) -> Option<Color> {
    let digits = hex.trim().trim_start_matches('#');
    if !digits.is_ascii() {
        return None;
    }

    let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&digits[range], 16).ok();
    let short = |index: usize| channel(index..index + 1).map(|v| v * 17);

    let (r, g, b, a) = match digits.len() {
        3 => (short(0)?, short(1)?, short(2)?, 255),
        6 => (channel(0..2)?, channel(2..4)?, channel(4..6)?, 255),
        8 => (channel(0..2)?, channel(2..4)?, channel(4..6)?, channel(6..8)?),
        _ => return None,
    };

    Some(Color::from_rgba8(r, g, b, a as f32 / 255.0))
}

/// Parsed tag color, or the fallback blue
pub fn tag_color(hex: &str) -> Color {
    parse_hex(hex).unwrap_or(FALLBACK_TAG_COLOR)
}

/// Relative luminance of an sRGB color
pub fn luminance(color: Color) -> f32 {
    let linear = |c: f32| {
        if c <= 0.04045 {
            c / 12.92
        } else {
            ((c + 0.055) / 1.055).powf(2.4)
        }
    };
    LUMA[0] * linear(color.r) + LUMA[1] * linear(color.g) + LUMA[2] * linear(color.b)
}

/// Black or white, whichever reads better on `background`
pub fn text_on(background: Color) -> Color {
    if luminance(background) > 0.4 {
        Color::BLACK
    } else {
        Color::WHITE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_forms() {
        assert_eq!(parse_hex("#ffffff"), Some(Color::WHITE));
        assert_eq!(parse_hex("000"), Some(Color::BLACK));
        assert_eq!(parse_hex("#f00"), Some(Color::from_rgb8(255, 0, 0)));

        let translucent = parse_hex("#00000080").unwrap();
        assert!((translucent.a - 128.0 / 255.0).abs() < 1e-6);
    }

    #[test]
    fn test_parse_hex_rejects_garbage() {
        assert_eq!(parse_hex(""), None);
        assert_eq!(parse_hex("#12"), None);
        assert_eq!(parse_hex("#gggggg"), None);
        assert_eq!(parse_hex("#ééé"), None);
        assert_eq!(tag_color("blue"), FALLBACK_TAG_COLOR);
    }

    #[test]
    fn test_text_contrast() {
        assert_eq!(text_on(Color::WHITE), Color::BLACK);
        assert_eq!(text_on(Color::BLACK), Color::WHITE);
        // default tag blue is dark enough for white text
        assert_eq!(text_on(tag_color("#3B82F6")), Color::WHITE);
        assert_eq!(text_on(tag_color("#FDE047")), Color::BLACK);
    }
}
