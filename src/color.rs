use crate::error::{PackError, Result};

/// Parses `#RRGGBB`, `RRGGBB` or the `#RGB` shorthand into an opaque colour.
pub fn parse_hex_color(hex: &str) -> Result<wgpu::Color> {
    let digits = hex.trim().trim_start_matches('#');
    let invalid = || PackError::InvalidColor(hex.to_string());

    // from_str_radix alone lets a leading '+' through
    if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(invalid());
    }

    let (r, g, b) = match digits.len() {
        6 => (
            u8::from_str_radix(&digits[0..2], 16).map_err(|_| invalid())?,
            u8::from_str_radix(&digits[2..4], 16).map_err(|_| invalid())?,
            u8::from_str_radix(&digits[4..6], 16).map_err(|_| invalid())?,
        ),
        3 => {
            // #abc expands to #aabbcc
            let nibble = |i: usize| {
                u8::from_str_radix(&digits[i..i + 1], 16)
                    .map(|v| v * 17)
                    .map_err(|_| invalid())
            };
            (nibble(0)?, nibble(1)?, nibble(2)?)
        }
        _ => return Err(invalid()),
    };

    Ok(wgpu::Color {
        r: r as f64 / 255.0,
        g: g as f64 / 255.0,
        b: b as f64 / 255.0,
        a: 1.0,
    })
}

/// Converts a `0xRRGGBB` literal into line-vertex colour components.
pub fn rgb_from_u32(rgb: u32) -> [f32; 3] {
    [
        ((rgb >> 16) & 0xff) as f32 / 255.0,
        ((rgb >> 8) & 0xff) as f32 / 255.0,
        (rgb & 0xff) as f32 / 255.0,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_default_clear_color() {
        let color = parse_hex_color("#18142c").unwrap();
        assert!((color.r - 0x18 as f64 / 255.0).abs() < 1e-9);
        assert!((color.g - 0x14 as f64 / 255.0).abs() < 1e-9);
        assert!((color.b - 0x2c as f64 / 255.0).abs() < 1e-9);
        assert_eq!(color.a, 1.0);
    }

    #[test]
    fn accepts_missing_hash_and_shorthand() {
        assert_eq!(parse_hex_color("ffffff").unwrap(), parse_hex_color("#fff").unwrap());
        assert_eq!(parse_hex_color("#fff").unwrap().r, 1.0);
    }

    #[test]
    fn rejects_garbage() {
        for bad in ["", "#12345", "#gggggg", "#1234567", "#ééé", "#+1+2+3", "+ab"] {
            assert!(
                matches!(parse_hex_color(bad), Err(PackError::InvalidColor(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn splits_u32_channels() {
        assert_eq!(rgb_from_u32(0xff0000), [1.0, 0.0, 0.0]);
        assert_eq!(rgb_from_u32(0x0000ff), [0.0, 0.0, 1.0]);
    }
}
