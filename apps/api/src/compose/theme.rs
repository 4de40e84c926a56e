//! Theme Resolver — maps a theme id to its fixed four-color palette.

use serde::{Serialize, Serializer};

/// An sRGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const WHITE: Rgb = Rgb::new(0xFF, 0xFF, 0xFF);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// `RRGGBB`, the form WordprocessingML expects.
    pub fn hex(&self) -> String {
        format!("{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }

    /// Components scaled to 0.0–1.0, the form PDF color operators expect.
    pub fn unit(&self) -> [f32; 3] {
        [
            f32::from(self.r) / 255.0,
            f32::from(self.g) / 255.0,
            f32::from(self.b) / 255.0,
        ]
    }
}

impl Serialize for Rgb {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("#{}", self.hex()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Theme {
    pub primary: Rgb,
    pub secondary: Rgb,
    pub text: Rgb,
    pub border: Rgb,
}

pub const FALLBACK_THEME: &str = "company";

const THEMES: &[(&str, Theme)] = &[
    (
        "company",
        Theme {
            primary: Rgb::new(0x1F, 0x3A, 0x5F),
            secondary: Rgb::new(0x4A, 0x6F, 0xA5),
            text: Rgb::new(0x1F, 0x29, 0x33),
            border: Rgb::new(0xCB, 0xD2, 0xD9),
        },
    ),
    (
        "black",
        Theme {
            primary: Rgb::new(0x11, 0x11, 0x11),
            secondary: Rgb::new(0x44, 0x44, 0x44),
            text: Rgb::new(0x11, 0x11, 0x11),
            border: Rgb::new(0xD0, 0xD0, 0xD0),
        },
    ),
    (
        "orange",
        Theme {
            primary: Rgb::new(0xE8, 0x59, 0x0C),
            secondary: Rgb::new(0xFD, 0x7E, 0x14),
            text: Rgb::new(0x21, 0x25, 0x29),
            border: Rgb::new(0xFF, 0xD8, 0xA8),
        },
    ),
    (
        "green",
        Theme {
            primary: Rgb::new(0x2B, 0x8A, 0x3E),
            secondary: Rgb::new(0x40, 0xC0, 0x57),
            text: Rgb::new(0x1B, 0x1F, 0x23),
            border: Rgb::new(0xB2, 0xF2, 0xBB),
        },
    ),
    (
        "blue",
        Theme {
            primary: Rgb::new(0x18, 0x64, 0xAB),
            secondary: Rgb::new(0x33, 0x9A, 0xF0),
            text: Rgb::new(0x1B, 0x1F, 0x23),
            border: Rgb::new(0xA5, 0xD8, 0xFF),
        },
    ),
    (
        "red",
        Theme {
            primary: Rgb::new(0xC9, 0x2A, 0x2A),
            secondary: Rgb::new(0xFA, 0x52, 0x52),
            text: Rgb::new(0x1B, 0x1F, 0x23),
            border: Rgb::new(0xFF, 0xC9, 0xC9),
        },
    ),
];

/// Resolves a theme id, case-insensitively. Unknown or missing ids resolve to
/// the `company` palette.
pub fn resolve(theme_id: Option<&str>) -> Theme {
    let wanted = theme_id.map(|id| id.trim().to_ascii_lowercase());
    let lookup = |name: &str| {
        THEMES
            .iter()
            .find(|(candidate, _)| *candidate == name)
            .map(|(_, theme)| *theme)
    };

    wanted
        .as_deref()
        .and_then(lookup)
        .or_else(|| lookup(FALLBACK_THEME))
        .unwrap_or(THEMES[0].1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_theme_falls_back_to_company() {
        assert_eq!(resolve(Some("nonexistent")), resolve(Some("company")));
    }

    #[test]
    fn test_missing_theme_falls_back_to_company() {
        assert_eq!(resolve(None), resolve(Some("company")));
        assert_eq!(resolve(Some("")), resolve(Some("company")));
    }

    #[test]
    fn test_theme_lookup_is_case_insensitive() {
        assert_eq!(resolve(Some("  Orange ")), resolve(Some("orange")));
    }

    #[test]
    fn test_every_named_theme_is_distinct() {
        let names = ["company", "black", "orange", "green", "blue", "red"];
        for (i, a) in names.iter().enumerate() {
            for b in &names[i + 1..] {
                assert_ne!(
                    resolve(Some(a)).primary,
                    resolve(Some(b)).primary,
                    "{a} and {b} share a primary color"
                );
            }
        }
    }

    #[test]
    fn test_rgb_hex_and_unit() {
        let color = Rgb::new(0xFF, 0x00, 0x80);
        assert_eq!(color.hex(), "FF0080");
        let [r, g, b] = color.unit();
        assert!((r - 1.0).abs() < 1e-6);
        assert_eq!(g, 0.0);
        assert!((b - 128.0 / 255.0).abs() < 1e-6);
    }
}
