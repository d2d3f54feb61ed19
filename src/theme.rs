//! Theme loading: btop-style `theme[key]="value"` and hex → ratatui Color.

use crate::Palette;
use ratatui::style::Color;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// One Dark palette and UI colours loaded from a theme file.
#[derive(Debug, Clone)]
pub struct Theme {
    /// Puyo colours by id: red, green, blue, yellow.
    pub puyo: [Color; 4],
    /// Junk pieces.
    pub ojama: Color,
    /// Playfield background.
    pub bg: Color,
    /// Grid / border.
    pub div_line: Color,
    /// Text (score, best).
    pub main_fg: Color,
    /// Highlight / titles.
    pub title: Color,
    /// Secondary text (key hints).
    pub inactive_fg: Color,
}

#[derive(Debug, Error)]
pub enum ThemeError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid hex: {0}")]
    InvalidHex(String),
}

const ONEDARK_RED: Color = Color::Rgb(0xE0, 0x6C, 0x75);
const ONEDARK_GREEN: Color = Color::Rgb(0x98, 0xC3, 0x79);
const ONEDARK_BLUE: Color = Color::Rgb(0x61, 0xAF, 0xEF);
const ONEDARK_YELLOW: Color = Color::Rgb(0xE5, 0xC0, 0x7B);
const ONEDARK_GREY: Color = Color::Rgb(0x82, 0x89, 0x97);
const ONEDARK_BG: Color = Color::Rgb(0x31, 0x35, 0x3F);
const ONEDARK_DIV: Color = Color::Rgb(0x3F, 0x44, 0x4F);
const ONEDARK_FG: Color = Color::Rgb(0xAB, 0xB2, 0xBF);
const ONEDARK_INACTIVE: Color = Color::Rgb(0x5C, 0x63, 0x70);

impl Default for Theme {
    fn default() -> Self {
        Self::onedark_default()
    }
}

impl Theme {
    /// Hardcoded One Dark defaults: exact hex values from onedark.theme.
    pub fn onedark_default() -> Self {
        Self {
            puyo: [ONEDARK_RED, ONEDARK_GREEN, ONEDARK_BLUE, ONEDARK_YELLOW],
            ojama: ONEDARK_GREY,
            bg: ONEDARK_BG,
            div_line: ONEDARK_DIV,
            main_fg: ONEDARK_FG,
            title: ONEDARK_YELLOW,
            inactive_fg: ONEDARK_INACTIVE,
        }
    }

    /// Load theme from a btop-style file: `theme[key]="value"` or `theme[key]='value'`.
    /// Falls back to One Dark defaults if path is None or file is missing.
    /// `palette` selects colour variant: Normal (theme), HighContrast, or Colorblind.
    pub fn load(path: Option<&Path>, palette: Palette) -> Result<Self, ThemeError> {
        let path = match path {
            Some(p) if p.exists() => p,
            _ => return Ok(Self::default_for_palette(palette)),
        };
        let s = std::fs::read_to_string(path)?;
        let map = parse_theme_file(&s);
        let mut theme = Self::from_map(&map);
        theme.apply_palette(palette);
        Ok(theme)
    }

    /// Default theme for a palette when no file is loaded.
    fn default_for_palette(palette: Palette) -> Self {
        let mut t = Self::onedark_default();
        t.apply_palette(palette);
        t
    }

    /// Override puyo colours for high-contrast or colorblind.
    pub fn apply_palette(&mut self, palette: Palette) {
        match palette {
            Palette::Normal => {}
            Palette::HighContrast => {
                self.puyo = [
                    Color::Rgb(0xFF, 0x00, 0x00),
                    Color::Rgb(0x00, 0xFF, 0x00),
                    Color::Rgb(0x00, 0x88, 0xFF),
                    Color::Rgb(0xFF, 0xFF, 0x00),
                ];
                self.ojama = Color::Rgb(0xC0, 0xC0, 0xC0);
            }
            Palette::Colorblind => {
                // Paul Tol's bright scheme: no red/green pair.
                self.puyo = [
                    Color::Rgb(0xEE, 0x77, 0x33),
                    Color::Rgb(0x00, 0x99, 0x88),
                    Color::Rgb(0x00, 0x77, 0xBB),
                    Color::Rgb(0xBB, 0xBB, 0x00),
                ];
            }
        }
    }

    fn from_map(map: &HashMap<String, String>) -> Self {
        let get = |key: &str| map.get(key).and_then(|v| parse_hex(v).ok());
        Self {
            puyo: [
                get("cpu_end")
                    .or_else(|| get("temp_end"))
                    .unwrap_or(ONEDARK_RED),
                get("mem_box")
                    .or_else(|| get("cpu_start"))
                    .unwrap_or(ONEDARK_GREEN),
                get("cpu_box").unwrap_or(ONEDARK_BLUE),
                get("title")
                    .or_else(|| get("cpu_mid"))
                    .unwrap_or(ONEDARK_YELLOW),
            ],
            ojama: get("graph_text")
                .or_else(|| get("inactive_fg"))
                .unwrap_or(ONEDARK_GREY),
            bg: get("meter_bg").unwrap_or(ONEDARK_BG),
            div_line: get("div_line").unwrap_or(ONEDARK_DIV),
            main_fg: get("main_fg").unwrap_or(ONEDARK_FG),
            title: get("title").unwrap_or(ONEDARK_YELLOW),
            inactive_fg: get("inactive_fg").unwrap_or(ONEDARK_INACTIVE),
        }
    }

    /// Puyo colour for colour id (0..4).
    #[inline]
    pub fn puyo_color(&self, index: u8) -> Color {
        self.puyo[(index as usize) % 4]
    }
}

/// `theme[key]="value"` lines to a map; comments, blanks and malformed lines are skipped.
fn parse_theme_file(s: &str) -> HashMap<String, String> {
    s.lines()
        .map(str::trim)
        .filter(|line| !line.starts_with('#'))
        .filter_map(|line| {
            let (key, value) = line.strip_prefix("theme[")?.split_once(']')?;
            let value = value.trim_start().strip_prefix('=')?.trim();
            let value = value.trim_matches(|c| c == '"' || c == '\'');
            (!value.is_empty()).then(|| (key.trim().to_owned(), value.to_owned()))
        })
        .collect()
}

/// Parse hex colour "#RRGGBB" or "#RGB" into ratatui Color.
pub fn parse_hex(s: &str) -> Result<Color, ThemeError> {
    let s = s.trim().trim_start_matches('#');
    let channel = |range: std::ops::Range<usize>, scale: u8| {
        s.get(range)
            .and_then(|h| u8::from_str_radix(h, 16).ok())
            .map(|v| v * scale)
            .ok_or_else(|| ThemeError::InvalidHex(s.to_string()))
    };
    match s.len() {
        6 => Ok(Color::Rgb(channel(0..2, 1)?, channel(2..4, 1)?, channel(4..6, 1)?)),
        3 => Ok(Color::Rgb(channel(0..1, 17)?, channel(1..2, 17)?, channel(2..3, 17)?)),
        _ => Err(ThemeError::InvalidHex(s.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_long_and_short_forms() {
        assert_eq!(parse_hex("#98C379").unwrap(), Color::Rgb(0x98, 0xC3, 0x79));
        assert_eq!(parse_hex(" fff ").unwrap(), Color::Rgb(255, 255, 255));
        assert_eq!(parse_hex("#a0b").unwrap(), Color::Rgb(0xAA, 0x00, 0xBB));
    }

    #[test]
    fn hex_rejects_garbage() {
        assert!(parse_hex("#12345").is_err());
        assert!(parse_hex("#GGGGGG").is_err());
        assert!(parse_hex("").is_err());
    }

    #[test]
    fn theme_file_lines() {
        let map = parse_theme_file(
            "# One Dark\n\ntheme[meter_bg]=\"#31353F\"\n  theme[ title ] = '#FFFFFF'\ntheme[broken=\"#000\"\ntheme[empty]=\"\"",
        );
        assert_eq!(map.len(), 2);
        assert_eq!(map["meter_bg"], "#31353F");
        assert_eq!(map["title"], "#FFFFFF");
    }

    #[test]
    fn file_overrides_puyo_colours() {
        let map = parse_theme_file("theme[cpu_box]=\"#010203\"\ntheme[title]='#FFFFFF'");
        let theme = Theme::from_map(&map);
        assert_eq!(theme.puyo_color(2), Color::Rgb(1, 2, 3));
        assert_eq!(theme.puyo_color(3), Color::Rgb(255, 255, 255));
        assert_eq!(theme.puyo_color(0), ONEDARK_RED);
        assert_eq!(theme.ojama, ONEDARK_GREY);
    }

    #[test]
    fn missing_file_falls_back_to_palette_defaults() {
        let path = Path::new("/nonexistent/puyotui.theme");
        let theme = Theme::load(Some(path), Palette::Normal).unwrap();
        assert_eq!(theme.puyo, Theme::onedark_default().puyo);
        let colorblind = Theme::load(Some(path), Palette::Colorblind).unwrap();
        assert_ne!(colorblind.puyo, theme.puyo);
        assert_eq!(colorblind.bg, theme.bg);
    }
}
