//! Tile colours: built-in ramps plus optional btop-style theme files.

use crate::catalog::{BlockKind, Special, MAX_EXPONENT};
use ratatui::style::Color;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

const TILES: usize = MAX_EXPONENT as usize + 1;

const fn rgb(hex: u32) -> Color {
    Color::Rgb((hex >> 16) as u8, (hex >> 8) as u8, hex as u8)
}

/// One Dark based ramp, 1 through 256.
const ONEDARK_TILES: [Color; TILES] = [
    rgb(0x5C6370), // 1
    rgb(0x61AFEF), // 2
    rgb(0x56B6C2), // 4
    rgb(0x98C379), // 8
    rgb(0xE5C07B), // 16
    rgb(0xD19A66), // 32
    rgb(0xE06C75), // 64
    rgb(0xC678DD), // 128
    rgb(0xF16D01), // 256
];

const HIGH_CONTRAST_TILES: [Color; TILES] = [
    rgb(0xFFFFFF),
    rgb(0x0088FF),
    rgb(0x00FFFF),
    rgb(0x00FF00),
    rgb(0xFFFF00),
    rgb(0xFF8800),
    rgb(0xFF0000),
    rgb(0xFF00FF),
    rgb(0xFF5500),
];

/// Paul Tol's bright/vibrant sets: no red/green pairs next to each other.
const COLORBLIND_TILES: [Color; TILES] = [
    rgb(0xBBBBBB),
    rgb(0x0077BB),
    rgb(0x33BBEE),
    rgb(0x009988),
    rgb(0xEE7733),
    rgb(0xCC3311),
    rgb(0xEE3377),
    rgb(0xAA3377),
    rgb(0xBBBB00),
];

/// Bug, Wild, Swap, Bomb, Magnet, Zap, Nuke, Blaster.
const SPECIALS: [Color; 8] = [
    rgb(0x7F848E),
    rgb(0xFFFFFF),
    rgb(0x61AFEF),
    rgb(0xBE5046),
    rgb(0xC678DD),
    rgb(0xE5C07B),
    rgb(0x98C379),
    rgb(0xF16D01),
];

/// Board and tile colours loaded from a theme file.
#[derive(Debug, Clone)]
pub struct Theme {
    /// Numeric tile colours, indexed by exponent (1, 2, 4, ... 256).
    pub tiles: [Color; TILES],
    /// Special tile colours in [`Special::ALL`] order.
    pub specials: [Color; 8],
    /// Board background.
    pub bg: Color,
    /// Grid / border.
    pub div_line: Color,
    /// Text (score, labels).
    pub main_fg: Color,
    /// Highlight / titles.
    pub title: Color,
    /// Ghost outline and secondary text.
    pub inactive_fg: Color,
}

#[derive(Debug, Error)]
pub enum ThemeError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid hex: {0}")]
    InvalidHex(String),
}

impl Default for Theme {
    fn default() -> Self {
        Self::onedark_default()
    }
}

impl Theme {
    pub fn onedark_default() -> Self {
        Self {
            tiles: ONEDARK_TILES,
            specials: SPECIALS,
            bg: rgb(0x31353F),
            div_line: rgb(0x3F444F),
            main_fg: rgb(0xABB2BF),
            title: rgb(0xE5C07B),
            inactive_fg: rgb(0x5C6370),
        }
    }

    /// Read `path` if it exists, otherwise start from One Dark. `palette` is
    /// applied last, so it wins over tile keys in the file.
    pub fn load(path: Option<&Path>, palette: crate::Palette) -> Result<Self, ThemeError> {
        let mut theme = match path {
            Some(p) if p.exists() => {
                let s = std::fs::read_to_string(p)?;
                Self::from_map(&parse_theme_file(&s))
            }
            _ => Self::onedark_default(),
        };
        theme.apply_palette(palette);
        Ok(theme)
    }

    pub fn apply_palette(&mut self, palette: crate::Palette) {
        match palette {
            crate::Palette::Normal => {}
            crate::Palette::HighContrast => {
                self.tiles = HIGH_CONTRAST_TILES;
                self.bg = Color::Black;
                self.main_fg = Color::White;
            }
            crate::Palette::Colorblind => self.tiles = COLORBLIND_TILES,
        }
    }

    /// `tile_<value>` / `special_<kind>` keys win; otherwise btop keys of onedark.theme.
    fn from_map(map: &HashMap<String, String>) -> Self {
        let get = |key: &str| map.get(key).and_then(|v| parse_hex(v).ok());
        const BTOP_RAMP: [&str; TILES] = [
            "inactive_fg",
            "cpu_box",
            "hi_fg",
            "mem_box",
            "title",
            "cpu_mid",
            "cpu_end",
            "net_box",
            "temp_end",
        ];
        let defaults = Self::onedark_default();
        let mut tiles = defaults.tiles;
        for (exp, tile) in tiles.iter_mut().enumerate() {
            if let Some(c) = get(&format!("tile_{}", 1u32 << exp)).or_else(|| get(BTOP_RAMP[exp])) {
                *tile = c;
            }
        }
        let mut specials = defaults.specials;
        for (s, color) in Special::ALL.iter().zip(specials.iter_mut()) {
            if let Some(c) = get(&format!("special_{}", s.label().to_lowercase())) {
                *color = c;
            }
        }
        Self {
            tiles,
            specials,
            bg: get("meter_bg").unwrap_or(defaults.bg),
            div_line: get("div_line").unwrap_or(defaults.div_line),
            main_fg: get("main_fg").unwrap_or(defaults.main_fg),
            title: get("title").unwrap_or(defaults.title),
            inactive_fg: get("inactive_fg").unwrap_or(defaults.inactive_fg),
        }
    }

    /// Fill colour for a tile.
    pub fn kind_color(&self, kind: BlockKind) -> Color {
        match kind {
            BlockKind::Number(e) => self.tiles[(e as usize).min(TILES - 1)],
            BlockKind::Special(s) => {
                let i = Special::ALL.iter().position(|&x| x == s).unwrap_or(0);
                self.specials[i]
            }
        }
    }

    /// Readable label colour on top of `kind_color`.
    pub fn label_color(&self, kind: BlockKind) -> Color {
        match self.kind_color(kind) {
            Color::Rgb(r, g, b) if (r as u32 * 299 + g as u32 * 587 + b as u32 * 114) / 1000 > 150 => {
                Color::Black
            }
            _ => Color::White,
        }
    }
}

/// `theme[key]="value"` lines into a map; quotes may be single or double.
fn parse_theme_file(s: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for line in s.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some(stripped) = line.strip_prefix("theme[") else {
            continue;
        };
        let Some(end) = stripped.find(']') else {
            continue;
        };
        let key = stripped[..end].trim();
        let rest = stripped[end + 1..].trim();
        if let Some(value) = rest.strip_prefix('=') {
            let value = value.trim().trim_matches('"').trim_matches('\'');
            if !value.is_empty() {
                map.insert(key.to_string(), value.to_string());
            }
        }
    }
    map
}

/// `#RRGGBB` or `#RGB`.
pub fn parse_hex(s: &str) -> Result<Color, ThemeError> {
    let s = s.trim().trim_start_matches('#');
    let invalid = || ThemeError::InvalidHex(s.to_string());
    let channel = |range: std::ops::Range<usize>| {
        s.get(range)
            .and_then(|h| u8::from_str_radix(h, 16).ok())
            .ok_or_else(invalid)
    };
    match s.len() {
        6 => Ok(Color::Rgb(channel(0..2)?, channel(2..4)?, channel(4..6)?)),
        3 => Ok(Color::Rgb(
            channel(0..1)? * 17,
            channel(1..2)? * 17,
            channel(2..3)? * 17,
        )),
        _ => Err(invalid()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_6() {
        let c = parse_hex("#98C379").unwrap();
        assert!(matches!(c, Color::Rgb(0x98, 0xC3, 0x79)));
    }

    #[test]
    fn test_parse_hex_3() {
        let c = parse_hex("#FFF").unwrap();
        assert!(matches!(c, Color::Rgb(255, 255, 255)));
        assert!(parse_hex("#GG0000").is_err());
        assert!(parse_hex("#1234").is_err());
    }

    #[test]
    fn test_parse_theme_line() {
        let map = parse_theme_file(r##"theme[meter_bg]="#31353F""##);
        assert_eq!(map.get("meter_bg"), Some(&"#31353F".to_string()));
    }

    #[test]
    fn tile_keys_override_btop_keys() {
        let map = parse_theme_file(
            "theme[mem_box]=\"#010203\"\ntheme[tile_8]='#0A0B0C'\ntheme[special_nuke]=\"#123456\"\n",
        );
        let theme = Theme::from_map(&map);
        assert_eq!(theme.kind_color(BlockKind::Number(3)), Color::Rgb(0x0A, 0x0B, 0x0C));
        assert_eq!(
            theme.kind_color(BlockKind::Special(Special::Nuke)),
            Color::Rgb(0x12, 0x34, 0x56)
        );
        assert_eq!(theme.tiles[0], ONEDARK_TILES[0]);
    }

    #[test]
    fn every_kind_has_a_colour_and_readable_label() {
        let theme = Theme::default();
        assert_eq!(theme.label_color(BlockKind::Special(Special::Wild)), Color::Black);
        assert_eq!(theme.label_color(BlockKind::Number(0)), Color::White);
        for s in Special::ALL {
            let _ = theme.kind_color(BlockKind::Special(s));
        }
    }

    #[test]
    fn palettes_swap_the_ramp() {
        let mut theme = Theme::default();
        theme.apply_palette(crate::Palette::Colorblind);
        assert_eq!(theme.tiles, COLORBLIND_TILES);
    }
}
