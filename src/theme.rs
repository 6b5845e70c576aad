//! Colour constants and per-theme styling shared by the charts and page layouts.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const FONT_FAMILY: &str = "DejaVu Sans Mono";
pub const ACCENT: &str = "#E09351FF";

pub const SPEKTRUM: [&str; 6] = ["#F2A604", "#ED90AE", "#59A689", "#5DAA53", "#0A4E6B", "#232323"];
pub const LIGHT_SEQUENTIAL: [&str; 6] = ["#e09351", "#e4a671", "#e7b890", "#ebcbb0", "#efded0", "#f2f0ef"];
pub const DARK_SEQUENTIAL: [&str; 6] = ["#292523", "#4e3b2c", "#725135", "#97673f", "#bb7d48", "#e09351"];
pub const DARKMODE: [&str; 6] = ["#20272D", "#2C3639", "#40534C", "#677D6A", "#D6BD98", "#FFEACF"];
pub const LIGHTMODE: [&str; 6] = ["#FFF8E8", "#FFEACF", "#EDC775FF", "#E09351FF", "#1A3636", "#20272D"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeMode {
    #[default]
    Dark,
    Light,
}

impl ThemeMode {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "dark" => Some(Self::Dark),
            "light" => Some(Self::Light),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Dark => "dark",
            Self::Light => "light",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Self::Dark => Self::Light,
            Self::Light => Self::Dark,
        }
    }

    pub fn theme(self) -> Theme {
        match self {
            Self::Dark => DARK_THEME,
            Self::Light => LIGHT_THEME,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Theme {
    pub mode: ThemeMode,
    pub background: &'static str,
    pub text: &'static str,
    pub secondary_text: &'static str,
    pub highlight: &'static str,
    /// Figure text colour; the light figures use a darker ink than the page text.
    pub figure_text: &'static str,
}

pub const DARK_THEME: Theme = Theme {
    mode: ThemeMode::Dark,
    background: DARKMODE[0],
    text: DARKMODE[5],
    secondary_text: DARKMODE[4],
    highlight: DARKMODE[3],
    figure_text: "#ffeacf",
};

pub const LIGHT_THEME: Theme = Theme {
    mode: ThemeMode::Light,
    background: LIGHTMODE[0],
    text: LIGHTMODE[5],
    secondary_text: LIGHTMODE[2],
    highlight: LIGHTMODE[3],
    figure_text: "#232323",
};

impl Theme {
    /// Sequential ramp running from the background towards the accent.
    pub fn sequential(&self) -> [&'static str; 6] {
        match self.mode {
            ThemeMode::Dark => DARK_SEQUENTIAL,
            ThemeMode::Light => {
                let mut ramp = LIGHT_SEQUENTIAL;
                ramp.reverse();
                ramp
            }
        }
    }

    /// Image variant for this theme: `pop.svg` stays as is for dark, `pop_light.svg` for light.
    pub fn image_src(&self, dark_src: &str) -> String {
        match self.mode {
            ThemeMode::Dark => dark_src.to_string(),
            ThemeMode::Light => match dark_src.rsplit_once('.') {
                Some((stem, ext)) => format!("{stem}_light.{ext}"),
                None => format!("{dark_src}_light"),
            },
        }
    }

    /// Layout keys every figure shares.
    pub fn figure_layout(&self) -> Value {
        json!({
            "font": {"family": FONT_FAMILY, "color": self.figure_text},
            "margin": {"t": 50, "l": 25, "r": 25, "b": 25},
            "title": {"font": {"size": 18}},
            "plot_bgcolor": self.background,
            "paper_bgcolor": self.background,
            "hoverlabel": {
                "bgcolor": self.background,
                "font": {"size": 14, "family": FONT_FAMILY, "color": self.figure_text},
            },
        })
    }

    /// Inline style for the page shell, mirroring the toggle callback outputs.
    pub fn shell_styles(&self) -> Value {
        json!({
            "main": format!("background-color: {}; color: {}; font-family: {FONT_FAMILY};", self.background, self.text),
            "header": format!("text-align: center; color: {}; background-color: {}; font-weight: 400;", self.text, self.background),
            "sidebar": format!("width: 15%; position: fixed; height: 90%; background-color: {};", self.background),
            "text": format!("color: {}; font-weight: 400;", self.text),
            "secondary": format!("color: {};", self.secondary_text),
            "divider": format!("border: 0.5px solid {ACCENT}; width: 80%; margin: 10px auto; opacity: 0.5;"),
        })
    }
}

/// Bar palette shuffled once with a fixed seed, so colours stay stable across restarts.
pub fn shuffled_palette(seed: u64) -> Vec<&'static str> {
    let mut palette: Vec<&'static str> = SPEKTRUM.to_vec();
    let mut rng = StdRng::seed_from_u64(seed);
    palette.shuffle(&mut rng);
    palette
}
