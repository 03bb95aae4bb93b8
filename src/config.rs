use std::{
    env, fs,
    path::{Path, PathBuf},
};

use crate::scene::Scene;

const ASSETS_DIR_ENV: &str = "PUPPET_SHOW_ASSETS";
const MODELS_DIR_ENV: &str = "PUPPET_SHOW_MODELS";
const MAX_HANDS_ENV: &str = "PUPPET_SHOW_MAX_HANDS";
const ACCENT_ENV: &str = "PUPPET_SHOW_ACCENT";
const SCENE_ENV: &str = "PUPPET_SHOW_SCENE";

const STYLE_SHEET: &str = "style.css";
const ACCENT_PROPERTY: &str = "--site-green";

pub const DEFAULT_ACCENT: Rgb = Rgb(59, 143, 3);
pub const DEFAULT_MAX_HANDS: usize = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const fn gray(level: u8) -> Self {
        Self(level, level, level)
    }

    pub fn to_hex(self) -> u32 {
        ((self.0 as u32) << 16) | ((self.1 as u32) << 8) | self.2 as u32
    }

    pub fn to_rgba(self) -> [u8; 4] {
        [self.0, self.1, self.2, 255]
    }
}

/// Startup configuration. Read once; nothing here changes during a session.
#[derive(Clone, Debug)]
pub struct ShowConfig {
    pub assets_dir: PathBuf,
    pub models_dir: PathBuf,
    pub accent: Rgb,
    pub max_hands: usize,
    pub initial_scene: Scene,
}

impl Default for ShowConfig {
    fn default() -> Self {
        Self {
            assets_dir: PathBuf::from("assets"),
            models_dir: PathBuf::from("models"),
            accent: DEFAULT_ACCENT,
            max_hands: DEFAULT_MAX_HANDS,
            initial_scene: Scene::default(),
        }
    }
}

impl ShowConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Applies overrides from `lookup` on top of the defaults. Values that do
    /// not parse are logged and skipped.
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(dir) = lookup(ASSETS_DIR_ENV) {
            config.assets_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup(MODELS_DIR_ENV) {
            config.models_dir = PathBuf::from(dir);
        }
        if let Some(raw) = lookup(MAX_HANDS_ENV) {
            match raw.trim().parse::<usize>() {
                Ok(n) if n > 0 => config.max_hands = n,
                _ => log::warn!("ignoring {MAX_HANDS_ENV}={raw:?}, expected a positive integer"),
            }
        }
        if let Some(raw) = lookup(SCENE_ENV) {
            match raw.trim().parse::<Scene>() {
                Ok(scene) => config.initial_scene = scene,
                Err(err) => log::warn!("ignoring {SCENE_ENV}: {err}"),
            }
        }

        if let Some(accent) = accent_from_style_sheet(&config.assets_dir.join(STYLE_SHEET)) {
            config.accent = accent;
        }
        if let Some(raw) = lookup(ACCENT_ENV) {
            match parse_rgb(&raw) {
                Some(accent) => config.accent = accent,
                None => log::warn!("ignoring {ACCENT_ENV}={raw:?}, expected rgb(r, g, b)"),
            }
        }

        log::info!(
            "config: assets={} models={} accent={:?} max_hands={} scene={}",
            config.assets_dir.display(),
            config.models_dir.display(),
            config.accent,
            config.max_hands,
            config.initial_scene
        );
        config
    }
}

fn accent_from_style_sheet(path: &Path) -> Option<Rgb> {
    let css = fs::read_to_string(path).ok()?;
    let value = css_custom_property(&css, ACCENT_PROPERTY)?;
    let parsed = parse_rgb(value);
    if parsed.is_none() {
        log::warn!(
            "{ACCENT_PROPERTY} in {} is not an rgb color: {value:?}",
            path.display()
        );
    }
    parsed
}

/// Returns the trimmed value of the first `name: value;` declaration.
pub fn css_custom_property<'a>(css: &'a str, name: &str) -> Option<&'a str> {
    let mut rest = css;
    while let Some(at) = rest.find(name) {
        let after = &rest[at + name.len()..];
        let trimmed = after.trim_start();
        if let Some(value) = trimmed.strip_prefix(':') {
            let end = value.find([';', '}']).unwrap_or(value.len());
            let value = value[..end].trim();
            return (!value.is_empty()).then_some(value);
        }
        rest = after;
    }
    None
}

/// Takes the first three integers in `raw` as red, green and blue.
pub fn parse_rgb(raw: &str) -> Option<Rgb> {
    let mut channels = raw
        .split(|c: char| !c.is_ascii_digit())
        .filter(|part| !part.is_empty())
        .map(|part| part.parse::<u16>().map(|v| v.min(255) as u8));

    let r = channels.next()?.ok()?;
    let g = channels.next()?.ok()?;
    let b = channels.next()?.ok()?;
    Some(Rgb(r, g, b))
}
