use std::{fmt, str::FromStr};

use thiserror::Error;

use crate::{audio::AudioChannel, config::Rgb};

pub const CAVE_FILL: Rgb = Rgb::gray(40);

const CAVE_CHROME: Rgb = Rgb(48, 48, 48);
const CAVE_BUTTON_HOVER: Rgb = Rgb(55, 55, 55);
const FIELD_TITLE: Rgb = Rgb(0, 113, 157);
const FIELD_BUTTON_HOVER: Rgb = Rgb(1, 87, 121);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Scene {
    #[default]
    FieldsNoHole,
    FieldWithHole,
    Hole,
    HoleRope,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SceneCategory {
    Field,
    Cave,
}

impl Scene {
    pub const ALL: [Scene; 4] = [
        Scene::FieldsNoHole,
        Scene::FieldWithHole,
        Scene::Hole,
        Scene::HoleRope,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Scene::FieldsNoHole => "fields",
            Scene::FieldWithHole => "fieldWithHole",
            Scene::Hole => "hole",
            Scene::HoleRope => "holeRope",
        }
    }

    pub fn category(self) -> SceneCategory {
        match self {
            Scene::FieldsNoHole | Scene::FieldWithHole => SceneCategory::Field,
            Scene::Hole | Scene::HoleRope => SceneCategory::Cave,
        }
    }

    /// Canvas fill drawn under the background image.
    pub fn backdrop_fill(self, accent: Rgb) -> Rgb {
        match self.category() {
            SceneCategory::Cave => CAVE_FILL,
            SceneCategory::Field => accent,
        }
    }
}

impl SceneCategory {
    /// Background track for this category and the one it replaces.
    pub fn music(self) -> (AudioChannel, AudioChannel) {
        match self {
            SceneCategory::Field => (AudioChannel::FieldBgm, AudioChannel::CaveBgm),
            SceneCategory::Cave => (AudioChannel::CaveBgm, AudioChannel::FieldBgm),
        }
    }
}

impl fmt::Display for Scene {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown scene {0:?}")]
pub struct UnknownScene(pub String);

impl FromStr for Scene {
    type Err = UnknownScene;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Scene::ALL
            .into_iter()
            .find(|scene| scene.name() == s)
            .ok_or_else(|| UnknownScene(s.to_string()))
    }
}

/// Colors of the window regions outside the stage canvas.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChromePalette {
    pub page_background: Rgb,
    pub title_bar: Rgb,
    pub description_bar: Rgb,
    pub bottom_bar: Rgb,
    pub button_hover: Rgb,
}

impl ChromePalette {
    pub fn for_category(category: SceneCategory, accent: Rgb) -> Self {
        match category {
            SceneCategory::Cave => Self {
                page_background: CAVE_CHROME,
                title_bar: CAVE_CHROME,
                description_bar: CAVE_CHROME,
                bottom_bar: CAVE_CHROME,
                button_hover: CAVE_BUTTON_HOVER,
            },
            SceneCategory::Field => Self {
                page_background: accent,
                title_bar: FIELD_TITLE,
                description_bar: FIELD_TITLE,
                bottom_bar: accent,
                button_hover: FIELD_BUTTON_HOVER,
            },
        }
    }
}

/// The active scene and the chrome derived from it. Only `set_scene` changes it.
#[derive(Clone, Debug)]
pub struct SceneState {
    scene: Scene,
    accent: Rgb,
    palette: ChromePalette,
}

impl SceneState {
    pub fn new(scene: Scene, accent: Rgb) -> Self {
        Self {
            scene,
            accent,
            palette: ChromePalette::for_category(scene.category(), accent),
        }
    }

    pub fn scene(&self) -> Scene {
        self.scene
    }

    pub fn accent(&self) -> Rgb {
        self.accent
    }

    pub fn palette(&self) -> ChromePalette {
        self.palette
    }

    pub fn set_scene(&mut self, scene: Scene) -> ChromePalette {
        if scene != self.scene {
            log::info!("scene {} -> {}", self.scene, scene);
        }
        self.scene = scene;
        self.palette = ChromePalette::for_category(scene.category(), self.accent);
        self.palette
    }

    pub fn is_active(&self, scene: Scene) -> bool {
        self.scene == scene
    }

    /// Visibility flags in `Scene::ALL` order.
    #[cfg(test)]
    pub(crate) fn flags(&self) -> [bool; 4] {
        Scene::ALL.map(|scene| self.is_active(scene))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_ACCENT;

    #[test]
    fn starts_on_fields_with_field_palette() {
        let state = SceneState::new(Scene::default(), DEFAULT_ACCENT);
        assert_eq!(state.scene(), Scene::FieldsNoHole);
        assert_eq!(state.flags(), [true, false, false, false]);
        assert_eq!(state.palette().title_bar, Rgb(0, 113, 157));
    }

    #[test]
    fn exactly_one_scene_active_for_every_transition() {
        for from in Scene::ALL {
            for to in Scene::ALL {
                let mut state = SceneState::new(Scene::default(), DEFAULT_ACCENT);
                state.set_scene(from);
                state.set_scene(to);
                let flags = state.flags();
                assert_eq!(flags.iter().filter(|f| **f).count(), 1, "{from} -> {to}");
                assert!(state.is_active(to));
            }
        }
    }

    #[test]
    fn cave_scenes_switch_to_dark_chrome() {
        let mut state = SceneState::new(Scene::default(), DEFAULT_ACCENT);
        let palette = state.set_scene(Scene::Hole);
        assert_eq!(palette.page_background, Rgb(48, 48, 48));
        assert_eq!(palette.title_bar, Rgb(48, 48, 48));
        assert_eq!(palette.description_bar, Rgb(48, 48, 48));
        assert_eq!(palette.bottom_bar, Rgb(48, 48, 48));
        assert_eq!(palette.button_hover, Rgb(55, 55, 55));
        assert_eq!(state.set_scene(Scene::HoleRope), palette);
    }

    #[test]
    fn field_chrome_uses_accent() {
        let accent = Rgb(1, 2, 3);
        let mut state = SceneState::new(Scene::default(), accent);
        state.set_scene(Scene::Hole);
        let palette = state.set_scene(Scene::FieldWithHole);
        assert_eq!(palette.page_background, accent);
        assert_eq!(palette.bottom_bar, accent);
        assert_eq!(palette.button_hover, Rgb(1, 87, 121));
    }

    #[test]
    fn backdrop_fill_is_dark_only_in_caves() {
        let accent = Rgb(9, 9, 200);
        assert_eq!(Scene::FieldsNoHole.backdrop_fill(accent), accent);
        assert_eq!(Scene::FieldWithHole.backdrop_fill(accent), accent);
        assert_eq!(Scene::Hole.backdrop_fill(accent), CAVE_FILL);
        assert_eq!(Scene::HoleRope.backdrop_fill(accent), CAVE_FILL);
    }

    #[test]
    fn names_round_trip_through_from_str() {
        for scene in Scene::ALL {
            assert_eq!(scene.name().parse::<Scene>(), Ok(scene));
        }
        assert!("cave".parse::<Scene>().is_err());
    }
}
