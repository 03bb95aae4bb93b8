use crate::{
    audio::{AudioController, AudioOutput, Effect},
    config::Rgb,
    scene::{Scene, SceneState},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    SelectScene(Scene),
    PlayEffect(Effect),
    ToggleMute,
}

/// Key bindings, one action per key.
pub const KEY_BINDINGS: [(&str, Action); 8] = [
    ("q", Action::SelectScene(Scene::FieldsNoHole)),
    ("a", Action::SelectScene(Scene::FieldWithHole)),
    ("w", Action::SelectScene(Scene::Hole)),
    ("s", Action::SelectScene(Scene::HoleRope)),
    ("z", Action::PlayEffect(Effect::Thud)),
    ("x", Action::PlayEffect(Effect::Rope)),
    ("c", Action::PlayEffect(Effect::GrassStep)),
    ("m", Action::ToggleMute),
];

impl Action {
    pub fn for_key(key: &str) -> Option<Action> {
        KEY_BINDINGS
            .iter()
            .find(|(bound, _)| bound.eq_ignore_ascii_case(key))
            .map(|(_, action)| *action)
    }

    pub fn key(self) -> &'static str {
        KEY_BINDINGS
            .iter()
            .find(|(_, action)| *action == self)
            .map(|(key, _)| *key)
            .unwrap_or("?")
    }

    /// Button text with the bound key, e.g. `Hole [Key W]`.
    pub fn label(self) -> String {
        format!("{} [Key {}]", self.caption(), self.key().to_ascii_uppercase())
    }

    /// Button caption; the mute button reads its label from the audio state.
    pub fn caption(self) -> &'static str {
        match self {
            Action::SelectScene(Scene::FieldsNoHole) => "Fields",
            Action::SelectScene(Scene::FieldWithHole) => "Field With Hole",
            Action::SelectScene(Scene::Hole) => "Hole",
            Action::SelectScene(Scene::HoleRope) => "Hole With Rope",
            Action::PlayEffect(Effect::Thud) => "Thud",
            Action::PlayEffect(Effect::Rope) => "Rope",
            Action::PlayEffect(Effect::GrassStep) => "Grass Step",
            Action::ToggleMute => "Mute All",
        }
    }
}

/// Everything the input router mutates: the active scene and the audio.
pub struct Show<O> {
    scene: SceneState,
    audio: AudioController<O>,
}

impl<O: AudioOutput> Show<O> {
    pub fn new(initial: Scene, accent: Rgb, output: O) -> Self {
        Self {
            scene: SceneState::new(initial, accent),
            audio: AudioController::new(output),
        }
    }

    pub fn scene(&self) -> &SceneState {
        &self.scene
    }

    pub fn audio(&self) -> &AudioController<O> {
        &self.audio
    }

    pub fn dispatch(&mut self, action: Action) {
        match action {
            Action::SelectScene(scene) => {
                self.scene.set_scene(scene);
                let (to_play, to_pause) = scene.category().music();
                self.audio.play_exclusive(to_play, to_pause);
            }
            Action::PlayEffect(effect) => self.audio.play_once(effect),
            Action::ToggleMute => {
                self.audio.toggle_mute();
            }
        }
    }

    /// Returns whether the key was bound.
    pub fn press_key(&mut self, key: &str) -> bool {
        match Action::for_key(key) {
            Some(action) => {
                log::debug!("key {key:?} -> {action:?}");
                self.dispatch(action);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        audio::{
            AudioChannel, MUTE_LABEL, UNMUTE_LABEL,
            testing::{Call, RecordingOutput},
        },
        config::DEFAULT_ACCENT,
    };

    fn new_show() -> Show<RecordingOutput> {
        Show::new(Scene::default(), DEFAULT_ACCENT, RecordingOutput::default())
    }

    #[test]
    fn bindings_cover_every_action_once() {
        let keys: Vec<&str> = KEY_BINDINGS.iter().map(|(k, _)| *k).collect();
        for (i, key) in keys.iter().enumerate() {
            assert!(!keys[i + 1..].contains(key), "duplicate key {key}");
        }
        for (key, action) in KEY_BINDINGS {
            assert_eq!(action.key(), key, "{action:?} bound twice");
        }
    }

    #[test]
    fn keys_are_case_insensitive() {
        assert_eq!(Action::for_key("W"), Some(Action::SelectScene(Scene::Hole)));
        assert_eq!(Action::for_key("w"), Some(Action::SelectScene(Scene::Hole)));
        assert_eq!(Action::ToggleMute.key(), "m");
    }

    #[test]
    fn labels_show_the_bound_key() {
        assert_eq!(Action::SelectScene(Scene::HoleRope).label(), "Hole With Rope [Key S]");
        assert_eq!(Action::PlayEffect(Effect::GrassStep).label(), "Grass Step [Key C]");
        assert_eq!(Action::ToggleMute.label(), MUTE_LABEL);
    }

    #[test]
    fn unknown_keys_do_nothing() {
        let mut show = new_show();
        assert!(!show.press_key("p"));
        assert!(!show.press_key("enter"));
        assert_eq!(show.scene().scene(), Scene::FieldsNoHole);
        assert!(show.audio().output().calls.is_empty());
    }

    #[test]
    fn hole_selection_switches_scene_music_and_chrome() {
        let mut show = new_show();
        assert!(!show.audio().is_muted());

        assert!(show.press_key("w"));

        assert_eq!(show.scene().flags(), [false, false, true, false]);
        let output = show.audio().output();
        assert!(output.is_playing(AudioChannel::CaveBgm));
        assert!(!output.is_playing(AudioChannel::FieldBgm));
        assert_eq!(show.scene().palette().title_bar, Rgb(48, 48, 48));
        assert_eq!(show.scene().palette().button_hover, Rgb(55, 55, 55));
    }

    #[test]
    fn field_scenes_play_field_music() {
        let mut show = new_show();
        show.dispatch(Action::SelectScene(Scene::HoleRope));
        show.dispatch(Action::SelectScene(Scene::FieldWithHole));
        let output = show.audio().output();
        assert!(output.is_playing(AudioChannel::FieldBgm));
        assert!(!output.is_playing(AudioChannel::CaveBgm));
    }

    #[test]
    fn effects_leave_scene_untouched() {
        let mut show = new_show();
        show.dispatch(Action::SelectScene(Scene::Hole));
        show.press_key("z");
        show.press_key("x");
        show.press_key("c");
        assert_eq!(show.scene().scene(), Scene::Hole);
        let calls = &show.audio().output().calls;
        assert_eq!(
            &calls[calls.len() - 3..],
            &[
                Call::Restart(AudioChannel::Thud),
                Call::Restart(AudioChannel::Rope),
                Call::Restart(AudioChannel::GrassStep),
            ]
        );
    }

    #[test]
    fn mute_key_flips_label() {
        let mut show = new_show();
        show.press_key("m");
        assert_eq!(show.audio().mute_label(), UNMUTE_LABEL);
        show.press_key("M");
        assert_eq!(show.audio().mute_label(), MUTE_LABEL);
    }
}
