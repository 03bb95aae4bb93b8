use std::{
    collections::HashMap,
    fs,
    io::Cursor,
    path::Path,
    sync::Arc,
};

use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink};
use thiserror::Error;

pub const MUTE_LABEL: &str = "Mute All [Key M]";
pub const UNMUTE_LABEL: &str = "Unmute All [Key M]";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AudioChannel {
    FieldBgm,
    CaveBgm,
    Thud,
    Rope,
    GrassStep,
}

impl AudioChannel {
    pub const ALL: [AudioChannel; 5] = [
        AudioChannel::FieldBgm,
        AudioChannel::CaveBgm,
        AudioChannel::Thud,
        AudioChannel::Rope,
        AudioChannel::GrassStep,
    ];

    pub fn file_name(self) -> &'static str {
        match self {
            AudioChannel::FieldBgm => "fieldBGM.mp3",
            AudioChannel::CaveBgm => "caveBGM.mp3",
            AudioChannel::Thud => "thud.mp3",
            AudioChannel::Rope => "rope.mp3",
            AudioChannel::GrassStep => "grassStep.mp3",
        }
    }

    pub fn is_looping(self) -> bool {
        matches!(self, AudioChannel::FieldBgm | AudioChannel::CaveBgm)
    }
}

/// Short non-looping sounds triggered by the user.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Effect {
    Thud,
    Rope,
    GrassStep,
}

impl Effect {
    pub fn channel(self) -> AudioChannel {
        match self {
            Effect::Thud => AudioChannel::Thud,
            Effect::Rope => AudioChannel::Rope,
            Effect::GrassStep => AudioChannel::GrassStep,
        }
    }
}

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("no audio output device: {0}")]
    NoDevice(String),
    #[error("no sound loaded for {0:?}")]
    NotLoaded(AudioChannel),
    #[error("failed to start {channel:?}: {reason}")]
    Playback {
        channel: AudioChannel,
        reason: String,
    },
}

/// Five independently addressable channels.
pub trait AudioOutput {
    /// Start or resume without rewinding.
    fn resume(&mut self, channel: AudioChannel) -> Result<(), AudioError>;
    fn pause(&mut self, channel: AudioChannel) -> Result<(), AudioError>;
    /// Start from the beginning, cutting off a running instance.
    fn restart(&mut self, channel: AudioChannel) -> Result<(), AudioError>;
    fn set_muted(&mut self, channel: AudioChannel, muted: bool);
}

impl<T: AudioOutput + ?Sized> AudioOutput for Box<T> {
    fn resume(&mut self, channel: AudioChannel) -> Result<(), AudioError> {
        (**self).resume(channel)
    }

    fn pause(&mut self, channel: AudioChannel) -> Result<(), AudioError> {
        (**self).pause(channel)
    }

    fn restart(&mut self, channel: AudioChannel) -> Result<(), AudioError> {
        (**self).restart(channel)
    }

    fn set_muted(&mut self, channel: AudioChannel, muted: bool) {
        (**self).set_muted(channel, muted)
    }
}

/// Music, effects and the global mute flag. Playback failures are logged and
/// dropped; callers never see them.
pub struct AudioController<O> {
    output: O,
    muted: bool,
}

impl<O: AudioOutput> AudioController<O> {
    pub fn new(output: O) -> Self {
        Self {
            output,
            muted: false,
        }
    }

    pub fn play_exclusive(&mut self, to_play: AudioChannel, to_pause: AudioChannel) {
        if let Err(err) = self.output.resume(to_play) {
            log::warn!("background music did not start: {err}");
        }
        if let Err(err) = self.output.pause(to_pause) {
            log::warn!("background music did not pause: {err}");
        }
    }

    pub fn play_once(&mut self, effect: Effect) {
        if let Err(err) = self.output.restart(effect.channel()) {
            log::warn!("sound effect did not play: {err}");
        }
    }

    pub fn toggle_mute(&mut self) -> bool {
        self.muted = !self.muted;
        for channel in AudioChannel::ALL {
            self.output.set_muted(channel, self.muted);
        }
        log::info!("audio {}", if self.muted { "muted" } else { "unmuted" });
        self.muted
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn mute_label(&self) -> &'static str {
        if self.is_muted() { UNMUTE_LABEL } else { MUTE_LABEL }
    }

    #[cfg(test)]
    pub(crate) fn output(&self) -> &O {
        &self.output
    }
}

/// Output used when no device could be opened.
pub struct SilentOutput;

impl AudioOutput for SilentOutput {
    fn resume(&mut self, _channel: AudioChannel) -> Result<(), AudioError> {
        Ok(())
    }

    fn pause(&mut self, _channel: AudioChannel) -> Result<(), AudioError> {
        Ok(())
    }

    fn restart(&mut self, _channel: AudioChannel) -> Result<(), AudioError> {
        Ok(())
    }

    fn set_muted(&mut self, _channel: AudioChannel, _muted: bool) {}
}

struct LoadedSound {
    bytes: Arc<[u8]>,
    sink: Option<Sink>,
    muted: bool,
}

/// Installs `sink` for a channel and stops whatever the old one was playing.
fn replace_sink(slot: &mut Option<Sink>, sink: Sink) -> Option<Sink> {
    let previous = slot.replace(sink);
    if let Some(previous) = &previous {
        previous.stop();
    }
    previous
}

fn volume(muted: bool) -> f32 {
    if muted { 0.0 } else { 1.0 }
}

pub struct RodioOutput {
    _stream: OutputStream,
    handle: OutputStreamHandle,
    sounds: HashMap<AudioChannel, LoadedSound>,
}

impl RodioOutput {
    /// Opens the default device and reads every channel's file from `dir`.
    /// Missing files leave that channel silent.
    pub fn open(dir: &Path) -> Result<Self, AudioError> {
        let (stream, handle) =
            OutputStream::try_default().map_err(|err| AudioError::NoDevice(err.to_string()))?;

        let mut sounds = HashMap::new();
        for channel in AudioChannel::ALL {
            let path = dir.join(channel.file_name());
            match fs::read(&path) {
                Ok(bytes) => {
                    sounds.insert(
                        channel,
                        LoadedSound {
                            bytes: bytes.into(),
                            sink: None,
                            muted: false,
                        },
                    );
                }
                Err(err) => log::warn!("sound {} unavailable: {err}", path.display()),
            }
        }

        let mut output = Self {
            _stream: stream,
            handle,
            sounds,
        };
        for channel in AudioChannel::ALL.into_iter().filter(|c| c.is_looping()) {
            if let Err(err) = output.prepare_loop(channel) {
                log::warn!("{err}");
            }
        }
        Ok(output)
    }

    fn new_sink(&self, channel: AudioChannel) -> Result<Sink, AudioError> {
        Sink::try_new(&self.handle).map_err(|err| AudioError::Playback {
            channel,
            reason: err.to_string(),
        })
    }

    fn prepare_loop(&mut self, channel: AudioChannel) -> Result<(), AudioError> {
        let sink = self.new_sink(channel)?;
        let sound = self
            .sounds
            .get_mut(&channel)
            .ok_or(AudioError::NotLoaded(channel))?;
        sink.set_volume(volume(sound.muted));
        let source = Decoder::new_looped(Cursor::new(sound.bytes.clone())).map_err(|err| {
            AudioError::Playback {
                channel,
                reason: err.to_string(),
            }
        })?;
        sink.pause();
        sink.append(source);
        sound.sink = Some(sink);
        Ok(())
    }
}

impl AudioOutput for RodioOutput {
    fn resume(&mut self, channel: AudioChannel) -> Result<(), AudioError> {
        let sound = self
            .sounds
            .get(&channel)
            .ok_or(AudioError::NotLoaded(channel))?;
        let needs_restart = match sound.sink.as_ref() {
            Some(sink) if !sink.empty() => {
                sink.play();
                false
            }
            _ => true,
        };
        if needs_restart {
            self.restart(channel)?;
        }
        Ok(())
    }

    fn pause(&mut self, channel: AudioChannel) -> Result<(), AudioError> {
        if let Some(sink) = self.sounds.get(&channel).and_then(|s| s.sink.as_ref()) {
            sink.pause();
        }
        Ok(())
    }

    fn restart(&mut self, channel: AudioChannel) -> Result<(), AudioError> {
        let sink = self.new_sink(channel)?;
        let sound = self
            .sounds
            .get_mut(&channel)
            .ok_or(AudioError::NotLoaded(channel))?;
        sink.set_volume(volume(sound.muted));
        let bytes = Cursor::new(sound.bytes.clone());
        let appended = if channel.is_looping() {
            Decoder::new_looped(bytes).map(|source| sink.append(source))
        } else {
            Decoder::new(bytes).map(|source| sink.append(source))
        };
        appended.map_err(|err| AudioError::Playback {
            channel,
            reason: err.to_string(),
        })?;

        replace_sink(&mut sound.sink, sink);
        Ok(())
    }

    fn set_muted(&mut self, channel: AudioChannel, muted: bool) {
        // rodio has no per-sink mute; volume zero keeps position running.
        if let Some(sound) = self.sounds.get_mut(&channel) {
            sound.muted = muted;
            if let Some(sink) = &sound.sink {
                sink.set_volume(volume(muted));
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{Call, RecordingOutput};
    use super::*;

    #[test]
    fn replacing_a_sink_stops_the_running_sound() {
        use rodio::source::SineWave;

        let (first, mut queue) = Sink::new_idle();
        first.append(SineWave::new(440.0));
        assert_eq!(first.len(), 1);

        let (second, _second_queue) = Sink::new_idle();
        let mut slot = Some(first);
        let previous = replace_sink(&mut slot, second).expect("previous sink");

        // Controls are applied as the output pulls samples.
        for _ in 0..4096 {
            let _ = queue.next();
        }
        assert!(previous.empty());
        assert!(slot.as_ref().is_some_and(|sink| sink.empty()));
    }

    #[test]
    fn play_exclusive_resumes_one_and_pauses_other() {
        let mut audio = AudioController::new(RecordingOutput::default());
        audio.play_exclusive(AudioChannel::CaveBgm, AudioChannel::FieldBgm);
        assert!(audio.output().is_playing(AudioChannel::CaveBgm));
        assert!(!audio.output().is_playing(AudioChannel::FieldBgm));
        assert_eq!(
            audio.output().calls,
            vec![
                Call::Resume(AudioChannel::CaveBgm),
                Call::Pause(AudioChannel::FieldBgm)
            ]
        );
    }

    #[test]
    fn play_once_restarts_effect_every_time() {
        let mut audio = AudioController::new(RecordingOutput::default());
        audio.play_once(Effect::Rope);
        audio.play_once(Effect::Rope);
        assert_eq!(
            audio.output().calls,
            vec![
                Call::Restart(AudioChannel::Rope),
                Call::Restart(AudioChannel::Rope)
            ]
        );
    }

    #[test]
    fn toggle_mute_twice_restores_every_channel() {
        let mut audio = AudioController::new(RecordingOutput::default());
        assert_eq!(audio.mute_label(), MUTE_LABEL);

        assert!(audio.toggle_mute());
        assert_eq!(audio.mute_label(), UNMUTE_LABEL);
        for channel in AudioChannel::ALL {
            assert!(audio.output().is_muted(channel), "{channel:?}");
        }

        assert!(!audio.toggle_mute());
        assert_eq!(audio.mute_label(), MUTE_LABEL);
        assert!(!audio.is_muted());
        for channel in AudioChannel::ALL {
            assert!(!audio.output().is_muted(channel), "{channel:?}");
        }
    }

    #[test]
    fn playback_failures_are_swallowed() {
        let output = RecordingOutput {
            fail: true,
            ..Default::default()
        };
        let mut audio = AudioController::new(output);
        audio.play_exclusive(AudioChannel::FieldBgm, AudioChannel::CaveBgm);
        audio.play_once(Effect::Thud);
        assert_eq!(audio.output().calls.len(), 3);
    }

    #[test]
    fn effects_map_to_distinct_channels() {
        let channels = [Effect::Thud, Effect::Rope, Effect::GrassStep].map(Effect::channel);
        assert_eq!(
            channels,
            [AudioChannel::Thud, AudioChannel::Rope, AudioChannel::GrassStep]
        );
        assert!(channels.iter().all(|c| !c.is_looping()));
    }
}
