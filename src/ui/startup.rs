use std::thread;

use anyhow::Context as _;
use crossbeam_channel::{Sender, bounded};

use super::{AppView, PreparingState, Screen};
use crate::{
    assets::StageAssets,
    config::ShowConfig,
    model_download::{ModelDownloadEvent, ensure_models_ready},
    pipeline::{
        CameraStream, DetectorConfig, HandReader, OrtHandDetector, first_camera, hand_slot,
        start_camera_stream, start_detection,
    },
};

/// Everything the stage needs once startup succeeded. Dropping it stops the
/// camera, which in turn ends the detection worker.
pub(super) struct ReadyShow {
    pub assets: StageAssets,
    pub camera: CameraStream,
    pub hands: HandReader,
    _detection: thread::JoinHandle<()>,
}

pub(super) enum StartupMessage {
    Status(&'static str),
    Model(ModelDownloadEvent),
    Ready(Box<ReadyShow>),
    Failed(String),
}

pub(super) fn spawn_startup(
    config: ShowConfig,
    tx: Sender<StartupMessage>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let message = match prepare_show(&config, &tx) {
            Ok(ready) => StartupMessage::Ready(Box::new(ready)),
            Err(err) => {
                log::error!("startup failed: {err:?}");
                StartupMessage::Failed(format!("{err:#}"))
            }
        };
        let _ = tx.send(message);
    })
}

fn prepare_show(config: &ShowConfig, tx: &Sender<StartupMessage>) -> anyhow::Result<ReadyShow> {
    let assets = StageAssets::load(&config.assets_dir).context("failed to load stage images")?;

    let _ = tx.send(StartupMessage::Status("Preparing hand models..."));
    ensure_models_ready(&config.models_dir, |event| {
        let _ = tx.send(StartupMessage::Model(event));
    })?;

    let _ = tx.send(StartupMessage::Status("Loading hand detector..."));
    let detector = OrtHandDetector::new(&DetectorConfig::new(
        &config.models_dir,
        config.max_hands,
    ))?;

    let _ = tx.send(StartupMessage::Status("Opening camera..."));
    let (frame_tx, frame_rx) = bounded(1);
    let camera = start_camera_stream(first_camera()?, frame_tx)?;

    let (writer, hands) = hand_slot();
    let detection = start_detection(detector, frame_rx, move |batch| writer.publish(batch));
    log::info!("show ready on camera {}", camera.label());

    Ok(ReadyShow {
        assets,
        camera,
        hands,
        _detection: detection,
    })
}

impl AppView {
    /// Applies queued startup messages; returns the next screen once startup
    /// has finished either way.
    pub(super) fn poll_startup(&mut self, state: &mut PreparingState) -> Option<Screen> {
        while let Ok(msg) = self.startup_rx.try_recv() {
            match msg {
                StartupMessage::Status(status) => state.message = status.to_string(),
                StartupMessage::Model(event) => {
                    state.progress.apply(&event);
                    state.message = match event {
                        ModelDownloadEvent::AlreadyPresent { model } => {
                            format!("Found {} model", model.label())
                        }
                        ModelDownloadEvent::Started { model, .. }
                        | ModelDownloadEvent::Progress { model, .. } => {
                            format!("Downloading {} model...", model.label())
                        }
                        ModelDownloadEvent::Finished { model } => {
                            format!("{} model ready", model.label())
                        }
                    };
                }
                StartupMessage::Ready(ready) => return Some(Screen::Show(*ready)),
                StartupMessage::Failed(message) => return Some(Screen::Failed { message }),
            }
        }
        None
    }
}
