mod ort;
mod palm;
mod tensor;

use std::{path::PathBuf, thread};

use crossbeam_channel::Receiver;

use crate::{
    model_download::{ModelKind, model_path},
    types::{Frame, HandPose},
};

pub use self::ort::OrtHandDetector;

/// Anything that turns a frame into zero or more hands.
pub trait HandDetector: Send + 'static {
    fn detect(&mut self, frame: &Frame) -> anyhow::Result<Vec<HandPose>>;
}

#[derive(Clone, Debug)]
pub struct DetectorConfig {
    pub palm_model: PathBuf,
    pub landmark_model: PathBuf,
    pub max_hands: usize,
    pub palm_score_threshold: f32,
    pub landmark_score_threshold: f32,
}

impl DetectorConfig {
    pub fn new(models_dir: &std::path::Path, max_hands: usize) -> Self {
        Self {
            palm_model: model_path(models_dir, ModelKind::PalmDetector),
            landmark_model: model_path(models_dir, ModelKind::HandLandmarks),
            max_hands,
            palm_score_threshold: 0.5,
            landmark_score_threshold: 0.5,
        }
    }
}

/// Runs `detector` on the newest frame available, forever, handing each
/// result to `on_hands`. Returns when the frame sender is dropped.
pub fn start_detection<D, F>(
    detector: D,
    frames: Receiver<Frame>,
    on_hands: F,
) -> thread::JoinHandle<()>
where
    D: HandDetector,
    F: FnMut(Vec<HandPose>) + Send + 'static,
{
    thread::spawn(move || run_detection_loop(detector, frames, on_hands))
}

fn run_detection_loop<D, F>(mut detector: D, frames: Receiver<Frame>, mut on_hands: F)
where
    D: HandDetector,
    F: FnMut(Vec<HandPose>),
{
    let mut tracked = 0;
    while let Some(frame) = recv_latest_frame(&frames) {
        match detector.detect(&frame) {
            Ok(hands) => {
                if hands.len() != tracked {
                    let scores: Vec<f32> = hands.iter().map(|hand| hand.score).collect();
                    log::debug!(
                        "tracking {} hand(s), scores {scores:.2?}, frame age {:?}",
                        hands.len(),
                        frame.timestamp.elapsed()
                    );
                    tracked = hands.len();
                }
                on_hands(hands);
            }
            Err(err) => log::warn!("hand detection failed: {err:?}"),
        }
    }
    log::info!("frame source closed, detection stopped");
}

fn recv_latest_frame(frames: &Receiver<Frame>) -> Option<Frame> {
    let mut frame = frames.recv().ok()?;
    while let Ok(newer) = frames.try_recv() {
        frame = newer;
    }
    Some(frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::hand_with;
    use anyhow::anyhow;
    use crossbeam_channel::unbounded;
    use std::{sync::mpsc, time::Instant};

    fn frame(width: u32) -> Frame {
        Frame {
            rgba: vec![0; (width * 2 * 4) as usize],
            width,
            height: 2,
            timestamp: Instant::now(),
        }
    }

    /// Reports one hand per frame whose wrist x is the frame width; fails on
    /// width 13.
    struct WidthDetector;

    impl HandDetector for WidthDetector {
        fn detect(&mut self, frame: &Frame) -> anyhow::Result<Vec<HandPose>> {
            if frame.width == 13 {
                return Err(anyhow!("unlucky frame"));
            }
            let x = frame.width as f32;
            Ok(vec![hand_with((x, 0.0), (x, -1.0), (x, -2.0), (x, 1.0))])
        }
    }

    #[test]
    fn skips_to_newest_queued_frame() {
        let (tx, rx) = unbounded();
        for w in [1, 2, 3] {
            tx.send(frame(w)).unwrap();
        }
        assert_eq!(recv_latest_frame(&rx).map(|f| f.width), Some(3));
        drop(tx);
        assert!(recv_latest_frame(&rx).is_none());
    }

    #[test]
    fn delivers_results_and_survives_failures() {
        let (tx, rx) = unbounded();
        let (out_tx, out_rx) = mpsc::channel();
        let handle = start_detection(WidthDetector, rx, move |hands| {
            let _ = out_tx.send(hands);
        });

        tx.send(frame(13)).unwrap();
        tx.send(frame(4)).unwrap();
        let hands = out_rx.recv().unwrap();
        assert_eq!(hands.len(), 1);
        assert_eq!(hands[0].wrist().x, 4.0);

        drop(tx);
        handle.join().unwrap();
    }
}
