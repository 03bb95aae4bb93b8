use anyhow::{Context, Result, anyhow};
use ort::session::{Session, builder::GraphOptimizationLevel};
use ort::value::Tensor;

use super::{
    DetectorConfig, HandDetector,
    palm::{PalmDetector, PalmSettings},
    tensor::{LANDMARK_INPUT_SIZE, decode_landmarks, rotated_crop_tensor},
};
use crate::types::{Frame, HandPose};

/// Two-stage ONNX detector: palms over the whole frame, then 21 landmarks
/// inside a rotated crop around each palm.
pub struct OrtHandDetector {
    palms: PalmDetector,
    landmarks: Session,
    min_confidence: f32,
}

impl OrtHandDetector {
    pub fn new(config: &DetectorConfig) -> Result<Self> {
        let palms = PalmDetector::new(
            &config.palm_model,
            PalmSettings {
                score_threshold: config.palm_score_threshold,
                nms_threshold: 0.3,
                max_palms: config.max_hands,
            },
        )?;
        let landmarks = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(2)?
            .commit_from_file(&config.landmark_model)
            .with_context(|| {
                format!(
                    "failed to load landmark model from {}",
                    config.landmark_model.display()
                )
            })?;

        log::info!(
            "hand detector ready ({} / {}), up to {} hands",
            config.palm_model.display(),
            config.landmark_model.display(),
            config.max_hands
        );
        Ok(Self {
            palms,
            landmarks,
            min_confidence: config.landmark_score_threshold,
        })
    }

    fn estimate(
        &mut self,
        frame: &Frame,
        center: (f32, f32),
        side: f32,
        angle: f32,
    ) -> Result<Option<HandPose>> {
        let (input, crop) = rotated_crop_tensor(frame, center, side, angle, LANDMARK_INPUT_SIZE)?;
        let outputs = self
            .landmarks
            .run(ort::inputs![Tensor::from_array(input)?])
            .context("failed to run landmark model")?;
        if outputs.len() < 2 {
            return Err(anyhow!(
                "landmark model returned {} outputs, expected at least 2",
                outputs.len()
            ));
        }

        let confidence = outputs[1]
            .try_extract_array::<f32>()?
            .iter()
            .next()
            .copied()
            .unwrap_or(0.0);
        if confidence < self.min_confidence {
            return Ok(None);
        }

        let flat: Vec<f32> = outputs[0].try_extract_array::<f32>()?.iter().copied().collect();
        let points: Vec<(f32, f32)> = decode_landmarks(&flat)?
            .into_iter()
            .map(|(x, y)| crop.project(x, y))
            .collect();
        Ok(HandPose::from_points(&points, confidence))
    }
}

impl HandDetector for OrtHandDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<HandPose>> {
        let palms = self.palms.detect(frame)?;
        let mut hands = Vec::with_capacity(palms.len());
        for palm in &palms {
            let (center, side, angle) = palm.hand_crop();
            match self.estimate(frame, center, side, angle) {
                Ok(Some(hand)) => hands.push(hand),
                Ok(None) => {}
                Err(err) => log::warn!("landmark estimation failed: {err:?}"),
            }
        }
        Ok(hands)
    }
}
