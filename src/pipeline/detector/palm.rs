use std::{cmp::Ordering, f32::consts::FRAC_PI_2, path::Path, sync::OnceLock};

use anyhow::{Context, Result, anyhow};
use ort::session::{Session, builder::GraphOptimizationLevel};
use ort::value::Tensor;

use super::tensor::{Letterbox, PALM_INPUT_SIZE, letterbox_tensor};
use crate::types::Frame;

/// Keypoints the palm model reports per detection. 0 is the wrist, 2 the
/// middle finger MCP.
const PALM_KEYPOINTS: usize = 7;
const FEATURES: usize = 4 + PALM_KEYPOINTS * 2;

/// (stride, anchors per cell). Layers sharing a stride are merged.
const ANCHOR_LAYERS: [(u32, usize); 2] = [(8, 2), (16, 6)];

/// Move the crop this far (in box sides) from the palm toward the fingers.
const CROP_SHIFT: f32 = 0.4;
/// Grow the palm box by this factor so the whole hand fits the crop.
const CROP_ENLARGE: f32 = 2.6;

/// Anchor centers in normalized input coordinates, in model output order.
pub fn anchors() -> &'static [(f32, f32)] {
    static ANCHORS: OnceLock<Vec<(f32, f32)>> = OnceLock::new();
    ANCHORS.get_or_init(|| {
        let mut out = Vec::new();
        for (stride, per_cell) in ANCHOR_LAYERS {
            let grid = PALM_INPUT_SIZE / stride;
            for y in 0..grid {
                for x in 0..grid {
                    let center = (
                        (x as f32 + 0.5) / grid as f32,
                        (y as f32 + 0.5) / grid as f32,
                    );
                    out.extend(std::iter::repeat_n(center, per_cell));
                }
            }
        }
        out
    })
}

#[derive(Clone, Debug, PartialEq)]
pub struct PalmRegion {
    /// x1, y1, x2, y2 in frame pixels.
    pub bbox: [f32; 4],
    pub keypoints: Vec<(f32, f32)>,
    pub score: f32,
}

impl PalmRegion {
    /// Rotated square around the whole hand: (center, side, angle).
    pub fn hand_crop(&self) -> ((f32, f32), f32, f32) {
        let [x1, y1, x2, y2] = self.bbox;
        let box_side = (x2 - x1).max(y2 - y1).max(1.0);
        let center = ((x1 + x2) * 0.5, (y1 + y2) * 0.5);

        let (dir, angle) = match (self.keypoints.first(), self.keypoints.get(2)) {
            (Some(wrist), Some(mcp)) => {
                let (vx, vy) = (mcp.0 - wrist.0, mcp.1 - wrist.1);
                let len = vx.hypot(vy);
                if len > f32::EPSILON {
                    ((vx / len, vy / len), vy.atan2(vx) + FRAC_PI_2)
                } else {
                    ((0.0, -1.0), 0.0)
                }
            }
            _ => ((0.0, -1.0), 0.0),
        };

        let shift = CROP_SHIFT * box_side;
        (
            (center.0 + dir.0 * shift, center.1 + dir.1 * shift),
            box_side * CROP_ENLARGE,
            angle,
        )
    }
}

#[derive(Clone, Debug)]
pub struct PalmSettings {
    pub score_threshold: f32,
    pub nms_threshold: f32,
    pub max_palms: usize,
}

pub struct PalmDetector {
    session: Session,
    settings: PalmSettings,
}

impl PalmDetector {
    pub fn new(model_path: &Path, settings: PalmSettings) -> Result<Self> {
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(2)?
            .commit_from_file(model_path)
            .with_context(|| {
                format!("failed to load palm detector from {}", model_path.display())
            })?;
        Ok(Self { session, settings })
    }

    /// Palms in descending score order, at most `max_palms`.
    pub fn detect(&mut self, frame: &Frame) -> Result<Vec<PalmRegion>> {
        let (input, letterbox) = letterbox_tensor(frame, PALM_INPUT_SIZE)?;
        let outputs = self
            .session
            .run(ort::inputs![Tensor::from_array(input)?])
            .context("failed to run palm detector")?;
        if outputs.len() < 2 {
            return Err(anyhow!(
                "palm detector returned {} outputs, expected 2",
                outputs.len()
            ));
        }

        let boxes = outputs[0].try_extract_array::<f32>()?;
        let scores = outputs[1].try_extract_array::<f32>()?;
        let boxes: Vec<f32> = boxes.iter().copied().collect();
        let scores: Vec<f32> = scores.iter().copied().collect();

        decode_palms(&boxes, &scores, &letterbox, &self.settings)
    }
}

/// Turns raw `[anchors, 18]` regressors and `[anchors]` logits into palms.
pub fn decode_palms(
    boxes: &[f32],
    scores: &[f32],
    letterbox: &Letterbox,
    settings: &PalmSettings,
) -> Result<Vec<PalmRegion>> {
    let anchors = anchors();
    if scores.len() < anchors.len() || boxes.len() < anchors.len() * FEATURES {
        return Err(anyhow!(
            "palm outputs too short: {} scores, {} box values for {} anchors",
            scores.len(),
            boxes.len(),
            anchors.len()
        ));
    }

    let input = PALM_INPUT_SIZE as f32;
    let max_x = letterbox.frame_w.saturating_sub(1) as f32;
    let max_y = letterbox.frame_h.saturating_sub(1) as f32;
    let to_frame = |anchor: (f32, f32), dx: f32, dy: f32| {
        letterbox.unproject(anchor.0 + dx / input, anchor.1 + dy / input, PALM_INPUT_SIZE)
    };

    let mut candidates = Vec::new();
    for (i, &anchor) in anchors.iter().enumerate() {
        let score = sigmoid(scores[i]);
        if score < settings.score_threshold {
            continue;
        }
        let raw = &boxes[i * FEATURES..(i + 1) * FEATURES];
        let (half_w, half_h) = (raw[2] * 0.5, raw[3] * 0.5);
        let (x1, y1) = to_frame(anchor, raw[0] - half_w, raw[1] - half_h);
        let (x2, y2) = to_frame(anchor, raw[0] + half_w, raw[1] + half_h);
        if x2 <= x1 || y2 <= y1 {
            continue;
        }

        let keypoints = raw[4..]
            .chunks_exact(2)
            .map(|kp| to_frame(anchor, kp[0], kp[1]))
            .collect();
        candidates.push(PalmRegion {
            bbox: [
                x1.clamp(0.0, max_x),
                y1.clamp(0.0, max_y),
                x2.clamp(0.0, max_x),
                y2.clamp(0.0, max_y),
            ],
            keypoints,
            score,
        });
    }

    Ok(non_max_suppression(
        candidates,
        settings.nms_threshold,
        settings.max_palms,
    ))
}

/// Greedy NMS: keeps the best-scoring box of every overlapping cluster.
pub fn non_max_suppression(
    mut candidates: Vec<PalmRegion>,
    iou_threshold: f32,
    limit: usize,
) -> Vec<PalmRegion> {
    candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    let mut kept: Vec<PalmRegion> = Vec::new();
    for candidate in candidates {
        if kept.len() >= limit {
            break;
        }
        if kept
            .iter()
            .all(|k| iou(&k.bbox, &candidate.bbox) < iou_threshold)
        {
            kept.push(candidate);
        }
    }
    kept
}

fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
    let area = |r: &[f32; 4]| (r[2] - r[0]).max(0.0) * (r[3] - r[1]).max(0.0);
    let inter = area(&[a[0].max(b[0]), a[1].max(b[1]), a[2].min(b[2]), a[3].min(b[3])]);
    let union = area(a) + area(b) - inter;
    if inter <= 0.0 || union <= 0.0 {
        0.0
    } else {
        inter / union
    }
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}
