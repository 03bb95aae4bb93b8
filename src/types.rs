use std::time::Instant;

#[derive(Clone, Debug)]
pub struct Frame {
    pub rgba: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub timestamp: Instant,
}

pub const NUM_LANDMARKS: usize = 21;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

impl From<(f32, f32)> for Point {
    fn from((x, y): (f32, f32)) -> Self {
        Self::new(x, y)
    }
}

/// Hand keypoints in MediaPipe order. Only the ones the show reads are named.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Landmark {
    Wrist = 0,
    ThumbTip = 4,
    MiddleFingerMcp = 9,
    MiddleFingerTip = 12,
}

/// One detected hand in video pixel coordinates. Fresh every detection cycle;
/// index order between batches carries no identity.
#[derive(Clone, Debug, PartialEq)]
pub struct HandPose {
    landmarks: [Point; NUM_LANDMARKS],
    pub score: f32,
}

impl HandPose {
    pub fn new(landmarks: [Point; NUM_LANDMARKS], score: f32) -> Self {
        Self { landmarks, score }
    }

    /// Builds a pose from projected model output. Returns `None` when fewer
    /// than 21 points are supplied.
    pub fn from_points(points: &[(f32, f32)], score: f32) -> Option<Self> {
        if points.len() < NUM_LANDMARKS {
            return None;
        }
        let mut landmarks = [Point::default(); NUM_LANDMARKS];
        for (slot, &point) in landmarks.iter_mut().zip(points) {
            *slot = point.into();
        }
        Some(Self::new(landmarks, score))
    }

    pub fn landmark(&self, which: Landmark) -> Point {
        self.landmarks[which as usize]
    }

    pub fn wrist(&self) -> Point {
        self.landmark(Landmark::Wrist)
    }

    pub fn thumb_tip(&self) -> Point {
        self.landmark(Landmark::ThumbTip)
    }

    pub fn middle_finger_mcp(&self) -> Point {
        self.landmark(Landmark::MiddleFingerMcp)
    }

    pub fn middle_finger_tip(&self) -> Point {
        self.landmark(Landmark::MiddleFingerTip)
    }
}

#[cfg(test)]
pub(crate) fn hand_with(
    wrist: (f32, f32),
    middle_mcp: (f32, f32),
    middle_tip: (f32, f32),
    thumb_tip: (f32, f32),
) -> HandPose {
    let mut landmarks = [Point::from(wrist); NUM_LANDMARKS];
    landmarks[Landmark::MiddleFingerMcp as usize] = middle_mcp.into();
    landmarks[Landmark::MiddleFingerTip as usize] = middle_tip.into();
    landmarks[Landmark::ThumbTip as usize] = thumb_tip.into();
    HandPose::new(landmarks, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_points_needs_full_hand() {
        let short = vec![(1.0, 2.0); 20];
        assert!(HandPose::from_points(&short, 0.9).is_none());
    }

    #[test]
    fn named_landmarks_follow_mediapipe_indices() {
        let points: Vec<(f32, f32)> = (0..21).map(|i| (i as f32, i as f32 * 10.0)).collect();
        let hand = HandPose::from_points(&points, 0.9).unwrap();
        assert_eq!(hand.wrist(), Point::new(0.0, 0.0));
        assert_eq!(hand.thumb_tip(), Point::new(4.0, 40.0));
        assert_eq!(hand.middle_finger_mcp(), Point::new(9.0, 90.0));
        assert_eq!(hand.middle_finger_tip(), Point::new(12.0, 120.0));
    }
}
