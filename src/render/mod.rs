mod canvas;

pub use canvas::PixelCanvas;

use crate::{
    assets::{Puppet, Sprite, StageAssets},
    config::Rgb,
    scene::Scene,
    types::HandPose,
};

/// Hands beyond this many are ignored.
pub const MAX_PUPPETS: usize = 2;

/// Offset added after negating the hand angle so an upright hand draws an
/// upright puppet.
const ROTATION_OFFSET_DEG: f32 = -90.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }
}

/// 2D drawing primitives. Angles are degrees, positive turns clockwise on
/// screen (y grows downward).
pub trait Surface {
    fn width(&self) -> f32;
    fn height(&self) -> f32;
    fn fill(&mut self, color: Rgb);
    fn draw_image(&mut self, sprite: &Sprite, dest: Rect);
    fn save(&mut self);
    fn restore(&mut self);
    fn translate(&mut self, x: f32, y: f32);
    fn rotate(&mut self, degrees: f32);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mouth {
    Open,
    Closed,
}

impl Mouth {
    /// Open when the middle fingertip sits above the thumb tip on screen.
    pub fn for_hand(hand: &HandPose) -> Self {
        if hand.middle_finger_tip().y < hand.thumb_tip().y {
            Mouth::Open
        } else {
            Mouth::Closed
        }
    }
}

/// Angle in degrees of the wrist -> middle-finger MCP vector, in video space.
pub fn hand_angle(hand: &HandPose) -> f32 {
    let wrist = hand.wrist();
    let mcp = hand.middle_finger_mcp();
    (mcp.y - wrist.y).atan2(mcp.x - wrist.x).to_degrees()
}

/// Where and how one puppet is drawn this frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PuppetPlacement {
    pub anchor: (f32, f32),
    pub rotation_deg: f32,
    pub mouth: Mouth,
}

impl PuppetPlacement {
    /// The video is mirrored, so x is flipped across the canvas width and
    /// the angle is negated.
    pub fn for_hand(hand: &HandPose, canvas_width: f32) -> Self {
        // Anchored at the wrist, not the middle-finger knuckle.
        let wrist = hand.wrist();
        Self {
            anchor: (canvas_width - wrist.x, wrist.y),
            rotation_deg: -hand_angle(hand) + ROTATION_OFFSET_DEG,
            mouth: Mouth::for_hand(hand),
        }
    }
}

fn draw_puppet(surface: &mut impl Surface, puppet: &Puppet, placement: &PuppetPlacement) {
    let sprite = match placement.mouth {
        Mouth::Open => &puppet.open,
        Mouth::Closed => &puppet.closed,
    };
    let (x, y, w, h) = puppet.rect;

    surface.save();
    surface.translate(placement.anchor.0, placement.anchor.1);
    surface.rotate(placement.rotation_deg);
    surface.draw_image(sprite, Rect::new(x, y, w, h));
    surface.restore();
}

/// Draws one frame of the show and returns how many puppets were drawn.
pub fn render_stage(
    surface: &mut impl Surface,
    scene: Scene,
    accent: Rgb,
    hands: &[HandPose],
    assets: &StageAssets,
) -> usize {
    let full = Rect::new(0.0, 0.0, surface.width(), surface.height());

    surface.fill(scene.backdrop_fill(accent));
    surface.draw_image(assets.background(scene), full);

    let mut drawn = 0;
    for (hand, puppet) in hands.iter().zip(assets.puppets()).take(MAX_PUPPETS) {
        let placement = PuppetPlacement::for_hand(hand, full.w);
        draw_puppet(surface, puppet, &placement);
        drawn += 1;
    }

    if let Some(foreground) = assets.foreground(scene) {
        surface.draw_image(foreground, full);
    }
    drawn
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::DEFAULT_ACCENT, scene::CAVE_FILL, types::hand_with};

    #[derive(Clone, Debug, PartialEq)]
    enum Op {
        Fill(Rgb),
        Image(&'static str, Rect),
        Save,
        Restore,
        Translate(f32, f32),
        Rotate(f32),
    }

    struct RecordingSurface {
        width: f32,
        height: f32,
        ops: Vec<Op>,
    }

    impl RecordingSurface {
        fn new() -> Self {
            Self {
                width: 640.0,
                height: 480.0,
                ops: Vec::new(),
            }
        }

        fn images(&self) -> Vec<&'static str> {
            self.ops
                .iter()
                .filter_map(|op| match op {
                    Op::Image(name, _) => Some(*name),
                    _ => None,
                })
                .collect()
        }

        fn rotations(&self) -> Vec<f32> {
            self.ops
                .iter()
                .filter_map(|op| match op {
                    Op::Rotate(deg) => Some(*deg),
                    _ => None,
                })
                .collect()
        }
    }

    impl Surface for RecordingSurface {
        fn width(&self) -> f32 {
            self.width
        }
        fn height(&self) -> f32 {
            self.height
        }
        fn fill(&mut self, color: Rgb) {
            self.ops.push(Op::Fill(color));
        }
        fn draw_image(&mut self, sprite: &Sprite, dest: Rect) {
            self.ops.push(Op::Image(sprite.name(), dest));
        }
        fn save(&mut self) {
            self.ops.push(Op::Save);
        }
        fn restore(&mut self) {
            self.ops.push(Op::Restore);
        }
        fn translate(&mut self, x: f32, y: f32) {
            self.ops.push(Op::Translate(x, y));
        }
        fn rotate(&mut self, degrees: f32) {
            self.ops.push(Op::Rotate(degrees));
        }
    }

    fn open_hand() -> HandPose {
        hand_with((100.0, 200.0), (100.0, 150.0), (100.0, 60.0), (80.0, 140.0))
    }

    fn closed_hand() -> HandPose {
        hand_with((300.0, 200.0), (350.0, 200.0), (380.0, 210.0), (360.0, 190.0))
    }

    #[test]
    fn upright_hand_points_at_minus_ninety_and_draws_unrotated() {
        let hand = open_hand();
        assert!((hand_angle(&hand) + 90.0).abs() < 1e-4);
        let placement = PuppetPlacement::for_hand(&hand, 640.0);
        assert!(placement.rotation_deg.abs() < 1e-4);
        assert_eq!(placement.anchor, (540.0, 200.0));
    }

    #[test]
    fn mouth_opens_only_when_fingertip_above_thumb() {
        assert_eq!(Mouth::for_hand(&open_hand()), Mouth::Open);
        assert_eq!(Mouth::for_hand(&closed_hand()), Mouth::Closed);
        let level = hand_with((0.0, 0.0), (0.0, -10.0), (5.0, 50.0), (9.0, 50.0));
        assert_eq!(Mouth::for_hand(&level), Mouth::Closed);
    }

    #[test]
    fn zero_hands_draws_only_scenery() {
        let assets = StageAssets::solid();
        let mut surface = RecordingSurface::new();
        let drawn = render_stage(&mut surface, Scene::Hole, DEFAULT_ACCENT, &[], &assets);
        assert_eq!(drawn, 0);
        assert_eq!(surface.ops[0], Op::Fill(CAVE_FILL));
        assert_eq!(surface.images(), ["hole.png", "holeLight.png"]);
        assert!(surface.rotations().is_empty());
    }

    #[test]
    fn open_fields_have_accent_fill_and_no_foreground() {
        let assets = StageAssets::solid();
        let mut surface = RecordingSurface::new();
        render_stage(&mut surface, Scene::FieldsNoHole, Rgb(1, 2, 3), &[], &assets);
        assert_eq!(
            surface.ops,
            vec![
                Op::Fill(Rgb(1, 2, 3)),
                Op::Image("fieldNoHole.png", Rect::new(0.0, 0.0, 640.0, 480.0)),
            ]
        );
    }

    #[test]
    fn two_hands_get_their_own_puppet_and_angle() {
        let assets = StageAssets::solid();
        let mut surface = RecordingSurface::new();
        let hands = [open_hand(), closed_hand()];
        let drawn = render_stage(
            &mut surface,
            Scene::FieldWithHole,
            DEFAULT_ACCENT,
            &hands,
            &assets,
        );

        assert_eq!(drawn, 2);
        assert_eq!(
            surface.images(),
            ["fieldWithHole.png", "girlMouthOpen.png", "help.png", "grassHole.png"]
        );
        let rotations = surface.rotations();
        assert!(rotations[0].abs() < 1e-4);
        // Pointing right in video space: angle 0, so -90 after the offset.
        assert!((rotations[1] + 90.0).abs() < 1e-4);
        assert!(surface.ops.contains(&Op::Translate(340.0, 200.0)));
        assert!(surface.ops.contains(&Op::Image(
            "help.png",
            Rect::new(-30.0, -50.0, 150.0, 200.0)
        )));
    }

    #[test]
    fn mouth_is_chosen_per_slot() {
        let assets = StageAssets::solid();
        let mut surface = RecordingSurface::new();
        let hands = [closed_hand(), open_hand()];
        render_stage(&mut surface, Scene::Hole, DEFAULT_ACCENT, &hands, &assets);
        assert_eq!(
            surface.images(),
            ["hole.png", "girl.png", "helpMouthOpen.png", "holeLight.png"]
        );
    }

    #[test]
    fn hands_beyond_two_are_ignored() {
        let assets = StageAssets::solid();
        let mut surface = RecordingSurface::new();
        let hands = [open_hand(), open_hand(), open_hand()];
        let drawn = render_stage(&mut surface, Scene::HoleRope, DEFAULT_ACCENT, &hands, &assets);
        assert_eq!(drawn, 2);
        assert_eq!(surface.rotations().len(), 2);
        let saves = surface.ops.iter().filter(|op| **op == Op::Save).count();
        let restores = surface.ops.iter().filter(|op| **op == Op::Restore).count();
        assert_eq!((saves, restores), (2, 2));
    }
}
