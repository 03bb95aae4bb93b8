use std::{
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
};

use image::RgbaImage;
use thiserror::Error;

use crate::scene::Scene;

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("missing image {}", .0.display())]
    Missing(PathBuf),
    #[error("failed to decode image {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

/// A decoded RGBA image shared between frames.
#[derive(Clone)]
pub struct Sprite {
    name: &'static str,
    image: Arc<RgbaImage>,
}

impl Sprite {
    pub fn new(name: &'static str, image: RgbaImage) -> Self {
        Self {
            name,
            image: Arc::new(image),
        }
    }

    pub fn load(dir: &Path, file: &'static str) -> Result<Self, AssetError> {
        let path = dir.join(file);
        if !path.exists() {
            return Err(AssetError::Missing(path));
        }
        let image = image::open(&path)
            .map_err(|source| AssetError::Decode {
                path: path.clone(),
                source,
            })?
            .into_rgba8();
        log::debug!(
            "loaded {} ({}x{})",
            path.display(),
            image.width(),
            image.height()
        );
        Ok(Self::new(file, image))
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn image(&self) -> &Arc<RgbaImage> {
        &self.image
    }
}

impl fmt::Debug for Sprite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sprite")
            .field("name", &self.name)
            .field("size", &self.image.dimensions())
            .finish()
    }
}

impl PartialEq for Sprite {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && Arc::ptr_eq(&self.image, &other.image)
    }
}

/// Character art for one hand slot.
#[derive(Clone, Debug)]
pub struct Puppet {
    pub closed: Sprite,
    pub open: Sprite,
    /// Local draw rect `(x, y, w, h)` relative to the anchor before rotation.
    pub rect: (f32, f32, f32, f32),
}

/// Every image the stage draws, loaded once at startup.
#[derive(Clone, Debug)]
pub struct StageAssets {
    field_no_hole: Sprite,
    field_with_hole: Sprite,
    hole: Sprite,
    grass_hole: Sprite,
    hole_light: Sprite,
    hole_rope_light: Sprite,
    puppets: [Puppet; 2],
}

impl StageAssets {
    pub fn load(dir: &Path) -> Result<Self, AssetError> {
        Ok(Self {
            field_no_hole: Sprite::load(dir, "fieldNoHole.png")?,
            field_with_hole: Sprite::load(dir, "fieldWithHole.png")?,
            hole: Sprite::load(dir, "hole.png")?,
            grass_hole: Sprite::load(dir, "grassHole.png")?,
            hole_light: Sprite::load(dir, "holeLight.png")?,
            hole_rope_light: Sprite::load(dir, "holeRopeLight.png")?,
            puppets: [
                Puppet {
                    closed: Sprite::load(dir, "girl.png")?,
                    open: Sprite::load(dir, "girlMouthOpen.png")?,
                    rect: (-30.0, -50.0, 130.0, 200.0),
                },
                Puppet {
                    closed: Sprite::load(dir, "help.png")?,
                    open: Sprite::load(dir, "helpMouthOpen.png")?,
                    rect: (-30.0, -50.0, 150.0, 200.0),
                },
            ],
        })
    }

    /// Full-canvas image behind the puppets.
    pub fn background(&self, scene: Scene) -> &Sprite {
        match scene {
            Scene::FieldsNoHole => &self.field_no_hole,
            Scene::FieldWithHole => &self.field_with_hole,
            // The rope only shows up in the light overlay.
            Scene::Hole | Scene::HoleRope => &self.hole,
        }
    }

    /// Full-canvas image in front of the puppets.
    pub fn foreground(&self, scene: Scene) -> Option<&Sprite> {
        match scene {
            Scene::FieldsNoHole => None,
            Scene::FieldWithHole => Some(&self.grass_hole),
            Scene::Hole => Some(&self.hole_light),
            Scene::HoleRope => Some(&self.hole_rope_light),
        }
    }

    pub fn puppets(&self) -> &[Puppet; 2] {
        &self.puppets
    }
}

#[cfg(test)]
impl StageAssets {
    /// 2x2 solid-color stand-ins named like the real files.
    pub(crate) fn solid() -> Self {
        let sprite = |name: &'static str, shade: u8| {
            Sprite::new(
                name,
                RgbaImage::from_pixel(2, 2, image::Rgba([shade, shade, shade, 255])),
            )
        };
        Self {
            field_no_hole: sprite("fieldNoHole.png", 10),
            field_with_hole: sprite("fieldWithHole.png", 20),
            hole: sprite("hole.png", 30),
            grass_hole: sprite("grassHole.png", 40),
            hole_light: sprite("holeLight.png", 50),
            hole_rope_light: sprite("holeRopeLight.png", 60),
            puppets: [
                Puppet {
                    closed: sprite("girl.png", 70),
                    open: sprite("girlMouthOpen.png", 80),
                    rect: (-30.0, -50.0, 130.0, 200.0),
                },
                Puppet {
                    closed: sprite("help.png", 90),
                    open: sprite("helpMouthOpen.png", 100),
                    rect: (-30.0, -50.0, 150.0, 200.0),
                },
            ],
        }
    }
}
