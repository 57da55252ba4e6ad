use std::rc::Rc;

use image::DynamicImage;
use tracing::{debug, info};

use crate::config::AssetSettings;
use crate::error::{ResourceError, TransformError};
use crate::model::{Asset, ModelData, ModelNode, ResourceKind};
use crate::resources::{Resource, Resources};

/// Name given to primitives that draw with the shared baked lighting material.
pub const BAKED_MATERIAL: &str = "baked";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorSpace {
    Linear,
    Srgb,
}

/// The single unlit material that carries the pre-baked lighting texture.
#[derive(Debug, Clone)]
pub struct BakeMaterial {
    pub texture: DynamicImage,
    /// glTF UVs already have their origin at the top left.
    pub flip_y: bool,
    pub color_space: ColorSpace,
}

impl BakeMaterial {
    pub fn new(texture: DynamicImage) -> Self {
        Self {
            texture,
            flip_y: false,
            color_space: ColorSpace::Linear,
        }
    }
}

/// The apartment model after post-load assembly.
#[derive(Debug, Clone)]
pub struct Apartment {
    pub model: ModelData,
    pub bake: BakeMaterial,
    pub baked_primitives: usize,
    pub removed_nodes: usize,
}

impl Apartment {
    /// Strip the named nodes and point every primitive whose material is in
    /// `baked_materials` at the shared bake material.
    pub fn assemble(
        mut model: ModelData,
        bake_texture: DynamicImage,
        baked_materials: &[String],
        removed_nodes: &[String],
    ) -> Self {
        let removed = model.retain_nodes(&|node: &ModelNode| !removed_nodes.iter().any(|name| *name == node.name));

        let mut baked = 0;
        model.traverse_mut(&mut |node| {
            let Some(mesh) = node.mesh.as_mut() else {
                return;
            };
            for primitive in &mut mesh.primitives {
                let matches = primitive
                    .material
                    .as_deref()
                    .is_some_and(|name| baked_materials.iter().any(|m| m == name));
                if matches {
                    primitive.material = Some(BAKED_MATERIAL.to_string());
                    baked += 1;
                }
            }
        });

        debug!(removed, baked, "apartment assembled");
        Self {
            model,
            bake: BakeMaterial::new(bake_texture),
            baked_primitives: baked,
            removed_nodes: removed,
        }
    }
}

/// Cube-map background built from an equirectangular image.
#[derive(Debug, Clone, PartialEq)]
pub struct Environment {
    /// Edge length of each cube face; the source image height.
    pub face_size: u32,
    pub color_space: ColorSpace,
    /// Average colour of the source, used as the clear colour.
    pub mean_color: [f32; 3],
}

impl Environment {
    pub fn from_equirect(image: &DynamicImage) -> Self {
        let rgb = image.to_rgb8();
        let mut sum = [0u64; 3];
        for pixel in rgb.pixels() {
            for (acc, channel) in sum.iter_mut().zip(pixel.0) {
                *acc += channel as u64;
            }
        }
        let count = (rgb.width() as u64 * rgb.height() as u64).max(1) as f32;
        Self {
            face_size: image.height(),
            color_space: ColorSpace::Srgb,
            mean_color: sum.map(|acc| acc as f32 / count / 255.0),
        }
    }

    pub fn from_asset(location: &str, asset: &Asset) -> Result<Self, ResourceError> {
        let image = asset.as_texture().ok_or_else(|| ResourceError::KindMismatch {
            location: location.to_string(),
            expected: ResourceKind::Texture,
            found: asset.kind(),
        })?;
        Ok(Self::from_equirect(image))
    }
}

/// Everything the renderer draws, available once loading finished.
#[derive(Debug, Clone)]
pub struct Scene {
    pub apartment: Rc<Apartment>,
    pub environment: Environment,
}

/// Handles for the scene's resources, declared before loading starts.
#[derive(Debug, Clone)]
pub struct SceneResources {
    pub bake: Resource<Asset>,
    pub background: Resource<Asset>,
    pub apartment: Resource<Apartment>,
}

impl SceneResources {
    /// Register the bake texture, background and apartment model. The
    /// apartment transform reads the bake texture, so it is declared first.
    pub fn declare(resources: &mut Resources, assets: &AssetSettings) -> Result<Self, ResourceError> {
        let bake = resources.add(&assets.bake_texture)?;
        let background = resources.add(&assets.background)?;

        let bake_handle = bake.clone();
        let baked_materials = assets.baked_materials.clone();
        let removed_nodes = assets.removed_nodes.clone();
        let apartment = resources.add_with(&assets.model, move |asset| {
            let model = asset.into_model()?;
            let texture = bake_handle.get()?;
            let image = texture.as_texture().ok_or(TransformError::KindMismatch {
                expected: ResourceKind::Texture,
                found: texture.kind(),
            })?;
            Ok(Apartment::assemble(model, image.clone(), &baked_materials, &removed_nodes))
        })?;

        Ok(Self {
            bake,
            background,
            apartment,
        })
    }

    /// Build the scene. Only valid after a successful `load_all`.
    pub fn assemble(&self) -> Result<Scene, ResourceError> {
        let apartment = self.apartment.get()?;
        let background = self.background.get()?;
        let environment = Environment::from_asset(self.background.location(), &background)?;

        info!(
            meshes = apartment.model.mesh_count(),
            baked = apartment.baked_primitives,
            background = environment.face_size,
            "scene ready"
        );
        Ok(Scene { apartment, environment })
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use futures::executor::block_on;
    use image::{ImageFormat, Rgb, RgbImage};

    use super::*;
    use crate::model::asset::tests::{leaf, MINIMAL_GLTF};
    use crate::resources::StaticFetcher;

    fn png_bytes(width: u32, height: u32, color: [u8; 3]) -> Vec<u8> {
        let image = RgbImage::from_pixel(width, height, Rgb(color));
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(image)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn assemble_bakes_listed_materials_and_drops_nodes() {
        let mut room = leaf("Room", Some("Floor"));
        room.children = vec![leaf("Chair", Some("Leather")), leaf("Vase", Some("Glass"))];
        let model = ModelData {
            nodes: vec![room, leaf("sunblock", Some("Walls")), leaf("Empty", None)],
        };
        let texture = DynamicImage::new_rgb8(4, 4);

        let apartment = Apartment::assemble(
            model,
            texture,
            &names(&["Floor", "Leather", "Walls"]),
            &names(&["sunblock"]),
        );

        assert_eq!(apartment.removed_nodes, 1);
        assert_eq!(apartment.baked_primitives, 2);
        assert!(apartment.model.find("sunblock").is_none());

        let material = |name: &str| -> Option<String> {
            let node: &ModelNode = apartment.model.find(name).unwrap();
            node.mesh.as_ref().unwrap().primitives[0].material.clone()
        };
        assert_eq!(material("Room").as_deref(), Some(BAKED_MATERIAL));
        assert_eq!(material("Chair").as_deref(), Some(BAKED_MATERIAL));
        assert_eq!(material("Vase").as_deref(), Some("Glass"));

        assert!(!apartment.bake.flip_y);
        assert_eq!(apartment.bake.color_space, ColorSpace::Linear);
    }

    #[test]
    fn environment_face_size_is_image_height() {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 4, Rgb([255, 0, 0])));
        let env = Environment::from_equirect(&image);
        assert_eq!(env.face_size, 4);
        assert_eq!(env.color_space, ColorSpace::Srgb);
        assert_eq!(env.mean_color, [1.0, 0.0, 0.0]);
    }

    #[test]
    fn environment_from_model_asset_is_a_kind_mismatch() {
        let asset = Asset::Model(ModelData { nodes: Vec::new() });
        let err = Environment::from_asset("sky.glb", &asset).unwrap_err();
        assert!(matches!(
            err,
            ResourceError::KindMismatch { expected: ResourceKind::Texture, found: ResourceKind::Model, .. }
        ));
    }

    #[test]
    fn declared_scene_loads_and_assembles() {
        let assets = AssetSettings {
            model: "apartment.gltf".to_string(),
            bake_texture: "bake.png".to_string(),
            background: "sky.png".to_string(),
            ..AssetSettings::default()
        };
        let fetcher = StaticFetcher::new()
            .with("apartment.gltf", MINIMAL_GLTF.as_bytes().to_vec())
            .with("bake.png", png_bytes(2, 2, [10, 10, 10]))
            .with("sky.png", png_bytes(16, 8, [0, 0, 255]));

        let mut resources = Resources::new();
        let handles = SceneResources::declare(&mut resources, &assets).unwrap();
        assert!(handles.assemble().is_err());

        block_on(resources.load_all(&fetcher)).unwrap();
        let scene = handles.assemble().unwrap();

        assert!(scene.apartment.model.find("sunblock").is_none());
        assert!(scene.apartment.model.find("Lamp").is_some());
        assert_eq!(scene.apartment.bake.texture.width(), 2);
        assert_eq!(scene.environment.face_size, 8);
        assert_eq!(scene.environment.mean_color, [0.0, 0.0, 1.0]);
    }

    #[test]
    fn missing_model_fails_the_batch_by_name() {
        let fetcher = StaticFetcher::new()
            .with("bake.jpg", png_bytes(2, 2, [0, 0, 0]))
            .with("background.jpg", png_bytes(2, 1, [0, 0, 0]));
        let mut resources = Resources::new();
        let handles = SceneResources::declare(&mut resources, &AssetSettings::default()).unwrap();

        let err = block_on(resources.load_all(&fetcher)).unwrap_err();
        assert_eq!(err.location(), "apartment.glb");
        assert!(handles.apartment.get().is_err());
    }
}
