//! Metallic / roughness / occlusion channel packing.
//!
//! glTF reads occlusion from red, roughness from green and metallic from
//! blue of one texture. Graph-side these are three independent inputs, each
//! a constant or a channel of some image. [`plan`] decides whether an
//! existing image can be referenced as is; [`synthesize`] builds a new one
//! when the sources are scattered.

use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageFormat, Rgb, RgbImage, Rgba32FImage};

use crate::mtlx::NodeId;
use crate::util::Result;

/// Packed channel order.
pub const OCCLUSION_CHANNEL: usize = 0;
pub const ROUGHNESS_CHANNEL: usize = 1;
pub const METALLIC_CHANNEL: usize = 2;

/// One of the three packed quantities.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelSource {
    /// Image node feeding the input.
    pub node: Option<NodeId>,
    /// File as referenced by the document.
    pub uri: Option<String>,
    /// File found on disk.
    pub path: Option<PathBuf>,
    /// Channel read from the image.
    pub channel: usize,
    /// Constant value, or the multiplier applied to image texels.
    pub factor: f32,
}

impl ChannelSource {
    /// Uniform value with no image behind it.
    pub fn constant(factor: f32) -> Self {
        Self { node: None, uri: None, path: None, channel: 0, factor }
    }

    /// Channel of an image file.
    pub fn image(
        node: NodeId,
        uri: &str,
        path: Option<PathBuf>,
        channel: usize,
        factor: f32,
    ) -> Self {
        Self {
            node: Some(node),
            uri: Some(uri.to_string()),
            path,
            channel,
            factor,
        }
    }

    pub fn has_image(&self) -> bool {
        self.uri.is_some()
    }

    /// Identity of the underlying image: resolved path when found, else the uri.
    fn image_key(&self) -> Option<&Path> {
        self.path.as_deref().or_else(|| self.uri.as_deref().map(Path::new))
    }

    fn same_image(&self, other: &ChannelSource) -> bool {
        matches!((self.image_key(), other.image_key()), (Some(a), Some(b)) if a == b)
    }
}

/// How the three quantities land in glTF.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackPlan {
    /// No images; factors only.
    Constants,
    /// Metallic and roughness are constants; occlusion has its own image.
    OcclusionOnly,
    /// One image already holds all three in glTF channel order.
    SharedAll,
    /// One image holds metallic and roughness; occlusion is separate or absent.
    SharedMetalRough,
    /// Sources are scattered; a new image must be built.
    Synthesize,
}

/// Pick a packing strategy.
pub fn plan(
    metallic: &ChannelSource,
    roughness: &ChannelSource,
    occlusion: &ChannelSource,
) -> PackPlan {
    if !metallic.has_image() && !roughness.has_image() {
        return if occlusion.has_image() {
            PackPlan::OcclusionOnly
        } else {
            PackPlan::Constants
        };
    }
    if !metallic.same_image(roughness) {
        return PackPlan::Synthesize;
    }
    if occlusion.same_image(metallic) {
        PackPlan::SharedAll
    } else {
        PackPlan::SharedMetalRough
    }
}

/// Whether a shared image already reads in glTF channel order.
///
/// Sharing is decided on image identity alone; a non-standard layout is
/// referenced as is and only worth a warning.
pub fn standard_layout(
    metallic: &ChannelSource,
    roughness: &ChannelSource,
    occlusion: &ChannelSource,
) -> bool {
    let occlusion_ok = !occlusion.same_image(metallic) || occlusion.channel == OCCLUSION_CHANNEL;
    metallic.channel == METALLIC_CHANNEL && roughness.channel == ROUGHNESS_CHANNEL && occlusion_ok
}

/// File name for a synthesized image: `<stem>_combined.png` next to the
/// first image source, or inside `output_dir`.
pub fn combined_path(sources: &[&ChannelSource], output_dir: Option<&Path>) -> Option<PathBuf> {
    let first = sources.iter().find_map(|s| s.path.as_deref().or(s.uri.as_deref().map(Path::new)))?;
    let stem = first.file_stem()?.to_string_lossy();
    let name = format!("{stem}_combined.png");
    Some(match output_dir {
        Some(dir) => dir.join(name),
        None => first.with_file_name(name),
    })
}

struct Loaded<'a> {
    source: &'a ChannelSource,
    pixels: Option<Rgba32FImage>,
}

impl Loaded<'_> {
    fn sample(&self, x: u32, y: u32, width: u32, height: u32) -> f32 {
        match &self.pixels {
            Some(pixels) => {
                let sx = (x as u64 * pixels.width() as u64 / width as u64) as u32;
                let sy = (y as u64 * pixels.height() as u64 / height as u64) as u32;
                let (sx, sy) = (sx.min(pixels.width() - 1), sy.min(pixels.height() - 1));
                let texel = pixels.get_pixel(sx, sy);
                texel.0[self.source.channel.min(3)] * self.source.factor
            }
            None => self.source.factor,
        }
    }
}

/// Write an RGB image with occlusion, roughness and metallic in R, G and B.
///
/// Output size is the largest width and height among the loaded sources;
/// smaller sources are scaled nearest-neighbor. Returns `Ok(None)` when none
/// of the sources has a readable image file.
pub fn synthesize(
    occlusion: &ChannelSource,
    roughness: &ChannelSource,
    metallic: &ChannelSource,
    output: &Path,
) -> Result<Option<(u32, u32)>> {
    let mut loaded = Vec::with_capacity(3);
    for source in [occlusion, roughness, metallic] {
        let pixels = match &source.path {
            Some(path) => Some(image::open(path)?.to_rgba32f()),
            None => None,
        };
        loaded.push(Loaded { source, pixels });
    }

    let (width, height) = loaded
        .iter()
        .filter_map(|l| l.pixels.as_ref())
        .fold((0, 0), |(w, h), p| (w.max(p.width()), h.max(p.height())));
    if width == 0 || height == 0 {
        return Ok(None);
    }

    let to_byte = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
    let packed = RgbImage::from_fn(width, height, |x, y| {
        Rgb([
            to_byte(loaded[0].sample(x, y, width, height)),
            to_byte(loaded[1].sample(x, y, width, height)),
            to_byte(loaded[2].sample(x, y, width, height)),
        ])
    });

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    DynamicImage::ImageRgb8(packed).save_with_format(output, ImageFormat::Png)?;
    tracing::debug!(path = %output.display(), width, height, "wrote packed image");
    Ok(Some((width, height)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_png(path: &Path, width: u32, height: u32, color: [u8; 3]) {
        RgbImage::from_pixel(width, height, Rgb(color)).save(path).unwrap();
    }

    fn file(name: &str, channel: usize) -> ChannelSource {
        ChannelSource::image(NodeId(0), name, None, channel, 1.0)
    }

    #[test]
    fn test_plan_cases() {
        let constant = ChannelSource::constant(0.5);
        assert_eq!(plan(&constant, &constant, &constant), PackPlan::Constants);
        assert_eq!(plan(&constant, &constant, &file("ao.png", 0)), PackPlan::OcclusionOnly);

        let metal = file("orm.png", 2);
        let rough = file("orm.png", 1);
        assert_eq!(plan(&metal, &rough, &file("orm.png", 0)), PackPlan::SharedAll);
        assert_eq!(plan(&metal, &rough, &file("ao.png", 0)), PackPlan::SharedMetalRough);
        assert_eq!(plan(&metal, &rough, &constant), PackPlan::SharedMetalRough);

        assert_eq!(plan(&file("m.png", 0), &file("r.png", 0), &constant), PackPlan::Synthesize);
        assert_eq!(plan(&metal, &constant, &constant), PackPlan::Synthesize);
        // Same image decides sharing, whatever the channels.
        let plain = file("A.png", 0);
        assert_eq!(plan(&plain, &plain, &file("B.png", 0)), PackPlan::SharedMetalRough);
        assert_eq!(plan(&plain, &plain, &plain), PackPlan::SharedAll);
    }

    #[test]
    fn test_standard_layout() {
        let constant = ChannelSource::constant(1.0);
        assert!(standard_layout(&file("orm.png", 2), &file("orm.png", 1), &file("orm.png", 0)));
        assert!(standard_layout(&file("orm.png", 2), &file("orm.png", 1), &constant));
        assert!(!standard_layout(&file("A.png", 0), &file("A.png", 0), &file("B.png", 0)));
        assert!(!standard_layout(&file("orm.png", 2), &file("orm.png", 1), &file("orm.png", 1)));
    }

    #[test]
    fn test_resolved_path_identity() {
        let mut a = file("textures/orm.png", 2);
        let mut b = file("orm.png", 1);
        a.path = Some(PathBuf::from("/assets/textures/orm.png"));
        b.path = Some(PathBuf::from("/assets/textures/orm.png"));
        assert_eq!(plan(&a, &b, &ChannelSource::constant(1.0)), PackPlan::SharedMetalRough);
    }

    #[test]
    fn test_combined_path() {
        let metal = file("textures/metal.png", 0);
        assert_eq!(
            combined_path(&[&ChannelSource::constant(1.0), &metal], None),
            Some(PathBuf::from("textures/metal_combined.png"))
        );
        assert_eq!(
            combined_path(&[&metal], Some(Path::new("out"))),
            Some(PathBuf::from("out/metal_combined.png"))
        );
        assert_eq!(combined_path(&[&ChannelSource::constant(1.0)], None), None);
    }

    #[test]
    fn test_synthesize_channels() {
        let dir = tempfile::tempdir().unwrap();
        let metal_path = dir.path().join("metal.png");
        let rough_path = dir.path().join("rough.png");
        write_png(&metal_path, 4, 4, [255, 0, 0]);
        write_png(&rough_path, 2, 8, [0, 128, 0]);

        let metal = ChannelSource::image(NodeId(0), "metal.png", Some(metal_path), 0, 1.0);
        let rough = ChannelSource::image(NodeId(1), "rough.png", Some(rough_path), 1, 0.5);
        let occlusion = ChannelSource::constant(1.0);
        let output = dir.path().join("metal_combined.png");

        let size = synthesize(&occlusion, &rough, &metal, &output).unwrap();
        assert_eq!(size, Some((4, 8)));

        let packed = image::open(&output).unwrap().to_rgb8();
        assert_eq!(packed.dimensions(), (4, 8));
        let texel = packed.get_pixel(3, 7).0;
        assert_eq!(texel[0], 255);
        assert_eq!(texel[1], 64);
        assert_eq!(texel[2], 255);
    }

    #[test]
    fn test_synthesize_without_images() {
        let dir = tempfile::tempdir().unwrap();
        let mut metal = file("missing.png", 0);
        metal.path = None;
        let output = dir.path().join("x.png");
        let (occlusion, roughness) = (ChannelSource::constant(1.0), ChannelSource::constant(0.5));
        let size = synthesize(&occlusion, &roughness, &metal, &output).unwrap();
        assert_eq!(size, None);
        assert!(!output.exists());
    }
}
