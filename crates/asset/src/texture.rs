//! Texture decoding and the immutable, cache-owned [`Texture`].

use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageBuffer, Pixel, imageops::FilterType};

use crate::error::{AssetError, AssetResult};
use crate::gpu::{GpuDevice, GpuTextureId, SamplerDesc};

/// Pixel layouts accepted for upload, named after their channel count.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelLayout {
    /// 1 channel.
    Luminance,
    /// 3 channels.
    Rgb,
    /// 4 channels.
    Rgba,
}

impl PixelLayout {
    pub fn from_channels(channels: u8) -> Option<Self> {
        match channels {
            1 => Some(Self::Luminance),
            3 => Some(Self::Rgb),
            4 => Some(Self::Rgba),
            _ => None,
        }
    }

    pub fn channels(self) -> u32 {
        match self {
            Self::Luminance => 1,
            Self::Rgb => 3,
            Self::Rgba => 4,
        }
    }
}

/// Decoded 8-bit texture with its full mip chain, ready for upload.
#[derive(Clone, Debug)]
pub struct TextureImage {
    pub width: u32,
    pub height: u32,
    pub layout: PixelLayout,
    /// Level 0 first; each level halves both dimensions (never below 1).
    pub levels: Vec<Vec<u8>>,
}

impl TextureImage {
    /// Decode the image at `path`. Only 1, 3 and 4 channel images are accepted.
    pub fn decode(path: &Path) -> AssetResult<Self> {
        log::debug!("Decoding texture {}", path.display());
        let img = image::open(path).map_err(|source| AssetError::TextureDecode {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_dynamic(img, path)
    }

    pub fn from_dynamic(img: DynamicImage, path: &Path) -> AssetResult<Self> {
        let channels = img.color().channel_count();
        let layout =
            PixelLayout::from_channels(channels).ok_or_else(|| AssetError::UnsupportedChannels {
                path: path.to_path_buf(),
                channels,
            })?;

        let (width, height) = (img.width(), img.height());
        let levels = match layout {
            PixelLayout::Luminance => mip_chain(img.into_luma8()),
            PixelLayout::Rgb => mip_chain(img.into_rgb8()),
            PixelLayout::Rgba => mip_chain(img.into_rgba8()),
        };

        Ok(Self {
            width,
            height,
            layout,
            levels,
        })
    }

    pub fn mip_level_count(&self) -> u32 {
        self.levels.len() as u32
    }

    /// Dimensions of mip `level`.
    pub fn level_size(&self, level: u32) -> (u32, u32) {
        ((self.width >> level).max(1), (self.height >> level).max(1))
    }

    pub fn bytes_per_pixel(&self) -> u32 {
        self.layout.channels()
    }
}

/// Number of levels down to 1x1: `floor(log2(max(w, h))) + 1`.
pub fn mip_level_count(width: u32, height: u32) -> u32 {
    32 - width.max(height).max(1).leading_zeros()
}

fn mip_chain<P>(base: ImageBuffer<P, Vec<u8>>) -> Vec<Vec<u8>>
where
    P: Pixel<Subpixel = u8> + 'static,
{
    let (width, height) = base.dimensions();
    let count = mip_level_count(width, height);
    let mut levels = Vec::with_capacity(count as usize);

    let mut current = base;
    for level in 1..count {
        let w = (width >> level).max(1);
        let h = (height >> level).max(1);
        let next = image::imageops::resize(&current, w, h, FilterType::Triangle);
        levels.push(std::mem::replace(&mut current, next).into_raw());
    }
    levels.push(current.into_raw());
    levels
}

/// Semantic role of a texture; decides its sampler uniform name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TextureRole {
    Diffuse,
    Specular,
    Normal,
    Height,
}

impl TextureRole {
    pub const ALL: [TextureRole; 4] = [
        TextureRole::Diffuse,
        TextureRole::Specular,
        TextureRole::Normal,
        TextureRole::Height,
    ];

    /// Uniform name prefix; the shader sees `<prefix><ordinal>`, ordinal from 1.
    pub fn uniform_prefix(self) -> &'static str {
        match self {
            TextureRole::Diffuse => "texture_diffuse",
            TextureRole::Specular => "texture_specular",
            TextureRole::Normal => "texture_normal",
            TextureRole::Height => "texture_height",
        }
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

/// A texture resident on the GPU. Built once per distinct path and never modified.
#[derive(Debug)]
pub struct Texture {
    path: PathBuf,
    role: TextureRole,
    handle: GpuTextureId,
}

impl Texture {
    /// Decode `path` and upload it with repeat wrapping and trilinear filtering.
    /// Nothing is allocated on the GPU unless decoding succeeds.
    pub fn load(path: &Path, role: TextureRole, gpu: &mut dyn GpuDevice) -> AssetResult<Self> {
        let image = TextureImage::decode(path)?;
        let handle = gpu.upload_texture(&image, SamplerDesc::REPEAT_TRILINEAR)?;
        log::info!(
            "Loaded texture {} ({}x{}, {:?}, {} mips) as {:?}",
            path.display(),
            image.width,
            image.height,
            image.layout,
            image.mip_level_count(),
            role
        );
        Ok(Self {
            path: path.to_path_buf(),
            role,
            handle,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn role(&self) -> TextureRole {
        self.role
    }

    pub fn handle(&self) -> GpuTextureId {
        self.handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::RecordingGpu;
    use image::{GrayImage, ImageBuffer, LumaA, Rgb, RgbImage};

    #[test]
    fn level_counts() {
        assert_eq!(mip_level_count(1, 1), 1);
        assert_eq!(mip_level_count(2, 1), 2);
        assert_eq!(mip_level_count(256, 256), 9);
        assert_eq!(mip_level_count(300, 17), 9);
    }

    #[test]
    fn rgb_image_keeps_three_channels_with_full_chain() {
        let img = RgbImage::from_pixel(8, 4, Rgb([10, 20, 30]));
        let tex = TextureImage::from_dynamic(DynamicImage::ImageRgb8(img), Path::new("x.png"))
            .expect("rgb accepted");
        assert_eq!(tex.layout, PixelLayout::Rgb);
        assert_eq!(tex.mip_level_count(), 4);
        for level in 0..tex.mip_level_count() {
            let (w, h) = tex.level_size(level);
            assert_eq!(tex.levels[level as usize].len(), (w * h * 3) as usize);
        }
        // uniform color survives filtering
        for (got, want) in tex.levels[3].iter().zip([10u8, 20, 30]) {
            assert!(got.abs_diff(want) <= 1, "{got} vs {want}");
        }
    }

    #[test]
    fn grey_alpha_is_rejected_with_channel_count() {
        let img: ImageBuffer<LumaA<u8>, Vec<u8>> = ImageBuffer::from_pixel(2, 2, LumaA([1, 2]));
        let err = TextureImage::from_dynamic(DynamicImage::ImageLumaA8(img), Path::new("ga.png"))
            .unwrap_err();
        assert!(matches!(err, AssetError::UnsupportedChannels { channels: 2, .. }));
    }

    #[test]
    fn two_channel_file_allocates_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grey_alpha.png");
        let img: ImageBuffer<LumaA<u8>, Vec<u8>> = ImageBuffer::from_pixel(4, 4, LumaA([9, 255]));
        img.save(&path).unwrap();

        let mut gpu = RecordingGpu::default();
        let err = Texture::load(&path, TextureRole::Diffuse, &mut gpu).unwrap_err();
        assert!(err.to_string().contains("2 channels"), "{err}");
        assert_eq!(gpu.textures.len(), 0);
    }

    #[test]
    fn missing_file_names_the_path() {
        let mut gpu = RecordingGpu::default();
        let err = Texture::load(Path::new("nowhere/ghost.png"), TextureRole::Specular, &mut gpu)
            .unwrap_err();
        assert!(matches!(err, AssetError::TextureDecode { .. }));
        assert!(err.to_string().contains("nowhere/ghost.png"));
        assert!(gpu.textures.is_empty());
    }

    #[test]
    fn luminance_file_uploads_with_repeat_sampler() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mask.png");
        GrayImage::from_pixel(16, 16, image::Luma([128])).save(&path).unwrap();

        let mut gpu = RecordingGpu::default();
        let tex = Texture::load(&path, TextureRole::Height, &mut gpu).unwrap();
        assert_eq!(tex.role(), TextureRole::Height);
        assert_eq!(tex.path(), path.as_path());

        let (image, sampler) = &gpu.textures[tex.handle().0 as usize];
        assert_eq!(image.layout, PixelLayout::Luminance);
        assert_eq!(image.mip_level_count(), 5);
        assert_eq!(*sampler, SamplerDesc::REPEAT_TRILINEAR);
    }

    #[test]
    fn uniform_prefixes() {
        let names: Vec<_> = TextureRole::ALL.iter().map(|r| r.uniform_prefix()).collect();
        assert_eq!(
            names,
            ["texture_diffuse", "texture_specular", "texture_normal", "texture_height"]
        );
    }
}
