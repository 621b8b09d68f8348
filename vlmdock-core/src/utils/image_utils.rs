use anyhow::{Context, Result};
use candle_core::{DType, Device, Tensor};
use image::{imageops::FilterType, DynamicImage, GenericImageView, RgbImage};

/// Per-channel mean used when the CLIP checkpoints were trained.
pub const CLIP_IMAGE_MEAN: [f32; 3] = [0.481_454_66, 0.457_827_5, 0.408_210_73];
/// Per-channel standard deviation used when the CLIP checkpoints were trained.
pub const CLIP_IMAGE_STD: [f32; 3] = [0.268_629_54, 0.261_302_6, 0.275_777_1];

/// Decodes an encoded image (PNG, JPEG, ...) held in memory and converts it to RGB.
pub fn decode_rgb_image(bytes: &[u8]) -> Result<DynamicImage> {
    let img = image::load_from_memory(bytes).context("Image decoding failed")?;
    Ok(DynamicImage::ImageRgb8(img.to_rgb8()))
}

/// Crops the centered square spanning the shorter side, then scales it to
/// `size × size` with bicubic filtering.
///
/// Same framing as resizing the shorter side first, but the intermediate
/// buffer never exceeds the source square.
pub fn resize_and_center_crop(img: &DynamicImage, size: u32) -> RgbImage {
    let (orig_w, orig_h) = img.dimensions();
    let short = orig_w.min(orig_h).max(1);

    let left = ((orig_w.saturating_sub(short)) as f32 / 2.0).round() as u32;
    let top = ((orig_h.saturating_sub(short)) as f32 / 2.0).round() as u32;
    let square = img.crop_imm(left, top, short, short);

    if short == size {
        square.to_rgb8()
    } else {
        square
            .resize_exact(size, size, FilterType::CatmullRom)
            .to_rgb8()
    }
}

/// Converts an image into the **1×3×size×size** pixel tensor expected by the
/// CLIP vision tower: resize + center crop, scale to [0, 1], then normalize
/// with [`CLIP_IMAGE_MEAN`] / [`CLIP_IMAGE_STD`].
pub fn image_to_clip_tensor(img: &DynamicImage, size: usize, device: &Device) -> Result<Tensor> {
    let rgb = resize_and_center_crop(img, size as u32);
    let raw = rgb.into_raw();

    let tensor = (Tensor::from_vec(raw, (size, size, 3), device)?
        .to_dtype(DType::F32)?
        .permute((2, 0, 1))?
        / 255.0)?;

    let mean = Tensor::new(&CLIP_IMAGE_MEAN, device)?.reshape((3, 1, 1))?;
    let std = Tensor::new(&CLIP_IMAGE_STD, device)?.reshape((3, 1, 1))?;
    let tensor = tensor.broadcast_sub(&mean)?.broadcast_div(&std)?;

    Ok(tensor.unsqueeze(0)?)
}
