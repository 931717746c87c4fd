// src/services/signature_image.rs
//
// Assinaturas chegam como data URL (PNG/JPEG em base64), geradas pelo canvas
// de desenho livre do navegador.

use std::io::Cursor;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{io::Reader as ImageReader, DynamicImage, GenericImageView, Rgb, RgbImage};

use crate::common::error::AppError;

// Limite do data URL inteiro
pub const MAX_CAPTURE_LEN: usize = 2 * 1024 * 1024;

// Dimensões máximas declaradas no cabeçalho, conferidas antes de decodificar os pixels
pub const MAX_CAPTURE_WIDTH: u32 = 4000;
pub const MAX_CAPTURE_HEIGHT: u32 = 2000;

const ACCEPTED_PREFIXES: [&str; 3] = [
    "data:image/png;base64,",
    "data:image/jpeg;base64,",
    "data:image/jpg;base64,",
];

// Abaixo disso o pixel é "quase branco" e não conta como traço
const INK_LUMA_THRESHOLD: u8 = 240;

pub fn decode_data_url(data_url: &str) -> Result<DynamicImage, AppError> {
    if data_url.len() > MAX_CAPTURE_LEN {
        return Err(AppError::InvalidCapture("imagem muito grande".into()));
    }
    let payload = ACCEPTED_PREFIXES
        .iter()
        .find_map(|prefix| data_url.strip_prefix(prefix))
        .ok_or_else(|| AppError::InvalidCapture("formato de data URL não suportado".into()))?;

    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|e| AppError::InvalidCapture(e.to_string()))?;

    let (width, height) = ImageReader::new(Cursor::new(&bytes))
        .with_guessed_format()
        .map_err(|e| AppError::InvalidCapture(e.to_string()))?
        .into_dimensions()
        .map_err(|e| AppError::InvalidCapture(e.to_string()))?;
    if width > MAX_CAPTURE_WIDTH || height > MAX_CAPTURE_HEIGHT {
        return Err(AppError::InvalidCapture(format!(
            "dimensões {width}x{height} acima do limite {MAX_CAPTURE_WIDTH}x{MAX_CAPTURE_HEIGHT}"
        )));
    }

    image::load_from_memory(&bytes).map_err(|e| AppError::InvalidCapture(e.to_string()))
}

/// Verdadeiro se existe ao menos um pixel visível e escuro o bastante.
pub fn has_ink(image: &DynamicImage) -> bool {
    image.pixels().any(|(_, _, pixel)| {
        let [r, g, b, a] = pixel.0;
        if a == 0 {
            return false;
        }
        let luma = (u32::from(r) * 299 + u32::from(g) * 587 + u32::from(b) * 114) / 1000;
        luma < u32::from(INK_LUMA_THRESHOLD)
    })
}

/// Valida uma captura: precisa decodificar e não pode estar em branco.
pub fn validate_capture(data_url: &str) -> Result<(), AppError> {
    let image = decode_data_url(data_url)?;
    if !has_ink(&image) {
        return Err(AppError::EmptyCapture);
    }
    Ok(())
}

/// Compõe a imagem sobre fundo branco, removendo o canal alfa (o PDF não o suporta).
pub fn flatten_on_white(image: &DynamicImage) -> DynamicImage {
    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();
    let mut out = RgbImage::new(width, height);
    for (x, y, pixel) in rgba.enumerate_pixels() {
        let [r, g, b, a] = pixel.0;
        let alpha = u32::from(a);
        let blend = |c: u8| ((u32::from(c) * alpha + 255 * (255 - alpha)) / 255) as u8;
        out.put_pixel(x, y, Rgb([blend(r), blend(g), blend(b)]));
    }
    DynamicImage::ImageRgb8(out)
}
