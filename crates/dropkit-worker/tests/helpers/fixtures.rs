use dropkit_core::models::Bundle;
use dropkit_processing::pdf::LopdfCodec;
use dropkit_processing::traits::PdfCodec;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::io::{Cursor, Read};

/// A gradient PNG, so encoders have real content to work with.
pub fn create_test_png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    });
    let mut out = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
        .unwrap();
    out
}

/// A one-page PDF containing `text`.
pub fn create_test_pdf(text: &str) -> Vec<u8> {
    LopdfCodec.render_text(text, text).unwrap().to_vec()
}

/// Name and content of every entry, in archive order.
pub fn zip_entries(bundle: &Bundle) -> Vec<(String, Vec<u8>)> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bundle.data.as_ref())).unwrap();
    (0..archive.len())
        .map(|i| {
            let mut file = archive.by_index(i).unwrap();
            let mut content = Vec::new();
            file.read_to_end(&mut content).unwrap();
            (file.name().to_string(), content)
        })
        .collect()
}
