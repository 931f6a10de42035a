#![allow(dead_code)]

use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage};
use lopdf::{dictionary, Document, Object, Stream, StringFormat};
use std::path::{Path, PathBuf};

/// Build a PDF with one page per tag. Each page carries its tag in a
/// custom `Tag` entry so tests can identify pages after export.
pub fn sample_pdf(tags: &[&str]) -> Vec<u8> {
    build_pdf(tags, None)
}

/// Like [`sample_pdf`], with a large high-quality JPEG drawn on every page.
pub fn image_pdf(tags: &[&str], width: u32, height: u32) -> Vec<u8> {
    build_pdf(tags, Some(gradient_jpeg(width, height)))
}

pub fn write_pdf(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, bytes).unwrap();
    path
}

pub fn page_tags(doc: &Document) -> Vec<String> {
    doc.get_pages()
        .into_values()
        .map(|id| match doc.get_dictionary(id).unwrap().get(b"Tag") {
            Ok(Object::String(bytes, _)) => String::from_utf8_lossy(bytes).into_owned(),
            _ => String::new(),
        })
        .collect()
}

pub fn page_rotations(doc: &Document) -> Vec<i64> {
    doc.get_pages()
        .into_values()
        .map(|id| {
            doc.get_dictionary(id)
                .unwrap()
                .get(b"Rotate")
                .and_then(Object::as_i64)
                .unwrap_or(0)
        })
        .collect()
}

/// Sizes of all embedded image streams, in object order.
pub fn image_sizes(doc: &Document) -> Vec<(i64, i64, usize)> {
    doc.objects
        .values()
        .filter_map(|object| match object {
            Object::Stream(stream)
                if stream.dict.get(b"Subtype").and_then(Object::as_name).ok() == Some(b"Image".as_slice()) =>
            {
                let width = stream.dict.get(b"Width").and_then(Object::as_i64).unwrap_or(0);
                let height = stream.dict.get(b"Height").and_then(Object::as_i64).unwrap_or(0);
                Some((width, height, stream.content.len()))
            }
            _ => None,
        })
        .collect()
}

fn gradient_jpeg(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x ^ y) % 256) as u8])
    });
    let mut out = Vec::new();
    {
        let mut encoder = JpegEncoder::new_with_quality(&mut out, 98);
        encoder.encode_image(&img).unwrap();
    }
    out
}

fn build_pdf(tags: &[&str], jpeg: Option<Vec<u8>>) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });

    let mut resources = dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    };
    let mut draw_image = "";
    if let Some(data) = jpeg {
        let decoded = image::load_from_memory(&data).unwrap();
        let image_id = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => decoded.width() as i64,
                "Height" => decoded.height() as i64,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
                "Filter" => "DCTDecode",
            },
            data,
        ));
        resources.set("XObject", dictionary! { "Im1" => image_id });
        draw_image = " q 400 0 0 300 72 300 cm /Im1 Do Q";
    }
    let resources_id = doc.add_object(resources);

    let mut kids = Vec::new();
    for tag in tags {
        let content = format!("BT /F1 24 Tf 72 720 Td ({}) Tj ET{}", tag, draw_image);
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Tag" => Object::String(tag.as_bytes().to_vec(), StringFormat::Literal),
        });
        kids.push(Object::Reference(page_id));
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}
