//! Placing a signature raster and caption onto the first page.

use crate::error::StampError;
use flate2::{write::ZlibEncoder, Compression};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use std::io::Write;

/// Fixed stamp size, in PDF user-space points.
pub const STAMP_WIDTH: f64 = 100.0;
pub const STAMP_HEIGHT: f64 = 50.0;

/// The caption sits this far below the stamp anchor.
pub const CAPTION_DROP: f64 = 20.0;
pub const CAPTION_FONT_SIZE: f64 = 10.0;

/// Where and how to stamp one signature.
#[derive(Debug, Clone)]
pub struct StampPlacement {
    /// Anchor from the page's bottom-left origin.
    pub x: f64,
    pub y: f64,
    /// Signer identity drawn below the stamp, e.g. `"Dana Cho (director)"`.
    pub caption: String,
}

/// Stamp a signature image and its caption onto page one of `pdf_bytes`.
///
/// The raster is embedded as an RGB image XObject with its alpha channel as
/// a soft mask, drawn at a fixed 100x50 pt size anchored at `(x, y)`; the
/// caption is drawn at `(x, y - 20)` in Helvetica 10 pt, black. All other
/// content and pages pass through untouched. Deterministic: the same input
/// triple always yields byte-identical output.
pub fn stamp_signature(
    pdf_bytes: &[u8],
    image_bytes: &[u8],
    placement: &StampPlacement,
) -> Result<Vec<u8>, StampError> {
    let mut doc = Document::load_mem(pdf_bytes)
        .map_err(|e| StampError::MalformedDocument(e.to_string()))?;
    let page_id = first_page(&doc)?;

    let raster = image::load_from_memory(image_bytes)
        .map_err(|e| StampError::UnsupportedImage(e.to_string()))?
        .to_rgba8();
    let (img_w, img_h) = raster.dimensions();
    if img_w == 0 || img_h == 0 {
        return Err(StampError::UnsupportedImage("zero-sized image".into()));
    }

    let mut rgb = Vec::with_capacity((img_w * img_h * 3) as usize);
    let mut alpha = Vec::with_capacity((img_w * img_h) as usize);
    for pixel in raster.pixels() {
        rgb.push(pixel[0]);
        rgb.push(pixel[1]);
        rgb.push(pixel[2]);
        alpha.push(pixel[3]);
    }

    let smask_id = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => img_w as i64,
            "Height" => img_h as i64,
            "ColorSpace" => "DeviceGray",
            "BitsPerComponent" => 8,
            "Filter" => "FlateDecode",
        },
        deflate(&alpha)?,
    ));
    let image_id = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => img_w as i64,
            "Height" => img_h as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
            "SMask" => smask_id,
            "Filter" => "FlateDecode",
        },
        deflate(&rgb)?,
    ));
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });

    // Resource names keyed on object numbers stay unique across repeated
    // stampings of the same lineage, so earlier stamps are never clobbered.
    let image_name = format!("Sig{}", image_id.0);
    let font_name = format!("SigF{}", font_id.0);

    register_page_resources(&mut doc, page_id, &image_name, image_id, &font_name, font_id)?;

    let content = stamp_content(placement, &image_name, &font_name)?;
    append_page_content(&mut doc, page_id, content)?;

    let mut out = Vec::new();
    doc.save_to(&mut out)
        .map_err(|e| StampError::Emit(e.to_string()))?;
    Ok(out)
}

fn first_page(doc: &Document) -> Result<ObjectId, StampError> {
    doc.get_pages()
        .get(&1)
        .copied()
        .ok_or_else(|| StampError::MalformedDocument("document has no pages".into()))
}

fn deflate(data: &[u8]) -> Result<Vec<u8>, StampError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .and_then(|_| encoder.finish())
        .map_err(|e| StampError::Emit(e.to_string()))
}

/// Register the stamp image and caption font in the page's `Resources`.
///
/// `Resources` may live inline or behind a reference, and its `XObject` and
/// `Font` subdictionaries may too; referenced dictionaries are cloned and
/// inlined so the edit stays local to this page.
fn register_page_resources(
    doc: &mut Document,
    page_id: ObjectId,
    image_name: &str,
    image_id: ObjectId,
    font_name: &str,
    font_id: ObjectId,
) -> Result<(), StampError> {
    let taken = {
        let page = doc
            .get_object_mut(page_id)
            .and_then(|o| o.as_dict_mut())
            .map_err(|e| StampError::MalformedDocument(e.to_string()))?;
        page.remove(b"Resources")
    };

    let mut resources = match taken {
        Some(Object::Dictionary(dict)) => dict,
        Some(Object::Reference(id)) => doc
            .get_object(id)
            .and_then(|o| o.as_dict())
            .map(|d| d.clone())
            .map_err(|e| StampError::MalformedDocument(e.to_string()))?,
        None => Dictionary::new(),
        Some(_) => {
            return Err(StampError::MalformedDocument(
                "page Resources is not a dictionary".into(),
            ))
        }
    };

    set_resource_entry(doc, &mut resources, "XObject", image_name, image_id)?;
    set_resource_entry(doc, &mut resources, "Font", font_name, font_id)?;

    let page = doc
        .get_object_mut(page_id)
        .and_then(|o| o.as_dict_mut())
        .map_err(|e| StampError::MalformedDocument(e.to_string()))?;
    page.set("Resources", Object::Dictionary(resources));
    Ok(())
}

fn set_resource_entry(
    doc: &Document,
    resources: &mut Dictionary,
    kind: &str,
    name: &str,
    target: ObjectId,
) -> Result<(), StampError> {
    let mut sub = match resources.remove(kind.as_bytes()) {
        Some(Object::Dictionary(dict)) => dict,
        Some(Object::Reference(id)) => doc
            .get_object(id)
            .and_then(|o| o.as_dict())
            .map(|d| d.clone())
            .map_err(|e| StampError::MalformedDocument(e.to_string()))?,
        None => Dictionary::new(),
        Some(_) => {
            return Err(StampError::MalformedDocument(format!(
                "page {kind} resources are not a dictionary"
            )))
        }
    };
    sub.set(name, Object::Reference(target));
    resources.set(kind, Object::Dictionary(sub));
    Ok(())
}

fn stamp_content(
    placement: &StampPlacement,
    image_name: &str,
    font_name: &str,
) -> Result<Vec<u8>, StampError> {
    let operations = vec![
        Operation::new("q", vec![]),
        Operation::new(
            "cm",
            vec![
                Object::Real(STAMP_WIDTH as f32),
                Object::Integer(0),
                Object::Integer(0),
                Object::Real(STAMP_HEIGHT as f32),
                Object::Real(placement.x as f32),
                Object::Real(placement.y as f32),
            ],
        ),
        Operation::new("Do", vec![Object::Name(image_name.as_bytes().to_vec())]),
        Operation::new("Q", vec![]),
        Operation::new("q", vec![]),
        Operation::new(
            "rg",
            vec![Object::Integer(0), Object::Integer(0), Object::Integer(0)],
        ),
        Operation::new("BT", vec![]),
        Operation::new(
            "Tf",
            vec![
                Object::Name(font_name.as_bytes().to_vec()),
                Object::Real(CAPTION_FONT_SIZE as f32),
            ],
        ),
        Operation::new(
            "Td",
            vec![
                Object::Real(placement.x as f32),
                Object::Real((placement.y - CAPTION_DROP) as f32),
            ],
        ),
        Operation::new(
            "Tj",
            vec![Object::string_literal(placement.caption.as_str())],
        ),
        Operation::new("ET", vec![]),
        Operation::new("Q", vec![]),
    ];

    let encoded = Content { operations }
        .encode()
        .map_err(|e| StampError::Emit(e.to_string()))?;
    // Leading newline keeps us safe if the previous content stream ends
    // mid-token.
    let mut data = vec![b'\n'];
    data.extend(encoded);
    Ok(data)
}

/// Append a new content stream to the page, keeping existing streams intact.
fn append_page_content(
    doc: &mut Document,
    page_id: ObjectId,
    content: Vec<u8>,
) -> Result<(), StampError> {
    let stream_id = doc.add_object(Stream::new(Dictionary::new(), content));

    let previous = {
        let page = doc
            .get_object_mut(page_id)
            .and_then(|o| o.as_dict_mut())
            .map_err(|e| StampError::MalformedDocument(e.to_string()))?;
        page.remove(b"Contents")
    };

    let mut contents = match previous {
        Some(Object::Reference(id)) => vec![Object::Reference(id)],
        Some(Object::Array(items)) => items,
        Some(Object::Stream(stream)) => {
            vec![Object::Reference(doc.add_object(Object::Stream(stream)))]
        }
        Some(_) => {
            return Err(StampError::MalformedDocument(
                "page Contents has an unexpected type".into(),
            ))
        }
        None => vec![],
    };
    contents.push(Object::Reference(stream_id));

    let page = doc
        .get_object_mut(page_id)
        .and_then(|o| o.as_dict_mut())
        .map_err(|e| StampError::MalformedDocument(e.to_string()))?;
    page.set("Contents", Object::Array(contents));
    Ok(())
}
