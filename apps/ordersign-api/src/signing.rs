//! The signing pipeline: one pass from captured raster to refreshed order.

use crate::error::ApiError;
use crate::models::{Order, Profile, SignOrderRequest};
use crate::orders;
use crate::state::AppState;
use crate::storage::UploadOptions;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::Utc;
use order_pdf::StampPlacement;

/// Apply one signature to an order.
///
/// The signature record is persisted before the PDF is touched; any failure
/// after that point leaves the record in place and the order's PDF pointer
/// unchanged. There is no compensation step: the failure is surfaced and the
/// next full reload presents the best-effort truth.
pub async fn apply_signature(
    state: &AppState,
    order_id: &str,
    req: &SignOrderRequest,
) -> Result<Order, ApiError> {
    let order = orders::find_order(&state.db, order_id).await?;
    if order.status.is_final() {
        return Err(ApiError::OrderClosed);
    }

    let signer = orders::find_profile(&state.db, &req.signer_id).await?;
    if !signer.role.may_sign() {
        return Err(ApiError::Forbidden);
    }

    let pdf_url = order.pdf_url.as_deref().ok_or(ApiError::MissingDocument)?;
    let raster = decode_signature_raster(&req.signature_data)?;
    let (x, y) = signer.role.placement();

    orders::insert_signature(&state.db, order_id, &signer.id, &req.signature_data).await?;

    if let Err(err) = restamp_document(state, order_id, pdf_url, &raster, &signer, x, y).await {
        tracing::warn!(
            order_id,
            signer = %signer.id,
            error = %err,
            "signature recorded but the signed PDF was not updated"
        );
        return Err(err);
    }

    tracing::info!(order_id, signer = %signer.id, role = %signer.role, "order signed");
    orders::find_order(&state.db, order_id).await
}

/// Fetch, stamp, upload, repoint: the storage half of the pipeline.
async fn restamp_document(
    state: &AppState,
    order_id: &str,
    pdf_url: &str,
    raster: &[u8],
    signer: &Profile,
    x: f64,
    y: f64,
) -> Result<(), ApiError> {
    let pdf = state.store.fetch(pdf_url)?;
    let placement = StampPlacement {
        x,
        y,
        caption: format!("{} ({})", signer.full_name, signer.role),
    };
    let stamped = order_pdf::stamp_signature(&pdf, raster, &placement)?;

    let key = format!(
        "signatures/{}-{}-signed.pdf",
        Utc::now().timestamp_millis(),
        signer.role
    );
    state.store.upload(&key, &stamped, &UploadOptions::pdf())?;
    orders::update_pdf_url(&state.db, order_id, &state.store.public_url(&key)).await
}

/// Decode a signature payload into PNG bytes.
///
/// Accepts bare base64 or a `data:` URL. A raster with no visible ink (all
/// pixels transparent or near-white) counts as an empty signature.
pub fn decode_signature_raster(payload: &str) -> Result<Vec<u8>, ApiError> {
    let encoded = match payload.split_once(',') {
        Some((prefix, rest)) if prefix.starts_with("data:") => rest,
        _ => payload,
    };
    let bytes = BASE64
        .decode(encoded.trim())
        .map_err(|_| ApiError::UnsupportedImage)?;

    let raster = image::load_from_memory(&bytes)
        .map_err(|_| ApiError::UnsupportedImage)?
        .to_rgba8();
    let blank = raster
        .pixels()
        .all(|p| p[3] == 0 || (p[0] > 0xF0 && p[1] > 0xF0 && p[2] > 0xF0));
    if blank {
        return Err(ApiError::EmptySignature);
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn png_bytes(img: image::RgbaImage) -> Vec<u8> {
        let mut out = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut out), image::ImageFormat::Png)
            .unwrap();
        out
    }

    #[test]
    fn data_url_and_bare_base64_both_decode() {
        let mut img = image::RgbaImage::new(4, 4);
        img.put_pixel(1, 1, image::Rgba([0, 0, 0, 255]));
        let png = png_bytes(img);
        let encoded = BASE64.encode(&png);

        let bare = decode_signature_raster(&encoded).unwrap();
        let url = decode_signature_raster(&format!("data:image/png;base64,{encoded}")).unwrap();
        assert_eq!(bare, png);
        assert_eq!(url, png);
    }

    #[test]
    fn transparent_raster_is_empty() {
        let png = png_bytes(image::RgbaImage::new(8, 8));
        let encoded = BASE64.encode(&png);
        assert!(matches!(
            decode_signature_raster(&encoded),
            Err(ApiError::EmptySignature)
        ));
    }

    #[test]
    fn white_raster_is_empty() {
        let img = image::RgbaImage::from_pixel(8, 8, image::Rgba([255, 255, 255, 255]));
        let encoded = BASE64.encode(&png_bytes(img));
        assert!(matches!(
            decode_signature_raster(&encoded),
            Err(ApiError::EmptySignature)
        ));
    }

    #[test]
    fn non_image_payloads_are_unsupported() {
        let encoded = BASE64.encode(b"not a png");
        assert!(matches!(
            decode_signature_raster(&encoded),
            Err(ApiError::UnsupportedImage)
        ));
        assert!(matches!(
            decode_signature_raster("%%%not-base64%%%"),
            Err(ApiError::UnsupportedImage)
        ));
    }
}
