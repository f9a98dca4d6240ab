//! End-to-end tests for the signing pipeline, run against a scratch
//! database and artifact store.

use axum::extract::{Path, State};
use axum::Json;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use lopdf::{dictionary, Document, Object};
use ordersign_api::error::ApiError;
use ordersign_api::handlers;
use ordersign_api::models::*;
use ordersign_api::orders;
use ordersign_api::state::{AppState, Config};
use std::sync::Arc;

async fn test_state_in(scratch: &std::path::Path) -> Arc<AppState> {
    std::fs::create_dir_all(scratch).unwrap();
    let config = Config {
        port: 0,
        database_url: format!("sqlite:{}/orders.db?mode=rwc", scratch.display()),
        storage_dir: scratch.join("storage"),
        public_base_url: "http://localhost:3001".to_string(),
    };
    Arc::new(AppState::new(&config).await.unwrap())
}

fn scratch_dir() -> std::path::PathBuf {
    std::env::temp_dir()
        .join("ordersign-flow-tests")
        .join(uuid::Uuid::new_v4().to_string())
}

async fn test_state() -> Arc<AppState> {
    test_state_in(&scratch_dir()).await
}

fn base_pdf() -> Vec<u8> {
    let mut doc = Document::with_version("1.7");
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
    });
    let pages_id = doc.add_object(dictionary! {
        "Type" => "Pages",
        "Kids" => vec![Object::Reference(page_id)],
        "Count" => 1,
    });
    if let Ok(page) = doc.get_object_mut(page_id) {
        if let Ok(dict) = page.as_dict_mut() {
            dict.set("Parent", Object::Reference(pages_id));
        }
    }
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => Object::Reference(pages_id),
    });
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).unwrap();
    buffer
}

/// Draw a few strokes on a pad and export, exactly as the client would.
fn drawn_signature() -> String {
    let mut pad = signature_pad::SignaturePad::new(400, 200);
    pad.begin_stroke(40.0, 90.0);
    pad.line_to(160.0, 120.0);
    pad.line_to(240.0, 70.0);
    pad.end_stroke();
    let png = pad.export_png().unwrap();
    format!("data:image/png;base64,{}", BASE64.encode(png))
}

async fn create_profile(state: &Arc<AppState>, role: UserRole, email: &str) -> Profile {
    let req = CreateProfileRequest {
        email: email.to_string(),
        full_name: format!("Test {role}"),
        role,
        department: "finance".to_string(),
    };
    let (_, Json(profile)) = handlers::create_profile(State(state.clone()), Json(req))
        .await
        .unwrap();
    profile
}

async fn submit_order(state: &Arc<AppState>, submitter_id: &str) -> Order {
    let req = CreateOrderRequest {
        title: "Budget Q1".to_string(),
        description: "Quarterly budget approval".to_string(),
        department: "finance".to_string(),
        notes: None,
        submitted_by: submitter_id.to_string(),
        document_name: "budget-q1.pdf".to_string(),
        document_base64: BASE64.encode(base_pdf()),
    };
    let (_, Json(order)) = handlers::create_order(State(state.clone()), Json(req))
        .await
        .unwrap();
    order
}

async fn sign(
    state: &Arc<AppState>,
    order_id: &str,
    signer_id: &str,
    payload: String,
) -> Result<Order, ApiError> {
    let req = SignOrderRequest {
        signer_id: signer_id.to_string(),
        signature_data: payload,
    };
    handlers::sign_order(State(state.clone()), Path(order_id.to_string()), Json(req))
        .await
        .map(|Json(order)| order)
}

#[tokio::test]
async fn submitted_order_starts_pending() {
    let state = test_state().await;
    let staff = create_profile(&state, UserRole::Staff, "staff@example.com").await;
    let order = submit_order(&state, &staff.id).await;

    assert_eq!(order.status, OrderStatus::Pending);
    assert!(order.signatures.is_empty());
    assert_eq!(order.title, "Budget Q1");
    let pdf_url = order.pdf_url.expect("submission uploads a document");
    assert!(state.store.fetch(&pdf_url).unwrap().starts_with(b"%PDF-"));
}

#[tokio::test]
async fn director_then_secretary_approve_the_order() {
    let state = test_state().await;
    let staff = create_profile(&state, UserRole::Staff, "staff@example.com").await;
    let director = create_profile(&state, UserRole::Director, "director@example.com").await;
    let secretary = create_profile(&state, UserRole::Secretary, "secretary@example.com").await;
    let responsible =
        create_profile(&state, UserRole::Responsible, "responsible@example.com").await;

    let order = submit_order(&state, &staff.id).await;
    let original_url = order.pdf_url.clone().unwrap();

    let order = sign(&state, &order.id, &director.id, drawn_signature())
        .await
        .unwrap();
    assert_eq!(order.status, OrderStatus::Processing);
    assert_eq!(order.signatures.len(), 1);
    let after_first = order.pdf_url.clone().unwrap();
    assert_ne!(after_first, original_url);

    // The signed revision is a real PDF carrying the director's caption.
    let stamped = state.store.fetch(&after_first).unwrap();
    assert!(lopdf::Document::load_mem(&stamped).is_ok());
    let caption = format!("{} (director)", director.full_name);
    assert!(stamped
        .windows(caption.len())
        .any(|window| window == caption.as_bytes()));

    let order = sign(&state, &order.id, &secretary.id, drawn_signature())
        .await
        .unwrap();
    assert_eq!(order.status, OrderStatus::Approved);
    assert_eq!(order.signatures.len(), 2);
    assert_ne!(order.pdf_url.clone().unwrap(), after_first);

    // Approved orders accept no further signatures, from any role.
    let err = sign(&state, &order.id, &responsible.id, drawn_signature())
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::OrderClosed));
}

#[tokio::test]
async fn a_signer_may_only_sign_once() {
    let state = test_state().await;
    let staff = create_profile(&state, UserRole::Staff, "staff@example.com").await;
    let director = create_profile(&state, UserRole::Director, "director@example.com").await;
    let order = submit_order(&state, &staff.id).await;

    sign(&state, &order.id, &director.id, drawn_signature())
        .await
        .unwrap();
    let err = sign(&state, &order.id, &director.id, drawn_signature())
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::DuplicateSignature));

    // The first record is untouched.
    let order = orders::find_order(&state.db, &order.id).await.unwrap();
    assert_eq!(order.signatures.len(), 1);
}

#[tokio::test]
async fn role_policy_is_enforced() {
    let state = test_state().await;
    let staff = create_profile(&state, UserRole::Staff, "staff@example.com").await;
    let director = create_profile(&state, UserRole::Director, "director@example.com").await;
    let order = submit_order(&state, &staff.id).await;

    // Staff cannot sign.
    let err = sign(&state, &order.id, &staff.id, drawn_signature())
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Forbidden));

    // Approvers cannot submit.
    let req = CreateOrderRequest {
        title: "Side order".to_string(),
        description: "Should not exist".to_string(),
        department: "finance".to_string(),
        notes: None,
        submitted_by: director.id.clone(),
        document_name: "side.pdf".to_string(),
        document_base64: BASE64.encode(base_pdf()),
    };
    let err = handlers::create_order(State(state.clone()), Json(req))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Forbidden));
}

#[tokio::test]
async fn blank_signatures_are_rejected_without_side_effects() {
    let state = test_state().await;
    let staff = create_profile(&state, UserRole::Staff, "staff@example.com").await;
    let director = create_profile(&state, UserRole::Director, "director@example.com").await;
    let order = submit_order(&state, &staff.id).await;

    let blank = {
        let img = image::RgbaImage::new(64, 32);
        let mut out = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(
                &mut std::io::Cursor::new(&mut out),
                image::ImageFormat::Png,
            )
            .unwrap();
        format!("data:image/png;base64,{}", BASE64.encode(out))
    };

    let err = sign(&state, &order.id, &director.id, blank).await.unwrap_err();
    assert!(matches!(err, ApiError::EmptySignature));

    let order = orders::find_order(&state.db, &order.id).await.unwrap();
    assert!(order.signatures.is_empty());
    assert_eq!(order.status, OrderStatus::Pending);
}

#[tokio::test]
async fn signing_without_a_document_fails() {
    let state = test_state().await;
    let staff = create_profile(&state, UserRole::Staff, "staff@example.com").await;
    let director = create_profile(&state, UserRole::Director, "director@example.com").await;

    // An order whose upload never happened: no PDF URL on record.
    let req = CreateOrderRequest {
        title: "No document".to_string(),
        description: "".to_string(),
        department: "finance".to_string(),
        notes: None,
        submitted_by: staff.id.clone(),
        document_name: "missing.pdf".to_string(),
        document_base64: String::new(),
    };
    orders::create_order(&state.db, "order-no-doc", &req, "orders/0-missing.pdf", None)
        .await
        .unwrap();

    let err = sign(&state, "order-no-doc", &director.id, drawn_signature())
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::MissingDocument));
}

#[tokio::test]
async fn failed_upload_leaves_the_signature_recorded() {
    let scratch = scratch_dir();
    let state = test_state_in(&scratch).await;
    let staff = create_profile(&state, UserRole::Staff, "staff@example.com").await;
    let director = create_profile(&state, UserRole::Director, "director@example.com").await;
    let order = submit_order(&state, &staff.id).await;
    let original_url = order.pdf_url.clone().unwrap();

    // A plain file where the store needs the `signatures/` directory makes
    // the upload step fail while the earlier fetch still succeeds.
    std::fs::write(scratch.join("storage").join("signatures"), b"in the way").unwrap();

    let err = sign(&state, &order.id, &director.id, drawn_signature())
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::TransientIo(_)), "got {err:?}");

    // The documented inconsistency window: the signature record exists,
    // the order's PDF pointer does not move, and nothing crashed.
    let order = orders::find_order(&state.db, &order.id).await.unwrap();
    assert_eq!(order.signatures.len(), 1);
    assert_eq!(order.pdf_url.as_deref(), Some(original_url.as_str()));
    assert_eq!(order.status, OrderStatus::Processing);
}

#[tokio::test]
async fn rejected_orders_accept_no_signatures() {
    let state = test_state().await;
    let staff = create_profile(&state, UserRole::Staff, "staff@example.com").await;
    let director = create_profile(&state, UserRole::Director, "director@example.com").await;
    let order = submit_order(&state, &staff.id).await;

    let Json(order) = handlers::reject_order(State(state.clone()), Path(order.id.clone()))
        .await
        .unwrap();
    assert_eq!(order.status, OrderStatus::Rejected);

    let err = sign(&state, &order.id, &director.id, drawn_signature())
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::OrderClosed));
}

#[tokio::test]
async fn deleting_an_order_removes_records_and_artifacts() {
    let state = test_state().await;
    let staff = create_profile(&state, UserRole::Staff, "staff@example.com").await;
    let director = create_profile(&state, UserRole::Director, "director@example.com").await;
    let order = submit_order(&state, &staff.id).await;
    let order = sign(&state, &order.id, &director.id, drawn_signature())
        .await
        .unwrap();
    let document_key = order.document_path.clone();
    let signed_key = state
        .store
        .key_for_url(order.pdf_url.as_deref().unwrap())
        .unwrap();

    let status = handlers::delete_order(State(state.clone()), Path(order.id.clone()))
        .await
        .unwrap();
    assert_eq!(status, axum::http::StatusCode::NO_CONTENT);

    assert!(orders::load_orders(&state.db).await.unwrap().is_empty());
    assert!(matches!(
        state.store.read(&document_key),
        Err(ApiError::ArtifactNotFound(_))
    ));
    assert!(matches!(
        state.store.read(&signed_key),
        Err(ApiError::ArtifactNotFound(_))
    ));
}

#[tokio::test]
async fn orders_list_newest_first_with_signatures_attached() {
    let state = test_state().await;
    let staff = create_profile(&state, UserRole::Staff, "staff@example.com").await;
    let director = create_profile(&state, UserRole::Director, "director@example.com").await;

    let first = submit_order(&state, &staff.id).await;
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let second = submit_order(&state, &staff.id).await;
    sign(&state, &first.id, &director.id, drawn_signature())
        .await
        .unwrap();

    let listed = orders::load_orders(&state.db).await.unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].id, second.id);
    assert_eq!(listed[1].id, first.id);
    assert_eq!(listed[1].signatures.len(), 1);
    assert_eq!(listed[1].signatures[0].user_id, director.id);
}
