use axum::{
    extract::{Multipart, Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::path::Path as FsPath;
use std::sync::Arc;
use uuid::Uuid;

use crate::api::{Accepted, Deleted, PaginationMeta, PaginationParams};
use crate::app::AppState;
use crate::domain::documents::{
    AnalyzeQuery, ChatRequest, ChatResponse, Document, DocumentDetailResponse,
    DocumentListResponse, DocumentStatusResponse, DocumentSummaryResponse, UploadResponse,
};
use crate::error::{ApiError, ApiResult};
use crate::middleware::RequestIdExt;
use crate::pipeline::{AnalysisOutcome, FixOutcome};

/// Fields collected from the upload form.
#[derive(Default)]
struct UploadForm {
    file: Option<(String, Option<String>, Vec<u8>)>,
    title: Option<String>,
    description: Option<String>,
}

async fn read_upload_form(mut multipart: Multipart) -> ApiResult<UploadForm> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid multipart body: {e}")))?
    {
        match field.name() {
            Some("file") => {
                let filename = field.file_name().unwrap_or("document.pdf").to_string();
                let content_type = field.content_type().map(str::to_string);
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Could not read file: {e}")))?;
                form.file = Some((filename, content_type, data.to_vec()));
            }
            Some("title") => {
                form.title = field.text().await.ok().filter(|t| !t.trim().is_empty());
            }
            Some("description") => {
                form.description = field.text().await.ok().filter(|d| !d.trim().is_empty());
            }
            _ => {}
        }
    }

    Ok(form)
}

fn is_pdf(filename: &str, content_type: Option<&str>) -> bool {
    content_type == Some("application/pdf")
        || FsPath::new(filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}

fn title_from_filename(filename: &str) -> String {
    FsPath::new(filename)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .filter(|stem| !stem.is_empty())
        .unwrap_or("Documento")
        .to_string()
}

/// Upload a PDF and schedule its processing
pub async fn upload_document(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    multipart: Multipart,
) -> ApiResult<(StatusCode, Json<UploadResponse>)> {
    let form = read_upload_form(multipart).await?;

    let (filename, content_type, data) = form
        .file
        .ok_or_else(|| ApiError::bad_request("A PDF file is required in the 'file' field"))?;
    if !is_pdf(&filename, content_type.as_deref()) {
        return Err(ApiError::bad_request("Only PDF files are accepted"));
    }
    if data.is_empty() {
        return Err(ApiError::bad_request("The uploaded file is empty"));
    }

    let title = form
        .title
        .map(|t| t.trim().to_string())
        .unwrap_or_else(|| title_from_filename(&filename));
    let file_size = data.len() as i64;

    let (storage_type, storage_ref) = state.storage.put(data, &filename).await?;
    let document = Document::new(
        title,
        form.description,
        filename,
        storage_ref,
        storage_type,
        file_size,
    );

    if let Err(e) = state.store.insert(&document).await {
        if let Err(cleanup) = state
            .storage
            .delete(document.storage_type, &document.storage_ref)
            .await
        {
            tracing::warn!(error = %cleanup, "Could not remove orphaned upload");
        }
        return Err(e.into());
    }

    tracing::info!(
        document_id = %document.id,
        request_id = headers.request_id(),
        storage_type = %document.storage_type,
        file_size,
        "Document uploaded"
    );

    state.processor.schedule(document.id);

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            id: document.id,
            title: document.title,
            status: document.status,
            message: "Documento subido correctamente. El análisis comenzará en segundo plano."
                .to_string(),
            estimated_time: "1-2 minutos".to_string(),
        }),
    ))
}

/// List documents, newest first
pub async fn list_documents(
    State(state): State<Arc<AppState>>,
    Query(pagination): Query<PaginationParams>,
) -> ApiResult<Json<DocumentListResponse>> {
    let (documents, total) = state
        .store
        .list(pagination.offset(), pagination.limit())
        .await?;

    Ok(Json(DocumentListResponse {
        documents: documents.iter().map(DocumentSummaryResponse::from).collect(),
        pagination: PaginationMeta::new(&pagination, total),
    }))
}

pub async fn get_document(
    State(state): State<Arc<AppState>>,
    Path(document_id): Path<Uuid>,
) -> ApiResult<Json<DocumentDetailResponse>> {
    let document = state.store.get(document_id).await?;
    Ok(Json(document.into()))
}

/// Lightweight status for pollers
pub async fn get_document_status(
    State(state): State<Arc<AppState>>,
    Path(document_id): Path<Uuid>,
) -> ApiResult<Json<DocumentStatusResponse>> {
    let document = state.store.get(document_id).await?;
    Ok(Json(DocumentStatusResponse::from(&document)))
}

/// Return the analysis, or 202 while it is still being produced
pub async fn analyze_document(
    State(state): State<Arc<AppState>>,
    Path(document_id): Path<Uuid>,
    Query(query): Query<AnalyzeQuery>,
) -> ApiResult<Response> {
    let force_refresh = query.refresh.unwrap_or(false);

    match state
        .processor
        .get_analysis(document_id, force_refresh)
        .await?
    {
        AnalysisOutcome::Ready(analysis) => Ok(Json(analysis).into_response()),
        AnalysisOutcome::Pending(pending) => Ok(Accepted(pending).into_response()),
    }
}

pub async fn chat_with_document(
    State(state): State<Arc<AppState>>,
    Path(document_id): Path<Uuid>,
    Json(req): Json<ChatRequest>,
) -> ApiResult<Json<ChatResponse>> {
    let message = req.message.trim();
    if message.is_empty() {
        return Err(ApiError::bad_request("Message must not be empty"));
    }

    let response = state.processor.chat(document_id, message).await?;
    Ok(Json(ChatResponse { response }))
}

/// Operator action: rebuild the analysis from scratch
pub async fn fix_analysis(
    State(state): State<Arc<AppState>>,
    Path(document_id): Path<Uuid>,
) -> ApiResult<Response> {
    match state.processor.fix_analysis(document_id).await? {
        FixOutcome::Fixed(fixed) => Ok(Json(fixed).into_response()),
        FixOutcome::Failed(failure) => {
            Ok((StatusCode::UNPROCESSABLE_ENTITY, Json(failure)).into_response())
        }
    }
}

/// Raw PDF bytes from whichever backend holds them
pub async fn view_document(
    State(state): State<Arc<AppState>>,
    Path(document_id): Path<Uuid>,
) -> ApiResult<Response> {
    let document = state.store.get(document_id).await?;
    let data = state
        .storage
        .get(document.storage_type, &document.storage_ref)
        .await?;

    let mut response = ([(header::CONTENT_TYPE, "application/pdf")], data).into_response();
    let disposition = format!(
        "inline; filename=\"{}\"",
        document.filename.replace(['"', '\\'], "_")
    );
    if let Ok(value) = HeaderValue::from_str(&disposition) {
        response
            .headers_mut()
            .insert(header::CONTENT_DISPOSITION, value);
    }

    Ok(response)
}

/// Remove the stored file and the record
pub async fn delete_document(
    State(state): State<Arc<AppState>>,
    Path(document_id): Path<Uuid>,
) -> ApiResult<Deleted> {
    let document = state.store.get(document_id).await?;

    match state
        .storage
        .delete(document.storage_type, &document.storage_ref)
        .await
    {
        Ok(true) => {}
        Ok(false) => tracing::warn!(document_id = %document_id, "Stored file was already gone"),
        Err(e) => tracing::error!(document_id = %document_id, error = %e, "Failed to delete stored file"),
    }

    if !state.store.delete(document_id).await? {
        return Err(ApiError::not_found(format!("Document {document_id} not found")));
    }

    tracing::info!(document_id = %document_id, "Document deleted");
    Ok(Deleted::new(document_id, "Documento eliminado"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pdf_detection() {
        assert!(is_pdf("informe.PDF", None));
        assert!(is_pdf("scan", Some("application/pdf")));
        assert!(!is_pdf("foto.png", Some("image/png")));
    }

    #[test]
    fn test_title_defaults_to_file_stem() {
        assert_eq!(title_from_filename("Inspección marzo.pdf"), "Inspección marzo");
        assert_eq!(title_from_filename(""), "Documento");
    }
}
