// src/handlers/contracts.rs
//
// Rotas do autor (protegidas pelo author_guard).

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        Html, IntoResponse, Response,
    },
    Json,
};
use futures::{stream, Stream};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::{
    common::error::{ApiError, AppError},
    config::AppState,
    middleware::{auth::AuthenticatedAuthor, i18n::Locale},
    models::{
        contract::{Contract, NewContract, Signatory},
        rendering::RenderedContract,
    },
    services::{
        document_service::export_filename,
        placement::{ActiveTool, PointerEvent, ViewportRect},
        rendering,
        signing::normalize_cpf,
    },
};

// =============================================================================
//  PAYLOADS
// =============================================================================

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateContractPayload {
    #[validate(length(min = 1, message = "O título é obrigatório"))]
    #[schema(example = "Contrato de Prestação de Serviços")]
    pub title: String,

    #[validate(length(min = 1, message = "O nome do cliente é obrigatório"))]
    #[schema(example = "Maria da Silva")]
    pub client_name: String,

    pub client_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DraftPayload {
    // Corpo HTML gerado a partir do modelo escolhido
    #[validate(length(min = 1, message = "O conteúdo do contrato é obrigatório"))]
    #[schema(example = "<h1>Contrato</h1><p>Cláusula primeira...</p>")]
    pub html: String,
}

// CPF (11 dígitos) ou CNPJ (14 dígitos), com ou sem pontuação
fn validate_document(cpf: &str) -> Result<(), ValidationError> {
    let digits = normalize_cpf(cpf);
    if digits.len() == 11 || digits.len() == 14 {
        Ok(())
    } else {
        Err(ValidationError::new("document").with_message("Documento deve ter 11 ou 14 dígitos".into()))
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SignatoryPayload {
    #[validate(length(min = 1, message = "O nome do signatário é obrigatório"))]
    #[schema(example = "Ana Souza")]
    pub name: String,

    #[validate(custom(function = "validate_document"))]
    #[schema(example = "111.111.111-11")]
    pub cpf: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SetSignatoriesPayload {
    #[validate(nested)]
    pub signatories: Vec<SignatoryPayload>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlaceFieldPayload {
    // Ferramenta selecionada no editor; ausente = clique ignorado
    pub tool: Option<ActiveTool>,
    pub pointer: PointerEvent,
    // Geometria do visualizador do documento no momento do clique
    pub viewport: Option<ViewportRect>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SendResponse {
    pub contract: Contract,
    #[schema(example = "http://localhost:3000/assinar/3f2a9c1b-7d40-4e8a-9b1c-0a1b2c3d4e5f")]
    pub signing_link: String,
}

// =============================================================================
//  ÁREA 1: SOLICITAÇÕES E CONSULTAS
// =============================================================================

// POST /api/contracts
#[utoipa::path(
    post,
    path = "/api/contracts",
    tag = "Contratos",
    request_body = CreateContractPayload,
    responses(
        (status = 201, description = "Solicitação criada (status Pendente)", body = Contract),
        (status = 400, description = "Dados inválidos")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_contract(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedAuthor(author): AuthenticatedAuthor,
    Json(payload): Json<CreateContractPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let contract = app_state
        .contract_service
        .create_request(NewContract {
            title: payload.title.trim().to_string(),
            client_name: payload.client_name.trim().to_string(),
            client_id: payload.client_id,
        })
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    tracing::debug!(author = %author.sub, contract_id = %contract.id, "Solicitação aberta pelo autor");
    Ok((StatusCode::CREATED, Json(contract)))
}

// GET /api/contracts
#[utoipa::path(
    get,
    path = "/api/contracts",
    tag = "Contratos",
    responses(
        (status = 200, description = "Lista de contratos (mais recentes primeiro)", body = Vec<Contract>)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_contracts(
    State(app_state): State<AppState>,
    locale: Locale,
) -> Result<impl IntoResponse, ApiError> {
    let contracts = app_state
        .contract_service
        .list()
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(contracts))
}

// GET /api/contracts/{id}
#[utoipa::path(
    get,
    path = "/api/contracts/{id}",
    tag = "Contratos",
    params(("id" = Uuid, Path, description = "ID do contrato")),
    responses(
        (status = 200, description = "Contrato", body = Contract),
        (status = 404, description = "Contrato não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_contract(
    State(app_state): State<AppState>,
    locale: Locale,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let contract = app_state
        .contract_service
        .get(id)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(contract))
}

// GET /api/contracts/events
// Primeiro evento "snapshot" com a lista atual; depois um evento "contract" a cada mudança.
#[utoipa::path(
    get,
    path = "/api/contracts/events",
    tag = "Contratos",
    responses(
        (status = 200, description = "Stream SSE de contratos", body = String, content_type = "text/event-stream")
    ),
    security(("api_jwt" = []))
)]
pub async fn contract_events(
    State(app_state): State<AppState>,
    locale: Locale,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, ApiError> {
    let (snapshot, subscription) = app_state
        .contract_service
        .subscribe()
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    let events = stream::unfold(
        (Some(snapshot), subscription),
        |(snapshot, mut subscription)| async move {
            if let Some(contracts) = snapshot {
                let event = Event::default().event("snapshot").json_data(&contracts);
                return Some((event, (None, subscription)));
            }
            // None = feed encerrado; a inscrição é liberada no drop
            let contract = subscription.next().await?;
            let event = Event::default()
                .event("contract")
                .id(contract.id.to_string())
                .json_data(&contract);
            Some((event, (None, subscription)))
        },
    );

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

// =============================================================================
//  ÁREA 2: ELABORAÇÃO
// =============================================================================

// POST /api/contracts/{id}/draft
#[utoipa::path(
    post,
    path = "/api/contracts/{id}/draft",
    tag = "Contratos",
    params(("id" = Uuid, Path, description = "ID do contrato")),
    request_body = DraftPayload,
    responses(
        (status = 200, description = "Contrato em elaboração", body = Contract),
        (status = 409, description = "Contrato não pode mais ser editado")
    ),
    security(("api_jwt" = []))
)]
pub async fn begin_drafting(
    State(app_state): State<AppState>,
    locale: Locale,
    Path(id): Path<Uuid>,
    Json(payload): Json<DraftPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let contract = app_state
        .contract_service
        .begin_drafting(id, payload.html)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(contract))
}

// POST /api/contracts/{id}/pdf (corpo = bytes do PDF)
#[utoipa::path(
    post,
    path = "/api/contracts/{id}/pdf",
    tag = "Contratos",
    params(("id" = Uuid, Path, description = "ID do contrato")),
    request_body(content = Vec<u8>, content_type = "application/pdf"),
    responses(
        (status = 200, description = "PDF anexado, contrato em elaboração", body = Contract),
        (status = 413, description = "Arquivo maior que o limite"),
        (status = 422, description = "Arquivo não é um PDF")
    ),
    security(("api_jwt" = []))
)]
pub async fn upload_pdf(
    State(app_state): State<AppState>,
    locale: Locale,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let contract = app_state
        .contract_service
        .attach_pdf(id, body.to_vec())
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(contract))
}

// PUT /api/contracts/{id}/signatories
#[utoipa::path(
    put,
    path = "/api/contracts/{id}/signatories",
    tag = "Contratos",
    params(("id" = Uuid, Path, description = "ID do contrato")),
    request_body = SetSignatoriesPayload,
    responses(
        (status = 200, description = "Signatários definidos", body = Contract),
        (status = 400, description = "Dados inválidos"),
        (status = 422, description = "Signatário duplicado ou campo órfão")
    ),
    security(("api_jwt" = []))
)]
pub async fn set_signatories(
    State(app_state): State<AppState>,
    locale: Locale,
    Path(id): Path<Uuid>,
    Json(payload): Json<SetSignatoriesPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let signatories = payload
        .signatories
        .into_iter()
        .map(|s| Signatory::new(s.name, s.cpf))
        .collect();

    let contract = app_state
        .contract_service
        .set_signatories(id, signatories)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(contract))
}

// POST /api/contracts/{id}/fields
#[utoipa::path(
    post,
    path = "/api/contracts/{id}/fields",
    tag = "Contratos",
    params(("id" = Uuid, Path, description = "ID do contrato")),
    request_body = PlaceFieldPayload,
    responses(
        (status = 200, description = "Contrato após o clique (sem ferramenta, inalterado)", body = Contract),
        (status = 422, description = "Posição fora do documento ou visualizador indisponível")
    ),
    security(("api_jwt" = []))
)]
pub async fn place_field(
    State(app_state): State<AppState>,
    locale: Locale,
    Path(id): Path<Uuid>,
    Json(payload): Json<PlaceFieldPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let contract = app_state
        .contract_service
        .place_field(id, payload.tool, payload.pointer, payload.viewport)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(contract))
}

// DELETE /api/contracts/{id}/fields/{index}
#[utoipa::path(
    delete,
    path = "/api/contracts/{id}/fields/{index}",
    tag = "Contratos",
    params(
        ("id" = Uuid, Path, description = "ID do contrato"),
        ("index" = usize, Path, description = "Índice do campo posicionado")
    ),
    responses(
        (status = 200, description = "Campo removido", body = Contract),
        (status = 422, description = "Campo inexistente")
    ),
    security(("api_jwt" = []))
)]
pub async fn remove_field(
    State(app_state): State<AppState>,
    locale: Locale,
    Path((id, index)): Path<(Uuid, usize)>,
) -> Result<impl IntoResponse, ApiError> {
    let contract = app_state
        .contract_service
        .remove_field(id, index)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(contract))
}

// POST /api/contracts/{id}/send
#[utoipa::path(
    post,
    path = "/api/contracts/{id}/send",
    tag = "Contratos",
    params(("id" = Uuid, Path, description = "ID do contrato")),
    responses(
        (status = 200, description = "Contrato aguardando assinatura + link público", body = SendResponse),
        (status = 422, description = "Sem conteúdo, sem signatários ou signatário sem campos")
    ),
    security(("api_jwt" = []))
)]
pub async fn send_for_signature(
    State(app_state): State<AppState>,
    locale: Locale,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let (contract, signing_link) = app_state
        .contract_service
        .send_for_signature(id)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(SendResponse { contract, signing_link }))
}

// =============================================================================
//  ÁREA 3: VISUALIZAÇÃO E EXPORTAÇÃO
// =============================================================================

// GET /api/contracts/{id}/render
#[utoipa::path(
    get,
    path = "/api/contracts/{id}/render",
    tag = "Contratos",
    params(("id" = Uuid, Path, description = "ID do contrato")),
    responses(
        (status = 200, description = "Documento com assinaturas sobrepostas", body = RenderedContract)
    ),
    security(("api_jwt" = []))
)]
pub async fn render_contract(
    State(app_state): State<AppState>,
    locale: Locale,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let rendered = app_state
        .contract_service
        .render(id)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(rendered))
}

// GET /api/contracts/{id}/render.html
#[utoipa::path(
    get,
    path = "/api/contracts/{id}/render.html",
    tag = "Contratos",
    params(("id" = Uuid, Path, description = "ID do contrato")),
    responses(
        (status = 200, description = "Página HTML para impressão", body = String, content_type = "text/html")
    ),
    security(("api_jwt" = []))
)]
pub async fn render_contract_html(
    State(app_state): State<AppState>,
    locale: Locale,
    Path(id): Path<Uuid>,
) -> Result<Html<String>, ApiError> {
    let rendered = app_state
        .contract_service
        .render(id)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Html(rendering::render_html(&rendered)))
}

// GET /api/contracts/{id}/export.pdf
#[utoipa::path(
    get,
    path = "/api/contracts/{id}/export.pdf",
    tag = "Contratos",
    params(("id" = Uuid, Path, description = "ID do contrato")),
    responses(
        (status = 200, description = "PDF exportado", body = Vec<u8>, content_type = "application/pdf")
    ),
    security(("api_jwt" = []))
)]
pub async fn export_contract_pdf(
    State(app_state): State<AppState>,
    locale: Locale,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let rendered = app_state
        .contract_service
        .render(id)
        .await
        .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    let filename = export_filename(&rendered.title);
    let verification_url = app_state.contract_service.signing_link(id);
    let document_service = app_state.document_service.clone();

    // A geração do PDF é CPU; sai do executor assíncrono
    let pdf_bytes = tokio::task::spawn_blocking(move || {
        document_service.export_pdf(&rendered, &verification_url)
    })
    .await
    .map_err(|e| AppError::InternalServerError(e.into()))
    .and_then(|result| result)
    .map_err(|app_err| app_err.to_api_error(&locale, &app_state.i18n_store))?;

    // Configura os Headers para o navegador baixar o PDF
    let headers = [
        (header::CONTENT_TYPE, "application/pdf".to_string()),
        (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{}\"", filename.replace('"', ""))),
    ];

    Ok((headers, pdf_bytes).into_response())
}
