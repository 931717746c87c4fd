// src/docs.rs

use utoipa::OpenApi;
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use crate::handlers;
use crate::models;
use crate::services;

#[derive(OpenApi)]
#[openapi(
    paths(
        // --- Contratos (autor) ---
        handlers::contracts::create_contract,
        handlers::contracts::list_contracts,
        handlers::contracts::get_contract,
        handlers::contracts::contract_events,
        handlers::contracts::begin_drafting,
        handlers::contracts::upload_pdf,
        handlers::contracts::set_signatories,
        handlers::contracts::place_field,
        handlers::contracts::remove_field,
        handlers::contracts::send_for_signature,
        handlers::contracts::render_contract,
        handlers::contracts::render_contract_html,
        handlers::contracts::export_contract_pdf,

        // --- Assinatura (pública) ---
        handlers::signing::verify_signatory,
        handlers::signing::signing_session,
        handlers::signing::sign_contract,
    ),
    components(
        schemas(
            // --- Contratos ---
            models::contract::ContractStatus,
            models::contract::FieldType,
            models::contract::Signatory,
            models::contract::PlacedField,
            models::contract::Contract,

            // --- Editor de campos ---
            services::placement::ActiveTool,
            services::placement::PointerEvent,
            services::placement::ViewportRect,

            // --- Assinatura ---
            models::signing::SigningFieldState,
            models::signing::SigningField,
            models::signing::SigningView,
            models::signing::VerificationResponse,
            models::signing::SigningResult,

            // --- Renderização ---
            models::rendering::OverlayState,
            models::rendering::FieldOverlay,
            models::rendering::AuditEntry,
            models::rendering::RenderedContract,

            // --- Payloads ---
            handlers::contracts::CreateContractPayload,
            handlers::contracts::DraftPayload,
            handlers::contracts::SignatoryPayload,
            handlers::contracts::SetSignatoriesPayload,
            handlers::contracts::PlaceFieldPayload,
            handlers::contracts::SendResponse,
            handlers::signing::VerifyPayload,
            handlers::signing::CapturePayload,
            handlers::signing::SignPayload,
        )
    ),
    tags(
        (name = "Contratos", description = "Elaboração, envio e acompanhamento de contratos"),
        (name = "Assinatura", description = "Verificação e assinatura pelo link público")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "api_jwt",
            SecurityScheme::Http(
                Http::new(HttpAuthScheme::Bearer)
            ),
        );
        // Token curto emitido por /verify
        components.add_security_scheme(
            "signing_jwt",
            SecurityScheme::Http(
                Http::new(HttpAuthScheme::Bearer)
            ),
        );
    }
}
