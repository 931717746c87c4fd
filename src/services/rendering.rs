// src/services/rendering.rs
//
// Reconstrução do documento final: conteúdo original + assinaturas sobrepostas
// nas coordenadas dos campos + trilha de auditoria.

use uuid::Uuid;

use crate::models::{
    contract::{Contract, ContractContent, ContractStatus, FieldType},
    rendering::{AuditEntry, FieldOverlay, OverlayState, RenderedContract},
};

/// Identificador exibido na trilha: início do id do contrato + ordem do signatário.
pub fn signature_id(contract_id: Uuid, signatory_index: usize) -> String {
    let hex = contract_id.simple().to_string().to_uppercase();
    format!("{}-{:02}", &hex[..12], signatory_index + 1)
}

pub fn render(contract: &Contract) -> RenderedContract {
    let overlays = contract
        .placed_fields
        .iter()
        .enumerate()
        .map(|(field_index, field)| {
            let signatory = contract.signatories.get(field.signatory_index);
            let overlay = match signatory {
                Some(s) if s.signed => field
                    .captured_image
                    .as_ref()
                    .or(s.signature_data_url.as_ref())
                    .map_or(OverlayState::Pending, |image| OverlayState::Signed {
                        image: image.clone(),
                    }),
                _ => OverlayState::Pending,
            };
            FieldOverlay {
                field_index,
                signatory_index: field.signatory_index,
                signatory_name: signatory.map(|s| s.name.clone()).unwrap_or_default(),
                field_type: field.field_type,
                x: field.x,
                y: field.y,
                overlay,
            }
        })
        .collect();

    let audit_trail = (contract.status == ContractStatus::Assinado).then(|| {
        contract
            .signatories
            .iter()
            .enumerate()
            .filter_map(|(index, s)| {
                let signed_at = s.signed_at.filter(|_| s.signed)?;
                Some(AuditEntry {
                    signatory_index: index,
                    name: s.name.clone(),
                    cpf: s.cpf.clone(),
                    signed_at,
                    signature_id: signature_id(contract.id, index),
                })
            })
            .collect()
    });

    RenderedContract {
        contract_id: contract.id,
        title: contract.title.clone(),
        client_name: contract.client_name.clone(),
        status: contract.status,
        is_pdf: contract.is_pdf,
        contract_content: contract.contract_content.clone(),
        overlays,
        audit_trail,
    }
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Página HTML autocontida. O conteúdo HTML do contrato vem do autor e é
/// inserido como está; os demais textos são escapados.
pub fn render_html(rendered: &RenderedContract) -> String {
    let content = if rendered.is_pdf {
        ContractContent::Pdf(&rendered.contract_content)
    } else {
        ContractContent::Html(&rendered.contract_content)
    };
    let body = match content {
        ContractContent::Html(html) => html.to_string(),
        ContractContent::Pdf(url) => format!(
            r#"<embed src="{}" type="application/pdf" style="width:100%;height:100%;min-height:1100px">"#,
            escape_html(url)
        ),
    };

    let mut overlays = String::new();
    for o in &rendered.overlays {
        let style = format!(
            "position:absolute;left:{}%;top:{}%;transform:translate(-50%,-50%)",
            o.x, o.y
        );
        match &o.overlay {
            OverlayState::Signed { image } => overlays.push_str(&format!(
                r#"<img class="field signed {kind}" style="{style};max-width:180px" src="{src}" alt="{alt}">"#,
                kind = field_class(o.field_type),
                src = escape_html(image),
                alt = escape_html(&o.signatory_name),
            )),
            OverlayState::Pending => overlays.push_str(&format!(
                r#"<div class="field pending {kind}" style="{style}">{label} pendente: {name}</div>"#,
                kind = field_class(o.field_type),
                label = o.field_type.label(),
                name = escape_html(&o.signatory_name),
            )),
        }
    }

    let mut audit = String::new();
    if let Some(entries) = &rendered.audit_trail {
        audit.push_str(r#"<section class="audit-trail"><h2>Trilha de auditoria</h2><table>"#);
        audit.push_str("<tr><th>Signatário</th><th>Documento</th><th>Assinado em</th><th>Identificador</th></tr>");
        for e in entries {
            audit.push_str(&format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
                escape_html(&e.name),
                escape_html(&e.cpf),
                e.signed_at.format("%d/%m/%Y %H:%M:%S UTC"),
                e.signature_id
            ));
        }
        audit.push_str("</table></section>");
    }

    format!(
        r#"<!DOCTYPE html>
<html lang="pt-BR">
<head><meta charset="utf-8"><title>{title}</title>
<style>
.document{{position:relative;max-width:900px;margin:0 auto}}
.field.pending{{border:1px dashed #c77;padding:4px 8px;font:12px sans-serif;color:#a33;background:#fff8f8}}
.audit-trail{{max-width:900px;margin:32px auto;font:13px sans-serif}}
.audit-trail td,.audit-trail th{{border:1px solid #ccc;padding:4px 8px}}
</style></head>
<body>
<h1>{title}</h1>
<div class="document">{body}{overlays}</div>
{audit}
</body>
</html>"#,
        title = escape_html(&rendered.title),
    )
}

fn field_class(field_type: FieldType) -> &'static str {
    match field_type {
        FieldType::Signature => "signature",
        FieldType::Cpf => "cpf",
        FieldType::Rubric => "rubric",
    }
}
