// src/services/document_service.rs

use std::path::PathBuf;

use genpdf::{elements, style, Element};
use image::Luma;
use qrcode::QrCode;

use crate::{
    common::error::AppError,
    models::rendering::{OverlayState, RenderedContract},
    services::signature_image,
};

// Nome do arquivo exportado: título com espaços trocados por "_"
pub fn export_filename(title: &str) -> String {
    let base = title.trim().replace(' ', "_");
    if base.is_empty() {
        "contrato.pdf".to_string()
    } else {
        format!("{base}.pdf")
    }
}

/// Texto corrido a partir do HTML do contrato: remove as tags e quebra
/// parágrafos nos elementos de bloco.
pub fn html_to_paragraphs(html: &str) -> Vec<String> {
    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut in_tag = false;
    let mut tag = String::new();

    for c in html.chars() {
        match c {
            '<' => {
                in_tag = true;
                tag.clear();
            }
            '>' if in_tag => {
                in_tag = false;
                let name = tag
                    .trim_start_matches('/')
                    .split(|ch: char| ch.is_whitespace() || ch == '/')
                    .next()
                    .unwrap_or("")
                    .to_lowercase();
                if matches!(
                    name.as_str(),
                    "p" | "br" | "div" | "li" | "h1" | "h2" | "h3" | "h4" | "tr"
                ) {
                    flush(&mut current, &mut paragraphs);
                }
            }
            _ if in_tag => tag.push(c),
            _ => current.push(c),
        }
    }
    flush(&mut current, &mut paragraphs);
    paragraphs
}

fn flush(current: &mut String, paragraphs: &mut Vec<String>) {
    let text = decode_entities(&current.split_whitespace().collect::<Vec<_>>().join(" "));
    if !text.is_empty() {
        paragraphs.push(text);
    }
    current.clear();
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

#[derive(Clone)]
pub struct DocumentService {
    fonts_dir: PathBuf,
}

impl DocumentService {
    pub fn new(fonts_dir: impl Into<PathBuf>) -> Self {
        Self {
            fonts_dir: fonts_dir.into(),
        }
    }

    /// Exporta o contrato renderizado em PDF paginado (A4).
    /// `verification_url` vira um QR Code no rodapé da trilha de auditoria.
    pub fn export_pdf(&self, rendered: &RenderedContract, verification_url: &str) -> Result<Vec<u8>, AppError> {
        // 1. Configura o PDF
        // Carrega a fonte da pasta de fontes
        let font_family = genpdf::fonts::from_files(&self.fonts_dir, "Roboto", None).map_err(|_| {
            AppError::FontNotFound(format!("Fonte não encontrada em {}", self.fonts_dir.display()))
        })?;

        let mut doc = genpdf::Document::new(font_family);
        doc.set_title(rendered.title.clone());
        doc.set_paper_size(genpdf::PaperSize::A4);
        let mut decorator = genpdf::SimplePageDecorator::new();
        decorator.set_margins(15);
        doc.set_page_decorator(decorator);

        // --- CABEÇALHO ---
        doc.push(
            elements::Paragraph::new(rendered.title.clone())
                .styled(style::Style::new().bold().with_font_size(18)),
        );
        doc.push(elements::Paragraph::new(format!("Cliente: {}", rendered.client_name)));
        doc.push(elements::Paragraph::new(format!("Status: {}", rendered.status)));
        doc.push(elements::Break::new(1.5));

        // --- CONTEÚDO ---
        if rendered.is_pdf {
            doc.push(elements::Paragraph::new(
                "O conteúdo deste contrato é o documento PDF original, disponível em:",
            ));
            doc.push(
                elements::Paragraph::new(rendered.contract_content.clone())
                    .styled(style::Style::new().italic().with_font_size(9)),
            );
        } else {
            for paragraph in html_to_paragraphs(&rendered.contract_content) {
                doc.push(elements::Paragraph::new(paragraph));
                doc.push(elements::Break::new(0.5));
            }
        }
        doc.push(elements::Break::new(2));

        // --- ASSINATURAS ---
        doc.push(
            elements::Paragraph::new("ASSINATURAS")
                .styled(style::Style::new().bold().with_font_size(12)),
        );
        for overlay in &rendered.overlays {
            let caption = format!(
                "{} - {} (campo {})",
                overlay.signatory_name,
                overlay.field_type.label(),
                overlay.field_index + 1
            );
            match &overlay.overlay {
                OverlayState::Signed { image } => {
                    let decoded = signature_image::decode_data_url(image)?;
                    let flat = signature_image::flatten_on_white(&decoded);
                    let pdf_image = elements::Image::from_dynamic_image(flat)
                        .map_err(|e| AppError::InternalServerError(anyhow::Error::msg(e.to_string())))?
                        .with_scale(genpdf::Scale::new(0.5, 0.5));
                    doc.push(pdf_image);
                    doc.push(elements::Paragraph::new(caption).styled(style::Style::new().with_font_size(9)));
                }
                OverlayState::Pending => {
                    doc.push(
                        elements::Paragraph::new(format!("{caption}: pendente"))
                            .styled(style::Style::new().italic().with_font_size(9)),
                    );
                }
            }
            doc.push(elements::Break::new(1));
        }

        // --- TRILHA DE AUDITORIA ---
        if let Some(entries) = &rendered.audit_trail {
            doc.push(elements::Break::new(1));
            doc.push(
                elements::Paragraph::new("TRILHA DE AUDITORIA")
                    .styled(style::Style::new().bold().with_font_size(12)),
            );

            // Pesos das colunas: Nome (3), Documento (2), Data (2), Identificador (2)
            let mut table = elements::TableLayout::new(vec![3, 2, 2, 2]);
            table.set_cell_decorator(elements::FrameCellDecorator::new(true, true, false));

            let style_bold = style::Style::new().bold();
            table
                .row()
                .element(elements::Paragraph::new("Signatário").styled(style_bold))
                .element(elements::Paragraph::new("Documento").styled(style_bold))
                .element(elements::Paragraph::new("Assinado em").styled(style_bold))
                .element(elements::Paragraph::new("Identificador").styled(style_bold))
                .push()
                .map_err(|e| AppError::InternalServerError(anyhow::Error::msg(e.to_string())))?;

            for entry in entries {
                table
                    .row()
                    .element(elements::Paragraph::new(entry.name.clone()))
                    .element(elements::Paragraph::new(entry.cpf.clone()))
                    .element(elements::Paragraph::new(
                        entry.signed_at.format("%d/%m/%Y %H:%M").to_string(),
                    ))
                    .element(elements::Paragraph::new(entry.signature_id.clone()))
                    .push()
                    .map_err(|e| AppError::InternalServerError(anyhow::Error::msg(e.to_string())))?;
            }
            doc.push(table);
            doc.push(elements::Break::new(1.5));

            // QR Code com o link de verificação do documento
            let code = QrCode::new(verification_url.as_bytes())
                .map_err(|e| AppError::InternalServerError(anyhow::Error::msg(e.to_string())))?;
            let image_buffer = code.render::<Luma<u8>>().build();
            let dynamic_image = image::DynamicImage::ImageLuma8(image_buffer);
            let pdf_image = elements::Image::from_dynamic_image(dynamic_image)
                .map_err(|e| AppError::InternalServerError(anyhow::Error::msg(e.to_string())))?
                .with_scale(genpdf::Scale::new(0.5, 0.5));
            doc.push(pdf_image);
            doc.push(
                elements::Paragraph::new(verification_url.to_string())
                    .styled(style::Style::new().italic().with_font_size(8)),
            );
        }

        // 2. Renderiza para Buffer (Memória)
        let mut buffer = Vec::new();
        doc.render(&mut buffer)
            .map_err(|e| AppError::InternalServerError(anyhow::Error::msg(e.to_string())))?;

        Ok(buffer)
    }
}
