// src/services/placement.rs
//
// Editor de posicionamento de campos. As coordenadas são percentuais do
// documento inteiro (e não da janela visível), para que o campo fique preso
// ao conteúdo em qualquer largura de tela.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    common::error::AppError,
    models::contract::{Contract, FieldType, PlacedField},
    services::lifecycle,
};

/// Ferramenta ativa: qual signatário e qual tipo de campo será posicionado no próximo clique.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ActiveTool {
    pub signatory_index: usize,
    #[serde(rename = "type")]
    pub field_type: FieldType,
}

/// Posição do clique em coordenadas de página (clientX / clientY).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PointerEvent {
    pub client_x: f64,
    pub client_y: f64,
}

/// Geometria do elemento que exibe o documento renderizado.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ViewportRect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    #[serde(default)]
    pub scroll_top: f64,
    // Altura total do conteúdo rolável
    pub scroll_height: f64,
}

#[derive(Debug, Default, Clone)]
pub struct FieldPlacementEditor {
    active_tool: Option<ActiveTool>,
}

impl FieldPlacementEditor {
    pub fn new() -> Self {
        Self::default()
    }

    // A última seleção vence
    pub fn select_tool(&mut self, signatory_index: usize, field_type: FieldType) {
        self.active_tool = Some(ActiveTool {
            signatory_index,
            field_type,
        });
    }

    pub fn active_tool(&self) -> Option<ActiveTool> {
        self.active_tool
    }

    /// Converte o clique em um campo posicionado.
    ///
    /// Sem ferramenta ativa o clique é ignorado (`Ok(None)`). Após posicionar,
    /// a ferramenta é limpa: um campo por seleção.
    pub fn place_field(
        &mut self,
        contract: &mut Contract,
        event: PointerEvent,
        viewport: Option<&ViewportRect>,
    ) -> Result<Option<usize>, AppError> {
        let Some(tool) = self.active_tool else {
            return Ok(None);
        };
        lifecycle::ensure_authoring(contract.status)?;
        if !contract.has_content() {
            return Err(AppError::MissingContent);
        }

        let viewport = viewport.ok_or(AppError::ViewportNotMounted)?;
        let (x, y) = normalize(event, viewport)?;
        let field = PlacedField::new(tool.signatory_index, tool.field_type, x, y)?;
        let index = contract.push_field(field)?;

        self.active_tool = None;
        tracing::debug!(
            contract_id = %contract.id,
            field_index = index,
            x,
            y,
            "Campo posicionado"
        );
        Ok(Some(index))
    }

    /// Remove um campo (clique sobre um marcador já posicionado).
    pub fn remove_field(&self, contract: &mut Contract, index: usize) -> Result<PlacedField, AppError> {
        lifecycle::ensure_authoring(contract.status)?;
        contract.remove_field(index)
    }
}

/// Clique -> percentuais (x, y) relativos à largura e à altura total do documento.
pub fn normalize(event: PointerEvent, viewport: &ViewportRect) -> Result<(f64, f64), AppError> {
    if !(viewport.width > 0.0 && viewport.scroll_height > 0.0) {
        return Err(AppError::ViewportNotMounted);
    }
    let x = (event.client_x - viewport.left) / viewport.width * 100.0;
    let y = (event.client_y - viewport.top + viewport.scroll_top) / viewport.scroll_height * 100.0;
    Ok((x, y))
}

/// Inverso de `normalize`: posição em pixels do campo para um documento
/// renderizado com a largura e a altura informadas.
pub fn project(field: &PlacedField, width: f64, height: f64) -> (f64, f64) {
    (field.x / 100.0 * width, field.y / 100.0 * height)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::contract::{fixtures, ContractStatus, Signatory};

    fn draft() -> Contract {
        fixtures::contract(vec![
            Signatory::new("Ana", "111.111.111-11"),
            Signatory::new("Bruno", "222.222.222-22"),
        ])
    }

    fn viewport() -> ViewportRect {
        ViewportRect {
            left: 100.0,
            top: 50.0,
            width: 800.0,
            scroll_top: 0.0,
            scroll_height: 2000.0,
        }
    }

    #[test]
    fn click_without_tool_is_ignored() {
        let mut c = draft();
        let mut editor = FieldPlacementEditor::new();
        let placed = editor
            .place_field(&mut c, PointerEvent { client_x: 300.0, client_y: 300.0 }, Some(&viewport()))
            .unwrap();
        assert_eq!(placed, None);
        assert!(c.placed_fields.is_empty());
    }

    #[test]
    fn y_accounts_for_scroll_position() {
        let mut vp = viewport();
        let click = PointerEvent { client_x: 500.0, client_y: 250.0 };

        let (x, y) = normalize(click, &vp).unwrap();
        assert_eq!(x, 50.0);
        assert_eq!(y, 10.0);

        // Mesmo ponto da tela, documento rolado 1000px: o campo fica mais abaixo no conteúdo
        vp.scroll_top = 1000.0;
        let (_, y) = normalize(click, &vp).unwrap();
        assert_eq!(y, 60.0);
    }

    #[test]
    fn placement_consumes_the_tool() {
        let mut c = draft();
        let mut editor = FieldPlacementEditor::new();
        editor.select_tool(0, FieldType::Signature);
        editor.select_tool(1, FieldType::Rubric);

        let click = PointerEvent { client_x: 300.0, client_y: 450.0 };
        let index = editor.place_field(&mut c, click, Some(&viewport())).unwrap();
        assert_eq!(index, Some(0));
        assert_eq!(c.placed_fields[0].signatory_index, 1);
        assert_eq!(c.placed_fields[0].field_type, FieldType::Rubric);
        assert_eq!(editor.active_tool(), None);

        // Segundo clique sem nova seleção não cria outro campo
        assert_eq!(editor.place_field(&mut c, click, Some(&viewport())).unwrap(), None);
        assert_eq!(c.placed_fields.len(), 1);
    }

    #[test]
    fn unmounted_viewport_is_rejected_and_keeps_tool() {
        let mut c = draft();
        let mut editor = FieldPlacementEditor::new();
        editor.select_tool(0, FieldType::Cpf);
        let click = PointerEvent { client_x: 1.0, client_y: 1.0 };

        assert!(matches!(
            editor.place_field(&mut c, click, None),
            Err(AppError::ViewportNotMounted)
        ));
        let collapsed = ViewportRect { width: 0.0, ..viewport() };
        assert!(editor.place_field(&mut c, click, Some(&collapsed)).is_err());
        assert!(editor.active_tool().is_some());
    }

    #[test]
    fn click_outside_document_is_rejected() {
        let mut c = draft();
        let mut editor = FieldPlacementEditor::new();
        editor.select_tool(0, FieldType::Signature);
        let click = PointerEvent { client_x: 50.0, client_y: 100.0 };
        assert!(matches!(
            editor.place_field(&mut c, click, Some(&viewport())),
            Err(AppError::CoordinateOutOfRange { axis: "x", .. })
        ));
        assert!(c.placed_fields.is_empty());
    }

    #[test]
    fn tool_for_unknown_signatory_is_rejected() {
        let mut c = draft();
        let mut editor = FieldPlacementEditor::new();
        editor.select_tool(5, FieldType::Signature);
        let click = PointerEvent { client_x: 300.0, client_y: 300.0 };
        assert!(matches!(
            editor.place_field(&mut c, click, Some(&viewport())),
            Err(AppError::InvalidSignatoryIndex { index: 5, len: 2 })
        ));
    }

    #[test]
    fn signed_contract_rejects_placement_and_removal() {
        let mut c = fixtures::ana_and_bruno();
        c.signatories.iter_mut().for_each(|s| s.signed = true);
        c.status = ContractStatus::Assinado;
        let before = c.placed_fields.clone();

        let mut editor = FieldPlacementEditor::new();
        editor.select_tool(0, FieldType::Signature);
        let click = PointerEvent { client_x: 300.0, client_y: 300.0 };
        assert!(editor.place_field(&mut c, click, Some(&viewport())).is_err());
        assert!(editor.remove_field(&mut c, 0).is_err());
        assert_eq!(c.placed_fields, before);
    }

    #[test]
    fn remove_field_during_authoring() {
        let mut c = fixtures::ana_and_bruno();
        c.status = ContractStatus::EmElaboracao;
        let editor = FieldPlacementEditor::new();
        let removed = editor.remove_field(&mut c, 0).unwrap();
        assert_eq!(removed.signatory_index, 0);
        assert_eq!(c.placed_fields.len(), 1);
        assert!(matches!(editor.remove_field(&mut c, 7), Err(AppError::InvalidFieldIndex(7))));
    }

    #[test]
    fn same_relative_position_at_any_width() {
        let mut c = draft();
        let mut editor = FieldPlacementEditor::new();
        editor.select_tool(0, FieldType::Signature);
        let vp = ViewportRect {
            left: 0.0,
            top: 0.0,
            width: 1200.0,
            scroll_top: 300.0,
            scroll_height: 3000.0,
        };
        editor
            .place_field(&mut c, PointerEvent { client_x: 900.0, client_y: 600.0 }, Some(&vp))
            .unwrap();
        let field = &c.placed_fields[0];

        // Editor do autor (1200px) e celular do signatário (360px)
        let (desktop_x, desktop_y) = project(field, 1200.0, 3000.0);
        let (phone_x, phone_y) = project(field, 360.0, 900.0);
        assert!((desktop_x / 1200.0 - phone_x / 360.0).abs() < 1e-9);
        assert!((desktop_y / 3000.0 - phone_y / 900.0).abs() < 1e-9);
        assert_eq!((desktop_x, desktop_y), (900.0, 900.0));
    }
}
