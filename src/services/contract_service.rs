// src/services/contract_service.rs

use std::sync::Arc;

use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{
        object_store::ObjectStore,
        store::{ContractPatch, ContractStore},
    },
    models::{
        contract::{Contract, NewContract, Signatory},
        rendering::RenderedContract,
        signing::{SigningResult, SigningView},
    },
    services::{
        feed::{ContractFeed, ContractSubscription},
        lifecycle,
        placement::{ActiveTool, FieldPlacementEditor, PointerEvent, ViewportRect},
        rendering,
        signing::{self, SigningSession},
    },
};

// Assinatura de PDF: "%PDF-"
const PDF_MAGIC: &[u8] = b"%PDF-";

#[derive(Clone)]
pub struct ContractService {
    store: Arc<dyn ContractStore>,
    objects: Arc<dyn ObjectStore>,
    feed: ContractFeed,
    public_base_url: String,
    sign_prefix: String,
}

impl ContractService {
    pub fn new(
        store: Arc<dyn ContractStore>,
        objects: Arc<dyn ObjectStore>,
        feed: ContractFeed,
        public_base_url: &str,
        sign_prefix: &str,
    ) -> Self {
        Self {
            store,
            objects,
            feed,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
            sign_prefix: sign_prefix.trim_matches('/').to_string(),
        }
    }

    // =========================================================================
    //  1. CONSULTAS
    // =========================================================================

    pub async fn get(&self, id: Uuid) -> Result<Contract, AppError> {
        self.store.get(id).await?.ok_or(AppError::ContractNotFound)
    }

    pub async fn list(&self) -> Result<Vec<Contract>, AppError> {
        self.store.list().await
    }

    /// Snapshot atual + inscrição nas mudanças seguintes.
    /// A inscrição é feita antes da leitura para não perder escritas no meio.
    pub async fn subscribe(&self) -> Result<(Vec<Contract>, ContractSubscription), AppError> {
        let subscription = self.feed.subscribe();
        let snapshot = self.store.list().await?;
        Ok((snapshot, subscription))
    }

    pub fn signing_link(&self, contract_id: Uuid) -> String {
        format!("{}/{}/{}", self.public_base_url, self.sign_prefix, contract_id)
    }

    // =========================================================================
    //  2. AUTORIA
    // =========================================================================

    pub async fn create_request(&self, new: NewContract) -> Result<Contract, AppError> {
        let contract = self.store.add(new).await?;
        tracing::info!(contract_id = %contract.id, "Solicitação de contrato criada");
        self.feed.publish(&contract);
        Ok(contract)
    }

    /// Leitura-modificação-escrita otimista para as edições do autor.
    async fn author_edit<F>(&self, id: Uuid, edit: F) -> Result<Contract, AppError>
    where
        F: FnOnce(&mut Contract) -> Result<(), AppError> + Send,
    {
        let current = self.get(id).await?;
        lifecycle::ensure_authoring(current.status)?;

        let mut working = current.clone();
        edit(&mut working)?;
        working.check_invariants()?;

        let saved = self
            .store
            .update(id, current.version, ContractPatch::authoring(&working))
            .await?;
        self.feed.publish(&saved);
        Ok(saved)
    }

    pub async fn begin_drafting(&self, id: Uuid, html: String) -> Result<Contract, AppError> {
        self.author_edit(id, |c| lifecycle::begin_drafting(c, html, false))
            .await
    }

    /// Variante de upload: o PDF vai para o armazenamento de arquivos e o
    /// contrato passa a apontar para a URL de download.
    pub async fn attach_pdf(&self, id: Uuid, bytes: Vec<u8>) -> Result<Contract, AppError> {
        if !bytes.starts_with(PDF_MAGIC) {
            return Err(AppError::InvalidPdf);
        }
        let current = self.get(id).await?;
        lifecycle::ensure_authoring(current.status)?;

        let path = format!("contracts/{}/{}.pdf", id, Uuid::new_v4());
        let url = self.objects.upload(&path, bytes).await?;

        self.author_edit(id, |c| lifecycle::begin_drafting(c, url, true))
            .await
    }

    pub async fn set_signatories(&self, id: Uuid, signatories: Vec<Signatory>) -> Result<Contract, AppError> {
        // Dois signatários iguais tornariam a verificação ambígua
        for (i, a) in signatories.iter().enumerate() {
            let duplicated = signatories[i + 1..].iter().any(|b| {
                signing::normalize_name(&a.name) == signing::normalize_name(&b.name)
                    && signing::normalize_cpf(&a.cpf) == signing::normalize_cpf(&b.cpf)
            });
            if duplicated {
                return Err(AppError::DuplicateSignatory);
            }
        }

        let fresh = signatories
            .into_iter()
            .map(|s| Signatory::new(s.name.trim(), s.cpf.trim()))
            .collect();
        self.author_edit(id, |c| c.replace_signatories(fresh)).await
    }

    /// Executa o editor de posicionamento com a ferramenta e o clique recebidos.
    /// Sem ferramenta, nada é gravado e o contrato volta como está.
    pub async fn place_field(
        &self,
        id: Uuid,
        tool: Option<ActiveTool>,
        pointer: PointerEvent,
        viewport: Option<ViewportRect>,
    ) -> Result<Contract, AppError> {
        let Some(tool) = tool else {
            return self.get(id).await;
        };
        self.author_edit(id, move |c| {
            let mut editor = FieldPlacementEditor::new();
            editor.select_tool(tool.signatory_index, tool.field_type);
            editor.place_field(c, pointer, viewport.as_ref()).map(|_| ())
        })
        .await
    }

    pub async fn remove_field(&self, id: Uuid, index: usize) -> Result<Contract, AppError> {
        self.author_edit(id, move |c| {
            FieldPlacementEditor::new().remove_field(c, index).map(|_| ())
        })
        .await
    }

    /// Em Elaboração -> Aguardando Assinatura. Devolve o link público de assinatura.
    pub async fn send_for_signature(&self, id: Uuid) -> Result<(Contract, String), AppError> {
        let contract = self.author_edit(id, lifecycle::send_for_signature).await?;
        let link = self.signing_link(contract.id);
        tracing::info!(contract_id = %contract.id, %link, "📨 Contrato enviado para assinatura");
        Ok((contract, link))
    }

    // =========================================================================
    //  3. ASSINATURA (rota pública)
    // =========================================================================

    pub async fn verify_signatory(&self, id: Uuid, name: &str, cpf: &str) -> Result<(usize, SigningView), AppError> {
        let contract = self.get(id).await?;
        let mut session = SigningSession::new(contract.id);
        match session.verify(&contract, name, cpf) {
            Ok(index) => {
                tracing::info!(contract_id = %id, signatory_index = index, "Signatário verificado");
                Ok((index, signing::signing_view(&contract, index)))
            }
            Err(e) => {
                // Não loga nome/documento informados
                tracing::warn!(contract_id = %id, reason = %e, "Verificação de signatário recusada");
                Err(e)
            }
        }
    }

    pub async fn signing_view(&self, id: Uuid, signatory_index: usize) -> Result<SigningView, AppError> {
        let contract = self.get(id).await?;
        SigningSession::resume(&contract, signatory_index)?;
        Ok(signing::signing_view(&contract, signatory_index))
    }

    /// Aplica as capturas, exige todos os campos do signatário e grava tudo de uma vez.
    pub async fn sign(
        &self,
        id: Uuid,
        signatory_index: usize,
        captures: Vec<(usize, String)>,
    ) -> Result<SigningResult, AppError> {
        let contract = self.get(id).await?;
        let mut session = SigningSession::resume(&contract, signatory_index)?;
        for (field_index, data_url) in captures {
            session.capture(&contract, field_index, data_url)?;
        }
        let write = session.finalize(&contract)?;

        let signed = self.store.sign(id, write).await.map_err(|e| {
            tracing::error!(contract_id = %id, signatory_index, error = %e, "Falha ao gravar assinatura");
            e
        })?;
        session.mark_signed();
        self.feed.publish(&signed);

        let all_signed = signed.all_signed();
        tracing::info!(
            contract_id = %id,
            signatory_index,
            status = %signed.status,
            "✍️ Assinatura registrada"
        );

        Ok(SigningResult {
            contract_id: id,
            signatory_index,
            signed_at: signed
                .signatories
                .get(signatory_index)
                .and_then(|s| s.signed_at),
            status: signed.status,
            all_signed,
        })
    }

    // =========================================================================
    //  4. VISUALIZAÇÃO / AUDITORIA
    // =========================================================================

    pub async fn render(&self, id: Uuid) -> Result<RenderedContract, AppError> {
        let contract = self.get(id).await?;
        Ok(rendering::render(&contract))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{memory_store::InMemoryContractStore, object_store::LocalObjectStore};
    use crate::models::contract::{ContractStatus, FieldType};
    use crate::services::signature_image::fixtures::stroke;

    fn service(dir: &std::path::Path) -> ContractService {
        ContractService::new(
            Arc::new(InMemoryContractStore::new()),
            Arc::new(LocalObjectStore::new(dir, "http://localhost:3000")),
            ContractFeed::new(),
            "http://localhost:3000/",
            "/assinar/",
        )
    }

    fn viewport() -> ViewportRect {
        ViewportRect {
            left: 0.0,
            top: 0.0,
            width: 1000.0,
            scroll_top: 0.0,
            scroll_height: 1000.0,
        }
    }

    async fn drafted(svc: &ContractService) -> Contract {
        let c = svc
            .create_request(NewContract {
                title: "Contrato de Serviços".into(),
                client_name: "Maria".into(),
                client_id: None,
            })
            .await
            .unwrap();
        svc.begin_drafting(c.id, "<p>Cláusulas</p>".into()).await.unwrap();
        svc.set_signatories(
            c.id,
            vec![
                Signatory::new(" Ana ", "111.111.111-11"),
                Signatory::new("Bruno", "222.222.222-22"),
            ],
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn full_flow_with_link_and_derived_status() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path());
        let c = drafted(&svc).await;
        assert_eq!(c.signatories[0].name, "Ana");

        for (i, x) in [(0, 100.0), (1, 600.0)] {
            svc.place_field(
                c.id,
                Some(ActiveTool { signatory_index: i, field_type: FieldType::Signature }),
                PointerEvent { client_x: x, client_y: 900.0 },
                Some(viewport()),
            )
            .await
            .unwrap();
        }

        let (sent, link) = svc.send_for_signature(c.id).await.unwrap();
        assert_eq!(sent.status, ContractStatus::AguardandoAssinatura);
        assert_eq!(link, format!("http://localhost:3000/assinar/{}", c.id));

        let (index, _) = svc.verify_signatory(c.id, "ana", "11111111111").await.unwrap();
        let result = svc.sign(c.id, index, vec![(0, stroke())]).await.unwrap();
        assert!(!result.all_signed);
        assert_eq!(result.status, ContractStatus::AguardandoAssinatura);

        let (index, _) = svc.verify_signatory(c.id, "BRUNO", "222 222 222 22").await.unwrap();
        let result = svc.sign(c.id, index, vec![(1, stroke())]).await.unwrap();
        assert!(result.all_signed);
        assert_eq!(result.status, ContractStatus::Assinado);

        let rendered = svc.render(c.id).await.unwrap();
        assert_eq!(rendered.audit_trail.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn click_without_tool_changes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path());
        let c = drafted(&svc).await;
        let after = svc
            .place_field(c.id, None, PointerEvent { client_x: 5.0, client_y: 5.0 }, Some(viewport()))
            .await
            .unwrap();
        assert_eq!(after.version, c.version);
        assert!(after.placed_fields.is_empty());
    }

    #[tokio::test]
    async fn duplicate_signatories_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path());
        let c = drafted(&svc).await;
        let err = svc
            .set_signatories(
                c.id,
                vec![
                    Signatory::new("Ana", "111.111.111-11"),
                    Signatory::new("ANA ", "11111111111"),
                ],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::DuplicateSignatory));
    }

    #[tokio::test]
    async fn pdf_upload_moves_to_drafting() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path());
        let c = svc
            .create_request(NewContract {
                title: "PDF".into(),
                client_name: "Cliente".into(),
                client_id: None,
            })
            .await
            .unwrap();

        assert!(matches!(
            svc.attach_pdf(c.id, b"nao e pdf".to_vec()).await,
            Err(AppError::InvalidPdf)
        ));

        let drafted = svc.attach_pdf(c.id, b"%PDF-1.4 conteudo".to_vec()).await.unwrap();
        assert!(drafted.is_pdf);
        assert_eq!(drafted.status, ContractStatus::EmElaboracao);
        assert!(drafted
            .contract_content
            .starts_with(&format!("http://localhost:3000/files/contracts/{}/", c.id)));
    }

    #[tokio::test]
    async fn sent_contract_rejects_authoring() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path());
        let c = drafted(&svc).await;
        for i in 0..2 {
            svc.place_field(
                c.id,
                Some(ActiveTool { signatory_index: i, field_type: FieldType::Rubric }),
                PointerEvent { client_x: 500.0, client_y: 500.0 },
                Some(viewport()),
            )
            .await
            .unwrap();
        }
        svc.send_for_signature(c.id).await.unwrap();

        assert!(matches!(
            svc.set_signatories(c.id, vec![Signatory::new("Carla", "333.333.333-33")]).await,
            Err(AppError::ContractNotEditable(ContractStatus::AguardandoAssinatura))
        ));
        assert!(svc.remove_field(c.id, 0).await.is_err());
        assert_eq!(svc.get(c.id).await.unwrap().placed_fields.len(), 2);
    }

    #[tokio::test]
    async fn subscription_sees_signing_updates() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path());
        let c = drafted(&svc).await;

        let (snapshot, mut sub) = svc.subscribe().await.unwrap();
        assert_eq!(snapshot.len(), 1);

        svc.begin_drafting(c.id, "<p>Nova versão</p>".into()).await.unwrap();
        let update = sub.next().await.unwrap();
        assert_eq!(update.contract_content, "<p>Nova versão</p>");
    }
}
