// src/db/contract_repo.rs

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::store::{ContractPatch, ContractStore, SignatureWrite},
    models::contract::{Contract, ContractStatus, FieldType, NewContract, PlacedField, Signatory},
    services::{lifecycle, signing},
};

// --- LINHAS DO BANCO ---

#[derive(Debug, FromRow)]
struct ContractRow {
    id: Uuid,
    title: String,
    client_name: String,
    client_id: Option<Uuid>,
    contract_content: String,
    is_pdf: bool,
    status: ContractStatus,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct SignatoryRow {
    contract_id: Uuid,
    name: String,
    cpf: String,
    signed: bool,
    signature_data_url: Option<String>,
    signed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, FromRow)]
struct FieldRow {
    contract_id: Uuid,
    signatory_position: i32,
    field_type: FieldType,
    x: f64,
    y: f64,
    captured_image: Option<String>,
}

const CONTRACT_COLUMNS: &str = "id, title, client_name, client_id, contract_content, is_pdf, \
     status, version, created_at, updated_at";

fn to_position(index: usize) -> Result<i32, AppError> {
    i32::try_from(index).map_err(|_| AppError::InvalidFieldIndex(index))
}

fn assemble(row: ContractRow, signatories: Vec<SignatoryRow>, fields: Vec<FieldRow>) -> Result<Contract, AppError> {
    let signatories = signatories
        .into_iter()
        .map(|s| Signatory {
            name: s.name,
            cpf: s.cpf,
            signed: s.signed,
            signature_data_url: s.signature_data_url,
            signed_at: s.signed_at,
        })
        .collect();

    let placed_fields = fields
        .into_iter()
        .map(|f| {
            let signatory_index = usize::try_from(f.signatory_position)
                .map_err(|_| anyhow::anyhow!("posição de signatário negativa: {}", f.signatory_position))?;
            Ok(PlacedField {
                signatory_index,
                field_type: f.field_type,
                x: f.x,
                y: f.y,
                captured_image: f.captured_image,
            })
        })
        .collect::<Result<Vec<_>, AppError>>()?;

    Ok(Contract {
        id: row.id,
        title: row.title,
        client_name: row.client_name,
        client_id: row.client_id,
        contract_content: row.contract_content,
        signatories,
        placed_fields,
        status: row.status,
        is_pdf: row.is_pdf,
        version: row.version,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

// Carrega o contrato completo na conexão (ou transação) informada
async fn load(conn: &mut PgConnection, id: Uuid) -> Result<Option<Contract>, AppError> {
    let row = sqlx::query_as::<_, ContractRow>(&format!(
        "SELECT {CONTRACT_COLUMNS} FROM contracts WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let signatories = sqlx::query_as::<_, SignatoryRow>(
        r#"
        SELECT contract_id, name, cpf, signed, signature_data_url, signed_at
        FROM contract_signatories
        WHERE contract_id = $1
        ORDER BY position
        "#,
    )
    .bind(id)
    .fetch_all(&mut *conn)
    .await?;

    let fields = sqlx::query_as::<_, FieldRow>(
        r#"
        SELECT contract_id, signatory_position, field_type, x, y, captured_image
        FROM contract_placed_fields
        WHERE contract_id = $1
        ORDER BY position
        "#,
    )
    .bind(id)
    .fetch_all(&mut *conn)
    .await?;

    assemble(row, signatories, fields).map(Some)
}

// Repositório Postgres dos contratos
#[derive(Clone)]
pub struct ContractRepository {
    pool: PgPool,
}

impl ContractRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn insert_parties(
        conn: &mut PgConnection,
        id: Uuid,
        signatories: &[Signatory],
        fields: &[PlacedField],
    ) -> Result<(), AppError> {
        for (position, s) in signatories.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO contract_signatories
                    (contract_id, position, name, cpf, signed, signature_data_url, signed_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(id)
            .bind(to_position(position)?)
            .bind(&s.name)
            .bind(&s.cpf)
            .bind(s.signed)
            .bind(&s.signature_data_url)
            .bind(s.signed_at)
            .execute(&mut *conn)
            .await?;
        }

        for (position, f) in fields.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO contract_placed_fields
                    (contract_id, position, signatory_position, field_type, x, y, captured_image)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(id)
            .bind(to_position(position)?)
            .bind(to_position(f.signatory_index)?)
            .bind(f.field_type)
            .bind(f.x)
            .bind(f.y)
            .bind(&f.captured_image)
            .execute(&mut *conn)
            .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl ContractStore for ContractRepository {
    async fn add(&self, new: NewContract) -> Result<Contract, AppError> {
        let row = sqlx::query_as::<_, ContractRow>(&format!(
            "INSERT INTO contracts (id, title, client_name, client_id) \
             VALUES ($1, $2, $3, $4) RETURNING {CONTRACT_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&new.title)
        .bind(&new.client_name)
        .bind(new.client_id)
        .fetch_one(&self.pool)
        .await?;

        assemble(row, Vec::new(), Vec::new())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Contract>, AppError> {
        let mut conn = self.pool.acquire().await?;
        load(&mut conn, id).await
    }

    async fn list(&self) -> Result<Vec<Contract>, AppError> {
        let rows = sqlx::query_as::<_, ContractRow>(&format!(
            "SELECT {CONTRACT_COLUMNS} FROM contracts ORDER BY created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();

        // Duas consultas para todos os contratos, agrupadas em memória
        let mut signatories: HashMap<Uuid, Vec<SignatoryRow>> = HashMap::new();
        for s in sqlx::query_as::<_, SignatoryRow>(
            r#"
            SELECT contract_id, name, cpf, signed, signature_data_url, signed_at
            FROM contract_signatories
            WHERE contract_id = ANY($1)
            ORDER BY contract_id, position
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?
        {
            signatories.entry(s.contract_id).or_default().push(s);
        }

        let mut fields: HashMap<Uuid, Vec<FieldRow>> = HashMap::new();
        for f in sqlx::query_as::<_, FieldRow>(
            r#"
            SELECT contract_id, signatory_position, field_type, x, y, captured_image
            FROM contract_placed_fields
            WHERE contract_id = ANY($1)
            ORDER BY contract_id, position
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?
        {
            fields.entry(f.contract_id).or_default().push(f);
        }

        rows.into_iter()
            .map(|row| {
                let id = row.id;
                assemble(
                    row,
                    signatories.remove(&id).unwrap_or_default(),
                    fields.remove(&id).unwrap_or_default(),
                )
            })
            .collect()
    }

    async fn update(&self, id: Uuid, expected_version: i64, patch: ContractPatch) -> Result<Contract, AppError> {
        let mut tx = self.pool.begin().await?;

        // 1. Atualiza o cabeçalho somente se a versão ainda for a lida pelo chamador
        let updated = sqlx::query_scalar::<_, i64>(
            r#"
            UPDATE contracts SET
                title = COALESCE($3, title),
                contract_content = COALESCE($4, contract_content),
                is_pdf = COALESCE($5, is_pdf),
                status = COALESCE($6, status),
                version = version + 1,
                updated_at = NOW()
            WHERE id = $1 AND version = $2
            RETURNING version
            "#,
        )
        .bind(id)
        .bind(expected_version)
        .bind(patch.title)
        .bind(patch.contract_content)
        .bind(patch.is_pdf)
        .bind(patch.status)
        .fetch_optional(&mut *tx)
        .await?;

        if updated.is_none() {
            let exists = sqlx::query_scalar::<_, i32>("SELECT 1 FROM contracts WHERE id = $1")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
            return Err(match exists {
                Some(_) => AppError::VersionConflict,
                None => AppError::ContractNotFound,
            });
        }

        // 2. Substitui signatários e campos (só acontece durante a elaboração)
        if let Some((signatories, fields)) = patch.parties {
            sqlx::query("DELETE FROM contract_placed_fields WHERE contract_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            sqlx::query("DELETE FROM contract_signatories WHERE contract_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            Self::insert_parties(&mut tx, id, &signatories, &fields).await?;
        }

        // 3. Confere as invariantes antes do commit
        let contract = load(&mut tx, id).await?.ok_or(AppError::ContractNotFound)?;
        contract.check_invariants()?;

        tx.commit().await?;
        Ok(contract)
    }

    async fn sign(&self, id: Uuid, write: SignatureWrite) -> Result<Contract, AppError> {
        let mut tx = self.pool.begin().await?;

        // 1. Trava a linha do contrato: assinaturas simultâneas do mesmo contrato
        //    passam uma de cada vez pelo recálculo do status
        sqlx::query_scalar::<_, Uuid>("SELECT id FROM contracts WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(AppError::ContractNotFound)?;

        // 2. Valida a escrita sobre o estado atual (status, dono dos campos, já assinado)
        let mut current = load(&mut tx, id).await?.ok_or(AppError::ContractNotFound)?;
        signing::apply_signature(&mut current, &write, Utc::now())?;

        // 3. Patch apenas na linha deste signatário
        let position = to_position(write.signatory_index)?;
        let result = sqlx::query(
            r#"
            UPDATE contract_signatories
            SET signed = TRUE, signature_data_url = $3, signed_at = NOW()
            WHERE contract_id = $1 AND position = $2 AND signed = FALSE
            "#,
        )
        .bind(id)
        .bind(position)
        .bind(&write.signature_data_url)
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::AlreadySigned);
        }

        for (field_index, image) in &write.field_captures {
            sqlx::query(
                r#"
                UPDATE contract_placed_fields
                SET captured_image = $4
                WHERE contract_id = $1 AND position = $2 AND signatory_position = $3
                "#,
            )
            .bind(id)
            .bind(to_position(*field_index)?)
            .bind(position)
            .bind(image)
            .execute(&mut *tx)
            .await?;
        }

        // 4. Status derivado dos signatários gravados, na mesma transação
        let signed = load(&mut tx, id).await?.ok_or(AppError::ContractNotFound)?;
        let status = lifecycle::compute_status(&signed.signatories);
        sqlx::query(
            "UPDATE contracts SET status = $2, version = version + 1, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(status)
        .execute(&mut *tx)
        .await?;

        let contract = load(&mut tx, id).await?.ok_or(AppError::ContractNotFound)?;
        tx.commit().await?;

        if contract.status == ContractStatus::Assinado {
            tracing::info!(contract_id = %id, "✅ Contrato assinado por todas as partes");
        }
        Ok(contract)
    }
}
