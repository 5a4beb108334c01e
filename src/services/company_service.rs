// src/services/company_service.rs

use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{CompanyRepository, OrganizationRepository, PermissionRepository},
    models::{
        audit::{ActivityAction, AuditEntity, ClientInfo, NewActivityLog},
        auth::User,
        company::{Company, CreateCompanyPayload, UpdateCompanyPayload},
        permission::{CompanyAction, PermissionFlags},
    },
    services::{audit_service::AuditTrail, permission_service::PermissionService},
};

#[derive(Clone)]
pub struct CompanyService {
    repo: CompanyRepository,
    org_repo: OrganizationRepository,
    permission_repo: PermissionRepository,
    permissions: PermissionService,
    audit: AuditTrail,
    pool: PgPool,
}

impl CompanyService {
    pub fn new(
        repo: CompanyRepository,
        org_repo: OrganizationRepository,
        permission_repo: PermissionRepository,
        permissions: PermissionService,
        audit: AuditTrail,
        pool: PgPool,
    ) -> Self {
        Self { repo, org_repo, permission_repo, permissions, audit, pool }
    }

    pub async fn list_companies(&self, actor: &User) -> Result<Vec<Company>, AppError> {
        self.permissions.accessible_companies(actor).await
    }

    pub async fn get_company(&self, actor: &User, id: Uuid) -> Result<Company, AppError> {
        self.permissions.authorize_company(actor, id, CompanyAction::View).await
    }

    /// Cria a empresa e concede ao criador todas as permissões sobre ela.
    pub async fn create_company(
        &self,
        actor: &User,
        payload: CreateCompanyPayload,
        client: &ClientInfo,
    ) -> Result<Company, AppError> {
        // system_admin escolhe a organização; os demais usam a própria
        let organization_id = if actor.role.is_system_admin() {
            let org_id = payload
                .organization_id
                .or(actor.organization_id)
                .ok_or_else(|| AppError::InvalidInput("Informe a organização da empresa.".into()))?;
            self.org_repo
                .find_by_id(org_id)
                .await?
                .ok_or(AppError::OrganizationNotFound)?
                .id
        } else {
            actor.organization_id.ok_or(AppError::Forbidden)?
        };

        let mut tx = self.pool.begin().await?;

        let company = self
            .repo
            .create_company(&mut *tx, organization_id, payload.name.trim(), payload.identifier.trim())
            .await?;

        self.permission_repo
            .upsert(&mut *tx, actor.id, company.id, PermissionFlags::full())
            .await?;

        tx.commit().await?;

        tracing::info!("🏢 Empresa '{}' criada por {}", company.name, actor.username);
        self.audit.append_activity(
            NewActivityLog::new(ActivityAction::Create, AuditEntity::Company, client)
                .by(actor.id, actor.organization_id)
                .on(company.id)
                .in_company(company.id)
                .with_details(json!({ "name": company.name, "identifier": company.identifier })),
        );

        Ok(company)
    }

    pub async fn update_company(
        &self,
        actor: &User,
        id: Uuid,
        payload: UpdateCompanyPayload,
        client: &ClientInfo,
    ) -> Result<Company, AppError> {
        self.permissions.authorize_company(actor, id, CompanyAction::Edit).await?;

        let company = self
            .repo
            .update_company(
                id,
                payload.name.as_deref().map(str::trim),
                payload.identifier.as_deref().map(str::trim),
            )
            .await?
            .ok_or(AppError::CompanyNotFound)?;

        let mut changed = Vec::new();
        if payload.name.is_some() {
            changed.push("name");
        }
        if payload.identifier.is_some() {
            changed.push("identifier");
        }

        self.audit.append_activity(
            NewActivityLog::new(ActivityAction::Update, AuditEntity::Company, client)
                .by(actor.id, actor.organization_id)
                .on(company.id)
                .in_company(company.id)
                .with_details(json!({ "changedFields": changed })),
        );

        Ok(company)
    }

    pub async fn delete_company(&self, actor: &User, id: Uuid, client: &ClientInfo) -> Result<(), AppError> {
        let company = self.permissions.authorize_company(actor, id, CompanyAction::Delete).await?;

        if !self.repo.delete_company(id).await? {
            return Err(AppError::CompanyNotFound);
        }

        tracing::info!("🗑️ Empresa '{}' removida por {}", company.name, actor.username);
        self.audit.append_activity(
            NewActivityLog::new(ActivityAction::Delete, AuditEntity::Company, client)
                .by(actor.id, actor.organization_id)
                .on(company.id)
                .with_details(json!({ "name": company.name, "identifier": company.identifier })),
        );
        Ok(())
    }
}
