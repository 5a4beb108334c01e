// src/services/permission_service.rs

use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{CompanyRepository, PermissionRepository, UserRepository},
    models::{
        audit::{ActivityAction, AuditEntity, ClientInfo, NewActivityLog},
        auth::User,
        company::Company,
        permission::{CompanyAction, PermissionFlags, PermissionQuery, SetPermissionPayload, UserPermission},
    },
    services::audit_service::AuditTrail,
};

// =========================================================================
//  REGRAS PURAS
// =========================================================================

/// Decide se `actor` pode executar `action` sobre `company`.
///
/// - system_admin: tudo, em qualquer organização.
/// - org_admin: tudo, dentro da própria organização.
/// - user: somente o que a linha de `user_permissions` conceder.
///   Sem linha, nada é permitido.
pub fn authorize(
    actor: &User,
    company: &Company,
    flags: Option<PermissionFlags>,
    action: CompanyAction,
) -> Result<(), AppError> {
    ensure_same_tenant(actor, company.organization_id)?;

    if actor.role.has_admin_privileges() {
        return Ok(());
    }

    match flags {
        Some(flags) if flags.allows(action) => Ok(()),
        _ => Err(AppError::Forbidden),
    }
}

/// Isolamento entre organizações. Só o system_admin atravessa.
pub fn ensure_same_tenant(actor: &User, organization_id: Uuid) -> Result<(), AppError> {
    if actor.role.is_system_admin() || actor.organization_id == Some(organization_id) {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}

pub fn ensure_admin(actor: &User) -> Result<(), AppError> {
    if actor.role.has_admin_privileges() {
        Ok(())
    } else {
        Err(AppError::AdminRequired)
    }
}

/// Escopo das consultas administrativas: `None` = global (system_admin),
/// `Some(org)` = apenas a organização do org_admin.
pub fn admin_scope(actor: &User) -> Result<Option<Uuid>, AppError> {
    ensure_admin(actor)?;
    if actor.role.is_system_admin() {
        return Ok(None);
    }
    actor.organization_id.map(Some).ok_or(AppError::Forbidden)
}

// =========================================================================
//  SERVIÇO
// =========================================================================

#[derive(Clone)]
pub struct PermissionService {
    repo: PermissionRepository,
    company_repo: CompanyRepository,
    user_repo: UserRepository,
    audit: AuditTrail,
    pool: PgPool,
}

impl PermissionService {
    pub fn new(
        repo: PermissionRepository,
        company_repo: CompanyRepository,
        user_repo: UserRepository,
        audit: AuditTrail,
        pool: PgPool,
    ) -> Self {
        Self { repo, company_repo, user_repo, audit, pool }
    }

    /// Flags do usuário na empresa (`None` se não houver linha).
    pub async fn get_permission(&self, user_id: Uuid, company_id: Uuid) -> Result<Option<PermissionFlags>, AppError> {
        Ok(self.repo.find(user_id, company_id).await?.map(|p| p.flags()))
    }

    /// Carrega a empresa (404 se não existir) e aplica `authorize`.
    pub async fn authorize_company(
        &self,
        actor: &User,
        company_id: Uuid,
        action: CompanyAction,
    ) -> Result<Company, AppError> {
        let company = self
            .company_repo
            .find_by_id(company_id)
            .await?
            .ok_or(AppError::CompanyNotFound)?;

        // Admins não precisam de linha de permissão
        let flags = if actor.role.has_admin_privileges() {
            None
        } else {
            self.get_permission(actor.id, company.id).await?
        };

        authorize(actor, &company, flags, action)?;
        Ok(company)
    }

    /// Empresas visíveis para o usuário: todas do escopo para admins,
    /// só as com `can_view` para os demais.
    pub async fn accessible_companies(&self, actor: &User) -> Result<Vec<Company>, AppError> {
        if actor.role.is_system_admin() {
            return self.company_repo.list_by_organization(None).await;
        }
        let Some(organization_id) = actor.organization_id else {
            return Ok(Vec::new());
        };
        if actor.role.has_admin_privileges() {
            self.company_repo.list_by_organization(Some(organization_id)).await
        } else {
            self.company_repo
                .list_viewable_by_user(actor.id, Some(organization_id))
                .await
        }
    }

    // ---
    // Administração de permissões
    // ---

    pub async fn list_permissions(
        &self,
        actor: &User,
        query: PermissionQuery,
    ) -> Result<Vec<UserPermission>, AppError> {
        let scope = admin_scope(actor)?;
        self.repo.list(&query, scope).await
    }

    pub async fn set_permission(
        &self,
        actor: &User,
        payload: SetPermissionPayload,
        client: &ClientInfo,
    ) -> Result<UserPermission, AppError> {
        ensure_admin(actor)?;

        let company = self
            .company_repo
            .find_by_id(payload.company_id)
            .await?
            .ok_or(AppError::CompanyNotFound)?;
        ensure_same_tenant(actor, company.organization_id)?;

        let target = self
            .user_repo
            .find_by_id(payload.user_id)
            .await?
            .ok_or(AppError::UserNotFound)?;

        // Não se concede acesso a empresa de outra organização
        if target.organization_id != Some(company.organization_id) {
            return Err(AppError::InvalidInput(
                "O usuário e a empresa pertencem a organizações diferentes.".into(),
            ));
        }

        let permission = self
            .repo
            .upsert(&self.pool, target.id, company.id, payload.flags)
            .await?;

        tracing::info!(
            "🔐 Permissões de {} na empresa {} atualizadas por {}",
            target.username, company.name, actor.username
        );
        self.audit.append_activity(
            NewActivityLog::new(ActivityAction::GrantPermission, AuditEntity::Permission, client)
                .by(actor.id, actor.organization_id)
                .on(target.id)
                .in_company(company.id)
                .with_details(serde_json::json!({
                    "targetUser": target.username,
                    "flags": payload.flags,
                })),
        );

        Ok(permission)
    }

    pub async fn revoke_permission(
        &self,
        actor: &User,
        user_id: Uuid,
        company_id: Uuid,
        client: &ClientInfo,
    ) -> Result<(), AppError> {
        ensure_admin(actor)?;

        let company = self
            .company_repo
            .find_by_id(company_id)
            .await?
            .ok_or(AppError::CompanyNotFound)?;
        ensure_same_tenant(actor, company.organization_id)?;

        if !self.repo.delete(user_id, company_id).await? {
            return Err(AppError::PermissionNotFound);
        }

        self.audit.append_activity(
            NewActivityLog::new(ActivityAction::RevokePermission, AuditEntity::Permission, client)
                .by(actor.id, actor.organization_id)
                .on(user_id)
                .in_company(company_id),
        );
        Ok(())
    }
}
