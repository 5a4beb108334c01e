// src/services/user_service.rs

use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{
        user_repo::{NewUser, UserChanges},
        OrganizationRepository, SessionRepository, UserRepository,
    },
    models::{
        audit::{ActivityAction, AuditEntity, ClientInfo, NewActivityLog, NewSecurityLog, SecurityEvent},
        auth::{AccountStatus, CreateUserPayload, UpdateUserPayload, User, UserRole},
    },
    services::{
        audit_service::AuditTrail,
        auth::{hash_blocking, AuthService},
        permission_service::{admin_scope, ensure_admin},
    },
};

/// Quem pode administrar quem: system_admin administra todos; org_admin
/// administra a própria organização, exceto contas system_admin.
pub fn ensure_manageable(actor: &User, target: &User) -> Result<(), AppError> {
    ensure_admin(actor)?;
    if actor.role.is_system_admin() {
        return Ok(());
    }
    if target.role.is_system_admin() || target.organization_id != actor.organization_id {
        return Err(AppError::Forbidden);
    }
    Ok(())
}

/// Só system_admin cria ou promove outro system_admin.
pub fn ensure_can_assign(actor: &User, role: UserRole) -> Result<(), AppError> {
    if role.is_system_admin() && !actor.role.is_system_admin() {
        return Err(AppError::Forbidden);
    }
    Ok(())
}

#[derive(Clone)]
pub struct UserService {
    repo: UserRepository,
    org_repo: OrganizationRepository,
    session_repo: SessionRepository,
    auth: AuthService,
    audit: AuditTrail,
    pool: PgPool,
}

impl UserService {
    pub fn new(
        repo: UserRepository,
        org_repo: OrganizationRepository,
        session_repo: SessionRepository,
        auth: AuthService,
        audit: AuditTrail,
        pool: PgPool,
    ) -> Self {
        Self { repo, org_repo, session_repo, auth, audit, pool }
    }

    async fn load_manageable(&self, actor: &User, id: Uuid) -> Result<User, AppError> {
        ensure_admin(actor)?;
        let target = self.repo.find_by_id(id).await?.ok_or(AppError::UserNotFound)?;
        ensure_manageable(actor, &target)?;
        Ok(target)
    }

    pub async fn list_users(&self, actor: &User) -> Result<Vec<User>, AppError> {
        let scope = admin_scope(actor)?;
        self.repo.list_users(scope).await
    }

    pub async fn get_user(&self, actor: &User, id: Uuid) -> Result<User, AppError> {
        self.load_manageable(actor, id).await
    }

    pub async fn create_user(
        &self,
        actor: &User,
        payload: CreateUserPayload,
        client: &ClientInfo,
    ) -> Result<User, AppError> {
        ensure_admin(actor)?;
        let role = payload.role.unwrap_or(UserRole::User);
        ensure_can_assign(actor, role)?;

        let organization_id = if actor.role.is_system_admin() {
            payload.organization_id.or(actor.organization_id)
        } else {
            if payload.organization_id.is_some_and(|org| Some(org) != actor.organization_id) {
                return Err(AppError::Forbidden);
            }
            actor.organization_id
        };

        match organization_id {
            Some(org_id) => {
                self.org_repo
                    .find_by_id(org_id)
                    .await?
                    .ok_or(AppError::OrganizationNotFound)?;
            }
            None if !role.is_system_admin() => {
                return Err(AppError::InvalidInput("Informe a organização do usuário.".into()));
            }
            None => {}
        }

        self.auth
            .password_policy_for(organization_id)
            .await?
            .check(&payload.password)
            .map_err(AppError::WeakPassword)?;
        let password_hash = hash_blocking(payload.password.clone()).await?;

        let user = self
            .repo
            .create_user(
                &self.pool,
                NewUser {
                    organization_id,
                    username: payload.username.trim(),
                    email: payload.email.trim(),
                    password_hash: &password_hash,
                    name: payload.name.trim(),
                    role,
                },
            )
            .await?;

        tracing::info!("👤 Usuário '{}' criado por {}", user.username, actor.username);
        self.audit.append_activity(
            NewActivityLog::new(ActivityAction::Create, AuditEntity::User, client)
                .by(actor.id, actor.organization_id)
                .on(user.id)
                .with_details(json!({ "username": user.username, "role": role.as_str() })),
        );

        Ok(user)
    }

    pub async fn update_user(
        &self,
        actor: &User,
        id: Uuid,
        payload: UpdateUserPayload,
        client: &ClientInfo,
    ) -> Result<User, AppError> {
        let target = self.load_manageable(actor, id).await?;

        if let Some(role) = payload.role {
            ensure_can_assign(actor, role)?;
        }
        if target.id == actor.id
            && (payload.role.is_some_and(|r| r != actor.role)
                || payload.status == Some(AccountStatus::Inactive))
        {
            return Err(AppError::InvalidInput(
                "Não é possível alterar o próprio papel ou desativar a própria conta.".into(),
            ));
        }

        let password_hash = match &payload.password {
            Some(password) => {
                self.auth
                    .password_policy_for(target.organization_id)
                    .await?
                    .check(password)
                    .map_err(AppError::WeakPassword)?;
                Some(hash_blocking(password.clone()).await?)
            }
            None => None,
        };

        let updated = self
            .repo
            .update_user(
                id,
                UserChanges {
                    name: payload.name.as_deref().map(str::trim),
                    email: payload.email.as_deref().map(str::trim),
                    role: payload.role,
                    status: payload.status,
                    password_hash: password_hash.as_deref(),
                },
            )
            .await?
            .ok_or(AppError::UserNotFound)?;

        if payload.status == Some(AccountStatus::Inactive) || password_hash.is_some() {
            self.terminate_sessions(actor, &updated, client).await?;
        }

        let mut changed = Vec::new();
        if payload.name.is_some() { changed.push("name"); }
        if payload.email.is_some() { changed.push("email"); }
        if payload.role.is_some() { changed.push("role"); }
        if payload.status.is_some() { changed.push("status"); }
        if payload.password.is_some() { changed.push("password"); }

        self.audit.append_activity(
            NewActivityLog::new(ActivityAction::Update, AuditEntity::User, client)
                .by(actor.id, actor.organization_id)
                .on(updated.id)
                .with_details(json!({ "changedFields": changed })),
        );

        Ok(updated)
    }

    /// Remoção lógica: a conta fica inativa e as sessões abertas caem.
    pub async fn deactivate_user(&self, actor: &User, id: Uuid, client: &ClientInfo) -> Result<(), AppError> {
        let target = self.load_manageable(actor, id).await?;
        if target.id == actor.id {
            return Err(AppError::InvalidInput("Não é possível remover a própria conta.".into()));
        }

        let updated = self
            .repo
            .update_user(id, UserChanges { status: Some(AccountStatus::Inactive), ..Default::default() })
            .await?
            .ok_or(AppError::UserNotFound)?;

        self.terminate_sessions(actor, &updated, client).await?;

        self.audit.append_activity(
            NewActivityLog::new(ActivityAction::Delete, AuditEntity::User, client)
                .by(actor.id, actor.organization_id)
                .on(updated.id)
                .with_details(json!({ "username": updated.username })),
        );
        Ok(())
    }

    async fn terminate_sessions(&self, actor: &User, target: &User, client: &ClientInfo) -> Result<(), AppError> {
        let removed = self.session_repo.delete_user_sessions(target.id).await?;
        if removed > 0 {
            self.audit.append_security(
                NewSecurityLog::new(SecurityEvent::SessionTerminated, client)
                    .by(target.id, target.organization_id)
                    .with_details(json!({ "sessions": removed, "by": actor.id })),
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn user(role: UserRole, organization_id: Option<Uuid>) -> User {
        User {
            id: Uuid::new_v4(),
            organization_id,
            username: "carlos".into(),
            email: "carlos@acme.com.br".into(),
            password_hash: String::new(),
            name: "Carlos".into(),
            role,
            status: AccountStatus::Active,
            two_factor_enabled: false,
            two_factor_secret: None,
            failed_login_attempts: 0,
            last_failed_login_at: None,
            last_login_at: None,
            last_login_ip: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn org_admin_manages_only_own_organization() {
        let org = Uuid::new_v4();
        let admin = user(UserRole::OrgAdmin, Some(org));

        assert!(ensure_manageable(&admin, &user(UserRole::User, Some(org))).is_ok());
        assert!(ensure_manageable(&admin, &user(UserRole::User, Some(Uuid::new_v4()))).is_err());
        assert!(ensure_manageable(&admin, &user(UserRole::SystemAdmin, Some(org))).is_err());
    }

    #[test]
    fn regular_user_manages_nobody() {
        let org = Uuid::new_v4();
        let plain = user(UserRole::User, Some(org));
        assert!(matches!(
            ensure_manageable(&plain, &user(UserRole::User, Some(org))),
            Err(AppError::AdminRequired)
        ));
    }

    #[test]
    fn only_system_admin_assigns_system_admin() {
        let org = Uuid::new_v4();
        assert!(ensure_can_assign(&user(UserRole::OrgAdmin, Some(org)), UserRole::SystemAdmin).is_err());
        assert!(ensure_can_assign(&user(UserRole::OrgAdmin, Some(org)), UserRole::OrgAdmin).is_ok());
        assert!(ensure_can_assign(&user(UserRole::SystemAdmin, None), UserRole::SystemAdmin).is_ok());
    }
}
