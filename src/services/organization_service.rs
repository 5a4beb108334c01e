// src/services/organization_service.rs

use serde_json::json;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::OrganizationRepository,
    models::{
        audit::{ActivityAction, AuditEntity, ClientInfo, NewActivityLog},
        auth::User,
        organization::{Organization, OrganizationSettings, UpdateSettingsPayload},
    },
    services::{audit_service::AuditTrail, permission_service::ensure_admin},
};

/// Organização alvo das rotas de configuração. org_admin só enxerga a
/// própria; system_admin precisa indicar qual (ou usar a sua, se tiver).
pub fn resolve_organization(actor: &User, requested: Option<Uuid>) -> Result<Uuid, AppError> {
    ensure_admin(actor)?;
    if actor.role.is_system_admin() {
        return requested
            .or(actor.organization_id)
            .ok_or_else(|| AppError::InvalidInput("Informe a organização.".into()));
    }
    match (requested, actor.organization_id) {
        (Some(req), Some(own)) if req != own => Err(AppError::Forbidden),
        (_, Some(own)) => Ok(own),
        (_, None) => Err(AppError::Forbidden),
    }
}

/// Aplica o payload sobre a configuração atual e valida os limites.
pub fn merge_settings(
    mut current: OrganizationSettings,
    payload: UpdateSettingsPayload,
) -> Result<OrganizationSettings, AppError> {
    if let Some(policy) = payload.password_policy {
        if !(6..=128).contains(&policy.min_length) {
            return Err(AppError::InvalidInput("O tamanho mínimo de senha deve ficar entre 6 e 128.".into()));
        }
        current.password_policy = policy;
    }
    if let Some(policy) = payload.two_factor_policy {
        current.two_factor_policy = policy;
    }
    if let Some(policy) = payload.session_policy {
        if !(1..=720).contains(&policy.max_age_hours) {
            return Err(AppError::InvalidInput("A duração da sessão deve ficar entre 1 e 720 horas.".into()));
        }
        current.session_policy = policy;
    }
    if let Some(policy) = payload.notification_policy {
        if !(1..=365).contains(&policy.expiration_warning_days) {
            return Err(AppError::InvalidInput("O aviso de vencimento deve ficar entre 1 e 365 dias.".into()));
        }
        current.notification_policy = policy;
    }
    Ok(current)
}

#[derive(Clone)]
pub struct OrganizationService {
    repo: OrganizationRepository,
    audit: AuditTrail,
}

impl OrganizationService {
    pub fn new(repo: OrganizationRepository, audit: AuditTrail) -> Self {
        Self { repo, audit }
    }

    pub async fn get_organization(&self, actor: &User, requested: Option<Uuid>) -> Result<Organization, AppError> {
        let org_id = resolve_organization(actor, requested)?;
        self.repo.find_by_id(org_id).await?.ok_or(AppError::OrganizationNotFound)
    }

    pub async fn get_settings(&self, actor: &User, requested: Option<Uuid>) -> Result<OrganizationSettings, AppError> {
        let org = self.get_organization(actor, requested).await?;
        self.repo.get_settings(org.id).await
    }

    pub async fn update_settings(
        &self,
        actor: &User,
        requested: Option<Uuid>,
        payload: UpdateSettingsPayload,
        client: &ClientInfo,
    ) -> Result<OrganizationSettings, AppError> {
        let org = self.get_organization(actor, requested).await?;

        let mut changed = Vec::new();
        if payload.password_policy.is_some() { changed.push("passwordPolicy"); }
        if payload.two_factor_policy.is_some() { changed.push("twoFactorPolicy"); }
        if payload.session_policy.is_some() { changed.push("sessionPolicy"); }
        if payload.notification_policy.is_some() { changed.push("notificationPolicy"); }

        let merged = merge_settings(self.repo.get_settings(org.id).await?, payload)?;
        let saved = self.repo.upsert_settings(&merged).await?;

        tracing::info!("⚙️ Configurações da organização '{}' atualizadas por {}", org.name, actor.username);
        self.audit.append_activity(
            NewActivityLog::new(ActivityAction::UpdateSettings, AuditEntity::Organization, client)
                .by(actor.id, actor.organization_id)
                .on(org.id)
                .with_details(json!({ "changedFields": changed })),
        );

        Ok(saved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        auth::{AccountStatus, UserRole},
        organization::{SessionPolicy, TwoFactorPolicy},
    };
    use chrono::Utc;

    fn admin(role: UserRole, organization_id: Option<Uuid>) -> User {
        User {
            id: Uuid::new_v4(),
            organization_id,
            username: "admin".into(),
            email: "admin@acme.com.br".into(),
            password_hash: String::new(),
            name: "Admin".into(),
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

    fn empty_payload() -> UpdateSettingsPayload {
        UpdateSettingsPayload {
            password_policy: None,
            two_factor_policy: None,
            session_policy: None,
            notification_policy: None,
        }
    }

    #[test]
    fn org_admin_is_pinned_to_own_organization() {
        let org = Uuid::new_v4();
        let actor = admin(UserRole::OrgAdmin, Some(org));
        assert_eq!(resolve_organization(&actor, None).unwrap(), org);
        assert!(matches!(resolve_organization(&actor, Some(Uuid::new_v4())), Err(AppError::Forbidden)));
    }

    #[test]
    fn system_admin_must_name_an_organization() {
        let root = admin(UserRole::SystemAdmin, None);
        assert!(resolve_organization(&root, None).is_err());
        let org = Uuid::new_v4();
        assert_eq!(resolve_organization(&root, Some(org)).unwrap(), org);
    }

    #[test]
    fn merge_keeps_untouched_policies() {
        let current = OrganizationSettings::defaults_for(Uuid::new_v4());
        let payload = UpdateSettingsPayload {
            two_factor_policy: Some(TwoFactorPolicy { required_for_admins: true, required_for_all: false }),
            ..empty_payload()
        };
        let merged = merge_settings(current.clone(), payload).unwrap();
        assert!(merged.two_factor_policy.required_for_admins);
        assert_eq!(merged.password_policy, current.password_policy);
        assert_eq!(merged.session_policy, current.session_policy);
    }

    #[test]
    fn merge_rejects_out_of_range_session_age() {
        let current = OrganizationSettings::defaults_for(Uuid::new_v4());
        let payload = UpdateSettingsPayload {
            session_policy: Some(SessionPolicy { max_age_hours: 0 }),
            ..empty_payload()
        };
        assert!(matches!(merge_settings(current, payload), Err(AppError::InvalidInput(_))));
    }
}
