// src/models/permission.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

/// Ação pretendida sobre uma empresa ou seus certificados.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompanyAction {
    View,
    Edit,
    Delete,
    ViewPassword,
}

/// A tupla de permissões de um usuário em uma empresa.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PermissionFlags {
    #[serde(default)]
    pub can_view: bool,
    #[serde(default)]
    pub can_edit: bool,
    #[serde(default)]
    pub can_delete: bool,
    #[serde(default)]
    pub can_view_password: bool,
}

impl PermissionFlags {
    pub fn full() -> Self {
        Self { can_view: true, can_edit: true, can_delete: true, can_view_password: true }
    }

    /// Ver a senha exige `can_view` E `can_view_password`.
    pub fn allows(&self, action: CompanyAction) -> bool {
        match action {
            CompanyAction::View => self.can_view,
            CompanyAction::Edit => self.can_edit,
            CompanyAction::Delete => self.can_delete,
            CompanyAction::ViewPassword => self.can_view && self.can_view_password,
        }
    }
}

// Linha da tabela user_permissions
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserPermission {
    pub user_id: Uuid,
    pub company_id: Uuid,
    pub can_view: bool,
    pub can_edit: bool,
    pub can_delete: bool,
    pub can_view_password: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserPermission {
    pub fn flags(&self) -> PermissionFlags {
        PermissionFlags {
            can_view: self.can_view,
            can_edit: self.can_edit,
            can_delete: self.can_delete,
            can_view_password: self.can_view_password,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SetPermissionPayload {
    pub user_id: Uuid,
    pub company_id: Uuid,
    #[serde(flatten)]
    pub flags: PermissionFlags,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct PermissionQuery {
    pub user_id: Option<Uuid>,
    pub company_id: Option<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn view_password_requires_view_too() {
        let only_secret = PermissionFlags { can_view_password: true, ..Default::default() };
        assert!(!only_secret.allows(CompanyAction::ViewPassword));

        let both = PermissionFlags { can_view: true, can_view_password: true, ..Default::default() };
        assert!(both.allows(CompanyAction::ViewPassword));
    }

    #[test]
    fn view_without_secret_flag_cannot_reveal() {
        let view_only = PermissionFlags { can_view: true, ..Default::default() };
        assert!(view_only.allows(CompanyAction::View));
        assert!(!view_only.allows(CompanyAction::ViewPassword));
        assert!(!view_only.allows(CompanyAction::Edit));
    }

    #[test]
    fn flags_deserialize_from_flat_payload() {
        let payload: SetPermissionPayload = serde_json::from_str(
            r#"{"userId":"7d3c1b8e-8c55-4b5e-9d43-2b0f6a4f1e11",
                "companyId":"0b8f8b70-2b7c-4e7e-8d55-3e2f1c9a7d22",
                "canView":true,"canViewPassword":true}"#,
        )
        .unwrap();
        assert!(payload.flags.can_view);
        assert!(!payload.flags.can_edit);
        assert!(payload.flags.can_view_password);
    }
}
