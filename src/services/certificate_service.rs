// src/services/certificate_service.rs

use std::collections::HashMap;

use chrono::{NaiveDate, Utc};
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    crypto::SecretCipher,
    db::{
        certificate_repo::{CertificateChanges, NewCertificate},
        CertificateRepository,
    },
    models::{
        audit::{ActivityAction, AuditEntity, ClientInfo, NewActivityLog},
        auth::{Session, User},
        certificate::{
            Certificate, CertificateListQuery, CertificatePasswordResponse, CertificateResponse,
            CertificateSystem, CreateCertificatePayload, UpdateCertificatePayload,
        },
        permission::CompanyAction,
    },
    services::{audit_service::AuditTrail, auth::AuthService, permission_service::PermissionService},
};

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

fn check_dates(issued: NaiveDate, expiration: NaiveDate) -> Result<(), AppError> {
    if expiration < issued {
        return Err(AppError::InvalidInput(
            "A data de validade não pode ser anterior à data de emissão.".into(),
        ));
    }
    Ok(())
}

// Agrupa os sistemas por certificado, mantendo a ordem de chegada
fn group_systems(systems: Vec<CertificateSystem>) -> HashMap<Uuid, Vec<CertificateSystem>> {
    let mut grouped: HashMap<Uuid, Vec<CertificateSystem>> = HashMap::new();
    for system in systems {
        grouped.entry(system.certificate_id).or_default().push(system);
    }
    grouped
}

#[derive(Clone)]
pub struct CertificateService {
    repo: CertificateRepository,
    permissions: PermissionService,
    auth: AuthService,
    cipher: SecretCipher,
    audit: AuditTrail,
    pool: PgPool,
}

impl CertificateService {
    pub fn new(
        repo: CertificateRepository,
        permissions: PermissionService,
        auth: AuthService,
        cipher: SecretCipher,
        audit: AuditTrail,
        pool: PgPool,
    ) -> Self {
        Self { repo, permissions, auth, cipher, audit, pool }
    }

    async fn load(&self, id: Uuid) -> Result<Certificate, AppError> {
        self.repo.find_by_id(id).await?.ok_or(AppError::CertificateNotFound)
    }

    async fn respond(&self, certificate: Certificate) -> Result<CertificateResponse, AppError> {
        let systems = self.repo.systems_for(&[certificate.id]).await?;
        Ok(CertificateResponse::build(certificate, systems, today()))
    }

    // ---
    // Leitura
    // ---

    pub async fn list_certificates(
        &self,
        actor: &User,
        query: CertificateListQuery,
    ) -> Result<Vec<CertificateResponse>, AppError> {
        let company_ids: Vec<Uuid> = match query.company_id {
            Some(company_id) => {
                let company = self
                    .permissions
                    .authorize_company(actor, company_id, CompanyAction::View)
                    .await?;
                vec![company.id]
            }
            None => self
                .permissions
                .accessible_companies(actor)
                .await?
                .into_iter()
                .map(|c| c.id)
                .collect(),
        };

        if company_ids.is_empty() {
            return Ok(Vec::new());
        }

        let certificates = self.repo.list_by_companies(&company_ids).await?;
        let certificate_ids: Vec<Uuid> = certificates.iter().map(|c| c.id).collect();
        let mut systems = group_systems(self.repo.systems_for(&certificate_ids).await?);

        let today = today();
        let responses = certificates
            .into_iter()
            .map(|cert| {
                let own = systems.remove(&cert.id).unwrap_or_default();
                CertificateResponse::build(cert, own, today)
            })
            .filter(|r| query.status.is_none_or(|status| r.status == status))
            .collect();

        Ok(responses)
    }

    pub async fn get_certificate(
        &self,
        actor: &User,
        id: Uuid,
        client: &ClientInfo,
    ) -> Result<CertificateResponse, AppError> {
        let certificate = self.load(id).await?;
        self.permissions
            .authorize_company(actor, certificate.company_id, CompanyAction::View)
            .await?;

        let log = NewActivityLog::new(ActivityAction::View, AuditEntity::Certificate, client)
            .by(actor.id, actor.organization_id)
            .on(certificate.id)
            .in_company(certificate.company_id);

        // Só registra a visualização que de fato chegou ao cliente
        let response = self.respond(certificate).await?;
        self.audit.append_activity(log);
        Ok(response)
    }

    /// Revela a senha. Exige `can_view` + `can_view_password` na empresa
    /// e, quando aplicável, a sessão verificada com o segundo fator.
    pub async fn reveal_password(
        &self,
        actor: &User,
        session: &Session,
        id: Uuid,
        client: &ClientInfo,
    ) -> Result<CertificatePasswordResponse, AppError> {
        let certificate = self.load(id).await?;
        self.permissions
            .authorize_company(actor, certificate.company_id, CompanyAction::ViewPassword)
            .await?;
        self.auth.ensure_two_factor(actor, session).await?;

        let password = self.cipher.decrypt(&certificate.encrypted_password)?;

        tracing::info!("🔑 Senha do certificado {} revelada para {}", certificate.id, actor.username);
        self.audit.append_activity(
            NewActivityLog::new(ActivityAction::ViewPassword, AuditEntity::Certificate, client)
                .by(actor.id, actor.organization_id)
                .on(certificate.id)
                .in_company(certificate.company_id)
                .with_details(json!({ "name": certificate.name })),
        );

        Ok(CertificatePasswordResponse { certificate_id: certificate.id, password })
    }

    // ---
    // Escrita
    // ---

    pub async fn create_certificate(
        &self,
        actor: &User,
        payload: CreateCertificatePayload,
        client: &ClientInfo,
    ) -> Result<CertificateResponse, AppError> {
        self.permissions
            .authorize_company(actor, payload.company_id, CompanyAction::Edit)
            .await?;
        check_dates(payload.issued_date, payload.expiration_date)?;

        let encrypted_password = self.cipher.encrypt(&payload.password);

        let mut tx = self.pool.begin().await?;

        let certificate = self
            .repo
            .create_certificate(
                &mut *tx,
                NewCertificate {
                    company_id: payload.company_id,
                    name: payload.name.trim(),
                    entity_name: payload.entity_name.trim(),
                    identifier: payload.identifier.trim(),
                    certificate_type: payload.certificate_type,
                    issued_date: payload.issued_date,
                    expiration_date: payload.expiration_date,
                    encrypted_password: &encrypted_password,
                    file_path: payload.file_path.as_deref(),
                    created_by: actor.id,
                },
            )
            .await?;

        let systems = self
            .repo
            .insert_systems(&mut *tx, certificate.id, &payload.systems)
            .await?;

        tx.commit().await?;

        self.audit.append_activity(
            NewActivityLog::new(ActivityAction::Create, AuditEntity::Certificate, client)
                .by(actor.id, actor.organization_id)
                .on(certificate.id)
                .in_company(certificate.company_id)
                .with_details(json!({
                    "name": certificate.name,
                    "type": certificate.certificate_type.as_str(),
                    "expirationDate": certificate.expiration_date,
                })),
        );

        Ok(CertificateResponse::build(certificate, systems, today()))
    }

    /// Atualização parcial. Se `systems` vier, a lista é substituída inteira.
    pub async fn update_certificate(
        &self,
        actor: &User,
        id: Uuid,
        payload: UpdateCertificatePayload,
        client: &ClientInfo,
    ) -> Result<CertificateResponse, AppError> {
        let current = self.load(id).await?;
        self.permissions
            .authorize_company(actor, current.company_id, CompanyAction::Edit)
            .await?;

        check_dates(
            payload.issued_date.unwrap_or(current.issued_date),
            payload.expiration_date.unwrap_or(current.expiration_date),
        )?;

        let encrypted_password = payload.password.as_deref().map(|p| self.cipher.encrypt(p));
        let changed_fields = payload.changed_fields();

        let mut tx = self.pool.begin().await?;

        let certificate = self
            .repo
            .update_certificate(
                &mut *tx,
                id,
                CertificateChanges {
                    name: payload.name.as_deref().map(str::trim),
                    entity_name: payload.entity_name.as_deref().map(str::trim),
                    identifier: payload.identifier.as_deref().map(str::trim),
                    certificate_type: payload.certificate_type,
                    issued_date: payload.issued_date,
                    expiration_date: payload.expiration_date,
                    encrypted_password: encrypted_password.as_deref(),
                    file_path: payload.file_path.as_deref(),
                },
                actor.id,
            )
            .await?
            .ok_or(AppError::CertificateNotFound)?;

        if let Some(systems) = &payload.systems {
            self.repo.delete_systems(&mut *tx, id).await?;
            self.repo.insert_systems(&mut *tx, id, systems).await?;
        }

        tx.commit().await?;

        // Só os nomes dos campos: valores (senha inclusive) ficam fora do log
        self.audit.append_activity(
            NewActivityLog::new(ActivityAction::Update, AuditEntity::Certificate, client)
                .by(actor.id, actor.organization_id)
                .on(certificate.id)
                .in_company(certificate.company_id)
                .with_details(json!({ "changedFields": changed_fields })),
        );

        self.respond(certificate).await
    }

    pub async fn delete_certificate(&self, actor: &User, id: Uuid, client: &ClientInfo) -> Result<(), AppError> {
        let certificate = self.load(id).await?;
        self.permissions
            .authorize_company(actor, certificate.company_id, CompanyAction::Delete)
            .await?;

        if !self.repo.delete_certificate(id).await? {
            return Err(AppError::CertificateNotFound);
        }

        self.audit.append_activity(
            NewActivityLog::new(ActivityAction::Delete, AuditEntity::Certificate, client)
                .by(actor.id, actor.organization_id)
                .on(certificate.id)
                .in_company(certificate.company_id)
                .with_details(json!({ "name": certificate.name })),
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::{
            auth::UserRole,
            certificate::{CertificateSystemInput, CertificateType},
            permission::PermissionFlags,
        },
        services::testing::Fixture,
    };

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn system(certificate_id: Uuid, name: &str) -> CertificateSystem {
        CertificateSystem {
            id: Uuid::new_v4(),
            certificate_id,
            name: name.into(),
            url: None,
            environment: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn expiration_before_issue_is_rejected() {
        assert!(check_dates(date(2026, 1, 10), date(2025, 1, 10)).is_err());
        assert!(check_dates(date(2025, 1, 10), date(2025, 1, 10)).is_ok());
        assert!(check_dates(date(2025, 1, 10), date(2026, 1, 10)).is_ok());
    }

    #[test]
    fn systems_are_grouped_per_certificate() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let grouped = group_systems(vec![system(a, "SEFAZ"), system(b, "eSocial"), system(a, "Prefeitura")]);

        let names: Vec<&str> = grouped[&a].iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["SEFAZ", "Prefeitura"]);
        assert_eq!(grouped[&b].len(), 1);
    }

    fn nfe_a1(company_id: Uuid) -> CreateCertificatePayload {
        CreateCertificatePayload {
            company_id,
            name: "NFe A1".into(),
            entity_name: "Acme Comércio Ltda".into(),
            identifier: "12.345.678/0001-99".into(),
            certificate_type: CertificateType::A1,
            issued_date: date(2025, 1, 10),
            expiration_date: date(2026, 1, 10),
            password: "s3cr3t".into(),
            file_path: None,
            systems: vec![CertificateSystemInput {
                name: "SEFAZ".into(),
                url: Some("https://nfe.fazenda.gov.br".into()),
                environment: Some("produção".into()),
            }],
        }
    }

    #[sqlx::test]
    #[ignore = "requer Postgres em DATABASE_URL"]
    async fn acme_certificate_lifecycle_is_audited(pool: PgPool) {
        let fx = Fixture::new(pool).await;
        let ana = fx.user("ana", UserRole::User).await;
        let vitor = fx.user("vitor", UserRole::User).await;
        let acme = fx.company("Acme", "12345678000199").await;
        fx.grant(&ana, &acme, PermissionFlags::full()).await;
        let ana_session = fx.session(&ana, false).await;
        let vitor_session = fx.session(&vitor, false).await;

        let created = fx
            .certificates
            .create_certificate(&ana, nfe_a1(acme.id), &fx.client)
            .await
            .unwrap();
        let id = created.certificate.id;
        assert_eq!(created.systems.len(), 1);
        assert_ne!(created.certificate.encrypted_password, "s3cr3t");

        let revealed = fx
            .certificates
            .reveal_password(&ana, &ana_session, id, &fx.client)
            .await
            .unwrap();
        assert_eq!(revealed.password, "s3cr3t");

        // Sem linha de permissão, nada: nem a senha, nem o certificado
        let denied = fx.certificates.reveal_password(&vitor, &vitor_session, id, &fx.client).await;
        assert!(matches!(denied, Err(AppError::Forbidden)));
        let denied = fx.certificates.get_certificate(&vitor, id, &fx.client).await;
        assert!(matches!(denied, Err(AppError::Forbidden)));

        let rename = UpdateCertificatePayload { name: Some("NFe A1 (2025)".into()), ..Default::default() };
        fx.certificates
            .update_certificate(&ana, id, rename, &fx.client)
            .await
            .unwrap();
        fx.certificates.delete_certificate(&ana, id, &fx.client).await.unwrap();

        let logs = fx.sink.activity(4).await;
        let actions: Vec<ActivityAction> = logs.iter().map(|l| l.action).collect();
        assert_eq!(
            actions,
            vec![
                ActivityAction::Create,
                ActivityAction::ViewPassword,
                ActivityAction::Update,
                ActivityAction::Delete,
            ]
        );
        for log in &logs {
            assert_eq!(log.entity, AuditEntity::Certificate);
            assert_eq!(log.entity_id, Some(id));
            assert_eq!(log.company_id, Some(acme.id));
            assert_eq!(log.user_id, Some(ana.id));
            assert!(!log.details.to_string().contains("s3cr3t"));
        }
        assert_eq!(logs[2].details["changedFields"], json!(["name"]));
    }

    #[sqlx::test]
    #[ignore = "requer Postgres em DATABASE_URL"]
    async fn password_reveal_needs_the_dedicated_flag(pool: PgPool) {
        let fx = Fixture::new(pool).await;
        let admin = fx.user("carla", UserRole::OrgAdmin).await;
        let reader = fx.user("rui", UserRole::User).await;
        let acme = fx.company("Acme", "12345678000199").await;
        fx.grant(&reader, &acme, PermissionFlags { can_view: true, ..Default::default() }).await;
        let session = fx.session(&reader, false).await;

        let created = fx
            .certificates
            .create_certificate(&admin, nfe_a1(acme.id), &fx.client)
            .await
            .unwrap();
        let id = created.certificate.id;

        let visible = fx.certificates.get_certificate(&reader, id, &fx.client).await.unwrap();
        assert_eq!(visible.certificate.name, "NFe A1");

        let denied = fx.certificates.reveal_password(&reader, &session, id, &fx.client).await;
        assert!(matches!(denied, Err(AppError::Forbidden)));

        let logs = fx.sink.activity(2).await;
        let actions: Vec<ActivityAction> = logs.iter().map(|l| l.action).collect();
        assert_eq!(actions, vec![ActivityAction::Create, ActivityAction::View]);
    }

    #[sqlx::test]
    #[ignore = "requer Postgres em DATABASE_URL"]
    async fn failed_read_leaves_no_view_entry(pool: PgPool) {
        let fx = Fixture::new(pool).await;
        let admin = fx.user("carla", UserRole::OrgAdmin).await;
        let acme = fx.company("Acme", "12345678000199").await;
        let created = fx
            .certificates
            .create_certificate(&admin, nfe_a1(acme.id), &fx.client)
            .await
            .unwrap();

        // O certificado carrega, mas a leitura dos sistemas falha
        sqlx::query("DROP TABLE certificate_systems").execute(&fx.pool).await.unwrap();

        let result = fx
            .certificates
            .get_certificate(&admin, created.certificate.id, &fx.client)
            .await;
        assert!(matches!(result, Err(AppError::DatabaseError(_))));

        let logs = fx.sink.activity(1).await;
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].action, ActivityAction::Create);
    }
}
