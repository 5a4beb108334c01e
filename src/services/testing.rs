// src/services/testing.rs

// Montagem dos serviços sobre um banco real para os testes com #[sqlx::test].
// Rodam com DATABASE_URL apontando para um Postgres: `cargo test -- --ignored`.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;

use crate::{
    common::error::AppError,
    crypto::SecretCipher,
    db::{
        user_repo::NewUser, CertificateRepository, CompanyRepository, OrganizationRepository, PermissionRepository,
        SessionRepository, UserRepository,
    },
    models::{
        audit::{ClientInfo, NewActivityLog, NewSecurityLog},
        auth::{Session, User, UserRole},
        company::Company,
        organization::Organization,
        permission::PermissionFlags,
    },
    services::{
        audit_service::{AuditSink, AuditTrail},
        auth::{hash_blocking, AuthService},
        certificate_service::CertificateService,
        permission_service::PermissionService,
    },
};

pub const TEST_PASSWORD: &str = "Senha#Forte1";
const TEST_ENCRYPTION_KEY: &str = "chave-de-testes-com-32-bytes-ok!";

/// Guarda em memória tudo o que a trilha de auditoria gravaria.
#[derive(Default)]
pub struct RecordingSink {
    activity: Mutex<Vec<NewActivityLog>>,
    security: Mutex<Vec<NewSecurityLog>>,
}

#[async_trait]
impl AuditSink for RecordingSink {
    async fn write_activity(&self, entry: &NewActivityLog) -> Result<(), AppError> {
        self.activity.lock().unwrap().push(entry.clone());
        Ok(())
    }

    async fn write_security(&self, entry: &NewSecurityLog) -> Result<(), AppError> {
        self.security.lock().unwrap().push(entry.clone());
        Ok(())
    }
}

impl RecordingSink {
    // O worker grava em segundo plano; espera até `expected` registros e dá
    // uma folga para que um registro a mais também apareça
    async fn settle<T: Clone>(records: &Mutex<Vec<T>>, expected: usize) -> Vec<T> {
        for _ in 0..100 {
            if records.lock().unwrap().len() >= expected {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
        records.lock().unwrap().clone()
    }

    pub async fn activity(&self, expected: usize) -> Vec<NewActivityLog> {
        Self::settle(&self.activity, expected).await
    }

    pub async fn security(&self, expected: usize) -> Vec<NewSecurityLog> {
        Self::settle(&self.security, expected).await
    }
}

pub struct Fixture {
    pub pool: PgPool,
    pub sink: Arc<RecordingSink>,
    pub cipher: SecretCipher,
    pub auth: AuthService,
    pub permissions: PermissionService,
    pub certificates: CertificateService,
    pub users: UserRepository,
    pub sessions: SessionRepository,
    pub companies: CompanyRepository,
    pub grants: PermissionRepository,
    pub organization: Organization,
    pub client: ClientInfo,
}

impl Fixture {
    pub async fn new(pool: PgPool) -> Self {
        let sink = Arc::new(RecordingSink::default());
        let (audit, _worker) = AuditTrail::spawn(sink.clone());
        let cipher = SecretCipher::from_key_material(TEST_ENCRYPTION_KEY).unwrap();

        let users = UserRepository::new(pool.clone());
        let organizations = OrganizationRepository::new(pool.clone());
        let sessions = SessionRepository::new(pool.clone());
        let companies = CompanyRepository::new(pool.clone());
        let grants = PermissionRepository::new(pool.clone());

        let auth = AuthService::new(
            users.clone(),
            organizations.clone(),
            sessions.clone(),
            cipher.clone(),
            audit.clone(),
            "segredo-de-sessao-dos-testes".into(),
            pool.clone(),
        );
        let permissions = PermissionService::new(
            grants.clone(),
            companies.clone(),
            users.clone(),
            audit.clone(),
            pool.clone(),
        );
        let certificates = CertificateService::new(
            CertificateRepository::new(pool.clone()),
            permissions.clone(),
            auth.clone(),
            cipher.clone(),
            audit,
            pool.clone(),
        );

        let organization = organizations
            .create_organization(&pool, "Contabilidade Acme", "12345678000199", Some("acme.com.br"))
            .await
            .unwrap();

        Self {
            pool,
            sink,
            cipher,
            auth,
            permissions,
            certificates,
            users,
            sessions,
            companies,
            grants,
            organization,
            client: ClientInfo { ip_address: Some("198.51.100.9".into()), user_agent: Some("testes".into()) },
        }
    }

    pub async fn user(&self, username: &str, role: UserRole) -> User {
        let email = format!("{}@acme.com.br", username);
        let password_hash = hash_blocking(TEST_PASSWORD.into()).await.unwrap();
        self.users
            .create_user(
                &self.pool,
                NewUser {
                    organization_id: Some(self.organization.id),
                    username,
                    email: &email,
                    password_hash: &password_hash,
                    name: username,
                    role,
                },
            )
            .await
            .unwrap()
    }

    pub async fn reload(&self, user: &User) -> User {
        self.users.find_by_id(user.id).await.unwrap().unwrap()
    }

    pub async fn company(&self, name: &str, identifier: &str) -> Company {
        self.companies
            .create_company(&self.pool, self.organization.id, name, identifier)
            .await
            .unwrap()
    }

    pub async fn grant(&self, user: &User, company: &Company, flags: PermissionFlags) {
        self.grants.upsert(&self.pool, user.id, company.id, flags).await.unwrap();
    }

    pub async fn session(&self, user: &User, two_factor_authenticated: bool) -> Session {
        self.sessions
            .create_session(user.id, two_factor_authenticated, &self.client, Utc::now() + chrono::Duration::hours(1))
            .await
            .unwrap()
    }
}
