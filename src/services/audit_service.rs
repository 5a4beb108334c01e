// src/services/audit_service.rs

use std::sync::Arc;

use async_trait::async_trait;
use tokio::{sync::mpsc, task::JoinHandle};

use crate::{
    common::error::AppError,
    db::AuditRepository,
    models::{
        audit::{ActivityLog, LogQuery, NewActivityLog, NewSecurityLog, SecurityLog},
        auth::User,
    },
    services::permission_service::admin_scope,
};

/// Destino das gravações de auditoria (o banco, em produção).
#[async_trait]
pub trait AuditSink: Send + Sync + 'static {
    async fn write_activity(&self, entry: &NewActivityLog) -> Result<(), AppError>;
    async fn write_security(&self, entry: &NewSecurityLog) -> Result<(), AppError>;
}

#[derive(Debug)]
enum AuditRecord {
    Activity(NewActivityLog),
    Security(NewSecurityLog),
}

// ---
// Escrita: "dispara e esquece"
// ---

/// Handle para enfileirar registros. As chamadas nunca falham nem bloqueiam;
/// um worker em segundo plano grava e, em caso de erro, só registra no log do operador.
#[derive(Clone)]
pub struct AuditTrail {
    sender: mpsc::UnboundedSender<AuditRecord>,
}

impl AuditTrail {
    pub fn spawn(sink: Arc<dyn AuditSink>) -> (Self, JoinHandle<()>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run_worker(receiver, sink));
        (Self { sender }, handle)
    }

    pub fn append_activity(&self, entry: NewActivityLog) {
        if let Err(e) = self.sender.send(AuditRecord::Activity(entry)) {
            tracing::error!("Trilha de auditoria indisponível, registro descartado: {:?}", e.0);
        }
    }

    pub fn append_security(&self, entry: NewSecurityLog) {
        if let Err(e) = self.sender.send(AuditRecord::Security(entry)) {
            tracing::error!("Trilha de auditoria indisponível, registro descartado: {:?}", e.0);
        }
    }
}

async fn run_worker(mut receiver: mpsc::UnboundedReceiver<AuditRecord>, sink: Arc<dyn AuditSink>) {
    while let Some(record) = receiver.recv().await {
        let result = match &record {
            AuditRecord::Activity(entry) => sink.write_activity(entry).await,
            AuditRecord::Security(entry) => sink.write_security(entry).await,
        };
        if let Err(e) = result {
            tracing::error!("Falha ao gravar registro de auditoria: {} ({:?})", e, record);
        }
    }
    tracing::info!("Worker de auditoria encerrado.");
}

// ---
// Leitura: consultas administrativas
// ---

#[derive(Clone)]
pub struct AuditService {
    repo: AuditRepository,
}

impl AuditService {
    pub fn new(repo: AuditRepository) -> Self {
        Self { repo }
    }

    // org_admin fica preso à própria organização, qualquer que seja o filtro pedido
    fn scoped(actor: &User, mut query: LogQuery) -> Result<LogQuery, AppError> {
        if let Some(organization_id) = admin_scope(actor)? {
            query.organization_id = Some(organization_id);
        }
        Ok(query)
    }

    pub async fn query_activity(&self, actor: &User, query: LogQuery) -> Result<Vec<ActivityLog>, AppError> {
        let query = Self::scoped(actor, query)?;
        self.repo.query_activity(&query).await
    }

    pub async fn query_security(&self, actor: &User, query: LogQuery) -> Result<Vec<SecurityLog>, AppError> {
        let query = Self::scoped(actor, query)?;
        self.repo.query_security(&query).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::audit::{ActivityAction, AuditEntity, ClientInfo, SecurityEvent};
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    };

    #[derive(Default)]
    struct MemorySink {
        written: Mutex<Vec<String>>,
        fail_first: AtomicUsize,
    }

    #[async_trait]
    impl AuditSink for MemorySink {
        async fn write_activity(&self, entry: &NewActivityLog) -> Result<(), AppError> {
            if self.fail_first.load(Ordering::SeqCst) > 0 {
                self.fail_first.fetch_sub(1, Ordering::SeqCst);
                return Err(AppError::InternalServerError(anyhow::anyhow!("banco fora do ar")));
            }
            self.written.lock().unwrap().push(entry.action.as_str().to_string());
            Ok(())
        }

        async fn write_security(&self, entry: &NewSecurityLog) -> Result<(), AppError> {
            self.written.lock().unwrap().push(entry.event.as_str().to_string());
            Ok(())
        }
    }

    fn activity(action: ActivityAction) -> NewActivityLog {
        NewActivityLog::new(action, AuditEntity::Certificate, &ClientInfo::default())
    }

    #[tokio::test]
    async fn records_are_written_in_order() {
        let sink = Arc::new(MemorySink::default());
        let (trail, handle) = AuditTrail::spawn(sink.clone());

        trail.append_activity(activity(ActivityAction::Create));
        trail.append_security(NewSecurityLog::new(SecurityEvent::LoginSuccess, &ClientInfo::default()));
        trail.append_activity(activity(ActivityAction::ViewPassword));

        drop(trail);
        handle.await.unwrap();

        assert_eq!(
            *sink.written.lock().unwrap(),
            vec!["create", "login_success", "view_password"]
        );
    }

    #[tokio::test]
    async fn sink_failure_is_swallowed_and_worker_keeps_going() {
        let sink = Arc::new(MemorySink { fail_first: AtomicUsize::new(1), ..Default::default() });
        let (trail, handle) = AuditTrail::spawn(sink.clone());

        trail.append_activity(activity(ActivityAction::Delete));
        trail.append_activity(activity(ActivityAction::Update));

        drop(trail);
        handle.await.unwrap();

        assert_eq!(*sink.written.lock().unwrap(), vec!["update"]);
    }

    #[tokio::test]
    async fn recording_after_worker_stopped_does_not_panic() {
        let sink = Arc::new(MemorySink::default());
        let (trail, handle) = AuditTrail::spawn(sink);
        handle.abort();
        let _ = handle.await;

        trail.append_activity(activity(ActivityAction::View));
    }
}
