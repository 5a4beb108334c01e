// src/models.rs

pub mod audit;
pub mod auth;
pub mod certificate;
pub mod company;
pub mod dashboard;
pub mod organization;
pub mod permission;

use thiserror::Error;

// Valor textual do banco que não corresponde a nenhuma variante conhecida.
#[derive(Debug, Error)]
#[error("valor desconhecido '{0}'")]
pub struct UnknownVariant(pub String);
