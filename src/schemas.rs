use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::services::normalize::Protesto;

/// Query string of `GET /period-summary`. Parameters arrive as free text and
/// are parsed leniently; garbage falls back to the current month/year.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FluxoQuery {
    pub mes: Option<String>,
    pub ano: Option<String>,
    pub refresh: Option<String>,
}

/// Query string of `GET /delinquency-roster`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InadimplenciaQuery {
    pub page: Option<String>,
    pub rp: Option<String>,
    pub search: Option<String>,
    pub refresh: Option<String>,
}

/// One delinquent customer row, normalized from a raw `fn_areceber` record.
/// Every field is resolved through a fallback chain and always populated
/// (placeholders `-`, `N/A` or a synthesized label), so rendering never has to
/// deal with nulls.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClienteInadimplente {
    pub id: String,
    pub id_cliente: String,
    pub cliente: String,
    pub razao_social: String,
    pub cpf_cnpj: String,
    pub email: String,
    pub endereco: String,
    pub numero: String,
    pub complemento: String,
    pub bairro: String,
    pub cidade: String,
    pub estado: String,
    pub cep: String,
    pub telefone: String,
    pub id_boleto: String,
    pub emissao: String,
    pub vencimento: String,
    pub descricao_cobranca: String,
    pub status_boleto: String,
    pub dias_atraso: i64,
    pub valor_total: Decimal,
    pub foi_protestado: Protesto,
    pub contrato: String,
    pub status_envio: String,
    pub titulos: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Periodo {
    pub inicio: NaiveDate,
    pub fim: NaiveDate,
}

/// Cached result of one month's cash-flow aggregation. Recomputed per cache
/// miss, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FluxoResumo {
    pub total_valor: Decimal,
    pub total_recebido: Decimal,
    pub total_em_aberto: Decimal,
    pub taxa_aberto: Decimal,
    pub periodo: Periodo,
    pub registros_considerados: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FluxoResponse {
    pub success: bool,
    pub total_valor: Decimal,
    pub total_recebido: Decimal,
    pub total_em_aberto: Decimal,
    pub taxa_aberto: Decimal,
    pub periodo: Periodo,
    pub registros_considerados: u64,
    pub syncing: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FluxoResponse {
    pub fn ok(resumo: FluxoResumo, syncing: bool) -> Self {
        Self {
            success: true,
            total_valor: resumo.total_valor,
            total_recebido: resumo.total_recebido,
            total_em_aberto: resumo.total_em_aberto,
            taxa_aberto: resumo.taxa_aberto,
            periodo: resumo.periodo,
            registros_considerados: resumo.registros_considerados,
            syncing,
            error: None,
        }
    }

    pub fn falha(hoje: NaiveDate, message: String) -> Self {
        Self {
            success: false,
            total_valor: Decimal::ZERO,
            total_recebido: Decimal::ZERO,
            total_em_aberto: Decimal::ZERO,
            taxa_aberto: Decimal::ZERO,
            periodo: Periodo {
                inicio: hoje,
                fim: hoje,
            },
            registros_considerados: 0,
            syncing: false,
            error: Some(message),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InadimplenciaResponse {
    pub success: bool,
    pub clientes: Vec<ClienteInadimplente>,
    pub synced_at: String,
    pub syncing: bool,
    pub page: usize,
    pub per_page: usize,
    pub total: usize,
    pub total_pages: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl InadimplenciaResponse {
    pub fn falha(agora: String, message: String) -> Self {
        Self {
            success: false,
            clientes: Vec::new(),
            synced_at: agora,
            syncing: false,
            page: 1,
            per_page: 15,
            total: 0,
            total_pages: 1,
            error: Some(message),
        }
    }
}
