//! Normalization of raw IXC records into the canonical roster shape.
//!
//! The upstream schema is inconsistent across record variants: fields go
//! missing, show up under near-duplicate names, and use pt-BR formats
//! (`DD/MM/YYYY` dates, comma decimals). Every target field therefore reads
//! through an ordered fallback chain, and normalization never fails: missing
//! data resolves to placeholders.

#![allow(dead_code)]

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::schemas::ClienteInadimplente;

/// Status label a freshly normalized record starts with; the collections team
/// moves it to "Em Cobrança Externa" / "Aguardando Retorno" downstream.
pub const STATUS_ENVIO_INICIAL: &str = "Não Enviado";

/// Tri-state protest flag. Unrecognized input stays `Indefinido`; collapsing
/// it to "Não" would misreport records already sent to collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Protesto {
    #[serde(rename = "Sim")]
    Sim,
    #[serde(rename = "Não")]
    Nao,
    #[serde(rename = "Indefinido")]
    Indefinido,
}

/// Delinquency aging buckets used by the roster views.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaixaAtraso {
    Corrente,
    Atencao,
    Critica,
}

/// Collections dispatch classification, matched diacritic-insensitively.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvioCobranca {
    NaoEnviado,
    EmCobrancaExterna,
    AguardandoRetorno,
}

fn valor_texto(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => {
            let trimmed = text.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

/// First non-empty text among `keys`, in order.
pub fn texto_em(raw: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| raw.get(*key).and_then(valor_texto))
}

/// Merge helper: first non-empty text among `keys`, else the current value.
pub fn escolhe_texto(atual: &str, raw: &Map<String, Value>, keys: &[&str]) -> String {
    texto_em(raw, keys).unwrap_or_else(|| atual.to_string())
}

/// Accepts native numbers and strings with a comma decimal separator.
pub fn parse_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(number) => {
            if let Some(inteiro) = number.as_i64() {
                return Some(Decimal::from(inteiro));
            }
            number.as_f64().and_then(|f| Decimal::try_from(f).ok())
        }
        Value::String(text) => {
            let normalizado = text.trim().replace(',', ".");
            if normalizado.is_empty() {
                return None;
            }
            normalizado.parse::<Decimal>().ok()
        }
        _ => None,
    }
}

/// First parseable amount among `keys`, in order.
pub fn decimal_em(raw: &Map<String, Value>, keys: &[&str]) -> Option<Decimal> {
    keys.iter().find_map(|key| raw.get(*key).and_then(parse_decimal))
}

/// Parses `DD/MM/YYYY` and ISO-ish date strings. Unparseable input yields
/// `None` so callers can keep walking their own date fallback chain.
pub fn parse_data_bruta(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    if trimmed.contains('/') {
        let mut partes = trimmed.splitn(3, '/');
        let dia = partes.next()?.trim().parse::<u32>().ok()?;
        let mes = partes.next()?.trim().parse::<u32>().ok()?;
        let ano = partes.next()?.trim().parse::<i32>().ok()?;
        return NaiveDate::from_ymd_opt(ano, mes, dia);
    }

    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S"))
        .ok()
        .or_else(|| {
            chrono::DateTime::parse_from_rfc3339(trimmed)
                .ok()
                .map(|dt| dt.date_naive())
        })
}

/// First parseable date among `keys`, in order.
pub fn data_em(raw: &Map<String, Value>, keys: &[&str]) -> Option<NaiveDate> {
    keys.iter().find_map(|key| {
        raw.get(*key)
            .and_then(valor_texto)
            .and_then(|texto| parse_data_bruta(&texto))
    })
}

pub fn formata_data_pt_br(data: Option<NaiveDate>) -> String {
    match data {
        Some(d) => d.format("%d-%m-%Y").to_string(),
        None => "-".to_string(),
    }
}

/// Whole days past due, floored at zero. Both sides are plain calendar dates,
/// so time of day never skews the count.
pub fn dias_atraso(vencimento: Option<NaiveDate>, hoje: NaiveDate) -> i64 {
    vencimento
        .map(|data| (hoje - data).num_days().max(0))
        .unwrap_or(0)
}

pub fn faixa_atraso(dias: i64) -> FaixaAtraso {
    if dias >= 90 {
        FaixaAtraso::Critica
    } else if dias >= 30 {
        FaixaAtraso::Atencao
    } else {
        FaixaAtraso::Corrente
    }
}

pub fn parse_protesto(value: Option<&Value>) -> Protesto {
    let Some(value) = value else {
        return Protesto::Indefinido;
    };
    match value {
        Value::Bool(true) => Protesto::Sim,
        Value::Bool(false) => Protesto::Nao,
        Value::Number(number) => match number.as_f64() {
            Some(n) if n == 0.0 => Protesto::Nao,
            Some(_) => Protesto::Sim,
            None => Protesto::Indefinido,
        },
        Value::String(text) => match normaliza_status(text).trim() {
            "1" | "true" | "sim" | "s" => Protesto::Sim,
            "0" | "false" | "nao" | "n" => Protesto::Nao,
            _ => Protesto::Indefinido,
        },
        _ => Protesto::Indefinido,
    }
}

/// Lowercases and strips diacritics so labels can be matched against plain
/// keyword substrings like "cobranca" and "aguardando".
pub fn normaliza_status(raw: &str) -> String {
    raw.chars()
        .map(sem_diacritico)
        .collect::<String>()
        .to_lowercase()
}

pub fn classifica_envio(status_envio: &str) -> EnvioCobranca {
    let normalizado = normaliza_status(status_envio);
    if normalizado.contains("cobranca") {
        return EnvioCobranca::EmCobrancaExterna;
    }
    if normalizado.contains("aguardando") {
        return EnvioCobranca::AguardandoRetorno;
    }
    EnvioCobranca::NaoEnviado
}

fn sem_diacritico(c: char) -> char {
    match c {
        'á' | 'â' | 'ã' | 'à' | 'ä' => 'a',
        'Á' | 'Â' | 'Ã' | 'À' | 'Ä' => 'A',
        'é' | 'ê' | 'è' | 'ë' => 'e',
        'É' | 'Ê' | 'È' | 'Ë' => 'E',
        'í' | 'î' | 'ì' | 'ï' => 'i',
        'Í' | 'Î' | 'Ì' | 'Ï' => 'I',
        'ó' | 'ô' | 'õ' | 'ò' | 'ö' => 'o',
        'Ó' | 'Ô' | 'Õ' | 'Ò' | 'Ö' => 'O',
        'ú' | 'û' | 'ù' | 'ü' => 'u',
        'Ú' | 'Û' | 'Ù' | 'Ü' => 'U',
        'ç' => 'c',
        'Ç' => 'C',
        'ñ' => 'n',
        'Ñ' => 'N',
        outro => outro,
    }
}

fn traco() -> String {
    "-".to_string()
}

/// Maps one raw `fn_areceber` record into a complete roster row. Total: any
/// field the fallback chains cannot resolve gets a documented placeholder.
pub fn normaliza_titulo(
    raw: &Map<String, Value>,
    ordinal: usize,
    hoje: NaiveDate,
) -> ClienteInadimplente {
    let posicao = ordinal + 1;
    let id_titulo = texto_em(raw, &["id"]);
    let id_cliente_bruto = texto_em(raw, &["id_cliente"]);

    let doc_padrao = format!(
        "DOC-{}",
        id_titulo.clone().unwrap_or_else(|| posicao.to_string())
    );
    let id_boleto = texto_em(raw, &["documento", "id", "contrato"]).unwrap_or(doc_padrao);

    let cliente = texto_em(raw, &["cliente_nome", "cliente", "nome_razao"]).unwrap_or_else(|| {
        format!(
            "Cliente {}",
            id_cliente_bruto.clone().unwrap_or_else(|| posicao.to_string())
        )
    });
    let razao_social =
        texto_em(raw, &["nome_razao", "razao", "cliente_nome"]).unwrap_or_else(|| cliente.clone());

    let vencimento_data = data_em(raw, &["data_vencimento", "vencimento"]);

    ClienteInadimplente {
        id: id_titulo.unwrap_or_else(|| format!("registro-{ordinal}")),
        id_cliente: id_cliente_bruto.unwrap_or_else(|| format!("cliente-{posicao}")),
        cliente,
        razao_social,
        cpf_cnpj: texto_em(raw, &["cpf_cnpj", "cnpj_cpf"]).unwrap_or_else(|| "N/A".to_string()),
        email: texto_em(raw, &["email", "email_principal", "email_contato"])
            .unwrap_or_else(traco),
        endereco: texto_em(raw, &["endereco", "logradouro"]).unwrap_or_else(traco),
        numero: texto_em(raw, &["numero", "num"]).unwrap_or_else(traco),
        complemento: texto_em(raw, &["complemento"]).unwrap_or_else(traco),
        bairro: texto_em(raw, &["bairro"]).unwrap_or_else(traco),
        cidade: texto_em(raw, &["cidade", "municipio"]).unwrap_or_else(traco),
        estado: texto_em(raw, &["estado", "uf"]).unwrap_or_else(traco),
        cep: texto_em(raw, &["cep"]).unwrap_or_else(traco),
        telefone: texto_em(raw, &["telefone", "telefone1", "telefone2", "celular", "fone"])
            .unwrap_or_else(traco),
        id_boleto: id_boleto.clone(),
        emissao: formata_data_pt_br(data_em(raw, &["data_emissao", "emissao"])),
        vencimento: formata_data_pt_br(vencimento_data),
        descricao_cobranca: texto_em(raw, &["obs", "descricao", "periodo_cobranca", "referencia"])
            .unwrap_or_else(traco),
        status_boleto: texto_em(raw, &["status", "status_boleto"]).unwrap_or_else(traco),
        dias_atraso: dias_atraso(vencimento_data, hoje),
        valor_total: decimal_em(raw, &["valor_aberto", "valor", "valor_total"])
            .unwrap_or_default(),
        foi_protestado: parse_protesto(
            raw.get("foi_protestado").or_else(|| raw.get("protestado")),
        ),
        contrato: texto_em(raw, &["contrato", "contrato_id", "id_contrato"])
            .unwrap_or_else(traco),
        status_envio: STATUS_ENVIO_INICIAL.to_string(),
        titulos: vec![id_boleto],
    }
}
