//! Best-effort enrichment of roster rows with full customer records.
//!
//! The `fn_areceber` listing carries only partial contact data; the `cliente`
//! resource has the rest. Lookups are deduplicated, cached with a longer TTL
//! than the roster itself, and fetched in bounded concurrent batches. A
//! failing lookup is logged and skipped; the row keeps its summary-level
//! fields and the caller never sees the failure.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures::future::join_all;
use moka::future::Cache;
use serde_json::{Map, Value};

use crate::schemas::ClienteInadimplente;
use crate::services::ixc::IxcClient;
use crate::services::normalize::escolhe_texto;

pub type DetalheCache = Cache<String, Arc<Map<String, Value>>>;

pub async fn enriquece_clientes(
    client: &IxcClient,
    cache: &DetalheCache,
    batch: usize,
    clientes: &mut [ClienteInadimplente],
) {
    if clientes.is_empty() {
        return;
    }

    let mut detalhes: HashMap<String, Arc<Map<String, Value>>> = HashMap::new();
    let mut pendentes: Vec<String> = Vec::new();
    let mut vistos: HashSet<String> = HashSet::new();

    for cliente in clientes.iter() {
        let id = cliente.id_cliente.trim();
        if id.is_empty() || !vistos.insert(id.to_string()) {
            continue;
        }
        match cache.get(id).await {
            Some(detalhe) => {
                detalhes.insert(id.to_string(), detalhe);
            }
            None => pendentes.push(id.to_string()),
        }
    }

    for lote in pendentes.chunks(batch.max(1)) {
        let buscas = lote
            .iter()
            .map(|id| async move { (id.clone(), client.buscar_cliente(id).await) });

        for (id, resultado) in join_all(buscas).await {
            match resultado {
                Ok(Some(registro)) => {
                    let detalhe = Arc::new(registro);
                    cache.insert(id.clone(), Arc::clone(&detalhe)).await;
                    detalhes.insert(id, detalhe);
                }
                Ok(None) => {
                    tracing::debug!(id_cliente = %id, "cliente não encontrado no IXC");
                }
                Err(error) => {
                    tracing::warn!(id_cliente = %id, error = %error, "falha ao buscar detalhe do cliente");
                }
            }
        }
    }

    for cliente in clientes.iter_mut() {
        if let Some(detalhe) = detalhes.get(cliente.id_cliente.trim()) {
            aplica_detalhes(cliente, detalhe);
        }
    }
}

/// Field-by-field merge: a non-empty detail value wins, otherwise the row
/// keeps what the title listing gave it. The phone chain is the widest: the
/// `cliente` resource spreads numbers over a dozen near-duplicate columns.
pub fn aplica_detalhes(cliente: &mut ClienteInadimplente, detalhe: &Map<String, Value>) {
    cliente.cliente = escolhe_texto(
        &cliente.cliente,
        detalhe,
        &[
            "nome",
            "fantasia",
            "cliente",
            "nome_razao",
            "nome_razao_social",
            "razao",
        ],
    );
    cliente.razao_social = escolhe_texto(
        &cliente.razao_social,
        detalhe,
        &["razao", "razao_social", "nome_razao_social", "nome"],
    );
    cliente.cpf_cnpj = escolhe_texto(
        &cliente.cpf_cnpj,
        detalhe,
        &["cpf_cnpj", "cnpj", "cpf", "cnpj_cpf"],
    );
    cliente.email = escolhe_texto(
        &cliente.email,
        detalhe,
        &["email", "email_principal", "email_contato", "email_cobranca"],
    );
    cliente.endereco = escolhe_texto(&cliente.endereco, detalhe, &["endereco", "logradouro"]);
    cliente.numero = escolhe_texto(&cliente.numero, detalhe, &["numero", "num"]);
    cliente.complemento = escolhe_texto(&cliente.complemento, detalhe, &["complemento"]);
    cliente.bairro = escolhe_texto(&cliente.bairro, detalhe, &["bairro"]);
    cliente.cidade = escolhe_texto(&cliente.cidade, detalhe, &["cidade", "municipio"]);
    cliente.estado = escolhe_texto(&cliente.estado, detalhe, &["estado", "uf"]);
    cliente.cep = escolhe_texto(&cliente.cep, detalhe, &["cep"]);
    cliente.descricao_cobranca = escolhe_texto(&cliente.descricao_cobranca, detalhe, &["obs"]);
    cliente.telefone = escolhe_texto(
        &cliente.telefone,
        detalhe,
        &[
            "telefone",
            "telefone1",
            "telefone2",
            "telefone_contato",
            "fone",
            "fone_contato",
            "celular",
            "celular_contato",
            "telefone_celular",
            "telefone_comercial",
            "whatsapp",
        ],
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::normalize::normaliza_titulo;
    use chrono::NaiveDate;
    use serde_json::json;

    fn registro(value: Value) -> Map<String, Value> {
        value.as_object().expect("object literal").clone()
    }

    fn cliente_base() -> ClienteInadimplente {
        let hoje = NaiveDate::from_ymd_opt(2025, 6, 10).expect("valid date");
        normaliza_titulo(
            &registro(json!({
                "id": "7001",
                "id_cliente": "88",
                "cliente_nome": "Maria",
                "telefone": "", // vazio no título, deve vir do detalhe
                "email": "maria@titulo.com"
            })),
            0,
            hoje,
        )
    }

    #[test]
    fn detail_values_win_over_summary_placeholders() {
        let mut cliente = cliente_base();
        assert_eq!(cliente.telefone, "-");

        aplica_detalhes(
            &mut cliente,
            &registro(json!({
                "razao_social": "Maria Comercio ME",
                "whatsapp": "55 11 99999-0000",
                "cidade": "Curitiba"
            })),
        );

        assert_eq!(cliente.razao_social, "Maria Comercio ME");
        assert_eq!(cliente.telefone, "55 11 99999-0000");
        assert_eq!(cliente.cidade, "Curitiba");
    }

    #[test]
    fn phone_chain_prefers_primary_number_over_whatsapp() {
        let mut cliente = cliente_base();
        aplica_detalhes(
            &mut cliente,
            &registro(json!({
                "whatsapp": "55 11 98888-0000",
                "telefone": "41 3333-0000"
            })),
        );
        assert_eq!(cliente.telefone, "41 3333-0000");
    }

    #[test]
    fn empty_detail_fields_keep_the_summary_values() {
        let mut cliente = cliente_base();
        aplica_detalhes(
            &mut cliente,
            &registro(json!({"email": "", "nome": "   "})),
        );
        assert_eq!(cliente.email, "maria@titulo.com");
        assert_eq!(cliente.cliente, "Maria");
    }
}
