//! Reconciliation over `fn_areceber` receivable titles.
//!
//! The IXC's own date-range filter over- and under-matches, so it is treated
//! as an optimization hint only: every record's reference date is re-checked
//! client-side before it counts. Pages are requested sorted descending by the
//! reference field, which lets pagination stop early once a whole page falls
//! before the window.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde_json::{Map, Value};

use crate::error::IxcError;
use crate::schemas::{ClienteInadimplente, FluxoResumo, Periodo};
use crate::services::ixc::{IxcClient, IxcFilter, SearchRequest};
use crate::services::normalize::{self, normaliza_titulo};

pub const RECURSO_TITULOS: &str = "fn_areceber";

/// Whether a status code means the title is still outstanding or already
/// settled. This decides which date field is authoritative and which amount
/// fields are meaningful.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interpretacao {
    Aberto,
    Recebido,
}

impl Interpretacao {
    fn status_query(self) -> &'static str {
        match self {
            Self::Aberto => "A",
            Self::Recebido => "R",
        }
    }

    fn campo_referencia(self) -> &'static str {
        match self {
            Self::Aberto => "fn_areceber.data_vencimento",
            Self::Recebido => "fn_areceber.baixa_data",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TotaisStatus {
    pub total_valor: Decimal,
    pub total_recebido: Decimal,
    pub total_em_aberto: Decimal,
    pub registros_considerados: u64,
}

/// Reference date of a title, walking the per-interpretation fallback chain.
/// Settled titles prefer the payment/settlement dates; open titles the due
/// date.
pub fn data_referencia(
    titulo: &Map<String, Value>,
    interpretacao: Interpretacao,
) -> Option<NaiveDate> {
    match interpretacao {
        Interpretacao::Recebido => normalize::data_em(
            titulo,
            &[
                "pagamento_data",
                "baixa_data",
                "credito_data",
                "data_vencimento",
                "data_emissao",
            ],
        ),
        Interpretacao::Aberto => normalize::data_em(
            titulo,
            &["data_vencimento", "vencimento", "data_emissao", "emissao"],
        ),
    }
}

pub fn dentro_do_periodo(
    titulo: &Map<String, Value>,
    interpretacao: Interpretacao,
    inicio: NaiveDate,
    fim: NaiveDate,
) -> bool {
    data_referencia(titulo, interpretacao)
        .is_some_and(|referencia| referencia >= inicio && referencia <= fim)
}

/// Adds one in-window title to the running totals.
///
/// Open titles may carry only two of the three amounts; the missing one is
/// derived as `max(0, gross - other)`. Settled titles reuse the received
/// amount as gross when gross is absent, and contribute nothing to open.
pub fn acumula(totais: &mut TotaisStatus, titulo: &Map<String, Value>, interpretacao: Interpretacao) {
    let base = normalize::decimal_em(titulo, &["valor", "valor_total", "valor_recebido"])
        .unwrap_or(Decimal::ZERO);

    match interpretacao {
        Interpretacao::Aberto => {
            let mut recebido =
                normalize::decimal_em(titulo, &["valor_recebido"]).unwrap_or(Decimal::ZERO);
            let mut aberto =
                normalize::decimal_em(titulo, &["valor_aberto"]).unwrap_or(Decimal::ZERO);

            if aberto.is_zero() && !base.is_zero() && !recebido.is_zero() {
                aberto = (base - recebido).max(Decimal::ZERO);
            } else if recebido.is_zero() && !base.is_zero() && !aberto.is_zero() {
                recebido = (base - aberto).max(Decimal::ZERO);
            }

            totais.total_valor += base;
            totais.total_recebido += recebido;
            totais.total_em_aberto += aberto;
        }
        Interpretacao::Recebido => {
            let recebido =
                normalize::decimal_em(titulo, &["valor_recebido", "valor", "valor_total"])
                    .unwrap_or(Decimal::ZERO);
            totais.total_valor += if base.is_zero() { recebido } else { base };
            totais.total_recebido += recebido;
        }
    }

    totais.registros_considerados += 1;
}

/// True when every record's reference date falls strictly before the window.
/// With descending sort nothing later can be in range.
pub fn pagina_toda_antes(
    registros: &[Map<String, Value>],
    interpretacao: Interpretacao,
    inicio: NaiveDate,
) -> bool {
    registros.iter().all(|titulo| {
        data_referencia(titulo, interpretacao).is_some_and(|referencia| referencia < inicio)
    })
}

/// Pagination stop rule, first condition wins: short page (exhausted), the
/// reported total says this was the last page, or the whole page precedes the
/// window. The reported total shows up under inconsistent keys upstream, so
/// the before-window check doubles as a safeguard.
pub fn ultima_pagina(
    registros_na_pagina: usize,
    rp: usize,
    pagina: u32,
    total_informado: Option<u64>,
    toda_antes_do_inicio: bool,
) -> bool {
    if registros_na_pagina < rp {
        return true;
    }
    if let Some(total) = total_informado {
        let total_paginas = (total.div_ceil(rp as u64)).max(1);
        if u64::from(pagina) >= total_paginas {
            return true;
        }
    }
    toda_antes_do_inicio
}

fn pedido_pagina(
    interpretacao: Interpretacao,
    pagina: u32,
    rp: usize,
    filtros: &[IxcFilter],
) -> SearchRequest<'static> {
    SearchRequest {
        resource: RECURSO_TITULOS,
        qtype: "fn_areceber.status",
        query: interpretacao.status_query(),
        page: pagina,
        rp,
        sortname: interpretacao.campo_referencia(),
        sortorder: "desc",
        filters: filtros.to_vec(),
    }
}

fn filtro_periodo(interpretacao: Interpretacao, inicio: NaiveDate, fim: NaiveDate) -> IxcFilter {
    IxcFilter::date_between(
        interpretacao.campo_referencia(),
        &inicio.format("%Y-%m-%d").to_string(),
        &fim.format("%Y-%m-%d").to_string(),
    )
}

/// Pages through all titles with the given status and sums the in-window ones.
/// Any page-fetch failure aborts the whole aggregation; no partial totals.
pub async fn soma_titulos_por_status(
    client: &IxcClient,
    rp: usize,
    interpretacao: Interpretacao,
    inicio: NaiveDate,
    fim: NaiveDate,
) -> Result<TotaisStatus, IxcError> {
    let filtros = vec![filtro_periodo(interpretacao, inicio, fim)];
    let mut totais = TotaisStatus::default();
    let mut pagina: u32 = 1;

    loop {
        let page = client
            .search(&pedido_pagina(interpretacao, pagina, rp, &filtros))
            .await?;

        for titulo in &page.registros {
            if dentro_do_periodo(titulo, interpretacao, inicio, fim) {
                acumula(&mut totais, titulo, interpretacao);
            }
        }

        let toda_antes = pagina_toda_antes(&page.registros, interpretacao, inicio);
        if ultima_pagina(page.registros.len(), rp, pagina, page.total, toda_antes) {
            break;
        }
        pagina += 1;
    }

    Ok(totais)
}

/// Month-level cash-flow aggregate: open plus settled titles over the window.
pub async fn agrega_periodo(
    client: &IxcClient,
    rp: usize,
    inicio: NaiveDate,
    fim: NaiveDate,
) -> Result<FluxoResumo, IxcError> {
    let mut totais = TotaisStatus::default();
    for interpretacao in [Interpretacao::Aberto, Interpretacao::Recebido] {
        let parciais = soma_titulos_por_status(client, rp, interpretacao, inicio, fim).await?;
        totais.total_valor += parciais.total_valor;
        totais.total_recebido += parciais.total_recebido;
        totais.total_em_aberto += parciais.total_em_aberto;
        totais.registros_considerados += parciais.registros_considerados;
    }

    Ok(FluxoResumo {
        taxa_aberto: taxa_aberto(&totais),
        total_valor: totais.total_valor,
        total_recebido: totais.total_recebido,
        total_em_aberto: totais.total_em_aberto,
        periodo: Periodo { inicio, fim },
        registros_considerados: totais.registros_considerados,
    })
}

fn taxa_aberto(totais: &TotaisStatus) -> Decimal {
    if totais.total_valor > Decimal::ZERO {
        totais
            .total_em_aberto
            .checked_div(totais.total_valor)
            .unwrap_or(Decimal::ZERO)
    } else {
        Decimal::ZERO
    }
}

/// Loads every open title due between the cutoff and today and normalizes it
/// into the delinquency roster.
pub async fn carrega_inadimplentes(
    client: &IxcClient,
    rp: usize,
    corte: NaiveDate,
    hoje: NaiveDate,
) -> Result<Vec<ClienteInadimplente>, IxcError> {
    let interpretacao = Interpretacao::Aberto;
    let filtros = vec![filtro_periodo(interpretacao, corte, hoje)];
    let mut dentro: Vec<Map<String, Value>> = Vec::new();
    let mut pagina: u32 = 1;

    loop {
        let page = client
            .search(&pedido_pagina(interpretacao, pagina, rp, &filtros))
            .await?;

        dentro.extend(
            page.registros
                .iter()
                .filter(|titulo| dentro_do_periodo(titulo, interpretacao, corte, hoje))
                .cloned(),
        );

        let toda_antes = pagina_toda_antes(&page.registros, interpretacao, corte);
        if ultima_pagina(page.registros.len(), rp, pagina, page.total, toda_antes) {
            break;
        }
        pagina += 1;
    }

    Ok(dentro
        .iter()
        .enumerate()
        .map(|(ordinal, titulo)| normaliza_titulo(titulo, ordinal, hoje))
        .collect())
}

/// Case-insensitive substring search across the roster's identifying fields.
/// Runs over the cached roster in memory, never upstream.
pub fn filtra_por_termo(
    clientes: &[ClienteInadimplente],
    termo: &str,
) -> Vec<ClienteInadimplente> {
    let busca = termo.trim().to_lowercase();
    if busca.is_empty() {
        return clientes.to_vec();
    }

    clientes
        .iter()
        .filter(|cliente| {
            let campos = [
                &cliente.cliente,
                &cliente.razao_social,
                &cliente.cpf_cnpj,
                &cliente.id_cliente,
                &cliente.id_boleto,
                &cliente.descricao_cobranca,
                &cliente.status_boleto,
                &cliente.contrato,
                &cliente.email,
            ];
            campos
                .iter()
                .any(|campo| campo.to_lowercase().contains(&busca))
                || cliente
                    .titulos
                    .iter()
                    .any(|titulo| titulo.to_lowercase().contains(&busca))
        })
        .cloned()
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct PaginaRoster {
    pub clientes: Vec<ClienteInadimplente>,
    pub page: usize,
    pub total: usize,
    pub total_pages: usize,
}

/// Slices the filtered roster into one page, clamping the index to the last
/// valid page for the filtered set.
pub fn pagina_roster(matches: Vec<ClienteInadimplente>, page: usize, per_page: usize) -> PaginaRoster {
    let per_page = per_page.max(1);
    let total = matches.len();
    let total_pages = (total.div_ceil(per_page)).max(1);
    let page = page.clamp(1, total_pages);
    let inicio = (page - 1) * per_page;
    let clientes = matches.into_iter().skip(inicio).take(per_page).collect();

    PaginaRoster {
        clientes,
        page,
        total,
        total_pages,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn registro(value: Value) -> Map<String, Value> {
        value.as_object().expect("object literal").clone()
    }

    fn dia(ano: i32, mes: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(ano, mes, d).expect("valid date")
    }

    #[test]
    fn open_titles_derive_the_missing_amount() {
        let inicio = dia(2025, 3, 1);
        let fim = dia(2025, 3, 31);
        let registros = [
            registro(json!({"valor": "100", "valor_recebido": "40", "data_vencimento": "10/03/2025"})),
            registro(json!({"valor": "200", "valor_aberto": "50", "data_vencimento": "15/03/2025"})),
            registro(json!({"valor": "0", "valor_recebido": "0", "valor_aberto": "0", "data_vencimento": "20/03/2025"})),
        ];

        let mut totais = TotaisStatus::default();
        for titulo in &registros {
            assert!(dentro_do_periodo(titulo, Interpretacao::Aberto, inicio, fim));
            acumula(&mut totais, titulo, Interpretacao::Aberto);
        }

        assert_eq!(totais.total_valor, dec!(300));
        assert_eq!(totais.total_recebido, dec!(190));
        assert_eq!(totais.total_em_aberto, dec!(110));
        assert_eq!(totais.registros_considerados, 3);
    }

    #[test]
    fn settled_titles_reuse_received_as_gross_and_never_add_open() {
        let mut totais = TotaisStatus::default();
        acumula(
            &mut totais,
            &registro(json!({"valor_recebido": "80,50"})),
            Interpretacao::Recebido,
        );
        acumula(
            &mut totais,
            &registro(json!({"valor": "120", "valor_recebido": "120"})),
            Interpretacao::Recebido,
        );

        assert_eq!(totais.total_valor, dec!(200.50));
        assert_eq!(totais.total_recebido, dec!(200.50));
        assert_eq!(totais.total_em_aberto, Decimal::ZERO);
    }

    #[test]
    fn settled_reference_date_prefers_payment_over_due_date() {
        let titulo = registro(json!({
            "pagamento_data": "02/03/2025",
            "baixa_data": "03/03/2025",
            "data_vencimento": "28/02/2025"
        }));
        assert_eq!(
            data_referencia(&titulo, Interpretacao::Recebido),
            Some(dia(2025, 3, 2))
        );

        let sem_pagamento = registro(json!({
            "baixa_data": "03/03/2025",
            "data_vencimento": "28/02/2025"
        }));
        assert_eq!(
            data_referencia(&sem_pagamento, Interpretacao::Recebido),
            Some(dia(2025, 3, 3))
        );
    }

    #[test]
    fn out_of_window_records_are_discarded() {
        let inicio = dia(2025, 3, 1);
        let fim = dia(2025, 3, 31);
        let antes = registro(json!({"data_vencimento": "28/02/2025"}));
        let depois = registro(json!({"data_vencimento": "01/04/2025"}));
        let sem_data = registro(json!({"valor": "10"}));

        assert!(!dentro_do_periodo(&antes, Interpretacao::Aberto, inicio, fim));
        assert!(!dentro_do_periodo(&depois, Interpretacao::Aberto, inicio, fim));
        assert!(!dentro_do_periodo(&sem_data, Interpretacao::Aberto, inicio, fim));
    }

    #[test]
    fn pagination_stops_on_short_page() {
        assert!(ultima_pagina(10, 200, 1, None, false));
        assert!(!ultima_pagina(200, 200, 1, None, false));
    }

    #[test]
    fn pagination_stops_when_reported_total_is_reached() {
        // 450 records at 200/page -> 3 pages
        assert!(!ultima_pagina(200, 200, 2, Some(450), false));
        assert!(ultima_pagina(200, 200, 3, Some(450), false));
    }

    #[test]
    fn full_page_entirely_before_the_window_stops_pagination() {
        let inicio = dia(2025, 3, 1);
        let registros: Vec<_> = (0..3)
            .map(|i| registro(json!({"data_vencimento": format!("{:02}/02/2025", i + 1)})))
            .collect();
        assert!(pagina_toda_antes(&registros, Interpretacao::Aberto, inicio));
        assert!(ultima_pagina(200, 200, 1, None, true));

        let misto = vec![
            registro(json!({"data_vencimento": "01/02/2025"})),
            registro(json!({"data_vencimento": "10/03/2025"})),
        ];
        assert!(!pagina_toda_antes(&misto, Interpretacao::Aberto, inicio));
    }

    #[test]
    fn records_without_a_reference_date_block_the_early_stop() {
        let inicio = dia(2025, 3, 1);
        let registros = vec![
            registro(json!({"data_vencimento": "01/02/2025"})),
            registro(json!({"valor": "10"})),
        ];
        assert!(!pagina_toda_antes(&registros, Interpretacao::Aberto, inicio));
    }

    fn cliente_chamado(nome: &str) -> ClienteInadimplente {
        let hoje = dia(2025, 6, 10);
        normaliza_titulo(
            &registro(json!({"cliente_nome": nome, "id": nome})),
            0,
            hoje,
        )
    }

    #[test]
    fn roster_search_filters_and_paginates() {
        let mut clientes: Vec<_> = (0..17)
            .map(|i| cliente_chamado(&format!("Cliente {i}")))
            .collect();
        clientes.push(cliente_chamado("Maria SILVA"));
        clientes.push(cliente_chamado("João da Silva"));
        clientes.push(cliente_chamado("Ana Silvano"));
        assert_eq!(clientes.len(), 20);

        let matches = filtra_por_termo(&clientes, "silva");
        assert_eq!(matches.len(), 3);

        let pagina = pagina_roster(matches, 1, 2);
        assert_eq!(pagina.clientes.len(), 2);
        assert_eq!(pagina.total, 3);
        assert_eq!(pagina.total_pages, 2);
        assert_eq!(pagina.page, 1);
    }

    #[test]
    fn page_index_is_clamped_to_the_last_valid_page() {
        let clientes: Vec<_> = (0..5)
            .map(|i| cliente_chamado(&format!("Cliente {i}")))
            .collect();
        let pagina = pagina_roster(clientes, 99, 2);
        assert_eq!(pagina.page, 3);
        assert_eq!(pagina.clientes.len(), 1);

        let vazia = pagina_roster(Vec::new(), 4, 15);
        assert_eq!(vazia.page, 1);
        assert_eq!(vazia.total_pages, 1);
        assert!(vazia.clientes.is_empty());
    }

    #[test]
    fn search_matches_across_document_and_contract_fields() {
        let hoje = dia(2025, 6, 10);
        let cliente = normaliza_titulo(
            &registro(json!({
                "id": "7001",
                "id_cliente": "88",
                "cliente_nome": "Maria",
                "contrato": "CT-555",
                "documento": "BOL-123"
            })),
            0,
            hoje,
        );

        assert_eq!(filtra_por_termo(&[cliente.clone()], "ct-555").len(), 1);
        assert_eq!(filtra_por_termo(&[cliente.clone()], "bol-123").len(), 1);
        assert_eq!(filtra_por_termo(&[cliente], "inexistente").len(), 0);
    }
}
