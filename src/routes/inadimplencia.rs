use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{Local, Utc};

use crate::cache::ReadMode;
use crate::schemas::{InadimplenciaQuery, InadimplenciaResponse};
use crate::services::{enrichment, titulos};
use crate::state::AppState;

/// The roster is a single process-wide aggregate, so its cache has one key.
const CHAVE_ROSTER: &str = "inadimplencia";

pub fn router() -> Router<AppState> {
    Router::new().route("/delinquency-roster", get(delinquency_roster))
}

/// Paginated delinquency roster. Search filters the cached roster in memory;
/// only the records on the served page get the detail-enrichment pass.
/// `refresh=1` kicks a background rebuild but still answers from cache.
async fn delinquency_roster(
    State(state): State<AppState>,
    Query(query): Query<InadimplenciaQuery>,
) -> (StatusCode, Json<InadimplenciaResponse>) {
    let page = parse_indice(query.page.as_deref()).unwrap_or(1).max(1);
    let per_page = parse_indice(query.rp.as_deref()).unwrap_or(15).max(1);
    let termo = query.search.as_deref().unwrap_or("").trim().to_string();

    let client = match state.ixc_client() {
        Ok(client) => client,
        Err(error) => return erro(error.to_string()),
    };

    let mode = if query.refresh.as_deref() == Some("1") {
        ReadMode::ForceBackground
    } else {
        ReadMode::Cached
    };

    let rp = state.config.ixc_fetch_rp;
    let corte = state.config.roster_cutoff_date;
    let hoje = Local::now().date_naive();
    let compute = {
        let client = Arc::clone(&client);
        move || async move {
            titulos::carrega_inadimplentes(&client, rp, corte, hoje)
                .await
                .map(Arc::new)
        }
    };

    match state.roster_cache.fetch(CHAVE_ROSTER, mode, compute).await {
        Ok(hit) => {
            let matches = titulos::filtra_por_termo(&hit.value, &termo);
            let pagina = titulos::pagina_roster(matches, page, per_page);

            let mut clientes = pagina.clientes;
            enrichment::enriquece_clientes(
                &client,
                &state.detalhe_cache,
                state.config.ixc_cliente_batch,
                &mut clientes,
            )
            .await;

            (
                StatusCode::OK,
                Json(InadimplenciaResponse {
                    success: true,
                    clientes,
                    synced_at: Utc::now().to_rfc3339(),
                    syncing: hit.syncing,
                    page: pagina.page,
                    per_page,
                    total: pagina.total,
                    total_pages: pagina.total_pages,
                    error: None,
                }),
            )
        }
        Err(error) => {
            tracing::error!(error = %error, "erro ao consultar a API do IXC");
            erro(error.to_string())
        }
    }
}

fn erro(message: String) -> (StatusCode, Json<InadimplenciaResponse>) {
    (
        StatusCode::BAD_GATEWAY,
        Json(InadimplenciaResponse::falha(
            Utc::now().to_rfc3339(),
            message,
        )),
    )
}

fn parse_indice(raw: Option<&str>) -> Option<usize> {
    raw.and_then(|texto| texto.trim().parse::<usize>().ok())
}

#[cfg(test)]
mod tests {
    use super::parse_indice;

    #[test]
    fn page_parameters_parse_leniently() {
        assert_eq!(parse_indice(Some("3")), Some(3));
        assert_eq!(parse_indice(Some("abc")), None);
        assert_eq!(parse_indice(Some("-2")), None);
        assert_eq!(parse_indice(None), None);
    }
}
