use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{Datelike, Local, NaiveDate};

use crate::cache::ReadMode;
use crate::schemas::{FluxoQuery, FluxoResponse};
use crate::services::titulos;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/period-summary", get(period_summary))
}

/// Monthly cash-flow summary over the IXC receivables, served from the
/// period-keyed cache. `refresh=1` forces a blocking recompute.
async fn period_summary(
    State(state): State<AppState>,
    Query(query): Query<FluxoQuery>,
) -> (StatusCode, Json<FluxoResponse>) {
    let hoje = Local::now().date_naive();

    let mes = parse_inteiro(query.mes.as_deref())
        .map(|mes| mes.clamp(1, 12) as u32)
        .unwrap_or_else(|| hoje.month());
    let ano = parse_inteiro(query.ano.as_deref())
        .map(|ano| ano as i32)
        .unwrap_or_else(|| hoje.year());

    let Some((inicio, fim)) = limites_do_mes(ano, mes) else {
        return erro(hoje, format!("período inválido: {mes:02}/{ano}"));
    };

    let client = match state.ixc_client() {
        Ok(client) => client,
        Err(error) => return erro(hoje, error.to_string()),
    };

    let mode = if query.refresh.as_deref() == Some("1") {
        ReadMode::ForceBlocking
    } else {
        ReadMode::Cached
    };

    let rp = state.config.ixc_fetch_rp;
    let chave = format!("{ano}-{mes:02}");
    let compute = {
        let client = Arc::clone(&client);
        move || async move { titulos::agrega_periodo(&client, rp, inicio, fim).await }
    };

    match state.fluxo_cache.fetch(&chave, mode, compute).await {
        Ok(hit) => (
            StatusCode::OK,
            Json(FluxoResponse::ok(hit.value, hit.syncing)),
        ),
        Err(error) => {
            tracing::error!(periodo = %chave, error = %error, "erro ao calcular fluxo mensal");
            erro(hoje, error.to_string())
        }
    }
}

fn erro(hoje: NaiveDate, message: String) -> (StatusCode, Json<FluxoResponse>) {
    (
        StatusCode::BAD_GATEWAY,
        Json(FluxoResponse::falha(hoje, message)),
    )
}

fn parse_inteiro(raw: Option<&str>) -> Option<i64> {
    raw.and_then(|texto| texto.trim().parse::<i64>().ok())
}

/// First and last calendar day of the month; `None` for out-of-range years.
fn limites_do_mes(ano: i32, mes: u32) -> Option<(NaiveDate, NaiveDate)> {
    let inicio = NaiveDate::from_ymd_opt(ano, mes, 1)?;
    let primeiro_do_proximo = if mes == 12 {
        NaiveDate::from_ymd_opt(ano + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(ano, mes + 1, 1)?
    };
    Some((inicio, primeiro_do_proximo.pred_opt()?))
}
