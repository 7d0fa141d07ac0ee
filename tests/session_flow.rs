//! End to end: scripted upstream -> fetch -> session transitions -> report.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use catmat_xray::engine::OutlierStatus;
use catmat_xray::fetch::client::Page;
use catmat_xray::fetch::{fetch_records, PairRows, RecordSource};
use catmat_xray::location::StateCode;
use catmat_xray::query::{parse_date, SearchQuery};
use catmat_xray::report::{dashboard, render_text};
use catmat_xray::session::{reduce, Event, NoticeLevel, Session};

const PAGE_SP: &str = r#"{
  "resultado": [
    {"idCompra": "1001", "idItemCompra": 1, "descricaoItem": "CANETA", "municipio": "Campinas", "estado": "SP",
     "dataResultado": "2023-03-01T00:00:00", "quantidade": 50, "precoUnitario": 10.0,
     "nomeUnidadeFornecimento": "caixa", "capacidadeUnidadeFornecimento": 12, "nomeUnidadeMedida": "unidade"},
    {"idCompra": "1002", "idItemCompra": 1, "descricaoItem": "CANETA", "municipio": "Santos", "estado": "SP",
     "dataResultado": "2023-04-01T00:00:00", "quantidade": 20, "precoUnitario": 12.0,
     "nomeUnidadeFornecimento": "caixa", "capacidadeUnidadeFornecimento": 12, "nomeUnidadeMedida": "unidade"},
    {"idCompra": "1003", "idItemCompra": 1, "descricaoItem": "CANETA", "municipio": "Osasco", "estado": "SP",
     "dataResultado": "2023-05-01T00:00:00", "quantidade": 5, "precoUnitario": 100.0,
     "nomeUnidadeFornecimento": "caixa", "capacidadeUnidadeFornecimento": 12, "nomeUnidadeMedida": "unidade"}
  ],
  "totalPaginas": 1
}"#;

const PAGE_MG: &str = r#"{
  "resultado": [
    {"idCompra": "2001", "idItemCompra": 3, "descricaoItem": "CANETA", "municipio": "Uberlandia", "estado": "MG",
     "dataResultado": "2023-06-01", "quantidade": 10, "precoUnitario": 11.0, "siglaUnidadeMedida": "un"},
    {"idCompra": "2002", "idItemCompra": 3, "descricaoItem": "CANETA", "municipio": "Contagem", "estado": "MG",
     "dataResultado": "2023-06-02", "quantidade": 10, "precoUnitario": 9.0, "siglaUnidadeMedida": "un"},
    {"idCompra": "2003", "idItemCompra": 3, "descricaoItem": "CANETA", "municipio": "Contagem", "estado": "MG",
     "dataResultado": "2021-06-02", "quantidade": 10, "precoUnitario": 9.0, "siglaUnidadeMedida": "un"}
  ],
  "totalPaginas": 1
}"#;

struct Fixture;

#[async_trait]
impl RecordSource for Fixture {
    async fn fetch_pair(&self, _item: u64, state: Option<StateCode>) -> Result<PairRows> {
        let body = match state {
            Some(StateCode::SP) => PAGE_SP,
            Some(StateCode::MG) => PAGE_MG,
            Some(StateCode::RJ) => return Err(anyhow!("HTTP 503: upstream unavailable")),
            _ => r#"{"resultado": [], "totalPaginas": 0}"#,
        };
        let page: Page = serde_json::from_str(body)?;
        Ok(PairRows::complete(page.resultado))
    }
}

async fn search(session: &mut Session, locations: &[&str]) -> Vec<catmat_xray::session::Notice> {
    let query = SearchQuery::parse(
        "459670",
        locations,
        parse_date("2023-01-01").unwrap(),
        parse_date("2023-12-31").unwrap(),
    )
    .unwrap();
    let outcome = fetch_records(&Fixture, &query, 2).await;
    reduce(session, Event::SearchCompleted { query, outcome }).notices
}

#[tokio::test]
async fn search_trim_and_report() {
    let mut session = Session::new();
    let notices = search(&mut session, &["SP", "MG", "RJ"]).await;

    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].level, NoticeLevel::Warning);
    assert!(notices[0].message.contains("RJ"));

    assert_eq!(session.all_units, vec!["CAIXA 12 UNIDADE", "UN"]);
    let engine = session.engine.as_ref().unwrap();
    assert_eq!(engine.baseline().len(), 5);

    let out = reduce(&mut session, Event::Trim);
    assert!(out.trim.is_some());
    let dash = dashboard(&session);
    assert_eq!(dash.iteration, 1);
    let outlier = dash.rows.iter().find(|r| r.id == "1003").unwrap();
    assert_eq!(outlier.status, OutlierStatus::Above);
    assert_eq!(outlier.iteration, 1);
    assert_eq!(outlier.location, "Osasco - SP");
    assert_eq!(dash.current.as_ref().unwrap().retention.kept, 4);

    let text = render_text(&dash);
    assert!(text.contains("4 of 5 items (80.00%)"));
    assert!(text.contains("Redo removal (start iteration 2)"));
}

#[tokio::test]
async fn unit_filter_restarts_iterations() {
    let mut session = Session::new();
    search(&mut session, &["SUDESTE"]).await;
    reduce(&mut session, Event::Trim);
    assert_eq!(session.iteration(), 1);

    reduce(&mut session, Event::SelectUnits(vec!["UN".into()]));
    let engine = session.engine.as_ref().unwrap();
    assert_eq!(engine.iteration(), 0);
    assert_eq!(engine.baseline().len(), 2);

    reduce(&mut session, Event::Trim);
    reduce(&mut session, Event::Trim);
    let dash = dashboard(&session);
    assert!(dash.rows.iter().all(|r| r.status == OutlierStatus::Within));
}

#[tokio::test]
async fn search_with_nothing_in_range_is_a_notice() {
    let mut session = Session::new();
    let notices = search(&mut session, &["BA"]).await;
    assert!(session.engine.is_none());
    assert_eq!(notices.last().unwrap().level, NoticeLevel::Warning);
    assert!(dashboard(&session).rows.is_empty());
}

#[tokio::test]
async fn restart_and_new_search_replace_state() {
    let mut session = Session::new();
    search(&mut session, &["SP", "MG"]).await;
    let fresh = session.state_hash();
    reduce(&mut session, Event::Trim);
    assert_ne!(session.state_hash(), fresh);

    reduce(&mut session, Event::Restart);
    assert_eq!(session.state_hash(), fresh);

    reduce(&mut session, Event::Trim);
    search(&mut session, &["SP", "MG"]).await;
    assert_eq!(session.iteration(), 0);
    assert_eq!(session.state_hash(), fresh);
}
