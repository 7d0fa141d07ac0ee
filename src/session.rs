//! Session state and its transitions: (Session, Event) -> Notices.
//!
//! Every user action is one [`Event`]; [`reduce`] is the only place the
//! session changes. Reporting reads the session afterwards and never
//! mutates it.

use serde::Serialize;
use std::collections::BTreeSet;

use crate::engine::{OutlierEngine, TrimOutcome};
use crate::error::XrayError;
use crate::fetch::FetchOutcome;
use crate::logging::{log_audit, log_session_reset};
use crate::query::SearchQuery;
use crate::record::PurchaseRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Info, message: message.into() }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Warning, message: message.into() }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Error, message: message.into() }
    }
}

impl From<&XrayError> for Notice {
    fn from(err: &XrayError) -> Self {
        match err {
            XrayError::UpstreamFailure { .. }
            | XrayError::TruncatedPages { .. }
            | XrayError::EmptyResult => Notice::warning(err.to_string()),
            _ => Notice::error(err.to_string()),
        }
    }
}

#[derive(Debug)]
pub enum Event {
    /// A search finished fetching. Replaces all session state.
    SearchCompleted { query: SearchQuery, outcome: FetchOutcome },
    /// A command line could not be used (bad syntax, item codes or dates).
    InputRejected(XrayError),
    SelectUnits(Vec<String>),
    SelectAllUnits,
    ClearUnits,
    Trim,
    /// Re-run from iteration 0 over the current baseline.
    Restart,
    Reset,
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::SearchCompleted { .. } => "search_completed",
            Event::InputRejected(_) => "input_rejected",
            Event::SelectUnits(_) => "select_units",
            Event::SelectAllUnits => "select_all_units",
            Event::ClearUnits => "clear_units",
            Event::Trim => "trim",
            Event::Restart => "restart",
            Event::Reset => "reset",
        }
    }
}

/// Data that survives between user actions.
#[derive(Debug, Default)]
pub struct Session {
    /// Last successful search.
    pub query: Option<SearchQuery>,
    /// Date-filtered records of that search, before the unit filter.
    pub loaded: Vec<PurchaseRecord>,
    /// Distinct unit labels present in `loaded`, sorted.
    pub all_units: Vec<String>,
    pub selected_units: BTreeSet<String>,
    /// Present while the unit-filtered baseline is non-empty.
    pub engine: Option<OutlierEngine>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn data_loaded(&self) -> bool {
        self.query.is_some()
    }

    /// Drops everything; only a fresh search or an explicit reset do this.
    pub fn reset(&mut self) {
        *self = Session::default();
    }

    pub fn can_trim(&self) -> bool {
        self.engine.as_ref().map(|e| e.can_trim()).unwrap_or(false)
    }

    pub fn iteration(&self) -> u32 {
        self.engine.as_ref().map(|e| e.iteration()).unwrap_or(0)
    }

    fn filtered_baseline(&self) -> Vec<PurchaseRecord> {
        self.loaded
            .iter()
            .filter(|r| self.selected_units.contains(&r.unit_label))
            .cloned()
            .collect()
    }

    /// Rebuilds the engine when the unit-filtered baseline differs from the
    /// engine's current one; an unchanged baseline keeps its history.
    fn refilter(&mut self, notices: &mut Vec<Notice>) {
        let baseline = self.filtered_baseline();
        let unchanged = self
            .engine
            .as_ref()
            .map(|e| e.baseline().iter().map(|r| r.key).eq(baseline.iter().map(|r| r.key)))
            .unwrap_or(baseline.is_empty());
        if unchanged {
            return;
        }
        log_session_reset("unit filter changed", baseline.len());
        match OutlierEngine::initialize(baseline) {
            Ok(engine) => self.engine = Some(engine),
            Err(_) => {
                self.engine = None;
                notices.push(Notice::warning("no data for the selected units"));
            }
        }
    }

    pub fn state_hash(&self) -> String {
        self.engine
            .as_ref()
            .map(|e| e.state_hash())
            .unwrap_or_else(|| "empty".to_string())
    }
}

#[derive(Debug, Default)]
pub struct ReducerOutput {
    pub notices: Vec<Notice>,
    pub trim: Option<TrimOutcome>,
    pub state_hash: String,
}

pub fn reduce(session: &mut Session, event: Event) -> ReducerOutput {
    let mut out = ReducerOutput::default();
    let name = event.name();

    match event {
        Event::SearchCompleted { query, outcome } => {
            on_search(session, query, outcome, &mut out.notices);
        }
        Event::InputRejected(err) => out.notices.push(Notice::from(&err)),
        Event::SelectUnits(units) => {
            if session.data_loaded() {
                session.selected_units = units
                    .into_iter()
                    .filter(|u| session.all_units.contains(u))
                    .collect();
                session.refilter(&mut out.notices);
            }
        }
        Event::SelectAllUnits => {
            if session.data_loaded() {
                session.selected_units = session.all_units.iter().cloned().collect();
                session.refilter(&mut out.notices);
            }
        }
        Event::ClearUnits => {
            if session.data_loaded() {
                session.selected_units.clear();
                session.refilter(&mut out.notices);
            }
        }
        Event::Trim => match session.engine.as_mut() {
            Some(engine) => {
                let outcome = engine.trim();
                match &outcome {
                    TrimOutcome::Skipped { .. } => out
                        .notices
                        .push(Notice::info("fewer than two records remain; nothing to trim")),
                    o if o.is_fixed_point() => out
                        .notices
                        .push(Notice::info("no record fell outside the bounds; the set is stable")),
                    _ => {}
                }
                out.trim = Some(outcome);
            }
            None => out.notices.push(Notice::info("nothing loaded to trim")),
        },
        Event::Restart => {
            if let Some(engine) = session.engine.as_mut() {
                engine.reset();
                log_session_reset("restart", engine.baseline().len());
            }
        }
        Event::Reset => {
            session.reset();
            log_session_reset("reset", 0);
        }
    }

    out.state_hash = session.state_hash();
    log_audit(name, &out.state_hash);
    out
}

fn on_search(session: &mut Session, query: SearchQuery, outcome: FetchOutcome, notices: &mut Vec<Notice>) {
    session.reset();
    notices.extend(outcome.warnings.iter().map(Notice::from));
    if outcome.rejected > 0 {
        notices.push(Notice::warning(format!(
            "{} records skipped for an invalid date or price",
            outcome.rejected
        )));
    }
    if outcome.is_empty() {
        notices.push(Notice::from(&XrayError::EmptyResult));
        return;
    }

    let units: BTreeSet<String> = outcome.records.iter().map(|r| r.unit_label.clone()).collect();
    session.all_units = units.iter().cloned().collect();
    session.selected_units = units;
    session.loaded = outcome.records;
    session.query = Some(query);
    log_session_reset("search", session.loaded.len());
    session.refilter(notices);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::OutlierStatus;
    use crate::location::LocationFilter;
    use crate::query::{parse_date, DateRange};
    use crate::record::{RecordKey, SupplyUnit};

    fn rec(key: u32, price: f64, unit: &str) -> PurchaseRecord {
        PurchaseRecord {
            key: RecordKey(key),
            purchase_id: key.to_string(),
            item_code: Some(1),
            description: "caneta".into(),
            municipality: "Natal".into(),
            state: None,
            result_date: parse_date("2023-03-03").unwrap(),
            quantity: 1.0,
            unit_price: price,
            supply_unit: SupplyUnit::default(),
            unit_label: unit.into(),
        }
    }

    fn query() -> SearchQuery {
        SearchQuery {
            item_codes: vec![1],
            locations: LocationFilter::Any,
            range: DateRange::new(parse_date("2023-01-01").unwrap(), parse_date("2023-12-31").unwrap())
                .unwrap(),
        }
    }

    fn loaded(records: Vec<PurchaseRecord>) -> Session {
        let mut s = Session::new();
        reduce(
            &mut s,
            Event::SearchCompleted {
                query: query(),
                outcome: FetchOutcome { records, ..Default::default() },
            },
        );
        s
    }

    #[test]
    fn empty_search_creates_no_engine() {
        let mut s = Session::new();
        let out = reduce(
            &mut s,
            Event::SearchCompleted { query: query(), outcome: FetchOutcome::default() },
        );
        assert!(s.engine.is_none());
        assert!(!s.data_loaded());
        assert_eq!(out.notices[0].level, NoticeLevel::Warning);
    }

    #[test]
    fn unit_filter_reinitializes_engine() {
        let mut s = loaded(vec![
            rec(0, 10.0, "CAIXA"),
            rec(1, 12.0, "CAIXA"),
            rec(2, 11.0, "UNIDADE"),
            rec(3, 100.0, "CAIXA"),
            rec(4, 9.0, "UNIDADE"),
        ]);
        assert_eq!(s.all_units, vec!["CAIXA", "UNIDADE"]);
        reduce(&mut s, Event::Trim);
        assert_eq!(s.iteration(), 1);

        reduce(&mut s, Event::SelectUnits(vec!["CAIXA".into()]));
        let engine = s.engine.as_ref().unwrap();
        assert_eq!(engine.iteration(), 0);
        assert_eq!(engine.baseline().len(), 3);
        assert!(engine.history().all(|(_, e)| e.status == OutlierStatus::Within));
    }

    #[test]
    fn reselecting_same_units_keeps_history() {
        let mut s = loaded(vec![rec(0, 10.0, "A"), rec(1, 12.0, "A"), rec(2, 100.0, "A")]);
        reduce(&mut s, Event::Trim);
        reduce(&mut s, Event::SelectAllUnits);
        assert_eq!(s.iteration(), 1);
    }

    #[test]
    fn clearing_units_leaves_no_engine() {
        let mut s = loaded(vec![rec(0, 10.0, "A"), rec(1, 12.0, "A")]);
        let out = reduce(&mut s, Event::ClearUnits);
        assert!(s.engine.is_none());
        assert!(s.data_loaded());
        assert_eq!(out.notices, vec![Notice::warning("no data for the selected units")]);
        assert!(!s.can_trim());

        reduce(&mut s, Event::SelectAllUnits);
        assert!(s.engine.is_some());
    }

    #[test]
    fn unknown_units_are_ignored() {
        let mut s = loaded(vec![rec(0, 10.0, "A"), rec(1, 12.0, "B")]);
        reduce(&mut s, Event::SelectUnits(vec!["B".into(), "Z".into()]));
        assert_eq!(s.selected_units.len(), 1);
        assert_eq!(s.engine.as_ref().unwrap().baseline().len(), 1);
    }

    #[test]
    fn rejected_input_surfaces_error_and_keeps_state() {
        let mut s = loaded(vec![rec(0, 10.0, "A"), rec(1, 12.0, "A")]);
        let hash = s.state_hash();
        let event = Event::InputRejected(XrayError::InvalidInput("unknown command 'frobnicate'".into()));
        assert_eq!(event.name(), "input_rejected");
        let out = reduce(&mut s, event);
        assert_eq!(out.notices[0].level, NoticeLevel::Error);
        assert!(s.engine.is_some());
        assert_eq!(out.state_hash, hash);
    }

    #[test]
    fn truncated_pair_is_a_warning_but_data_loads() {
        let mut s = Session::new();
        let outcome = FetchOutcome {
            records: vec![rec(0, 10.0, "A"), rec(1, 12.0, "A")],
            warnings: vec![XrayError::TruncatedPages {
                item: 1,
                location: "SP".into(),
                loaded: 200,
                reported: 340,
            }],
            ..Default::default()
        };
        let out = reduce(&mut s, Event::SearchCompleted { query: query(), outcome });
        assert_eq!(
            out.notices,
            vec![Notice::warning("item 1 (SP): only 200 of 340 pages loaded")]
        );
        assert!(s.engine.is_some());
    }

    #[test]
    fn new_search_replaces_previous_session() {
        let mut s = loaded(vec![rec(0, 10.0, "A"), rec(1, 12.0, "A"), rec(2, 100.0, "A")]);
        reduce(&mut s, Event::Trim);
        reduce(
            &mut s,
            Event::SearchCompleted {
                query: query(),
                outcome: FetchOutcome { records: vec![rec(0, 1.0, "B")], ..Default::default() },
            },
        );
        assert_eq!(s.iteration(), 0);
        assert_eq!(s.all_units, vec!["B"]);
    }

    #[test]
    fn trim_without_data_is_harmless() {
        let mut s = Session::new();
        let out = reduce(&mut s, Event::Trim);
        assert!(out.trim.is_none());
        assert_eq!(out.state_hash, "empty");
    }
}
