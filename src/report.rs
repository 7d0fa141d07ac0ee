//! Read-only projections of a session for display.

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::fmt::Write;

use crate::config::tracking_link;
use crate::engine::{OutlierEngine, OutlierStatus, PriceSummary, Retention};
use crate::location::StateCode;
use crate::logging::{log, obj, Domain, Level};
use crate::session::Session;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailRow {
    pub id: String,
    pub link: String,
    pub description: String,
    pub location: String,
    pub date: NaiveDate,
    pub quantity: f64,
    pub unit: String,
    pub unit_price: f64,
    pub status: OutlierStatus,
    pub iteration: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateCount {
    pub state: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateMeanPrice {
    pub state: String,
    pub mean_price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IterationPanel {
    pub iteration: u32,
    pub retention: Retention,
    pub summary: PriceSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dashboard {
    pub iteration: u32,
    pub action_label: String,
    pub can_trim: bool,
    pub baseline: Option<PriceSummary>,
    pub current: Option<IterationPanel>,
    pub state_counts: Vec<StateCount>,
    pub state_means: Vec<StateMeanPrice>,
    pub rows: Vec<DetailRow>,
    pub notes: Vec<String>,
}

pub fn action_label(iteration: u32) -> String {
    if iteration == 0 {
        "Remove outliers (start iteration 1)".to_string()
    } else {
        format!("Redo removal (start iteration {})", iteration + 1)
    }
}

pub fn detail_rows(engine: &OutlierEngine) -> Vec<DetailRow> {
    engine
        .history()
        .map(|(r, entry)| DetailRow {
            id: r.purchase_id.clone(),
            link: tracking_link(&r.purchase_id),
            description: r.description.clone(),
            location: r.location(),
            date: r.result_date,
            quantity: r.quantity,
            unit: r.unit_label.clone(),
            unit_price: r.unit_price,
            status: entry.status,
            iteration: entry.iteration,
        })
        .collect()
}

fn state_key(state: Option<StateCode>) -> String {
    state.map(|s| s.as_str().to_string()).unwrap_or_else(|| "??".to_string())
}

/// Records per state over the working set, for the map.
pub fn state_counts(engine: &OutlierEngine) -> Vec<StateCount> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for r in engine.working_set() {
        *counts.entry(state_key(r.state)).or_default() += 1;
    }
    let mut out: Vec<StateCount> = counts
        .into_iter()
        .map(|(state, count)| StateCount { state, count })
        .collect();
    out.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.state.cmp(&b.state)));
    out
}

/// Mean unit price per state over the working set, highest first.
pub fn state_means(engine: &OutlierEngine) -> Vec<StateMeanPrice> {
    let mut sums: BTreeMap<String, (f64, usize)> = BTreeMap::new();
    for r in engine.working_set() {
        let e = sums.entry(state_key(r.state)).or_insert((0.0, 0));
        e.0 += r.unit_price;
        e.1 += 1;
    }
    let mut out: Vec<StateMeanPrice> = sums
        .into_iter()
        .map(|(state, (sum, n))| StateMeanPrice { state, mean_price: sum / n as f64 })
        .collect();
    out.sort_by(|a, b| b.mean_price.total_cmp(&a.mean_price));
    out
}

pub fn dashboard(session: &Session) -> Dashboard {
    let iteration = session.iteration();
    let mut dash = Dashboard {
        iteration,
        action_label: action_label(iteration),
        can_trim: session.can_trim(),
        baseline: None,
        current: None,
        state_counts: Vec::new(),
        state_means: Vec::new(),
        rows: Vec::new(),
        notes: Vec::new(),
    };
    let Some(engine) = session.engine.as_ref() else {
        if session.data_loaded() {
            dash.notes.push("no data to display for the selected units".into());
        }
        return dash;
    };

    dash.baseline = engine.baseline_summary().ok();
    if iteration > 0 {
        if engine.working_len() > 1 {
            if let (Ok(retention), Ok(summary)) = (engine.retention(), engine.working_summary()) {
                dash.current = Some(IterationPanel { iteration, retention, summary });
            }
        } else {
            dash.notes.push("no more items to analyse".into());
        }
    }
    if engine.working_len() == 0 {
        dash.notes
            .push("visual panel unavailable: no records are Within at this iteration".into());
    } else {
        dash.state_counts = state_counts(engine);
        dash.state_means = state_means(engine);
    }
    dash.rows = detail_rows(engine);
    log(
        Level::Trace,
        Domain::Report,
        "dashboard",
        obj(&[("iteration", json!(iteration)), ("rows", json!(dash.rows.len()))]),
    );
    dash
}

// =============================================================================
// Text rendering
// =============================================================================

/// `R$ 1,234.56`
pub fn format_brl(value: f64) -> String {
    if !value.is_finite() {
        return "R$ -".to_string();
    }
    let cents = (value.abs() * 100.0).round() as u64;
    let int = (cents / 100).to_string();
    let mut grouped = String::new();
    for (i, ch) in int.chars().enumerate() {
        if i > 0 && (int.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    let sign = if value < 0.0 { "-" } else { "" };
    format!("R$ {}{}.{:02}", sign, grouped, cents % 100)
}

fn format_pct(value: f64) -> String {
    format!("{:.2}%", value)
}

fn write_summary(out: &mut String, s: &PriceSummary) {
    let _ = writeln!(
        out,
        "  min {} | mean {} | median {} | max {} | CV {} | count {}",
        format_brl(s.min),
        format_brl(s.mean),
        format_brl(s.median),
        format_brl(s.max),
        format_pct(s.coefficient_of_variation),
        s.count
    );
}

pub fn render_text(dash: &Dashboard) -> String {
    let mut out = String::new();
    let Some(baseline) = &dash.baseline else {
        for note in &dash.notes {
            let _ = writeln!(out, "! {}", note);
        }
        return out;
    };

    let _ = writeln!(out, "1. Baseline summary");
    write_summary(&mut out, baseline);

    if dash.iteration > 0 {
        let _ = writeln!(out, "2. Dispersion after iteration {}", dash.iteration);
        if let Some(panel) = &dash.current {
            let r = &panel.retention;
            let _ = writeln!(
                out,
                "  {} of {} items ({}) are Within at this iteration",
                r.kept,
                r.baseline,
                format_pct(r.percentage)
            );
            write_summary(&mut out, &panel.summary);
        }
    }

    let _ = writeln!(out, "3. By state (iteration {})", dash.iteration);
    for (count, mean) in dash.state_counts.iter().zip(state_means_for(dash, &dash.state_counts)) {
        let _ = writeln!(out, "  {:<3} {:>5} purchases  mean {}", count.state, count.count, mean);
    }

    let _ = writeln!(out, "4. Purchases");
    for row in &dash.rows {
        let flag = if row.status.is_excluded() { '*' } else { ' ' };
        let _ = writeln!(
            out,
            "{} {:<20} {:<28} {} {:>8} {:<16} {:>14} {:<6} {:>2}  {}",
            flag,
            row.id,
            truncate(&row.location, 28),
            row.date.format("%d/%m/%Y"),
            row.quantity,
            truncate(&row.unit, 16),
            format_brl(row.unit_price),
            row.status.as_str(),
            row.iteration,
            row.link
        );
    }

    for note in &dash.notes {
        let _ = writeln!(out, "! {}", note);
    }
    let _ = writeln!(
        out,
        "[{}]{}",
        dash.action_label,
        if dash.can_trim { "" } else { " (disabled)" }
    );
    out
}

fn state_means_for(dash: &Dashboard, counts: &[StateCount]) -> Vec<String> {
    counts
        .iter()
        .map(|c| {
            dash.state_means
                .iter()
                .find(|m| m.state == c.state)
                .map(|m| format_brl(m.mean_price))
                .unwrap_or_default()
        })
        .collect()
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max.saturating_sub(1)).chain(['…']).collect()
    }
}

pub fn render_json(dash: &Dashboard) -> serde_json::Result<String> {
    serde_json::to_string_pretty(dash)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::FetchOutcome;
    use crate::location::LocationFilter;
    use crate::query::{parse_date, DateRange, SearchQuery};
    use crate::record::{PurchaseRecord, RecordKey, SupplyUnit};
    use crate::session::{reduce, Event};

    fn rec(key: u32, price: f64, state: StateCode) -> PurchaseRecord {
        PurchaseRecord {
            key: RecordKey(key),
            purchase_id: format!("9{}", key),
            item_code: Some(1),
            description: "agua mineral".into(),
            municipality: "Goiania".into(),
            state: Some(state),
            result_date: parse_date("2023-04-05").unwrap(),
            quantity: 3.0,
            unit_price: price,
            supply_unit: SupplyUnit::default(),
            unit_label: "GARRAFA".into(),
        }
    }

    fn session(records: Vec<PurchaseRecord>) -> Session {
        let mut s = Session::new();
        reduce(
            &mut s,
            Event::SearchCompleted {
                query: SearchQuery {
                    item_codes: vec![1],
                    locations: LocationFilter::Any,
                    range: DateRange::new(
                        parse_date("2023-01-01").unwrap(),
                        parse_date("2023-12-31").unwrap(),
                    )
                    .unwrap(),
                },
                outcome: FetchOutcome { records, ..Default::default() },
            },
        );
        s
    }

    #[test]
    fn brl_formatting() {
        assert_eq!(format_brl(0.0), "R$ 0.00");
        assert_eq!(format_brl(1234.567), "R$ 1,234.57");
        assert_eq!(format_brl(1_000_000.0), "R$ 1,000,000.00");
        assert_eq!(format_brl(12.5), "R$ 12.50");
    }

    #[test]
    fn action_label_follows_iteration() {
        assert_eq!(action_label(0), "Remove outliers (start iteration 1)");
        assert_eq!(action_label(2), "Redo removal (start iteration 3)");
    }

    #[test]
    fn rows_carry_link_location_and_status() {
        let mut s = session(vec![
            rec(0, 10.0, StateCode::GO),
            rec(1, 12.0, StateCode::GO),
            rec(2, 11.0, StateCode::DF),
            rec(3, 100.0, StateCode::DF),
            rec(4, 9.0, StateCode::GO),
        ]);
        reduce(&mut s, Event::Trim);
        let dash = dashboard(&s);
        assert_eq!(dash.rows.len(), 5);
        let expensive = &dash.rows[3];
        assert!(expensive.link.ends_with("?compra=93"));
        assert_eq!(expensive.location, "Goiania - DF");
        assert_eq!(expensive.status, OutlierStatus::Above);
        assert_eq!(expensive.iteration, 1);

        let panel = dash.current.as_ref().unwrap();
        assert_eq!(panel.retention.kept, 4);
        assert_eq!(dash.baseline.unwrap().count, 5);
    }

    #[test]
    fn visual_data_covers_working_set_only() {
        let mut s = session(vec![
            rec(0, 10.0, StateCode::GO),
            rec(1, 12.0, StateCode::GO),
            rec(2, 11.0, StateCode::DF),
            rec(3, 100.0, StateCode::DF),
            rec(4, 9.0, StateCode::GO),
        ]);
        reduce(&mut s, Event::Trim);
        let dash = dashboard(&s);
        assert_eq!(
            dash.state_counts,
            vec![
                StateCount { state: "GO".into(), count: 3 },
                StateCount { state: "DF".into(), count: 1 },
            ]
        );
        // DF 11.00 ranks above GO 10.33
        assert_eq!(dash.state_means[0].state, "DF");
        assert_eq!(dash.state_means[0].mean_price, 11.0);
        assert!((dash.state_means[1].mean_price - 31.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn single_record_has_no_iteration_panel_and_disabled_action() {
        let s = session(vec![rec(0, 10.0, StateCode::GO)]);
        let dash = dashboard(&s);
        assert!(!dash.can_trim);
        assert!(dash.current.is_none());
        let text = render_text(&dash);
        assert!(text.contains("(disabled)"));
        assert!(text.contains("05/04/2023"));
    }

    #[test]
    fn json_output_serializes_statuses() {
        let s = session(vec![rec(0, 10.0, StateCode::GO), rec(1, 11.0, StateCode::GO)]);
        let json = render_json(&dashboard(&s)).unwrap();
        assert!(json.contains("\"status\": \"Within\""));
    }
}
