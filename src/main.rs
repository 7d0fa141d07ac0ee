use anyhow::Result;
use catmat_xray::cli::{decode_line, locations_listing, parse_command, Command, HELP};
use catmat_xray::config::Config;
use catmat_xray::fetch::{fetch_records, CachedSource, ComprasClient};
use catmat_xray::logging::{log, obj, v_str, Domain, Level};
use catmat_xray::report::{dashboard, render_json, render_text};
use catmat_xray::session::{reduce, Event, Notice, NoticeLevel, Session};
use serde_json::json;
use tokio::io::{AsyncBufReadExt, BufReader};

fn print_notices(notices: &[Notice]) {
    for n in notices {
        let tag = match n.level {
            NoticeLevel::Info => "info",
            NoticeLevel::Warning => "warning",
            NoticeLevel::Error => "error",
        };
        println!("[{}] {}", tag, n.message);
    }
}

fn print_units(session: &Session) {
    if !session.data_loaded() {
        println!("no search loaded");
        return;
    }
    for unit in &session.all_units {
        let mark = if session.selected_units.contains(unit) { 'x' } else { ' ' };
        let label = if unit.is_empty() { "(no unit)" } else { unit.as_str() };
        println!("[{}] {}", mark, label);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = Config::from_env();
    let source = CachedSource::new(ComprasClient::new(cfg.clone())?, cfg.cache_ttl_secs);
    let mut session = Session::new();

    log(
        Level::Info,
        Domain::System,
        "startup",
        obj(&[
            ("api_base", v_str(&cfg.api_base)),
            ("page_size", json!(cfg.page_size)),
            ("fetch_concurrency", json!(cfg.fetch_concurrency)),
        ]),
    );
    println!("{}", HELP);

    let mut stdin = BufReader::new(tokio::io::stdin());
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if stdin.read_until(b'\n', &mut buf).await? == 0 {
            break;
        }
        let cmd = match decode_line(&buf).and_then(parse_command) {
            Ok(Some(cmd)) => cmd,
            Ok(None) => continue,
            Err(err) => {
                let out = reduce(&mut session, Event::InputRejected(err));
                print_notices(&out.notices);
                continue;
            }
        };

        let event = match cmd {
            Command::Search(query) => {
                println!("fetching...");
                let outcome = fetch_records(&source, &query, cfg.fetch_concurrency).await;
                Event::SearchCompleted { query, outcome }
            }
            Command::Select(units) => Event::SelectUnits(units),
            Command::SelectAll => Event::SelectAllUnits,
            Command::Clear => Event::ClearUnits,
            Command::Trim => Event::Trim,
            Command::Restart => Event::Restart,
            Command::Reset => Event::Reset,
            Command::Locations => {
                println!("{}", locations_listing());
                continue;
            }
            Command::Units => {
                print_units(&session);
                continue;
            }
            Command::Show => {
                print!("{}", render_text(&dashboard(&session)));
                continue;
            }
            Command::Json => {
                println!("{}", render_json(&dashboard(&session))?);
                continue;
            }
            Command::Help => {
                println!("{}", HELP);
                continue;
            }
            Command::Quit => break,
        };

        let out = reduce(&mut session, event);
        print_notices(&out.notices);
        print!("{}", render_text(&dashboard(&session)));
    }

    log(Level::Info, Domain::System, "shutdown", obj(&[]));
    Ok(())
}
