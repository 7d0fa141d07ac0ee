//! Line commands of the interactive tool.

use chrono::{Local, NaiveDate};

use crate::error::{Result, XrayError};
use crate::location::{location_options, DEFAULT_LOCATIONS};
use crate::query::{default_start_date, parse_date, SearchQuery};

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Search(SearchQuery),
    Locations,
    Units,
    Select(Vec<String>),
    SelectAll,
    Clear,
    Trim,
    Restart,
    Show,
    Json,
    Reset,
    Help,
    Quit,
}

pub const HELP: &str = "\
commands:
  search codes=<c1,c2> [loc=<REGION|UF,...>] [from=<YYYY-MM-DD>] [to=<YYYY-MM-DD>]
  locations                  list the regions and states accepted by loc=
  units                      list unit labels and the current selection
  select <label>[;<label>]   analyse only these unit labels
  select-all | clear         select every unit label / none
  trim                       run one outlier removal pass
  restart                    back to iteration 0 over the same data
  show | json                print the report as text / JSON
  reset | help | quit";

/// One raw stdin line without its line terminator. Bytes that are not
/// UTF-8 are an input error for that line only.
pub fn decode_line(bytes: &[u8]) -> Result<&str> {
    let text = std::str::from_utf8(bytes)
        .map_err(|_| XrayError::InvalidInput("input line is not valid UTF-8".to_string()))?;
    Ok(text.trim_end_matches(&['\n', '\r'][..]))
}

/// Selectable locations, default ones marked.
pub fn locations_listing() -> String {
    location_options()
        .into_iter()
        .map(|loc| {
            if DEFAULT_LOCATIONS.contains(&loc) {
                format!("{} (default)", loc)
            } else {
                loc.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn parse_command(line: &str) -> Result<Option<Command>> {
    parse_command_at(line, Local::now().date_naive())
}

/// `today` is the default end date of a search.
pub fn parse_command_at(line: &str, today: NaiveDate) -> Result<Option<Command>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    let (verb, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let rest = rest.trim();
    let cmd = match verb.to_ascii_lowercase().as_str() {
        "search" => Command::Search(parse_search(rest, today)?),
        "locations" => Command::Locations,
        "units" => Command::Units,
        "select" => Command::Select(
            rest.split(';')
                .map(|u| u.trim().to_uppercase())
                .filter(|u| !u.is_empty())
                .collect(),
        ),
        "select-all" => Command::SelectAll,
        "clear" => Command::Clear,
        "trim" => Command::Trim,
        "restart" => Command::Restart,
        "show" => Command::Show,
        "json" => Command::Json,
        "reset" => Command::Reset,
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => {
            return Err(XrayError::InvalidInput(format!(
                "unknown command '{}' (try 'help')",
                other
            )))
        }
    };
    Ok(Some(cmd))
}

fn parse_search(args: &str, today: NaiveDate) -> Result<SearchQuery> {
    let mut codes = None;
    let mut locations: Option<Vec<String>> = None;
    let mut from = default_start_date();
    let mut to = today;

    for arg in args.split_whitespace() {
        let (key, value) = arg.split_once('=').ok_or_else(|| {
            XrayError::InvalidInput(format!("expected key=value, got '{}'", arg))
        })?;
        match key {
            "codes" => codes = Some(value.to_string()),
            "loc" => {
                locations = Some(
                    value
                        .split(',')
                        .map(|l| l.trim().to_string())
                        .filter(|l| !l.is_empty())
                        .collect(),
                )
            }
            "from" => from = parse_date(value)?,
            "to" => to = parse_date(value)?,
            other => {
                return Err(XrayError::InvalidInput(format!("unknown search option '{}'", other)))
            }
        }
    }

    let locations =
        locations.unwrap_or_else(|| DEFAULT_LOCATIONS.iter().map(|l| l.to_string()).collect());
    SearchQuery::parse(codes.as_deref().unwrap_or(""), &locations, from, to)
}
