// src/extract.rs
//
// Pure HTML -> match record extraction. The schedule page lists one
// `div.row` block per week; the block's second div holds a games table whose
// rows carry home/score/away/date/time columns. Persian team names are the
// cell text, English ones sit in the cells' `data-en` attribute. Kickoffs are
// Jalali dates resolved through the configured timezone.
//
// Row-level problems become warnings and skip the row; a page without any
// games table at all is a schema mismatch and fails the whole run.

use chrono::{DateTime, LocalResult, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;

use crate::config::Language;
use crate::jalali;
use crate::snapshot::MatchRecord;

static WEEK_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse(r#"div[class="row"]"#).unwrap());
static TABLE_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse("table").unwrap());
static ROW_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse("tbody > tr").unwrap());
static CELL_SEL: Lazy<Selector> = Lazy::new(|| Selector::parse("td").unwrap());

/// Attribute carrying the English team name on a team cell.
const EN_ATTR: &str = "data-en";

/// Minimum columns a real match row has (home, score, away, date, time, ...).
const MIN_COLUMNS: usize = 7;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("schedule structure not found in page")]
    SchemaMismatch,
}

/// Per-row problem; the row is skipped, the run goes on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseWarning {
    #[error("week {week} row {row}: no {lang} team label")]
    MissingLabel {
        week: usize,
        row: usize,
        lang: Language,
    },
    #[error("week {week} row {row}: unparseable kickoff '{date} {time}'")]
    BadTimestamp {
        week: usize,
        row: usize,
        date: String,
        time: String,
    },
}

#[derive(Debug, Default)]
pub struct Extraction {
    /// Matches in source document order; future-only filtering and kickoff
    /// ordering happen at publish time.
    pub matches: Vec<MatchRecord>,
    pub warnings: Vec<ParseWarning>,
}

/// Extract unplayed matches from the schedule page. Deterministic, no I/O.
pub fn extract(html: &str, lang: Language, tz: Tz) -> Result<Extraction, ExtractError> {
    let doc = Html::parse_document(html);
    let mut out = Extraction::default();
    let mut tables_seen = 0usize;

    for (week_index, week) in doc.select(&WEEK_SEL).enumerate() {
        let divs: Vec<ElementRef> = week
            .children()
            .filter_map(ElementRef::wrap)
            .filter(|el| el.value().name() == "div")
            .collect();
        // First div is the week header, second holds the games table.
        let Some(games) = divs.get(1) else { continue };
        let Some(table) = games.select(&TABLE_SEL).next() else {
            continue;
        };
        tables_seen += 1;

        for (row_index, row) in table.select(&ROW_SEL).enumerate() {
            match parse_row(row, lang, tz) {
                RowOutcome::Match(record) => out.matches.push(record),
                RowOutcome::Skip => {}
                RowOutcome::Warn(issue) => out.warnings.push(issue.into_warning(
                    week_index + 1,
                    row_index + 1,
                    lang,
                )),
            }
        }
    }

    if tables_seen == 0 {
        return Err(ExtractError::SchemaMismatch);
    }

    tracing::debug!(
        matches = out.matches.len(),
        warnings = out.warnings.len(),
        "extracted schedule page"
    );
    Ok(out)
}

enum RowOutcome {
    Match(MatchRecord),
    /// Structural filler or an already-played match; not worth a warning.
    Skip,
    Warn(RowIssue),
}

enum RowIssue {
    MissingLabel,
    BadTimestamp { date: String, time: String },
}

impl RowIssue {
    fn into_warning(self, week: usize, row: usize, lang: Language) -> ParseWarning {
        match self {
            RowIssue::MissingLabel => ParseWarning::MissingLabel { week, row, lang },
            RowIssue::BadTimestamp { date, time } => ParseWarning::BadTimestamp {
                week,
                row,
                date,
                time,
            },
        }
    }
}

fn parse_row(row: ElementRef, lang: Language, tz: Tz) -> RowOutcome {
    let cells: Vec<ElementRef> = row.select(&CELL_SEL).collect();
    if cells.len() < MIN_COLUMNS {
        return RowOutcome::Skip;
    }

    // Played matches carry a score instead of "-".
    if cell_text(cells[1]) != "-" {
        return RowOutcome::Skip;
    }

    let (home_team, away_team) = match (team_label(cells[0], lang), team_label(cells[2], lang)) {
        (Some(home), Some(away)) => (home, away),
        _ => return RowOutcome::Warn(RowIssue::MissingLabel),
    };

    let date = cell_text(cells[3]);
    let time = cell_text(cells[4]);
    let Some(kickoff) = parse_kickoff(&date, &time, tz) else {
        return RowOutcome::Warn(RowIssue::BadTimestamp { date, time });
    };

    RowOutcome::Match(MatchRecord {
        home_team,
        away_team,
        kickoff,
    })
}

/// Team name in the requested language, each read from its own place in the
/// markup (FA: cell text, EN: `data-en` attribute) — never transliterated.
fn team_label(cell: ElementRef, lang: Language) -> Option<String> {
    let label = match lang {
        Language::Fa => cell_text(cell),
        Language::En => cell
            .value()
            .attr(EN_ATTR)
            .map(|s| s.split_whitespace().collect::<Vec<_>>().join(" "))
            .unwrap_or_default(),
    };
    (!label.is_empty()).then_some(label)
}

fn cell_text(cell: ElementRef) -> String {
    cell.text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Resolve a Jalali `YYYY/MM/DD` date plus `HH:MM` time to a UTC instant.
/// An empty time means midnight (source behavior for unannounced kickoffs);
/// anything else unparseable yields `None`.
fn parse_kickoff(date: &str, time: &str, tz: Tz) -> Option<DateTime<Utc>> {
    let mut parts = date.split('/');
    let jy: i32 = parts.next()?.trim().parse().ok()?;
    let jm: u32 = parts.next()?.trim().parse().ok()?;
    let jd: u32 = parts.next()?.trim().parse().ok()?;
    if parts.next().is_some() {
        return None;
    }

    let day = jalali::jalali_to_gregorian(jy, jm, jd)?;
    let time = if time.is_empty() {
        NaiveTime::MIN
    } else {
        NaiveTime::parse_from_str(time, "%H:%M").ok()?
    };

    let local = match tz.from_local_datetime(&day.and_time(time)) {
        LocalResult::Single(dt) => dt,
        // DST fold: take the earlier wall-clock reading.
        LocalResult::Ambiguous(earliest, _) => earliest,
        // DST gap: the published time does not exist in this zone.
        LocalResult::None => return None,
    };
    Some(local.with_timezone(&Utc))
}
