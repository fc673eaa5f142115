//! # Roster Input
//!
//! Reads the attendee CSV. The header row is required; `NAME` (any case) is
//! the display name and `Unique ID` (or `token`) an optional pre-existing
//! token. Every other column is carried along in `RosterRow::extra`.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use thiserror::Error;

use gatepass_core::{RosterRow, Token, ValidationError};

const NAME_COLUMNS: &[&str] = &["name"];
const TOKEN_COLUMNS: &[&str] = &["unique id", "token"];

#[derive(Debug, Error)]
pub enum RosterError {
    #[error("Roster has no NAME column (found: {found})")]
    MissingNameColumn { found: String },

    #[error("Roster has no Unique ID column")]
    MissingTokenColumn,

    #[error("Row {row}: invalid Unique ID: {source}")]
    InvalidToken {
        row: usize,
        #[source]
        source: ValidationError,
    },

    #[error("Failed to read roster: {0}")]
    Csv(#[from] csv::Error),
}

/// A parsed roster.
#[derive(Debug, Default)]
pub struct Roster {
    pub rows: Vec<RosterRow>,
    /// Whether the file had a token column at all.
    pub has_token_column: bool,
}

impl Roster {
    pub fn from_path(path: &Path) -> Result<Self, RosterError> {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_path(path)?;
        Self::parse(reader)
    }

    pub fn from_reader<R: Read>(input: R) -> Result<Self, RosterError> {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(input);
        Self::parse(reader)
    }

    fn parse<R: Read>(mut reader: csv::Reader<R>) -> Result<Self, RosterError> {
        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').to_string())
            .collect();

        let name_idx = find_column(&headers, NAME_COLUMNS).ok_or_else(|| {
            RosterError::MissingNameColumn {
                found: headers.join(", "),
            }
        })?;
        let token_idx = find_column(&headers, TOKEN_COLUMNS);

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            if record.iter().all(str::is_empty) {
                continue;
            }

            let mut row = RosterRow::named(record.get(name_idx).unwrap_or_default());
            row.token = token_idx
                .and_then(|i| record.get(i))
                .filter(|t| !t.is_empty())
                .map(str::to_string);
            row.extra = headers
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != name_idx && Some(*i) != token_idx)
                .filter_map(|(i, h)| record.get(i).map(|v| (h.clone(), v.to_string())))
                .collect::<BTreeMap<_, _>>();
            rows.push(row);
        }

        Ok(Roster {
            rows,
            has_token_column: token_idx.is_some(),
        })
    }

    /// The non-empty token column values, in row order.
    pub fn tokens(&self) -> Result<Vec<Token>, RosterError> {
        if !self.has_token_column {
            return Err(RosterError::MissingTokenColumn);
        }
        self.rows
            .iter()
            .enumerate()
            .filter_map(|(i, row)| row.token.as_deref().map(|t| (i + 1, t)))
            .map(|(row, t)| Token::parse(t).map_err(|source| RosterError::InvalidToken { row, source }))
            .collect()
    }
}

fn find_column(headers: &[String], candidates: &[&str]) -> Option<usize> {
    headers
        .iter()
        .position(|h| candidates.iter().any(|c| h.trim().eq_ignore_ascii_case(c)))
}
