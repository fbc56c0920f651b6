//! Reads monthly amounts out of an uploaded `.xlsx` workbook.
//!
//! Only the first worksheet is read. Its first row holds the headers; the `Month` and `Amount`
//! columns may appear in any position. Rows without a recognizable month or without a numeric
//! amount are skipped, so trailing totals, notes and blank lines do not fail an upload.

use crate::error::{Error, ErrorType};
use crate::model::{Amount, Month, ParsedRow};
use crate::Result;
use calamine::{open_workbook, Data, Range, Reader, Xlsx};
use std::collections::HashSet;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, trace};

pub(crate) const MONTH_HEADER: &str = "Month";
pub(crate) const AMOUNT_HEADER: &str = "Amount";

/// The message for any workbook that does not contain usable monthly data.
pub(crate) const INVALID_FORMAT: &str = "Invalid Excel format. Required columns: Month, Amount";

/// Parses the first worksheet of the `.xlsx` file at `path`.
///
/// # Errors
/// - `ErrorType::InvalidFormat` if the file is not a readable workbook, has no worksheet, lacks
///   either header, yields no usable rows, or names the same month twice.
pub(crate) fn parse_workbook(path: &Path) -> Result<Vec<ParsedRow>> {
    let mut workbook: Xlsx<_> = open_workbook(path)
        .map_err(|e| Error::with_source(ErrorType::InvalidFormat, INVALID_FORMAT, e))?;

    let range = match workbook.worksheet_range_at(0) {
        Some(Ok(range)) => range,
        Some(Err(e)) => {
            return Err(Error::with_source(
                ErrorType::InvalidFormat,
                INVALID_FORMAT,
                e,
            ))
        }
        None => return Err(Error::new(ErrorType::InvalidFormat, INVALID_FORMAT)),
    };

    parse_range(&range)
}

fn parse_range(range: &Range<Data>) -> Result<Vec<ParsedRow>> {
    let mut rows = range.rows();
    let headers = rows
        .next()
        .ok_or_else(|| Error::new(ErrorType::InvalidFormat, INVALID_FORMAT))?;
    let month_col = column(headers, MONTH_HEADER)?;
    let amount_col = column(headers, AMOUNT_HEADER)?;

    let mut parsed = Vec::new();
    let mut seen = HashSet::new();
    for (i, row) in rows.enumerate() {
        let Some(month) = row.get(month_col).and_then(month_cell) else {
            trace!("Skipping spreadsheet row {}, no month", i + 2);
            continue;
        };
        let cell = row.get(amount_col).unwrap_or(&Data::Empty);
        let Some(amount) = amount_cell(cell, month)? else {
            trace!("Skipping spreadsheet row {}, the amount is not a number", i + 2);
            continue;
        };
        if !seen.insert(month) {
            return Err(Error::new(
                ErrorType::InvalidFormat,
                format!("Invalid Excel format. The month {month} appears more than once"),
            ));
        }
        parsed.push(ParsedRow::new(month, amount));
    }

    if parsed.is_empty() {
        return Err(Error::new(ErrorType::InvalidFormat, INVALID_FORMAT));
    }
    debug!("Parsed {} usable rows from the spreadsheet", parsed.len());
    Ok(parsed)
}

/// Finds the index of the header cell whose trimmed text equals `name`, ignoring case.
fn column(headers: &[Data], name: &str) -> Result<usize> {
    headers
        .iter()
        .position(|cell| match cell {
            Data::String(s) => s.trim().eq_ignore_ascii_case(name),
            _ => false,
        })
        .ok_or_else(|| Error::new(ErrorType::InvalidFormat, INVALID_FORMAT))
}

fn month_cell(cell: &Data) -> Option<Month> {
    match cell {
        Data::String(s) => Month::from_str(s.trim()).ok(),
        _ => None,
    }
}

/// Numeric cells are amounts, and so is text that parses as one. Zero is a perfectly good
/// amount; empty, boolean, date and error cells are not amounts. A numeric cell too large to
/// store exactly fails the whole upload rather than quietly losing the month.
fn amount_cell(cell: &Data, month: Month) -> Result<Option<Amount>> {
    match cell {
        Data::Float(f) if f.is_finite() => Amount::from_f64(*f).map(Some).ok_or_else(|| {
            Error::new(
                ErrorType::InvalidFormat,
                format!("Invalid Excel format. The {month} amount {f} is out of range"),
            )
        }),
        Data::Int(i) => Ok(Some(Amount::new((*i).into()))),
        Data::String(s) => Ok(Amount::from_str(s).ok()),
        _ => Ok(None),
    }
}
