//! Parsing of bulk queue requests coming from operator command streams.
//!
//! Two token formats are accepted:
//!
//! - by target: `target_id [start end] [repeats separation]`, the optional groups
//!   being enabled by [`BulkOptions`]
//! - by entry: `qid target_id start end` records, see [`EntryRequest`]
//!
//! Times are seconds since the Unix epoch; `nan` or `-` leaves a bound unbounded.
//! A malformed request is reported on its own and never aborts the batch.

use std::str::FromStr;

use qtty::Seconds;
use thiserror::Error;

use crate::queue::{QueueError, Window};
use crate::target::TargetId;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RequestError {
    #[error("Invalid target id: {0:?}")]
    InvalidId(String),

    #[error("Invalid queue entry id: {0:?}")]
    InvalidQid(String),

    #[error("Invalid time: {0:?}")]
    InvalidTime(String),

    #[error("Invalid repeat count: {0:?}")]
    InvalidRepeats(String),

    #[error("Request ends before all its fields were given")]
    Truncated,

    #[error("Invalid window: {0}")]
    Window(#[from] QueueError),

    #[error("Unknown target {0}")]
    UnknownTarget(TargetId),
}

/// Where `add_first` may place a new target relative to a queued one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FirstOrdering {
    /// First slot where the target is observable at all.
    #[default]
    None,
    /// Pass over entries that are west of the new target.
    HourAngle,
    /// Pass over entries that set before the new target does.
    SetFirst,
}

impl FirstOrdering {
    /// Operator code: 1 hour angle, 2 set first, anything else none.
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => FirstOrdering::HourAngle,
            2 => FirstOrdering::SetFirst,
            _ => FirstOrdering::None,
        }
    }
}

/// Shape of a by-target token stream and how parsed targets are inserted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BulkOptions {
    /// Every id is followed by a start and an end time.
    pub with_times: bool,
    /// Every request ends with a repeat count and a repeat separation.
    pub with_repeats: bool,
    /// Insert with `add_first` using this hint instead of at `index`.
    pub first_possible: Option<FirstOrdering>,
    /// Insertion index for `add_target` (negative counts from the back).
    pub index: isize,
    /// Clock start of the `add_first` slot simulation.
    pub now_hint: Option<Seconds>,
}

impl Default for BulkOptions {
    fn default() -> Self {
        Self {
            with_times: false,
            with_repeats: false,
            first_possible: None,
            index: -1,
            now_hint: None,
        }
    }
}

/// One parsed by-target request.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetRequest {
    pub target_id: TargetId,
    pub window: Window,
    pub repeats: Option<u32>,
    pub repeat_separation: Option<Seconds>,
}

/// One parsed by-entry request.
///
/// `qid` 0 creates a new entry, a positive qid updates that entry and moves it
/// to this position, a negative qid removes entry `-qid`.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryRequest {
    pub qid: i64,
    pub target_id: TargetId,
    pub window: Window,
}

pub fn parse_target_requests<'a, I>(tokens: I, options: &BulkOptions) -> Vec<Result<TargetRequest, RequestError>>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut tokens = tokens.into_iter();
    let mut requests = Vec::new();
    while let Some(id_token) = tokens.next() {
        requests.push(parse_target_request(id_token, &mut tokens, options));
    }
    requests
}

fn parse_target_request<'a>(
    id_token: &str,
    rest: &mut impl Iterator<Item = &'a str>,
    options: &BulkOptions,
) -> Result<TargetRequest, RequestError> {
    let target_id = parse_number::<TargetId>(id_token).ok_or_else(|| RequestError::InvalidId(id_token.into()))?;
    let (start, end) = if options.with_times {
        let start = parse_time(rest.next())?;
        let end = parse_time(rest.next())?;
        (start, end)
    } else {
        (None, None)
    };
    let (repeats, repeat_separation) = if options.with_repeats {
        let repeats = parse_repeats(rest.next())?;
        let separation = parse_time(rest.next())?;
        (repeats, separation)
    } else {
        (None, None)
    };
    Ok(TargetRequest {
        target_id,
        window: Window::new(start, end)?,
        repeats,
        repeat_separation,
    })
}

pub fn parse_entry_requests<'a, I>(tokens: I) -> Vec<Result<EntryRequest, RequestError>>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut tokens = tokens.into_iter();
    let mut requests = Vec::new();
    while let Some(qid_token) = tokens.next() {
        requests.push(parse_entry_request(qid_token, &mut tokens));
    }
    requests
}

fn parse_entry_request<'a>(
    qid_token: &str,
    rest: &mut impl Iterator<Item = &'a str>,
) -> Result<EntryRequest, RequestError> {
    // Consume the whole record before validating so one bad field does not shift
    // every following record.
    let fields = [rest.next(), rest.next(), rest.next()];
    let qid = parse_number::<i64>(qid_token).ok_or_else(|| RequestError::InvalidQid(qid_token.into()))?;
    let [Some(id_token), start, end] = fields else {
        return Err(RequestError::Truncated);
    };
    let target_id = parse_number::<TargetId>(id_token).ok_or_else(|| RequestError::InvalidId(id_token.into()))?;
    Ok(EntryRequest {
        qid,
        target_id,
        window: Window::new(parse_time(start)?, parse_time(end)?)?,
    })
}

fn parse_number<N: FromStr>(token: &str) -> Option<N> {
    token.trim().parse().ok()
}

fn is_unbounded(token: &str) -> bool {
    token == "-" || token.eq_ignore_ascii_case("nan")
}

fn parse_time(token: Option<&str>) -> Result<Option<Seconds>, RequestError> {
    let token = token.ok_or(RequestError::Truncated)?.trim();
    if is_unbounded(token) {
        return Ok(None);
    }
    match token.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(Some(Seconds::new(v))),
        _ => Err(RequestError::InvalidTime(token.into())),
    }
}

fn parse_repeats(token: Option<&str>) -> Result<Option<u32>, RequestError> {
    let token = token.ok_or(RequestError::Truncated)?.trim();
    if is_unbounded(token) {
        return Ok(None);
    }
    match token.parse::<i64>() {
        Ok(n) if n < 0 => Ok(None),
        Ok(n) => u32::try_from(n)
            .map(Some)
            .map_err(|_| RequestError::InvalidRepeats(token.into())),
        Err(_) => Err(RequestError::InvalidRepeats(token.into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(s: &str) -> Vec<&str> {
        s.split_whitespace().collect()
    }

    #[test]
    fn plain_ids() {
        let parsed = parse_target_requests(tokens("10 20 x 30"), &BulkOptions::default());
        assert_eq!(parsed.len(), 4);
        assert_eq!(parsed[0].as_ref().map(|r| r.target_id), Ok(10));
        assert_eq!(parsed[2], Err(RequestError::InvalidId("x".into())));
        assert_eq!(parsed[3].as_ref().map(|r| r.target_id), Ok(30));
    }

    #[test]
    fn ids_with_times() {
        let options = BulkOptions {
            with_times: true,
            ..BulkOptions::default()
        };
        let parsed = parse_target_requests(tokens("10 100 200 11 nan - 12 300 200"), &options);
        assert_eq!(parsed.len(), 3);
        let first = parsed[0].as_ref().unwrap();
        assert_eq!(first.window.start(), Some(Seconds::new(100.0)));
        assert_eq!(first.window.end(), Some(Seconds::new(200.0)));
        assert_eq!(parsed[1].as_ref().unwrap().window, Window::unbounded());
        assert!(matches!(parsed[2], Err(RequestError::Window(_))));
    }

    #[test]
    fn ids_with_repeats() {
        let options = BulkOptions {
            with_repeats: true,
            ..BulkOptions::default()
        };
        let parsed = parse_target_requests(tokens("10 3 600 11 -1 nan"), &options);
        let first = parsed[0].as_ref().unwrap();
        assert_eq!(first.repeats, Some(3));
        assert_eq!(first.repeat_separation, Some(Seconds::new(600.0)));
        let second = parsed[1].as_ref().unwrap();
        assert_eq!(second.repeats, None);
        assert_eq!(second.repeat_separation, None);
    }

    #[test]
    fn missing_times_are_truncated() {
        let options = BulkOptions {
            with_times: true,
            ..BulkOptions::default()
        };
        let parsed = parse_target_requests(tokens("10 100"), &options);
        assert_eq!(parsed, vec![Err(RequestError::Truncated)]);
    }

    #[test]
    fn entry_records() {
        let parsed = parse_entry_requests(tokens("0 10 - - 5 11 100 200 -3 12 nan nan"));
        assert_eq!(parsed.len(), 3);
        assert_eq!(parsed[0].as_ref().unwrap().qid, 0);
        assert_eq!(parsed[1].as_ref().unwrap().target_id, 11);
        assert_eq!(parsed[2].as_ref().unwrap().qid, -3);
    }

    #[test]
    fn bad_entry_record_does_not_shift_the_next() {
        let parsed = parse_entry_requests(tokens("0 ten - - 0 11 - -"));
        assert_eq!(parsed[0], Err(RequestError::InvalidId("ten".into())));
        assert_eq!(parsed[1].as_ref().unwrap().target_id, 11);
    }

    #[test]
    fn truncated_entry_record() {
        let parsed = parse_entry_requests(tokens("0 10"));
        assert_eq!(parsed, vec![Err(RequestError::Truncated)]);
    }

    #[test]
    fn first_ordering_codes() {
        assert_eq!(FirstOrdering::from_code(1), FirstOrdering::HourAngle);
        assert_eq!(FirstOrdering::from_code(2), FirstOrdering::SetFirst);
        assert_eq!(FirstOrdering::from_code(7), FirstOrdering::None);
    }
}
