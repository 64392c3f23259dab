use chrono::NaiveDate;

/// Which pass a run belongs to. Crawl and count passes keep separate run
/// histories and separate revisit intervals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunKind {
    Crawl,
    Count,
}

impl RunKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RunKind::Crawl => "crawl",
            RunKind::Count => "count",
        }
    }
}

/// Revisit policy in whole calendar days.
///
/// `revisit_days == 0` always runs, as does a server with no prior run.
/// Otherwise the calendar-day gap between `today` and the last run date must
/// reach `revisit_days`; the time of day of the last run is irrelevant.
pub fn revisit_due(last_run: Option<NaiveDate>, today: NaiveDate, revisit_days: u32) -> bool {
    if revisit_days == 0 {
        return true;
    }
    match last_run {
        None => true,
        Some(last) => (today - last).num_days() >= i64::from(revisit_days),
    }
}
