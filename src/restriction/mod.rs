//! # Time Restrictions
//!
//! Expands calendar restrictions ("9 to 17", "weekends", "July") into
//! concrete ranges on the timeline and folds them into a mask.
//!
//! All calendar arithmetic is UTC. Restrictions are applied month, then
//! weekday, then hour; each step narrows the mask left by the previous one.

use chrono::{DateTime, Datelike, Months, NaiveDate, Utc};
use tracing::warn;

use crate::model::range::{complement, intersect};
use crate::model::{Range, RestrictionCondition, TimeRestriction, TimeRestrictions};

const MS_PER_HOUR: f64 = 3_600_000.0;
const MS_PER_DAY: f64 = 86_400_000.0;

/// The slot a restriction's numbers are measured in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalendarUnit {
    /// Hours of a day.
    Hour,
    /// Days of a week starting Sunday 00:00.
    Weekday,
    /// Months of a year starting January 1st.
    Month,
}

/// Narrow `masks` with every restriction present on a query.
pub fn apply(restrictions: Option<&TimeRestrictions>, masks: &[Range]) -> Vec<Range> {
    let Some(tr) = restrictions else {
        return masks.to_vec();
    };
    let masks = expand(tr.month.as_ref(), CalendarUnit::Month, masks);
    let masks = expand(tr.weekday.as_ref(), CalendarUnit::Weekday, &masks);
    expand(tr.hour.as_ref(), CalendarUnit::Hour, &masks)
}

/// Narrow each mask by one restriction. `InRange` keeps the expanded
/// ranges inside the mask, `OutRange` keeps the rest of the mask.
pub fn expand(restriction: Option<&TimeRestriction>, unit: CalendarUnit, masks: &[Range]) -> Vec<Range> {
    let Some(tr) = restriction else {
        return masks.to_vec();
    };
    masks
        .iter()
        .flat_map(|mask| {
            let inside = intersect(&occurrences(unit, &tr.ranges, *mask), &[*mask]);
            match tr.condition {
                RestrictionCondition::InRange => inside,
                RestrictionCondition::OutRange => complement(*mask, &inside),
            }
        })
        .collect()
}

/// Every occurrence of `ranges` in the slots that touch `mask`.
pub fn occurrences(unit: CalendarUnit, ranges: &[(f64, f64)], mask: Range) -> Vec<Range> {
    let (Some(first), Some(last)) = (to_date(mask.start), to_date(mask.end)) else {
        warn!(%mask, "mask outside the calendar range, restriction ignored");
        return Vec::new();
    };

    // Start one slot early so ranges spilling past their slot still count.
    let mut slot = previous_slot(unit, slot_start(unit, first));
    let mut out = Vec::new();
    while let Some(current) = slot {
        if current > last {
            break;
        }
        let base = to_millis(current);
        for &(a, b) in ranges {
            let start = offset(unit, current, base, a);
            let end = offset(unit, current, base, b);
            if let (Some(start), Some(end)) = (start, end) {
                out.push(Range::new(start, end));
            }
        }
        slot = next_slot(unit, current);
    }
    out
}

fn to_date(ms: i64) -> Option<NaiveDate> {
    DateTime::<Utc>::from_timestamp_millis(ms).map(|dt| dt.date_naive())
}

fn to_millis(date: NaiveDate) -> i64 {
    date.and_hms_opt(0, 0, 0).map_or(0, |dt| dt.and_utc().timestamp_millis())
}

fn slot_start(unit: CalendarUnit, date: NaiveDate) -> NaiveDate {
    match unit {
        CalendarUnit::Hour => date,
        CalendarUnit::Weekday => {
            let back = i64::from(date.weekday().num_days_from_sunday());
            date - chrono::Duration::days(back)
        }
        CalendarUnit::Month => NaiveDate::from_ymd_opt(date.year(), 1, 1).unwrap_or(date),
    }
}

fn next_slot(unit: CalendarUnit, slot: NaiveDate) -> Option<NaiveDate> {
    match unit {
        CalendarUnit::Hour => slot.succ_opt(),
        CalendarUnit::Weekday => slot.checked_add_days(chrono::Days::new(7)),
        CalendarUnit::Month => slot.checked_add_months(Months::new(12)),
    }
}

fn previous_slot(unit: CalendarUnit, slot: NaiveDate) -> Option<NaiveDate> {
    match unit {
        CalendarUnit::Hour => slot.pred_opt(),
        CalendarUnit::Weekday => slot.checked_sub_days(chrono::Days::new(7)),
        CalendarUnit::Month => slot.checked_sub_months(Months::new(12)),
    }
}

/// Timestamp of `slot + amount` units. Fractional months are scaled by the
/// length of the month they land in.
fn offset(unit: CalendarUnit, slot: NaiveDate, base: i64, amount: f64) -> Option<i64> {
    match unit {
        CalendarUnit::Hour => Some(base + (amount * MS_PER_HOUR).round() as i64),
        CalendarUnit::Weekday => Some(base + (amount * MS_PER_DAY).round() as i64),
        CalendarUnit::Month => {
            let whole = amount.floor();
            let month = slot.checked_add_months(Months::new(whole.max(0.0) as u32))?;
            let next = month.checked_add_months(Months::new(1))?;
            let days = (next - month).num_days() as f64;
            Some(to_millis(month) + ((amount - whole) * days * MS_PER_DAY).round() as i64)
        }
    }
}
