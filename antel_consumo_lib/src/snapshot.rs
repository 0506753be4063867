//! The immutable result of one fetch cycle.

use std::collections::BTreeMap;

use chrono::{DateTime, Months, NaiveDate, Utc};
use serde::Serialize;

use crate::error::FetchError;
use crate::normalize::DateSpan;

/// Where the used/total quantities came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QuantitySource {
    /// Matched by structured selectors or labelled patterns.
    #[default]
    Structured,
    /// Assigned from the first `<number><unit>` occurrences of the body text.
    /// Order-dependent; may misattribute values when the layout changes.
    BodyScan,
    /// No quantity was found at all.
    Missing,
}

impl QuantitySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Structured => "structured",
            Self::BodyScan => "body_scan",
            Self::Missing => "missing",
        }
    }
}

/// Values captured from the page, before derivation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CapturedFields {
    pub used_data_gb: Option<f64>,
    pub total_data_gb: Option<f64>,
    /// Only set when the page printed the remaining amount itself.
    pub remaining_data_gb: Option<f64>,
    pub topup_balance_gb: Option<f64>,
    pub topup_expiration: Option<NaiveDate>,
    pub plan_name: Option<String>,
    pub billing_period: Option<String>,
    pub billing_cycle: Option<DateSpan>,
    pub days_until_renewal: Option<u32>,
    pub contract_end_date: Option<NaiveDate>,
    pub quantity_source: QuantitySource,
    pub raw_data: BTreeMap<String, String>,
}

impl CapturedFields {
    /// Whether the page yielded any data quantity at all.
    pub fn has_quantities(&self) -> bool {
        self.used_data_gb.is_some()
            || self.total_data_gb.is_some()
            || self.remaining_data_gb.is_some()
    }
}

/// Consumption figures for the account, as of `captured_at`.
///
/// Built once through [`ConsumptionSnapshot::new`] and read through
/// accessors; there are no setters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsumptionSnapshot {
    captured_at: DateTime<Utc>,
    used_data_gb: Option<f64>,
    total_data_gb: Option<f64>,
    remaining_data_gb: Option<f64>,
    topup_balance_gb: Option<f64>,
    topup_expiration: Option<NaiveDate>,
    percentage_used: Option<f64>,
    plan_name: Option<String>,
    billing_period: Option<String>,
    billing_cycle: Option<DateSpan>,
    days_until_renewal: Option<u32>,
    contract_end_date: Option<NaiveDate>,
    quantity_source: QuantitySource,
    raw_data: BTreeMap<String, String>,
}

impl ConsumptionSnapshot {
    /// Applies the derivations and freezes the result.
    ///
    /// With both used and total present, remaining becomes `total - used`
    /// unless it was captured directly, and percentage becomes
    /// `used / total * 100` (only for a positive total; over quota reads
    /// above 100). Missing days-until-renewal is derived from the billing
    /// cycle end.
    pub fn new(fields: CapturedFields, captured_at: DateTime<Utc>, today: NaiveDate) -> Self {
        let (remaining, percentage) = match (fields.used_data_gb, fields.total_data_gb) {
            (Some(used), Some(total)) => {
                let remaining = fields.remaining_data_gb.or(Some(total - used));
                let percentage = (total > 0.0).then(|| used / total * 100.0);
                (remaining, percentage)
            }
            _ => (fields.remaining_data_gb, None),
        };

        let billing_cycle = fields.billing_cycle.map(|cycle| current_cycle(cycle, today));
        let days_until_renewal = fields.days_until_renewal.or_else(|| {
            billing_cycle.map(|cycle| (cycle.end - today).num_days().max(0) as u32)
        });

        Self {
            captured_at,
            used_data_gb: fields.used_data_gb,
            total_data_gb: fields.total_data_gb,
            remaining_data_gb: remaining,
            topup_balance_gb: fields.topup_balance_gb,
            topup_expiration: fields.topup_expiration,
            percentage_used: percentage,
            plan_name: fields.plan_name,
            billing_period: fields.billing_period,
            billing_cycle,
            days_until_renewal,
            contract_end_date: fields.contract_end_date,
            quantity_source: fields.quantity_source,
            raw_data: fields.raw_data,
        }
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    pub fn used_data_gb(&self) -> Option<f64> {
        self.used_data_gb
    }

    pub fn total_data_gb(&self) -> Option<f64> {
        self.total_data_gb
    }

    pub fn remaining_data_gb(&self) -> Option<f64> {
        self.remaining_data_gb
    }

    pub fn topup_balance_gb(&self) -> Option<f64> {
        self.topup_balance_gb
    }

    pub fn topup_expiration(&self) -> Option<NaiveDate> {
        self.topup_expiration
    }

    pub fn percentage_used(&self) -> Option<f64> {
        self.percentage_used
    }

    pub fn plan_name(&self) -> Option<&str> {
        self.plan_name.as_deref()
    }

    pub fn billing_period(&self) -> Option<&str> {
        self.billing_period.as_deref()
    }

    pub fn billing_cycle(&self) -> Option<DateSpan> {
        self.billing_cycle
    }

    pub fn days_until_renewal(&self) -> Option<u32> {
        self.days_until_renewal
    }

    pub fn contract_end_date(&self) -> Option<NaiveDate> {
        self.contract_end_date
    }

    pub fn quantity_source(&self) -> QuantitySource {
        self.quantity_source
    }

    /// Raw captured text per field, for post-mortem debugging.
    pub fn raw_data(&self) -> &BTreeMap<String, String> {
        &self.raw_data
    }

    /// Headline fields the page did not yield.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.used_data_gb.is_none() {
            missing.push("used_data_gb");
        }
        if self.total_data_gb.is_none() {
            missing.push("total_data_gb");
        }
        if self.remaining_data_gb.is_none() {
            missing.push("remaining_data_gb");
        }
        if self.plan_name.is_none() {
            missing.push("plan_name");
        }
        if self.billing_period.is_none() {
            missing.push("billing_period");
        }
        missing
    }

    /// `Err(ExtractionIncomplete)` for a partial snapshot.
    ///
    /// `fetch` hands partial snapshots out as valid results; this is for
    /// callers that would rather treat them as a failure.
    pub fn check_complete(&self) -> Result<(), FetchError> {
        let missing = self.missing_fields();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(FetchError::ExtractionIncomplete { missing })
        }
    }
}

/// A cycle printed without a year is anchored on the current year, so in
/// early January a December-to-January cycle lands a year late. Moves it
/// back when the earlier cycle is the one containing `today`.
fn current_cycle(cycle: DateSpan, today: NaiveDate) -> DateSpan {
    if cycle.start <= today {
        return cycle;
    }
    let year = Months::new(12);
    match (cycle.start.checked_sub_months(year), cycle.end.checked_sub_months(year)) {
        (Some(start), Some(end)) if start <= today && today <= end => DateSpan { start, end },
        _ => cycle,
    }
}
