//! `emi_schedule` is a Rust library for calculating the amortization schedule of a
//! fixed-rate installment loan (an EMI schedule).
//!
//! The installment is always derived from the standard monthly annuity formula. The
//! schedule can then be walked in one of two conventions:
//! - **12 installments per year**: the monthly rate splits every payment, and the loan
//!   closes after exactly the requested number of months.
//! - **13 installments per year**: the same installment is kept, but each payment is split
//!   at `annual rate / 13`, so the balance falls faster and the loan closes early.
//!
//! ## Usage
//!
//! Add `emi_schedule` to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! emi_schedule = "0.1.0"
//! rust_decimal = "1.39.0"
//! rust_decimal_macros = "1.39.0"
//! ```
//!
//! Then, use the `compute` function to get the installment, the totals and the
//! period-by-period schedule:
//!
//! ```rust
//! use emi_schedule::compute;
//! use rust_decimal_macros::dec;
//!
//! fn main() -> anyhow::Result<()> {
//!     let result = compute(dec!(8_000_000), dec!(8.50), 240, 13)?;
//!
//!     println!("EMI:            {:.2}", result.periodic_payment);
//!     println!("Total interest: {:.2}", result.total_interest_paid);
//!     println!("Total payable:  {:.2}", result.total_payment);
//!     println!("Installments:   {}", result.periods());
//!
//!     assert!(result.periods() < 240);
//!     Ok(())
//! }
//! ```

use rust_decimal::{Decimal, MathematicalOps, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Balance below which the loan is considered settled (one unit of currency).
pub const SETTLEMENT_THRESHOLD: Decimal = dec!(1);

/// Errors raised by the amortization engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmortizationError {
    #[error("Invalid input: {field} - {reason}")]
    InvalidInput { field: &'static str, reason: String },

    #[error("Arithmetic overflow while computing the {context}")]
    Arithmetic { context: &'static str },

    #[error("Invalid loan document: {0}")]
    Document(String),
}

impl AmortizationError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        AmortizationError::InvalidInput {
            field,
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for AmortizationError {
    fn from(e: serde_json::Error) -> Self {
        AmortizationError::Document(e.to_string())
    }
}

/// How many installments are paid per year.
///
/// Serialized as the plain integer `12` or `13`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum InstallmentFrequency {
    /// 12 EMIs per year, split at the monthly rate.
    #[default]
    Monthly,
    /// 13 EMIs per year of the monthly-derived amount, split at `annual rate / 13`.
    Thirteen,
}

impl InstallmentFrequency {
    pub fn per_year(self) -> u32 {
        match self {
            InstallmentFrequency::Monthly => 12,
            InstallmentFrequency::Thirteen => 13,
        }
    }
}

impl TryFrom<u32> for InstallmentFrequency {
    type Error = AmortizationError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            12 => Ok(InstallmentFrequency::Monthly),
            13 => Ok(InstallmentFrequency::Thirteen),
            other => Err(AmortizationError::invalid(
                "installments_per_year",
                format!("must be 12 or 13, got {other}"),
            )),
        }
    }
}

impl From<InstallmentFrequency> for u32 {
    fn from(frequency: InstallmentFrequency) -> Self {
        frequency.per_year()
    }
}

/// Unit in which a [`LoanRequest`] expresses its duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DurationUnit {
    #[default]
    Months,
    Years,
}

/// A loan as entered by a user: the duration may be given in months or years.
///
/// Omitted fields of a JSON document fall back to [`LoanRequest::default`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoanRequest {
    /// The amount borrowed.
    pub amount: Decimal,
    /// The annual nominal interest rate as a percentage (e.g., 8.5 for 8.5%).
    pub annual_rate_percent: Decimal,
    /// The loan duration, in `duration_unit`s.
    pub duration: u32,
    pub duration_unit: DurationUnit,
    pub installments_per_year: InstallmentFrequency,
}

impl Default for LoanRequest {
    fn default() -> Self {
        LoanRequest {
            amount: dec!(8_000_000),
            annual_rate_percent: dec!(8.50),
            duration: 240,
            duration_unit: DurationUnit::Months,
            installments_per_year: InstallmentFrequency::Monthly,
        }
    }
}

impl LoanRequest {
    /// Parses a request from a JSON document.
    pub fn from_json(document: &str) -> Result<Self, AmortizationError> {
        Ok(serde_json::from_str(document)?)
    }

    /// The duration expressed in months.
    pub fn total_months(&self) -> Result<u32, AmortizationError> {
        match self.duration_unit {
            DurationUnit::Months => Ok(self.duration),
            DurationUnit::Years => {
                self.duration
                    .checked_mul(12)
                    .ok_or(AmortizationError::Arithmetic {
                        context: "duration in months",
                    })
            }
        }
    }

    /// Normalizes the request into a validated [`LoanInput`].
    pub fn into_input(self) -> Result<LoanInput, AmortizationError> {
        let input = LoanInput {
            principal: self.amount,
            annual_rate_percent: self.annual_rate_percent,
            total_periods: self.total_months()?,
            installments_per_year: self.installments_per_year,
        };
        input.validate()?;
        Ok(input)
    }
}

/// Input parameters for an amortization calculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanInput {
    /// The principal amount of the loan.
    pub principal: Decimal,
    /// The annual nominal interest rate as a percentage (e.g., 8.5 for 8.5%).
    pub annual_rate_percent: Decimal,
    /// The nominal duration of the loan in months.
    pub total_periods: u32,
    /// Which periodic-rate convention the schedule is walked with.
    pub installments_per_year: InstallmentFrequency,
}

impl LoanInput {
    /// Parses and validates an input from a JSON document.
    pub fn from_json(document: &str) -> Result<Self, AmortizationError> {
        let input: LoanInput = serde_json::from_str(document)?;
        input.validate()?;
        Ok(input)
    }

    /// Rejects inputs the annuity formula cannot handle.
    ///
    /// A rate of exactly zero is rejected: `(1 + r)^n - 1` would be zero.
    pub fn validate(&self) -> Result<(), AmortizationError> {
        if self.principal <= dec!(0) {
            return Err(AmortizationError::invalid(
                "principal",
                "must be greater than zero",
            ));
        }
        if self.annual_rate_percent <= dec!(0) {
            return Err(AmortizationError::invalid(
                "annual_rate_percent",
                "must be greater than zero",
            ));
        }
        if self.total_periods == 0 {
            return Err(AmortizationError::invalid(
                "total_periods",
                "must be at least one",
            ));
        }
        Ok(())
    }

    /// Hard upper bound on the number of periods the schedule walk may produce.
    pub fn period_limit(&self) -> u32 {
        self.total_periods.saturating_mul(2)
    }
}

/// Represents the payment details for a single period.
///
/// Every amount is rounded to 2 decimal places.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    /// 1-based period index.
    pub period: u32,
    /// The installment paid this period.
    pub payment: Decimal,
    /// The portion of the payment that covers interest.
    pub interest_component: Decimal,
    /// The portion of the payment that goes towards reducing the principal.
    pub principal_component: Decimal,
    /// The outstanding principal after this period's payment.
    pub remaining_balance: Decimal,
}

/// Contains the installment, the totals and the schedule of one calculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmortizationResult {
    /// The fixed installment amount.
    pub periodic_payment: Decimal,
    /// The interest paid over the schedule actually produced.
    pub total_interest_paid: Decimal,
    /// Principal plus total interest.
    pub total_payment: Decimal,
    /// One entry per period, in period order.
    pub schedule: Vec<ScheduleEntry>,
    /// `true` when the walk hit the period limit before the balance was settled.
    pub truncated: bool,
}

impl AmortizationResult {
    /// Number of installments in the schedule.
    pub fn periods(&self) -> usize {
        self.schedule.len()
    }

    /// The share of `total_payment` that is interest, as a fraction in `[0, 1)`.
    pub fn interest_share(&self) -> Decimal {
        self.total_interest_paid
            .checked_div(self.total_payment)
            .unwrap_or_default()
    }

    /// The balance left after the last installment.
    pub fn final_balance(&self) -> Decimal {
        self.schedule
            .last()
            .map(|entry| entry.remaining_balance)
            .unwrap_or_default()
    }
}

fn to_currency(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Converts an annual percentage into the monthly rate used to derive the installment.
pub fn base_monthly_rate(annual_rate_percent: Decimal) -> Decimal {
    annual_rate_percent / dec!(1200)
}

/// Converts an annual percentage into the periodic rate used to split each payment.
///
/// For [`InstallmentFrequency::Monthly`] this equals [`base_monthly_rate`].
pub fn schedule_rate(annual_rate_percent: Decimal, frequency: InstallmentFrequency) -> Decimal {
    annual_rate_percent / (Decimal::from(frequency.per_year()) * dec!(100))
}

/// Calculates the fixed installment of an annuity loan.
///
/// The formula is: PMT = P * [i(1 + i)^n] / [(1 + i)^n – 1]
///
/// # Arguments
///
/// * `principal` - The principal loan amount.
/// * `monthly_rate` - The periodic interest rate as a decimal (not percentage).
/// * `periods` - The number of payments.
///
/// # Errors
///
/// Returns `InvalidInput` if `periods` is zero or `monthly_rate` is not positive, and
/// `Arithmetic` if the compound factor does not fit in a `Decimal`.
pub fn installment_amount(
    principal: Decimal,
    monthly_rate: Decimal,
    periods: u32,
) -> Result<Decimal, AmortizationError> {
    if periods == 0 {
        return Err(AmortizationError::invalid(
            "total_periods",
            "must be at least one",
        ));
    }
    if monthly_rate <= dec!(0) {
        return Err(AmortizationError::invalid(
            "annual_rate_percent",
            "periodic rate must be greater than zero",
        ));
    }

    let i_plus_1_pow_n = (dec!(1) + monthly_rate)
        .checked_powu(periods.into())
        .ok_or(AmortizationError::Arithmetic {
            context: "compound growth factor",
        })?;

    principal
        .checked_mul(monthly_rate)
        .and_then(|v| v.checked_mul(i_plus_1_pow_n))
        .and_then(|v| v.checked_div(i_plus_1_pow_n - dec!(1)))
        .ok_or(AmortizationError::Arithmetic {
            context: "installment amount",
        })
}

/// Walks a declining balance with a fixed installment until it is settled.
///
/// Each period charges `balance * schedule_rate` as interest and applies the rest of
/// the installment to the balance, which never goes below zero. The walk stops once
/// the balance drops under [`SETTLEMENT_THRESHOLD`] or after `period_limit` periods,
/// in which case the result is flagged as `truncated`.
///
/// # Errors
///
/// Returns `InvalidInput` if any argument is non-positive, or if the installment does
/// not exceed the first period's interest (the balance would never decrease).
pub fn walk_schedule(
    principal: Decimal,
    schedule_rate: Decimal,
    installment: Decimal,
    period_limit: u32,
) -> Result<AmortizationResult, AmortizationError> {
    if principal <= dec!(0) {
        return Err(AmortizationError::invalid(
            "principal",
            "must be greater than zero",
        ));
    }
    if schedule_rate <= dec!(0) {
        return Err(AmortizationError::invalid(
            "annual_rate_percent",
            "periodic rate must be greater than zero",
        ));
    }
    if period_limit == 0 {
        return Err(AmortizationError::invalid(
            "total_periods",
            "must be at least one",
        ));
    }
    if installment <= principal * schedule_rate {
        return Err(AmortizationError::invalid(
            "installment",
            format!(
                "{} does not cover the first period's interest of {}",
                to_currency(installment),
                to_currency(principal * schedule_rate)
            ),
        ));
    }

    let payment = to_currency(installment);
    let mut current_balance = principal;
    let mut total_interest = dec!(0);
    let mut schedule = Vec::new();

    for period in 1..=period_limit {
        let interest = current_balance * schedule_rate;
        let amortization = installment - interest;
        current_balance = (current_balance - amortization).max(dec!(0));
        total_interest += interest;

        schedule.push(ScheduleEntry {
            period,
            payment,
            interest_component: to_currency(interest),
            principal_component: to_currency(amortization),
            remaining_balance: to_currency(current_balance),
        });

        if current_balance < SETTLEMENT_THRESHOLD {
            break;
        }
    }

    let truncated = current_balance >= SETTLEMENT_THRESHOLD;
    if truncated {
        tracing::warn!(
            period_limit,
            remaining_balance = %to_currency(current_balance),
            "schedule truncated before the balance was settled"
        );
    }

    let total_interest_paid = to_currency(total_interest);
    Ok(AmortizationResult {
        periodic_payment: payment,
        total_interest_paid,
        total_payment: principal + total_interest_paid,
        schedule,
        truncated,
    })
}

/// Calculates the amortization schedule of a validated loan.
///
/// The installment comes from the monthly annuity formula over `total_periods` months,
/// whatever the frequency; only the rate used to split each payment follows
/// `installments_per_year`.
///
/// # Errors
///
/// Returns `InvalidInput` if the loan fails [`LoanInput::validate`].
pub fn calculate_amortization(input: &LoanInput) -> Result<AmortizationResult, AmortizationError> {
    input.validate()?;
    tracing::debug!(
        principal = %input.principal,
        annual_rate_percent = %input.annual_rate_percent,
        total_periods = input.total_periods,
        installments_per_year = input.installments_per_year.per_year(),
        "calculating amortization schedule"
    );

    let installment = installment_amount(
        input.principal,
        base_monthly_rate(input.annual_rate_percent),
        input.total_periods,
    )?;
    let result = walk_schedule(
        input.principal,
        schedule_rate(input.annual_rate_percent, input.installments_per_year),
        installment,
        input.period_limit(),
    )?;

    tracing::debug!(
        periods = result.periods(),
        periodic_payment = %result.periodic_payment,
        "amortization schedule calculated"
    );
    Ok(result)
}

/// Calculates the schedule for a caller-chosen installment instead of the annuity one.
///
/// The walk is bounded by the same period limit as [`calculate_amortization`].
///
/// # Errors
///
/// Returns `InvalidInput` if the loan is invalid or the installment does not exceed the
/// first period's interest.
pub fn calculate_with_installment(
    input: &LoanInput,
    installment: Decimal,
) -> Result<AmortizationResult, AmortizationError> {
    input.validate()?;
    tracing::debug!(
        principal = %input.principal,
        %installment,
        "calculating schedule for a custom installment"
    );

    walk_schedule(
        input.principal,
        schedule_rate(input.annual_rate_percent, input.installments_per_year),
        installment,
        input.period_limit(),
    )
}

/// Calculates the amortization schedule from four scalar inputs.
///
/// This is the main entry point of the library.
///
/// # Arguments
///
/// * `principal` - The principal loan amount.
/// * `annual_rate_percent` - The annual interest rate as a percentage.
/// * `total_periods` - The loan duration in months.
/// * `installments_per_year` - `12` or `13`.
///
/// # Errors
///
/// Returns `InvalidInput` if any input is non-positive or the frequency is not 12 or 13.
pub fn compute(
    principal: Decimal,
    annual_rate_percent: Decimal,
    total_periods: u32,
    installments_per_year: u32,
) -> Result<AmortizationResult, AmortizationError> {
    let input = LoanInput {
        principal,
        annual_rate_percent,
        total_periods,
        installments_per_year: InstallmentFrequency::try_from(installments_per_year)?,
    };
    calculate_amortization(&input)
}
