//! Linear offer pricing and reference instance comparison.
//!
//! Offers priced with the linear model advertise a usage vector, e.g.
//! `["golem.usage.cpu_sec", "golem.usage.duration_sec"]`, and a coefficient
//! list of the same length plus a trailing flat start price. The monthly price
//! assumes the offer is fully utilized for the whole current month.

use std::cmp::Ordering;

use derive_more::{Display, Error};
use time::{util::days_in_year_month, Date};

use crate::{properties::Properties, runtime::Runtime};

/// Usage metric billed per second of CPU time.
pub const CPU_USAGE: &str = "golem.usage.cpu_sec";

/// Usage metric billed per second of activity duration.
pub const DURATION_USAGE: &str = "golem.usage.duration_sec";

/// Ceiling applied to every derived price.
pub const PRICE_CAP: f64 = 999_999_999.0;

/// Hours per month used to convert reference instance hourly prices.
pub const REFERENCE_HOURS_PER_MONTH: f64 = 730.0;

const SECONDS_PER_HOUR: f64 = 3600.0;

fn cap(price: f64) -> f64 {
    price.min(PRICE_CAP)
}

/// Errors that prevent a single offer from being priced.
#[derive(Debug, Display, Error, PartialEq)]
pub enum PricingError {
    #[display(fmt = "missing property {}", _0)]
    MissingProperty(#[error(ignore)] &'static str),

    #[display(fmt = "usage vector doesn't contain {}", _0)]
    MissingUsage(#[error(ignore)] &'static str),

    #[display(fmt = "pricing coefficients don't match usage vector")]
    CoefficientMismatch,
}

/// Length of the current month.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthClock {
    days: u8,
}

impl MonthClock {
    pub fn for_date(date: Date) -> Self {
        Self {
            days: days_in_year_month(date.year(), date.month()),
        }
    }

    pub fn with_days(days: u8) -> Self {
        Self { days }
    }

    pub fn days(&self) -> u8 {
        self.days
    }

    pub fn hours(&self) -> f64 {
        f64::from(self.days) * 24.0
    }

    pub fn seconds(&self) -> f64 {
        self.hours() * SECONDS_PER_HOUR
    }
}

/// Per-second coefficients of a linear pricing model, in GLM.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearPricing {
    pub cpu_per_second: f64,
    pub duration_per_second: f64,
    pub start: f64,
}

impl LinearPricing {
    pub fn from_properties(properties: &Properties) -> Result<Self, PricingError> {
        let usage = properties
            .usage_vector()
            .ok_or(PricingError::MissingProperty(crate::properties::USAGE_VECTOR))?;

        let coeffs = properties
            .pricing_coeffs()
            .ok_or(PricingError::MissingProperty(crate::properties::PRICING_COEFFS))?;

        let coefficient = |metric: &'static str| {
            let index = usage
                .iter()
                .position(|name| *name == metric)
                .ok_or(PricingError::MissingUsage(metric))?;

            coeffs
                .get(index)
                .copied()
                .ok_or(PricingError::CoefficientMismatch)
        };

        let cpu_per_second = coefficient(CPU_USAGE)?;
        let duration_per_second = coefficient(DURATION_USAGE)?;

        if coeffs.len() <= usage.len() {
            return Err(PricingError::CoefficientMismatch);
        }

        let start = coeffs
            .last()
            .copied()
            .ok_or(PricingError::CoefficientMismatch)?;

        Ok(Self {
            cpu_per_second,
            duration_per_second,
            start,
        })
    }

    pub fn cpu_per_hour(&self) -> f64 {
        self.cpu_per_second * SECONDS_PER_HOUR
    }

    pub fn env_per_hour(&self) -> f64 {
        self.duration_per_second * SECONDS_PER_HOUR
    }

    /// Uncapped price of running `threads` CPU threads for the whole month.
    pub fn monthly(&self, clock: MonthClock, threads: f64) -> f64 {
        self.duration_per_second * clock.seconds()
            + self.cpu_per_second * clock.seconds() * threads
            + self.start
    }
}

/// Derived offer prices.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OfferPricing {
    pub monthly_glm: f64,
    pub monthly_usd: f64,
    pub hourly_glm: f64,
    pub hourly_usd: f64,
}

/// Price an offer for the month described by `clock`.
///
/// Returns [`None`] for runtimes without a supported pricing model.
pub fn price_offer(
    properties: &Properties,
    clock: MonthClock,
    glm_usd: f64,
) -> Result<Option<OfferPricing>, PricingError> {
    match properties.runtime() {
        Some(Runtime::Priced(_)) => {}
        Some(Runtime::Unpriced(_)) | None => return Ok(None),
    }

    let linear = LinearPricing::from_properties(properties)?;
    let threads = properties
        .threads()
        .ok_or(PricingError::MissingProperty(crate::properties::CPU_THREADS))?;

    let monthly_glm = cap(linear.monthly(clock, threads as f64));
    let monthly_usd = cap(monthly_glm * glm_usd);

    Ok(Some(OfferPricing {
        monthly_glm,
        monthly_usd,
        hourly_glm: cap(monthly_glm / clock.hours()),
        hourly_usd: cap(monthly_usd / clock.hours()),
    }))
}

/// Reference instance specification used for comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceSpec {
    pub id: i64,
    pub vcpu: f64,
    pub memory: f64,
    pub price_usd: f64,
}

impl ReferenceSpec {
    pub fn monthly_usd(&self) -> f64 {
        self.price_usd * REFERENCE_HOURS_PER_MONTH
    }
}

/// Find the reference instance closest to the provided specification.
///
/// Instances are ordered by vCPU distance, then memory distance,
/// then price, so equally distant instances resolve to the cheapest one.
pub fn closest_reference(
    references: &[ReferenceSpec],
    vcpu: f64,
    memory: f64,
) -> Option<&ReferenceSpec> {
    references.iter().min_by(|a, b| {
        let key = |spec: &ReferenceSpec| {
            (
                (spec.vcpu - vcpu).abs(),
                (spec.memory - memory).abs(),
                spec.price_usd,
            )
        };

        let (a, b) = (key(a), key(b));

        a.0.total_cmp(&b.0)
            .then_with(|| a.1.total_cmp(&b.1))
            .then_with(|| a.2.total_cmp(&b.2))
    })
}

/// Outcome of a reference instance comparison.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Comparison {
    pub is_overpriced: bool,
    pub overpriced_compared_to: Option<i64>,
    pub times_more_expensive: Option<f64>,
    pub cheaper_than: Option<i64>,
    pub times_cheaper: Option<f64>,
    pub suggest_env_per_hour_price: Option<f64>,
}

/// Compare an offer's monthly USD price with a reference instance.
///
/// Returns [`None`] when the reference instance has no usable price,
/// in which case previously stored comparison results must be kept.
/// Unpriced offers produce a neutral comparison.
pub fn compare(
    offer_monthly_usd: f64,
    reference: &ReferenceSpec,
    clock: MonthClock,
    glm_usd: f64,
) -> Option<Comparison> {
    let reference_monthly = reference.monthly_usd();

    if reference_monthly == 0.0 {
        return None;
    }

    if offer_monthly_usd == 0.0 {
        return Some(Comparison::default());
    }

    let comparison = match offer_monthly_usd.total_cmp(&reference_monthly) {
        Ordering::Greater => Comparison {
            is_overpriced: true,
            overpriced_compared_to: Some(reference.id),
            times_more_expensive: Some(offer_monthly_usd / reference_monthly),
            suggest_env_per_hour_price: (glm_usd > 0.0)
                .then(|| reference_monthly / glm_usd / clock.hours()),
            ..Default::default()
        },
        Ordering::Less => Comparison {
            cheaper_than: Some(reference.id),
            times_cheaper: Some(reference_monthly / offer_monthly_usd),
            ..Default::default()
        },
        Ordering::Equal => Comparison::default(),
    };

    Some(comparison)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{
        closest_reference, compare, price_offer, LinearPricing, MonthClock, PricingError,
        ReferenceSpec, PRICE_CAP,
    };
    use crate::flatten::flatten;

    fn vm_offer(coeffs: serde_json::Value, threads: u32) -> crate::Properties {
        flatten(&json!({
            "golem.runtime.name": "vm",
            "golem.inf.cpu.threads": threads,
            "golem.com.usage.vector": ["golem.usage.cpu_sec", "golem.usage.duration_sec"],
            "golem.com.pricing.model.linear.coeffs": coeffs,
        }))
        .expect("input is a mapping")
    }

    #[test]
    fn monthly_price() {
        let props = vm_offer(json!([2.7e-6, 0.0, 0.0]), 4);

        let pricing = price_offer(&props, MonthClock::with_days(30), 0.25)
            .expect("offer is valid")
            .expect("vm is priced");

        assert!((pricing.monthly_glm - 27.9936).abs() < 1e-9);
        assert!((pricing.monthly_usd - 6.9984).abs() < 1e-9);
        assert!((pricing.hourly_glm - 27.9936 / 720.0).abs() < 1e-12);
        assert!((pricing.hourly_usd - 6.9984 / 720.0).abs() < 1e-12);
    }

    #[test]
    fn duration_and_start_terms() {
        let props = vm_offer(json!([0.0, 1e-5, 2.5]), 2);
        let clock = MonthClock::with_days(31);

        let pricing = price_offer(&props, clock, 1.0)
            .expect("offer is valid")
            .expect("vm is priced");

        assert!((pricing.monthly_glm - (1e-5 * 31.0 * 86400.0 + 2.5)).abs() < 1e-9);
    }

    #[test]
    fn prices_are_capped() {
        let props = vm_offer(json!([1e9, 1e9, 0.0]), 64);

        let pricing = price_offer(&props, MonthClock::with_days(28), 100.0)
            .expect("offer is valid")
            .expect("vm is priced");

        assert_eq!(pricing.monthly_glm, PRICE_CAP);
        assert_eq!(pricing.monthly_usd, PRICE_CAP);
        assert_eq!(pricing.hourly_usd, PRICE_CAP / (28.0 * 24.0));
    }

    #[test]
    fn unpriced_runtime() {
        let props = flatten(&json!({ "golem.runtime.name": "wasmtime" })).expect("mapping");

        assert_eq!(price_offer(&props, MonthClock::with_days(30), 1.0), Ok(None));
    }

    #[test]
    fn missing_pricing_keys() {
        let props = flatten(&json!({
            "golem.runtime.name": "vm-nvidia",
            "golem.inf.cpu.threads": 4,
            "golem.com.usage.vector": ["golem.usage.cpu_sec"],
            "golem.com.pricing.model.linear.coeffs": [0.1, 0.0],
        }))
        .expect("mapping");

        assert_eq!(
            LinearPricing::from_properties(&props),
            Err(PricingError::MissingUsage(super::DURATION_USAGE))
        );

        let props = vm_offer(json!([0.1, 0.2]), 4);

        assert_eq!(
            price_offer(&props, MonthClock::with_days(30), 1.0),
            Err(PricingError::CoefficientMismatch)
        );
    }

    #[test]
    fn month_clock() {
        let date = time::Date::from_calendar_date(2024, time::Month::February, 10)
            .expect("valid date");

        let clock = MonthClock::for_date(date);

        assert_eq!(clock.days(), 29);
        assert_eq!(clock.hours(), 696.0);
        assert_eq!(clock.seconds(), 2505600.0);
    }

    fn reference(id: i64, vcpu: f64, memory: f64, price_usd: f64) -> ReferenceSpec {
        ReferenceSpec {
            id,
            vcpu,
            memory,
            price_usd,
        }
    }

    #[test]
    fn closest_reference_prefers_cheapest_tie() {
        let references = [
            reference(1, 8.0, 32.0, 0.40),
            reference(2, 4.0, 16.0, 0.20),
            reference(3, 4.0, 16.0, 0.15),
            reference(4, 4.0, 8.0, 0.05),
        ];

        let closest = closest_reference(&references, 4.0, 16.0).expect("non-empty catalog");

        assert_eq!(closest.id, 3);
        assert!(closest_reference(&[], 4.0, 16.0).is_none());
    }

    #[test]
    fn comparison_outcomes() {
        let clock = MonthClock::with_days(30);
        let spec = reference(7, 4.0, 16.0, 0.1);

        let overpriced = compare(146.0, &spec, clock, 0.5).expect("reference is priced");

        assert!(overpriced.is_overpriced);
        assert_eq!(overpriced.overpriced_compared_to, Some(7));
        assert_eq!(overpriced.times_more_expensive, Some(2.0));
        assert_eq!(overpriced.cheaper_than, None);
        assert_eq!(
            overpriced.suggest_env_per_hour_price,
            Some(73.0 / 0.5 / 720.0)
        );

        let cheaper = compare(36.5, &spec, clock, 0.5).expect("reference is priced");

        assert!(!cheaper.is_overpriced);
        assert_eq!(cheaper.cheaper_than, Some(7));
        assert_eq!(cheaper.times_cheaper, Some(2.0));
        assert_eq!(cheaper.overpriced_compared_to, None);

        let free = reference(8, 4.0, 16.0, 0.0);

        assert_eq!(compare(36.5, &free, clock, 0.5), None);
        assert_eq!(
            compare(0.0, &spec, clock, 0.5),
            Some(Default::default())
        );
    }
}
