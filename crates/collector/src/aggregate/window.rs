use db::{Duration, PrimitiveDateTime};

/// Bucket size of a time series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    Hour,
    Day,
}

impl Granularity {
    /// Truncate a timestamp to the start of its bucket.
    pub fn truncate(&self, ts: PrimitiveDateTime) -> PrimitiveDateTime {
        match self {
            Granularity::Hour => ts.date().midnight() + Duration::hours(ts.hour().into()),
            Granularity::Day => ts.date().midnight(),
        }
    }
}

/// Named time window that ends now.
#[derive(Debug, Clone, Copy)]
pub struct Window {
    pub label: &'static str,

    /// Window length, [`None`] for a window that starts with the earliest record.
    pub span: Option<Duration>,

    pub granularity: Granularity,
}

impl Window {
    const fn daily(label: &'static str, days: i64) -> Self {
        Self {
            label,
            span: Some(Duration::days(days)),
            granularity: Granularity::Day,
        }
    }

    const fn all() -> Self {
        Self {
            label: "All",
            span: None,
            granularity: Granularity::Day,
        }
    }

    /// Start of the window, given the timestamp of the earliest record.
    pub fn start(
        &self,
        now: PrimitiveDateTime,
        earliest: Option<PrimitiveDateTime>,
    ) -> Option<PrimitiveDateTime> {
        match self.span {
            Some(span) => Some(now - span),
            None => earliest,
        }
    }

    /// Check whether a timestamp belongs to the window.
    pub fn contains(
        &self,
        ts: PrimitiveDateTime,
        now: PrimitiveDateTime,
        earliest: Option<PrimitiveDateTime>,
    ) -> bool {
        self.start(now, earliest)
            .map_or(false, |start| start <= ts && ts <= now)
    }
}

/// Network resource history windows.
pub const HISTORICAL: [Window; 5] = [
    Window {
        label: "1d",
        span: Some(Duration::days(1)),
        granularity: Granularity::Hour,
    },
    Window::daily("7d", 7),
    Window::daily("1m", 30),
    Window::daily("1y", 365),
    Window::all(),
];

/// Pricing chart windows.
pub const PRICING: [Window; 5] = [
    Window::daily("7d", 7),
    Window::daily("1m", 30),
    Window::daily("6m", 180),
    Window::daily("1y", 365),
    Window::all(),
];

/// Transaction ledger windows.
pub const LEDGER: [Window; 7] = [
    Window::daily("7d", 7),
    Window::daily("14d", 14),
    Window::daily("1m", 30),
    Window::daily("3m", 90),
    Window::daily("6m", 180),
    Window::daily("1y", 365),
    Window::all(),
];
