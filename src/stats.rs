//! Pass/fail/skip statistics and the classification rule shared by every
//! rollup level.

use std::fmt;
use std::iter::Sum;
use std::ops::Add;

/// Outcome of a step, or the classification of a rolled-up entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Passed,
    Failed,
    Skipped,
}

/// Recognized status names. Matching is ASCII case-insensitive.
const STATUS_NAMES: [(&str, Status); 3] = [
    ("passed", Status::Passed),
    ("failed", Status::Failed),
    ("skipped", Status::Skipped),
];

impl Status {
    /// Look up a status by its report name, e.g. `"PASSED"` or `"failed"`.
    pub fn lookup(raw: &str) -> Option<Self> {
        STATUS_NAMES
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(raw.trim()))
            .map(|(_, status)| *status)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Passed => "passed",
            Status::Failed => "failed",
            Status::Skipped => "skipped",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pass rate with exactly one fractional digit, stored as tenths of a percent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct PassPercentage {
    tenths: u64,
}

impl PassPercentage {
    /// `passed / total` rounded half-up to three decimals, times 100.
    ///
    /// Returns `None` when `total` is zero.
    pub fn of(passed: u64, total: u64) -> Option<Self> {
        if total == 0 {
            return None;
        }
        let tenths = (passed * 2000 + total) / (2 * total);
        Some(Self { tenths })
    }

    pub fn tenths(&self) -> u64 {
        self.tenths
    }

    pub fn as_f64(&self) -> f64 {
        self.tenths as f64 / 10.0
    }
}

impl fmt::Display for PassPercentage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.tenths / 10, self.tenths % 10)
    }
}

/// Finest fraction of a second kept by [`Seconds`]
const MAX_SCALE: u32 = 18;

/// Exact decimal duration, `units / 10^scale` seconds.
///
/// Always stored without trailing fractional zeros, so equal durations
/// compare equal and sums never pick up binary rounding error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Seconds {
    units: i128,
    scale: u32,
}

impl Seconds {
    pub const ZERO: Seconds = Seconds { units: 0, scale: 0 };

    /// Parse decimal text such as `"3.5"`, `"-0.25"` or `"1.2E-3"`.
    ///
    /// Returns `None` for anything that is not a finite decimal, or that
    /// needs more than eighteen fractional digits.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let (mantissa, exponent) = match text.find(|c: char| c == 'e' || c == 'E') {
            Some(at) => (&text[..at], text[at + 1..].parse::<i64>().ok()?),
            None => (text, 0),
        };
        let (negative, digits) = match mantissa.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, mantissa.strip_prefix('+').unwrap_or(mantissa)),
        };
        let (whole, fraction) = digits.split_once('.').unwrap_or((digits, ""));
        if whole.is_empty() && fraction.is_empty() {
            return None;
        }

        let mut units: i128 = 0;
        for c in whole.bytes().chain(fraction.bytes()) {
            if !c.is_ascii_digit() {
                return None;
            }
            units = units.checked_mul(10)?.checked_add(i128::from(c - b'0'))?;
        }
        if units == 0 {
            return Some(Self::ZERO);
        }

        let mut scale = i64::try_from(fraction.len()).ok()?.checked_sub(exponent)?;
        while scale < 0 {
            units = units.checked_mul(10)?;
            scale += 1;
        }
        if negative {
            units = -units;
        }

        let seconds = Self {
            units,
            scale: u32::try_from(scale).ok()?,
        }
        .normalized();
        (seconds.scale <= MAX_SCALE).then_some(seconds)
    }

    fn normalized(mut self) -> Self {
        while self.scale > 0 && self.units % 10 == 0 {
            self.units /= 10;
            self.scale -= 1;
        }
        self
    }

    fn units_at(&self, scale: u32) -> i128 {
        self.units.saturating_mul(10i128.pow(scale.saturating_sub(self.scale)))
    }

    /// Nearest `f64`, for writing as a float field.
    pub fn as_f64(&self) -> f64 {
        self.to_string().parse().unwrap_or_default()
    }
}

impl Add for Seconds {
    type Output = Seconds;

    fn add(self, other: Seconds) -> Seconds {
        let scale = self.scale.max(other.scale);
        Seconds {
            units: self.units_at(scale).saturating_add(other.units_at(scale)),
            scale,
        }
        .normalized()
    }
}

impl Sum for Seconds {
    fn sum<I: Iterator<Item = Seconds>>(iter: I) -> Seconds {
        iter.fold(Seconds::ZERO, Add::add)
    }
}

impl fmt::Display for Seconds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.units < 0 { "-" } else { "" };
        let magnitude = self.units.unsigned_abs();
        if self.scale == 0 {
            return write!(f, "{}{}", sign, magnitude);
        }
        let divisor = 10u128.pow(self.scale);
        write!(
            f,
            "{}{}.{:0width$}",
            sign,
            magnitude / divisor,
            magnitude % divisor,
            width = self.scale as usize
        )
    }
}

/// Counts at one level of the report hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Stats {
    pub total: u64,
    pub passed: u64,
    pub failed: u64,
    pub skipped: u64,
    pub pass_percentage: Option<PassPercentage>,
}

impl Stats {
    pub fn new(total: u64, passed: u64, failed: u64, skipped: u64) -> Self {
        Self {
            total,
            passed,
            failed,
            skipped,
            pass_percentage: PassPercentage::of(passed, total),
        }
    }

    /// Exhaustive tally: every step counts toward `total`, and each
    /// recognized status increments its own counter.
    ///
    /// An unrecognized status (`None`) is counted in `total` only.
    pub fn tally<I>(statuses: I) -> Self
    where
        I: IntoIterator<Item = Option<Status>>,
    {
        let (mut total, mut passed, mut failed, mut skipped) = (0, 0, 0, 0);
        for status in statuses {
            total += 1;
            match status {
                Some(Status::Passed) => passed += 1,
                Some(Status::Failed) => failed += 1,
                Some(Status::Skipped) => skipped += 1,
                None => {}
            }
        }
        Self::new(total, passed, failed, skipped)
    }

    /// One vote per child: each child contributes its classification.
    pub fn vote<'a, I>(children: I) -> Self
    where
        I: IntoIterator<Item = &'a Stats>,
    {
        Self::tally(children.into_iter().map(|child| Some(child.classify())))
    }

    /// Any failure fails the entity; otherwise any pass passes it;
    /// otherwise it counts as skipped.
    pub fn classify(&self) -> Status {
        if self.failed > 0 {
            Status::Failed
        } else if self.passed > 0 {
            Status::Passed
        } else {
            Status::Skipped
        }
    }
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "total={} passed={} failed={} skipped={}",
            self.total, self.passed, self.failed, self.skipped
        )?;
        match self.pass_percentage {
            Some(pct) => write!(f, " passPercentage={}", pct),
            None => Ok(()),
        }
    }
}
