//! Special-value table of the store.
//!
//! Values are persisted as sentinels; acronym `k` is stored as `k * SV_ACRONYM_BASE`.

/// Undefined
pub const SV_UNDEF: f64 = 1.0e300;
/// Not available
pub const SV_NA: f64 = 2.0e300;
/// Positive infinity
pub const SV_PINF: f64 = 3.0e300;
/// Negative infinity
pub const SV_MINF: f64 = 4.0e300;
/// Epsilon (explicit zero)
pub const SV_EPS: f64 = 5.0e300;
/// Base multiplier of acronym references
pub const SV_ACRONYM_BASE: f64 = 1.0e301;

/// Classification of a raw value slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpecialValue {
    Undefined,
    NotAvailable,
    PositiveInfinity,
    NegativeInfinity,
    Epsilon,
    Normal,
}

impl SpecialValue {
    pub fn classify(raw: f64) -> Self {
        if raw.is_nan() {
            SpecialValue::NotAvailable
        } else if raw == f64::INFINITY {
            SpecialValue::PositiveInfinity
        } else if raw == f64::NEG_INFINITY {
            SpecialValue::NegativeInfinity
        } else if raw == SV_UNDEF {
            SpecialValue::Undefined
        } else if raw == SV_NA {
            SpecialValue::NotAvailable
        } else if raw == SV_PINF {
            SpecialValue::PositiveInfinity
        } else if raw == SV_MINF {
            SpecialValue::NegativeInfinity
        } else if raw == SV_EPS {
            SpecialValue::Epsilon
        } else {
            SpecialValue::Normal
        }
    }

    /// Fixed display label; `None` for normal numbers
    pub fn label(self) -> Option<&'static str> {
        match self {
            SpecialValue::Undefined => Some("UNdef"),
            SpecialValue::NotAvailable => Some("NA"),
            SpecialValue::PositiveInfinity => Some("+Inf"),
            SpecialValue::NegativeInfinity => Some("-Inf"),
            SpecialValue::Epsilon => Some("Eps"),
            SpecialValue::Normal => None,
        }
    }
}

/// Stored value of acronym `index` (1-based)
pub fn acronym_value(index: u32) -> f64 {
    index as f64 * SV_ACRONYM_BASE
}

/// Acronym index referenced by `raw`, if any
pub fn acronym_index(raw: f64) -> Option<u32> {
    if !raw.is_finite() || raw < SV_ACRONYM_BASE {
        return None;
    }
    let k = (raw / SV_ACRONYM_BASE).round();
    if k < 1.0 || k > u32::MAX as f64 {
        return None;
    }
    let index = k as u32;
    (acronym_value(index) == raw).then_some(index)
}

/// Map IEEE specials onto the store sentinels before persisting
pub fn normalize(raw: f64) -> f64 {
    if raw.is_nan() {
        SV_NA
    } else if raw == f64::INFINITY {
        SV_PINF
    } else if raw == f64::NEG_INFINITY {
        SV_MINF
    } else {
        raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinels_classify() {
        assert_eq!(SpecialValue::classify(SV_UNDEF), SpecialValue::Undefined);
        assert_eq!(SpecialValue::classify(SV_NA), SpecialValue::NotAvailable);
        assert_eq!(SpecialValue::classify(SV_PINF), SpecialValue::PositiveInfinity);
        assert_eq!(SpecialValue::classify(SV_MINF), SpecialValue::NegativeInfinity);
        assert_eq!(SpecialValue::classify(SV_EPS), SpecialValue::Epsilon);
        assert_eq!(SpecialValue::classify(42.5), SpecialValue::Normal);
        assert_eq!(SpecialValue::classify(f64::NAN), SpecialValue::NotAvailable);
        assert_eq!(SpecialValue::classify(f64::NEG_INFINITY), SpecialValue::NegativeInfinity);
    }

    #[test]
    fn test_acronym_index() {
        assert_eq!(acronym_index(acronym_value(1)), Some(1));
        assert_eq!(acronym_index(acronym_value(7)), Some(7));
        assert_eq!(acronym_index(SV_EPS), None);
        assert_eq!(acronym_index(3.0), None);
        assert_eq!(acronym_index(f64::INFINITY), None);
    }

    #[test]
    fn test_normalize_ieee() {
        assert_eq!(normalize(f64::INFINITY), SV_PINF);
        assert_eq!(normalize(f64::NEG_INFINITY), SV_MINF);
        assert_eq!(normalize(f64::NAN), SV_NA);
        assert_eq!(normalize(1.5), 1.5);
    }
}
