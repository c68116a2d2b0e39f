use serde::Serialize;

/// Upload/download ratio.
///
/// Division is undefined when nothing was transferred and unbounded when
/// something was uploaded without downloading anything, so both cases get
/// their own variant instead of a magic float.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Ratio {
    /// Nothing was uploaded or downloaded.
    #[default]
    None,
    /// Uploaded something, downloaded nothing.
    Infinite,
    Value(f64),
}

impl Ratio {
    /// Sentinel used on the wire for [`Ratio::None`].
    pub const NONE_SENTINEL: f64 = -1.;
    /// Sentinel used on the wire for [`Ratio::Infinite`].
    pub const INFINITE_SENTINEL: f64 = -2.;

    pub fn new(uploaded: u64, downloaded: u64) -> Self {
        match (uploaded, downloaded) {
            (0, 0) => Ratio::None,
            (_, 0) => Ratio::Infinite,
            (up, down) => Ratio::Value(up as f64 / down as f64),
        }
    }

    pub fn is_infinite(&self) -> bool {
        matches!(self, Ratio::Infinite)
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            Ratio::Value(v) => Some(*v),
            _ => None,
        }
    }

    /// The ratio as a single number, with negative sentinels for the
    /// non-numeric cases.
    pub fn as_f64(&self) -> f64 {
        match self {
            Ratio::None => Self::NONE_SENTINEL,
            Ratio::Infinite => Self::INFINITE_SENTINEL,
            Ratio::Value(v) => *v,
        }
    }
}

impl std::fmt::Display for Ratio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Ratio::None => f.write_str("None"),
            Ratio::Infinite => f.write_str("Inf"),
            Ratio::Value(v) if *v < 10. => write!(f, "{v:.2}"),
            Ratio::Value(v) if *v < 100. => write!(f, "{v:.1}"),
            Ratio::Value(v) => write!(f, "{v:.0}"),
        }
    }
}

impl Serialize for Ratio {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_f64(self.as_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::Ratio;

    #[test]
    fn test_sentinels() {
        assert_eq!(Ratio::new(0, 0), Ratio::None);
        assert_eq!(Ratio::new(5, 0), Ratio::Infinite);
        assert_eq!(Ratio::new(3, 6), Ratio::Value(0.5));
        assert_eq!(Ratio::new(0, 6), Ratio::Value(0.));
    }

    #[test]
    fn test_infinite_is_not_a_large_number() {
        let r = Ratio::new(u64::MAX, 0);
        assert!(r.is_infinite());
        assert_eq!(r.value(), None);
        assert_eq!(r.as_f64(), Ratio::INFINITE_SENTINEL);
        assert_ne!(r, Ratio::None);
    }

    #[test]
    fn test_display() {
        assert_eq!(Ratio::None.to_string(), "None");
        assert_eq!(Ratio::Infinite.to_string(), "Inf");
        assert_eq!(Ratio::new(3, 6).to_string(), "0.50");
        assert_eq!(Ratio::new(125, 10).to_string(), "12.5");
        assert_eq!(Ratio::new(1000, 3).to_string(), "333");
    }

    #[test]
    fn test_serialize_uses_sentinels() {
        assert_eq!(serde_json::to_string(&Ratio::None).unwrap(), "-1.0");
        assert_eq!(serde_json::to_string(&Ratio::Infinite).unwrap(), "-2.0");
        assert_eq!(serde_json::to_string(&Ratio::new(1, 4)).unwrap(), "0.25");
    }
}
