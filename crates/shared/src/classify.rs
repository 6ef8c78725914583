/// Visual category of a train, derived from its display code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrainCategory {
    HighSpeed,
    Regional,
    Intercity,
    Other,
}

impl std::fmt::Display for TrainCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrainCategory::HighSpeed => write!(f, "high-speed"),
            TrainCategory::Regional => write!(f, "regional"),
            TrainCategory::Intercity => write!(f, "intercity"),
            TrainCategory::Other => write!(f, "other"),
        }
    }
}

/// Prefix rules, tested in order against the start of the display code.
const PREFIX_RULES: &[(&str, TrainCategory)] = &[
    ("TGV", TrainCategory::HighSpeed),
    ("TER", TrainCategory::Regional),
    ("IC", TrainCategory::Intercity),
];

impl TrainCategory {
    /// Marker fill color.
    pub fn color(self) -> &'static str {
        match self {
            TrainCategory::HighSpeed => "#e74c3c",
            TrainCategory::Regional => "#3498db",
            TrainCategory::Intercity => "#f39c12",
            TrainCategory::Other => "#95a5a6",
        }
    }
}

/// Classify a display code (e.g. "TGV8512") by case-sensitive prefix; first rule wins.
pub fn classify(train_number: &str) -> TrainCategory {
    PREFIX_RULES
        .iter()
        .find(|(prefix, _)| train_number.starts_with(prefix))
        .map(|&(_, category)| category)
        .unwrap_or(TrainCategory::Other)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_known_prefixes() {
        assert_eq!(classify("TGV8512"), TrainCategory::HighSpeed);
        assert_eq!(classify("TER200"), TrainCategory::Regional);
        assert_eq!(classify("IC37"), TrainCategory::Intercity);
    }

    #[test]
    fn test_classify_default() {
        assert_eq!(classify("RE4501"), TrainCategory::Other);
        assert_eq!(classify(""), TrainCategory::Other);
    }

    #[test]
    fn test_classify_is_case_sensitive() {
        assert_eq!(classify("tgv8512"), TrainCategory::Other);
        assert_eq!(classify("Ic37"), TrainCategory::Other);
    }

    #[test]
    fn test_classify_prefix_only() {
        // The code must start with the prefix, not merely contain it.
        assert_eq!(classify("XTGV1"), TrainCategory::Other);
        assert_eq!(classify("ICE512"), TrainCategory::Intercity);
    }

    #[test]
    fn test_colors() {
        assert_eq!(TrainCategory::HighSpeed.color(), "#e74c3c");
        assert_eq!(TrainCategory::Regional.color(), "#3498db");
        assert_eq!(TrainCategory::Intercity.color(), "#f39c12");
        assert_eq!(TrainCategory::Other.color(), "#95a5a6");
    }
}
