use serde::{Deserialize, Serialize};

/// Selects which price (or volume) of a quote feeds a chained series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CandlePart {
    /// Open price.
    Open,
    /// High price.
    High,
    /// Low price.
    Low,
    /// Close price.
    #[default]
    Close,
    /// Volume.
    Volume,
    /// (H+L)/2
    Hl2,
    /// (H+L+C)/3
    Hlc3,
    /// (O+C)/2
    Oc2,
    /// (O+H+L)/3
    Ohl3,
    /// (O+H+L+C)/4
    Ohlc4,
}

impl CandlePart {
    /// All candle parts, in declaration order.
    pub const ALL: [CandlePart; 10] = [
        CandlePart::Open,
        CandlePart::High,
        CandlePart::Low,
        CandlePart::Close,
        CandlePart::Volume,
        CandlePart::Hl2,
        CandlePart::Hlc3,
        CandlePart::Oc2,
        CandlePart::Ohl3,
        CandlePart::Ohlc4,
    ];

    /// Returns lowercase string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            CandlePart::Open => "open",
            CandlePart::High => "high",
            CandlePart::Low => "low",
            CandlePart::Close => "close",
            CandlePart::Volume => "volume",
            CandlePart::Hl2 => "hl2",
            CandlePart::Hlc3 => "hlc3",
            CandlePart::Oc2 => "oc2",
            CandlePart::Ohl3 => "ohl3",
            CandlePart::Ohlc4 => "ohlc4",
        }
    }
}

impl std::fmt::Display for CandlePart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error parsing candle part.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseCandlePartError;

impl std::fmt::Display for ParseCandlePartError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Invalid candle part")
    }
}

impl std::error::Error for ParseCandlePartError {}

impl std::str::FromStr for CandlePart {
    type Err = ParseCandlePartError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_lowercase();
        CandlePart::ALL
            .into_iter()
            .find(|part| part.as_str() == needle)
            .ok_or(ParseCandlePartError)
    }
}
