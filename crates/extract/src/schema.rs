use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RiskLevel {
    High,
    Medium,
    Low,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::High => "High",
            RiskLevel::Medium => "Medium",
            RiskLevel::Low => "Low",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Models are not consistent about casing
impl<'de> Deserialize<'de> for RiskLevel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        match raw.trim().to_lowercase().as_str() {
            "high" => Ok(RiskLevel::High),
            "medium" => Ok(RiskLevel::Medium),
            "low" => Ok(RiskLevel::Low),
            other => Err(serde::de::Error::custom(format!("unknown risk level: {}", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Risk {
    #[serde(rename = "risk_level", alias = "level")]
    pub level: RiskLevel,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentAnalysis {
    pub simplified_text: String,
    #[serde(default)]
    pub risks: Vec<Risk>,
    #[serde(
        rename = "document_health_score",
        alias = "health_score",
        deserialize_with = "deserialize_health_score"
    )]
    pub health_score: u8,
}

pub const MAX_HEALTH_SCORE: i64 = 100;

// Models emit the score as 85, 85.0 or "85"
#[derive(Deserialize)]
#[serde(untagged)]
enum RawScore {
    Int(i64),
    Float(f64),
    Text(String),
}

fn integral(value: f64) -> Option<i64> {
    (value.is_finite() && value.fract() == 0.0).then_some(value as i64)
}

fn deserialize_health_score<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u8, D::Error> {
    let score = match RawScore::deserialize(deserializer)? {
        RawScore::Int(n) => Some(n),
        RawScore::Float(f) => integral(f),
        RawScore::Text(s) => {
            let s = s.trim();
            s.parse::<i64>().ok().or_else(|| s.parse::<f64>().ok().and_then(integral))
        }
    }
    .ok_or_else(|| serde::de::Error::custom("health score is not a whole number"))?;

    if !(0..=MAX_HEALTH_SCORE).contains(&score) {
        return Err(serde::de::Error::custom(format!(
            "health score {} is outside 0..=100",
            score
        )));
    }
    Ok(score as u8)
}
