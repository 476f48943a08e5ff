//! Risk tiers and customer status labels derived from attrition probability

use serde::{Deserialize, Serialize};

pub const HIGH_RISK_THRESHOLD: f64 = 0.7;
pub const MEDIUM_RISK_THRESHOLD: f64 = 0.4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// Both bounds are strict: exactly 0.7 is Medium, exactly 0.4 is Low
    pub fn from_probability(attrition: f64) -> Self {
        if attrition > HIGH_RISK_THRESHOLD {
            RiskLevel::High
        } else if attrition > MEDIUM_RISK_THRESHOLD {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "Low",
            RiskLevel::Medium => "Medium",
            RiskLevel::High => "High",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CustomerStatus {
    #[serde(rename = "Attrited Customer")]
    Attrited,
    #[serde(rename = "Existing Customer")]
    Existing,
}

impl CustomerStatus {
    pub fn from_label(label: u8) -> Self {
        if label == 1 {
            CustomerStatus::Attrited
        } else {
            CustomerStatus::Existing
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CustomerStatus::Attrited => "Attrited Customer",
            CustomerStatus::Existing => "Existing Customer",
        }
    }
}
