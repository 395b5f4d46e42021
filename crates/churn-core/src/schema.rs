// crates/churn-core/src/schema.rs
use crate::error::ScoreError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use uuid::Uuid;

/// 模型输入列顺序（与训练时一致，不能改）
pub const FEATURE_NAMES: [&str; 8] = [
    "total_logins",
    "tickets_raised",
    "customer_tenure",
    "sentiment_score",
    "onboarding_year",
    "loans_accessed",
    "loans_taken",
    "monthly_avg_balance",
];

pub const N_FEATURES: usize = FEATURE_NAMES.len();

/// Raw customer fields as submitted (form body, JSON object or plain map).
///
/// Every field is optional here; presence and numeric parsing are checked
/// by [`FeatureVector::from_form`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerForm {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_logins: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tickets_raised: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_tenure: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentiment_score: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub onboarding_year: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loans_accessed: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loans_taken: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monthly_avg_balance: Option<String>,
}

impl CustomerForm {
    pub fn get(&self, name: &str) -> Option<&str> {
        let v = match name {
            "total_logins" => &self.total_logins,
            "tickets_raised" => &self.tickets_raised,
            "customer_tenure" => &self.customer_tenure,
            "sentiment_score" => &self.sentiment_score,
            "onboarding_year" => &self.onboarding_year,
            "loans_accessed" => &self.loans_accessed,
            "loans_taken" => &self.loans_taken,
            "monthly_avg_balance" => &self.monthly_avg_balance,
            _ => return None,
        };
        v.as_deref()
    }

    /// Sets a known field; unknown names are ignored (same as extra form keys).
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        let slot = match name {
            "total_logins" => &mut self.total_logins,
            "tickets_raised" => &mut self.tickets_raised,
            "customer_tenure" => &mut self.customer_tenure,
            "sentiment_score" => &mut self.sentiment_score,
            "onboarding_year" => &mut self.onboarding_year,
            "loans_accessed" => &mut self.loans_accessed,
            "loans_taken" => &mut self.loans_taken,
            "monthly_avg_balance" => &mut self.monthly_avg_balance,
            _ => return,
        };
        *slot = Some(value.into());
    }

    pub fn from_map(map: &HashMap<String, String>) -> Self {
        let mut form = Self::default();
        for (k, v) in map {
            form.set(k, v.as_str());
        }
        form
    }

    /// JSON 宽表字段：数字/字符串都接受；null 视为缺失；其它类型原样转文本，交给数值解析报错
    pub fn from_json(obj: &Map<String, Value>) -> Self {
        let mut form = Self::default();
        for name in FEATURE_NAMES {
            match obj.get(name) {
                None | Some(Value::Null) => {}
                Some(Value::String(s)) => form.set(name, s.as_str()),
                Some(v) => form.set(name, v.to_string()),
            }
        }
        form
    }
}

/// Parsed model input, one row, fixed column order ([`FEATURE_NAMES`]).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub total_logins: f64,
    pub tickets_raised: f64,
    pub customer_tenure: f64,
    pub sentiment_score: f64,
    pub onboarding_year: i64,
    pub loans_accessed: f64,
    pub loans_taken: f64,
    pub monthly_avg_balance: f64,
}

impl FeatureVector {
    /// No range checks: negative tenure or a future onboarding year pass through.
    pub fn from_form(form: &CustomerForm) -> Result<Self, ScoreError> {
        Ok(Self {
            total_logins: float_field(form, "total_logins")?,
            tickets_raised: float_field(form, "tickets_raised")?,
            customer_tenure: float_field(form, "customer_tenure")?,
            sentiment_score: float_field(form, "sentiment_score")?,
            onboarding_year: int_field(form, "onboarding_year")?,
            loans_accessed: float_field(form, "loans_accessed")?,
            loans_taken: float_field(form, "loans_taken")?,
            monthly_avg_balance: float_field(form, "monthly_avg_balance")?,
        })
    }

    pub fn to_row(&self) -> [f64; N_FEATURES] {
        [
            self.total_logins,
            self.tickets_raised,
            self.customer_tenure,
            self.sentiment_score,
            self.onboarding_year as f64,
            self.loans_accessed,
            self.loans_taken,
            self.monthly_avg_balance,
        ]
    }
}

fn raw_field<'a>(form: &'a CustomerForm, name: &'static str) -> Result<&'a str, ScoreError> {
    form.get(name).ok_or(ScoreError::MissingField(name))
}

fn float_field(form: &CustomerForm, name: &'static str) -> Result<f64, ScoreError> {
    let raw = raw_field(form, name)?;
    raw.trim()
        .parse::<f64>()
        .map_err(|e| ScoreError::InvalidNumber {
            field: name,
            value: raw.to_string(),
            reason: e.to_string(),
        })
}

fn int_field(form: &CustomerForm, name: &'static str) -> Result<i64, ScoreError> {
    let raw = raw_field(form, name)?;
    raw.trim()
        .parse::<i64>()
        .map_err(|e| ScoreError::InvalidNumber {
            field: name,
            value: raw.to_string(),
            reason: e.to_string(),
        })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn label(self) -> &'static str {
        match self {
            RiskLevel::Low => "Low Risk",
            RiskLevel::Medium => "Medium Risk",
            RiskLevel::High => "High Risk",
        }
    }

    pub fn color(self) -> RiskColor {
        match self {
            RiskLevel::Low => RiskColor::Green,
            RiskLevel::Medium => RiskColor::Orange,
            RiskLevel::High => RiskColor::Red,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskColor {
    Green,
    Orange,
    Red,
}

impl RiskColor {
    pub fn as_str(self) -> &'static str {
        match self {
            RiskColor::Green => "green",
            RiskColor::Orange => "orange",
            RiskColor::Red => "red",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringResult {
    pub will_churn: bool,
    /// 百分比，两位小数，[0, 100]
    pub churn_probability: f64,
    pub risk_level: RiskLevel,
    pub risk_color: RiskColor,
}

impl ScoringResult {
    pub fn prediction_label(&self) -> &'static str {
        if self.will_churn {
            "Will Churn"
        } else {
            "Will Not Churn"
        }
    }
}

/// A scored request: the result plus what was submitted, for display.
#[derive(Debug, Clone, PartialEq)]
pub struct Scored {
    pub result: ScoringResult,
    pub features: FeatureVector,
    pub input: CustomerForm,
    pub timings_us: TimingsUs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TimingsUs {
    pub feature: u64,
    pub model: u64,
}

/// `POST /api/score` 成功响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreResponse {
    pub trace_id: Uuid,
    pub prediction: String,
    pub probability: f64,
    pub risk_level: String,
    pub risk_color: String,
    pub will_churn: bool,
    pub input: CustomerForm,
    pub timings_us: TimingsUs,
}

impl ScoreResponse {
    pub fn from_scored(trace_id: Uuid, scored: Scored) -> Self {
        let r = scored.result;
        Self {
            trace_id,
            prediction: r.prediction_label().to_string(),
            probability: r.churn_probability,
            risk_level: r.risk_level.label().to_string(),
            risk_color: r.risk_color.as_str().to_string(),
            will_churn: r.will_churn,
            input: scored.input,
            timings_us: scored.timings_us,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: String,
}

impl From<&ScoreError> for ErrorResponse {
    fn from(e: &ScoreError) -> Self {
        Self {
            error: e.to_string(),
            kind: e.kind().to_string(),
        }
    }
}
