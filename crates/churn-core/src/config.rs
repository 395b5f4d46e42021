use crate::schema::RiskLevel;
use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// 默认模型文件候选路径：按顺序取第一个存在的
pub const DEFAULT_MODEL_PATHS: [&str; 2] = [
    "models/churn_classifier.json",
    "churn_classifier.json",
];

/// 风险分层阈值（作用在 0..=100 的百分比上）
///
/// `< medium_at` 为 Low，`[medium_at, high_at)` 为 Medium，`>= high_at` 为 High。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskPolicy {
    pub medium_at: f64,
    pub high_at: f64,
}

impl Default for RiskPolicy {
    fn default() -> Self {
        Self {
            medium_at: 30.0,
            high_at: 70.0,
        }
    }
}

impl RiskPolicy {
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.medium_at.is_finite() && self.high_at.is_finite(),
            "risk policy thresholds must be finite"
        );
        ensure!(
            self.medium_at <= self.high_at,
            "risk policy medium_at={} must be <= high_at={}",
            self.medium_at,
            self.high_at
        );
        Ok(())
    }

    #[inline]
    pub fn classify(&self, churn_pct: f64) -> RiskLevel {
        if churn_pct >= self.high_at {
            RiskLevel::High
        } else if churn_pct >= self.medium_at {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    /// `policy.json` 可选：不存在就用默认阈值
    pub fn load_optional(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let s = fs::read_to_string(path)
            .with_context(|| format!("read policy.json: {}", path.display()))?;
        let p: RiskPolicy = serde_json::from_str(&s)
            .with_context(|| format!("parse policy.json: {}", path.display()))?;
        p.validate()
            .with_context(|| format!("invalid policy.json: {}", path.display()))?;
        Ok(Some(p))
    }
}

/// Runtime configuration. Every field has a default; a JSON file may
/// override any subset of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP 监听地址
    pub bind: String,

    /// Classifier artifact candidates, tried in order.
    pub model_paths: Vec<PathBuf>,

    pub policy: RiskPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:5000".to_string(),
            model_paths: DEFAULT_MODEL_PATHS.iter().map(PathBuf::from).collect(),
            policy: RiskPolicy::default(),
        }
    }
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self> {
        let s = fs::read_to_string(path)
            .with_context(|| format!("read config: {}", path.display()))?;
        let cfg: Config = serde_json::from_str(&s)
            .with_context(|| format!("parse config: {}", path.display()))?;
        cfg.validate()
            .with_context(|| format!("invalid config: {}", path.display()))?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(!self.model_paths.is_empty(), "model_paths is empty");
        self.policy.validate()
    }
}
