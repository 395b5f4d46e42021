use crate::schema::{FEATURE_NAMES, N_FEATURES};
use crate::util::sigmoid;
use anyhow::{anyhow, ensure, Result};
use serde::{Deserialize, Serialize};

/// 二分类器：对单行特征给出标签和两类概率
///
/// Implementations must be pure: the same row yields the same output.
pub trait Classifier: Send + Sync + std::fmt::Debug {
    /// Predicted class, `1` = churn.
    fn predict(&self, row: &[f64]) -> Result<u8>;

    /// `[p_no_churn, p_churn]`.
    fn predict_proba(&self, row: &[f64]) -> Result<[f64; 2]>;
}

fn check_row(row: &[f64]) -> Result<()> {
    ensure!(
        row.len() == N_FEATURES,
        "row has {} columns, model expects {}",
        row.len(),
        N_FEATURES
    );
    Ok(())
}

fn default_threshold() -> f64 {
    0.5
}

fn default_scale() -> f64 {
    1.0
}

/// Logistic regression: `p = sigmoid(intercept + Σ coef·x)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticModel {
    pub intercept: f64,
    pub coefficients: Vec<f64>,
    #[serde(default = "default_threshold")]
    pub threshold: f64,
}

impl LogisticModel {
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.coefficients.len() == N_FEATURES,
            "logistic model has {} coefficients, expected {}",
            self.coefficients.len(),
            N_FEATURES
        );
        ensure!(
            (0.0..=1.0).contains(&self.threshold),
            "logistic threshold {} outside [0, 1]",
            self.threshold
        );
        Ok(())
    }

    fn p_churn(&self, row: &[f64]) -> Result<f64> {
        check_row(row)?;
        let z = self
            .coefficients
            .iter()
            .zip(row)
            .fold(self.intercept, |z, (w, x)| z + w * x);
        Ok(sigmoid(z))
    }
}

impl Classifier for LogisticModel {
    fn predict(&self, row: &[f64]) -> Result<u8> {
        Ok(u8::from(self.p_churn(row)? > self.threshold))
    }

    fn predict_proba(&self, row: &[f64]) -> Result<[f64; 2]> {
        let p = self.p_churn(row)?;
        Ok([1.0 - p, p])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Split {
    pub feature: usize,
    pub border: f64,
}

/// 对称树（oblivious tree）：同一层所有节点共用一个 split
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObliviousTree {
    pub splits: Vec<Split>,
    pub leaf_values: Vec<f64>,
}

impl ObliviousTree {
    /// 叶子下标：bit d = 第 d 层是否走右边（x > border）
    ///
    /// Errors instead of panicking on a hand-built tree that never went
    /// through `validate` (bad feature index, too deep, too few leaves).
    fn leaf_value(&self, row: &[f64]) -> Result<f64> {
        let mut idx = 0usize;
        for (d, s) in self.splits.iter().enumerate() {
            let x = row.get(s.feature).ok_or_else(|| {
                anyhow!("split on feature {} but row has {} columns", s.feature, row.len())
            })?;
            if *x > s.border {
                let bit = u32::try_from(d)
                    .ok()
                    .and_then(|d| 1usize.checked_shl(d))
                    .ok_or_else(|| anyhow!("tree depth {} too large", self.splits.len()))?;
                idx |= bit;
            }
        }
        self.leaf_values.get(idx).copied().ok_or_else(|| {
            anyhow!("leaf {idx} out of range ({} leaves)", self.leaf_values.len())
        })
    }
}

/// Gradient-boosted ensemble of oblivious trees (CatBoost layout).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObliviousTreesModel {
    pub trees: Vec<ObliviousTree>,
    #[serde(default = "default_scale")]
    pub scale: f64,
    #[serde(default)]
    pub bias: f64,
}

impl ObliviousTreesModel {
    pub fn validate(&self) -> Result<()> {
        ensure!(!self.trees.is_empty(), "tree ensemble has no trees");
        for (i, t) in self.trees.iter().enumerate() {
            ensure!(t.splits.len() < 32, "tree {i} is too deep ({})", t.splits.len());
            let want = 1usize << t.splits.len();
            ensure!(
                t.leaf_values.len() == want,
                "tree {i} has {} leaves, expected {want}",
                t.leaf_values.len()
            );
            if let Some(s) = t.splits.iter().find(|s| s.feature >= N_FEATURES) {
                return Err(anyhow!(
                    "tree {i} splits on feature {} but the model has {N_FEATURES} features",
                    s.feature
                ));
            }
        }
        Ok(())
    }

    fn raw(&self, row: &[f64]) -> Result<f64> {
        check_row(row)?;
        let mut sum = 0.0;
        for t in &self.trees {
            sum += t.leaf_value(row)?;
        }
        Ok(self.scale * sum + self.bias)
    }
}

impl Classifier for ObliviousTreesModel {
    fn predict(&self, row: &[f64]) -> Result<u8> {
        Ok(u8::from(self.raw(row)? > 0.0))
    }

    fn predict_proba(&self, row: &[f64]) -> Result<[f64; 2]> {
        let p = sigmoid(self.raw(row)?);
        Ok([1.0 - p, p])
    }
}

/// Model body, tagged by `kind`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelBody {
    Logistic(LogisticModel),
    ObliviousTrees(ObliviousTreesModel),
}

/// On-disk classifier artifact (JSON).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    /// 可选：训练时的列名，存在时必须与 FEATURE_NAMES 完全一致
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_names: Option<Vec<String>>,
    #[serde(flatten)]
    pub model: ModelBody,
}

impl ModelArtifact {
    pub fn from_json(s: &str) -> Result<Self> {
        let a: ModelArtifact = serde_json::from_str(s)?;
        a.validate()?;
        Ok(a)
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(names) = &self.feature_names {
            ensure!(
                names.iter().map(String::as_str).eq(FEATURE_NAMES.iter().copied()),
                "artifact feature_names {:?} do not match expected order {:?}",
                names,
                FEATURE_NAMES
            );
        }
        match &self.model {
            ModelBody::Logistic(m) => m.validate(),
            ModelBody::ObliviousTrees(m) => m.validate(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self.model {
            ModelBody::Logistic(_) => "logistic",
            ModelBody::ObliviousTrees(_) => "oblivious_trees",
        }
    }

    pub fn into_classifier(self) -> Box<dyn Classifier> {
        match self.model {
            ModelBody::Logistic(m) => Box::new(m),
            ModelBody::ObliviousTrees(m) => Box::new(m),
        }
    }
}
