use crate::{
    config::{Config, RiskPolicy},
    error::ScoreError,
    model::Classifier,
    runtime::{LoadOutcome, ModelRuntime},
    schema::{CustomerForm, FeatureVector, ScoringResult, Scored, TimingsUs},
    util::{now_us, round2},
};

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

/// Application-scoped scorer. Built once before serving, then shared read-only.
///
/// `classifier == None` is the degraded state: every request answers
/// [`ScoreError::ModelUnavailable`] until the process is restarted.
#[derive(Clone, Debug)]
pub struct AppCore {
    pub cfg: Config,
    policy: RiskPolicy,
    classifier: Option<Arc<dyn Classifier>>,
    model_path: Option<PathBuf>,
}

impl AppCore {
    /// No model: degraded from the start.
    pub fn new(cfg: Config) -> Self {
        let policy = cfg.policy;
        Self {
            cfg,
            policy,
            classifier: None,
            model_path: None,
        }
    }

    pub fn with_classifier(cfg: Config, classifier: Arc<dyn Classifier>) -> Self {
        let policy = cfg.policy;
        Self {
            cfg,
            policy,
            classifier: Some(classifier),
            model_path: None,
        }
    }

    pub fn with_runtime(cfg: Config, rt: ModelRuntime) -> Self {
        // 模型目录里的 policy.json 优先于配置
        let policy = rt.policy.unwrap_or(cfg.policy);
        Self {
            cfg,
            policy,
            classifier: Some(rt.classifier),
            model_path: Some(rt.model_path),
        }
    }

    /// One-shot startup load from `cfg.model_paths`. Never fails: a missing or
    /// broken artifact leaves the core degraded and is reported on the log.
    pub fn load(cfg: Config) -> Self {
        match LoadOutcome::load_first(&cfg.model_paths) {
            LoadOutcome::Loaded(rt) => {
                tracing::info!(
                    path = %rt.model_path.display(),
                    kind = rt.kind,
                    policy_override = rt.policy.is_some(),
                    "model loaded"
                );
                Self::with_runtime(cfg, rt)
            }
            LoadOutcome::NotFound => {
                tracing::error!("could not find the model file, tried these locations:");
                for p in &cfg.model_paths {
                    tracing::error!("  - {}", p.display());
                }
                Self::new(cfg)
            }
            LoadOutcome::Failed { path, error } => {
                tracing::error!(path = %path.display(), err = %format!("{error:#}"), "error loading model");
                Self::new(cfg)
            }
        }
    }

    #[inline]
    pub fn is_ready(&self) -> bool {
        self.classifier.is_some()
    }

    pub fn model_path(&self) -> Option<&Path> {
        self.model_path.as_deref()
    }

    pub fn policy(&self) -> &RiskPolicy {
        &self.policy
    }

    /// Same as [`AppCore::score`] for an untyped `name -> value` map.
    pub fn score_fields(&self, raw: &HashMap<String, String>) -> Result<Scored, ScoreError> {
        self.score(&CustomerForm::from_map(raw))
    }

    pub fn score(&self, form: &CustomerForm) -> Result<Scored, ScoreError> {
        let t0 = Instant::now();
        let out = self.score_inner(form);
        metrics::histogram!("e2e_us").record(now_us(t0) as f64);

        match &out {
            Ok(s) => {
                metrics::counter!("score_total").increment(1);
                metrics::counter!("score_tier_total", "tier" => s.result.risk_level.label())
                    .increment(1);
            }
            Err(e) => {
                metrics::counter!("score_error_total", "kind" => e.kind()).increment(1);
                tracing::debug!(kind = e.kind(), err = %e, "score failed");
            }
        }
        out
    }

    fn score_inner(&self, form: &CustomerForm) -> Result<Scored, ScoreError> {
        // 模型没加载：直接拒绝，不解析也不预测
        let clf = self
            .classifier
            .as_ref()
            .ok_or(ScoreError::ModelUnavailable)?;

        let mut timings = TimingsUs::default();

        let t_feat = Instant::now();
        let features = FeatureVector::from_form(form)?;
        let row = features.to_row();
        timings.feature = now_us(t_feat);
        metrics::histogram!("stage_feature_us").record(timings.feature as f64);

        let t_model = Instant::now();
        let label = clf.predict(&row).map_err(ScoreError::prediction)?;
        let [_, p_churn] = clf.predict_proba(&row).map_err(ScoreError::prediction)?;
        timings.model = now_us(t_model);
        metrics::histogram!("stage_model_us").record(timings.model as f64);

        if !(0.0..=1.0).contains(&p_churn) {
            return Err(ScoreError::PredictionFailure(format!(
                "positive-class probability {p_churn} outside [0, 1]"
            )));
        }

        // 先取两位小数，再按同一个值分层：展示值和档位不会矛盾
        let churn_probability = round2(p_churn * 100.0);
        let risk_level = self.policy.classify(churn_probability);

        Ok(Scored {
            result: ScoringResult {
                will_churn: label == 1,
                churn_probability,
                risk_level,
                risk_color: risk_level.color(),
            },
            features,
            input: form.clone(),
            timings_us: timings,
        })
    }
}
