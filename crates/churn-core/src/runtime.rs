use crate::config::RiskPolicy;
use crate::model::{Classifier, ModelArtifact};
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// 候选路径里第一个存在的文件
pub fn select_model_file(candidates: &[PathBuf]) -> Option<&Path> {
    candidates
        .iter()
        .map(PathBuf::as_path)
        .find(|p| p.is_file())
}

/// A classifier loaded from disk, plus what was found next to it.
#[derive(Debug, Clone)]
pub struct ModelRuntime {
    pub model_path: PathBuf,
    pub kind: &'static str,
    /// `policy.json` in the artifact's directory, if any.
    pub policy: Option<RiskPolicy>,
    pub classifier: Arc<dyn Classifier>,
}

impl ModelRuntime {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let s = fs::read_to_string(path)
            .with_context(|| format!("read model artifact: {}", path.display()))?;
        let artifact = ModelArtifact::from_json(&s)
            .with_context(|| format!("parse model artifact: {}", path.display()))?;

        let policy_path = path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join("policy.json");
        let policy = RiskPolicy::load_optional(&policy_path)?;

        Ok(Self {
            model_path: path.to_path_buf(),
            kind: artifact.kind(),
            policy,
            classifier: Arc::from(artifact.into_classifier()),
        })
    }
}

/// Outcome of the one-shot startup load.
#[derive(Debug)]
pub enum LoadOutcome {
    Loaded(ModelRuntime),
    /// None of the candidates exist.
    NotFound,
    /// The first existing candidate could not be loaded; later candidates are not tried.
    Failed { path: PathBuf, error: anyhow::Error },
}

impl LoadOutcome {
    pub fn load_first(candidates: &[PathBuf]) -> Self {
        let Some(path) = select_model_file(candidates) else {
            return LoadOutcome::NotFound;
        };
        match ModelRuntime::load_from_file(path) {
            Ok(rt) => LoadOutcome::Loaded(rt),
            Err(error) => LoadOutcome::Failed {
                path: path.to_path_buf(),
                error,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const LR: &str = r#"{"kind": "logistic", "intercept": 0.5, "coefficients": [0,0,0,0,0,0,0,0]}"#;

    fn write(dir: &Path, name: &str, body: &str) -> PathBuf {
        let p = dir.join(name);
        if let Some(parent) = p.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        let mut f = fs::File::create(&p).unwrap();
        f.write_all(body.as_bytes()).unwrap();
        p
    }

    #[test]
    fn picks_first_existing_candidate() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("models/churn_classifier.json");
        let bare = write(dir.path(), "churn_classifier.json", LR);

        let cands = vec![nested.clone(), bare.clone()];
        assert_eq!(select_model_file(&cands), Some(bare.as_path()));

        write(dir.path(), "models/churn_classifier.json", LR);
        assert_eq!(select_model_file(&cands), Some(nested.as_path()));
    }

    #[test]
    fn nothing_on_disk_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let cands = vec![dir.path().join("a.json"), dir.path().join("b.json")];
        assert!(matches!(LoadOutcome::load_first(&cands), LoadOutcome::NotFound));
    }

    #[test]
    fn broken_first_candidate_does_not_fall_through() {
        let dir = tempfile::tempdir().unwrap();
        let bad = write(dir.path(), "models/churn_classifier.json", "{not json");
        let good = write(dir.path(), "churn_classifier.json", LR);

        match LoadOutcome::load_first(&[bad.clone(), good]) {
            LoadOutcome::Failed { path, error } => {
                assert_eq!(path, bad);
                assert!(format!("{error:#}").contains("parse model artifact"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn loads_artifact_and_sibling_policy() {
        let dir = tempfile::tempdir().unwrap();
        let p = write(dir.path(), "churn_classifier.json", LR);
        write(dir.path(), "policy.json", r#"{"medium_at": 25, "high_at": 60}"#);

        let rt = ModelRuntime::load_from_file(&p).unwrap();
        assert_eq!(rt.kind, "logistic");
        assert_eq!(rt.model_path, p);
        assert_eq!(
            rt.policy,
            Some(RiskPolicy {
                medium_at: 25.0,
                high_at: 60.0
            })
        );
        let [_, p1] = rt.classifier.predict_proba(&[0.0; 8]).unwrap();
        assert!(p1 > 0.5);
    }
}
