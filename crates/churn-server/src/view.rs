use askama::Template;
use churn_core::error::ScoreError;
use churn_core::schema::{CustomerForm, Scored, FEATURE_NAMES};

pub struct FieldView<'a> {
    pub name: &'static str,
    pub label: &'static str,
    pub step: &'static str,
    pub value: &'a str,
}

pub struct PredictionView {
    pub prediction: &'static str,
    /// 两位小数文本
    pub probability: String,
    pub risk_level: &'static str,
    pub risk_color: &'static str,
}

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexPage<'a> {
    pub fields: Vec<FieldView<'a>>,
    pub prediction: Option<PredictionView>,
    pub error: Option<String>,
}

fn field_label(name: &str) -> &'static str {
    match name {
        "total_logins" => "Total Logins",
        "tickets_raised" => "Tickets Raised",
        "customer_tenure" => "Customer Tenure (months)",
        "sentiment_score" => "Sentiment Score",
        "onboarding_year" => "Onboarding Year",
        "loans_accessed" => "Loans Accessed",
        "loans_taken" => "Loans Taken",
        "monthly_avg_balance" => "Monthly Avg Balance",
        _ => "",
    }
}

fn fields(form: Option<&CustomerForm>) -> Vec<FieldView<'_>> {
    FEATURE_NAMES
        .iter()
        .map(|&name| FieldView {
            name,
            label: field_label(name),
            step: if name == "onboarding_year" { "1" } else { "any" },
            value: form.and_then(|f| f.get(name)).unwrap_or(""),
        })
        .collect()
}

impl<'a> IndexPage<'a> {
    pub fn empty() -> Self {
        Self {
            fields: fields(None),
            prediction: None,
            error: None,
        }
    }

    pub fn scored(scored: &'a Scored) -> Self {
        let r = &scored.result;
        Self {
            fields: fields(Some(&scored.input)),
            prediction: Some(PredictionView {
                prediction: r.prediction_label(),
                probability: format!("{:.2}", r.churn_probability),
                risk_level: r.risk_level.label(),
                risk_color: r.risk_color.as_str(),
            }),
            error: None,
        }
    }

    /// 出错时仍回显用户输入，方便改了再提交
    pub fn failed(err: &ScoreError, form: &'a CustomerForm) -> Self {
        Self {
            fields: fields(Some(form)),
            prediction: None,
            error: Some(err.to_string()),
        }
    }
}
