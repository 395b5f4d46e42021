//! Score one customer from the command line using the same model lookup as
//! the server. Handy to check an artifact before deploying it.

use anyhow::Context;
use churn_core::{
    config::Config,
    pipeline::AppCore,
    schema::{CustomerForm, ScoreResponse},
};
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// JSON 配置文件（可选）
    #[arg(long)]
    config: Option<PathBuf>,

    /// Model artifact candidates, tried in order (repeatable). Overrides config.
    #[arg(long = "model", value_name = "PATH")]
    models: Vec<PathBuf>,

    /// Print the full JSON response instead of a summary.
    #[arg(long, default_value_t = false)]
    json: bool,

    #[arg(long, allow_hyphen_values = true)]
    total_logins: Option<String>,
    #[arg(long, allow_hyphen_values = true)]
    tickets_raised: Option<String>,
    #[arg(long, allow_hyphen_values = true)]
    customer_tenure: Option<String>,
    #[arg(long, allow_hyphen_values = true)]
    sentiment_score: Option<String>,
    #[arg(long, allow_hyphen_values = true)]
    onboarding_year: Option<String>,
    #[arg(long, allow_hyphen_values = true)]
    loans_accessed: Option<String>,
    #[arg(long, allow_hyphen_values = true)]
    loans_taken: Option<String>,
    #[arg(long, allow_hyphen_values = true)]
    monthly_avg_balance: Option<String>,
}

impl Args {
    fn form(&self) -> CustomerForm {
        CustomerForm {
            total_logins: self.total_logins.clone(),
            tickets_raised: self.tickets_raised.clone(),
            customer_tenure: self.customer_tenure.clone(),
            sentiment_score: self.sentiment_score.clone(),
            onboarding_year: self.onboarding_year.clone(),
            loans_accessed: self.loans_accessed.clone(),
            loans_taken: self.loans_taken.clone(),
            monthly_avg_balance: self.monthly_avg_balance.clone(),
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive("warn".parse()?))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    let mut cfg = match &args.config {
        Some(p) => Config::from_file(p)?,
        None => Config::default(),
    };
    if !args.models.is_empty() {
        cfg.model_paths = args.models.clone();
    }

    let core = AppCore::load(cfg);
    let scored = core.score(&args.form()).context("score")?;

    if args.json {
        let resp = ScoreResponse::from_scored(Uuid::new_v4(), scored);
        println!("{}", serde_json::to_string_pretty(&resp)?);
    } else {
        let r = scored.result;
        println!("prediction  = {}", r.prediction_label());
        println!("probability = {:.2}%", r.churn_probability);
        println!("risk        = {} ({})", r.risk_level.label(), r.risk_color.as_str());
    }
    Ok(())
}
