//! Test Prediction Client
//!
//! Generates random customer records and posts them to a running churn
//! prediction service, optionally interleaving reloads.

use rand::Rng;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{info, warn};

/// Random customer generator for testing
struct CustomerGenerator {
    rng: rand::rngs::ThreadRng,
}

impl CustomerGenerator {
    fn new() -> Self {
        Self {
            rng: rand::thread_rng(),
        }
    }

    /// Generate a well-formed customer record
    fn generate(&mut self) -> Value {
        let tenure: i64 = self.rng.gen_range(0..=72);
        let monthly: f64 = (self.rng.gen_range(18.0..120.0_f64) * 100.0).round() / 100.0;
        let internet = self.choice(&["DSL", "Fiber optic", "No"]);
        let addon = |rng: &mut rand::rngs::ThreadRng| {
            if internet == "No" {
                "No internet service"
            } else if rng.gen_bool(0.5) {
                "Yes"
            } else {
                "No"
            }
        };

        let phone = self.choice(&["Yes", "No"]);
        let multiple_lines = if phone == "No" {
            "No phone service"
        } else {
            self.choice(&["Yes", "No"])
        };

        json!({
            "SeniorCitizen": if self.rng.gen_bool(0.5) { json!(self.choice(&["Yes", "No"])) } else { json!(self.rng.gen_range(0..=1)) },
            "MonthlyCharges": monthly,
            "TotalCharges": (monthly * tenure as f64 * 100.0).round() / 100.0,
            "gender": self.choice(&["Male", "Female"]),
            "Partner": self.choice(&["Yes", "No"]),
            "Dependents": self.choice(&["Yes", "No"]),
            "PhoneService": phone,
            "MultipleLines": multiple_lines,
            "InternetService": internet,
            "OnlineSecurity": addon(&mut self.rng),
            "OnlineBackup": addon(&mut self.rng),
            "DeviceProtection": addon(&mut self.rng),
            "TechSupport": addon(&mut self.rng),
            "StreamingTV": addon(&mut self.rng),
            "StreamingMovies": addon(&mut self.rng),
            "Contract": self.choice(&["Month-to-month", "One year", "Two year"]),
            "PaperlessBilling": self.choice(&["Yes", "No"]),
            "PaymentMethod": self.choice(&[
                "Electronic check",
                "Mailed check",
                "Bank transfer (automatic)",
                "Credit card (automatic)",
            ]),
            "tenure": tenure,
        })
    }

    /// Generate a record with lenient or fatal defects
    fn generate_malformed(&mut self) -> Value {
        let mut record = self.generate();
        match self.rng.gen_range(0..3) {
            0 => record["TotalCharges"] = json!(" "),
            1 => {
                if let Some(fields) = record.as_object_mut() {
                    fields.remove("Contract");
                }
            }
            _ => record["tenure"] = json!("unknown"),
        }
        record
    }

    fn choice(&mut self, choices: &[&'static str]) -> &'static str {
        choices[self.rng.gen_range(0..choices.len())]
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("test_client=info".parse()?),
        )
        .init();

    info!("Starting Test Prediction Client");

    let args: Vec<String> = std::env::args().collect();
    let base_url = args
        .get(1)
        .map(|s| s.trim_end_matches('/').to_string())
        .unwrap_or_else(|| "http://localhost:7860".to_string());
    let count: u64 = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(100);
    let malformed_rate: f64 = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(0.1);
    let reload_every: u64 = args.get(4).and_then(|s| s.parse().ok()).unwrap_or(0);
    let delay_ms: u64 = args.get(5).and_then(|s| s.parse().ok()).unwrap_or(50);

    info!(
        base_url = %base_url,
        count = count,
        malformed_rate = malformed_rate,
        reload_every = reload_every,
        delay_ms = delay_ms,
        "Configuration loaded"
    );

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()?;

    match client.get(format!("{base_url}/health")).send().await {
        Ok(response) => {
            let health: Value = response.json().await?;
            info!(health = %health, "Service reachable");
        }
        Err(e) => {
            warn!(error = %e, "Service unreachable. Running in dry-run mode.");
            return run_dry_mode(count, malformed_rate, delay_ms).await;
        }
    }

    let mut generator = CustomerGenerator::new();
    let mut rng = rand::thread_rng();
    let (mut ok, mut rejected, mut churn) = (0u64, 0u64, 0u64);

    for i in 0..count {
        if reload_every > 0 && i > 0 && i % reload_every == 0 {
            let status = client.post(format!("{base_url}/reload")).send().await?.status();
            info!(status = %status, "Reload requested");
        }

        let record = if rng.gen_bool(malformed_rate) {
            generator.generate_malformed()
        } else {
            generator.generate()
        };

        let response = client
            .post(format!("{base_url}/predict"))
            .json(&record)
            .send()
            .await?;
        let status = response.status();
        let body: Value = response.json().await.unwrap_or(Value::Null);

        if status.is_success() {
            ok += 1;
            if body["prediction"]
                .as_str()
                .is_some_and(|p| p.contains("churn"))
            {
                churn += 1;
            }
        } else {
            rejected += 1;
            warn!(status = %status, detail = %body["detail"], "Prediction rejected");
        }

        if (i + 1) % 10 == 0 {
            info!(
                "Sent {}/{} records ({} ok, {} rejected, {} churn)",
                i + 1,
                count,
                ok,
                rejected,
                churn
            );
        }

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    info!(
        "Completed! Sent {} records ({} ok, {} rejected, {} predicted to churn)",
        count, ok, rejected, churn
    );

    Ok(())
}

async fn run_dry_mode(count: u64, malformed_rate: f64, delay_ms: u64) -> anyhow::Result<()> {
    info!("Running in dry-run mode (no service connection)");

    let mut generator = CustomerGenerator::new();
    let mut rng = rand::thread_rng();

    for i in 0..count {
        let record = if rng.gen_bool(malformed_rate) {
            generator.generate_malformed()
        } else {
            generator.generate()
        };

        if (i + 1) % 10 == 0 || i == 0 {
            info!("Sample record {}:\n{}", i + 1, serde_json::to_string_pretty(&record)?);
        }

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    Ok(())
}
