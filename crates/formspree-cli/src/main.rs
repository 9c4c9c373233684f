//! Submit a form from the command line.
//!
//! ```text
//! FORMSPREE_FORM_KEY=xyzabc formspree-submit email=a@b.c message="hello"
//! ```
//!
//! Reads `FORMSPREE_PROJECT`, `FORMSPREE_ENDPOINT` and `FORMSPREE_CLIENT_NAME`
//! like the library does. Exits with status 1 when the server reports errors.

use formspree::{create_client, ClientConfig, SubmissionData, SubmissionOptions};
use serde_json::{Map, Value};
use tracing_subscriber::EnvFilter;

fn parse_fields(args: impl Iterator<Item = String>) -> Result<Map<String, Value>, String> {
    let mut fields = Map::new();
    for arg in args {
        let (key, value) = arg
            .split_once('=')
            .ok_or_else(|| format!("expected key=value, got {arg:?}"))?;
        if key.is_empty() {
            return Err(format!("empty field name in {arg:?}"));
        }
        fields.insert(key.to_string(), Value::String(value.to_string()));
    }
    Ok(fields)
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let form_key = match std::env::var("FORMSPREE_FORM_KEY") {
        Ok(key) if !key.trim().is_empty() => key,
        _ => {
            eprintln!("FORMSPREE_FORM_KEY is required");
            std::process::exit(2);
        }
    };

    let fields = match parse_fields(std::env::args().skip(1)) {
        Ok(fields) => fields,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(2);
        }
    };

    let mut config = match ClientConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(2);
        }
    };

    if config.client_name.is_none() {
        config.client_name = Some("formspree-cli".to_string());
    }
    let client = create_client(config);
    tracing::info!(form_key = %form_key, fields = fields.len(), "submitting form");

    let result = client
        .submit_form(
            &form_key,
            &SubmissionData::Json(fields),
            &SubmissionOptions::new(),
        )
        .await;

    match result {
        Ok(response) => {
            let status = response.response.as_ref().map(|m| m.status);
            tracing::info!(?status, "submission finished");
            println!(
                "{}",
                serde_json::to_string_pretty(response.body.raw()).unwrap_or_default()
            );
            if let Some(errors) = response.body.as_errors() {
                for error in &errors.errors {
                    match &error.field {
                        Some(field) => eprintln!("{field}: {}", error.message),
                        None => eprintln!("{}", error.message),
                    }
                }
                std::process::exit(1);
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "submission failed");
            std::process::exit(1);
        }
    }
}
