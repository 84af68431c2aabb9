use axum::{
    Router,
    extract::{Json, Query},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tokio::net::TcpListener;

use crate::advice::{AdviceSource, GeminiClient, advice_or_fallback, build_advice_prompt};
use crate::core::{
    Inputs, Projection, TrajectoryPoint, format_compact, format_currency, project,
};

const MAX_AGE: u32 = 130;

#[derive(Parser, Debug)]
#[command(
    name = "nestegg",
    about = "Retirement corpus planner (growing-annuity corpus requirement + drawdown trajectory)"
)]
struct Cli {
    #[arg(long, default_value_t = 30)]
    current_age: u32,
    #[arg(long, default_value_t = 60)]
    retirement_age: u32,
    #[arg(long, default_value_t = 85, help = "Age the corpus must fund through")]
    life_expectancy: u32,
    #[arg(
        long,
        default_value_t = 50_000.0,
        help = "Current monthly expenses in today's money"
    )]
    current_monthly_expenses: f64,
    #[arg(
        long,
        default_value_t = 1.0,
        help = "Retirement lifestyle multiplier: 1.0 maintain, 1.5 upgrade, 2.0 luxury"
    )]
    lifestyle_factor: f64,
    #[arg(long, default_value_t = 1_000_000.0)]
    existing_savings: f64,
    #[arg(
        long,
        default_value_t = 6.0,
        help = "Expected annual inflation in percent"
    )]
    assumed_inflation: f64,
    #[arg(
        long,
        default_value_t = 8.0,
        help = "Expected annual post-retirement return in percent"
    )]
    post_retirement_roi: f64,
    #[arg(long, default_value = "", help = "Free-text goals for the advice prompt")]
    specific_goals: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ProjectPayload {
    current_age: Option<u32>,
    retirement_age: Option<u32>,
    life_expectancy: Option<u32>,
    current_monthly_expenses: Option<f64>,
    lifestyle_factor: Option<f64>,
    existing_savings: Option<f64>,
    assumed_inflation: Option<f64>,
    post_retirement_roi: Option<f64>,
    specific_goals: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProjectResponse {
    years_to_retirement: u32,
    years_in_retirement: u32,
    monthly_expense_at_retirement: f64,
    required_corpus: f64,
    projected_existing_savings: f64,
    gap: f64,
    surplus: f64,
    chart_data: Vec<TrajectoryPoint>,
    display: DisplayCards,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DisplayCards {
    monthly_expense_at_retirement: String,
    required_corpus: String,
    projected_existing_savings: String,
    gap: String,
    surplus: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AdviceResponse {
    advice: String,
    source: AdviceSource,
}

#[derive(Debug, Serialize)]
struct ServiceInfo {
    name: &'static str,
    version: &'static str,
    endpoints: [&'static str; 2],
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn build_inputs(cli: Cli) -> Result<Inputs, String> {
    for (name, age) in [
        ("--current-age", cli.current_age),
        ("--retirement-age", cli.retirement_age),
        ("--life-expectancy", cli.life_expectancy),
    ] {
        if age > MAX_AGE {
            return Err(format!("{name} must be <= {MAX_AGE}"));
        }
    }

    if !cli.current_monthly_expenses.is_finite() || cli.current_monthly_expenses < 0.0 {
        return Err("--current-monthly-expenses must be >= 0".to_string());
    }

    if !cli.existing_savings.is_finite() || cli.existing_savings < 0.0 {
        return Err("--existing-savings must be >= 0".to_string());
    }

    if !cli.lifestyle_factor.is_finite() || cli.lifestyle_factor <= 0.0 {
        return Err("--lifestyle-factor must be > 0".to_string());
    }

    if !cli.assumed_inflation.is_finite() || cli.assumed_inflation <= -100.0 {
        return Err("--assumed-inflation must be > -100".to_string());
    }

    if !cli.post_retirement_roi.is_finite() || cli.post_retirement_roi <= -100.0 {
        return Err("--post-retirement-roi must be > -100".to_string());
    }

    Ok(Inputs {
        current_age: cli.current_age,
        retirement_age: cli.retirement_age,
        life_expectancy: cli.life_expectancy,
        current_monthly_expenses: cli.current_monthly_expenses,
        lifestyle_factor: cli.lifestyle_factor,
        existing_savings: cli.existing_savings,
        assumed_inflation: cli.assumed_inflation,
        post_retirement_roi: cli.post_retirement_roi / 100.0,
        specific_goals: cli.specific_goals,
    })
}

fn default_cli_for_api() -> Cli {
    Cli {
        current_age: 30,
        retirement_age: 60,
        life_expectancy: 85,
        current_monthly_expenses: 50_000.0,
        lifestyle_factor: 1.0,
        existing_savings: 1_000_000.0,
        assumed_inflation: 6.0,
        post_retirement_roi: 8.0,
        specific_goals: String::new(),
    }
}

fn inputs_from_payload(payload: ProjectPayload) -> Result<Inputs, String> {
    let mut cli = default_cli_for_api();

    if let Some(v) = payload.current_age {
        cli.current_age = v;
    }
    if let Some(v) = payload.retirement_age {
        cli.retirement_age = v;
    }
    if let Some(v) = payload.life_expectancy {
        cli.life_expectancy = v;
    }
    if let Some(v) = payload.current_monthly_expenses {
        cli.current_monthly_expenses = v;
    }
    if let Some(v) = payload.lifestyle_factor {
        cli.lifestyle_factor = v;
    }
    if let Some(v) = payload.existing_savings {
        cli.existing_savings = v;
    }
    if let Some(v) = payload.assumed_inflation {
        cli.assumed_inflation = v;
    }
    if let Some(v) = payload.post_retirement_roi {
        cli.post_retirement_roi = v;
    }
    if let Some(v) = payload.specific_goals {
        cli.specific_goals = v;
    }

    build_inputs(cli)
}

#[cfg(test)]
fn inputs_from_json(json: &str) -> Result<Inputs, String> {
    let payload = serde_json::from_str::<ProjectPayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    inputs_from_payload(payload)
}

fn build_project_response(projection: Projection) -> ProjectResponse {
    let surplus = (projection.projected_existing_savings - projection.required_corpus).max(0.0);
    let display = DisplayCards {
        monthly_expense_at_retirement: format_currency(projection.monthly_expense_at_retirement),
        required_corpus: format_compact(projection.required_corpus),
        projected_existing_savings: format_compact(projection.projected_existing_savings),
        gap: format_compact(projection.gap),
        surplus: format_compact(surplus),
    };

    ProjectResponse {
        years_to_retirement: projection.years_to_retirement,
        years_in_retirement: projection.years_in_retirement,
        monthly_expense_at_retirement: projection.monthly_expense_at_retirement,
        required_corpus: projection.required_corpus,
        projected_existing_savings: projection.projected_existing_savings,
        gap: projection.gap,
        surplus,
        chart_data: projection.chart_data,
        display,
    }
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = Router::new()
        .route("/", get(index_handler))
        .route(
            "/api/project",
            get(project_get_handler).post(project_post_handler),
        )
        .route("/api/advice", post(advice_post_handler))
        .fallback(not_found_handler);

    let listener = TcpListener::bind(addr).await?;
    println!("nestegg HTTP API listening on http://{addr}");
    println!("Local access: http://127.0.0.1:{port}/");

    axum::serve(listener, app).await
}

async fn index_handler() -> Response {
    json_response(
        StatusCode::OK,
        ServiceInfo {
            name: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
            endpoints: ["GET|POST /api/project", "POST /api/advice"],
        },
    )
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn project_get_handler(Query(payload): Query<ProjectPayload>) -> Response {
    project_handler_impl(payload)
}

async fn project_post_handler(Json(payload): Json<ProjectPayload>) -> Response {
    project_handler_impl(payload)
}

fn project_handler_impl(payload: ProjectPayload) -> Response {
    let inputs = match inputs_from_payload(payload) {
        Ok(inputs) => inputs,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };

    json_response(StatusCode::OK, build_project_response(project(&inputs)))
}

async fn advice_post_handler(Json(payload): Json<ProjectPayload>) -> Response {
    let inputs = match inputs_from_payload(payload) {
        Ok(inputs) => inputs,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };

    let projection = project(&inputs);
    let prompt = build_advice_prompt(&inputs, &projection);
    let provider = GeminiClient::from_env();
    let (advice, source) = advice_or_fallback(&provider, &prompt).await;
    json_response(StatusCode::OK, AdviceResponse { advice, source })
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        "no-store".parse().expect("valid header"),
    );
    response
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}
