use serde::Serialize;

#[derive(Debug, Clone)]
pub struct Inputs {
    pub current_age: u32,
    pub retirement_age: u32,
    pub life_expectancy: u32,
    pub current_monthly_expenses: f64,
    pub lifestyle_factor: f64,
    pub existing_savings: f64,
    pub assumed_inflation: f64,   // percent, 6 means 6%
    pub post_retirement_roi: f64, // fraction, 0.08 means 8%
    pub specific_goals: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrajectoryPoint {
    pub age: u32,
    pub balance: f64,
    pub expenses: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Projection {
    pub years_to_retirement: u32,
    pub years_in_retirement: u32,
    pub monthly_expense_at_retirement: f64,
    pub required_corpus: f64,
    pub projected_existing_savings: f64,
    pub gap: f64,
    pub chart_data: Vec<TrajectoryPoint>,
}
