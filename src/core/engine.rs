use super::types::{Inputs, Projection, TrajectoryPoint};

// Accumulation-phase growth is a fixed 10%/year regardless of the
// post-retirement ROI the user picked.
// TODO: confirm with product whether accumulation should use the user's ROI.
const ACCUMULATION_GROWTH_RATE: f64 = 0.10;

// Below this magnitude the real rate is treated as zero so the annuity
// factor does not divide by a vanishing denominator.
const REAL_RATE_EPSILON: f64 = 1e-4;

// Extra years charted past the life expectancy for visual context.
const TRAJECTORY_EXTRA_YEARS: u32 = 5;

pub fn project(inputs: &Inputs) -> Projection {
    let inflation = inputs.assumed_inflation / 100.0;
    let roi = inputs.post_retirement_roi;

    let years_to_retirement = inputs.retirement_age.saturating_sub(inputs.current_age);
    let years_in_retirement = inputs.life_expectancy.saturating_sub(inputs.retirement_age);

    let monthly_expense_at_retirement = inputs.current_monthly_expenses
        * inputs.lifestyle_factor
        * (1.0 + inflation).powi(years_to_retirement as i32);
    let annual_expense = monthly_expense_at_retirement * 12.0;

    let real_rate = (1.0 + roi) / (1.0 + inflation) - 1.0;
    let required_corpus =
        growing_annuity_present_value(annual_expense, real_rate, years_in_retirement);

    let projected_existing_savings = inputs.existing_savings
        * (1.0 + ACCUMULATION_GROWTH_RATE).powi(years_to_retirement as i32);

    let gap = (required_corpus - projected_existing_savings).max(0.0);

    let chart_data = drawdown_trajectory(
        required_corpus,
        annual_expense,
        inflation,
        roi,
        inputs.retirement_age,
        inputs.life_expectancy,
        years_in_retirement,
    );

    Projection {
        years_to_retirement,
        years_in_retirement,
        monthly_expense_at_retirement,
        required_corpus,
        projected_existing_savings,
        gap,
        chart_data,
    }
}

fn growing_annuity_present_value(annual_expense: f64, real_rate: f64, years: u32) -> f64 {
    if years == 0 {
        return 0.0;
    }
    if real_rate.abs() < REAL_RATE_EPSILON {
        return annual_expense * years as f64;
    }
    annual_expense * (1.0 - (1.0 + real_rate).powi(-(years as i32))) / real_rate
}

fn drawdown_trajectory(
    starting_corpus: f64,
    annual_expense: f64,
    inflation: f64,
    roi: f64,
    retirement_age: u32,
    life_expectancy: u32,
    years_in_retirement: u32,
) -> Vec<TrajectoryPoint> {
    let last_charted_age = life_expectancy.saturating_add(TRAJECTORY_EXTRA_YEARS);
    let mut points = Vec::with_capacity(years_in_retirement as usize + 6);
    let mut balance = starting_corpus;
    let mut expense = annual_expense;

    for year in 0..=(years_in_retirement + TRAJECTORY_EXTRA_YEARS) {
        let age = retirement_age.saturating_add(year);
        if age > last_charted_age {
            break;
        }
        points.push(TrajectoryPoint {
            age,
            balance: balance.round().max(0.0),
            expenses: expense.round(),
        });
        if age < life_expectancy {
            // End-of-year withdrawal, then next year's expense picks up inflation.
            balance = balance * (1.0 + roi) - expense;
            expense *= 1.0 + inflation;
        } else {
            balance = 0.0;
        }
    }

    points
}
