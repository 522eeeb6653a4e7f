//! Eligibility calculator
//!
//! Pure loan arithmetic: pre-approved limit, tenure and EMI.
//! No state, no I/O, never fails.

/// Salary multiple granted as a pre-approved limit.
pub const LIMIT_SALARY_MULTIPLE: f64 = 15.0;

/// Tenure breakpoints on monthly salary.
pub const LOWER_SALARY_BREAKPOINT: f64 = 40_000.0;
pub const UPPER_SALARY_BREAKPOINT: f64 = 80_000.0;

fn valid_salary(salary: f64) -> Option<f64> {
    (salary.is_finite() && salary >= 0.0).then_some(salary)
}

/// `salary * 15`, or `0` when the salary is negative or not finite.
pub fn pre_approved_limit(salary: f64) -> f64 {
    valid_salary(salary)
        .map(|s| s * LIMIT_SALARY_MULTIPLE)
        .unwrap_or(0.0)
}

/// Repayment tenure in months: 48 below 40k, 60 up to and including 80k, 72 above.
pub fn tenure_months(salary: f64) -> u32 {
    let s = valid_salary(salary).unwrap_or(0.0);

    if s < LOWER_SALARY_BREAKPOINT {
        48
    } else if s <= UPPER_SALARY_BREAKPOINT {
        60
    } else {
        72
    }
}

/// Equated monthly instalment under standard amortization.
///
/// `r = annual_rate_percent / 100 / 12`;
/// `EMI = P·r·(1+r)^n / ((1+r)^n − 1)`, or `P / n` when `r == 0`.
/// Returns `None` when `months <= 0`.
pub fn emi(principal: f64, annual_rate_percent: f64, months: i64) -> Option<f64> {
    if months <= 0 {
        return None;
    }

    let n = months as f64;
    let r = annual_rate_percent / 100.0 / 12.0;
    if r == 0.0 {
        return Some(principal / n);
    }

    let growth = (1.0 + r).powf(n);
    let denominator = growth - 1.0;
    if denominator == 0.0 {
        return Some(principal / n);
    }

    Some(principal * r * growth / denominator)
}
