use serde_json::Value;

/// Loan amount from a step payload. Accepts JSON numbers and numeric strings
/// (commas, spaces and a leading `₹` are ignored). Anything else is `NaN`,
/// which underwriting rejects as non-numeric.
pub fn parse_amount(raw: &Value) -> f64 {
    match raw {
        Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        Value::String(s) => {
            let cleaned: String = s
                .trim()
                .trim_start_matches('₹')
                .chars()
                .filter(|c| *c != ',' && !c.is_whitespace())
                .collect();
            cleaned.parse().unwrap_or(f64::NAN)
        }
        _ => f64::NAN,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount(&json!(750000)), 750_000.0);
        assert_eq!(parse_amount(&json!("7,50,000")), 750_000.0);
        assert_eq!(parse_amount(&json!("₹ 500000")), 500_000.0);
        assert!(parse_amount(&json!("five lakh")).is_nan());
        assert!(parse_amount(&Value::Null).is_nan());
    }
}
