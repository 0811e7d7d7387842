//! Askama template filters for the calculation export

/// Format a number with a fixed number of decimals, `.` as the decimal
/// separator and a space between thousands: `12345.678, 2` → `12 345.68`.
pub fn format_number(value: f64, decimals: usize) -> String {
    let fixed = format!("{:.*}", decimals, value.abs());
    let (int_part, frac_part) = match fixed.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (fixed.as_str(), None),
    };

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, digit) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(' ');
        }
        grouped.push(digit);
    }
    if let Some(frac) = frac_part {
        grouped.push('.');
        grouped.push_str(frac);
    }

    let is_zero = fixed.chars().all(|c| c == '0' || c == '.');
    if value < 0.0 && !is_zero {
        format!("-{}", grouped)
    } else {
        grouped
    }
}

fn parse(value: impl std::fmt::Display) -> f64 {
    value.to_string().parse().unwrap_or(0.0)
}

/// Two decimals, for volumes, costs and coefficients.
///
/// Usage in templates:
/// ```html
/// <td>{{ result.material_cost|amount }} руб</td>
/// ```
#[askama::filter_fn]
pub fn amount(value: impl std::fmt::Display, _: &dyn askama::Values) -> askama::Result<String> {
    Ok(format_number(parse(value), 2))
}

/// Four decimals, for masses in kg
#[askama::filter_fn]
pub fn mass(value: impl std::fmt::Display, _: &dyn askama::Values) -> askama::Result<String> {
    Ok(format_number(parse(value), 4))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thousands_separator() {
        assert_eq!(format_number(1234567.891, 2), "1 234 567.89");
        assert_eq!(format_number(999.0, 2), "999.00");
        assert_eq!(format_number(1000.0, 0), "1 000");
    }

    #[test]
    fn test_mass_precision() {
        assert_eq!(format_number(0.34, 4), "0.3400");
        assert_eq!(format_number(0.12345678, 4), "0.1235");
    }

    #[test]
    fn test_negative_values() {
        assert_eq!(format_number(-1500.5, 2), "-1 500.50");
        assert_eq!(format_number(-0.001, 2), "0.00");
    }
}
