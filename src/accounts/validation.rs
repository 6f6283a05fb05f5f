use serde_json::Value;
use time::{Date, OffsetDateTime};

use super::error::FieldErrors;
use super::user::DATE_FORMAT;

pub const USERNAME_MAX_LENGTH: usize = 150;
pub const EMAIL_MAX_LENGTH: usize = 254;
pub const NAME_MAX_LENGTH: usize = 150;
pub const HEIGHT_RANGE: std::ops::RangeInclusive<i32> = 1..=300;
pub const WEIGHT_RANGE: std::ops::RangeInclusive<i32> = 1..=500;

// [business] Characters allowed in a username besides letters and digits
pub const USERNAME_EXTRA_CHARS: &[char] = &['@', '.', '+', '-', '_'];

pub fn is_username_char(c: char) -> bool {
    c.is_alphanumeric() || USERNAME_EXTRA_CHARS.contains(&c)
}

pub fn check_username(username: &str, errors: &mut FieldErrors) {
    if username.is_empty() {
        errors.add("username", "This field may not be blank.");
    } else if username.chars().count() > USERNAME_MAX_LENGTH {
        errors.add(
            "username",
            format!("Ensure this field has no more than {} characters.", USERNAME_MAX_LENGTH),
        );
    } else if !username.chars().all(is_username_char) {
        errors.add(
            "username",
            "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
        );
    }
}

// [business] Shape check only - deliverability is proven by the reset email
pub fn check_email(email: &str, errors: &mut FieldErrors) {
    let email = email.trim();
    if email.is_empty() {
        errors.add("email", "This field may not be blank.");
        return;
    }
    if email.chars().count() > EMAIL_MAX_LENGTH {
        errors.add(
            "email",
            format!("Ensure this field has no more than {} characters.", EMAIL_MAX_LENGTH),
        );
        return;
    }

    let valid = match email.rsplit_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if !valid {
        errors.add("email", "Enter a valid email address.");
    }
}

pub fn check_name(field: &str, value: &str, errors: &mut FieldErrors) {
    if value.chars().count() > NAME_MAX_LENGTH {
        errors.add(
            field,
            format!("Ensure this field has no more than {} characters.", NAME_MAX_LENGTH),
        );
    }
}

pub fn check_measure(
    field: &str,
    value: i64,
    range: std::ops::RangeInclusive<i32>,
    errors: &mut FieldErrors,
) -> Option<i32> {
    if value < i64::from(*range.start()) {
        errors.add(
            field,
            format!("Ensure this value is greater than or equal to {}.", range.start()),
        );
        return None;
    }
    if value > i64::from(*range.end()) {
        errors.add(
            field,
            format!("Ensure this value is less than or equal to {}.", range.end()),
        );
        return None;
    }
    i32::try_from(value).ok()
}

// [business] Whole numbers as JSON numbers or strings ("178", 178.0), then the range check
pub fn parse_measure(
    field: &str,
    raw: &Value,
    range: std::ops::RangeInclusive<i32>,
    errors: &mut FieldErrors,
) -> Option<i32> {
    let number = match raw {
        Value::Null => {
            errors.add(field, "This field may not be null.");
            return None;
        }
        Value::Number(n) => n.as_i64().or_else(|| {
            // [rust] `as` saturates, so huge integral floats still fail the range check
            n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)
        }),
        Value::String(s) => parse_integer_text(s),
        _ => None,
    };

    match number {
        Some(number) => check_measure(field, number, range, errors),
        None => {
            errors.add(field, "A valid integer is required.");
            None
        }
    }
}

// "178", " 178 ", "178.00"; anything with a non-zero fraction is rejected
fn parse_integer_text(text: &str) -> Option<i64> {
    let text = text.trim();
    let digits = match text.split_once('.') {
        Some((whole, fraction)) if fraction.chars().all(|c| c == '0') => whole,
        Some(_) => return None,
        None => text,
    };

    let unsigned = digits.strip_prefix(|c| c == '-' || c == '+').unwrap_or(digits);
    if unsigned.is_empty() || !unsigned.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    digits
        .parse::<i64>()
        .ok()
        .or_else(|| digits.parse::<f64>().ok().map(|f| f as i64))
}

// [business] Parse YYYY-MM-DD and enforce the minimum age
pub fn parse_date_of_birth(
    raw: &str,
    min_age: u8,
    today: Date,
    errors: &mut FieldErrors,
) -> Option<Date> {
    let Ok(date) = Date::parse(raw.trim(), DATE_FORMAT) else {
        errors.add(
            "date_of_birth",
            "Date has wrong format. Use one of these formats instead: YYYY-MM-DD.",
        );
        return None;
    };

    if date > today {
        errors.add("date_of_birth", "Date of birth cannot be in the future.");
        return None;
    }
    if age_on(date, today) < i32::from(min_age) {
        errors.add(
            "date_of_birth",
            format!("You must be at least {} years old.", min_age),
        );
        return None;
    }
    Some(date)
}

// Whole years elapsed, birthdays counted on the day itself
pub fn age_on(birth: Date, today: Date) -> i32 {
    let mut age = today.year() - birth.year();
    if (today.month() as u8, today.day()) < (birth.month() as u8, birth.day()) {
        age -= 1;
    }
    age
}

pub fn today() -> Date {
    OffsetDateTime::now_utc().date()
}

pub fn parse_choice<T>(field: &str, raw: &str, errors: &mut FieldErrors) -> Option<T>
where
    T: std::str::FromStr<Err = String>,
{
    match raw.parse::<T>() {
        Ok(value) => Some(value),
        Err(message) => {
            errors.add(field, message);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::user::FitnessLevel;
    use serde_json::json;
    use time::macros::date;

    #[test]
    fn test_username_rules() {
        let mut errors = FieldErrors::new();
        check_username("lea.m+fit@home_1-2", &mut errors);
        assert!(errors.is_empty());

        check_username("léa martin", &mut errors);
        assert_eq!(errors.get("username").unwrap().len(), 1);

        let mut errors = FieldErrors::new();
        check_username(&"a".repeat(151), &mut errors);
        assert!(errors.get("username").unwrap()[0].contains("no more than 150"));
    }

    #[test]
    fn test_email_shape() {
        for good in ["lea@example.com", " Lea@Example.COM ", "a+b@sub.example.fr"] {
            let mut errors = FieldErrors::new();
            check_email(good, &mut errors);
            assert!(errors.is_empty(), "{} should be accepted", good);
        }
        for bad in ["", "lea", "lea@", "@example.com", "lea@example", "le a@example.com"] {
            let mut errors = FieldErrors::new();
            check_email(bad, &mut errors);
            assert!(!errors.is_empty(), "{} should be rejected", bad);
        }
    }

    #[test]
    fn test_measures() {
        let mut errors = FieldErrors::new();
        check_measure("height", 0, HEIGHT_RANGE, &mut errors);
        check_measure("weight", 501, WEIGHT_RANGE, &mut errors);
        check_measure("weight", 250, WEIGHT_RANGE, &mut errors);
        assert_eq!(
            errors.get("height").unwrap(),
            ["Ensure this value is greater than or equal to 1."]
        );
        assert_eq!(
            errors.get("weight").unwrap(),
            ["Ensure this value is less than or equal to 500."]
        );
    }

    #[test]
    fn test_measure_accepts_integer_text() {
        let mut errors = FieldErrors::new();
        assert_eq!(parse_measure("height", &json!(178), HEIGHT_RANGE, &mut errors), Some(178));
        assert_eq!(parse_measure("height", &json!("178"), HEIGHT_RANGE, &mut errors), Some(178));
        assert_eq!(parse_measure("height", &json!(" 72.0 "), HEIGHT_RANGE, &mut errors), Some(72));
        assert_eq!(parse_measure("weight", &json!(68.0), WEIGHT_RANGE, &mut errors), Some(68));
        assert!(errors.is_empty());
    }

    #[test]
    fn test_measure_type_errors_are_field_errors() {
        let mut errors = FieldErrors::new();
        assert_eq!(parse_measure("height", &json!(178.5), HEIGHT_RANGE, &mut errors), None);
        assert_eq!(parse_measure("height", &json!("tall"), HEIGHT_RANGE, &mut errors), None);
        assert_eq!(parse_measure("height", &json!([178]), HEIGHT_RANGE, &mut errors), None);
        assert_eq!(
            errors.get("height").unwrap(),
            ["A valid integer is required.", "A valid integer is required.", "A valid integer is required."]
        );

        assert_eq!(parse_measure("weight", &Value::Null, WEIGHT_RANGE, &mut errors), None);
        assert_eq!(parse_measure("weight", &json!(99999999999u64), WEIGHT_RANGE, &mut errors), None);
        assert_eq!(
            parse_measure("weight", &json!("99999999999999999999999"), WEIGHT_RANGE, &mut errors),
            None
        );
        assert_eq!(
            errors.get("weight").unwrap(),
            [
                "This field may not be null.",
                "Ensure this value is less than or equal to 500.",
                "Ensure this value is less than or equal to 500."
            ]
        );
    }

    #[test]
    fn test_age_on_birthday_boundary() {
        assert_eq!(age_on(date!(2012 - 10 - 16), date!(2025 - 10 - 16)), 13);
        assert_eq!(age_on(date!(2012 - 10 - 17), date!(2025 - 10 - 16)), 12);
        assert_eq!(age_on(date!(2012 - 02 - 29), date!(2025 - 02 - 28)), 12);
    }

    #[test]
    fn test_date_of_birth() {
        let today = date!(2025 - 10 - 16);

        let mut errors = FieldErrors::new();
        assert_eq!(
            parse_date_of_birth("1990-05-01", 13, today, &mut errors),
            Some(date!(1990 - 05 - 01))
        );
        assert!(errors.is_empty());

        assert_eq!(parse_date_of_birth("01/05/1990", 13, today, &mut errors), None);
        assert_eq!(parse_date_of_birth("2030-01-01", 13, today, &mut errors), None);
        assert_eq!(parse_date_of_birth("2015-01-01", 13, today, &mut errors), None);
        let messages = errors.get("date_of_birth").unwrap();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1], "Date of birth cannot be in the future.");
        assert_eq!(messages[2], "You must be at least 13 years old.");
    }

    #[test]
    fn test_parse_choice() {
        let mut errors = FieldErrors::new();
        let level: Option<FitnessLevel> = parse_choice("fitness_level", "intermediate", &mut errors);
        assert_eq!(level, Some(FitnessLevel::Intermediate));

        let level: Option<FitnessLevel> = parse_choice("fitness_level", "pro", &mut errors);
        assert_eq!(level, None);
        assert_eq!(
            errors.get("fitness_level").unwrap(),
            ["\"pro\" is not a valid choice."]
        );
    }
}
