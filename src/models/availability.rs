use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum WeekDay {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl WeekDay {
    pub fn as_str(&self) -> &'static str {
        match self {
            WeekDay::Monday => "Monday",
            WeekDay::Tuesday => "Tuesday",
            WeekDay::Wednesday => "Wednesday",
            WeekDay::Thursday => "Thursday",
            WeekDay::Friday => "Friday",
            WeekDay::Saturday => "Saturday",
            WeekDay::Sunday => "Sunday",
        }
    }

    /// Accepts full names and three-letter abbreviations, case-insensitively.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "monday" | "mon" => Some(WeekDay::Monday),
            "tuesday" | "tue" => Some(WeekDay::Tuesday),
            "wednesday" | "wed" => Some(WeekDay::Wednesday),
            "thursday" | "thu" => Some(WeekDay::Thursday),
            "friday" | "fri" => Some(WeekDay::Friday),
            "saturday" | "sat" => Some(WeekDay::Saturday),
            "sunday" | "sun" => Some(WeekDay::Sunday),
            _ => None,
        }
    }

    pub fn of(date: NaiveDate) -> Self {
        match date.weekday() {
            Weekday::Mon => WeekDay::Monday,
            Weekday::Tue => WeekDay::Tuesday,
            Weekday::Wed => WeekDay::Wednesday,
            Weekday::Thu => WeekDay::Thursday,
            Weekday::Fri => WeekDay::Friday,
            Weekday::Sat => WeekDay::Saturday,
            Weekday::Sun => WeekDay::Sunday,
        }
    }
}

/// A start/end pair within a single day, end exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeWindow {
    pub start_hour: u32,
    pub start_minutes: u32,
    pub end_hour: u32,
    pub end_minutes: u32,
}

impl TimeWindow {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.start_hour > 23 || self.end_hour > 23 {
            return Err(AppError::Validation("hours must be between 0 and 23".into()));
        }
        if self.start_minutes > 59 || self.end_minutes > 59 {
            return Err(AppError::Validation("minutes must be between 0 and 59".into()));
        }
        if (self.start_hour, self.start_minutes) >= (self.end_hour, self.end_minutes) {
            return Err(AppError::Validation(format!(
                "start {} must be before end {}",
                self.format_start(),
                self.format_end()
            )));
        }
        Ok(())
    }

    pub fn format_start(&self) -> String {
        format!("{:02}:{:02}", self.start_hour, self.start_minutes)
    }

    pub fn format_end(&self) -> String {
        format!("{:02}:{:02}", self.end_hour, self.end_minutes)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Availability {
    pub id: i64,
    pub consultant_id: i64,
    pub day: WeekDay,
    pub start_hour: u32,
    pub start_minutes: u32,
    pub end_hour: u32,
    pub end_minutes: u32,
    /// Derived from appointments at read time, never stored.
    pub booked: bool,
    pub include_payment: bool,
    #[serde(rename = "price", with = "price_units")]
    pub price_minor: i64,
}

impl Availability {
    pub fn window(&self) -> TimeWindow {
        TimeWindow {
            start_hour: self.start_hour,
            start_minutes: self.start_minutes,
            end_hour: self.end_hour,
            end_minutes: self.end_minutes,
        }
    }

    /// Amount owed upfront, if this slot is gated by a payment.
    pub fn payment_due(&self) -> Option<i64> {
        self.include_payment.then_some(self.price_minor)
    }
}

/// Consultant-supplied fields of a new availability.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAvailability {
    pub day: String,
    pub start_hour: u32,
    pub start_minutes: u32,
    pub end_hour: u32,
    pub end_minutes: u32,
    #[serde(default)]
    pub include_payment: bool,
    #[serde(default)]
    pub price: Option<f64>,
}

/// A [`NewAvailability`] that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidAvailability {
    pub day: WeekDay,
    pub window: TimeWindow,
    pub include_payment: bool,
    pub price_minor: i64,
}

impl NewAvailability {
    pub fn validate(&self) -> Result<ValidAvailability, AppError> {
        let day = WeekDay::parse(&self.day)
            .ok_or_else(|| AppError::Validation(format!("invalid weekday: {}", self.day)))?;

        let window = TimeWindow {
            start_hour: self.start_hour,
            start_minutes: self.start_minutes,
            end_hour: self.end_hour,
            end_minutes: self.end_minutes,
        };
        window.validate()?;

        let price_minor = match self.price {
            Some(price) => decimal_to_minor(price)?,
            None => 0,
        };
        if self.include_payment && price_minor <= 0 {
            return Err(AppError::Validation(
                "a slot that includes payment needs a positive price".into(),
            ));
        }

        Ok(ValidAvailability {
            day,
            window,
            include_payment: self.include_payment,
            price_minor,
        })
    }
}

/// Converts a decimal amount with at most two fraction digits into minor units.
pub fn decimal_to_minor(amount: f64) -> Result<i64, AppError> {
    if !amount.is_finite() || amount < 0.0 {
        return Err(AppError::Validation(format!("invalid price: {amount}")));
    }
    let scaled = amount * 100.0;
    let rounded = scaled.round();
    if (scaled - rounded).abs() > 1e-6 {
        return Err(AppError::Validation(format!(
            "price has more than two decimals: {amount}"
        )));
    }
    if rounded > i64::MAX as f64 {
        return Err(AppError::Validation(format!("price too large: {amount}")));
    }
    Ok(rounded as i64)
}

pub fn minor_to_decimal(minor: i64) -> f64 {
    minor as f64 / 100.0
}

mod price_units {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(minor: &i64, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(super::minor_to_decimal(*minor))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<i64, D::Error> {
        let amount = f64::deserialize(d)?;
        super::decimal_to_minor(amount).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_slot(json: &str) -> NewAvailability {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_weekday_of_date() {
        // 2024-06-03 is a Monday
        let date = NaiveDate::from_ymd_opt(2024, 6, 3).unwrap();
        assert_eq!(WeekDay::of(date), WeekDay::Monday);
        assert_eq!(WeekDay::of(date.succ_opt().unwrap()), WeekDay::Tuesday);
    }

    #[test]
    fn test_weekday_parse() {
        assert_eq!(WeekDay::parse("Monday"), Some(WeekDay::Monday));
        assert_eq!(WeekDay::parse("sun"), Some(WeekDay::Sunday));
        assert_eq!(WeekDay::parse("Funday"), None);
    }

    #[test]
    fn test_validate_valid_slot() {
        let slot = new_slot(
            r#"{"day":"Monday","startHour":9,"startMinutes":0,"endHour":10,"endMinutes":0,"includePayment":false}"#,
        );
        let valid = slot.validate().unwrap();
        assert_eq!(valid.day, WeekDay::Monday);
        assert_eq!(valid.price_minor, 0);
        assert!(!valid.include_payment);
    }

    #[test]
    fn test_validate_rejects_inverted_range() {
        let slot = new_slot(
            r#"{"day":"Monday","startHour":10,"startMinutes":30,"endHour":10,"endMinutes":0}"#,
        );
        assert!(matches!(slot.validate(), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_validate_rejects_empty_range() {
        let slot = new_slot(
            r#"{"day":"Monday","startHour":9,"startMinutes":15,"endHour":9,"endMinutes":15}"#,
        );
        assert!(slot.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_out_of_range_minutes() {
        let slot = new_slot(
            r#"{"day":"Friday","startHour":9,"startMinutes":75,"endHour":10,"endMinutes":0}"#,
        );
        assert!(slot.validate().is_err());
    }

    #[test]
    fn test_validate_priced_slot() {
        let slot = new_slot(
            r#"{"day":"Tuesday","startHour":14,"startMinutes":0,"endHour":15,"endMinutes":30,"includePayment":true,"price":42.0}"#,
        );
        let valid = slot.validate().unwrap();
        assert_eq!(valid.price_minor, 4200);
    }

    #[test]
    fn test_validate_payment_without_price() {
        let slot = new_slot(
            r#"{"day":"Tuesday","startHour":14,"startMinutes":0,"endHour":15,"endMinutes":0,"includePayment":true}"#,
        );
        assert!(slot.validate().is_err());
    }

    #[test]
    fn test_decimal_to_minor() {
        assert_eq!(decimal_to_minor(42.0).unwrap(), 4200);
        assert_eq!(decimal_to_minor(19.99).unwrap(), 1999);
        assert_eq!(decimal_to_minor(0.0).unwrap(), 0);
        assert!(decimal_to_minor(-1.0).is_err());
        assert!(decimal_to_minor(1.005).is_err());
        assert!(decimal_to_minor(f64::NAN).is_err());
    }

    #[test]
    fn test_availability_serializes_price_as_decimal() {
        let slot = Availability {
            id: 7,
            consultant_id: 1,
            day: WeekDay::Wednesday,
            start_hour: 9,
            start_minutes: 0,
            end_hour: 10,
            end_minutes: 0,
            booked: false,
            include_payment: true,
            price_minor: 4250,
        };
        let json = serde_json::to_value(&slot).unwrap();
        assert_eq!(json["day"], "Wednesday");
        assert_eq!(json["price"], 42.5);
        assert_eq!(json["includePayment"], true);
        assert_eq!(json["consultantId"], 1);
        assert_eq!(slot.payment_due(), Some(4250));
    }
}
