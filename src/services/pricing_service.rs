use chrono::NaiveDate;

const MILLIS_PER_DAY: i64 = 86_400_000;

pub struct PricingService;

impl PricingService {
    /// Nights between check-in and check-out, rounded up to whole days.
    pub fn nights(start: NaiveDate, end: NaiveDate) -> i64 {
        let millis = (end - start).num_milliseconds();
        if millis <= 0 {
            return 0;
        }
        (millis + MILLIS_PER_DAY - 1) / MILLIS_PER_DAY
    }

    /// Nightly price times the number of nights.
    pub fn total_price(nightly_price: f64, start: NaiveDate, end: NaiveDate) -> f64 {
        nightly_price * Self::nights(start, end) as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_total_price_calculation() {
        let start = date("2025-06-01");
        let end = date("2025-06-07");
        assert_eq!(PricingService::nights(start, end), 6);
        assert_eq!(PricingService::total_price(200.0, start, end), 1200.0);
    }

    #[test]
    fn test_nights_across_month_boundary() {
        assert_eq!(
            PricingService::nights(date("2025-01-30"), date("2025-02-02")),
            3
        );
    }

    #[test]
    fn test_empty_or_inverted_range_has_no_nights() {
        let day = date("2025-06-01");
        assert_eq!(PricingService::nights(day, day), 0);
        assert_eq!(PricingService::nights(date("2025-06-02"), day), 0);
        assert_eq!(PricingService::total_price(150.0, day, day), 0.0);
    }
}
