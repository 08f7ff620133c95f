//! Invoice arithmetic.
//!
//! Running invoices keep full precision for the whole session. Only the
//! amount settled into lot revenue is rounded, always down to a multiple
//! of [`INVOICE_GRANULARITY`].

/// Currency units settled invoices are truncated to.
pub const INVOICE_GRANULARITY: u64 = 100;

/// Amount owed for `minutes` of parking at `price_per_hour`.
///
/// Pure and unrounded: the hourly price prorated over `minutes`.
///
/// Deliberately computed as `price_per_hour * minutes / 60` rather than
/// `price_per_hour / 60 * minutes`. Dividing first loses precision for
/// prices that are not multiples of 60, so an invoice of exactly 7700
/// (1100 per hour for 420 minutes) would come out as 7699.999... and
/// settle to 7600.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn calc_invoice(minutes: u64, price_per_hour: f64) -> f64 {
    price_per_hour * minutes as f64 / 60.0
}

/// Truncates `amount` down to the nearest multiple of
/// [`INVOICE_GRANULARITY`].
///
/// Amounts below the granularity (including negative and NaN amounts)
/// settle to `0`.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn round_invoice(amount: f64) -> u64 {
    if amount.is_nan() || amount < 100.0 {
        return 0;
    }

    let units = (amount / 100.0).floor() as u64;
    units.saturating_mul(INVOICE_GRANULARITY)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn calc_invoice_prorates_hourly_price() {
        assert!((calc_invoice(30, 6000.0) - 3000.0).abs() < f64::EPSILON);
        assert!((calc_invoice(45, 12000.0) - 9000.0).abs() < f64::EPSILON);
        assert!(calc_invoice(0, 8000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn calc_invoice_keeps_fractions() {
        let invoice = calc_invoice(1, 1000.0);
        assert!((invoice - 1000.0 / 60.0).abs() < 1e-9);
    }

    #[test]
    fn exact_amounts_are_not_lost_to_division_order() {
        let invoice = calc_invoice(420, 1100.0);
        assert!((invoice - 7700.0).abs() < f64::EPSILON);
        assert_eq!(round_invoice(invoice), 7700);

        assert_eq!(round_invoice(calc_invoice(30, 700.0)), 300);
        assert_eq!(round_invoice(calc_invoice(90, 2200.0)), 3300);
    }

    #[test]
    fn round_invoice_truncates_to_hundreds() {
        assert_eq!(round_invoice(2335.0), 2300);
        assert_eq!(round_invoice(2578.0), 2500);
        assert_eq!(round_invoice(2999.0), 2900);
        assert_eq!(round_invoice(3000.0), 3000);
        assert_eq!(round_invoice(99.0), 0);
        assert_eq!(round_invoice(99.999), 0);
        assert_eq!(round_invoice(100.0), 100);
    }

    #[test]
    fn round_invoice_settles_invalid_amounts_to_zero() {
        assert_eq!(round_invoice(0.0), 0);
        assert_eq!(round_invoice(-250.0), 0);
        assert_eq!(round_invoice(f64::NAN), 0);
    }

    #[test]
    fn round_invoice_never_exceeds_amount() {
        let mut amount = 0.0_f64;
        while amount < 25_000.0 {
            let rounded = round_invoice(amount);
            assert_eq!(rounded % INVOICE_GRANULARITY, 0, "{amount} -> {rounded}");
            #[allow(clippy::cast_precision_loss)]
            let rounded_f = rounded as f64;
            assert!(rounded_f <= amount, "{amount} -> {rounded}");
            assert!(amount - rounded_f < 100.0, "{amount} -> {rounded}");
            amount += 37.3;
        }
    }

    #[test]
    fn whole_hour_invoices_settle_exactly() {
        for price in [100_u64, 700, 1250, 6000, 7300] {
            for hours in 1..=12_u64 {
                #[allow(clippy::cast_precision_loss)]
                let invoice = calc_invoice(hours * 60, price as f64);
                let expected = hours * price / 100 * 100;
                assert_eq!(round_invoice(invoice), expected, "{hours}h at {price}");
            }
        }
    }
}
