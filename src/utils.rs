//! Identifier and formatting helpers

use bech32::Bech32m;
use uuid7::uuid7;

// construct a unique entity id then encode using bech32
pub fn new_uuid_to_bech32(hrp: &str) -> anyhow::Result<String> {
    let hrp = bech32::Hrp::parse(hrp)?;
    let encode = bech32::encode::<Bech32m>(hrp, uuid7().as_bytes())?;
    Ok(encode)
}

/// Render an integer-cents amount the way the dashboard displays it,
/// e.g. `$1,500.00`
pub fn format_amount(cents: u64) -> String {
    let dollars = (cents / 100).to_string();
    let mut grouped = String::with_capacity(dollars.len() + dollars.len() / 3);
    for (i, ch) in dollars.chars().enumerate() {
        if i > 0 && (dollars.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("${grouped}.{:02}", cents % 100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_amount_splits_cents() {
        assert_eq!(format_amount(150_000), "$1,500.00");
        assert_eq!(format_amount(85_050), "$850.50");
        assert_eq!(format_amount(9), "$0.09");
    }

    #[test]
    fn format_amount_groups_thousands() {
        assert_eq!(format_amount(100_000_00), "$100,000.00");
        assert_eq!(format_amount(1_234_56), "$1,234.56");
        assert_eq!(format_amount(123_456_789_01), "$123,456,789.01");
        assert_eq!(format_amount(999_99), "$999.99");
    }
}
