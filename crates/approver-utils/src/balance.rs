// Copyright 2024 Msig Labs Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

/// Maximum number of fractional digits shown to the user.
const MAX_FRACTION_DIGITS: u32 = 4;

/// Formats raw on-chain balances (plancks) into human readable amounts,
/// using the token decimals and unit symbol of the target chain.
///
/// The formatter is configured once per chain and is otherwise stateless.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceFormatter {
    decimals: u32,
    unit: String,
}

impl BalanceFormatter {
    /// Creates a new formatter for a chain with the given token decimals
    /// and unit symbol.
    #[must_use]
    pub fn new(decimals: u32, unit: impl Into<String>) -> Self {
        Self {
            decimals,
            unit: unit.into(),
        }
    }

    /// Formats a raw amount, truncating to at most four fractional digits
    /// and trimming trailing zeros.
    pub fn format(&self, amount: u128) -> String {
        let base = 10u128.pow(self.decimals);
        let whole = amount / base;
        let fraction = amount % base;
        if fraction == 0 {
            return format!("{} {}", whole, self.unit);
        }
        // scale the fraction down to the displayed precision.
        let shown_digits = self.decimals.min(MAX_FRACTION_DIGITS);
        let scaled = fraction / 10u128.pow(self.decimals - shown_digits);
        if scaled == 0 {
            return format!("{} {}", whole, self.unit);
        }
        let mut frac_str =
            format!("{:0width$}", scaled, width = shown_digits as usize);
        while frac_str.ends_with('0') {
            frac_str.pop();
        }
        format!("{}.{} {}", whole, frac_str, self.unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whole_amounts_have_no_fraction() {
        let fmt = BalanceFormatter::new(10, "DOT");
        assert_eq!(fmt.format(0), "0 DOT");
        assert_eq!(fmt.format(10_000_000_000), "1 DOT");
        assert_eq!(fmt.format(420_000_000_000), "42 DOT");
    }

    #[test]
    fn fractions_are_truncated_and_trimmed() {
        let fmt = BalanceFormatter::new(10, "DOT");
        assert_eq!(fmt.format(12_345_000_000), "1.2345 DOT");
        assert_eq!(fmt.format(15_000_000_000), "1.5 DOT");
        // digits beyond the display precision are dropped.
        assert_eq!(fmt.format(12_345_678_900), "1.2345 DOT");
    }

    #[test]
    fn sub_unit_amounts() {
        let fmt = BalanceFormatter::new(10, "DOT");
        assert_eq!(fmt.format(5_000_000), "0.0005 DOT");
        // too small to show at the display precision.
        assert_eq!(fmt.format(1), "0 DOT");
    }

    #[test]
    fn low_decimal_chains() {
        let fmt = BalanceFormatter::new(2, "UNIT");
        assert_eq!(fmt.format(150), "1.5 UNIT");
        assert_eq!(fmt.format(101), "1.01 UNIT");
    }
}
