// Display helpers for large numbers and key sizes

/// Abbreviate a decimal number to at most `max_digits` digits around an ellipsis
pub fn format_large_number(number: &impl ToString, max_digits: usize) -> String {
    let digits = number.to_string();
    if digits.len() <= max_digits {
        return digits;
    }
    let half = max_digits / 2;
    format!("{}...{}", &digits[..half], &digits[digits.len() - half..])
}

/// Relative strength of an RSA modulus of the given size
pub fn key_strength(modulus_bits: u64) -> &'static str {
    if modulus_bits < 1024 {
        "Weak (Educational only)"
    } else if modulus_bits < 2048 {
        "Moderate (Not recommended for production)"
    } else if modulus_bits < 3072 {
        "Strong"
    } else {
        "Very Strong"
    }
}
