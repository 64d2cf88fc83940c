//! CPF: the Brazilian individual taxpayer number.
//!
//! Accepted in any punctuation (`529.982.247-25` or `52998224725`) and always
//! stored as its 11 digits. The last two digits are mod-11 check digits over the
//! preceding nine (weights 10..2) and ten (weights 11..2) digits.

use serde::Serialize;

use crate::error::DomainError;

const CPF_LEN: usize = 11;

/// A check-digit validated CPF, normalised to digits only.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Cpf(String);

impl Cpf {
    pub fn parse(raw: impl AsRef<str>) -> Result<Self, DomainError> {
        let digits = digits_of(raw.as_ref());
        if !check_digits_match(&digits) {
            return Err(DomainError::bad_request("invalid CPF"));
        }
        Ok(Self(digits.iter().map(|d| char::from(b'0' + *d)).collect()))
    }

    /// Rebuild from a value that was validated before it was stored.
    pub fn from_trusted(digits: String) -> Self {
        Self(digits)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Cpf {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Validate a CPF in any punctuation.
pub fn is_valid_cpf(raw: &str) -> bool {
    check_digits_match(&digits_of(raw))
}

fn digits_of(raw: &str) -> Vec<u8> {
    raw.bytes()
        .filter(u8::is_ascii_digit)
        .map(|b| b - b'0')
        .collect()
}

fn check_digits_match(digits: &[u8]) -> bool {
    if digits.len() != CPF_LEN {
        return false;
    }
    if digits.iter().all(|d| *d == digits[0]) {
        return false;
    }
    check_digit(&digits[..9]) == digits[9] && check_digit(&digits[..10]) == digits[10]
}

fn check_digit(prefix: &[u8]) -> u8 {
    let top = prefix.len() as u32 + 1;
    let sum: u32 = prefix
        .iter()
        .enumerate()
        .map(|(i, d)| u32::from(*d) * (top - i as u32))
        .sum();
    match (sum * 10) % 11 {
        10 => 0,
        d => d as u8,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn with_check_digits(base: [u8; 9]) -> String {
        let mut digits = base.to_vec();
        digits.push(check_digit(&digits));
        digits.push(check_digit(&digits));
        digits.iter().map(|d| char::from(b'0' + d)).collect()
    }

    #[test]
    fn known_valid_cpf_passes_with_and_without_punctuation() {
        assert!(is_valid_cpf("52998224725"));
        assert!(is_valid_cpf("529.982.247-25"));
        assert_eq!(Cpf::parse("529.982.247-25").unwrap().as_str(), "52998224725");
    }

    #[test]
    fn altered_last_digit_fails() {
        assert!(!is_valid_cpf("52998224726"));
        assert!(matches!(Cpf::parse("52998224726"), Err(DomainError::BadRequest(_))));
    }

    #[test]
    fn empty_input_fails() {
        assert!(!is_valid_cpf(""));
    }

    proptest! {
        #![proptest_config(ProptestConfig { cases: 128, .. ProptestConfig::default() })]

        #[test]
        fn repeated_digit_is_never_valid(d in 0u8..10) {
            let cpf: String = core::iter::repeat(char::from(b'0' + d)).take(CPF_LEN).collect();
            prop_assert!(!is_valid_cpf(&cpf));
        }

        #[test]
        fn wrong_length_is_never_valid(s in "[0-9]{0,10}|[0-9]{12,16}") {
            prop_assert!(!is_valid_cpf(&s));
        }

        #[test]
        fn generated_check_digits_validate(base in proptest::array::uniform9(0u8..10)) {
            prop_assume!(base.iter().any(|d| *d != base[0]));
            let cpf = with_check_digits(base);
            prop_assert!(is_valid_cpf(&cpf));

            let mut altered: Vec<u8> = cpf.bytes().collect();
            altered[10] = b'0' + ((altered[10] - b'0' + 1) % 10);
            let altered = String::from_utf8(altered).unwrap();
            prop_assert!(!is_valid_cpf(&altered));
        }
    }
}
