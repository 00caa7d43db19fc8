//! Instrument classification.
//!
//! | input length | result                                                    |
//! |--------------|-----------------------------------------------------------|
//! | 6            | FX pair: base = chars 0..3, quote = chars 3..6, FX venue  |
//! | 1..=5        | equity in domestic currency, smart-routed, default listing |
//! | other        | [`ClassifyError::UnsupportedInstrument`]                  |
//!
//! Symbol length standing in for asset class is a heuristic; it is kept as a
//! fixed table rather than looked up anywhere.

use model::{InstrumentDescriptor, SecurityType};
use thiserror::Error;

/// Venue for foreign-exchange pairs.
pub const FX_VENUE: &str = "IDEALPRO";
/// Lets the gateway pick the exchange.
pub const SMART_VENUE: &str = "SMART";
/// Listing venue used to disambiguate equity symbols.
pub const DEFAULT_PRIMARY_VENUE: &str = "ISLAND";
pub const DOMESTIC_CURRENCY: &str = "USD";

const FX_PAIR_LEN: usize = 6;
const MAX_EQUITY_LEN: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClassifyError {
    #[error("unsupported instrument '{input}' ({length} characters)")]
    UnsupportedInstrument { input: String, length: usize },
}

/// Map a typed instrument string to a fully specified instrument.
pub fn classify(input: &str) -> Result<InstrumentDescriptor, ClassifyError> {
    let chars: Vec<char> = input.chars().collect();

    match chars.len() {
        FX_PAIR_LEN => {
            let base: String = chars[..3].iter().collect();
            let quote: String = chars[3..].iter().collect();
            Ok(InstrumentDescriptor {
                symbol: base.to_uppercase(),
                security_type: SecurityType::ForeignExchangePair,
                currency: quote.to_uppercase(),
                venue: FX_VENUE.to_string(),
                primary_venue: None,
            })
        }
        1..=MAX_EQUITY_LEN => Ok(InstrumentDescriptor {
            symbol: input.to_uppercase(),
            security_type: SecurityType::Equity,
            currency: DOMESTIC_CURRENCY.to_string(),
            venue: SMART_VENUE.to_string(),
            primary_venue: Some(DEFAULT_PRIMARY_VENUE.to_string()),
        }),
        length => Err(ClassifyError::UnsupportedInstrument {
            input: input.to_string(),
            length,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fx_pair_from_lowercase() {
        let instrument = classify("eurusd").unwrap();
        assert_eq!(instrument.symbol, "EUR");
        assert_eq!(instrument.currency, "USD");
        assert_eq!(instrument.security_type, SecurityType::ForeignExchangePair);
        assert_eq!(instrument.venue, FX_VENUE);
        assert_eq!(instrument.primary_venue, None);
    }

    #[test]
    fn test_fx_pair_ignores_case() {
        for input in ["GBPJPY", "gbpjpy", "GbPjPy"] {
            let instrument = classify(input).unwrap();
            assert_eq!(instrument.symbol, "GBP");
            assert_eq!(instrument.currency, "JPY");
            assert_eq!(instrument.venue, FX_VENUE);
        }
    }

    #[test]
    fn test_equity_lengths_one_through_five() {
        for input in ["f", "ge", "ibm", "aapl", "Googl"] {
            let instrument = classify(input).unwrap();
            assert_eq!(instrument.symbol, input.to_uppercase());
            assert_eq!(instrument.security_type, SecurityType::Equity);
            assert_eq!(instrument.currency, DOMESTIC_CURRENCY);
            assert_eq!(instrument.venue, SMART_VENUE);
            assert_eq!(
                instrument.primary_venue.as_deref(),
                Some(DEFAULT_PRIMARY_VENUE)
            );
        }
    }

    #[test]
    fn test_empty_and_long_inputs_rejected() {
        for input in ["", "TOOLONG", "TOOLONG1", "ABCDEFGHIJKL"] {
            let err = classify(input).unwrap_err();
            assert_eq!(
                err,
                ClassifyError::UnsupportedInstrument {
                    input: input.to_string(),
                    length: input.len(),
                }
            );
        }
    }

    #[test]
    fn test_length_counts_characters_not_bytes() {
        // 6 characters, more than 6 bytes
        let instrument = classify("éurusd").unwrap();
        assert_eq!(instrument.symbol, "ÉUR");
        assert_eq!(instrument.security_type, SecurityType::ForeignExchangePair);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn arb_string(len: impl Into<prop::collection::SizeRange>) -> impl Strategy<Value = String> {
            prop::collection::vec(any::<char>(), len).prop_map(|chars| chars.into_iter().collect())
        }

        fn upper(chars: &[char]) -> String {
            chars.iter().collect::<String>().to_uppercase()
        }

        fn assert_fx(input: &str) -> Result<(), TestCaseError> {
            let chars: Vec<char> = input.chars().collect();
            let instrument = classify(input).unwrap();
            prop_assert_eq!(instrument.security_type, SecurityType::ForeignExchangePair);
            prop_assert_eq!(instrument.symbol, upper(&chars[..3]));
            prop_assert_eq!(instrument.currency, upper(&chars[3..]));
            prop_assert_eq!(instrument.venue, FX_VENUE);
            prop_assert_eq!(instrument.primary_venue, None);
            Ok(())
        }

        fn assert_equity(input: &str) -> Result<(), TestCaseError> {
            let instrument = classify(input).unwrap();
            prop_assert_eq!(instrument.security_type, SecurityType::Equity);
            prop_assert_eq!(instrument.symbol, input.to_uppercase());
            prop_assert_eq!(instrument.currency, DOMESTIC_CURRENCY);
            prop_assert_eq!(instrument.venue, SMART_VENUE);
            prop_assert_eq!(instrument.primary_venue.as_deref(), Some(DEFAULT_PRIMARY_VENUE));
            Ok(())
        }

        proptest! {
            #[test]
            fn six_ascii_letters_are_fx_pairs(input in "[a-zA-Z]{6}") {
                assert_fx(&input)?;
                // Case of the input never matters
                prop_assert_eq!(classify(&input.to_lowercase()), classify(&input.to_uppercase()));
            }

            #[test]
            fn any_six_chars_are_fx_pairs(input in arb_string(6usize)) {
                assert_fx(&input)?;
            }

            #[test]
            fn one_to_five_ascii_letters_are_equities(input in "[a-zA-Z]{1,5}") {
                assert_equity(&input)?;
            }

            #[test]
            fn any_one_to_five_chars_are_equities(input in arb_string(1usize..=5)) {
                assert_equity(&input)?;
            }

            #[test]
            fn other_lengths_are_rejected(input in prop_oneof![Just(String::new()), arb_string(7usize..40)]) {
                let length = input.chars().count();
                prop_assert_eq!(
                    classify(&input),
                    Err(ClassifyError::UnsupportedInstrument { input: input.clone(), length })
                );
            }
        }
    }
}
