//! Address formatting and alignment probing

use crate::core::types::Address;

/// Upper bound reported by [`alignment_of`]
pub const MAX_PROBED_ALIGNMENT: u64 = 4096;

/// Fixed-width, upper-case, 16-digit rendering of an address
pub fn format_address(address: Address, with_prefix: bool) -> String {
    if with_prefix {
        format!("0x{:016X}", address.0)
    } else {
        format!("{:016X}", address.0)
    }
}

/// Largest power of two dividing `address`, capped at 4096
///
/// The null address reports 0.
pub fn alignment_of(address: Address) -> u64 {
    if address.is_null() {
        return 0;
    }
    (1u64 << address.0.trailing_zeros()).min(MAX_PROBED_ALIGNMENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_format_address() {
        assert_eq!(format_address(Address::new(0x1234), true), "0x0000000000001234");
        assert_eq!(format_address(Address::new(0xABCDEF), false), "0000000000ABCDEF");
        assert_eq!(format_address(Address::new(u64::MAX), false), "FFFFFFFFFFFFFFFF");
    }

    #[test]
    fn test_alignment_examples() {
        assert_eq!(alignment_of(Address::null()), 0);
        assert_eq!(alignment_of(Address::new(1)), 1);
        assert_eq!(alignment_of(Address::new(0x1008)), 8);
        assert_eq!(alignment_of(Address::new(0x10000)), 4096);
    }

    proptest! {
        #[test]
        fn alignment_divides_and_is_maximal(addr in 1u64..=u64::MAX) {
            let a = alignment_of(Address::new(addr));
            prop_assert!(a.is_power_of_two());
            prop_assert!(a <= MAX_PROBED_ALIGNMENT);
            prop_assert_eq!(addr % a, 0);
            if a < MAX_PROBED_ALIGNMENT {
                prop_assert_ne!(addr % (a * 2), 0);
            }
        }
    }
}
