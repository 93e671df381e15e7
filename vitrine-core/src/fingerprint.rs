//! Cache-bucket keys for canonical addresses.
//!
//! The shared cache store is keyed by the djb2/xor "string-hash" of the
//! canonical address: start at 5381 and, walking the UTF-16 code units from
//! last to first, compute `h = (h * 33) ^ unit` with wrapping 32-bit
//! arithmetic. The result is the unsigned 32-bit value, written in base 10.
//! Changing any of this orphans every rendition already in the store.

use vitrine_model::{CanonicalAddress, ContentFingerprint};

const SEED: u32 = 5381;

pub fn fingerprint(address: &CanonicalAddress) -> ContentFingerprint {
    fingerprint_str(address.as_str())
}

pub fn fingerprint_str(address: &str) -> ContentFingerprint {
    let units: Vec<u16> = address.encode_utf16().collect();
    let hash = units
        .iter()
        .rev()
        .fold(SEED, |hash, &unit| hash.wrapping_mul(33) ^ u32::from(unit));
    ContentFingerprint::from_raw(hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_values_are_stable() {
        assert_eq!(fingerprint_str("").value(), 5381);
        assert_eq!(fingerprint_str("a").value(), 177_604);
        assert_eq!(
            fingerprint_str(
                "https://ftmdead.mypinata.cloud/ipfs/abc123/img.png"
            )
                .to_string(),
            "3391633774"
        );
    }

    #[test]
    fn hashes_utf16_code_units() {
        // Non-BMP characters contribute their surrogate pair.
        assert_eq!(fingerprint_str("é").value(), 177_484);
        assert_eq!(fingerprint_str("🎨").value(), 5_206_929);
    }

    #[test]
    fn repeated_calls_agree() {
        let address = CanonicalAddress::new("https://gw/ipfs/QmHash/1.png");
        assert_eq!(fingerprint(&address), fingerprint(&address.clone()));
    }
}
