//! Gateway normalization of metadata image references.

use vitrine_config::GatewayConfig;
use vitrine_config::validation::validate_rules;
use vitrine_model::{CanonicalAddress, ImageReference};

use crate::error::NormalizerError;

/// How a reference was treated by [`AddressNormalizer::normalize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Normalization<'a> {
    /// Empty reference; there is no image to fetch.
    Empty,
    /// Already on the canonical gateway.
    AlreadyCanonical,
    /// A known scheme or gateway prefix was swapped for the canonical one.
    Rewritten { rule: &'a str },
    /// Unrecognized form, e.g. a plain https URL on an unrelated host.
    Passthrough,
}

/// Rewrites storage URIs and alternate gateway URLs onto one gateway.
///
/// Pure and synchronous; safe to call on every render.
#[derive(Debug, Clone)]
pub struct AddressNormalizer {
    canonical_prefix: String,
    rules: Vec<String>,
}

impl AddressNormalizer {
    pub fn new(gateway: &GatewayConfig) -> Result<Self, NormalizerError> {
        validate_rules(gateway)?;
        let rules = gateway
            .rules()
            .filter(|rule| *rule != gateway.canonical_prefix)
            .map(str::to_string)
            .collect();
        Ok(Self {
            canonical_prefix: gateway.canonical_prefix.clone(),
            rules,
        })
    }

    pub fn canonical_prefix(&self) -> &str {
        &self.canonical_prefix
    }

    pub fn normalize(&self, reference: &ImageReference) -> CanonicalAddress {
        self.normalize_str(reference.as_str())
    }

    pub fn normalize_str(&self, reference: &str) -> CanonicalAddress {
        match self.classify(reference) {
            Normalization::Empty => CanonicalAddress::empty(),
            Normalization::Rewritten { rule } => CanonicalAddress::new(format!(
                "{}{}",
                self.canonical_prefix,
                &reference[rule.len()..]
            )),
            Normalization::AlreadyCanonical | Normalization::Passthrough => {
                CanonicalAddress::new(reference)
            }
        }
    }

    /// First matching rule wins; rules never overlap the canonical prefix,
    /// so a rewritten address is never rewritten again.
    pub fn classify(&self, reference: &str) -> Normalization<'_> {
        if reference.is_empty() {
            return Normalization::Empty;
        }
        if reference.starts_with(&self.canonical_prefix) {
            return Normalization::AlreadyCanonical;
        }
        self.rules
            .iter()
            .find(|rule| reference.starts_with(rule.as_str()))
            .map(|rule| Normalization::Rewritten { rule })
            .unwrap_or(Normalization::Passthrough)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SUFFIXES: &[&str] = &[
        "abc123/img.png",
        "QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG",
        "bafy/dir/with spaces/ünïcode.gif",
        "ipfs/nested",
        "",
    ];

    fn normalizer() -> AddressNormalizer {
        AddressNormalizer::new(&GatewayConfig::default()).unwrap()
    }

    #[test]
    fn every_rule_maps_onto_canonical_prefix() {
        let normalizer = normalizer();
        let gateway = GatewayConfig::default();
        for rule in gateway.rules() {
            for suffix in SUFFIXES {
                let reference = format!("{rule}{suffix}");
                assert_eq!(
                    normalizer.normalize_str(&reference).as_str(),
                    format!("{}{suffix}", gateway.canonical_prefix),
                    "rule {rule} suffix {suffix}"
                );
            }
        }
    }

    #[test]
    fn normalization_is_idempotent() {
        let normalizer = normalizer();
        let inputs = [
            "ipfs://abc123/img.png",
            "https://ipfs.io/ipfs/abc",
            "https://gateway.pinata.cloud/ipfs/abc",
            "https://ftmdead.mypinata.cloud/ipfs/abc",
            "https://example.com/plain.png",
            "data:image/png;base64,AAAA",
            "",
        ];
        for input in inputs {
            let once = normalizer.normalize_str(input);
            let twice = normalizer.normalize_str(once.as_str());
            assert_eq!(once, twice, "input {input}");
        }
    }

    #[test]
    fn empty_reference_stays_empty() {
        let normalizer = normalizer();
        assert!(normalizer.normalize(&ImageReference::default()).is_empty());
        assert_eq!(normalizer.classify(""), Normalization::Empty);
    }

    #[test]
    fn ipfs_uri_matches_documented_scenario() {
        let normalizer = normalizer();
        assert_eq!(
            normalizer.normalize_str("ipfs://abc123/img.png").as_str(),
            "https://ftmdead.mypinata.cloud/ipfs/abc123/img.png"
        );
    }

    #[test]
    fn unrelated_urls_pass_through_untouched() {
        let normalizer = normalizer();
        let url = "https://cdn.example.com/ipfs://not-a-prefix";
        assert_eq!(normalizer.classify(url), Normalization::Passthrough);
        assert_eq!(normalizer.normalize_str(url).as_str(), url);
    }

    #[test]
    fn rule_matching_is_anchored_at_the_start() {
        let normalizer = normalizer();
        assert_eq!(
            normalizer.classify("https://ipfs.io/ipfs/x"),
            Normalization::Rewritten {
                rule: "https://ipfs.io/ipfs/"
            }
        );
        assert_eq!(
            normalizer.classify(" ipfs://x"),
            Normalization::Passthrough
        );
    }

    #[test]
    fn overlapping_rule_set_is_refused() {
        let gateway = GatewayConfig {
            canonical_prefix: "https://ipfs.io/ipfs/".into(),
            scheme_prefixes: vec!["ipfs://".into()],
            alternate_prefixes: vec!["https://ipfs.io/".into()],
        };
        assert!(AddressNormalizer::new(&gateway).is_err());
    }
}
