//! Display-name resolution for advertising peripherals.
//!
//! The resolver combines three weak signals into one label: the company identifier at
//! the start of the manufacturer data, the advertised local name, and the peripheral's
//! self-reported name. Rules are applied in priority order and the first one that
//! produces a label wins:
//!
//! 1. Apple manufacturer data: a known product type tag gives the product label; else a
//!    product keyword in the local name annotates it; else `"Apple Device"`.
//! 2. No known manufacturer: a non-empty self-reported name is used, annotated when it
//!    contains a product keyword.
//! 3. Known manufacturer: `"{name} - {manufacturer}"`, or the manufacturer alone.
//! 4. A non-empty local name.
//! 5. `"Unknown Device"`.

use std::sync::Arc;

use crate::advertisement::{company_id, Advertisement};
use crate::registry::ManufacturerRegistry;

/// Bluetooth SIG company identifier assigned to Apple.
pub const APPLE_COMPANY_ID: u16 = 0x004C;

/// Label used when an Apple device cannot be classified further.
pub const APPLE_DEVICE: &str = "Apple Device";

/// Label used when nothing about the peripheral is recognisable.
pub const UNKNOWN_DEVICE: &str = "Unknown Device";

/// Apple product categories recognised from advertisement data or names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AppleProduct {
    /// Item tracker.
    AirTag,
    /// Smart watch.
    Watch,
    /// Tablet.
    IPad,
    /// Laptop.
    MacBook,
    /// Phone.
    IPhone,
}

impl AppleProduct {
    /// Keyword order for name matching. `airtag` is checked first.
    const BY_KEYWORD: [Self; 5] = [
        Self::AirTag,
        Self::IPhone,
        Self::MacBook,
        Self::IPad,
        Self::Watch,
    ];

    /// Map a type tag from bytes 2..4 of Apple manufacturer data.
    #[must_use]
    pub const fn from_tag(tag: u16) -> Option<Self> {
        match tag {
            0x1912 => Some(Self::AirTag),
            0x1907 => Some(Self::Watch),
            0x190C => Some(Self::IPad),
            0x1910 => Some(Self::MacBook),
            0x1902 => Some(Self::IPhone),
            _ => None,
        }
    }

    /// Find the first product keyword contained in `name`, ignoring case.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        let lowered = name.to_lowercase();
        Self::BY_KEYWORD
            .into_iter()
            .find(|product| lowered.contains(product.keyword()))
    }

    /// The type tag this product advertises.
    #[must_use]
    pub const fn tag(self) -> u16 {
        match self {
            Self::AirTag => 0x1912,
            Self::Watch => 0x1907,
            Self::IPad => 0x190C,
            Self::MacBook => 0x1910,
            Self::IPhone => 0x1902,
        }
    }

    /// Lowercase keyword matched against names.
    #[must_use]
    pub const fn keyword(self) -> &'static str {
        match self {
            Self::AirTag => "airtag",
            Self::Watch => "watch",
            Self::IPad => "ipad",
            Self::MacBook => "macbook",
            Self::IPhone => "iphone",
        }
    }

    /// Display label for the category.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::AirTag => "Apple AirTag",
            Self::Watch => "Apple Watch",
            Self::IPad => "iPad",
            Self::MacBook => "MacBook",
            Self::IPhone => "iPhone",
        }
    }
}

impl std::fmt::Display for AppleProduct {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Classify Apple manufacturer data by its type tag.
///
/// The tag is bytes 2 and 3 read little-endian, the same layout as the company
/// identifier in bytes 0 and 1. Returns `None` for non-Apple data, data shorter than
/// four bytes, or an unknown tag.
#[must_use]
pub fn classify_apple(manufacturer_data: &[u8]) -> Option<AppleProduct> {
    if company_id(manufacturer_data) != Some(APPLE_COMPANY_ID) {
        return None;
    }
    match manufacturer_data {
        [_, _, lo, hi, ..] => AppleProduct::from_tag(u16::from_le_bytes([*lo, *hi])),
        _ => None,
    }
}

/// Resolves display names using an injected manufacturer registry.
#[derive(Debug, Clone)]
pub struct IdentityResolver {
    registry: Arc<ManufacturerRegistry>,
}

impl IdentityResolver {
    /// Create a resolver over the given registry.
    #[must_use]
    pub const fn new(registry: Arc<ManufacturerRegistry>) -> Self {
        Self { registry }
    }

    /// The registry this resolver reads.
    #[must_use]
    pub fn registry(&self) -> &ManufacturerRegistry {
        &self.registry
    }

    /// Vendor name for the company identifier in `manufacturer_data`, if known.
    #[must_use]
    pub fn manufacturer_name(&self, manufacturer_data: &[u8]) -> Option<&str> {
        company_id(manufacturer_data).and_then(|id| self.registry.lookup(id))
    }

    /// Resolve the display name of an advertisement.
    #[must_use]
    pub fn resolve(&self, advertisement: &Advertisement) -> String {
        self.resolve_name(
            advertisement.raw_name.as_deref(),
            advertisement.local_name(),
            advertisement.manufacturer_data(),
        )
    }

    /// Produce a single display name from the three naming signals.
    ///
    /// Never fails: absent or malformed inputs fall through to the next rule and the
    /// last resort is [`UNKNOWN_DEVICE`].
    #[must_use]
    pub fn resolve_name(
        &self,
        raw_name: Option<&str>,
        local_name: Option<&str>,
        manufacturer_data: Option<&[u8]>,
    ) -> String {
        let raw_name = raw_name.filter(|n| !n.is_empty());
        let local_name = local_name.filter(|n| !n.is_empty());
        let data = manufacturer_data.unwrap_or_default();

        if company_id(data) == Some(APPLE_COMPANY_ID) {
            if let Some(product) = classify_apple(data) {
                return product.label().to_string();
            }
            if let Some(name) = local_name {
                if let Some(product) = AppleProduct::from_name(name) {
                    return annotate(name, product);
                }
            }
            return APPLE_DEVICE.to_string();
        }

        match (self.manufacturer_name(data), raw_name) {
            (None, Some(raw)) => AppleProduct::from_name(raw)
                .map_or_else(|| raw.to_string(), |product| annotate(raw, product)),
            (Some(manufacturer), Some(raw)) => format!("{raw} - {manufacturer}"),
            (Some(manufacturer), None) => manufacturer.to_string(),
            (None, None) => local_name.unwrap_or(UNKNOWN_DEVICE).to_string(),
        }
    }
}

fn annotate(name: &str, product: AppleProduct) -> String {
    format!("{name} ({})", product.label())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advertisement::AdvertisementPayload;

    fn resolver() -> IdentityResolver {
        IdentityResolver::new(Arc::new(ManufacturerRegistry::from_entries([
            (0x004C, "Apple, Inc."),
            (0x0075, "Samsung Electronics Co. Ltd."),
        ])))
    }

    #[test]
    fn test_apple_airtag_from_tag() {
        let name = resolver().resolve_name(None, None, Some(&[0x4C, 0x00, 0x12, 0x19]));
        assert_eq!(name, "Apple AirTag");
    }

    #[test]
    fn test_apple_tag_literal_values_are_pinned() {
        assert_eq!(AppleProduct::from_tag(0x1912), Some(AppleProduct::AirTag));
        assert_eq!(AppleProduct::from_tag(0x1907), Some(AppleProduct::Watch));
        assert_eq!(AppleProduct::from_tag(0x190C), Some(AppleProduct::IPad));
        assert_eq!(AppleProduct::from_tag(0x1910), Some(AppleProduct::MacBook));
        assert_eq!(AppleProduct::from_tag(0x1902), Some(AppleProduct::IPhone));

        // bytes[2] is the low byte of the tag
        assert_eq!(
            classify_apple(&[0x4C, 0x00, 0x07, 0x19]),
            Some(AppleProduct::Watch)
        );
        assert_eq!(classify_apple(&[0x4C, 0x00, 0x19, 0x07]), None);
    }

    #[test]
    fn test_every_product_round_trips_through_its_tag() {
        for product in AppleProduct::BY_KEYWORD {
            let [lo, hi] = product.tag().to_le_bytes();
            assert_eq!(classify_apple(&[0x4C, 0x00, lo, hi]), Some(product));
        }
    }

    #[test]
    fn test_apple_without_subtype_is_apple_device() {
        let name = resolver().resolve_name(None, None, Some(&[0x4C, 0x00]));
        assert_eq!(name, "Apple Device");
    }

    #[test]
    fn test_apple_with_unknown_tag_uses_local_name_category() {
        let name = resolver().resolve_name(
            None,
            Some("Anna's MacBook Pro"),
            Some(&[0x4C, 0x00, 0x10, 0x05]),
        );
        assert_eq!(name, "Anna's MacBook Pro (MacBook)");
    }

    #[test]
    fn test_apple_with_plain_local_name_is_apple_device() {
        let name = resolver().resolve_name(Some("Bob"), Some("Living Room"), Some(&[0x4C, 0x00]));
        assert_eq!(name, "Apple Device");
    }

    #[test]
    fn test_apple_classification_survives_empty_registry() {
        let resolver = IdentityResolver::new(Arc::new(ManufacturerRegistry::empty()));
        let name = resolver.resolve_name(None, None, Some(&[0x4C, 0x00, 0x02, 0x19]));
        assert_eq!(name, "iPhone");
    }

    #[test]
    fn test_raw_name_verbatim() {
        let name = resolver().resolve_name(Some("Bob's Phone"), None, None);
        assert_eq!(name, "Bob's Phone");
    }

    #[test]
    fn test_raw_name_airtag_is_annotated() {
        let name = resolver().resolve_name(Some("My AIRTAG"), None, None);
        assert_eq!(name, "My AIRTAG (Apple AirTag)");
    }

    #[test]
    fn test_raw_name_category_is_annotated() {
        let name = resolver().resolve_name(Some("Kid's iPad"), None, Some(&[0xFF, 0xFF]));
        assert_eq!(name, "Kid's iPad (iPad)");
    }

    #[test]
    fn test_known_manufacturer_with_raw_name() {
        let name = resolver().resolve_name(Some("Galaxy Buds"), None, Some(&[0x75, 0x00, 0x01]));
        assert_eq!(name, "Galaxy Buds - Samsung Electronics Co. Ltd.");
    }

    #[test]
    fn test_known_manufacturer_alone() {
        let name = resolver().resolve_name(None, Some("ignored"), Some(&[0x75, 0x00]));
        assert_eq!(name, "Samsung Electronics Co. Ltd.");
    }

    #[test]
    fn test_unknown_company_falls_through_to_names() {
        let resolver = resolver();
        for id in [0x0000_u16, 0x0001, 0x1234, 0xFFFF] {
            let [lo, hi] = id.to_le_bytes();
            let data = [lo, hi, 0x00];
            assert_eq!(resolver.resolve_name(None, Some("Lamp"), Some(&data)), "Lamp");
            assert_eq!(resolver.resolve_name(None, None, Some(&data)), "Unknown Device");
        }
    }

    #[test]
    fn test_short_manufacturer_data_is_ignored() {
        let name = resolver().resolve_name(None, Some("Sensor"), Some(&[0x4C]));
        assert_eq!(name, "Sensor");
    }

    #[test]
    fn test_empty_names_fall_back_to_unknown() {
        let name = resolver().resolve_name(Some(""), Some(""), None);
        assert_eq!(name, "Unknown Device");
    }

    #[test]
    fn test_resolve_reads_advertisement_payload() {
        let adv = Advertisement::new("id", -40).with_payload(
            AdvertisementPayload::new()
                .with_manufacturer_data([0x4C, 0x00, 0x0C, 0x19])
                .with_local_name("whatever"),
        );
        assert_eq!(resolver().resolve(&adv), "iPad");
    }

    #[test]
    fn test_from_name_keyword_order() {
        assert_eq!(
            AppleProduct::from_name("AirTag on my watch"),
            Some(AppleProduct::AirTag)
        );
        assert_eq!(AppleProduct::from_name("speaker"), None);
    }
}
