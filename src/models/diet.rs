use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Number of diet classes the classifier distinguishes
pub const N_CLASSES: usize = 2;

/// Binary training label for herbivorous specimens
pub const HERBIVORE_LABEL: u8 = 0;

/// Binary training label for carnivorous specimens
pub const CARNIVORE_LABEL: u8 = 1;

/// Diet classification of a specimen.
///
/// The discriminant is the binary label used by the trainer and the
/// classifier's probability columns, so `Diet::Carnivore as usize == 1`
/// everywhere in the crate.
#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    EnumString,
    Display,
    EnumIter,
)]
#[repr(u8)]
pub enum Diet {
    Herbivore = HERBIVORE_LABEL,
    Carnivore = CARNIVORE_LABEL,
}

impl Diet {
    /// All classes, indexed by label
    pub const ALL: [Diet; N_CLASSES] = [Diet::Herbivore, Diet::Carnivore];

    /// Binary label (1 = carnivorous, 0 = herbivorous)
    pub fn label(self) -> u8 {
        self as u8
    }

    /// Column index in probability arrays
    pub fn index(self) -> usize {
        self as usize
    }

    /// Inverse of [`Diet::label`]
    pub fn from_label(label: u8) -> Option<Self> {
        match label {
            HERBIVORE_LABEL => Some(Diet::Herbivore),
            CARNIVORE_LABEL => Some(Diet::Carnivore),
            _ => None,
        }
    }

    /// Parse a raw dataset `diet` value.
    ///
    /// Only `carnivorous` and `herbivorous` (trimmed, case-insensitive) are
    /// recognised; every other value, including `omnivorous`, is out of scope.
    pub fn from_category(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "carnivorous" => Some(Diet::Carnivore),
            "herbivorous" => Some(Diet::Herbivore),
            _ => None,
        }
    }

    /// Dataset spelling of this class
    pub fn category(self) -> &'static str {
        match self {
            Diet::Carnivore => "carnivorous",
            Diet::Herbivore => "herbivorous",
        }
    }

    /// Human-facing label
    pub fn display_name(self) -> &'static str {
        match self {
            Diet::Carnivore => "Carnivore",
            Diet::Herbivore => "Herbivore",
        }
    }

    pub fn caption(self) -> &'static str {
        match self {
            Diet::Carnivore => "This specimen likely belongs to a predatory species.",
            Diet::Herbivore => "This specimen likely belongs to a plant-eating species.",
        }
    }

    /// Reference reconstruction shown next to a result
    pub fn illustration_url(self) -> &'static str {
        match self {
            Diet::Carnivore => "https://www.nhm.ac.uk/resources/nature-online/life/dinosaurs/dinosaur-directory/images/reconstruction/small/megalosaurus.jpg",
            Diet::Herbivore => "https://www.nhm.ac.uk/resources/nature-online/life/dinosaurs/dinosaur-directory/images/reconstruction/small/apatosaurus-art.jpg",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn test_label_mapping_is_fixed() {
        assert_eq!(Diet::Carnivore.label(), 1);
        assert_eq!(Diet::Herbivore.label(), 0);
        assert_eq!(Diet::from_label(1), Some(Diet::Carnivore));
        assert_eq!(Diet::from_label(0), Some(Diet::Herbivore));
        assert_eq!(Diet::from_label(2), None);
    }

    #[test]
    fn test_all_is_indexed_by_label() {
        for diet in Diet::iter() {
            assert_eq!(Diet::ALL[diet.index()], diet);
        }
    }

    #[test]
    fn test_from_category_normalizes() {
        assert_eq!(Diet::from_category("carnivorous"), Some(Diet::Carnivore));
        assert_eq!(Diet::from_category("  Herbivorous "), Some(Diet::Herbivore));
        assert_eq!(Diet::from_category("CARNIVOROUS"), Some(Diet::Carnivore));
        assert_eq!(Diet::from_category("omnivorous"), None);
        assert_eq!(Diet::from_category("unknown"), None);
        assert_eq!(Diet::from_category(""), None);
    }

    #[test]
    fn test_display_round_trip() {
        assert_eq!(Diet::Carnivore.to_string(), "Carnivore");
        assert_eq!(Diet::from_str("Herbivore").unwrap(), Diet::Herbivore);
        assert_eq!(Diet::Herbivore.display_name(), Diet::Herbivore.to_string());
    }

    #[test]
    fn test_category_round_trip() {
        for diet in Diet::iter() {
            assert_eq!(Diet::from_category(diet.category()), Some(diet));
        }
    }

    #[test]
    fn test_each_diet_has_its_own_illustration() {
        assert_ne!(
            Diet::Carnivore.illustration_url(),
            Diet::Herbivore.illustration_url()
        );
        assert!(Diet::ALL
            .iter()
            .all(|d| d.illustration_url().starts_with("https://")));
    }
}
