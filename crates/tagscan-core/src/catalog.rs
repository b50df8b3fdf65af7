//! Registry of polling profiles grouped by target family.
//!
//! The standard catalog mirrors the reader setups the scanner is used with:
//! FeliCa cards polled through the common area, phones in express-card mode,
//! ISO 14443 cards at every bitrate and ISO 15693 vicinity tags.
//!
//! # Examples
//!
//! ```
//! use tagscan_core::TargetCatalog;
//!
//! let catalog = TargetCatalog::standard();
//! let profiles = catalog.resolve("felica").unwrap();
//! assert_eq!(profiles.len(), 2);
//! assert_eq!(profiles[0].to_string(), "212F sensf_req=00FE00010F");
//!
//! assert!(catalog.resolve("nope").is_err());
//! ```

use crate::{
    Result,
    constants::{SYSTEM_CODE_EXPRESS, SYSTEM_CODE_FELICA},
    error::Error,
    types::{Modulation, TargetProfile, Technology},
};

/// Ordered, read-only mapping from family name to polling profiles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetCatalog {
    families: Vec<(String, Vec<TargetProfile>)>,
}

impl TargetCatalog {
    /// An empty catalog; populate it with [`TargetCatalog::with_family`].
    #[must_use]
    pub fn empty() -> Self {
        Self {
            families: Vec::new(),
        }
    }

    /// The built-in catalog.
    #[must_use]
    pub fn standard() -> Self {
        let proximity = |kbps, modulation| TargetProfile::new(Technology::proximity(kbps, modulation));

        Self::empty()
            .with_family(
                "express",
                vec![
                    TargetProfile::felica(212, SYSTEM_CODE_EXPRESS),
                    TargetProfile::felica(424, SYSTEM_CODE_EXPRESS),
                ],
            )
            .with_family(
                "felica",
                vec![
                    TargetProfile::felica(212, SYSTEM_CODE_FELICA),
                    TargetProfile::felica(424, SYSTEM_CODE_FELICA),
                ],
            )
            .with_family(
                "mifare",
                vec![
                    proximity(106, Modulation::A),
                    proximity(106, Modulation::B),
                    proximity(212, Modulation::A),
                    proximity(212, Modulation::B),
                ],
            )
            .with_family(
                "felica-lite",
                vec![proximity(212, Modulation::F), proximity(424, Modulation::F)],
            )
            .with_family(
                "other",
                vec![
                    proximity(424, Modulation::A),
                    proximity(424, Modulation::B),
                    proximity(848, Modulation::A),
                    proximity(848, Modulation::B),
                    proximity(848, Modulation::F),
                ],
            )
            .with_family("vicinity", vec![TargetProfile::new(Technology::vicinity())])
    }

    /// Register (or replace) a family.
    #[must_use]
    pub fn with_family(mut self, name: impl Into<String>, profiles: Vec<TargetProfile>) -> Self {
        let name = name.into();
        match self.families.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, slot)) => *slot = profiles,
            None => self.families.push((name, profiles)),
        }
        self
    }

    /// Profiles registered under `family`, in polling order.
    ///
    /// # Errors
    /// Returns `Error::UnknownFamily` if the name is not registered.
    pub fn resolve(&self, family: &str) -> Result<&[TargetProfile]> {
        self.families
            .iter()
            .find(|(name, _)| name == family)
            .map(|(_, profiles)| profiles.as_slice())
            .ok_or_else(|| Error::UnknownFamily(family.to_string()))
    }

    /// Concatenate several families in priority order.
    ///
    /// Profiles that appear in more than one family are offered once, at
    /// their first position.
    ///
    /// # Errors
    /// Returns `Error::UnknownFamily` for the first unregistered name.
    pub fn resolve_all<S: AsRef<str>>(&self, families: &[S]) -> Result<Vec<TargetProfile>> {
        let mut profiles: Vec<TargetProfile> = Vec::new();
        for family in families {
            for profile in self.resolve(family.as_ref())? {
                if !profiles.contains(profile) {
                    profiles.push(profile.clone());
                }
            }
        }
        Ok(profiles)
    }

    /// Registered family names in registration order.
    pub fn families(&self) -> impl Iterator<Item = &str> {
        self.families.iter().map(|(name, _)| name.as_str())
    }

    #[must_use]
    pub fn contains(&self, family: &str) -> bool {
        self.resolve(family).is_ok()
    }
}

impl Default for TargetCatalog {
    fn default() -> Self {
        Self::standard()
    }
}
