use core::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use custodia_core::{DomainError, DomainResult};
use custodia_custody::{CustodyKind, ExhaustionPolicy, Resource, ResourceKind};

const NAME_MAX: usize = 200;
const CODE_MAX: usize = 50;
const LOCATION_MAX: usize = 200;

/// Movable assets can change location; fixed ones are installed.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetType {
    Movable,
    Fixed,
}

impl AssetType {
    pub fn as_str(self) -> &'static str {
        match self {
            AssetType::Movable => "movable",
            AssetType::Fixed => "fixed",
        }
    }
}

impl FromStr for AssetType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "movable" => Ok(AssetType::Movable),
            "fixed" => Ok(AssetType::Fixed),
            other => Err(DomainError::validation(format!(
                "invalid asset type '{other}': must be one of movable, fixed"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetDetails {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub asset_type: AssetType,
    #[serde(default)]
    pub location: Option<String>,
    pub acquired_on: NaiveDate,
    /// Path of an already-stored image; uploads are handled elsewhere.
    #[serde(default)]
    pub image: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub asset_type: Option<AssetType>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub acquired_on: Option<NaiveDate>,
    #[serde(default)]
    pub image: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetFilter {
    /// Case-insensitive substring of the name.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub asset_type: Option<AssetType>,
    #[serde(default)]
    pub location: Option<String>,
}

/// School assets: single holder, condition tracked, history kept.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct AssetKind;

pub type Asset = Resource<AssetKind>;

impl ResourceKind for AssetKind {
    const NAME: &'static str = "asset";
    const SINGLE_HOLDER: bool = true;
    const TRACKS_CONDITION: bool = true;
    const EXHAUSTION: ExhaustionPolicy = ExhaustionPolicy::FlagReturned;

    type Details = AssetDetails;
    type Patch = AssetPatch;
    type Filter = AssetFilter;

    fn accepts(_: CustodyKind) -> bool {
        true
    }

    fn normalize_code(code: &str) -> DomainResult<String> {
        let code = code.trim();
        if code.is_empty() {
            return Err(DomainError::validation("inventory code cannot be empty"));
        }
        if code.chars().count() > CODE_MAX {
            return Err(DomainError::validation(format!(
                "inventory code cannot exceed {CODE_MAX} characters"
            )));
        }
        Ok(code.to_uppercase())
    }

    fn validate(details: &AssetDetails) -> DomainResult<()> {
        let name = details.name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("asset name cannot be empty"));
        }
        if name.chars().count() > NAME_MAX {
            return Err(DomainError::validation(format!(
                "asset name cannot exceed {NAME_MAX} characters"
            )));
        }
        if let Some(location) = &details.location {
            if location.chars().count() > LOCATION_MAX {
                return Err(DomainError::validation(format!(
                    "location cannot exceed {LOCATION_MAX} characters"
                )));
            }
        }
        Ok(())
    }

    fn apply_patch(details: &mut AssetDetails, patch: AssetPatch) {
        if let Some(name) = patch.name {
            details.name = name;
        }
        if let Some(description) = patch.description {
            details.description = description;
        }
        if let Some(asset_type) = patch.asset_type {
            details.asset_type = asset_type;
        }
        if let Some(location) = patch.location {
            details.location = Some(location).filter(|l| !l.trim().is_empty());
        }
        if let Some(acquired_on) = patch.acquired_on {
            details.acquired_on = acquired_on;
        }
        if let Some(image) = patch.image {
            details.image = Some(image).filter(|i| !i.trim().is_empty());
        }
    }

    fn matches(details: &AssetDetails, filter: &AssetFilter) -> bool {
        if let Some(name) = filter.name.as_deref().filter(|n| !n.trim().is_empty()) {
            if !details.name.to_lowercase().contains(&name.trim().to_lowercase()) {
                return false;
            }
        }
        if let Some(asset_type) = filter.asset_type {
            if details.asset_type != asset_type {
                return false;
            }
        }
        if let Some(location) = filter.location.as_deref().filter(|l| !l.trim().is_empty()) {
            let wanted = location.trim().to_lowercase();
            if !details
                .location
                .as_deref()
                .is_some_and(|l| l.to_lowercase().contains(&wanted))
            {
                return false;
            }
        }
        true
    }

    fn search_fields(details: &AssetDetails) -> Vec<&str> {
        let mut fields = vec![details.name.as_str(), details.description.as_str()];
        if let Some(location) = &details.location {
            fields.push(location);
        }
        fields
    }

    fn label(details: &AssetDetails) -> &str {
        &details.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use custodia_core::ResourceId;
    use custodia_custody::{RegisterResource, ResourceFilter, ResourceStatus};

    fn details() -> AssetDetails {
        AssetDetails {
            name: "Proyector Epson X200".to_string(),
            description: "Sala de cómputo".to_string(),
            asset_type: AssetType::Movable,
            location: Some("Pabellón B".to_string()),
            acquired_on: NaiveDate::from_ymd_opt(2022, 8, 15).unwrap(),
            image: None,
        }
    }

    #[test]
    fn inventory_codes_are_trimmed_and_uppercased() {
        assert_eq!(AssetKind::normalize_code(" inv-0042 ").unwrap(), "INV-0042");
        assert!(AssetKind::normalize_code("  ").is_err());
        assert!(AssetKind::normalize_code(&"x".repeat(51)).is_err());
    }

    #[test]
    fn blank_name_is_rejected() {
        let mut d = details();
        d.name = "   ".to_string();
        assert!(matches!(AssetKind::validate(&d), Err(DomainError::Validation(_))));
        assert!(AssetKind::validate(&details()).is_ok());
    }

    #[test]
    fn patch_only_touches_given_fields() {
        let mut d = details();
        AssetKind::apply_patch(
            &mut d,
            AssetPatch {
                location: Some("Dirección".to_string()),
                ..AssetPatch::default()
            },
        );
        assert_eq!(d.location.as_deref(), Some("Dirección"));
        assert_eq!(d.name, "Proyector Epson X200");
    }

    #[test]
    fn filter_matches_name_type_and_location() {
        let d = details();
        let by_name = AssetFilter {
            name: Some("epson".to_string()),
            ..AssetFilter::default()
        };
        assert!(AssetKind::matches(&d, &by_name));

        let fixed = AssetFilter {
            asset_type: Some(AssetType::Fixed),
            ..AssetFilter::default()
        };
        assert!(!AssetKind::matches(&d, &fixed));

        let elsewhere = AssetFilter {
            location: Some("biblioteca".to_string()),
            ..AssetFilter::default()
        };
        assert!(!AssetKind::matches(&d, &elsewhere));
    }

    #[test]
    fn free_text_search_covers_description_and_code() {
        let asset = custodia_custody::ops::register::<AssetKind>(RegisterResource {
            resource_id: ResourceId::new(),
            code: "inv-0042".to_string(),
            quantity: Some(2),
            details: details(),
            actor: None,
            occurred_at: Utc::now(),
        })
        .unwrap()
        .resource;

        let search = |text: &str| ResourceFilter::<AssetKind> {
            search: Some(text.to_string()),
            available_only: true,
            ..ResourceFilter::default()
        };
        assert!(search("CÓMPUTO").matches(&asset));
        assert!(search("0042").matches(&asset));
        assert!(!search("biblioteca").matches(&asset));

        let damaged_only = ResourceFilter::<AssetKind> {
            status: Some(ResourceStatus::Damaged),
            ..ResourceFilter::default()
        };
        assert!(!damaged_only.matches(&asset));
    }

    #[test]
    fn asset_type_parses() {
        assert_eq!("FIXED".parse::<AssetType>().unwrap(), AssetType::Fixed);
        assert!("rolling".parse::<AssetType>().is_err());
    }
}
