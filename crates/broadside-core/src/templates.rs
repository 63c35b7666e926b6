//! Unit templates and the template catalog.
//!
//! Templates are read-only configuration. A runtime
//! [`Combatant`](crate::entity::Combatant) copies everything it needs from
//! its template when it spawns; the catalog itself is never mutated by the
//! engine after battle setup.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::entity::{
    AircraftType, ArmorProfile, Capabilities, ShipClass, Weapon, WeaponSlot,
};
use crate::error::ConfigError;

/// Base stats for one kind of unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitTemplate {
    /// Display name.
    pub name: String,
    /// Hull class.
    pub class: ShipClass,
    /// Starting and maximum health.
    pub max_health: u32,
    /// Armor thickness per zone.
    pub armor: ArmorProfile,
    /// Weapon fit by slot.
    #[serde(default)]
    pub weapons: BTreeMap<WeaponSlot, Weapon>,
    /// Cells per move action.
    pub speed: u32,
    /// Hit chance before range, evasion and weather.
    pub base_accuracy: f32,
    /// Fraction of incoming accuracy shaved off by maneuvering.
    pub evasion: f32,
    /// Squadrons carried (carriers only).
    #[serde(default)]
    pub hangar: u32,
}

/// Highest cells-per-move a template may declare.
pub const MAX_SPEED: u32 = 64;

impl UnitTemplate {
    /// Capabilities a unit spawned from this template has.
    #[must_use]
    pub fn capabilities(&self) -> Capabilities {
        let mut caps = self.class.default_capabilities();
        if self.weapons.contains_key(&WeaponSlot::Torpedo) {
            caps |= Capabilities::TORPEDOES;
        }
        if self.hangar == 0 {
            caps.remove(Capabilities::HANGAR);
        }
        caps
    }

    /// Checks the template's stats are usable.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidTemplate`] naming the first problem.
    pub fn validate(&self, key: &str) -> Result<(), ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidTemplate {
            template: key.to_string(),
            reason,
        };

        if self.max_health == 0 {
            return Err(invalid("max_health must be positive".into()));
        }
        if !(0.0..=1.0).contains(&self.base_accuracy) {
            return Err(invalid(format!(
                "base_accuracy {} outside [0, 1]",
                self.base_accuracy
            )));
        }
        if !(0.0..=1.0).contains(&self.evasion) {
            return Err(invalid(format!("evasion {} outside [0, 1]", self.evasion)));
        }
        if self.speed > MAX_SPEED {
            return Err(invalid(format!(
                "speed {} exceeds the maximum of {MAX_SPEED}",
                self.speed
            )));
        }
        if self.class == ShipClass::ShoreBattery && self.speed != 0 {
            return Err(invalid("shore batteries cannot have speed".into()));
        }
        for (slot, weapon) in &self.weapons {
            if weapon.range <= 0.0 || !weapon.range.is_finite() {
                return Err(invalid(format!("{slot} weapon range must be positive")));
            }
            if weapon.penetration < 0.0 || !weapon.penetration.is_finite() {
                return Err(invalid(format!(
                    "{slot} weapon penetration must be non-negative"
                )));
            }
            if let Some((ammo, m)) = weapon
                .ammo_modifiers
                .iter()
                .find(|(_, m)| **m < 0.0 || !m.is_finite())
            {
                return Err(invalid(format!("{slot} {ammo} modifier {m} is invalid")));
            }
            if *slot == WeaponSlot::Bombs && self.class != ShipClass::AirSquadron {
                return Err(invalid("only air squadrons carry bombs".into()));
            }
        }
        Ok(())
    }
}

/// Named collection of unit templates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TemplateCatalog {
    templates: BTreeMap<String, UnitTemplate>,
}

impl TemplateCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the built-in fleet list.
    #[must_use]
    pub fn standard() -> Self {
        let mut catalog = Self::new();
        for (key, template) in standard_templates() {
            catalog.insert(key, template);
        }
        catalog
    }

    /// Adds or replaces a template.
    pub fn insert(&mut self, key: impl Into<String>, template: UnitTemplate) {
        self.templates.insert(key.into(), template);
    }

    /// Adds every template from `other`, replacing same-named entries.
    pub fn merge(&mut self, other: &Self) {
        for (key, template) in &other.templates {
            self.templates.insert(key.clone(), template.clone());
        }
    }

    /// Looks up a template by key.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownTemplate`] if the key is missing.
    pub fn get(&self, key: &str) -> Result<&UnitTemplate, ConfigError> {
        self.templates
            .get(key)
            .ok_or_else(|| ConfigError::UnknownTemplate(key.to_string()))
    }

    /// Returns `true` if the key exists.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.templates.contains_key(key)
    }

    /// Iterates templates in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &UnitTemplate)> {
        self.templates.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of templates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// Returns `true` if there are no templates.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Validates every template, and that carriers have squadrons to fly.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (key, template) in &self.templates {
            template.validate(key)?;
            if template.capabilities().contains(Capabilities::HANGAR) {
                for kind in AircraftType::all() {
                    let squadron = self.get(kind.template_key())?;
                    if squadron.class != ShipClass::AirSquadron {
                        return Err(ConfigError::InvalidTemplate {
                            template: kind.template_key().to_string(),
                            reason: "squadron template must be an air squadron".into(),
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

fn with_weapons(mut template: UnitTemplate, weapons: &[(WeaponSlot, Weapon)]) -> UnitTemplate {
    template.weapons = weapons.iter().cloned().collect();
    template
}

#[allow(clippy::too_many_lines)]
fn standard_templates() -> Vec<(&'static str, UnitTemplate)> {
    let hull = |name: &str, class, max_health, armor, speed, base_accuracy, evasion| UnitTemplate {
        name: name.to_string(),
        class,
        max_health,
        armor,
        weapons: BTreeMap::new(),
        speed,
        base_accuracy,
        evasion,
        hangar: 0,
    };

    let mut carrier = hull(
        "Fleet Carrier",
        ShipClass::Carrier,
        1000,
        ArmorProfile {
            belt: 120.0,
            deck: 60.0,
            turret: 60.0,
        },
        2,
        0.65,
        0.05,
    );
    carrier.hangar = 6;

    vec![
        (
            "battleship",
            with_weapons(
                hull(
                    "Battleship",
                    ShipClass::Battleship,
                    1200,
                    ArmorProfile {
                        belt: 300.0,
                        deck: 150.0,
                        turret: 350.0,
                    },
                    2,
                    0.70,
                    0.05,
                ),
                &[
                    (WeaponSlot::Main, Weapon::new(120, 12.0, 200.0, 20)),
                    (WeaponSlot::Secondary, Weapon::new(30, 7.0, 40.0, 40)),
                ],
            ),
        ),
        (
            "heavy_cruiser",
            with_weapons(
                hull(
                    "Heavy Cruiser",
                    ShipClass::HeavyCruiser,
                    800,
                    ArmorProfile {
                        belt: 150.0,
                        deck: 80.0,
                        turret: 180.0,
                    },
                    3,
                    0.72,
                    0.10,
                ),
                &[
                    (WeaponSlot::Main, Weapon::new(80, 10.0, 130.0, 24)),
                    (WeaponSlot::Secondary, Weapon::new(25, 6.0, 35.0, 40)),
                ],
            ),
        ),
        (
            "light_cruiser",
            with_weapons(
                hull(
                    "Light Cruiser",
                    ShipClass::LightCruiser,
                    550,
                    ArmorProfile {
                        belt: 80.0,
                        deck: 40.0,
                        turret: 90.0,
                    },
                    3,
                    0.75,
                    0.15,
                ),
                &[
                    (WeaponSlot::Main, Weapon::new(50, 9.0, 80.0, 30)),
                    (WeaponSlot::Torpedo, Weapon::new(150, 6.0, 150.0, 8)),
                ],
            ),
        ),
        (
            "destroyer",
            with_weapons(
                hull(
                    "Destroyer",
                    ShipClass::Destroyer,
                    300,
                    ArmorProfile::uniform(25.0),
                    4,
                    0.75,
                    0.25,
                ),
                &[
                    (WeaponSlot::Main, Weapon::new(30, 7.0, 45.0, 40)),
                    (WeaponSlot::Torpedo, Weapon::new(160, 6.0, 140.0, 8)),
                ],
            ),
        ),
        (
            "submarine",
            with_weapons(
                hull(
                    "Submarine",
                    ShipClass::Submarine,
                    200,
                    ArmorProfile::uniform(15.0),
                    2,
                    0.70,
                    0.35,
                ),
                &[(WeaponSlot::Torpedo, Weapon::new(180, 5.0, 160.0, 10))],
            ),
        ),
        (
            "carrier",
            with_weapons(
                carrier,
                &[(WeaponSlot::Secondary, Weapon::new(25, 6.0, 35.0, 40))],
            ),
        ),
        (
            "auxiliary",
            with_weapons(
                hull(
                    "Fleet Oiler",
                    ShipClass::Auxiliary,
                    250,
                    ArmorProfile::uniform(10.0),
                    3,
                    0.60,
                    0.10,
                ),
                &[(WeaponSlot::Secondary, Weapon::new(15, 5.0, 20.0, 20))],
            ),
        ),
        (
            "shore_battery",
            with_weapons(
                hull(
                    "Coastal Battery",
                    ShipClass::ShoreBattery,
                    900,
                    ArmorProfile {
                        belt: 250.0,
                        deck: 250.0,
                        turret: 300.0,
                    },
                    0,
                    0.65,
                    0.0,
                ),
                &[(WeaponSlot::Main, Weapon::new(100, 13.0, 180.0, 60))],
            ),
        ),
        (
            AircraftType::Fighter.template_key(),
            with_weapons(
                hull(
                    "Fighter Squadron",
                    ShipClass::AirSquadron,
                    60,
                    ArmorProfile::uniform(5.0),
                    6,
                    0.80,
                    0.50,
                ),
                &[(WeaponSlot::Secondary, Weapon::new(20, 3.0, 15.0, 30))],
            ),
        ),
        (
            AircraftType::DiveBomber.template_key(),
            with_weapons(
                hull(
                    "Dive Bomber Squadron",
                    ShipClass::AirSquadron,
                    70,
                    ArmorProfile::uniform(5.0),
                    5,
                    0.65,
                    0.40,
                ),
                &[(WeaponSlot::Bombs, Weapon::new(140, 2.0, 120.0, 2))],
            ),
        ),
        (
            AircraftType::TorpedoBomber.template_key(),
            with_weapons(
                hull(
                    "Torpedo Bomber Squadron",
                    ShipClass::AirSquadron,
                    70,
                    ArmorProfile::uniform(5.0),
                    5,
                    0.65,
                    0.40,
                ),
                &[(WeaponSlot::Torpedo, Weapon::new(170, 3.0, 150.0, 1))],
            ),
        ),
    ]
}
