//! The fixed enumerations a thing's attributes are drawn from.

use std::fmt;
use std::str::FromStr;

use rand::Rng;
use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// A string named no variant of the enumeration it was parsed as.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("value is not a valid enumeration member; permitted: {permitted}")]
pub struct UnknownVariant {
    /// The rejected input.
    pub value: String,
    /// The accepted wire names, quoted and comma-separated.
    pub permitted: String,
}

impl UnknownVariant {
    fn new(value: &str, names: impl Iterator<Item = &'static str>) -> Self {
        let permitted = names
            .map(|name| format!("'{name}'"))
            .collect::<Vec<_>>()
            .join(", ");
        Self {
            value: value.to_owned(),
            permitted,
        }
    }
}

/// A plain english color for a thing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "bindings/")]
pub enum ThingColor {
    /// Red.
    Red,
    /// Green.
    Green,
    /// Blue.
    Blue,
    /// Yellow.
    Yellow,
    /// Black.
    Black,
    /// Orange.
    Orange,
    /// Purple.
    Purple,
}

impl ThingColor {
    /// Every color, in declaration order.
    pub const ALL: [Self; 7] = [
        Self::Red,
        Self::Green,
        Self::Blue,
        Self::Yellow,
        Self::Black,
        Self::Orange,
        Self::Purple,
    ];

    /// The lowercase wire name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Red => "red",
            Self::Green => "green",
            Self::Blue => "blue",
            Self::Yellow => "yellow",
            Self::Black => "black",
            Self::Orange => "orange",
            Self::Purple => "purple",
        }
    }

    /// Draw a color uniformly at random.
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self::ALL.choose(rng).copied().unwrap_or(Self::Red)
    }
}

impl fmt::Display for ThingColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ThingColor {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|color| color.as_str() == s)
            .ok_or_else(|| UnknownVariant::new(s, Self::ALL.into_iter().map(Self::as_str)))
    }
}

/// What kind of thing a resource is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "bindings/")]
pub enum ThingType {
    /// A car.
    Car,
    /// A dog.
    Dog,
    /// A house.
    House,
    /// A sign.
    Sign,
    /// A bike.
    Bike,
}

impl ThingType {
    /// Every type, in declaration order.
    pub const ALL: [Self; 5] = [Self::Car, Self::Dog, Self::House, Self::Sign, Self::Bike];

    /// The lowercase wire name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Car => "car",
            Self::Dog => "dog",
            Self::House => "house",
            Self::Sign => "sign",
            Self::Bike => "bike",
        }
    }

    /// Draw a type uniformly at random.
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self::ALL.choose(rng).copied().unwrap_or(Self::Car)
    }
}

impl fmt::Display for ThingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ThingType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownVariant::new(s, Self::ALL.into_iter().map(Self::as_str)))
    }
}
