//! Street nomenclature normalization for reverse-geocoded addresses.
//!
//! Nominatim returns street names spelled out (`"Calle 10"`, `"Carrera
//! 43A"`). Local cadastral nomenclature abbreviates the street type
//! (`"CL 10"`, `"KR 43A"`) and writes the house number after a `#`:
//! `"CL 10 # 43-21"`.
//!
//! Both functions here are pure and independent of the network.

use crate::ReverseAddress;

/// Value used when a lookup yields neither a street nor a display name.
pub const NO_DATA: &str = "Sin datos en OSM";

/// Street type prefixes and their abbreviations, in evaluation order.
///
/// The first entry whose key is a prefix of the street name wins.
pub static ABBREVIATIONS: &[(&str, &str)] = &[
    ("Calle", "CL"),
    ("Carrera", "KR"),
    ("Avenida", "AV"),
    ("Autopista", "AUTOP"),
    ("Transversal", "TV"),
    ("Diagonal", "DG"),
    ("Circular", "CIR"),
    ("Camino", "CM"),
    ("Vía", "VIA"),
    ("Manzana", "MZTA"),
    ("Bloque", "BL"),
    ("Edificio", "ED"),
    ("Sector", "SEC"),
    ("Zona", "ZN"),
];

/// Abbreviates the street type at the start of `name`.
///
/// Matching is a case-sensitive string prefix test, not a word match, so
/// `"Callejón"` becomes `"CLjón"`. Only the first table match is applied,
/// and only its first occurrence is replaced.
#[must_use]
pub fn normalize_street(name: &str) -> String {
    if name.is_empty() {
        return String::new();
    }

    ABBREVIATIONS
        .iter()
        .find(|(full, _)| name.starts_with(full))
        .map_or_else(
            || name.to_string(),
            |(full, abbr)| name.replacen(full, abbr, 1),
        )
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|s| !s.is_empty())
}

/// Reduces a reverse lookup to one display string.
///
/// The street is the first non-empty of `road`, `neighbourhood`,
/// `suburb`, normalized with [`normalize_street`] and followed by
/// `" # {house_number}"` when a house number is present. Without a street
/// the full `display_name` is used as is, and [`NO_DATA`] when that is
/// missing too (including when `result` is `None`). Empty strings count as
/// missing in every field, so an empty `display_name` also yields
/// [`NO_DATA`] rather than an empty address.
#[must_use]
pub fn resolve_address(result: Option<&ReverseAddress>) -> String {
    let Some(addr) = result else {
        return NO_DATA.to_string();
    };

    let street = non_empty(addr.road.as_ref())
        .or_else(|| non_empty(addr.neighbourhood.as_ref()))
        .or_else(|| non_empty(addr.suburb.as_ref()));

    match (street, non_empty(addr.house_number.as_ref())) {
        (Some(street), Some(number)) => format!("{} # {number}", normalize_street(street)),
        (Some(street), None) => normalize_street(street),
        (None, _) => non_empty(addr.display_name.as_ref())
            .unwrap_or(NO_DATA)
            .to_string(),
    }
}
