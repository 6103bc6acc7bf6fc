//! Free-text Russian address heuristics.
//!
//! Two questions are answered here: does an address already name a house,
//! and how does it split into street / house / apartment. Neither is a
//! grammar; both are deterministic and pinned down by the fixture tables
//! in the tests below.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Keyword (optionally dotted) directly followed by a number anywhere in
/// the address. Cyrillic-aware boundary instead of `\b`.
static HOUSE_KEYWORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:^|[\s,.])(?:дом|д|владение|влд|строение|стр|корпус|корп|к|литера|лит|сооружение|соор)\.?\s*\d",
    )
    .expect("house keyword pattern is valid")
});

/// Bare number (with an optional letter or fraction) closing the address.
static TRAILING_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:^|[\s,])\d+[0-9а-яёa-z/-]*\s*$").expect("trailing number pattern is valid")
});

static PO_BOX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^а/я").expect("po box pattern is valid"));

/// Apartment / office designator as a whole comma segment.
static APARTMENT_SEGMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:квартира|кв|офис|оф)(?:[.\s]+)?(\d.*)$")
        .expect("apartment pattern is valid")
});

/// House introduced by a house keyword; the house runs to the next comma.
static HOUSE_WITH_KEYWORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:^|[\s,])(?:дом|д|владение|влд)\.?\s*(\d[^,]*)")
        .expect("house extraction pattern is valid")
});

/// Building keyword standing in for the house ("ул. Центральная, стр. 1").
static BUILDING_AS_HOUSE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:^|[\s,])(?:строение|стр)\.?\s*(\d[^,]*)")
        .expect("building extraction pattern is valid")
});

/// Comma segment naming a building or korpus of the house before it.
static BUILDING_SEGMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:корпус|корп|к|строение|стр|литера|лит)\.?\s*\d[^,]*$")
        .expect("building segment pattern is valid")
});

/// Trailing bare house number, optionally with a building suffix
/// ("33 корпус 2", "12 стр. 1").
static HOUSE_TRAILING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(.+?)[\s,]+(\d[0-9a-zа-яё/-]*(?:\s+(?:корпус|корп|к|строение|стр)\.?\s*\d[0-9a-zа-яё/-]*)?)$",
    )
    .expect("trailing house pattern is valid")
});

static CITY_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:город\s+|г\.\s*|г\s+)").expect("city prefix pattern is valid")
});

/// An address split into its three editable parts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressParts {
    pub street: String,
    pub house: String,
    pub apartment: String,
}

impl AddressParts {
    /// Recompose as `"{street}, д {house}, кв {apartment}"`, skipping empty parts.
    pub fn compose(&self) -> String {
        compose_address(&self.street, &self.house, &self.apartment)
    }

    pub fn is_empty(&self) -> bool {
        self.street.is_empty() && self.house.is_empty() && self.apartment.is_empty()
    }
}

/// Whether the address already contains an explicit house number.
///
/// Accepts a house keyword followed by a number, or a bare number closing
/// the address. A number that only belongs to the street name
/// ("ул 22 Партсъезда") is not enough, and neither is a lone number or a
/// PO box.
pub fn has_explicit_house_number(address: &str) -> bool {
    let trimmed = trim_separators(address);
    if trimmed.is_empty() || PO_BOX.is_match(trimmed) {
        return false;
    }
    if HOUSE_KEYWORD.is_match(trimmed) {
        return true;
    }
    TRAILING_NUMBER.is_match(trimmed) && trimmed.chars().any(char::is_alphabetic)
}

/// Split a free-text address into street, house and apartment.
///
/// The last comma segment is the apartment when it starts with an
/// apartment keyword. The house comes from a house keyword, a building
/// keyword with no number before it, or failing that a trailing number.
/// Building segments right after a keyword house are folded into it
/// ("д 5, стр 2" gives house "5 стр 2"). Whatever precedes the house is
/// the street. Parsing the composed parts again yields the same parts.
pub fn parse_separated_address(address: &str) -> AddressParts {
    let mut segments: Vec<&str> = address
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    let apartment = match segments.last().and_then(|last| APARTMENT_SEGMENT.captures(last)) {
        Some(caps) => {
            let apartment = caps[1].trim().to_string();
            segments.pop();
            apartment
        }
        None => String::new(),
    };
    let body = segments.join(", ");

    let keyword_house = HOUSE_WITH_KEYWORD.captures(&body).or_else(|| {
        BUILDING_AS_HOUSE
            .captures(&body)
            .filter(|caps| !follows_number(&body[..caps.get(0).map_or(0, |m| m.start())]))
    });
    if let Some(caps) = keyword_house {
        let (Some(whole), Some(house)) = (caps.get(0), caps.get(1)) else {
            return AddressParts::default();
        };
        return AddressParts {
            street: clean_street(&body[..whole.start()]),
            house: with_buildings(house.as_str(), &body[house.end()..]),
            apartment,
        };
    }

    if let Some(caps) = HOUSE_TRAILING.captures(&body) {
        return AddressParts {
            street: clean_street(&caps[1]),
            house: caps[2].trim().to_string(),
            apartment,
        };
    }

    AddressParts {
        street: body,
        house: String::new(),
        apartment,
    }
}

/// Join address parts as `"{street}, д {house}, кв {apartment}"`.
pub fn compose_address(street: &str, house: &str, apartment: &str) -> String {
    let mut parts = Vec::with_capacity(3);
    let street = street.trim();
    let house = house.trim();
    let apartment = apartment.trim();
    if !street.is_empty() {
        parts.push(street.to_string());
    }
    if !house.is_empty() {
        parts.push(format!("д {house}"));
    }
    if !apartment.is_empty() {
        parts.push(format!("кв {apartment}"));
    }
    parts.join(", ")
}

/// City named by the first comma segment, without a `г.`/`город` prefix.
pub fn city_from_address(address: &str) -> Option<String> {
    let first = address.split(',').next()?.trim();
    let city = CITY_PREFIX.replace(first, "").trim().to_string();
    (!city.is_empty()).then_some(city)
}

fn trim_separators(raw: &str) -> &str {
    raw.trim_matches(|c: char| c == ',' || c.is_whitespace())
}

fn clean_street(raw: &str) -> String {
    trim_separators(raw).to_string()
}

/// Whether the text closes with a number token, i.e. a building keyword
/// after it qualifies that number rather than naming the house.
fn follows_number(prefix: &str) -> bool {
    trim_separators(prefix)
        .rsplit(|c: char| c == ',' || c.is_whitespace())
        .next()
        .and_then(|token| token.chars().next())
        .is_some_and(|c| c.is_ascii_digit())
}

/// Append the building segments that directly follow the house.
fn with_buildings(house: &str, rest: &str) -> String {
    let mut house = house.trim().to_string();
    for segment in rest.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        if !BUILDING_SEGMENT.is_match(segment) {
            break;
        }
        house.push(' ');
        house.push_str(segment);
    }
    house
}
