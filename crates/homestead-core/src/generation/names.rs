//! Name generation utilities

use crate::components::Name;
use rand::Rng;

/// Generate a random name
pub fn generate_name(rng: &mut impl Rng) -> Name {
    let given = GIVEN_NAMES[rng.gen_range(0..GIVEN_NAMES.len())];
    let family = FAMILY_NAMES[rng.gen_range(0..FAMILY_NAMES.len())];

    Name::new(given, family)
}

static GIVEN_NAMES: &[&str] = &[
    "Aelric", "Bran", "Cedric", "Doran", "Elara", "Finn", "Greta", "Hilda", "Isla", "Jorah",
    "Kael", "Lysa", "Mira", "Nolan", "Olwen", "Piper", "Quinn", "Rolan", "Sasha", "Thora", "Una",
    "Vale", "Wren", "Xander", "Yara", "Zara",
];

static FAMILY_NAMES: &[&str] = &[
    "Ashwood",
    "Blackthorn",
    "Clearwater",
    "Dawnbringer",
    "Evergreen",
    "Fairwind",
    "Goldleaf",
    "Highvale",
    "Ironforge",
    "Jadebrook",
    "Kindler",
    "Lightfoot",
    "Meadowbrook",
    "Nightshade",
    "Oakenshield",
    "Proudhorn",
    "Quickstep",
    "Ravenwood",
    "Silverstream",
    "Thornberry",
    "Underhill",
    "Valorheart",
    "Windwhisper",
    "Youngblood",
];
