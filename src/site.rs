use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::vector::Vec3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Site {
    A,
    B,
}

type SitePredicate = fn(&Vec3) -> Site;

fn site_when(is_a: bool) -> Site {
    if is_a {
        Site::A
    } else {
        Site::B
    }
}

// Single-axis thresholds per map. Overlays key off these exact values.
lazy_static::lazy_static! {
    static ref SITE_ZONES: HashMap<&'static str, SitePredicate> = {
        let mut zones: HashMap<&'static str, SitePredicate> = HashMap::new();
        zones.insert("de_mirage", |position| site_when(position[1] < 1500.0));
        zones.insert("de_cache", |position| site_when(position[1] > 0.0));
        zones.insert("de_overpass", |position| site_when(position[2] > 400.0));
        zones.insert("de_nuke", |position| site_when(position[2] > -500.0));
        zones.insert("de_dust2", |position| site_when(position[0] > -500.0));
        zones.insert("de_inferno", |position| site_when(position[0] > 1400.0));
        zones.insert("de_vertigo", |position| site_when(position[1] < 1400.0));
        zones.insert("de_train", |position| site_when(position[1] > -450.0));
        zones
    };
}

/// Maps a bomb position to a coarse site label. Unlisted maps resolve to `None`.
pub fn resolve_site(map_name: &str, position: &Vec3) -> Option<Site> {
    SITE_ZONES.get(map_name).map(|predicate| predicate(position))
}
