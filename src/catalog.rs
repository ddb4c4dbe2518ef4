// Static catalogs: point sources and playable characters.

/// Knock-down cost, applied through the `playerdown` source.
pub const KNOCK_POINT_ID: &str = "playerdown";

/// Deduction that also counts as an expedition loss.
pub const LOSS_POINT_ID: &str = "loss";

/// Rune averages are divided by this to produce the rune bonus.
pub const RUNE_BONUS_THRESHOLD: f64 = 100_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PointGroup {
    Objective = 1,
    Placement = 2,
    Deduction = 3,
}

impl PointGroup {
    pub const ALL: [PointGroup; 3] = [
        PointGroup::Objective,
        PointGroup::Placement,
        PointGroup::Deduction,
    ];

    pub fn title(self) -> &'static str {
        match self {
            PointGroup::Objective => "📍 Expedition Objectives",
            PointGroup::Placement => "🏆 Placement Bonuses",
            PointGroup::Deduction => "⛔ Point Deductions",
        }
    }

    /// Metric label.
    pub fn label(self) -> &'static str {
        match self {
            PointGroup::Objective => "objective",
            PointGroup::Placement => "placement",
            PointGroup::Deduction => "deduction",
        }
    }
}

/// A fixed-amount scoring action.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointSource {
    pub id: &'static str,
    pub display_name: &'static str,
    /// Always positive; deductions are subtracted.
    pub amount: f64,
    pub group: PointGroup,
    pub icon_ref: &'static str,
}

impl PointSource {
    /// Signed change this source applies to a team's points.
    pub fn signed_amount(&self) -> f64 {
        match self.group {
            PointGroup::Deduction => -self.amount,
            _ => self.amount,
        }
    }
}

const fn source(
    id: &'static str,
    display_name: &'static str,
    amount: f64,
    group: PointGroup,
    icon_ref: &'static str,
) -> PointSource {
    PointSource {
        id,
        display_name,
        amount,
        group,
        icon_ref,
    }
}

pub static POINT_SOURCES: &[PointSource] = &[
    source("boss", "Defeated Boss/Greater Enemy", 3.0, PointGroup::Objective, "bossicon"),
    source("evergaol", "Defeated Evergaol", 2.0, PointGroup::Objective, "evergaol"),
    source("raid", "Completed Raid", 2.0, PointGroup::Objective, "raid"),
    source("nightlord", "Defeated Nightlord", 5.0, PointGroup::Objective, "nightaspect"),
    source("finish1", "Finished First", 5.0, PointGroup::Placement, "finish_1"),
    source("finish2", "Finished Second", 4.0, PointGroup::Placement, "finish_2"),
    source("finish3", "Finished Third", 3.0, PointGroup::Placement, "finish_3"),
    source("finish4", "Finished Fourth", 2.0, PointGroup::Placement, "finish_4"),
    source("finish5", "Finished Fifth", 1.0, PointGroup::Placement, "finish_5"),
    source("loss", "Lost Expedition", 5.0, PointGroup::Deduction, "loss"),
    source("missraid", "Missed Raid", 1.0, PointGroup::Deduction, "raid"),
    source("playerdown", "Player Downed", 0.25, PointGroup::Deduction, "downed"),
];

pub fn point_source(id: &str) -> Option<&'static PointSource> {
    POINT_SOURCES.iter().find(|p| p.id == id)
}

pub fn sources_in(group: PointGroup) -> impl Iterator<Item = &'static PointSource> {
    POINT_SOURCES.iter().filter(move |p| p.group == group)
}

/// `floor(runes_avg) / 100_000`.
pub fn rune_bonus(runes_avg: i64) -> f64 {
    runes_avg as f64 / RUNE_BONUS_THRESHOLD
}

// ── Characters ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Skin {
    pub id: &'static str,
    pub name: &'static str,
    pub image: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Character {
    pub id: &'static str,
    pub name: &'static str,
    pub skins: [Skin; 6],
}

impl Character {
    pub fn skin(&self, skin_id: &str) -> Option<&Skin> {
        self.skins.iter().find(|s| s.id == skin_id)
    }

    /// Logical attachment name of a skin portrait, e.g. `wylder/dawn.png`.
    pub fn portrait(&self, skin: &Skin) -> String {
        format!("{}/{}", self.id, skin.image)
    }
}

const fn skin(id: &'static str, name: &'static str, image: &'static str) -> Skin {
    Skin { id, name, image }
}

const fn character(id: &'static str, name: &'static str, special: [Skin; 2]) -> Character {
    Character {
        id,
        name,
        skins: [
            skin("default", "Default", "default.png"),
            skin("dawn", "Dawn", "dawn.png"),
            skin("darkness", "Darkness", "darkness.png"),
            skin("rememberance", "Rememberance", "rememberance.png"),
            special[0],
            special[1],
        ],
    }
}

pub static CHARACTERS: &[Character] = &[
    character(
        "wylder",
        "Wylder",
        [
            skin("abysswalker", "Abysswalker", "abysswalker.png"),
            skin("lion-knight", "Lion Knight", "lion-knight.png"),
        ],
    ),
    character(
        "guardian",
        "Guardian",
        [
            skin("sunlight-knight", "Sunlight Knight", "sunlight-knight.png"),
            skin("wayfarer", "Wayfarer", "wayfarer.png"),
        ],
    ),
    character(
        "ironeye",
        "Ironeye",
        [
            skin("ringfinger", "Ringfinger", "ringfinger.png"),
            skin("sellsword", "Sellsword", "sellsword.png"),
        ],
    ),
    character(
        "duchess",
        "Duchess",
        [
            skin("black-leather", "Black Leather", "black-leather.png"),
            skin("wraith", "Wraith", "wraith.png"),
        ],
    ),
    character(
        "raider",
        "Raider",
        [
            skin("rock-like", "Rock-Like", "rock-like.png"),
            skin("catarina", "Catarina", "catarina.png"),
        ],
    ),
    character(
        "revenant",
        "Revenant",
        [
            skin("sister", "The Sister in the Painting", "sister.png"),
            skin("dragon-school", "Dragon School", "dragonschool.png"),
        ],
    ),
    character(
        "recluse",
        "Recluse",
        [
            skin("heretic", "Heretic Sorcerer", "heretic.png"),
            skin("emerald", "Emerald Fate", "emerald.png"),
        ],
    ),
    character(
        "executor",
        "Executor",
        [
            skin("thorns", "Thorns", "thorns.png"),
            skin("sable-church", "Sable Church", "sablechurch.png"),
        ],
    ),
];

pub fn character_by_id(id: &str) -> Option<&'static Character> {
    CHARACTERS.iter().find(|c| c.id == id)
}

/// Resolve a character/skin pair, both by id.
pub fn resolve_choice(
    character_id: &str,
    skin_id: &str,
) -> Option<(&'static Character, &'static Skin)> {
    let character = character_by_id(character_id)?;
    let skin = character.skins.iter().find(|s| s.id == skin_id)?;
    Some((character, skin))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_ids_unique_and_delimiter_free() {
        let mut ids: Vec<_> = POINT_SOURCES.iter().map(|p| p.id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), POINT_SOURCES.len());
        assert!(ids.iter().all(|id| !id.contains('.') && !id.contains('#')));
    }

    #[test]
    fn test_deductions_are_negative() {
        assert_eq!(point_source("boss").unwrap().signed_amount(), 3.0);
        assert_eq!(point_source("loss").unwrap().signed_amount(), -5.0);
        assert_eq!(point_source(KNOCK_POINT_ID).unwrap().signed_amount(), -0.25);
        assert!(sources_in(PointGroup::Deduction).all(|p| p.signed_amount() < 0.0));
    }

    #[test]
    fn test_group_sizes() {
        assert_eq!(sources_in(PointGroup::Objective).count(), 4);
        assert_eq!(sources_in(PointGroup::Placement).count(), 5);
        assert_eq!(sources_in(PointGroup::Deduction).count(), 3);
    }

    #[test]
    fn test_rune_bonus() {
        assert_eq!(rune_bonus(250_000), 2.5);
        assert_eq!(rune_bonus(0), 0.0);
    }

    #[test]
    fn test_character_catalog() {
        assert_eq!(CHARACTERS.len(), 8);
        let (character, skin) = resolve_choice("revenant", "dragon-school").unwrap();
        assert_eq!(character.name, "Revenant");
        assert_eq!(character.portrait(skin), "revenant/dragonschool.png");
        assert!(resolve_choice("wylder", "wraith").is_none());
        assert!(resolve_choice("nobody", "default").is_none());
        assert!(character_by_id("executor").unwrap().skin("sable-church").is_some());
    }
}
