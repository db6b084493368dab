//! The six playable character classes.
//!
//! The ranking page only exposes a class id through the icon file name
//! (`char_<id>.png`); names are seeded into the `classes` table once per run.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CharacterClass {
    Warrior,
    Sorcerer,
    Taoist,
    Arbalist,
    Lancer,
    Darkist,
}

impl CharacterClass {
    pub const ALL: [Self; 6] = [
        Self::Warrior,
        Self::Sorcerer,
        Self::Taoist,
        Self::Arbalist,
        Self::Lancer,
        Self::Darkist,
    ];

    pub const fn id(self) -> i64 {
        match self {
            Self::Warrior => 1,
            Self::Sorcerer => 2,
            Self::Taoist => 3,
            Self::Arbalist => 4,
            Self::Lancer => 5,
            Self::Darkist => 6,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Warrior => "Warrior",
            Self::Sorcerer => "Sorcerer",
            Self::Taoist => "Taoist",
            Self::Arbalist => "Arbalist",
            Self::Lancer => "Lancer",
            Self::Darkist => "Darkist",
        }
    }

    pub fn from_id(id: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|class| class.id() == id)
    }
}

impl std::fmt::Display for CharacterClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_round_trip() {
        for class in CharacterClass::ALL {
            assert_eq!(CharacterClass::from_id(class.id()), Some(class));
        }
        assert_eq!(CharacterClass::from_id(0), None);
        assert_eq!(CharacterClass::from_id(7), None);
    }

    #[test]
    fn ids_are_contiguous() {
        let ids: Vec<i64> = CharacterClass::ALL.iter().map(|c| c.id()).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(CharacterClass::Darkist.to_string(), "Darkist");
    }
}
