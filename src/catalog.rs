//! Block catalog: numeric tiles (1..=256) and special blocks.

use clap::ValueEnum;

/// Exponent of the largest tile (2^8 = 256). Doubling it has no catalog entry.
pub const MAX_EXPONENT: u8 = 8;

/// Stable catalog index. Numeric tiles are 0..=8, specials follow in [`Special::ALL`] order.
pub type KindId = u8;

/// Special block effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum Special {
    Bug,
    Wild,
    Swap,
    Bomb,
    Magnet,
    Zap,
    Nuke,
    Blaster,
}

impl Special {
    pub const ALL: [Self; 8] = [
        Self::Bug,
        Self::Wild,
        Self::Swap,
        Self::Bomb,
        Self::Magnet,
        Self::Zap,
        Self::Nuke,
        Self::Blaster,
    ];

    /// Short tile label (fits a 6-column cell).
    pub fn label(self) -> &'static str {
        match self {
            Self::Bug => "BUG",
            Self::Wild => "WILD",
            Self::Swap => "SWAP",
            Self::Bomb => "BOMB",
            Self::Magnet => "MAG",
            Self::Zap => "ZAP",
            Self::Nuke => "NUKE",
            Self::Blaster => "BLST",
        }
    }
}

/// What a block is. Numeric tiles are stored as their exponent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockKind {
    Number(u8),
    Special(Special),
}

impl BlockKind {
    /// Lowest numeric tile; fallback for unknown ids.
    pub const LOWEST: Self = Self::Number(0);

    /// Display value; `None` for specials.
    #[inline]
    pub fn value(self) -> Option<u32> {
        match self {
            Self::Number(e) => Some(1u32 << e),
            Self::Special(_) => None,
        }
    }

    /// Points awarded when this block is removed by an effect (0 for specials).
    #[inline]
    pub fn points(self) -> u32 {
        self.value().unwrap_or(0)
    }

    pub fn special(self) -> Option<Special> {
        match self {
            Self::Special(s) => Some(s),
            Self::Number(_) => None,
        }
    }

    #[inline]
    pub fn is(self, special: Special) -> bool {
        self == Self::Special(special)
    }

    pub fn id(self) -> KindId {
        match self {
            Self::Number(e) => e,
            Self::Special(s) => {
                let idx = Special::ALL.iter().position(|&x| x == s).unwrap_or(0);
                MAX_EXPONENT + 1 + idx as u8
            }
        }
    }

    pub fn label(self) -> String {
        match self {
            Self::Number(e) => (1u32 << e).to_string(),
            Self::Special(s) => s.label().to_string(),
        }
    }
}

/// One catalog row. Its id is its index, see [`BlockKind::id`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KindDef {
    pub kind: BlockKind,
    pub enabled: bool,
}

/// Static table of block kinds, built once per session from config.
#[derive(Debug, Clone)]
pub struct Catalog {
    defs: Vec<KindDef>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::with_disabled(&[])
    }
}

impl Catalog {
    /// Every kind enabled except the listed specials. Numeric tiles are always enabled.
    pub fn with_disabled(disabled: &[Special]) -> Self {
        let numeric = (0..=MAX_EXPONENT).map(BlockKind::Number);
        let special = Special::ALL.into_iter().map(BlockKind::Special);
        let defs = numeric
            .chain(special)
            .map(|kind| KindDef {
                kind,
                enabled: kind.special().map_or(true, |s| !disabled.contains(&s)),
            })
            .collect();
        Self { defs }
    }

    /// Catalog with every special disabled.
    pub fn numeric_only() -> Self {
        Self::with_disabled(&Special::ALL)
    }

    pub fn by_kind(&self, id: KindId) -> Option<&KindDef> {
        self.defs.get(id as usize)
    }

    /// Numeric kind whose display value is exactly `value`.
    pub fn by_value(&self, value: u32) -> Option<BlockKind> {
        self.defs
            .iter()
            .find(|d| d.kind.value() == Some(value))
            .map(|d| d.kind)
    }

    /// Kind for `id`, falling back to the lowest tile when the id is unknown.
    pub fn kind_or_lowest(&self, id: KindId) -> BlockKind {
        match self.by_kind(id) {
            Some(def) => def.kind,
            None => {
                tracing::warn!(id, "unknown block kind id, using lowest tile");
                BlockKind::LOWEST
            }
        }
    }

    pub fn all_enabled_specials(&self) -> Vec<Special> {
        self.defs
            .iter()
            .filter(|d| d.enabled)
            .filter_map(|d| d.kind.special())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_numeric_entry_per_power_of_two() {
        let cat = Catalog::default();
        for e in 0..=MAX_EXPONENT {
            let v = 1u32 << e;
            assert_eq!(cat.by_value(v), Some(BlockKind::Number(e)));
        }
        assert_eq!(cat.by_value(512), None);
        assert_eq!(cat.by_value(3), None);
    }

    #[test]
    fn specials_have_no_display_value() {
        let cat = Catalog::default();
        let total = MAX_EXPONENT as usize + 1 + Special::ALL.len();
        for id in 0..total as KindId {
            let def = cat.by_kind(id).unwrap();
            assert_eq!(def.kind.id(), id);
            assert_eq!(def.kind.value().is_none(), def.kind.special().is_some());
        }
    }

    #[test]
    fn ids_follow_table_order() {
        let cat = Catalog::default();
        assert_eq!(cat.by_kind(0).unwrap().kind, BlockKind::Number(0));
        assert_eq!(cat.by_kind(8).unwrap().kind.value(), Some(256));
        assert_eq!(cat.by_kind(9).unwrap().kind, BlockKind::Special(Special::Bug));
        assert_eq!(cat.by_kind(16).unwrap().kind, BlockKind::Special(Special::Blaster));
        assert!(cat.by_kind(17).is_none());
    }

    #[test]
    fn unknown_id_falls_back_to_lowest() {
        let cat = Catalog::default();
        assert_eq!(cat.kind_or_lowest(200), BlockKind::LOWEST);
        assert_eq!(cat.kind_or_lowest(12), BlockKind::Special(Special::Bomb));
    }

    #[test]
    fn disabled_specials_are_excluded() {
        let cat = Catalog::with_disabled(&[Special::Nuke, Special::Bug]);
        let enabled = cat.all_enabled_specials();
        assert_eq!(enabled.len(), 6);
        assert!(!enabled.contains(&Special::Nuke));
        assert!(!enabled.contains(&Special::Bug));
        assert!(Catalog::numeric_only().all_enabled_specials().is_empty());
    }
}
