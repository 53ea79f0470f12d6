/// Tile types and their properties.
/// Layer membership is queried via methods, not stored as flags,
/// so tile semantics are centralized here.

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub enum Tile {
    #[default]
    Floor,
    Wall,
    WrapPortal,  // Teleport tile; paired at load time
    Bridge,      // Upper-plane crossing with a fixed orientation
    Gate,        // Directional switch; open axis toggles over time
    TunnelPath,  // Lower-plane corridor beneath a bridge
}

/// The two planes an agent can occupy.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub enum Layer {
    #[default]
    Upper,
    Lower,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Axis {
    Horizontal,
    Vertical,
}

impl Axis {
    pub fn other(self) -> Axis {
        match self {
            Axis::Horizontal => Axis::Vertical,
            Axis::Vertical => Axis::Horizontal,
        }
    }
}

impl Tile {
    /// Blocks both layers unconditionally.
    pub fn is_wall(self) -> bool {
        matches!(self, Tile::Wall)
    }

    pub fn is_portal(self) -> bool {
        matches!(self, Tile::WrapPortal)
    }

    /// Static layer membership. Tunnel mouths are a property of the
    /// neighbourhood, so `Maze::exists_on` widens this for them.
    pub fn exists_on(self, layer: Layer) -> bool {
        match self {
            Tile::Wall => false,
            Tile::WrapPortal => true,
            Tile::TunnelPath => layer == Layer::Lower,
            Tile::Floor | Tile::Bridge | Tile::Gate => layer == Layer::Upper,
        }
    }

    /// Tiles that are seeded with a dot at level start.
    pub fn holds_dot(self) -> bool {
        matches!(self, Tile::Floor | Tile::Bridge | Tile::Gate)
    }

    /// Parse a level-file glyph. Spawn markers sit on floor.
    pub fn from_glyph(ch: char) -> Option<Tile> {
        match ch {
            '#' => Some(Tile::Wall),
            '.' | ' ' | 'P' | 'U' => Some(Tile::Floor),
            'o' => Some(Tile::WrapPortal),
            '=' => Some(Tile::Bridge),
            '+' => Some(Tile::Gate),
            't' => Some(Tile::TunnelPath),
            _ => None,
        }
    }

    pub fn glyph(self) -> char {
        match self {
            Tile::Floor => '.',
            Tile::Wall => '#',
            Tile::WrapPortal => 'o',
            Tile::Bridge => '=',
            Tile::Gate => '+',
            Tile::TunnelPath => 't',
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layer_membership() {
        assert!(Tile::Floor.exists_on(Layer::Upper));
        assert!(!Tile::Floor.exists_on(Layer::Lower));
        assert!(Tile::TunnelPath.exists_on(Layer::Lower));
        assert!(!Tile::TunnelPath.exists_on(Layer::Upper));
        // Portals straddle both planes
        assert!(Tile::WrapPortal.exists_on(Layer::Upper));
        assert!(Tile::WrapPortal.exists_on(Layer::Lower));
        // Walls exist nowhere
        assert!(!Tile::Wall.exists_on(Layer::Upper));
        assert!(!Tile::Wall.exists_on(Layer::Lower));
    }

    #[test]
    fn glyph_roundtrip_for_every_tile() {
        for t in [Tile::Floor, Tile::Wall, Tile::WrapPortal, Tile::Bridge, Tile::Gate, Tile::TunnelPath] {
            assert_eq!(Tile::from_glyph(t.glyph()), Some(t));
        }
        assert_eq!(Tile::from_glyph('P'), Some(Tile::Floor));
        assert_eq!(Tile::from_glyph('?'), None);
    }

    #[test]
    fn dots_only_on_walkable_upper_tiles() {
        assert!(Tile::Floor.holds_dot());
        assert!(Tile::Bridge.holds_dot());
        assert!(Tile::Gate.holds_dot());
        assert!(!Tile::WrapPortal.holds_dot());
        assert!(!Tile::TunnelPath.holds_dot());
    }
}
