use crate::collision::Aabb;
use crate::math::Vec3;
use crate::{BLOCK_SIZE, BULLET_BOUNDS_SLACK};
use std::time::{Duration, Instant};

/// One foreground block. Only foreground geometry collides; decoration
/// lives entirely on the client and never reaches the simulation.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub aabb: Aabb,
    pub jumppad: bool,
}

impl Block {
    pub fn new(center: Vec3, size: Vec3) -> Self {
        Block {
            aabb: Aabb::from_center_size(center, size),
            jumppad: false,
        }
    }

    /// Standard block-sized tile with its lower-left corner on the grid.
    pub fn tile(col: i32, row: i32) -> Self {
        let center = Vec3::new(
            (col as f32 + 0.5) * BLOCK_SIZE,
            (row as f32 + 0.5) * BLOCK_SIZE,
            0.0,
        );
        Block::new(center, Vec3::new(BLOCK_SIZE, BLOCK_SIZE, BLOCK_SIZE))
    }

    pub fn jumppad_tile(col: i32, row: i32) -> Self {
        let mut block = Block::tile(col, row);
        block.jumppad = true;
        block
    }
}

/// Where players may (re)appear. A team restriction only applies in
/// team-based modes; deathmatch treats every point as shared.
#[derive(Debug, Clone, PartialEq)]
pub struct SpawnPoint {
    pub position: Vec3,
    pub team: Option<u8>,
}

impl SpawnPoint {
    pub fn new(x: f32, y: f32) -> Self {
        SpawnPoint {
            position: Vec3::new(x, y, 0.0),
            team: None,
        }
    }

    pub fn for_team(x: f32, y: f32, team: u8) -> Self {
        SpawnPoint {
            position: Vec3::new(x, y, 0.0),
            team: Some(team),
        }
    }
}

pub const ITEM_SIZE: f32 = 0.6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapItemKind {
    HealthPack,
    ArmorVest,
    WeaponCrate,
    PowerCell,
}

impl MapItemKind {
    pub fn respawn_delay(&self) -> Duration {
        match self {
            MapItemKind::HealthPack => Duration::from_secs(10),
            MapItemKind::ArmorVest => Duration::from_secs(20),
            MapItemKind::WeaponCrate => Duration::from_secs(30),
            MapItemKind::PowerCell => Duration::from_secs(25),
        }
    }
}

/// A collectible placed on the map. Taken items leave a timed gap and
/// come back on their own.
#[derive(Debug, Clone, PartialEq)]
pub struct MapItem {
    pub id: u16,
    pub kind: MapItemKind,
    pub position: Vec3,
    pub taken: bool,
    taken_at: Option<Instant>,
}

impl MapItem {
    pub fn new(id: u16, kind: MapItemKind, x: f32, y: f32) -> Self {
        MapItem {
            id,
            kind,
            position: Vec3::new(x, y, 0.0),
            taken: false,
            taken_at: None,
        }
    }

    pub fn aabb(&self) -> Aabb {
        Aabb::from_center_size(self.position, Vec3::new(ITEM_SIZE, ITEM_SIZE, ITEM_SIZE))
    }

    pub fn take(&mut self, now: Instant) {
        self.taken = true;
        self.taken_at = Some(now);
    }

    pub fn ready_to_respawn(&self, now: Instant) -> bool {
        match self.taken_at {
            Some(at) => self.taken && now.duration_since(at) >= self.kind.respawn_delay(),
            None => false,
        }
    }

    pub fn respawn(&mut self) {
        self.taken = false;
        self.taken_at = None;
    }
}

/// Spawn placement preference used when several points qualify.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnPolicy {
    Random,
    Leftmost,
    Rightmost,
}

/// Static world geometry plus the mutable item layer.
#[derive(Debug, Clone)]
pub struct Map {
    pub name: String,
    pub blocks: Vec<Block>,
    pub spawn_points: Vec<SpawnPoint>,
    pub items: Vec<MapItem>,
    bounds: Aabb,
}

impl Map {
    pub fn from_parts(
        name: &str,
        blocks: Vec<Block>,
        spawn_points: Vec<SpawnPoint>,
        items: Vec<MapItem>,
    ) -> Self {
        let mut bounds = match blocks.first() {
            Some(block) => block.aabb,
            None => Aabb::new(Vec3::ZERO, Vec3::ZERO),
        };
        for block in &blocks {
            bounds = bounds.union(&block.aabb);
        }
        Map {
            name: name.to_string(),
            blocks,
            spawn_points,
            items,
            bounds,
        }
    }

    pub fn bounds(&self) -> Aabb {
        self.bounds
    }

    /// Lowest point of the world geometry. Falling well below this is
    /// lethal.
    pub fn bottom(&self) -> f32 {
        self.bounds.min.y
    }

    /// Play area relaxed by a few block widths; bullets live until they
    /// leave this larger box.
    pub fn bullet_bounds(&self) -> Aabb {
        self.bounds.grown(BULLET_BOUNDS_SLACK)
    }

    pub fn item(&self, id: u16) -> Option<&MapItem> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn item_mut(&mut self, id: u16) -> Option<&mut MapItem> {
        self.items.iter_mut().find(|item| item.id == id)
    }

    /// Spawn points usable by `team`, falling back to the full list when
    /// no team restriction matches.
    pub fn spawns_for_team(&self, team: Option<u8>) -> Vec<&SpawnPoint> {
        let matching: Vec<&SpawnPoint> = self
            .spawn_points
            .iter()
            .filter(|point| match (point.team, team) {
                (Some(required), Some(actual)) => required == actual,
                (Some(_), None) => false,
                (None, _) => true,
            })
            .collect();
        if matching.is_empty() {
            self.spawn_points.iter().collect()
        } else {
            matching
        }
    }

    /// A small symmetric arena used by the binaries and tests: a ground
    /// row with raised side platforms, one jumppad, and the four item
    /// kinds spread across the floor.
    pub fn demo_arena() -> Map {
        let mut blocks = Vec::new();
        for col in 0..24 {
            if col == 12 {
                blocks.push(Block::jumppad_tile(col, 0));
            } else {
                blocks.push(Block::tile(col, 0));
            }
        }
        // Side walls, two blocks high.
        for row in 1..=2 {
            blocks.push(Block::tile(0, row));
            blocks.push(Block::tile(23, row));
        }
        // Raised platforms.
        for col in 4..=6 {
            blocks.push(Block::tile(col, 3));
        }
        for col in 17..=19 {
            blocks.push(Block::tile(col, 3));
        }

        let spawn_points = vec![
            SpawnPoint::new(2.5, 2.0),
            SpawnPoint::new(12.0, 2.0),
            SpawnPoint::new(21.5, 2.0),
            SpawnPoint::for_team(5.0, 5.0, 1),
            SpawnPoint::for_team(18.0, 5.0, 2),
        ];

        let items = vec![
            MapItem::new(0, MapItemKind::HealthPack, 5.0, 4.5),
            MapItem::new(1, MapItemKind::ArmorVest, 18.0, 4.5),
            MapItem::new(2, MapItemKind::WeaponCrate, 8.0, 1.5),
            MapItem::new(3, MapItemKind::PowerCell, 16.0, 1.5),
        ];

        Map::from_parts("arena.map", blocks, spawn_points, items)
    }
}
