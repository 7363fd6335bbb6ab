use std::collections::HashMap;

use std::cmp::Ordering;

use crate::error::PortError;
use crate::port::Port;

/// Screen cell categories emitted by the arcade cabinet program.
///
/// Ids the cabinet does not define are kept as `Other` so the screen
/// records exactly what the program painted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tile {
    Empty,
    Wall,
    Block,
    Paddle,
    Ball,
    Other(i64),
}

impl Tile {
    pub fn glyph(self) -> char {
        match self {
            Tile::Empty => ' ',
            Tile::Wall => '#',
            Tile::Block => '%',
            Tile::Paddle => '=',
            Tile::Ball => 'o',
            Tile::Other(_) => '?',
        }
    }
}

impl From<i64> for Tile {
    fn from(id: i64) -> Self {
        match id {
            0 => Tile::Empty,
            1 => Tile::Wall,
            2 => Tile::Block,
            3 => Tile::Paddle,
            4 => Tile::Ball,
            other => Tile::Other(other),
        }
    }
}

/// Stateful port for the arcade cabinet.
///
/// Every three outputs form an `(x, y, value)` triple. `(-1, 0, n)` sets the
/// score; any other triple paints a tile on a sparse screen. Each input is
/// a joystick direction steering the paddle's horizontal center toward the
/// ball's.
#[derive(Debug, Clone, Default)]
pub struct Arcade {
    screen: HashMap<(i64, i64), Tile>,
    score: Option<i64>,
    pending: [i64; 3],
    filled: usize,
}

impl Arcade {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn score(&self) -> Option<i64> {
        self.score
    }

    pub fn tile(&self, x: i64, y: i64) -> Tile {
        self.screen.get(&(x, y)).copied().unwrap_or(Tile::Empty)
    }

    pub fn block_count(&self) -> usize {
        self.screen.values().filter(|&&t| t == Tile::Block).count()
    }

    /// Midpoint of the horizontal extent of all cells showing `tile`.
    fn center(&self, tile: Tile) -> Option<i64> {
        let (lo, hi) = self
            .screen
            .iter()
            .filter(|&(_, &t)| t == tile)
            .map(|(&(x, _), _)| x)
            .fold(None::<(i64, i64)>, |acc, x| match acc {
                None => Some((x, x)),
                Some((lo, hi)) => Some((x.min(lo), x.max(hi))),
            })?;
        // Widened so extreme coordinates cannot overflow; truncates toward zero.
        Some(((i128::from(lo) + i128::from(hi)) / 2) as i64)
    }

    /// -1 (left), 0 (neutral) or +1 (right).
    pub fn joystick(&self) -> i64 {
        match (self.center(Tile::Ball), self.center(Tile::Paddle)) {
            (Some(ball), Some(paddle)) => match ball.cmp(&paddle) {
                Ordering::Less => -1,
                Ordering::Equal => 0,
                Ordering::Greater => 1,
            },
            _ => 0,
        }
    }

    /// Draw the painted area of the screen, one text row per `y`.
    pub fn render(&self) -> String {
        let bounds = self
            .screen
            .keys()
            .fold(None::<(i64, i64, i64, i64)>, |acc, &(x, y)| {
                Some(match acc {
                    None => (x, x, y, y),
                    Some((ax, bx, ay, by)) => (ax.min(x), bx.max(x), ay.min(y), by.max(y)),
                })
            });
        let Some((min_x, max_x, min_y, max_y)) = bounds else {
            return String::new();
        };
        let mut out = String::new();
        for y in min_y..=max_y {
            let row: String = (min_x..=max_x).map(|x| self.tile(x, y).glyph()).collect();
            out.push_str(row.trim_end());
            out.push('\n');
        }
        out
    }
}

impl Port for Arcade {
    fn input(&mut self) -> Result<i64, PortError> {
        Ok(self.joystick())
    }

    fn output(&mut self, value: i64) -> Result<(), PortError> {
        self.pending[self.filled] = value;
        self.filled += 1;
        if self.filled < 3 {
            return Ok(());
        }
        self.filled = 0;

        let [x, y, value] = self.pending;
        if x == -1 && y == 0 {
            self.score = Some(value);
        } else {
            self.screen.insert((x, y), Tile::from(value));
        }
        Ok(())
    }
}
