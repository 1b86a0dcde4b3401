//! IDA* search over the coarse walkability grid.
//!
//! Screen pixels map onto cells of `cell_size` pixels. Every step, straight
//! or diagonal, costs 1, so `max(|dx|, |dy|) - 1` never overestimates.

use anyhow::{ensure, Result};
use glue_formats::WalkMap;
use log::debug;
use serde::{Deserialize, Serialize};

pub const DEFAULT_SCREEN_WIDTH: u32 = 640;
pub const DEFAULT_SCREEN_HEIGHT: u32 = 480;
pub const DEFAULT_CELL_SIZE: u32 = 10;
/// Tiles one search iteration may reach, as a multiple of the cell count.
pub const DEFAULT_EXPANSION_FACTOR: usize = 3;

/// Straight directions first, then diagonals.
const NEIGHBOUR_OFFSETS: [(i32, i32); 8] = [
    (0, -1),
    (1, 0),
    (0, 1),
    (-1, 0),
    (1, -1),
    (1, 1),
    (-1, 1),
    (-1, -1),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Point { x, y }
    }
}

enum Search {
    Found,
    /// Smallest f-cost that exceeded the bound, `u32::MAX` if none.
    Next(u32),
    Exhausted,
}

#[derive(Debug, Clone)]
pub struct Pathfinder {
    width: usize,
    height: usize,
    cell_size: u32,
    values: Vec<u8>,
    neighbours: Vec<Vec<usize>>,
    costs: Vec<u32>,
    expansion_factor: usize,
}

impl Default for Pathfinder {
    fn default() -> Self {
        Pathfinder::new(DEFAULT_SCREEN_WIDTH, DEFAULT_SCREEN_HEIGHT, DEFAULT_CELL_SIZE)
    }
}

impl Pathfinder {
    /// Grid with every cell unwalkable until a walk map is set.
    pub fn new(screen_width: u32, screen_height: u32, cell_size: u32) -> Self {
        let cell_size = cell_size.max(1);
        let width = (screen_width / cell_size).max(1) as usize;
        let height = (screen_height / cell_size).max(1) as usize;
        Pathfinder {
            width,
            height,
            cell_size,
            values: vec![0; width * height],
            neighbours: vec![Vec::new(); width * height],
            costs: vec![u32::MAX; width * height],
            expansion_factor: DEFAULT_EXPANSION_FACTOR,
        }
    }

    /// Caps each search iteration at `factor` first visits per cell.
    pub fn set_expansion_factor(&mut self, factor: usize) {
        self.expansion_factor = factor;
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn set_walk_map(&mut self, map: &WalkMap) -> Result<()> {
        ensure!(
            map.width() as usize == self.width && map.height() as usize == self.height,
            "walk map is {}x{} but the grid is {}x{}",
            map.width(),
            map.height(),
            self.width,
            self.height
        );
        for y in 0..self.height {
            for x in 0..self.width {
                self.values[y * self.width + x] = map.get(x as u16, y as u16).unwrap_or(0);
            }
        }
        self.rebuild_neighbours();
        debug!(
            "walk map set: {} of {} cells walkable",
            map.walkable_count(),
            self.values.len()
        );
        Ok(())
    }

    pub fn clear_walk_map(&mut self) {
        self.values.fill(0);
        self.rebuild_neighbours();
    }

    fn rebuild_neighbours(&mut self) {
        for y in 0..self.height {
            for x in 0..self.width {
                let index = y * self.width + x;
                let list = NEIGHBOUR_OFFSETS
                    .iter()
                    .filter_map(|(dx, dy)| self.index_of(x as i32 + dx, y as i32 + dy))
                    .filter(|&next| self.values[next] != 0)
                    .collect();
                self.neighbours[index] = list;
            }
        }
    }

    fn index_of(&self, cx: i32, cy: i32) -> Option<usize> {
        let in_bounds = (0..self.width as i32).contains(&cx) && (0..self.height as i32).contains(&cy);
        in_bounds.then(|| cy as usize * self.width + cx as usize)
    }

    fn cell_of(&self, point: Point) -> (i32, i32) {
        let size = self.cell_size as i32;
        (point.x.div_euclid(size), point.y.div_euclid(size))
    }

    fn cell_xy(&self, index: usize) -> (i32, i32) {
        ((index % self.width) as i32, (index / self.width) as i32)
    }

    fn cell_center(&self, index: usize) -> Point {
        let (cx, cy) = self.cell_xy(index);
        let size = self.cell_size as i32;
        Point::new(cx * size + size / 2, cy * size + size / 2)
    }

    pub fn is_walkable(&self, x: i32, y: i32) -> bool {
        let (cx, cy) = self.cell_of(Point::new(x, y));
        self.index_of(cx, cy)
            .is_some_and(|index| self.values[index] != 0)
    }

    fn estimate(&self, from: usize, to: usize) -> u32 {
        let (ax, ay) = self.cell_xy(from);
        let (bx, by) = self.cell_xy(to);
        let distance = (ax - bx).unsigned_abs().max((ay - by).unsigned_abs());
        distance.saturating_sub(1)
    }

    /// The cell itself when walkable, otherwise the walkable cell closest by
    /// squared distance (first in row-major order on ties).
    fn nearest_walkable(&self, cx: i32, cy: i32) -> Option<usize> {
        if let Some(index) = self.index_of(cx, cy) {
            if self.values[index] != 0 {
                return Some(index);
            }
        }
        let mut best: Option<(i64, usize)> = None;
        for (index, value) in self.values.iter().enumerate() {
            if *value == 0 {
                continue;
            }
            let (x, y) = self.cell_xy(index);
            let dx = i64::from(x - cx);
            let dy = i64::from(y - cy);
            let distance = dx * dx + dy * dy;
            if best.map_or(true, |(closest, _)| distance < closest) {
                best = Some((distance, index));
            }
        }
        best.map(|(_, index)| index)
    }

    /// Waypoints from `from` to `to`, beginning and ending with the exact
    /// input points, or `None` when the cells are not connected.
    pub fn find_path(&mut self, from: Point, to: Point) -> Option<Vec<Point>> {
        let (sx, sy) = self.cell_of(from);
        let (gx, gy) = self.cell_of(to);
        let start = self.nearest_walkable(sx, sy)?;
        let goal = self.nearest_walkable(gx, gy)?;
        if start == goal {
            return Some(vec![from, to]);
        }

        let mut bound = self.estimate(start, goal);
        let mut cells = vec![start];
        loop {
            let mut budget = self.expansion_factor.saturating_mul(self.values.len());
            self.costs.fill(u32::MAX);
            self.costs[start] = 0;
            match self.search(&mut cells, 0, bound, goal, &mut budget) {
                Search::Found => break,
                Search::Exhausted => {
                    debug!("path search gave up at bound {bound}");
                    return None;
                }
                Search::Next(u32::MAX) => return None,
                Search::Next(next) => bound = next,
            }
        }
        Some(self.simplify(&cells, from, to))
    }

    fn search(
        &mut self,
        cells: &mut Vec<usize>,
        g: u32,
        bound: u32,
        goal: usize,
        budget: &mut usize,
    ) -> Search {
        let Some(&node) = cells.last() else {
            return Search::Next(u32::MAX);
        };
        let f = g + self.estimate(node, goal);
        if f > bound {
            return Search::Next(f);
        }
        if node == goal {
            return Search::Found;
        }

        let mut min = u32::MAX;
        for slot in 0..self.neighbours[node].len() {
            let next = self.neighbours[node][slot];
            let cost = g + 1;
            if cost >= self.costs[next] {
                continue;
            }
            // Only the first visit of a tile in this iteration is charged.
            if self.costs[next] == u32::MAX {
                if *budget == 0 {
                    return Search::Exhausted;
                }
                *budget -= 1;
            }
            self.costs[next] = cost;
            cells.push(next);
            match self.search(cells, cost, bound, goal, budget) {
                Search::Found => return Search::Found,
                Search::Exhausted => return Search::Exhausted,
                Search::Next(t) => min = min.min(t),
            }
            cells.pop();
        }
        Search::Next(min)
    }

    /// Keeps only the cells where the direction changes and wraps them in the
    /// exact endpoints.
    fn simplify(&self, cells: &[usize], from: Point, to: Point) -> Vec<Point> {
        let step = |a: usize, b: usize| {
            let (ax, ay) = self.cell_xy(a);
            let (bx, by) = self.cell_xy(b);
            ((bx - ax).signum(), (by - ay).signum())
        };

        let mut kept = Vec::with_capacity(cells.len());
        for (i, &cell) in cells.iter().enumerate() {
            let turn = i == 0
                || i + 1 == cells.len()
                || step(cells[i - 1], cell) != step(cell, cells[i + 1]);
            if turn {
                kept.push(cell);
            }
        }

        let from_cell = self.cell_of(from);
        let to_cell = self.cell_of(to);
        if kept.first().is_some_and(|&cell| self.cell_xy(cell) == from_cell) {
            kept.remove(0);
        }
        if kept.last().is_some_and(|&cell| self.cell_xy(cell) == to_cell) {
            kept.pop();
        }

        let mut path = Vec::with_capacity(kept.len() + 2);
        path.push(from);
        path.extend(kept.into_iter().map(|cell| self.cell_center(cell)));
        path.push(to);
        path
    }
}
