//! Chart grid: one lazily created rendering surface per tracked coin.
//!
//! Surfaces are kept in a map keyed by coin id with three transitions:
//! `sync` creates missing surfaces (container present and history non-empty)
//! or replaces the series of existing ones, `resize_all` re-sizes every
//! surface, and `destroy_all` drops everything so the next `sync` rebuilds.
//! Any change to the tracked ids or the grid geometry goes through
//! `destroy_all`.

use crate::coin::CoinRecord;
use crate::config;
use crate::error::SurfaceError;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Drawable area reserved for one grid slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Container {
    pub width: u16,
    pub height: u16,
}

pub trait ChartSurface {
    /// Replaces the whole line series.
    fn set_data(&mut self, points: Vec<(f64, f64)>);
    fn resize(&mut self, width: u16, height: u16);
}

pub trait SurfaceFactory {
    type Surface: ChartSurface;

    fn create(
        &mut self,
        coin_id: &str,
        width: u16,
        height: u16,
        points: Vec<(f64, f64)>,
    ) -> Result<Self::Surface, SurfaceError>;
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub created: Vec<String>,
    pub updated: Vec<String>,
    pub failed: Vec<String>,
}

pub struct ChartSurfaceManager<F: SurfaceFactory> {
    factory: F,
    /// `None` sizes surfaces to the container height.
    fixed_height: Option<u16>,
    surfaces: HashMap<String, F::Surface>,
    failed: HashMap<String, Container>,
    error: Option<String>,
}

impl<F: SurfaceFactory> ChartSurfaceManager<F> {
    pub fn new(factory: F, fixed_height: Option<u16>) -> Self {
        Self {
            factory,
            fixed_height,
            surfaces: HashMap::new(),
            failed: HashMap::new(),
            error: None,
        }
    }

    pub fn surface(&self, coin_id: &str) -> Option<&F::Surface> {
        self.surfaces.get(coin_id)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.surfaces.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.surfaces.is_empty()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Hides the banner. Failed slots stay failed until their container
    /// changes.
    pub fn dismiss_error(&mut self) {
        self.error = None;
    }

    #[cfg(test)]
    pub fn factory(&self) -> &F {
        &self.factory
    }

    fn height_for(&self, container: Container) -> u16 {
        self.fixed_height.unwrap_or(container.height)
    }

    /// `containers[i]` is the container for `tracked[i]`, if that slot is on
    /// screen. Records are looked up by id in `coins`.
    pub fn sync(
        &mut self,
        tracked: &[String],
        coins: &[CoinRecord],
        containers: &[Option<Container>],
    ) -> SyncReport {
        let mut report = SyncReport::default();
        self.surfaces.retain(|id, _| tracked.contains(id));

        for (index, coin_id) in tracked.iter().enumerate() {
            let Some(coin) = coins.iter().find(|c| &c.id == coin_id) else {
                continue;
            };
            if !coin.has_history() {
                continue;
            }

            if let Some(surface) = self.surfaces.get_mut(coin_id) {
                surface.set_data(coin.series());
                report.updated.push(coin_id.clone());
                continue;
            }

            let Some(container) = containers.get(index).copied().flatten() else {
                continue;
            };
            if self.failed.get(coin_id) == Some(&container) {
                continue;
            }

            let height = self.height_for(container);
            match self.factory.create(coin_id, container.width, height, coin.series()) {
                Ok(surface) => {
                    debug!("Created chart surface for {} ({}x{})", coin_id, container.width, height);
                    self.failed.remove(coin_id);
                    self.surfaces.insert(coin_id.clone(), surface);
                    report.created.push(coin_id.clone());
                }
                Err(err) => {
                    warn!("Error initializing chart for {}: {}", coin_id, err);
                    self.failed.insert(coin_id.clone(), container);
                    report.failed.push(err.coin_id().to_string());
                }
            }
        }

        if !report.failed.is_empty() {
            self.error = Some(format!("Failed to initialize chart for {}", report.failed.join(", ")));
        }
        report
    }

    pub fn resize_all(&mut self, tracked: &[String], containers: &[Option<Container>]) {
        for (index, coin_id) in tracked.iter().enumerate() {
            let Some(container) = containers.get(index).copied().flatten() else {
                continue;
            };
            let height = self.height_for(container);
            if let Some(surface) = self.surfaces.get_mut(coin_id) {
                surface.resize(container.width, height);
            }
        }
    }

    pub fn destroy_all(&mut self) {
        if !self.surfaces.is_empty() {
            info!("Destroying {} chart surfaces", self.surfaces.len());
        }
        self.surfaces.clear();
        self.failed.clear();
        self.error = None;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GridConfig {
    pub rows: u16,
    pub cols: u16,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            rows: config::DEFAULT_GRID_ROWS,
            cols: config::DEFAULT_GRID_COLS,
        }
    }
}

impl GridConfig {
    pub fn slots(&self) -> usize {
        self.rows as usize * self.cols as usize
    }
}

/// The chart grid view: which coins are charted, in what geometry, and their
/// surfaces.
pub struct ChartGrid<F: SurfaceFactory> {
    tracked: Vec<String>,
    grid: GridConfig,
    manager: ChartSurfaceManager<F>,
}

impl<F: SurfaceFactory> ChartGrid<F> {
    pub fn new(tracked: Vec<String>, manager: ChartSurfaceManager<F>) -> Self {
        Self {
            tracked,
            grid: GridConfig::default(),
            manager,
        }
    }

    pub fn tracked(&self) -> &[String] {
        &self.tracked
    }

    pub fn grid(&self) -> GridConfig {
        self.grid
    }

    pub fn manager(&self) -> &ChartSurfaceManager<F> {
        &self.manager
    }

    pub fn manager_mut(&mut self) -> &mut ChartSurfaceManager<F> {
        &mut self.manager
    }

    /// The first registry coin that is not charted yet, if any.
    pub fn next_candidate<'a>(&self, coins: &'a [CoinRecord]) -> Option<&'a CoinRecord> {
        coins.iter().find(|c| !self.tracked.contains(&c.id))
    }

    pub fn can_add_chart(&self, coins: &[CoinRecord]) -> bool {
        self.next_candidate(coins).is_some()
    }

    /// Appends the first untracked coin. No-op when every coin is tracked.
    pub fn add_chart(&mut self, coins: &[CoinRecord]) -> Option<String> {
        let id = self.next_candidate(coins)?.id.clone();
        info!("Adding chart for {}", id);
        self.tracked.push(id.clone());
        self.manager.destroy_all();
        Some(id)
    }

    pub fn set_grid(&mut self, rows: u16, cols: u16) {
        let next = GridConfig {
            rows: rows.clamp(1, config::MAX_GRID_DIM),
            cols: cols.clamp(1, config::MAX_GRID_DIM),
        };
        if next != self.grid {
            info!("Grid reconfigured to {}x{}", next.rows, next.cols);
            self.grid = next;
            self.manager.destroy_all();
        }
    }

    pub fn sync(&mut self, coins: &[CoinRecord], containers: &[Option<Container>]) -> SyncReport {
        self.manager.sync(&self.tracked, coins, containers)
    }

    pub fn resize(&mut self, containers: &[Option<Container>]) {
        self.manager.resize_all(&self.tracked, containers);
    }

    pub fn teardown(&mut self) {
        self.manager.destroy_all();
    }
}

/// Surface drawn by the terminal renderer: the series plus its axis bounds.
#[derive(Clone, Debug, PartialEq)]
pub struct TerminalSurface {
    pub width: u16,
    pub height: u16,
    points: Vec<(f64, f64)>,
    x_bounds: [f64; 2],
    y_bounds: [f64; 2],
}

impl TerminalSurface {
    fn new(width: u16, height: u16, points: Vec<(f64, f64)>) -> Self {
        let mut surface = Self {
            width,
            height,
            points: Vec::new(),
            x_bounds: [0.0, 1.0],
            y_bounds: [0.0, 1.0],
        };
        surface.set_data(points);
        surface
    }

    pub fn points(&self) -> &[(f64, f64)] {
        &self.points
    }

    pub fn x_bounds(&self) -> [f64; 2] {
        self.x_bounds
    }

    pub fn y_bounds(&self) -> [f64; 2] {
        self.y_bounds
    }
}

impl ChartSurface for TerminalSurface {
    fn set_data(&mut self, points: Vec<(f64, f64)>) {
        let (min_x, max_x) = points
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| (lo.min(p.0), hi.max(p.0)));
        let (min_y, max_y) = points
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| (lo.min(p.1), hi.max(p.1)));

        if min_x.is_finite() && max_x.is_finite() {
            self.x_bounds = if max_x > min_x { [min_x, max_x] } else { [min_x - 1.0, max_x + 1.0] };
        }
        if min_y.is_finite() && max_y.is_finite() {
            let pad = ((max_y - min_y) * 0.05).max(max_y.abs() * 1e-3).max(f64::EPSILON);
            self.y_bounds = [min_y - pad, max_y + pad];
        }
        self.points = points;
    }

    fn resize(&mut self, width: u16, height: u16) {
        self.width = width;
        self.height = height;
    }
}

#[derive(Debug, Default)]
pub struct TerminalSurfaceFactory;

impl SurfaceFactory for TerminalSurfaceFactory {
    type Surface = TerminalSurface;

    fn create(
        &mut self,
        coin_id: &str,
        width: u16,
        height: u16,
        points: Vec<(f64, f64)>,
    ) -> Result<TerminalSurface, SurfaceError> {
        if width < 2 || height < 2 {
            return Err(SurfaceError::EmptyContainer {
                coin_id: coin_id.to_string(),
                width,
                height,
            });
        }
        if points.iter().any(|(x, y)| !x.is_finite() || !y.is_finite()) {
            return Err(SurfaceError::Backend {
                coin_id: coin_id.to_string(),
                reason: "series contains a non-finite point".to_string(),
            });
        }
        Ok(TerminalSurface::new(width, height, points))
    }
}
