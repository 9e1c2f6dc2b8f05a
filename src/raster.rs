//! Gridded scalar rasters with explicit no-data.

use crate::{
    error::BackendError,
    geometry::{BoundingBox, Geometry},
};

/// A regular lon/lat grid. `origin` is the centre of the top-left pixel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Grid {
    pub origin_lon: f64,
    pub origin_lat: f64,
    /// Pixel size in degrees.
    pub cell: f64,
    pub width: usize,
    pub height: usize,
}

impl Grid {
    pub fn len(&self) -> usize {
        self.width * self.height
    }

    /// Centre of the pixel at `index` (row-major, north to south).
    pub fn pixel_center(&self, index: usize) -> (f64, f64) {
        let row = index / self.width;
        let col = index % self.width;
        (
            self.origin_lon + col as f64 * self.cell,
            self.origin_lat - row as f64 * self.cell,
        )
    }

    pub fn index_of(&self, lon: f64, lat: f64) -> Option<usize> {
        let col = ((lon - self.origin_lon) / self.cell).round();
        let row = ((self.origin_lat - lat) / self.cell).round();
        if col < 0.0 || row < 0.0 {
            return None;
        }
        let (col, row) = (col as usize, row as usize);
        if col >= self.width || row >= self.height {
            return None;
        }

        Some(row * self.width + col)
    }

    /// Outer edges of the grid, including half a pixel around the centres.
    pub fn footprint(&self) -> BoundingBox {
        let half = self.cell / 2.0;
        BoundingBox {
            min_lon: self.origin_lon - half,
            max_lon: self.origin_lon + (self.width as f64 - 1.0) * self.cell + half,
            max_lat: self.origin_lat + half,
            min_lat: self.origin_lat - (self.height as f64 - 1.0) * self.cell - half,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    pub grid: Grid,
    pub values: Vec<Option<f32>>,
}

impl Raster {
    #[cfg(test)]
    pub fn filled(grid: Grid, value: Option<f32>) -> Self {
        Raster {
            grid,
            values: vec![value; grid.len()],
        }
    }

    pub fn from_values(grid: Grid, values: Vec<Option<f32>>) -> Result<Self, BackendError> {
        if values.len() != grid.len() {
            return Err(BackendError::Malformed(format!(
                "raster has {} values for a {}x{} grid",
                values.len(),
                grid.width,
                grid.height
            )));
        }

        Ok(Raster { grid, values })
    }

    pub fn get(&self, lon: f64, lat: f64) -> Option<f32> {
        self.grid.index_of(lon, lat).and_then(|i| self.values[i])
    }

    /// Pixel-wise sum of defined values; no-data where no input is defined.
    pub fn sum(grid: Grid, inputs: &[&Raster]) -> Result<Raster, BackendError> {
        Self::reduce(grid, inputs, |sum, _| sum)
    }

    /// Pixel-wise mean of defined values; no-data where no input is defined.
    pub fn mean(grid: Grid, inputs: &[&Raster]) -> Result<Raster, BackendError> {
        Self::reduce(grid, inputs, |sum, count| sum / count as f64)
    }

    fn reduce(
        grid: Grid,
        inputs: &[&Raster],
        finish: impl Fn(f64, usize) -> f64,
    ) -> Result<Raster, BackendError> {
        if inputs.iter().any(|r| r.grid != grid) {
            return Err(BackendError::GridMismatch);
        }

        let values = (0..grid.len())
            .map(|i| {
                let defined: Vec<f64> = inputs
                    .iter()
                    .filter_map(|r| r.values[i])
                    .map(f64::from)
                    .collect();
                match defined.len() {
                    0 => None,
                    n => Some(finish(defined.iter().sum(), n) as f32),
                }
            })
            .collect();

        Ok(Raster { grid, values })
    }

    /// Masks every pixel whose centre lies outside `geometry`.
    pub fn clip(&self, geometry: &Geometry) -> Raster {
        let values = self
            .values
            .iter()
            .enumerate()
            .map(|(i, v)| {
                let (lon, lat) = self.grid.pixel_center(i);
                v.filter(|_| geometry.contains(lon, lat))
            })
            .collect();

        Raster {
            grid: self.grid,
            values,
        }
    }

    pub fn summary(&self) -> RasterSummary {
        let defined: Vec<f32> = self.values.iter().flatten().copied().collect();
        let min = defined.iter().copied().reduce(f32::min);
        let max = defined.iter().copied().reduce(f32::max);
        let mean = match defined.len() {
            0 => None,
            n => Some(defined.iter().map(|v| f64::from(*v)).sum::<f64>() / n as f64),
        };

        RasterSummary {
            pixels: self.values.len(),
            defined: defined.len(),
            min,
            max,
            mean,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RasterSummary {
    pub pixels: usize,
    pub defined: usize,
    pub min: Option<f32>,
    pub max: Option<f32>,
    pub mean: Option<f64>,
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    fn grid() -> Grid {
        Grid {
            origin_lon: 0.5,
            origin_lat: 1.5,
            cell: 1.0,
            width: 2,
            height: 2,
        }
    }

    #[test]
    fn should_locate_pixels() {
        let g = grid();
        assert_eq!(g.pixel_center(0), (0.5, 1.5));
        assert_eq!(g.pixel_center(3), (1.5, 0.5));
        assert_eq!(g.index_of(1.5, 1.5), Some(1));
        assert_eq!(g.index_of(5.0, 0.5), None);

        let f = g.footprint();
        assert_eq!((f.min_lon, f.min_lat, f.max_lon, f.max_lat), (0.0, 0.0, 2.0, 2.0));
    }

    #[test]
    fn should_skip_nodata_in_mean() {
        let a = Raster::from_values(grid(), vec![Some(10.0), None, Some(1.0), None]).unwrap();
        let b = Raster::from_values(grid(), vec![Some(30.0), Some(4.0), None, None]).unwrap();

        let mean = Raster::mean(grid(), &[&a, &b]).unwrap();

        assert_eq!(mean.values, vec![Some(20.0), Some(4.0), Some(1.0), None]);
    }

    #[test]
    fn should_sum_defined_values() {
        let a = Raster::from_values(grid(), vec![Some(1.0), None, Some(2.0), None]).unwrap();
        let b = Raster::from_values(grid(), vec![Some(3.0), None, None, None]).unwrap();

        let sum = Raster::sum(grid(), &[&a, &b]).unwrap();

        assert_eq!(sum.values, vec![Some(4.0), None, Some(2.0), None]);
    }

    #[test]
    fn should_reject_mismatched_grids() {
        let mut other = grid();
        other.width = 4;
        let a = Raster::filled(other, Some(1.0));

        let result = Raster::mean(grid(), &[&a]);
        assert!(matches!(result, Err(BackendError::GridMismatch)));
    }

    #[test]
    fn should_clip_idempotently() {
        let raster = Raster::filled(grid(), Some(7.0));
        let left_half = Geometry::rectangle(0.0, 0.0, 1.0, 2.0);

        let once = raster.clip(&left_half);
        let twice = once.clip(&left_half);

        assert_eq!(once.values, vec![Some(7.0), None, Some(7.0), None]);
        assert_eq!(once, twice);
    }

    #[test]
    fn should_summarise_defined_pixels() {
        let r = Raster::from_values(grid(), vec![Some(2.0), Some(4.0), None, None]).unwrap();
        let s = r.summary();

        assert_eq!(s.pixels, 4);
        assert_eq!(s.defined, 2);
        assert_eq!(s.min, Some(2.0));
        assert_eq!(s.max, Some(4.0));
        assert_eq!(s.mean, Some(3.0));
    }
}
