//! Long-term mean of seasonal composites.

use tracing::debug;

use crate::{
    error::ConfigError,
    expr::{Image, ImageCollection},
    geometry::Geometry,
};

/// Per-pixel mean of `composites`, restricted to `region`.
///
/// Pixels that are no-data in some composites average over the remaining
/// ones; a pixel that is no-data in every composite stays no-data.
pub fn climatology(composites: Vec<Image>, region: &Geometry) -> Result<Image, ConfigError> {
    if composites.is_empty() {
        return Err(ConfigError::NoComposites);
    }
    debug!(composites = composites.len(), "climatology");

    Ok(ImageCollection::from_images(composites).mean().clip(region))
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod test {
    use chrono::NaiveDate;

    use super::*;
    use crate::{
        backend::{
            local::{
                test_support::{constant_collection, frame, grid},
                Frame,
            },
            Backend, LocalBackend,
        },
        raster::Raster,
        season::{seasonal_composites, MonthDay, SeasonWindow, YearRange},
    };

    const ID: &str = "daily";

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn whole_year() -> SeasonWindow {
        SeasonWindow::new(MonthDay::new(1, 1).unwrap(), MonthDay::new(1, 1).unwrap())
    }

    fn boundary() -> Geometry {
        Geometry::rectangle(0.0, 0.0, 2.0, 2.0)
    }

    async fn evaluate(frames: Vec<Frame>, years: YearRange, window: &SeasonWindow) -> Raster {
        let backend = LocalBackend::new().with_collection(ID, grid(), frames);
        let composites =
            seasonal_composites(&ImageCollection::load(ID), years, window).unwrap();
        let image = climatology(composites, &boundary()).unwrap();

        backend.compute(&image).await.unwrap()
    }

    #[tokio::test]
    async fn should_average_three_constant_years_inside_boundary() {
        let (_, frames) = constant_collection(&[(2001, 10.0), (2002, 20.0), (2003, 30.0)]);

        let raster = evaluate(frames, YearRange::new(2001, 2003).unwrap(), &whole_year()).await;

        assert_eq!(raster.get(0.5, 0.5), Some(20.0));
        assert_eq!(raster.get(1.5, 1.5), Some(20.0));
        assert_eq!(raster.get(2.5, 0.5), None);
        assert_eq!(raster.get(3.5, 3.5), None);
        let summary = raster.summary();
        assert_eq!(summary.defined, 4);
        assert_eq!(summary.min, Some(20.0));
        assert_eq!(summary.max, Some(20.0));
    }

    #[tokio::test]
    async fn should_exclude_no_data_from_mean() {
        let mut values = vec![Some(10.0); grid().len()];
        values[grid().index_of(0.5, 0.5).unwrap()] = None;
        let frames = vec![
            Frame::new(date(2001, 3, 15), Raster::from_values(grid(), values).unwrap()),
            frame(date(2002, 3, 15), 30.0),
        ];

        let raster = evaluate(frames, YearRange::new(2001, 2002).unwrap(), &whole_year()).await;

        assert_eq!(raster.get(0.5, 0.5), Some(30.0));
        assert_eq!(raster.get(1.5, 0.5), Some(20.0));
    }

    #[tokio::test]
    async fn should_ignore_frames_outside_season() {
        let years = YearRange::new(2001, 2002).unwrap();
        let (_, frames) = constant_collection(&[(2001, 10.0), (2002, 20.0)]);
        let baseline = evaluate(frames.clone(), years, &SeasonWindow::mam()).await;

        let mut with_extra = frames;
        with_extra.push(frame(date(2001, 7, 1), 1000.0));
        with_extra.push(frame(date(2002, 2, 28), 1000.0));
        let changed = evaluate(with_extra, years, &SeasonWindow::mam()).await;

        assert_eq!(baseline, changed);
        assert_eq!(changed.get(0.5, 0.5), Some(15.0));
    }

    #[tokio::test]
    async fn should_clip_idempotently() {
        let (_, frames) = constant_collection(&[(2001, 10.0)]);
        let backend = LocalBackend::new().with_collection(ID, grid(), frames);
        let composites = seasonal_composites(
            &ImageCollection::load(ID),
            YearRange::new(2001, 2001).unwrap(),
            &whole_year(),
        )
        .unwrap();

        let once = climatology(composites, &boundary()).unwrap();
        let twice = once.clip(&boundary());

        assert_eq!(
            backend.compute(&once).await.unwrap(),
            backend.compute(&twice).await.unwrap()
        );
    }

    #[test]
    fn should_reject_empty_composites() {
        assert_eq!(
            climatology(Vec::new(), &boundary()),
            Err(ConfigError::NoComposites)
        );
    }
}
