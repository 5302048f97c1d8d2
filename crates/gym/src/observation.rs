use nes::{PixelFrame, TileGrid};
use serde::{Deserialize, Serialize};

/// Which view of the screen a session hands back.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObservationMode {
    /// `224 x 256 x 3` RGB bytes.
    #[default]
    Pixels,
    /// `13 x 16` symbolic grid, values `0..=3`.
    Tiles,
}

impl ObservationMode {
    #[must_use]
    pub fn shape(self) -> Vec<usize> {
        match self {
            ObservationMode::Pixels => PixelFrame::SHAPE.to_vec(),
            ObservationMode::Tiles => TileGrid::SHAPE.to_vec(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    Pixels(PixelFrame),
    Tiles(TileGrid),
}

impl Observation {
    #[must_use]
    pub fn mode(&self) -> ObservationMode {
        match self {
            Observation::Pixels(_) => ObservationMode::Pixels,
            Observation::Tiles(_) => ObservationMode::Tiles,
        }
    }

    #[must_use]
    pub fn shape(&self) -> Vec<usize> {
        self.mode().shape()
    }

    #[must_use]
    pub fn as_pixels(&self) -> Option<&PixelFrame> {
        match self {
            Observation::Pixels(frame) => Some(frame),
            Observation::Tiles(_) => None,
        }
    }

    #[must_use]
    pub fn as_tiles(&self) -> Option<&TileGrid> {
        match self {
            Observation::Tiles(grid) => Some(grid),
            Observation::Pixels(_) => None,
        }
    }

    /// Flattened row-major values, `shape().iter().product()` long.
    #[must_use]
    pub fn to_vec(&self) -> Vec<u8> {
        match self {
            Observation::Pixels(frame) => frame.as_bytes().to_vec(),
            Observation::Tiles(grid) => grid.to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flattened_length_matches_shape() {
        for obs in [Observation::Pixels(PixelFrame::default()), Observation::Tiles(TileGrid::default())] {
            assert_eq!(obs.to_vec().len(), obs.shape().iter().product::<usize>());
        }
        assert_eq!(ObservationMode::Pixels.shape(), vec![224, 256, 3]);
        assert_eq!(ObservationMode::Tiles.shape(), vec![13, 16]);
    }
}
