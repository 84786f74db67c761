//! Worker job that fetches a tile and writes its rows as JSON lines.

use std::io::Write;

use osm_tiles_fetch::{DataFetcher, ReadRow};
use osm_tiles_relation::RelationGraphLookup;
use osm_tiles_tile::TileCoord;
use osm_tiles_worker::{JobError, JobProcessor};

/// Writes one JSON object per row.
///
/// # Errors
///
/// * If writing to `out` fails
pub fn write_rows<W: Write>(out: &mut W, rows: &[ReadRow]) -> std::io::Result<()> {
    for row in rows {
        serde_json::to_writer(&mut *out, row)?;
        writeln!(out)?;
    }
    out.flush()
}

pub struct FetchProcessor<'a, L, W> {
    fetcher: &'a DataFetcher<L>,
    out: W,
}

impl<'a, L, W> FetchProcessor<'a, L, W> {
    pub const fn new(fetcher: &'a DataFetcher<L>, out: W) -> Self {
        Self { fetcher, out }
    }
}

impl<L: RelationGraphLookup, W: Write> JobProcessor for FetchProcessor<'_, L, W> {
    fn process(&mut self, coord: TileCoord) -> Result<(), JobError> {
        let rows = self
            .fetcher
            .fetch(coord.z, coord.bounds())
            .map_err(|e| JobError::Fatal(e.to_string()))?;
        write_rows(&mut self.out, &rows).map_err(|e| JobError::Fatal(e.to_string()))?;
        log::debug!("{coord}: {} rows", rows.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset;
    use osm_tiles_layers::all_layers;
    use osm_tiles_tile::TilePyramid;

    const DATASET: &str = r#"{
        "nodes": [
            { "id": 1, "tags": { "railway": "station", "name": "Central" },
              "geometry": { "type": "Point", "coordinates": [100.0, 100.0] } }
        ]
    }"#;

    #[test]
    fn writes_rows_for_tiles_inside_the_pyramid() {
        let (source, graph) = dataset::parse(DATASET).unwrap();
        let pyramid = TilePyramid::new(1, 1, 0, 16).unwrap();
        let fetcher = DataFetcher::new(&all_layers(), &source, pyramid, graph);
        let mut processor = FetchProcessor::new(&fetcher, Vec::new());

        processor.process(TileCoord::new(16, 32768, 32767)).unwrap();

        let out = String::from_utf8(processor.out).unwrap();
        let rows: Vec<serde_json::Value> = out
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert!(!rows.is_empty());
        assert!(rows.iter().all(|row| row["__id__"] == 1));
        assert!(rows.iter().any(|row| row.get("__pois_properties__").is_some()));
    }

    #[test]
    fn coordinates_outside_the_pyramid_are_fatal() {
        let (source, graph) = dataset::parse(DATASET).unwrap();
        let pyramid = TilePyramid::new(1, 1, 0, 16).unwrap();
        let fetcher = DataFetcher::new(&all_layers(), &source, pyramid, graph);
        let mut processor = FetchProcessor::new(&fetcher, Vec::new());

        let err = processor.process(TileCoord::new(2, 0, 0)).unwrap_err();

        assert!(!err.is_transient());
    }
}
