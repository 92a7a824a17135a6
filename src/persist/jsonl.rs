use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use serde::Serialize;

use crate::error::{Error, Result};
use crate::model::World;

/// Write an iterator of serializable items to a JSONL file (one JSON object per line).
fn write_jsonl<T: Serialize>(path: &Path, items: impl Iterator<Item = T>) -> io::Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    for item in items {
        serde_json::to_writer(&mut writer, &item)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()
}

/// Export the scoreboard of every region into `output_dir`, one
/// `<region>.scores.jsonl` file per region with one city per line.
///
/// Creates the output directory if it does not exist.
pub fn export_scores(world: &World, output_dir: &Path) -> Result<usize> {
    fs::create_dir_all(output_dir).map_err(|e| Error::io(output_dir, e))?;
    let mut written = 0;
    for region in world.regions.iter() {
        let path = output_dir.join(format!("{}.scores.jsonl", region.name));
        let scores = region.scores(&world.definitions, &world.config);
        write_jsonl(&path, scores.iter()).map_err(|e| Error::io(&path, e))?;
        written += 1;
    }
    Ok(written)
}
