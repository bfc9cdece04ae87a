use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{Array, DictionaryArray, Float64Array, Int32Array};
use arrow::datatypes::{DataType, Field, Int32Type, Schema};
use arrow::ipc::writer::FileWriter;
use arrow::record_batch::RecordBatch;

/// One synthetic episode row: `(imdb, engagement, monster_real)`.
pub fn monster_row(i: usize) -> (f64, f64, &'static str) {
    let jitter = (i * 37 % 11) as f64 / 10.0;
    if i % 2 == 0 {
        (6.0 + jitter, 600.0 + jitter * 40.0, "real")
    } else {
        (8.0 + jitter, 150.0 + jitter * 40.0, "fake")
    }
}

/// Write `rows` episodes as an Arrow IPC file with a dictionary label column.
pub fn write_monsters_arrow(path: &Path, rows: usize) {
    let episodes: Vec<_> = (0..rows).map(monster_row).collect();
    let labels: DictionaryArray<Int32Type> = episodes.iter().map(|(_, _, label)| *label).collect();
    let schema = Arc::new(Schema::new(vec![
        Field::new("index", DataType::Int32, false),
        Field::new("imdb", DataType::Float64, false),
        Field::new("engagement", DataType::Float64, false),
        Field::new("monster_real", labels.data_type().clone(), false),
    ]));
    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(Int32Array::from_iter_values(0..rows as i32)),
            Arc::new(Float64Array::from_iter_values(episodes.iter().map(|e| e.0))),
            Arc::new(Float64Array::from_iter_values(episodes.iter().map(|e| e.1))),
            Arc::new(labels),
        ],
    )
    .unwrap();
    let mut writer = FileWriter::try_new(File::create(path).unwrap(), &schema).unwrap();
    writer.write(&batch).unwrap();
    writer.finish().unwrap();
}

/// Write `rows` episodes as CSV with a header row.
pub fn write_monsters_csv(path: &Path, rows: usize) {
    let mut text = String::from("index,imdb,engagement,monster_real\n");
    for i in 0..rows {
        let (imdb, engagement, label) = monster_row(i);
        text.push_str(&format!("{i},{imdb},{engagement},{label}\n"));
    }
    std::fs::write(path, text).unwrap();
}
