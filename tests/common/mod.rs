//! Shared fixtures for the integration tests: a small on-disk dataset with
//! real PNG images and landmark files whose expected error statistics are
//! known in closed form.

// Not every test binary uses every helper.
#![allow(dead_code)]

use std::path::{Path, PathBuf};

use cotejo::RunConfig;

/// Landmark layout: reference `(0,0),(10,0)` vs moving `(0,1),(10,1)`,
/// giving an init mean distance of exactly 1.0 px. Images are 100x100, so
/// the diagonal is `sqrt(2) * 100`.
pub const INIT_MEAN: f64 = 1.0;

/// Build a dataset of `pairs` identical registration pairs under
/// `root/data` and return a config writing to `root/out`.
pub fn make_config(root: &Path, pairs: usize) -> RunConfig {
    let data = root.join("data");
    std::fs::create_dir_all(&data).unwrap();

    let mut cover =
        String::from("Reference image,Moving image,Reference landmarks,Moving landmarks\n");
    for pair in 0..pairs {
        image::RgbaImage::new(100, 100)
            .save(data.join(format!("ref{pair}.png")))
            .unwrap();
        image::RgbaImage::new(100, 100)
            .save(data.join(format!("move{pair}.png")))
            .unwrap();
        std::fs::write(data.join(format!("ref{pair}.csv")), "0.0,0.0\n10.0,0.0\n").unwrap();
        std::fs::write(data.join(format!("move{pair}.csv")), "0.0,1.0\n10.0,1.0\n").unwrap();
        cover.push_str(&format!(
            "ref{pair}.png,move{pair}.png,ref{pair}.csv,move{pair}.csv\n"
        ));
    }
    std::fs::write(data.join("cover.csv"), cover).unwrap();

    RunConfig::builder(data.join("cover.csv"), root.join("out"))
        .jobs(1)
        .build()
}

/// Experiment folder the identity baseline writes into.
pub fn experiment_root(root: &Path) -> PathBuf {
    root.join("out/identity")
}
