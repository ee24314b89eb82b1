// src/io/reader.rs
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};

use flume::{Receiver, Sender};
use gdal::Dataset;
use log::debug;

use crate::error::SourceError;
use crate::raster::{GeoInfo, PixelWindow, Raster};

/// One band file, optionally limited to a pixel window.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BandRequest {
    pub path: PathBuf,
    pub window: Option<PixelWindow>,
}

impl BandRequest {
    pub fn new(path: impl Into<PathBuf>, window: Option<PixelWindow>) -> Self {
        Self {
            path: path.into(),
            window,
        }
    }
}

fn gdal_error(path: &Path) -> impl Fn(gdal::errors::GdalError) -> SourceError + '_ {
    move |source| SourceError::Gdal {
        path: path.to_path_buf(),
        source,
    }
}

fn open_with_grid(path: &Path) -> Result<(Dataset, GeoInfo), SourceError> {
    let dataset = Dataset::open(path).map_err(gdal_error(path))?;
    let (width, height) = dataset.raster_size();
    let geo_info = GeoInfo {
        projection: dataset.projection(),
        geo_transform: dataset.geo_transform().map_err(gdal_error(path))?,
        width,
        height,
    };
    Ok((dataset, geo_info))
}

/// Grid of a raster file, without reading any pixels.
pub fn read_grid(path: &Path) -> Result<GeoInfo, SourceError> {
    open_with_grid(path).map(|(_, geo_info)| geo_info)
}

/// Read band 1 of a raster file. Pixels equal to the band's nodata value come
/// back as `NaN`.
pub fn read_band(path: &Path) -> Result<Raster, SourceError> {
    read_band_window(path, None)
}

/// Like [`read_band`], limited to `window`. The raster's grid is the window's.
pub fn read_band_window(path: &Path, window: Option<PixelWindow>) -> Result<Raster, SourceError> {
    let (dataset, full) = open_with_grid(path)?;
    let window = window.unwrap_or_else(|| PixelWindow::full(&full));
    let size = (window.width, window.height);

    let band = dataset.rasterband(1).map_err(gdal_error(path))?;
    let nodata = band.no_data_value();
    let buffer = band
        .read_as::<f32>(
            (window.col_off as isize, window.row_off as isize),
            size,
            size,
            None,
        )
        .map_err(gdal_error(path))?;

    let data = buffer
        .data()
        .iter()
        .map(|&v| match nodata {
            Some(nd) if f64::from(v) == nd => f32::NAN,
            _ => v,
        })
        .collect();
    debug!(
        "read {} window {}x{} at ({}, {})",
        path.display(),
        window.width,
        window.height,
        window.col_off,
        window.row_off
    );

    Raster::new(full.window(&window), data)
}

type ReadResult = (usize, Result<Raster, SourceError>);

/// Read many bands on `io_threads` worker threads. The output keeps the order
/// of `requests`; the first failure is returned after all workers finish.
pub fn read_bands_parallel(
    requests: &[BandRequest],
    io_threads: usize,
) -> Result<Vec<Raster>, SourceError> {
    if requests.is_empty() {
        return Ok(Vec::new());
    }

    let (req_tx, req_rx) = flume::unbounded::<(usize, BandRequest)>();
    let (res_tx, res_rx) = flume::unbounded::<ReadResult>();

    for (idx, request) in requests.iter().enumerate() {
        req_tx
            .send((idx, request.clone()))
            .map_err(|_| SourceError::ReaderPool)?;
    }
    drop(req_tx);

    let threads = io_threads.clamp(1, requests.len());
    let workers: Vec<JoinHandle<()>> = (0..threads)
        .map(|_| spawn_worker(req_rx.clone(), res_tx.clone()))
        .collect();
    drop(res_tx);

    let mut slots: Vec<Option<Raster>> = (0..requests.len()).map(|_| None).collect();
    let mut first_error = None;
    for (idx, result) in res_rx {
        match result {
            Ok(raster) => slots[idx] = Some(raster),
            Err(e) => {
                first_error.get_or_insert(e);
            }
        }
    }

    for worker in workers {
        if worker.join().is_err() {
            return Err(SourceError::ReaderPool);
        }
    }
    if let Some(e) = first_error {
        return Err(e);
    }

    slots
        .into_iter()
        .map(|slot| slot.ok_or(SourceError::ReaderPool))
        .collect()
}

fn spawn_worker(
    requests: Receiver<(usize, BandRequest)>,
    results: Sender<ReadResult>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        for (idx, request) in requests {
            let raster = read_band_window(&request.path, request.window);
            if results.send((idx, raster)).is_err() {
                break;
            }
        }
    })
}
