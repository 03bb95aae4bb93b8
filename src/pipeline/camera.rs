use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Instant,
};

use anyhow::{Context, Result, anyhow};
use crossbeam_channel::{Sender, TrySendError};
use nokhwa::{
    Camera,
    pixel_format::RgbAFormat,
    query,
    utils::{ApiBackend, CameraIndex, RequestedFormat, RequestedFormatType},
};

use crate::types::Frame;

#[derive(Clone, Debug)]
pub struct CameraDevice {
    pub index: CameraIndex,
    pub label: String,
}

/// A running capture thread. Dropping it stops and joins the thread.
#[derive(Debug)]
pub struct CameraStream {
    stop: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
    resolution: (u32, u32),
    label: String,
}

impl CameraStream {
    /// Pixel size of the frames this stream delivers.
    pub fn resolution(&self) -> (u32, u32) {
        self.resolution
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

impl Drop for CameraStream {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

pub fn first_camera() -> Result<CameraDevice> {
    let cameras = query(ApiBackend::Auto).context("failed to list cameras")?;
    let info = cameras
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("no camera found"))?;
    Ok(CameraDevice {
        index: info.index().clone(),
        label: info.human_name(),
    })
}

fn requested_formats() -> [RequestedFormat<'static>; 2] {
    [
        RequestedFormat::new::<RgbAFormat>(RequestedFormatType::AbsoluteHighestFrameRate),
        RequestedFormat::new::<RgbAFormat>(RequestedFormatType::None),
    ]
}

fn build_camera(index: &CameraIndex) -> Result<Camera> {
    let mut last_err = None;

    for requested in requested_formats() {
        match Camera::new(index.clone(), requested) {
            Ok(mut camera) => match camera.open_stream() {
                Ok(()) => return Ok(camera),
                Err(err) => last_err = Some(err.into()),
            },
            Err(err) => last_err = Some(err.into()),
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow!("failed to open camera with any supported format")))
}

/// Streams RGBA frames into `frame_tx`, dropping frames while the consumer is
/// busy.
pub fn start_camera_stream(device: CameraDevice, frame_tx: Sender<Frame>) -> Result<CameraStream> {
    // Fail fast before spawning the capture thread.
    let resolution = {
        let camera = build_camera(&device.index)
            .with_context(|| format!("failed to open camera {}", device.label))?;
        let res = camera.resolution();
        (res.width_x, res.height_y)
    };
    log::info!(
        "camera {} opened at {}x{}",
        device.label,
        resolution.0,
        resolution.1
    );

    let stop = Arc::new(AtomicBool::new(false));
    let stop_flag = stop.clone();
    let index = device.index.clone();

    let handle = thread::spawn(move || {
        let mut camera = match build_camera(&index) {
            Ok(cam) => cam,
            Err(err) => {
                log::error!("failed to open camera: {err:?}");
                return;
            }
        };

        while !stop_flag.load(Ordering::Relaxed) {
            let buffer = match camera.frame() {
                Ok(buffer) => buffer,
                Err(err) => {
                    log::warn!("camera frame read failed: {err:?}");
                    continue;
                }
            };

            let decoded = match buffer.decode_image::<RgbAFormat>() {
                Ok(img) => img,
                Err(err) => {
                    log::warn!("failed to decode camera frame: {err:?}");
                    continue;
                }
            };

            let (width, height) = decoded.dimensions();
            let frame = Frame {
                rgba: decoded.into_raw(),
                width,
                height,
                timestamp: Instant::now(),
            };

            // Drop if the detector is still busy with the previous frame.
            if let Err(TrySendError::Disconnected(_)) = frame_tx.try_send(frame) {
                log::info!("frame consumer gone, stopping capture");
                break;
            }
        }

        let _ = camera.stop_stream();
    });

    Ok(CameraStream {
        stop,
        handle: Some(handle),
        resolution,
        label: device.label,
    })
}
