use std::{
    fs,
    io::{Read, Write},
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::blocking::Client;

const MODEL_BASE_URL: &str = "https://raw.githubusercontent.com/opencv/opencv_zoo/main/models";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModelKind {
    PalmDetector,
    HandLandmarks,
}

impl ModelKind {
    pub const ALL: [ModelKind; 2] = [ModelKind::PalmDetector, ModelKind::HandLandmarks];

    pub fn file_name(self) -> &'static str {
        match self {
            ModelKind::PalmDetector => "palm_detection_mediapipe_2023feb.onnx",
            ModelKind::HandLandmarks => "handpose_estimation_mediapipe_2023feb.onnx",
        }
    }

    fn url(self) -> String {
        let dir = match self {
            ModelKind::PalmDetector => "palm_detection_mediapipe",
            ModelKind::HandLandmarks => "handpose_estimation_mediapipe",
        };
        format!("{MODEL_BASE_URL}/{dir}/{}", self.file_name())
    }

    pub fn label(self) -> &'static str {
        match self {
            ModelKind::PalmDetector => "palm detector",
            ModelKind::HandLandmarks => "hand landmark",
        }
    }
}

pub fn model_path(models_dir: &Path, model: ModelKind) -> PathBuf {
    models_dir.join(model.file_name())
}

#[derive(Clone, Debug)]
pub enum ModelDownloadEvent {
    AlreadyPresent {
        model: ModelKind,
    },
    Started {
        model: ModelKind,
        total: Option<u64>,
    },
    Progress {
        model: ModelKind,
        downloaded: u64,
        total: Option<u64>,
    },
    Finished {
        model: ModelKind,
    },
}

/// Makes sure every model the detector needs is on disk under `models_dir`.
pub fn ensure_models_ready<F>(models_dir: &Path, mut on_event: F) -> anyhow::Result<()>
where
    F: FnMut(ModelDownloadEvent),
{
    for model in ModelKind::ALL {
        ensure_model_ready(models_dir, model, &mut on_event)?;
    }
    Ok(())
}

pub fn ensure_model_ready<F>(models_dir: &Path, model: ModelKind, mut on_event: F) -> anyhow::Result<()>
where
    F: FnMut(ModelDownloadEvent),
{
    let dest = model_path(models_dir, model);
    if dest.exists() {
        on_event(ModelDownloadEvent::AlreadyPresent { model });
        on_event(ModelDownloadEvent::Finished { model });
        return Ok(());
    }

    fs::create_dir_all(models_dir)
        .with_context(|| format!("failed to create model directory {}", models_dir.display()))?;

    let mut progress: Option<ProgressBar> = None;
    download_to_path(model, &model.url(), &dest, &mut |event| {
        match &event {
            ModelDownloadEvent::Started { total, .. } => {
                progress = Some(create_progress_bar(*total));
            }
            ModelDownloadEvent::Progress { downloaded, .. } => {
                if let Some(pb) = progress.as_ref() {
                    pb.set_position(*downloaded);
                }
            }
            ModelDownloadEvent::Finished { model } => {
                if let Some(pb) = progress.take() {
                    pb.finish_with_message(format!("{} model ready", model.label()));
                }
            }
            ModelDownloadEvent::AlreadyPresent { .. } => {}
        }
        on_event(event);
    })
    .with_context(|| format!("failed to download {} model", model.label()))
}

fn download_to_path<F>(
    model: ModelKind,
    url: &str,
    dest: &Path,
    on_event: &mut F,
) -> anyhow::Result<()>
where
    F: FnMut(ModelDownloadEvent),
{
    log::info!(
        "downloading {} model from {url} to {}",
        model.label(),
        dest.display()
    );

    let client = Client::builder()
        .timeout(Duration::from_secs(300))
        .build()
        .context("failed to build http client")?;
    let mut response = client
        .get(url)
        .send()
        .context("failed to start model download")?
        .error_for_status()
        .context("model download returned error status")?;

    let total = response.content_length();
    on_event(ModelDownloadEvent::Started { model, total });

    let tmp_path = dest.with_extension("download");
    let mut file = fs::File::create(&tmp_path)
        .with_context(|| format!("failed to create {}", tmp_path.display()))?;

    let mut downloaded: u64 = 0;
    let mut buffer = [0u8; 16 * 1024];
    loop {
        let read = response
            .read(&mut buffer)
            .context("failed while reading model bytes")?;
        if read == 0 {
            break;
        }
        file.write_all(&buffer[..read])
            .context("failed while writing model to disk")?;
        downloaded += read as u64;
        on_event(ModelDownloadEvent::Progress {
            model,
            downloaded,
            total,
        });
    }

    file.sync_all()
        .context("failed to flush downloaded model to disk")?;
    fs::rename(&tmp_path, dest).with_context(|| {
        format!(
            "failed to move {} into place at {}",
            tmp_path.display(),
            dest.display()
        )
    })?;

    on_event(ModelDownloadEvent::Finished { model });
    Ok(())
}

fn create_progress_bar(total: Option<u64>) -> ProgressBar {
    match total {
        Some(total) if total > 0 => {
            let pb = ProgressBar::new(total);
            if let Ok(style) = ProgressStyle::with_template(
                "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {bytes}/{total_bytes} ({eta})",
            ) {
                pb.set_style(style.progress_chars("=>-"));
            }
            pb
        }
        _ => {
            let pb = ProgressBar::new_spinner();
            if let Ok(style) = ProgressStyle::with_template("{spinner:.green} downloading model") {
                pb.set_style(style);
            }
            pb.enable_steady_tick(Duration::from_millis(100));
            pb
        }
    }
}

/// Fraction of all models downloaded so far, for the startup screen.
#[derive(Clone, Debug, Default)]
pub struct DownloadProgress {
    done: usize,
    current: Option<(u64, Option<u64>)>,
}

impl DownloadProgress {
    pub fn apply(&mut self, event: &ModelDownloadEvent) {
        match event {
            ModelDownloadEvent::AlreadyPresent { .. } => {}
            ModelDownloadEvent::Started { total, .. } => self.current = Some((0, *total)),
            ModelDownloadEvent::Progress {
                downloaded, total, ..
            } => self.current = Some((*downloaded, *total)),
            ModelDownloadEvent::Finished { .. } => {
                self.done += 1;
                self.current = None;
            }
        }
    }

    /// 0.0..=1.0 across every model, or `None` while a download has no size.
    pub fn fraction(&self) -> Option<f32> {
        let count = ModelKind::ALL.len() as f32;
        let partial = match self.current {
            None => 0.0,
            Some((_, None)) => return None,
            Some((done, Some(total))) if total > 0 => done as f32 / total as f32,
            Some(_) => 0.0,
        };
        Some(((self.done as f32 + partial) / count).clamp(0.0, 1.0))
    }
}
