//! CLI for the redaction job client.

mod commands;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use redact_core::cancel::CancelToken;
use redact_core::client::{parse_custom_headers, RedactClient, RedactFileOptions};
use redact_core::config::{self, RedactConfig};
use redact_core::image_folder::FRAMES_PER_JOB;
use redact_core::models::{
    AreaOfInterest, CustomLabels, InputType, JobArguments, OutputType, Region, ServiceType,
};
use redact_core::transport::{Transport, TransportConfig};
use uuid::Uuid;

use commands::{run_delete, run_download, run_redact_file, run_redact_folder, run_status};

/// Top-level CLI for the redaction service client.
#[derive(Debug, Parser)]
#[command(name = "redact")]
#[command(about = "Submit images and videos to a redaction service and fetch the results", long_about = None)]
pub struct Cli {
    /// Log at debug level (RUST_LOG overrides).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Redact one file, or one folder of frames with --video-as-image-folders.
    RedactFile {
        /// Input file (or folder of frames).
        input: PathBuf,

        /// Output path; defaults to `<stem>_redacted<ext>` next to the input.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Treat the input folder as the frames of one video.
        #[arg(long)]
        video_as_image_folders: bool,

        /// Most frames per job with --video-as-image-folders.
        #[arg(long, default_value_t = FRAMES_PER_JOB, value_name = "N")]
        video_as_image_folders_batch_size: usize,

        #[command(flatten)]
        endpoint: EndpointArgs,

        #[command(flatten)]
        job: JobArgs,
    },

    /// Redact every matching file below a folder into the same layout.
    RedactFolder {
        input_dir: PathBuf,

        output_dir: PathBuf,

        /// Which files to pick up.
        #[arg(long, default_value = "images")]
        input_type: InputType,

        /// Parallel jobs per redact URL.
        #[arg(long, default_value = "1", value_name = "N")]
        n_parallel_jobs: usize,

        /// Treat each leaf folder of frames as one video.
        #[arg(long)]
        video_as_image_folders: bool,

        /// Most frames per job with --video-as-image-folders.
        #[arg(long, default_value_t = FRAMES_PER_JOB, value_name = "N")]
        video_as_image_folders_batch_size: usize,

        #[command(flatten)]
        endpoint: EndpointArgs,

        #[command(flatten)]
        job: JobArgs,
    },

    /// Show the status of a submitted job.
    Status {
        #[command(flatten)]
        job: JobRef,
    },

    /// Download the result of a finished job.
    Download {
        #[command(flatten)]
        job: JobRef,

        /// Where to write the result; the extension follows the server.
        output: PathBuf,

        /// Download even if the job reported warnings.
        #[arg(long)]
        ignore_warnings: bool,
    },

    /// Delete a job and its result on the server.
    Delete {
        #[command(flatten)]
        job: JobRef,
    },
}

/// Where to send requests and how to authenticate.
#[derive(Debug, Clone, Args)]
pub struct EndpointArgs {
    /// Service URL; repeat to spread a folder run over several endpoints.
    #[arg(long = "redact-url", value_name = "URL")]
    pub redact_url: Vec<String>,

    #[arg(long)]
    pub api_key: Option<String>,

    #[arg(long)]
    pub subscription_id: Option<String>,

    /// Extra request header as key=value (repeatable).
    #[arg(long = "custom-headers", value_name = "KEY=VALUE")]
    pub custom_headers: Vec<String>,

    /// Fixed upload timeout instead of one sized from the file.
    #[arg(long, value_name = "SECS")]
    pub upload_timeout_secs: Option<u64>,
}

/// An existing job on the server.
#[derive(Debug, Clone, Args)]
pub struct JobRef {
    pub output_id: Uuid,

    #[arg(long, default_value = "blur")]
    pub service: ServiceType,

    #[arg(long, default_value = "images")]
    pub output_type: OutputType,

    #[command(flatten)]
    pub endpoint: EndpointArgs,
}

/// What to detect and how to handle the job.
#[derive(Debug, Clone, Args)]
pub struct JobArgs {
    #[arg(long, default_value = "blur")]
    pub service: ServiceType,

    #[arg(long, default_value = "images")]
    pub output_type: OutputType,

    #[arg(long)]
    pub region: Option<Region>,

    #[arg(long, value_name = "BOOL")]
    pub face: Option<bool>,

    #[arg(long, value_name = "BOOL")]
    pub license_plate: Option<bool>,

    #[arg(long, value_name = "BOOL")]
    pub full_body: Option<bool>,

    #[arg(long, value_name = "BOOL")]
    pub speed_optimized: Option<bool>,

    #[arg(long, value_name = "BOOL")]
    pub vehicle_recorded_data: Option<bool>,

    #[arg(long, value_name = "BOOL")]
    pub single_frame_optimized: Option<bool>,

    #[arg(long)]
    pub lp_determination_threshold: Option<f64>,

    #[arg(long)]
    pub face_determination_threshold: Option<f64>,

    #[arg(long)]
    pub full_body_segmentation_threshold: Option<f64>,

    #[arg(long)]
    pub status_webhook_url: Option<String>,

    /// Region to redact as x,y,width,height (repeatable).
    #[arg(long = "areas-of-interest", value_name = "X,Y,W,H")]
    pub areas_of_interest: Vec<AreaOfInterest>,

    /// Image stamped over license plates.
    #[arg(long)]
    pub licence_plate_custom_stamp: Option<PathBuf>,

    /// JSON file with labels to use instead of detection.
    #[arg(long)]
    pub custom_labels: Option<PathBuf>,

    /// Download results of jobs that reported warnings.
    #[arg(long)]
    pub ignore_warnings: bool,

    #[arg(long, default_value_t = true, action = clap::ArgAction::Set, value_name = "BOOL")]
    pub skip_existing: bool,

    #[arg(long, default_value_t = true, action = clap::ArgAction::Set, value_name = "BOOL")]
    pub auto_delete_job: bool,

    /// Delete each input once its result is written.
    #[arg(long)]
    pub auto_delete_input_file: bool,
}

impl JobArgs {
    fn job_arguments(&self) -> Result<JobArguments> {
        let mut b = JobArguments::builder().areas_of_interest(self.areas_of_interest.iter().copied());
        if let Some(r) = self.region {
            b = b.region(r);
        }
        if let Some(on) = self.face {
            b = b.face(on);
        }
        if let Some(on) = self.license_plate {
            b = b.license_plate(on);
        }
        if let Some(on) = self.full_body {
            b = b.full_body(on);
        }
        if let Some(on) = self.speed_optimized {
            b = b.speed_optimized(on);
        }
        if let Some(on) = self.vehicle_recorded_data {
            b = b.vehicle_recorded_data(on);
        }
        if let Some(on) = self.single_frame_optimized {
            b = b.single_frame_optimized(on);
        }
        if let Some(t) = self.lp_determination_threshold {
            b = b.lp_determination_threshold(t);
        }
        if let Some(t) = self.face_determination_threshold {
            b = b.face_determination_threshold(t);
        }
        if let Some(t) = self.full_body_segmentation_threshold {
            b = b.full_body_segmentation_threshold(t);
        }
        if let Some(url) = &self.status_webhook_url {
            b = b.status_webhook_url(url.clone());
        }
        Ok(b.build()?)
    }

    /// Per-file options for the core pipeline.
    pub fn file_options(&self) -> Result<RedactFileOptions> {
        let mut opts = RedactFileOptions::new(self.service, self.output_type);
        opts.job_args = self.job_arguments()?;
        opts.licence_plate_custom_stamp = self.licence_plate_custom_stamp.clone();
        if let Some(path) = &self.custom_labels {
            let raw = std::fs::read(path)
                .with_context(|| format!("reading custom labels {}", path.display()))?;
            opts.custom_labels = Some(CustomLabels::RawJson(raw));
        }
        opts.ignore_warnings = self.ignore_warnings;
        opts.skip_existing = self.skip_existing;
        opts.auto_delete_job = self.auto_delete_job;
        opts.auto_delete_input_file = self.auto_delete_input_file;
        Ok(opts)
    }
}

impl EndpointArgs {
    /// One client per redact URL, all sharing one transport. Falls back to
    /// the configured URL when none is given.
    pub fn clients(&self, cfg: &RedactConfig, cancel: CancelToken) -> Result<Vec<RedactClient>> {
        let transport = Arc::new(Transport::new(TransportConfig::from(cfg)).with_cancel(cancel));
        let urls = if self.redact_url.is_empty() {
            vec![cfg.redact_url.clone()]
        } else {
            self.redact_url.clone()
        };
        let custom = parse_custom_headers(&self.custom_headers)?;
        let api_key = self.api_key.clone().or_else(|| cfg.api_key.clone());
        let subscription_id = self.subscription_id.clone().or_else(|| cfg.subscription_id.clone());
        urls.iter()
            .map(|url| {
                let client = RedactClient::new(url, Arc::clone(&transport))
                    .with_context(|| format!("invalid redact URL '{}'", url))?
                    .with_api_key(api_key.clone())
                    .with_subscription_id(subscription_id.clone())
                    .with_custom_headers(custom.clone())
                    .with_upload_timeout(self.upload_timeout_secs.map(Duration::from_secs));
                Ok(client)
            })
            .collect()
    }

    /// The single client of a one-endpoint command.
    pub fn client(&self, cfg: &RedactConfig, cancel: CancelToken) -> Result<RedactClient> {
        if self.redact_url.len() > 1 {
            anyhow::bail!("only one --redact-url is allowed for this command");
        }
        self.clients(cfg, cancel)?
            .pop()
            .context("no redact URL configured")
    }
}

impl Cli {
    pub fn run(self, cancel: CancelToken) -> Result<()> {
        let cfg = config::load_or_init()?;
        tracing::debug!(redact_url = %cfg.redact_url, "loaded config");

        match self.command {
            CliCommand::RedactFile {
                input,
                output,
                video_as_image_folders,
                video_as_image_folders_batch_size,
                endpoint,
                job,
            } => {
                let client = endpoint.client(&cfg, cancel)?;
                let frames_per_job = video_as_image_folders.then_some(video_as_image_folders_batch_size);
                run_redact_file(&client, &input, output.as_deref(), frames_per_job, &job)?;
            }
            CliCommand::RedactFolder {
                input_dir,
                output_dir,
                input_type,
                n_parallel_jobs,
                video_as_image_folders,
                video_as_image_folders_batch_size,
                endpoint,
                job,
            } => {
                let clients = endpoint.clients(&cfg, cancel)?;
                run_redact_folder(
                    &clients,
                    input_dir,
                    output_dir,
                    input_type,
                    n_parallel_jobs,
                    video_as_image_folders,
                    video_as_image_folders_batch_size,
                    &job,
                )?;
            }
            CliCommand::Status { job } => {
                let client = job.endpoint.client(&cfg, cancel)?;
                run_status(client, &job)?;
            }
            CliCommand::Download { job, output, ignore_warnings } => {
                let client = job.endpoint.client(&cfg, cancel)?;
                run_download(client, &job, &output, ignore_warnings)?;
            }
            CliCommand::Delete { job } => {
                let client = job.endpoint.client(&cfg, cancel)?;
                run_delete(client, &job)?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
