//! Conversion pipeline: GLB → OBJ → STEP → ZIP.
//!
//! Stages run strictly in order and the first failure ends the job. A stage
//! only counts as done once its artifact is present on disk, whatever the
//! process exit code said. Compression is the one step allowed to fail: the
//! raw STEP is delivered instead.

use std::sync::Arc;
use std::time::{Duration, Instant};

use glb2step_core::config::conversion::ConversionConfig;
use tracing::{error, info, instrument, warn};

use crate::error::ConversionError;
use crate::executor::{StageCommand, StageResult, StageRunner};
use crate::metrics::PipelineMetrics;
use crate::models::{ArtifactRole, Deliverable, PackageKind, PipelineState, Stage};
use crate::packaging;
use crate::scripting::{self, CadReport, CadRequest};
use crate::workspace::Job;

/// Drives one job through every stage.
#[derive(Debug, Clone)]
pub struct ConversionPipeline {
    config: Arc<ConversionConfig>,
    runner: StageRunner,
    metrics: Arc<PipelineMetrics>,
}

impl ConversionPipeline {
    /// Create a pipeline.
    pub fn new(config: ConversionConfig) -> Self {
        Self {
            config: Arc::new(config),
            runner: StageRunner::new(),
            metrics: Arc::new(PipelineMetrics::new()),
        }
    }

    /// The pipeline configuration.
    pub fn config(&self) -> &ConversionConfig {
        &self.config
    }

    /// The metrics collector.
    pub fn metrics(&self) -> &PipelineMetrics {
        &self.metrics
    }

    /// Convert the job's `input` artifact into its deliverable.
    #[instrument(skip(self, job), fields(job_id = %job.id()))]
    pub async fn run(&self, job: &Job) -> Result<Deliverable, ConversionError> {
        self.metrics.record_started();
        let start = Instant::now();

        let result = self.run_stages(job).await;

        match &result {
            Ok(deliverable) => {
                self.metrics.record_success(start.elapsed(), deliverable.size);
            }
            Err(e) => {
                if e.is_timeout() {
                    self.metrics.record_timeout();
                } else {
                    self.metrics.record_failure();
                }
                error!(
                    state = ?PipelineState::Failed(e.failure_reason()),
                    error = %e.detail(true),
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Conversion failed"
                );
            }
        }

        result
    }

    async fn run_stages(&self, job: &Job) -> Result<Deliverable, ConversionError> {
        let mut state = PipelineState::Received;

        self.convert_to_obj(job).await?;
        state = advance(state, PipelineState::ConvertedObj);

        let report = self.convert_to_step(job).await?;
        state = advance(state, PipelineState::ConvertedStep);

        let mut deliverable = self.package(job).await?;
        deliverable.report = report;
        state = advance(state, PipelineState::Packaged);

        advance(state, PipelineState::Done);
        Ok(deliverable)
    }

    /// GLB → OBJ.
    async fn convert_to_obj(&self, job: &Job) -> Result<(), ConversionError> {
        let stage = Stage::AssetConversion;
        let input = job.artifact_path(ArtifactRole::Input);
        let intermediate = job.artifact_path(ArtifactRole::Intermediate);

        let command = StageCommand::new(
            self.config.converter_command.as_str(),
            [
                "export".to_string(),
                input.to_string_lossy().into_owned(),
                intermediate.to_string_lossy().into_owned(),
            ],
        )
        .timeout(Duration::from_secs(self.config.converter_timeout_seconds))
        .working_dir(job.dir());

        let result = self.runner.run(&command).await;
        self.check_completion(stage, &command, result)?;
        self.require_artifact(job, stage, ArtifactRole::Intermediate)
            .await
    }

    /// OBJ → STEP.
    async fn convert_to_step(&self, job: &Job) -> Result<Option<CadReport>, ConversionError> {
        let stage = Stage::CadExport;
        let request = CadRequest {
            input_path: job.artifact_path(ArtifactRole::Intermediate),
            output_path: job.artifact_path(ArtifactRole::Output),
        };
        let request_path = request.write_to(job.dir()).await?;

        let command = StageCommand::new(
            self.config.cad_command.as_str(),
            ["-c", scripting::CAD_SCRIPT],
        )
        .timeout(Duration::from_secs(self.config.cad_timeout_seconds))
        .working_dir(job.dir())
        .env("DISPLAY", self.config.display.as_str())
        .env("QT_QPA_PLATFORM", "offscreen")
        .env(
            scripting::REQUEST_ENV_VAR,
            request_path.to_string_lossy().into_owned(),
        );

        // Exit codes 2 and 3 only mean something when the script itself said so.
        let result = self.runner.run(&command).await;
        let result = match result {
            StageResult::Completed {
                exit_code: scripting::EXIT_EMPTY_MESH,
                stdout,
                stderr,
                ..
            } if stdout.contains(scripting::EMPTY_MESH_MARKER) => {
                return Err(ConversionError::EmptyMesh { stdout, stderr });
            }
            StageResult::Completed {
                exit_code: scripting::EXIT_NO_VALID_FACES,
                stdout,
                stderr,
                ..
            } if stdout.contains(scripting::NO_VALID_FACES_MARKER) => {
                return Err(ConversionError::NoValidFaces { stdout, stderr });
            }
            other => other,
        };

        let stdout = self.check_completion(stage, &command, result)?;
        self.require_artifact(job, stage, ArtifactRole::Output)
            .await?;

        let report = CadReport::parse(&stdout);
        match report {
            Some(r) => info!(
                faces_total = r.faces_total,
                faces_built = r.faces_built,
                face_errors = r.face_errors,
                "CAD export built compound"
            ),
            None => warn!("CAD export did not print a face report"),
        }

        Ok(report)
    }

    /// STEP → ZIP, falling back to the raw STEP on any compression error.
    async fn package(&self, job: &Job) -> Result<Deliverable, ConversionError> {
        let step = job.artifact_path(ArtifactRole::Output);
        let zip = job.artifact_path(ArtifactRole::Package);
        let level = self.config.compression_level;

        let (step_src, zip_dst) = (step.clone(), zip.clone());
        let outcome =
            tokio::task::spawn_blocking(move || packaging::compress_step(&step_src, &zip_dst, level))
                .await;

        let failure = match outcome {
            Ok(Ok(stats)) => {
                let reduction = format!("{:.1}%", stats.reduction_percent());
                info!(
                    original_bytes = stats.original_bytes,
                    compressed_bytes = stats.compressed_bytes,
                    reduction = %reduction,
                    "STEP compressed"
                );
                return Ok(Deliverable {
                    path: zip,
                    kind: PackageKind::Zip,
                    size: stats.compressed_bytes,
                    report: None,
                });
            }
            Ok(Err(e)) => e.to_string(),
            Err(e) => e.to_string(),
        };

        warn!(error = %failure, "Compression failed, delivering uncompressed STEP");
        self.metrics.record_compression_fallback();

        let size = tokio::fs::metadata(&step).await?.len();
        Ok(Deliverable {
            path: step,
            kind: PackageKind::RawStep,
            size,
            report: None,
        })
    }

    /// Map a process outcome to the stage's error, returning stdout on exit 0.
    fn check_completion(
        &self,
        stage: Stage,
        command: &StageCommand,
        result: StageResult,
    ) -> Result<String, ConversionError> {
        match result {
            StageResult::Completed {
                exit_code: 0,
                stdout,
                ..
            } => Ok(stdout),
            StageResult::Completed {
                exit_code,
                stdout,
                stderr,
                ..
            } => Err(ConversionError::StageFailed {
                stage,
                code: exit_code,
                stdout,
                stderr,
            }),
            StageResult::TimedOut { timeout } => Err(ConversionError::StageTimedOut {
                stage,
                timeout_seconds: timeout.as_secs(),
            }),
            StageResult::LaunchError { error } => Err(ConversionError::LaunchFailed {
                stage,
                command: command.program.clone(),
                source: error,
            }),
        }
    }

    async fn require_artifact(
        &self,
        job: &Job,
        stage: Stage,
        role: ArtifactRole,
    ) -> Result<(), ConversionError> {
        if job.has_artifact(role, self.config.min_output_bytes).await {
            return Ok(());
        }
        Err(ConversionError::OutputMissing {
            stage,
            path: job.artifact_path(role),
        })
    }
}

fn advance(from: PipelineState, to: PipelineState) -> PipelineState {
    info!(from = ?from, to = ?to, "Pipeline transition");
    to
}
