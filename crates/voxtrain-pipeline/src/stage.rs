use crate::layout::WorkspaceLayout;
use crate::params::PipelineParams;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Programs implementing the pipeline stages: one interpreter plus one
/// script per stage, overridable from configuration so packaged tools and
/// test doubles are interchangeable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagePrograms {
    #[serde(default = "default_interpreter")]
    pub interpreter: PathBuf,
    #[serde(default = "default_segment_script")]
    pub segment_script: PathBuf,
    #[serde(default = "default_pitch_script")]
    pub pitch_script: PathBuf,
    #[serde(default = "default_features_script")]
    pub features_script: PathBuf,
    #[serde(default = "default_filelist_script")]
    pub filelist_script: PathBuf,
    #[serde(default = "default_train_config_script")]
    pub train_config_script: PathBuf,
}

fn default_interpreter() -> PathBuf {
    PathBuf::from("python3")
}

fn default_segment_script() -> PathBuf {
    PathBuf::from("tools/segment_audio.py")
}

fn default_pitch_script() -> PathBuf {
    PathBuf::from("tools/extract_pitch.py")
}

fn default_features_script() -> PathBuf {
    PathBuf::from("tools/extract_features.py")
}

fn default_filelist_script() -> PathBuf {
    PathBuf::from("tools/build_filelist.py")
}

fn default_train_config_script() -> PathBuf {
    PathBuf::from("tools/make_train_config.py")
}

impl Default for StagePrograms {
    fn default() -> Self {
        Self {
            interpreter: default_interpreter(),
            segment_script: default_segment_script(),
            pitch_script: default_pitch_script(),
            features_script: default_features_script(),
            filelist_script: default_filelist_script(),
            train_config_script: default_train_config_script(),
        }
    }
}

/// One pipeline stage: a command to run plus the outputs that prove it ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageSpec {
    pub name: String,
    pub program: PathBuf,
    pub args: Vec<String>,
    pub expected_outputs: Vec<PathBuf>,
}

impl StageSpec {
    #[must_use]
    pub fn new(name: impl Into<String>, program: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            program: program.into(),
            args: Vec::new(),
            expected_outputs: Vec::new(),
        }
    }

    /// Interpreter-driven stage; the script becomes the first argument.
    #[must_use]
    pub fn tool(name: impl Into<String>, interpreter: &Path, script: &Path) -> Self {
        Self::new(name, interpreter).arg(script.display().to_string())
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Flag followed by its value.
    #[must_use]
    pub fn kv(self, flag: &str, value: impl std::fmt::Display) -> Self {
        self.arg(flag).arg(value.to_string())
    }

    #[must_use]
    pub fn expects(mut self, output: PathBuf) -> Self {
        self.expected_outputs.push(output);
        self
    }

    /// First declared output that is not present on disk, if any.
    #[must_use]
    pub fn missing_output(&self) -> Option<&Path> {
        self.expected_outputs
            .iter()
            .map(PathBuf::as_path)
            .find(|p| !output_present(p))
    }
}

/// A declared output counts as present when the file exists, or for
/// directories, when the directory exists and is non-empty. An emptied
/// output directory must not pass cache validation.
#[must_use]
pub fn output_present(path: &Path) -> bool {
    if path.is_dir() {
        std::fs::read_dir(path)
            .map(|mut entries| entries.next().is_some())
            .unwrap_or(false)
    } else {
        path.is_file()
    }
}

/// The ordered preprocessing stages for one experiment. The pitch stage is
/// only present when the model conditions on pitch.
#[must_use]
pub fn default_stages(
    layout: &WorkspaceLayout,
    experiment: &str,
    dataset_dir: &Path,
    params: &PipelineParams,
    programs: &StagePrograms,
) -> Vec<StageSpec> {
    let segments = layout.segments_dir(experiment);
    let pitch = layout.pitch_dir(experiment);
    let features = layout.features_dir(experiment);
    let filelist = layout.filelist_path(experiment);
    let train_config = layout.train_config_path(experiment);

    let mut stages = Vec::with_capacity(5);

    stages.push(
        StageSpec::tool("segment", &programs.interpreter, &programs.segment_script)
            .kv("--input", dataset_dir.display())
            .kv("--output", segments.display())
            .kv("--sample-rate", params.sample_rate)
            .kv("--segment-secs", params.segment_secs)
            .expects(segments.clone()),
    );

    if params.use_f0 {
        stages.push(
            StageSpec::tool("pitch", &programs.interpreter, &programs.pitch_script)
                .kv("--input", segments.display())
                .kv("--output", pitch.display())
                .kv("--method", &params.pitch_method)
                .expects(pitch.clone()),
        );
    }

    let mut features_stage =
        StageSpec::tool("features", &programs.interpreter, &programs.features_script)
            .kv("--input", segments.display())
            .kv("--output", features.display())
            .kv("--version", &params.model_version);
    if params.accelerator {
        features_stage = features_stage.arg("--accelerator");
    }
    stages.push(features_stage.expects(features.clone()));

    let mut filelist_stage =
        StageSpec::tool("filelist", &programs.interpreter, &programs.filelist_script)
            .kv("--segments", segments.display());
    if params.use_f0 {
        filelist_stage = filelist_stage.kv("--pitch", pitch.display());
    }
    stages.push(
        filelist_stage
            .kv("--features", features.display())
            .kv("--output", filelist.display())
            .expects(filelist.clone()),
    );

    stages.push(
        StageSpec::tool(
            "train-config",
            &programs.interpreter,
            &programs.train_config_script,
        )
        .kv("--filelist", filelist.display())
        .kv("--sample-rate", params.sample_rate)
        .kv("--version", &params.model_version)
        .kv("--output", train_config.display())
        .expects(train_config),
    );

    stages
}
